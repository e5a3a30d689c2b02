use crate::application_impl::constant_time_eq;
use crate::domain_model::*;
use crate::domain_port::{SessionCache, SessionState};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Sharded in-process session map; lives as long as the server that owns it.
#[derive(Debug, Default)]
pub struct InMemorySessionCache {
    sessions: DashMap<SubjectId, SessionState>,
}

impl InMemorySessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

fn same_state(held: &SessionState, expected: &SessionState) -> bool {
    match (held, expected) {
        (SessionState::Live(held), SessionState::Live(expected)) => {
            constant_time_eq(held.as_str().as_bytes(), expected.as_str().as_bytes())
        }
        (SessionState::Revoked { until: held }, SessionState::Revoked { until: expected }) => held == expected,
        _ => false,
    }
}

impl SessionCache for InMemorySessionCache {
    fn put(&self, subject_id: SubjectId, token: RefreshToken) {
        self.sessions.insert(subject_id, SessionState::Live(token));
    }

    fn get(&self, subject_id: SubjectId) -> Option<SessionState> {
        self.sessions.get(&subject_id).map(|entry| entry.value().clone())
    }

    fn delete(&self, subject_id: SubjectId) {
        self.sessions
            .remove_if(&subject_id, |_, state| matches!(state, SessionState::Live(_)));
    }

    fn revoke(&self, subject_id: SubjectId, until: DateTime<Utc>) {
        self.sessions.insert(subject_id, SessionState::Revoked { until });
    }

    fn compare_and_swap(
        &self,
        subject_id: SubjectId,
        expected: Option<&SessionState>,
        replacement: RefreshToken,
    ) -> bool {
        match (self.sessions.entry(subject_id), expected) {
            (Entry::Vacant(vacant), None) => {
                vacant.insert(SessionState::Live(replacement));
                true
            }
            (Entry::Occupied(mut occupied), Some(expected)) if same_state(occupied.get(), expected) => {
                occupied.insert(SessionState::Live(replacement));
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn token(s: &str) -> RefreshToken {
        RefreshToken(s.to_string())
    }

    fn live(s: &str) -> Option<SessionState> {
        Some(SessionState::Live(token(s)))
    }

    fn until(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_put_overwrites_previous_session() {
        let cache = InMemorySessionCache::new();
        let subject = SubjectId::generate();

        cache.put(subject, token("first"));
        cache.put(subject, token("second"));

        assert_eq!(cache.get(subject), live("second"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let cache = InMemorySessionCache::new();
        let subject = SubjectId::generate();
        cache.put(subject, token("t"));

        cache.delete(subject);
        cache.delete(subject);

        assert_eq!(cache.get(subject), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_revocation_survives_delete_until_next_put() {
        let cache = InMemorySessionCache::new();
        let subject = SubjectId::generate();
        cache.put(subject, token("t"));

        cache.revoke(subject, until(1_000));
        cache.delete(subject);
        assert_eq!(cache.get(subject), Some(SessionState::Revoked { until: until(1_000) }));

        cache.put(subject, token("fresh"));
        assert_eq!(cache.get(subject), live("fresh"));
    }

    #[test]
    fn test_compare_and_swap() {
        let cache = InMemorySessionCache::new();
        let subject = SubjectId::generate();

        assert!(cache.compare_and_swap(subject, None, token("a")));
        assert!(!cache.compare_and_swap(subject, None, token("b")));
        assert!(!cache.compare_and_swap(subject, live("stale").as_ref(), token("b")));
        assert_eq!(cache.get(subject), live("a"));

        assert!(cache.compare_and_swap(subject, live("a").as_ref(), token("b")));
        assert_eq!(cache.get(subject), live("b"));

        let other = SubjectId::generate();
        assert!(!cache.compare_and_swap(other, live("b").as_ref(), token("c")));
        assert_eq!(cache.get(other), None);
    }

    #[test]
    fn test_compare_and_swap_does_not_pass_a_revocation_from_empty() {
        let cache = InMemorySessionCache::new();
        let subject = SubjectId::generate();
        cache.revoke(subject, until(1_000));

        assert!(!cache.compare_and_swap(subject, None, token("a")));
        assert!(!cache.compare_and_swap(subject, Some(&SessionState::Revoked { until: until(999) }), token("a")));
        assert!(cache.compare_and_swap(subject, Some(&SessionState::Revoked { until: until(1_000) }), token("a")));
        assert_eq!(cache.get(subject), live("a"));
    }

    #[test]
    fn test_concurrent_subjects_do_not_interfere() {
        let cache = Arc::new(InMemorySessionCache::new());
        let subjects: Vec<SubjectId> = (0..16).map(|_| SubjectId::generate()).collect();

        let handles: Vec<_> = subjects
            .iter()
            .copied()
            .map(|subject| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        cache.put(subject, token(&format!("{}-{}", subject, i)));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), subjects.len());
        for subject in subjects {
            assert_eq!(cache.get(subject), Some(SessionState::Live(token(&format!("{}-199", subject)))));
        }
    }
}
