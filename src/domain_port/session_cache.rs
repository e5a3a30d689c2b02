use crate::domain_model::*;
use chrono::{DateTime, Utc};

/// What the cache holds for a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Live(RefreshToken),
    /// Ended by logout or revoke. Refresh tokens issued before it stay dead
    /// until `until`, the latest expiry any of them can have.
    Revoked { until: DateTime<Utc> },
}

/// Subject -> current session. One live session per subject.
///
/// Implementations must not do I/O while holding a lock; every operation is a
/// single map access.
pub trait SessionCache: Send + Sync {
    /// Insert or overwrite the subject's session, clearing any revocation.
    fn put(&self, subject_id: SubjectId, token: RefreshToken);

    fn get(&self, subject_id: SubjectId) -> Option<SessionState>;

    /// Drop a live session. A revocation marker is left in place and a
    /// missing entry is a no-op.
    fn delete(&self, subject_id: SubjectId);

    /// Replace whatever the subject holds with a revocation marker.
    fn revoke(&self, subject_id: SubjectId, until: DateTime<Utc>);

    /// Atomically install `replacement` if the entry still equals `expected`
    /// (`None` meaning "no entry"). Returns whether the swap happened.
    fn compare_and_swap(
        &self,
        subject_id: SubjectId,
        expected: Option<&SessionState>,
        replacement: RefreshToken,
    ) -> bool;
}
