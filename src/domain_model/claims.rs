use super::{AudienceId, Role, SubjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Everything a token says about its session, minus the expiry.
///
/// A grant is what gets handed to the codec; the codec stamps the expiry and
/// hands back [`Claims`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Grant {
    pub subject_id: SubjectId,
    pub role: Option<Role>,
    pub audience_id: Option<AudienceId>,
    pub kind: TokenKind,
}

impl Grant {
    pub fn access(subject_id: SubjectId, role: Role, audience_id: Option<AudienceId>) -> Self {
        Grant {
            subject_id,
            role: Some(role),
            audience_id,
            kind: TokenKind::Access,
        }
    }

    /// Refresh tokens never carry a role.
    pub fn refresh(subject_id: SubjectId, audience_id: Option<AudienceId>) -> Self {
        Grant {
            subject_id,
            role: None,
            audience_id,
            kind: TokenKind::Refresh,
        }
    }

    pub fn stamp(self, expires_at: DateTime<Utc>) -> Claims {
        Claims {
            subject_id: self.subject_id,
            role: self.role,
            expires_at,
            audience_id: self.audience_id,
            kind: self.kind,
        }
    }
}

/// The decoded payload of a verified token.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Claims {
    pub subject_id: SubjectId,
    pub role: Option<Role>,
    pub expires_at: DateTime<Utc>,
    pub audience_id: Option<AudienceId>,
    pub kind: TokenKind,
}

impl Claims {
    /// Every field the token kind requires is present and non-empty.
    pub fn is_complete(&self) -> bool {
        let role_matches_kind = match self.kind {
            TokenKind::Access => self.role.is_some(),
            TokenKind::Refresh => self.role.is_none(),
        };
        let audience_ok = self
            .audience_id
            .as_ref()
            .is_none_or(|aid| !aid.as_str().is_empty());

        !self.subject_id.is_nil() && self.expires_at.timestamp() != 0 && role_matches_kind && audience_ok
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
