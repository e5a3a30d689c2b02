use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of the calling application (the `app_id` a client logs in through).
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudienceId(pub String);

impl AudienceId {
    pub fn new(id: impl Into<String>) -> Self {
        AudienceId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AudienceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
