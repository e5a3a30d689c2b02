use super::CallContext;
use crate::domain_model::*;
use crate::domain_port::CredentialStoreError;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum UnauthenticatedReason {
    MissingToken,
    InvalidToken,
    Expired,
    SessionSuperseded,
    /// The session was ended by logout or an administrator.
    Revoked,
    StaleRole,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ForbiddenReason {
    InsufficientRole,
    AlreadyLoggedIn,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("already exists")]
    AlreadyExists,
    #[error("unauthenticated: {0:?}")]
    Unauthenticated(UnauthenticatedReason),
    #[error("forbidden: {0:?}")]
    Forbidden(ForbiddenReason),
    #[error("credential store unavailable: {0}")]
    Unavailable(String),
    #[error("request cancelled")]
    Cancelled,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Store failure outside of a lookup whose `NotFound` carries meaning.
    pub fn from_store(err: CredentialStoreError) -> Self {
        match err {
            CredentialStoreError::AlreadyExists => AuthError::AlreadyExists,
            CredentialStoreError::NotFound => AuthError::Unavailable("unexpected not found".to_string()),
            CredentialStoreError::Unavailable(e) => AuthError::Unavailable(e),
        }
    }
}

#[derive(Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
    pub audience_id: Option<AudienceId>,
}

impl std::fmt::Debug for LoginInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginInput")
            .field("email", &self.email)
            .field("audience_id", &self.audience_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub subject_id: SubjectId,
    pub role: Role,
    pub tokens: AuthTokens,
}

/// The single point where a supplied password meets the stored one.
#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, stored: &str) -> Result<bool, AuthError>;
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn login(&self, ctx: &CallContext, input: LoginInput) -> Result<LoginResult, AuthError>;

    async fn register(&self, ctx: &CallContext, credential: NewCredential) -> Result<SubjectId, AuthError>;

    async fn refresh(&self, ctx: &CallContext, refresh_token: &RefreshToken) -> Result<AuthTokens, AuthError>;

    /// End the subject's session. Calling it again is a no-op.
    fn logout(&self, subject_id: SubjectId);
}
