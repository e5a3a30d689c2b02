use crate::domain_model::*;

#[derive(Debug, thiserror::Error)]
pub enum CredentialStoreError {
    #[error("credential not found")]
    NotFound,
    #[error("credential already exists")]
    AlreadyExists,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Read/create access to user credentials. Lookups are by key only.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Credential, CredentialStoreError>;

    async fn find_by_id(&self, id: SubjectId) -> Result<Credential, CredentialStoreError>;

    async fn exists(&self, email: &str) -> Result<bool, CredentialStoreError>;

    /// Persist a new credential. Fails with `AlreadyExists` on an email clash.
    async fn create(&self, credential: Credential) -> Result<SubjectId, CredentialStoreError>;
}
