use crate::domain_model::*;
use crate::domain_port::{CredentialStore, CredentialStoreError};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Credential store kept in process memory, for development and tests.
///
/// It can be told to fail or to answer slowly, so callers' outage handling can
/// be exercised.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    by_id: DashMap<SubjectId, Credential>,
    by_email: DashMap<String, SubjectId>,
    unavailable: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: impl IntoIterator<Item = Credential>) -> Self {
        let store = Self::new();
        for credential in credentials {
            store.by_email.insert(credential.email.clone(), credential.id);
            store.by_id.insert(credential.id, credential);
        }
        store
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut slot) = self.latency.lock() {
            *slot = latency;
        }
    }

    /// Change a stored role, as an administrator would through the user service.
    pub fn set_role(&self, id: SubjectId, role: Role) -> bool {
        match self.by_id.get_mut(&id) {
            Some(mut credential) => {
                credential.role = role;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, id: SubjectId) {
        if let Some((_, credential)) = self.by_id.remove(&id) {
            self.by_email.remove(&credential.email);
        }
    }

    async fn simulate_remote(&self) -> Result<(), CredentialStoreError> {
        let latency = self.latency.lock().ok().and_then(|slot| *slot);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CredentialStoreError::Unavailable(
                "in-memory store switched off".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Credential, CredentialStoreError> {
        self.simulate_remote().await?;
        let id = self
            .by_email
            .get(email)
            .map(|entry| *entry.value())
            .ok_or(CredentialStoreError::NotFound)?;
        self.by_id
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(CredentialStoreError::NotFound)
    }

    async fn find_by_id(&self, id: SubjectId) -> Result<Credential, CredentialStoreError> {
        self.simulate_remote().await?;
        self.by_id
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(CredentialStoreError::NotFound)
    }

    async fn exists(&self, email: &str) -> Result<bool, CredentialStoreError> {
        self.simulate_remote().await?;
        Ok(self.by_email.contains_key(email))
    }

    async fn create(&self, credential: Credential) -> Result<SubjectId, CredentialStoreError> {
        self.simulate_remote().await?;
        match self.by_email.entry(credential.email.clone()) {
            Entry::Occupied(_) => Err(CredentialStoreError::AlreadyExists),
            Entry::Vacant(vacant) => {
                let id = credential.id;
                vacant.insert(id);
                self.by_id.insert(id, credential);
                Ok(id)
            }
        }
    }
}
