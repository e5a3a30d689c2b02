use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::{CredentialStore, CredentialStoreError, SessionCache};
use crate::logger::*;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct TokenPolicy {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

pub(crate) fn encoding_failure(err: CodecError) -> AuthError {
    error!("token issuance failed: {}", err);
    AuthError::Internal(err.to_string())
}

/// Checks email + password and opens a session on success.
pub struct CredentialVerifier {
    store: Arc<dyn CredentialStore>,
    hasher: Arc<dyn CredentialHasher>,
    codec: Arc<dyn TokenCodec>,
    sessions: Arc<dyn SessionCache>,
    policy: TokenPolicy,
}

impl CredentialVerifier {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: Arc<dyn CredentialHasher>,
        codec: Arc<dyn TokenCodec>,
        sessions: Arc<dyn SessionCache>,
        policy: TokenPolicy,
    ) -> Self {
        Self {
            store,
            hasher,
            codec,
            sessions,
            policy,
        }
    }

    pub async fn login(&self, ctx: &CallContext, input: LoginInput) -> Result<LoginResult, AuthError> {
        let LoginInput {
            email,
            password,
            audience_id,
        } = input;
        info!(%email, "attempt to login");

        let credential = ctx
            .guard(async {
                self.store.find_by_email(&email).await.map_err(|e| match e {
                    CredentialStoreError::NotFound => AuthError::InvalidCredentials,
                    other => AuthError::from_store(other),
                })
            })
            .await
            .inspect_err(|e| match e {
                AuthError::InvalidCredentials => warn!(%email, "login for unknown email"),
                other => warn!(%email, "credential lookup failed: {}", other),
            })?;

        let password_ok = self
            .hasher
            .verify_password(&password, &credential.password)
            .await?;
        if !password_ok {
            warn!(%email, "login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        ctx.ensure_live()?;

        let access = self
            .codec
            .issue(
                Grant::access(credential.id, credential.role, audience_id.clone()),
                self.policy.access_ttl,
            )
            .map_err(encoding_failure)?;
        let refresh = self
            .codec
            .issue(
                Grant::refresh(credential.id, audience_id),
                self.policy.refresh_ttl,
            )
            .map_err(encoding_failure)?;

        let refresh_token = RefreshToken(refresh.token);
        self.sessions.put(credential.id, refresh_token.clone());

        info!(%email, subject_id = %credential.id, role = %credential.role, "login succeeded");

        Ok(LoginResult {
            subject_id: credential.id,
            role: credential.role,
            tokens: AuthTokens {
                access_token: AccessToken(access.token),
                refresh_token,
                access_token_expires_at: access.claims.expires_at,
                refresh_token_expires_at: refresh.claims.expires_at,
            },
        })
    }

    pub async fn register(
        &self,
        ctx: &CallContext,
        credential: NewCredential,
    ) -> Result<SubjectId, AuthError> {
        credential
            .validate()
            .map_err(|e| AuthError::InvalidInput(e.to_string()))?;
        let email = credential.email.clone();

        let exists = ctx
            .guard(async { self.store.exists(&email).await.map_err(AuthError::from_store) })
            .await?;
        if exists {
            warn!(%email, "user already exists");
            return Err(AuthError::AlreadyExists);
        }

        let stored_password = self.hasher.hash_password(&credential.password).await?;
        let id = SubjectId::generate();
        let record = credential.into_credential(id, stored_password);

        let id = ctx
            .guard(async { self.store.create(record).await.map_err(AuthError::from_store) })
            .await
            .inspect_err(|e| warn!(%email, "failed to save user: {}", e))?;

        info!(%email, subject_id = %id, "registration succeeded");
        Ok(id)
    }
}
