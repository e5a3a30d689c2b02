use super::{CredentialVerifier, TokenPolicy, constant_time_eq, encoding_failure};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::{Clock, CredentialStore, CredentialStoreError, SessionCache, SessionState};
use crate::logger::*;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionPolicy {
    /// Replace the refresh token on every refresh instead of reusing it.
    pub rotate_refresh_tokens: bool,
    /// Refuse to refresh when the subject has no cached session, such as after
    /// the gate cleared it on access-token expiry.
    pub require_live_session: bool,
}

/// Login, registration, refresh and logout over one shared session cache.
pub struct RealAuthService {
    verifier: CredentialVerifier,
    store: Arc<dyn CredentialStore>,
    codec: Arc<dyn TokenCodec>,
    sessions: Arc<dyn SessionCache>,
    clock: Arc<dyn Clock>,
    token_policy: TokenPolicy,
    session_policy: SessionPolicy,
}

impl RealAuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: Arc<dyn CredentialHasher>,
        codec: Arc<dyn TokenCodec>,
        sessions: Arc<dyn SessionCache>,
        clock: Arc<dyn Clock>,
        token_policy: TokenPolicy,
        session_policy: SessionPolicy,
    ) -> Self {
        let verifier = CredentialVerifier::new(
            store.clone(),
            hasher,
            codec.clone(),
            sessions.clone(),
            token_policy,
        );
        Self {
            verifier,
            store,
            codec,
            sessions,
            clock,
            token_policy,
            session_policy,
        }
    }

    /// Latest expiry a refresh token issued up to now can carry.
    fn revocation_horizon(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.token_policy.refresh_ttl)
            .ok()
            .and_then(|ttl| self.clock.now().checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn verify_refresh(&self, token: &RefreshToken) -> Result<Claims, AuthError> {
        let claims = match self.codec.verify(token.as_str()) {
            Ok(claims) => claims,
            Err(CodecError::Expired(_)) => {
                return Err(AuthError::Unauthenticated(UnauthenticatedReason::Expired));
            }
            Err(e) => {
                debug!("refresh token rejected: {}", e);
                return Err(AuthError::Unauthenticated(UnauthenticatedReason::InvalidToken));
            }
        };
        if claims.kind != TokenKind::Refresh || !claims.is_complete() {
            return Err(AuthError::Unauthenticated(UnauthenticatedReason::InvalidToken));
        }
        Ok(claims)
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn login(&self, ctx: &CallContext, input: LoginInput) -> Result<LoginResult, AuthError> {
        self.verifier.login(ctx, input).await
    }

    async fn register(&self, ctx: &CallContext, credential: NewCredential) -> Result<SubjectId, AuthError> {
        self.verifier.register(ctx, credential).await
    }

    async fn refresh(&self, ctx: &CallContext, refresh_token: &RefreshToken) -> Result<AuthTokens, AuthError> {
        ctx.ensure_live()?;
        let claims = self.verify_refresh(refresh_token)?;
        let subject_id = claims.subject_id;

        let current = self.sessions.get(subject_id);
        match &current {
            Some(SessionState::Live(current))
                if !constant_time_eq(current.as_str().as_bytes(), refresh_token.as_str().as_bytes()) =>
            {
                info!(%subject_id, "refresh with superseded token");
                return Err(AuthError::Unauthenticated(UnauthenticatedReason::SessionSuperseded));
            }
            Some(SessionState::Revoked { until }) if *until > self.clock.now() => {
                info!(%subject_id, "refresh after session was revoked");
                return Err(AuthError::Unauthenticated(UnauthenticatedReason::Revoked));
            }
            Some(SessionState::Live(_)) => {}
            // gate cleanup, or a revocation every earlier token has outlived
            _ if self.session_policy.require_live_session => {
                info!(%subject_id, "refresh without a live session");
                return Err(AuthError::Unauthenticated(UnauthenticatedReason::SessionSuperseded));
            }
            _ => {}
        }

        // role is not in the refresh token; the store is authoritative
        let credential = ctx
            .guard(async {
                self.store.find_by_id(subject_id).await.map_err(|e| match e {
                    CredentialStoreError::NotFound => {
                        AuthError::Unauthenticated(UnauthenticatedReason::InvalidToken)
                    }
                    other => AuthError::from_store(other),
                })
            })
            .await?;

        ctx.ensure_live()?;

        let access = self
            .codec
            .issue(
                Grant::access(subject_id, credential.role, claims.audience_id.clone()),
                self.token_policy.access_ttl,
            )
            .map_err(encoding_failure)?;

        let (next_refresh, refresh_expires_at) = if self.session_policy.rotate_refresh_tokens {
            let issued = self
                .codec
                .issue(
                    Grant::refresh(subject_id, claims.audience_id),
                    self.token_policy.refresh_ttl,
                )
                .map_err(encoding_failure)?;
            (RefreshToken(issued.token), issued.claims.expires_at)
        } else {
            (refresh_token.clone(), claims.expires_at)
        };

        // a login may have replaced the session while we were at the store
        if !self
            .sessions
            .compare_and_swap(subject_id, current.as_ref(), next_refresh.clone())
        {
            info!(%subject_id, "session replaced during refresh");
            return Err(AuthError::Unauthenticated(UnauthenticatedReason::SessionSuperseded));
        }

        info!(%subject_id, rotated = self.session_policy.rotate_refresh_tokens, "token refreshed");

        Ok(AuthTokens {
            access_token: AccessToken(access.token),
            refresh_token: next_refresh,
            access_token_expires_at: access.claims.expires_at,
            refresh_token_expires_at: refresh_expires_at,
        })
    }

    fn logout(&self, subject_id: SubjectId) {
        let until = self.revocation_horizon();
        self.sessions.revoke(subject_id, until);
        info!(%subject_id, %until, "session ended");
    }
}
