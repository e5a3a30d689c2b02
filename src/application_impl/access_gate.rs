use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::{CredentialStore, CredentialStoreError, SessionCache};
use crate::logger::*;
use std::sync::Arc;
use std::time::Duration;

/// Cross-check of the token's role against the credential store.
pub struct RoleRevalidation {
    pub store: Arc<dyn CredentialStore>,
    pub timeout: Duration,
}

/// Admission checks for protected routes, applied in a fixed order:
/// presence, signature, liveness, (optional) role re-validation, role
/// membership. The first failing check decides the verdict.
pub struct AccessGate {
    codec: Arc<dyn TokenCodec>,
    sessions: Arc<dyn SessionCache>,
    revalidation: Option<RoleRevalidation>,
}

impl AccessGate {
    pub fn new(codec: Arc<dyn TokenCodec>, sessions: Arc<dyn SessionCache>) -> Self {
        Self {
            codec,
            sessions,
            revalidation: None,
        }
    }

    pub fn with_role_revalidation(mut self, revalidation: RoleRevalidation) -> Self {
        self.revalidation = Some(revalidation);
        self
    }

    /// Extract the token from an `Authorization` header value.
    pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
        let missing = AuthError::Unauthenticated(UnauthenticatedReason::MissingToken);
        let (scheme, token) = header.and_then(|h| h.trim().split_once(' ')).ok_or(missing)?;
        let token = token.trim();
        if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
            return Err(AuthError::Unauthenticated(UnauthenticatedReason::MissingToken));
        }
        Ok(token)
    }

    /// Signature and liveness. An expired access token ends its session.
    pub fn authenticate(&self, token: &str) -> Result<AuthContext, AuthError> {
        let invalid = AuthError::Unauthenticated(UnauthenticatedReason::InvalidToken);

        let claims = match self.codec.verify(token) {
            Ok(claims) => claims,
            Err(CodecError::Expired(claims)) if claims.kind == TokenKind::Access => {
                self.sessions.delete(claims.subject_id);
                debug!(subject_id = %claims.subject_id, "access token expired, session dropped");
                return Err(AuthError::Unauthenticated(UnauthenticatedReason::Expired));
            }
            Err(e) => {
                debug!("token rejected: {}", e);
                return Err(invalid);
            }
        };

        if claims.kind != TokenKind::Access || !claims.is_complete() {
            debug!(subject_id = %claims.subject_id, "non-access token presented");
            return Err(invalid);
        }
        let role = claims.role.ok_or(invalid)?;
        Ok(AuthContext::new(claims, role))
    }

    pub async fn revalidate(&self, ctx: &CallContext, auth: &AuthContext) -> Result<(), AuthError> {
        let Some(revalidation) = &self.revalidation else {
            return Ok(());
        };
        let subject_id = auth.subject_id();

        let lookup = async {
            match tokio::time::timeout(revalidation.timeout, revalidation.store.find_by_id(subject_id)).await {
                Ok(Ok(credential)) => Ok(Some(credential)),
                Ok(Err(CredentialStoreError::NotFound)) => Ok(None),
                Ok(Err(e)) => Err(AuthError::from_store(e)),
                Err(_) => Err(AuthError::Unavailable("role lookup timed out".to_string())),
            }
        };
        let stored = ctx
            .guard(lookup)
            .await
            .inspect_err(|e| warn!(%subject_id, "role re-validation failed: {}", e))?;

        match stored {
            Some(credential) if credential.role == auth.role() => Ok(()),
            _ => {
                info!(%subject_id, "token role no longer matches the store");
                Err(AuthError::Unauthenticated(UnauthenticatedReason::StaleRole))
            }
        }
    }

    pub fn authorize(auth: &AuthContext, requirement: &RoleRequirement) -> Result<(), AuthError> {
        if requirement.admits(auth.role()) {
            Ok(())
        } else {
            debug!(subject_id = %auth.subject_id(), role = %auth.role(), ?requirement, "role not admitted");
            Err(AuthError::Forbidden(ForbiddenReason::InsufficientRole))
        }
    }

    pub async fn admit(
        &self,
        ctx: &CallContext,
        authorization: Option<&str>,
        requirement: &RoleRequirement,
    ) -> Result<AuthContext, AuthError> {
        let token = Self::bearer_token(authorization)?;
        let auth = self.authenticate(token)?;
        self.revalidate(ctx, &auth).await?;
        Self::authorize(&auth, requirement)?;
        Ok(auth)
    }

    /// Login and registration are closed to callers holding a live token,
    /// access or refresh. Missing, forged and expired tokens let the request through.
    pub fn prevent_if_authenticated(&self, authorization: Option<&str>) -> Result<(), AuthError> {
        let Ok(token) = Self::bearer_token(authorization) else {
            return Ok(());
        };
        match self.codec.verify(token) {
            Ok(_) => Err(AuthError::Forbidden(ForbiddenReason::AlreadyLoggedIn)),
            Err(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::{JwtHs256Codec, SigningKeys};
    use crate::domain_port::{Clock, SessionState};
    use crate::infra_memory::{InMemoryCredentialStore, InMemorySessionCache, ManualClock};

    const TTL: Duration = Duration::from_secs(15 * 60);

    struct Fixture {
        gate: AccessGate,
        codec: Arc<JwtHs256Codec>,
        sessions: Arc<InMemorySessionCache>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::starting_now());
        let codec = Arc::new(JwtHs256Codec::new(
            SigningKeys::new("gate-secret").unwrap(),
            clock.clone(),
        ));
        let sessions = Arc::new(InMemorySessionCache::new());
        let gate = AccessGate::new(codec.clone(), sessions.clone());
        Fixture {
            gate,
            codec,
            sessions,
            clock,
        }
    }

    fn bearer(token: &str) -> String {
        format!("Bearer {}", token)
    }

    fn access_token(codec: &JwtHs256Codec, subject_id: SubjectId, role: Role) -> String {
        codec.issue(Grant::access(subject_id, role, None), TTL).unwrap().token
    }

    fn credential(id: SubjectId, role: Role) -> Credential {
        Credential {
            id,
            email: "admin@example.com".to_string(),
            password: "pw".to_string(),
            role,
            nick: "admin".to_string(),
            birthday: None,
        }
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(AccessGate::bearer_token(Some("Bearer abc")).unwrap(), "abc");
        assert_eq!(AccessGate::bearer_token(Some("bearer  abc ")).unwrap(), "abc");

        for header in [None, Some(""), Some("Bearer"), Some("Bearer   "), Some("Basic abc")] {
            assert!(matches!(
                AccessGate::bearer_token(header),
                Err(AuthError::Unauthenticated(UnauthenticatedReason::MissingToken))
            ));
        }
    }

    #[tokio::test]
    async fn test_admits_matching_role() {
        let f = fixture();
        let subject_id = SubjectId::generate();
        let header = bearer(&access_token(&f.codec, subject_id, Role::UserAdmin));

        let auth = f
            .gate
            .admit(
                &CallContext::default(),
                Some(&header),
                &RoleRequirement::only(Role::UserAdmin),
            )
            .await
            .unwrap();

        assert_eq!(auth.subject_id(), subject_id);
        assert_eq!(auth.role(), Role::UserAdmin);
        assert_eq!(auth.claims().kind, TokenKind::Access);
    }

    #[tokio::test]
    async fn test_wrong_role_is_forbidden() {
        let f = fixture();
        let header = bearer(&access_token(&f.codec, SubjectId::generate(), Role::User));

        let result = f
            .gate
            .admit(
                &CallContext::default(),
                Some(&header),
                &RoleRequirement::only(Role::UserAdmin),
            )
            .await;

        assert!(matches!(
            result,
            Err(AuthError::Forbidden(ForbiddenReason::InsufficientRole))
        ));
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthenticated() {
        let f = fixture();
        let result = f
            .gate
            .admit(&CallContext::default(), None, &RoleRequirement::Authenticated)
            .await;
        assert!(matches!(
            result,
            Err(AuthError::Unauthenticated(UnauthenticatedReason::MissingToken))
        ));
    }

    #[tokio::test]
    async fn test_forged_signature_checked_before_role() {
        let f = fixture();
        let other = JwtHs256Codec::new(SigningKeys::new("attacker-secret").unwrap(), f.clock.clone());
        let forged = bearer(&access_token(&other, SubjectId::generate(), Role::User));

        let result = f
            .gate
            .admit(
                &CallContext::default(),
                Some(&forged),
                &RoleRequirement::only(Role::Admin),
            )
            .await;

        assert!(matches!(
            result,
            Err(AuthError::Unauthenticated(UnauthenticatedReason::InvalidToken))
        ));
    }

    #[tokio::test]
    async fn test_expired_token_drops_session() {
        let f = fixture();
        let subject_id = SubjectId::generate();
        f.sessions.put(subject_id, RefreshToken("refresh".to_string()));
        let header = bearer(&access_token(&f.codec, subject_id, Role::User));

        f.clock.advance(chrono::Duration::minutes(16));
        let result = f
            .gate
            .admit(&CallContext::default(), Some(&header), &RoleRequirement::Authenticated)
            .await;

        assert!(matches!(
            result,
            Err(AuthError::Unauthenticated(UnauthenticatedReason::Expired))
        ));
        assert_eq!(f.sessions.get(subject_id), None);
    }

    #[tokio::test]
    async fn test_expired_token_keeps_revocation() {
        let f = fixture();
        let subject_id = SubjectId::generate();
        let until = f.clock.now() + chrono::Duration::hours(5);
        f.sessions.revoke(subject_id, until);
        let header = bearer(&access_token(&f.codec, subject_id, Role::User));

        f.clock.advance(chrono::Duration::minutes(16));
        let _ = f
            .gate
            .admit(&CallContext::default(), Some(&header), &RoleRequirement::Authenticated)
            .await;

        assert_eq!(f.sessions.get(subject_id), Some(SessionState::Revoked { until }));
    }

    #[tokio::test]
    async fn test_refresh_token_is_not_an_access_token() {
        let f = fixture();
        let subject_id = SubjectId::generate();
        f.sessions.put(subject_id, RefreshToken("refresh".to_string()));
        let refresh = f
            .codec
            .issue(Grant::refresh(subject_id, None), TTL)
            .unwrap()
            .token;

        let result = f
            .gate
            .admit(&CallContext::default(), Some(&bearer(&refresh)), &RoleRequirement::Authenticated)
            .await;
        assert!(matches!(
            result,
            Err(AuthError::Unauthenticated(UnauthenticatedReason::InvalidToken))
        ));

        // an expired refresh token does not touch the session either
        f.clock.advance(chrono::Duration::minutes(16));
        let _ = f
            .gate
            .admit(&CallContext::default(), Some(&bearer(&refresh)), &RoleRequirement::Authenticated)
            .await;
        assert!(f.sessions.get(subject_id).is_some());
    }

    #[test]
    fn test_prevent_if_authenticated() {
        let f = fixture();
        let header = bearer(&access_token(&f.codec, SubjectId::generate(), Role::User));

        assert!(matches!(
            f.gate.prevent_if_authenticated(Some(&header)),
            Err(AuthError::Forbidden(ForbiddenReason::AlreadyLoggedIn))
        ));
        assert!(f.gate.prevent_if_authenticated(None).is_ok());
        assert!(f.gate.prevent_if_authenticated(Some("Bearer garbage")).is_ok());

        f.clock.advance(chrono::Duration::minutes(16));
        assert!(f.gate.prevent_if_authenticated(Some(&header)).is_ok());
    }

    #[test]
    fn test_prevent_if_authenticated_counts_refresh_tokens() {
        let f = fixture();
        let refresh = f
            .codec
            .issue(Grant::refresh(SubjectId::generate(), None), TTL)
            .unwrap()
            .token;

        assert!(matches!(
            f.gate.prevent_if_authenticated(Some(&bearer(&refresh))),
            Err(AuthError::Forbidden(ForbiddenReason::AlreadyLoggedIn))
        ));

        f.clock.advance(chrono::Duration::minutes(16));
        assert!(f.gate.prevent_if_authenticated(Some(&bearer(&refresh))).is_ok());
    }

    #[tokio::test]
    async fn test_revalidation_accepts_current_role() {
        let f = fixture();
        let subject_id = SubjectId::generate();
        let store = Arc::new(InMemoryCredentialStore::with_credentials([credential(
            subject_id,
            Role::Admin,
        )]));
        let gate = AccessGate::new(f.codec.clone(), f.sessions.clone()).with_role_revalidation(
            RoleRevalidation {
                store,
                timeout: Duration::from_secs(1),
            },
        );
        let header = bearer(&access_token(&f.codec, subject_id, Role::Admin));

        let auth = gate
            .admit(&CallContext::default(), Some(&header), &RoleRequirement::only(Role::Admin))
            .await
            .unwrap();
        assert_eq!(auth.role(), Role::Admin);
    }

    #[tokio::test]
    async fn test_revalidation_rejects_stale_role() {
        let f = fixture();
        let subject_id = SubjectId::generate();
        let store = Arc::new(InMemoryCredentialStore::with_credentials([credential(
            subject_id,
            Role::User,
        )]));
        let gate = AccessGate::new(f.codec.clone(), f.sessions.clone()).with_role_revalidation(
            RoleRevalidation {
                store,
                timeout: Duration::from_secs(1),
            },
        );
        let header = bearer(&access_token(&f.codec, subject_id, Role::Admin));

        let result = gate
            .admit(&CallContext::default(), Some(&header), &RoleRequirement::only(Role::Admin))
            .await;
        assert!(matches!(
            result,
            Err(AuthError::Unauthenticated(UnauthenticatedReason::StaleRole))
        ));
    }

    #[tokio::test]
    async fn test_revalidation_fails_closed() {
        let f = fixture();
        let subject_id = SubjectId::generate();
        let store = Arc::new(InMemoryCredentialStore::with_credentials([credential(
            subject_id,
            Role::Admin,
        )]));
        let gate = AccessGate::new(f.codec.clone(), f.sessions.clone()).with_role_revalidation(
            RoleRevalidation {
                store: store.clone(),
                timeout: Duration::from_millis(50),
            },
        );
        let header = bearer(&access_token(&f.codec, subject_id, Role::Admin));
        let requirement = RoleRequirement::only(Role::Admin);

        store.set_unavailable(true);
        let down = gate.admit(&CallContext::default(), Some(&header), &requirement).await;
        assert!(matches!(down, Err(AuthError::Unavailable(_))));

        store.set_unavailable(false);
        store.set_latency(Some(Duration::from_secs(5)));
        let slow = gate.admit(&CallContext::default(), Some(&header), &requirement).await;
        assert!(matches!(slow, Err(AuthError::Unavailable(_))));
    }
}
