use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::logger::*;
use crate::settings::{Backend, PasswordScheme, Settings};
use anyhow::anyhow;
use sqlx::{MySql, Pool};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pub gate: Arc<AccessGate>,
    pub request_timeout: Duration,
    pub cors_origins: Vec<String>,
    cancel: CancellationToken,
    pool: Option<Pool<MySql>>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let hasher = password_hasher(settings.auth.password_scheme);

        let (store, pool): (Arc<dyn CredentialStore>, Option<Pool<MySql>>) = match settings.credential_store.backend {
            Backend::Memory => {
                let mut seed = Vec::with_capacity(settings.credential_store.seed.len());
                for user in &settings.credential_store.seed {
                    let password = hasher
                        .hash_password(user.password.expose())
                        .await
                        .map_err(|e| anyhow!("hashing seed password for {}: {}", user.email, e))?;
                    seed.push(Credential {
                        id: SubjectId::generate(),
                        email: user.email.clone(),
                        password,
                        role: user.role,
                        nick: user.nick.clone(),
                        birthday: None,
                    });
                }
                info!(seeded = seed.len(), "using in-memory credential store");
                let store: Arc<dyn CredentialStore> =
                    Arc::new(InMemoryCredentialStore::with_credentials(seed));
                (store, None)
            }
            Backend::Mysql => {
                let dsn = settings
                    .credential_store
                    .dsn
                    .as_ref()
                    .ok_or_else(|| anyhow!("credential_store.dsn is required for mysql"))?;
                let pool = Pool::<MySql>::connect(dsn.expose()).await?;
                info!("using mysql credential store");
                let store: Arc<dyn CredentialStore> =
                    Arc::new(MySqlCredentialStore::new(pool.clone()));
                (store, Some(pool))
            }
        };

        let mut server = Self::assemble(settings, store, Arc::new(SystemClock))?;
        server.pool = pool;

        info!("server started");
        Ok(server)
    }

    /// Wire the service around an explicit store and clock.
    pub fn assemble(
        settings: &Settings,
        store: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        settings.validate()?;
        let auth = &settings.auth;

        let mut keys = SigningKeys::new(auth.signing_key.expose())?;
        for audience in &auth.audiences {
            keys = keys.with_audience(
                AudienceId::new(audience.id.clone()),
                audience.signing_key.expose(),
            )?;
        }
        let codec: Arc<dyn TokenCodec> = Arc::new(JwtHs256Codec::new(keys, clock.clone()));
        let sessions: Arc<dyn SessionCache> = Arc::new(InMemorySessionCache::new());

        let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            store.clone(),
            password_hasher(auth.password_scheme),
            codec.clone(),
            sessions.clone(),
            clock,
            TokenPolicy {
                access_ttl: auth.access_ttl(),
                refresh_ttl: auth.refresh_ttl(),
            },
            SessionPolicy {
                rotate_refresh_tokens: auth.rotate_refresh_tokens,
                require_live_session: auth.require_live_session,
            },
        ));

        let mut gate = AccessGate::new(codec, sessions);
        if settings.gate.revalidate_role {
            gate = gate.with_role_revalidation(RoleRevalidation {
                store,
                timeout: settings.gate.revalidate_timeout(),
            });
        }

        debug!(
            access_ttl_secs = auth.access_ttl_secs,
            refresh_ttl_secs = auth.refresh_ttl_secs,
            audiences = auth.audiences.len(),
            revalidate_role = settings.gate.revalidate_role,
            "auth core assembled"
        );

        Ok(Self {
            auth_service,
            gate: Arc::new(gate),
            request_timeout: settings.http.request_timeout(),
            cors_origins: settings.http.cors.allowed_origins.clone(),
            cancel: CancellationToken::new(),
            pool: None,
        })
    }

    /// Context for one request: child of the shutdown token, bounded by the request timeout.
    /// A timeout past the clock's range leaves the request without a deadline.
    pub fn call_context(&self) -> CallContext {
        CallContext::new(
            self.cancel.child_token(),
            tokio::time::Instant::now().checked_add(self.request_timeout),
        )
    }

    pub fn is_shutting_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.cancel.cancel();

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}

fn password_hasher(scheme: PasswordScheme) -> Arc<dyn CredentialHasher> {
    match scheme {
        PasswordScheme::Plain => Arc::new(PlaintextPasswordHasher),
        PasswordScheme::Argon2 => Arc::new(Argon2PasswordHasher),
    }
}
