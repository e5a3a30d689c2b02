use crate::domain_model::Role;
use anyhow::{Result, anyhow, bail};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub http: Http,
    pub log: Log,
    pub auth: Auth,
    #[serde(default)]
    pub gate: Gate,
    pub credential_store: Store,
}

/// A configured secret. Deserializes from a plain string, never prints it.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<redacted>")
    }
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
    /// Plain HTTP when absent.
    pub tls: Option<Tls>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub cors: Cors,
}

#[derive(Debug, Deserialize)]
pub struct Tls {
    pub cert_path: String,
    pub key_path: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Cors {
    /// Empty means any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct Auth {
    #[serde(default = "default_access_ttl_secs")]
    pub access_ttl_secs: u64,
    #[serde(default = "default_refresh_ttl_secs")]
    pub refresh_ttl_secs: u64,
    pub signing_key: Secret,
    #[serde(default)]
    pub audiences: Vec<Audience>,
    #[serde(default)]
    pub rotate_refresh_tokens: bool,
    #[serde(default)]
    pub require_live_session: bool,
    #[serde(default)]
    pub password_scheme: PasswordScheme,
}

#[derive(Debug, Deserialize)]
pub struct Audience {
    pub id: String,
    pub signing_key: Secret,
}

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordScheme {
    #[default]
    Plain,
    Argon2,
}

#[derive(Debug, Deserialize)]
pub struct Gate {
    #[serde(default)]
    pub revalidate_role: bool,
    #[serde(default = "default_revalidate_timeout_ms")]
    pub revalidate_timeout_ms: u64,
}

impl Default for Gate {
    fn default() -> Self {
        Gate {
            revalidate_role: false,
            revalidate_timeout_ms: default_revalidate_timeout_ms(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Store {
    pub backend: Backend,
    pub dsn: Option<Secret>,
    /// Accounts loaded into the memory backend at startup.
    #[serde(default)]
    pub seed: Vec<SeedUser>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Memory,
    Mysql,
}

#[derive(Debug, Deserialize)]
pub struct SeedUser {
    pub email: String,
    pub password: Secret,
    #[serde(default = "default_seed_role")]
    pub role: Role,
    pub nick: String,
}

const MAX_REQUEST_TIMEOUT_MS: u64 = 60 * 60 * 1000;

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_access_ttl_secs() -> u64 {
    15 * 60
}

fn default_refresh_ttl_secs() -> u64 {
    5 * 60 * 60
}

fn default_revalidate_timeout_ms() -> u64 {
    500
}

fn default_seed_role() -> Role {
    Role::User
}

impl Http {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Auth {
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_secs)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_secs)
    }
}

impl Gate {
    pub fn revalidate_timeout(&self) -> Duration {
        Duration::from_millis(self.revalidate_timeout_ms)
    }
}

impl Settings {
    /// Reject values that would only fail later, at the first request.
    pub fn validate(&self) -> Result<()> {
        if self.auth.access_ttl_secs == 0 || self.auth.refresh_ttl_secs == 0 {
            bail!("auth: token TTLs must be at least one second");
        }
        if self.auth.signing_key.expose().is_empty() {
            bail!("auth.signing_key must not be empty");
        }
        if let Some(audience) = self
            .auth
            .audiences
            .iter()
            .find(|a| a.id.is_empty() || a.signing_key.expose().is_empty())
        {
            bail!("auth.audiences: incomplete entry {:?}", audience.id);
        }
        if self.http.request_timeout_ms == 0 || self.http.request_timeout_ms > MAX_REQUEST_TIMEOUT_MS {
            bail!(
                "http.request_timeout_ms must be between 1 and {}",
                MAX_REQUEST_TIMEOUT_MS
            );
        }
        if self.credential_store.backend == Backend::Mysql && self.credential_store.dsn.is_none() {
            bail!("credential_store.dsn is required for the mysql backend");
        }
        Ok(())
    }
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

const ENV_PREFIX: &str = "PORTCULLIS";

/// Settings file, then `PORTCULLIS__SECTION__KEY` environment overrides.
pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    settings.validate()?;
    Ok(settings)
}

/// Parse TOML text without consulting the environment.
pub fn parse_settings_str(toml: &str) -> Result<Settings> {
    let settings: Settings = Config::builder()
        .add_source(File::from_str(toml, FileFormat::Toml))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    settings.validate()?;
    Ok(settings)
}
