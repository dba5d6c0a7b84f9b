//! Process configuration loaded from the environment.

use thiserror::Error;

pub const DATABASE_URL: &str = "ATELIER_DATABASE_URL";
pub const DB_MAX_CONNECTIONS: &str = "ATELIER_DB_MAX_CONNECTIONS";
pub const JWT_SECRET: &str = "ATELIER_JWT_SECRET";
pub const ALLOW_INSECURE_DEV_SECRET: &str = "ATELIER_ALLOW_INSECURE_DEV_SECRET";

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEV_JWT_SECRET: &str = "atelier-dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone, PartialEq, Eq)]
pub struct AtelierConfig {
    /// Postgres URL; `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// HS256 shared secret for bearer tokens.
    pub jwt_secret: String,
}

impl AtelierConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let max_connections = match get(DB_MAX_CONNECTIONS) {
            None => DEFAULT_MAX_CONNECTIONS,
            Some(raw) => match raw.parse::<u32>() {
                Ok(0) => {
                    return Err(ConfigError::Invalid {
                        key: DB_MAX_CONNECTIONS,
                        value: raw,
                        reason: "must be at least 1".to_string(),
                    });
                }
                Ok(n) => n,
                Err(e) => {
                    return Err(ConfigError::Invalid {
                        key: DB_MAX_CONNECTIONS,
                        value: raw,
                        reason: e.to_string(),
                    });
                }
            },
        };

        let jwt_secret = match get(JWT_SECRET) {
            Some(secret) => secret,
            None if flag_enabled(get(ALLOW_INSECURE_DEV_SECRET).as_deref()) => {
                tracing::warn!("{JWT_SECRET} not set; using insecure dev default");
                DEV_JWT_SECRET.to_string()
            }
            None => return Err(ConfigError::Missing(JWT_SECRET)),
        };

        Ok(Self {
            database_url: get(DATABASE_URL),
            max_connections,
            jwt_secret,
        })
    }

    pub fn uses_postgres(&self) -> bool {
        self.database_url.is_some()
    }
}

// Secrets stay out of logs.
impl core::fmt::Debug for AtelierConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AtelierConfig")
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("max_connections", &self.max_connections)
            .field("jwt_secret", &"<redacted>")
            .finish()
    }
}

fn flag_enabled(value: Option<&str>) -> bool {
    matches!(
        value.map(str::to_ascii_lowercase).as_deref(),
        Some("1" | "true" | "yes")
    )
}
