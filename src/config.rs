use std::env;
use std::path::PathBuf;

/// Default per-file upload limit (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageConfig {
    /// Files written under a local directory and served from `public_url`.
    Local { root: PathBuf, public_url: String },
    /// Object storage reached over HTTP (Supabase-style object API).
    Http {
        endpoint: String,
        bucket: String,
        api_key: String,
        public_url: Option<String>,
    },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub server_address: String,
    pub storage: StorageConfig,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any variable source; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let storage = match lookup("STORAGE_TYPE").as_deref().unwrap_or("local") {
            "local" => StorageConfig::Local {
                root: PathBuf::from(
                    lookup("STORAGE_LOCAL_DIR").unwrap_or_else(|| "./uploads".to_string()),
                ),
                public_url: lookup("STORAGE_PUBLIC_URL")
                    .unwrap_or_else(|| "/uploads".to_string()),
            },
            "http" => StorageConfig::Http {
                endpoint: required("STORAGE_ENDPOINT")?,
                bucket: required("STORAGE_BUCKET")?,
                api_key: required("STORAGE_API_KEY")?,
                public_url: lookup("STORAGE_PUBLIC_URL"),
            },
            other => {
                return Err(ConfigError::Invalid {
                    name: "STORAGE_TYPE",
                    value: other.to_string(),
                })
            }
        };

        Ok(Config {
            database_url: required("DATABASE_URL")?,
            redis_url: lookup("REDIS_URL").filter(|v| !v.trim().is_empty()),
            jwt_secret: required("JWT_SECRET")?,
            jwt_expiry_hours: lookup("JWT_EXPIRY_HOURS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(168),
            server_address: lookup("SERVER_ADDRESS")
                .unwrap_or_else(|| "0.0.0.0:5000".to_string()),
            storage,
            max_upload_bytes: lookup("MAX_UPLOAD_BYTES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        })
    }
}
