use serde::{Deserialize, Serialize};
use std::{collections::HashMap, env};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    pub identity: IdentityConfig,
    pub directory: DirectoryConfig,
    pub internal_directory: InternalDirectoryConfig,
    pub cache: CacheConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            identity: IdentityConfig::from_env()?,
            directory: DirectoryConfig::from_env()?,
            internal_directory: InternalDirectoryConfig::from_env()?,
            cache: CacheConfig::from_env()?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| "SERVER_PORT must be a valid port number")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base tracing filter level (e.g. "info", "debug")
    pub level: String,
    /// Output format: "json", "compact" or "pretty"
    pub format: String,
    /// Per-module level overrides appended to the filter
    pub modules: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
            modules: HashMap::new(),
        }
    }
}

impl LoggingConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: env::var("LOG_FORMAT").unwrap_or_else(|_| "compact".to_string()),
            modules: HashMap::new(),
        })
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub max_connections: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "salesdesk".to_string(),
            username: "postgres".to_string(),
            password: "postgres".to_string(),
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            host: env::var("DATABASE_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: env::var("DATABASE_PORT")
                .unwrap_or_else(|_| "5432".to_string())
                .parse()
                .map_err(|_| "DATABASE_PORT must be a valid port number")?,
            database: env::var("DATABASE_NAME").unwrap_or_else(|_| "salesdesk".to_string()),
            username: env::var("DATABASE_USERNAME").unwrap_or_else(|_| "postgres".to_string()),
            password: env::var("DATABASE_PASSWORD").unwrap_or_else(|_| "postgres".to_string()),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| "DATABASE_MAX_CONNECTIONS must be a valid number")?,
        })
    }
}

/// Session-manager runtime settings. The identity-provider credentials
/// themselves (client id / tenant / secret) come from the durable store at
/// runtime, not from here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Application origin used to derive the redirect URIs
    /// (`{origin}/auth-callback`, `{origin}/`)
    pub origin: String,
    /// Upper bound on the durable config read before falling back to the
    /// local cache
    pub config_load_timeout_secs: u64,
    /// How long before token expiry the silent renewal fires
    pub silent_renew_lead_secs: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:3000".to_string(),
            config_load_timeout_secs: 5,
            silent_renew_lead_secs: 60,
        }
    }
}

impl IdentityConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            origin: env::var("APP_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string()),
            config_load_timeout_secs: env::var("CONFIG_LOAD_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| "CONFIG_LOAD_TIMEOUT_SECS must be a valid number")?,
            silent_renew_lead_secs: env::var("SILENT_RENEW_LEAD_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| "SILENT_RENEW_LEAD_SECS must be a valid number")?,
        })
    }
}

/// Microsoft Graph directory endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: "https://graph.microsoft.com/v1.0".to_string(),
            timeout_secs: 10,
        }
    }
}

impl DirectoryConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            base_url: env::var("DIRECTORY_BASE_URL")
                .unwrap_or_else(|_| "https://graph.microsoft.com/v1.0".to_string()),
            timeout_secs: env::var("DIRECTORY_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| "DIRECTORY_TIMEOUT_SECS must be a valid number")?,
        })
    }
}

/// Internal-directory (secondary identity source) endpoints.
///
/// Tier A is the same-origin reverse-proxy path used with the signed-in
/// user's bearer token. Tier B is this API's own function endpoint, which
/// performs the upstream call with the elevated credential below.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InternalDirectoryConfig {
    /// Tier-A base URL (the reverse-proxied internal API as seen from the
    /// client)
    pub proxy_base_url: String,
    /// Profile path appended to both the proxy base and the upstream base
    pub users_me_path: String,
    /// Tier-B function endpoint URL
    pub function_url: String,
    /// Upstream internal API base URL reached by the Tier-B function
    pub upstream_base_url: String,
    /// Elevated credential presented by the Tier-B function upstream
    pub service_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for InternalDirectoryConfig {
    fn default() -> Self {
        Self {
            proxy_base_url: "/sales-api".to_string(),
            users_me_path: "/v1/users/me".to_string(),
            function_url: "http://localhost:3000/v1/functions/fetch-internal-user".to_string(),
            upstream_base_url: "https://api.internal.example.com/sales-api".to_string(),
            service_key: None,
            timeout_secs: 10,
        }
    }
}

impl InternalDirectoryConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();
        Ok(Self {
            proxy_base_url: env::var("INTERNAL_PROXY_BASE_URL")
                .unwrap_or(defaults.proxy_base_url),
            users_me_path: env::var("INTERNAL_USERS_ME_PATH").unwrap_or(defaults.users_me_path),
            function_url: env::var("INTERNAL_FUNCTION_URL").unwrap_or(defaults.function_url),
            upstream_base_url: env::var("INTERNAL_UPSTREAM_BASE_URL")
                .unwrap_or(defaults.upstream_base_url),
            service_key: env::var("INTERNAL_SERVICE_KEY").ok(),
            timeout_secs: env::var("INTERNAL_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| "INTERNAL_TIMEOUT_SECS must be a valid number")?,
        })
    }
}

/// Local write-through cache backing the config fallback
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub path: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: ".salesdesk/identity-cache.json".to_string(),
        }
    }
}

impl CacheConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            path: env::var("IDENTITY_CACHE_PATH")
                .unwrap_or_else(|_| ".salesdesk/identity-cache.json".to_string()),
        })
    }
}
