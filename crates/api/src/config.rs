use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub store: StoreConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    pub identity: IdentityConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Upper bound on request bodies, submissions included.
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

impl From<&DatabaseConfig> for persistence::db::DatabaseConfig {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            url: config.url.clone(),
            max_connections: config.max_connections,
            min_connections: config.min_connections,
            connect_timeout_secs: config.connect_timeout_secs,
            idle_timeout_secs: config.idle_timeout_secs,
        }
    }
}

/// Which [`domain::store::FormStore`] implementation backs the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Postgres,
    /// Process-local store; data is lost on restart.
    Memory,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Public submissions accepted per client IP per minute; 0 disables.
    #[serde(default = "default_submit_rate_limit")]
    pub submit_rate_limit_per_minute: u32,

    #[serde(default)]
    pub hsts_enabled: bool,

    /// Key the submit limiter on `x-forwarded-for`/`x-real-ip`. Only safe
    /// when a proxy in front of the service overwrites those headers.
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            submit_rate_limit_per_minute: default_submit_rate_limit(),
            hsts_enabled: false,
            trust_proxy_headers: false,
        }
    }
}

/// Identity provider token verification.
///
/// Exactly one of `public_key` (RS256) or `shared_secret` (HS256) is used;
/// the public key wins when both are set.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    #[serde(default)]
    pub public_key: String,

    #[serde(default)]
    pub shared_secret: String,

    #[serde(default)]
    pub issuer: Option<String>,

    #[serde(default)]
    pub audience: Option<String>,

    /// Clock skew tolerance for `exp`.
    #[serde(default = "default_identity_leeway")]
    pub leeway_secs: u64,
}

/// Outbound mail transport.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// `console` logs messages; `http` posts them to a Resend-compatible API.
    #[serde(default = "default_email_provider")]
    pub provider: String,

    /// From address for developer notices and unconfigured confirmations.
    #[serde(default = "default_from_email")]
    pub default_from: String,

    #[serde(default = "default_email_api_url")]
    pub api_url: String,

    #[serde(default)]
    pub api_key: String,

    /// Per-send deadline; an expired send is logged as FAILED.
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            provider: default_email_provider(),
            default_from: default_from_email(),
            api_url: default_email_api_url(),
            api_key: String::new(),
            send_timeout_secs: default_send_timeout(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_body_size() -> usize {
    262_144
}
fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    2
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_submit_rate_limit() -> u32 {
    60
}
fn default_identity_leeway() -> u64 {
    shared::identity::DEFAULT_LEEWAY_SECS
}
fn default_email_provider() -> String {
    "console".to_string()
}
fn default_from_email() -> String {
    "noreply@forms.local".to_string()
}
fn default_email_api_url() -> String {
    "https://api.resend.com/emails".to_string()
}
fn default_send_timeout() -> u64 {
    10
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with FB__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("FB").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Builds a configuration from embedded defaults plus overrides.
    ///
    /// Does not touch the file system and skips validation so tests can
    /// assemble partial configs.
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [server]
            host = "127.0.0.1"
            port = 8080
            request_timeout_secs = 30
            max_body_size = 262144

            [database]
            url = ""

            [store]
            backend = "memory"

            [logging]
            level = "info"
            format = "pretty"

            [security]
            cors_origins = []
            submit_rate_limit_per_minute = 0

            [identity]
            shared_secret = "test-identity-secret"
            leeway_secs = 30

            [email]
            provider = "console"
            default_from = "noreply@forms.test"
            send_timeout_secs = 5
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.store.backend == StoreBackend::Postgres && self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "FB__DATABASE__URL environment variable must be set".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        if self.identity.public_key.is_empty() && self.identity.shared_secret.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "FB__IDENTITY__PUBLIC_KEY or FB__IDENTITY__SHARED_SECRET must be set".to_string(),
            ));
        }

        match self.email.provider.as_str() {
            "console" => {}
            "http" if self.email.api_key.is_empty() => {
                return Err(ConfigValidationError::MissingRequired(
                    "FB__EMAIL__API_KEY is required for the http email provider".to_string(),
                ));
            }
            "http" => {}
            other => {
                return Err(ConfigValidationError::InvalidValue(format!(
                    "Unknown email provider '{}'",
                    other
                )));
            }
        }

        if self.email.send_timeout_secs == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "email.send_timeout_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }
}
