use serde::Deserialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound for the downstream page service; the guard itself never waits.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    /// Directory holding the pre-rendered pages and assets.
    pub web_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Cookie holding the raw session token.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Companion cookie written at login; only cleared on sign-out.
    #[serde(default = "default_user_id_cookie")]
    pub user_id_cookie: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    /// Adds `Secure` to cookies the portal writes.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
    /// HMAC key for optional HS256 signature checks.
    ///
    /// Unset means tokens are decoded without verification, which is only
    /// acceptable while the portal is a routing convenience in front of a
    /// backend that verifies every API call itself. The `JWT_SECRET`
    /// environment variable takes priority over this field.
    ///
    /// **Minimum length:** 32 characters.
    pub jwt_secret: Option<String>,
    /// Infrastructure prefixes that skip every check.
    #[serde(default = "default_bypass_prefixes")]
    pub bypass_prefixes: Vec<String>,
}

/// Replacement rule lists. A list left out keeps the built-in table.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RoutesConfig {
    pub protected: Option<Vec<String>>,
    pub role_rules: Option<Vec<RoleRuleConfig>>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RoleRuleConfig {
    pub pattern: String,
    pub roles: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub paths: PathsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub routes: RoutesConfig,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

impl ServerConfig {
    /// Full bind address, e.g. `"127.0.0.1:3000"`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl AuthConfig {
    /// Resolve the JWT secret with `JWT_SECRET` env-var taking priority over
    /// the config file field.
    ///
    /// `None` means signature verification is off.
    pub fn resolved_jwt_secret(&self) -> Option<String> {
        std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| self.jwt_secret.clone())
            .filter(|s| !s.is_empty())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            user_id_cookie: default_user_id_cookie(),
            login_path: default_login_path(),
            secure_cookies: default_secure_cookies(),
            jwt_secret: None,
            bypass_prefixes: default_bypass_prefixes(),
        }
    }
}

// ---------------------------------------------------------------------------
// Serde defaults
// ---------------------------------------------------------------------------

pub fn default_bind() -> String {
    "127.0.0.1".to_string()
}

pub fn default_port() -> u16 {
    3000
}

pub fn default_request_timeout() -> u64 {
    30
}

pub fn default_cookie_name() -> String {
    "token".to_string()
}

pub fn default_user_id_cookie() -> String {
    "userId".to_string()
}

pub fn default_login_path() -> String {
    "/login".to_string()
}

pub fn default_secure_cookies() -> bool {
    true
}

pub fn default_bypass_prefixes() -> Vec<String> {
    ["/_next", "/static", "/favicon", "/api/auth"]
        .into_iter()
        .map(String::from)
        .collect()
}
