use std::fs;
use tracing::{debug, error, info, warn};

use crate::auth::RuleTable;
use crate::types::server_config::{AppConfig, ConfigError};

pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    info!("Loading configuration from: {}", path);

    let contents = fs::read_to_string(path)?;
    debug!("Processing file: {}", path);

    parse_config(&contents)
}

/// Parse and validate a TOML document. Split out of [`load_config`] so the
/// validation rules can be exercised without touching the filesystem.
pub fn parse_config(contents: &str) -> Result<AppConfig, ConfigError> {
    if contents.trim().is_empty() {
        error!("Configuration file is empty");
        return Err(ConfigError::InvalidConfig("empty file".into()));
    }

    let config: AppConfig = toml::from_str(contents)?;

    info!("Configuration loaded successfully");
    debug!(
        "Config: bind={}, web_dir={}, cookie={}",
        config.server.addr(),
        config.paths.web_dir,
        config.auth.cookie_name
    );

    validate_config(&config)?;

    info!("Config validated");

    Ok(config)
}

fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.paths.web_dir.trim().is_empty() {
        return Err(ConfigError::InvalidConfig("web_dir cannot be empty".into()));
    }

    if config.server.request_timeout_secs == 0 {
        return Err(ConfigError::InvalidConfig(
            "request_timeout_secs must be greater than 0".into(),
        ));
    }

    for (field, name) in [
        ("cookie_name", &config.auth.cookie_name),
        ("user_id_cookie", &config.auth.user_id_cookie),
    ] {
        if !is_cookie_name(name) {
            return Err(ConfigError::InvalidConfig(format!(
                "{} must be a non-empty cookie token, got {:?}",
                field, name
            )));
        }
    }

    if !config.auth.login_path.starts_with('/') {
        return Err(ConfigError::InvalidConfig(
            "login_path must start with '/'".into(),
        ));
    }

    if let Some(prefix) = config
        .auth
        .bypass_prefixes
        .iter()
        .find(|p| !p.starts_with('/'))
    {
        return Err(ConfigError::InvalidConfig(format!(
            "bypass prefix {:?} must start with '/'",
            prefix
        )));
    }

    // Verification is optional, but a short key is worse than none: it
    // looks like protection without providing any.
    match config.auth.resolved_jwt_secret() {
        None => {
            warn!("No jwt_secret configured: session tokens are decoded without signature checks");
        }
        Some(secret) if secret.len() < 32 => {
            return Err(ConfigError::InvalidConfig(
                "jwt_secret must be at least 32 characters long".into(),
            ));
        }
        _ => {}
    }

    // Compile the rule table once here so a bad pattern is reported at
    // startup with the config error, not on the first request.
    RuleTable::from_config(&config.routes)
        .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;

    Ok(())
}

/// RFC 6265 cookie-name token: visible ASCII without separators.
fn is_cookie_name(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_graphic()
                && !matches!(
                    b,
                    b'(' | b')'
                        | b'<'
                        | b'>'
                        | b'@'
                        | b','
                        | b';'
                        | b':'
                        | b'\\'
                        | b'"'
                        | b'/'
                        | b'['
                        | b']'
                        | b'?'
                        | b'='
                        | b'{'
                        | b'}'
                )
        })
}
