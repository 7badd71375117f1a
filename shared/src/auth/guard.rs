//! Per-request access decision.
//!
//! Composes the token codec, the rule table and the role matcher. Holds no
//! per-request state; one [`AccessGuard`] is built at startup and shared.

use std::borrow::Cow;

use tracing::debug;

use crate::auth::roles::{default_dashboard, satisfies_any_role};
use crate::auth::rules::{RuleError, RuleTable};
use crate::auth::token::{TokenCodec, now_millis};
use crate::types::SessionClaims;
use crate::types::server_config::{
    AuthConfig, RoutesConfig, default_bypass_prefixes, default_login_path,
};

/// What the hosting layer should do with the request.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Serve the page. Carries the principal when one was decoded, so the
    /// caller can forward its identity.
    Continue(Option<SessionClaims>),
    /// No usable session on a protected path. The session cookie should be
    /// cleared on the way out.
    RedirectLogin,
    /// Authenticated, but this page is not for them.
    RedirectDashboard(&'static str),
}

impl Decision {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Continue(_) => "continue",
            Self::RedirectLogin => "redirect-login",
            Self::RedirectDashboard(_) => "redirect-dashboard",
        }
    }
}

/// The form of `path` the rule table and the page resolver agree on.
///
/// Empty and `.` segments are dropped and `..` is resolved against the root.
/// A trailing slash survives. Already canonical paths come back borrowed.
pub fn canonical_path(path: &str) -> Cow<'_, str> {
    if is_canonical(path) {
        return Cow::Borrowed(path);
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let mut canonical = format!("/{}", segments.join("/"));
    if path.ends_with('/') && !segments.is_empty() {
        canonical.push('/');
    }
    Cow::Owned(canonical)
}

fn is_canonical(path: &str) -> bool {
    let Some(rest) = path.strip_prefix('/') else {
        return false;
    };
    let rest = rest.strip_suffix('/').unwrap_or(rest);
    if rest.is_empty() {
        return path.len() == 1;
    }
    rest.split('/').all(|s| !matches!(s, "" | "." | ".."))
}

#[derive(Debug, Clone)]
pub struct AccessGuard {
    rules: RuleTable,
    codec: TokenCodec,
    bypass: Vec<String>,
    login_path: String,
}

impl AccessGuard {
    pub fn new(rules: RuleTable, codec: TokenCodec) -> Self {
        Self {
            rules,
            codec,
            bypass: default_bypass_prefixes(),
            login_path: default_login_path(),
        }
    }

    /// Built-in rule table, unverified codec, default bypass list.
    pub fn standard() -> Result<Self, RuleError> {
        Ok(Self::new(RuleTable::standard()?, TokenCodec::new()))
    }

    pub fn from_config(auth: &AuthConfig, routes: &RoutesConfig) -> Result<Self, RuleError> {
        let codec = match auth.resolved_jwt_secret() {
            Some(secret) => TokenCodec::with_hs256_secret(secret.as_bytes()),
            None => TokenCodec::new(),
        };

        Ok(Self::new(RuleTable::from_config(routes)?, codec)
            .with_bypass_prefixes(auth.bypass_prefixes.clone())
            .with_login_path(auth.login_path.clone()))
    }

    pub fn with_bypass_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.bypass = prefixes;
        self
    }

    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Paths the guard is mounted on: the login page and everything that
    /// needs a session. Anything else never reaches [`AccessGuard::evaluate`].
    /// Both expect a path already passed through [`canonical_path`].
    pub fn in_scope(&self, path: &str) -> bool {
        path == self.login_path || self.rules.requires_session(path)
    }

    pub fn is_bypassed(&self, path: &str) -> bool {
        self.bypass.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }

    pub fn evaluate(&self, path: &str, raw_token: Option<&str>) -> Decision {
        self.evaluate_at(path, raw_token, now_millis())
    }

    pub fn evaluate_at(&self, path: &str, raw_token: Option<&str>, now_ms: i64) -> Decision {
        let decision = self.decide(path, raw_token, now_ms);
        debug!("Access decision for {}: {}", path, decision.label());
        decision
    }

    fn decide(&self, path: &str, raw_token: Option<&str>, now_ms: i64) -> Decision {
        if self.is_bypassed(path) {
            return Decision::Continue(None);
        }

        if path == self.login_path {
            return match self.codec.decode_at(raw_token, now_ms) {
                Some(claims) => Decision::RedirectDashboard(default_dashboard(&claims)),
                None => Decision::Continue(None),
            };
        }

        if !self.rules.requires_session(path) {
            return Decision::Continue(None);
        }

        let Some(claims) = self.codec.decode_at(raw_token, now_ms) else {
            return Decision::RedirectLogin;
        };

        if path == "/" {
            return Decision::RedirectDashboard(default_dashboard(&claims));
        }

        let denied = self
            .rules
            .roles_for(path)
            .is_some_and(|required| !satisfies_any_role(Some(&claims), required));
        if denied {
            return Decision::RedirectDashboard(default_dashboard(&claims));
        }

        Decision::Continue(Some(claims))
    }
}
