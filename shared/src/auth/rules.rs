use regex::Regex;
use thiserror::Error;

use crate::auth::roles::{ADMIN, STUDENT, TEACHER, USER};
use crate::types::server_config::{RoleRuleConfig, RoutesConfig};

// ---------------------------------------------------------------------------
// Built-in table
// ---------------------------------------------------------------------------

/// Paths that need any valid session.
pub const PROTECTED_PATTERNS: &[&str] = &[
    r"^/$",
    r"^/home(/.*)?$",
    r"^/aluno(/.*)?$",
    r"^/professor(/.*)?$",
    r"^/cursos(/.*)?$",
    r"^/trilhas(/.*)?$",
    r"^/ranking(/.*)?$",
    r"^/admin(/.*)?$",
    r"^/user(/.*)?$",
];

const STAFF: &[&str] = &[ADMIN, TEACHER];
const MEMBERS: &[&str] = &[ADMIN, TEACHER, STUDENT];

/// Paths that need a specific role. Scanned top to bottom; the first match
/// decides, so narrower patterns must come before the prefixes that cover them.
pub const ROLE_PATTERNS: &[(&str, &[&str])] = &[
    (r"^/admin$", &[ADMIN]),
    (r"^/admin/admin(/.*)?$", &[ADMIN]),
    (r"^/admin/teachers(/.*)?$", &[ADMIN]),
    (r"^/admin/students(/.*)?$", STAFF),
    (r"^/admin/class(/.*)?$", STAFF),
    (r"^/professor/dashboard(/.*)?$", STAFF),
    (r"^/professor/cursos(/.*)?$", STAFF),
    (r"^/professor/conteudo(/.*)?$", STAFF),
    (r"^/cursos(/.*)?$", MEMBERS),
    (r"^/ranking(/.*)?$", MEMBERS),
    (r"^/trilhas(/.*)?$", MEMBERS),
    (r"^/aluno/dashboard(/.*)?$", &[STUDENT]),
    (r"^/aluno/trilhas(/.*)?$", &[STUDENT]),
    (r"^/aluno/ead(/.*)?$", &[STUDENT]),
    (r"^/aluno/ranking(/.*)?$", &[STUDENT]),
    (r"^/home(/.*)?$", MEMBERS),
    (r"^/user/profile(/.*)?$", &[ADMIN, TEACHER, STUDENT, USER]),
];

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("invalid route pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

fn compile(pattern: &str) -> Result<Regex, RuleError> {
    Regex::new(pattern).map_err(|source| RuleError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

// ---------------------------------------------------------------------------
// RoleRule
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RoleRule {
    pattern: Regex,
    roles: Vec<String>,
}

impl RoleRule {
    pub fn new<I, S>(pattern: &str, roles: I) -> Result<Self, RuleError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self {
            pattern: compile(pattern)?,
            roles: roles.into_iter().map(Into::into).collect(),
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }
}

// ---------------------------------------------------------------------------
// RuleTable
// ---------------------------------------------------------------------------

/// Compiled route table. Built once at startup and only read afterwards.
#[derive(Debug, Clone)]
pub struct RuleTable {
    protected: Vec<Regex>,
    role_rules: Vec<RoleRule>,
}

impl RuleTable {
    pub fn new<I, S>(protected: I, role_rules: Vec<RoleRule>) -> Result<Self, RuleError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let protected = protected
            .into_iter()
            .map(|p| compile(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            protected,
            role_rules,
        })
    }

    /// The built-in product table.
    pub fn standard() -> Result<Self, RuleError> {
        Self::new(PROTECTED_PATTERNS, standard_role_rules()?)
    }

    /// Built-in table with whichever lists the config replaces.
    pub fn from_config(routes: &RoutesConfig) -> Result<Self, RuleError> {
        let role_rules = match &routes.role_rules {
            Some(rules) => rules
                .iter()
                .map(|RoleRuleConfig { pattern, roles }| {
                    RoleRule::new(pattern, roles.iter().cloned())
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => standard_role_rules()?,
        };

        match &routes.protected {
            Some(protected) => Self::new(protected, role_rules),
            None => Self::new(PROTECTED_PATTERNS, role_rules),
        }
    }

    /// Does this path need a session at all?
    pub fn requires_session(&self, path: &str) -> bool {
        self.protected.iter().any(|re| re.is_match(path))
    }

    /// First role rule whose pattern matches, if any.
    pub fn rule_for(&self, path: &str) -> Option<&RoleRule> {
        self.role_rules.iter().find(|rule| rule.matches(path))
    }

    /// Roles allowed on this path; `None` means no role constraint.
    pub fn roles_for(&self, path: &str) -> Option<&[String]> {
        self.rule_for(path).map(RoleRule::roles)
    }

    pub fn role_rules(&self) -> &[RoleRule] {
        &self.role_rules
    }
}

fn standard_role_rules() -> Result<Vec<RoleRule>, RuleError> {
    ROLE_PATTERNS
        .iter()
        .map(|(pattern, roles)| RoleRule::new(pattern, roles.iter().copied()))
        .collect()
}
