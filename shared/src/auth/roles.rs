use crate::types::SessionClaims;

pub const ADMIN: &str = "ADMIN";
pub const TEACHER: &str = "TEACHER";
pub const STUDENT: &str = "STUDENT";
pub const USER: &str = "USER";

/// Landing page for principals whose first role has no dashboard of its own.
pub const FALLBACK_DASHBOARD: &str = "/ranking";

/// The role requirement of a rule: one role, or any of several.
#[derive(Debug, Clone, Copy)]
pub enum RequiredRoles<'a> {
    One(&'a str),
    AnyOf(&'a [&'a str]),
    AnyOfOwned(&'a [String]),
}

impl RequiredRoles<'_> {
    pub fn contains(&self, role: &str) -> bool {
        match self {
            Self::One(r) => *r == role,
            Self::AnyOf(rs) => rs.contains(&role),
            Self::AnyOfOwned(rs) => rs.iter().any(|r| r == role),
        }
    }
}

impl<'a> From<&'a str> for RequiredRoles<'a> {
    fn from(role: &'a str) -> Self {
        Self::One(role)
    }
}

impl<'a> From<&'a [&'a str]> for RequiredRoles<'a> {
    fn from(roles: &'a [&'a str]) -> Self {
        Self::AnyOf(roles)
    }
}

impl<'a, const N: usize> From<&'a [&'a str; N]> for RequiredRoles<'a> {
    fn from(roles: &'a [&'a str; N]) -> Self {
        Self::AnyOf(roles)
    }
}

impl<'a> From<&'a [String]> for RequiredRoles<'a> {
    fn from(roles: &'a [String]) -> Self {
        Self::AnyOfOwned(roles)
    }
}

impl<'a> From<&'a Vec<String>> for RequiredRoles<'a> {
    fn from(roles: &'a Vec<String>) -> Self {
        Self::AnyOfOwned(roles)
    }
}

/// `true` when the claims carry at least one of the required roles.
///
/// No claims, or claims without roles, never satisfy anything.
pub fn satisfies_any_role<'a>(
    claims: Option<&SessionClaims>,
    required: impl Into<RequiredRoles<'a>>,
) -> bool {
    let Some(claims) = claims else {
        return false;
    };
    let required = required.into();
    claims.roles.iter().any(|role| required.contains(role))
}

/// Default landing page, chosen by the first role only.
pub fn default_dashboard(claims: &SessionClaims) -> &'static str {
    dashboard_for_role(claims.primary_role())
}

pub fn dashboard_for_role(role: Option<&str>) -> &'static str {
    match role {
        Some(ADMIN) => "/admin",
        Some(TEACHER) => "/professor/dashboard",
        Some(STUDENT) => "/aluno/dashboard",
        _ => FALLBACK_DASHBOARD,
    }
}
