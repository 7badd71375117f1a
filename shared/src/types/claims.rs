use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Claims carried in the middle segment of a session token.
///
/// Claims are derived fresh from the `token` cookie on every request and are
/// never cached or mutated. Two backends issue these tokens and they disagree
/// on a few shapes, so deserialization is deliberately forgiving where the
/// guard does not care (roles, user blob) and strict where it does (subject).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawSessionClaims")]
pub struct SessionClaims {
    /// Principal identifier. Required; numeric subjects are kept as their
    /// decimal text.
    pub sub: String,

    /// Role names in issue order. Only the first one is used to pick a
    /// default dashboard; membership checks ignore order.
    #[serde(rename = "role")]
    pub roles: Vec<String>,

    /// Issued-at (Unix timestamp, seconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Expiry (Unix timestamp, seconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Backend user id, whatever its JSON type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    /// Profile blob for the rendering layer. Never inspected here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Wire shape. `role` and `roles` are read separately so a token carrying
/// both still decodes; `role` wins.
#[derive(Deserialize)]
struct RawSessionClaims {
    #[serde(deserialize_with = "subject_text")]
    sub: String,

    #[serde(default, deserialize_with = "present_roles")]
    role: Option<Vec<String>>,

    #[serde(default, deserialize_with = "present_roles")]
    roles: Option<Vec<String>>,

    #[serde(default)]
    iat: Option<i64>,

    #[serde(default)]
    exp: Option<i64>,

    #[serde(default)]
    id: Option<Value>,

    #[serde(default)]
    user: Option<Value>,

    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<RawSessionClaims> for SessionClaims {
    fn from(raw: RawSessionClaims) -> Self {
        Self {
            sub: raw.sub,
            roles: raw.role.or(raw.roles).unwrap_or_default(),
            iat: raw.iat,
            exp: raw.exp,
            id: raw.id,
            user: raw.user,
            extra: raw.extra,
        }
    }
}

impl SessionClaims {
    /// Claims with just a subject and roles, everything else empty.
    pub fn new<I, S>(sub: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sub: sub.into(),
            roles: roles.into_iter().map(Into::into).collect(),
            iat: None,
            exp: None,
            id: None,
            user: None,
            extra: Map::new(),
        }
    }

    /// `true` once `now_ms` has reached `exp`. Claims without `exp` never expire.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.exp
            .is_some_and(|exp| now_ms >= exp.saturating_mul(1000))
    }

    /// The role that decides the default landing page.
    pub fn primary_role(&self) -> Option<&str> {
        self.roles.first().map(String::as_str)
    }

    /// Comma-joined role list, as forwarded in `x-user-roles`.
    pub fn roles_header(&self) -> String {
        self.roles.join(",")
    }
}

// ---------------------------------------------------------------------------
// Serde helpers
// ---------------------------------------------------------------------------

fn subject_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "sub must be a string or a number, found {}",
            json_kind(&other)
        ))),
    }
}

/// Arrays keep their string entries, a bare string becomes a single role,
/// anything else means "no roles".
fn lenient_roles<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let roles = match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        Value::String(s) => vec![s],
        _ => Vec::new(),
    };
    Ok(roles)
}

fn present_roles<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_roles(deserializer).map(Some)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Result<SessionClaims, serde_json::Error> {
        serde_json::from_value(value)
    }

    #[test]
    fn role_array_is_kept_in_order() {
        let c = parse(json!({"sub": "ana", "role": ["TEACHER", "ADMIN"]})).unwrap();
        assert_eq!(c.roles, vec!["TEACHER", "ADMIN"]);
        assert_eq!(c.primary_role(), Some("TEACHER"));
    }

    #[test]
    fn roles_alias_is_accepted() {
        let c = parse(json!({"sub": "ana", "roles": ["STUDENT"]})).unwrap();
        assert_eq!(c.roles, vec!["STUDENT"]);
    }

    #[test]
    fn role_wins_when_both_spellings_are_present() {
        let c = parse(json!({"sub": "1", "role": ["ADMIN"], "roles": ["STUDENT"]})).unwrap();
        assert_eq!(c.roles, vec!["ADMIN"]);

        let c = parse(json!({"sub": "1", "role": {"name": "ADMIN"}, "roles": ["STUDENT"]})).unwrap();
        assert!(c.roles.is_empty());
        assert!(c.extra.is_empty());
    }

    #[test]
    fn serializes_back_under_role() {
        let c = parse(json!({"sub": "1", "roles": ["TEACHER"]})).unwrap();
        let value = serde_json::to_value(&c).unwrap();
        assert_eq!(value["role"], json!(["TEACHER"]));
        assert!(value.get("roles").is_none());
    }

    #[test]
    fn single_role_string_becomes_one_element_list() {
        let c = parse(json!({"sub": "ana", "role": "ADMIN"})).unwrap();
        assert_eq!(c.roles, vec!["ADMIN"]);
    }

    #[test]
    fn object_role_means_no_roles() {
        let c = parse(json!({"sub": 7, "role": {"id": 1, "name": "ADMIN"}})).unwrap();
        assert!(c.roles.is_empty());
    }

    #[test]
    fn non_string_role_entries_are_dropped() {
        let c = parse(json!({"sub": "x", "role": ["ADMIN", 3, null, "USER"]})).unwrap();
        assert_eq!(c.roles, vec!["ADMIN", "USER"]);
    }

    #[test]
    fn missing_role_is_empty() {
        let c = parse(json!({"sub": "x"})).unwrap();
        assert!(c.roles.is_empty());
        assert_eq!(c.primary_role(), None);
        assert_eq!(c.roles_header(), "");
    }

    #[test]
    fn numeric_subject_is_rendered_as_text() {
        let c = parse(json!({"sub": 42, "role": []})).unwrap();
        assert_eq!(c.sub, "42");
    }

    #[test]
    fn missing_subject_is_rejected() {
        assert!(parse(json!({"role": ["ADMIN"]})).is_err());
    }

    #[test]
    fn boolean_subject_is_rejected() {
        assert!(parse(json!({"sub": true})).is_err());
    }

    #[test]
    fn unknown_claims_land_in_extra() {
        let c = parse(json!({"sub": "x", "idEntity": 3, "iss": "auth_service"})).unwrap();
        assert_eq!(c.extra.get("idEntity"), Some(&json!(3)));
        assert_eq!(c.extra.get("iss"), Some(&json!("auth_service")));
    }

    #[test]
    fn user_blob_is_carried_untouched() {
        let user = json!({"id": 1, "nome": "José", "role": {"name": "ADMIN"}});
        let c = parse(json!({"sub": "x", "user": user.clone()})).unwrap();
        assert_eq!(c.user, Some(user));
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let mut c = SessionClaims::new("x", ["ADMIN"]);
        c.exp = Some(1_700_000_000);
        assert!(!c.is_expired_at(1_699_999_999_999));
        assert!(c.is_expired_at(1_700_000_000_000));
        assert!(c.is_expired_at(1_700_000_000_001));
    }

    #[test]
    fn claims_without_exp_never_expire() {
        let c = SessionClaims::new("x", ["ADMIN"]);
        assert!(!c.is_expired_at(i64::MAX));
    }

    #[test]
    fn roles_header_joins_with_commas() {
        let c = SessionClaims::new("x", ["ADMIN", "TEACHER"]);
        assert_eq!(c.roles_header(), "ADMIN,TEACHER");
    }
}
