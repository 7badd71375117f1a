//! Helpers for server-side calls made on behalf of the signed-in user.

use serde_json::Value;

use crate::auth::token::{TokenCodec, normalize_token};

/// `Authorization` header value for forwarding the session to the backend
/// API. Only normalizes; the token is passed on whether or not it decodes.
pub fn bearer_authorization(raw_cookie: Option<&str>) -> Option<String> {
    raw_cookie
        .and_then(normalize_token)
        .map(|token| format!("Bearer {}", token))
}

/// The profile blob the login flow embedded in the token, if the session is
/// still valid.
pub fn embedded_user(codec: &TokenCodec, raw_cookie: Option<&str>) -> Option<Value> {
    codec.decode(raw_cookie).and_then(|claims| claims.user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use serde_json::json;

    fn token(claims: &Value) -> String {
        format!("h.{}.s", URL_SAFE_NO_PAD.encode(claims.to_string()))
    }

    #[test]
    fn bearer_header_from_quoted_cookie() {
        assert_eq!(
            bearer_authorization(Some("\"abc.def.ghi\"")),
            Some("Bearer abc.def.ghi".to_string())
        );
    }

    #[test]
    fn bearer_prefix_is_not_doubled() {
        assert_eq!(
            bearer_authorization(Some("bearer abc.def")),
            Some("Bearer abc.def".to_string())
        );
    }

    #[test]
    fn no_bearer_header_without_a_token() {
        assert_eq!(bearer_authorization(None), None);
        assert_eq!(bearer_authorization(Some(" \"\" ")), None);
    }

    #[test]
    fn embedded_user_is_returned_untouched() {
        let user = json!({"id": 7, "nome": "Ana", "turmas": [1, 2]});
        let raw = token(&json!({"sub": "7", "role": ["STUDENT"], "user": user}));
        assert_eq!(embedded_user(&TokenCodec::new(), Some(&raw)), Some(user));
    }

    #[test]
    fn embedded_user_needs_a_live_session() {
        let raw = token(&json!({"sub": "7", "user": {"id": 7}, "exp": 1}));
        assert_eq!(embedded_user(&TokenCodec::new(), Some(&raw)), None);

        let raw = token(&json!({"sub": "7"}));
        assert_eq!(embedded_user(&TokenCodec::new(), Some(&raw)), None);
    }
}
