use std::convert::Infallible;

use anyhow::Result;
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::AppState;
use crate::handlers::http::utils::{deliver_error_json, deliver_serialized_json, get_cookie};

#[derive(Debug, Serialize)]
struct SessionView<'a> {
    status: &'static str,
    data: SessionData<'a>,
}

#[derive(Debug, Serialize)]
struct SessionData<'a> {
    sub: &'a str,
    roles: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<&'a Value>,
    dashboard: &'static str,
}

/// Who the session cookie says is signed in, for client-side rendering.
///
/// Same decode as the access guard, so a session this reports is one the
/// guard accepts.
pub async fn handle_session(
    req: Request<()>,
    state: AppState,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let raw = get_cookie(req.headers(), &state.config.auth.cookie_name);

    let Some(claims) = state.guard.codec().decode(raw.as_deref()) else {
        debug!("Session lookup without a valid session");
        return deliver_error_json(
            "UNAUTHORIZED",
            "No active session",
            StatusCode::UNAUTHORIZED,
        );
    };

    let view = SessionView {
        status: "success",
        data: SessionData {
            sub: &claims.sub,
            roles: &claims.roles,
            user: claims.user.as_ref(),
            dashboard: shared::auth::default_dashboard(&claims),
        },
    };

    deliver_serialized_json(&view, StatusCode::OK)
}
