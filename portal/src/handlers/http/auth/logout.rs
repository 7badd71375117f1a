use std::convert::Infallible;

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::{Request, Response, StatusCode, header};
use tracing::info;

use crate::AppState;
use crate::handlers::http::utils::{delete_cookie, full};

/// Handle sign-out: expire the session cookie and its user-id companion.
pub async fn handle_signout(
    _req: Request<()>,
    state: AppState,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    info!("User signed out");

    let auth = &state.config.auth;
    let clear_token = delete_cookie(&auth.cookie_name, auth.secure_cookies)?;
    let clear_user_id = delete_cookie(&auth.user_id_cookie, auth.secure_cookies)?;

    let response_json = serde_json::json!({
        "status": "success",
        "message": "Signed out"
    });

    let response: Response<BoxBody<Bytes, Infallible>> = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::SET_COOKIE, clear_token)
        .header(header::SET_COOKIE, clear_user_id)
        .body(full(response_json.to_string()))
        .context("Failed to build signout response")?;

    Ok(response)
}
