use anyhow::{Result, anyhow};
use hyper::header::{HeaderMap, HeaderValue};
use std::time::Duration;
use tracing::{debug, warn};

/// Forwarded principal subject.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Forwarded comma-joined role list.
pub const USER_ROLES_HEADER: &str = "x-user-roles";

/// Extract cookie value by name, percent-decoded.
///
/// Every `Cookie` header is searched; the first pair with a matching name
/// wins.
pub fn get_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let found = headers
        .get_all(hyper::header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|cookies| {
            cookies.split(';').find_map(|cookie| {
                let (name, value) = cookie.trim().split_once('=')?;
                (name.trim() == cookie_name).then(|| decode_cookie_value(value.trim()))
            })
        });

    match &found {
        Some(_) => debug!("Cookie found: {}", cookie_name),
        None => debug!("Cookie not found: {}", cookie_name),
    }

    found
}

/// Percent-decode a cookie value. `+` is kept literally, unlike form bodies.
pub fn decode_cookie_value(value: &str) -> String {
    let escaped = value.replace('+', "%2B").replace('&', "%26");

    form_urlencoded::parse(format!("v={}", escaped).as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}

/// Set a cookie with options
pub fn set_cookie(
    name: &str,
    value: &str,
    max_age: Option<Duration>,
    path: Option<&str>,
    http_only: bool,
    secure: bool,
) -> Result<HeaderValue> {
    let mut cookie = format!("{}={}", name, value);

    if let Some(age) = max_age {
        cookie.push_str(&format!("; Max-Age={}", age.as_secs()));
    }

    if let Some(p) = path {
        cookie.push_str(&format!("; Path={}", p));
    }

    if http_only {
        cookie.push_str("; HttpOnly");
    }

    if secure {
        cookie.push_str("; Secure");
    }

    debug!("Setting cookie: {}", name);

    HeaderValue::from_str(&cookie).map_err(|e| {
        warn!("Failed to create cookie header for {}: {}", name, e);
        anyhow!("Invalid cookie value: {}", e)
    })
}

/// Delete a cookie by setting it to expire
pub fn delete_cookie(name: &str, secure: bool) -> Result<HeaderValue> {
    debug!("Deleting cookie: {}", name);
    set_cookie(
        name,
        "",
        Some(Duration::from_secs(0)),
        Some("/"),
        true,
        secure,
    )
}

/// Add no-cache headers for pages that depend on who is asking
pub fn add_no_cache_headers<T>(mut res: hyper::Response<T>) -> hyper::Response<T> {
    let headers = res.headers_mut();

    headers.insert(
        "cache-control",
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert("pragma", HeaderValue::from_static("no-cache"));
    headers.insert("expires", HeaderValue::from_static("0"));
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );

    debug!("Added no-cache headers");
    res
}

/// Add custom cache headers with specified max-age
pub fn add_cache_headers_with_max_age<T>(
    mut res: hyper::Response<T>,
    max_age_seconds: Option<u64>,
) -> hyper::Response<T> {
    let headers = res.headers_mut();
    let time = max_age_seconds.unwrap_or(31536000);

    let cache_control = format!("public, max-age={}", time);
    headers.insert(
        "cache-control",
        HeaderValue::from_str(&cache_control)
            .unwrap_or_else(|_| HeaderValue::from_static("public, max-age=3600")),
    );
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );

    debug!("Added cache headers with max-age: {} seconds", time);
    res
}
