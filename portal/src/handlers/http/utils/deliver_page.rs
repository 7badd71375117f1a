use std::fmt;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use bytes::Bytes;
use http::HeaderValue;
use http_body_util::{BodyExt, Empty, Full, combinators::BoxBody};
use hyper::{Response, StatusCode, header};
use std::convert::Infallible;
use tracing::{debug, error};

use crate::handlers::http::utils::headers;

#[derive(Debug, Clone, Copy)]
pub enum CacheStrategy {
    Yes,      // Default (1 year)
    No,       // 1 hour cache
    Explicit, // No cache at all
}

impl fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheStrategy::Yes => write!(f, "Yes (1 year)"),
            CacheStrategy::No => write!(f, "No (1 hour)"),
            CacheStrategy::Explicit => write!(f, "Explicit (no-cache)"),
        }
    }
}

impl CacheStrategy {
    /// HTML differs per principal and must never be cached; everything else
    /// under the web root is a build asset.
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|s| s.to_str()) {
            Some("html") | Some("htm") => CacheStrategy::Explicit,
            _ => CacheStrategy::No,
        }
    }
}

/// Read a file from disk and deliver it with caching headers
pub async fn deliver_page_with_status<P: AsRef<Path>>(
    file_path: P,
    status: StatusCode,
    cache: CacheStrategy,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let file_path = file_path.as_ref();

    debug!(
        "Reading static file from: {} (cache: {})",
        file_path.display(),
        cache
    );

    let content: Vec<u8> = tokio::fs::read(file_path)
        .await
        .with_context(|| format!("Failed to read static file: {}", file_path.display()))?;

    let content_bytes: Bytes = Bytes::from(content);
    let mime_type: &str = get_mime_type(file_path);

    debug!(
        "Delivering static page with status: {}, size: {} bytes, mime: {}, cache: {}",
        status,
        content_bytes.len(),
        mime_type,
        cache
    );

    let response: Response<BoxBody<Bytes, Infallible>> = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, mime_type)
        .body(full(content_bytes))
        .map_err(|e| anyhow!("Failed to build response: {}", e))?;

    let response_with_cache = match cache {
        CacheStrategy::Yes => headers::add_cache_headers_with_max_age(response, None),
        CacheStrategy::No => headers::add_cache_headers_with_max_age(response, Some(3600)),
        CacheStrategy::Explicit => headers::add_no_cache_headers(response),
    };
    Ok(response_with_cache)
}

/// Helper function to determine MIME type from file extension
pub fn get_mime_type(path: &Path) -> &'static str {
    match path.extension().and_then(|s| s.to_str()) {
        // Web documents
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") | Some("mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("webmanifest") => "application/manifest+json",

        // Images
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",

        // Media
        Some("mp3") => "audio/mpeg",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",

        // Documents
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",

        // Default
        _ => "application/octet-stream",
    }
}

/// Delivers a `307 Temporary Redirect`, optionally setting one cookie.
///
/// 307 keeps the method, so a guarded POST is not silently turned into a GET.
pub fn deliver_redirect_with_cookie(
    location: &str,
    cookie: Option<HeaderValue>,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    debug!("Delivering redirect to: {}", location);

    let mut builder = Response::builder()
        .status(StatusCode::TEMPORARY_REDIRECT)
        .header(header::LOCATION, location)
        .header(header::CACHE_CONTROL, "no-store");

    if let Some(c) = cookie {
        builder = builder.header(header::SET_COOKIE, c);
    }
    let response = builder.body(empty()).map_err(|e: http::Error| {
        error!("Failed to build redirect response to {}: {}", location, e);
        anyhow!("Failed to build redirect response: {}", e)
    })?;

    Ok(response)
}

/// Helper function to create an empty body
pub fn empty() -> BoxBody<Bytes, Infallible> {
    Empty::<Bytes>::new().boxed()
}

/// Helper function to create a full body from various types
pub fn full<T: Into<Bytes>>(chunk: T) -> BoxBody<Bytes, Infallible> {
    let bytes: Bytes = chunk.into();
    let full_body: Full<Bytes> = Full::new(bytes);
    full_body.boxed()
}
