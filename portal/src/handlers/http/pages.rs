use std::convert::Infallible;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::{Response, StatusCode};
use tracing::{debug, warn};

use shared::auth::canonical_path;

use crate::AppState;
use crate::handlers::http::utils::{CacheStrategy, deliver_page_with_status};

/// Map a request path onto a file under `web_dir`.
///
/// Tries `<path>`, `<path>.html` and `<path>/index.html` in that order.
/// Returns `None` for anything that could leave the web root, and for any
/// path the access guard would spell differently.
pub async fn resolve_page(web_dir: &Path, request_path: &str) -> Option<PathBuf> {
    if canonical_path(request_path) != request_path {
        warn!("Rejected non-canonical page path: {}", request_path);
        return None;
    }
    let relative = request_path.trim_matches('/');

    if relative.contains('\\') || relative.contains('\0') {
        warn!("Rejected page path with forbidden characters: {:?}", request_path);
        return None;
    }
    if Path::new(relative)
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        warn!("Rejected page path outside the web root: {}", request_path);
        return None;
    }

    let candidates = if relative.is_empty() {
        vec![web_dir.join("index.html")]
    } else {
        vec![
            web_dir.join(relative),
            web_dir.join(format!("{}.html", relative)),
            web_dir.join(relative).join("index.html"),
        ]
    };

    for candidate in candidates {
        if tokio::fs::metadata(&candidate)
            .await
            .is_ok_and(|meta| meta.is_file())
        {
            debug!("Resolved {} to {}", request_path, candidate.display());
            return Some(candidate);
        }
    }

    None
}

/// Serve the page for `request_path`, or `None` when there is no such page.
pub async fn serve_page(
    request_path: &str,
    state: &AppState,
) -> Result<Option<Response<BoxBody<Bytes, Infallible>>>> {
    let web_dir = Path::new(&state.config.paths.web_dir);

    let Some(file) = resolve_page(web_dir, request_path).await else {
        return Ok(None);
    };

    let response = deliver_page_with_status(&file, StatusCode::OK, CacheStrategy::for_path(&file))
        .await
        .context("Failed to deliver page")?;

    Ok(Some(response))
}
