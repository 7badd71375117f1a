use std::borrow::Cow;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{Request, Response, StatusCode};
use tower::{Layer, Service};
use tracing::{debug, info, warn};

use shared::auth::{AccessGuard, Decision, canonical_path};
use shared::types::{AuthConfig, ErrorResponse, SessionClaims};

use crate::handlers::http::utils::{
    USER_ID_HEADER, USER_ROLES_HEADER, delete_cookie, deliver_redirect_with_cookie,
    fallback_error, get_cookie,
};

/// Tower layer that runs every in-scope request through the [`AccessGuard`].
///
/// Non-canonical paths (`//x`, `/x/./y`, `/x/../y`) are redirected to their
/// canonical form first, so the rules and the page router see one spelling.
/// Requests outside the guard's scope reach the inner service without their
/// cookies being read.
#[derive(Clone)]
pub struct AccessGuardLayer {
    guard: Arc<AccessGuard>,
    cookie_name: Arc<str>,
    secure_cookies: bool,
}

impl AccessGuardLayer {
    pub fn new(guard: Arc<AccessGuard>, auth: &AuthConfig) -> Self {
        Self {
            guard,
            cookie_name: Arc::from(auth.cookie_name.as_str()),
            secure_cookies: auth.secure_cookies,
        }
    }
}

impl<S> Layer<S> for AccessGuardLayer {
    type Service = AccessGuardService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessGuardService {
            inner,
            guard: self.guard.clone(),
            cookie_name: self.cookie_name.clone(),
            secure_cookies: self.secure_cookies,
        }
    }
}

/// The actual service that applies access decisions
#[derive(Clone)]
pub struct AccessGuardService<S> {
    inner: S,
    guard: Arc<AccessGuard>,
    cookie_name: Arc<str>,
    secure_cookies: bool,
}

type GuardFuture<E> =
    Pin<Box<dyn Future<Output = Result<Response<BoxBody<Bytes, Infallible>>, E>> + Send>>;

impl<S, ReqBody> Service<Request<ReqBody>> for AccessGuardService<S>
where
    S: Service<Request<ReqBody>, Response = Response<BoxBody<Bytes, Infallible>>>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = GuardFuture<S::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let mut inner = self.inner.clone();

        // Identity headers are only ever set here; never trust a client's.
        req.headers_mut().remove(USER_ID_HEADER);
        req.headers_mut().remove(USER_ROLES_HEADER);

        let path = req.uri().path().to_string();
        if let Cow::Owned(canonical) = canonical_path(&path) {
            let location = with_query(&canonical, req.uri().query());
            debug!("Normalizing {} to {}", path, location);
            return ready(redirect(&location, None));
        }

        if !self.guard.in_scope(&path) {
            return Box::pin(inner.call(req));
        }

        let raw_token = get_cookie(req.headers(), &self.cookie_name);
        let decision = self.guard.evaluate(&path, raw_token.as_deref());
        let query = req.uri().query().map(str::to_string);

        match decision {
            Decision::Continue(None) => Box::pin(inner.call(req)),

            Decision::Continue(Some(claims)) => {
                let identity = identity_headers(&claims);
                for (name, value) in &identity {
                    req.headers_mut().insert(name.clone(), value.clone());
                }
                req.extensions_mut().insert(claims);

                Box::pin(async move {
                    let mut response = inner.call(req).await?;
                    for (name, value) in identity {
                        response.headers_mut().insert(name, value);
                    }
                    Ok(response)
                })
            }

            Decision::RedirectLogin => {
                let location = with_query(self.guard.login_path(), query.as_deref());
                info!("No valid session for {}, redirecting to {}", path, location);

                let clear = match delete_cookie(&self.cookie_name, self.secure_cookies) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        warn!("Could not build session clearing cookie: {}", e);
                        None
                    }
                };
                ready(redirect(&location, clear))
            }

            Decision::RedirectDashboard(dashboard) => {
                let location = with_query(dashboard, query.as_deref());
                debug!("Redirecting {} to dashboard {}", path, location);
                ready(redirect(&location, None))
            }
        }
    }
}

/// `x-user-id` and `x-user-roles` for the decoded principal. Values that are
/// not legal in a header are left out.
fn identity_headers(claims: &SessionClaims) -> Vec<(HeaderName, HeaderValue)> {
    [
        (USER_ID_HEADER, claims.sub.clone()),
        (USER_ROLES_HEADER, claims.roles_header()),
    ]
    .into_iter()
    .filter_map(|(name, value)| match HeaderValue::from_str(&value) {
        Ok(value) => Some((HeaderName::from_static(name), value)),
        Err(_) => {
            warn!("Dropping {} header: value is not a valid header", name);
            None
        }
    })
    .collect()
}

fn with_query(location: &str, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("{}?{}", location, q),
        _ => location.to_string(),
    }
}

fn redirect(location: &str, cookie: Option<HeaderValue>) -> Response<BoxBody<Bytes, Infallible>> {
    deliver_redirect_with_cookie(location, cookie).unwrap_or_else(|e| {
        warn!("Failed to build redirect to {}: {}", location, e);
        fallback_error(&ErrorResponse::internal(), StatusCode::INTERNAL_SERVER_ERROR)
    })
}

fn ready<E: Send + 'static>(response: Response<BoxBody<Bytes, Infallible>>) -> GuardFuture<E> {
    Box::pin(async move { Ok(response) })
}
