use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use anyhow::{Context as _, Result};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::{Method, Request, Response, StatusCode};
use tower::Service;
use tracing::{debug, error};

use shared::types::ErrorResponse;

use crate::AppState;
use crate::handlers::http::{auth, pages, utils::*};

// ---------------------------------------------------------------------------
// Handler type
// ---------------------------------------------------------------------------
//
// Handlers never read a request body, so the router hands them a
// `Request<()>`. Access control has already happened in the guard layer by
// the time a handler runs.

type RouteHandler = Box<
    dyn Fn(
            Request<()>,
            AppState,
        )
            -> Pin<Box<dyn Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send>>
        + Send
        + Sync,
>;

struct Route {
    method: Method,
    path: String,
    handler: RouteHandler,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub struct Router {
    routes: Vec<Route>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes_count", &self.routes.len())
            .finish()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    pub fn get<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<()>, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.on(Method::GET, path, handler)
    }

    pub fn post<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<()>, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.on(Method::POST, path, handler)
    }

    fn on<F, Fut>(mut self, method: Method, path: &str, handler: F) -> Self
    where
        F: Fn(Request<()>, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.routes.push(Route {
            method,
            path: path.to_string(),
            handler: Box::new(move |req, state| Box::pin(handler(req, state))),
        });
        self
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    pub async fn route(
        &self,
        req: Request<()>,
        state: AppState,
    ) -> Result<Response<BoxBody<Bytes, Infallible>>> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let mut path_known = false;
        for route in &self.routes {
            if route.path != path {
                continue;
            }
            path_known = true;

            if Self::method_matches(&route.method, &method) {
                debug!("Dispatching {} {}", method, path);
                return (route.handler)(req, state).await;
            }
        }

        if path_known || !(method == Method::GET || method == Method::HEAD) {
            return method_not_allowed();
        }

        if let Some(page) = pages::serve_page(&path, &state).await? {
            return Ok(page);
        }

        deliver_error_json("NOT_FOUND", "Page not found", StatusCode::NOT_FOUND)
            .context("Failed to deliver 404 response")
    }

    /// HEAD is answered by the GET handler; hyper drops the body.
    fn method_matches(route: &Method, request: &Method) -> bool {
        route == request || (*route == Method::GET && *request == Method::HEAD)
    }
}

fn method_not_allowed() -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let error = ErrorResponse::method_not_allowed();
    deliver_error_json(&error.code, &error.message, StatusCode::METHOD_NOT_ALLOWED)
        .context("Failed to deliver 405 response")
}

// ---------------------------------------------------------------------------
// Portal router
// ---------------------------------------------------------------------------

pub fn build_router() -> Router {
    Router::new()
        .get("/health", |_req, _state| async move {
            deliver_serialized_json(
                &serde_json::json!({ "status": "success", "health": "ok" }),
                StatusCode::OK,
            )
        })
        .get("/api/session", auth::handle_session)
        .post("/api/auth/signout", auth::handle_signout)
}

// ---------------------------------------------------------------------------
// PageService
// ---------------------------------------------------------------------------

/// Innermost tower service: routes the request and turns handler failures
/// into a JSON 500.
#[derive(Clone)]
pub struct PageService {
    router: Arc<Router>,
    state: AppState,
}

impl PageService {
    pub fn new(router: Router, state: AppState) -> Self {
        Self {
            router: Arc::new(router),
            state,
        }
    }
}

impl<ReqBody> Service<Request<ReqBody>> for PageService {
    type Response = Response<BoxBody<Bytes, Infallible>>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let router = self.router.clone();
        let state = self.state.clone();

        let (parts, _body) = req.into_parts();
        let req = Request::from_parts(parts, ());

        Box::pin(async move {
            let method = req.method().clone();
            let path = req.uri().path().to_string();

            match router.route(req, state).await {
                Ok(response) => Ok(response),
                Err(e) => {
                    error!("Request {} {} failed: {:#}", method, path, e);
                    Ok(fallback_error(
                        &ErrorResponse::internal(),
                        StatusCode::INTERNAL_SERVER_ERROR,
                    ))
                }
            }
        })
    }
}
