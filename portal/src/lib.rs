//! Page server for the learning portal.
//!
//! Every request passes through a timeout layer and the access guard before
//! reaching the page router. The guard decides from the session cookie alone;
//! the portal keeps no session state of its own.

pub mod handlers;
pub mod tower_middle;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tower::ServiceBuilder;

use shared::auth::AccessGuard;
use shared::types::AppConfig;

use crate::handlers::http::{PageService, build_router};
use crate::tower_middle::{AccessGuardLayer, AccessGuardService, TimeoutLayer, TimeoutService};

/// Read-only state shared by every connection.
#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub guard: Arc<AccessGuard>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self> {
        let guard = AccessGuard::from_config(&config.auth, &config.routes)
            .context("Failed to build the route rule table")?;

        Ok(Self {
            config: Arc::new(config),
            guard: Arc::new(guard),
        })
    }
}

/// The full service stack: timeout, then access guard, then pages.
pub type PortalService = TimeoutService<AccessGuardService<PageService>>;

pub fn app(state: AppState) -> PortalService {
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    ServiceBuilder::new()
        .layer(TimeoutLayer::new(timeout))
        .layer(AccessGuardLayer::new(state.guard.clone(), &state.config.auth))
        .service(PageService::new(build_router(), state))
}
