/// Tower middleware module
///
/// This module contains Tower-based middleware layers for:
/// - Route access control (session cookie + role rules)
/// - Request timeouts
pub mod tower_access_guard;
pub mod tower_timeout_handler;

pub use tower_access_guard::{AccessGuardLayer, AccessGuardService};
pub use tower_timeout_handler::{TimeoutLayer, TimeoutService};
