pub mod auth;
pub mod pages;
pub mod routes;
pub mod utils;

pub use routes::{PageService, Router, build_router};
