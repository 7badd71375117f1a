//! Common library for the trail portal.
//!
//! Everything in here is synchronous and free of I/O except the config
//! loader, so the access decision for a request can be unit-tested without
//! an HTTP stack.

pub mod auth;
pub mod config;
pub mod types;
