//! Engram server library
//!
//! Exposes the API router and application state so integration tests can
//! drive the HTTP surface in-process.

pub mod api;

pub use api::{router, AppState};
