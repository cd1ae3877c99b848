//! fromscreen server - screenshot to markup conversion API
//!
//! This crate provides the HTTP server that streams generated markup for an
//! uploaded screenshot, stores the finished result, and enforces a per-session
//! daily quota.

pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod image;
pub mod models;
pub mod pipeline;
pub mod protocol;
pub mod quota;
pub mod relay;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;
pub mod upstream;

pub use error::AppError;
pub use routes::create_router;
pub use state::AppState;
