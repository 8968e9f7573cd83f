//! HTTP adapter.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, CORS, timeout)
//!     → handlers.rs (decode body, call TransferService, map errors)
//!     → JSON response
//! ```
//!
//! The adapter holds no transfer logic of its own.

pub mod handlers;
pub mod server;

pub use server::{AppState, HttpServer, TRANSFER_ROUTES, X_REQUEST_ID};
