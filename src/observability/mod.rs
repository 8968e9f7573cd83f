//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (tracing-subscriber fmt layer)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (stage, tx_hash, nonce, endpoint) on every transfer event
//! - Request ID flows from the HTTP layer into handler spans
//! - Metric calls are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
