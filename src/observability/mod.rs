//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Sync engine, disk store, change notifier produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Every failure on the background path is logged where it is absorbed
//! - Metrics are labelled by namespace
//! - Subscriber and exporter are installed by the binary, not the library

pub mod logging;
pub mod metrics;
