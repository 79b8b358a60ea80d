//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! start():
//!     Load disk fallbacks → Initial remote fetch → Spawn one loop per namespace
//!
//! stop() (shutdown.rs):
//!     Trigger signal → Loops abandon in-flight fetches → Join every task
//! ```
//!
//! # Design Decisions
//! - Lifecycle is owned by the caller's client object, no global instance
//! - stop() returns only after every background task has exited
//! - start() and stop() are both idempotent

pub mod shutdown;

pub use shutdown::{Shutdown, ShutdownSignal};
