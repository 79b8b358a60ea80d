//! Change notification subsystem.
//!
//! # Data Flow
//! ```text
//! Sync engine installs a snapshot with different content
//!     → diff.rs (old, new) → ChangeEvent
//!     → listener.rs notify(namespace, event)
//!     → each registered listener, isolated from the others
//! ```
//!
//! # Design Decisions
//! - Diffing is a pure function over two snapshots
//! - Empty events are never delivered
//! - A failing or panicking listener never reaches the sync loop

pub mod diff;
pub mod listener;

pub use diff::{diff, ChangeEvent, ChangedKey};
pub use listener::{ChangeListener, ChangeNotifier, ListenerId, NotifyReport};
