//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ClientConfig (validated, immutable)
//!     → handed to ConfigClient at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once the client is built; the namespace set never changes
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::AppConfig;
pub use schema::CacheConfig;
pub use schema::ClientConfig;
pub use schema::ObservabilityConfig;
pub use schema::SyncConfig;
