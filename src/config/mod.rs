//! Daemon settings subsystem.
//!
//! # Data Flow
//! ```text
//! settings file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ControllerSettings (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Settings are immutable once loaded; changing them means restarting
//! - All fields have defaults so a missing settings file still works
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_settings, SettingsError};
pub use schema::ControllerSettings;
