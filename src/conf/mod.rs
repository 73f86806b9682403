//! Configuration synthesis core.
//!
//! # Data Flow
//! ```text
//! external change events
//!     → vhost.rs (per-host policy values)
//!     → normalize.rs (overlay document → string-keyed form)
//!     → store.rs (aggregate: mutate, mark dirty, save next snapshot)
//! ```
//!
//! # Design Decisions
//! - VHost and Application are immutable values; updates replace, never merge
//! - The aggregate always derives from the base snapshot (lmConf-1.js) plus
//!   its full in-memory state, never from the previous derived snapshot
//! - Snapshot documents are serde_json values; the default map keeps keys
//!   sorted, which makes serialization deterministic and diffable

pub mod normalize;
pub mod store;
pub mod vhost;

pub use normalize::normalize;
pub use store::{config_name, config_number, ConfError, ConfStore, CFG_AUTHOR};
pub use vhost::{Application, VHost};
