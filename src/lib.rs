//! Authentication gateway configuration controller library.

pub mod conf;
pub mod config;
pub mod convert;
pub mod reload;
pub mod storage;
pub mod watch;

pub use conf::{ConfStore, VHost};
pub use config::ControllerSettings;
pub use watch::Controller;
