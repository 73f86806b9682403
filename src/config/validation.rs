//! Settings validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges and URL syntax
//! - Detect conflicting paths
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: ControllerSettings → Result<(), Vec<ValidationError>>
//! - Runs before the settings are accepted into the system

use url::Url;

use crate::config::schema::ControllerSettings;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// One semantic problem with the settings.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("paths.{0} must not be empty")]
    EmptyPath(&'static str),

    #[error("paths.routes_dir and paths.config_dir must differ")]
    RoutesInsideConfigDir,

    #[error("reload.url is not a valid URL: {0}")]
    InvalidReloadUrl(url::ParseError),

    #[error("reload.timeout_secs must be greater than zero")]
    ZeroReloadTimeout,

    #[error("controller.annotation_prefix must not be empty")]
    EmptyAnnotationPrefix,

    #[error("observability.log_level must be one of trace, debug, info, warn, error")]
    UnknownLogLevel,
}

/// Check everything serde cannot, collecting every violation.
pub fn validate_settings(settings: &ControllerSettings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if settings.paths.config_dir.as_os_str().is_empty() {
        errors.push(ValidationError::EmptyPath("config_dir"));
    }
    if settings.paths.routes_dir.as_os_str().is_empty() {
        errors.push(ValidationError::EmptyPath("routes_dir"));
    }
    if settings.paths.overlay_file.as_os_str().is_empty() {
        errors.push(ValidationError::EmptyPath("overlay_file"));
    }
    if settings.paths.routes_dir == settings.paths.config_dir {
        errors.push(ValidationError::RoutesInsideConfigDir);
    }

    if settings.reload.enabled {
        if let Err(err) = Url::parse(&settings.reload.url) {
            errors.push(ValidationError::InvalidReloadUrl(err));
        }
        if settings.reload.timeout_secs == 0 {
            errors.push(ValidationError::ZeroReloadTimeout);
        }
    }

    if settings.controller.annotation_prefix.is_empty() {
        errors.push(ValidationError::EmptyAnnotationPrefix);
    }

    if !LOG_LEVELS.contains(&settings.observability.log_level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
