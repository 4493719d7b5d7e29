//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Detect conflicting engine exit code mappings
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ScanConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::ScanConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    /// Human readable explanation.
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &ScanConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.trim().is_empty() {
        errors.push(ValidationError::new("listener.bind_address", "must not be empty"));
    }

    if config.limits.max_body_size == 0 {
        errors.push(ValidationError::new("limits.max_body_size", "must be greater than zero"));
    }
    if config.limits.max_concurrent_scans == Some(0) {
        errors.push(ValidationError::new(
            "limits.max_concurrent_scans",
            "must be greater than zero",
        ));
    }
    if config.limits.admission_timeout_secs == Some(0) {
        errors.push(ValidationError::new(
            "limits.admission_timeout_secs",
            "must be greater than zero when set",
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than zero"));
    }
    if config.timeouts.scan_secs == 0 {
        errors.push(ValidationError::new("timeouts.scan_secs", "must be greater than zero"));
    }
    if config.timeouts.scan_secs > config.timeouts.request_secs {
        errors.push(ValidationError::new(
            "timeouts.scan_secs",
            format!(
                "scan deadline ({}s) exceeds request timeout ({}s)",
                config.timeouts.scan_secs, config.timeouts.request_secs
            ),
        ));
    }

    if config.engine.program.trim().is_empty() {
        errors.push(ValidationError::new("engine.program", "must not be empty"));
    }
    if config.engine.label.trim().is_empty() {
        errors.push(ValidationError::new("engine.label", "must not be empty"));
    }
    if config.engine.infected_exit_code == config.engine.config_error_exit_code {
        errors.push(ValidationError::new(
            "engine.config_error_exit_code",
            "must differ from engine.infected_exit_code",
        ));
    }
    if config.engine.infected_exit_code == 0 || config.engine.config_error_exit_code == 0 {
        errors.push(ValidationError::new(
            "engine",
            "exit code 0 is reserved for clean results",
        ));
    }

    if config.buffers.content_capacity > config.buffers.max_retained_capacity {
        errors.push(ValidationError::new(
            "buffers.content_capacity",
            "must not exceed buffers.max_retained_capacity",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
