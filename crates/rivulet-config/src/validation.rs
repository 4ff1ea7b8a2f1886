//! Range checks for engine settings.
//!
//! [`validate_config`] collects every problem instead of stopping at the
//! first, so a hand-edited file can be fixed in one pass.

use thiserror::Error;

use crate::engine_config::EngineConfig;

/// Sample rates accepted by [`validate_config`], in Hz.
pub const SAMPLE_RATE_RANGE: (f64, f64) = (1_000.0, 384_000.0);

/// Largest accepted audio block size.
pub const MAX_BLOCK_SIZE: usize = 8192;

/// Largest accepted host channel count.
pub const MAX_CHANNELS: usize = 64;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Value out of range.
    #[error("'{field}' value {value} out of range [{min}, {max}]")]
    OutOfRange {
        /// Name of the setting.
        field: &'static str,
        /// The value that was out of range.
        value: f64,
        /// Minimum allowed value.
        min: f64,
        /// Maximum allowed value.
        max: f64,
    },

    /// The control block does not divide the audio block.
    #[error("control_block_size {control_block_size} does not divide block_size {block_size}")]
    ControlBlockMismatch {
        /// Audio block size.
        block_size: usize,
        /// Control block size.
        control_block_size: usize,
    },

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

fn check_range(errors: &mut Vec<ValidationError>, field: &'static str, value: f64, min: f64, max: f64) {
    if !(min..=max).contains(&value) {
        errors.push(ValidationError::OutOfRange { field, value, min, max });
    }
}

/// Checks every setting of `config`.
pub fn validate_config(config: &EngineConfig) -> ValidationResult<()> {
    let mut errors = Vec::new();

    check_range(
        &mut errors,
        "sample_rate",
        config.sample_rate,
        SAMPLE_RATE_RANGE.0,
        SAMPLE_RATE_RANGE.1,
    );
    check_range(&mut errors, "block_size", config.block_size as f64, 1.0, MAX_BLOCK_SIZE as f64);
    check_range(
        &mut errors,
        "control_block_size",
        config.control_block_size as f64,
        1.0,
        config.block_size.max(1) as f64,
    );
    if config.control_block_size > 0
        && config.block_size > 0
        && config.block_size % config.control_block_size != 0
    {
        errors.push(ValidationError::ControlBlockMismatch {
            block_size: config.block_size,
            control_block_size: config.control_block_size,
        });
    }
    check_range(&mut errors, "channels", config.channels as f64, 1.0, MAX_CHANNELS as f64);
    check_range(
        &mut errors,
        "control_queue_capacity",
        config.control_queue_capacity as f64,
        1.0,
        f64::from(u16::MAX),
    );
    check_range(
        &mut errors,
        "retire_capacity",
        config.retire_capacity as f64,
        1.0,
        f64::from(u16::MAX),
    );
    check_range(&mut errors, "patch_fade_seconds", f64::from(config.patch_fade_seconds), 0.0, 10.0);

    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}
