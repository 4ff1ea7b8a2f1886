//! Configuration for rivulet engines.
//!
//! [`EngineConfig`] holds the settings a host needs to build a graph: sample
//! rate, block sizes, channel count, container capacities and patch
//! defaults. Settings are stored as TOML; every field is optional in the file.
//!
//! # Example
//!
//! ```rust,no_run
//! use rivulet_config::EngineConfig;
//!
//! let config = EngineConfig::load("engine.toml").unwrap();
//! let ctx = config.to_context().unwrap();
//! println!("{} Hz, {} samples per block", ctx.sample_rate(), ctx.block_size());
//!
//! let tweaked = EngineConfig {
//!     block_size: 128,
//!     ..config
//! };
//! tweaked.save("engine.toml").unwrap();
//! ```

mod engine_config;
mod error;

/// Range checks for engine settings.
pub mod validation;

pub use engine_config::EngineConfig;
pub use error::ConfigError;
pub use validation::{ValidationError, ValidationResult, validate_config};
