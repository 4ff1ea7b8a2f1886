//! Block size and sample rate negotiation.

use crate::error::{EngineError, Result};

/// Defaults every channel falls back to when it cannot inherit.
///
/// A context is carried by every channel so that operators (`&a + &b`) can
/// build new channels without a global singleton.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphContext {
    block_size: usize,
    sample_rate: f64,
    control_block_size: usize,
}

impl GraphContext {
    /// Creates a context. Both sizes must be non-zero and the rate positive.
    pub fn new(sample_rate: f64, block_size: usize, control_block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(EngineError::ItemCountInvalid(block_size));
        }
        if control_block_size == 0 {
            return Err(EngineError::ItemCountInvalid(control_block_size));
        }
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(EngineError::ItemCountInvalid(0));
        }
        Ok(Self {
            block_size,
            sample_rate,
            control_block_size,
        })
    }

    /// Default audio block size in samples.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Default audio sample rate in Hz.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Audio samples per control-rate sample.
    pub fn control_block_size(&self) -> usize {
        self.control_block_size
    }

    /// Control rate: one value per `control_block_size` audio samples.
    pub fn control_sample_rate(&self) -> f64 {
        self.sample_rate / self.control_block_size as f64
    }

    /// Block length of a control-rate channel.
    ///
    /// A control channel spans the same time as one audio block, so its block
    /// holds `block_size / control_block_size` values (at least one).
    pub fn control_block_len(&self) -> usize {
        (self.block_size / self.control_block_size).max(1)
    }
}

impl Default for GraphContext {
    fn default() -> Self {
        Self {
            block_size: 512,
            sample_rate: 44_100.0,
            control_block_size: 512,
        }
    }
}

/// How a channel chooses its block size or sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Preference<T> {
    /// Use exactly this value.
    Explicit(T),
    /// The largest input value, but never below the context default.
    #[default]
    Default,
    /// The largest input value; the context default when there are no inputs.
    Inherit,
}

impl<T: Copy + PartialOrd> Preference<T> {
    /// Resolves the preference against the inherited input values.
    ///
    /// Constant inputs must be filtered out by the caller: they do not take
    /// part in negotiation.
    pub fn resolve<I>(self, default: T, inputs: I) -> T
    where
        I: IntoIterator<Item = T>,
    {
        let widest = inputs.into_iter().fold(None, |acc: Option<T>, v| match acc {
            Some(a) if a >= v => Some(a),
            _ => Some(v),
        });
        match self {
            Self::Explicit(v) => v,
            Self::Default => match widest {
                Some(w) if w > default => w,
                _ => default,
            },
            Self::Inherit => widest.unwrap_or(default),
        }
    }
}
