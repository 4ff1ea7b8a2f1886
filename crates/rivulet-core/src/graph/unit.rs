//! Ordered collections of channels.

use super::channel::{Channel, Kernel, build};
use super::context::GraphContext;
use crate::error::{EngineError, Result};
use crate::units::{Constant, Samples};

/// An ordered, non-empty array of [`Channel`]s.
///
/// A unit is what graph constructors consume and return: a stereo signal is a
/// two-channel unit, a multi-tap delay returns one channel per tap. Cloning a
/// unit clones its handles, not the nodes behind them.
#[derive(Debug, Clone)]
pub struct Unit {
    channels: Vec<Channel>,
}

impl Unit {
    /// Wraps `channels`. Fails with [`EngineError::ItemCountInvalid`] if empty.
    pub fn from_channels(channels: Vec<Channel>) -> Result<Self> {
        if channels.is_empty() {
            return Err(EngineError::ItemCountInvalid(0));
        }
        Ok(Self { channels })
    }

    /// Builds a node around `kernel` and returns a unit of its outputs.
    pub fn from_kernel<K: Kernel>(ctx: &GraphContext, kernel: K) -> Self {
        Self {
            channels: build(ctx, kernel),
        }
    }

    /// Single-channel constant.
    pub fn constant(ctx: &GraphContext, value: f32) -> Self {
        Self::from_kernel(ctx, Constant::new(value))
    }

    /// One constant channel per value.
    pub fn constants(ctx: &GraphContext, values: &[f32]) -> Result<Self> {
        let channels = values
            .iter()
            .flat_map(|&v| build(ctx, Constant::new(v)))
            .collect();
        Self::from_channels(channels)
    }

    /// Silent single-channel unit.
    pub fn null(ctx: &GraphContext) -> Self {
        Self::from_kernel(ctx, Constant::null())
    }

    /// Plays `table` in a loop, one context block per pull.
    ///
    /// Fails with [`EngineError::ItemCountInvalid`] on an empty table.
    pub fn samples(ctx: &GraphContext, table: Vec<f32>) -> Result<Self> {
        Ok(Self::from_kernel(ctx, Samples::new(table)?))
    }

    /// Number of channels.
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Channel `index`, or [`EngineError::IndexOutOfRange`].
    pub fn channel(&self, index: usize) -> Result<&Channel> {
        self.channels.get(index).ok_or(EngineError::IndexOutOfRange {
            index,
            len: self.channels.len(),
        })
    }

    /// Channel `index` modulo the channel count.
    ///
    /// Used wherever a narrower unit is spread over a wider one: a mono
    /// parameter applied to every channel of a stereo signal.
    pub fn channel_wrapped(&self, index: usize) -> &Channel {
        &self.channels[index % self.channels.len()]
    }

    /// All channels in order.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Iterator over the channels.
    pub fn iter(&self) -> core::slice::Iter<'_, Channel> {
        self.channels.iter()
    }

    /// Appends the channels of `other`.
    pub fn append(&mut self, other: &Unit) {
        self.channels.extend(other.channels.iter().cloned());
    }

    /// Context of the first channel.
    pub fn context(&self) -> &GraphContext {
        self.channels[0].context()
    }

    /// Largest block size over all channels.
    pub fn max_block_size(&self) -> usize {
        self.channels.iter().map(Channel::block_size).max().unwrap_or(1)
    }

    /// Sums all channels into a single-channel unit.
    pub fn mix(&self) -> Unit {
        let mut channels = self.channels.iter();
        let mut acc = Unit {
            channels: channels.next().into_iter().cloned().collect(),
        };
        for channel in channels {
            let next = Unit {
                channels: vec![channel.clone()],
            };
            acc = &acc + &next;
        }
        acc
    }
}

impl<'a> IntoIterator for &'a Unit {
    type Item = &'a Channel;
    type IntoIter = core::slice::Iter<'a, Channel>;

    fn into_iter(self) -> Self::IntoIter {
        self.channels.iter()
    }
}

impl From<Channel> for Unit {
    fn from(channel: Channel) -> Self {
        Self {
            channels: vec![channel],
        }
    }
}
