//! Channels that follow a [`Variable`] written from another thread.

use crate::graph::{GraphContext, InitContext, Kernel, ProcessInfo, Unit};
use crate::variable::Variable;

/// Processing rate of a source channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rate {
    /// Context block size at the context sample rate.
    #[default]
    Audio,
    /// Control block length at the control sample rate.
    Control,
}

impl Rate {
    pub(crate) fn apply(self, ctx: &mut InitContext<'_>) {
        if self == Rate::Control {
            let graph = *ctx.graph();
            ctx.set_block_size(graph.control_block_len());
            ctx.set_sample_rate(graph.control_sample_rate());
        }
    }
}

/// Samples a [`Variable`] once per output sample.
///
/// The audio thread never waits for the writer: it may see a value one
/// store late, never a torn one.
#[derive(Debug, Clone)]
pub struct Param {
    variable: Variable,
    rate: Rate,
}

impl Param {
    /// Audio-rate parameter unit.
    pub fn ar(ctx: &GraphContext, variable: &Variable) -> Unit {
        Unit::from_kernel(
            ctx,
            Self {
                variable: variable.clone(),
                rate: Rate::Audio,
            },
        )
    }

    /// Control-rate parameter unit.
    pub fn kr(ctx: &GraphContext, variable: &Variable) -> Unit {
        Unit::from_kernel(
            ctx,
            Self {
                variable: variable.clone(),
                rate: Rate::Control,
            },
        )
    }
}

impl Kernel for Param {
    fn name(&self) -> &'static str {
        "Param"
    }

    fn init(&mut self, ctx: &mut InitContext<'_>) {
        self.rate.apply(ctx);
        ctx.set_initial_value(0, self.variable.get());
    }

    fn process(&mut self, _info: &mut ProcessInfo, outputs: &mut [Box<[f32]>]) {
        for sample in outputs[0].iter_mut() {
            *sample = self.variable.get();
        }
    }
}
