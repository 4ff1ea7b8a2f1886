//! Linear segment with an optional action on completion.

use crate::graph::{GraphContext, InitContext, Kernel, ProcessInfo, Unit};

use super::param::Rate;

/// What a finished [`Line`] does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DoneAction {
    /// Hold the end value.
    #[default]
    Hold,
    /// Hold the end value and latch [`ProcessInfo::set_should_delete`] so the
    /// owner can remove the graph.
    Delete,
}

/// Ramps from `start` to `end` over a fixed duration, then holds `end`.
#[derive(Debug, Clone)]
pub struct Line {
    start: f32,
    end: f32,
    seconds: f64,
    done: DoneAction,
    rate: Rate,
    value: f32,
    increment: f32,
    remaining: usize,
    finished: bool,
}

impl Line {
    /// Audio-rate line unit.
    pub fn unit(ctx: &GraphContext, start: f32, end: f32, seconds: f64, done: DoneAction) -> Unit {
        Self::with_rate(ctx, start, end, seconds, done, Rate::Audio)
    }

    /// Line unit at the given rate.
    pub fn with_rate(
        ctx: &GraphContext,
        start: f32,
        end: f32,
        seconds: f64,
        done: DoneAction,
        rate: Rate,
    ) -> Unit {
        Unit::from_kernel(
            ctx,
            Self {
                start,
                end,
                seconds: seconds.max(0.0),
                done,
                rate,
                value: start,
                increment: 0.0,
                remaining: 0,
                finished: false,
            },
        )
    }
}

impl Kernel for Line {
    fn name(&self) -> &'static str {
        "Line"
    }

    fn init(&mut self, ctx: &mut InitContext<'_>) {
        self.rate.apply(ctx);
        self.remaining = (self.seconds * ctx.sample_rate()).round() as usize;
        if self.remaining == 0 {
            self.value = self.end;
        } else {
            self.increment = (self.end - self.start) / self.remaining as f32;
        }
        ctx.set_initial_value(0, self.value);
    }

    fn process(&mut self, info: &mut ProcessInfo, outputs: &mut [Box<[f32]>]) {
        for sample in outputs[0].iter_mut() {
            *sample = self.value;
            if self.remaining > 0 {
                self.remaining -= 1;
                self.value = if self.remaining == 0 {
                    self.end
                } else {
                    self.value + self.increment
                };
            }
        }

        if self.remaining == 0 && !self.finished {
            self.finished = true;
            if self.done == DoneAction::Delete {
                tracing::debug!("line_done: requesting graph delete");
                info.set_should_delete();
            }
        }
    }
}
