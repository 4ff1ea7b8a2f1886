//! Ring-buffer delays.
//!
//! A [`Delay`] node owns one ring buffer and one output per tap. Every tick
//! runs the hooks of its [`DelayForm`] over a [`DelayTick`] scratch. Tap 0 is
//! the primary tap: it consumes the input and writes the buffer. The other
//! taps only read, starting from the same block-start write position, so a
//! multi-tap delay reads one history at several offsets.
//!
//! Blocks are processed in contiguous segments that never cross the end of
//! the buffer (see [`Segments`]), so the inner loop has no wrap test.
//!
//! ```rust
//! use rivulet_core::{CombFeedback, Delay, GraphContext, ProcessInfo, Unit};
//!
//! let ctx = GraphContext::new(1_000.0, 8, 8).unwrap();
//! let impulse = Unit::samples(&ctx, vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
//! let delayed = Delay::<CombFeedback>::plain(&impulse, &Unit::constant(&ctx, 0.003), 0.01);
//!
//! let mut out = [0.0; 8];
//! delayed.channel(0).unwrap().pull(&mut ProcessInfo::new(), &mut out);
//! assert_eq!(out, [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
//! ```

mod forms;

use core::marker::PhantomData;
use core::ops::Range;

pub use forms::{AllPass, CombDecay, CombFeedback, DelayForm, DelayTick, FeedForward, decay_to_feedback};

use crate::graph::{InitContext, Input, Kernel, Preference, ProcessInfo, Unit, for_each_sample};

/// Splits `count` samples starting at `start` in a ring of `buffer_len` into
/// contiguous buffer ranges.
///
/// Each range is at most `buffer_len - position` long; after a range that
/// reaches the end, the position wraps to zero.
#[derive(Debug, Clone)]
pub struct Segments {
    buffer_len: usize,
    position: usize,
    remaining: usize,
}

impl Segments {
    /// Starts at `start`, which must be below `buffer_len`.
    pub fn new(buffer_len: usize, start: usize, count: usize) -> Self {
        debug_assert!(start < buffer_len);
        Self {
            buffer_len,
            position: start,
            remaining: count,
        }
    }

    /// Write position after the ranges yielded so far.
    pub fn position(&self) -> usize {
        self.position
    }
}

impl Iterator for Segments {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Range<usize>> {
        if self.remaining == 0 || self.buffer_len == 0 {
            return None;
        }
        let len = self.remaining.min(self.buffer_len - self.position);
        let range = self.position..self.position + len;
        self.remaining -= len;
        self.position += len;
        if self.position == self.buffer_len {
            self.position = 0;
        }
        Some(range)
    }
}

struct DelayLine {
    buffer: Box<[f32]>,
    write_position: usize,
    max_delay: f32,
    sample_rate: f32,
}

impl DelayLine {
    fn read(&self, position: usize, delay: f32) -> f32 {
        let len = self.buffer.len();
        let mut at = position as f32 - delay;
        if at < 0.0 {
            at += len as f32;
        }
        let whole = libm::floorf(at);
        let frac = at - whole;
        let i0 = (whole as usize) % len;
        let i1 = (i0 + 1) % len;
        let a = self.buffer[i0];
        a + (self.buffer[i1] - a) * frac
    }

    /// Runs one tap over a block starting at `start` and returns the write
    /// position after it.
    fn run_tap<F: DelayForm, const PRIMARY: bool>(
        &mut self,
        start: usize,
        inputs: [&[f32]; 3],
        out: &mut [f32],
    ) -> usize {
        let len = out.len();
        let mut segments = Segments::new(self.buffer.len(), start, len);
        let mut offset = 0;
        for segment in segments.by_ref() {
            let base = segment.start;
            let span = offset..offset + segment.len();
            for_each_sample(span.clone(), len, inputs, |i, [x, seconds, coefficient]| {
                let position = base + (i - span.start);
                let mut tick = DelayTick {
                    sample_rate: self.sample_rate,
                    ..DelayTick::default()
                };
                F::param1(&mut tick, seconds);
                tick.delay = tick.delay.clamp(1.0, self.max_delay);
                F::param2(&mut tick, coefficient);
                if PRIMARY {
                    F::input(&mut tick, x);
                }
                tick.read = self.read(position, tick.delay);
                F::write(&mut tick);
                if PRIMARY {
                    self.buffer[position] = tick.write;
                }
                F::output(&mut tick);
                out[i] = tick.output;
            });
            offset = span.end;
        }
        segments.position()
    }
}

/// Multi-tap ring-buffer delay with form `F`.
pub struct Delay<F: DelayForm> {
    input: Input,
    /// Delay time and coefficient per tap.
    taps: Vec<[Input; 2]>,
    max_seconds: f32,
    line: DelayLine,
    form: PhantomData<F>,
}

impl<F: DelayForm> Delay<F> {
    /// One independent delay per channel. Channel counts of `input`,
    /// `seconds` and `coefficient` wrap to the widest.
    ///
    /// Delay times are clamped to `[1 sample, max_seconds]`.
    pub fn unit(input: &Unit, seconds: &Unit, coefficient: &Unit, max_seconds: f32) -> Unit {
        let width = input
            .num_channels()
            .max(seconds.num_channels())
            .max(coefficient.num_channels());
        let mut unit = Self::node(input, seconds, coefficient, max_seconds, 0, 1);
        for i in 1..width {
            unit.append(&Self::node(input, seconds, coefficient, max_seconds, i, 1));
        }
        unit
    }

    /// One buffer fed by channel 0 of `input`, read by one tap per channel of
    /// the wider parameter unit.
    pub fn multi_tap(input: &Unit, seconds: &Unit, coefficient: &Unit, max_seconds: f32) -> Unit {
        let taps = seconds.num_channels().max(coefficient.num_channels());
        Self::node(input, seconds, coefficient, max_seconds, 0, taps)
    }

    fn node(input: &Unit, seconds: &Unit, coefficient: &Unit, max_seconds: f32, index: usize, taps: usize) -> Unit {
        let ctx = *input.context();
        let tap_inputs = (0..taps)
            .map(|t| {
                [
                    Input::new(seconds.channel_wrapped(index + t).clone()),
                    Input::new(coefficient.channel_wrapped(index + t).clone()),
                ]
            })
            .collect();
        Unit::from_kernel(
            &ctx,
            Self {
                input: Input::new(input.channel_wrapped(index).clone()),
                taps: tap_inputs,
                max_seconds,
                line: DelayLine {
                    buffer: Box::default(),
                    write_position: 0,
                    max_delay: 1.0,
                    sample_rate: ctx.sample_rate() as f32,
                },
                form: PhantomData,
            },
        )
    }
}

impl Delay<CombFeedback> {
    /// Plain delay: a feedback comb with zero feedback.
    pub fn plain(input: &Unit, seconds: &Unit, max_seconds: f32) -> Unit {
        let zero = Unit::constant(input.context(), 0.0);
        Self::unit(input, seconds, &zero, max_seconds)
    }
}

impl<F: DelayForm> Kernel for Delay<F> {
    fn name(&self) -> &'static str {
        F::NAME
    }

    fn num_outputs(&self) -> usize {
        self.taps.len()
    }

    fn init(&mut self, ctx: &mut InitContext<'_>) {
        ctx.decide(Preference::Default, Preference::Default, [self.input.channel()]);
        let sample_rate = ctx.sample_rate() as f32;
        let max_samples = libm::ceilf(self.max_seconds * sample_rate).max(1.0);
        // Secondary taps read after the primary tap has written the whole
        // block, so the ring holds one extra block beyond the longest delay.
        let len = max_samples as usize + ctx.block_size() + 1;
        self.line = DelayLine {
            buffer: vec![0.0; len].into_boxed_slice(),
            write_position: 0,
            max_delay: max_samples,
            sample_rate,
        };
        tracing::debug!(form = F::NAME, taps = self.taps.len(), buffer = len, "delay_init");
    }

    fn process(&mut self, info: &mut ProcessInfo, outputs: &mut [Box<[f32]>]) {
        self.input.pull(info);
        for [seconds, coefficient] in &mut self.taps {
            seconds.pull(info);
            coefficient.pull(info);
        }

        let start = self.line.write_position;
        let mut end = start;
        for (t, out) in outputs.iter_mut().enumerate() {
            let [seconds, coefficient] = &self.taps[t];
            let inputs = [self.input.samples(), seconds.samples(), coefficient.samples()];
            if t == 0 {
                end = self.line.run_tap::<F, true>(start, inputs, out);
            } else {
                self.line.run_tap::<F, false>(start, inputs, out);
            }
        }
        self.line.write_position = end;
    }
}
