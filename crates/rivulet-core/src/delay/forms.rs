//! Delay forms: what a delay does with the sample it reads.

use libm::powf;

/// Per-tick scratch shared by the hooks of a [`DelayForm`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DelayTick {
    /// Sample rate of the delay channel in Hz.
    pub sample_rate: f32,
    /// Read offset in samples (from parameter 1).
    pub delay: f32,
    /// Form-specific coefficient (from parameter 2).
    pub coefficient: f32,
    /// Input sample. Zero on secondary taps.
    pub input: f32,
    /// Sample read from the ring buffer.
    pub read: f32,
    /// Sample to store in the ring buffer. Only the primary tap stores it.
    pub write: f32,
    /// Sample emitted by the tap.
    pub output: f32,
}

/// Hooks run once per tick, in order: `param1`, `param2`, `input`, read,
/// `write`, `output`.
///
/// Reading is done by the delay itself (linear interpolation at
/// `write_position - delay`). All hooks are associated functions so each form
/// is a zero-sized type and the whole tick inlines.
pub trait DelayForm: Send + 'static {
    /// Name used for the delay node.
    const NAME: &'static str;

    /// Converts parameter 1 (seconds) into [`DelayTick::delay`].
    #[inline]
    fn param1(tick: &mut DelayTick, seconds: f32) {
        tick.delay = seconds * tick.sample_rate;
    }

    /// Converts parameter 2 into [`DelayTick::coefficient`].
    #[inline]
    fn param2(tick: &mut DelayTick, value: f32) {
        tick.coefficient = value;
    }

    /// Stores the input sample.
    #[inline]
    fn input(tick: &mut DelayTick, x: f32) {
        tick.input = x;
    }

    /// Computes [`DelayTick::write`].
    fn write(tick: &mut DelayTick);

    /// Computes [`DelayTick::output`].
    fn output(tick: &mut DelayTick);
}

/// Feedback comb: `w = x + c * r`, `y = r`.
///
/// With `c = 0` this is a plain delay.
#[derive(Debug, Clone, Copy, Default)]
pub struct CombFeedback;

impl DelayForm for CombFeedback {
    const NAME: &'static str = "CombFeedback";

    #[inline]
    fn write(tick: &mut DelayTick) {
        tick.write = tick.input + tick.coefficient * tick.read;
    }

    #[inline]
    fn output(tick: &mut DelayTick) {
        tick.output = tick.read;
    }
}

/// Feedback comb whose parameter 2 is a decay time in seconds: the time for
/// the echoes to fall by 60 dB. Negative decay inverts the feedback.
#[derive(Debug, Clone, Copy, Default)]
pub struct CombDecay;

impl DelayForm for CombDecay {
    const NAME: &'static str = "CombDecay";

    #[inline]
    fn param2(tick: &mut DelayTick, decay: f32) {
        tick.coefficient = decay_to_feedback(tick.delay / tick.sample_rate, decay);
    }

    #[inline]
    fn write(tick: &mut DelayTick) {
        CombFeedback::write(tick);
    }

    #[inline]
    fn output(tick: &mut DelayTick) {
        CombFeedback::output(tick);
    }
}

/// Feed-forward comb: `w = x`, `y = x + c * r`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedForward;

impl DelayForm for FeedForward {
    const NAME: &'static str = "FeedForward";

    #[inline]
    fn write(tick: &mut DelayTick) {
        tick.write = tick.input;
    }

    #[inline]
    fn output(tick: &mut DelayTick) {
        tick.output = tick.input + tick.coefficient * tick.read;
    }
}

/// Schroeder all-pass: `w = x + c * r`, `y = r - c * w`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllPass;

impl DelayForm for AllPass {
    const NAME: &'static str = "AllPass";

    #[inline]
    fn write(tick: &mut DelayTick) {
        tick.write = tick.input + tick.coefficient * tick.read;
    }

    #[inline]
    fn output(tick: &mut DelayTick) {
        tick.output = tick.read - tick.coefficient * tick.write;
    }
}

/// Feedback coefficient giving a 60 dB decay over `decay` seconds for a loop
/// of `delay` seconds.
pub fn decay_to_feedback(delay: f32, decay: f32) -> f32 {
    if decay == 0.0 || delay <= 0.0 {
        return 0.0;
    }
    let magnitude = powf(0.001, delay / decay.abs());
    if decay < 0.0 { -magnitude } else { magnitude }
}
