//! Biquad filtering with time-varying coefficients.
//!
//! Coefficients are produced by a [`FilterCoeffs`] node: a proxy group with
//! five outputs `b0, b1, b2, a1, a2` (normalized by `a0`), computed from three
//! parameter inputs (frequency, Q, gain in dB) with the RBJ Audio EQ Cookbook
//! formulas. The parameters may be any mix of constant, control-rate and
//! audio-rate channels; each combination of "scalar / full block" runs its
//! own specialized loop.
//!
//! A [`Biquad`] channel consumes an input plus the five coefficient proxies
//! and runs a Direct Form I filter:
//!
//! ```text
//! y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
//! ```

use core::f32::consts::PI;

use libm::{cosf, powf, sinf};

use crate::graph::{GraphContext, InitContext, Input, Kernel, Preference, ProcessInfo, Unit, for_each_sample};

/// Number of coefficient outputs per filter channel.
pub const NUM_COEFFS: usize = 5;

/// Response shape of a [`FilterCoeffs`] group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterShape {
    /// 12 dB/oct low-pass. Gain is ignored.
    LowPass,
    /// 12 dB/oct high-pass. Gain is ignored.
    HighPass,
    /// Constant 0 dB peak band-pass. Gain is ignored.
    BandPass,
    /// Band-reject. Gain is ignored.
    Notch,
    /// Peaking EQ boosting or cutting by the gain.
    Peak,
}

/// Normalized biquad coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    /// Feedforward, current input.
    pub b0: f32,
    /// Feedforward, one sample back.
    pub b1: f32,
    /// Feedforward, two samples back.
    pub b2: f32,
    /// Feedback, one sample back.
    pub a1: f32,
    /// Feedback, two samples back.
    pub a2: f32,
}

impl Coefficients {
    fn normalized(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        let a0_inv = 1.0 / a0;
        Self {
            b0: b0 * a0_inv,
            b1: b1 * a0_inv,
            b2: b2 * a0_inv,
            a1: a1 * a0_inv,
            a2: a2 * a0_inv,
        }
    }

    fn as_array(self) -> [f32; NUM_COEFFS] {
        [self.b0, self.b1, self.b2, self.a1, self.a2]
    }
}

impl FilterShape {
    /// RBJ cookbook coefficients.
    ///
    /// Frequency is clamped into `(0, nyquist)` and Q to a small positive
    /// minimum so that any parameter value yields a finite filter.
    pub fn coefficients(self, frequency: f32, q: f32, gain_db: f32, sample_rate: f32) -> Coefficients {
        let nyquist = sample_rate * 0.5;
        let frequency = frequency.clamp(1.0e-3, nyquist * 0.999);
        let q = q.max(1.0e-3);

        let omega = 2.0 * PI * frequency / sample_rate;
        let cos_omega = cosf(omega);
        let sin_omega = sinf(omega);
        let alpha = sin_omega / (2.0 * q);

        match self {
            Self::LowPass => Coefficients::normalized(
                (1.0 - cos_omega) / 2.0,
                1.0 - cos_omega,
                (1.0 - cos_omega) / 2.0,
                1.0 + alpha,
                -2.0 * cos_omega,
                1.0 - alpha,
            ),
            Self::HighPass => Coefficients::normalized(
                (1.0 + cos_omega) / 2.0,
                -(1.0 + cos_omega),
                (1.0 + cos_omega) / 2.0,
                1.0 + alpha,
                -2.0 * cos_omega,
                1.0 - alpha,
            ),
            Self::BandPass => Coefficients::normalized(
                alpha,
                0.0,
                -alpha,
                1.0 + alpha,
                -2.0 * cos_omega,
                1.0 - alpha,
            ),
            Self::Notch => Coefficients::normalized(
                1.0,
                -2.0 * cos_omega,
                1.0,
                1.0 + alpha,
                -2.0 * cos_omega,
                1.0 - alpha,
            ),
            Self::Peak => {
                // sqrt(10^(dB/20))
                let a = powf(10.0, gain_db / 40.0);
                Coefficients::normalized(
                    1.0 + alpha * a,
                    -2.0 * cos_omega,
                    1.0 - alpha * a,
                    1.0 + alpha / a,
                    -2.0 * cos_omega,
                    1.0 - alpha / a,
                )
            }
        }
    }
}

/// Proxy group producing the five coefficients of one filter channel.
pub struct FilterCoeffs {
    shape: FilterShape,
    filter_rate: f32,
    params: [Input; 3],
    constant: bool,
}

impl FilterCoeffs {
    /// Coefficient unit for `shape`.
    ///
    /// The result holds [`NUM_COEFFS`] channels per filter channel
    /// (`b0, b1, b2, a1, a2`, then the next filter channel). The filter
    /// channel count is the widest of the three parameter units.
    pub fn unit(ctx: &GraphContext, shape: FilterShape, frequency: &Unit, q: &Unit, gain_db: &Unit) -> Unit {
        let width = frequency
            .num_channels()
            .max(q.num_channels())
            .max(gain_db.num_channels());
        let mut unit = Self::group(ctx, shape, frequency, q, gain_db, 0);
        for i in 1..width {
            unit.append(&Self::group(ctx, shape, frequency, q, gain_db, i));
        }
        unit
    }

    fn group(ctx: &GraphContext, shape: FilterShape, frequency: &Unit, q: &Unit, gain_db: &Unit, index: usize) -> Unit {
        let params = [frequency, q, gain_db].map(|u| Input::new(u.channel_wrapped(index).clone()));
        let constant = params.iter().all(|p| p.channel().is_constant());
        Unit::from_kernel(
            ctx,
            Self {
                shape,
                filter_rate: ctx.sample_rate() as f32,
                params,
                constant,
            },
        )
    }
}

impl Kernel for FilterCoeffs {
    fn name(&self) -> &'static str {
        "FilterCoeffs"
    }

    fn num_outputs(&self) -> usize {
        NUM_COEFFS
    }

    fn is_constant(&self) -> bool {
        self.constant
    }

    fn init(&mut self, ctx: &mut InitContext<'_>) {
        if self.constant {
            ctx.set_block_size(1);
        } else {
            ctx.decide(
                Preference::Inherit,
                Preference::Inherit,
                self.params.iter().map(Input::channel),
            );
        }
        let [f, q, g] = self.params.each_ref().map(|p| p.channel().initial_value());
        let initial = self.shape.coefficients(f, q, g, self.filter_rate).as_array();
        for (index, value) in initial.into_iter().enumerate() {
            ctx.set_initial_value(index, value);
        }
    }

    fn process(&mut self, info: &mut ProcessInfo, outputs: &mut [Box<[f32]>]) {
        for param in &mut self.params {
            param.pull(info);
        }
        let [b0, b1, b2, a1, a2] = outputs else {
            return;
        };

        let shape = self.shape;
        let rate = self.filter_rate;
        let len = b0.len();
        let [freq, res, gain] = &self.params;
        for_each_sample(0..len, len, [freq.samples(), res.samples(), gain.samples()], |i, [f, q, g]| {
            let c = shape.coefficients(f, q, g, rate);
            b0[i] = c.b0;
            b1[i] = c.b1;
            b2[i] = c.b2;
            a1[i] = c.a1;
            a2[i] = c.a2;
        });
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct FilterState {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl FilterState {
    #[inline]
    fn tick(&mut self, x: f32, [b0, b1, b2, a1, a2]: [f32; NUM_COEFFS]) -> f32 {
        let y = b0 * x + b1 * self.x1 + b2 * self.x2 - a1 * self.y1 - a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}

/// Direct Form I biquad driven by a coefficient group.
pub struct Biquad {
    /// Input signal followed by `b0, b1, b2, a1, a2`.
    inputs: [Input; 1 + NUM_COEFFS],
    state: FilterState,
}

impl Biquad {
    /// Filters `input` with `coeffs` as produced by [`FilterCoeffs::unit`].
    ///
    /// The output has as many channels as the wider of `input` and the
    /// coefficient groups; both wrap.
    pub fn unit(input: &Unit, coeffs: &Unit) -> Unit {
        let ctx = *input.context();
        let groups = (coeffs.num_channels() / NUM_COEFFS).max(1);
        let width = input.num_channels().max(groups);
        let mut unit = Self::channel(&ctx, input, coeffs, groups, 0);
        for i in 1..width {
            unit.append(&Self::channel(&ctx, input, coeffs, groups, i));
        }
        unit
    }

    /// Coefficient group and filter in one step.
    pub fn filter(shape: FilterShape, input: &Unit, frequency: &Unit, q: &Unit, gain_db: &Unit) -> Unit {
        let coeffs = FilterCoeffs::unit(input.context(), shape, frequency, q, gain_db);
        Self::unit(input, &coeffs)
    }

    /// Low-pass with constant gain.
    pub fn lowpass(input: &Unit, frequency: &Unit, q: &Unit) -> Unit {
        let unity = Unit::constant(input.context(), 0.0);
        Self::filter(FilterShape::LowPass, input, frequency, q, &unity)
    }

    /// High-pass with constant gain.
    pub fn highpass(input: &Unit, frequency: &Unit, q: &Unit) -> Unit {
        let unity = Unit::constant(input.context(), 0.0);
        Self::filter(FilterShape::HighPass, input, frequency, q, &unity)
    }

    fn channel(ctx: &GraphContext, input: &Unit, coeffs: &Unit, groups: usize, index: usize) -> Unit {
        let base = (index % groups) * NUM_COEFFS;
        let inputs = core::array::from_fn(|k| {
            let channel = if k == 0 {
                input.channel_wrapped(index)
            } else {
                coeffs.channel_wrapped(base + k - 1)
            };
            Input::new(channel.clone())
        });
        Unit::from_kernel(
            ctx,
            Self {
                inputs,
                state: FilterState::default(),
            },
        )
    }
}

impl Kernel for Biquad {
    fn name(&self) -> &'static str {
        "Biquad"
    }

    fn init(&mut self, ctx: &mut InitContext<'_>) {
        ctx.decide(Preference::Default, Preference::Default, [self.inputs[0].channel()]);
    }

    fn process(&mut self, info: &mut ProcessInfo, outputs: &mut [Box<[f32]>]) {
        for input in &mut self.inputs {
            input.pull(info);
        }

        let out = &mut outputs[0];
        let len = out.len();
        let state = &mut self.state;
        let samples = self.inputs.each_ref().map(Input::samples);
        for_each_sample(0..len, len, samples, |i, [x, b0, b1, b2, a1, a2]| {
            out[i] = state.tick(x, [b0, b1, b2, a1, a2]);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::Param;
    use crate::variable::Variable;

    fn run(unit: &Unit, blocks: usize) -> Vec<f32> {
        let channel = unit.channel(0).unwrap();
        let mut info = ProcessInfo::new();
        let mut block = vec![0.0; channel.block_size()];
        let mut all = Vec::new();
        for _ in 0..blocks {
            channel.pull(&mut info, &mut block);
            all.extend_from_slice(&block);
            info.advance();
        }
        all
    }

    #[test]
    fn test_coefficients_are_finite_for_every_shape() {
        for shape in [
            FilterShape::LowPass,
            FilterShape::HighPass,
            FilterShape::BandPass,
            FilterShape::Notch,
            FilterShape::Peak,
        ] {
            for (f, q) in [(1000.0, 0.707), (0.0, 0.0), (30_000.0, 10.0)] {
                let c = shape.coefficients(f, q, 6.0, 44_100.0);
                assert!(c.as_array().iter().all(|v| v.is_finite()), "{shape:?} {f} {q}");
            }
        }
    }

    #[test]
    fn test_coefficient_group_is_one_node_with_five_proxies() {
        let ctx = GraphContext::default();
        let coeffs = FilterCoeffs::unit(
            &ctx,
            FilterShape::LowPass,
            &Unit::constant(&ctx, 1000.0),
            &Unit::constant(&ctx, 0.707),
            &Unit::constant(&ctx, 0.0),
        );
        assert_eq!(coeffs.num_channels(), NUM_COEFFS);
        let first = coeffs.channel(0).unwrap();
        for (i, channel) in coeffs.iter().enumerate() {
            assert!(channel.same_node(first));
            assert_eq!(channel.output_index(), i);
        }
        let expected = FilterShape::LowPass.coefficients(1000.0, 0.707, 0.0, 44_100.0);
        assert_eq!(coeffs.channel(0).unwrap().initial_value(), expected.b0);
        assert_eq!(coeffs.channel(4).unwrap().initial_value(), expected.a2);
    }

    #[test]
    fn test_lowpass_passes_dc() {
        let ctx = GraphContext::new(44_100.0, 64, 64).unwrap();
        let dc = Unit::samples(&ctx, vec![1.0]).unwrap();
        let filtered = Biquad::lowpass(&dc, &Unit::constant(&ctx, 1000.0), &Unit::constant(&ctx, 0.707));
        let out = run(&filtered, 20);
        assert!((out.last().copied().unwrap() - 1.0).abs() < 0.05);
    }

    #[test]
    fn test_highpass_blocks_dc() {
        let ctx = GraphContext::new(44_100.0, 64, 64).unwrap();
        let dc = Unit::samples(&ctx, vec![1.0]).unwrap();
        let filtered = Biquad::highpass(&dc, &Unit::constant(&ctx, 1000.0), &Unit::constant(&ctx, 0.707));
        let out = run(&filtered, 40);
        assert!(out.last().copied().unwrap().abs() < 0.01);
    }

    #[test]
    fn test_mixed_rate_params_match_constant_params() {
        let ctx = GraphContext::new(44_100.0, 8, 4).unwrap();
        let noise: Vec<f32> = (0..8).map(|i| if i % 3 == 0 { 1.0 } else { -0.5 }).collect();
        let input = Unit::samples(&ctx, noise).unwrap();

        let constant = Biquad::lowpass(&input, &Unit::constant(&ctx, 2000.0), &Unit::constant(&ctx, 1.0));
        let freq = Variable::new(2000.0);
        let modulated = Biquad::lowpass(&input, &Param::kr(&ctx, &freq), &Param::ar(&ctx, &Variable::new(1.0)));

        let a = run(&constant, 4);
        let b = run(&modulated, 4);
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-6);
        }
    }
}
