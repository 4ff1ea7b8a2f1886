//! Element-wise binary operators between units.
//!
//! `&a + &b` builds one [`BinaryOp`] node per output channel; the narrower
//! operand is wrapped so a mono unit can scale every channel of a stereo one.
//! Both operands are reconciled against the output block (see
//! [`reconcile`](crate::graph::reconcile)), which gives the four classic
//! paths: both full blocks, left scalar, right scalar, and resampled.

use core::ops::{Add, Div, Mul, Sub};

use libm::powf;

use crate::graph::{GraphContext, InitContext, Input, Kernel, Preference, ProcessInfo, Unit, for_each_sample};

/// Operator applied by a [`BinaryOp`] channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    /// `a + b`
    Add,
    /// `a - b`
    Sub,
    /// `a * b`
    Mul,
    /// `a / b`
    Div,
    /// Smaller operand.
    Min,
    /// Larger operand.
    Max,
    /// `a` raised to `b`.
    Pow,
    /// `1.0` if `a < b`, else `0.0`.
    IsLess,
    /// `1.0` if `a > b`, else `0.0`.
    IsGreater,
    /// `1.0` if `a == b`, else `0.0`.
    IsEqual,
}

impl BinaryOperator {
    /// Applies the operator to one pair of samples.
    #[inline]
    pub fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            Self::Add => a + b,
            Self::Sub => a - b,
            Self::Mul => a * b,
            Self::Div => a / b,
            Self::Min => a.min(b),
            Self::Max => a.max(b),
            Self::Pow => powf(a, b),
            Self::IsLess => f32::from(u8::from(a < b)),
            Self::IsGreater => f32::from(u8::from(a > b)),
            Self::IsEqual => f32::from(u8::from(a == b)),
        }
    }

    /// Short name used for the node.
    pub fn name(self) -> &'static str {
        match self {
            Self::Add => "Add",
            Self::Sub => "Sub",
            Self::Mul => "Mul",
            Self::Div => "Div",
            Self::Min => "Min",
            Self::Max => "Max",
            Self::Pow => "Pow",
            Self::IsLess => "IsLess",
            Self::IsGreater => "IsGreater",
            Self::IsEqual => "IsEqual",
        }
    }
}

/// Kernel combining one channel of each operand.
pub struct BinaryOp {
    op: BinaryOperator,
    left: Input,
    right: Input,
    constant: bool,
}

impl BinaryOp {
    /// Applies `op` channel-wise; the result has as many channels as the
    /// wider operand.
    pub fn unit(op: BinaryOperator, left: &Unit, right: &Unit) -> Unit {
        let ctx = *left.context();
        let width = left.num_channels().max(right.num_channels());
        let mut unit = Self::channel(&ctx, op, left, right, 0);
        for i in 1..width {
            unit.append(&Self::channel(&ctx, op, left, right, i));
        }
        unit
    }

    fn channel(ctx: &GraphContext, op: BinaryOperator, left: &Unit, right: &Unit, index: usize) -> Unit {
        let l = left.channel_wrapped(index).clone();
        let r = right.channel_wrapped(index).clone();
        let kernel = Self {
            op,
            constant: l.is_constant() && r.is_constant(),
            left: Input::new(l),
            right: Input::new(r),
        };
        Unit::from_kernel(ctx, kernel)
    }

    /// Applies `op` between `unit` and a constant.
    pub fn scalar(op: BinaryOperator, unit: &Unit, value: f32) -> Unit {
        let rhs = Unit::constant(unit.context(), value);
        Self::unit(op, unit, &rhs)
    }
}

impl Kernel for BinaryOp {
    fn name(&self) -> &'static str {
        self.op.name()
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
                [self.left.channel(), self.right.channel()],
            );
        }
        let initial = self
            .op
            .apply(self.left.channel().initial_value(), self.right.channel().initial_value());
        ctx.set_initial_value(0, initial);
    }

    fn process(&mut self, info: &mut ProcessInfo, outputs: &mut [Box<[f32]>]) {
        self.left.pull(info);
        self.right.pull(info);

        let op = self.op;
        let out = &mut outputs[0];
        let len = out.len();
        for_each_sample(
            0..len,
            len,
            [self.left.samples(), self.right.samples()],
            |i, [a, b]| out[i] = op.apply(a, b),
        );
    }
}

macro_rules! unit_operator {
    ($trait:ident, $method:ident, $op:expr) => {
        impl $trait<&Unit> for &Unit {
            type Output = Unit;

            fn $method(self, rhs: &Unit) -> Unit {
                BinaryOp::unit($op, self, rhs)
            }
        }

        impl $trait<f32> for &Unit {
            type Output = Unit;

            fn $method(self, rhs: f32) -> Unit {
                BinaryOp::scalar($op, self, rhs)
            }
        }
    };
}

unit_operator!(Add, add, BinaryOperator::Add);
unit_operator!(Sub, sub, BinaryOperator::Sub);
unit_operator!(Mul, mul, BinaryOperator::Mul);
unit_operator!(Div, div, BinaryOperator::Div);

impl Unit {
    /// Element-wise minimum.
    pub fn min(&self, other: &Unit) -> Unit {
        BinaryOp::unit(BinaryOperator::Min, self, other)
    }

    /// Element-wise maximum.
    pub fn max(&self, other: &Unit) -> Unit {
        BinaryOp::unit(BinaryOperator::Max, self, other)
    }

    /// Element-wise power.
    pub fn pow(&self, exponent: &Unit) -> Unit {
        BinaryOp::unit(BinaryOperator::Pow, self, exponent)
    }
}
