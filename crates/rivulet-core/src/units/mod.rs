//! Built-in kernels.
//!
//! | Kernel | Inputs | Outputs |
//! |--------|--------|---------|
//! | [`Constant`] | none | one fixed value |
//! | [`Samples`] | none | a looped table |
//! | [`Param`] | a [`Variable`](crate::Variable) | the variable, per sample |
//! | [`Control`] | events from a [`ControlSender`] | set/ramp sequence |
//! | [`Line`] | none | linear segment, optional delete on completion |
//! | [`BinaryOp`] | two channels | element-wise operator |
//! | [`FilterCoeffs`] | frequency, Q, gain | five coefficient proxies |
//! | [`Biquad`] | signal + coefficient group | filtered signal |

mod binary_op;
mod constant;
mod control;
mod filter;
mod line;
mod param;

pub use binary_op::{BinaryOp, BinaryOperator};
pub use constant::{Constant, Samples};
pub use control::{Control, ControlEvent, ControlSender};
pub use filter::{Biquad, Coefficients, FilterCoeffs, FilterShape, NUM_COEFFS};
pub use line::{DoneAction, Line};
pub use param::{Param, Rate};
