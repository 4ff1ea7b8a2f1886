//! Rivulet Core - lock-free, block-driven signal graph
//!
//! This crate provides the real-time side of rivulet: a pull-based graph of
//! processing nodes driven one host block at a time, plus the lock-free
//! plumbing that lets other threads change it while it runs.
//!
//! # Core Abstractions
//!
//! ## Signal Graph
//!
//! - [`Unit`] - An ordered group of channels; every constructor returns one
//! - [`Channel`] - One output of a node, pulled at most once per block
//! - [`Kernel`] - The processing trait behind every node
//! - [`GraphContext`] - Block size, sample rate and control rate, passed explicitly
//! - [`Engine`] - Adapts a root unit to a host audio callback
//!
//! Inputs whose block length differs from the consumer's are reconciled per
//! sample: equal lengths map directly, single samples broadcast, anything
//! else holds the nearest earlier sample. See [`graph::reconcile`].
//!
//! ## Units
//!
//! - [`Unit::constant`], [`Unit::null`], [`Unit::samples`] - Sources
//! - [`BinaryOp`] - Arithmetic and comparison, also via `+ - * /` on `&Unit`
//! - [`FilterCoeffs`] / [`Biquad`] - RBJ coefficient groups and the filter that consumes them
//! - [`Param`] - Reads a [`Variable`] every sample
//! - [`Control`] - Set and ramp events from other threads
//! - [`Line`] - Linear segment with an optional done action
//! - [`Delay`] - Ring-buffer delays with pluggable [`DelayForm`]s and multiple taps
//! - [`Patch`] - Swappable source with linear crossfade
//!
//! ## Concurrency
//!
//! - [`LockFreeStack`] - Fixed-capacity Treiber stack with tagged indices
//! - [`SimpleQueue`] - Single-owner FIFO over an index arena
//! - [`Variable`] - Atomic `f32` shared between threads
//! - [`Mailbox`] - Single-slot exchange cell, last write wins
//! - [`Worker`] - Named thread with cooperative exit and pause
//!
//! # Example
//!
//! ```rust
//! use rivulet_core::{CombFeedback, Delay, Engine, GraphContext, Unit};
//!
//! let ctx = GraphContext::new(48_000.0, 64, 16).unwrap();
//! let mut clicks = vec![0.0; 4_800];
//! clicks[0] = 1.0;
//! let source = Unit::samples(&ctx, clicks).unwrap();
//! let echo = Delay::<CombFeedback>::unit(
//!     &source,
//!     &Unit::constant(&ctx, 0.01),
//!     &Unit::constant(&ctx, 0.7),
//!     0.05,
//! );
//! let mut engine = Engine::new(&ctx, &echo * 0.5);
//!
//! let mut out = vec![0.0; 1_024];
//! engine.process(&mut [&mut out[..]]).unwrap();
//! assert!((out[480] - 0.5).abs() < 1e-3);
//! ```
//!
//! # Design Principles
//!
//! - **Real-time safe**: No allocations or blocking locks in the audio path
//! - **No unsafe**: Lock-free containers are built on index slabs and tagged CAS
//! - **No globals**: Every node is built against an explicit [`GraphContext`]

pub mod containers;
pub mod delay;
pub mod error;
pub mod graph;
pub mod patch;
pub mod thread;
pub mod units;
pub mod variable;

// Re-export main types at crate root
pub use containers::{LockFreeStack, SimpleQueue};
pub use delay::{AllPass, CombDecay, CombFeedback, Delay, DelayForm, DelayTick, FeedForward, decay_to_feedback};
pub use error::{EngineError, Result};
pub use graph::{
    Channel, ChannelPhase, Engine, GraphContext, InitContext, Input, Kernel, Preference, ProcessInfo, Unit,
};
pub use patch::{Patch, PatchHandle, PatchOptions};
pub use thread::{Worker, WorkerContext};
pub use units::{
    BinaryOp, BinaryOperator, Biquad, Coefficients, Constant, Control, ControlEvent, ControlSender, DoneAction,
    FilterCoeffs, FilterShape, Line, NUM_COEFFS, Param, Rate, Samples,
};
pub use variable::{Mailbox, Variable};
