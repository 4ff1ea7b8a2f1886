//! Pull-based signal graph.
//!
//! A graph is built bottom-up from [`Unit`]s: every constructor takes its
//! input units and returns a new one. Each [`Channel`] of a unit is one output
//! of a node; a node runs a [`Kernel`] at most once per host block, pulling
//! its inputs first.
//!
//! # Block size and sample rate
//!
//! Each node decides its block size and sample rate once, when it is built,
//! from a [`Preference`] and the non-constant inputs. Inputs whose length
//! differs from the consumer's are reconciled sample by sample (see
//! [`reconcile`]): equal lengths map one to one, a single sample is
//! broadcast, anything else is held from the nearest previous index.
//!
//! # Driving a graph
//!
//! [`Engine`] adapts the root unit to a host callback:
//!
//! ```rust
//! use rivulet_core::{Engine, GraphContext, Unit};
//!
//! let ctx = GraphContext::new(48_000.0, 4, 4).unwrap();
//! let tone = Unit::samples(&ctx, vec![0.0, 0.5, 1.0, 0.5]).unwrap();
//! let mut engine = Engine::new(&ctx, &tone * 0.5);
//!
//! let mut left = [0.0; 8];
//! let mut right = [0.0; 8];
//! engine.process(&mut [&mut left, &mut right]).unwrap();
//! assert_eq!(left, [0.0, 0.25, 0.5, 0.25, 0.0, 0.25, 0.5, 0.25]);
//! ```

mod channel;
mod context;
mod engine;
mod process_info;
pub mod reconcile;
mod unit;

pub use channel::{Channel, ChannelPhase, InitContext, Input, Kernel};
pub use context::{GraphContext, Preference};
pub use engine::Engine;
pub use process_info::ProcessInfo;
pub use reconcile::{for_each_sample, reconcile_into};
pub use unit::Unit;
