//! Sample-accurate control events sent from other threads.
//!
//! A [`ControlSender`] pushes [`ControlEvent`]s onto a shared
//! [`LockFreeStack`]. At the top of each block the audio thread drains the
//! stack into a preallocated batch, sorts it back into send order, and
//! appends it to a [`SimpleQueue`] that only the audio thread touches. Events
//! are then applied one after another: a set takes effect at once, a ramp
//! runs to completion before the next event is looked at.
//!
//! ```rust
//! use rivulet_core::{Control, GraphContext, ProcessInfo, Rate};
//!
//! let ctx = GraphContext::new(48_000.0, 4, 4).unwrap();
//! let (unit, sender) = Control::unit(&ctx, 0.0, 16, Rate::Audio);
//! sender.ramp(1.0, 4.0 / 48_000.0).unwrap();
//!
//! let mut block = [0.0; 4];
//! unit.channel(0).unwrap().pull(&mut ProcessInfo::new(), &mut block);
//! assert_eq!(block, [0.25, 0.5, 0.75, 1.0]);
//! ```

use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::param::Rate;
use crate::containers::{LockFreeStack, SimpleQueue};
use crate::error::{EngineError, Result};
use crate::graph::{GraphContext, InitContext, Kernel, ProcessInfo, Unit};

/// A change to a control value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlEvent {
    /// Jump to the value.
    Set(f32),
    /// Move linearly to `target` over `seconds`.
    Ramp {
        /// Value reached at the end of the ramp.
        target: f32,
        /// Ramp length in seconds. Zero behaves like [`ControlEvent::Set`].
        seconds: f32,
    },
}

#[derive(Debug, Clone, Copy)]
struct Stamped {
    sequence: u64,
    event: ControlEvent,
}

/// Producer side of a [`Control`] channel. Cheap to clone; usable from any
/// thread.
#[derive(Debug, Clone)]
pub struct ControlSender {
    events: Arc<LockFreeStack<Stamped>>,
    sequence: Arc<AtomicU64>,
}

impl ControlSender {
    /// Queues `event`. Fails with [`EngineError::Memory`] when the audio
    /// thread has fallen behind and the event stack is full.
    pub fn send(&self, event: ControlEvent) -> Result<()> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.events
            .push(Stamped { sequence, event })
            .map_err(|_| EngineError::Memory)
    }

    /// Queues an immediate change.
    pub fn set(&self, value: f32) -> Result<()> {
        self.send(ControlEvent::Set(value))
    }

    /// Queues a linear ramp.
    pub fn ramp(&self, target: f32, seconds: f32) -> Result<()> {
        self.send(ControlEvent::Ramp { target, seconds })
    }

    /// Events pushed but not yet drained by the audio thread (advisory).
    pub fn pending(&self) -> usize {
        self.events.len()
    }
}

/// Kernel behind a control channel.
pub struct Control {
    events: Arc<LockFreeStack<Stamped>>,
    batch: Vec<Stamped>,
    queue: SimpleQueue<ControlEvent>,
    queue_capacity: usize,
    rate: Rate,
    sample_rate: f64,
    value: f32,
    increment: f32,
    target: f32,
    remaining: usize,
}

impl Control {
    /// Builds a control unit starting at `initial` together with its sender.
    ///
    /// `capacity` bounds the events in flight between two blocks.
    pub fn unit(ctx: &GraphContext, initial: f32, capacity: usize, rate: Rate) -> (Unit, ControlSender) {
        let capacity = capacity.max(1);
        let events = Arc::new(LockFreeStack::with_capacity(capacity));
        let sender = ControlSender {
            events: Arc::clone(&events),
            sequence: Arc::new(AtomicU64::new(0)),
        };
        let kernel = Self {
            events,
            batch: Vec::with_capacity(capacity),
            queue: SimpleQueue::with_capacity(capacity * 2),
            queue_capacity: capacity * 2,
            rate,
            sample_rate: ctx.sample_rate(),
            value: initial,
            increment: 0.0,
            target: initial,
            remaining: 0,
        };
        (Unit::from_kernel(ctx, kernel), sender)
    }

    fn drain(&mut self) {
        while self.batch.len() < self.batch.capacity() {
            let Some(stamped) = self.events.pop() else {
                break;
            };
            self.batch.push(stamped);
        }
        if self.batch.is_empty() {
            return;
        }

        self.batch.sort_unstable_by_key(|s| s.sequence);
        let mut dropped = 0usize;
        for stamped in self.batch.drain(..) {
            if self.queue.len() == self.queue_capacity {
                self.queue.pop();
                dropped += 1;
            }
            self.queue.push(stamped.event);
        }
        if dropped > 0 {
            tracing::warn!(dropped, "control_drain: queue full, oldest events dropped");
        }
    }

    fn start_next(&mut self) {
        while self.remaining == 0 {
            let Some(event) = self.queue.pop() else {
                return;
            };
            match event {
                ControlEvent::Set(value) => {
                    self.value = value;
                    self.target = value;
                }
                ControlEvent::Ramp { target, seconds } => {
                    let samples = (f64::from(seconds.max(0.0)) * self.sample_rate).round() as usize;
                    if samples == 0 {
                        self.value = target;
                        self.target = target;
                    } else {
                        self.increment = (target - self.value) / samples as f32;
                        self.target = target;
                        self.remaining = samples;
                    }
                }
            }
        }
    }
}

impl Kernel for Control {
    fn name(&self) -> &'static str {
        "Control"
    }

    fn init(&mut self, ctx: &mut InitContext<'_>) {
        self.rate.apply(ctx);
        self.sample_rate = ctx.sample_rate();
        ctx.set_initial_value(0, self.value);
    }

    fn process(&mut self, _info: &mut ProcessInfo, outputs: &mut [Box<[f32]>]) {
        self.drain();
        for sample in outputs[0].iter_mut() {
            self.start_next();
            if self.remaining > 0 {
                self.remaining -= 1;
                self.value = if self.remaining == 0 {
                    self.target
                } else {
                    self.value + self.increment
                };
            }
            *sample = self.value;
        }
    }
}

impl Drop for Control {
    fn drop(&mut self) {
        self.events.clear();
        self.queue.clear();
    }
}
