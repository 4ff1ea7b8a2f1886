//! Cross-thread values read by the audio thread.
//!
//! [`Variable`] is an `f32` stored as its bit pattern in an `AtomicU32`:
//! control threads write, the audio thread reads once per sample. A reader may
//! see a slightly stale value but never a torn one.
//!
//! [`Mailbox`] is a single-slot exchange cell for whole values (used by the
//! patch channel to hand over a new source unit). Posting replaces whatever
//! was waiting; last write wins. The boxed variants move an existing
//! allocation through the slot, so a consumer on the audio thread never
//! allocates or frees.

use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crossbeam_utils::atomic::AtomicCell;

/// Shared `f32` value with lock-free reads and writes.
///
/// Cloning yields another handle to the same value.
#[derive(Debug, Clone)]
pub struct Variable {
    bits: Arc<AtomicU32>,
}

impl Variable {
    /// Creates a variable holding `value`.
    pub fn new(value: f32) -> Self {
        Self {
            bits: Arc::new(AtomicU32::new(value.to_bits())),
        }
    }

    /// Stores a new value (any thread).
    #[inline]
    pub fn set(&self, value: f32) {
        self.bits.store(value.to_bits(), Ordering::Release);
    }

    /// Loads the current value (any thread).
    #[inline]
    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Acquire))
    }
}

impl Default for Variable {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl From<f32> for Variable {
    fn from(value: f32) -> Self {
        Self::new(value)
    }
}

/// Single-slot, last-write-wins exchange cell.
pub struct Mailbox<T> {
    slot: AtomicCell<Option<Box<T>>>,
}

impl<T> Mailbox<T> {
    /// Creates an empty mailbox.
    pub fn new() -> Self {
        Self {
            slot: AtomicCell::new(None),
        }
    }

    /// Replaces the pending value with `value`.
    ///
    /// Returns the value that was displaced, if the consumer had not taken it
    /// yet. It is handed back so it gets dropped on the posting thread.
    pub fn post(&self, value: T) -> Option<T> {
        self.post_boxed(Box::new(value)).map(|boxed| *boxed)
    }

    /// Takes the pending value, leaving the mailbox empty.
    pub fn take(&self) -> Option<T> {
        self.take_boxed().map(|boxed| *boxed)
    }

    /// Replaces the pending value with an already boxed one.
    pub fn post_boxed(&self, value: Box<T>) -> Option<Box<T>> {
        self.slot.swap(Some(value))
    }

    /// Takes the pending box as posted.
    pub fn take_boxed(&self) -> Option<Box<T>> {
        self.slot.swap(None)
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> core::fmt::Debug for Mailbox<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Mailbox").finish_non_exhaustive()
    }
}
