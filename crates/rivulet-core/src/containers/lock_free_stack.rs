//! Lock-free LIFO stack for handing values between threads.
//!
//! [`LockFreeStack`] is a Treiber stack over a fixed slab of slots. Each slot
//! has a link (`AtomicU32`) and a payload cell. Occupied slots are chained from
//! the `head`, vacant ones from the `free` list; both heads are tagged
//! `{index, generation}` words updated with a single compare-exchange (see
//! [`tagged`](super::tagged)).
//!
//! `push` and `pop` may be called concurrently from any number of threads and
//! complete in a bounded number of retries without syscalls. Payloads are
//! moved into their slot in place: neither `push` nor `pop` touches the
//! allocator, so a value that owns heap memory is only freed where its final
//! owner drops it.
//!
//! A slot belongs to exactly one thread between being unlinked from one list
//! and linked onto the other, so its payload lock is never contended.
//!
//! # Teardown
//!
//! [`deinit`](LockFreeStack::deinit) refuses to release a stack that still
//! holds elements. Drain it first with [`clear`](LockFreeStack::clear) or
//! [`clear_with`](LockFreeStack::clear_with).
//!
//! # Example
//!
//! ```rust
//! use rivulet_core::LockFreeStack;
//!
//! let mut stack = LockFreeStack::with_capacity(4);
//! stack.push(1).unwrap();
//! stack.push(2).unwrap();
//! assert_eq!(stack.pop(), Some(2));
//! assert!(stack.deinit().is_err()); // one element left
//! stack.clear();
//! assert!(stack.deinit().is_ok());
//! ```

use core::sync::atomic::{AtomicIsize, AtomicU32, Ordering};

use parking_lot::Mutex;

use super::tagged::{NIL, TaggedHead};
use crate::error::{EngineError, Result};

/// Concurrent LIFO stack with a fixed number of slots.
pub struct LockFreeStack<T> {
    links: Box<[AtomicU32]>,
    values: Box<[Mutex<Option<T>>]>,
    head: TaggedHead,
    free: TaggedHead,
    count: AtomicIsize,
}

impl<T> LockFreeStack<T> {
    /// Creates a stack able to hold `capacity` elements at once.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` does not fit in a 32-bit slot index.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(
            capacity < NIL as usize,
            "stack capacity must be below {NIL}"
        );

        let links: Box<[AtomicU32]> = (0..capacity).map(|_| AtomicU32::new(NIL)).collect();
        let values = (0..capacity).map(|_| Mutex::new(None)).collect();
        let free = TaggedHead::empty();
        for slot in (0..capacity as u32).rev() {
            free.push(&links, slot);
        }

        Self {
            links,
            values,
            head: TaggedHead::empty(),
            free,
            count: AtomicIsize::new(0),
        }
    }

    /// Pushes `value` on top of the stack.
    ///
    /// Returns the value back when every slot is in use (or after
    /// [`deinit`](Self::deinit)); the caller decides whether to retry or drop.
    pub fn push(&self, value: T) -> core::result::Result<(), T> {
        let Some(slot) = self.free.pop(&self.links) else {
            return Err(value);
        };
        *self.values[slot as usize].lock() = Some(value);
        self.head.push(&self.links, slot);
        self.count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Pops the most recently pushed element, or `None` when empty.
    pub fn pop(&self) -> Option<T> {
        let slot = self.head.pop(&self.links)?;
        let value = self.values[slot as usize].lock().take();
        self.free.push(&self.links, slot);
        self.count.fetch_sub(1, Ordering::Relaxed);
        value
    }

    /// Advisory element count.
    ///
    /// The counter is updated after the list mutation, so a racing reader can
    /// observe it lagging by the number of in-flight pushes and pops. Exact
    /// once all threads are quiescent.
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Relaxed).max(0) as usize
    }

    /// Returns `true` if no element is linked at the moment of the call.
    pub fn is_empty(&self) -> bool {
        self.head.peek().is_none()
    }

    /// Number of slots in the slab.
    pub fn capacity(&self) -> usize {
        self.links.len()
    }

    /// Pops and drops every element.
    ///
    /// Must not race with concurrent pushers: elements pushed while clearing
    /// may or may not be removed.
    pub fn clear(&self) {
        while self.pop().is_some() {}
    }

    /// Pops every element and hands it to `free`.
    ///
    /// Stops at the first error returned by `free`; elements not yet popped
    /// stay on the stack. Same concurrency restriction as [`clear`](Self::clear).
    pub fn clear_with<F>(&self, mut free: F) -> Result<()>
    where
        F: FnMut(T) -> Result<()>,
    {
        while let Some(value) = self.pop() {
            free(value)?;
        }
        Ok(())
    }

    /// Releases the slab.
    ///
    /// Fails with [`EngineError::ContainerNotEmptyOnDeInit`] if any element is
    /// still present; the stack is left untouched in that case.
    pub fn deinit(&mut self) -> Result<()> {
        let remaining = *self.count.get_mut();
        if remaining != 0 {
            return Err(EngineError::ContainerNotEmptyOnDeInit(
                remaining.max(0) as usize
            ));
        }

        self.links = Box::new([]);
        self.values = Box::new([]);
        self.head = TaggedHead::empty();
        self.free = TaggedHead::empty();
        Ok(())
    }
}

impl<T> Drop for LockFreeStack<T> {
    fn drop(&mut self) {
        let remaining = *self.count.get_mut();
        if remaining > 0 {
            tracing::warn!(remaining, "stack_drop: not deinitialized, dropping elements");
        }
    }
}

impl<T> core::fmt::Debug for LockFreeStack<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LockFreeStack")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}
