//! Tagged-index heads for Treiber stacks over a shared link array.
//!
//! A head is one `AtomicU64` packing `{index: u32, tag: u32}`. Every
//! successful push or pop increments the tag, so a slot that was popped and
//! pushed back between another thread's load and compare-exchange makes that
//! compare-exchange fail (ABA protection). Indices point into a slab owned by
//! the container rather than at heap nodes, which keeps the whole algorithm in
//! safe code.
//!
//! The tag is 32 bits wide and wraps; an ABA hazard would require a thread to
//! stall across exactly 2^32 operations on the same head.

use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crossbeam_utils::CachePadded;

/// Sentinel index meaning "no slot".
pub(crate) const NIL: u32 = u32::MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Tagged {
    index: u32,
    tag: u32,
}

impl Tagged {
    #[inline]
    fn pack(self) -> u64 {
        (u64::from(self.tag) << 32) | u64::from(self.index)
    }

    #[inline]
    fn unpack(word: u64) -> Self {
        Self {
            index: word as u32,
            tag: (word >> 32) as u32,
        }
    }
}

/// Head of an intrusive index stack.
///
/// Several heads may share one link array as long as each slot is on at most
/// one of them at any time.
pub(crate) struct TaggedHead {
    word: CachePadded<AtomicU64>,
}

impl TaggedHead {
    pub(crate) fn empty() -> Self {
        Self {
            word: CachePadded::new(AtomicU64::new(
                Tagged {
                    index: NIL,
                    tag: 0,
                }
                .pack(),
            )),
        }
    }

    /// Links `index` in front of the current head.
    pub(crate) fn push(&self, links: &[AtomicU32], index: u32) {
        let mut current = self.word.load(Ordering::Relaxed);
        loop {
            let head = Tagged::unpack(current);
            links[index as usize].store(head.index, Ordering::Relaxed);
            let next = Tagged {
                index,
                tag: head.tag.wrapping_add(1),
            };
            match self.word.compare_exchange_weak(
                current,
                next.pack(),
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Unlinks and returns the head index, or `None` when empty.
    pub(crate) fn pop(&self, links: &[AtomicU32]) -> Option<u32> {
        let mut current = self.word.load(Ordering::Acquire);
        loop {
            let head = Tagged::unpack(current);
            if head.index == NIL {
                return None;
            }
            // May read a stale link if the slot was recycled meanwhile; the
            // tag makes the exchange below fail in that case.
            let next_index = links[head.index as usize].load(Ordering::Relaxed);
            let next = Tagged {
                index: next_index,
                tag: head.tag.wrapping_add(1),
            };
            match self.word.compare_exchange_weak(
                current,
                next.pack(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(head.index),
                Err(actual) => current = actual,
            }
        }
    }

    /// Current head index without unlinking it.
    pub(crate) fn peek(&self) -> Option<u32> {
        let head = Tagged::unpack(self.word.load(Ordering::Acquire));
        (head.index != NIL).then_some(head.index)
    }

    /// Current generation tag.
    #[cfg(test)]
    pub(crate) fn tag(&self) -> u32 {
        Tagged::unpack(self.word.load(Ordering::Acquire)).tag
    }
}
