//! Containers for moving data between the audio thread and control threads.
//!
//! - [`LockFreeStack`]: multi-producer, multi-consumer LIFO. Safe to push and
//!   pop from any thread, including the real-time one.
//! - [`SimpleQueue`]: FIFO for a single owner. No synchronization at all.
//!
//! Both refuse to [`deinit`](LockFreeStack::deinit) while they still hold
//! elements.

mod lock_free_stack;
mod simple_queue;
mod tagged;

pub use lock_free_stack::LockFreeStack;
pub use simple_queue::SimpleQueue;
