//! Single-owner FIFO queue over an index-linked arena.
//!
//! [`SimpleQueue`] keeps its nodes in a `Vec` and links them by index. Vacant
//! nodes are chained on an intrusive free list, so once the arena has grown to
//! its working size, push and pop never allocate. All methods take `&mut self`:
//! the queue is meant for a single thread (typically the audio thread
//! sequencing events it drained from a [`LockFreeStack`](super::LockFreeStack)).

use crate::error::{EngineError, Result};

#[derive(Debug)]
struct Node<T> {
    value: Option<T>,
    next: Option<usize>,
}

/// FIFO queue with exact length and head/tail links.
#[derive(Debug)]
pub struct SimpleQueue<T> {
    nodes: Vec<Node<T>>,
    free_head: Option<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<T> Default for SimpleQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SimpleQueue<T> {
    /// Creates an empty queue without allocating.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free_head: None,
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Creates an empty queue with room for `capacity` elements before the
    /// arena has to grow.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut queue = Self::new();
        queue.nodes.reserve_exact(capacity);
        for index in 0..capacity {
            queue.nodes.push(Node {
                value: None,
                next: queue.free_head,
            });
            queue.free_head = Some(index);
        }
        queue
    }

    fn alloc(&mut self, value: T) -> usize {
        match self.free_head {
            Some(index) => {
                let node = &mut self.nodes[index];
                self.free_head = node.next;
                node.value = Some(value);
                node.next = None;
                index
            }
            None => {
                self.nodes.push(Node {
                    value: Some(value),
                    next: None,
                });
                self.nodes.len() - 1
            }
        }
    }

    /// Appends `value` at the tail.
    pub fn push(&mut self, value: T) {
        let index = self.alloc(value);
        match self.tail {
            Some(tail) => self.nodes[tail].next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.len += 1;
    }

    /// Removes and returns the head element.
    pub fn pop(&mut self) -> Option<T> {
        let index = self.head?;
        let node = &mut self.nodes[index];
        let value = node.value.take();
        self.head = node.next;
        node.next = self.free_head;
        self.free_head = Some(index);

        if self.head.is_none() {
            self.tail = None;
        }
        self.len -= 1;
        value
    }

    /// Element that the next [`pop`](Self::pop) would return.
    pub fn front(&self) -> Option<&T> {
        self.head.and_then(|i| self.nodes[i].value.as_ref())
    }

    /// Mutable access to the head element.
    pub fn front_mut(&mut self) -> Option<&mut T> {
        self.head.and_then(|i| self.nodes[i].value.as_mut())
    }

    /// Most recently pushed element.
    pub fn back(&self) -> Option<&T> {
        self.tail.and_then(|i| self.nodes[i].value.as_ref())
    }

    /// Number of queued elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the queue holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drops every element. The arena keeps its capacity.
    pub fn clear(&mut self) {
        while self.pop().is_some() {}
    }

    /// Pops every element into `free`, stopping at the first error.
    pub fn clear_with<F>(&mut self, mut free: F) -> Result<()>
    where
        F: FnMut(T) -> Result<()>,
    {
        while let Some(value) = self.pop() {
            free(value)?;
        }
        Ok(())
    }

    /// Releases the arena. Fails without touching the queue if it is not empty.
    pub fn deinit(&mut self) -> Result<()> {
        if self.len != 0 {
            return Err(EngineError::ContainerNotEmptyOnDeInit(self.len));
        }
        *self = Self::new();
        Ok(())
    }
}
