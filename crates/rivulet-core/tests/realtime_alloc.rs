//! Allocation checks for the audio-thread side of cross-thread handoffs.
//!
//! A counting global allocator records allocations and frees made by the
//! current thread while a pull is running. Patch swaps and control-event
//! drains must leave both counters at zero.

#![allow(unsafe_code)]

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;

use rivulet_core::{Control, GraphContext, Patch, PatchOptions, ProcessInfo, Rate, Unit};

struct CountingAllocator;

thread_local! {
    static COUNTING: Cell<bool> = const { Cell::new(false) };
    static ALLOCS: Cell<usize> = const { Cell::new(0) };
    static FREES: Cell<usize> = const { Cell::new(0) };
}

fn bump(counter: &'static std::thread::LocalKey<Cell<usize>>) {
    if COUNTING.try_with(Cell::get).unwrap_or(false) {
        let _ = counter.try_with(|c| c.set(c.get() + 1));
    }
}

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        bump(&ALLOCS);
        unsafe { System.alloc(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        bump(&FREES);
        unsafe { System.dealloc(ptr, layout) }
    }
}

#[global_allocator]
static ALLOCATOR: CountingAllocator = CountingAllocator;

/// Runs `f` with counting enabled on this thread; returns (allocs, frees).
fn count_allocations(f: impl FnOnce()) -> (usize, usize) {
    ALLOCS.with(|c| c.set(0));
    FREES.with(|c| c.set(0));
    COUNTING.with(|c| c.set(true));
    f();
    COUNTING.with(|c| c.set(false));
    (ALLOCS.with(Cell::get), FREES.with(Cell::get))
}

// ============================================================================
// Patch
// ============================================================================

#[test]
fn patch_swap_blocks_do_not_touch_the_allocator() {
    let ctx = GraphContext::new(1_000.0, 4, 4).unwrap();
    let (patch, handle) = Patch::unit(&Unit::constant(&ctx, 0.0), PatchOptions::default());
    let channel = patch.channel(0).unwrap().clone();
    let mut info = ProcessInfo::new();
    let mut block = [0.0; 4];
    channel.pull(&mut info, &mut block);
    info.advance();

    handle.set(Unit::constant(&ctx, 1.0));
    let counts = count_allocations(|| channel.pull(&mut info, &mut block));
    assert_eq!(counts, (0, 0));
    assert_eq!(block, [1.0; 4]);
    info.advance();

    handle.set_with_fade(Unit::constant(&ctx, 2.0), 0.004);
    let counts = count_allocations(|| channel.pull(&mut info, &mut block));
    assert_eq!(counts, (0, 0));
    assert_eq!(block, [1.0, 1.25, 1.5, 1.75]);

    // Both replaced sources are freed here, on the control side.
    assert_eq!(handle.collect_retired(), 2);
}

// ============================================================================
// Control
// ============================================================================

#[test]
fn control_drain_blocks_do_not_touch_the_allocator() {
    let ctx = GraphContext::new(1_000.0, 4, 4).unwrap();
    let (unit, sender) = Control::unit(&ctx, 0.0, 8, Rate::Audio);
    let channel = unit.channel(0).unwrap().clone();
    sender.set(1.0).unwrap();
    sender.ramp(2.0, 0.002).unwrap();
    sender.set(3.0).unwrap();
    sender.set(4.0).unwrap();

    let mut info = ProcessInfo::new();
    let mut block = [0.0; 4];
    let counts = count_allocations(|| channel.pull(&mut info, &mut block));
    assert_eq!(counts, (0, 0));
    assert_eq!(block, [1.5, 2.0, 4.0, 4.0]);
    assert_eq!(sender.pending(), 0);
}
