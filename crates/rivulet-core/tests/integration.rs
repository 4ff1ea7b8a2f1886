//! Integration tests for rivulet-core.
//!
//! Exercises the containers under real thread contention, then whole graphs
//! through the public API: reconciliation across mixed block sizes, delay
//! wrap-around, patch swaps driven from another thread, and the engine's
//! host-callback contract.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use rivulet_core::{
    CombFeedback, Control, Delay, EngineError, Engine, GraphContext, LockFreeStack, Param, Patch,
    PatchOptions, ProcessInfo, Rate, SimpleQueue, Unit, Variable, Worker,
};

/// Pulls `blocks` consecutive blocks of channel `index`.
fn render(unit: &Unit, index: usize, blocks: usize) -> Vec<f32> {
    let channel = unit.channel(index).unwrap();
    let mut info = ProcessInfo::new();
    let mut block = vec![0.0; channel.block_size()];
    let mut all = Vec::with_capacity(blocks * block.len());
    for _ in 0..blocks {
        channel.pull(&mut info, &mut block);
        all.extend_from_slice(&block);
        info.advance();
    }
    all
}

// ============================================================================
// 1. Containers
// ============================================================================

#[test]
fn stack_concurrent_push_pop_delivers_each_item_once() {
    const THREADS: usize = 4;
    const ITEMS: usize = 2_000;

    let stack = Arc::new(LockFreeStack::with_capacity(THREADS * ITEMS));
    let producers: Vec<_> = (0..THREADS)
        .map(|t| {
            let stack = Arc::clone(&stack);
            thread::spawn(move || {
                for i in 0..ITEMS {
                    stack.push(t * ITEMS + i).unwrap();
                }
            })
        })
        .collect();

    let done = Arc::new(AtomicBool::new(false));
    let consumers: Vec<_> = (0..THREADS)
        .map(|_| {
            let stack = Arc::clone(&stack);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut seen = Vec::new();
                loop {
                    match stack.pop() {
                        Some(value) => seen.push(value),
                        None if done.load(Ordering::Acquire) => break,
                        None => thread::yield_now(),
                    }
                }
                seen
            })
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }
    done.store(true, Ordering::Release);

    let mut all = HashSet::new();
    let mut total = 0;
    for consumer in consumers {
        for value in consumer.join().unwrap() {
            assert!(all.insert(value), "value {value} popped twice");
            total += 1;
        }
    }
    while let Some(value) = stack.pop() {
        assert!(all.insert(value), "value {value} popped twice");
        total += 1;
    }
    assert_eq!(total, THREADS * ITEMS);
    assert_eq!(stack.len(), 0);
    assert!(stack.is_empty());
}

#[test]
fn stack_recycles_slots_under_contention() {
    // Far fewer slots than operations: every slot is reused many times.
    let stack = Arc::new(LockFreeStack::with_capacity(8));
    let workers: Vec<_> = (0..4)
        .map(|t| {
            let stack = Arc::clone(&stack);
            thread::spawn(move || {
                let mut pushed = 0usize;
                let mut popped = 0usize;
                for i in 0..5_000 {
                    if stack.push(t * 10_000 + i).is_ok() {
                        pushed += 1;
                    }
                    if stack.pop().is_some() {
                        popped += 1;
                    }
                }
                (pushed, popped)
            })
        })
        .collect();

    let (mut pushed, mut popped) = (0, 0);
    for worker in workers {
        let (p, q) = worker.join().unwrap();
        pushed += p;
        popped += q;
    }
    let mut rest = 0;
    while stack.pop().is_some() {
        rest += 1;
    }
    assert_eq!(pushed, popped + rest);
    assert_eq!(stack.len(), 0);
}

#[test]
fn stack_teardown_requires_empty() {
    let mut stack = LockFreeStack::with_capacity(2);
    stack.push("a").unwrap();
    assert_eq!(stack.deinit(), Err(EngineError::ContainerNotEmptyOnDeInit(1)));
    let mut freed = Vec::new();
    stack
        .clear_with(|value| {
            freed.push(value);
            Ok(())
        })
        .unwrap();
    assert_eq!(freed, ["a"]);
    assert_eq!(stack.deinit(), Ok(()));
    assert_eq!(stack.push("b"), Err("b"));
}

#[test]
fn queue_is_fifo_across_growth() {
    let mut queue = SimpleQueue::with_capacity(2);
    for i in 0..10 {
        queue.push(i);
    }
    for i in 0..5 {
        assert_eq!(queue.pop(), Some(i));
    }
    for i in 10..15 {
        queue.push(i);
    }
    let drained: Vec<_> = std::iter::from_fn(|| queue.pop()).collect();
    assert_eq!(drained, (5..15).collect::<Vec<_>>());
    assert_eq!(queue.deinit(), Ok(()));
}

// ============================================================================
// 2. Reconciliation through the graph
// ============================================================================

#[test]
fn control_rate_input_is_held_at_audio_rate() {
    // Control blocks carry 2 samples against 4 audio samples: [x0, x0, x1, x1].
    let ctx = GraphContext::new(1_000.0, 4, 2).unwrap();
    let (control, sender) = Control::unit(&ctx, 0.0, 8, Rate::Control);
    assert_eq!(control.channel(0).unwrap().block_size(), 2);
    sender.ramp(1.0, 0.004).unwrap();

    let audio = Unit::samples(&ctx, vec![1.0; 4]).unwrap();
    let product = &audio * &control;
    let out = render(&product, 0, 1);
    assert_eq!(out[0], out[1]);
    assert_eq!(out[2], out[3]);
    assert!(out[2] > out[0]);
}

#[test]
fn constant_inputs_broadcast() {
    let ctx = GraphContext::new(1_000.0, 4, 4).unwrap();
    let ramp = Unit::samples(&ctx, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    let scaled = &(&ramp * 2.0) + &Unit::constant(&ctx, 1.0);
    assert_eq!(render(&scaled, 0, 1), [3.0, 5.0, 7.0, 9.0]);
}

#[test]
fn shared_input_is_processed_once_per_block() {
    let ctx = GraphContext::new(1_000.0, 4, 4).unwrap();
    let ramp = Unit::samples(&ctx, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]).unwrap();
    let square = &ramp * &ramp;
    assert_eq!(render(&square, 0, 2), [1.0, 4.0, 9.0, 16.0, 25.0, 36.0, 49.0, 64.0]);
}

#[test]
fn variable_updates_reach_the_graph() {
    let ctx = GraphContext::new(1_000.0, 4, 4).unwrap();
    let gain = Variable::new(0.5);
    let unit = Param::ar(&ctx, &gain);
    let channel = unit.channel(0).unwrap();
    let mut info = ProcessInfo::new();
    let mut block = [0.0; 4];
    channel.pull(&mut info, &mut block);
    assert_eq!(block, [0.5; 4]);

    let writer = gain.clone();
    thread::spawn(move || writer.set(0.25)).join().unwrap();
    info.advance();
    channel.pull(&mut info, &mut block);
    assert_eq!(block, [0.25; 4]);
}

#[test]
fn phase_polling_from_another_thread_never_silences_pulls() {
    let ctx = GraphContext::new(1_000.0, 4, 4).unwrap();
    let ones = Unit::samples(&ctx, vec![1.0; 4]).unwrap();
    let scaled = &ones * 1.0;
    let observer = ones.channel(0).unwrap().clone();

    let stop = Arc::new(AtomicBool::new(false));
    let poller = {
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut polls = 0usize;
            loop {
                let _ = observer.phase();
                polls += 1;
                if stop.load(Ordering::Acquire) {
                    return polls;
                }
            }
        })
    };

    let channel = scaled.channel(0).unwrap();
    let mut info = ProcessInfo::new();
    let mut block = [0.0; 4];
    for b in 0..20_000 {
        channel.pull(&mut info, &mut block);
        assert_eq!(block, [1.0; 4], "block {b}");
        info.advance();
    }
    stop.store(true, Ordering::Release);
    assert!(poller.join().unwrap() > 0);
}

// ============================================================================
// 3. Delay wrap-around
// ============================================================================

#[test]
fn delay_output_matches_shifted_input_across_wraps() {
    let ctx = GraphContext::new(1_000.0, 5, 5).unwrap();
    let table: Vec<f32> = (0..7).map(|i| i as f32).collect();
    let input = Unit::samples(&ctx, table.clone()).unwrap();
    let delayed = Delay::<CombFeedback>::plain(&input, &Unit::constant(&ctx, 0.003), 0.003);
    let out = render(&delayed, 0, 20);
    for t in 3..out.len() {
        assert_eq!(out[t], table[(t - 3) % table.len()], "t = {t}");
    }
}

// ============================================================================
// 4. Patching
// ============================================================================

#[test]
fn patch_follows_swaps_from_a_worker() {
    let ctx = GraphContext::new(1_000.0, 4, 4).unwrap();
    let (patch, handle) = Patch::unit(&Unit::constant(&ctx, 0.0), PatchOptions::default());

    let producer = handle.clone();
    let next = Unit::constant(&ctx, 1.0);
    let mut worker = Worker::new("patcher");
    worker
        .start(move |_| {
            producer.set(next);
        })
        .unwrap();
    worker.wait().unwrap();

    assert_eq!(render(&patch, 0, 1), [1.0; 4]);
    assert_eq!(handle.collect_retired(), 1);
}

#[test]
fn patch_last_write_wins_under_contention() {
    let ctx = GraphContext::new(1_000.0, 4, 4).unwrap();
    let (patch, handle) = Patch::unit(&Unit::constant(&ctx, 0.0), PatchOptions::default());
    let producers: Vec<_> = (1..=4)
        .map(|v| {
            let handle = handle.clone();
            let source = Unit::constant(&ctx, v as f32);
            thread::spawn(move || {
                handle.set(source);
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    // Exactly one of the posted sources survived; it is whole, never mixed.
    let out = render(&patch, 0, 1);
    assert!((1..=4).any(|v| out == [v as f32; 4]), "{out:?}");
}

// ============================================================================
// 5. Engine
// ============================================================================

#[test]
fn engine_renders_delayed_patch() {
    let ctx = GraphContext::new(1_000.0, 4, 4).unwrap();
    let mut impulse = vec![0.0; 8];
    impulse[0] = 1.0;
    let clicks = Unit::samples(&ctx, impulse).unwrap();
    let delayed = Delay::<CombFeedback>::plain(&clicks, &Unit::constant(&ctx, 0.002), 0.01);
    let (patch, handle) = Patch::unit(&delayed, PatchOptions::default());
    let mut engine = Engine::new(&ctx, patch);

    let mut out = [0.0; 8];
    engine.process(&mut [&mut out]).unwrap();
    assert_eq!(out, [0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);

    handle.set(Unit::constant(&ctx, 0.25));
    engine.process(&mut [&mut out]).unwrap();
    assert_eq!(out, [0.25; 8]);
    assert_eq!(engine.blocks_processed(), 4);
    assert_eq!(handle.collect_retired(), 1);
}
