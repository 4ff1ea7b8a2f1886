//! Channels whose source can be swapped while the graph runs.
//!
//! A [`PatchHandle`] posts a new source [`Unit`] into a single-slot
//! [`Mailbox`]. At the top of its next block the patch takes the pending
//! source and crossfades from the old one. The mailbox keeps only the latest
//! post: a source overwritten before the audio thread saw it is handed back
//! to the producer.
//!
//! A source is boxed on the posting thread, and that same box travels
//! through the mailbox into the patch and out again onto a
//! [`LockFreeStack`] when it leaves the graph. The control thread frees it
//! with [`PatchHandle::collect_retired`]; the audio thread neither allocates
//! nor frees while swapping.
//!
//! ```rust
//! use rivulet_core::{GraphContext, Patch, PatchOptions, ProcessInfo, Unit};
//!
//! let ctx = GraphContext::new(1_000.0, 4, 4).unwrap();
//! let (patch, handle) = Patch::unit(&Unit::constant(&ctx, 0.0), PatchOptions::default());
//! handle.set(Unit::constant(&ctx, 1.0));
//!
//! let mut out = [0.0; 4];
//! patch.channel(0).unwrap().pull(&mut ProcessInfo::new(), &mut out);
//! assert_eq!(out, [1.0; 4]);
//! assert_eq!(handle.collect_retired(), 1);
//! ```

use std::sync::Arc;

use crate::containers::LockFreeStack;
use crate::graph::{InitContext, Input, Kernel, Preference, ProcessInfo, Unit, for_each_sample, reconcile_into};
use crate::variable::Mailbox;

/// Construction options for a [`Patch`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatchOptions {
    /// Crossfade length used by [`PatchHandle::set`], in seconds. Zero swaps
    /// on a block boundary.
    pub fade_seconds: f32,
    /// Sources the retirement stack holds before the audio thread falls back
    /// to dropping them itself.
    pub retire_capacity: usize,
    /// When false, a source that sets the should-delete latch cannot end
    /// the enclosing graph.
    pub allow_auto_delete: bool,
    /// Block size of the patch output.
    pub block_size: Preference<usize>,
    /// Sample rate of the patch output.
    pub sample_rate: Preference<f64>,
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self {
            fade_seconds: 0.0,
            retire_capacity: 16,
            allow_auto_delete: false,
            block_size: Preference::Default,
            sample_rate: Preference::Default,
        }
    }
}

struct Source {
    unit: Unit,
    inputs: Vec<Input>,
    fade_seconds: f32,
}

impl Source {
    fn boxed(unit: Unit, width: usize, fade_seconds: f32) -> Box<Self> {
        let inputs = (0..width)
            .map(|c| Input::new(unit.channel_wrapped(c).clone()))
            .collect();
        Box::new(Self {
            unit,
            inputs,
            fade_seconds,
        })
    }

    fn pull(&mut self, info: &mut ProcessInfo) {
        for input in &mut self.inputs {
            input.pull(info);
        }
    }
}

/// Producer side of a [`Patch`]. Cheap to clone; usable from any thread.
#[derive(Clone)]
pub struct PatchHandle {
    pending: Arc<Mailbox<Source>>,
    retired: Arc<LockFreeStack<Box<Source>>>,
    width: usize,
    fade_seconds: f32,
}

impl PatchHandle {
    /// Patches in `source` with the default fade.
    ///
    /// Returns the previously pending source if the audio thread had not
    /// picked it up yet.
    pub fn set(&self, source: Unit) -> Option<Unit> {
        self.set_with_fade(source, self.fade_seconds)
    }

    /// Patches in `source` with a crossfade of `fade_seconds`.
    pub fn set_with_fade(&self, source: Unit, fade_seconds: f32) -> Option<Unit> {
        let displaced = self
            .pending
            .post_boxed(Source::boxed(source, self.width, fade_seconds.max(0.0)))?;
        tracing::debug!("patch_set: pending source replaced before pickup");
        Some(displaced.unit)
    }

    /// Frees sources the audio thread retired. Returns how many.
    pub fn collect_retired(&self) -> usize {
        let mut count = 0;
        while let Some(source) = self.retired.pop() {
            drop(source);
            count += 1;
        }
        count
    }

    /// Output channel count of the patch.
    pub fn num_channels(&self) -> usize {
        self.width
    }
}

impl core::fmt::Debug for PatchHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PatchHandle")
            .field("width", &self.width)
            .field("retired", &self.retired.len())
            .finish()
    }
}

/// A channel group that follows whatever source was patched in last.
pub struct Patch {
    pending: Arc<Mailbox<Source>>,
    retired: Arc<LockFreeStack<Box<Source>>>,
    current: Box<Source>,
    fading: Option<Box<Source>>,
    block_size: Preference<usize>,
    sample_rate_preference: Preference<f64>,
    sample_rate: f32,
    fade_remaining: usize,
    fade_increment: f32,
    fade_level: f32,
    allow_auto_delete: bool,
}

impl Patch {
    /// Builds a patch with the channel count of `initial`.
    pub fn unit(initial: &Unit, options: PatchOptions) -> (Unit, PatchHandle) {
        let ctx = *initial.context();
        let width = initial.num_channels();
        let pending = Arc::new(Mailbox::new());
        let retired = Arc::new(LockFreeStack::with_capacity(options.retire_capacity.max(1)));
        let patch = Self {
            pending: Arc::clone(&pending),
            retired: Arc::clone(&retired),
            current: Source::boxed(initial.clone(), width, 0.0),
            fading: None,
            block_size: options.block_size,
            sample_rate_preference: options.sample_rate,
            sample_rate: ctx.sample_rate() as f32,
            fade_remaining: 0,
            fade_increment: 0.0,
            fade_level: 0.0,
            allow_auto_delete: options.allow_auto_delete,
        };
        let handle = PatchHandle {
            pending,
            retired,
            width,
            fade_seconds: options.fade_seconds.max(0.0),
        };
        (Unit::from_kernel(&ctx, patch), handle)
    }

    fn retire(&self, source: Box<Source>) {
        if let Err(source) = self.retired.push(source) {
            tracing::warn!(
                capacity = self.retired.capacity(),
                "patch_retire: retirement stack full, dropping on audio thread"
            );
            drop(source);
        }
    }

    fn begin_swap(&mut self, next: Box<Source>) {
        let samples = libm::roundf(next.fade_seconds * self.sample_rate) as usize;
        if let Some(interrupted) = self.fading.take() {
            self.retire(interrupted);
        }
        let old = core::mem::replace(&mut self.current, next);
        if samples == 0 {
            self.retire(old);
            self.fade_remaining = 0;
            self.fade_level = 0.0;
        } else {
            self.fading = Some(old);
            self.fade_remaining = samples;
            self.fade_increment = 1.0 / samples as f32;
            self.fade_level = 1.0;
        }
    }

    fn process_copy(&self, outputs: &mut [Box<[f32]>]) {
        for (out, input) in outputs.iter_mut().zip(&self.current.inputs) {
            reconcile_into(out, input.samples());
        }
    }

    fn process_fade(&mut self, outputs: &mut [Box<[f32]>]) {
        let Some(old) = &self.fading else {
            return;
        };
        let len = outputs.first().map_or(0, |o| o.len());
        let count = self.fade_remaining.min(len);
        let level = self.fade_level;
        let increment = self.fade_increment;
        for ((out, new), old) in outputs.iter_mut().zip(&self.current.inputs).zip(&old.inputs) {
            reconcile_into(out, new.samples());
            for_each_sample(0..count, len, [old.samples()], |i, [previous]| {
                let l = (level - increment * i as f32).max(0.0);
                out[i] = out[i] * (1.0 - l) + previous * l;
            });
        }

        self.fade_remaining -= count;
        self.fade_level = (level - increment * count as f32).max(0.0);
        if self.fade_remaining == 0 {
            if let Some(done) = self.fading.take() {
                self.retire(done);
            }
            self.fade_level = 0.0;
        }
    }
}

impl Kernel for Patch {
    fn name(&self) -> &'static str {
        "Patch"
    }

    fn num_outputs(&self) -> usize {
        self.current.inputs.len()
    }

    fn init(&mut self, ctx: &mut InitContext<'_>) {
        ctx.decide(
            self.block_size,
            self.sample_rate_preference,
            self.current.inputs.iter().map(Input::channel),
        );
        self.sample_rate = ctx.sample_rate() as f32;
        for (index, input) in self.current.inputs.iter().enumerate() {
            ctx.set_initial_value(index, input.channel().initial_value());
        }
    }

    fn process(&mut self, info: &mut ProcessInfo, outputs: &mut [Box<[f32]>]) {
        if let Some(next) = self.pending.take_boxed() {
            tracing::debug!(channels = next.unit.num_channels(), fade = next.fade_seconds, "patch_process: swapping source");
            self.begin_swap(next);
        }

        let latched = info.should_delete();
        self.current.pull(info);
        if let Some(old) = &mut self.fading {
            old.pull(info);
        }
        if !self.allow_auto_delete && !latched {
            info.reset_should_delete();
        }

        if self.fading.is_some() {
            self.process_fade(outputs);
        } else {
            self.process_copy(outputs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphContext;
    use crate::units::{DoneAction, Line};

    fn ctx() -> GraphContext {
        GraphContext::new(1_000.0, 8, 8).unwrap()
    }

    fn pull(unit: &Unit, info: &mut ProcessInfo) -> Vec<f32> {
        let channel = unit.channel(0).unwrap();
        let mut block = vec![0.0; channel.block_size()];
        channel.pull(info, &mut block);
        info.advance();
        block
    }

    #[test]
    fn test_last_write_wins() {
        let ctx = ctx();
        let (patch, handle) = Patch::unit(&Unit::constant(&ctx, 0.0), PatchOptions::default());
        assert!(handle.set(Unit::constant(&ctx, 1.0)).is_none());
        let displaced = handle.set(Unit::constant(&ctx, 2.0)).unwrap();
        assert_eq!(displaced.channel(0).unwrap().initial_value(), 1.0);

        let mut info = ProcessInfo::new();
        assert_eq!(pull(&patch, &mut info), [2.0; 8]);
    }

    #[test]
    fn test_zero_fade_swaps_on_block_boundary() {
        let ctx = ctx();
        let (patch, handle) = Patch::unit(&Unit::constant(&ctx, 0.5), PatchOptions::default());
        let mut info = ProcessInfo::new();
        assert_eq!(pull(&patch, &mut info), [0.5; 8]);
        handle.set(Unit::constant(&ctx, -1.0));
        assert_eq!(pull(&patch, &mut info), [-1.0; 8]);
        assert_eq!(handle.collect_retired(), 1);
        assert_eq!(handle.collect_retired(), 0);
    }

    #[test]
    fn test_linear_crossfade() {
        let ctx = ctx();
        let (patch, handle) = Patch::unit(&Unit::constant(&ctx, 0.0), PatchOptions::default());
        handle.set_with_fade(Unit::constant(&ctx, 1.0), 0.004);
        let mut info = ProcessInfo::new();
        let out = pull(&patch, &mut info);
        assert_eq!(out, [0.0, 0.25, 0.5, 0.75, 1.0, 1.0, 1.0, 1.0]);
        assert_eq!(handle.collect_retired(), 1);
    }

    #[test]
    fn test_crossfade_spans_blocks() {
        let ctx = GraphContext::new(1_000.0, 4, 4).unwrap();
        let (patch, handle) = Patch::unit(&Unit::constant(&ctx, 0.0), PatchOptions::default());
        handle.set_with_fade(Unit::constant(&ctx, 1.0), 0.008);
        let mut info = ProcessInfo::new();
        let first = pull(&patch, &mut info);
        let second = pull(&patch, &mut info);
        let expected = [0.0, 0.125, 0.25, 0.375, 0.5, 0.625, 0.75, 0.875];
        for (got, want) in first.iter().chain(&second).zip(expected) {
            assert!((got - want).abs() < 1e-6, "{got} vs {want}");
        }
        assert_eq!(handle.collect_retired(), 1);
        assert_eq!(pull(&patch, &mut info), [1.0; 4]);
    }

    #[test]
    fn test_swap_during_fade_retires_interrupted_source() {
        let ctx = ctx();
        let (patch, handle) = Patch::unit(&Unit::constant(&ctx, 0.0), PatchOptions::default());
        let mut info = ProcessInfo::new();

        handle.set_with_fade(Unit::constant(&ctx, 1.0), 0.016);
        let first = pull(&patch, &mut info);
        for (i, got) in first.iter().enumerate() {
            assert!((got - i as f32 / 16.0).abs() < 1e-6, "{i}: {got}");
        }
        assert_eq!(handle.collect_retired(), 0);

        // Halfway through, a new source fades in from the one fading in.
        handle.set_with_fade(Unit::constant(&ctx, 2.0), 0.008);
        let second = pull(&patch, &mut info);
        for (i, got) in second.iter().enumerate() {
            assert!((got - (1.0 + i as f32 / 8.0)).abs() < 1e-6, "{i}: {got}");
        }
        // The interrupted source and the finished fade-out.
        assert_eq!(handle.collect_retired(), 2);
        assert_eq!(pull(&patch, &mut info), [2.0; 8]);
    }

    #[test]
    fn test_explicit_block_size_and_sample_rate() {
        let ctx = ctx();
        let options = PatchOptions {
            block_size: Preference::Explicit(4),
            sample_rate: Preference::Explicit(500.0),
            ..PatchOptions::default()
        };
        let (patch, handle) = Patch::unit(&Unit::constant(&ctx, 0.0), options);
        let channel = patch.channel(0).unwrap();
        assert_eq!(channel.block_size(), 4);
        assert_eq!(channel.sample_rate(), 500.0);

        // 8 ms at 500 Hz is a four-sample fade.
        handle.set_with_fade(Unit::constant(&ctx, 1.0), 0.008);
        let mut info = ProcessInfo::new();
        assert_eq!(pull(&patch, &mut info), [0.0, 0.25, 0.5, 0.75]);
        assert_eq!(pull(&patch, &mut info), [1.0; 4]);
    }

    #[test]
    fn test_multichannel_source_wraps_to_patch_width() {
        let ctx = ctx();
        let stereo = Unit::constants(&ctx, &[1.0, 2.0]).unwrap();
        let (patch, handle) = Patch::unit(&stereo, PatchOptions::default());
        assert_eq!(patch.num_channels(), 2);
        assert_eq!(handle.num_channels(), 2);
        handle.set(Unit::constant(&ctx, 3.0));

        let mut info = ProcessInfo::new();
        let mut left = [0.0; 8];
        let mut right = [0.0; 8];
        patch.channel(0).unwrap().pull(&mut info, &mut left);
        patch.channel(1).unwrap().pull(&mut info, &mut right);
        assert_eq!(left, [3.0; 8]);
        assert_eq!(right, [3.0; 8]);
    }

    #[test]
    fn test_auto_delete_suppressed_by_default() {
        let ctx = ctx();
        let line = Line::unit(&ctx, 1.0, 0.0, 0.004, DoneAction::Delete);
        let (patch, _handle) = Patch::unit(&line, PatchOptions::default());
        let mut info = ProcessInfo::new();
        pull(&patch, &mut info);
        assert!(!info.should_delete());
    }

    #[test]
    fn test_auto_delete_passes_through_when_allowed() {
        let ctx = ctx();
        let line = Line::unit(&ctx, 1.0, 0.0, 0.004, DoneAction::Delete);
        let options = PatchOptions {
            allow_auto_delete: true,
            ..PatchOptions::default()
        };
        let (patch, _handle) = Patch::unit(&line, options);
        let mut info = ProcessInfo::new();
        pull(&patch, &mut info);
        assert!(info.should_delete());
    }

    #[test]
    fn test_full_retirement_stack_drops_in_place() {
        let ctx = ctx();
        let options = PatchOptions {
            retire_capacity: 1,
            ..PatchOptions::default()
        };
        let (patch, handle) = Patch::unit(&Unit::constant(&ctx, 0.0), options);
        let mut info = ProcessInfo::new();
        for value in [1.0, 2.0, 3.0] {
            handle.set(Unit::constant(&ctx, value));
            assert_eq!(pull(&patch, &mut info), [value; 8]);
        }
        assert_eq!(handle.collect_retired(), 1);
    }
}
