//! Host-callback driver for a root unit.

use super::channel::Input;
use super::context::GraphContext;
use super::process_info::ProcessInfo;
use super::reconcile::reconcile_into;
use super::unit::Unit;
use crate::error::{EngineError, Result};

/// Drives a root [`Unit`] from a host audio callback.
///
/// Each call to [`process`](Engine::process) splits the host buffers into
/// context-sized blocks. Host output `c` receives root channel
/// `c % num_channels`. When a block ends with the should-delete latch set
/// (a finished [`Line`](crate::Line) with a delete action, say), the engine
/// goes silent until a new root is installed.
pub struct Engine {
    context: GraphContext,
    root: Unit,
    taps: Vec<Input>,
    info: ProcessInfo,
    silenced: bool,
}

impl Engine {
    /// Creates an engine for `root`.
    pub fn new(ctx: &GraphContext, root: Unit) -> Self {
        let taps = root.iter().cloned().map(Input::new).collect();
        tracing::debug!(channels = root.num_channels(), block_size = ctx.block_size(), "engine_new");
        Self {
            context: *ctx,
            root,
            taps,
            info: ProcessInfo::new(),
            silenced: false,
        }
    }

    /// Renders `outputs.len()` host channels.
    ///
    /// All outputs must share one length, a multiple of the context block
    /// size; [`EngineError::ItemCountInvalid`] otherwise.
    pub fn process(&mut self, outputs: &mut [&mut [f32]]) -> Result<()> {
        let Some(len) = outputs.first().map(|o| o.len()) else {
            return Ok(());
        };
        let block = self.context.block_size();
        if len % block != 0 {
            return Err(EngineError::ItemCountInvalid(len));
        }
        if let Some(other) = outputs.iter().find(|o| o.len() != len) {
            return Err(EngineError::ItemCountInvalid(other.len()));
        }

        for start in (0..len).step_by(block) {
            let range = start..start + block;
            if self.silenced {
                for out in outputs.iter_mut() {
                    out[range.clone()].fill(0.0);
                }
                continue;
            }

            let taps = self.taps.len();
            for (c, out) in outputs.iter_mut().enumerate() {
                let tap = &mut self.taps[c % taps];
                tap.pull(&mut self.info);
                reconcile_into(&mut out[range.clone()], tap.samples());
            }

            if self.info.should_delete() {
                tracing::debug!(timestamp = self.info.timestamp(), "engine_process: root finished, silencing");
                self.info.reset_should_delete();
                self.silenced = true;
            }
            self.info.advance();
        }
        Ok(())
    }

    /// Installs a new root and returns the previous one.
    ///
    /// Allocates; call it from the thread that owns the engine, outside the
    /// audio callback, or route swaps through a [`Patch`](crate::Patch).
    pub fn set_root(&mut self, root: Unit) -> Unit {
        self.taps = root.iter().cloned().map(Input::new).collect();
        self.silenced = false;
        core::mem::replace(&mut self.root, root)
    }

    /// The current root.
    pub fn root(&self) -> &Unit {
        &self.root
    }

    /// Whether the root finished and the engine is outputting silence.
    pub fn is_silenced(&self) -> bool {
        self.silenced
    }

    /// Number of blocks processed so far.
    pub fn blocks_processed(&self) -> u64 {
        self.info.timestamp()
    }

    /// The engine's context.
    pub fn context(&self) -> &GraphContext {
        &self.context
    }
}

impl core::fmt::Debug for Engine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Engine")
            .field("channels", &self.root.num_channels())
            .field("block_size", &self.context.block_size())
            .field("blocks_processed", &self.info.timestamp())
            .field("silenced", &self.silenced)
            .finish()
    }
}
