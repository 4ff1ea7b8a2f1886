//! Pull-based graph nodes and the channel handles that address them.
//!
//! A node owns one [`Kernel`] and one output buffer per kernel output. Each
//! output is exposed as a [`Channel`] handle `(node, output_index)`; a kernel
//! with several outputs is a proxy group whose channels share one
//! computation.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──init──▶ Initialized ──first pull──▶ Processing
//! ```
//!
//! A node is initialized as part of being built: its block size, sample rate
//! and initial output values are decided once and never change afterwards.
//! It is de-initialized when the last handle to it is dropped.
//!
//! # Pulling
//!
//! [`Channel::pull`] processes the node at most once per
//! [`ProcessInfo::timestamp`] and copies the requested output into the
//! caller's buffer. Node state sits behind a `parking_lot::Mutex` that is
//! only ever `try_lock`ed by pulls: if the node is already locked (which can
//! only happen when the graph contains a cycle), the pull yields silence
//! instead of blocking. Queries from other threads read atomics on the node
//! and never take that lock.

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::context::{GraphContext, Preference};
use super::process_info::ProcessInfo;

/// Per-node processing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelPhase {
    /// Built but not yet initialized.
    Uninitialized,
    /// Block size, sample rate and initial values are decided.
    Initialized,
    /// Processed at least one block.
    Processing,
}

impl ChannelPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Uninitialized,
            1 => Self::Initialized,
            _ => Self::Processing,
        }
    }
}

/// The computation behind a node.
///
/// A kernel holds its own inputs (as [`Input`]s) and pulls them from
/// [`process`](Kernel::process). It must not allocate there.
pub trait Kernel: Send + 'static {
    /// Short name for logs and debugging.
    fn name(&self) -> &'static str;

    /// Number of outputs (proxy channels). Must be at least one.
    fn num_outputs(&self) -> usize {
        1
    }

    /// Whether the output never changes after initialization.
    ///
    /// Constant channels take no part in block size and sample rate
    /// negotiation.
    fn is_constant(&self) -> bool {
        false
    }

    /// Decides block size, sample rate and initial values, and sizes any
    /// scratch state. Called exactly once, before the first `process`.
    fn init(&mut self, ctx: &mut InitContext<'_>);

    /// Fills `outputs` for the block identified by `info`.
    ///
    /// Every output slice has the block size decided in `init`.
    fn process(&mut self, info: &mut ProcessInfo, outputs: &mut [Box<[f32]>]);
}

/// Decisions a kernel makes during [`Kernel::init`].
#[derive(Debug)]
pub struct InitContext<'a> {
    graph: &'a GraphContext,
    block_size: usize,
    sample_rate: f64,
    initial: Vec<f32>,
}

impl<'a> InitContext<'a> {
    fn new(graph: &'a GraphContext, num_outputs: usize) -> Self {
        Self {
            graph,
            block_size: graph.block_size(),
            sample_rate: graph.sample_rate(),
            initial: vec![0.0; num_outputs],
        }
    }

    /// The context the node is built in.
    pub fn graph(&self) -> &GraphContext {
        self.graph
    }

    /// Resolves block size and sample rate from the preferences and the
    /// non-constant `inputs`.
    pub fn decide<'c, I>(&mut self, block_size: Preference<usize>, sample_rate: Preference<f64>, inputs: I)
    where
        I: IntoIterator<Item = &'c Channel>,
    {
        let mut widest_block: Option<usize> = None;
        let mut widest_rate: Option<f64> = None;
        for channel in inputs.into_iter().filter(|c| !c.is_constant()) {
            widest_block = Some(widest_block.map_or(channel.block_size(), |b| b.max(channel.block_size())));
            widest_rate = Some(widest_rate.map_or(channel.sample_rate(), |r| r.max(channel.sample_rate())));
        }
        self.block_size = block_size.resolve(self.graph.block_size(), widest_block).max(1);
        self.sample_rate = sample_rate.resolve(self.graph.sample_rate(), widest_rate);
    }

    /// Decided block size.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Decided sample rate.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Forces the block size (at least one sample).
    pub fn set_block_size(&mut self, block_size: usize) {
        self.block_size = block_size.max(1);
    }

    /// Forces the sample rate.
    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }

    /// Sets the value output `index` holds before its first block.
    pub fn set_initial_value(&mut self, index: usize, value: f32) {
        if let Some(slot) = self.initial.get_mut(index) {
            *slot = value;
        }
    }
}

struct NodeState {
    kernel: Box<dyn Kernel>,
    outputs: Box<[Box<[f32]>]>,
    last_timestamp: Option<u64>,
}

impl NodeState {
    /// Returns `true` if the kernel ran for this timestamp.
    fn run(&mut self, info: &mut ProcessInfo) -> bool {
        if self.last_timestamp == Some(info.timestamp()) {
            return false;
        }
        self.kernel.process(info, &mut self.outputs);
        self.last_timestamp = Some(info.timestamp());
        true
    }

    fn init(&mut self, graph: &GraphContext) -> (usize, f64, Box<[f32]>) {
        let num_outputs = self.kernel.num_outputs().max(1);
        let mut ctx = InitContext::new(graph, num_outputs);
        self.kernel.init(&mut ctx);

        let InitContext {
            block_size,
            sample_rate,
            initial,
            ..
        } = ctx;
        self.outputs = initial
            .iter()
            .map(|&value| vec![value; block_size].into_boxed_slice())
            .collect();

        tracing::trace!(
            kernel = self.kernel.name(),
            block_size,
            sample_rate,
            num_outputs,
            "node_init"
        );
        (block_size, sample_rate, initial.into_boxed_slice())
    }
}

struct Node {
    name: &'static str,
    context: GraphContext,
    block_size: usize,
    sample_rate: f64,
    initial: Box<[f32]>,
    constant: bool,
    cycle_reported: AtomicBool,
    phase: AtomicU8,
    state: Mutex<NodeState>,
}

/// Builds and initializes a node, returning one channel per kernel output.
pub(crate) fn build<K: Kernel>(graph: &GraphContext, kernel: K) -> Vec<Channel> {
    let name = kernel.name();
    let constant = kernel.is_constant();
    let mut state = NodeState {
        kernel: Box::new(kernel),
        outputs: Box::default(),
        last_timestamp: None,
    };
    let (block_size, sample_rate, initial) = state.init(graph);
    let num_outputs = initial.len();

    let node = Arc::new(Node {
        name,
        context: *graph,
        block_size,
        sample_rate,
        initial,
        constant,
        cycle_reported: AtomicBool::new(false),
        phase: AtomicU8::new(ChannelPhase::Initialized as u8),
        state: Mutex::new(state),
    });

    (0..num_outputs)
        .map(|output| Channel {
            node: Arc::clone(&node),
            output,
        })
        .collect()
}

/// Handle to one output of a graph node.
///
/// Cloning is cheap (a reference count) and yields a handle to the same
/// output.
#[derive(Clone)]
pub struct Channel {
    node: Arc<Node>,
    output: usize,
}

impl Channel {
    /// Kernel name of the node.
    pub fn name(&self) -> &'static str {
        self.node.name
    }

    /// Which output of its node this channel reads.
    pub fn output_index(&self) -> usize {
        self.output
    }

    /// Number of outputs of the node (proxy group size).
    pub fn num_node_outputs(&self) -> usize {
        self.node.initial.len()
    }

    /// Samples produced per block.
    pub fn block_size(&self) -> usize {
        self.node.block_size
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> f64 {
        self.node.sample_rate
    }

    /// Value held before the first block.
    pub fn initial_value(&self) -> f32 {
        self.node.initial[self.output]
    }

    /// Whether the output never changes.
    pub fn is_constant(&self) -> bool {
        self.node.constant
    }

    /// Context the node was built in.
    pub fn context(&self) -> &GraphContext {
        &self.node.context
    }

    /// Whether both handles address the same node.
    pub fn same_node(&self, other: &Channel) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    /// Current lifecycle phase. Safe to poll from any thread while the
    /// graph runs.
    pub fn phase(&self) -> ChannelPhase {
        ChannelPhase::from_u8(self.node.phase.load(Ordering::Acquire))
    }

    /// Processes the node for this block if needed and copies this output
    /// into `dst`.
    ///
    /// `dst` must hold [`block_size`](Self::block_size) samples; a length
    /// mismatch is reconciled. Yields silence if the node is locked further
    /// up the current pull chain.
    pub fn pull(&self, info: &mut ProcessInfo, dst: &mut [f32]) {
        let Some(mut state) = self.node.state.try_lock() else {
            if !self.node.cycle_reported.swap(true, Ordering::Relaxed) {
                tracing::warn!(kernel = self.node.name, "graph_pull: cycle detected, output silenced");
            }
            dst.fill(0.0);
            return;
        };
        if state.run(info) {
            self.node.phase.store(ChannelPhase::Processing as u8, Ordering::Release);
        }
        super::reconcile::reconcile_into(dst, &state.outputs[self.output]);
    }
}

impl core::fmt::Debug for Channel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.node.name)
            .field("output", &self.output)
            .field("block_size", &self.node.block_size)
            .field("sample_rate", &self.node.sample_rate)
            .finish()
    }
}

/// A kernel's view of one input channel plus a buffer for its samples.
#[derive(Debug)]
pub struct Input {
    channel: Channel,
    buffer: Box<[f32]>,
}

impl Input {
    /// Wraps `channel`, allocating a buffer of its block size.
    pub fn new(channel: Channel) -> Self {
        let buffer = vec![channel.initial_value(); channel.block_size()].into_boxed_slice();
        Self { channel, buffer }
    }

    /// The wrapped channel.
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Pulls the channel for the current block.
    pub fn pull(&mut self, info: &mut ProcessInfo) -> &[f32] {
        self.channel.pull(info, &mut self.buffer);
        &self.buffer
    }

    /// Samples from the most recent pull.
    pub fn samples(&self) -> &[f32] {
        &self.buffer
    }
}
