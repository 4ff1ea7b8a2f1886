//! Per-block processing state passed down the pull chain.

/// Timestamp and flags for one host block.
///
/// The timestamp identifies the block; a channel pulled twice with the same
/// timestamp returns its cached output instead of processing again.
#[derive(Debug, Clone, Default)]
pub struct ProcessInfo {
    timestamp: u64,
    should_delete: bool,
}

impl ProcessInfo {
    /// Creates info for the first block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifier of the current block.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Moves on to the next block.
    pub fn advance(&mut self) {
        self.timestamp += 1;
    }

    /// Whether some channel finished and asked for the graph to be removed.
    pub fn should_delete(&self) -> bool {
        self.should_delete
    }

    /// Latches the should-delete flag.
    pub fn set_should_delete(&mut self) {
        self.should_delete = true;
    }

    /// Clears the should-delete flag.
    pub fn reset_should_delete(&mut self) {
        self.should_delete = false;
    }
}
