//! Source kernels with no inputs.

use crate::error::{EngineError, Result};
use crate::graph::{InitContext, Kernel, ProcessInfo};

/// A single value that never changes. One sample per block.
#[derive(Debug, Clone)]
pub struct Constant {
    value: f32,
    name: &'static str,
}

impl Constant {
    /// Constant holding `value`.
    pub fn new(value: f32) -> Self {
        Self {
            value,
            name: "Constant",
        }
    }

    /// Constant silence.
    pub fn null() -> Self {
        Self {
            value: 0.0,
            name: "Null",
        }
    }
}

impl Kernel for Constant {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_constant(&self) -> bool {
        true
    }

    fn init(&mut self, ctx: &mut InitContext<'_>) {
        ctx.set_block_size(1);
        ctx.set_initial_value(0, self.value);
    }

    fn process(&mut self, _info: &mut ProcessInfo, _outputs: &mut [Box<[f32]>]) {}
}

/// Loops a table of samples, one block per pull.
#[derive(Debug, Clone)]
pub struct Samples {
    table: Vec<f32>,
    position: usize,
}

impl Samples {
    /// Fails with [`EngineError::ItemCountInvalid`] if `table` is empty.
    pub fn new(table: Vec<f32>) -> Result<Self> {
        if table.is_empty() {
            return Err(EngineError::ItemCountInvalid(0));
        }
        Ok(Self { table, position: 0 })
    }
}

impl Kernel for Samples {
    fn name(&self) -> &'static str {
        "Samples"
    }

    fn init(&mut self, ctx: &mut InitContext<'_>) {
        ctx.set_initial_value(0, self.table[0]);
    }

    fn process(&mut self, _info: &mut ProcessInfo, outputs: &mut [Box<[f32]>]) {
        let len = self.table.len();
        for sample in outputs[0].iter_mut() {
            *sample = self.table[self.position];
            self.position += 1;
            if self.position == len {
                self.position = 0;
            }
        }
    }
}
