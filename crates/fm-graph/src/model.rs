//! The model: owner of every signal and block, and the evaluation driver.

use std::collections::HashMap;

use fm_core::{BlockId, BreakpointId, Epoch, SignalId, TableId};
use tracing::trace;

use crate::block::{Block, BlockKind};
use crate::breakpoint::BreakpointSet;
use crate::builder::unique_name;
use crate::error::{ModelError, ModelResult};
use crate::signal::Signal;
use crate::table::FuncTable;
use crate::vector::VectorInfo;

/// A wired model graph.
///
/// Signals and blocks live in arenas and refer to each other by typed index.
/// After [`initialize`](Self::initialize) the execution order is cached and
/// every [`cycle`](Self::cycle) walks it once.
#[derive(Debug, Clone)]
pub struct Model {
    pub(crate) name: String,
    pub(crate) signals: Vec<Signal>,
    pub(crate) var_index: HashMap<String, SignalId>,
    pub(crate) blocks: Vec<Block>,
    pub(crate) block_index: HashMap<String, BlockId>,
    pub(crate) breakpoints: Vec<BreakpointSet>,
    pub(crate) bp_index: HashMap<String, BreakpointId>,
    pub(crate) tables: Vec<FuncTable>,
    pub(crate) table_index: HashMap<String, TableId>,
    /// Input blocks in creation order.
    pub(crate) inputs: Vec<BlockId>,
    /// Output blocks in creation order.
    pub(crate) outputs: Vec<BlockId>,
    pub(crate) order: Option<Vec<BlockId>>,
    pub(crate) epoch: Epoch,
    pub(crate) output_vector: Vec<VectorInfo>,
    /// Reused buffer for gathering block input values.
    pub(crate) scratch: Vec<f64>,
}

impl Model {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn signal(&self, id: SignalId) -> Option<&Signal> {
        self.signals.get(id.index())
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.index())
    }

    pub fn signal_id(&self, var_id: &str) -> Option<SignalId> {
        self.var_index.get(var_id).copied()
    }

    pub fn signal_by_var_id(&self, var_id: &str) -> Option<&Signal> {
        self.signal_id(var_id).and_then(|id| self.signal(id))
    }

    pub fn block_id(&self, name: &str) -> Option<BlockId> {
        self.block_index.get(name).copied()
    }

    pub fn breakpoint_sets(&self) -> &[BreakpointSet] {
        &self.breakpoints
    }

    pub fn breakpoint_set(&self, id: BreakpointId) -> Option<&BreakpointSet> {
        self.breakpoints.get(id.index())
    }

    pub fn breakpoint_set_by_id(&self, id: &str) -> Option<&BreakpointSet> {
        self.bp_index.get(id).and_then(|&h| self.breakpoint_set(h))
    }

    pub fn tables(&self) -> &[FuncTable] {
        &self.tables
    }

    pub fn table(&self, id: TableId) -> Option<&FuncTable> {
        self.tables.get(id.index())
    }

    pub fn table_by_id(&self, id: &str) -> Option<&FuncTable> {
        self.table_index.get(id).and_then(|&h| self.table(h))
    }

    /// Table read by a lookup block, if `block` is one.
    pub fn table_for(&self, block: BlockId) -> Option<&FuncTable> {
        match self.block(block)?.kind {
            BlockKind::TableLookup { table } => self.table(table),
            _ => None,
        }
    }

    /// Breakpoint set read by a normalizer block, if `block` is one.
    pub fn breakpoints_for(&self, block: BlockId) -> Option<&BreakpointSet> {
        match self.block(block)?.kind {
            BlockKind::Normalizer { breakpoints } => self.breakpoint_set(breakpoints),
            _ => None,
        }
    }

    /// Count of blocks per operator tag, in first-seen order.
    pub fn block_census(&self) -> Vec<(&'static str, usize)> {
        let mut census: Vec<(&'static str, usize)> = Vec::new();
        for block in &self.blocks {
            let tag = block.kind.tag();
            match census.iter_mut().find(|(t, _)| *t == tag) {
                Some((_, n)) => *n += 1,
                None => census.push((tag, 1)),
            }
        }
        census
    }

    /// Blocks that read a table, for code generators.
    pub fn lookup_blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| matches!(b.kind, BlockKind::TableLookup { .. }))
            .map(|(i, _)| BlockId::from_index(i))
    }

    /// Input signals of a block, in port order.
    pub fn block_inputs(&self, block: BlockId) -> impl Iterator<Item = &Signal> + '_ {
        self.block(block)
            .into_iter()
            .flat_map(|b| b.inputs.iter())
            .filter_map(|&s| self.signal(s))
    }

    /// Output signal of a block.
    pub fn block_output(&self, block: BlockId) -> Option<&Signal> {
        self.block(block)?.output.and_then(|s| self.signal(s))
    }

    pub fn input_blocks(&self) -> &[BlockId] {
        &self.inputs
    }

    pub fn output_blocks(&self) -> &[BlockId] {
        &self.outputs
    }

    /// Cached execution order, once initialized.
    pub fn execution_order(&self) -> Option<&[BlockId]> {
        self.order.as_deref()
    }

    pub fn is_initialized(&self) -> bool {
        self.order.is_some()
    }

    /// Current evaluation cycle.
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Current value of any signal, read from its producer.
    pub fn value_of(&self, var_id: &str) -> Option<f64> {
        let source = self.signal_by_var_id(var_id)?.source?;
        self.block(source.block).map(Block::value)
    }

    /// Ordered input records with current values.
    pub fn input_vector(&self) -> Vec<VectorInfo> {
        self.inputs
            .iter()
            .filter_map(|&id| self.vector_entry(id, self.blocks[id.index()].output?))
            .collect()
    }

    /// Ordered output records as of the last cycle.
    ///
    /// Before the first cycle the values are the outputs' initial zeros.
    pub fn output_vector(&self) -> Vec<VectorInfo> {
        if self.output_vector.len() == self.outputs.len() {
            return self.output_vector.clone();
        }
        self.outputs
            .iter()
            .filter_map(|&id| self.vector_entry(id, *self.blocks[id.index()].inputs.first()?))
            .collect()
    }

    /// Output records from the most recent cycle without copying.
    pub fn outputs(&self) -> &[VectorInfo] {
        &self.output_vector
    }

    fn vector_entry(&self, block: BlockId, signal: SignalId) -> Option<VectorInfo> {
        let s = self.signal(signal)?;
        Some(VectorInfo {
            name: s.name.clone(),
            var_id: s.var_id.clone(),
            units: s.units.clone(),
            value: self.blocks[block.index()].value,
            lower: s.lower,
            upper: s.upper,
        })
    }

    /// Set the value an input block will present on the next cycle.
    ///
    /// `key` is the input signal's variable ID or display name. A declared
    /// input that had a limiter spliced in is still addressed by its own
    /// variable ID; the value goes to the pre-limit half.
    pub fn set_input_value(&mut self, key: &str, value: f64) -> ModelResult<()> {
        match self.input_block_for(key) {
            Some(id) => {
                self.blocks[id.index()].value = value;
                Ok(())
            }
            None => Err(ModelError::UnknownInput {
                name: key.to_string(),
            }),
        }
    }

    fn input_block_for(&self, key: &str) -> Option<BlockId> {
        let is_key = |s: &Signal| s.var_id == key || s.name == key;
        let direct = self.inputs.iter().copied().find(|&id| {
            self.blocks[id.index()]
                .output
                .and_then(|s| self.signal(s))
                .is_some_and(is_key)
        });
        direct.or_else(|| {
            let limited = self.signals.iter().find(|&s| s.limited && is_key(s))?;
            let limiter = &self.blocks[limited.source?.block.index()];
            if !matches!(limiter.kind, BlockKind::Limiter { .. }) {
                return None;
            }
            let upstream = *limiter.inputs.first()?;
            let producer = self.signal(upstream)?.source?.block;
            self.inputs.contains(&producer).then_some(producer)
        })
    }

    /// Copy every value of a caller-supplied input vector into the model.
    pub fn load_inputs(&mut self, inputs: &[VectorInfo]) -> ModelResult<()> {
        for entry in inputs {
            self.set_input_value(&entry.var_id, entry.value)?;
        }
        Ok(())
    }

    /// Run one evaluation cycle.
    ///
    /// The first call (or the first after [`hook_up_io`](Self::hook_up_io))
    /// computes the execution order; later calls walk the cached order.
    pub fn cycle(&mut self) -> ModelResult<()> {
        self.epoch.advance();
        match self.order.take() {
            None => self.schedule()?,
            Some(order) => {
                let result = order.iter().try_for_each(|&id| self.run_scheduled(id));
                self.order = Some(order);
                result?;
            }
        }
        self.harvest_outputs();
        trace!(epoch = %self.epoch, "cycle complete");
        Ok(())
    }

    /// Refresh the output vector, reusing it when membership is unchanged.
    pub(crate) fn harvest_outputs(&mut self) {
        if self.output_vector.len() != self.outputs.len() {
            self.output_vector = self.output_vector();
        }
        for (entry, &id) in self.output_vector.iter_mut().zip(&self.outputs) {
            entry.value = self.blocks[id.index()].value;
        }
    }

    /// Add a signal to the arena.
    pub(crate) fn push_signal(&mut self, signal: Signal) -> SignalId {
        let id = SignalId::from_index(self.signals.len());
        self.var_index.insert(signal.var_id.clone(), id);
        self.signals.push(signal);
        id
    }

    /// Add a block under a unique name derived from `base`.
    pub(crate) fn push_block(&mut self, base: &str, kind: BlockKind) -> BlockId {
        let name = unique_name(|n| self.block_index.contains_key(n), base);
        let id = BlockId::from_index(self.blocks.len());
        match kind {
            BlockKind::Input => self.inputs.push(id),
            BlockKind::Output => self.outputs.push(id),
            _ => {}
        }
        self.block_index.insert(name.clone(), id);
        self.blocks.push(Block::new(name, kind));
        self.order = None;
        id
    }

    /// Make `block` the producer of `signal`.
    pub(crate) fn add_source(&mut self, signal: SignalId, block: BlockId) {
        self.signals[signal.index()].add_source(block, 0);
        self.blocks[block.index()].output = Some(signal);
    }

    /// Connect `signal` to input `port` of `block`, updating both sides.
    pub(crate) fn add_sink(
        &mut self,
        signal: SignalId,
        block: BlockId,
        port: usize,
    ) -> ModelResult<()> {
        self.blocks[block.index()].bind_input(port, signal)?;
        self.signals[signal.index()].push_sink(block, port);
        Ok(())
    }

    /// A variable ID not yet used in this model.
    pub(crate) fn fresh_var_id(&self, base: &str) -> String {
        unique_name(|n| self.var_index.contains_key(n), base)
    }
}
