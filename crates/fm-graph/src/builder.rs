//! Incremental model builder.
//!
//! The builder holds the unresolved graph: block ports may name variables
//! that are declared later. [`ModelBuilder::wire_blocks`] resolves every
//! name and freezes the result into a [`Model`], whose blocks hold only
//! bound signal handles.

use std::collections::{HashMap, HashSet};

use fm_core::{BlockId, BreakpointId, Epoch, SignalId, TableId};
use tracing::debug;

use crate::block::{Block, BlockKind};
use crate::breakpoint::BreakpointSet;
use crate::error::{ModelError, ModelResult};
use crate::model::Model;
use crate::signal::Signal;
use crate::table::FuncTable;

/// A port binding that may still be a bare variable name.
#[derive(Debug, Clone, PartialEq)]
enum PortRef {
    Signal(SignalId),
    Var(String),
}

#[derive(Debug, Clone)]
struct PendingBlock {
    name: String,
    kind: BlockKind,
    inputs: Vec<Option<PortRef>>,
    output: Option<PortRef>,
}

impl PendingBlock {
    fn bind(&mut self, port: usize, r: PortRef) {
        if port >= self.inputs.len() {
            self.inputs.resize(port + 1, None);
        }
        self.inputs[port] = Some(r);
    }
}

/// Builder for constructing a model incrementally.
///
/// Declare signals with `add_signal`, register breakpoint sets and tables,
/// add blocks and bind their ports, then call `build()` (or `wire_blocks()`
/// followed by [`Model::hook_up_io`]).
#[derive(Debug, Default)]
pub struct ModelBuilder {
    name: String,
    signals: Vec<Signal>,
    var_index: HashMap<String, SignalId>,
    blocks: Vec<PendingBlock>,
    block_names: HashSet<String>,
    breakpoints: Vec<BreakpointSet>,
    bp_index: HashMap<String, BreakpointId>,
    tables: Vec<FuncTable>,
    table_index: HashMap<String, TableId>,
    /// (breakpoint set, input variable) -> derived index-and-weight variable
    normalizers: HashMap<(BreakpointId, String), String>,
    anon_tables: usize,
}

impl ModelBuilder {
    /// Create a new empty builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Declare a signal. Any wiring already present on `signal` is discarded.
    pub fn add_signal(&mut self, mut signal: Signal) -> ModelResult<SignalId> {
        if self.var_index.contains_key(&signal.var_id) {
            return Err(ModelError::DuplicateVarId {
                var_id: signal.var_id,
            });
        }
        signal.source = None;
        signal.sinks.clear();
        let id = SignalId::from_index(self.signals.len());
        self.var_index.insert(signal.var_id.clone(), id);
        self.signals.push(signal);
        Ok(id)
    }

    /// Look up a declared signal by variable ID.
    pub fn signal_id(&self, var_id: &str) -> Option<SignalId> {
        self.var_index.get(var_id).copied()
    }

    pub fn signal(&self, id: SignalId) -> Option<&Signal> {
        self.signals.get(id.index())
    }

    /// Add a block. The name is made unique by suffixing `_<n>` if needed.
    pub fn add_block(&mut self, name: &str, kind: BlockKind) -> ModelResult<BlockId> {
        let id = BlockId::from_index(self.blocks.len());
        match &kind {
            BlockKind::Normalizer { breakpoints } => {
                let set = self.breakpoints.get_mut(breakpoints.index()).ok_or_else(|| {
                    ModelError::MissingBreakpointSet {
                        id: breakpoints.to_string(),
                    }
                })?;
                set.users.push(id);
            }
            BlockKind::TableLookup { table } => {
                let t = self.tables.get_mut(table.index()).ok_or_else(|| {
                    ModelError::MissingFuncTable {
                        id: table.to_string(),
                    }
                })?;
                t.users.push(id);
            }
            _ => {}
        }
        let name = unique_name(|n| self.block_names.contains(n), name);
        self.block_names.insert(name.clone());
        self.blocks.push(PendingBlock {
            name,
            kind,
            inputs: Vec::new(),
            output: None,
        });
        Ok(id)
    }

    /// Name a block was given (after disambiguation).
    pub fn block_name(&self, block: BlockId) -> Option<&str> {
        self.blocks.get(block.index()).map(|b| b.name.as_str())
    }

    /// Bind input `port` of `block` to a declared signal.
    pub fn add_input(&mut self, block: BlockId, signal: SignalId, port: usize) -> ModelResult<()> {
        if signal.index() >= self.signals.len() {
            return Err(ModelError::Invariant {
                what: format!("signal handle {signal} out of range"),
            });
        }
        self.pending_mut(block)?.bind(port, PortRef::Signal(signal));
        Ok(())
    }

    /// Bind input `port` of `block` to a variable resolved at wiring time.
    pub fn add_var_id(
        &mut self,
        block: BlockId,
        port: usize,
        var_id: impl Into<String>,
    ) -> ModelResult<()> {
        self.pending_mut(block)?.bind(port, PortRef::Var(var_id.into()));
        Ok(())
    }

    /// Make `block` the producer of a declared signal.
    pub fn add_output(&mut self, block: BlockId, signal: SignalId) -> ModelResult<()> {
        if signal.index() >= self.signals.len() {
            return Err(ModelError::Invariant {
                what: format!("signal handle {signal} out of range"),
            });
        }
        self.set_output(block, PortRef::Signal(signal))
    }

    /// Make `block` the producer of a variable resolved at wiring time.
    pub fn set_output_var_id(
        &mut self,
        block: BlockId,
        var_id: impl Into<String>,
    ) -> ModelResult<()> {
        self.set_output(block, PortRef::Var(var_id.into()))
    }

    fn set_output(&mut self, block: BlockId, r: PortRef) -> ModelResult<()> {
        let pending = self.pending_mut(block)?;
        if !pending.kind.has_output() {
            return Err(ModelError::Invariant {
                what: format!("block '{}' has no output port", pending.name),
            });
        }
        pending.output = Some(r);
        Ok(())
    }

    fn pending_mut(&mut self, block: BlockId) -> ModelResult<&mut PendingBlock> {
        self.blocks
            .get_mut(block.index())
            .ok_or_else(|| ModelError::Invariant {
                what: format!("block handle {block} out of range"),
            })
    }

    /// Register a breakpoint set under `id`.
    pub fn register_breakpoints(
        &mut self,
        id: &str,
        values: Vec<f64>,
    ) -> ModelResult<BreakpointId> {
        if self.bp_index.contains_key(id) {
            return Err(ModelError::DuplicateId {
                what: "breakpoint set",
                id: id.to_string(),
            });
        }
        let set = BreakpointSet::new(id, values)?;
        let handle = BreakpointId::from_index(self.breakpoints.len());
        self.bp_index.insert(id.to_string(), handle);
        self.breakpoints.push(set);
        Ok(handle)
    }

    /// Register a gridded table over previously registered breakpoint sets.
    ///
    /// Tables private to one function may pass `None`; they receive a
    /// synthetic `anon_table_<n>` key.
    pub fn register_table(
        &mut self,
        id: Option<&str>,
        axes: &[&str],
        values: Vec<f64>,
    ) -> ModelResult<TableId> {
        let id = match id {
            Some(id) => {
                if self.table_index.contains_key(id) {
                    return Err(ModelError::DuplicateId {
                        what: "function table",
                        id: id.to_string(),
                    });
                }
                id.to_string()
            }
            None => loop {
                self.anon_tables += 1;
                let key = format!("anon_table_{}", self.anon_tables);
                if !self.table_index.contains_key(&key) {
                    break key;
                }
            },
        };

        let mut resolved = Vec::with_capacity(axes.len());
        for &axis in axes {
            let bp = self.breakpoint_id(axis)?;
            resolved.push((bp, axis.to_string(), self.breakpoints[bp.index()].len()));
        }

        let table = FuncTable::new(id.clone(), resolved, values)?;
        let handle = TableId::from_index(self.tables.len());
        self.table_index.insert(id, handle);
        self.tables.push(table);
        Ok(handle)
    }

    pub fn breakpoint_id(&self, id: &str) -> ModelResult<BreakpointId> {
        self.bp_index
            .get(id)
            .copied()
            .ok_or_else(|| ModelError::MissingBreakpointSet { id: id.to_string() })
    }

    pub fn table_id(&self, id: &str) -> ModelResult<TableId> {
        self.table_index
            .get(id)
            .copied()
            .ok_or_else(|| ModelError::MissingFuncTable { id: id.to_string() })
    }

    pub fn table(&self, id: TableId) -> Option<&FuncTable> {
        self.tables.get(id.index())
    }

    /// Normalize `input_var` against breakpoint set `bp_id`.
    ///
    /// Returns the derived index-and-weight variable. One normalizer exists
    /// per (breakpoint set, input) pair; later calls reuse it.
    pub fn add_normalizer(&mut self, bp_id: &str, input_var: &str) -> ModelResult<String> {
        let bp = self.breakpoint_id(bp_id)?;
        let key = (bp, input_var.to_string());
        if let Some(existing) = self.normalizers.get(&key) {
            debug!(bp = bp_id, input = input_var, "reusing normalizer");
            return Ok(existing.clone());
        }

        let var_id = unique_name(
            |n| self.var_index.contains_key(n),
            &format!("{input_var}_x_{bp_id}"),
        );
        let signal = self.add_signal(Signal::derived(var_id.clone(), ""))?;
        let block = self.add_block(
            &format!("{var_id}_bp"),
            BlockKind::Normalizer { breakpoints: bp },
        )?;
        self.add_var_id(block, 0, input_var)?;
        self.add_output(block, signal)?;
        self.normalizers.insert(key, var_id.clone());
        Ok(var_id)
    }

    /// Add a table lookup fed directly by index-and-weight variables.
    pub fn add_table_lookup(
        &mut self,
        name: &str,
        table_id: &str,
        index_weight_vars: &[String],
        output_var: &str,
    ) -> ModelResult<BlockId> {
        let table = self.table_id(table_id)?;
        let block = self.add_block(name, BlockKind::TableLookup { table })?;
        for (port, var) in index_weight_vars.iter().enumerate() {
            self.add_var_id(block, port, var.as_str())?;
        }
        self.set_output_var_id(block, output_var)?;
        Ok(block)
    }

    /// Add a gridded function `output = table(inputs...)`.
    ///
    /// Creates (or reuses) one normalizer per axis, in the table's axis order,
    /// followed by a lookup block.
    pub fn add_function(
        &mut self,
        name: &str,
        table_id: &str,
        inputs: &[&str],
        output_var: &str,
    ) -> ModelResult<BlockId> {
        let table = self.table_id(table_id)?;
        let axis_ids = self.tables[table.index()].axis_ids().to_vec();
        if axis_ids.len() != inputs.len() {
            return Err(ModelError::ArityMismatch {
                block: name.to_string(),
                tag: "table",
                expected: crate::block::Arity::Exactly(axis_ids.len()),
                actual: inputs.len(),
            });
        }
        let mut index_weights = Vec::with_capacity(inputs.len());
        for (axis, input) in axis_ids.iter().zip(inputs) {
            index_weights.push(self.add_normalizer(axis, input)?);
        }
        self.add_table_lookup(name, table_id, &index_weights, output_var)
    }

    /// Resolve every pending variable reference and freeze the graph.
    ///
    /// Both sides of every edge are recorded: the consuming block's port and
    /// the signal's sink list. Fails on the first unresolvable reference.
    pub fn wire_blocks(self) -> ModelResult<Model> {
        let ModelBuilder {
            name,
            mut signals,
            var_index,
            blocks: pending,
            breakpoints,
            bp_index,
            tables,
            table_index,
            ..
        } = self;

        let resolve = |block: &str, r: PortRef| -> ModelResult<SignalId> {
            match r {
                PortRef::Signal(id) => Ok(id),
                PortRef::Var(var_id) => {
                    var_index
                        .get(&var_id)
                        .copied()
                        .ok_or_else(|| ModelError::UnresolvedReference {
                            block: block.to_string(),
                            var_id,
                        })
                }
            }
        };

        let mut blocks: Vec<Block> = Vec::with_capacity(pending.len());
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        for (i, p) in pending.into_iter().enumerate() {
            let id = BlockId::from_index(i);
            let mut block = Block::new(p.name, p.kind);

            for (port, r) in p.inputs.into_iter().enumerate() {
                let r = r.ok_or_else(|| ModelError::UnboundPort {
                    block: block.name.clone(),
                    port,
                })?;
                let sid = resolve(&block.name, r)?;
                block.inputs.push(sid);
                signals[sid.index()].push_sink(id, port);
            }

            if let Some(r) = p.output {
                let sid = resolve(&block.name, r)?;
                let signal = &mut signals[sid.index()];
                if let Some(prev) = signal.source {
                    return Err(ModelError::DuplicateSource {
                        var_id: signal.var_id.clone(),
                        first: blocks[prev.block.index()].name.clone(),
                        second: block.name,
                    });
                }
                signal.add_source(id, 0);
                block.output = Some(sid);
            }

            match block.kind {
                BlockKind::Input => inputs.push(id),
                BlockKind::Output => outputs.push(id),
                _ => {}
            }
            blocks.push(block);
        }

        let block_index = blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (b.name.clone(), BlockId::from_index(i)))
            .collect();

        debug!(
            model = %name,
            signals = signals.len(),
            blocks = blocks.len(),
            "wired blocks"
        );

        Ok(Model {
            name,
            signals,
            var_index,
            blocks,
            block_index,
            breakpoints,
            bp_index,
            tables,
            table_index,
            inputs,
            outputs,
            order: None,
            epoch: Epoch::ZERO,
            output_vector: Vec::new(),
            scratch: Vec::new(),
        })
    }

    /// Wire blocks and insert the synthetic I/O, constant and limiter blocks.
    pub fn build(self) -> ModelResult<Model> {
        let mut model = self.wire_blocks()?;
        model.hook_up_io()?;
        Ok(model)
    }
}

/// `base` if free, otherwise the first free `base_<n>`.
pub(crate) fn unique_name(taken: impl Fn(&str) -> bool, base: &str) -> String {
    if !taken(base) {
        return base.to_string();
    }
    (1..)
        .map(|n| format!("{base}_{n}"))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_string())
}
