//! Evaluation-order computation and per-block update.
//!
//! Readiness is a version check: a block's value is current iff its
//! `result_epoch` equals the model's epoch. The initial ordering pass and the
//! steady-state cycle both go through [`Model::update_block`].

use fm_core::BlockId;
use tracing::{debug, info};

use crate::block::describe;
use crate::error::{ModelError, ModelResult};
use crate::model::Model;

impl Model {
    /// Compute the execution order, evaluating the model once on the way.
    ///
    /// Idempotent: does nothing if an order is already cached. Fails with
    /// [`ModelError::AlgebraicLoop`] if the graph contains a cyclic
    /// dependency, after which the model cannot be evaluated.
    pub fn initialize(&mut self) -> ModelResult<()> {
        if self.order.is_some() {
            return Ok(());
        }
        self.epoch.advance();
        self.schedule()?;
        self.harvest_outputs();
        Ok(())
    }

    /// Fixpoint ordering pass for the current epoch.
    ///
    /// Each pass updates every pending block; the blocks that became current
    /// move, in pass order, to the tail of the order. A pass that does not
    /// shrink the pending set means a loop.
    pub(crate) fn schedule(&mut self) -> ModelResult<()> {
        let epoch = self.epoch;
        let mut pending: Vec<BlockId> = (0..self.blocks.len()).map(BlockId::from_index).collect();
        let mut order = Vec::with_capacity(pending.len());
        let mut remaining = pending.len();
        let mut passes = 0_usize;

        while !pending.is_empty() {
            passes += 1;
            for &id in &pending {
                self.update_block(id)?;
            }

            let (ready, stuck): (Vec<BlockId>, Vec<BlockId>) = pending
                .into_iter()
                .partition(|id| self.blocks[id.index()].is_current(epoch));
            debug!(
                pass = passes,
                scheduled = ready.len(),
                pending = stuck.len(),
                "scheduling pass"
            );
            order.extend(ready);
            pending = stuck;

            if !pending.is_empty() && pending.len() >= remaining {
                let blocks = pending.iter().map(|&id| describe(&self.blocks, id)).collect();
                return Err(ModelError::AlgebraicLoop {
                    stuck: pending.len(),
                    blocks,
                });
            }
            remaining = pending.len();
        }

        info!(model = %self.name, blocks = order.len(), passes, "execution order computed");
        self.order = Some(order);
        Ok(())
    }

    /// Steady-state step: the cached order guarantees every input is current.
    pub(crate) fn run_scheduled(&mut self, id: BlockId) -> ModelResult<()> {
        if self.update_block(id)? {
            Ok(())
        } else {
            Err(ModelError::Invariant {
                what: format!(
                    "block '{}' scheduled before its inputs",
                    describe(&self.blocks, id)
                ),
            })
        }
    }

    /// Recompute one block if every input's producer is current.
    ///
    /// Returns whether the block was computed. A stale input is not an error;
    /// the block simply keeps its previous value and epoch. An arity
    /// violation is.
    pub(crate) fn update_block(&mut self, id: BlockId) -> ModelResult<bool> {
        let epoch = self.epoch;
        let block = &self.blocks[id.index()];
        let arity = block.kind.arity(&self.tables);
        if !arity.accepts(block.inputs.len()) {
            return Err(ModelError::ArityMismatch {
                block: block.name.clone(),
                tag: block.kind.tag(),
                expected: arity,
                actual: block.inputs.len(),
            });
        }

        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        for &signal in &block.inputs {
            let source = self.signals[signal.index()].source.ok_or_else(|| {
                ModelError::Invariant {
                    what: format!(
                        "signal '{}' has no producer",
                        self.signals[signal.index()].var_id
                    ),
                }
            })?;
            let producer = &self.blocks[source.block.index()];
            if !producer.is_current(epoch) {
                self.scratch = scratch;
                return Ok(false);
            }
            scratch.push(producer.value);
        }

        let value = block
            .kind
            .evaluate(&scratch, block.value, &self.breakpoints, &self.tables)?;
        let block = &mut self.blocks[id.index()];
        block.value = value;
        block.result_epoch = Some(epoch);
        self.scratch = scratch;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockKind, Relation};
    use crate::builder::ModelBuilder;
    use crate::signal::Signal;

    #[test]
    fn chain_is_ordered_producer_first() {
        // a(const) -> neg -> abs -> out
        let mut b = ModelBuilder::new("chain");
        b.add_signal(Signal::new("A", "a", "")).unwrap();
        b.add_signal(Signal::new("B", "b", "")).unwrap();
        b.add_signal(Signal::new("C", "c", "")).unwrap();
        // declare consumers before producers to make the first pass incomplete
        let abs = b
            .add_block("abs", BlockKind::Unary(crate::block::UnaryFn::Abs))
            .unwrap();
        b.add_var_id(abs, 0, "B").unwrap();
        b.set_output_var_id(abs, "C").unwrap();
        let neg = b.add_block("neg", BlockKind::Minus).unwrap();
        b.add_var_id(neg, 0, "A").unwrap();
        b.set_output_var_id(neg, "B").unwrap();
        let k = b.add_block("k", BlockKind::Constant { value: 3.0 }).unwrap();
        b.set_output_var_id(k, "A").unwrap();

        let mut m = b.build().unwrap();
        m.initialize().unwrap();
        let order = m.execution_order().unwrap();
        let pos = |id: BlockId| order.iter().position(|&o| o == id).unwrap();
        assert!(pos(k) < pos(neg));
        assert!(pos(neg) < pos(abs));
        assert_eq!(order.len(), m.blocks().len());
        assert_eq!(m.value_of("C"), Some(3.0));
    }

    #[test]
    fn initialize_is_idempotent() {
        let mut b = ModelBuilder::new("k");
        b.add_signal(Signal::new("A", "a", "").as_output()).unwrap();
        let k = b.add_block("k", BlockKind::Constant { value: 1.0 }).unwrap();
        b.set_output_var_id(k, "A").unwrap();
        let mut m = b.build().unwrap();
        m.initialize().unwrap();
        let first = m.execution_order().unwrap().to_vec();
        let epoch = m.epoch();
        m.initialize().unwrap();
        assert_eq!(m.execution_order().unwrap(), first.as_slice());
        assert_eq!(m.epoch(), epoch);
    }

    #[test]
    fn two_block_loop_detected() {
        // X = Y + 1, Y = -X
        let mut b = ModelBuilder::new("loop");
        b.add_signal(Signal::new("X", "x", "")).unwrap();
        b.add_signal(Signal::new("Y", "y", "")).unwrap();
        b.add_signal(Signal::new("ONE", "one", "").with_initial_value(1.0)).unwrap();
        let sum = b.add_block("sum", BlockKind::Sum).unwrap();
        b.add_var_id(sum, 0, "Y").unwrap();
        b.add_var_id(sum, 1, "ONE").unwrap();
        b.set_output_var_id(sum, "X").unwrap();
        let neg = b.add_block("neg", BlockKind::Minus).unwrap();
        b.add_var_id(neg, 0, "X").unwrap();
        b.set_output_var_id(neg, "Y").unwrap();

        let mut m = b.build().unwrap();
        let err = m.initialize().unwrap_err();
        match err {
            ModelError::AlgebraicLoop { stuck, blocks } => {
                assert_eq!(stuck, 2);
                assert!(blocks.contains(&"sum".to_string()));
                assert!(blocks.contains(&"neg".to_string()));
            }
            other => panic!("expected loop, got {other:?}"),
        }
        assert!(!m.is_initialized());
    }

    #[test]
    fn arity_checked_at_evaluation() {
        let mut b = ModelBuilder::new("arity");
        b.add_signal(Signal::new("A", "a", "").with_initial_value(1.0)).unwrap();
        b.add_signal(Signal::new("R", "r", "")).unwrap();
        let rel = b.add_block("cmp", BlockKind::Relation(Relation::Lt)).unwrap();
        b.add_var_id(rel, 0, "A").unwrap();
        b.set_output_var_id(rel, "R").unwrap();
        let mut m = b.build().unwrap();
        let err = m.initialize().unwrap_err();
        assert!(matches!(
            err,
            ModelError::ArityMismatch {
                tag: "lt",
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn stale_input_is_not_an_error() {
        let mut b = ModelBuilder::new("stale");
        b.add_signal(Signal::new("A", "a", "").as_input()).unwrap();
        b.add_signal(Signal::new("B", "b", "")).unwrap();
        let neg = b.add_block("neg", BlockKind::Minus).unwrap();
        b.add_var_id(neg, 0, "A").unwrap();
        b.set_output_var_id(neg, "B").unwrap();
        let mut m = b.build().unwrap();
        m.epoch.advance();
        // the input block has not run this epoch yet
        assert!(!m.update_block(neg).unwrap());
        assert_eq!(m.block(neg).unwrap().result_epoch(), None);
    }
}
