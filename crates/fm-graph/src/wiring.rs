//! Finalizing a wired model: limiter splices and synthetic I/O blocks.

use fm_core::SignalId;
use tracing::debug;

use crate::block::BlockKind;
use crate::error::ModelResult;
use crate::model::Model;
use crate::signal::Signal;

/// Suffix given to a signal's pre-limit half when a limiter is spliced in.
pub const UNLIMITED_SUFFIX: &str = "_unlim";

impl Model {
    /// Insert the blocks that make every signal fully connected.
    ///
    /// In order:
    /// 1. every signal with a finite bound gets a limiter spliced in;
    /// 2. every signal without a producer gets a constant block (when it has
    ///    an initial value and is not an external input) or an input block;
    /// 3. every signal without a consumer, or flagged as output, gets an
    ///    output block.
    ///
    /// Running it again on a finalized model adds nothing. Any cached
    /// execution order is discarded if blocks were added.
    pub fn hook_up_io(&mut self) -> ModelResult<()> {
        self.splice_limiters()?;
        self.feed_sourceless_signals();
        self.drain_sinkless_signals()
    }

    fn splice_limiters(&mut self) -> ModelResult<()> {
        let candidates: Vec<SignalId> = (0..self.signals.len())
            .map(SignalId::from_index)
            .filter(|&id| self.signals[id.index()].needs_limiter())
            .collect();
        for id in candidates {
            self.splice_limiter(id)?;
        }
        Ok(())
    }

    /// Split `id` into `<var>_unlim -> limiter -> <var>`.
    ///
    /// The limited half takes over the variable ID, name, output role and
    /// every consumer of the original; the original keeps its producer (and
    /// its input role) under a suffixed ID. Consumer count is preserved.
    pub(crate) fn splice_limiter(&mut self, id: SignalId) -> ModelResult<()> {
        let original = &mut self.signals[id.index()];
        let var_id = original.var_id.clone();
        let name = original.name.clone();
        let (lower, upper) = (original.lower, original.upper);
        let sinks = std::mem::take(&mut original.sinks);

        let mut limited = Signal::new(var_id.clone(), name.clone(), original.units.clone())
            .with_limits(Some(lower), Some(upper));
        limited.flags = original.flags;
        limited.flags.input = false;
        limited.flags.control = false;
        limited.flags.disturbance = false;
        limited.limited = true;

        original.flags.output = false;
        original.flags.derived = true;
        original.limited = true;

        let unlimited_id = self.fresh_var_id(&format!("{var_id}{UNLIMITED_SUFFIX}"));
        let original = &mut self.signals[id.index()];
        original.var_id = unlimited_id.clone();
        original.name = format!("{name}{UNLIMITED_SUFFIX}");
        self.var_index.insert(unlimited_id, id);

        // the limited signal takes over the variable ID in the index
        let limited_id = self.push_signal(limited);
        let limiter = self.push_block(
            &format!("{var_id}_limiter"),
            BlockKind::limiter(lower, upper),
        );
        self.add_source(limited_id, limiter);
        self.add_sink(id, limiter, 0)?;

        for sink in &sinks {
            self.blocks[sink.block.index()].inputs[sink.port] = limited_id;
        }
        self.signals[limited_id.index()].sinks = sinks;

        debug!(
            var = %var_id,
            lower,
            upper,
            consumers = self.signals[limited_id.index()].sinks.len(),
            "spliced limiter"
        );
        Ok(())
    }

    fn feed_sourceless_signals(&mut self) {
        for index in 0..self.signals.len() {
            let id = SignalId::from_index(index);
            let signal = &self.signals[index];
            if signal.source.is_some() {
                continue;
            }
            let var_id = signal.var_id.clone();
            let (base, kind) = match signal.initial_value {
                Some(value) if !signal.flags.is_external_input() => {
                    (format!("{var_id}_const"), BlockKind::Constant { value })
                }
                _ => (format!("{var_id}_input"), BlockKind::Input),
            };
            let initial = signal.initial_value.unwrap_or(0.0);
            let block = self.push_block(&base, kind);
            self.blocks[block.index()].value = initial;
            self.add_source(id, block);
            debug!(var = %var_id, block = %self.blocks[block.index()].name, "added source");
        }
    }

    fn drain_sinkless_signals(&mut self) -> ModelResult<()> {
        for index in 0..self.signals.len() {
            let id = SignalId::from_index(index);
            let signal = &self.signals[index];
            let tapped = signal
                .sinks
                .iter()
                .any(|s| matches!(self.blocks[s.block.index()].kind, BlockKind::Output));
            if tapped || !(signal.sinks.is_empty() || signal.flags.output) {
                continue;
            }
            let var_id = signal.var_id.clone();
            let block = self.push_block(&format!("{var_id}_output"), BlockKind::Output);
            self.add_sink(id, block, 0)?;
            debug!(var = %var_id, "added output");
        }
        Ok(())
    }
}
