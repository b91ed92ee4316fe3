//! Structural checks on a finalized model.

use core::fmt;

use tracing::warn;

use crate::block::Arity;
use crate::model::Model;

/// One structural problem found by [`Model::integrity_issues`].
#[derive(Debug, Clone, PartialEq)]
pub enum IntegrityIssue {
    /// Nothing produces the signal.
    NoSource { var_id: String },
    /// Nothing consumes the signal and it is not a model output.
    NoSink { var_id: String },
    /// The signal names a producer that does not name it back.
    SourceMismatch { var_id: String, block: String },
    /// The signal lists a consumer port that is bound to something else.
    SinkMismatch {
        var_id: String,
        block: String,
        port: usize,
    },
    /// A block's port is bound to a signal that does not list it as a consumer.
    UnlistedSink { block: String, port: usize },
    /// A block has the wrong number of inputs for its operator.
    Arity {
        block: String,
        expected: Arity,
        actual: usize,
    },
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityIssue::NoSource { var_id } => write!(f, "signal '{var_id}' has no producer"),
            IntegrityIssue::NoSink { var_id } => {
                write!(f, "signal '{var_id}' has no consumer and is not an output")
            }
            IntegrityIssue::SourceMismatch { var_id, block } => write!(
                f,
                "signal '{var_id}' names producer '{block}', which does not output it"
            ),
            IntegrityIssue::SinkMismatch { var_id, block, port } => write!(
                f,
                "signal '{var_id}' lists '{block}' port {port}, which is bound elsewhere"
            ),
            IntegrityIssue::UnlistedSink { block, port } => write!(
                f,
                "block '{block}' port {port} is not listed by its signal"
            ),
            IntegrityIssue::Arity {
                block,
                expected,
                actual,
            } => write!(f, "block '{block}' expects {expected} inputs, has {actual}"),
        }
    }
}

impl Model {
    /// Every structural problem in the graph.
    pub fn integrity_issues(&self) -> Vec<IntegrityIssue> {
        let mut issues = Vec::new();

        for (index, signal) in self.signals.iter().enumerate() {
            let var_id = &signal.var_id;
            match signal.source {
                None => issues.push(IntegrityIssue::NoSource {
                    var_id: var_id.clone(),
                }),
                Some(src) => {
                    let agrees = self
                        .blocks
                        .get(src.block.index())
                        .and_then(|b| b.output)
                        .is_some_and(|out| out.index() == index);
                    if !agrees {
                        issues.push(IntegrityIssue::SourceMismatch {
                            var_id: var_id.clone(),
                            block: crate::block::describe(&self.blocks, src.block),
                        });
                    }
                }
            }

            if signal.sinks.is_empty() && !signal.flags.output {
                issues.push(IntegrityIssue::NoSink {
                    var_id: var_id.clone(),
                });
            }

            for sink in &signal.sinks {
                let bound = self
                    .blocks
                    .get(sink.block.index())
                    .and_then(|b| b.inputs.get(sink.port))
                    .is_some_and(|s| s.index() == index);
                if !bound {
                    issues.push(IntegrityIssue::SinkMismatch {
                        var_id: var_id.clone(),
                        block: crate::block::describe(&self.blocks, sink.block),
                        port: sink.port,
                    });
                }
            }
        }

        for (index, block) in self.blocks.iter().enumerate() {
            for (port, signal) in block.inputs.iter().enumerate() {
                let listed = self.signals.get(signal.index()).is_some_and(|s| {
                    s.sinks
                        .iter()
                        .any(|e| e.block.index() == index && e.port == port)
                });
                if !listed {
                    issues.push(IntegrityIssue::UnlistedSink {
                        block: block.name.clone(),
                        port,
                    });
                }
            }

            let expected = block.kind.arity(&self.tables);
            if !expected.accepts(block.inputs.len()) {
                issues.push(IntegrityIssue::Arity {
                    block: block.name.clone(),
                    expected,
                    actual: block.inputs.len(),
                });
            }
        }

        issues
    }

    /// Check the graph, logging each problem. True if there are none.
    pub fn verify_integrity(&self) -> bool {
        let issues = self.integrity_issues();
        for issue in &issues {
            warn!(model = %self.name, "{issue}");
        }
        issues.is_empty()
    }
}
