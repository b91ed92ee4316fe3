//! Error types for model construction and evaluation.

use fm_core::FmError;
use thiserror::Error;

use crate::block::Arity;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while building, wiring, scheduling or evaluating a model.
///
/// None of these are recoverable: each one means the constructed graph is
/// inconsistent and the model must not be used to produce numbers.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    /// A block input or output names a variable no signal declares.
    #[error("Block '{block}' references undefined variable '{var_id}'")]
    UnresolvedReference { block: String, var_id: String },

    /// A block input port was skipped when ports were bound out of order.
    #[error("Block '{block}' has no binding for input port {port}")]
    UnboundPort { block: String, port: usize },

    /// An operator received a number of inputs it does not accept.
    #[error("Block '{block}' ({tag}) expects {expected} inputs, has {actual}")]
    ArityMismatch {
        block: String,
        tag: &'static str,
        expected: Arity,
        actual: usize,
    },

    /// Scheduling stopped making progress: a cyclic dependency exists.
    #[error("Algebraic loop detected: {stuck} blocks cannot be scheduled ({})", blocks.join(", "))]
    AlgebraicLoop { stuck: usize, blocks: Vec<String> },

    /// A breakpoint set reference could not be resolved.
    #[error("Breakpoint set '{id}' is not registered")]
    MissingBreakpointSet { id: String },

    /// A function table reference could not be resolved.
    #[error("Function table '{id}' is not registered")]
    MissingFuncTable { id: String },

    /// A breakpoint set with no breakpoints.
    #[error("Breakpoint set '{id}' is empty")]
    EmptyBreakpointSet { id: String },

    /// Breakpoints step backwards.
    #[error("Breakpoint set '{id}' decreases at index {index}")]
    NonMonotonicBreakpoints { id: String, index: usize },

    /// A function table's value count does not match its axes.
    #[error("Function table '{id}' has {actual} values, axes require {expected}")]
    TableShape {
        id: String,
        expected: usize,
        actual: usize,
    },

    /// Two signals declared with the same variable ID.
    #[error("Variable '{var_id}' is declared more than once")]
    DuplicateVarId { var_id: String },

    /// A breakpoint set or table ID registered twice.
    #[error("Duplicate {what} ID '{id}'")]
    DuplicateId { what: &'static str, id: String },

    /// Two blocks both claim to produce the same signal.
    #[error("Variable '{var_id}' is produced by both '{first}' and '{second}'")]
    DuplicateSource {
        var_id: String,
        first: String,
        second: String,
    },

    /// Input value addressed to a name that is not a model input.
    #[error("'{name}' is not a model input")]
    UnknownInput { name: String },

    /// Internal consistency violated.
    #[error("Invariant violated: {what}")]
    Invariant { what: String },

    #[error(transparent)]
    Core(#[from] FmError),
}
