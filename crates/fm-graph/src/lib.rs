//! fm-graph: executable dependency graph for flight-vehicle math models.
//!
//! A model is a set of named variables (signals), each produced by exactly one
//! operator block and consumed by any number of block ports. Gridded function
//! data is split into two stages: a breakpoint normalizer per axis, then a
//! multilinear table lookup.
//!
//! # Lifecycle
//!
//! 1. Declare signals, breakpoint sets, tables and blocks on a
//!    [`ModelBuilder`]; ports may name variables declared later.
//! 2. [`ModelBuilder::wire_blocks`] resolves every name into a [`Model`].
//! 3. [`Model::hook_up_io`] splices limiters and adds the synthetic input,
//!    constant and output blocks ([`ModelBuilder::build`] does 2 and 3).
//! 4. [`Model::initialize`] computes the execution order or reports an
//!    algebraic loop.
//! 5. [`Model::cycle`] evaluates the model for the current inputs.
//!
//! # Example
//!
//! ```
//! use fm_graph::{BlockKind, ModelBuilder, Signal};
//!
//! let mut builder = ModelBuilder::new("demo");
//! builder.add_signal(Signal::new("X", "x", "m").as_input()).unwrap();
//! builder.add_signal(Signal::new("Y", "y", "m").as_output()).unwrap();
//! let neg = builder.add_block("neg", BlockKind::Minus).unwrap();
//! builder.add_var_id(neg, 0, "X").unwrap();
//! builder.set_output_var_id(neg, "Y").unwrap();
//!
//! let mut model = builder.build().unwrap();
//! model.initialize().unwrap();
//! model.set_input_value("X", 2.0).unwrap();
//! model.cycle().unwrap();
//! assert_eq!(model.value_of("Y"), Some(-2.0));
//! ```

pub mod block;
pub mod breakpoint;
pub mod builder;
pub mod error;
pub mod model;
pub(crate) mod schedule;
pub mod signal;
pub mod table;
pub mod validate;
pub mod vector;
pub(crate) mod wiring;

// Re-exports for ergonomics
pub use block::{
    Arity, Block, BlockKind, Extremum, LogicOp, Relation, SWITCH_THRESHOLD, TrigFn, UnaryFn,
};
pub use breakpoint::BreakpointSet;
pub use builder::ModelBuilder;
pub use error::{ModelError, ModelResult};
pub use fm_core::{BlockId, BreakpointId, Epoch, SignalId, TableId};
pub use model::Model;
pub use signal::{Endpoint, Signal, SignalFlags};
pub use table::FuncTable;
pub use validate::IntegrityIssue;
pub use vector::VectorInfo;
pub use wiring::UNLIMITED_SUFFIX;
