//! Operator blocks.
//!
//! Every block consumes zero or more signals and produces at most one. The
//! variant set is closed: evaluation is a single `match` over [`BlockKind`].
//! - **Sources**: `Input`, `Constant`
//! - **Sinks**: `Output`
//! - **Operators**: everything else, including the two table stages
//!   (`Normalizer` feeding `TableLookup`)

use core::fmt;

use fm_core::{BlockId, BreakpointId, Epoch, SignalId, TableId, from_bool, truthy};
use serde::Serialize;
use tracing::warn;

use crate::breakpoint::BreakpointSet;
use crate::error::{ModelError, ModelResult};
use crate::table::FuncTable;

/// Threshold above which a switch condition counts as true.
pub const SWITCH_THRESHOLD: f64 = 1e-4;

/// Single-argument math functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryFn {
    Abs,
    Floor,
    Ceiling,
    Exp,
    Ln,
    Log10,
    Sqrt,
}

impl UnaryFn {
    fn apply(self, x: f64) -> f64 {
        match self {
            UnaryFn::Abs => x.abs(),
            UnaryFn::Floor => x.floor(),
            UnaryFn::Ceiling => x.ceil(),
            UnaryFn::Exp => x.exp(),
            UnaryFn::Ln => x.ln(),
            UnaryFn::Log10 => x.log10(),
            UnaryFn::Sqrt => x.sqrt(),
        }
    }
}

/// Trigonometric functions (radians).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrigFn {
    Sin,
    Cos,
    Tan,
    Arcsin,
    Arccos,
    Arctan,
}

impl TrigFn {
    fn apply(self, x: f64) -> f64 {
        match self {
            TrigFn::Sin => x.sin(),
            TrigFn::Cos => x.cos(),
            TrigFn::Tan => x.tan(),
            TrigFn::Arcsin => x.asin(),
            TrigFn::Arccos => x.acos(),
            TrigFn::Arctan => x.atan(),
        }
    }
}

/// Selection made by an n-ary min/max block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Extremum {
    /// Smallest input.
    Min,
    /// Largest input.
    Max,
}

/// Binary comparisons; the result is 1.0 or 0.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Lt,
    Leq,
    Eq,
    Geq,
    Gt,
    Neq,
}

impl Relation {
    fn holds(self, a: f64, b: f64) -> bool {
        match self {
            Relation::Lt => a < b,
            Relation::Leq => a <= b,
            Relation::Eq => a == b,
            Relation::Geq => a >= b,
            Relation::Gt => a > b,
            Relation::Neq => a != b,
        }
    }
}

/// Logical operators; any nonzero input is true, the result is 1.0 or 0.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicOp {
    /// True if every input is true (one or more inputs).
    And,
    /// True if any input is true (one or more inputs).
    Or,
    /// Negation of a single input.
    Not,
}

/// Number of inputs an operator accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many inputs.
    Exactly(usize),
    /// This many inputs or more.
    AtLeast(usize),
    /// Inclusive range of input counts.
    Between(usize, usize),
}

impl Arity {
    pub fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Exactly(k) => n == k,
            Arity::AtLeast(k) => n >= k,
            Arity::Between(lo, hi) => (lo..=hi).contains(&n),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(k) => write!(f, "exactly {k}"),
            Arity::AtLeast(k) => write!(f, "at least {k}"),
            Arity::Between(lo, hi) => write!(f, "{lo} to {hi}"),
        }
    }
}

/// Block type and parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    /// Externally driven value.
    Input,
    /// Model output tap; copies its single input.
    Output,
    /// Fixed value with no inputs; always ready.
    Constant {
        /// Value presented every cycle.
        value: f64,
    },
    /// Clamp to `[lower, upper]`; infinite bounds are inactive.
    Limiter {
        /// Lower bound, `-inf` when unbounded below.
        lower: f64,
        /// Upper bound, `+inf` when unbounded above.
        upper: f64,
    },
    /// Single-input math function.
    Unary(UnaryFn),
    /// Single-input trigonometric function.
    Trig(TrigFn),
    /// Negation with one input, difference with two.
    Minus,
    /// `input[0] ^ input[1]`
    Power,
    /// `atan2(input[0], input[1])`
    Atan2,
    /// `input[0] / input[1]`, IEEE semantics for zero divisors.
    Quotient,
    /// Sum of one or more inputs, folded left to right.
    Sum,
    /// Product of one or more inputs, folded left to right.
    Product,
    /// Smallest or largest of one or more inputs.
    MinMax(Extremum),
    /// Two-input comparison.
    Relation(Relation),
    /// Logical combination of inputs.
    Logic(LogicOp),
    /// `input[0]` if `|input[1]| > SWITCH_THRESHOLD`, else `input[2]`.
    Switch,
    /// Breakpoint normalization: input scalar to index-and-weight.
    Normalizer {
        /// Breakpoint set the input is located in.
        breakpoints: BreakpointId,
    },
    /// Multilinear table lookup, one index-and-weight input per axis.
    TableLookup {
        /// Table interpolated over.
        table: TableId,
    },
}

impl BlockKind {
    /// Limiter with bounds put in ascending order.
    pub fn limiter(lower: f64, upper: f64) -> Self {
        if lower > upper {
            warn!(lower, upper, "limiter bounds reversed; swapping");
            BlockKind::Limiter {
                lower: upper,
                upper: lower,
            }
        } else {
            BlockKind::Limiter { lower, upper }
        }
    }

    /// Short mnemonic used by code generators and diagnostics.
    pub fn tag(&self) -> &'static str {
        match self {
            BlockKind::Input => "input",
            BlockKind::Output => "output",
            BlockKind::Constant { .. } => "constant",
            BlockKind::Limiter { .. } => "limiter",
            BlockKind::Unary(f) => match f {
                UnaryFn::Abs => "abs",
                UnaryFn::Floor => "floor",
                UnaryFn::Ceiling => "ceiling",
                UnaryFn::Exp => "exp",
                UnaryFn::Ln => "ln",
                UnaryFn::Log10 => "log10",
                UnaryFn::Sqrt => "sqrt",
            },
            BlockKind::Trig(f) => match f {
                TrigFn::Sin => "sin",
                TrigFn::Cos => "cos",
                TrigFn::Tan => "tan",
                TrigFn::Arcsin => "arcsin",
                TrigFn::Arccos => "arccos",
                TrigFn::Arctan => "arctan",
            },
            BlockKind::Minus => "minus",
            BlockKind::Power => "power",
            BlockKind::Atan2 => "atan2",
            BlockKind::Quotient => "quotient",
            BlockKind::Sum => "sum",
            BlockKind::Product => "product",
            BlockKind::MinMax(Extremum::Min) => "min",
            BlockKind::MinMax(Extremum::Max) => "max",
            BlockKind::Relation(r) => match r {
                Relation::Lt => "lt",
                Relation::Leq => "leq",
                Relation::Eq => "eq",
                Relation::Geq => "geq",
                Relation::Gt => "gt",
                Relation::Neq => "neq",
            },
            BlockKind::Logic(LogicOp::And) => "and",
            BlockKind::Logic(LogicOp::Or) => "or",
            BlockKind::Logic(LogicOp::Not) => "not",
            BlockKind::Switch => "switch",
            BlockKind::Normalizer { .. } => "breakpoints",
            BlockKind::TableLookup { .. } => "table",
        }
    }

    /// Required input count. Table lookups need one input per table axis.
    pub fn arity(&self, tables: &[FuncTable]) -> Arity {
        match self {
            BlockKind::Input | BlockKind::Constant { .. } => Arity::Exactly(0),
            BlockKind::Output
            | BlockKind::Limiter { .. }
            | BlockKind::Unary(_)
            | BlockKind::Trig(_)
            | BlockKind::Logic(LogicOp::Not)
            | BlockKind::Normalizer { .. } => Arity::Exactly(1),
            BlockKind::Minus => Arity::Between(1, 2),
            BlockKind::Power
            | BlockKind::Atan2
            | BlockKind::Quotient
            | BlockKind::Relation(_) => Arity::Exactly(2),
            BlockKind::Sum
            | BlockKind::Product
            | BlockKind::MinMax(_)
            | BlockKind::Logic(_) => Arity::AtLeast(1),
            BlockKind::Switch => Arity::Exactly(3),
            BlockKind::TableLookup { table } => {
                Arity::Exactly(tables.get(table.index()).map_or(0, FuncTable::rank))
            }
        }
    }

    /// True for blocks with no inputs, which are ready as soon as a cycle starts.
    pub fn is_source(&self) -> bool {
        matches!(self, BlockKind::Input | BlockKind::Constant { .. })
    }

    /// True if the block produces an output signal.
    pub fn has_output(&self) -> bool {
        !matches!(self, BlockKind::Output)
    }

    /// Compute the block's value from its input values.
    ///
    /// `current` is the block's present value, which `Input` blocks keep.
    /// Arity has already been checked by the caller.
    pub(crate) fn evaluate(
        &self,
        inputs: &[f64],
        current: f64,
        breakpoints: &[BreakpointSet],
        tables: &[FuncTable],
    ) -> ModelResult<f64> {
        let value = match self {
            BlockKind::Input => current,
            BlockKind::Constant { value } => *value,
            BlockKind::Output => inputs[0],
            BlockKind::Limiter { lower, upper } => {
                let x = inputs[0];
                if x < *lower {
                    *lower
                } else if x > *upper {
                    *upper
                } else {
                    x
                }
            }
            BlockKind::Unary(f) => f.apply(inputs[0]),
            BlockKind::Trig(f) => f.apply(inputs[0]),
            BlockKind::Minus => match inputs {
                [x] => -x,
                [a, b, ..] => a - b,
                [] => {
                    return Err(ModelError::Invariant {
                        what: "minus evaluated without inputs".into(),
                    });
                }
            },
            BlockKind::Power => inputs[0].powf(inputs[1]),
            BlockKind::Atan2 => inputs[0].atan2(inputs[1]),
            BlockKind::Quotient => inputs[0] / inputs[1],
            BlockKind::Sum => inputs.iter().skip(1).fold(inputs[0], |acc, x| acc + x),
            BlockKind::Product => inputs.iter().skip(1).fold(inputs[0], |acc, x| acc * x),
            BlockKind::MinMax(Extremum::Min) => {
                inputs.iter().skip(1).fold(inputs[0], |acc, &x| if x < acc { x } else { acc })
            }
            BlockKind::MinMax(Extremum::Max) => {
                inputs.iter().skip(1).fold(inputs[0], |acc, &x| if x > acc { x } else { acc })
            }
            BlockKind::Relation(r) => from_bool(r.holds(inputs[0], inputs[1])),
            BlockKind::Logic(LogicOp::And) => from_bool(inputs.iter().all(|&x| truthy(x))),
            BlockKind::Logic(LogicOp::Or) => from_bool(inputs.iter().any(|&x| truthy(x))),
            BlockKind::Logic(LogicOp::Not) => from_bool(!truthy(inputs[0])),
            BlockKind::Switch => {
                if inputs[1].abs() > SWITCH_THRESHOLD {
                    inputs[0]
                } else {
                    inputs[2]
                }
            }
            BlockKind::Normalizer { breakpoints: bp } => {
                let set = breakpoints.get(bp.index()).ok_or_else(|| {
                    ModelError::MissingBreakpointSet {
                        id: bp.to_string(),
                    }
                })?;
                set.normalize(inputs[0])?
            }
            BlockKind::TableLookup { table } => {
                let t = tables
                    .get(table.index())
                    .ok_or_else(|| ModelError::MissingFuncTable {
                        id: table.to_string(),
                    })?;
                t.interpolate(inputs)?
            }
        };
        Ok(value)
    }
}

/// A processing element in the model graph.
///
/// Inputs are bound signals, one per port in port order. `result_epoch`
/// records the cycle at which `value` was last computed.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub(crate) name: String,
    pub(crate) kind: BlockKind,
    pub(crate) inputs: Vec<SignalId>,
    pub(crate) output: Option<SignalId>,
    pub(crate) value: f64,
    pub(crate) result_epoch: Option<Epoch>,
}

impl Block {
    pub(crate) fn new(name: String, kind: BlockKind) -> Self {
        let value = match kind {
            BlockKind::Constant { value } => value,
            _ => 0.0,
        };
        Self {
            name,
            kind,
            inputs: Vec::new(),
            output: None,
            value,
            result_epoch: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &BlockKind {
        &self.kind
    }

    /// Bound input signals in port order.
    pub fn inputs(&self) -> &[SignalId] {
        &self.inputs
    }

    pub fn output(&self) -> Option<SignalId> {
        self.output
    }

    /// Last computed value (stale unless [`is_current`](Self::is_current)).
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn result_epoch(&self) -> Option<Epoch> {
        self.result_epoch
    }

    /// Whether `value` was computed during `epoch`.
    pub fn is_current(&self, epoch: Epoch) -> bool {
        self.result_epoch == Some(epoch)
    }

    /// Bind `signal` to input `port`, growing the port list if needed.
    pub(crate) fn bind_input(&mut self, port: usize, signal: SignalId) -> ModelResult<()> {
        if port < self.inputs.len() {
            self.inputs[port] = signal;
            Ok(())
        } else if port == self.inputs.len() {
            self.inputs.push(signal);
            Ok(())
        } else {
            Err(ModelError::UnboundPort {
                block: self.name.clone(),
                port: self.inputs.len(),
            })
        }
    }
}

/// Handle plus name, for diagnostics.
pub(crate) fn describe(blocks: &[Block], id: BlockId) -> String {
    blocks
        .get(id.index())
        .map_or_else(|| id.to_string(), |b| b.name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(kind: BlockKind, inputs: &[f64]) -> f64 {
        kind.evaluate(inputs, 0.0, &[], &[]).unwrap()
    }

    #[test]
    fn arithmetic() {
        assert_eq!(eval(BlockKind::Sum, &[1.0, 2.0, 3.5]), 6.5);
        assert_eq!(eval(BlockKind::Product, &[2.0, 3.0, 4.0]), 24.0);
        assert_eq!(eval(BlockKind::Minus, &[4.0]), -4.0);
        assert_eq!(eval(BlockKind::Minus, &[4.0, 1.5]), 2.5);
        assert_eq!(eval(BlockKind::Power, &[2.0, 10.0]), 1024.0);
        assert_eq!(eval(BlockKind::Quotient, &[9.0, 2.0]), 4.5);
        assert_eq!(eval(BlockKind::Unary(UnaryFn::Abs), &[-3.0]), 3.0);
        assert_eq!(eval(BlockKind::Unary(UnaryFn::Ceiling), &[1.2]), 2.0);
    }

    #[test]
    fn quotient_by_zero_follows_ieee() {
        assert_eq!(eval(BlockKind::Quotient, &[1.0, 0.0]), f64::INFINITY);
        assert_eq!(eval(BlockKind::Quotient, &[-1.0, 0.0]), f64::NEG_INFINITY);
        assert!(eval(BlockKind::Quotient, &[0.0, 0.0]).is_nan());
    }

    #[test]
    fn min_max() {
        assert_eq!(eval(BlockKind::MinMax(Extremum::Min), &[3.0, -1.0, 2.0]), -1.0);
        assert_eq!(eval(BlockKind::MinMax(Extremum::Max), &[3.0, -1.0, 7.0]), 7.0);
        assert_eq!(eval(BlockKind::MinMax(Extremum::Max), &[3.0]), 3.0);
    }

    #[test]
    fn relations_and_logic() {
        assert_eq!(eval(BlockKind::Relation(Relation::Lt), &[1.0, 2.0]), 1.0);
        assert_eq!(eval(BlockKind::Relation(Relation::Geq), &[1.0, 2.0]), 0.0);
        assert_eq!(eval(BlockKind::Relation(Relation::Neq), &[1.0, 2.0]), 1.0);
        assert_eq!(eval(BlockKind::Logic(LogicOp::And), &[1.0, -2.0]), 1.0);
        assert_eq!(eval(BlockKind::Logic(LogicOp::And), &[1.0, 0.0]), 0.0);
        assert_eq!(eval(BlockKind::Logic(LogicOp::Or), &[0.0, 0.5]), 1.0);
        assert_eq!(eval(BlockKind::Logic(LogicOp::Not), &[0.0]), 1.0);
    }

    #[test]
    fn switch_uses_fixed_threshold() {
        assert_eq!(eval(BlockKind::Switch, &[10.0, 1.0, 20.0]), 10.0);
        assert_eq!(eval(BlockKind::Switch, &[10.0, -0.5, 20.0]), 10.0);
        assert_eq!(eval(BlockKind::Switch, &[10.0, 1e-4, 20.0]), 20.0);
        assert_eq!(eval(BlockKind::Switch, &[10.0, 0.0, 20.0]), 20.0);
    }

    #[test]
    fn limiter_clamps_and_orders_bounds() {
        let lim = BlockKind::limiter(5.0, -5.0);
        assert_eq!(
            lim,
            BlockKind::Limiter {
                lower: -5.0,
                upper: 5.0
            }
        );
        assert_eq!(eval(lim.clone(), &[9.0]), 5.0);
        assert_eq!(eval(lim.clone(), &[-9.0]), -5.0);
        assert_eq!(eval(lim, &[1.0]), 1.0);
        let upper_only = BlockKind::limiter(f64::NEG_INFINITY, 2.0);
        assert_eq!(eval(upper_only, &[-1e9]), -1e9);
    }

    #[test]
    fn arity_rules() {
        assert!(BlockKind::Relation(Relation::Eq).arity(&[]).accepts(2));
        assert!(!BlockKind::Relation(Relation::Eq).arity(&[]).accepts(3));
        assert!(!BlockKind::Logic(LogicOp::Not).arity(&[]).accepts(2));
        assert!(BlockKind::Sum.arity(&[]).accepts(5));
        assert!(!BlockKind::Sum.arity(&[]).accepts(0));
        assert!(BlockKind::Minus.arity(&[]).accepts(1));
        assert!(!BlockKind::Minus.arity(&[]).accepts(3));
        assert_eq!(BlockKind::Switch.arity(&[]).to_string(), "exactly 3");
    }

    #[test]
    fn input_keeps_current_value() {
        let v = BlockKind::Input.evaluate(&[], 42.0, &[], &[]).unwrap();
        assert_eq!(v, 42.0);
    }
}
