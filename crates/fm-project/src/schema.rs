//! Model document schema definitions.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelDoc {
    pub version: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub variables: Vec<VariableDef>,
    #[serde(default)]
    pub breakpoints: Vec<BreakpointDef>,
    #[serde(default)]
    pub tables: Vec<TableDef>,
    #[serde(default)]
    pub functions: Vec<FunctionDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariableDef {
    pub var_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub units: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default)]
    pub input: bool,
    #[serde(default)]
    pub output: bool,
    #[serde(default)]
    pub control: bool,
    #[serde(default)]
    pub disturbance: bool,
    #[serde(default)]
    pub state: bool,
    #[serde(default)]
    pub state_deriv: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculation: Option<Expr>,
}

impl VariableDef {
    /// Display name, defaulting to the variable ID.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.var_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BreakpointDef {
    pub id: String,
    #[serde(default)]
    pub units: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableDef {
    pub id: String,
    /// Breakpoint set IDs, outermost axis first.
    pub axes: Vec<String>,
    /// Row-major values, last axis varying fastest.
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    /// Independent variables, one per table axis, in axis order.
    pub inputs: Vec<String>,
    pub output: String,
    pub table: TableRef,
}

/// A function's table: a shared table by ID, or one private to the function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TableRef {
    Id(String),
    Inline { axes: Vec<String>, values: Vec<f64> },
}

/// Scalar expression tree.
///
/// YAML forms: `2.5`, `ALPHA`, `{const: 2.5}`, `{var: ALPHA}`,
/// `{apply: plus, args: [...]}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Expr {
    Number(f64),
    Name(String),
    Const {
        #[serde(rename = "const")]
        value: f64,
    },
    Var {
        var: String,
    },
    Apply {
        apply: Operator,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Plus,
    Minus,
    Times,
    Divide,
    Quotient,
    Power,
    Abs,
    Floor,
    Ceiling,
    Exp,
    Ln,
    Log10,
    Sqrt,
    Sin,
    Cos,
    Tan,
    Arcsin,
    Arccos,
    Arctan,
    Atan2,
    Min,
    Max,
    Lt,
    Leq,
    Eq,
    Geq,
    Gt,
    Neq,
    And,
    Or,
    Not,
    /// `args: [value_if_true, condition, otherwise]`
    Piecewise,
}
