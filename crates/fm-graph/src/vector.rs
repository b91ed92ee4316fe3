//! Ordered input/output records exchanged with callers.

use serde::Serialize;

/// One entry of a model's input or output vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorInfo {
    /// Display name of the signal.
    pub name: String,
    /// Variable ID of the signal.
    pub var_id: String,
    pub units: String,
    pub value: f64,
    /// Lower limit, `-inf` when unbounded.
    pub lower: f64,
    /// Upper limit, `+inf` when unbounded.
    pub upper: f64,
}

impl VectorInfo {
    /// Whether `key` names this entry by display name or variable ID.
    pub fn matches(&self, key: &str) -> bool {
        self.name == key || self.var_id == key
    }
}
