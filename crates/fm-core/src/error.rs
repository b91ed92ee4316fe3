use thiserror::Error;

pub type FmResult<T> = Result<T, FmError>;

/// Failures of the scalar helpers shared by every crate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FmError {
    #[error("{what} must be finite, got {value}")]
    NonFinite { what: &'static str, value: f64 },
}
