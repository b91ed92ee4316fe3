use crate::{FmError, FmResult};

/// Scalar carried on every signal.
pub type Real = f64;

/// Pass `v` through if finite; NaN and infinities are rejected.
pub fn ensure_finite(v: Real, what: &'static str) -> FmResult<Real> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(FmError::NonFinite { what, value: v })
    }
}

/// Logical truth of a scalar: any nonzero value is true.
pub fn truthy(v: Real) -> bool {
    v != 0.0
}

/// Encode a boolean as 1.0 / 0.0.
pub fn from_bool(b: bool) -> Real {
    if b { 1.0 } else { 0.0 }
}
