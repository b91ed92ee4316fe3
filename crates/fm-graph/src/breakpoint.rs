//! Breakpoint sets and the index-and-weight normalization built on them.

use fm_core::{BlockId, ensure_finite};

use crate::error::{ModelError, ModelResult};

/// Ordered grid coordinates along one interpolation axis.
///
/// Values are immutable once registered. Any number of normalizer blocks
/// may share one set; their IDs are recorded in `users`.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakpointSet {
    id: String,
    values: Vec<f64>,
    pub(crate) users: Vec<BlockId>,
}

impl BreakpointSet {
    /// Validate and create a breakpoint set.
    ///
    /// Values must be finite and non-decreasing. Repeated values are allowed:
    /// the scan in [`normalize`](Self::normalize) never divides by a
    /// zero-width interval.
    pub fn new(id: impl Into<String>, values: Vec<f64>) -> ModelResult<Self> {
        let id = id.into();
        if values.is_empty() {
            return Err(ModelError::EmptyBreakpointSet { id });
        }
        for &v in &values {
            ensure_finite(v, "breakpoint")?;
        }
        if let Some(index) = values.windows(2).position(|w| w[1] < w[0]) {
            return Err(ModelError::NonMonotonicBreakpoints {
                id,
                index: index + 1,
            });
        }
        Ok(Self {
            id,
            values,
            users: Vec::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Normalizer blocks reading this set.
    pub fn users(&self) -> &[BlockId] {
        &self.users
    }

    /// Map `x` onto the grid as `index + fraction`.
    ///
    /// Below the first breakpoint returns 0.0; at or above the last returns
    /// `len - 1`. No extrapolation. The scan is linear from the low end.
    pub fn normalize(&self, x: f64) -> ModelResult<f64> {
        let b = &self.values;
        let Some(&first) = b.first() else {
            return Err(ModelError::EmptyBreakpointSet {
                id: self.id.clone(),
            });
        };
        if x < first {
            return Ok(0.0);
        }
        for i in 1..b.len() {
            if b[i] > x {
                return Ok((i - 1) as f64 + (x - b[i - 1]) / (b[i] - b[i - 1]));
            }
        }
        Ok((b.len() - 1) as f64)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn sorted_grid() -> impl Strategy<Value = Vec<f64>> {
        prop::collection::vec(-1.0e3_f64..1.0e3, 1..12).prop_map(|mut v| {
            v.sort_by(|a, b| a.total_cmp(b));
            v
        })
    }

    proptest! {
        #[test]
        fn result_stays_on_grid(values in sorted_grid(), x in -2.0e3_f64..2.0e3) {
            let n = values.len();
            let bp = BreakpointSet::new("P", values).unwrap();
            let iw = bp.normalize(x).unwrap();
            prop_assert!(iw >= 0.0);
            prop_assert!(iw <= (n - 1) as f64);
        }

        #[test]
        fn integer_part_is_monotone(
            values in sorted_grid(),
            a in -2.0e3_f64..2.0e3,
            b in -2.0e3_f64..2.0e3,
        ) {
            let bp = BreakpointSet::new("P", values).unwrap();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let ilo = bp.normalize(lo).unwrap().floor();
            let ihi = bp.normalize(hi).unwrap().floor();
            prop_assert!(ilo <= ihi);
        }

        #[test]
        fn re_evaluation_is_idempotent(values in sorted_grid(), x in -2.0e3_f64..2.0e3) {
            let bp = BreakpointSet::new("P", values).unwrap();
            prop_assert_eq!(bp.normalize(x).unwrap().to_bits(), bp.normalize(x).unwrap().to_bits());
        }
    }
}
