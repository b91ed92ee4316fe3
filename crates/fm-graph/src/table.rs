//! Gridded function tables and multilinear interpolation.

use fm_core::{BlockId, BreakpointId};

use crate::error::{ModelError, ModelResult};

/// An immutable N-dimensional array of function values.
///
/// Values are flattened in row-major order with the last axis contiguous.
/// Axis `j` has `dims[j]` points, taken from the breakpoint set `axes[j]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncTable {
    id: String,
    axes: Vec<BreakpointId>,
    axis_ids: Vec<String>,
    dims: Vec<usize>,
    strides: Vec<usize>,
    values: Vec<f64>,
    pub(crate) users: Vec<BlockId>,
}

impl FuncTable {
    /// Create a table over already-resolved axes.
    ///
    /// `axes` pairs each breakpoint set's handle and ID with its length.
    pub(crate) fn new(
        id: String,
        axes: Vec<(BreakpointId, String, usize)>,
        values: Vec<f64>,
    ) -> ModelResult<Self> {
        if axes.is_empty() {
            return Err(ModelError::TableShape {
                id,
                expected: 1,
                actual: 0,
            });
        }
        let dims: Vec<usize> = axes.iter().map(|(_, _, n)| *n).collect();
        let expected: usize = dims.iter().product();
        if values.len() != expected {
            return Err(ModelError::TableShape {
                id,
                expected,
                actual: values.len(),
            });
        }

        let mut strides = vec![1; dims.len()];
        for j in (0..dims.len().saturating_sub(1)).rev() {
            strides[j] = strides[j + 1] * dims[j + 1];
        }

        let (axes, axis_ids) = axes.into_iter().map(|(bp, name, _)| (bp, name)).unzip();
        Ok(Self {
            id,
            axes,
            axis_ids,
            dims,
            strides,
            values,
            users: Vec::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Breakpoint set handles, one per axis, in declared order.
    pub fn axes(&self) -> &[BreakpointId] {
        &self.axes
    }

    /// Breakpoint set IDs, one per axis, in declared order.
    pub fn axis_ids(&self) -> &[String] {
        &self.axis_ids
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Number of axes.
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Flattened values, last axis varying fastest.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Lookup blocks reading this table.
    pub fn users(&self) -> &[BlockId] {
        &self.users
    }

    /// Flat-array position of a multi-index.
    pub fn offset(&self, indices: &[usize]) -> usize {
        indices
            .iter()
            .zip(&self.strides)
            .map(|(i, stride)| i * stride)
            .sum()
    }

    /// Interpolate from one index-and-weight value per axis.
    ///
    /// Indices at or past the top edge of an axis are clamped and take the
    /// edge value. Blending is `a + (b - a) * w`, axis 0 outermost.
    pub fn interpolate(&self, index_weights: &[f64]) -> ModelResult<f64> {
        if index_weights.len() != self.rank() {
            return Err(ModelError::Invariant {
                what: format!(
                    "table '{}' has {} axes, got {} coordinates",
                    self.id,
                    self.rank(),
                    index_weights.len()
                ),
            });
        }
        let mut indices: Vec<usize> = index_weights
            .iter()
            .zip(&self.dims)
            .map(|(&iw, &dim)| {
                let whole = if iw > 0.0 { iw.floor() as usize } else { 0 };
                whole.min(dim - 1)
            })
            .collect();
        Ok(self.blend(index_weights, &mut indices, self.rank()))
    }

    fn blend(&self, index_weights: &[f64], indices: &mut [usize], depth: usize) -> f64 {
        let axis = self.rank() - depth;
        let dim = self.dims[axis];

        if dim < 2 {
            // Degenerate axis: nothing to blend along.
            return if depth == 1 {
                self.values[self.offset(indices)]
            } else {
                self.blend(index_weights, indices, depth - 1)
            };
        }

        // the clamp is local to this level; sibling corners see the raw index
        let raw = indices[axis];
        let weight = if raw >= dim - 1 {
            indices[axis] = dim - 2;
            1.0
        } else {
            frac_part(index_weights[axis])
        };

        let (a, b) = if depth == 1 {
            let at = self.offset(indices);
            (self.values[at], self.values[at + 1])
        } else {
            let a = self.blend(index_weights, indices, depth - 1);
            indices[axis] += 1;
            let b = self.blend(index_weights, indices, depth - 1);
            (a, b)
        };
        indices[axis] = raw;

        a + (b - a) * weight
    }
}

fn frac_part(x: f64) -> f64 {
    if x > 0.0 { x - x.floor() } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(dims: &[usize], values: Vec<f64>) -> FuncTable {
        let axes = dims
            .iter()
            .enumerate()
            .map(|(j, &n)| (BreakpointId::from_index(j), format!("BP{j}"), n))
            .collect();
        FuncTable::new("T".into(), axes, values).unwrap()
    }

    #[test]
    fn offset_is_row_major_last_axis_fastest() {
        let t = table(&[2, 3, 4], vec![0.0; 24]);
        assert_eq!(t.offset(&[0, 0, 1]), 1);
        assert_eq!(t.offset(&[0, 1, 0]), 4);
        assert_eq!(t.offset(&[1, 0, 0]), 12);
        assert_eq!(t.offset(&[1, 2, 3]), 23);
    }

    #[test]
    fn one_dimensional_is_linear() {
        let t = table(&[3], vec![10.0, 20.0, 40.0]);
        assert_eq!(t.interpolate(&[0.5]).unwrap(), 15.0);
        assert_eq!(t.interpolate(&[1.25]).unwrap(), 25.0);
        assert_eq!(t.interpolate(&[0.0]).unwrap(), 10.0);
    }

    #[test]
    fn bilinear_center() {
        // f(0,0)=0 f(0,1)=1 f(1,0)=1 f(1,1)=2
        let t = table(&[2, 2], vec![0.0, 1.0, 1.0, 2.0]);
        assert_eq!(t.interpolate(&[0.5, 0.5]).unwrap(), 1.0);
        assert_eq!(t.interpolate(&[0.0, 0.25]).unwrap(), 0.25);
    }

    #[test]
    fn top_edge_clamps_without_extrapolation() {
        let t = table(&[2, 2], vec![0.0, 1.0, 1.0, 2.0]);
        assert_eq!(t.interpolate(&[1.0, 1.0]).unwrap(), 2.0);
        assert_eq!(t.interpolate(&[1.0, 0.5]).unwrap(), 1.5);
        // out-of-range coordinates behave like the edge
        assert_eq!(t.interpolate(&[7.0, 0.0]).unwrap(), 1.0);
    }

    #[test]
    fn inner_edge_holds_for_every_outer_corner() {
        let t = table(&[2, 3], vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
        assert_eq!(t.interpolate(&[0.5, 2.0]).unwrap(), 7.0);
        assert_eq!(t.interpolate(&[1.0, 2.0]).unwrap(), 12.0);
        let t = table(&[3, 2], vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(t.interpolate(&[1.5, 1.0]).unwrap(), 4.0);
    }

    #[test]
    fn trilinear_corner_and_center() {
        let values: Vec<f64> = (0..8).map(f64::from).collect();
        let t = table(&[2, 2, 2], values);
        assert_eq!(t.interpolate(&[1.0, 0.0, 1.0]).unwrap(), 5.0);
        assert_eq!(t.interpolate(&[0.5, 0.5, 0.5]).unwrap(), 3.5);
    }

    #[test]
    fn degenerate_axis_passes_through() {
        let t = table(&[1, 3], vec![1.0, 2.0, 4.0]);
        assert_eq!(t.interpolate(&[0.0, 1.5]).unwrap(), 3.0);
    }

    #[test]
    fn blend_order_is_subtract_then_scale() {
        let (a, b, w) = (0.1_f64, 0.7_f64, 0.3_f64);
        let t = table(&[2], vec![a, b]);
        let got = t.interpolate(&[w]).unwrap();
        assert_eq!(got.to_bits(), (a + (b - a) * w).to_bits());
    }

    #[test]
    fn shape_is_checked() {
        let axes = vec![(BreakpointId::from_index(0), "A".to_string(), 3)];
        let err = FuncTable::new("T".into(), axes, vec![1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            ModelError::TableShape {
                expected: 3,
                actual: 2,
                ..
            }
        ));
    }
}
