//! Materialised (sparse) form of the discretised generator.
//!
//! The full generator is produced by applying the lazy left-multiply kernel
//! to the rows of the identity and storing the result in compressed sparse
//! column form. It exists for the downstream algorithms that genuinely need a
//! matrix (stationary solves, eigenanalysis); time integrators should keep
//! consuming the lazy operator directly.

use super::lazy::LazyGenerator;
use dfq_core::{DfqError, DfqResult};
use sprs::{CsMat, CsMatView, TriMat};
use std::ops::{Add, Mul, Sub};

/// Sparse `M × M` generator matrix in CSC format.
///
/// Unlike the lazy form this is mutable: entries can be overwritten and the
/// matrix replaced by arithmetic results. Callers are responsible for
/// synchronising concurrent writes.
#[derive(Debug, Clone)]
pub struct FullGenerator {
    matrix: CsMat<f64>,
}

impl FullGenerator {
    /// Materialise a lazy generator: `I · B`, row by row.
    pub fn materialise(lazy: &LazyGenerator<'_>) -> DfqResult<Self> {
        let (m, _) = lazy.size();
        let mut tri = TriMat::new((m, m));
        let mut unit = vec![0.0; m];
        let mut row = vec![0.0; m];
        for r in 0..m {
            unit[r] = 1.0;
            row.iter_mut().for_each(|x| *x = 0.0);
            lazy.apply_left_row(&unit, &mut row);
            unit[r] = 0.0;
            for (c, &val) in row.iter().enumerate() {
                if val != 0.0 {
                    tri.add_triplet(r, c, val);
                }
            }
        }
        Ok(FullGenerator {
            matrix: tri.to_csc(),
        })
    }

    /// Wrap an existing sparse matrix (must be square).
    pub fn from_matrix(matrix: CsMat<f64>) -> DfqResult<Self> {
        if matrix.rows() != matrix.cols() {
            return Err(DfqError::ShapeMismatch {
                expected: "square matrix".into(),
                found: format!("{}x{}", matrix.rows(), matrix.cols()),
            });
        }
        Ok(FullGenerator {
            matrix: matrix.to_csc(),
        })
    }

    /// Matrix shape `(M, M)`
    pub fn size(&self) -> (usize, usize) {
        (self.matrix.rows(), self.matrix.cols())
    }

    /// Matrix extent along one axis (0 = rows, 1 = columns)
    pub fn size_along(&self, axis: usize) -> DfqResult<usize> {
        match axis {
            0 => Ok(self.matrix.rows()),
            1 => Ok(self.matrix.cols()),
            _ => Err(DfqError::OutOfRange {
                entity: "axis",
                index: axis,
                limit: 2,
            }),
        }
    }

    /// Element `B[row, col]`; structural zeros read as 0.
    pub fn get(&self, row: usize, col: usize) -> DfqResult<f64> {
        self.check_bounds(row, col)?;
        Ok(self.matrix.get(row, col).copied().unwrap_or(0.0))
    }

    /// Overwrite an existing (structurally non-zero) entry.
    pub fn set(&mut self, row: usize, col: usize, value: f64) -> DfqResult<()> {
        self.check_bounds(row, col)?;
        // CSC storage: scan the column's slice of the compressed arrays
        let pos = {
            let indptr = self.matrix.indptr();
            let start = indptr.index(col);
            let end = indptr.index(col + 1);
            self.matrix.indices()[start..end]
                .iter()
                .position(|&r| r == row)
                .map(|off| start + off)
        };
        match pos {
            Some(idx) => {
                self.matrix.data_mut()[idx] = value;
                Ok(())
            }
            None => Err(DfqError::Domain(format!(
                "entry [{row},{col}] is a structural zero; rebuild the matrix to set it"
            ))),
        }
    }

    fn check_bounds(&self, row: usize, col: usize) -> DfqResult<()> {
        if row >= self.matrix.rows() {
            return Err(DfqError::OutOfRange {
                entity: "row",
                index: row,
                limit: self.matrix.rows(),
            });
        }
        if col >= self.matrix.cols() {
            return Err(DfqError::OutOfRange {
                entity: "col",
                index: col,
                limit: self.matrix.cols(),
            });
        }
        Ok(())
    }

    /// Number of stored entries
    pub fn nnz(&self) -> usize {
        self.matrix.nnz()
    }

    /// Stored density (nnz / M²)
    pub fn density(&self) -> f64 {
        let (r, c) = self.size();
        if r == 0 {
            return 0.0;
        }
        self.nnz() as f64 / (r * c) as f64
    }

    /// Row sums; zero for a conservative generator.
    pub fn row_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.matrix.rows()];
        for (&val, (r, _)) in self.matrix.iter() {
            sums[r] += val;
        }
        sums
    }

    /// Scalar multiple.
    pub fn scale(&self, alpha: f64) -> FullGenerator {
        FullGenerator {
            matrix: self.matrix.map(|&v| v * alpha),
        }
    }

    /// View of the underlying sparse matrix
    pub fn view(&self) -> CsMatView<'_, f64> {
        self.matrix.view()
    }

    /// The underlying sparse matrix
    pub fn matrix(&self) -> &CsMat<f64> {
        &self.matrix
    }

    /// Consume into the underlying sparse matrix
    pub fn into_matrix(self) -> CsMat<f64> {
        self.matrix
    }
}

impl Add for &FullGenerator {
    type Output = FullGenerator;

    fn add(self, rhs: &FullGenerator) -> FullGenerator {
        FullGenerator {
            matrix: (&self.matrix + &rhs.matrix).to_csc(),
        }
    }
}

impl Sub for &FullGenerator {
    type Output = FullGenerator;

    fn sub(self, rhs: &FullGenerator) -> FullGenerator {
        let neg = rhs.matrix.map(|&v| -v);
        FullGenerator {
            matrix: (&self.matrix + &neg).to_csc(),
        }
    }
}

impl Mul for &FullGenerator {
    type Output = FullGenerator;

    fn mul(self, rhs: &FullGenerator) -> FullGenerator {
        FullGenerator {
            matrix: (&self.matrix * &rhs.matrix).to_csc(),
        }
    }
}

impl Mul<f64> for &FullGenerator {
    type Output = FullGenerator;

    fn mul(self, alpha: f64) -> FullGenerator {
        self.scale(alpha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::build_lazy_generator;
    use dfq_core::{DiscretisedFluidQueue, FluidQueueModel, Mesh};

    fn fixture() -> DiscretisedFluidQueue {
        let t = vec![vec![-1.0, 1.0], vec![2.0, -2.0]];
        let model = FluidQueueModel::new(&[1.0, -1.0], t).unwrap();
        let mesh = Mesh::dg(vec![0.0, 1.0, 2.0, 3.0], 1).unwrap();
        DiscretisedFluidQueue::new(model, mesh).unwrap()
    }

    #[test]
    fn test_materialise_matches_lazy_get() {
        let dq = fixture();
        let lazy = build_lazy_generator(&dq).unwrap();
        let full = FullGenerator::materialise(&lazy).unwrap();
        let (m, _) = full.size();
        assert_eq!((m, m), lazy.size());
        for r in 0..m {
            for c in 0..m {
                let lv = lazy.get(r, c).unwrap();
                let fv = full.get(r, c).unwrap();
                assert!(
                    (lv - fv).abs() < 1e-12,
                    "[{r},{c}]: lazy {lv} vs full {fv}"
                );
            }
        }
    }

    #[test]
    fn test_row_sums_vanish() {
        let dq = fixture();
        let lazy = build_lazy_generator(&dq).unwrap();
        let full = FullGenerator::materialise(&lazy).unwrap();
        for (r, s) in full.row_sums().iter().enumerate() {
            assert!(s.abs() < 1e-10, "row {r} sums to {s}");
        }
    }

    #[test]
    fn test_arithmetic_delegates_to_sparse_ops() {
        let dq = fixture();
        let lazy = build_lazy_generator(&dq).unwrap();
        let full = FullGenerator::materialise(&lazy).unwrap();

        let twice = &full + &full;
        let zero = &twice - &(&full * 2.0);
        for (&v, _) in zero.matrix().iter() {
            assert!(v.abs() < 1e-12);
        }

        let sq = &full * &full;
        assert_eq!(sq.size(), full.size());
    }

    #[test]
    fn test_set_existing_entry() {
        let dq = fixture();
        let lazy = build_lazy_generator(&dq).unwrap();
        let mut full = FullGenerator::materialise(&lazy).unwrap();
        let lwr = dq.lwr_index(1).unwrap();
        full.set(lwr, lwr, 5.0).unwrap();
        assert_eq!(full.get(lwr, lwr).unwrap(), 5.0);
        // structural zero cannot be written
        let far = dq.interior_index(0, 2, 0).unwrap();
        assert!(full.set(lwr, far, 1.0).is_err());
        // out of range
        let (m, _) = full.size();
        assert!(full.get(m, 0).is_err());
        assert!(full.set(0, m, 1.0).is_err());
    }
}
