//! Per-cell block recipes and boundary flux vectors.
//!
//! The discretised generator has a Kronecker-like layout: the same four
//! `p × p` blocks tile the interior of the operator, scaled per cell by
//! `|c_i| / Δ_k`, and two flux vector pairs couple the first/last cells to the
//! boundary point masses.
//!
//! ```text
//!        cell k-1   cell k    cell k+1
//!          ┌────┐   ┌────┐    ┌────┐
//! c_i > 0:           B2          B4       (diagonal, upper-diagonal)
//! c_i < 0:   B1      B3                   (lower-diagonal, diagonal)
//! ```
//!
//! `D` re-expresses a cell's coefficients when a phase jump flips the drift
//! orientation; it is the identity for DG and the orientation-reversal matrix
//! for FRAP.

use dfq_core::{DfqError, DfqResult};

/// The four per-cell block recipes plus the orientation-change matrix.
#[derive(Debug, Clone)]
pub struct Blocks {
    /// Lower-diagonal block (negative drift): cell `k` → cell `k-1`
    pub b1: Vec<Vec<f64>>,
    /// Diagonal block for positive drift
    pub b2: Vec<Vec<f64>>,
    /// Diagonal block for negative drift
    pub b3: Vec<Vec<f64>>,
    /// Upper-diagonal block (positive drift): cell `k` → cell `k+1`
    pub b4: Vec<Vec<f64>>,
    /// Orientation-change matrix applied on cross-phase jumps
    pub d: Vec<Vec<f64>>,
}

impl Blocks {
    /// Validate that all five matrices are square with the same dimension.
    pub fn new(
        b1: Vec<Vec<f64>>,
        b2: Vec<Vec<f64>>,
        b3: Vec<Vec<f64>>,
        b4: Vec<Vec<f64>>,
        d: Vec<Vec<f64>>,
    ) -> DfqResult<Self> {
        let p = b1.len();
        for (name, m) in [("B1", &b1), ("B2", &b2), ("B3", &b3), ("B4", &b4), ("D", &d)] {
            if m.len() != p || m.iter().any(|row| row.len() != p) {
                return Err(DfqError::ShapeMismatch {
                    expected: format!("{p}x{p} block {name}"),
                    found: format!("{}x{}", m.len(), m.first().map_or(0, |r| r.len())),
                });
            }
        }
        if p == 0 {
            return Err(DfqError::Domain("blocks must be at least 1x1".into()));
        }
        Ok(Blocks { b1, b2, b3, b4, d })
    }

    /// Expand the three-block form `(B_low, B_mid, B_up)` used by schemes
    /// whose positive and negative diagonal blocks coincide (FRAP).
    pub fn from_three(
        b_low: Vec<Vec<f64>>,
        b_mid: Vec<Vec<f64>>,
        b_up: Vec<Vec<f64>>,
        d: Vec<Vec<f64>>,
    ) -> DfqResult<Self> {
        Self::new(b_low, b_mid.clone(), b_mid, b_up, d)
    }

    /// Basis dimension `p`
    pub fn dim(&self) -> usize {
        self.b1.len()
    }

    /// True when `D` is the identity (the DG case); the cross-phase kernel
    /// path then reduces to a scalar copy.
    pub fn d_is_identity(&self) -> bool {
        let p = self.dim();
        (0..p).all(|i| {
            (0..p).all(|j| {
                let expect = if i == j { 1.0 } else { 0.0 };
                self.d[i][j] == expect
            })
        })
    }

    /// Scale every block (including `D`) by `alpha`, in place.
    pub(crate) fn scale(&mut self, alpha: f64) {
        for m in [
            &mut self.b1,
            &mut self.b2,
            &mut self.b3,
            &mut self.b4,
            &mut self.d,
        ] {
            for row in m.iter_mut() {
                for v in row.iter_mut() {
                    *v *= alpha;
                }
            }
        }
    }
}

/// Flux vectors of one boundary.
#[derive(Debug, Clone)]
pub struct FluxPair {
    /// Interior → boundary: weights collecting first/last-cell coefficients
    /// into the point mass
    pub inflow: Vec<f64>,
    /// Boundary → interior: basis expansion of mass re-entering the cell edge
    pub outflow: Vec<f64>,
}

/// Boundary flux vectors for both barriers.
#[derive(Debug, Clone)]
pub struct BoundaryFlux {
    pub lower: FluxPair,
    pub upper: FluxPair,
}

impl BoundaryFlux {
    /// Validate both pairs against the basis dimension `p`.
    pub fn new(lower: FluxPair, upper: FluxPair, p: usize) -> DfqResult<Self> {
        for (name, v) in [
            ("lower.in", &lower.inflow),
            ("lower.out", &lower.outflow),
            ("upper.in", &upper.inflow),
            ("upper.out", &upper.outflow),
        ] {
            if v.len() != p {
                return Err(DfqError::ShapeMismatch {
                    expected: format!("flux vector {name} of length {p}"),
                    found: format!("length {}", v.len()),
                });
            }
        }
        Ok(BoundaryFlux { lower, upper })
    }

    pub(crate) fn scale(&mut self, alpha: f64) {
        for v in [
            &mut self.lower.inflow,
            &mut self.lower.outflow,
            &mut self.upper.inflow,
            &mut self.upper.outflow,
        ] {
            for x in v.iter_mut() {
                *x *= alpha;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(v: f64, p: usize) -> Vec<Vec<f64>> {
        vec![vec![v; p]; p]
    }

    #[test]
    fn test_blocks_shape_validation() {
        let ok = Blocks::new(
            square(1.0, 2),
            square(2.0, 2),
            square(3.0, 2),
            square(4.0, 2),
            square(0.0, 2),
        );
        assert!(ok.is_ok());

        let bad = Blocks::new(
            square(1.0, 2),
            square(2.0, 3),
            square(3.0, 2),
            square(4.0, 2),
            square(0.0, 2),
        );
        assert!(matches!(bad, Err(DfqError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_from_three_duplicates_diagonal() {
        let b = Blocks::from_three(
            square(1.0, 2),
            square(5.0, 2),
            square(4.0, 2),
            square(0.0, 2),
        )
        .unwrap();
        assert_eq!(b.b2, b.b3);
        assert_eq!(b.b1, square(1.0, 2));
        assert_eq!(b.b4, square(4.0, 2));
    }

    #[test]
    fn test_d_is_identity() {
        let mut b = Blocks::new(
            square(1.0, 2),
            square(1.0, 2),
            square(1.0, 2),
            square(1.0, 2),
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
        )
        .unwrap();
        assert!(b.d_is_identity());
        b.d[0][1] = 0.5;
        assert!(!b.d_is_identity());
    }

    #[test]
    fn test_flux_length_validation() {
        let pair = |n: usize| FluxPair {
            inflow: vec![1.0; n],
            outflow: vec![1.0; n],
        };
        assert!(BoundaryFlux::new(pair(3), pair(3), 3).is_ok());
        assert!(BoundaryFlux::new(pair(3), pair(2), 3).is_err());
    }
}
