//! Matrix-exponential parameters for the FRAP / QBD-RAP scheme.
//!
//! A FRAP cell replaces the within-cell transport dynamics with a
//! matrix-exponential renewal representation `(a, S, s)`: the cell is entered
//! with orbit vector `a`, the orbit evolves under `S`, and mass exits through
//! the closing vector `s = -S·1`. The generator recipes are then
//!
//! ```text
//! B_mid = S        B_low = B_up = s·aᵀ
//! flux.in = s      flux.out = a
//! ```
//!
//! `D` re-expresses an orbit when a phase jump reverses the drift direction
//! (the cell is then traversed from the opposite edge).
//!
//! The built-in family is the Erlang distribution of a given order with unit
//! mean: `a = e₁`, `S` bidiagonal with stage rate equal to the order, and `D`
//! the stage-reversal (anti-identity) matrix, which is the exact orientation
//! reversal for the Erlang stage interpretation. Callers with richer ME
//! families (e.g. concentrated matrix exponentials) can construct
//! [`MeParams`] directly; all shapes and stochasticity constraints are
//! validated.

use crate::generator::{Blocks, BoundaryFlux, FluxPair};
use crate::linalg;
use dfq_core::{DfqError, DfqResult};

const TOL: f64 = 1e-9;

/// Matrix-exponential parameters `(a, S, s)` plus the orientation-reversal
/// matrix `D`.
#[derive(Debug, Clone)]
pub struct MeParams {
    /// Initial (orbit) row vector `a`; sums to one
    pub a: Vec<f64>,
    /// Defect generator `S`
    pub s: Vec<Vec<f64>>,
    /// Closing vector `s = -S·1`
    pub exit: Vec<f64>,
    /// Orientation-reversal matrix; rows sum to one
    pub d: Vec<Vec<f64>>,
}

impl MeParams {
    /// Validate a custom parameter set.
    pub fn new(
        a: Vec<f64>,
        s: Vec<Vec<f64>>,
        exit: Vec<f64>,
        d: Vec<Vec<f64>>,
    ) -> DfqResult<Self> {
        let p = a.len();
        if p == 0 {
            return Err(DfqError::Domain("ME order must be at least 1".into()));
        }
        if s.len() != p || s.iter().any(|row| row.len() != p) {
            return Err(DfqError::ShapeMismatch {
                expected: format!("{p}x{p} matrix S"),
                found: format!("{}x{}", s.len(), s.first().map_or(0, |r| r.len())),
            });
        }
        if exit.len() != p {
            return Err(DfqError::ShapeMismatch {
                expected: format!("closing vector of length {p}"),
                found: format!("length {}", exit.len()),
            });
        }
        if d.len() != p || d.iter().any(|row| row.len() != p) {
            return Err(DfqError::ShapeMismatch {
                expected: format!("{p}x{p} reversal matrix"),
                found: format!("{}x{}", d.len(), d.first().map_or(0, |r| r.len())),
            });
        }

        let a_sum: f64 = a.iter().sum();
        if (a_sum - 1.0).abs() > TOL {
            return Err(DfqError::Domain(format!(
                "ME initial vector sums to {a_sum}, expected 1"
            )));
        }
        for (i, row) in s.iter().enumerate() {
            let closing = -row.iter().sum::<f64>();
            if (closing - exit[i]).abs() > TOL {
                return Err(DfqError::Domain(format!(
                    "closing vector mismatch at {i}: s[{i}] = {} but -S·1 = {closing}",
                    exit[i]
                )));
            }
        }
        for (i, row) in d.iter().enumerate() {
            let sum: f64 = row.iter().sum();
            if (sum - 1.0).abs() > TOL {
                return Err(DfqError::Domain(format!(
                    "reversal matrix row {i} sums to {sum}, expected 1"
                )));
            }
        }

        Ok(MeParams { a, s, exit, d })
    }

    /// Erlang parameters of the given order with unit mean.
    pub fn erlang(order: usize) -> DfqResult<Self> {
        if order == 0 {
            return Err(DfqError::Domain("ME order must be at least 1".into()));
        }
        let lambda = order as f64;
        let mut s = vec![vec![0.0; order]; order];
        for i in 0..order {
            s[i][i] = -lambda;
            if i + 1 < order {
                s[i][i + 1] = lambda;
            }
        }
        let mut a = vec![0.0; order];
        a[0] = 1.0;
        let mut exit = vec![0.0; order];
        exit[order - 1] = lambda;

        // Stage reversal: stage i counted from the left edge becomes stage
        // order-1-i counted from the right edge
        let mut d = vec![vec![0.0; order]; order];
        for i in 0..order {
            d[i][order - 1 - i] = 1.0;
        }

        MeParams::new(a, s, exit, d)
    }

    /// ME order (basis dimension)
    pub fn order(&self) -> usize {
        self.a.len()
    }

    /// Assemble the generator block recipes and boundary flux vectors.
    pub fn recipes(&self) -> DfqResult<(Blocks, BoundaryFlux)> {
        let p = self.order();
        let hop = linalg::outer(&self.exit, &self.a);
        let blocks = Blocks::from_three(hop.clone(), self.s.clone(), hop, self.d.clone())?;
        let flux = BoundaryFlux::new(
            FluxPair {
                inflow: self.exit.clone(),
                outflow: self.a.clone(),
            },
            FluxPair {
                inflow: self.exit.clone(),
                outflow: self.a.clone(),
            },
            p,
        )?;
        Ok((blocks, flux))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_erlang_structure() {
        let me = MeParams::erlang(3).unwrap();
        assert_eq!(me.order(), 3);
        assert_eq!(me.a, vec![1.0, 0.0, 0.0]);
        assert_eq!(me.exit, vec![0.0, 0.0, 3.0]);
        assert_eq!(me.s[0], vec![-3.0, 3.0, 0.0]);
        assert_eq!(me.s[2], vec![0.0, 0.0, -3.0]);
    }

    #[test]
    fn test_reversal_is_involution() {
        let me = MeParams::erlang(4).unwrap();
        let sq = crate::linalg::mat_mul(&me.d, &me.d);
        for i in 0..4 {
            for j in 0..4 {
                let expect = if i == j { 1.0 } else { 0.0 };
                assert_eq!(sq[i][j], expect);
            }
        }
    }

    #[test]
    fn test_recipe_row_sums() {
        let me = MeParams::erlang(3).unwrap();
        let (blocks, flux) = me.recipes().unwrap();
        for m in 0..3 {
            let s_mid: f64 = blocks.b2[m].iter().sum();
            let s_up: f64 = blocks.b4[m].iter().sum();
            assert!((s_mid + s_up).abs() < 1e-12);
            assert!((s_up - flux.upper.inflow[m]).abs() < 1e-12);
        }
        let out: f64 = flux.lower.outflow.iter().sum();
        assert!((out - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_inconsistent_closing_vector() {
        let me = MeParams::new(
            vec![1.0, 0.0],
            vec![vec![-2.0, 2.0], vec![0.0, -2.0]],
            vec![0.0, 1.0],
            vec![vec![0.0, 1.0], vec![1.0, 0.0]],
        );
        assert!(me.is_err());
    }

    #[test]
    fn test_rejects_non_stochastic_initial_vector() {
        let me = MeParams::new(
            vec![0.5, 0.0],
            vec![vec![-2.0, 2.0], vec![0.0, -2.0]],
            vec![0.0, 2.0],
            vec![vec![0.0, 1.0], vec![1.0, 0.0]],
        );
        assert!(me.is_err());
    }
}
