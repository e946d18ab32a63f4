//! Stationary distribution of the discretised generator.
//!
//! Solves `π B = 0` with `π · 1 = 1` on the materialised operator. The
//! balance equations have rank `M - 1` for an irreducible generator, so one
//! of them is replaced by the normalisation row before handing the dense
//! system to faer's partial-pivot LU. Materialisation is exactly the case
//! this module exists for; transient work should stay on the lazy operator.

use crate::generator::FullGenerator;
use dfq_core::DfqError;
use faer::prelude::SpSolver;
use faer::{FaerMat, Mat};
use thiserror::Error;

/// Errors from the stationary solve
#[derive(Debug, Error)]
pub enum StationaryError {
    #[error("Generator error: {0}")]
    Generator(#[from] DfqError),

    #[error("Empty generator")]
    Empty,

    #[error("Linear solve failed: {0}")]
    SolveFailed(String),
}

/// Stationary row vector of a materialised generator.
///
/// Replaces the first balance equation with `Σ π = 1` and solves the
/// transposed system. A reducible generator (several closed classes) has no
/// unique stationary vector; that surfaces as a singular solve.
pub fn stationary_distribution(full: &FullGenerator) -> Result<Vec<f64>, StationaryError> {
    let (m, _) = full.size();
    if m == 0 {
        return Err(StationaryError::Empty);
    }

    // Equations: column j of B gives Σ_i π_i B[i][j] = 0; row 0 of the
    // assembled system is the normalisation.
    let mut mat = Mat::zeros(m, m);
    for i in 0..m {
        mat.write(0, i, 1.0);
    }
    for (&val, (i, j)) in full.matrix().iter() {
        if j == 0 {
            continue;
        }
        mat.write(j, i, val);
    }

    let mut rhs = Mat::zeros(m, 1);
    rhs.write(0, 0, 1.0);

    let lu = mat.partial_piv_lu();
    let solution = lu.solve(&rhs);

    let pi: Vec<f64> = (0..m).map(|i| solution.read(i, 0)).collect();
    if pi.iter().any(|&v| !v.is_finite()) {
        return Err(StationaryError::SolveFailed(
            "singular system (reducible generator?)".into(),
        ));
    }
    Ok(pi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{build_full_generator, build_lazy_generator};
    use dfq_core::{DiscretisedFluidQueue, FluidQueueModel, Mesh};

    fn fixture() -> DiscretisedFluidQueue {
        let t = vec![
            vec![-2.0, 1.0, 1.0],
            vec![1.0, -1.0, 0.0],
            vec![1.0, 1.0, -2.0],
        ];
        let model = FluidQueueModel::new(&[2.0, -1.0, 0.0], t).unwrap();
        let mesh = Mesh::dg(vec![0.0, 1.0, 2.0, 3.0], 1).unwrap();
        DiscretisedFluidQueue::new(model, mesh).unwrap()
    }

    #[test]
    fn test_stationary_vector_is_normalised_and_balanced() {
        let dq = fixture();
        let full = build_full_generator(&dq).unwrap();
        let pi = stationary_distribution(&full).unwrap();

        let total: f64 = pi.iter().sum();
        assert!((total - 1.0).abs() < 1e-10, "Σπ = {total}");

        // residual of the balance equations through the lazy kernel
        let lazy = build_lazy_generator(&dq).unwrap();
        let residual = lazy.apply_left(&pi).unwrap();
        for (j, r) in residual.iter().enumerate() {
            assert!(r.abs() < 1e-8, "residual {r} in component {j}");
        }
    }

    #[test]
    fn test_stationary_mass_is_mostly_probability() {
        // small negative undershoots are possible for coarse DG meshes, but
        // the bulk of the vector must be non-negative probability mass
        let dq = fixture();
        let full = build_full_generator(&dq).unwrap();
        let pi = stationary_distribution(&full).unwrap();
        let negative: f64 = pi.iter().filter(|&&v| v < 0.0).map(|v| -v).sum();
        assert!(negative < 0.1, "negative mass {negative}");
    }
}
