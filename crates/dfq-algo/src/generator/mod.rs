//! # Discretised Generator Operators
//!
//! The infinitesimal generator of the discretised fluid queue is a large
//! block-structured operator
//!
//! ```text
//!     ┌──────────────┬──────────────────────────────┬──────────────┐
//!     │ T[lwr, lwr]  │ outflow into upward 1st cells│      0       │
//!     ├──────────────┼──────────────────────────────┼──────────────┤
//!     │ inflow from  │ per-phase block tridiagonal  │ inflow from  │
//!     │ downward 1st │ (B1..B4 / Δ_k) + cross-phase │ upward last  │
//!     │ cells        │ jumps (T_ij·I or T_ij·D)     │ cells        │
//!     ├──────────────┼──────────────────────────────┼──────────────┤
//!     │      0       │ outflow into downward last   │ T[upr, upr]  │
//!     │              │ cells                        │              │
//!     └──────────────┴──────────────────────────────┴──────────────┘
//! ```
//!
//! Two representations coexist:
//!
//! - [`LazyGenerator`]: stores only the `p × p` recipes and flux vectors;
//!   element access and structured multiply kernels derive everything else.
//! - [`FullGenerator`]: the materialised sparse matrix, for algorithms that
//!   need one.
//!
//! Construction dispatches on the mesh scheme: DG recipes come from the
//! polynomial basis ([`crate::basis`]), FRAP recipes from the
//! matrix-exponential parameters ([`crate::me`]). Finite-volume meshes have
//! no lazy recipe; [`build_full_generator`] assembles their first-order
//! upwind operator directly.

pub mod blocks;
pub mod full;
pub mod lazy;
pub mod mul;

pub use blocks::{Blocks, BoundaryFlux, FluxPair};
pub use full::FullGenerator;
pub use lazy::LazyGenerator;

use crate::basis::DgBasis;
use crate::me::MeParams;
use dfq_core::{DfqError, DfqResult, DiscretisedFluidQueue, Scheme};

/// Build the lazy generator for a discretised queue.
///
/// Fails with [`DfqError::Unsupported`] for meshes without a lazy recipe
/// (finite volume).
pub fn build_lazy_generator(dq: &DiscretisedFluidQueue) -> DfqResult<LazyGenerator<'_>> {
    let (blocks, flux) = match dq.mesh().scheme() {
        Scheme::Dg { degree } => DgBasis::new(degree)?.recipes()?,
        Scheme::Frap { order } => MeParams::erlang(order)?.recipes()?,
        Scheme::FiniteVolume => {
            return Err(DfqError::Unsupported(
                "finite-volume meshes have no lazy generator; use build_full_generator".into(),
            ))
        }
    };
    LazyGenerator::new(dq, blocks, flux)
}

/// Build the materialised generator for a discretised queue.
///
/// Equals `materialise(build_lazy_generator(dq))` for DG and FRAP meshes.
/// Finite-volume meshes assemble the order-1 upwind operator (the degree-0
/// polynomial recipe) and materialise that.
pub fn build_full_generator(dq: &DiscretisedFluidQueue) -> DfqResult<FullGenerator> {
    let lazy = match dq.mesh().scheme() {
        Scheme::FiniteVolume => {
            let (blocks, flux) = DgBasis::new(0)?.recipes()?;
            LazyGenerator::new(dq, blocks, flux)?
        }
        _ => build_lazy_generator(dq)?,
    };
    FullGenerator::materialise(&lazy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfq_core::{FluidQueueModel, Mesh};

    fn model() -> FluidQueueModel {
        let t = vec![
            vec![-2.0, 1.0, 1.0],
            vec![1.0, -1.0, 0.0],
            vec![1.0, 1.0, -2.0],
        ];
        FluidQueueModel::new(&[2.0, -1.0, 0.0], t).unwrap()
    }

    #[test]
    fn test_dg_and_frap_share_operator_shape() {
        let nodes = vec![0.0, 1.0, 2.0, 3.0, 4.0];
        let dg = DiscretisedFluidQueue::new(model(), Mesh::dg(nodes.clone(), 2).unwrap()).unwrap();
        let frap =
            DiscretisedFluidQueue::new(model(), Mesh::frap(nodes, 3).unwrap()).unwrap();
        let g_dg = build_lazy_generator(&dg).unwrap();
        let g_frap = build_lazy_generator(&frap).unwrap();
        assert_eq!(g_dg.size(), (40, 40));
        assert_eq!(g_frap.size(), (40, 40));
    }

    #[test]
    fn test_finite_volume_lazy_is_unsupported() {
        let dq = DiscretisedFluidQueue::new(
            model(),
            Mesh::finite_volume(vec![0.0, 1.0, 2.0, 3.0, 4.0]).unwrap(),
        )
        .unwrap();
        assert!(matches!(
            build_lazy_generator(&dq),
            Err(DfqError::Unsupported(_))
        ));
        // materialisation still works, at the smaller one-basis-per-cell size
        let full = build_full_generator(&dq).unwrap();
        assert_eq!(full.size(), (2 + 3 * 4 + 2, 2 + 3 * 4 + 2));
        for (r, s) in full.row_sums().iter().enumerate() {
            assert!(s.abs() < 1e-10, "row {r} sums to {s}");
        }
    }
}
