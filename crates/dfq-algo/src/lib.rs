//! # dfq-algo: Generator Operators for Discretised Fluid Queues
//!
//! This crate builds and applies the discretised infinitesimal generator of a
//! stochastic fluid queue, together with the spatial discretisation schemes
//! that produce its per-cell recipes and the solvers that consume it.
//!
//! ## Operator representations
//!
//! | Form | Storage | Use |
//! |------|---------|-----|
//! | [`LazyGenerator`] | four `p × p` recipes + flux vectors | `get`, structured multiply kernels, time stepping |
//! | [`FullGenerator`] | sparse CSC matrix | stationary solves, operator arithmetic |
//!
//! The lazy form is authoritative: materialisation is one application of the
//! left-multiply kernel to the identity, and `get` agrees with both kernels
//! element for element.
//!
//! ## Discretisation schemes
//!
//! - **DG** ([`basis`]): Lagrange polynomial basis with upwind fluxes; block
//!   recipes assembled from the mass and stiffness matrices.
//! - **FRAP** ([`me`]): matrix-exponential (Erlang) cell densities; the
//!   orientation-reversal matrix `D` re-expresses a cell when the drift
//!   direction flips.
//! - **Finite volume**: order-1 upwind; materialised form only.
//!
//! ## Solvers
//!
//! - [`integrate`]: explicit Runge–Kutta transient stepping on the lazy
//!   operator.
//! - [`stationary`]: stationary vector of the materialised operator via
//!   faer's LU.
//!
//! ## Example
//!
//! ```rust
//! use dfq_core::{DiscretisedFluidQueue, FluidQueueModel, Mesh};
//! use dfq_algo::generator::{build_full_generator, build_lazy_generator};
//!
//! let t = vec![vec![-1.0, 1.0], vec![2.0, -2.0]];
//! let model = FluidQueueModel::new(&[1.0, -1.0], t).unwrap();
//! let mesh = Mesh::dg(vec![0.0, 1.0, 2.0, 3.0], 1).unwrap();
//! let dq = DiscretisedFluidQueue::new(model, mesh).unwrap();
//!
//! let lazy = build_lazy_generator(&dq).unwrap();
//! let full = build_full_generator(&dq).unwrap();
//! assert_eq!(lazy.size(), full.size());
//!
//! // every row of a conservative generator sums to zero
//! for s in full.row_sums() {
//!     assert!(s.abs() < 1e-10);
//! }
//! ```

pub mod basis;
pub mod generator;
pub mod integrate;
mod linalg;
pub mod me;
pub mod stationary;

pub use basis::DgBasis;
pub use generator::{
    build_full_generator, build_lazy_generator, Blocks, BoundaryFlux, FluxPair, FullGenerator,
    LazyGenerator,
};
pub use integrate::{RkMethod, TransientSolution, TransientSolver};
pub use me::MeParams;
pub use stationary::{stationary_distribution, StationaryError};
