//! # dfq-core: Discretised Fluid Queue Modeling Core
//!
//! Provides the fundamental data structures for stochastic fluid-queue
//! analysis: the phase process, the spatial mesh, and the discretised queue
//! that fixes the global coefficient layout consumed by the generator
//! operators in `dfq-algo`.
//!
//! ## The model
//!
//! A fluid queue is a Markov-modulated piecewise-linear process `(φ(t), X(t))`:
//! the phase `φ` jumps according to a generator matrix `T`, while the level
//! `X` drifts at the phase-dependent rate `c_i`, reflected at a lower barrier
//! and (optionally, for the bounded variant) an upper barrier. Probability
//! concentrates both in densities over the level axis and in point masses at
//! the barriers.
//!
//! ## Quick start
//!
//! ```rust
//! use dfq_core::{DiscretisedFluidQueue, FluidQueueModel, Mesh};
//!
//! let t = vec![
//!     vec![-2.0, 1.0, 1.0],
//!     vec![1.0, -1.0, 0.0],
//!     vec![1.0, 1.0, -2.0],
//! ];
//! let model = FluidQueueModel::new(&[2.0, -1.0, 0.0], t).unwrap();
//! let mesh = Mesh::dg(vec![0.0, 1.0, 2.0, 3.0, 4.0], 2).unwrap();
//! let dq = DiscretisedFluidQueue::new(model, mesh).unwrap();
//!
//! assert_eq!(dq.total_size(), 40);
//! let n = dq.interior_index(1, 0, 2).unwrap();
//! assert_eq!(dq.from_interior(n).unwrap(), (1, 0, 2));
//! ```
//!
//! ## Core data structures
//!
//! - [`FluidQueueModel`] - phases, drift rates, modulating generator,
//!   boundary memberships, optional reflection matrices
//! - [`Mesh`] - strictly increasing nodes plus a tagged [`Scheme`]
//! - [`DiscretisedFluidQueue`] - the pair, with the total bounds-checked
//!   index mapping between `(phase, cell, basis)` / boundary slots and the
//!   flat coefficient vector
//! - [`DfqError`] / [`DfqResult`] - unified error handling

pub mod error;
pub mod mesh;
pub mod model;
pub mod queue;

pub use error::{DfqError, DfqResult};
pub use mesh::{Mesh, Scheme};
pub use model::{FluidQueueModel, Membership, Phase, Reflection};
pub use queue::{Boundary, DiscretisedFluidQueue};
