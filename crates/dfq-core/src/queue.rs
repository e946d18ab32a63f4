//! The discretised fluid queue and its global index layout.
//!
//! A [`DiscretisedFluidQueue`] pairs a [`FluidQueueModel`] with a [`Mesh`] and
//! fixes the layout of the coefficient vector acted on by the discretised
//! generator:
//!
//! ```text
//! [ lower boundary : N₋ ] [ interior : N·K·p, phase-major ] [ upper boundary : N₊ ]
//!
//! interior(i, k, q) = N₋ + i·K·p + k·p + q        (all indices 0-based)
//! ```
//!
//! `N₋`/`N₊` count the phases with lower/upper boundary membership; the slot
//! of a member phase is the running count of member phases before it. The
//! index mapping is total and bounds-checked in both directions.

use crate::error::{DfqError, DfqResult};
use crate::mesh::Mesh;
use crate::model::FluidQueueModel;
use serde::{Deserialize, Serialize};

/// Which boundary layer a global index falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Lower,
    Upper,
}

/// A fluid-queue model discretised over a mesh.
///
/// Owns both; generators borrow the queue. Immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscretisedFluidQueue {
    model: FluidQueueModel,
    mesh: Mesh,
    /// Phases with a lower point mass, in phase order
    lwr_phases: Vec<usize>,
    /// Phases with an upper point mass, in phase order
    upr_phases: Vec<usize>,
    /// Phase index → lower boundary slot
    lwr_slot: Vec<Option<usize>>,
    /// Phase index → upper boundary slot
    upr_slot: Vec<Option<usize>>,
}

impl DiscretisedFluidQueue {
    pub fn new(model: FluidQueueModel, mesh: Mesh) -> DfqResult<Self> {
        if mesh.num_bases_per_cell() == 0 {
            return Err(DfqError::Domain("mesh has no basis functions".into()));
        }
        let n = model.n_phases();
        let mut lwr_phases = Vec::new();
        let mut upr_phases = Vec::new();
        let mut lwr_slot = vec![None; n];
        let mut upr_slot = vec![None; n];
        for i in 0..n {
            if model.lwr_member(i) {
                lwr_slot[i] = Some(lwr_phases.len());
                lwr_phases.push(i);
            }
            if model.upr_member(i) {
                upr_slot[i] = Some(upr_phases.len());
                upr_phases.push(i);
            }
        }
        Ok(DiscretisedFluidQueue {
            model,
            mesh,
            lwr_phases,
            upr_phases,
            lwr_slot,
            upr_slot,
        })
    }

    /// The fluid-queue model
    pub fn model(&self) -> &FluidQueueModel {
        &self.model
    }

    /// The mesh
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Number of phases `N`
    pub fn n_phases(&self) -> usize {
        self.model.n_phases()
    }

    /// Number of cells `K`
    pub fn n_cells(&self) -> usize {
        self.mesh.num_cells()
    }

    /// Basis dimension `p` per cell
    pub fn n_bases(&self) -> usize {
        self.mesh.num_bases_per_cell()
    }

    /// Number of lower-boundary point masses `N₋`
    pub fn n_lwr(&self) -> usize {
        self.lwr_phases.len()
    }

    /// Number of upper-boundary point masses `N₊`
    pub fn n_upr(&self) -> usize {
        self.upr_phases.len()
    }

    /// Length of the interior block, `N·K·p`
    pub fn interior_len(&self) -> usize {
        self.n_phases() * self.n_cells() * self.n_bases()
    }

    /// Total dimension `M = N₋ + N·K·p + N₊` of the coefficient vector
    pub fn total_size(&self) -> usize {
        self.n_lwr() + self.interior_len() + self.n_upr()
    }

    /// Phases holding a lower point mass, in slot order
    pub fn lwr_phases(&self) -> &[usize] {
        &self.lwr_phases
    }

    /// Phases holding an upper point mass, in slot order
    pub fn upr_phases(&self) -> &[usize] {
        &self.upr_phases
    }

    /// Global index of interior coefficient (phase `i`, cell `k`, basis `q`).
    pub fn interior_index(&self, i: usize, k: usize, q: usize) -> DfqResult<usize> {
        let (n, kk, p) = (self.n_phases(), self.n_cells(), self.n_bases());
        if i >= n {
            return Err(DfqError::OutOfRange {
                entity: "phase",
                index: i,
                limit: n,
            });
        }
        if k >= kk {
            return Err(DfqError::OutOfRange {
                entity: "cell",
                index: k,
                limit: kk,
            });
        }
        if q >= p {
            return Err(DfqError::OutOfRange {
                entity: "basis",
                index: q,
                limit: p,
            });
        }
        Ok(self.n_lwr() + i * kk * p + k * p + q)
    }

    /// Inverse of [`interior_index`](Self::interior_index): `(phase, cell, basis)`
    /// of a global interior index.
    pub fn from_interior(&self, n: usize) -> DfqResult<(usize, usize, usize)> {
        if n >= self.total_size() {
            return Err(DfqError::OutOfRange {
                entity: "index",
                index: n,
                limit: self.total_size(),
            });
        }
        if n < self.n_lwr() || n >= self.n_lwr() + self.interior_len() {
            return Err(DfqError::InvalidBoundary(format!(
                "index {n} is a boundary index, not interior"
            )));
        }
        let (kk, p) = (self.n_cells(), self.n_bases());
        let rel = n - self.n_lwr();
        let i = rel / (kk * p);
        let k = (rel % (kk * p)) / p;
        let q = rel % p;
        Ok((i, k, q))
    }

    /// Lower boundary slot of phase `i`, if it is a member.
    pub fn lwr_slot_of(&self, i: usize) -> Option<usize> {
        self.lwr_slot.get(i).copied().flatten()
    }

    /// Upper boundary slot of phase `i`, if it is a member.
    pub fn upr_slot_of(&self, i: usize) -> Option<usize> {
        self.upr_slot.get(i).copied().flatten()
    }

    /// Global index of the lower point mass of phase `i`.
    pub fn lwr_index(&self, i: usize) -> DfqResult<usize> {
        if i >= self.n_phases() {
            return Err(DfqError::OutOfRange {
                entity: "phase",
                index: i,
                limit: self.n_phases(),
            });
        }
        self.lwr_slot[i].ok_or_else(|| {
            DfqError::InvalidBoundary(format!("phase {i} is not a lower-boundary member"))
        })
    }

    /// Global index of the upper point mass of phase `i`.
    pub fn upr_index(&self, i: usize) -> DfqResult<usize> {
        if i >= self.n_phases() {
            return Err(DfqError::OutOfRange {
                entity: "phase",
                index: i,
                limit: self.n_phases(),
            });
        }
        let slot = self.upr_slot[i].ok_or_else(|| {
            DfqError::InvalidBoundary(format!("phase {i} is not an upper-boundary member"))
        })?;
        Ok(self.n_lwr() + self.interior_len() + slot)
    }

    /// Is global index `n` a boundary point mass?
    pub fn is_boundary(&self, n: usize) -> DfqResult<bool> {
        if n >= self.total_size() {
            return Err(DfqError::OutOfRange {
                entity: "index",
                index: n,
                limit: self.total_size(),
            });
        }
        Ok(n < self.n_lwr() || n >= self.n_lwr() + self.interior_len())
    }

    /// `(boundary, phase)` of a global boundary index.
    pub fn boundary_phase(&self, n: usize) -> DfqResult<(Boundary, usize)> {
        if n >= self.total_size() {
            return Err(DfqError::OutOfRange {
                entity: "index",
                index: n,
                limit: self.total_size(),
            });
        }
        if n < self.n_lwr() {
            Ok((Boundary::Lower, self.lwr_phases[n]))
        } else if n >= self.n_lwr() + self.interior_len() {
            let slot = n - self.n_lwr() - self.interior_len();
            Ok((Boundary::Upper, self.upr_phases[slot]))
        } else {
            Err(DfqError::InvalidBoundary(format!(
                "index {n} is interior, not boundary"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_phase_queue() -> DiscretisedFluidQueue {
        let t = vec![
            vec![-2.0, 1.0, 1.0],
            vec![1.0, -1.0, 0.0],
            vec![1.0, 1.0, -2.0],
        ];
        let model = FluidQueueModel::new(&[2.0, -1.0, 0.0], t).unwrap();
        let mesh = Mesh::dg(vec![0.0, 1.0, 2.0, 3.0, 4.0], 2).unwrap();
        DiscretisedFluidQueue::new(model, mesh).unwrap()
    }

    #[test]
    fn test_layout_sizes() {
        let dq = three_phase_queue();
        // lwr members: phases 1 and 2; upr members: phases 0 and 2
        assert_eq!(dq.n_lwr(), 2);
        assert_eq!(dq.n_upr(), 2);
        assert_eq!(dq.interior_len(), 3 * 4 * 3);
        assert_eq!(dq.total_size(), 40);
    }

    #[test]
    fn test_interior_round_trip() {
        let dq = three_phase_queue();
        for i in 0..dq.n_phases() {
            for k in 0..dq.n_cells() {
                for q in 0..dq.n_bases() {
                    let n = dq.interior_index(i, k, q).unwrap();
                    assert!(!dq.is_boundary(n).unwrap());
                    assert_eq!(dq.from_interior(n).unwrap(), (i, k, q));
                }
            }
        }
    }

    #[test]
    fn test_boundary_indices() {
        let dq = three_phase_queue();
        assert_eq!(dq.lwr_index(1).unwrap(), 0);
        assert_eq!(dq.lwr_index(2).unwrap(), 1);
        assert_eq!(dq.upr_index(0).unwrap(), 2 + 36);
        assert_eq!(dq.upr_index(2).unwrap(), 2 + 36 + 1);
        assert!(dq.is_boundary(0).unwrap());
        assert!(dq.is_boundary(39).unwrap());
        assert_eq!(dq.boundary_phase(1).unwrap(), (Boundary::Lower, 2));
        assert_eq!(dq.boundary_phase(38).unwrap(), (Boundary::Upper, 0));
    }

    #[test]
    fn test_non_member_boundary_is_error() {
        let dq = three_phase_queue();
        // phase 0 has positive drift: no lower point mass
        assert!(matches!(
            dq.lwr_index(0),
            Err(DfqError::InvalidBoundary(_))
        ));
        // phase 1 has negative drift: no upper point mass
        assert!(matches!(
            dq.upr_index(1),
            Err(DfqError::InvalidBoundary(_))
        ));
    }

    #[test]
    fn test_out_of_range_errors() {
        let dq = three_phase_queue();
        assert!(matches!(
            dq.interior_index(3, 0, 0),
            Err(DfqError::OutOfRange { entity: "phase", .. })
        ));
        assert!(matches!(
            dq.interior_index(0, 4, 0),
            Err(DfqError::OutOfRange { entity: "cell", .. })
        ));
        assert!(matches!(
            dq.interior_index(0, 0, 3),
            Err(DfqError::OutOfRange { entity: "basis", .. })
        ));
        assert!(dq.is_boundary(40).is_err());
        assert!(matches!(
            dq.from_interior(0),
            Err(DfqError::InvalidBoundary(_))
        ));
    }
}
