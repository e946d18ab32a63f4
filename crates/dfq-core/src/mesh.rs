//! Spatial mesh for the level discretisation.
//!
//! The continuous level axis is cut into `K` cells by `K + 1` strictly
//! increasing nodes. Within each cell the density is represented on a local
//! basis whose dimension depends on the discretisation scheme:
//!
//! ```text
//! scheme           basis                          bases per cell
//! ─────────────    ───────────────────────────    ──────────────
//! DG(degree)       polynomial, Lagrange nodal     degree + 1
//! FRAP(order)      matrix-exponential density     order
//! FiniteVolume     cell average                   1
//! ```
//!
//! The scheme is a tagged variant rather than a trait object: all code paths
//! are known statically and generator construction dispatches on the tag.

use crate::error::{DfqError, DfqResult};
use serde::{Deserialize, Serialize};

/// Discretisation scheme tag plus its scheme-specific parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scheme {
    /// Discontinuous Galerkin on polynomials of the given degree
    Dg { degree: usize },
    /// QBD-RAP approximation with matrix-exponential densities of the given order
    Frap { order: usize },
    /// First-order upwind finite volume
    FiniteVolume,
}

/// A mesh: strictly increasing nodes and a discretisation scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mesh {
    nodes: Vec<f64>,
    widths: Vec<f64>,
    scheme: Scheme,
}

impl Mesh {
    /// Discontinuous Galerkin mesh with polynomials of degree `degree`
    /// (`degree + 1` basis functions per cell).
    pub fn dg(nodes: Vec<f64>, degree: usize) -> DfqResult<Self> {
        Self::build(nodes, Scheme::Dg { degree })
    }

    /// FRAP / QBD-RAP mesh with matrix-exponential densities of order `order`.
    pub fn frap(nodes: Vec<f64>, order: usize) -> DfqResult<Self> {
        if order == 0 {
            return Err(DfqError::Domain("FRAP order must be at least 1".into()));
        }
        Self::build(nodes, Scheme::Frap { order })
    }

    /// First-order upwind finite-volume mesh (one basis value per cell).
    pub fn finite_volume(nodes: Vec<f64>) -> DfqResult<Self> {
        Self::build(nodes, Scheme::FiniteVolume)
    }

    fn build(nodes: Vec<f64>, scheme: Scheme) -> DfqResult<Self> {
        if nodes.len() < 2 {
            return Err(DfqError::Domain(format!(
                "mesh needs at least 2 nodes, got {}",
                nodes.len()
            )));
        }
        let mut widths = Vec::with_capacity(nodes.len() - 1);
        for (k, pair) in nodes.windows(2).enumerate() {
            let w = pair[1] - pair[0];
            if !(w > 0.0) {
                return Err(DfqError::Domain(format!(
                    "cell {k} has non-positive width {w} (nodes must be strictly increasing)"
                )));
            }
            widths.push(w);
        }
        Ok(Mesh {
            nodes,
            widths,
            scheme,
        })
    }

    /// Number of cells `K`
    pub fn num_cells(&self) -> usize {
        self.widths.len()
    }

    /// Basis dimension per cell
    pub fn num_bases_per_cell(&self) -> usize {
        match self.scheme {
            Scheme::Dg { degree } => degree + 1,
            Scheme::Frap { order } => order,
            Scheme::FiniteVolume => 1,
        }
    }

    /// Width `Δ_k` of cell `k`
    pub fn cell_width(&self, k: usize) -> DfqResult<f64> {
        self.widths
            .get(k)
            .copied()
            .ok_or(DfqError::OutOfRange {
                entity: "cell",
                index: k,
                limit: self.widths.len(),
            })
    }

    /// All cell widths, in cell order
    pub fn widths(&self) -> &[f64] {
        &self.widths
    }

    /// The mesh nodes
    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    /// The scheme tag
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// True when every cell has the same width (within rounding).
    ///
    /// Uniform meshes let the generator pre-scale its per-cell blocks once.
    pub fn is_uniform(&self) -> bool {
        let first = self.widths[0];
        self.widths
            .iter()
            .all(|&w| (w - first).abs() <= 1e-12 * first.abs())
    }
}
