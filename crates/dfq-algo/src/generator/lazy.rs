//! Lazy (structured) representation of the discretised generator.
//!
//! The full operator `B` is an `M × M` matrix with `M = N₋ + N·K·p + N₊`,
//! but its interior is tiled by the same four `p × p` recipes scaled per cell,
//! so the lazy form stores only the recipes, the boundary flux vectors, and a
//! reference to the discretised queue that fixes the layout. `get` computes a
//! single element in O(1); the multiply kernels in [`super::mul`] apply the
//! whole operator in `O(N K p²)` per row without ever materialising it.
//!
//! The lazy form is the authoritative definition of the operator: element
//! access and both multiply kernels are independent derivations from the same
//! recipes, which makes their agreement a strong correctness witness.
//!
//! Scaling keeps the operator exactly homogeneous: `scale(α)` multiplies the
//! owned recipes, flux vectors and `D`, and carries the factor onto the bare
//! generator entries (`T_ii` diagonals, identity-coupled phase jumps,
//! boundary-to-boundary rates) through `t_factor`.

use super::blocks::{Blocks, BoundaryFlux};
use dfq_core::{Boundary, DfqError, DfqResult, DiscretisedFluidQueue};

/// Structured generator operator borrowing its [`DiscretisedFluidQueue`].
///
/// Read-only after construction; the queue must outlive it.
#[derive(Debug, Clone)]
pub struct LazyGenerator<'a> {
    pub(crate) dq: &'a DiscretisedFluidQueue,
    pub(crate) blocks: Blocks,
    pub(crate) flux: BoundaryFlux,
    /// Scalar carried on bare `T` entries so scaling stays exact
    pub(crate) t_factor: f64,
    /// `D` proportional to the identity with factor `t_factor` (the DG case)
    pub(crate) d_identity: bool,
    /// Boundary outflow normalised to unit mass, used by the bounded
    /// re-injection paths
    pub(crate) lwr_placement: Vec<f64>,
    pub(crate) upr_placement: Vec<f64>,
    /// Pre-scaled per-phase diagonal blocks for uniform meshes
    pub(crate) uniform_diag: Option<Vec<Vec<Vec<f64>>>>,
}

/// Classified position of a global index.
pub(crate) enum Pos {
    /// Lower point mass of the phase
    Lower(usize),
    /// Interior coefficient `(phase, cell, basis)`
    Interior(usize, usize, usize),
    /// Upper point mass of the phase
    Upper(usize),
}

impl<'a> LazyGenerator<'a> {
    /// Build a lazy generator from the four block recipes and flux vectors.
    pub fn new(
        dq: &'a DiscretisedFluidQueue,
        blocks: Blocks,
        flux: BoundaryFlux,
    ) -> DfqResult<Self> {
        let p = dq.n_bases();
        if blocks.dim() != p {
            return Err(DfqError::ShapeMismatch {
                expected: format!("{p}x{p} blocks for {p} bases per cell"),
                found: format!("{0}x{0}", blocks.dim()),
            });
        }
        if flux.lower.inflow.len() != p {
            return Err(DfqError::ShapeMismatch {
                expected: format!("flux vectors of length {p}"),
                found: format!("length {}", flux.lower.inflow.len()),
            });
        }
        let d_identity = blocks.d_is_identity();
        let mut gen = LazyGenerator {
            dq,
            blocks,
            flux,
            t_factor: 1.0,
            d_identity,
            lwr_placement: Vec::new(),
            upr_placement: Vec::new(),
            uniform_diag: None,
        };
        gen.rebuild_caches();
        Ok(gen)
    }

    /// Convenience constructor for schemes whose positive and negative
    /// diagonal blocks coincide: expands `(B_low, B_mid, B_up)` to four.
    pub fn from_three_blocks(
        dq: &'a DiscretisedFluidQueue,
        b_low: Vec<Vec<f64>>,
        b_mid: Vec<Vec<f64>>,
        b_up: Vec<Vec<f64>>,
        d: Vec<Vec<f64>>,
        flux: BoundaryFlux,
    ) -> DfqResult<Self> {
        Self::new(dq, Blocks::from_three(b_low, b_mid, b_up, d)?, flux)
    }

    fn rebuild_caches(&mut self) {
        self.lwr_placement = normalise(&self.flux.lower.outflow);
        self.upr_placement = normalise(&self.flux.upper.outflow);
        self.uniform_diag = self.build_uniform_diag();
    }

    /// Pre-scale `|c_i|·B_diag/Δ + t_factor·T_ii·I` per phase when every cell
    /// has the same width.
    fn build_uniform_diag(&self) -> Option<Vec<Vec<Vec<f64>>>> {
        if !self.dq.mesh().is_uniform() {
            return None;
        }
        let delta = self.dq.mesh().widths()[0];
        let p = self.dq.n_bases();
        let model = self.dq.model();
        let mut per_phase = Vec::with_capacity(self.dq.n_phases());
        for i in 0..self.dq.n_phases() {
            let ci = model.rate(i);
            let mut block = vec![vec![0.0; p]; p];
            if ci != 0.0 {
                let (recipe, scale) = if ci > 0.0 {
                    (&self.blocks.b2, ci / delta)
                } else {
                    (&self.blocks.b3, -ci / delta)
                };
                for p0 in 0..p {
                    for q in 0..p {
                        block[p0][q] = scale * recipe[p0][q];
                    }
                }
            }
            let tii = self.t_factor * model.t_entry(i, i);
            for (p0, row) in block.iter_mut().enumerate() {
                row[p0] += tii;
            }
            per_phase.push(block);
        }
        Some(per_phase)
    }

    /// The discretised queue this operator acts on
    pub fn dq(&self) -> &DiscretisedFluidQueue {
        self.dq
    }

    /// The block recipes
    pub fn blocks(&self) -> &Blocks {
        &self.blocks
    }

    /// The boundary flux vectors
    pub fn flux(&self) -> &BoundaryFlux {
        &self.flux
    }

    /// Operator shape `(M, M)`
    pub fn size(&self) -> (usize, usize) {
        let m = self.dq.total_size();
        (m, m)
    }

    /// Operator extent along one axis (0 = rows, 1 = columns)
    pub fn size_along(&self, axis: usize) -> DfqResult<usize> {
        if axis > 1 {
            return Err(DfqError::OutOfRange {
                entity: "axis",
                index: axis,
                limit: 2,
            });
        }
        Ok(self.dq.total_size())
    }

    /// Scalar multiple of this operator.
    ///
    /// Scales the four blocks, both boundary flux pairs, and `D`; bare
    /// generator entries are covered by the carried `t_factor`, so the
    /// materialised operator scales entry-for-entry.
    pub fn scale(&self, alpha: f64) -> LazyGenerator<'a> {
        let mut scaled = self.clone();
        scaled.blocks.scale(alpha);
        scaled.flux.scale(alpha);
        scaled.t_factor *= alpha;
        scaled.rebuild_caches();
        scaled
    }

    pub(crate) fn classify(&self, n: usize) -> DfqResult<Pos> {
        if self.dq.is_boundary(n)? {
            let (side, phase) = self.dq.boundary_phase(n)?;
            Ok(match side {
                Boundary::Lower => Pos::Lower(phase),
                Boundary::Upper => Pos::Upper(phase),
            })
        } else {
            let (i, k, q) = self.dq.from_interior(n)?;
            Ok(Pos::Interior(i, k, q))
        }
    }

    /// Single element `B[row, col]` in O(1).
    pub fn get(&self, row: usize, col: usize) -> DfqResult<f64> {
        let model = self.dq.model();
        let mesh = self.dq.mesh();
        let last = self.dq.n_cells() - 1;
        let tf = self.t_factor;

        let value = match (self.classify(row)?, self.classify(col)?) {
            (Pos::Lower(i), Pos::Lower(j)) => {
                if j == i || model.rate(j) <= 0.0 {
                    tf * model.t_entry(i, j)
                } else {
                    0.0
                }
            }
            (Pos::Upper(i), Pos::Upper(j)) => {
                if j == i || model.rate(j) >= 0.0 {
                    tf * model.t_entry(i, j)
                } else {
                    0.0
                }
            }
            (Pos::Lower(_), Pos::Upper(_)) | (Pos::Upper(_), Pos::Lower(_)) => 0.0,
            (Pos::Lower(i), Pos::Interior(j, k, q)) => {
                if k == 0 && model.rate(j) > 0.0 && j != i {
                    model.t_entry(i, j) * self.flux.lower.outflow[q]
                } else {
                    0.0
                }
            }
            (Pos::Upper(i), Pos::Interior(j, k, q)) => {
                if k == last && model.rate(j) < 0.0 && j != i {
                    model.t_entry(i, j) * self.flux.upper.outflow[q]
                } else {
                    0.0
                }
            }
            (Pos::Interior(i, k, p0), Pos::Lower(j)) => {
                if model.rate(i) < 0.0 && k == 0 {
                    let w = -model.rate(i) / mesh.cell_width(0)? * self.flux.lower.inflow[p0];
                    match model.reflection() {
                        None => {
                            if j == i {
                                w
                            } else {
                                0.0
                            }
                        }
                        Some(refl) => {
                            if model.rate(j) <= 0.0 {
                                w * refl.p_lwr[i][j]
                            } else {
                                0.0
                            }
                        }
                    }
                } else {
                    0.0
                }
            }
            (Pos::Interior(i, k, p0), Pos::Upper(j)) => {
                if model.rate(i) > 0.0 && k == last {
                    let w = model.rate(i) / mesh.cell_width(last)? * self.flux.upper.inflow[p0];
                    match model.reflection() {
                        None => {
                            if j == i {
                                w
                            } else {
                                0.0
                            }
                        }
                        Some(refl) => {
                            if model.rate(j) >= 0.0 {
                                w * refl.p_upr[i][j]
                            } else {
                                0.0
                            }
                        }
                    }
                } else {
                    0.0
                }
            }
            (Pos::Interior(i, k, p0), Pos::Interior(j, l, q)) => {
                let mut v = 0.0;
                let ci = model.rate(i);
                if i == j {
                    if k == l {
                        if ci > 0.0 {
                            v += ci / mesh.cell_width(k)? * self.blocks.b2[p0][q];
                        } else if ci < 0.0 {
                            v += -ci / mesh.cell_width(k)? * self.blocks.b3[p0][q];
                        }
                        if p0 == q {
                            v += tf * model.t_entry(i, i);
                        }
                    } else if ci > 0.0 && l == k + 1 {
                        v += ci / mesh.cell_width(k)? * self.blocks.b4[p0][q];
                    } else if ci < 0.0 && l + 1 == k {
                        v += -ci / mesh.cell_width(k)? * self.blocks.b1[p0][q];
                    }
                } else if k == l {
                    if model.membership(i) == model.membership(j) || self.d_identity {
                        if p0 == q {
                            v += tf * model.t_entry(i, j);
                        }
                    } else {
                        v += model.t_entry(i, j) * self.blocks.d[p0][q];
                    }
                }
                if let Some(refl) = model.reflection() {
                    if ci < 0.0 && k == 0 && l == 0 && model.rate(j) > 0.0 {
                        v += -ci / mesh.cell_width(0)?
                            * self.flux.lower.inflow[p0]
                            * refl.p_lwr[i][j]
                            * self.lwr_placement[q];
                    }
                    if ci > 0.0 && k == last && l == last && model.rate(j) < 0.0 {
                        v += ci / mesh.cell_width(last)?
                            * self.flux.upper.inflow[p0]
                            * refl.p_upr[i][j]
                            * self.upr_placement[q];
                    }
                }
                v
            }
        };
        Ok(value)
    }
}

/// Rescale a vector to unit sum; all-zero (or zero-sum) vectors stay zero.
fn normalise(v: &[f64]) -> Vec<f64> {
    let sum: f64 = v.iter().sum();
    if sum.abs() < f64::EPSILON {
        vec![0.0; v.len()]
    } else {
        v.iter().map(|&x| x / sum).collect()
    }
}
