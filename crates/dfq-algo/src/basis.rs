//! Polynomial basis and block recipes for the DG scheme.
//!
//! The discontinuous Galerkin discretisation represents the within-cell
//! density on a Lagrange nodal basis over the reference cell `[0, 1]` and
//! couples neighbouring cells with upwind fluxes: mass moves *with* the
//! drift, so a positive-drift phase feeds its upper neighbour through the
//! right cell edge and a negative-drift phase feeds its lower neighbour
//! through the left edge.
//!
//! Coefficients are stored as per-basis cell masses (the nodal density
//! coefficients rescaled by the basis integrals). In that normalisation the
//! conservation identity is literal: every interior row of the assembled
//! generator sums to zero, and the flux vectors are exactly the row sums the
//! boundary absorbs,
//!
//! ```text
//! (B2 + B4)·1 = 0        (B3 + B1)·1 = 0
//! B4·1 = flux.upper.in   B1·1 = flux.lower.in
//! Σ_q flux.out[q] = 1
//! ```
//!
//! Interpolation nodes are Chebyshev–Lobatto points (closed form, endpoint
//! nodes included); integrals use Gauss–Legendre quadrature of matching
//! order, with nodes located by Newton iteration on the Legendre recurrence.

use crate::generator::{Blocks, BoundaryFlux, FluxPair};
use crate::linalg;
use dfq_core::{DfqError, DfqResult};

/// Lagrange nodal basis of a single reference cell.
#[derive(Debug, Clone)]
pub struct DgBasis {
    degree: usize,
    /// Interpolation nodes on [0, 1]
    nodes: Vec<f64>,
    /// Mass matrix `M[m][l] = ∫ φ_m φ_l`
    mass: Vec<Vec<f64>>,
    mass_inv: Vec<Vec<f64>>,
    /// Stiffness matrix `G[m][l] = ∫ φ_m' φ_l`
    stiffness: Vec<Vec<f64>>,
    /// Basis values at the left cell edge, `φ_m(0)`
    phi_left: Vec<f64>,
    /// Basis values at the right cell edge, `φ_m(1)`
    phi_right: Vec<f64>,
    /// Basis integrals `w[m] = ∫ φ_m`
    weights: Vec<f64>,
}

impl DgBasis {
    pub fn new(degree: usize) -> DfqResult<Self> {
        let n = degree + 1;
        let nodes = chebyshev_lobatto(n);
        let (qx, qw) = gauss_legendre(n)?;

        // Tabulate basis values and derivatives at the quadrature nodes
        let mut phi = vec![vec![0.0; n]; qx.len()];
        let mut dphi = vec![vec![0.0; n]; qx.len()];
        for (g, &x) in qx.iter().enumerate() {
            for m in 0..n {
                phi[g][m] = lagrange_eval(&nodes, m, x);
                dphi[g][m] = lagrange_deriv(&nodes, m, x);
            }
        }

        let mut mass = vec![vec![0.0; n]; n];
        let mut stiffness = vec![vec![0.0; n]; n];
        let mut weights = vec![0.0; n];
        for g in 0..qx.len() {
            for m in 0..n {
                weights[m] += qw[g] * phi[g][m];
                for l in 0..n {
                    mass[m][l] += qw[g] * phi[g][m] * phi[g][l];
                    stiffness[m][l] += qw[g] * dphi[g][m] * phi[g][l];
                }
            }
        }

        let mass_inv = linalg::invert(&mass)?;
        let phi_left = (0..n).map(|m| lagrange_eval(&nodes, m, 0.0)).collect();
        let phi_right = (0..n).map(|m| lagrange_eval(&nodes, m, 1.0)).collect();

        Ok(DgBasis {
            degree,
            nodes,
            mass,
            mass_inv,
            stiffness,
            phi_left,
            phi_right,
            weights,
        })
    }

    /// Polynomial degree
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Number of basis functions, `degree + 1`
    pub fn n_bases(&self) -> usize {
        self.nodes.len()
    }

    /// Interpolation nodes on the reference cell
    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    /// Mass matrix
    pub fn mass(&self) -> &[Vec<f64>] {
        &self.mass
    }

    /// Basis integrals `∫ φ_m`
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Assemble the generator block recipes and boundary flux vectors.
    pub fn recipes(&self) -> DfqResult<(Blocks, BoundaryFlux)> {
        let n = self.n_bases();
        let g_t = linalg::transpose(&self.stiffness);
        let e00 = linalg::outer(&self.phi_left, &self.phi_left);
        let e11 = linalg::outer(&self.phi_right, &self.phi_right);

        // Diagonal recipes: volume term minus the outgoing edge flux
        let mut core2 = vec![vec![0.0; n]; n];
        let mut core3 = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in 0..n {
                core2[i][j] = g_t[i][j] - e11[i][j];
                core3[i][j] = -g_t[i][j] - e00[i][j];
            }
        }
        // Off-diagonal recipes: mass leaving through an edge re-expanded in
        // the neighbour's basis
        let core4 = linalg::outer(&self.phi_right, &self.phi_left);
        let core1 = linalg::outer(&self.phi_left, &self.phi_right);

        let to_block = |core: &[Vec<f64>]| -> DfqResult<Vec<Vec<f64>>> {
            linalg::conjugate_by_diag(&linalg::mat_mul(core, &self.mass_inv), &self.weights)
        };

        let blocks = Blocks::new(
            to_block(&core1)?,
            to_block(&core2)?,
            to_block(&core3)?,
            to_block(&core4)?,
            linalg::identity(n),
        )?;

        let mass_inv_left = mat_vec(&self.mass_inv, &self.phi_left);
        let mass_inv_right = mat_vec(&self.mass_inv, &self.phi_right);
        let flux = BoundaryFlux::new(
            FluxPair {
                inflow: div_elem(&self.phi_left, &self.weights)?,
                outflow: mul_elem(&self.weights, &mass_inv_left),
            },
            FluxPair {
                inflow: div_elem(&self.phi_right, &self.weights)?,
                outflow: mul_elem(&self.weights, &mass_inv_right),
            },
            n,
        )?;

        Ok((blocks, flux))
    }
}

fn mat_vec(a: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    a.iter()
        .map(|row| row.iter().zip(v).map(|(&r, &x)| r * x).sum())
        .collect()
}

fn mul_elem(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(&x, &y)| x * y).collect()
}

fn div_elem(a: &[f64], b: &[f64]) -> DfqResult<Vec<f64>> {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            if y == 0.0 {
                Err(DfqError::Domain("zero basis weight".into()))
            } else {
                Ok(x / y)
            }
        })
        .collect()
}

/// Chebyshev–Lobatto points on [0, 1], ascending.
fn chebyshev_lobatto(n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![0.5];
    }
    (0..n)
        .map(|j| 0.5 * (1.0 - (std::f64::consts::PI * j as f64 / (n - 1) as f64).cos()))
        .collect()
}

/// Value of the `m`-th Lagrange basis polynomial at `x`.
fn lagrange_eval(nodes: &[f64], m: usize, x: f64) -> f64 {
    let mut v = 1.0;
    for (l, &xl) in nodes.iter().enumerate() {
        if l != m {
            v *= (x - xl) / (nodes[m] - xl);
        }
    }
    v
}

/// Derivative of the `m`-th Lagrange basis polynomial at `x`.
fn lagrange_deriv(nodes: &[f64], m: usize, x: f64) -> f64 {
    let n = nodes.len();
    let mut acc = 0.0;
    for r in 0..n {
        if r == m {
            continue;
        }
        let mut term = 1.0 / (nodes[m] - nodes[r]);
        for (l, &xl) in nodes.iter().enumerate() {
            if l != m && l != r {
                term *= (x - xl) / (nodes[m] - xl);
            }
        }
        acc += term;
    }
    acc
}

/// Gauss–Legendre nodes and weights on [0, 1].
///
/// Newton iteration on the three-term Legendre recurrence; `n` points
/// integrate polynomials up to degree `2n - 1` exactly.
fn gauss_legendre(n: usize) -> DfqResult<(Vec<f64>, Vec<f64>)> {
    if n == 0 {
        return Err(DfqError::Domain("quadrature order must be positive".into()));
    }
    let mut xs = vec![0.0; n];
    let mut ws = vec![0.0; n];
    let m = n.div_ceil(2);
    for i in 0..m {
        // Initial guess: Chebyshev approximation to the i-th largest root
        let mut z = (std::f64::consts::PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let mut dp = 0.0;
        for _ in 0..100 {
            let mut p0 = 1.0;
            let mut p1 = 0.0;
            for j in 0..n {
                let p2 = p1;
                p1 = p0;
                p0 = ((2 * j + 1) as f64 * z * p1 - j as f64 * p2) / (j + 1) as f64;
            }
            // p0 = P_n(z), p1 = P_{n-1}(z)
            dp = n as f64 * (z * p0 - p1) / (z * z - 1.0);
            let dz = p0 / dp;
            z -= dz;
            if dz.abs() < 1e-15 {
                break;
            }
        }
        // Map the symmetric pair of roots from [-1, 1] to [0, 1]
        xs[i] = 0.5 * (1.0 - z);
        xs[n - 1 - i] = 0.5 * (1.0 + z);
        let w = 1.0 / ((1.0 - z * z) * dp * dp);
        ws[i] = w;
        ws[n - 1 - i] = w;
    }
    Ok((xs, ws))
}
