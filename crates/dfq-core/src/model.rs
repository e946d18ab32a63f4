//! Fluid-queue model: phases, rates, and the modulating generator.
//!
//! A fluid queue is a two-dimensional Markov process `(φ(t), X(t))` where the
//! phase `φ` evolves on a finite set according to a continuous-time Markov
//! chain with generator `T`, and the level `X ≥ 0` drifts deterministically at
//! the phase-dependent rate `c_i`:
//!
//! ```text
//! dX/dt = c_{φ(t)}      (reflected at the lower, and optionally upper, barrier)
//! ```
//!
//! Each phase carries an orientation ([`Membership`]) used by the
//! matrix-exponential discretisation when the drift direction flips, and two
//! boundary flags stating whether the phase holds a point mass at the lower
//! and/or upper barrier. The necessary memberships are forced by the drift
//! sign; supersets are allowed (a model may declare every phase a member of
//! both boundaries).

use crate::error::{DfqError, DfqResult};
use serde::{Deserialize, Serialize};

/// Tolerance for structural checks on generator and reflection rows.
const ROW_SUM_TOL: f64 = 1e-9;

/// Drift orientation of a phase.
///
/// Phases with negative drift are `Neg`, positive drift `Pos`. Zero-drift
/// phases may take either orientation; the choice only matters for schemes
/// whose within-cell representation is direction-dependent (FRAP).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Membership {
    /// Level decreases in this phase
    Neg,
    /// Level increases in this phase
    Pos,
}

/// A single phase of the modulating chain.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Phase {
    /// Drift rate `c_i` of the fluid level while in this phase
    pub rate: f64,
    /// Drift orientation (forced by the sign of `rate` when non-zero)
    pub membership: Membership,
    /// Does this phase hold a point mass at the lower barrier?
    pub lwr_member: bool,
    /// Does this phase hold a point mass at the upper barrier?
    pub upr_member: bool,
}

impl Phase {
    /// Phase with the default memberships implied by its drift sign:
    /// `c < 0` → lower member, `c > 0` → upper member, `c = 0` → both.
    pub fn from_rate(rate: f64) -> Self {
        let membership = if rate > 0.0 {
            Membership::Pos
        } else {
            Membership::Neg
        };
        Phase {
            rate,
            membership,
            lwr_member: rate <= 0.0,
            upr_member: rate >= 0.0,
        }
    }
}

/// Reflection matrices for the bounded variant.
///
/// `p_lwr[i][j]` is the probability that level-zero mass arriving in phase `i`
/// (necessarily `c_i < 0`) restarts in phase `j`; rows sum to one. `p_upr` is
/// the mirror at the upper barrier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reflection {
    pub p_lwr: Vec<Vec<f64>>,
    pub p_upr: Vec<Vec<f64>>,
}

/// The fluid-queue model: phases plus the modulating generator `T`.
///
/// Immutable after construction. The constructor validates the generator
/// structure (rows sum to zero, off-diagonals non-negative) and the membership
/// invariants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FluidQueueModel {
    phases: Vec<Phase>,
    t: Vec<Vec<f64>>,
    reflection: Option<Reflection>,
}

impl FluidQueueModel {
    /// Build an unbounded model from rates and generator, with the default
    /// memberships implied by the drift signs.
    pub fn new(rates: &[f64], t: Vec<Vec<f64>>) -> DfqResult<Self> {
        let phases = rates.iter().map(|&c| Phase::from_rate(c)).collect();
        Self::from_phases(phases, t, None)
    }

    /// Build a bounded model: same structure plus reflection matrices applied
    /// when mass hits a barrier.
    pub fn bounded(
        rates: &[f64],
        t: Vec<Vec<f64>>,
        p_lwr: Vec<Vec<f64>>,
        p_upr: Vec<Vec<f64>>,
    ) -> DfqResult<Self> {
        let phases = rates.iter().map(|&c| Phase::from_rate(c)).collect();
        Self::from_phases(phases, t, Some(Reflection { p_lwr, p_upr }))
    }

    /// Build a model from explicit phases (custom memberships allowed).
    pub fn from_phases(
        phases: Vec<Phase>,
        t: Vec<Vec<f64>>,
        reflection: Option<Reflection>,
    ) -> DfqResult<Self> {
        let n = phases.len();
        if n == 0 {
            return Err(DfqError::Domain("model must have at least one phase".into()));
        }
        if t.len() != n || t.iter().any(|row| row.len() != n) {
            return Err(DfqError::ShapeMismatch {
                expected: format!("{n}x{n} generator"),
                found: format!("{}x{}", t.len(), t.first().map_or(0, |r| r.len())),
            });
        }

        for (i, row) in t.iter().enumerate() {
            let sum: f64 = row.iter().sum();
            if sum.abs() > ROW_SUM_TOL {
                return Err(DfqError::Domain(format!(
                    "generator row {i} sums to {sum:e}, expected 0"
                )));
            }
            for (j, &v) in row.iter().enumerate() {
                if i != j && v < 0.0 {
                    return Err(DfqError::Domain(format!(
                        "generator off-diagonal T[{i}][{j}] = {v} is negative"
                    )));
                }
            }
        }

        for (i, ph) in phases.iter().enumerate() {
            if ph.rate < 0.0 && ph.membership != Membership::Neg {
                return Err(DfqError::Domain(format!(
                    "phase {i} has rate {} but positive orientation",
                    ph.rate
                )));
            }
            if ph.rate > 0.0 && ph.membership != Membership::Pos {
                return Err(DfqError::Domain(format!(
                    "phase {i} has rate {} but negative orientation",
                    ph.rate
                )));
            }
            if ph.rate < 0.0 && !ph.lwr_member {
                return Err(DfqError::Domain(format!(
                    "phase {i} has negative drift but no lower-boundary membership"
                )));
            }
            if ph.rate > 0.0 && !ph.upr_member {
                return Err(DfqError::Domain(format!(
                    "phase {i} has positive drift but no upper-boundary membership"
                )));
            }
            if ph.rate == 0.0 && !(ph.lwr_member && ph.upr_member) {
                return Err(DfqError::Domain(format!(
                    "zero-drift phase {i} must be a member of both boundaries"
                )));
            }
        }

        if let Some(refl) = &reflection {
            Self::check_stochastic(&refl.p_lwr, n, "P_lwr")?;
            Self::check_stochastic(&refl.p_upr, n, "P_upr")?;
        }

        Ok(FluidQueueModel {
            phases,
            t,
            reflection,
        })
    }

    fn check_stochastic(p: &[Vec<f64>], n: usize, name: &str) -> DfqResult<()> {
        if p.len() != n || p.iter().any(|row| row.len() != n) {
            return Err(DfqError::ShapeMismatch {
                expected: format!("{n}x{n} {name}"),
                found: format!("{}x{}", p.len(), p.first().map_or(0, |r| r.len())),
            });
        }
        for (i, row) in p.iter().enumerate() {
            if row.iter().any(|&v| v < 0.0) {
                return Err(DfqError::Domain(format!("{name} row {i} has a negative entry")));
            }
            let sum: f64 = row.iter().sum();
            if (sum - 1.0).abs() > ROW_SUM_TOL {
                return Err(DfqError::Domain(format!(
                    "{name} row {i} sums to {sum}, expected 1"
                )));
            }
        }
        Ok(())
    }

    /// Number of phases
    pub fn n_phases(&self) -> usize {
        self.phases.len()
    }

    /// Drift rate `c_i`
    pub fn rate(&self, i: usize) -> f64 {
        self.phases[i].rate
    }

    /// All drift rates, in phase order
    pub fn rates(&self) -> Vec<f64> {
        self.phases.iter().map(|p| p.rate).collect()
    }

    /// Generator entry `T[i][j]`
    pub fn t_entry(&self, i: usize, j: usize) -> f64 {
        self.t[i][j]
    }

    /// The modulating generator `T`
    pub fn generator(&self) -> &[Vec<f64>] {
        &self.t
    }

    /// Orientation of phase `i`
    pub fn membership(&self, i: usize) -> Membership {
        self.phases[i].membership
    }

    /// Does phase `i` hold a point mass at the lower barrier?
    pub fn lwr_member(&self, i: usize) -> bool {
        self.phases[i].lwr_member
    }

    /// Does phase `i` hold a point mass at the upper barrier?
    pub fn upr_member(&self, i: usize) -> bool {
        self.phases[i].upr_member
    }

    /// Phase record
    pub fn phase(&self, i: usize) -> &Phase {
        &self.phases[i]
    }

    /// Reflection matrices of the bounded variant, if any
    pub fn reflection(&self) -> Option<&Reflection> {
        self.reflection.as_ref()
    }

    /// Is this the bounded variant?
    pub fn is_bounded(&self) -> bool {
        self.reflection.is_some()
    }
}
