//! Structured multiplication kernels for the lazy generator.
//!
//! Both kernels traverse the same seven additive contributions of the
//! operator; they differ only in the axis along which the blocks act:
//!
//! 1. boundary → boundary (restrictions of `T` to the member phases)
//! 2. interior → lower boundary (first-cell flux in, `P_lwr`-routed when bounded)
//! 3. lower boundary → interior (flux out into upward phases' first cells)
//! 4. interior → upper boundary (mirror of 2 at cell `K-1`)
//! 5. upper boundary → interior (mirror of 3)
//! 6. same-phase block tridiagonal (upwind: `B2`/`B4` with the drift,
//!    `B3`/`B1` against it, `T_ii` on the diagonal; zero-drift phases carry
//!    only `T_ii`)
//! 7. cross-phase same-cell jumps (`T_ij` identity-coupled, or through `D`
//!    when the drift orientation flips)
//!
//! Cost is `O(N K p²)` per row of the left factor. Accumulation into the
//! target is commutative, so callers may partition the outer axis freely;
//! with the `parallel` feature the dense left-multiply does so with rayon.

use super::lazy::LazyGenerator;
use dfq_core::{DfqError, DfqResult};
use sprs::{CsMat, TriMat};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

impl LazyGenerator<'_> {
    /// Interior offset of `(phase, cell, basis 0)`; layout is phase-major.
    #[inline]
    fn ibase(&self, i: usize, k: usize) -> usize {
        let (kk, p) = (self.dq.n_cells(), self.dq.n_bases());
        self.dq.n_lwr() + i * kk * p + k * p
    }

    #[inline]
    fn upr_offset(&self) -> usize {
        self.dq.n_lwr() + self.dq.interior_len()
    }

    /// Accumulate `v += u · B` for one row `u`.
    pub(crate) fn apply_left_row(&self, u: &[f64], v: &mut [f64]) {
        let dq = self.dq;
        let model = dq.model();
        let widths = dq.mesh().widths();
        let (n, kk, p) = (dq.n_phases(), dq.n_cells(), dq.n_bases());
        let last = kk - 1;
        let tf = self.t_factor;
        let upr0 = self.upr_offset();

        // 1. boundary-to-boundary
        for (a_slot, &i) in dq.lwr_phases().iter().enumerate() {
            let ui = u[a_slot];
            if ui == 0.0 {
                continue;
            }
            for (b_slot, &j) in dq.lwr_phases().iter().enumerate() {
                if j == i || model.rate(j) <= 0.0 {
                    v[b_slot] += ui * tf * model.t_entry(i, j);
                }
            }
        }
        for (a_slot, &i) in dq.upr_phases().iter().enumerate() {
            let ui = u[upr0 + a_slot];
            if ui == 0.0 {
                continue;
            }
            for (b_slot, &j) in dq.upr_phases().iter().enumerate() {
                if j == i || model.rate(j) >= 0.0 {
                    v[upr0 + b_slot] += ui * tf * model.t_entry(i, j);
                }
            }
        }

        // 3. lower boundary -> interior (flux out)
        for (a_slot, &i) in dq.lwr_phases().iter().enumerate() {
            let ui = u[a_slot];
            if ui == 0.0 {
                continue;
            }
            for j in 0..n {
                if model.rate(j) <= 0.0 || j == i {
                    continue;
                }
                let tij = model.t_entry(i, j);
                if tij == 0.0 {
                    continue;
                }
                let base = self.ibase(j, 0);
                for q in 0..p {
                    v[base + q] += ui * tij * self.flux.lower.outflow[q];
                }
            }
        }
        // 5. upper boundary -> interior
        for (a_slot, &i) in dq.upr_phases().iter().enumerate() {
            let ui = u[upr0 + a_slot];
            if ui == 0.0 {
                continue;
            }
            for j in 0..n {
                if model.rate(j) >= 0.0 || j == i {
                    continue;
                }
                let tij = model.t_entry(i, j);
                if tij == 0.0 {
                    continue;
                }
                let base = self.ibase(j, last);
                for q in 0..p {
                    v[base + q] += ui * tij * self.flux.upper.outflow[q];
                }
            }
        }

        // 2. interior -> lower boundary, and the bounded re-injection
        for i in 0..n {
            let ci = model.rate(i);
            if ci >= 0.0 {
                continue;
            }
            let base = self.ibase(i, 0);
            let mut s = 0.0;
            for q in 0..p {
                s += u[base + q] * self.flux.lower.inflow[q];
            }
            s *= -ci / widths[0];
            if s == 0.0 {
                continue;
            }
            match model.reflection() {
                None => {
                    // membership is mandatory for downward phases
                    if let Some(slot) = dq.lwr_slot_of(i) {
                        v[slot] += s;
                    }
                }
                Some(refl) => {
                    for j in 0..n {
                        let pij = refl.p_lwr[i][j];
                        if pij == 0.0 {
                            continue;
                        }
                        if model.rate(j) <= 0.0 {
                            if let Some(slot) = dq.lwr_slot_of(j) {
                                v[slot] += s * pij;
                            }
                        } else {
                            let jbase = self.ibase(j, 0);
                            for q in 0..p {
                                v[jbase + q] += s * pij * self.lwr_placement[q];
                            }
                        }
                    }
                }
            }
        }
        // 4. interior -> upper boundary, and the bounded re-injection
        for i in 0..n {
            let ci = model.rate(i);
            if ci <= 0.0 {
                continue;
            }
            let base = self.ibase(i, last);
            let mut s = 0.0;
            for q in 0..p {
                s += u[base + q] * self.flux.upper.inflow[q];
            }
            s *= ci / widths[last];
            if s == 0.0 {
                continue;
            }
            match model.reflection() {
                None => {
                    if let Some(slot) = dq.upr_slot_of(i) {
                        v[upr0 + slot] += s;
                    }
                }
                Some(refl) => {
                    for j in 0..n {
                        let pij = refl.p_upr[i][j];
                        if pij == 0.0 {
                            continue;
                        }
                        if model.rate(j) >= 0.0 {
                            if let Some(slot) = dq.upr_slot_of(j) {
                                v[upr0 + slot] += s * pij;
                            }
                        } else {
                            let jbase = self.ibase(j, last);
                            for q in 0..p {
                                v[jbase + q] += s * pij * self.upr_placement[q];
                            }
                        }
                    }
                }
            }
        }

        // 6. same-phase block tridiagonal
        for i in 0..n {
            let ci = model.rate(i);
            let tii = tf * model.t_entry(i, i);
            if let Some(cache) = &self.uniform_diag {
                let block = &cache[i];
                for k in 0..kk {
                    let base = self.ibase(i, k);
                    for p0 in 0..p {
                        let up0 = u[base + p0];
                        if up0 == 0.0 {
                            continue;
                        }
                        for q in 0..p {
                            v[base + q] += up0 * block[p0][q];
                        }
                    }
                }
            } else if ci == 0.0 {
                for k in 0..kk {
                    let base = self.ibase(i, k);
                    for q in 0..p {
                        v[base + q] += tii * u[base + q];
                    }
                }
            } else {
                let recipe = if ci > 0.0 { &self.blocks.b2 } else { &self.blocks.b3 };
                for k in 0..kk {
                    let base = self.ibase(i, k);
                    let scale = ci.abs() / widths[k];
                    for p0 in 0..p {
                        let up0 = u[base + p0];
                        if up0 == 0.0 {
                            continue;
                        }
                        for q in 0..p {
                            v[base + q] += up0 * scale * recipe[p0][q];
                        }
                        v[base + p0] += tii * up0;
                    }
                }
            }
            // off-diagonal hop, always width-scaled by the source cell
            if ci > 0.0 {
                for k in 0..last {
                    let base = self.ibase(i, k);
                    let nbase = self.ibase(i, k + 1);
                    let scale = ci / widths[k];
                    for p0 in 0..p {
                        let up0 = u[base + p0];
                        if up0 == 0.0 {
                            continue;
                        }
                        for q in 0..p {
                            v[nbase + q] += up0 * scale * self.blocks.b4[p0][q];
                        }
                    }
                }
            } else if ci < 0.0 {
                for k in 1..kk {
                    let base = self.ibase(i, k);
                    let nbase = self.ibase(i, k - 1);
                    let scale = -ci / widths[k];
                    for p0 in 0..p {
                        let up0 = u[base + p0];
                        if up0 == 0.0 {
                            continue;
                        }
                        for q in 0..p {
                            v[nbase + q] += up0 * scale * self.blocks.b1[p0][q];
                        }
                    }
                }
            }
        }

        // 7. cross-phase same-cell jumps
        for i in 0..n {
            for j in 0..n {
                if j == i {
                    continue;
                }
                let tij = model.t_entry(i, j);
                if tij == 0.0 {
                    continue;
                }
                if model.membership(i) == model.membership(j) || self.d_identity {
                    let c = tf * tij;
                    for k in 0..kk {
                        let ibase = self.ibase(i, k);
                        let jbase = self.ibase(j, k);
                        for q in 0..p {
                            v[jbase + q] += c * u[ibase + q];
                        }
                    }
                } else {
                    for k in 0..kk {
                        let ibase = self.ibase(i, k);
                        let jbase = self.ibase(j, k);
                        for p0 in 0..p {
                            let up0 = u[ibase + p0];
                            if up0 == 0.0 {
                                continue;
                            }
                            for q in 0..p {
                                v[jbase + q] += tij * up0 * self.blocks.d[p0][q];
                            }
                        }
                    }
                }
            }
        }
    }

    /// Accumulate `v += B · u` for one column `u`.
    pub(crate) fn apply_right_col(&self, u: &[f64], v: &mut [f64]) {
        let dq = self.dq;
        let model = dq.model();
        let widths = dq.mesh().widths();
        let (n, kk, p) = (dq.n_phases(), dq.n_cells(), dq.n_bases());
        let last = kk - 1;
        let tf = self.t_factor;
        let upr0 = self.upr_offset();

        // 1. boundary-to-boundary
        for (a_slot, &i) in dq.lwr_phases().iter().enumerate() {
            let mut acc = 0.0;
            for (b_slot, &j) in dq.lwr_phases().iter().enumerate() {
                if j == i || model.rate(j) <= 0.0 {
                    acc += tf * model.t_entry(i, j) * u[b_slot];
                }
            }
            v[a_slot] += acc;
        }
        for (a_slot, &i) in dq.upr_phases().iter().enumerate() {
            let mut acc = 0.0;
            for (b_slot, &j) in dq.upr_phases().iter().enumerate() {
                if j == i || model.rate(j) >= 0.0 {
                    acc += tf * model.t_entry(i, j) * u[upr0 + b_slot];
                }
            }
            v[upr0 + a_slot] += acc;
        }

        // 3. lower boundary -> interior
        for (a_slot, &i) in dq.lwr_phases().iter().enumerate() {
            let mut acc = 0.0;
            for j in 0..n {
                if model.rate(j) <= 0.0 || j == i {
                    continue;
                }
                let tij = model.t_entry(i, j);
                if tij == 0.0 {
                    continue;
                }
                let base = self.ibase(j, 0);
                let mut dot = 0.0;
                for q in 0..p {
                    dot += self.flux.lower.outflow[q] * u[base + q];
                }
                acc += tij * dot;
            }
            v[a_slot] += acc;
        }
        // 5. upper boundary -> interior
        for (a_slot, &i) in dq.upr_phases().iter().enumerate() {
            let mut acc = 0.0;
            for j in 0..n {
                if model.rate(j) >= 0.0 || j == i {
                    continue;
                }
                let tij = model.t_entry(i, j);
                if tij == 0.0 {
                    continue;
                }
                let base = self.ibase(j, last);
                let mut dot = 0.0;
                for q in 0..p {
                    dot += self.flux.upper.outflow[q] * u[base + q];
                }
                acc += tij * dot;
            }
            v[upr0 + a_slot] += acc;
        }

        // 2. interior -> lower boundary, and the bounded re-injection
        for i in 0..n {
            let ci = model.rate(i);
            if ci >= 0.0 {
                continue;
            }
            // mass collected by the target states, per unit of first-cell flux
            let coeff = match model.reflection() {
                None => dq.lwr_slot_of(i).map_or(0.0, |slot| u[slot]),
                Some(refl) => {
                    let mut acc = 0.0;
                    for j in 0..n {
                        let pij = refl.p_lwr[i][j];
                        if pij == 0.0 {
                            continue;
                        }
                        if model.rate(j) <= 0.0 {
                            if let Some(slot) = dq.lwr_slot_of(j) {
                                acc += pij * u[slot];
                            }
                        } else {
                            let jbase = self.ibase(j, 0);
                            let mut dot = 0.0;
                            for q in 0..p {
                                dot += self.lwr_placement[q] * u[jbase + q];
                            }
                            acc += pij * dot;
                        }
                    }
                    acc
                }
            };
            if coeff == 0.0 {
                continue;
            }
            let base = self.ibase(i, 0);
            let scale = -ci / widths[0];
            for p0 in 0..p {
                v[base + p0] += scale * self.flux.lower.inflow[p0] * coeff;
            }
        }
        // 4. interior -> upper boundary, and the bounded re-injection
        for i in 0..n {
            let ci = model.rate(i);
            if ci <= 0.0 {
                continue;
            }
            let coeff = match model.reflection() {
                None => dq.upr_slot_of(i).map_or(0.0, |slot| u[upr0 + slot]),
                Some(refl) => {
                    let mut acc = 0.0;
                    for j in 0..n {
                        let pij = refl.p_upr[i][j];
                        if pij == 0.0 {
                            continue;
                        }
                        if model.rate(j) >= 0.0 {
                            if let Some(slot) = dq.upr_slot_of(j) {
                                acc += pij * u[upr0 + slot];
                            }
                        } else {
                            let jbase = self.ibase(j, last);
                            let mut dot = 0.0;
                            for q in 0..p {
                                dot += self.upr_placement[q] * u[jbase + q];
                            }
                            acc += pij * dot;
                        }
                    }
                    acc
                }
            };
            if coeff == 0.0 {
                continue;
            }
            let base = self.ibase(i, last);
            let scale = ci / widths[last];
            for p0 in 0..p {
                v[base + p0] += scale * self.flux.upper.inflow[p0] * coeff;
            }
        }

        // 6. same-phase block tridiagonal
        for i in 0..n {
            let ci = model.rate(i);
            let tii = tf * model.t_entry(i, i);
            if let Some(cache) = &self.uniform_diag {
                let block = &cache[i];
                for k in 0..kk {
                    let base = self.ibase(i, k);
                    for p0 in 0..p {
                        let mut acc = 0.0;
                        for q in 0..p {
                            acc += block[p0][q] * u[base + q];
                        }
                        v[base + p0] += acc;
                    }
                }
            } else if ci == 0.0 {
                for k in 0..kk {
                    let base = self.ibase(i, k);
                    for q in 0..p {
                        v[base + q] += tii * u[base + q];
                    }
                }
            } else {
                let recipe = if ci > 0.0 { &self.blocks.b2 } else { &self.blocks.b3 };
                for k in 0..kk {
                    let base = self.ibase(i, k);
                    let scale = ci.abs() / widths[k];
                    for p0 in 0..p {
                        let mut acc = tii * u[base + p0];
                        for q in 0..p {
                            acc += scale * recipe[p0][q] * u[base + q];
                        }
                        v[base + p0] += acc;
                    }
                }
            }
            // off-diagonal hop: row cell k, column cell k±1
            if ci > 0.0 {
                for k in 0..last {
                    let base = self.ibase(i, k);
                    let nbase = self.ibase(i, k + 1);
                    let scale = ci / widths[k];
                    for p0 in 0..p {
                        let mut acc = 0.0;
                        for q in 0..p {
                            acc += self.blocks.b4[p0][q] * u[nbase + q];
                        }
                        v[base + p0] += scale * acc;
                    }
                }
            } else if ci < 0.0 {
                for k in 1..kk {
                    let base = self.ibase(i, k);
                    let nbase = self.ibase(i, k - 1);
                    let scale = -ci / widths[k];
                    for p0 in 0..p {
                        let mut acc = 0.0;
                        for q in 0..p {
                            acc += self.blocks.b1[p0][q] * u[nbase + q];
                        }
                        v[base + p0] += scale * acc;
                    }
                }
            }
        }

        // 7. cross-phase same-cell jumps: row phase i receives from column
        // phase j along the entry B[(i,k),(j,k)]... the entry lives in row i
        // only when the jump is i -> j in the row-convention, so here we
        // accumulate the transposed action: v_i += T_ij (D u_j) uses the
        // entries of row (i, k), which couple to column (j, k) via T_ij.
        for i in 0..n {
            for j in 0..n {
                if j == i {
                    continue;
                }
                let tij = model.t_entry(i, j);
                if tij == 0.0 {
                    continue;
                }
                if model.membership(i) == model.membership(j) || self.d_identity {
                    let c = tf * tij;
                    for k in 0..kk {
                        let ibase = self.ibase(i, k);
                        let jbase = self.ibase(j, k);
                        for q in 0..p {
                            v[ibase + q] += c * u[jbase + q];
                        }
                    }
                } else {
                    for k in 0..kk {
                        let ibase = self.ibase(i, k);
                        let jbase = self.ibase(j, k);
                        for p0 in 0..p {
                            let mut acc = 0.0;
                            for q in 0..p {
                                acc += self.blocks.d[p0][q] * u[jbase + q];
                            }
                            v[ibase + p0] += tij * acc;
                        }
                    }
                }
            }
        }
    }

    /// Left-multiply a single row vector: `u · B`.
    pub fn apply_left(&self, u: &[f64]) -> DfqResult<Vec<f64>> {
        let m = self.dq.total_size();
        if u.len() != m {
            return Err(DfqError::ShapeMismatch {
                expected: format!("row vector of length {m}"),
                found: format!("length {}", u.len()),
            });
        }
        let mut v = vec![0.0; m];
        self.apply_left_row(u, &mut v);
        Ok(v)
    }

    /// Right-multiply a single column vector: `B · u`.
    pub fn apply_right(&self, u: &[f64]) -> DfqResult<Vec<f64>> {
        let m = self.dq.total_size();
        if u.len() != m {
            return Err(DfqError::ShapeMismatch {
                expected: format!("column vector of length {m}"),
                found: format!("length {}", u.len()),
            });
        }
        let mut v = vec![0.0; m];
        self.apply_right_col(u, &mut v);
        Ok(v)
    }

    /// Dense left-multiply: `u` is `m × M` (one `Vec` per row), result `m × M`.
    pub fn mul_left_dense(&self, u: &[Vec<f64>]) -> DfqResult<Vec<Vec<f64>>> {
        let m = self.dq.total_size();
        for (r, row) in u.iter().enumerate() {
            if row.len() != m {
                return Err(DfqError::ShapeMismatch {
                    expected: format!("rows of length {m}"),
                    found: format!("row {r} of length {}", row.len()),
                });
            }
        }
        #[cfg(feature = "parallel")]
        let rows = u.par_iter();
        #[cfg(not(feature = "parallel"))]
        let rows = u.iter();
        Ok(rows
            .map(|row| {
                let mut v = vec![0.0; m];
                self.apply_left_row(row, &mut v);
                v
            })
            .collect())
    }

    /// Dense right-multiply: `u` is `M × m` (one `Vec` per row), result `M × m`.
    pub fn mul_right_dense(&self, u: &[Vec<f64>]) -> DfqResult<Vec<Vec<f64>>> {
        let m = self.dq.total_size();
        if u.len() != m {
            return Err(DfqError::ShapeMismatch {
                expected: format!("{m} rows"),
                found: format!("{} rows", u.len()),
            });
        }
        let cols = u.first().map_or(0, |r| r.len());
        for (r, row) in u.iter().enumerate() {
            if row.len() != cols {
                return Err(DfqError::ShapeMismatch {
                    expected: format!("rows of length {cols}"),
                    found: format!("row {r} of length {}", row.len()),
                });
            }
        }
        let mut out = vec![vec![0.0; cols]; m];
        let mut ucol = vec![0.0; m];
        let mut vcol = vec![0.0; m];
        for c in 0..cols {
            for r in 0..m {
                ucol[r] = u[r][c];
            }
            vcol.iter_mut().for_each(|x| *x = 0.0);
            self.apply_right_col(&ucol, &mut vcol);
            for r in 0..m {
                out[r][c] = vcol[r];
            }
        }
        Ok(out)
    }

    /// Sparse left-multiply; output storage follows the input storage.
    pub fn mul_left_sparse(&self, u: &CsMat<f64>) -> DfqResult<CsMat<f64>> {
        let m = self.dq.total_size();
        if u.cols() != m {
            return Err(DfqError::ShapeMismatch {
                expected: format!("{m} columns"),
                found: format!("{} columns", u.cols()),
            });
        }
        let csr = u.to_csr();
        let mut tri = TriMat::new((u.rows(), m));
        let mut urow = vec![0.0; m];
        let mut vrow = vec![0.0; m];
        for (r, row) in csr.outer_iterator().enumerate() {
            if row.nnz() == 0 {
                continue;
            }
            urow.iter_mut().for_each(|x| *x = 0.0);
            for (c, &val) in row.iter() {
                urow[c] = val;
            }
            vrow.iter_mut().for_each(|x| *x = 0.0);
            self.apply_left_row(&urow, &mut vrow);
            for (c, &val) in vrow.iter().enumerate() {
                if val != 0.0 {
                    tri.add_triplet(r, c, val);
                }
            }
        }
        Ok(if u.is_csc() {
            tri.to_csc()
        } else {
            tri.to_csr()
        })
    }

    /// Sparse right-multiply; output storage follows the input storage.
    pub fn mul_right_sparse(&self, u: &CsMat<f64>) -> DfqResult<CsMat<f64>> {
        let m = self.dq.total_size();
        if u.rows() != m {
            return Err(DfqError::ShapeMismatch {
                expected: format!("{m} rows"),
                found: format!("{} rows", u.rows()),
            });
        }
        let csc = u.to_csc();
        let mut tri = TriMat::new((m, u.cols()));
        let mut ucol = vec![0.0; m];
        let mut vcol = vec![0.0; m];
        for (c, col) in csc.outer_iterator().enumerate() {
            if col.nnz() == 0 {
                continue;
            }
            ucol.iter_mut().for_each(|x| *x = 0.0);
            for (r, &val) in col.iter() {
                ucol[r] = val;
            }
            vcol.iter_mut().for_each(|x| *x = 0.0);
            self.apply_right_col(&ucol, &mut vcol);
            for (r, &val) in vcol.iter().enumerate() {
                if val != 0.0 {
                    tri.add_triplet(r, c, val);
                }
            }
        }
        Ok(if u.is_csr() {
            tri.to_csr()
        } else {
            tri.to_csc()
        })
    }
}
