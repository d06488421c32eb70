//! Weighted normal equations for log-intensity regression.
//!
//! Taking the log of a Gaussian turns it into a quadratic, so a peak shape can be
//! estimated by linear least squares over a polynomial basis:
//!
//! ```math
//! \log I = a + bx + cx^2 + dy + ey^2
//! ```
//!
//! [`WeightedLinearSystem`] accumulates the normal equations $`A\beta = B`$ one
//! observation at a time, where each observation contributes
//! $`A_{ij} \mathrel{+}= w^2\phi_i\phi_j`$ and $`B_i \mathrel{+}= w^2\phi_i\log I`$.
//!
//! The square system is then solved by a minimum-norm least squares solve, which
//! tolerates the rank deficient systems produced by sparse or degenerate regions.
//!
//! ## Linear Algebra Backends
//! The default backend is `nalgebra`'s SVD. Enabling one of the LAPACK features
//! (`openblas`, `netlib`, `intel-mkl`) switches to `ndarray-linalg`'s least squares.
use cfg_if::cfg_if;

#[cfg(feature = "ndarray-linalg")]
use ndarray::{Array1, Array2};
#[cfg(feature = "ndarray-linalg")]
use ndarray_linalg::LeastSquaresSvd;

/// The largest number of basis terms of any supported model
pub const MAX_TERMS: usize = 5;

/// The polynomial basis a log-intensity model is regressed against.
///
/// `x` is the centered m/z offset and `y` is the centered retention time offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Basis {
    /// $`\{1, x, x^2, y, y^2\}`$, solving for the center and width on both axes
    Full2D,
    /// $`\{1, x^2, y^2\}`$, the center is held fixed at the anchor
    Centered2D,
    /// $`\{1, x, x^2\}`$, a single axis
    Profile1D,
}

impl Basis {
    pub const fn len(&self) -> usize {
        match self {
            Basis::Full2D => 5,
            Basis::Centered2D => 3,
            Basis::Profile1D => 3,
        }
    }

    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Evaluate the basis terms at `(x, y)`. Entries past [`Basis::len`] are zero.
    #[inline]
    pub fn terms(&self, x: f64, y: f64) -> [f64; MAX_TERMS] {
        match self {
            Basis::Full2D => [1.0, x, x * x, y, y * y],
            Basis::Centered2D => [1.0, x * x, y * y, 0.0, 0.0],
            Basis::Profile1D => [1.0, x, x * x, 0.0, 0.0],
        }
    }
}

/// The weighted normal equations of a log-linear peak model
#[derive(Debug, Clone)]
pub struct WeightedLinearSystem {
    pub basis: Basis,
    /// The symmetric normal matrix, only the leading `basis.len()` square is used
    pub a: [[f64; MAX_TERMS]; MAX_TERMS],
    /// The right hand side, only the leading `basis.len()` entries are used
    pub b: [f64; MAX_TERMS],
    /// The number of observations accumulated
    pub n_points: usize,
}

impl WeightedLinearSystem {
    pub fn new(basis: Basis) -> Self {
        Self {
            basis,
            a: [[0.0; MAX_TERMS]; MAX_TERMS],
            b: [0.0; MAX_TERMS],
            n_points: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.basis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_points == 0
    }

    /// Accumulate one observation of `log_intensity` at offset `(x, y)` with weight `w`.
    ///
    /// The squared weight multiplies the observation's contribution.
    pub fn push(&mut self, x: f64, y: f64, w: f64, log_intensity: f64) {
        let n = self.basis.len();
        let phi = self.basis.terms(x, y);
        let w2 = w * w;
        for i in 0..n {
            let wphi = w2 * phi[i];
            for j in 0..n {
                self.a[i][j] += wphi * phi[j];
            }
            self.b[i] += wphi * log_intensity;
        }
        self.n_points += 1;
    }

    fn is_finite(&self) -> bool {
        let n = self.len();
        (0..n).all(|i| self.b[i].is_finite() && (0..n).all(|j| self.a[i][j].is_finite()))
    }

    /// The symmetric diagonal scaling $`D_{ii} = 1 / \sqrt{A_{ii}}`$ which gives the
    /// scaled system a unit diagonal. Terms with an empty diagonal are left unscaled.
    fn jacobi_scale(&self) -> [f64; MAX_TERMS] {
        let mut scale = [1.0; MAX_TERMS];
        for (i, s) in scale.iter_mut().enumerate().take(self.len()) {
            let d = self.a[i][i];
            if d > 0.0 {
                *s = 1.0 / d.sqrt();
            }
        }
        scale
    }

    /// Solve the system in the least squares sense, returning the minimum norm
    /// solution when the system is rank deficient.
    ///
    /// A term whose diagonal entry is zero never varied over the observations, so its
    /// row and column are zero and its coefficient is exactly zero.
    ///
    /// Returns `None` if the system contains non-finite values or the
    /// decomposition fails.
    pub fn solve(&self) -> Option<Vec<f64>> {
        self.solve_with_rank().map(|(beta, _, _)| beta)
    }

    /// Solve the system like [`WeightedLinearSystem::solve`], but return `None` when
    /// the terms that did vary are linearly dependent, so that their coefficients are
    /// not determined by the observations.
    pub fn solve_full_rank(&self) -> Option<Vec<f64>> {
        let (beta, rank, k) = self.solve_with_rank()?;
        if rank < k {
            log::trace!("Normal equations have rank {rank} over {k} varying terms");
            None
        } else {
            Some(beta)
        }
    }

    /// Solve the system, returning the solution, the numerical rank of the scaled
    /// system, and the number of terms with a non-zero diagonal.
    fn solve_with_rank(&self) -> Option<(Vec<f64>, usize, usize)> {
        if !self.is_finite() {
            return None;
        }
        let n = self.len();
        let active: Vec<usize> = (0..n).filter(|i| self.a[*i][*i] > 0.0).collect();
        if active.is_empty() {
            return None;
        }
        let k = active.len();
        let scale: Vec<f64> = active.iter().map(|i| 1.0 / self.a[*i][*i].sqrt()).collect();

        let mut lhs = Vec::with_capacity(k * k);
        for (si, i) in scale.iter().zip(active.iter()) {
            for (sj, j) in scale.iter().zip(active.iter()) {
                lhs.push(self.a[*i][*j] * si * sj);
            }
        }
        let rhs: Vec<f64> = scale
            .iter()
            .zip(active.iter())
            .map(|(s, i)| self.b[*i] * s)
            .collect();

        let (reduced, rank) = solve_scaled(k, lhs, rhs)?;
        let mut beta = vec![0.0; n];
        for ((v, s), i) in reduced.into_iter().zip(scale.iter()).zip(active.iter()) {
            beta[*i] = v * s;
        }
        if beta.iter().all(|v| v.is_finite()) {
            Some((beta, rank, k))
        } else {
            None
        }
    }

    /// Solve a three term system exactly by Cramer's rule.
    ///
    /// Returns `None` for systems with more terms or with a vanishing determinant.
    pub fn solve_closed_form(&self) -> Option<[f64; 3]> {
        if self.len() != 3 || !self.is_finite() {
            return None;
        }
        let s = self.jacobi_scale();
        let mut m = [[0.0; 3]; 3];
        let mut r = [0.0; 3];
        for i in 0..3 {
            for j in 0..3 {
                m[i][j] = self.a[i][j] * s[i] * s[j];
            }
            r[i] = self.b[i] * s[i];
        }
        let det = det3(&m);
        if !det.is_finite() || det.abs() < CLOSED_FORM_TOLERANCE {
            return None;
        }
        let mut out = [0.0; 3];
        for (k, o) in out.iter_mut().enumerate() {
            let mut mk = m;
            for i in 0..3 {
                mk[i][k] = r[i];
            }
            *o = det3(&mk) / det * s[k];
        }
        if out.iter().all(|v| v.is_finite()) {
            Some(out)
        } else {
            None
        }
    }
}

/// The smallest determinant of the unit-diagonal scaled 3x3 system considered solvable
const CLOSED_FORM_TOLERANCE: f64 = 1e-12;

#[inline]
fn det3(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// Singular values of the unit-diagonal scaled system smaller than this fraction of
/// the largest do not count towards its rank
const RANK_TOLERANCE: f64 = 1e-10;

/// The number of singular values above the rank cutoff
fn numerical_rank<'a, I: IntoIterator<Item = &'a f64>>(singular_values: I) -> usize {
    let values: Vec<f64> = singular_values.into_iter().copied().collect();
    let largest = values.iter().copied().fold(0.0, f64::max);
    values.iter().filter(|v| **v > largest * RANK_TOLERANCE).count()
}

/// Solve the `k` by `k` row-major system `lhs` against `rhs`, returning the solution
/// and the numerical rank of `lhs`
fn solve_scaled(k: usize, lhs: Vec<f64>, rhs: Vec<f64>) -> Option<(Vec<f64>, usize)> {
    cfg_if! {
        if #[cfg(feature = "ndarray-linalg")] {
            solve_scaled_ndarray(k, lhs, rhs)
        } else if #[cfg(feature = "nalgebra")] {
            solve_scaled_nalgebra(k, lhs, rhs)
        } else {
            compile_error!("One of the `nalgebra` or `ndarray-linalg` features must be enabled")
        }
    }
}

#[cfg(feature = "ndarray-linalg")]
fn solve_scaled_ndarray(k: usize, lhs: Vec<f64>, rhs: Vec<f64>) -> Option<(Vec<f64>, usize)> {
    let lhs = Array2::from_shape_vec((k, k), lhs).ok()?;
    let rhs = Array1::from_vec(rhs);
    match lhs.least_squares(&rhs) {
        Ok(result) => Some((
            result.solution.to_vec(),
            numerical_rank(result.singular_values.iter()),
        )),
        Err(err) => {
            log::trace!("Least squares solve failed: {err}");
            None
        }
    }
}

#[cfg(feature = "nalgebra")]
#[allow(dead_code)]
fn solve_scaled_nalgebra(k: usize, lhs: Vec<f64>, rhs: Vec<f64>) -> Option<(Vec<f64>, usize)> {
    use nalgebra::{DMatrix, DVector};

    let lhs = DMatrix::from_row_slice(k, k, &lhs);
    let rhs = DVector::from_vec(rhs);

    let svd = lhs.try_svd(true, true, f64::EPSILON, 500)?;
    let rank = numerical_rank(svd.singular_values.iter());
    // Discard singular values that are indistinguishable from rounding error
    let cutoff = svd.singular_values.max() * k as f64 * f64::EPSILON;
    match svd.solve(&rhs, cutoff) {
        Ok(beta) => Some((beta.iter().copied().collect(), rank)),
        Err(err) => {
            log::trace!("SVD solve failed: {err}");
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn quadratic(x: f64, y: f64) -> f64 {
        2.0 + 0.5 * x - 3.0 * x * x - 0.25 * y - 0.125 * y * y
    }

    #[test]
    fn test_push_is_symmetric() {
        let mut system = WeightedLinearSystem::new(Basis::Full2D);
        for (x, y) in [(0.1, -1.0), (0.3, 0.5), (-0.2, 2.0)] {
            system.push(x, y, 2.0, quadratic(x, y));
        }
        assert_eq!(system.n_points, 3);
        for i in 0..5 {
            for j in 0..5 {
                assert_eq!(system.a[i][j], system.a[j][i]);
            }
        }
        // a[0][0] is the sum of squared weights
        assert_eq!(system.a[0][0], 12.0);
    }

    #[test]
    fn test_solve_full_rank() {
        let mut system = WeightedLinearSystem::new(Basis::Full2D);
        for i in -3..=3 {
            for j in -3..=3 {
                let (x, y) = (i as f64 * 0.1, j as f64);
                system.push(x, y, 1.0 + (i * j) as f64 * 0.01, quadratic(x, y));
            }
        }
        let beta = system.solve().unwrap();
        let expected = [2.0, 0.5, -3.0, -0.25, -0.125];
        for (b, e) in beta.iter().zip(expected.iter()) {
            assert!((b - e).abs() < 1e-8, "{beta:?}");
        }
    }

    #[test]
    fn test_solve_rank_deficient() {
        // No spread along y, so the y terms cannot be determined
        let mut system = WeightedLinearSystem::new(Basis::Full2D);
        for i in -3..=3 {
            let x = i as f64 * 0.1;
            system.push(x, 0.0, 1.0, quadratic(x, 0.0));
        }
        let beta = system.solve().unwrap();
        assert!((beta[2] + 3.0).abs() < 1e-8, "{beta:?}");
        assert_eq!(beta[3], 0.0);
        assert_eq!(beta[4], 0.0);

        assert!(WeightedLinearSystem::new(Basis::Full2D).solve().is_none());
    }

    #[test]
    fn test_collinear_terms() {
        // A constant, non-zero y offset makes the y terms copies of the intercept
        let mut system = WeightedLinearSystem::new(Basis::Full2D);
        for i in -3..=3 {
            let x = i as f64 * 0.1;
            system.push(x, -0.3, 1.0, quadratic(x, -0.3) - 9.0);
        }
        assert!(system.a[3][3] > 0.0 && system.a[4][4] > 0.0);
        assert!(system.solve().is_some());
        assert!(system.solve_full_rank().is_none());

        // Pinned terms do not count against the rank
        let mut system = WeightedLinearSystem::new(Basis::Full2D);
        for i in -3..=3 {
            let x = i as f64 * 0.1;
            system.push(x, 0.0, 1.0, quadratic(x, 0.0));
        }
        let beta = system.solve_full_rank().unwrap();
        assert!((beta[2] + 3.0).abs() < 1e-8, "{beta:?}");
        assert_eq!(beta[4], 0.0);
    }

    #[test]
    fn test_solve_non_finite() {
        let mut system = WeightedLinearSystem::new(Basis::Centered2D);
        system.push(0.1, 0.1, 1.0, f64::NAN);
        assert!(system.solve().is_none());
        assert!(system.solve_closed_form().is_none());
    }

    #[test]
    fn test_closed_form() {
        let mut system = WeightedLinearSystem::new(Basis::Profile1D);
        for i in -4..=4 {
            let x = i as f64 * 0.05;
            system.push(x, 0.0, 1.0, quadratic(x, 0.0));
        }
        let [a, b, c] = system.solve_closed_form().unwrap();
        assert!((a - 2.0).abs() < 1e-9);
        assert!((b - 0.5).abs() < 1e-9);
        assert!((c + 3.0).abs() < 1e-9);

        let general = system.solve().unwrap();
        assert!((general[2] - c).abs() < 1e-8);

        let mut too_few = WeightedLinearSystem::new(Basis::Profile1D);
        too_few.push(0.1, 0.0, 1.0, 1.0);
        too_few.push(0.2, 0.0, 1.0, 2.0);
        assert!(too_few.solve_closed_form().is_none());

        assert!(WeightedLinearSystem::new(Basis::Full2D).solve_closed_form().is_none());
    }
}
