//! Fixed-size normal-equation solver.
//!
//! For a fixed set of change points the model is linear in its coefficients:
//!
//! ```text
//! minimize Σ (y_i - β0 - β1 x1_i - β2 x2_i)^2
//! ```
//!
//! where `x1`, `x2` are clamped ramp regressors. With one or two ramps the normal
//! equations are 2×2 or 3×3, so we accumulate `XᵀX` / `Xᵀy` directly and solve
//! with a fixed-size LU decomposition.
//!
//! Near-singular systems are rejected instead of solved. They occur when a
//! candidate change point leaves a ramp (near-)constant over the observed
//! temperatures, which makes it collinear with the intercept.

use nalgebra::{Matrix2, Matrix3, Vector2, Vector3};

/// Absolute determinant threshold below which a system is treated as singular.
pub const SINGULAR_DET_EPS: f64 = 1e-10;

/// Normal equations for `y ~ β0 + β1 x`.
pub fn normal_equations_2(x: &[f64], y: &[f64]) -> (Matrix2<f64>, Vector2<f64>) {
    let n = x.len().min(y.len()) as f64;
    let mut sx = 0.0;
    let mut sxx = 0.0;
    let mut sy = 0.0;
    let mut sxy = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        sx += xi;
        sxx += xi * xi;
        sy += yi;
        sxy += xi * yi;
    }

    let a = Matrix2::new(n, sx, sx, sxx);
    let b = Vector2::new(sy, sxy);
    (a, b)
}

/// Normal equations for `y ~ β0 + β1 x1 + β2 x2`.
pub fn normal_equations_3(x1: &[f64], x2: &[f64], y: &[f64]) -> (Matrix3<f64>, Vector3<f64>) {
    let n = x1.len().min(x2.len()).min(y.len()) as f64;
    let (mut s1, mut s2) = (0.0, 0.0);
    let (mut s11, mut s12, mut s22) = (0.0, 0.0, 0.0);
    let (mut sy, mut s1y, mut s2y) = (0.0, 0.0, 0.0);
    for ((&a, &b), &yi) in x1.iter().zip(x2).zip(y) {
        s1 += a;
        s2 += b;
        s11 += a * a;
        s12 += a * b;
        s22 += b * b;
        sy += yi;
        s1y += a * yi;
        s2y += b * yi;
    }

    #[rustfmt::skip]
    let a = Matrix3::new(
        n,  s1,  s2,
        s1, s11, s12,
        s2, s12, s22,
    );
    let b = Vector3::new(sy, s1y, s2y);
    (a, b)
}

/// Solve a 2×2 system, or `None` if it is (near-)singular.
pub fn solve_2x2(a: Matrix2<f64>, b: Vector2<f64>) -> Option<Vector2<f64>> {
    if is_singular(a.determinant()) {
        return None;
    }
    let x = a.lu().solve(&b)?;
    x.iter().all(|v| v.is_finite()).then_some(x)
}

/// Solve a 3×3 system, or `None` if it is (near-)singular.
pub fn solve_3x3(a: Matrix3<f64>, b: Vector3<f64>) -> Option<Vector3<f64>> {
    if is_singular(a.determinant()) {
        return None;
    }
    let x = a.lu().solve(&b)?;
    x.iter().all(|v| v.is_finite()).then_some(x)
}

/// Least squares on an intercept plus one or two ramp regressors.
///
/// Returns the coefficients `[β0, β1, (β2)]`, or `None` when the system is
/// singular or the number of ramps is unsupported.
pub fn solve_ramp_regression(ramps: &[Vec<f64>], y: &[f64]) -> Option<Vec<f64>> {
    match ramps {
        [x] => {
            let (a, b) = normal_equations_2(x, y);
            solve_2x2(a, b).map(|v| v.iter().copied().collect())
        }
        [x1, x2] => {
            let (a, b) = normal_equations_3(x1, x2, y);
            solve_3x3(a, b).map(|v| v.iter().copied().collect())
        }
        _ => None,
    }
}

fn is_singular(det: f64) -> bool {
    !det.is_finite() || det.abs() < SINGULAR_DET_EPS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_simple_line() {
        // y = 2 + 3x on x = [0, 1, 2]
        let (a, b) = normal_equations_2(&[0.0, 1.0, 2.0], &[2.0, 5.0, 8.0]);
        let beta = solve_2x2(a, b).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn solves_two_regressors() {
        // y = 1 + 2 x1 + 4 x2
        let x1 = [0.0, 1.0, 2.0, 0.0, 0.0, 3.0];
        let x2 = [0.0, 0.0, 0.0, 1.0, 2.0, 1.0];
        let y: Vec<f64> = x1
            .iter()
            .zip(x2.iter())
            .map(|(a, b)| 1.0 + 2.0 * a + 4.0 * b)
            .collect();

        let beta = solve_ramp_regression(&[x1.to_vec(), x2.to_vec()], &y).unwrap();
        assert!((beta[0] - 1.0).abs() < 1e-9, "intercept {}", beta[0]);
        assert!((beta[1] - 2.0).abs() < 1e-9, "slope 1 {}", beta[1]);
        assert!((beta[2] - 4.0).abs() < 1e-9, "slope 2 {}", beta[2]);
    }

    #[test]
    fn constant_regressor_is_singular() {
        // A ramp that is zero everywhere (change point below every temperature).
        let (a, b) = normal_equations_2(&[0.0; 5], &[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!(solve_2x2(a, b).is_none());
    }

    #[test]
    fn collinear_ramps_are_singular() {
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let y = [1.0, 2.0, 3.0, 4.0];
        assert!(solve_ramp_regression(&[x.clone(), x], &y).is_none());
    }

    #[test]
    fn unsupported_ramp_count_yields_none() {
        assert!(solve_ramp_regression(&[], &[1.0, 2.0]).is_none());
    }
}
