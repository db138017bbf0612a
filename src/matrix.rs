//! Checked dense-matrix primitives on top of `ndarray`.
//!
//! Every engine buffer is an `Array2<f64>`; vectors are `n x 1` columns.
//! These helpers write into preallocated outputs so a forward pass never
//! allocates, and they turn shape violations into `ShapeMismatch` instead of
//! the panic `ndarray` would raise.

use ndarray::linalg::general_mat_mul;
use ndarray::prelude::*;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::error::{NetworkError, Result};

pub type Matrix = Array2<f64>;

/// `out = a . b`
pub fn multiply_into(a: &ArrayView2<f64>, b: &ArrayView2<f64>, out: &mut Matrix) -> Result<()> {
    if a.ncols() != b.nrows() {
        return Err(NetworkError::shape("matrix multiply", a.ncols(), b.nrows()));
    }
    if out.dim() != (a.nrows(), b.ncols()) {
        return Err(NetworkError::shape(
            "matrix multiply output",
            (a.nrows(), b.ncols()),
            out.dim(),
        ));
    }
    general_mat_mul(1.0, a, b, 0.0, out);
    Ok(())
}

/// `target += other`, elementwise.
pub fn add_assign(target: &mut Matrix, other: &ArrayView2<f64>) -> Result<()> {
    if target.dim() != other.dim() {
        return Err(NetworkError::shape("matrix add", target.dim(), other.dim()));
    }
    *target += other;
    Ok(())
}

/// `out[i] = f(source[i])`, elementwise.
pub fn apply_into<F>(source: &ArrayView2<f64>, f: F, out: &mut Matrix) -> Result<()>
where
    F: Fn(f64) -> f64,
{
    if source.dim() != out.dim() {
        return Err(NetworkError::shape("matrix apply", source.dim(), out.dim()));
    }
    out.zip_mut_with(source, |o, &s| *o = f(s));
    Ok(())
}

/// Index of the largest component. Ties go to the lowest index.
pub fn max_index(a: &ArrayView1<f64>) -> Result<usize> {
    if a.is_empty() {
        return Err(NetworkError::shape("max index", "non-empty vector", 0));
    }
    let mut max = a[0];
    let mut max_index = 0;
    for (i, &v) in a.iter().enumerate().skip(1) {
        if v > max {
            max = v;
            max_index = i;
        }
    }
    Ok(max_index)
}

/// He-style initialization: `sqrt(2 / fan_in) * N(0, 1)`.
///
/// A zero `fan_in` yields an empty or zero matrix.
pub fn random_normal<R: Rng + ?Sized>(rows: usize, cols: usize, fan_in: usize, rng: &mut R) -> Matrix {
    if fan_in == 0 {
        return Array2::zeros((rows, cols));
    }
    let scale = (2.0 / fan_in as f64).sqrt();
    Array::from_shape_simple_fn((rows, cols), || scale * rng.sample::<f64, _>(StandardNormal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn multiply_writes_into_output() {
        let a = array![[1.0, 2.0], [3.0, 4.0]];
        let b = array![[1.0], [1.0]];
        let mut out = Array2::zeros((2, 1));
        multiply_into(&a.view(), &b.view(), &mut out).unwrap();
        assert_eq!(out, array![[3.0], [7.0]]);
    }

    #[test]
    fn multiply_rejects_incompatible_shapes() {
        let a = array![[1.0, 2.0, 3.0]];
        let b = array![[1.0], [1.0]];
        let mut out = Array2::zeros((1, 1));
        let err = multiply_into(&a.view(), &b.view(), &mut out).unwrap_err();
        assert!(matches!(err, NetworkError::ShapeMismatch { .. }));
    }

    #[test]
    fn add_and_apply_require_identical_shapes() {
        let mut t = Array2::zeros((2, 1));
        assert!(add_assign(&mut t, &Array2::<f64>::zeros((1, 2)).view()).is_err());
        assert!(apply_into(&Array2::<f64>::zeros((3, 1)).view(), |x| x, &mut t).is_err());

        add_assign(&mut t, &array![[1.0], [-2.0]].view()).unwrap();
        let mut out = Array2::zeros((2, 1));
        apply_into(&t.view(), |x| x * 10.0, &mut out).unwrap();
        assert_eq!(out, array![[10.0], [-20.0]]);
    }

    #[test]
    fn max_index_prefers_first_occurrence() {
        assert_eq!(max_index(&array![0.2, 0.5, 0.5, 0.1].view()).unwrap(), 1);
        assert_eq!(max_index(&array![3.0].view()).unwrap(), 0);
        assert!(max_index(&Array1::<f64>::zeros(0).view()).is_err());
    }

    #[test]
    fn random_normal_is_seeded() {
        let a = random_normal(4, 3, 3, &mut StdRng::seed_from_u64(7));
        let b = random_normal(4, 3, 3, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
        assert_eq!(a.dim(), (4, 3));
        assert!(a.iter().any(|&x| x != 0.0));
    }
}
