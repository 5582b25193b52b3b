use super::{Tensor2, IDENTITY2};
use crate::StrError;
use nalgebra::Matrix6;

/// Implements a fourth-order tensor with minor symmetries in the Mandel basis
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor4 {
    /// Holds the 6×6 Mandel matrix
    mat: Matrix6<f64>,
}

impl Tensor4 {
    /// Allocates a new instance with all components equal to zero
    pub fn new() -> Self {
        Tensor4 { mat: Matrix6::zeros() }
    }

    /// Allocates a new instance from a Mandel matrix
    pub fn from_matrix(mat: Matrix6<f64>) -> Self {
        Tensor4 { mat }
    }

    /// Allocates the symmetric-deviatoric projector
    ///
    /// ```text
    /// Psymdev = Isym - ⅓ I ⊗ I
    /// ```
    pub fn p_symdev() -> Self {
        let mut mat = Matrix6::<f64>::identity();
        for i in 0..3 {
            for j in 0..3 {
                mat[(i, j)] -= IDENTITY2[i] * IDENTITY2[j] / 3.0;
            }
        }
        Tensor4 { mat }
    }

    /// Allocates the dyadic product `I ⊗ I`
    pub fn ii_dyad_ii() -> Self {
        let mut mat = Matrix6::zeros();
        for i in 0..3 {
            for j in 0..3 {
                mat[(i, j)] = 1.0;
            }
        }
        Tensor4 { mat }
    }

    /// Returns an access to the Mandel matrix
    pub fn matrix(&self) -> &Matrix6<f64> {
        &self.mat
    }

    /// Returns a mutable access to the Mandel matrix
    pub fn matrix_mut(&mut self) -> &mut Matrix6<f64> {
        &mut self.mat
    }

    /// Returns the inverse (on the space of symmetric tensors)
    pub fn inverse(&self) -> Result<Tensor4, StrError> {
        match self.mat.try_inverse() {
            Some(mat) => Ok(Tensor4 { mat }),
            None => Err("cannot invert singular fourth-order tensor"),
        }
    }
}

/// Performs the double-dot product between a fourth-order and a second-order tensor
///
/// ```text
/// b := α a : x
/// ```
pub fn t4_ddot_t2(b: &mut Tensor2, alpha: f64, a: &Tensor4, x: &Tensor2) {
    let res = a.matrix() * x.vector() * alpha;
    b.vector_mut().copy_from(&res);
}

/// Performs the dyadic product between two second-order tensors and updates a fourth-order tensor
///
/// ```text
/// dd += α u ⊗ v
/// ```
pub fn t2_dyad_t2_update(dd: &mut Tensor4, alpha: f64, u: &Tensor2, v: &Tensor2) {
    dd.matrix_mut().ger(alpha, u.vector(), v.vector(), 1.0);
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{t2_dyad_t2_update, t4_ddot_t2, Tensor4};
    use crate::tensor::Tensor2;
    use approx::assert_abs_diff_eq;
    use nalgebra::Matrix6;

    #[test]
    fn p_symdev_extracts_the_deviator() {
        let pp = Tensor4::p_symdev();
        let sigma = Tensor2::from_mandel(&[1.0, 2.0, 6.0, 1.0, -1.0, 0.5]);
        let mut s = Tensor2::new();
        t4_ddot_t2(&mut s, 1.0, &pp, &sigma);
        let mut correct = Tensor2::new();
        sigma.deviator(&mut correct);
        for i in 0..6 {
            assert_abs_diff_eq!(s.vector()[i], correct.vector()[i], epsilon = 1e-15);
        }
        // idempotent
        let pp2 = pp.matrix() * pp.matrix();
        assert_abs_diff_eq!(&pp2, pp.matrix(), epsilon = 1e-15);
    }

    #[test]
    fn dyad_and_inverse_work() {
        let mut dd = Tensor4::from_matrix(Matrix6::<f64>::identity());
        let u = Tensor2::identity();
        t2_dyad_t2_update(&mut dd, 1.0, &u, &u);
        let correct = Matrix6::<f64>::identity() + Tensor4::ii_dyad_ii().matrix();
        assert_eq!(dd.matrix(), &correct);
        let inv = dd.inverse().unwrap();
        let res = inv.matrix() * dd.matrix();
        assert_abs_diff_eq!(res, Matrix6::<f64>::identity(), epsilon = 1e-14);
        assert_eq!(Tensor4::new().inverse().err(), Some("cannot invert singular fourth-order tensor"));
    }
}
