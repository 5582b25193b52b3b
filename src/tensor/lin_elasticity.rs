use super::{t4_ddot_t2, Tensor2, Tensor4};

/// Implements isotropic linear elasticity (three-dimensional)
///
/// ```text
/// D = 3K Piso + 2G Psymdev = K I⊗I + 2G Psymdev
/// ```
#[derive(Clone, Debug)]
pub struct LinElasticity {
    /// Young's modulus
    young: f64,

    /// Poisson's coefficient
    poisson: f64,

    /// Modulus (stiffness) tensor
    dd: Tensor4,
}

impl LinElasticity {
    /// Allocates a new instance
    pub fn new(young: f64, poisson: f64) -> Self {
        let mut res = LinElasticity {
            young,
            poisson,
            dd: Tensor4::new(),
        };
        res.calc_modulus();
        res
    }

    /// Allocates a new instance given the bulk and shear moduli
    pub fn from_bulk_shear(kk: f64, gg: f64) -> Self {
        let young = 9.0 * kk * gg / (3.0 * kk + gg);
        let poisson = (3.0 * kk - 2.0 * gg) / (6.0 * kk + 2.0 * gg);
        LinElasticity::new(young, poisson)
    }

    /// Returns the bulk and shear moduli
    pub fn get_bulk_shear(&self) -> (f64, f64) {
        let kk = self.young / (3.0 * (1.0 - 2.0 * self.poisson));
        let gg = self.young / (2.0 * (1.0 + self.poisson));
        (kk, gg)
    }

    /// Returns an access to the modulus tensor
    pub fn get_modulus(&self) -> &Tensor4 {
        &self.dd
    }

    /// Calculates the stress from the strain: `σ = D : ε`
    pub fn calc_stress(&self, stress: &mut Tensor2, strain: &Tensor2) {
        t4_ddot_t2(stress, 1.0, &self.dd, strain);
    }

    /// Computes the modulus tensor
    fn calc_modulus(&mut self) {
        let (kk, gg) = self.get_bulk_shear();
        let psd = Tensor4::p_symdev();
        let iii = Tensor4::ii_dyad_ii();
        let mat = iii.matrix() * kk + psd.matrix() * (2.0 * gg);
        self.dd.matrix_mut().copy_from(&mat);
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::LinElasticity;
    use crate::tensor::Tensor2;
    use approx::assert_abs_diff_eq;

    #[test]
    fn new_works() {
        let ela = LinElasticity::new(900.0, 0.25);
        let (kk, gg) = ela.get_bulk_shear();
        assert_abs_diff_eq!(kk, 600.0, epsilon = 1e-12);
        assert_abs_diff_eq!(gg, 360.0, epsilon = 1e-12);
        let mat = ela.get_modulus().matrix();
        // c = E/((1+ν)(1-2ν))
        let c = 900.0 / (1.25 * 0.5);
        assert_abs_diff_eq!(mat[(0, 0)], c * 0.75, epsilon = 1e-12);
        assert_abs_diff_eq!(mat[(0, 1)], c * 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(mat[(3, 3)], 2.0 * gg, epsilon = 1e-12);
        assert_eq!(mat[(0, 3)], 0.0);
    }

    #[test]
    fn from_bulk_shear_works() {
        let ela = LinElasticity::from_bulk_shear(600.0, 360.0);
        let (kk, gg) = ela.get_bulk_shear();
        assert_abs_diff_eq!(kk, 600.0, epsilon = 1e-10);
        assert_abs_diff_eq!(gg, 360.0, epsilon = 1e-10);
        let correct = LinElasticity::new(900.0, 0.25);
        assert_abs_diff_eq!(ela.get_modulus().matrix(), correct.get_modulus().matrix(), epsilon = 1e-10);
    }

    #[test]
    fn calc_stress_works() {
        let ela = LinElasticity::new(2.0, 0.0);
        let strain = Tensor2::from_mandel(&[0.1, 0.0, 0.0, 0.2, 0.0, 0.0]);
        let mut stress = Tensor2::new();
        ela.calc_stress(&mut stress, &strain);
        // with ν = 0, σ = E ε
        assert_abs_diff_eq!(stress.vector()[0], 0.2, epsilon = 1e-15);
        assert_abs_diff_eq!(stress.vector()[1], 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(stress.vector()[3], 0.4, epsilon = 1e-15);
    }
}
