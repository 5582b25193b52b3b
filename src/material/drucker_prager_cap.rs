use super::{EffectiveElasticity, MultiSurfaceModel, YieldAndFlow};
use crate::tensor::{t2_dyad_t2_update, Tensor2, Tensor4};
use crate::StrError;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Holds the index of p = tr(σ) in the stress parameters
const P: usize = 0;

/// Holds the index of q = √J2 in the stress parameters
const Q: usize = 1;

/// Holds the index of the accumulated plastic shear strain κ
const KAPPA: usize = 0;

/// Holds the parameters of the Drucker-Prager model with tensile cap
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct DruckerPragerCapParams {
    /// Initial cohesion c₀
    pub cohesion: f64,

    /// Friction angle φ (degrees)
    pub friction_angle: f64,

    /// Dilation angle ψ (degrees)
    pub dilation_angle: f64,

    /// Cohesion hardening modulus H
    #[serde(default)]
    pub hardening: f64,

    /// Tensile strength T (no tensile cap if None)
    #[serde(default)]
    pub tensile_strength: Option<f64>,
}

/// Implements the Drucker-Prager model with an optional tensile cap
///
/// The stress parameters are `p = tr(σ)` and `q = √J2`. The yield functions are
///
/// ```text
/// f₀ = q + tanφ p - c(κ)       (shear cone; flow potential with tanψ)
/// f₁ = p - T                    (tensile cap; associative)
/// c(κ) = c₀ + H κ
/// ```
///
/// and the single internal variable κ accumulates the plastic shear `(q_trial - q) / Eqq`.
#[derive(Clone, Debug)]
pub struct DruckerPragerCap {
    /// Holds the parameters
    params: DruckerPragerCapParams,

    /// Holds tan(φ)
    tan_phi: f64,

    /// Holds tan(ψ)
    tan_psi: f64,
}

impl DruckerPragerCap {
    /// Allocates a new instance
    pub fn new(params: &DruckerPragerCapParams) -> Result<Self, StrError> {
        if !(params.friction_angle >= 0.0 && params.friction_angle < 90.0) {
            return Err("friction angle must be in [0, 90) degrees");
        }
        if !(params.dilation_angle >= 0.0 && params.dilation_angle <= params.friction_angle) {
            return Err("dilation angle must be in [0, friction angle] degrees");
        }
        if !(params.cohesion >= 0.0) {
            return Err("cohesion must be non-negative");
        }
        let tan_phi = f64::tan(params.friction_angle.to_radians());
        if let Some(tt) = params.tensile_strength {
            if params.cohesion > 0.0 && tan_phi > 0.0 && tt >= params.cohesion / tan_phi {
                return Err("tensile strength must be smaller than the apex of the cone");
            }
        }
        Ok(DruckerPragerCap {
            params: *params,
            tan_phi,
            tan_psi: f64::tan(params.dilation_angle.to_radians()),
        })
    }

    /// Returns the cohesion for the given internal variable
    pub fn cohesion(&self, kappa: f64) -> f64 {
        self.params.cohesion + self.params.hardening * kappa
    }

    /// Returns the modulus Eqq of the effective elasticity
    fn eqq(eff: &EffectiveElasticity) -> f64 {
        eff.eij[(Q, Q)]
    }
}

impl MultiSurfaceModel for DruckerPragerCap {
    fn num_sp(&self) -> usize {
        2 // [p, q]
    }

    fn num_yf(&self) -> usize {
        match self.params.tensile_strength {
            Some(_) => 2,
            None => 1,
        }
    }

    fn num_intnl(&self) -> usize {
        1 // [κ]
    }

    fn stress_params(&self, sp: &mut DVector<f64>, stress: &Tensor2) -> Result<(), StrError> {
        sp[P] = stress.trace();
        sp[Q] = f64::sqrt(stress.invariant_jj2());
        Ok(())
    }

    fn dstress_params_dstress(&self, dsp: &mut [Tensor2], stress: &Tensor2) -> Result<(), StrError> {
        dsp[P] = Tensor2::identity();
        let q = f64::sqrt(stress.invariant_jj2());
        if q == 0.0 {
            dsp[Q] = Tensor2::new();
        } else {
            let mut s = Tensor2::new();
            stress.deviator(&mut s);
            dsp[Q].set_tensor(0.5 / q, &s);
        }
        Ok(())
    }

    fn d2stress_params_dstress(&self, d2sp: &mut [Tensor4], stress: &Tensor2) -> Result<(), StrError> {
        d2sp[P] = Tensor4::new();
        let q = f64::sqrt(stress.invariant_jj2());
        if q == 0.0 {
            d2sp[Q] = Tensor4::new();
        } else {
            // d²q/dσ² = Psymdev/(2q) - s⊗s/(4q³)
            let mut s = Tensor2::new();
            stress.deviator(&mut s);
            let mut dd = Tensor4::p_symdev();
            *dd.matrix_mut() *= 0.5 / q;
            t2_dyad_t2_update(&mut dd, -0.25 / (q * q * q), &s, &s);
            d2sp[Q] = dd;
        }
        Ok(())
    }

    fn yield_function_values(
        &self,
        yf: &mut DVector<f64>,
        sp: &DVector<f64>,
        intnl: &DVector<f64>,
    ) -> Result<(), StrError> {
        yf[0] = sp[Q] + self.tan_phi * sp[P] - self.cohesion(intnl[KAPPA]);
        if let Some(tt) = self.params.tensile_strength {
            yf[1] = sp[P] - tt;
        }
        Ok(())
    }

    fn compute_all_surfaces(
        &self,
        all: &mut [YieldAndFlow],
        sp: &DVector<f64>,
        intnl: &DVector<f64>,
    ) -> Result<(), StrError> {
        // shear cone
        let cone = &mut all[0];
        cone.reset();
        cone.f = sp[Q] + self.tan_phi * sp[P] - self.cohesion(intnl[KAPPA]);
        cone.df[P] = self.tan_phi;
        cone.df[Q] = 1.0;
        cone.df_di[KAPPA] = -self.params.hardening;
        cone.dg[P] = self.tan_psi;
        cone.dg[Q] = 1.0;

        // tensile cap
        if let Some(tt) = self.params.tensile_strength {
            let cap = &mut all[1];
            cap.reset();
            cap.f = sp[P] - tt;
            cap.df[P] = 1.0;
            cap.dg[P] = 1.0;
        }
        Ok(())
    }

    fn set_intnl_values(
        &self,
        intnl: &mut DVector<f64>,
        trial_sp: &DVector<f64>,
        current_sp: &DVector<f64>,
        intnl_old: &DVector<f64>,
        eff: &EffectiveElasticity,
    ) -> Result<(), StrError> {
        intnl[KAPPA] = intnl_old[KAPPA] + (trial_sp[Q] - current_sp[Q]) / DruckerPragerCap::eqq(eff);
        Ok(())
    }

    fn set_intnl_derivatives(
        &self,
        dintnl: &mut DMatrix<f64>,
        _trial_sp: &DVector<f64>,
        _current_sp: &DVector<f64>,
        _intnl: &DVector<f64>,
        eff: &EffectiveElasticity,
    ) -> Result<(), StrError> {
        dintnl[(KAPPA, P)] = 0.0;
        dintnl[(KAPPA, Q)] = -1.0 / DruckerPragerCap::eqq(eff);
        Ok(())
    }

    fn effective_elasticity(&self, elasticity: &Tensor4) -> Result<EffectiveElasticity, StrError> {
        // Epp = Σ_ij E_iijj and Eqq = E_0101 (Mandel: M[3][3] = 2 E_0101)
        let mat = elasticity.matrix();
        let mut epp = 0.0;
        for i in 0..3 {
            for j in 0..3 {
                epp += mat[(i, j)];
            }
        }
        let eqq = mat[(3, 3)] / 2.0;
        let eij = DMatrix::from_row_slice(2, 2, &[epp, 0.0, 0.0, eqq]);
        EffectiveElasticity::new(eij, eqq)
    }

    fn stress_after_return(
        &self,
        stress: &mut Tensor2,
        stress_trial: &Tensor2,
        sp: &DVector<f64>,
        _gae: f64,
        _intnl: &DVector<f64>,
        _smoothed: &YieldAndFlow,
        _elasticity: &Tensor4,
    ) -> Result<(), StrError> {
        let q_trial = f64::sqrt(stress_trial.invariant_jj2());
        let mut s = Tensor2::new();
        if q_trial > 0.0 {
            stress_trial.deviator(&mut s);
        }
        let ratio = if q_trial > 0.0 { sp[Q] / q_trial } else { 0.0 };
        stress.set_tensor(ratio, &s);
        stress.update(sp[P] / 3.0, &Tensor2::identity());
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{DruckerPragerCap, DruckerPragerCapParams};
    use crate::material::MultiSurfaceModel;
    use crate::tensor::{LinElasticity, Tensor2, Tensor4};
    use approx::assert_abs_diff_eq;
    use nalgebra::DVector;

    fn params() -> DruckerPragerCapParams {
        DruckerPragerCapParams {
            cohesion: 10.0,
            friction_angle: 20.0,
            dilation_angle: 10.0,
            hardening: 5.0,
            tensile_strength: Some(5.0),
        }
    }

    #[test]
    fn new_captures_errors() {
        let mut p = params();
        p.friction_angle = 90.0;
        assert_eq!(
            DruckerPragerCap::new(&p).err(),
            Some("friction angle must be in [0, 90) degrees")
        );
        p.friction_angle = 20.0;
        p.dilation_angle = 25.0;
        assert_eq!(
            DruckerPragerCap::new(&p).err(),
            Some("dilation angle must be in [0, friction angle] degrees")
        );
        p.dilation_angle = 10.0;
        p.cohesion = -1.0;
        assert_eq!(DruckerPragerCap::new(&p).err(), Some("cohesion must be non-negative"));
        p.cohesion = 10.0;
        p.tensile_strength = Some(100.0);
        assert_eq!(
            DruckerPragerCap::new(&p).err(),
            Some("tensile strength must be smaller than the apex of the cone")
        );
    }

    #[test]
    fn sizes_and_yield_values_work() {
        let model = DruckerPragerCap::new(&params()).unwrap();
        assert_eq!(model.num_sp(), 2);
        assert_eq!(model.num_yf(), 2);
        assert_eq!(model.num_intnl(), 1);
        let sp = DVector::from_column_slice(&[3.0, 4.0]);
        let intnl = DVector::from_column_slice(&[2.0]);
        let mut yf = DVector::zeros(2);
        model.yield_function_values(&mut yf, &sp, &intnl).unwrap();
        let tan_phi = f64::tan(20.0_f64.to_radians());
        assert_abs_diff_eq!(yf[0], 4.0 + tan_phi * 3.0 - 20.0, epsilon = 1e-14);
        assert_abs_diff_eq!(yf[1], -2.0, epsilon = 1e-14);

        let mut p = params();
        p.tensile_strength = None;
        let model = DruckerPragerCap::new(&p).unwrap();
        assert_eq!(model.num_yf(), 1);
    }

    #[test]
    fn effective_elasticity_works() {
        let model = DruckerPragerCap::new(&params()).unwrap();
        let ela = LinElasticity::new(900.0, 0.25);
        let (kk, gg) = ela.get_bulk_shear();
        let eff = model.effective_elasticity(ela.get_modulus()).unwrap();
        assert_abs_diff_eq!(eff.eij[(0, 0)], 9.0 * kk, epsilon = 1e-10);
        assert_abs_diff_eq!(eff.eij[(1, 1)], gg, epsilon = 1e-10);
        assert_eq!(eff.eij[(0, 1)], 0.0);
        assert_abs_diff_eq!(eff.en, gg, epsilon = 1e-10);
    }

    #[test]
    fn derivatives_match_finite_differences() {
        let model = DruckerPragerCap::new(&params()).unwrap();
        let stress = Tensor2::from_mandel(&[3.0, -1.0, 2.0, 0.5, -0.7, 1.1]);
        let mut dsp = vec![Tensor2::new(); 2];
        let mut d2sp = vec![Tensor4::new(); 2];
        model.dstress_params_dstress(&mut dsp, &stress).unwrap();
        model.d2stress_params_dstress(&mut d2sp, &stress).unwrap();
        let h = 1e-6;
        for k in 0..6 {
            let mut sp_plus = DVector::zeros(2);
            let mut sp_minus = DVector::zeros(2);
            let mut dsp_plus = vec![Tensor2::new(); 2];
            let mut dsp_minus = vec![Tensor2::new(); 2];
            let mut s_plus = stress.clone();
            let mut s_minus = stress.clone();
            s_plus.vector_mut()[k] += h;
            s_minus.vector_mut()[k] -= h;
            model.stress_params(&mut sp_plus, &s_plus).unwrap();
            model.stress_params(&mut sp_minus, &s_minus).unwrap();
            model.dstress_params_dstress(&mut dsp_plus, &s_plus).unwrap();
            model.dstress_params_dstress(&mut dsp_minus, &s_minus).unwrap();
            for a in 0..2 {
                let num = (sp_plus[a] - sp_minus[a]) / (2.0 * h);
                assert_abs_diff_eq!(dsp[a].vector()[k], num, epsilon = 1e-8);
                for i in 0..6 {
                    let num = (dsp_plus[a].vector()[i] - dsp_minus[a].vector()[i]) / (2.0 * h);
                    assert_abs_diff_eq!(d2sp[a].matrix()[(i, k)], num, epsilon = 1e-7);
                }
            }
        }
    }

    #[test]
    fn stress_after_return_works() {
        let model = DruckerPragerCap::new(&params()).unwrap();
        let stress_trial = Tensor2::from_mandel(&[3.0, -1.0, 2.0, 0.5, -0.7, 1.1]);
        let q_trial = f64::sqrt(stress_trial.invariant_jj2());
        let sp = DVector::from_column_slice(&[-6.0, 0.5 * q_trial]);
        let intnl = DVector::zeros(1);
        let smoothed = crate::material::YieldAndFlow::new(2, 1);
        let mut stress = Tensor2::new();
        model
            .stress_after_return(&mut stress, &stress_trial, &sp, 0.0, &intnl, &smoothed, &Tensor4::new())
            .unwrap();
        assert_abs_diff_eq!(stress.trace(), -6.0, epsilon = 1e-14);
        assert_abs_diff_eq!(f64::sqrt(stress.invariant_jj2()), 0.5 * q_trial, epsilon = 1e-14);
    }
}
