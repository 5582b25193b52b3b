use super::{RadialReturnModel, RadialReturnState, ScalarReturnMap};
use crate::StrError;

/// Implements power-law (Norton) creep integrated by backward Euler with radial return
///
/// ```text
/// r = A (σe - 3G Δp)ⁿ Δt - Δp
/// ```
#[derive(Clone, Debug)]
pub struct PowerLawCreep {
    /// Coefficient A
    coefficient: f64,

    /// Exponent n
    exponent: f64,

    /// Time increment Δt
    time_increment: f64,

    /// Three times the shear modulus
    three_shear_modulus: f64,
}

impl PowerLawCreep {
    /// Allocates a new instance
    pub fn new(coefficient: f64, exponent: f64, time_increment: f64) -> Self {
        PowerLawCreep {
            coefficient,
            exponent,
            time_increment,
            three_shear_modulus: 0.0,
        }
    }

    /// Sets the time increment
    pub fn set_time_increment(&mut self, time_increment: f64) {
        self.time_increment = time_increment;
    }

    /// Returns the (non-negative) effective stress after the increment
    fn effective_stress(&self, effective_trial_stress: f64, scalar: f64) -> f64 {
        f64::max(effective_trial_stress - self.three_shear_modulus * scalar, 0.0)
    }
}

impl ScalarReturnMap for PowerLawCreep {
    fn minimum_permissible_value(&self, _effective_trial_stress: f64) -> f64 {
        0.0
    }

    fn maximum_permissible_value(&self, effective_trial_stress: f64) -> f64 {
        effective_trial_stress / self.three_shear_modulus
    }

    fn compute_residual(&mut self, effective_trial_stress: f64, scalar: f64) -> Result<f64, StrError> {
        let sig = self.effective_stress(effective_trial_stress, scalar);
        Ok(self.coefficient * f64::powf(sig, self.exponent) * self.time_increment - scalar)
    }

    fn compute_derivative(&mut self, effective_trial_stress: f64, scalar: f64) -> Result<f64, StrError> {
        let sig = self.effective_stress(effective_trial_stress, scalar);
        let d = self.coefficient * self.exponent * f64::powf(sig, self.exponent - 1.0) * self.time_increment;
        Ok(-d * self.three_shear_modulus - 1.0)
    }

    fn compute_reference_residual(&self, effective_trial_stress: f64, _scalar: f64) -> f64 {
        effective_trial_stress / self.three_shear_modulus
    }
}

impl RadialReturnModel for PowerLawCreep {
    fn initialize(&mut self, _effective_trial_stress: f64, shear_modulus: f64, _state: &RadialReturnState) {
        self.three_shear_modulus = 3.0 * shear_modulus;
    }

    fn stress_derivative(&self, effective_trial_stress: f64, scalar: f64) -> f64 {
        let sig = self.effective_stress(effective_trial_stress, scalar);
        self.coefficient * self.exponent * f64::powf(sig, self.exponent - 1.0) * self.time_increment
    }

    fn finalize(&mut self, state: &mut RadialReturnState, _scalar: f64) {
        state.hardening_variable = state.hardening_variable_old;
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::PowerLawCreep;
    use crate::material::{RadialReturn, RadialReturnState, ScalarReturnMapSettings};
    use crate::tensor::{LinElasticity, Tensor2};
    use approx::assert_abs_diff_eq;

    #[test]
    fn linear_creep_matches_closed_form() {
        let rr = RadialReturn::new(&ScalarReturnMapSettings::new()).unwrap();
        let ela = LinElasticity::new(1000.0, 0.25);
        let (_, gg) = ela.get_bulk_shear();
        let (aa, dt) = (1e-3, 0.5);
        let mut model = PowerLawCreep::new(aa, 1.0, dt);
        let mut state = RadialReturnState::new();
        let stress_trial = Tensor2::from_mandel(&[20.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let res = rr.update_state(&mut model, &mut state, &stress_trial, &ela, false).unwrap();
        let dp = aa * 20.0 * dt / (1.0 + 3.0 * gg * aa * dt);
        assert_abs_diff_eq!(state.effective_inelastic_strain, dp, epsilon = 1e-12);
        assert_abs_diff_eq!(res.stress.invariant_sigma_d(), 20.0 - 3.0 * gg * dp, epsilon = 1e-9);
    }

    #[test]
    fn nonlinear_creep_satisfies_the_rate_equation() {
        let mut settings = ScalarReturnMapSettings::new();
        settings.check_range = true;
        let rr = RadialReturn::new(&settings).unwrap();
        let ela = LinElasticity::new(1000.0, 0.25);
        let (_, gg) = ela.get_bulk_shear();
        let (aa, nn, dt) = (1e-6, 3.0, 1.0);
        let mut model = PowerLawCreep::new(aa, nn, dt);
        model.set_time_increment(2.0 * dt);
        let mut state = RadialReturnState::new();
        let stress_trial = Tensor2::from_mandel(&[50.0, -10.0, 0.0, 5.0, 0.0, 0.0]);
        let sigma_e_trial = stress_trial.invariant_sigma_d();
        let res = rr.update_state(&mut model, &mut state, &stress_trial, &ela, true).unwrap();
        let dp = state.effective_inelastic_strain;
        let sigma_e = res.stress.invariant_sigma_d();
        assert!(dp > 0.0);
        assert_abs_diff_eq!(sigma_e, sigma_e_trial - 3.0 * gg * dp, epsilon = 1e-9);
        assert_abs_diff_eq!(aa * f64::powf(sigma_e, nn) * 2.0 * dt, dp, epsilon = 1e-9);
        assert!(res.tangent.is_some());
    }
}
