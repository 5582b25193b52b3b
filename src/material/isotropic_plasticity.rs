use super::{RadialReturnModel, RadialReturnState, ScalarReturnMap};
use crate::StrError;

/// Implements J2 plasticity with linear isotropic hardening (radial return)
///
/// ```text
/// f = σe - 3G Δp - (r_old + H Δp) - σy
/// ```
///
/// The residual is normalized by 3G so that it has units of strain.
#[derive(Clone, Debug)]
pub struct IsotropicPlasticity {
    /// Initial yield stress σy
    yield_stress: f64,

    /// Hardening modulus H
    hardening_constant: f64,

    /// Three times the shear modulus
    three_shear_modulus: f64,

    /// Yield function value at the trial state (positive means plastic loading)
    yield_condition: f64,

    /// Current hardening variable
    hardening_variable: f64,

    /// Hardening variable at the last converged time step
    hardening_variable_old: f64,
}

impl IsotropicPlasticity {
    /// Allocates a new instance
    pub fn new(yield_stress: f64, hardening_constant: f64) -> Self {
        IsotropicPlasticity {
            yield_stress,
            hardening_constant,
            three_shear_modulus: 0.0,
            yield_condition: -1.0,
            hardening_variable: 0.0,
            hardening_variable_old: 0.0,
        }
    }

    /// Returns the yield function value at the trial state
    pub fn yield_condition(&self) -> f64 {
        self.yield_condition
    }
}

impl ScalarReturnMap for IsotropicPlasticity {
    fn minimum_permissible_value(&self, _effective_trial_stress: f64) -> f64 {
        0.0
    }

    fn maximum_permissible_value(&self, effective_trial_stress: f64) -> f64 {
        effective_trial_stress / self.three_shear_modulus
    }

    fn compute_residual(&mut self, effective_trial_stress: f64, scalar: f64) -> Result<f64, StrError> {
        if self.yield_condition <= 0.0 {
            return Ok(0.0);
        }
        self.hardening_variable = self.hardening_variable_old + self.hardening_constant * scalar;
        Ok((effective_trial_stress - self.hardening_variable - self.yield_stress) / self.three_shear_modulus - scalar)
    }

    fn compute_derivative(&mut self, _effective_trial_stress: f64, _scalar: f64) -> Result<f64, StrError> {
        if self.yield_condition <= 0.0 {
            return Ok(1.0);
        }
        Ok(-1.0 - self.hardening_constant / self.three_shear_modulus)
    }

    fn compute_reference_residual(&self, effective_trial_stress: f64, _scalar: f64) -> f64 {
        effective_trial_stress / self.three_shear_modulus
    }

    fn iteration_finalize(&mut self, scalar: f64) {
        self.hardening_variable = self.hardening_variable_old + self.hardening_constant * scalar;
    }
}

impl RadialReturnModel for IsotropicPlasticity {
    fn initialize(&mut self, effective_trial_stress: f64, shear_modulus: f64, state: &RadialReturnState) {
        self.three_shear_modulus = 3.0 * shear_modulus;
        self.hardening_variable_old = state.hardening_variable_old;
        self.hardening_variable = state.hardening_variable_old;
        self.yield_condition = effective_trial_stress - self.hardening_variable_old - self.yield_stress;
    }

    fn stress_derivative(&self, _effective_trial_stress: f64, _scalar: f64) -> f64 {
        if self.yield_condition <= 0.0 {
            return 0.0;
        }
        1.0 / self.three_shear_modulus
    }

    fn finalize(&mut self, state: &mut RadialReturnState, scalar: f64) {
        self.hardening_variable = self.hardening_variable_old + self.hardening_constant * scalar;
        state.hardening_variable = self.hardening_variable;
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
