use super::{ScalarReturnMap, ScalarReturnMapSettings, ScalarReturnMapSolver, StressUpdate};
use crate::tensor::{t2_dyad_t2_update, LinElasticity, Tensor2, Tensor4, SQRT_3_BY_2};
use crate::StrError;

/// Holds the per-integration-point data of radial-return models
#[derive(Clone, Debug)]
pub struct RadialReturnState {
    /// Holds the accumulated effective inelastic strain
    pub effective_inelastic_strain: f64,

    /// Holds the effective inelastic strain at the last converged time step
    pub effective_inelastic_strain_old: f64,

    /// Holds the hardening variable (e.g., increase of the yield stress)
    pub hardening_variable: f64,

    /// Holds the hardening variable at the last converged time step
    pub hardening_variable_old: f64,

    /// Holds the accumulated inelastic strain tensor
    pub inelastic_strain: Tensor2,

    /// Holds the inelastic strain tensor at the last converged time step
    pub inelastic_strain_old: Tensor2,
}

impl RadialReturnState {
    /// Allocates a new instance
    pub fn new() -> Self {
        RadialReturnState {
            effective_inelastic_strain: 0.0,
            effective_inelastic_strain_old: 0.0,
            hardening_variable: 0.0,
            hardening_variable_old: 0.0,
            inelastic_strain: Tensor2::new(),
            inelastic_strain_old: Tensor2::new(),
        }
    }

    /// Accepts the current values at the end of a converged time step
    pub fn commit(&mut self) {
        self.effective_inelastic_strain_old = self.effective_inelastic_strain;
        self.hardening_variable_old = self.hardening_variable;
        self.inelastic_strain_old.set_tensor(1.0, &self.inelastic_strain);
    }
}

/// Defines a J2 (von Mises type) model solved by radial return
///
/// The scalar unknown is the effective inelastic strain increment Δp.
pub trait RadialReturnModel: ScalarReturnMap {
    /// Prepares the model for a new update
    fn initialize(&mut self, effective_trial_stress: f64, shear_modulus: f64, state: &RadialReturnState);

    /// Returns the derivative of the residual with respect to the effective trial stress
    fn stress_derivative(&self, effective_trial_stress: f64, scalar: f64) -> f64;

    /// Writes the model history into the state after convergence
    fn finalize(&mut self, state: &mut RadialReturnState, scalar: f64);
}

/// Implements the radial-return stress update for isotropic elasticity
///
/// ```text
/// σe  = √(3/2) |s_trial|
/// Δεp = 3/2 Δp s_trial / σe
/// σ   = σ_trial - 2G Δεp
/// ```
pub struct RadialReturn {
    /// Solves the scalar problem
    solver: ScalarReturnMapSolver,
}

impl RadialReturn {
    /// Allocates a new instance
    pub fn new(settings: &ScalarReturnMapSettings) -> Result<Self, StrError> {
        Ok(RadialReturn {
            solver: ScalarReturnMapSolver::new(settings)?,
        })
    }

    /// Updates the stress and the state of one material point
    pub fn update_state<M: RadialReturnModel>(
        &self,
        model: &mut M,
        state: &mut RadialReturnState,
        stress_trial: &Tensor2,
        elasticity: &LinElasticity,
        need_tangent: bool,
    ) -> Result<StressUpdate, StrError> {
        let (kk, gg) = elasticity.get_bulk_shear();
        let mut s_trial = Tensor2::new();
        stress_trial.deviator(&mut s_trial);
        let sigma_e = SQRT_3_BY_2 * s_trial.norm();

        // solve for Δp
        model.initialize(sigma_e, gg, state);
        let mut dp = 0.0;
        if sigma_e > 0.0 {
            dp = self.solver.solve(model, sigma_e)?.scalar;
        }

        // inelastic strain increment and stress
        let mut inelastic = Tensor2::new();
        if sigma_e > 0.0 {
            inelastic.set_tensor(1.5 * dp / sigma_e, &s_trial);
        }
        let mut stress = stress_trial.clone();
        stress.update(-2.0 * gg, &inelastic);

        // state
        model.finalize(state, dp);
        state.effective_inelastic_strain = state.effective_inelastic_strain_old + dp;
        state.inelastic_strain.set_tensor(1.0, &state.inelastic_strain_old);
        state.inelastic_strain.update(1.0, &inelastic);

        // tangent
        let tangent = if !need_tangent {
            None
        } else if dp == 0.0 {
            Some(elasticity.get_modulus().clone())
        } else {
            let dr_dse = model.stress_derivative(sigma_e, dp);
            let dr_ddp = model.compute_derivative(sigma_e, dp)?;
            let deriv = -dr_dse / dr_ddp;
            let mut n = Tensor2::new();
            n.set_tensor(1.0 / s_trial.norm(), &s_trial);
            let a = 2.0 * gg * (1.0 - 3.0 * gg * dp / sigma_e);
            let b = -6.0 * gg * gg * (deriv - dp / sigma_e);
            let mut dd = Tensor4::p_symdev();
            *dd.matrix_mut() *= a;
            *dd.matrix_mut() += Tensor4::ii_dyad_ii().matrix() * kk;
            t2_dyad_t2_update(&mut dd, b, &n, &n);
            Some(dd)
        };

        Ok(StressUpdate {
            stress,
            inelastic_strain_increment: inelastic,
            tangent,
        })
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{RadialReturn, RadialReturnState};
    use crate::material::{IsotropicPlasticity, ScalarReturnMapSettings};
    use crate::tensor::{LinElasticity, Tensor2};
    use approx::assert_abs_diff_eq;

    #[test]
    fn state_commit_works() {
        let mut state = RadialReturnState::new();
        state.effective_inelastic_strain = 0.1;
        state.hardening_variable = 2.0;
        state.inelastic_strain.vector_mut()[3] = 0.5;
        state.commit();
        assert_eq!(state.effective_inelastic_strain_old, 0.1);
        assert_eq!(state.hardening_variable_old, 2.0);
        assert_eq!(state.inelastic_strain_old.vector()[3], 0.5);
    }

    #[test]
    fn zero_deviator_is_elastic() {
        let rr = RadialReturn::new(&ScalarReturnMapSettings::new()).unwrap();
        let ela = LinElasticity::new(1000.0, 0.25);
        let mut model = IsotropicPlasticity::new(1.0, 10.0);
        let mut state = RadialReturnState::new();
        let stress_trial = Tensor2::from_mandel(&[-5.0, -5.0, -5.0, 0.0, 0.0, 0.0]);
        let res = rr.update_state(&mut model, &mut state, &stress_trial, &ela, true).unwrap();
        assert_eq!(res.stress, stress_trial);
        assert_eq!(res.inelastic_strain_increment, Tensor2::new());
        assert_eq!(res.tangent.unwrap().matrix(), ela.get_modulus().matrix());
        assert_abs_diff_eq!(state.effective_inelastic_strain, 0.0);
    }

    #[test]
    fn tangent_matches_finite_differences() {
        let rr = RadialReturn::new(&ScalarReturnMapSettings::new()).unwrap();
        let ela = LinElasticity::new(1000.0, 0.25);
        let mut model = IsotropicPlasticity::new(5.0, 50.0);
        let strain = Tensor2::from_mandel(&[0.01, -0.002, 0.001, 0.004, -0.003, 0.002]);
        let mut stress_trial = Tensor2::new();
        ela.calc_stress(&mut stress_trial, &strain);

        let mut state = RadialReturnState::new();
        let res = rr.update_state(&mut model, &mut state, &stress_trial, &ela, true).unwrap();
        assert!(state.effective_inelastic_strain > 0.0);
        let tangent = res.tangent.unwrap();

        let h = 1e-7;
        for k in 0..6 {
            let mut strain_h = strain.clone();
            strain_h.vector_mut()[k] += h;
            let mut trial_h = Tensor2::new();
            ela.calc_stress(&mut trial_h, &strain_h);
            let mut state_h = RadialReturnState::new();
            let res_h = rr.update_state(&mut model, &mut state_h, &trial_h, &ela, false).unwrap();
            for i in 0..6 {
                let num = (res_h.stress.vector()[i] - res.stress.vector()[i]) / h;
                assert_abs_diff_eq!(tangent.matrix()[(i, k)], num, epsilon = 1e-2);
            }
        }
    }
}
