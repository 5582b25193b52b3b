use super::{EffectiveElasticity, MaterialPointState, MultiSurfaceModel, ReturnMapError, ReturnMapSettings};
use super::{YieldAndFlow, YieldSurfaceSmoother};
use crate::tensor::{Tensor2, Tensor4};
use crate::StrError;
use nalgebra::{DMatrix, DVector, Matrix6};

/// Holds the relative size below which a Newton update is lost in round-off
const PRECISION_LOSS_TOL: f64 = 1e-13;

/// Holds the smallest line-search parameter
const LAMBDA_MIN: f64 = 1e-10;

/// Holds the sufficient-decrease (Armijo) coefficient of the line search
const ARMIJO_COEF: f64 = 1e-4;

/// Holds the results of a stress update
#[derive(Clone, Debug)]
pub struct StressUpdate {
    /// Holds the returned stress
    pub stress: Tensor2,

    /// Holds the inelastic (plastic) strain increment
    pub inelastic_strain_increment: Tensor2,

    /// Holds the consistent tangent operator dσ/dε (if requested)
    pub tangent: Option<Tensor4>,
}

/// Holds the results of the return-map in the stress-parameter space
#[derive(Clone, Debug)]
pub struct ParamsReturn {
    /// Holds the returned stress parameters
    pub stress_params: DVector<f64>,

    /// Holds the plastic multiplier times En, summed over all sub-steps
    pub gae: f64,

    /// Holds the internal variables at the returned point
    pub internal_values: DVector<f64>,

    /// Holds the smoothed yield function and derivatives at the returned point
    pub smoothed: YieldAndFlow,

    /// Holds the derivatives of (stress_params, gae) with respect to the trial stress parameters
    ///
    /// The matrix is (num_sp + 1) × num_sp; it is only computed if the tangent was requested.
    pub dvar_dtrial: DMatrix<f64>,

    /// Holds the largest number of Newton iterations used by a sub-step
    pub iterations: usize,

    /// Holds the number of successful sub-steps (elastic and plastic)
    pub num_substeps: usize,

    /// Indicates that the line search had to backtrack
    pub linesearch_needed: bool,
}

/// Defines why a sub-step failed and must be retried with a smaller size
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryReason {
    /// Newton-Raphson did not converge within max_nr_iterations
    MaxIterations,

    /// The converged plastic multiplier is negative
    NegativeMultiplier,

    /// The Jacobian matrix could not be factorized
    SingularJacobian,

    /// The line search could not find a sufficient decrease of the residual
    LineSearchFailed,
}

/// Defines the outcome of one sub-step
#[derive(Clone, Debug)]
pub enum SubstepOutcome {
    /// The sub-step converged
    Converged(NewtonSolution),

    /// The sub-step failed and may be retried with a smaller size
    Retry(RetryReason),

    /// The model failed and the whole update must be aborted
    Fatal(StrError),
}

/// Holds the converged solution of one plastic sub-step
#[derive(Clone, Debug)]
pub struct NewtonSolution {
    /// Holds the stress parameters
    pub stress_params: DVector<f64>,

    /// Holds the plastic multiplier times En of this sub-step
    pub gae: f64,

    /// Holds the internal variables
    pub internal_values: DVector<f64>,

    /// Holds the smoothed yield function and derivatives
    pub smoothed: YieldAndFlow,

    /// Holds the number of Newton iterations
    pub iterations: usize,

    /// Indicates that the line search had to backtrack
    pub linesearch_needed: bool,
}

/// Holds the Newton-Raphson unknowns and the residual at the current point
struct Iterate {
    sp: DVector<f64>,
    gae: f64,
    intnl: DVector<f64>,
    smoothed: YieldAndFlow,
    rhs: DVector<f64>,
    res2: f64,
}

/// Defines the outcome of the line search
enum LineSearch {
    Accepted { backtracked: bool },
    Failed,
}

/// Implements the return-map for multi-surface plasticity with smoothed yield surfaces
///
/// The stress is described by `num_sp` stress parameters `sp` (see [MultiSurfaceModel]).
/// Given the trial parameters `sp_trial`, the return-map finds `sp` and `gaE = γ En` such that
///
/// ```text
/// R[i] = sp[i] - sp_trial[i] + (gaE/En) Σ_j Eij[i][j] dg/dsp[j] = 0
/// R[n] = f(sp, intnl) = 0
/// ```
///
/// where `f` and `g` are the smoothed yield function and flow potential. The problem is solved
/// by Newton-Raphson with a backtracking line search. If a sub-step fails, the trial increment
/// is split into smaller sub-steps (down to `min_step_size`).
///
/// The consistent tangent is exact for a single plastic step. With several sub-steps, the
/// sensitivity treats the internal variables at the start of each sub-step as independent
/// of the trial stress; thus the tangent is approximate when the internal variables change
/// the yield functions (e.g., hardening) and exact otherwise.
///
/// The solver holds only immutable data and may be shared among threads.
pub struct MultiParameterReturnMap<M: MultiSurfaceModel> {
    /// Holds the constitutive model
    model: M,

    /// Holds the configuration
    settings: ReturnMapSettings,

    /// Combines the yield functions
    smoother: YieldSurfaceSmoother,

    /// Holds the stress parameters assumed admissible on the first step
    definitely_ok_sp: DVector<f64>,

    /// Holds the squared yield-function tolerance
    f_tol2: f64,
}

impl<M: MultiSurfaceModel> MultiParameterReturnMap<M> {
    /// Allocates a new instance
    pub fn new(model: M, settings: &ReturnMapSettings) -> Result<Self, ReturnMapError> {
        let num_sp = model.num_sp();
        if num_sp < 1 || model.num_yf() < 1 {
            return Err(ReturnMapError::InvalidSettings(
                "the model must have at least one stress parameter and one yield function".to_string(),
            ));
        }
        if let Some(msg) = settings.validate(num_sp) {
            return Err(ReturnMapError::InvalidSettings(msg));
        }
        let smoother = YieldSurfaceSmoother::new(settings.smoothing_tol, settings.smoother_function_type)
            .map_err(|e| ReturnMapError::InvalidSettings(e.to_string()))?;
        let definitely_ok_sp = match &settings.admissible_stress {
            Some(sp) => DVector::from_column_slice(sp),
            None => DVector::zeros(num_sp),
        };
        Ok(MultiParameterReturnMap {
            model,
            settings: settings.clone(),
            smoother,
            definitely_ok_sp,
            f_tol2: settings.yield_function_tol * settings.yield_function_tol,
        })
    }

    /// Returns an access to the model
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Returns an access to the settings
    pub fn settings(&self) -> &ReturnMapSettings {
        &self.settings
    }

    /// Returns an access to the smoother
    pub fn smoother(&self) -> &YieldSurfaceSmoother {
        &self.smoother
    }

    /// Updates the stress and internal variables of one material point
    ///
    /// # Input
    ///
    /// * `state` -- the per-point state; the old values are read and the new ones written
    /// * `stress_trial` -- the trial stress `σ_old + D : Δε`
    /// * `stress_old` -- the stress at the last converged time step
    /// * `elasticity` -- the elasticity tensor `D`
    /// * `need_tangent` -- computes the consistent tangent operator
    pub fn update_state(
        &self,
        state: &mut MaterialPointState,
        stress_trial: &Tensor2,
        stress_old: &Tensor2,
        elasticity: &Tensor4,
        need_tangent: bool,
    ) -> Result<StressUpdate, ReturnMapError> {
        let num_sp = self.model.num_sp();
        check_size("internal values", self.model.num_intnl(), state.internal_values_old.len())?;
        check_size("internal values", self.model.num_intnl(), state.internal_values.len())?;
        check_size("yield function values", self.model.num_yf(), state.yield_function_values.len())?;

        // elastic predictor
        state.internal_values.copy_from(&state.internal_values_old);
        state.plastic_strain.set_tensor(1.0, &state.plastic_strain_old);
        state.iterations = 0;
        state.max_iterations_used = state.max_iterations_used_old;
        state.linesearch_needed = false;

        // check the trial stress
        let mut trial_sp = DVector::zeros(num_sp);
        self.model.stress_params(&mut trial_sp, stress_trial)?;
        self.model
            .yield_function_values(&mut state.yield_function_values, &trial_sp, &state.internal_values_old)?;
        let f_trial = self.smoother.aggregate_yield_value(state.yield_function_values.as_slice());
        if f_trial <= self.settings.yield_function_tol {
            return Ok(StressUpdate {
                stress: stress_trial.clone(),
                inelastic_strain_increment: Tensor2::new(),
                tangent: if need_tangent { Some(elasticity.clone()) } else { None },
            });
        }

        // starting point of the sub-stepping
        let eff = self.model.effective_elasticity(elasticity)?;
        let mut ok_sp = DVector::zeros(num_sp);
        if state.first_step {
            if self.settings.admissible_stress.is_none() {
                log::debug!("first step: assuming that the origin of the stress-parameter space is admissible");
            }
            ok_sp.copy_from(&self.definitely_ok_sp);
        } else {
            self.model.stress_params(&mut ok_sp, stress_old)?;
        }

        // return-map
        let res = self.return_map_params(&trial_sp, &ok_sp, &state.internal_values_old, &eff, need_tangent)?;
        state.internal_values.copy_from(&res.internal_values);
        state.iterations = res.iterations;
        state.max_iterations_used = usize::max(state.max_iterations_used, res.iterations);
        state.linesearch_needed = res.linesearch_needed;
        self.model.yield_function_values(
            &mut state.yield_function_values,
            &res.stress_params,
            &res.internal_values,
        )?;

        // stress
        let mut stress = Tensor2::new();
        self.model.stress_after_return(
            &mut stress,
            stress_trial,
            &res.stress_params,
            res.gae,
            &res.internal_values,
            &res.smoothed,
            elasticity,
        )?;

        // inelastic strain increment: (gaE/En) Σ_i dg/dsp[i] dsp[i]/dσ
        let mut dsp = vec![Tensor2::new(); num_sp];
        self.model.dstress_params_dstress(&mut dsp, &stress)?;
        let mut inelastic = Tensor2::new();
        for i in 0..num_sp {
            inelastic.update(res.gae / eff.en * res.smoothed.dg[i], &dsp[i]);
        }
        state.plastic_strain.update(1.0, &inelastic);

        // tangent
        let tangent = if need_tangent {
            Some(self.consistent_tangent(stress_trial, &stress, &dsp, &res, &eff, elasticity)?)
        } else {
            None
        };
        Ok(StressUpdate {
            stress,
            inelastic_strain_increment: inelastic,
            tangent,
        })
    }

    /// Performs the return-map in the stress-parameter space (with sub-stepping)
    ///
    /// # Input
    ///
    /// * `trial_sp` -- the trial stress parameters
    /// * `ok_sp` -- admissible stress parameters from where the sub-stepping starts
    /// * `intnl_old` -- the internal variables at `ok_sp`
    /// * `eff` -- the effective elasticity
    /// * `need_tangent` -- computes the sensitivity matrix `dvar_dtrial`
    pub fn return_map_params(
        &self,
        trial_sp: &DVector<f64>,
        ok_sp: &DVector<f64>,
        intnl_old: &DVector<f64>,
        eff: &EffectiveElasticity,
        need_tangent: bool,
    ) -> Result<ParamsReturn, ReturnMapError> {
        let num_sp = self.model.num_sp();
        let num_intnl = self.model.num_intnl();
        check_size("trial stress parameters", num_sp, trial_sp.len())?;
        check_size("admissible stress parameters", num_sp, ok_sp.len())?;
        check_size("internal values", num_intnl, intnl_old.len())?;
        check_size("effective elasticity rows", num_sp, eff.dim())?;

        let del = trial_sp - ok_sp;
        let mut ok_sp = ok_sp.clone();
        let mut ok_intnl = intnl_old.clone();
        let mut dvar_dtrial = DMatrix::zeros(num_sp + 1, num_sp);
        let mut smoothed: Option<YieldAndFlow> = None;
        let mut gae_total = 0.0;
        let mut step_taken = 0.0;
        let mut step_size = self.settings.initial_step_size;
        let mut iterations = 0;
        let mut num_substeps = 0;
        let mut linesearch_needed = false;
        let mut yf = DVector::zeros(self.model.num_yf());
        let mut intnl = DVector::zeros(num_intnl);

        while step_taken < 1.0 && step_size >= self.settings.min_step_size {
            if 1.0 - step_taken < step_size {
                step_size = 1.0 - step_taken;
            }
            let sub_trial = &ok_sp + &del * step_size;

            // elastic sub-step
            if step_size < 1.0 {
                self.model.yield_function_values(&mut yf, &sub_trial, &ok_intnl)?;
                if self.smoother.aggregate_yield_value(yf.as_slice()) <= self.settings.yield_function_tol {
                    self.model
                        .set_intnl_values(&mut intnl, &sub_trial, &sub_trial, &ok_intnl, eff)?;
                    ok_sp.copy_from(&sub_trial);
                    ok_intnl.copy_from(&intnl);
                    if need_tangent {
                        for v in 0..num_sp {
                            dvar_dtrial[(v, v)] += step_size;
                        }
                    }
                    smoothed = None;
                    step_taken += step_size;
                    num_substeps += 1;
                    step_size *= 1.1;
                    continue;
                }
            }

            // plastic sub-step
            let sol = match self.substep(&sub_trial, &ok_intnl, eff) {
                SubstepOutcome::Converged(sol) => sol,
                SubstepOutcome::Retry(reason) => {
                    log::debug!("sub-step of size {:e} failed ({:?}); halving it", step_size, reason);
                    step_size *= 0.5;
                    continue;
                }
                SubstepOutcome::Fatal(err) => return Err(ReturnMapError::Model(err)),
            };
            self.model
                .set_intnl_values(&mut intnl, &sub_trial, &sol.stress_params, &ok_intnl, eff)?;
            if need_tangent {
                match self.sensitivity(&dvar_dtrial, &sub_trial, &sol, &intnl, step_size, eff)? {
                    Some(dvar) => dvar_dtrial = dvar,
                    None => {
                        log::debug!("sub-step of size {:e} failed (singular sensitivity); halving it", step_size);
                        step_size *= 0.5;
                        continue;
                    }
                }
            }
            ok_sp.copy_from(&sol.stress_params);
            ok_intnl.copy_from(&intnl);
            gae_total += sol.gae;
            step_taken += step_size;
            iterations = usize::max(iterations, sol.iterations);
            linesearch_needed = linesearch_needed || sol.linesearch_needed;
            smoothed = Some(sol.smoothed);
            num_substeps += 1;
            step_size *= 1.1;
        }

        if step_taken < 1.0 {
            return Err(ReturnMapError::MinStepSizeViolated {
                step_size,
                min_step_size: self.settings.min_step_size,
                step_taken,
            });
        }

        // the last sub-step may have been elastic
        let smoothed = match smoothed {
            Some(q) => q,
            None => self.smooth_all(&ok_sp, &ok_intnl)?,
        };

        Ok(ParamsReturn {
            stress_params: ok_sp,
            gae: gae_total,
            internal_values: ok_intnl,
            smoothed,
            dvar_dtrial,
            iterations,
            num_substeps,
            linesearch_needed,
        })
    }

    /// Performs one plastic sub-step
    pub fn substep(
        &self,
        trial_sp: &DVector<f64>,
        intnl_ok: &DVector<f64>,
        eff: &EffectiveElasticity,
    ) -> SubstepOutcome {
        match self.newton_raphson(trial_sp, intnl_ok, eff) {
            Ok(outcome) => outcome,
            Err(err) => SubstepOutcome::Fatal(err),
        }
    }

    /// Smooths all yield functions at the given point
    pub fn smooth_all(&self, sp: &DVector<f64>, intnl: &DVector<f64>) -> Result<YieldAndFlow, StrError> {
        let mut all = vec![YieldAndFlow::new(self.model.num_sp(), self.model.num_intnl()); self.model.num_yf()];
        self.model.compute_all_surfaces(&mut all, sp, intnl)?;
        self.smoother.smooth(all)
    }

    /// Runs the Newton-Raphson iterations with line search
    fn newton_raphson(
        &self,
        trial_sp: &DVector<f64>,
        intnl_ok: &DVector<f64>,
        eff: &EffectiveElasticity,
    ) -> Result<SubstepOutcome, StrError> {
        let num_sp = self.model.num_sp();
        let num_intnl = self.model.num_intnl();

        // initial guess
        let mut sp = DVector::zeros(num_sp);
        let mut gae = 0.0;
        let mut intnl = DVector::zeros(num_intnl);
        self.model
            .initialize_vars(&mut sp, &mut gae, &mut intnl, trial_sp, intnl_ok);
        let smoothed = self.smooth_all(&sp, &intnl)?;
        let rhs = self.calculate_rhs(trial_sp, &sp, gae, &smoothed, eff);
        let res2 = rhs.norm_squared();
        let mut it = Iterate {
            sp,
            gae,
            intnl,
            smoothed,
            rhs,
            res2,
        };

        // iterations
        let mut iterations = 0;
        let mut linesearch_needed = false;
        let mut dintnl = DMatrix::zeros(num_intnl, num_sp);
        while it.res2 > self.f_tol2 {
            if iterations >= self.settings.max_nr_iterations {
                return Ok(SubstepOutcome::Retry(RetryReason::MaxIterations));
            }
            self.model
                .set_intnl_derivatives(&mut dintnl, trial_sp, &it.sp, &it.intnl, eff)?;
            let jac = self.jacobian(&it.smoothed, &dintnl, it.gae, eff);
            let delta = match jac.lu().solve(&it.rhs) {
                Some(x) => x,
                None => return Ok(SubstepOutcome::Retry(RetryReason::SingularJacobian)),
            };
            if self.precision_loss(&delta, &it.sp, it.gae) {
                if self.settings.warn_about_precision_loss {
                    log::warn!(
                        "Newton-Raphson update lost in round-off (res2 = {:e}); accepting the point",
                        it.res2
                    );
                }
                break;
            }
            match self.line_search(&mut it, &delta, trial_sp, intnl_ok, eff)? {
                LineSearch::Accepted { backtracked } => linesearch_needed = linesearch_needed || backtracked,
                LineSearch::Failed => return Ok(SubstepOutcome::Retry(RetryReason::LineSearchFailed)),
            }
            iterations += 1;
        }
        if it.gae < 0.0 {
            return Ok(SubstepOutcome::Retry(RetryReason::NegativeMultiplier));
        }
        Ok(SubstepOutcome::Converged(NewtonSolution {
            stress_params: it.sp,
            gae: it.gae,
            internal_values: it.intnl,
            smoothed: it.smoothed,
            iterations,
            linesearch_needed,
        }))
    }

    /// Computes the residual vector (num_sp + 1)
    fn calculate_rhs(
        &self,
        trial_sp: &DVector<f64>,
        sp: &DVector<f64>,
        gae: f64,
        smoothed: &YieldAndFlow,
        eff: &EffectiveElasticity,
    ) -> DVector<f64> {
        let n = sp.len();
        let ga = gae / eff.en;
        let edg = &eff.eij * &smoothed.dg;
        let mut rhs = DVector::zeros(n + 1);
        for i in 0..n {
            rhs[i] = sp[i] - trial_sp[i] + ga * edg[i];
        }
        rhs[n] = smoothed.f;
        rhs
    }

    /// Computes the Jacobian of -rhs with respect to (sp, gaE)
    ///
    /// The internal variables are functions of sp with derivatives `dintnl` (num_intnl × num_sp).
    fn jacobian(
        &self,
        smoothed: &YieldAndFlow,
        dintnl: &DMatrix<f64>,
        gae: f64,
        eff: &EffectiveElasticity,
    ) -> DMatrix<f64> {
        let n = smoothed.num_sp();
        let ga = gae / eff.en;
        let hh = &smoothed.d2g + &smoothed.d2g_di * dintnl;
        let ehh = &eff.eij * hh;
        let df = &smoothed.df + dintnl.transpose() * &smoothed.df_di;
        let edg = &eff.eij * &smoothed.dg;
        let mut jac = DMatrix::zeros(n + 1, n + 1);
        for var in 0..n {
            for row in 0..n {
                jac[(row, var)] = -ga * ehh[(row, var)];
            }
            jac[(var, var)] -= 1.0;
            jac[(n, var)] = -df[var];
        }
        for row in 0..n {
            jac[(row, n)] = -edg[row] / eff.en;
        }
        jac
    }

    /// Checks whether the Newton update is lost in round-off
    fn precision_loss(&self, delta: &DVector<f64>, sp: &DVector<f64>, gae: f64) -> bool {
        let n = sp.len();
        if f64::abs(delta[n]) > PRECISION_LOSS_TOL * f64::abs(gae) {
            return false;
        }
        (0..n).all(|i| f64::abs(delta[i]) <= PRECISION_LOSS_TOL * f64::abs(sp[i]))
    }

    /// Performs the backtracking line search along the Newton direction
    ///
    /// The first backtrack minimizes a quadratic model of `|R|²` and the next ones a cubic model.
    fn line_search(
        &self,
        it: &mut Iterate,
        delta: &DVector<f64>,
        trial_sp: &DVector<f64>,
        intnl_ok: &DVector<f64>,
        eff: &EffectiveElasticity,
    ) -> Result<LineSearch, StrError> {
        let n = it.sp.len();
        let res2_old = it.res2;
        let sp_old = it.sp.clone();
        let gae_old = it.gae;
        let slope = -2.0 * res2_old;
        let mut lam = 1.0;
        let mut lam2 = lam;
        let mut f2 = res2_old;
        loop {
            // update variables
            for i in 0..n {
                it.sp[i] = sp_old[i] + lam * delta[i];
            }
            it.gae = gae_old + lam * delta[n];
            self.model.set_intnl_values(&mut it.intnl, trial_sp, &it.sp, intnl_ok, eff)?;
            it.smoothed = self.smooth_all(&it.sp, &it.intnl)?;
            it.rhs = self.calculate_rhs(trial_sp, &it.sp, it.gae, &it.smoothed, eff);
            it.res2 = it.rhs.norm_squared();

            // check sufficient decrease
            if it.res2 < res2_old + ARMIJO_COEF * lam * slope {
                break;
            }
            if lam < LAMBDA_MIN {
                return Ok(LineSearch::Failed);
            }
            let mut tmp_lam = if lam == 1.0 {
                // quadratic model
                -0.5 * slope / (it.res2 - res2_old - slope)
            } else {
                // cubic model
                let rhs1 = it.res2 - res2_old - lam * slope;
                let rhs2 = f2 - res2_old - lam2 * slope;
                let a = (rhs1 / (lam * lam) - rhs2 / (lam2 * lam2)) / (lam - lam2);
                let b = (-lam2 * rhs1 / (lam * lam) + lam * rhs2 / (lam2 * lam2)) / (lam - lam2);
                if a == 0.0 {
                    -slope / (2.0 * b)
                } else {
                    let disc = b * b - 3.0 * a * slope;
                    if disc < 0.0 {
                        0.5 * lam
                    } else if b <= 0.0 {
                        (-b + f64::sqrt(disc)) / (3.0 * a)
                    } else {
                        -slope / (b + f64::sqrt(disc))
                    }
                }
            };
            if tmp_lam > 0.5 * lam {
                tmp_lam = 0.5 * lam;
            }
            lam2 = lam;
            f2 = it.res2;
            lam = f64::max(tmp_lam, 0.1 * lam);
        }
        Ok(LineSearch::Accepted { backtracked: lam < 1.0 })
    }

    /// Updates the sensitivity matrix d(sp, gaE)/d(sp_trial) after a converged plastic sub-step
    ///
    /// Returns None if the Jacobian is singular at the converged point.
    /// The internal variables at the start of the sub-step are held fixed.
    fn sensitivity(
        &self,
        dvar_dtrial: &DMatrix<f64>,
        trial_sp: &DVector<f64>,
        sol: &NewtonSolution,
        intnl: &DVector<f64>,
        step_size: f64,
        eff: &EffectiveElasticity,
    ) -> Result<Option<DMatrix<f64>>, StrError> {
        let n = self.model.num_sp();
        let ga = sol.gae / eff.en;
        let q = &sol.smoothed;
        let mut dintnl = DMatrix::zeros(self.model.num_intnl(), n);
        self.model
            .set_intnl_derivatives(&mut dintnl, trial_sp, &sol.stress_params, intnl, eff)?;

        // changes of rhs with respect to sp_trial, using d(intnl)/d(sp_trial) = -d(intnl)/d(sp)
        let e_d2g_di_dintnl = &eff.eij * &q.d2g_di * &dintnl;
        let df_di_dintnl = q.df_di.transpose() * &dintnl;
        let mut rhs_cto = DMatrix::zeros(n + 1, n);
        for a in 0..n {
            for b in 0..n {
                rhs_cto[(b, a)] = -ga * e_d2g_di_dintnl[(b, a)];
            }
            rhs_cto[(a, a)] -= 1.0;
            rhs_cto[(n, a)] = -df_di_dintnl[a];
        }

        // solve with the Jacobian of -rhs
        let jac = self.jacobian(q, &dintnl, sol.gae, eff);
        let x = match jac.lu().solve(&rhs_cto) {
            Some(x) => x,
            None => return Ok(None),
        };

        // compose with the previous sub-steps
        let mut dvar = dvar_dtrial.clone();
        for s in 0..n {
            for v in 0..n {
                let mut sum = step_size * x[(v, s)];
                for a in 0..n {
                    sum += x[(v, a)] * dvar_dtrial[(a, s)];
                }
                dvar[(v, s)] = sum;
            }
            let mut sum = step_size * x[(n, s)];
            for a in 0..n {
                sum += x[(n, a)] * dvar_dtrial[(a, s)];
            }
            dvar[(n, s)] += sum;
        }
        Ok(Some(dvar))
    }

    /// Computes the consistent tangent operator dσ/dε
    ///
    /// ```text
    /// cto = D - Σ_ab (D : (Cij[b][a] - Σ_c Cij[b][c] dvar[c][a]) dsp_b) ⊗ (D : dsp_trial_a)
    /// T   = (gaE/En) D : Σ_i dg/dsp[i] d²sp_i
    /// cto ← (I + T)⁻¹ : cto
    /// ```
    fn consistent_tangent(
        &self,
        stress_trial: &Tensor2,
        stress: &Tensor2,
        dsp: &[Tensor2],
        res: &ParamsReturn,
        eff: &EffectiveElasticity,
        elasticity: &Tensor4,
    ) -> Result<Tensor4, StrError> {
        let n = self.model.num_sp();
        let dd = elasticity.matrix();
        let mut dsp_trial = vec![Tensor2::new(); n];
        self.model.dstress_params_dstress(&mut dsp_trial, stress_trial)?;

        let mut cto = *dd;
        for a in 0..n {
            let t = dd * dsp_trial[a].vector();
            for b in 0..n {
                let mut coef = eff.cij[(b, a)];
                for c in 0..n {
                    coef -= eff.cij[(b, c)] * res.dvar_dtrial[(c, a)];
                }
                if coef == 0.0 {
                    continue;
                }
                let s = dd * dsp[b].vector() * coef;
                cto -= s * t.transpose();
            }
        }

        let mut d2sp = vec![Tensor4::new(); n];
        self.model.d2stress_params_dstress(&mut d2sp, stress)?;
        let mut sum = Matrix6::zeros();
        for i in 0..n {
            sum += d2sp[i].matrix() * res.smoothed.dg[i];
        }
        let tt = dd * sum * (res.gae / eff.en);
        match (Matrix6::identity() + tt).try_inverse() {
            Some(inv) => Ok(Tensor4::from_matrix(inv * cto)),
            None => {
                log::warn!("cannot invert (I + T) in the consistent tangent operator; using the elastic tangent");
                Ok(elasticity.clone())
            }
        }
    }
}

/// Returns an error if the sizes differ
fn check_size(what: &'static str, expected: usize, found: usize) -> Result<(), ReturnMapError> {
    if found != expected {
        return Err(ReturnMapError::StateSize { what, expected, found });
    }
    Ok(())
}
