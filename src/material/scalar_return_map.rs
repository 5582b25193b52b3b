use crate::StrError;
use serde::{Deserialize, Serialize};

/// Holds the number of residuals kept to detect stagnation
const NUM_RESIDUALS: usize = 30;

/// Holds the smallest step fraction of the scalar line search
const LINE_SEARCH_MIN_ALPHA: f64 = 0.01;

/// Defines the state of the scalar return-map solver
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveState {
    /// The iterations are running
    Iterating,

    /// The residual satisfies the (possibly relaxed) tolerance
    Converged,

    /// The maximum number of iterations was reached before convergence
    ExceededIterations,

    /// The residual became NaN or infinite
    NanInf,
}

/// Holds the configuration of the scalar return-map solver
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ScalarReturnMapSettings {
    /// Maximum number of iterations
    pub max_iterations: usize,

    /// Relative tolerance: |r / reference| ≤ relative_tolerance
    pub relative_tolerance: f64,

    /// Absolute tolerance: |r| ≤ absolute_tolerance
    pub absolute_tolerance: f64,

    /// Loosens the tolerances when the residual stagnates
    pub acceptable_multiplier: f64,

    /// Enables the line search
    pub line_search: bool,

    /// Keeps the iterates within the tightest interval where the residual changes sign
    pub bracket_solution: bool,

    /// Halves the step towards a violated permissible bound
    pub check_range: bool,
}

impl ScalarReturnMapSettings {
    /// Allocates a new instance with default values
    pub fn new() -> Self {
        ScalarReturnMapSettings {
            max_iterations: 1000,
            relative_tolerance: 1e-8,
            absolute_tolerance: 1e-11,
            acceptable_multiplier: 10.0,
            line_search: false,
            bracket_solution: true,
            check_range: false,
        }
    }

    /// Validates all data
    ///
    /// Returns a message with the inconsistent data, or returns None if everything is all right.
    pub fn validate(&self) -> Option<String> {
        if self.max_iterations < 1 {
            return Some(format!(
                "max_iterations = {} is incorrect; it must be ≥ 1",
                self.max_iterations
            ));
        }
        if !(self.relative_tolerance > 0.0) {
            return Some(format!(
                "relative_tolerance = {:?} is incorrect; it must be > 0.0",
                self.relative_tolerance
            ));
        }
        if !(self.absolute_tolerance > 0.0) {
            return Some(format!(
                "absolute_tolerance = {:?} is incorrect; it must be > 0.0",
                self.absolute_tolerance
            ));
        }
        if !(self.acceptable_multiplier >= 1.0) {
            return Some(format!(
                "acceptable_multiplier = {:?} is incorrect; it must be ≥ 1.0",
                self.acceptable_multiplier
            ));
        }
        None // all good
    }
}

impl Default for ScalarReturnMapSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// Defines the interface of a model solved by the scalar return-map
///
/// The unknown is a single scalar (e.g., the effective inelastic strain increment) and
/// the residual is a function of this scalar and of the effective trial stress.
pub trait ScalarReturnMap {
    /// Returns the initial guess of the scalar
    fn initial_guess(&mut self, _effective_trial_stress: f64) -> f64 {
        0.0
    }

    /// Returns the minimum permissible value of the scalar
    fn minimum_permissible_value(&self, _effective_trial_stress: f64) -> f64 {
        -f64::MAX
    }

    /// Returns the maximum permissible value of the scalar
    fn maximum_permissible_value(&self, _effective_trial_stress: f64) -> f64 {
        f64::MAX
    }

    /// Computes the residual
    fn compute_residual(&mut self, effective_trial_stress: f64, scalar: f64) -> Result<f64, StrError>;

    /// Computes the derivative of the residual with respect to the scalar
    fn compute_derivative(&mut self, effective_trial_stress: f64, scalar: f64) -> Result<f64, StrError>;

    /// Returns the reference residual used by the relative tolerance
    fn compute_reference_residual(&self, effective_trial_stress: f64, scalar: f64) -> f64;

    /// Finalizes an iteration (e.g., updates history variables)
    fn iteration_finalize(&mut self, _scalar: f64) {}
}

/// Holds the results of the scalar return-map
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScalarSolution {
    /// Holds the final state
    pub state: SolveState,

    /// Holds the scalar
    pub scalar: f64,

    /// Holds the last residual
    pub residual: f64,

    /// Holds the last reference residual
    pub reference_residual: f64,

    /// Holds the number of iterations
    pub iterations: usize,
}

/// Implements a robust Newton solver for scalar return-maps
///
/// The solver combines Newton-Raphson with bracketing (bisection when Newton leaves the
/// interval where the residual changes sign), an optional line search, and an optional
/// clamping to the permissible range. When the residual stagnates, a looser tolerance
/// (`acceptable_multiplier` times larger) is accepted.
pub struct ScalarReturnMapSolver {
    /// Holds the configuration
    settings: ScalarReturnMapSettings,
}

impl ScalarReturnMapSolver {
    /// Allocates a new instance
    pub fn new(settings: &ScalarReturnMapSettings) -> Result<Self, StrError> {
        if let Some(msg) = settings.validate() {
            log::error!("{}", msg);
            return Err("cannot allocate scalar return-map solver because settings.validate() failed");
        }
        Ok(ScalarReturnMapSolver {
            settings: settings.clone(),
        })
    }

    /// Returns an access to the settings
    pub fn settings(&self) -> &ScalarReturnMapSettings {
        &self.settings
    }

    /// Solves the scalar return-map and returns an error if it did not converge
    pub fn solve<M: ScalarReturnMap + ?Sized>(
        &self,
        model: &mut M,
        effective_trial_stress: f64,
    ) -> Result<ScalarSolution, StrError> {
        let solution = self.solve_with_state(model, effective_trial_stress)?;
        match solution.state {
            SolveState::Converged => Ok(solution),
            SolveState::ExceededIterations => Err("scalar return-map exceeded the maximum number of iterations"),
            SolveState::NanInf => Err("scalar return-map found a NaN or Inf residual"),
            SolveState::Iterating => Err("scalar return-map did not finish"),
        }
    }

    /// Runs the iterations and returns the final state (without converting failures into errors)
    pub fn solve_with_state<M: ScalarReturnMap + ?Sized>(
        &self,
        model: &mut M,
        effective_trial_stress: f64,
    ) -> Result<ScalarSolution, StrError> {
        let mut scalar = model.initial_guess(effective_trial_stress);
        let min_permissible = model.minimum_permissible_value(effective_trial_stress);
        let max_permissible = model.maximum_permissible_value(effective_trial_stress);
        let mut lower = min_permissible;
        let mut upper = max_permissible;
        let mut history = [f64::MAX; NUM_RESIDUALS];
        let mut iterations = 0;

        let mut residual = model.compute_residual(effective_trial_stress, scalar)?;
        let mut reference = model.compute_reference_residual(effective_trial_stress, scalar);
        let init_sign = if residual < 0.0 { -1.0 } else { 1.0 };
        let mut state = if residual.is_finite() {
            SolveState::Iterating
        } else {
            SolveState::NanInf
        };

        while state == SolveState::Iterating {
            if self.converged(residual, reference)
                || self.converged_acceptable(iterations, residual, reference, &history)
            {
                state = SolveState::Converged;
                break;
            }
            if iterations >= self.settings.max_iterations {
                state = SolveState::ExceededIterations;
                break;
            }

            // Newton step
            let scalar_old = scalar;
            let residual_old = residual;
            let derivative = model.compute_derivative(effective_trial_stress, scalar)?;
            let mut increment = -residual / derivative;
            let mut modified = false;

            // keep the iterate within the bracket
            if self.settings.bracket_solution {
                let candidate = scalar_old + increment;
                if (candidate >= upper || candidate <= lower) && upper != max_permissible && lower != min_permissible {
                    increment = 0.5 * (lower + upper) - scalar_old;
                    modified = true;
                }
            }
            scalar = scalar_old + increment;
            if self.settings.check_range {
                check_permissible_range(&mut scalar, &mut increment, scalar_old, min_permissible, max_permissible);
            }
            residual = model.compute_residual(effective_trial_stress, scalar)?;
            reference = model.compute_reference_residual(effective_trial_stress, scalar);
            model.iteration_finalize(scalar);

            // backtrack if the residual increased
            if self.settings.line_search && !modified && residual.is_finite() {
                let mut alpha = 1.0;
                while f64::abs(residual) > f64::abs(residual_old) && !self.converged(residual, reference) {
                    let next = if residual * residual_old < 0.0 {
                        alpha * residual_old / (residual_old - residual)
                    } else {
                        0.5 * alpha
                    };
                    if next < LINE_SEARCH_MIN_ALPHA {
                        break;
                    }
                    alpha = next;
                    scalar = scalar_old + alpha * increment;
                    residual = model.compute_residual(effective_trial_stress, scalar)?;
                    reference = model.compute_reference_residual(effective_trial_stress, scalar);
                    model.iteration_finalize(scalar);
                }
            }

            if self.settings.bracket_solution {
                update_bounds(scalar, residual, init_sign, min_permissible, &mut lower, &mut upper);
            }

            iterations += 1;
            history[iterations % NUM_RESIDUALS] = residual;
            if !residual.is_finite() {
                state = SolveState::NanInf;
            }
        }

        Ok(ScalarSolution {
            state,
            scalar,
            residual,
            reference_residual: reference,
            iterations,
        })
    }

    /// Checks the convergence with the given residual
    fn converged(&self, residual: f64, reference: f64) -> bool {
        f64::abs(residual) <= self.settings.absolute_tolerance
            || f64::abs(residual / reference) <= self.settings.relative_tolerance
    }

    /// Checks the convergence with looser tolerances when the residual stagnates
    fn converged_acceptable(&self, iterations: usize, residual: f64, reference: f64, history: &[f64]) -> bool {
        // require a minimum number of iterations before accepting
        if iterations < NUM_RESIDUALS {
            return false;
        }
        // still making progress: the residual dropped by more than 10× over the history window
        if f64::abs(residual * 10.0) < f64::abs(history[(iterations + 1) % NUM_RESIDUALS]) {
            return false;
        }
        self.converged(residual / self.settings.acceptable_multiplier, reference)
    }
}

/// Halves the step towards a violated permissible bound
fn check_permissible_range(scalar: &mut f64, increment: &mut f64, scalar_old: f64, min: f64, max: f64) {
    if *scalar > max {
        *increment = (max - scalar_old) / 2.0;
        *scalar = scalar_old + *increment;
    } else if *scalar < min {
        *increment = (min - scalar_old) / 2.0;
        *scalar = scalar_old + *increment;
    }
}

/// Narrows the interval where the residual changes sign
///
/// The lower bound is never moved above the upper bound, so the lowest root is selected
/// when there are several.
fn update_bounds(scalar: f64, residual: f64, init_sign: f64, min: f64, lower: &mut f64, upper: &mut f64) {
    if residual * init_sign < 0.0 && scalar < *upper {
        *upper = scalar;
        if *upper < *lower {
            *upper = *lower;
            *lower = min;
        }
    } else if residual * init_sign > 0.0 && scalar > *lower && scalar < *upper {
        *lower = scalar;
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
