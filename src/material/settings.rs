use super::SmootherFunction;
use serde::{Deserialize, Serialize};

/// Holds the configuration of the multi-parameter return-map
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ReturnMapSettings {
    /// Maximum number of Newton-Raphson iterations per sub-step
    #[serde(default = "default_max_nr_iterations")]
    pub max_nr_iterations: usize,

    /// Smoothing tolerance δ: yield functions within δ of each other are blended
    pub smoothing_tol: f64,

    /// Tolerance on the (smoothed) yield function and on the Newton residual
    pub yield_function_tol: f64,

    /// Minimum allowed sub-step size (as a fraction of the full trial increment)
    ///
    /// The default value of 1 disables sub-stepping.
    #[serde(default = "default_step_size")]
    pub min_step_size: f64,

    /// Size of the first sub-step (as a fraction of the full trial increment)
    #[serde(default = "default_step_size")]
    pub initial_step_size: f64,

    /// Stress parameters known to be admissible (inside all yield surfaces)
    ///
    /// On the very first step there is no converged stress yet and the sub-stepping
    /// starts from these stress parameters. If `None`, the origin (all zeros) is
    /// assumed to be admissible, which is correct for most models but not for
    /// models whose yield surface does not enclose the origin.
    #[serde(default)]
    pub admissible_stress: Option<Vec<f64>>,

    /// Kernel used to smooth the yield surfaces
    #[serde(default = "default_smoother_function_type")]
    pub smoother_function_type: SmootherFunction,

    /// Logs a warning when the Newton update is below the floating-point precision
    #[serde(default)]
    pub warn_about_precision_loss: bool,
}

fn default_max_nr_iterations() -> usize {
    20
}

fn default_step_size() -> f64 {
    1.0
}

fn default_smoother_function_type() -> SmootherFunction {
    SmootherFunction::Cos
}

impl ReturnMapSettings {
    /// Allocates a new instance with default values
    pub fn new(smoothing_tol: f64, yield_function_tol: f64) -> Self {
        ReturnMapSettings {
            max_nr_iterations: default_max_nr_iterations(),
            smoothing_tol,
            yield_function_tol,
            min_step_size: default_step_size(),
            initial_step_size: default_step_size(),
            admissible_stress: None,
            smoother_function_type: default_smoother_function_type(),
            warn_about_precision_loss: false,
        }
    }

    /// Validates all data
    ///
    /// Returns a message with the inconsistent data, or returns None if everything is all right.
    pub fn validate(&self, num_sp: usize) -> Option<String> {
        if self.max_nr_iterations < 1 {
            return Some(format!(
                "max_nr_iterations = {} is incorrect; it must be ≥ 1",
                self.max_nr_iterations
            ));
        }
        if !(self.smoothing_tol > 0.0) || !self.smoothing_tol.is_finite() {
            return Some(format!(
                "smoothing_tol = {:?} is incorrect; it must be > 0.0",
                self.smoothing_tol
            ));
        }
        if !(self.yield_function_tol > 0.0) || !self.yield_function_tol.is_finite() {
            return Some(format!(
                "yield_function_tol = {:?} is incorrect; it must be > 0.0",
                self.yield_function_tol
            ));
        }
        if !(self.min_step_size > 0.0) || self.min_step_size > 1.0 {
            return Some(format!(
                "min_step_size = {:?} is incorrect; it must be in (0.0, 1.0]",
                self.min_step_size
            ));
        }
        if !(self.initial_step_size >= self.min_step_size) || self.initial_step_size > 1.0 {
            return Some(format!(
                "initial_step_size = {:?} is incorrect; it must be in [min_step_size, 1.0]",
                self.initial_step_size
            ));
        }
        if let Some(sp) = &self.admissible_stress {
            if sp.len() != num_sp {
                return Some(format!(
                    "admissible_stress has {} components but the model has {} stress parameters",
                    sp.len(),
                    num_sp
                ));
            }
            if sp.iter().any(|v| !v.is_finite()) {
                return Some("admissible_stress must contain finite values only".to_string());
            }
        }
        None // all good
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
