use crate::StrError;
use thiserror::Error;

/// Defines the errors returned by the multi-parameter return-map
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ReturnMapError {
    #[error("Invalid return-map settings: {0}")]
    InvalidSettings(String),

    #[error("Size mismatch: {found} {what} given but the model requires {expected}")]
    StateSize {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error(
        "Minimum step size violated: step_size = {step_size:e} < min_step_size = {min_step_size:e} \
         after completing {step_taken} of the trial increment"
    )]
    MinStepSizeViolated {
        step_size: f64,
        min_step_size: f64,
        step_taken: f64,
    },

    #[error("Model error: {0}")]
    Model(StrError),
}

impl From<StrError> for ReturnMapError {
    fn from(err: StrError) -> Self {
        ReturnMapError::Model(err)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::ReturnMapError;

    #[test]
    fn display_works() {
        let err = ReturnMapError::StateSize {
            what: "internal values",
            expected: 1,
            found: 2,
        };
        assert_eq!(
            format!("{}", err),
            "Size mismatch: 2 internal values given but the model requires 1"
        );
        let err: ReturnMapError = "stress is too large".into();
        assert_eq!(err, ReturnMapError::Model("stress is too large"));
        assert_eq!(format!("{}", err), "Model error: stress is too large");
        let err = ReturnMapError::MinStepSizeViolated {
            step_size: 0.005,
            min_step_size: 0.01,
            step_taken: 0.25,
        };
        assert_eq!(
            format!("{}", err),
            "Minimum step size violated: step_size = 5e-3 < min_step_size = 1e-2 after completing 0.25 of the trial increment"
        );
    }
}
