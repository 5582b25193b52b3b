use crate::tensor::Tensor2;
use crate::StrError;
use nalgebra::DVector;

/// Holds the per-integration-point data persisted between calls to the return-map
///
/// The `*_old` fields hold the values at the end of the last converged time step
/// and are only modified by [MaterialPointState::commit].
#[derive(Clone, Debug)]
pub struct MaterialPointState {
    /// Holds the internal (hardening) variables
    pub internal_values: DVector<f64>,

    /// Holds the internal variables at the last converged time step
    pub internal_values_old: DVector<f64>,

    /// Holds the accumulated plastic strain
    pub plastic_strain: Tensor2,

    /// Holds the accumulated plastic strain at the last converged time step
    pub plastic_strain_old: Tensor2,

    /// Holds the values of all yield functions at the returned stress
    pub yield_function_values: DVector<f64>,

    /// Holds the largest number of Newton iterations used by a sub-step of the last call
    pub iterations: usize,

    /// Holds the largest number of Newton iterations used since the beginning
    pub max_iterations_used: usize,

    /// Holds max_iterations_used at the last converged time step
    pub max_iterations_used_old: usize,

    /// Indicates that the line search had to backtrack during the last call
    pub linesearch_needed: bool,

    /// Indicates that no time step has been committed yet
    pub first_step: bool,
}

impl MaterialPointState {
    /// Allocates a new instance
    pub fn new(num_intnl: usize, num_yf: usize) -> Self {
        MaterialPointState {
            internal_values: DVector::zeros(num_intnl),
            internal_values_old: DVector::zeros(num_intnl),
            plastic_strain: Tensor2::new(),
            plastic_strain_old: Tensor2::new(),
            yield_function_values: DVector::zeros(num_yf),
            iterations: 0,
            max_iterations_used: 0,
            max_iterations_used_old: 0,
            linesearch_needed: false,
            first_step: true,
        }
    }

    /// Sets the initial internal values (old and current)
    pub fn set_initial_internal_values(&mut self, values: &[f64]) -> Result<(), StrError> {
        if values.len() != self.internal_values.len() {
            return Err("the number of initial internal values is incorrect");
        }
        self.internal_values.copy_from_slice(values);
        self.internal_values_old.copy_from_slice(values);
        Ok(())
    }

    /// Accepts the current values at the end of a converged time step
    pub fn commit(&mut self) {
        self.internal_values_old.copy_from(&self.internal_values);
        self.plastic_strain_old.set_tensor(1.0, &self.plastic_strain);
        self.max_iterations_used_old = self.max_iterations_used;
        self.first_step = false;
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::MaterialPointState;

    #[test]
    fn new_and_commit_work() {
        let mut state = MaterialPointState::new(2, 3);
        assert_eq!(state.internal_values.len(), 2);
        assert_eq!(state.yield_function_values.len(), 3);
        assert!(state.first_step);
        assert_eq!(
            state.set_initial_internal_values(&[1.0]).err(),
            Some("the number of initial internal values is incorrect")
        );
        state.set_initial_internal_values(&[1.0, 2.0]).unwrap();
        assert_eq!(state.internal_values_old.as_slice(), &[1.0, 2.0]);
        state.internal_values[1] = 5.0;
        state.plastic_strain.vector_mut()[0] = 0.1;
        state.max_iterations_used = 4;
        assert_eq!(state.internal_values_old.as_slice(), &[1.0, 2.0]);
        state.commit();
        assert_eq!(state.internal_values_old.as_slice(), &[1.0, 5.0]);
        assert_eq!(state.plastic_strain_old.vector()[0], 0.1);
        assert_eq!(state.max_iterations_used_old, 4);
        assert!(!state.first_step);
    }
}
