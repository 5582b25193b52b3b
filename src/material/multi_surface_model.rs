use super::YieldAndFlow;
use crate::tensor::{Tensor2, Tensor4};
use crate::StrError;
use nalgebra::{DMatrix, DVector};

/// Holds the elasticity tensor projected onto the stress-parameter space
///
/// ```text
/// Δsp[i] = Σ_j Eij[i][j] Δ(strain parameter)[j]
/// ```
///
/// `En` normalizes the plastic multiplier: the Newton unknown is `gaE = γ En`, which has
/// units of stress and is thus of the same order of magnitude as the stress parameters.
#[derive(Clone, Debug)]
pub struct EffectiveElasticity {
    /// Holds the effective elasticity matrix (num_sp × num_sp)
    pub eij: DMatrix<f64>,

    /// Holds the normalization modulus
    pub en: f64,

    /// Holds the inverse of eij (compliance)
    pub cij: DMatrix<f64>,
}

impl EffectiveElasticity {
    /// Allocates a new instance and computes the inverse matrix
    pub fn new(eij: DMatrix<f64>, en: f64) -> Result<Self, StrError> {
        if !eij.is_square() {
            return Err("the effective elasticity matrix must be square");
        }
        if !(en > 0.0) || !en.is_finite() {
            return Err("the elasticity normalization modulus must be positive");
        }
        let cij = eij
            .clone()
            .try_inverse()
            .ok_or("the effective elasticity matrix is singular")?;
        Ok(EffectiveElasticity { eij, en, cij })
    }

    /// Returns the number of stress parameters
    pub fn dim(&self) -> usize {
        self.eij.nrows()
    }
}

/// Defines the interface of a multi-surface plasticity model (yield functions, flow, hardening)
///
/// The stress tensor is described by a small number `num_sp` of stress parameters
/// (e.g., invariants or principal values) in which all `num_yf` yield functions and flow
/// potentials are expressed. The model also owns the `num_intnl` internal variables and
/// their evolution rule.
pub trait MultiSurfaceModel {
    /// Returns the number of stress parameters
    fn num_sp(&self) -> usize;

    /// Returns the number of yield functions
    fn num_yf(&self) -> usize;

    /// Returns the number of internal variables
    fn num_intnl(&self) -> usize;

    /// Computes the stress parameters from the stress tensor
    fn stress_params(&self, sp: &mut DVector<f64>, stress: &Tensor2) -> Result<(), StrError>;

    /// Computes the derivatives of each stress parameter with respect to stress (num_sp tensors)
    fn dstress_params_dstress(&self, dsp: &mut [Tensor2], stress: &Tensor2) -> Result<(), StrError>;

    /// Computes the second derivatives of each stress parameter with respect to stress (num_sp tensors)
    ///
    /// Models that cannot supply these derivatives may leave the tensors equal to zero;
    /// the consistent tangent then loses its quadratic convergence.
    fn d2stress_params_dstress(&self, d2sp: &mut [Tensor4], stress: &Tensor2) -> Result<(), StrError>;

    /// Computes the values of all yield functions
    fn yield_function_values(
        &self,
        yf: &mut DVector<f64>,
        sp: &DVector<f64>,
        intnl: &DVector<f64>,
    ) -> Result<(), StrError>;

    /// Computes all yield functions and their derivatives (num_yf entries)
    fn compute_all_surfaces(
        &self,
        all: &mut [YieldAndFlow],
        sp: &DVector<f64>,
        intnl: &DVector<f64>,
    ) -> Result<(), StrError>;

    /// Sets the initial guess of the Newton-Raphson iterations
    ///
    /// The default guess is the trial point, a zero multiplier and the old internal variables.
    fn initialize_vars(
        &self,
        sp: &mut DVector<f64>,
        gae: &mut f64,
        intnl: &mut DVector<f64>,
        trial_sp: &DVector<f64>,
        intnl_old: &DVector<f64>,
    ) {
        sp.copy_from(trial_sp);
        *gae = 0.0;
        intnl.copy_from(intnl_old);
    }

    /// Computes the internal variables given the trial and current stress parameters
    fn set_intnl_values(
        &self,
        intnl: &mut DVector<f64>,
        trial_sp: &DVector<f64>,
        current_sp: &DVector<f64>,
        intnl_old: &DVector<f64>,
        eff: &EffectiveElasticity,
    ) -> Result<(), StrError>;

    /// Computes the derivatives of the internal variables with respect to the current stress parameters
    ///
    /// `dintnl` is num_intnl × num_sp.
    fn set_intnl_derivatives(
        &self,
        dintnl: &mut DMatrix<f64>,
        trial_sp: &DVector<f64>,
        current_sp: &DVector<f64>,
        intnl: &DVector<f64>,
        eff: &EffectiveElasticity,
    ) -> Result<(), StrError>;

    /// Projects the elasticity tensor onto the stress-parameter space
    fn effective_elasticity(&self, elasticity: &Tensor4) -> Result<EffectiveElasticity, StrError>;

    /// Computes the stress tensor corresponding to the returned stress parameters
    fn stress_after_return(
        &self,
        stress: &mut Tensor2,
        stress_trial: &Tensor2,
        sp: &DVector<f64>,
        gae: f64,
        intnl: &DVector<f64>,
        smoothed: &YieldAndFlow,
        elasticity: &Tensor4,
    ) -> Result<(), StrError>;
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
