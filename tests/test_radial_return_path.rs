use approx::assert_abs_diff_eq;
use retmap::prelude::*;

// Radial return along a proportional loading path
//
// TEST GOAL
//
// Verifies the radial-return update with linear isotropic hardening over several
// committed steps, and the combination of the scalar solver with the power-law creep model.
//
// CONFIGURATION AND PARAMETERS
//
// * K = 1000, G = 600
// * σy = 10, H = 100
// * Each step adds a deviatoric stress s = (a, -a, 0) with σe(s) = √3 a = 20
//
// NOTES
//
// With proportional loading the effective stress after each plastic step lies on the
// current yield surface, thus the accumulated inelastic strain after n steps is
//
// ```text
// p = (20 n - σy) / (3G + H)
// ```

const KK: f64 = 1000.0;
const GG: f64 = 600.0;

fn increment() -> Tensor2 {
    let a = 20.0 / f64::sqrt(3.0);
    Tensor2::from_mandel(&[a, -a, 0.0, 0.0, 0.0, 0.0])
}

#[test]
fn test_isotropic_hardening_path() -> Result<(), StrError> {
    let elasticity = LinElasticity::from_bulk_shear(KK, GG);
    let radial = RadialReturn::new(&ScalarReturnMapSettings::default())?;
    let mut model = IsotropicPlasticity::new(10.0, 100.0);
    let mut state = RadialReturnState::new();
    let mut stress = Tensor2::new();
    for n in 1..=4 {
        let mut trial = stress.clone();
        trial.update(1.0, &increment());
        let update = radial.update_state(&mut model, &mut state, &trial, &elasticity, true)?;
        state.commit();
        stress = update.stress;

        let p = (20.0 * (n as f64) - 10.0) / (3.0 * GG + 100.0);
        assert_abs_diff_eq!(state.effective_inelastic_strain_old, p, epsilon = 1e-10);
        assert_abs_diff_eq!(state.hardening_variable_old, 100.0 * p, epsilon = 1e-8);
        assert_abs_diff_eq!(stress.invariant_sigma_d(), 10.0 + 100.0 * p, epsilon = 1e-8);

        // plastic flow is deviatoric
        assert_abs_diff_eq!(state.inelastic_strain_old.trace(), 0.0, epsilon = 1e-14);
        assert!(update.tangent.is_some());
    }
    Ok(())
}

#[test]
fn test_unloading_is_elastic() -> Result<(), StrError> {
    let elasticity = LinElasticity::from_bulk_shear(KK, GG);
    let radial = RadialReturn::new(&ScalarReturnMapSettings::default())?;
    let mut model = IsotropicPlasticity::new(10.0, 100.0);
    let mut state = RadialReturnState::new();

    // loading
    let update = radial.update_state(&mut model, &mut state, &increment(), &elasticity, false)?;
    state.commit();
    let p = state.effective_inelastic_strain_old;
    assert!(p > 0.0);

    // unloading
    let mut trial = update.stress.clone();
    trial.update(-0.5, &increment());
    let unload = radial.update_state(&mut model, &mut state, &trial, &elasticity, true)?;
    assert_eq!(unload.stress, trial);
    assert_eq!(unload.tangent.as_ref(), Some(elasticity.get_modulus()));
    assert_eq!(state.effective_inelastic_strain, p);
    Ok(())
}

#[test]
fn test_creep_relaxes_the_deviator() -> Result<(), StrError> {
    let elasticity = LinElasticity::from_bulk_shear(KK, GG);
    let radial = RadialReturn::new(&ScalarReturnMapSettings::default())?;
    let (aa, dt) = (1e-4, 1.0);
    let mut model = PowerLawCreep::new(aa, 1.0, dt);
    let mut state = RadialReturnState::new();

    // linear creep: Δp = A σe dt / (1 + 3 G A dt)
    let update = radial.update_state(&mut model, &mut state, &increment(), &elasticity, false)?;
    let dp = aa * 20.0 * dt / (1.0 + 3.0 * GG * aa * dt);
    assert_abs_diff_eq!(state.effective_inelastic_strain, dp, epsilon = 1e-10);
    assert_abs_diff_eq!(update.stress.invariant_sigma_d(), 20.0 - 3.0 * GG * dp, epsilon = 1e-8);
    Ok(())
}
