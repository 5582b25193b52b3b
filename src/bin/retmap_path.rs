use retmap::prelude::*;
use retmap::tensor::t4_ddot_t2;
use serde::Deserialize;
use structopt::StructOpt;

/// Command line options
#[derive(StructOpt, Debug)]
#[structopt(
    name = "retmap_path",
    about = "Runs the Drucker-Prager-with-cap return-map along a strain path given in a JSON file"
)]
struct Options {
    /// JSON file with the elastic parameters, settings, model parameters and strain increments
    input: String,

    /// Also computes the consistent tangent operator
    #[structopt(long)]
    tangent: bool,
}

/// Holds the input data of a strain path
#[derive(Deserialize, Debug)]
struct PathInput {
    /// Young's modulus
    young: f64,

    /// Poisson's coefficient
    poisson: f64,

    /// Return-map configuration
    settings: ReturnMapSettings,

    /// Model parameters
    model: DruckerPragerCapParams,

    /// Strain increments (Mandel components)
    strain_increments: Vec<[f64; 6]>,
}

fn main() -> Result<(), StrError> {
    env_logger::init();

    // parse options
    let options = Options::from_args();

    // load data
    let contents = std::fs::read_to_string(&options.input).map_err(|_| "cannot read the input file")?;
    let input: PathInput = serde_json::from_str(&contents).map_err(|e| {
        log::error!("{}", e);
        "cannot parse the input file"
    })?;

    // allocate the return-map
    let elasticity = LinElasticity::new(input.young, input.poisson);
    let model = DruckerPragerCap::new(&input.model)?;
    let num_intnl = model.num_intnl();
    let num_yf = model.num_yf();
    let retmap = MultiParameterReturnMap::new(model, &input.settings).map_err(|e| {
        log::error!("{}", e);
        "cannot allocate the return-map"
    })?;

    // run the strain path
    let mut state = MaterialPointState::new(num_intnl, num_yf);
    let mut stress = Tensor2::new();
    println!("{:>5}{:>14}{:>14}{:>14}{:>14}{:>6}", "step", "p", "q", "κ", "f₀", "it");
    for (step, increment) in input.strain_increments.iter().enumerate() {
        let mut stress_trial = Tensor2::new();
        t4_ddot_t2(&mut stress_trial, 1.0, elasticity.get_modulus(), &Tensor2::from_mandel(increment));
        stress_trial.update(1.0, &stress);
        let update = retmap
            .update_state(&mut state, &stress_trial, &stress, elasticity.get_modulus(), options.tangent)
            .map_err(|e| {
                log::error!("step {}: {}", step, e);
                "return-map failed"
            })?;
        state.commit();
        stress = update.stress;
        println!(
            "{:>5}{:>14.6}{:>14.6}{:>14.6}{:>14.6e}{:>6}",
            step,
            stress.trace(),
            f64::sqrt(stress.invariant_jj2()),
            state.internal_values[0],
            state.yield_function_values[0],
            state.iterations,
        );
        if let Some(tangent) = &update.tangent {
            log::info!("step {}: consistent tangent\n{}", step, tangent.matrix());
        }
    }
    Ok(())
}
