use clap::{Parser, Subcommand};

use self::{
    cross_validate::CrossValidateArg, deviance::DevianceArg, generate_data::GenerateDataArg,
    simulate_missing::SimulateMissingArg,
};

mod cross_validate;
mod deviance;
mod generate_data;
mod simulate_missing;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// What to run
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Generate a synthetic data set
    GenerateData(#[clap(flatten)] GenerateDataArg),
    /// Mark rows as missing under an MCAR, MAR or MNAR mechanism
    SimulateMissing(#[clap(flatten)] SimulateMissingArg),
    /// Compute null and residual deviance of a logistic model
    Deviance(#[clap(flatten)] DevianceArg),
    /// Estimate prediction error by cross-validation
    CrossValidate(#[clap(flatten)] CrossValidateArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::GenerateData(arg) => generate_data::run(&arg)?,
        Mode::SimulateMissing(arg) => simulate_missing::run(&arg)?,
        Mode::Deviance(arg) => deviance::run(&arg)?,
        Mode::CrossValidate(arg) => cross_validate::run(&arg)?,
    }
    Ok(())
}
