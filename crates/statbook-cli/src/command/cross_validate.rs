use std::path::PathBuf;

use anyhow::Context;
use statbook_data::SimulationSeed;
use statbook_glm::{
    Family, ValidationStrategy, cross_validate,
    fit::{Design, IrlsFitter},
};

use crate::util::{self, Output, Report};

/// Partitions listed individually when there are at most this many.
const MAX_LISTED: usize = 20;

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FamilyArg {
    #[default]
    Gaussian,
    Binomial,
}

impl From<FamilyArg> for Family {
    fn from(arg: FamilyArg) -> Self {
        match arg {
            FamilyArg::Gaussian => Family::Gaussian,
            FamilyArg::Binomial => Family::Binomial,
        }
    }
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StrategyArg {
    /// One random train/test split
    #[default]
    ValidationSet,
    /// `--repeats` independent random splits
    Repeated,
    /// Leave-one-out
    Loocv,
}

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct CrossValidateArg {
    /// Input data file (CSV, TSV or JSON)
    data: PathBuf,
    /// Comma-separated columns read as categorical even if every value is a number
    #[arg(long)]
    categorical: Option<String>,
    /// Outcome column
    #[arg(long)]
    outcome: String,
    /// Comma-separated predictor columns
    #[arg(long)]
    predictors: Option<String>,
    /// Model family
    #[arg(long, value_enum, default_value_t)]
    family: FamilyArg,
    /// Partitioning strategy
    #[arg(long, value_enum, default_value_t)]
    strategy: StrategyArg,
    /// Fraction of rows used for fitting in random splits
    #[arg(long, default_value_t = 0.5)]
    train_fraction: f64,
    /// Number of random splits for the repeated strategy
    #[arg(long, default_value_t = 10)]
    repeats: usize,
    /// Random seed (up to 32 hex digits)
    #[arg(long)]
    seed: Option<SimulationSeed>,
    /// Output file path for a JSON report
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &CrossValidateArg) -> anyhow::Result<()> {
    let categorical = util::split_columns(arg.categorical.as_deref());
    let table = util::read_table(&arg.data, &categorical)?;
    let design = Design::new(
        arg.outcome.clone(),
        util::split_columns(arg.predictors.as_deref()),
        arg.family.into(),
    );
    let strategy = match arg.strategy {
        StrategyArg::ValidationSet => ValidationStrategy::ValidationSet {
            train_fraction: arg.train_fraction,
        },
        StrategyArg::Repeated => ValidationStrategy::RepeatedSplits {
            train_fraction: arg.train_fraction,
            repeats: arg.repeats,
        },
        StrategyArg::Loocv => ValidationStrategy::LeaveOneOut,
    };
    let seed = util::seed_or_random(arg.seed);

    let result = cross_validate(&table, &design, &IrlsFitter::default(), strategy, seed)
        .with_context(|| format!("Failed to cross-validate {:?}", design.outcome))?;

    println!(
        "Cross-validation of {} ~ {} ({} family, {:?})",
        design.outcome,
        if design.predictors.is_empty() {
            "1".to_owned()
        } else {
            design.predictors.join(" + ")
        },
        design.family,
        arg.strategy
    );
    if result.errors.len() <= MAX_LISTED {
        for (i, error) in result.errors.iter().enumerate() {
            println!("  #{i:<4} MSE {error:>12.6}");
        }
    }
    let summary = &result.summary;
    println!("Partitions: {}", summary.count);
    println!("  Mean MSE:    {:>12.6}", summary.mean);
    println!("  Min MSE:     {:>12.6}", summary.min);
    println!("  Max MSE:     {:>12.6}", summary.max);
    println!("  Std. dev.:   {:>12.6}", summary.std_dev);

    if let Some(path) = &arg.output {
        Output::save_json(&Report::new(&result), Some(path.clone()))?;
    }
    Ok(())
}
