use std::path::PathBuf;

use anyhow::Context;
use statbook_data::{
    SimulationSeed,
    synth::{self, HeartConfig, PatientConfig},
};

use crate::util::{self, Output};

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, derive_more::FromStr)]
pub enum DataSet {
    /// Sex, height, weight and BMI
    #[default]
    Patients,
    /// Sex, age and a binary heart-disease outcome
    Heart,
}

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct GenerateDataArg {
    /// Data set to generate (patients or heart)
    #[arg(default_value = "patients")]
    dataset: DataSet,
    /// Number of rows [default: 10000 patients, 300 heart]
    #[arg(long)]
    rows: Option<usize>,
    /// Random seed (up to 32 hex digits)
    #[arg(long)]
    seed: Option<SimulationSeed>,
    /// Output file path; the extension selects CSV, TSV or JSON
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &GenerateDataArg) -> anyhow::Result<()> {
    let GenerateDataArg {
        dataset,
        rows,
        seed,
        output,
    } = arg;
    let seed = util::seed_or_random(*seed);
    let mut rng = seed.rng();

    let table = match dataset {
        DataSet::Patients => {
            let default = PatientConfig::default();
            let config = PatientConfig {
                rows: rows.unwrap_or(default.rows),
                ..default
            };
            synth::generate_patients(&config, &mut rng)
        }
        DataSet::Heart => {
            let default = HeartConfig::default();
            let config = HeartConfig {
                rows: rows.unwrap_or(default.rows),
                ..default
            };
            synth::generate_heart(&config, &mut rng)
        }
    }
    .with_context(|| format!("Failed to generate {dataset:?} data"))?;

    eprintln!(
        "Generated {} {dataset:?} rows with columns {:?}",
        table.len(),
        table.columns().iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
    );
    Output::save_table(&table, output.clone())
}
