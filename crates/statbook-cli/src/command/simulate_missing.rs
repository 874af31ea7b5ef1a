use std::path::PathBuf;

use anyhow::Context;
use serde::Serialize;
use statbook_data::SimulationSeed;
use statbook_missing::{
    Mechanism, MissingnessSummary, StratumDraw, simulate_with_seed, summary::GroupSummary,
};
use statbook_stats::descriptive::DescriptiveStats;

use crate::util::{self, Output, Report};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct SimulateMissingArg {
    /// Input data file (CSV, TSV or JSON)
    data: PathBuf,
    /// Comma-separated columns read as categorical even if every value is a number
    #[arg(long)]
    categorical: Option<String>,
    /// Mechanism configuration JSON file
    #[arg(long)]
    mechanism: PathBuf,
    /// Random seed (up to 32 hex digits)
    #[arg(long)]
    seed: Option<SimulationSeed>,
    /// Numeric outcome to compare between observed and missing rows
    /// [default: the MNAR outcome]
    #[arg(long)]
    outcome: Option<String>,
    /// Categorical column to group the comparison by [default: the MAR covariate]
    #[arg(long)]
    group_by: Option<String>,
    /// Name of the appended indicator column
    #[arg(long, default_value = "is_missing")]
    column: String,
    /// Output file path for the flagged table
    #[arg(long)]
    output: Option<PathBuf>,
    /// Output file path for a JSON report of the draw
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct SimulationReport<'a> {
    mechanism: &'a Mechanism,
    seed: SimulationSeed,
    rows: usize,
    missing: usize,
    strata: &'a [StratumDraw],
    summary: Option<&'a MissingnessSummary>,
}

pub(crate) fn run(arg: &SimulateMissingArg) -> anyhow::Result<()> {
    let categorical = util::split_columns(arg.categorical.as_deref());
    let table = util::read_table(&arg.data, &categorical)?;
    let mechanism: Mechanism = util::read_json_file("mechanism", &arg.mechanism)?;
    let seed = util::seed_or_random(arg.seed);

    let indicator = simulate_with_seed(&table, &mechanism, seed)
        .with_context(|| format!("Failed to simulate {} missingness", mechanism.name()))?;

    eprintln!("Mechanism: {} (seed {seed})", mechanism.name());
    print_strata(indicator.strata());
    #[expect(clippy::cast_precision_loss)]
    let rate = indicator.missing_count() as f64 / indicator.len() as f64;
    eprintln!(
        "Missing: {} / {} ({:.1}%)",
        indicator.missing_count(),
        indicator.len(),
        rate * 100.0
    );

    let outcome = arg.outcome.as_deref().or(match &mechanism {
        Mechanism::Mnar { outcome, .. } => Some(outcome.as_str()),
        _ => None,
    });
    let group_by = arg.group_by.as_deref().or(match &mechanism {
        Mechanism::Mar { covariate, .. } => Some(covariate.as_str()),
        _ => None,
    });
    let summary = outcome
        .map(|outcome| MissingnessSummary::new(&table, &indicator, outcome, group_by))
        .transpose()
        .context("Failed to summarize missingness")?;
    if let Some(summary) = &summary {
        print_summary(summary);
    }

    let flagged = indicator
        .attach(&table, &arg.column)
        .with_context(|| format!("Failed to append column {:?}", arg.column))?;
    Output::save_table(&flagged, arg.output.clone())?;

    if let Some(path) = &arg.report {
        let report = Report::new(SimulationReport {
            mechanism: &mechanism,
            seed,
            rows: indicator.len(),
            missing: indicator.missing_count(),
            strata: indicator.strata(),
            summary: summary.as_ref(),
        });
        Output::save_json(&report, Some(path.clone()))?;
    }
    Ok(())
}

fn print_strata(strata: &[StratumDraw]) {
    eprintln!("  {:<16} {:>8} {:>8} {:>12}", "Stratum", "Size", "Missing", "Probability");
    for draw in strata {
        eprintln!(
            "  {:<16} {:>8} {:>8} {:>12.3}",
            draw.label, draw.size, draw.missing, draw.probability
        );
    }
}

fn print_summary(summary: &MissingnessSummary) {
    match &summary.group_by {
        Some(column) => eprintln!("Outcome {:?} by {column:?}:", summary.outcome),
        None => eprintln!("Outcome {:?}:", summary.outcome),
    }
    eprintln!(
        "  {:<16} {:>8} {:>14} {:>8} {:>14} {:>10}",
        "Group", "Observed", "Observed mean", "Missing", "Missing mean", "Shift"
    );
    for group in &summary.groups {
        print_group(group);
    }
}

fn print_group(group: &GroupSummary) {
    let mean = |stats: Option<&DescriptiveStats>| {
        stats.map_or_else(|| "-".to_owned(), |s| format!("{:.3}", s.mean))
    };
    let shift = group
        .mean_shift()
        .map_or_else(|| "-".to_owned(), |shift| format!("{shift:+.3}"));
    eprintln!(
        "  {:<16} {:>8} {:>14} {:>8} {:>14} {:>10}",
        group.label,
        group.observed_count(),
        mean(group.observed.as_ref()),
        group.missing_count(),
        mean(group.missing.as_ref()),
        shift
    );
}
