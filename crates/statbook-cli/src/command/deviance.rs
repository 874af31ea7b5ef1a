use std::path::PathBuf;

use anyhow::Context;
use serde::Serialize;
use statbook_data::Record;
use statbook_glm::{
    DevianceReport, Family, ModelTriple, ProbabilityPolicy,
    fit::{Coefficient, Design, IrlsFitter, ModelFitter},
};

use crate::util::{self, Output, Report};

/// Rows listed when `--show-terms` is not given.
const WORST_ROWS: usize = 5;

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct DevianceArg {
    /// Input data file (CSV, TSV or JSON)
    data: PathBuf,
    /// Comma-separated columns read as categorical even if every value is a number
    #[arg(long)]
    categorical: Option<String>,
    /// Binary (0/1) outcome column
    #[arg(long)]
    outcome: String,
    /// Comma-separated predictor columns of the proposed model
    #[arg(long)]
    predictors: Option<String>,
    /// Clamp predictions into [EPS, 1 - EPS] instead of rejecting 0 and 1
    #[arg(long, value_name = "EPS")]
    clamp: Option<f64>,
    /// Print the log-likelihood term of every row
    #[arg(long)]
    show_terms: bool,
    /// Output file path for a JSON report
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct DevianceOutput<'a> {
    design: &'a Design,
    coefficients: &'a [Coefficient],
    converged: bool,
    iterations: usize,
    #[serde(flatten)]
    report: &'a DevianceReport,
}

pub(crate) fn run(arg: &DevianceArg) -> anyhow::Result<()> {
    let categorical = util::split_columns(arg.categorical.as_deref());
    let table = util::read_table(&arg.data, &categorical)?;
    let design = Design::new(
        arg.outcome.clone(),
        util::split_columns(arg.predictors.as_deref()),
        Family::Binomial,
    );
    let policy = arg
        .clamp
        .map_or(ProbabilityPolicy::Strict, |epsilon| ProbabilityPolicy::Clamp { epsilon });

    let rows = table.iter().collect::<Vec<_>>();
    let model = IrlsFitter::default()
        .fit(&rows, &design)
        .with_context(|| format!("Failed to fit logistic model of {:?}", design.outcome))?;
    let predictions = model
        .predict_all(rows.iter().copied())
        .context("Failed to predict")?;
    let outcomes = table.numeric_column(&design.outcome)?;
    let triple = ModelTriple::from_predictions(outcomes, predictions)
        .context("Failed to build model triple")?;
    let report = DevianceReport::compute(&triple, model.num_parameters(), policy)
        .context("Failed to compute deviance")?;

    println!(
        "Model: {} ~ {} ({} family)",
        design.outcome,
        formula_rhs(&design),
        model.family()
    );
    if !model.converged() {
        println!("  (IRLS did not converge in {} iterations)", model.iterations());
    }
    println!("Coefficients:");
    for coefficient in model.coefficients() {
        println!("  {:<20} {:>12.6}", coefficient.name, coefficient.estimate);
    }
    println!();
    println!("Log-likelihood:");
    println!("  {:<20} {:>12.4}", "Null", report.ll_null);
    println!("  {:<20} {:>12.4}", "Proposed", report.ll_proposed);
    println!("  {:<20} {:>12.4}", "Saturated", report.ll_saturated);
    println!();
    println!(
        "Null deviance:     {:>12.4} on {} degrees of freedom",
        report.null_deviance, report.null_df
    );
    println!(
        "Residual deviance: {:>12.4} on {} degrees of freedom",
        report.residual_deviance, report.residual_df
    );
    println!(
        "LR statistic:      {:>12.4} on {} degrees of freedom",
        report.lr_statistic,
        report.num_parameters - 1
    );
    println!("AIC:               {:>12.4}", report.aic);
    println!("BIC:               {:>12.4}", report.bic);

    let (title, positions) = if arg.show_terms {
        ("Per-row log-likelihood:", (0..rows.len()).collect())
    } else {
        ("Worst-predicted rows:", report.worst_rows(WORST_ROWS))
    };
    println!();
    println!("{title}");
    println!("  {:>8} {:>4} {:>10} {:>12}", "idx", "y", "p", "log P(y)");
    for i in positions {
        print_term(rows[i], triple.outcomes()[i], triple.proposed()[i], report.terms[i]);
    }

    if let Some(path) = &arg.output {
        let output = Report::new(DevianceOutput {
            design: &design,
            coefficients: model.coefficients(),
            converged: model.converged(),
            iterations: model.iterations(),
            report: &report,
        });
        Output::save_json(&output, Some(path.clone()))?;
    }
    Ok(())
}

fn formula_rhs(design: &Design) -> String {
    if design.predictors.is_empty() {
        "1".to_owned()
    } else {
        design.predictors.join(" + ")
    }
}

fn print_term(row: &Record, outcome: f64, prediction: f64, term: f64) {
    println!("  {:>8} {outcome:>4} {prediction:>10.4} {term:>12.4}", row.idx);
}
