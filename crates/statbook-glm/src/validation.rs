//! Cross-validated prediction error
//!
//! A [`ValidationStrategy`] splits row positions into [`Partition`]s of
//! training and test rows:
//!
//! - [`ValidationStrategy::ValidationSet`]: one random split
//! - [`ValidationStrategy::RepeatedSplits`]: several independent random splits
//! - [`ValidationStrategy::LeaveOneOut`]: `n` partitions, each holding out one row
//!
//! [`cross_validate`] fits the design on every training set, predicts the
//! held-out rows and records their mean squared error. For leave-one-out this
//! is the squared residual of the single held-out row, so the mean over all
//! partitions is the LOOCV estimate
//!
//! ```text
//! CV(n) = (1/n) Σ (y_i − ŷ_(−i))²
//! ```
//!
//! All partitions are drawn up front from the seed; the fits then run on
//! scoped worker threads, so the result does not depend on scheduling.
//!
//! # Examples
//!
//! ```
//! use statbook_data::{Record, RecordTable, SimulationSeed};
//! use statbook_glm::{
//!     fit::{Design, Family, IrlsFitter},
//!     validation::{ValidationStrategy, cross_validate},
//! };
//!
//! let table = RecordTable::new(
//!     (1..=20).map(|i| Record::new(i).with_numeric("x", i as f64).with_numeric("y", 3.0 * i as f64)).collect(),
//! )
//! .unwrap();
//! let design = Design::new("y", ["x"], Family::Gaussian);
//! let result = cross_validate(
//!     &table,
//!     &design,
//!     &IrlsFitter::default(),
//!     ValidationStrategy::LeaveOneOut,
//!     SimulationSeed::from_u128(0),
//! )
//! .unwrap();
//!
//! assert_eq!(result.errors.len(), 20);
//! assert!(result.mean_error() < 1e-12);
//! ```

use std::{num::NonZero, thread};

use rand::{Rng, seq::index};
use serde::{Deserialize, Serialize};
use statbook_data::{RecordTable, SimulationSeed};
use statbook_stats::descriptive::DescriptiveStats;

use crate::fit::{Design, FitError, ModelFitter};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ValidationStrategy {
    /// A single random split
    ValidationSet { train_fraction: f64 },
    /// `repeats` independent random splits
    RepeatedSplits { train_fraction: f64, repeats: usize },
    /// Each row held out once
    LeaveOneOut,
}

/// Row positions used for fitting and for testing in one iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Partition {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error, derive_more::IsVariant)]
pub enum ValidationError {
    #[display("train fraction {train_fraction} leaves no training or no test rows out of {rows}")]
    InvalidFraction { train_fraction: f64, rows: usize },
    #[display("number of repeats must be positive")]
    NoRepeats,
    #[display("cross-validation needs at least 2 rows, got {rows}")]
    TooFewRows { rows: usize },
    #[display("iteration {iteration} failed")]
    Fit {
        iteration: usize,
        #[error(source)]
        source: FitError,
    },
}

impl ValidationStrategy {
    /// Draws the partitions of `rows` row positions.
    pub fn partitions<R>(&self, rows: usize, rng: &mut R) -> Result<Vec<Partition>, ValidationError>
    where
        R: Rng + ?Sized,
    {
        if rows < 2 {
            return Err(ValidationError::TooFewRows { rows });
        }
        match *self {
            Self::ValidationSet { train_fraction } => {
                Ok(vec![random_split(rows, train_fraction, rng)?])
            }
            Self::RepeatedSplits {
                train_fraction,
                repeats,
            } => {
                if repeats == 0 {
                    return Err(ValidationError::NoRepeats);
                }
                (0..repeats)
                    .map(|_| random_split(rows, train_fraction, rng))
                    .collect()
            }
            Self::LeaveOneOut => Ok((0..rows)
                .map(|held_out| Partition {
                    train: (0..rows).filter(|&i| i != held_out).collect(),
                    test: vec![held_out],
                })
                .collect()),
        }
    }
}

#[expect(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn random_split<R>(rows: usize, train_fraction: f64, rng: &mut R) -> Result<Partition, ValidationError>
where
    R: Rng + ?Sized,
{
    let invalid = ValidationError::InvalidFraction {
        train_fraction,
        rows,
    };
    if !(0.0..=1.0).contains(&train_fraction) {
        return Err(invalid);
    }
    let train_size = (train_fraction * rows as f64).round() as usize;
    if train_size == 0 || train_size >= rows {
        return Err(invalid);
    }

    let mut in_train = vec![false; rows];
    for i in index::sample(rng, rows, train_size).iter() {
        in_train[i] = true;
    }
    let (train, test) = (0..rows).partition(|&i| in_train[i]);
    Ok(Partition { train, test })
}

/// Per-partition test errors of a cross-validation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossValidation {
    pub strategy: ValidationStrategy,
    pub design: Design,
    /// Test mean squared error of each partition, in partition order
    pub errors: Vec<f64>,
    pub summary: DescriptiveStats,
}

impl CrossValidation {
    /// The cross-validation estimate of the prediction error.
    #[must_use]
    pub fn mean_error(&self) -> f64 {
        self.summary.mean
    }
}

fn test_error<F>(
    table: &RecordTable,
    design: &Design,
    fitter: &F,
    partition: &Partition,
) -> Result<f64, FitError>
where
    F: ModelFitter + ?Sized,
{
    let rows = table.rows();
    let train = partition.train.iter().map(|&i| &rows[i]).collect::<Vec<_>>();
    let model = fitter.fit(&train, design)?;

    let mut sum = 0.0;
    for &i in &partition.test {
        let row = &rows[i];
        let observed = row.numeric(&design.outcome).ok_or_else(|| FitError::MissingValue {
            idx: row.idx,
            column: design.outcome.clone(),
        })?;
        sum += (observed - model.predict(row)?).powi(2);
    }
    #[expect(clippy::cast_precision_loss)]
    let n = partition.test.len() as f64;
    Ok(sum / n)
}

/// Estimates the test error of `design` under `strategy`.
pub fn cross_validate<F>(
    table: &RecordTable,
    design: &Design,
    fitter: &F,
    strategy: ValidationStrategy,
    seed: SimulationSeed,
) -> Result<CrossValidation, ValidationError>
where
    F: ModelFitter + Sync + ?Sized,
{
    let partitions = strategy.partitions(table.len(), &mut seed.rng())?;
    let workers = thread::available_parallelism()
        .map_or(1, NonZero::get)
        .min(partitions.len());
    let chunk_size = partitions.len().div_ceil(workers);
    log::info!(
        "cross-validating {:?} over {} partitions on {workers} threads",
        design.outcome,
        partitions.len()
    );

    let mut results = partitions
        .iter()
        .map(|_| Ok(f64::NAN))
        .collect::<Vec<Result<f64, FitError>>>();
    thread::scope(|s| {
        for (partitions, results) in partitions
            .chunks(chunk_size)
            .zip(results.chunks_mut(chunk_size))
        {
            s.spawn(move || {
                for (partition, result) in partitions.iter().zip(results) {
                    *result = test_error(table, design, fitter, partition);
                }
            });
        }
    });

    let errors = results
        .into_iter()
        .enumerate()
        .map(|(iteration, result)| {
            result.map_err(|source| ValidationError::Fit { iteration, source })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let summary = DescriptiveStats::new(errors.iter().copied())
        .ok_or(ValidationError::TooFewRows { rows: table.len() })?;
    log::info!("cross-validation error: {:.6}", summary.mean);

    Ok(CrossValidation {
        strategy,
        design: design.clone(),
        errors,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use statbook_data::{Record, synth};

    use crate::fit::{Family, IrlsFitter};

    use super::*;

    fn noisy_line() -> RecordTable {
        let ys = [1.2, 2.7, 3.1, 4.9, 5.2, 6.8, 7.1, 8.9, 9.4, 10.6];
        RecordTable::new(
            (1..)
                .zip(ys)
                .map(|(i, y)| {
                    #[expect(clippy::cast_precision_loss)]
                    let x = i as f64;
                    Record::new(i).with_numeric("x", x).with_numeric("y", y)
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_leave_one_out_partitions() {
        let partitions = ValidationStrategy::LeaveOneOut
            .partitions(5, &mut SimulationSeed::from_u128(0).rng())
            .unwrap();
        assert_eq!(partitions.len(), 5);
        for (i, partition) in partitions.iter().enumerate() {
            assert_eq!(partition.test, vec![i]);
            assert_eq!(partition.train.len(), 4);
            assert!(!partition.train.contains(&i));
        }
    }

    #[test]
    fn test_repeated_split_sizes() {
        let strategy = ValidationStrategy::RepeatedSplits {
            train_fraction: 0.7,
            repeats: 4,
        };
        let partitions = strategy
            .partitions(10, &mut SimulationSeed::from_u128(1).rng())
            .unwrap();
        assert_eq!(partitions.len(), 4);
        for partition in &partitions {
            assert_eq!(partition.train.len(), 7);
            assert_eq!(partition.test.len(), 3);
            let mut all = partition.train.iter().chain(&partition.test).copied().collect::<Vec<_>>();
            all.sort_unstable();
            assert_eq!(all, (0..10).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_invalid_strategies() {
        let mut rng = SimulationSeed::from_u128(0).rng();
        let invalid = [
            ValidationStrategy::ValidationSet { train_fraction: 0.0 },
            ValidationStrategy::ValidationSet { train_fraction: 1.0 },
            ValidationStrategy::ValidationSet { train_fraction: f64::NAN },
        ];
        for strategy in invalid {
            assert!(strategy.partitions(10, &mut rng).unwrap_err().is_invalid_fraction());
        }
        let no_repeats = ValidationStrategy::RepeatedSplits {
            train_fraction: 0.5,
            repeats: 0,
        };
        assert_eq!(no_repeats.partitions(10, &mut rng), Err(ValidationError::NoRepeats));
        assert_eq!(
            ValidationStrategy::LeaveOneOut.partitions(1, &mut rng),
            Err(ValidationError::TooFewRows { rows: 1 })
        );
    }

    #[test]
    fn test_loocv_matches_hat_matrix_shortcut() {
        let table = noisy_line();
        let design = Design::new("y", ["x"], Family::Gaussian);
        let result = cross_validate(
            &table,
            &design,
            &IrlsFitter::default(),
            ValidationStrategy::LeaveOneOut,
            SimulationSeed::from_u128(0),
        )
        .unwrap();

        // for least squares, CV(n) = mean((e_i / (1 - h_i))^2)
        let xs = table.numeric_column("x").unwrap();
        let ys = table.numeric_column("y").unwrap();
        let n = 10.0;
        let x_mean = xs.iter().sum::<f64>() / n;
        let y_mean = ys.iter().sum::<f64>() / n;
        let sxx = xs.iter().map(|x| (x - x_mean).powi(2)).sum::<f64>();
        let slope = xs.iter().zip(&ys).map(|(x, y)| (x - x_mean) * (y - y_mean)).sum::<f64>() / sxx;
        let intercept = y_mean - slope * x_mean;
        let shortcut = xs
            .iter()
            .zip(&ys)
            .map(|(x, y)| {
                let residual = y - (intercept + slope * x);
                let leverage = 1.0 / n + (x - x_mean).powi(2) / sxx;
                (residual / (1.0 - leverage)).powi(2)
            })
            .sum::<f64>()
            / n;

        assert_eq!(result.errors.len(), 10);
        assert!((result.mean_error() - shortcut).abs() < 1e-9);
    }

    #[test]
    fn test_same_seed_same_errors() {
        let table = synth::generate_patients(
            &synth::PatientConfig {
                rows: 200,
                ..synth::PatientConfig::default()
            },
            &mut SimulationSeed::from_u128(8).rng(),
        )
        .unwrap();
        let design = Design::new("weight", ["sex", "height"], Family::Gaussian);
        let strategy = ValidationStrategy::RepeatedSplits {
            train_fraction: 0.5,
            repeats: 6,
        };
        let run = |seed| {
            cross_validate(&table, &design, &IrlsFitter::default(), strategy, SimulationSeed::from_u128(seed))
                .unwrap()
        };
        let a = run(3);
        let b = run(3);
        assert_eq!(a.errors, b.errors);
        assert_eq!(a.errors.len(), 6);
        assert_ne!(a.errors, run(4).errors);
        assert!(a.summary.min <= a.mean_error() && a.mean_error() <= a.summary.max);
    }

    #[test]
    fn test_fit_failure_reports_iteration() {
        let table = RecordTable::new(
            (1..=4)
                .map(|i| Record::new(i).with_numeric("y", if i == 1 { 2.0 } else { 0.0 }))
                .collect(),
        )
        .unwrap();
        let design = Design::new("y", Vec::<String>::new(), Family::Binomial);
        let err = cross_validate(
            &table,
            &design,
            &IrlsFitter::default(),
            ValidationStrategy::LeaveOneOut,
            SimulationSeed::from_u128(0),
        )
        .unwrap_err();
        // only the partition holding out row 1 trains without it
        assert!(matches!(err, ValidationError::Fit { iteration: 1, .. }));
    }
}
