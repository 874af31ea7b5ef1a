//! Fitting generalized linear models
//!
//! Deviance and cross-validation only need *some* way of turning training rows
//! into predictions; that capability is the [`ModelFitter`] trait. The crate
//! ships one implementation, [`IrlsFitter`], covering the two families the
//! tutorials use:
//!
//! | family                | link     | prediction             |
//! |-----------------------|----------|------------------------|
//! | [`Family::Gaussian`]  | identity | mean                   |
//! | [`Family::Binomial`]  | logit    | probability of `y = 1` |
//!
//! # Design matrix
//!
//! A [`Design`] names the outcome and predictor columns. The matrix always
//! starts with an intercept column; numeric predictors enter as-is and
//! categorical predictors are treatment-coded, one indicator per level except
//! the first in sorted order, which is the reference. Levels are learned from
//! the training rows, so predicting a row with an unseen level is an error.
//!
//! # Algorithm
//!
//! Iteratively reweighted least squares. Each iteration solves the weighted
//! normal equations `X'WX β = X'Wz` with working weights and response
//!
//! ```text
//! w = 1 / (V(μ) · g'(μ)²)
//! z = η + (y − μ) · g'(μ)
//! ```
//!
//! until the relative change in deviance drops below the tolerance. For the
//! Gaussian family this is ordinary least squares and converges in one step.
//!
//! # Examples
//!
//! ```
//! use statbook_data::{Record, RecordTable};
//! use statbook_glm::fit::{Design, Family, IrlsFitter, ModelFitter};
//!
//! let table = RecordTable::new(
//!     (1..=5).map(|i| Record::new(i).with_numeric("x", i as f64).with_numeric("y", 1.0 + 2.0 * i as f64)).collect(),
//! )
//! .unwrap();
//! let rows = table.iter().collect::<Vec<_>>();
//! let design = Design::new("y", ["x"], Family::Gaussian);
//!
//! let model = IrlsFitter::default().fit(&rows, &design).unwrap();
//! assert!((model.coefficient("x").unwrap() - 2.0).abs() < 1e-9);
//! assert!((model.predict(&Record::new(9).with_numeric("x", 10.0)).unwrap() - 21.0).abs() < 1e-9);
//! ```

use std::collections::BTreeSet;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use statbook_data::Record;

/// Fitted probabilities of the binomial family stay within this distance of 0 and 1.
const PROBABILITY_FLOOR: f64 = 1e-10;

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    /// Normal errors, identity link
    #[default]
    #[display("gaussian")]
    Gaussian,
    /// Bernoulli outcomes, logit link
    #[display("binomial")]
    Binomial,
}

/// Outcome and predictor columns of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Design {
    pub outcome: String,
    /// Empty for the intercept-only model
    pub predictors: Vec<String>,
    pub family: Family,
}

impl Design {
    pub fn new<I>(outcome: impl Into<String>, predictors: I, family: Family) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            outcome: outcome.into(),
            predictors: predictors.into_iter().map(Into::into).collect(),
            family,
        }
    }

    /// The intercept-only model of the same outcome and family.
    #[must_use]
    pub fn null(&self) -> Self {
        Self {
            outcome: self.outcome.clone(),
            predictors: vec![],
            family: self.family,
        }
    }
}

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error, derive_more::IsVariant)]
pub enum FitError {
    #[display("no training rows")]
    NoRows,
    #[display("{rows} rows cannot determine {parameters} parameters")]
    TooFewRows { rows: usize, parameters: usize },
    #[display("row {idx} has no value for {column:?}")]
    MissingValue { idx: u64, column: String },
    #[display("row {idx}: binomial outcome {value} is not 0 or 1")]
    NonBinaryOutcome { idx: u64, value: f64 },
    #[display("level {level:?} of {column:?} was not seen during fitting")]
    UnseenLevel { column: String, level: String },
    #[display("weighted least squares system is singular")]
    Singular,
}

/// How one predictor column is expanded into design-matrix columns.
#[derive(Debug, Clone, PartialEq)]
enum Term {
    Numeric(String),
    /// Sorted levels; the first is the reference
    Categorical { column: String, levels: Vec<String> },
}

impl Term {
    fn learn(column: &str, rows: &[&Record]) -> Result<Self, FitError> {
        let first = rows[0];
        if first.numeric(column).is_some() {
            return Ok(Self::Numeric(column.to_owned()));
        }
        if first.category(column).is_none() {
            return Err(FitError::MissingValue {
                idx: first.idx,
                column: column.to_owned(),
            });
        }
        let levels = rows
            .iter()
            .map(|row| {
                row.category(column).ok_or_else(|| FitError::MissingValue {
                    idx: row.idx,
                    column: column.to_owned(),
                })
            })
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(Self::Categorical {
            column: column.to_owned(),
            levels: levels.into_iter().map(str::to_owned).collect(),
        })
    }

    fn width(&self) -> usize {
        match self {
            Self::Numeric(_) => 1,
            Self::Categorical { levels, .. } => levels.len() - 1,
        }
    }

    fn names(&self) -> Vec<String> {
        match self {
            Self::Numeric(column) => vec![column.clone()],
            Self::Categorical { column, levels } => levels[1..]
                .iter()
                .map(|level| format!("{column}[{level}]"))
                .collect(),
        }
    }

    fn encode(&self, row: &Record, out: &mut Vec<f64>) -> Result<(), FitError> {
        match self {
            Self::Numeric(column) => {
                let value = row.numeric(column).ok_or_else(|| FitError::MissingValue {
                    idx: row.idx,
                    column: column.clone(),
                })?;
                out.push(value);
            }
            Self::Categorical { column, levels } => {
                let value = row.category(column).ok_or_else(|| FitError::MissingValue {
                    idx: row.idx,
                    column: column.clone(),
                })?;
                if !levels.iter().any(|level| level == value) {
                    return Err(FitError::UnseenLevel {
                        column: column.clone(),
                        level: value.to_owned(),
                    });
                }
                out.extend(levels[1..].iter().map(|level| if level == value { 1.0 } else { 0.0 }));
            }
        }
        Ok(())
    }
}

/// A named coefficient of a fitted model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coefficient {
    pub name: String,
    pub estimate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FittedModel {
    family: Family,
    terms: Vec<Term>,
    coefficients: Vec<Coefficient>,
    iterations: usize,
    converged: bool,
    deviance: f64,
}

impl FittedModel {
    #[must_use]
    pub fn family(&self) -> Family {
        self.family
    }

    /// Coefficients in design-matrix order, intercept first.
    #[must_use]
    pub fn coefficients(&self) -> &[Coefficient] {
        &self.coefficients
    }

    #[must_use]
    pub fn coefficient(&self, name: &str) -> Option<f64> {
        self.coefficients
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.estimate)
    }

    /// Number of fitted parameters, intercept included.
    #[must_use]
    pub fn num_parameters(&self) -> usize {
        self.coefficients.len()
    }

    #[must_use]
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    #[must_use]
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Deviance on the training rows (residual sum of squares for Gaussian).
    #[must_use]
    pub fn deviance(&self) -> f64 {
        self.deviance
    }

    /// Predicted mean for the Gaussian family, probability for Binomial.
    pub fn predict(&self, row: &Record) -> Result<f64, FitError> {
        let x = encode_row(&self.terms, row)?;
        let eta = x
            .iter()
            .zip(&self.coefficients)
            .map(|(x, c)| x * c.estimate)
            .sum::<f64>();
        Ok(match self.family {
            Family::Gaussian => eta,
            Family::Binomial => logistic(eta),
        })
    }

    pub fn predict_all<'a, I>(&self, rows: I) -> Result<Vec<f64>, FitError>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        rows.into_iter().map(|row| self.predict(row)).collect()
    }
}

/// Something that fits a [`Design`] to training rows.
pub trait ModelFitter {
    fn fit(&self, rows: &[&Record], design: &Design) -> Result<FittedModel, FitError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrlsConfig {
    pub max_iterations: usize,
    /// Convergence threshold on the relative change in deviance
    pub tolerance: f64,
}

impl Default for IrlsConfig {
    fn default() -> Self {
        Self {
            max_iterations: 25,
            tolerance: 1e-8,
        }
    }
}

/// Iteratively reweighted least squares.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct IrlsFitter {
    pub config: IrlsConfig,
}

impl ModelFitter for IrlsFitter {
    fn fit(&self, rows: &[&Record], design: &Design) -> Result<FittedModel, FitError> {
        if rows.is_empty() {
            return Err(FitError::NoRows);
        }
        let terms = design
            .predictors
            .iter()
            .map(|column| Term::learn(column, rows))
            .collect::<Result<Vec<_>, _>>()?;
        let p = 1 + terms.iter().map(Term::width).sum::<usize>();
        let n = rows.len();
        if n < p {
            return Err(FitError::TooFewRows {
                rows: n,
                parameters: p,
            });
        }

        let mut values = Vec::with_capacity(n * p);
        for row in rows {
            values.extend(encode_row(&terms, row)?);
        }
        let x = DMatrix::from_row_slice(n, p, &values);
        let y = rows
            .iter()
            .map(|row| {
                let value = row.numeric(&design.outcome).ok_or_else(|| FitError::MissingValue {
                    idx: row.idx,
                    column: design.outcome.clone(),
                })?;
                if design.family == Family::Binomial && value != 0.0 && value != 1.0 {
                    return Err(FitError::NonBinaryOutcome {
                        idx: row.idx,
                        value,
                    });
                }
                Ok(value)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let y = DVector::from_vec(y);

        let (beta, iterations, converged, deviance) = match design.family {
            Family::Gaussian => {
                let beta = solve_weighted_least_squares(&x, &y, &DVector::from_element(n, 1.0))?;
                let residuals = &y - &x * &beta;
                (beta, 1, true, residuals.norm_squared())
            }
            Family::Binomial => fit_logistic(&x, &y, self.config)?,
        };

        let names = std::iter::once("Intercept".to_owned()).chain(terms.iter().flat_map(Term::names));
        let coefficients = names
            .zip(beta.iter())
            .map(|(name, &estimate)| Coefficient { name, estimate })
            .collect();

        log::debug!(
            "fitted {} model of {:?} on {n} rows: {iterations} iterations, deviance {deviance:.4}",
            design.family,
            design.outcome
        );
        Ok(FittedModel {
            family: design.family,
            terms,
            coefficients,
            iterations,
            converged,
            deviance,
        })
    }
}

fn encode_row(terms: &[Term], row: &Record) -> Result<Vec<f64>, FitError> {
    let mut x = vec![1.0];
    for term in terms {
        term.encode(row, &mut x)?;
    }
    Ok(x)
}

fn logistic(eta: f64) -> f64 {
    1.0 / (1.0 + (-eta).exp())
}

fn binomial_deviance(y: &DVector<f64>, mu: &DVector<f64>) -> f64 {
    -2.0 * y
        .iter()
        .zip(mu.iter())
        .map(|(&y, &mu)| if y == 1.0 { mu.ln() } else { (1.0 - mu).ln() })
        .sum::<f64>()
}

fn fit_logistic(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    config: IrlsConfig,
) -> Result<(DVector<f64>, usize, bool, f64), FitError> {
    #[expect(clippy::cast_precision_loss)]
    let y_mean = y.sum() / y.len() as f64;
    let mut mu = y.map(|y| ((y + y_mean) / 2.0).clamp(PROBABILITY_FLOOR, 1.0 - PROBABILITY_FLOOR));
    let mut eta = mu.map(|mu| (mu / (1.0 - mu)).ln());
    let mut deviance = binomial_deviance(y, &mu);
    let mut beta = DVector::zeros(x.ncols());

    for iteration in 1..=config.max_iterations {
        // for the logit link V(μ) = μ(1 − μ) = 1 / g'(μ)
        let weights = mu.map(|mu| mu * (1.0 - mu));
        let z = DVector::from_fn(y.len(), |i, _| eta[i] + (y[i] - mu[i]) / weights[i]);
        beta = solve_weighted_least_squares(x, &z, &weights)?;
        eta = x * &beta;
        mu = eta.map(|eta| logistic(eta).clamp(PROBABILITY_FLOOR, 1.0 - PROBABILITY_FLOOR));

        let previous = deviance;
        deviance = binomial_deviance(y, &mu);
        let change = (deviance - previous).abs() / (deviance.abs() + 0.1);
        log::trace!("IRLS iteration {iteration}: deviance {deviance:.6}");
        if change < config.tolerance {
            return Ok((beta, iteration, true, deviance));
        }
    }

    log::warn!(
        "IRLS did not converge in {} iterations (deviance {deviance:.6})",
        config.max_iterations
    );
    Ok((beta, config.max_iterations, false, deviance))
}

/// Minimizes `Σ w_i (z_i − x_i'β)²`.
fn solve_weighted_least_squares(
    x: &DMatrix<f64>,
    z: &DVector<f64>,
    w: &DVector<f64>,
) -> Result<DVector<f64>, FitError> {
    let sqrt_w = w.map(f64::sqrt);
    let x_weighted = DMatrix::from_fn(x.nrows(), x.ncols(), |i, j| x[(i, j)] * sqrt_w[i]);
    let z_weighted = z.component_mul(&sqrt_w);

    let xtx = x_weighted.transpose() * &x_weighted;
    let xtz = x_weighted.transpose() * z_weighted;

    let beta = match xtx.clone().cholesky() {
        Some(chol) => chol.solve(&xtz),
        None => xtx.lu().solve(&xtz).ok_or(FitError::Singular)?,
    };
    if beta.iter().all(|b| b.is_finite()) {
        Ok(beta)
    } else {
        Err(FitError::Singular)
    }
}

#[cfg(test)]
mod tests {
    use statbook_data::{RecordTable, SimulationSeed, synth};

    use super::*;

    fn rows(table: &RecordTable) -> Vec<&Record> {
        table.iter().collect()
    }

    #[test]
    fn test_gaussian_matches_least_squares() {
        let xs = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let ys = [2.1, 3.9, 6.2, 7.8, 10.1, 12.2];
        let table = RecordTable::new(
            (1..)
                .zip(xs.iter().zip(&ys))
                .map(|(i, (&x, &y))| Record::new(i).with_numeric("x", x).with_numeric("y", y))
                .collect(),
        )
        .unwrap();

        let x_mean = xs.iter().sum::<f64>() / 6.0;
        let y_mean = ys.iter().sum::<f64>() / 6.0;
        let sxy = xs.iter().zip(&ys).map(|(x, y)| (x - x_mean) * (y - y_mean)).sum::<f64>();
        let sxx = xs.iter().map(|x| (x - x_mean).powi(2)).sum::<f64>();
        let slope = sxy / sxx;
        let intercept = y_mean - slope * x_mean;

        let model = IrlsFitter::default()
            .fit(&rows(&table), &Design::new("y", ["x"], Family::Gaussian))
            .unwrap();
        assert!((model.coefficient("Intercept").unwrap() - intercept).abs() < 1e-9);
        assert!((model.coefficient("x").unwrap() - slope).abs() < 1e-9);
        assert!(model.converged());
        assert_eq!(model.num_parameters(), 2);
    }

    #[test]
    fn test_categorical_treatment_coding() {
        let table = RecordTable::new(
            (1..=6)
                .map(|i| {
                    let (sex, weight) = if i % 2 == 0 { ("F", 60.0) } else { ("M", 90.0) };
                    Record::new(i)
                        .with_category("sex", sex)
                        .with_numeric("weight", weight)
                })
                .collect(),
        )
        .unwrap();
        let model = IrlsFitter::default()
            .fit(&rows(&table), &Design::new("weight", ["sex"], Family::Gaussian))
            .unwrap();
        let names = model.coefficients().iter().map(|c| c.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["Intercept", "sex[M]"]);
        assert!((model.coefficient("Intercept").unwrap() - 60.0).abs() < 1e-9);
        assert!((model.coefficient("sex[M]").unwrap() - 30.0).abs() < 1e-9);

        let unseen = Record::new(99).with_category("sex", "X");
        assert!(model.predict(&unseen).unwrap_err().is_unseen_level());
    }

    #[test]
    fn test_intercept_only_logistic_is_logit_of_mean() {
        let table = RecordTable::new(
            (1..=10)
                .map(|i| Record::new(i).with_numeric("y", if i <= 3 { 1.0 } else { 0.0 }))
                .collect(),
        )
        .unwrap();
        let design = Design::new("y", Vec::<String>::new(), Family::Binomial);
        let model = IrlsFitter::default().fit(&rows(&table), &design).unwrap();
        assert!(model.converged());
        assert!((model.coefficient("Intercept").unwrap() - (0.3_f64 / 0.7).ln()).abs() < 1e-6);
        assert!((model.predict(&Record::new(1)).unwrap() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_logistic_improves_on_null() {
        let table = synth::generate_heart(
            &synth::HeartConfig::default(),
            &mut SimulationSeed::from_u128(17).rng(),
        )
        .unwrap();
        let design = Design::new("heart_disease", ["age", "sex"], Family::Binomial);
        let fitter = IrlsFitter::default();
        let full = fitter.fit(&rows(&table), &design).unwrap();
        let null = fitter.fit(&rows(&table), &design.null()).unwrap();

        assert!(full.converged());
        assert!(full.deviance() <= null.deviance());
        assert!(full.coefficient("age").unwrap() > 0.0);
        let predictions = full.predict_all(&table).unwrap();
        assert!(predictions.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_fit_errors() {
        let fitter = IrlsFitter::default();
        let design = Design::new("y", ["x"], Family::Binomial);
        assert_eq!(fitter.fit(&[], &design), Err(FitError::NoRows));

        let table = RecordTable::new(
            (1..=4)
                .map(|i| Record::new(i).with_numeric("x", 0.0).with_numeric("y", f64::from(u8::try_from(i).unwrap())))
                .collect(),
        )
        .unwrap();
        assert!(fitter.fit(&rows(&table), &design).unwrap_err().is_non_binary_outcome());
        assert_eq!(
            fitter.fit(&rows(&table), &Design::new("y", ["x"], Family::Gaussian)),
            Err(FitError::Singular)
        );
        assert!(
            fitter
                .fit(&rows(&table), &Design::new("y", ["z"], Family::Gaussian))
                .unwrap_err()
                .is_missing_value()
        );
        assert!(
            fitter
                .fit(&rows(&table)[..1], &Design::new("y", ["x"], Family::Gaussian))
                .unwrap_err()
                .is_too_few_rows()
        );
    }
}
