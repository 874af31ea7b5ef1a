//! Bernoulli log-likelihood
//!
//! For binary outcomes `y` and predicted probabilities `p` the log-likelihood
//! is the sum over rows of
//!
//! ```text
//! y·log(p) + (1 − y)·log(1 − p)
//! ```
//!
//! Each term is evaluated by branching on `y`, so only one logarithm is taken
//! per row and a prediction equal to its outcome contributes exactly `0`. This
//! is what makes the saturated model's log-likelihood exactly zero.
//!
//! A prediction of exactly 0 or 1 that contradicts its outcome has an
//! undefined logarithm. How that is handled is a [`ProbabilityPolicy`]:
//! rejected by default, or clamped away from the boundary on request.
//!
//! # Examples
//!
//! ```
//! use statbook_glm::likelihood::{ProbabilityPolicy, log_likelihood};
//!
//! let y = [1.0, 0.0, 1.0, 0.0];
//! let ll = log_likelihood(&y, &[0.5; 4], ProbabilityPolicy::Strict).unwrap();
//! assert!((ll - 4.0 * 0.5_f64.ln()).abs() < 1e-12);
//!
//! // saturated model
//! assert_eq!(log_likelihood(&y, &y, ProbabilityPolicy::Strict).unwrap(), 0.0);
//!
//! // a confident wrong prediction
//! assert!(log_likelihood(&y, &[0.0, 0.0, 1.0, 0.0], ProbabilityPolicy::Strict).is_err());
//! let clamped = log_likelihood(&y, &[0.0, 0.0, 1.0, 0.0], ProbabilityPolicy::Clamp { epsilon: 1e-6 }).unwrap();
//! assert!((clamped - 1e-6_f64.ln()).abs() < 1e-12);
//! ```

use serde::{Deserialize, Serialize};

/// Handling of predictions of exactly 0 or 1 that contradict the outcome.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ProbabilityPolicy {
    /// Fail with [`LikelihoodError::DegenerateProbability`]
    #[default]
    Strict,
    /// Clamp predictions into `[epsilon, 1 − epsilon]` before taking the log.
    ///
    /// Predictions equal to their outcome still contribute exactly 0.
    Clamp { epsilon: f64 },
}

impl ProbabilityPolicy {
    fn validate(self) -> Result<(), LikelihoodError> {
        match self {
            Self::Strict => Ok(()),
            Self::Clamp { epsilon } if epsilon > 0.0 && epsilon < 0.5 => Ok(()),
            Self::Clamp { epsilon } => Err(LikelihoodError::InvalidEpsilon { epsilon }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error, derive_more::IsVariant)]
pub enum LikelihoodError {
    #[display("no observations")]
    Empty,
    #[display("length mismatch: {outcomes} outcomes, {predictions} predictions")]
    LengthMismatch { outcomes: usize, predictions: usize },
    #[display("row {row}: outcome {value} is not 0 or 1")]
    InvalidOutcome { row: usize, value: f64 },
    #[display("row {row}: predicted probability {value} is not within [0, 1]")]
    InvalidProbability { row: usize, value: f64 },
    #[display("row {row}: predicted probability {probability} contradicts outcome {outcome}")]
    DegenerateProbability {
        row: usize,
        outcome: f64,
        probability: f64,
    },
    #[display("null model predictions are not constant")]
    NonConstantNull,
    #[display("row {row}: saturated prediction {prediction} differs from outcome {outcome}")]
    NonSaturated {
        row: usize,
        outcome: f64,
        prediction: f64,
    },
    #[display("clamp epsilon {epsilon} is not within (0, 0.5)")]
    InvalidEpsilon { epsilon: f64 },
    #[display("{num_parameters} parameters do not fit {observations} observations")]
    InvalidParameterCount {
        num_parameters: usize,
        observations: usize,
    },
}

pub(crate) fn check_outcomes(outcomes: &[f64]) -> Result<(), LikelihoodError> {
    if outcomes.is_empty() {
        return Err(LikelihoodError::Empty);
    }
    match outcomes.iter().position(|&y| y != 0.0 && y != 1.0) {
        Some(row) => Err(LikelihoodError::InvalidOutcome {
            row,
            value: outcomes[row],
        }),
        None => Ok(()),
    }
}

fn term(row: usize, outcome: f64, probability: f64, policy: ProbabilityPolicy) -> Result<f64, LikelihoodError> {
    if !(0.0..=1.0).contains(&probability) {
        return Err(LikelihoodError::InvalidProbability {
            row,
            value: probability,
        });
    }
    if probability == outcome {
        return Ok(0.0);
    }
    let p = match policy {
        ProbabilityPolicy::Strict => probability,
        ProbabilityPolicy::Clamp { epsilon } => probability.clamp(epsilon, 1.0 - epsilon),
    };
    let q = if outcome == 1.0 { p } else { 1.0 - p };
    if q == 0.0 {
        return Err(LikelihoodError::DegenerateProbability {
            row,
            outcome,
            probability,
        });
    }
    Ok(q.ln())
}

/// Per-observation log-probabilities `log P(Y = y_i)`.
pub fn log_likelihood_terms(
    outcomes: &[f64],
    predictions: &[f64],
    policy: ProbabilityPolicy,
) -> Result<Vec<f64>, LikelihoodError> {
    policy.validate()?;
    check_outcomes(outcomes)?;
    if outcomes.len() != predictions.len() {
        return Err(LikelihoodError::LengthMismatch {
            outcomes: outcomes.len(),
            predictions: predictions.len(),
        });
    }
    outcomes
        .iter()
        .zip(predictions)
        .enumerate()
        .map(|(row, (&y, &p))| term(row, y, p, policy))
        .collect()
}

/// Log-likelihood of `predictions` given binary `outcomes`; never positive.
pub fn log_likelihood(
    outcomes: &[f64],
    predictions: &[f64],
    policy: ProbabilityPolicy,
) -> Result<f64, LikelihoodError> {
    Ok(log_likelihood_terms(outcomes, predictions, policy)?
        .into_iter()
        .sum())
}

/// `2 × (ll_saturated − ll_model)`.
#[must_use]
pub fn deviance(ll_model: f64, ll_saturated: f64) -> f64 {
    2.0 * (ll_saturated - ll_model)
}

#[cfg(test)]
mod tests {
    use super::*;

    const Y: [f64; 4] = [1.0, 0.0, 1.0, 0.0];

    #[test]
    fn test_proposed_model() {
        let ll = log_likelihood(&Y, &[0.9, 0.1, 0.8, 0.3], ProbabilityPolicy::Strict).unwrap();
        let expected = 0.9_f64.ln() + 0.9_f64.ln() + 0.8_f64.ln() + 0.7_f64.ln();
        assert!((ll - expected).abs() < 1e-12);
        assert!((ll - (-0.7905)).abs() < 1e-4);
    }

    #[test]
    fn test_null_model_and_deviance() {
        let ll = log_likelihood(&Y, &[0.5; 4], ProbabilityPolicy::Strict).unwrap();
        assert!((ll - (-2.773)).abs() < 1e-3);
        let saturated = log_likelihood(&Y, &Y, ProbabilityPolicy::Strict).unwrap();
        assert_eq!(saturated, 0.0);
        assert!((deviance(ll, saturated) - 5.545).abs() < 1e-3);
    }

    #[test]
    fn test_saturated_is_zero_under_both_policies() {
        let y = [1.0, 1.0, 0.0, 1.0, 0.0];
        for policy in [
            ProbabilityPolicy::Strict,
            ProbabilityPolicy::Clamp { epsilon: 1e-9 },
        ] {
            let terms = log_likelihood_terms(&y, &y, policy).unwrap();
            assert!(terms.iter().all(|&t| t == 0.0));
        }
    }

    #[test]
    fn test_terms_are_non_positive() {
        let terms = log_likelihood_terms(&Y, &[0.2, 0.7, 0.99, 0.01], ProbabilityPolicy::Strict).unwrap();
        assert_eq!(terms.len(), 4);
        assert!(terms.iter().all(|&t| t <= 0.0));
        assert!((terms[1] - 0.3_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_probability() {
        let err = log_likelihood(&Y, &[0.9, 1.0, 0.8, 0.3], ProbabilityPolicy::Strict).unwrap_err();
        assert_eq!(
            err,
            LikelihoodError::DegenerateProbability {
                row: 1,
                outcome: 0.0,
                probability: 1.0
            }
        );
    }

    #[test]
    fn test_invalid_inputs() {
        let strict = ProbabilityPolicy::Strict;
        assert_eq!(log_likelihood(&[], &[], strict), Err(LikelihoodError::Empty));
        assert!(log_likelihood(&Y, &[0.5; 3], strict).unwrap_err().is_length_mismatch());
        assert!(log_likelihood(&[1.0, 2.0], &[0.5; 2], strict).unwrap_err().is_invalid_outcome());
        assert!(log_likelihood(&Y, &[0.5, 0.5, 1.5, 0.5], strict).unwrap_err().is_invalid_probability());
        assert!(log_likelihood(&Y, &[0.5, f64::NAN, 0.5, 0.5], strict).unwrap_err().is_invalid_probability());
        assert!(log_likelihood(&Y, &[0.5; 4], ProbabilityPolicy::Clamp { epsilon: 0.0 }).unwrap_err().is_invalid_epsilon());
    }

    #[test]
    fn test_policy_serde() {
        let clamp: ProbabilityPolicy = serde_json::from_str(r#"{"policy": "clamp", "epsilon": 1e-6}"#).unwrap();
        assert_eq!(clamp, ProbabilityPolicy::Clamp { epsilon: 1e-6 });
        assert_eq!(ProbabilityPolicy::default(), ProbabilityPolicy::Strict);
    }
}
