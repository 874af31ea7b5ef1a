//! Null and residual deviance
//!
//! Deviance measures how far a model's log-likelihood falls short of the
//! saturated model, the one with a free parameter per observation that
//! predicts every outcome exactly:
//!
//! ```text
//! deviance(model) = 2 × (LL(saturated) − LL(model))
//! ```
//!
//! Two invocations are standard:
//!
//! - **Null deviance**: the intercept-only model, predicting the outcome mean
//!   for every row
//! - **Residual deviance**: the proposed model with its predictors
//!
//! Their difference is the likelihood-ratio statistic for the predictors,
//! χ²-distributed with `num_parameters − 1` degrees of freedom under the null
//! hypothesis that they carry no information.
//!
//! # Examples
//!
//! ```
//! use statbook_glm::{
//!     deviance::{DevianceReport, ModelTriple},
//!     likelihood::ProbabilityPolicy,
//! };
//!
//! let triple = ModelTriple::new(
//!     vec![1.0, 0.0, 1.0, 0.0],
//!     vec![0.5; 4],
//!     vec![0.9, 0.1, 0.8, 0.3],
//!     vec![1.0, 0.0, 1.0, 0.0],
//! )
//! .unwrap();
//! let report = DevianceReport::compute(&triple, 2, ProbabilityPolicy::Strict).unwrap();
//!
//! assert_eq!(report.ll_saturated, 0.0);
//! assert!((report.null_deviance - 5.545).abs() < 1e-3);
//! assert!(report.residual_deviance < report.null_deviance);
//! assert_eq!((report.null_df, report.residual_df), (3, 2));
//! ```

use serde::Serialize;

use crate::likelihood::{
    LikelihoodError, ProbabilityPolicy, check_outcomes, deviance, log_likelihood,
    log_likelihood_terms,
};

/// Outcomes with the predictions of the null, proposed and saturated models.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelTriple {
    outcomes: Vec<f64>,
    null: Vec<f64>,
    proposed: Vec<f64>,
    saturated: Vec<f64>,
}

impl ModelTriple {
    /// Builds a triple, checking lengths, binary outcomes, a constant null
    /// model and saturated predictions equal to the outcomes.
    pub fn new(
        outcomes: Vec<f64>,
        null: Vec<f64>,
        proposed: Vec<f64>,
        saturated: Vec<f64>,
    ) -> Result<Self, LikelihoodError> {
        check_outcomes(&outcomes)?;
        for predictions in [&null, &proposed, &saturated] {
            if predictions.len() != outcomes.len() {
                return Err(LikelihoodError::LengthMismatch {
                    outcomes: outcomes.len(),
                    predictions: predictions.len(),
                });
            }
        }
        if null.windows(2).any(|w| w[0] != w[1]) {
            return Err(LikelihoodError::NonConstantNull);
        }
        if let Some(row) = saturated.iter().zip(&outcomes).position(|(p, y)| p != y) {
            return Err(LikelihoodError::NonSaturated {
                row,
                outcome: outcomes[row],
                prediction: saturated[row],
            });
        }
        Ok(Self {
            outcomes,
            null,
            proposed,
            saturated,
        })
    }

    /// Builds a triple from outcomes and the proposed model's predictions.
    ///
    /// The null model predicts the outcome mean; the saturated model predicts
    /// the outcomes themselves.
    pub fn from_predictions(outcomes: Vec<f64>, proposed: Vec<f64>) -> Result<Self, LikelihoodError> {
        check_outcomes(&outcomes)?;
        #[expect(clippy::cast_precision_loss)]
        let mean = outcomes.iter().sum::<f64>() / outcomes.len() as f64;
        let null = vec![mean; outcomes.len()];
        let saturated = outcomes.clone();
        Self::new(outcomes, null, proposed, saturated)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    #[must_use]
    pub fn outcomes(&self) -> &[f64] {
        &self.outcomes
    }

    #[must_use]
    pub fn null(&self) -> &[f64] {
        &self.null
    }

    #[must_use]
    pub fn proposed(&self) -> &[f64] {
        &self.proposed
    }

    #[must_use]
    pub fn saturated(&self) -> &[f64] {
        &self.saturated
    }
}

/// Log-likelihoods and deviance statistics of a [`ModelTriple`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DevianceReport {
    pub observations: usize,
    /// Number of fitted parameters of the proposed model, intercept included
    pub num_parameters: usize,
    pub policy: ProbabilityPolicy,
    pub ll_null: f64,
    pub ll_proposed: f64,
    pub ll_saturated: f64,
    pub null_deviance: f64,
    pub residual_deviance: f64,
    /// `n − 1`
    pub null_df: usize,
    /// `n − num_parameters`
    pub residual_df: usize,
    /// `null_deviance − residual_deviance`
    pub lr_statistic: f64,
    /// `−2·LL + 2·k` of the proposed model
    pub aic: f64,
    /// `−2·LL + k·ln(n)` of the proposed model
    pub bic: f64,
    /// Per-observation log-probabilities under the proposed model
    pub terms: Vec<f64>,
}

impl DevianceReport {
    pub fn compute(
        triple: &ModelTriple,
        num_parameters: usize,
        policy: ProbabilityPolicy,
    ) -> Result<Self, LikelihoodError> {
        let n = triple.len();
        if num_parameters == 0 || num_parameters > n {
            return Err(LikelihoodError::InvalidParameterCount {
                num_parameters,
                observations: n,
            });
        }

        let ll_null = log_likelihood(&triple.outcomes, &triple.null, policy)?;
        let terms = log_likelihood_terms(&triple.outcomes, &triple.proposed, policy)?;
        let ll_proposed = terms.iter().sum::<f64>();
        let ll_saturated = log_likelihood(&triple.outcomes, &triple.saturated, policy)?;

        let null_deviance = deviance(ll_null, ll_saturated);
        let residual_deviance = deviance(ll_proposed, ll_saturated);
        #[expect(clippy::cast_precision_loss)]
        let (k, n_f) = (num_parameters as f64, n as f64);

        log::debug!(
            "deviance over {n} rows: null={null_deviance:.4}, residual={residual_deviance:.4}"
        );

        Ok(Self {
            observations: n,
            num_parameters,
            policy,
            ll_null,
            ll_proposed,
            ll_saturated,
            null_deviance,
            residual_deviance,
            null_df: n - 1,
            residual_df: n - num_parameters,
            lr_statistic: null_deviance - residual_deviance,
            aic: -2.0 * ll_proposed + 2.0 * k,
            bic: -2.0 * ll_proposed + k * n_f.ln(),
            terms,
        })
    }

    /// Row positions ordered from the worst-predicted observation.
    #[must_use]
    pub fn worst_rows(&self, limit: usize) -> Vec<usize> {
        let mut rows = (0..self.terms.len()).collect::<Vec<_>>();
        rows.sort_by(|&a, &b| self.terms[a].total_cmp(&self.terms[b]));
        rows.truncate(limit);
        rows
    }
}
