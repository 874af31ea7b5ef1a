//! Likelihood, deviance and validation of generalized linear models.
//!
//! # Modules
//!
//! - [`likelihood`]: Bernoulli log-likelihood with an explicit policy for
//!   degenerate predictions
//! - [`deviance`]: [`ModelTriple`] and the null/residual deviance
//!   [`DevianceReport`]
//! - [`fit`]: the [`ModelFitter`] trait and its IRLS implementation
//! - [`validation`]: validation-set, repeated-split and leave-one-out
//!   cross-validation
//!
//! # Examples
//!
//! Fitting a logistic model and comparing it with the intercept-only model:
//!
//! ```
//! use statbook_data::{
//!     SimulationSeed,
//!     synth::{HeartConfig, generate_heart},
//! };
//! use statbook_glm::{
//!     DevianceReport, ModelTriple, ProbabilityPolicy,
//!     fit::{Design, Family, IrlsFitter, ModelFitter},
//! };
//!
//! let heart = generate_heart(&HeartConfig::default(), &mut SimulationSeed::from_u128(2).rng()).unwrap();
//! let rows = heart.iter().collect::<Vec<_>>();
//! let design = Design::new("heart_disease", ["age", "sex"], Family::Binomial);
//! let model = IrlsFitter::default().fit(&rows, &design).unwrap();
//!
//! let triple = ModelTriple::from_predictions(
//!     heart.numeric_column("heart_disease").unwrap(),
//!     model.predict_all(&heart).unwrap(),
//! )
//! .unwrap();
//! let report = DevianceReport::compute(&triple, model.num_parameters(), ProbabilityPolicy::Strict).unwrap();
//! assert!(report.residual_deviance <= report.null_deviance);
//! ```

pub mod deviance;
pub mod fit;
pub mod likelihood;
pub mod validation;

pub use self::{
    deviance::{DevianceReport, ModelTriple},
    fit::{Design, Family, FittedModel, IrlsFitter, ModelFitter},
    likelihood::{LikelihoodError, ProbabilityPolicy, log_likelihood},
    validation::{CrossValidation, ValidationStrategy, cross_validate},
};
