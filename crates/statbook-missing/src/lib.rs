//! Missing-data simulation.
//!
//! This crate marks rows of a [`RecordTable`](statbook_data::RecordTable) as
//! missing according to one of three classic mechanisms, so that their effect
//! on downstream analyses can be studied:
//!
//! - **MCAR** (missing completely at random): every row has the same probability
//! - **MAR** (missing at random): the probability depends on an observed
//!   categorical covariate
//! - **MNAR** (missing not at random): the probability depends on the value of
//!   the outcome itself, grouped into bins
//!
//! # Modules
//!
//! - [`mechanism`]: [`Mechanism`] configuration and its validation
//! - [`simulate`]: drawing a [`MissingIndicator`] with exact per-stratum counts
//! - [`summary`]: comparing the outcome between observed and missing rows
//!
//! # Examples
//!
//! ```
//! use statbook_data::{
//!     SimulationSeed,
//!     synth::{PatientConfig, generate_patients},
//! };
//! use statbook_missing::{Mechanism, MissingnessSummary, simulate_with_seed};
//!
//! let seed = SimulationSeed::from_u128(7);
//! let config = PatientConfig { rows: 1_000, ..PatientConfig::default() };
//! let patients = generate_patients(&config, &mut seed.rng()).unwrap();
//!
//! let indicator = simulate_with_seed(&patients, &Mechanism::Mcar { probability: 0.3 }, seed).unwrap();
//! assert_eq!(indicator.missing_count(), 300);
//!
//! let summary = MissingnessSummary::new(&patients, &indicator, "weight", Some("sex")).unwrap();
//! assert_eq!(summary.groups.len(), 3);
//! ```

pub mod mechanism;
pub mod simulate;
pub mod summary;

pub use self::{
    mechanism::{Mechanism, OutcomeBin},
    simulate::{MissingIndicator, StratumDraw, simulate, simulate_with_seed},
    summary::{GroupSummary, MissingnessSummary},
};

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error, derive_more::IsVariant)]
pub enum MissingnessError {
    #[display("invalid parameter for {context}: {reason}")]
    InvalidParameter { context: String, reason: String },
}

impl MissingnessError {
    pub(crate) fn invalid(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            context: context.into(),
            reason: reason.into(),
        }
    }
}
