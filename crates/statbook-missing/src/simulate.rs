//! Drawing missingness indicators
//!
//! [`simulate`] marks rows as missing by drawing, independently within each
//! stratum of the [`Mechanism`], a simple random sample without replacement of
//! size `round(probability × stratum size)`.
//!
//! Because the sample size is fixed rather than drawn row by row, the number
//! of missing rows per stratum is exact:
//!
//! ```
//! use std::collections::BTreeMap;
//!
//! use statbook_data::{Record, RecordTable, SimulationSeed};
//! use statbook_missing::{mechanism::Mechanism, simulate::simulate_with_seed};
//!
//! let table = RecordTable::new(
//!     (1..=10_000).map(|idx| Record::new(idx).with_category("sex", if idx % 2 == 0 { "F" } else { "M" })).collect(),
//! )
//! .unwrap();
//! let mechanism = Mechanism::Mar {
//!     covariate: "sex".to_owned(),
//!     probabilities: BTreeMap::from([("F".to_owned(), 0.45), ("M".to_owned(), 0.25)]),
//! };
//!
//! let indicator = simulate_with_seed(&table, &mechanism, SimulationSeed::from_u128(1)).unwrap();
//! assert_eq!(indicator.missing_count(), 2_250 + 1_250);
//! ```

use rand::{Rng, seq::index};
use serde::Serialize;
use statbook_data::{RecordTable, SimulationSeed, record::TableError};

use crate::{MissingnessError, mechanism::Mechanism};

/// Outcome of sampling one stratum.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StratumDraw {
    pub label: String,
    /// Number of rows in the stratum
    pub size: usize,
    pub probability: f64,
    /// Number of rows marked missing, `round(probability × size)`
    pub missing: usize,
}

/// Per-row missingness flags, aligned with the table the simulation ran on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingIndicator {
    mechanism: &'static str,
    ids: Vec<u64>,
    flags: Vec<bool>,
    strata: Vec<StratumDraw>,
}

impl MissingIndicator {
    /// Name of the mechanism that produced this indicator.
    #[must_use]
    pub fn mechanism(&self) -> &'static str {
        self.mechanism
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Row identifiers in table order.
    #[must_use]
    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    /// Missingness flags in table order.
    #[must_use]
    pub fn flags(&self) -> &[bool] {
        &self.flags
    }

    #[must_use]
    pub fn strata(&self) -> &[StratumDraw] {
        &self.strata
    }

    /// Looks up the flag for a row identifier.
    #[must_use]
    pub fn is_missing(&self, idx: u64) -> Option<bool> {
        self.ids
            .iter()
            .position(|&id| id == idx)
            .map(|pos| self.flags[pos])
    }

    #[must_use]
    pub fn missing_count(&self) -> usize {
        self.flags.iter().filter(|&&flag| flag).count()
    }

    /// Identifiers of the rows marked missing, in table order.
    pub fn missing_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.iter().filter(|(_, flag)| *flag).map(|(idx, _)| idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, bool)> + '_ {
        self.ids.iter().copied().zip(self.flags.iter().copied())
    }

    /// Returns `true` if this indicator was produced for `table`'s rows.
    #[must_use]
    pub fn is_aligned_with(&self, table: &RecordTable) -> bool {
        self.ids.len() == table.len() && self.ids.iter().zip(table).all(|(&id, row)| id == row.idx)
    }

    /// Builds a copy of `table` with the flags appended as a column.
    pub fn attach(&self, table: &RecordTable, column: &str) -> Result<RecordTable, TableError> {
        if !self.is_aligned_with(table) {
            return Err(TableError::LengthMismatch {
                expected: table.len(),
                actual: self.len(),
            });
        }
        table.with_flag_column(column, &self.flags)
    }
}

#[expect(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn sample_size(label: &str, probability: f64, size: usize) -> Result<usize, MissingnessError> {
    let target = (probability * size as f64).round() as usize;
    if target > size {
        return Err(MissingnessError::invalid(
            format!("stratum {label:?}"),
            format!("requested sample of {target} exceeds stratum size {size}"),
        ));
    }
    Ok(target)
}

/// Draws a missingness indicator for `table` under `mechanism`.
///
/// Strata are visited in a fixed order and rows within a stratum keep table
/// order, so the result depends only on the table, the mechanism and the
/// state of `rng`.
pub fn simulate<R>(
    table: &RecordTable,
    mechanism: &Mechanism,
    rng: &mut R,
) -> Result<MissingIndicator, MissingnessError>
where
    R: Rng + ?Sized,
{
    let strata = mechanism.stratify(table)?;

    let mut flags = vec![false; table.len()];
    let mut draws = Vec::with_capacity(strata.len());
    for stratum in strata {
        let size = stratum.positions.len();
        let target = sample_size(&stratum.label, stratum.probability, size)?;
        for i in index::sample(rng, size, target).iter() {
            flags[stratum.positions[i]] = true;
        }
        log::debug!(
            "{} stratum {:?}: {target}/{size} rows missing (p={})",
            mechanism.name(),
            stratum.label,
            stratum.probability
        );
        draws.push(StratumDraw {
            label: stratum.label,
            size,
            probability: stratum.probability,
            missing: target,
        });
    }

    Ok(MissingIndicator {
        mechanism: mechanism.name(),
        ids: table.iter().map(|row| row.idx).collect(),
        flags,
        strata: draws,
    })
}

/// Like [`simulate`], but with a fresh generator from `seed`.
pub fn simulate_with_seed(
    table: &RecordTable,
    mechanism: &Mechanism,
    seed: SimulationSeed,
) -> Result<MissingIndicator, MissingnessError> {
    simulate(table, mechanism, &mut seed.rng())
}
