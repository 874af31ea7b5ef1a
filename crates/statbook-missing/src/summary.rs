//! Comparing observed and missing rows
//!
//! The mechanisms differ in what they do to the outcome's distribution:
//!
//! - **MCAR**: observed and missing rows look alike, overall and within groups
//! - **MAR**: the marginal distribution shifts (the covariate is over-represented
//!   among missing rows) but within each covariate group the two sides agree
//! - **MNAR**: the shift persists even within groups, because missingness
//!   depends on the outcome itself
//!
//! [`MissingnessSummary`] computes the descriptive statistics needed to see
//! this: the outcome among observed and among missing rows, overall and per
//! value of an optional grouping column.

use std::collections::BTreeMap;

use serde::Serialize;
use statbook_data::{RecordTable, record::ColumnKind};
use statbook_stats::descriptive::DescriptiveStats;

use crate::{MissingnessError, simulate::MissingIndicator};

/// Label of the group holding every row.
pub const ALL_ROWS: &str = "(all)";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub label: String,
    /// Outcome statistics among observed rows, `None` if every row is missing
    pub observed: Option<DescriptiveStats>,
    /// Outcome statistics among missing rows, `None` if no row is missing
    pub missing: Option<DescriptiveStats>,
}

impl GroupSummary {
    fn new(label: String, observed: Vec<f64>, missing: Vec<f64>) -> Self {
        Self {
            label,
            observed: DescriptiveStats::new(observed),
            missing: DescriptiveStats::new(missing),
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.observed_count() + self.missing_count()
    }

    #[must_use]
    pub fn observed_count(&self) -> usize {
        self.observed.as_ref().map_or(0, |s| s.count)
    }

    #[must_use]
    pub fn missing_count(&self) -> usize {
        self.missing.as_ref().map_or(0, |s| s.count)
    }

    /// Fraction of rows in this group that are missing.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn missing_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.missing_count() as f64 / total as f64,
        }
    }

    /// Mean outcome of missing rows minus mean outcome of observed rows.
    #[must_use]
    pub fn mean_shift(&self) -> Option<f64> {
        Some(self.missing.as_ref()?.mean - self.observed.as_ref()?.mean)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingnessSummary {
    pub outcome: String,
    pub group_by: Option<String>,
    /// The all-rows group first, then one group per value of `group_by`
    pub groups: Vec<GroupSummary>,
}

impl MissingnessSummary {
    pub fn new(
        table: &RecordTable,
        indicator: &MissingIndicator,
        outcome: &str,
        group_by: Option<&str>,
    ) -> Result<Self, MissingnessError> {
        if !indicator.is_aligned_with(table) {
            return Err(MissingnessError::invalid(
                "summary",
                "indicator was not produced for this table",
            ));
        }
        if table.column_kind(outcome) != Some(ColumnKind::Numeric) {
            return Err(MissingnessError::invalid(
                "summary",
                format!("outcome {outcome:?} is not a numeric column"),
            ));
        }
        if let Some(column) = group_by
            && table.column_kind(column) != Some(ColumnKind::Categorical)
        {
            return Err(MissingnessError::invalid(
                "summary",
                format!("grouping column {column:?} is not a categorical column"),
            ));
        }

        let mut all = (vec![], vec![]);
        let mut grouped = BTreeMap::<&str, (Vec<f64>, Vec<f64>)>::new();
        for (row, &is_missing) in table.iter().zip(indicator.flags()) {
            let value = row.numeric(outcome).ok_or_else(|| {
                MissingnessError::invalid(
                    "summary",
                    format!("row {} has no value for {outcome:?}", row.idx),
                )
            })?;
            let push = |(observed, missing): &mut (Vec<f64>, Vec<f64>)| {
                if is_missing {
                    missing.push(value);
                } else {
                    observed.push(value);
                }
            };
            push(&mut all);
            if let Some(column) = group_by {
                let label = row.category(column).ok_or_else(|| {
                    MissingnessError::invalid(
                        "summary",
                        format!("row {} has no value for {column:?}", row.idx),
                    )
                })?;
                push(grouped.entry(label).or_default());
            }
        }

        let groups = std::iter::once(GroupSummary::new(ALL_ROWS.to_owned(), all.0, all.1))
            .chain(grouped.into_iter().map(|(label, (observed, missing))| {
                GroupSummary::new(label.to_owned(), observed, missing)
            }))
            .collect();

        Ok(Self {
            outcome: outcome.to_owned(),
            group_by: group_by.map(str::to_owned),
            groups,
        })
    }

    /// The all-rows group.
    #[must_use]
    pub fn overall(&self) -> &GroupSummary {
        &self.groups[0]
    }

    #[must_use]
    pub fn group(&self, label: &str) -> Option<&GroupSummary> {
        self.groups.iter().skip(1).find(|g| g.label == label)
    }
}
