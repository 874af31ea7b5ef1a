//! Missingness mechanism configuration
//!
//! A [`Mechanism`] decides how rows are partitioned into strata and with which
//! probability each stratum loses its outcome:
//!
//! | mechanism | strata                                   | depends on          |
//! |-----------|------------------------------------------|---------------------|
//! | MCAR      | one stratum holding every row            | nothing             |
//! | MAR       | one stratum per categorical covariate value | an observed covariate |
//! | MNAR      | one stratum per outcome bin              | the outcome itself  |
//!
//! Mechanisms are usually loaded from JSON:
//!
//! ```
//! use statbook_missing::mechanism::Mechanism;
//!
//! let mar: Mechanism = serde_json::from_str(
//!     r#"{"mechanism": "mar", "covariate": "sex", "probabilities": {"F": 0.45, "M": 0.25}}"#,
//! )
//! .unwrap();
//! assert!(mar.is_mar());
//!
//! let mnar: Mechanism = serde_json::from_str(
//!     r#"{
//!         "mechanism": "mnar",
//!         "outcome": "bmi",
//!         "bins": [
//!             {"label": "underweight", "upper": 18.5, "probability": 0.1},
//!             {"label": "normal", "lower": 18.5, "upper": 25.0, "probability": 0.1},
//!             {"label": "overweight", "lower": 25.0, "upper": 30.0, "probability": 0.3},
//!             {"label": "obese", "lower": 30.0, "probability": 0.6}
//!         ]
//!     }"#,
//! )
//! .unwrap();
//! assert!(mnar.is_mnar());
//! ```

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use statbook_data::{
    RecordTable,
    record::ColumnKind,
};
use statbook_stats::binning::{Interval, IntervalBins};

use crate::MissingnessError;

/// One outcome class of an MNAR mechanism.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeBin {
    pub label: String,
    /// Outcome values in `[lower, upper)` belong to this bin
    #[serde(flatten)]
    pub interval: Interval,
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_more::IsVariant)]
#[serde(tag = "mechanism", rename_all = "snake_case")]
pub enum Mechanism {
    /// Missing completely at random
    Mcar { probability: f64 },
    /// Missing at random, conditional on a categorical covariate
    Mar {
        covariate: String,
        probabilities: BTreeMap<String, f64>,
    },
    /// Missing not at random: the probability depends on the outcome's own class
    Mnar { outcome: String, bins: Vec<OutcomeBin> },
}

/// A set of rows sharing one missingness probability.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Stratum {
    pub label: String,
    pub probability: f64,
    /// Row positions in table order
    pub positions: Vec<usize>,
}

impl Mechanism {
    /// Short name used in reports.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Mechanism::Mcar { .. } => "MCAR",
            Mechanism::Mar { .. } => "MAR",
            Mechanism::Mnar { .. } => "MNAR",
        }
    }

    /// Partitions the table's rows into strata, validating the configuration
    /// against the table.
    ///
    /// Strata come out in a fixed order (MAR: ascending covariate value, MNAR:
    /// configured bin order) and positions within a stratum keep table order.
    pub(crate) fn stratify(&self, table: &RecordTable) -> Result<Vec<Stratum>, MissingnessError> {
        match self {
            Mechanism::Mcar { probability } => {
                check_probability("MCAR", *probability)?;
                Ok(vec![Stratum {
                    label: "all".to_owned(),
                    probability: *probability,
                    positions: (0..table.len()).collect(),
                }])
            }
            Mechanism::Mar {
                covariate,
                probabilities,
            } => stratify_by_covariate(table, covariate, probabilities),
            Mechanism::Mnar { outcome, bins } => stratify_by_outcome(table, outcome, bins),
        }
    }
}

fn check_probability(context: &str, probability: f64) -> Result<(), MissingnessError> {
    if (0.0..=1.0).contains(&probability) {
        Ok(())
    } else {
        Err(MissingnessError::invalid(
            context,
            format!("probability {probability} is outside [0, 1]"),
        ))
    }
}

fn check_column(
    table: &RecordTable,
    context: &str,
    column: &str,
    expected: ColumnKind,
) -> Result<(), MissingnessError> {
    match table.column_kind(column) {
        None => Err(MissingnessError::invalid(
            context,
            format!("column {column:?} not found"),
        )),
        Some(kind) if kind != expected => Err(MissingnessError::invalid(
            context,
            format!("column {column:?} is {kind:?}, expected {expected:?}"),
        )),
        Some(_) => Ok(()),
    }
}

fn stratify_by_covariate(
    table: &RecordTable,
    covariate: &str,
    probabilities: &BTreeMap<String, f64>,
) -> Result<Vec<Stratum>, MissingnessError> {
    check_column(table, "MAR", covariate, ColumnKind::Categorical)?;
    for (value, probability) in probabilities {
        check_probability(&format!("MAR {covariate}={value}"), *probability)?;
    }
    let mut positions = probabilities
        .keys()
        .map(|value| (value.as_str(), vec![]))
        .collect::<BTreeMap<_, Vec<usize>>>();
    for (i, row) in table.iter().enumerate() {
        let value = row.category(covariate).ok_or_else(|| {
            MissingnessError::invalid(
                "MAR",
                format!("row {} has no value for {covariate:?}", row.idx),
            )
        })?;
        positions
            .get_mut(value)
            .ok_or_else(|| {
                MissingnessError::invalid(
                    "MAR",
                    format!(
                        "row {} has {covariate}={value:?}, which has no configured probability",
                        row.idx
                    ),
                )
            })?
            .push(i);
    }

    let distinct = positions
        .iter()
        .filter(|(_, positions)| !positions.is_empty())
        .map(|(value, _)| probabilities[*value].to_bits())
        .collect::<HashSet<_>>();
    if distinct.len() < 2 {
        return Err(MissingnessError::invalid(
            "MAR",
            "probabilities must differ across at least two observed covariate values (use MCAR otherwise)",
        ));
    }

    Ok(positions
        .into_iter()
        .map(|(value, positions)| Stratum {
            label: value.to_owned(),
            probability: probabilities[value],
            positions,
        })
        .collect())
}

fn stratify_by_outcome(
    table: &RecordTable,
    outcome: &str,
    bins: &[OutcomeBin],
) -> Result<Vec<Stratum>, MissingnessError> {
    check_column(table, "MNAR", outcome, ColumnKind::Numeric)?;
    let mut labels = HashSet::new();
    for bin in bins {
        check_probability(&format!("MNAR bin {:?}", bin.label), bin.probability)?;
        if !labels.insert(bin.label.as_str()) {
            return Err(MissingnessError::invalid(
                "MNAR",
                format!("duplicate bin label {:?}", bin.label),
            ));
        }
    }
    let intervals = IntervalBins::new(bins.iter().map(|bin| bin.interval).collect())
        .map_err(|e| MissingnessError::invalid("MNAR bins", e.to_string()))?;
    if !intervals.covers_real_line() {
        log::debug!("MNAR bins for {outcome:?} leave gaps; rows falling in them are rejected");
    }

    let mut positions = vec![vec![]; bins.len()];
    for (i, row) in table.iter().enumerate() {
        let value = row.numeric(outcome).ok_or_else(|| {
            MissingnessError::invalid(
                "MNAR",
                format!("row {} has no value for {outcome:?}", row.idx),
            )
        })?;
        let bin = intervals.classify(value).ok_or_else(|| {
            MissingnessError::invalid(
                "MNAR bins",
                format!(
                    "{outcome}={value} at row {} is not covered by any bin",
                    row.idx
                ),
            )
        })?;
        positions[bin].push(i);
    }

    Ok(bins
        .iter()
        .zip(positions)
        .map(|(bin, positions)| Stratum {
            label: bin.label.clone(),
            probability: bin.probability,
            positions,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use statbook_data::{Record, io};

    use super::*;

    fn table() -> RecordTable {
        RecordTable::new(vec![
            Record::new(10).with_category("sex", "M").with_numeric("bmi", 31.0),
            Record::new(11).with_category("sex", "F").with_numeric("bmi", 17.0),
            Record::new(12).with_category("sex", "F").with_numeric("bmi", 22.0),
            Record::new(13).with_category("sex", "M").with_numeric("bmi", 26.0),
        ])
        .unwrap()
    }

    fn bmi_bins() -> Vec<OutcomeBin> {
        let bin = |label: &str, interval, probability| OutcomeBin {
            label: label.to_owned(),
            interval,
            probability,
        };
        vec![
            bin("under", Interval::below(18.5), 0.1),
            bin("normal", Interval::between(18.5, 25.0), 0.1),
            bin("over", Interval::between(25.0, 30.0), 0.3),
            bin("obese", Interval::at_least(30.0), 0.6),
        ]
    }

    #[test]
    fn test_mar_strata_sorted_by_value() {
        let mechanism = Mechanism::Mar {
            covariate: "sex".to_owned(),
            probabilities: BTreeMap::from([("M".to_owned(), 0.2), ("F".to_owned(), 0.5)]),
        };
        let strata = mechanism.stratify(&table()).unwrap();
        assert_eq!(strata.len(), 2);
        assert_eq!(strata[0].label, "F");
        assert_eq!(strata[0].positions, [1, 2]);
        assert_eq!(strata[1].label, "M");
        assert_eq!(strata[1].positions, [0, 3]);
    }

    #[test]
    fn test_mar_keeps_unused_values() {
        let mechanism = Mechanism::Mar {
            covariate: "sex".to_owned(),
            probabilities: BTreeMap::from([
                ("F".to_owned(), 0.5),
                ("M".to_owned(), 0.2),
                ("X".to_owned(), 0.9),
            ]),
        };
        let strata = mechanism.stratify(&table()).unwrap();
        assert_eq!(strata[2].label, "X");
        assert!(strata[2].positions.is_empty());
    }

    #[test]
    fn test_mar_requires_distinct_probabilities() {
        let mechanism = Mechanism::Mar {
            covariate: "sex".to_owned(),
            probabilities: BTreeMap::from([("F".to_owned(), 0.3), ("M".to_owned(), 0.3)]),
        };
        assert!(mechanism.stratify(&table()).unwrap_err().is_invalid_parameter());

        // only F and M occur in the table
        let mechanism = Mechanism::Mar {
            covariate: "sex".to_owned(),
            probabilities: BTreeMap::from([
                ("F".to_owned(), 0.3),
                ("M".to_owned(), 0.3),
                ("X".to_owned(), 0.9),
            ]),
        };
        let err = mechanism.stratify(&table()).unwrap_err();
        assert!(err.to_string().contains("observed covariate values"), "{err}");
    }

    #[test]
    fn test_mar_on_numerically_coded_covariate() {
        let csv = "idx,sex,age\n1,0,40\n2,1,50\n3,0,45\n4,1,61\n";
        let mechanism = Mechanism::Mar {
            covariate: "sex".to_owned(),
            probabilities: BTreeMap::from([("0".to_owned(), 0.5), ("1".to_owned(), 0.0)]),
        };

        let inferred = io::read_delimited(csv.as_bytes(), b',').unwrap();
        let err = mechanism.stratify(&inferred).unwrap_err();
        assert!(err.to_string().contains("is Numeric"), "{err}");

        let table = io::read_delimited_with(csv.as_bytes(), b',', &["sex"]).unwrap();
        let strata = mechanism.stratify(&table).unwrap();
        assert_eq!(strata.len(), 2);
        assert_eq!(strata[0].label, "0");
        assert_eq!(strata[0].positions, [0, 2]);
        assert_eq!(strata[1].label, "1");
        assert_eq!(strata[1].positions, [1, 3]);
    }

    #[test]
    fn test_mar_rejects_unconfigured_value() {
        let mechanism = Mechanism::Mar {
            covariate: "sex".to_owned(),
            probabilities: BTreeMap::from([("F".to_owned(), 0.3), ("X".to_owned(), 0.1)]),
        };
        let err = mechanism.stratify(&table()).unwrap_err();
        assert!(err.to_string().contains("row 10"), "{err}");
    }

    #[test]
    fn test_mar_rejects_missing_or_numeric_covariate() {
        let missing = Mechanism::Mar {
            covariate: "smoker".to_owned(),
            probabilities: BTreeMap::from([("y".to_owned(), 0.3), ("n".to_owned(), 0.1)]),
        };
        assert!(missing.stratify(&table()).is_err());

        let numeric = Mechanism::Mar {
            covariate: "bmi".to_owned(),
            probabilities: BTreeMap::from([("y".to_owned(), 0.3), ("n".to_owned(), 0.1)]),
        };
        assert!(numeric.stratify(&table()).is_err());
    }

    #[test]
    fn test_mnar_strata_follow_bins() {
        let mechanism = Mechanism::Mnar {
            outcome: "bmi".to_owned(),
            bins: bmi_bins(),
        };
        let strata = mechanism.stratify(&table()).unwrap();
        let positions = strata.iter().map(|s| s.positions.clone()).collect::<Vec<_>>();
        assert_eq!(positions, [vec![1], vec![2], vec![3], vec![0]]);
    }

    #[test]
    fn test_mnar_rejects_uncovered_value() {
        let mut bins = bmi_bins();
        bins.pop();
        let mechanism = Mechanism::Mnar {
            outcome: "bmi".to_owned(),
            bins,
        };
        let err = mechanism.stratify(&table()).unwrap_err();
        assert!(err.to_string().contains("not covered"), "{err}");
    }

    #[test]
    fn test_mnar_rejects_overlapping_bins() {
        let mut bins = bmi_bins();
        bins[0].interval = Interval::below(20.0);
        let mechanism = Mechanism::Mnar {
            outcome: "bmi".to_owned(),
            bins,
        };
        assert!(mechanism.stratify(&table()).is_err());
    }

    #[test]
    fn test_rejects_probability_out_of_range() {
        for probability in [-0.1, 1.5, f64::NAN] {
            let mechanism = Mechanism::Mcar { probability };
            assert!(mechanism.stratify(&table()).is_err());
        }
    }

    #[test]
    fn test_serde_tag() {
        let json = serde_json::to_string(&Mechanism::Mcar { probability: 0.3 }).unwrap();
        assert_eq!(json, r#"{"mechanism":"mcar","probability":0.3}"#);
    }
}
