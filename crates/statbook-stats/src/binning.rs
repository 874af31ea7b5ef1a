//! Fixed-interval binning for continuous values
//!
//! This module classifies continuous values into caller-supplied, half-open
//! intervals `[lower, upper)`. A missing bound means the interval is unbounded
//! on that side, so a set of intervals such as
//!
//! ```text
//! (-inf, 18.5)  [18.5, 25)  [25, 30)  [30, +inf)
//! ```
//!
//! covers the whole real line.
//!
//! Intervals must be non-empty and must not overlap. Gaps are allowed at
//! construction time; a value falling into a gap is simply unclassified
//! ([`IntervalBins::classify`] returns `None`), and callers decide whether that
//! is an error.
//!
//! # Examples
//!
//! ```
//! use statbook_stats::binning::{Interval, IntervalBins};
//!
//! let bins = IntervalBins::new(vec![
//!     Interval::below(18.5),
//!     Interval::between(18.5, 25.0),
//!     Interval::between(25.0, 30.0),
//!     Interval::at_least(30.0),
//! ])
//! .unwrap();
//!
//! assert_eq!(bins.classify(17.0), Some(0));
//! assert_eq!(bins.classify(18.5), Some(1));
//! assert_eq!(bins.classify(29.99), Some(2));
//! assert_eq!(bins.classify(45.0), Some(3));
//! assert_eq!(bins.classify(f64::NAN), None);
//! ```

use std::{cmp::Ordering, fmt};

use serde::{Deserialize, Serialize};

/// A half-open interval `[lower, upper)` with optional bounds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Interval {
    /// Inclusive lower bound, or `None` for negative infinity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower: Option<f64>,
    /// Exclusive upper bound, or `None` for positive infinity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper: Option<f64>,
}

impl Interval {
    #[must_use]
    pub const fn new(lower: Option<f64>, upper: Option<f64>) -> Self {
        Self { lower, upper }
    }

    /// `(-inf, upper)`
    #[must_use]
    pub const fn below(upper: f64) -> Self {
        Self::new(None, Some(upper))
    }

    /// `[lower, upper)`
    #[must_use]
    pub const fn between(lower: f64, upper: f64) -> Self {
        Self::new(Some(lower), Some(upper))
    }

    /// `[lower, +inf)`
    #[must_use]
    pub const fn at_least(lower: f64) -> Self {
        Self::new(Some(lower), None)
    }

    /// Returns `true` if `value` lies inside this interval.
    ///
    /// `NaN` is never contained.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        if value.is_nan() {
            return false;
        }
        self.lower.is_none_or(|lower| value >= lower) && self.upper.is_none_or(|upper| value < upper)
    }

    fn lower_or_neg_inf(&self) -> f64 {
        self.lower.unwrap_or(f64::NEG_INFINITY)
    }

    fn upper_or_inf(&self) -> f64 {
        self.upper.unwrap_or(f64::INFINITY)
    }

    fn is_empty(&self) -> bool {
        let (lower, upper) = (self.lower_or_neg_inf(), self.upper_or_inf());
        lower.is_nan() || upper.is_nan() || lower >= upper
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.lower, self.upper) {
            (None, None) => write!(f, "(-inf, +inf)"),
            (None, Some(upper)) => write!(f, "(-inf, {upper})"),
            (Some(lower), None) => write!(f, "[{lower}, +inf)"),
            (Some(lower), Some(upper)) => write!(f, "[{lower}, {upper})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum BinningError {
    #[display("no intervals given")]
    NoIntervals,
    #[display("interval #{index} {interval} is empty")]
    EmptyInterval { index: usize, interval: Interval },
    #[display("interval #{first} {first_interval} overlaps interval #{second} {second_interval}")]
    Overlap {
        first: usize,
        first_interval: Interval,
        second: usize,
        second_interval: Interval,
    },
}

/// A validated set of non-overlapping intervals.
///
/// Bin indices refer to the order in which intervals were supplied.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalBins {
    intervals: Vec<Interval>,
    // indices into `intervals`, sorted by lower bound
    order: Vec<usize>,
}

impl IntervalBins {
    /// Validates and builds a set of bins.
    pub fn new(intervals: Vec<Interval>) -> Result<Self, BinningError> {
        if intervals.is_empty() {
            return Err(BinningError::NoIntervals);
        }
        if let Some((index, interval)) = intervals.iter().enumerate().find(|(_, i)| i.is_empty()) {
            return Err(BinningError::EmptyInterval {
                index,
                interval: *interval,
            });
        }

        let mut order = (0..intervals.len()).collect::<Vec<_>>();
        order.sort_by(|&a, &b| {
            intervals[a]
                .lower_or_neg_inf()
                .partial_cmp(&intervals[b].lower_or_neg_inf())
                .unwrap_or(Ordering::Equal)
        });
        for pair in order.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if intervals[b].lower_or_neg_inf() < intervals[a].upper_or_inf() {
                return Err(BinningError::Overlap {
                    first: a,
                    first_interval: intervals[a],
                    second: b,
                    second_interval: intervals[b],
                });
            }
        }

        Ok(Self { intervals, order })
    }

    #[must_use]
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Returns `true` if the bins leave no gap anywhere on the real line.
    #[must_use]
    pub fn covers_real_line(&self) -> bool {
        let first = &self.intervals[self.order[0]];
        let last = &self.intervals[self.order[self.order.len() - 1]];
        first.lower.is_none()
            && last.upper.is_none()
            && self.order.windows(2).all(|pair| {
                self.intervals[pair[0]].upper == self.intervals[pair[1]].lower
            })
    }

    /// Returns the index of the bin containing `value`, if any.
    #[must_use]
    pub fn classify(&self, value: f64) -> Option<usize> {
        self.intervals.iter().position(|interval| interval.contains(value))
    }
}
