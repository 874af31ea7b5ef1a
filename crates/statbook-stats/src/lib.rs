//! Statistical utilities shared by the statbook crates.
//!
//! This crate provides small, domain-agnostic building blocks:
//!
//! - **Descriptive statistics**: count, mean, median, variance, standard deviation
//! - **Interval binning**: classify continuous values into half-open intervals
//!
//! # Modules
//!
//! - [`descriptive`]: Descriptive statistics for summarizing datasets
//! - [`binning`]: Fixed-interval binning with overlap and coverage checks
//!
//! # Examples
//!
//! ## Computing descriptive statistics
//!
//! ```
//! use statbook_stats::descriptive::DescriptiveStats;
//!
//! let values = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let stats = DescriptiveStats::new(values).unwrap();
//! assert_eq!(stats.mean, 3.0);
//! ```
//!
//! ## Classifying values into bins
//!
//! ```
//! use statbook_stats::binning::{Interval, IntervalBins};
//!
//! let bins = IntervalBins::new(vec![Interval::below(0.0), Interval::at_least(0.0)]).unwrap();
//! assert_eq!(bins.classify(-1.0), Some(0));
//! assert_eq!(bins.classify(0.0), Some(1));
//! ```

pub mod binning;
pub mod descriptive;
