use serde::Serialize;

/// Descriptive statistics summarizing a dataset.
///
/// This structure contains common measures of central tendency and
/// dispersion for a dataset of `f64` values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptiveStats {
    /// The number of values in the dataset.
    pub count: usize,
    /// The minimum value in the dataset.
    pub min: f64,
    /// The maximum value in the dataset.
    pub max: f64,
    /// The arithmetic mean (average) of the dataset.
    pub mean: f64,
    /// The median value of the dataset.
    ///
    /// For an even number of values this is the mean of the two middle values.
    pub median: f64,
    /// The population variance of the dataset.
    pub variance: f64,
    /// The population standard deviation of the dataset.
    pub std_dev: f64,
}

impl DescriptiveStats {
    /// Computes descriptive statistics from unsorted values.
    ///
    /// This method will sort the values internally before computing statistics.
    ///
    /// # Returns
    ///
    /// * `Some(DescriptiveStats)` - if the dataset contains at least one value
    /// * `None` - if the dataset is empty
    ///
    /// # Examples
    ///
    /// ```
    /// # use statbook_stats::descriptive::DescriptiveStats;
    /// let values = [5.0, 2.0, 4.0, 1.0, 3.0];
    /// let stats = DescriptiveStats::new(values).unwrap();
    /// assert_eq!(stats.count, 5);
    /// assert_eq!(stats.min, 1.0);
    /// assert_eq!(stats.max, 5.0);
    /// assert_eq!(stats.mean, 3.0);
    /// assert_eq!(stats.median, 3.0);
    /// ```
    #[must_use]
    pub fn new<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut values = values.into_iter().collect::<Vec<_>>();
        values.sort_by(f64::total_cmp);
        Self::from_sorted(&values)
    }

    /// Computes descriptive statistics from pre-sorted values.
    ///
    /// Use this when you already have sorted data to avoid unnecessary work.
    ///
    /// # Panics
    ///
    /// Panics if `sorted_values` is not sorted in ascending order.
    ///
    /// # Examples
    ///
    /// ```
    /// # use statbook_stats::descriptive::DescriptiveStats;
    /// let values = [1.0, 2.0, 3.0, 4.0];
    /// let stats = DescriptiveStats::from_sorted(&values).unwrap();
    /// assert_eq!(stats.median, 2.5);
    /// assert_eq!(stats.variance, 1.25);
    /// ```
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn from_sorted(sorted_values: &[f64]) -> Option<Self> {
        assert!(
            sorted_values.is_sorted_by(|a, b| a <= b),
            "values must be sorted in ascending order"
        );

        let min = *sorted_values.first()?;
        let max = *sorted_values.last()?;
        let count = sorted_values.len();
        let n = count as f64;
        let mean = sorted_values.iter().sum::<f64>() / n;
        let mid = count / 2;
        let median = if count % 2 == 0 {
            f64::midpoint(sorted_values[mid - 1], sorted_values[mid])
        } else {
            sorted_values[mid]
        };
        let variance = sorted_values
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / n;
        let std_dev = variance.sqrt();

        Some(Self {
            count,
            min,
            max,
            mean,
            median,
            variance,
            std_dev,
        })
    }
}
