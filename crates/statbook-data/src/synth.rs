//! Synthetic data sets used by the tutorials
//!
//! Two tables are generated:
//!
//! - **Patients** ([`generate_patients`]): `sex`, `height`, `weight` and the
//!   derived `bmi`. Weight and height depend on sex, which is what makes `sex`
//!   a meaningful covariate for MAR missingness and `bmi` a meaningful outcome
//!   for MNAR missingness.
//! - **Heart** ([`generate_heart`]): `sex`, `age` and a binary `heart_disease`
//!   outcome drawn from a logistic model in age and sex, the input for the
//!   deviance walkthrough.
//!
//! Both generators take an explicit random number generator, so the same
//! seed always produces the same table.
//!
//! # Examples
//!
//! ```
//! use statbook_data::{
//!     seed::SimulationSeed,
//!     synth::{PatientConfig, generate_patients},
//! };
//!
//! let seed = SimulationSeed::from_u128(1);
//! let config = PatientConfig { rows: 100, ..PatientConfig::default() };
//! let patients = generate_patients(&config, &mut seed.rng()).unwrap();
//!
//! assert_eq!(patients.len(), 100);
//! let females = patients.categorical_column("sex").unwrap().iter().filter(|s| **s == "F").count();
//! assert_eq!(females, 50);
//! ```

use rand::{Rng, seq::SliceRandom};
use rand_distr::{Bernoulli, Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::record::{Record, RecordTable, TableError};

pub const FEMALE: &str = "F";
pub const MALE: &str = "M";

/// Mean and standard deviation of a normal distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalParams {
    pub mean: f64,
    pub std_dev: f64,
}

impl NormalParams {
    #[must_use]
    pub const fn new(mean: f64, std_dev: f64) -> Self {
        Self { mean, std_dev }
    }

    /// Requires a finite mean and a finite, non-negative standard deviation.
    fn distribution(self, name: &'static str) -> Result<Normal<f64>, SynthError> {
        let err = || SynthError::InvalidDistribution {
            name,
            mean: self.mean,
            std_dev: self.std_dev,
        };
        if !self.mean.is_finite() || !self.std_dev.is_finite() || self.std_dev < 0.0 {
            return Err(err());
        }
        Normal::new(self.mean, self.std_dev).map_err(|_| err())
    }
}

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum SynthError {
    #[display("number of rows must be positive")]
    NoRows,
    #[display("invalid {name} distribution: mean={mean}, std_dev={std_dev}")]
    InvalidDistribution {
        name: &'static str,
        mean: f64,
        std_dev: f64,
    },
    #[display("invalid age range {min_age}..={max_age}")]
    InvalidAgeRange { min_age: u32, max_age: u32 },
    #[display("invalid record table")]
    Table(#[error(source)] TableError),
}

/// Parameters of the synthetic patient table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientConfig {
    /// Number of rows; exactly `rows / 2` are female
    pub rows: usize,
    /// Female weight in kg
    pub female_weight: NormalParams,
    /// Male weight in kg
    pub male_weight: NormalParams,
    /// Female height in m
    pub female_height: NormalParams,
    /// Male height in m
    pub male_height: NormalParams,
}

impl Default for PatientConfig {
    fn default() -> Self {
        Self {
            rows: 10_000,
            female_weight: NormalParams::new(66.0, 10.0),
            male_weight: NormalParams::new(82.0, 12.0),
            female_height: NormalParams::new(1.63, 0.07),
            male_height: NormalParams::new(1.77, 0.075),
        }
    }
}

/// Shuffled sex labels with exactly `rows / 2` females.
fn balanced_sexes<R>(rows: usize, rng: &mut R) -> Vec<&'static str>
where
    R: Rng + ?Sized,
{
    let mut sexes = (0..rows)
        .map(|i| if i < rows / 2 { FEMALE } else { MALE })
        .collect::<Vec<_>>();
    sexes.shuffle(rng);
    sexes
}

/// Generates the patient table.
///
/// Heights are kept at or above 1 m so that `bmi` stays finite and plausible.
pub fn generate_patients<R>(config: &PatientConfig, rng: &mut R) -> Result<RecordTable, SynthError>
where
    R: Rng + ?Sized,
{
    if config.rows == 0 {
        return Err(SynthError::NoRows);
    }
    let female_weight = config.female_weight.distribution("female weight")?;
    let male_weight = config.male_weight.distribution("male weight")?;
    let female_height = config.female_height.distribution("female height")?;
    let male_height = config.male_height.distribution("male height")?;

    let rows = (1..)
        .zip(balanced_sexes(config.rows, rng))
        .map(|(idx, sex)| {
            let (weight, height) = if sex == FEMALE {
                (&female_weight, &female_height)
            } else {
                (&male_weight, &male_height)
            };
            let weight = weight.sample(rng).max(30.0);
            let height = height.sample(rng).max(1.0);
            let bmi = weight / (height * height);
            Record::new(idx)
                .with_category("sex", sex)
                .with_numeric("height", height)
                .with_numeric("weight", weight)
                .with_numeric("bmi", bmi)
        })
        .collect();

    let table = RecordTable::new(rows).map_err(SynthError::Table)?;
    log::debug!("generated {} patient rows", table.len());
    Ok(table)
}

/// Parameters of the synthetic heart-disease table.
///
/// The probability of heart disease is
/// `1 / (1 + exp(-(intercept + age_coefficient * age + male_coefficient * [sex == M])))`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartConfig {
    pub rows: usize,
    pub min_age: u32,
    pub max_age: u32,
    pub intercept: f64,
    pub age_coefficient: f64,
    pub male_coefficient: f64,
}

impl Default for HeartConfig {
    fn default() -> Self {
        Self {
            rows: 300,
            min_age: 29,
            max_age: 77,
            intercept: -6.0,
            age_coefficient: 0.1,
            male_coefficient: 0.8,
        }
    }
}

impl HeartConfig {
    /// Probability of heart disease under this model.
    #[must_use]
    pub fn probability(&self, age: f64, is_male: bool) -> f64 {
        let eta = self.intercept
            + self.age_coefficient * age
            + if is_male { self.male_coefficient } else { 0.0 };
        1.0 / (1.0 + (-eta).exp())
    }
}

/// Generates the heart-disease table.
pub fn generate_heart<R>(config: &HeartConfig, rng: &mut R) -> Result<RecordTable, SynthError>
where
    R: Rng + ?Sized,
{
    if config.rows == 0 {
        return Err(SynthError::NoRows);
    }
    if config.min_age > config.max_age {
        return Err(SynthError::InvalidAgeRange {
            min_age: config.min_age,
            max_age: config.max_age,
        });
    }

    let rows = (1..)
        .zip(balanced_sexes(config.rows, rng))
        .map(|(idx, sex)| {
            let age = f64::from(rng.random_range(config.min_age..=config.max_age));
            let p = config.probability(age, sex == MALE);
            // p is a logistic output and therefore always within [0, 1]
            let disease = Bernoulli::new(p).is_ok_and(|d| d.sample(rng));
            Record::new(idx)
                .with_category("sex", sex)
                .with_numeric("age", age)
                .with_numeric("heart_disease", if disease { 1.0 } else { 0.0 })
        })
        .collect();

    let table = RecordTable::new(rows).map_err(SynthError::Table)?;
    log::debug!("generated {} heart rows", table.len());
    Ok(table)
}

#[cfg(test)]
mod tests {
    use crate::seed::SimulationSeed;

    use super::*;

    #[test]
    fn test_patients_are_deterministic() {
        let config = PatientConfig {
            rows: 50,
            ..PatientConfig::default()
        };
        let seed = SimulationSeed::from_u128(42);
        let a = generate_patients(&config, &mut seed.rng()).unwrap();
        let b = generate_patients(&config, &mut seed.rng()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_patients_sex_split_and_bmi() {
        let config = PatientConfig {
            rows: 101,
            ..PatientConfig::default()
        };
        let table = generate_patients(&config, &mut SimulationSeed::from_u128(1).rng()).unwrap();
        let sexes = table.categorical_column("sex").unwrap();
        assert_eq!(sexes.iter().filter(|s| **s == FEMALE).count(), 50);
        assert_eq!(sexes.iter().filter(|s| **s == MALE).count(), 51);

        for row in &table {
            let weight = row.numeric("weight").unwrap();
            let height = row.numeric("height").unwrap();
            let bmi = row.numeric("bmi").unwrap();
            assert!((bmi - weight / (height * height)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_males_heavier_on_average() {
        let table = generate_patients(
            &PatientConfig::default(),
            &mut SimulationSeed::from_u128(3).rng(),
        )
        .unwrap();
        let mean_weight = |sex: &str| {
            let weights = table
                .iter()
                .filter(|r| r.category("sex") == Some(sex))
                .filter_map(|r| r.numeric("weight"))
                .collect::<Vec<_>>();
            #[expect(clippy::cast_precision_loss)]
            let n = weights.len() as f64;
            weights.iter().sum::<f64>() / n
        };
        assert!(mean_weight(MALE) > mean_weight(FEMALE) + 10.0);
    }

    #[test]
    fn test_patients_rejects_bad_config() {
        let mut rng = SimulationSeed::from_u128(0).rng();
        let zero = PatientConfig {
            rows: 0,
            ..PatientConfig::default()
        };
        assert_eq!(generate_patients(&zero, &mut rng), Err(SynthError::NoRows));

        let negative_sd = PatientConfig {
            female_weight: NormalParams::new(60.0, -1.0),
            ..PatientConfig::default()
        };
        assert!(matches!(
            generate_patients(&negative_sd, &mut rng),
            Err(SynthError::InvalidDistribution { .. })
        ));

        let infinite_mean = PatientConfig {
            male_height: NormalParams::new(f64::INFINITY, 7.0),
            ..PatientConfig::default()
        };
        assert!(matches!(
            generate_patients(&infinite_mean, &mut rng),
            Err(SynthError::InvalidDistribution { .. })
        ));
    }

    #[test]
    fn test_heart_outcome_is_binary() {
        let table =
            generate_heart(&HeartConfig::default(), &mut SimulationSeed::from_u128(5).rng())
                .unwrap();
        assert_eq!(table.len(), 300);
        for row in &table {
            let y = row.numeric("heart_disease").unwrap();
            assert!(y == 0.0 || y == 1.0);
            let age = row.numeric("age").unwrap();
            assert!((29.0..=77.0).contains(&age));
        }
        let cases = table
            .numeric_column("heart_disease")
            .unwrap()
            .into_iter()
            .sum::<f64>();
        assert!(cases > 0.0 && cases < 300.0);
    }

    #[test]
    fn test_heart_rejects_inverted_ages() {
        let config = HeartConfig {
            min_age: 80,
            max_age: 30,
            ..HeartConfig::default()
        };
        assert_eq!(
            generate_heart(&config, &mut SimulationSeed::from_u128(0).rng()),
            Err(SynthError::InvalidAgeRange {
                min_age: 80,
                max_age: 30
            })
        );
    }

    #[test]
    fn test_heart_probability_increases_with_age() {
        let config = HeartConfig::default();
        assert!(config.probability(70.0, false) > config.probability(40.0, false));
        assert!(config.probability(50.0, true) > config.probability(50.0, false));
    }
}
