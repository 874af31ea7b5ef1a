//! Tabular data for the statbook computations
//!
//! This crate holds the in-memory data model shared by the simulation and
//! modelling crates, plus the ways of getting data into it.
//!
//! # Overview
//!
//! - [`record`]: [`RecordTable`](record::RecordTable), an ordered set of rows
//!   with unique identifiers, categorical and numeric attributes
//! - [`seed`]: [`SimulationSeed`](seed::SimulationSeed), the explicit source of
//!   randomness for every simulation
//! - [`io`]: delimited (CSV/TSV) and JSON readers and writers
//! - [`synth`]: the synthetic patient and heart-disease tables
//!
//! # Typical Workflow
//!
//! ```text
//! Delimited file / JSON / synthetic generator
//!     ↓
//! RecordTable (immutable)
//!     ↓
//! Missingness simulation / model fitting
//!     ↓
//! Derived column appended as a new table
//! ```
//!
//! # Examples
//!
//! ```
//! use statbook_data::{
//!     io,
//!     seed::SimulationSeed,
//!     synth::{HeartConfig, generate_heart},
//! };
//!
//! let seed: SimulationSeed = "5eed".parse().unwrap();
//! let heart = generate_heart(&HeartConfig::default(), &mut seed.rng()).unwrap();
//!
//! let mut csv = Vec::new();
//! io::write_delimited(&heart, &mut csv, b',').unwrap();
//! let reloaded = io::read_delimited(csv.as_slice(), b',').unwrap();
//! assert_eq!(reloaded.len(), heart.len());
//! ```

pub mod io;
pub mod record;
pub mod seed;
pub mod synth;

pub use self::{
    record::{Record, RecordTable},
    seed::SimulationSeed,
};
