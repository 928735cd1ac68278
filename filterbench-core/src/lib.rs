//! # filterbench-core
//!
//! Core vocabulary for the filterbench harness.
//!
//! This crate holds the pieces every other part of the harness builds on:
//!
//! - **Errors**: [`BenchError`] and the [`BenchResult`] alias
//! - **Provider traits**: [`TimeProvider`] for clocks and bounded waits,
//!   [`RandomProvider`] for seedable randomness
//! - **Protocol**: the [`Command`] tagged union exchanged with an engine worker,
//!   plus [`SeqGuard`] for ordering checks
//! - **Datasets**: [`DatasetGenerator`] producing row or columnar [`Dataset`]s
//!
//! ## Reproducible datasets
//!
//! ```rust
//! use filterbench_core::{DatasetGenerator, DatasetSpec, Layout, SeededRandomProvider};
//!
//! let spec = DatasetSpec::new(1_000, 4).layout(Layout::Columnar);
//! let a = DatasetGenerator::new(SeededRandomProvider::new(7)).generate(&spec).unwrap();
//! let b = DatasetGenerator::new(SeededRandomProvider::new(7)).generate(&spec).unwrap();
//! assert_eq!(a, b);
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

mod dataset;
mod error;
mod protocol;
mod random;
mod time;

// Error exports
pub use error::{BenchError, BenchResult};

// Provider trait exports
pub use random::{RandomProvider, SeededRandomProvider, ThreadRandomProvider};
pub use time::{TimeError, TimeProvider, TokioTimeProvider};

// Protocol exports
pub use protocol::{ClearStrategy, Command, SeqGuard};

// Dataset exports
pub use dataset::{Column, Dataset, DatasetGenerator, DatasetSpec, Layout, Row, dimension_name};
