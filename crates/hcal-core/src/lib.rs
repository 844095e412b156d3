//! # hcal-core
//!
//! Shared types for the HCAL analysis toolkit: the [`Subdetector`] enum with its fixed
//! time-slice counts, sparse N-dimensional [`Hist`]ograms, and the mergeable
//! [`Output`] / [`OutputSet`] accumulators that processors produce.

#![warn(clippy::all)]

pub mod accumulator;
pub mod error;
pub mod hist;
pub mod subdet;

pub use accumulator::{Item, Output, OutputSet};
pub use error::{Error, Result};
pub use hist::{Axis, Bin, BinKey, FillValue, Hist, logspace};
pub use subdet::Subdetector;

/// Crate version, recorded in output files.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
