//! # hcal-analysis
//!
//! Processing of HCAL nanoAOD digis: event sources for ROOT and Parquet inputs, the
//! columnar [`EventBatch`], charge and timing reconstruction, the built-in processors and
//! a chunked parallel [`runner`].
//!
//! ```no_run
//! use hcal_analysis::{AnalysisConfig, RunOptions, create_processor, fileset, runner};
//!
//! let cfg = AnalysisConfig::default();
//! let processor = create_processor("bx1", &cfg).unwrap();
//! let files = fileset::from_list("nano_1.root,nano_2.root", Some("r352567"));
//! let (output, stats) = runner::run(&files, processor.as_ref(), &RunOptions::default()).unwrap();
//! let nevents = output.get("r352567").and_then(|o| o.count("nevents"));
//! println!("{} events read, {nevents:?} processed", stats.events);
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod events;
pub mod fileset;
pub mod processor;
pub mod processors;
pub mod reco;
pub mod runner;
pub mod select;
pub mod source;

pub use config::{
    AnalysisConfig, CollectionNaming, SelectionConfig, SplashList, read_analysis_config,
};
pub use error::{Error, Result};
pub use events::{Digi, DigiCollection, EventBatch};
pub use fileset::Fileset;
pub use processor::{PROCESSOR_NAMES, Processor, canonical_name, create_processor};
pub use runner::{RunOptions, RunStats};
pub use source::{EventSource, ParquetEventSource, ReadRequest, RootEventSource, open_source};
