//! # hcal-root
//!
//! Native reader for the ROOT `TTree` files that hold HCAL nanoAOD digis.
//!
//! Files are memory-mapped; baskets are decompressed on demand (zlib, LZ4, ZSTD, XZ)
//! and only for the entry range being read, so a file can be split into chunks that
//! are processed independently.
//!
//! ```no_run
//! use hcal_root::RootFile;
//!
//! let f = RootFile::open("nano.root").unwrap();
//! let tree = f.get_tree("Events").unwrap();
//! let n_hb = f.branch_reader(&tree, "nDigiHB").unwrap().read_f64(0..100).unwrap();
//! let fc0 = f.branch_reader(&tree, "DigiHB_fc0").unwrap().read_jagged_f64(0..100).unwrap();
//! assert_eq!(fc0.n_entries(), n_hb.len());
//! ```

#![warn(clippy::all)]

pub mod basket;
pub mod branch_reader;
pub mod datasource;
pub mod decompress;
pub mod error;
pub mod file;
pub mod key;
pub mod rbuffer;
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;
pub mod tree;
pub mod ttree;

pub use branch_reader::{BranchReader, JaggedCol};
pub use error::{Result, RootError};
pub use file::RootFile;
pub use key::KeyInfo;
pub use tree::{BranchInfo, LeafType, Tree};
