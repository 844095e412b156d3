//! Analysis configuration file.
//!
//! Every field is optional; a missing file or an empty document gives the defaults used
//! in production. The file is read as JSON when its extension is `.json`, YAML otherwise.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use hcal_core::Subdetector;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How digi collections are named in the input files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionNaming {
    /// `DigiHB_fc0`, counted by `nDigiHB`.
    #[default]
    DigiPrefix,
    /// `HBDigis_fc0`, counted by `nHBDigis`.
    DigisSuffix,
}

impl CollectionNaming {
    /// Collection name of `subdet`, e.g. `DigiHB`.
    pub fn collection(self, subdet: Subdetector) -> String {
        match self {
            Self::DigiPrefix => format!("Digi{subdet}"),
            Self::DigisSuffix => format!("{subdet}Digis"),
        }
    }
}

/// Thresholds for event-level quantities and anomalous-event lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SelectionConfig {
    /// A valid channel with `sumq` above this is a hit (fC).
    pub hit_threshold: f64,
    /// `bad_events`: event charge above this (fC) ...
    pub bad_event_charge: f64,
    /// ... and more hits than this.
    pub bad_event_hits: u64,
    /// `full_events`: more hits than this.
    pub full_event_hits: u64,
    /// `interesting_events`: event charge above this (fC).
    pub interesting_event_charge: f64,
    /// At most this many events per list per chunk.
    pub cap: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            hit_threshold: 60.0,
            bad_event_charge: 5.0e4,
            bad_event_hits: 400,
            full_event_hits: 9000,
            interesting_event_charge: 2.0e5,
            cap: 100,
        }
    }
}

/// Curated splash events: dataset name to event numbers.
pub type SplashList = BTreeMap<String, BTreeSet<u64>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub naming: CollectionNaming,
    pub selection: SelectionConfig,
    /// Replaces the built-in splash list when set.
    pub splash_events: Option<SplashList>,
    /// Local mount of the EOS namespace behind `root://eoscms.cern.ch/`.
    pub eos_mount: PathBuf,
    /// Name of the event tree in ROOT inputs.
    pub tree: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            naming: CollectionNaming::default(),
            selection: SelectionConfig::default(),
            splash_events: None,
            eos_mount: PathBuf::from("/eos/cms"),
            tree: "Events".to_string(),
        }
    }
}

/// Read an [`AnalysisConfig`] by file extension.
pub fn read_analysis_config(path: &Path) -> Result<AnalysisConfig> {
    let bytes = std::fs::read(path)?;
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("").to_ascii_lowercase();
    let cfg = if ext == "json" {
        serde_json::from_slice(&bytes)?
    } else if bytes.iter().all(u8::is_ascii_whitespace) {
        AnalysisConfig::default()
    } else {
        serde_yaml_ng::from_slice(&bytes)?
    };
    tracing::debug!(path = %path.display(), "analysis config loaded");
    Ok(cfg)
}
