//! The processor interface and the registry of built-in processors.

use hcal_core::Output;

use crate::config::AnalysisConfig;
use crate::error::{Error, Result};
use crate::events::EventBatch;
use crate::processors::{
    Bx1Processor, ChargeMapProcessor, PhaseScanProcessor, SplashFinderProcessor, SplashProcessor,
};
use crate::source::ReadRequest;

/// Turns one chunk of events into mergeable results.
///
/// `process` must not depend on which other chunks exist: the runner merges the outputs
/// of all chunks of a dataset in arbitrary order.
pub trait Processor: Send + Sync {
    /// Registry name.
    fn name(&self) -> &'static str;

    /// Columns to load for each chunk.
    fn request(&self) -> ReadRequest;

    fn process(&self, batch: &EventBatch) -> Result<Output>;
}

/// Names accepted by [`create_processor`].
pub const PROCESSOR_NAMES: [&str; 5] =
    ["bx1", "charge_map", "splash", "splash_finder", "phase_scan"];

/// `module.Class` spellings used by older job configurations.
const ALIASES: [(&str, &str); 5] = [
    ("bx1processor.BX1Processor", "bx1"),
    ("testprocessor.TestProcessor", "charge_map"),
    ("splash_processor.SplashProcessor", "splash"),
    ("splash_finder.SplashProcessor", "splash_finder"),
    ("phasescanprocessor.PhaseScanProcessor", "phase_scan"),
];

/// Registry name for `name` or one of its aliases.
pub fn canonical_name(name: &str) -> Option<&'static str> {
    let name = name.strip_prefix("processors.").unwrap_or(name);
    PROCESSOR_NAMES
        .iter()
        .copied()
        .find(|&p| p == name)
        .or_else(|| ALIASES.iter().find(|(alias, _)| *alias == name).map(|&(_, p)| p))
}

/// Instantiate a processor by name.
pub fn create_processor(name: &str, config: &AnalysisConfig) -> Result<Box<dyn Processor>> {
    let Some(canonical) = canonical_name(name) else {
        return Err(Error::Input(format!(
            "unknown processor '{name}' (available: {})",
            PROCESSOR_NAMES.join(", ")
        )));
    };
    Ok(match canonical {
        "bx1" => Box::new(Bx1Processor::new(config)),
        "charge_map" => Box::new(ChargeMapProcessor::new(config)),
        "splash" => Box::new(SplashProcessor::new(config)),
        "splash_finder" => Box::new(SplashFinderProcessor::new(config)),
        _ => Box::new(PhaseScanProcessor::new(config)),
    })
}
