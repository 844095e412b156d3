//! Charge-weighted pulse time of HB channels per luminosity section.
//!
//! During a phase scan the digitizer timing is shifted from one lumi section to the next;
//! the mean pulse time per channel and lumi section tracks the shift.

use hcal_core::{Axis, FillValue, Hist, Item, Output, Subdetector};

use super::iphi_axis;
use crate::config::{AnalysisConfig, CollectionNaming};
use crate::error::Result;
use crate::events::EventBatch;
use crate::processor::Processor;
use crate::reco::qtime;
use crate::source::ReadRequest;

pub struct PhaseScanProcessor {
    naming: CollectionNaming,
}

impl PhaseScanProcessor {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self { naming: config.naming }
    }
}

impl Processor for PhaseScanProcessor {
    fn name(&self) -> &'static str {
        "phase_scan"
    }

    fn request(&self) -> ReadRequest {
        ReadRequest { subdets: vec![Subdetector::HB], naming: self.naming, tdc: false }
    }

    fn process(&self, batch: &EventBatch) -> Result<Output> {
        let mut tstime = Hist::new(vec![
            Axis::int_category("ls", vec![], true),
            Axis::regular("ieta", 35, -17.5, 17.5),
            iphi_axis(),
            Axis::regular("depth", 4, 0.5, 4.5),
            Axis::regular("tstime", 50, 0.0, 200.0),
        ])?;

        let hb = batch.digis(Subdetector::HB)?.valid_only();
        for (event, &ls) in batch.luminosity_block.iter().enumerate() {
            for ch in hb.channels(event) {
                let Some(t) = qtime(hb.fc(ch)) else { continue };
                let pos: [FillValue<'_>; 5] = [
                    i64::from(ls).into(),
                    f64::from(hb.ieta[ch]).into(),
                    f64::from(hb.iphi[ch]).into(),
                    f64::from(hb.depth[ch]).into(),
                    t.into(),
                ];
                tstime.fill(&pos, 1.0)?;
            }
        }

        let mut out = Output::new();
        out.insert("nevents", Item::Count(batch.len() as u64));
        out.insert("hist_tstime_hb", Item::Hist(tstime));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Digi;
    use crate::processors::testdata::{batch, digi};
    use hcal_core::BinKey;

    #[test]
    fn fills_mean_time_per_lumi_section() {
        let silent = Digi { fc: vec![0.0; 8], ..digi(Subdetector::HB, 3, true, 0.0) };
        let hb = vec![
            vec![digi(Subdetector::HB, 3, true, 1.0e4), silent],
            vec![digi(Subdetector::HB, 3, false, 1.0e4)],
        ];
        let b = batch("scan", &[1, 2], &[1, 1], vec![(Subdetector::HB, hb)]);
        let out = PhaseScanProcessor::new(&AnalysisConfig::default()).process(&b).unwrap();
        let h = out.hist("hist_tstime_hb").unwrap();
        assert_eq!(h.entries(), 1);
        assert_eq!(h.project("ls").unwrap()[&BinKey::Index(3)], 1.0);
        // nearly all charge sits in slice 3 (75 ns): bin 18 of 4 ns bins
        assert_eq!(h.project("tstime").unwrap()[&BinKey::Index(18)], 1.0);
    }
}
