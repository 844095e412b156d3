//! Total raw charge per event, for locating splash candidates.

use std::collections::BTreeMap;

use hcal_core::{Hist, Item, Output, Subdetector};

use super::event_number_axis;
use crate::config::{AnalysisConfig, CollectionNaming};
use crate::error::Result;
use crate::events::EventBatch;
use crate::processor::Processor;
use crate::reco::event_raw_charge;
use crate::source::ReadRequest;

pub struct SplashFinderProcessor {
    naming: CollectionNaming,
}

impl SplashFinderProcessor {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self { naming: config.naming }
    }
}

impl Processor for SplashFinderProcessor {
    fn name(&self) -> &'static str {
        "splash_finder"
    }

    fn request(&self) -> ReadRequest {
        ReadRequest { subdets: Subdetector::ALL.to_vec(), naming: self.naming, tdc: false }
    }

    fn process(&self, batch: &EventBatch) -> Result<Output> {
        let mut charge = vec![0.0; batch.len()];
        for subdet in Subdetector::ALL {
            for (c, q) in charge.iter_mut().zip(event_raw_charge(batch.digis(subdet)?)) {
                *c += q;
            }
        }

        let mut event_sumq = Hist::new(vec![event_number_axis()])?;
        for (&number, &q) in batch.event.iter().zip(&charge) {
            event_sumq.fill(&[number.into()], q)?;
        }

        let mut out = Output::new();
        out.insert("nevents", Item::Count(batch.len() as u64));
        out.insert("event_sumq", Item::Hist(event_sumq));
        out.insert(
            "event_sumq_dict",
            Item::event_map(batch.event.iter().copied().zip(charge)),
        );
        Ok(out)
    }
}

/// The `n` events with the largest charge, largest first. Ties go to the lower event number.
pub fn top_events(sums: &BTreeMap<u64, f64>, n: usize) -> Vec<(u64, f64)> {
    let mut v: Vec<(u64, f64)> = sums.iter().map(|(&e, &q)| (e, q)).collect();
    v.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    v.truncate(n);
    v
}
