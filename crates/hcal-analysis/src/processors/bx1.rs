//! Event charge and hit multiplicity per bunch crossing.

use hcal_core::{Axis, FillValue, Hist, Item, Output, Subdetector};

use crate::config::{AnalysisConfig, CollectionNaming, SelectionConfig};
use crate::error::Result;
use crate::events::EventBatch;
use crate::processor::Processor;
use crate::reco::event_charges;
use crate::select::{bad_events, full_events};
use crate::source::ReadRequest;

const SUBDETS: [Subdetector; 2] = [Subdetector::HB, Subdetector::HE];

pub struct Bx1Processor {
    naming: CollectionNaming,
    selection: SelectionConfig,
}

impl Bx1Processor {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self { naming: config.naming, selection: config.selection.clone() }
    }

    fn bx_subdet_axes() -> Vec<Axis> {
        vec![
            Axis::int_category("bx", vec![], true),
            Axis::str_category("subdet", &["HB", "HE"], true),
        ]
    }
}

/// Append `events` to `list`, skipping repeats, until `cap` entries.
fn extend_capped(list: &mut Vec<u64>, events: Vec<u64>, cap: usize) {
    for e in events {
        if list.len() >= cap {
            break;
        }
        if !list.contains(&e) {
            list.push(e);
        }
    }
}

impl Processor for Bx1Processor {
    fn name(&self) -> &'static str {
        "bx1"
    }

    fn request(&self) -> ReadRequest {
        ReadRequest { subdets: SUBDETS.to_vec(), naming: self.naming, tdc: false }
    }

    fn process(&self, batch: &EventBatch) -> Result<Output> {
        let mut axes = Self::bx_subdet_axes();
        axes.push(Axis::log("eventq", 3.0, 6.0, 100));
        axes.push(Axis::log("nhits", 1.0, 4.0, 100));
        let mut eventq = Hist::new(axes)?;

        let mut axes = Self::bx_subdet_axes();
        axes.push(Axis::log("avgq", 0.0, 6.0, 100));
        axes.push(Axis::log("nhits", 1.0, 4.0, 100));
        let mut avgq = Hist::new(axes)?;

        let mut bad = Vec::new();
        let mut full = Vec::new();
        for subdet in SUBDETS {
            let charges = event_charges(batch.digis(subdet)?, &self.selection);
            for (i, ec) in charges.iter().enumerate() {
                let bx = FillValue::from(batch.bunch_crossing[i]);
                let name = FillValue::from(subdet.as_str());
                let nhits = FillValue::from(ec.nhits as f64);
                eventq.fill(&[bx, name, ec.charge.into(), nhits], 1.0)?;
                if let Some(q) = ec.avgq() {
                    avgq.fill(&[bx, name, q.into(), nhits], 1.0)?;
                }
            }
            let cap = self.selection.cap;
            extend_capped(&mut bad, bad_events(&batch.event, &charges, &self.selection), cap);
            extend_capped(&mut full, full_events(&batch.event, &charges, &self.selection), cap);
        }
        tracing::debug!(
            dataset = %batch.dataset,
            events = batch.len(),
            bad = bad.len(),
            full = full.len(),
            "bx1 chunk done"
        );

        let mut out = Output::new();
        out.insert("nevents", Item::Count(batch.len() as u64));
        out.insert("eventq", Item::Hist(eventq));
        out.insert("avgq", Item::Hist(avgq));
        out.insert("bad_events", Item::EventList(bad));
        out.insert("full_events", Item::EventList(full));
        Ok(out)
    }
}
