//! Channel and event charge, split by whether the event is in bunch crossing 1.

use hcal_core::{Axis, Hist, Item, Output, Subdetector};

use super::{depth_axis, ieta_axis, iphi_axis};
use crate::config::{AnalysisConfig, CollectionNaming, SelectionConfig};
use crate::error::Result;
use crate::events::EventBatch;
use crate::processor::Processor;
use crate::reco::{EventCharge, channel_sumq, event_charges};
use crate::select::select_capped;
use crate::source::ReadRequest;

const SUBDETS: [Subdetector; 2] = [Subdetector::HB, Subdetector::HE];

pub struct ChargeMapProcessor {
    naming: CollectionNaming,
    selection: SelectionConfig,
}

impl ChargeMapProcessor {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self { naming: config.naming, selection: config.selection.clone() }
    }
}

fn is_bx1_axis() -> Axis {
    Axis::int_category("is_bx1", vec![0, 1], false)
}

impl Processor for ChargeMapProcessor {
    fn name(&self) -> &'static str {
        "charge_map"
    }

    fn request(&self) -> ReadRequest {
        ReadRequest { subdets: SUBDETS.to_vec(), naming: self.naming, tdc: false }
    }

    fn process(&self, batch: &EventBatch) -> Result<Output> {
        let mut eventq = Hist::new(vec![is_bx1_axis(), Axis::log("eventq", 2.0, 8.0, 1000)])?;
        let mut sumq = Hist::new(vec![
            Axis::str_category("subdet", &["HB", "HE"], true),
            is_bx1_axis(),
            Axis::log("sumq", 0.0, 7.0, 1000),
        ])?;
        let mut depthmap = Hist::new(vec![ieta_axis(), iphi_axis(), depth_axis()])?;

        let is_bx1: Vec<i64> = batch.bunch_crossing.iter().map(|&bx| i64::from(bx == 1)).collect();
        let mut total = vec![EventCharge::default(); batch.len()];
        for subdet in SUBDETS {
            let digis = batch.digis(subdet)?.valid_only();
            for (t, ec) in total.iter_mut().zip(event_charges(&digis, &self.selection)) {
                t.add(&ec);
            }
            let q = channel_sumq(&digis);
            for event in 0..digis.n_events() {
                for ch in digis.channels(event) {
                    sumq.fill(&[subdet.as_str().into(), is_bx1[event].into(), q[ch].into()], 1.0)?;
                    depthmap.fill(
                        &[
                            f64::from(digis.ieta[ch]).into(),
                            f64::from(digis.iphi[ch]).into(),
                            f64::from(digis.depth[ch]).into(),
                        ],
                        q[ch],
                    )?;
                }
            }
        }
        for (flag, ec) in is_bx1.iter().zip(&total) {
            eventq.fill(&[(*flag).into(), ec.charge.into()], 1.0)?;
        }
        let interesting = select_capped(&batch.event, self.selection.cap, |i| {
            total[i].charge > self.selection.interesting_event_charge
        });
        tracing::debug!(
            dataset = %batch.dataset,
            interesting = interesting.len(),
            events = batch.len(),
            "charge_map chunk done"
        );

        let mut out = Output::new();
        out.insert("nevents", Item::Count(batch.len() as u64));
        out.insert("eventq", Item::Hist(eventq));
        out.insert("sumq", Item::Hist(sumq));
        out.insert("sumq_depthmap", Item::Hist(depthmap));
        out.insert("interesting_events", Item::EventList(interesting));
        Ok(out)
    }
}
