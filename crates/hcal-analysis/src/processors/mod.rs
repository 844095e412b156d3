//! Built-in processors.

mod bx1;
mod charge_map;
mod phase_scan;
mod splash;
mod splash_finder;

pub use bx1::Bx1Processor;
pub use charge_map::ChargeMapProcessor;
pub use phase_scan::PhaseScanProcessor;
pub use splash::{SplashProcessor, default_splash_events};
pub use splash_finder::{SplashFinderProcessor, top_events};

use hcal_core::Axis;

fn ieta_axis() -> Axis {
    Axis::regular("ieta", 83, -41.5, 41.5)
}

fn iphi_axis() -> Axis {
    Axis::regular("iphi", 72, 0.5, 72.5)
}

fn depth_axis() -> Axis {
    Axis::regular("depth", 7, 0.5, 7.5)
}

fn event_number_axis() -> Axis {
    Axis::int_category("event_number", vec![], true)
}

/// Channel charge, 10^0 to 10^7 fC in `n_edges - 1` log bins.
fn sumq_axis(n_edges: usize) -> Axis {
    Axis::log("sumq", 0.0, 7.0, n_edges)
}

#[cfg(test)]
pub(crate) mod testdata {
    //! Hand-built batches.

    use std::collections::BTreeMap;

    use hcal_core::Subdetector;

    use crate::events::{Digi, DigiCollection, EventBatch};

    /// A channel with `q` fC in time slice 3 on top of a 1 fC pedestal.
    pub fn digi(subdet: Subdetector, ieta: i32, valid: bool, q: f64) -> Digi {
        let n = subdet.n_ts();
        let mut fc = vec![1.0; n];
        fc[3.min(n - 1)] += q;
        Digi {
            ieta,
            iphi: 10,
            depth: 1,
            valid,
            adc: vec![5.0; n],
            fc,
            pedestal_fc: vec![1.0; n],
            tdc: Some(vec![62.0; n]),
        }
    }

    pub fn batch(
        dataset: &str,
        events: &[u64],
        bx: &[i32],
        digis: Vec<(Subdetector, Vec<Vec<Digi>>)>,
    ) -> EventBatch {
        let n = events.len();
        let mut map = BTreeMap::new();
        for subdet in Subdetector::ALL {
            map.insert(subdet, DigiCollection::empty(subdet, n));
        }
        for (subdet, per_event) in digis {
            map.insert(subdet, DigiCollection::from_events(subdet, &per_event).unwrap());
        }
        let batch = EventBatch {
            dataset: dataset.to_string(),
            first_entry: 0,
            run: vec![1; n],
            event: events.to_vec(),
            bunch_crossing: bx.to_vec(),
            luminosity_block: vec![3; n],
            digis: map,
        };
        batch.validate().unwrap();
        batch
    }
}
