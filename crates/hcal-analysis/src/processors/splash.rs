//! Per-channel maps of curated splash events.

use std::collections::{BTreeMap, BTreeSet};

use hcal_core::{FillValue, Hist, Item, Output, Subdetector};

use super::{depth_axis, event_number_axis, ieta_axis, iphi_axis, sumq_axis};
use crate::config::{AnalysisConfig, CollectionNaming, SplashList};
use crate::error::Result;
use crate::events::EventBatch;
use crate::processor::Processor;
use crate::reco::{channel_raw_sumq, qtime, tdc_time};
use crate::source::ReadRequest;

const R365373: &[u64] = &[216, 217, 1258, 1520, 1521];

const R365537: &[u64] = &[
    2221, 2299, 3794, 4110, 5744, 6397, 6398, 6399, 6461, 6462, 6463, 6464, 6465, 6466, 6536,
    6537, 6538, 6539, 6601, 6602, 6603, 6675, 6676, 6742, 6743, 6744, 6745, 6746, 6802, 6803,
    7086, 7087, 7088, 7089, 7133, 7134, 7135, 7136, 7244, 7245, 7307, 7570, 7571, 7573, 7617,
    7618, 7782, 7783, 7834, 7835, 7836, 7885, 7886, 7887, 7947, 7948, 7949, 8004, 8005, 8006,
    8007, 8008, 8009, 8065, 8118, 8119, 8120, 8121, 8122, 8123, 8181, 8182, 8183, 8184, 8185,
    8386, 8387, 8494, 8549, 8550, 8551, 8552, 8553, 8606, 8607, 8670, 8671, 8723, 8788, 8789,
    8790, 8834, 8835, 9116, 9173, 9174, 9175, 9176, 9177, 9280, 9332, 9333, 9334, 9335, 9393,
    9394, 9772, 9773, 10044, 10045, 10103, 10160, 10161, 10162, 10272, 10315, 10316, 10317,
    10386, 10387, 10430, 10431, 10432,
];

/// Splash events of the 2023 beam splash runs 365373 and 365537.
pub fn default_splash_events() -> SplashList {
    BTreeMap::from([
        ("r365373_Splashes_FEVT".to_string(), R365373.iter().copied().collect()),
        ("r365537_Splashes_FEVT".to_string(), R365537.iter().copied().collect()),
    ])
}

pub struct SplashProcessor {
    naming: CollectionNaming,
    splash_events: SplashList,
}

impl SplashProcessor {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            naming: config.naming,
            splash_events: config.splash_events.clone().unwrap_or_else(default_splash_events),
        }
    }
}

impl Processor for SplashProcessor {
    fn name(&self) -> &'static str {
        "splash"
    }

    fn request(&self) -> ReadRequest {
        ReadRequest { subdets: Subdetector::ALL.to_vec(), naming: self.naming, tdc: true }
    }

    fn process(&self, batch: &EventBatch) -> Result<Output> {
        let mut splash_sumq = Hist::new(vec![event_number_axis(), sumq_axis(1000)])?;
        let map_axes = || vec![event_number_axis(), ieta_axis(), iphi_axis(), depth_axis()];
        let mut depthmap = Hist::new(map_axes())?;
        let timed_axes = || {
            let mut axes = map_axes();
            axes.push(sumq_axis(29));
            axes
        };
        let mut tdctime = Hist::new(timed_axes())?;
        let mut qtime_map = Hist::new(timed_axes())?;

        let empty = BTreeSet::new();
        let wanted = self.splash_events.get(&batch.dataset).unwrap_or(&empty);
        let mut event_sumq = vec![0.0; batch.len()];
        let mut n_splash = 0usize;

        for subdet in Subdetector::ALL {
            let digis = batch.digis(subdet)?.valid_only();
            let raw = channel_raw_sumq(&digis);
            for (event, &number) in batch.event.iter().enumerate() {
                event_sumq[event] += digis.channels(event).map(|ch| raw[ch]).sum::<f64>();
                if !wanted.contains(&number) {
                    continue;
                }
                if subdet == Subdetector::HB {
                    n_splash += 1;
                }
                for ch in digis.channels(event) {
                    let pos: [FillValue<'_>; 4] = [
                        number.into(),
                        f64::from(digis.ieta[ch]).into(),
                        f64::from(digis.iphi[ch]).into(),
                        f64::from(digis.depth[ch]).into(),
                    ];
                    splash_sumq.fill(&[number.into(), raw[ch].into()], 1.0)?;
                    depthmap.fill(&pos, raw[ch])?;
                    let timed: [FillValue<'_>; 5] =
                        [pos[0], pos[1], pos[2], pos[3], raw[ch].into()];
                    if subdet != Subdetector::HB
                        && let Some(t) = digis.tdc(ch).and_then(tdc_time)
                    {
                        tdctime.fill(&timed, t)?;
                    }
                    if let Some(t) = qtime(digis.fc(ch)) {
                        qtime_map.fill(&timed, t)?;
                    }
                }
            }
        }
        tracing::debug!(
            dataset = %batch.dataset,
            splash = n_splash,
            events = batch.len(),
            "splash chunk done"
        );

        let mut out = Output::new();
        out.insert("nevents", Item::Count(batch.len() as u64));
        out.insert("splash_sumq", Item::Hist(splash_sumq));
        out.insert("splash_depthmap", Item::Hist(depthmap));
        out.insert("splash_tdctime", Item::Hist(tdctime));
        out.insert("splash_qtime", Item::Hist(qtime_map));
        out.insert(
            "event_sumq_dict",
            Item::event_map(batch.event.iter().copied().zip(event_sumq)),
        );
        Ok(out)
    }
}
