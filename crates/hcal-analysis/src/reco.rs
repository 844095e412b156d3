//! Channel and event charge reconstruction.

use crate::config::SelectionConfig;
use crate::events::DigiCollection;

/// Length of one time slice in ns.
pub const TS_NS: f64 = 25.0;

/// TDC codes at or above this carry no timing information.
pub const TDC_INVALID: f64 = 50.0;

/// ns per TDC count.
pub const TDC_NS: f64 = 0.5;

/// Pedestal-subtracted charge per time slice.
pub fn real_fc(fc: &[f64], pedestal_fc: &[f64]) -> Vec<f64> {
    fc.iter().zip(pedestal_fc).map(|(q, p)| q - p).collect()
}

/// Pedestal-subtracted charge summed over time slices.
pub fn sumq(fc: &[f64], pedestal_fc: &[f64]) -> f64 {
    fc.iter().zip(pedestal_fc).map(|(q, p)| q - p).sum()
}

/// Charge summed over time slices, without pedestal subtraction.
pub fn raw_sumq(fc: &[f64]) -> f64 {
    fc.iter().sum()
}

/// Charge-weighted mean time `Σ 25·ts·fc / Σ fc` in ns; `None` without charge.
pub fn qtime(fc: &[f64]) -> Option<f64> {
    let total = raw_sumq(fc);
    if total == 0.0 {
        return None;
    }
    let weighted: f64 = fc.iter().enumerate().map(|(ts, q)| TS_NS * ts as f64 * q).sum();
    Some(weighted / total)
}

/// Earliest TDC time `25·ts + 0.5·tdc` in ns over slices with a valid code.
pub fn tdc_time(tdc: &[f64]) -> Option<f64> {
    tdc.iter()
        .enumerate()
        .filter(|&(_, &t)| t < TDC_INVALID)
        .map(|(ts, &t)| TS_NS * ts as f64 + TDC_NS * t)
        .reduce(f64::min)
}

/// Pedestal-subtracted `sumq` of every channel.
pub fn channel_sumq(digis: &DigiCollection) -> Vec<f64> {
    (0..digis.n_channels()).map(|ch| sumq(digis.fc(ch), digis.pedestal_fc(ch))).collect()
}

/// Raw charge sum of every channel.
pub fn channel_raw_sumq(digis: &DigiCollection) -> Vec<f64> {
    (0..digis.n_channels()).map(|ch| raw_sumq(digis.fc(ch))).collect()
}

/// Per-event charge summary of one subdetector, or several added together.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EventCharge {
    /// Σ sumq over all valid channels.
    pub charge: f64,
    /// Σ sumq over hits.
    pub hit_charge: f64,
    /// Valid channels with sumq above the hit threshold.
    pub nhits: u64,
}

impl EventCharge {
    pub fn add(&mut self, other: &EventCharge) {
        self.charge += other.charge;
        self.hit_charge += other.hit_charge;
        self.nhits += other.nhits;
    }

    /// Mean hit charge; `None` without hits.
    pub fn avgq(&self) -> Option<f64> {
        (self.nhits > 0).then(|| self.hit_charge / self.nhits as f64)
    }
}

/// Event charges of `digis`. Channels not flagged valid are ignored.
pub fn event_charges(digis: &DigiCollection, sel: &SelectionConfig) -> Vec<EventCharge> {
    (0..digis.n_events())
        .map(|event| {
            let mut ec = EventCharge::default();
            for ch in digis.channels(event).filter(|&ch| digis.valid[ch]) {
                let q = sumq(digis.fc(ch), digis.pedestal_fc(ch));
                ec.charge += q;
                if q > sel.hit_threshold {
                    ec.hit_charge += q;
                    ec.nhits += 1;
                }
            }
            ec
        })
        .collect()
}

/// Per-event raw charge of valid channels.
pub fn event_raw_charge(digis: &DigiCollection) -> Vec<f64> {
    (0..digis.n_events())
        .map(|event| {
            digis
                .channels(event)
                .filter(|&ch| digis.valid[ch])
                .map(|ch| raw_sumq(digis.fc(ch)))
                .sum()
        })
        .collect()
}
