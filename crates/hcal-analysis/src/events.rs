//! Columnar event batches.
//!
//! A [`DigiCollection`] holds the digis of one subdetector for a run of events. Channels
//! are stored flat with per-event offsets, and the per-time-slice fields are stacked
//! channel-major: channel `c` owns `fc[c * n_ts..(c + 1) * n_ts]`.

use std::collections::BTreeMap;
use std::ops::Range;

use hcal_core::Subdetector;

use crate::error::{Error, Result};

/// One channel, row-wise. Used to build collections by hand.
#[derive(Debug, Clone, PartialEq)]
pub struct Digi {
    pub ieta: i32,
    pub iphi: i32,
    pub depth: i32,
    pub valid: bool,
    pub adc: Vec<f64>,
    pub fc: Vec<f64>,
    pub pedestal_fc: Vec<f64>,
    pub tdc: Option<Vec<f64>>,
}

/// Digis of one subdetector.
#[derive(Debug, Clone, PartialEq)]
pub struct DigiCollection {
    pub subdet: Subdetector,
    /// Length `n_events + 1`.
    pub offsets: Vec<usize>,
    pub ieta: Vec<i32>,
    pub iphi: Vec<i32>,
    pub depth: Vec<i32>,
    pub valid: Vec<bool>,
    pub adc: Vec<f64>,
    pub fc: Vec<f64>,
    pub pedestal_fc: Vec<f64>,
    /// Present when the input has `tdc{ts}` fields.
    pub tdc: Option<Vec<f64>>,
}

impl DigiCollection {
    /// A collection of `n_events` events without channels.
    pub fn empty(subdet: Subdetector, n_events: usize) -> Self {
        Self {
            subdet,
            offsets: vec![0; n_events + 1],
            ieta: Vec::new(),
            iphi: Vec::new(),
            depth: Vec::new(),
            valid: Vec::new(),
            adc: Vec::new(),
            fc: Vec::new(),
            pedestal_fc: Vec::new(),
            tdc: None,
        }
    }

    /// Build from per-event channel lists.
    pub fn from_events(subdet: Subdetector, events: &[Vec<Digi>]) -> Result<Self> {
        let mut c = Self::empty(subdet, 0);
        let has_tdc = events.iter().flatten().any(|d| d.tdc.is_some());
        let mut tdc = Vec::new();
        for digis in events {
            for d in digis {
                c.ieta.push(d.ieta);
                c.iphi.push(d.iphi);
                c.depth.push(d.depth);
                c.valid.push(d.valid);
                c.adc.extend_from_slice(&d.adc);
                c.fc.extend_from_slice(&d.fc);
                c.pedestal_fc.extend_from_slice(&d.pedestal_fc);
                if has_tdc {
                    match &d.tdc {
                        Some(t) => tdc.extend_from_slice(t),
                        None => {
                            return Err(Error::Validation(format!(
                                "{subdet}: tdc given for some digis but not all"
                            )));
                        }
                    }
                }
            }
            c.offsets.push(c.ieta.len());
        }
        if has_tdc {
            c.tdc = Some(tdc);
        }
        c.validate()?;
        Ok(c)
    }

    /// Check that every column agrees with the offsets and the time-slice count.
    pub fn validate(&self) -> Result<()> {
        let n = self.n_channels();
        let n_ts = self.subdet.n_ts();
        if self.offsets.first() != Some(&0) || self.offsets.windows(2).any(|w| w[1] < w[0]) {
            return Err(Error::Validation(format!("{}: malformed event offsets", self.subdet)));
        }
        for (name, len) in [
            ("ieta", self.ieta.len()),
            ("iphi", self.iphi.len()),
            ("depth", self.depth.len()),
            ("valid", self.valid.len()),
        ] {
            if len != n {
                return Err(Error::Validation(format!(
                    "{}: {name} has {len} values for {n} channels",
                    self.subdet
                )));
            }
        }
        for (name, col) in [
            ("adc", Some(&self.adc)),
            ("fc", Some(&self.fc)),
            ("pedestalfc", Some(&self.pedestal_fc)),
            ("tdc", self.tdc.as_ref()),
        ] {
            if let Some(col) = col
                && col.len() != n * n_ts
            {
                return Err(Error::Validation(format!(
                    "{}: {name} has {} values, expected {n} channels x {n_ts} time slices",
                    self.subdet,
                    col.len()
                )));
            }
        }
        Ok(())
    }

    pub fn n_events(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn n_channels(&self) -> usize {
        self.offsets.last().copied().unwrap_or(0)
    }

    /// Channel indices of `event`.
    pub fn channels(&self, event: usize) -> Range<usize> {
        self.offsets[event]..self.offsets[event + 1]
    }

    fn series(&self, ch: usize) -> Range<usize> {
        let n_ts = self.subdet.n_ts();
        ch * n_ts..(ch + 1) * n_ts
    }

    pub fn adc(&self, ch: usize) -> &[f64] {
        &self.adc[self.series(ch)]
    }

    pub fn fc(&self, ch: usize) -> &[f64] {
        &self.fc[self.series(ch)]
    }

    pub fn pedestal_fc(&self, ch: usize) -> &[f64] {
        &self.pedestal_fc[self.series(ch)]
    }

    pub fn tdc(&self, ch: usize) -> Option<&[f64]> {
        self.tdc.as_deref().map(|t| &t[self.series(ch)])
    }

    /// A copy holding only the channels flagged valid.
    ///
    /// Invalid entries are placeholders written with default values; every aggregate
    /// works on the result of this filter.
    pub fn valid_only(&self) -> Self {
        let n_ts = self.subdet.n_ts();
        let keep = |col: &[f64]| -> Vec<f64> {
            self.valid
                .iter()
                .enumerate()
                .filter(|&(_, &v)| v)
                .flat_map(|(ch, _)| col[ch * n_ts..(ch + 1) * n_ts].iter().copied())
                .collect()
        };
        let pick = |col: &[i32]| -> Vec<i32> {
            col.iter().zip(&self.valid).filter(|&(_, &v)| v).map(|(&x, _)| x).collect()
        };

        let mut offsets = Vec::with_capacity(self.offsets.len());
        offsets.push(0);
        for event in 0..self.n_events() {
            let n_valid = self.valid[self.channels(event)].iter().filter(|&&v| v).count();
            offsets.push(offsets[event] + n_valid);
        }
        Self {
            subdet: self.subdet,
            ieta: pick(&self.ieta),
            iphi: pick(&self.iphi),
            depth: pick(&self.depth),
            valid: vec![true; offsets[self.n_events()]],
            adc: keep(&self.adc),
            fc: keep(&self.fc),
            pedestal_fc: keep(&self.pedestal_fc),
            tdc: self.tdc.as_deref().map(keep),
            offsets,
        }
    }
}

/// A chunk of consecutive events from one input file.
#[derive(Debug, Clone, PartialEq)]
pub struct EventBatch {
    pub dataset: String,
    /// Entry number of the first event in its file.
    pub first_entry: u64,
    pub run: Vec<u32>,
    pub event: Vec<u64>,
    pub bunch_crossing: Vec<i32>,
    pub luminosity_block: Vec<u32>,
    pub digis: BTreeMap<Subdetector, DigiCollection>,
}

impl EventBatch {
    pub fn len(&self) -> usize {
        self.event.len()
    }

    pub fn is_empty(&self) -> bool {
        self.event.is_empty()
    }

    /// Digis of `subdet`, or a validation error naming the missing collection.
    pub fn digis(&self, subdet: Subdetector) -> Result<&DigiCollection> {
        self.digis.get(&subdet).ok_or_else(|| {
            Error::Validation(format!("batch from '{}' has no {subdet} digis", self.dataset))
        })
    }

    /// Check column lengths against the event count.
    pub fn validate(&self) -> Result<()> {
        let n = self.len();
        for (name, len) in [
            ("run", self.run.len()),
            ("bunchCrossing", self.bunch_crossing.len()),
            ("luminosityBlock", self.luminosity_block.len()),
        ] {
            if len != n {
                return Err(Error::Validation(format!("{name} has {len} values for {n} events")));
            }
        }
        for digis in self.digis.values() {
            digis.validate()?;
            if digis.n_events() != n {
                return Err(Error::Validation(format!(
                    "{} digis cover {} events, batch has {n}",
                    digis.subdet,
                    digis.n_events()
                )));
            }
        }
        Ok(())
    }
}
