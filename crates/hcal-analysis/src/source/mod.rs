//! Event sources.
//!
//! An [`EventSource`] yields [`EventBatch`]es for entry ranges of one input file. Both
//! backends expose the flat nanoAOD columns (`event`, `nDigiHB`, `DigiHB_fc0`, ...)
//! through [`Columns`]; [`assemble`] stacks the per-time-slice columns of each
//! collection into channel-major series.

mod parquet_file;
mod root_file;

use std::collections::BTreeMap;
use std::ops::Range;
use std::path::Path;

use hcal_core::Subdetector;
use hcal_root::JaggedCol;

use crate::config::CollectionNaming;
use crate::error::{Error, Result};
use crate::events::{DigiCollection, EventBatch};

pub use self::parquet_file::ParquetEventSource;
pub use self::root_file::RootEventSource;

/// Per-event scalar columns every batch carries.
pub const EVENT_COLUMNS: [&str; 4] = ["run", "event", "bunchCrossing", "luminosityBlock"];

/// What a processor needs from the input.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadRequest {
    pub subdets: Vec<Subdetector>,
    pub naming: CollectionNaming,
    /// Read `tdc{ts}` columns when present.
    pub tdc: bool,
}

impl ReadRequest {
    /// Column names to load; `has` reports whether an optional column exists.
    pub fn columns(&self, has: impl Fn(&str) -> bool) -> Vec<String> {
        let mut names: Vec<String> = EVENT_COLUMNS.iter().map(|s| s.to_string()).collect();
        for &subdet in &self.subdets {
            let coll = self.naming.collection(subdet);
            for field in ["ieta", "iphi", "depth", "valid"] {
                names.push(format!("{coll}_{field}"));
            }
            for ts in 0..subdet.n_ts() {
                for field in ["adc", "fc", "pedestalfc"] {
                    names.push(format!("{coll}_{field}{ts}"));
                }
            }
            if self.tdc && has(&format!("{coll}_tdc0")) {
                names.extend((0..subdet.n_ts()).map(|ts| format!("{coll}_tdc{ts}")));
            }
        }
        names
    }
}

/// Column access over one entry range.
pub trait Columns {
    fn has(&self, name: &str) -> bool;
    /// One value per event.
    fn scalar(&self, name: &str) -> Result<Vec<f64>>;
    /// One unsigned integer per event, read without a round trip through `f64` where the
    /// backend allows it.
    fn scalar_u64(&self, name: &str) -> Result<Vec<u64>> {
        integers(name, self.scalar(name)?)
    }
    /// Variable-length values per event.
    fn jagged(&self, name: &str) -> Result<JaggedCol>;
}

/// One input file.
pub trait EventSource: Send + Sync {
    fn path(&self) -> &Path;
    fn n_entries(&self) -> u64;
    /// Read entries `range` as a batch of `dataset`.
    fn read(&self, dataset: &str, range: Range<u64>, request: &ReadRequest) -> Result<EventBatch>;
}

/// Open `path` with the backend matching its extension (`.parquet`/`.pq`, else ROOT).
pub fn open_source(path: &Path, tree: &str) -> Result<Box<dyn EventSource>> {
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("").to_ascii_lowercase();
    if ext == "parquet" || ext == "pq" {
        Ok(Box::new(ParquetEventSource::open(path)?))
    } else {
        Ok(Box::new(RootEventSource::open(path, tree)?))
    }
}

/// Build a batch from the columns of `request`.
pub fn assemble(
    cols: &dyn Columns,
    dataset: &str,
    first_entry: u64,
    request: &ReadRequest,
) -> Result<EventBatch> {
    let event = cols.scalar_u64("event")?;
    let n_events = event.len();
    let scalar = |name: &str| -> Result<Vec<f64>> {
        let v = cols.scalar(name)?;
        if v.len() != n_events {
            return Err(Error::Validation(format!(
                "column '{name}' has {} values for {n_events} events",
                v.len()
            )));
        }
        Ok(v)
    };

    let mut digis = BTreeMap::new();
    for &subdet in &request.subdets {
        let coll = request.naming.collection(subdet);
        digis.insert(subdet, read_collection(cols, subdet, &coll, n_events, request.tdc)?);
    }

    let batch = EventBatch {
        dataset: dataset.to_string(),
        first_entry,
        run: integers("run", scalar("run")?)?,
        event,
        bunch_crossing: integers("bunchCrossing", scalar("bunchCrossing")?)?,
        luminosity_block: integers("luminosityBlock", scalar("luminosityBlock")?)?,
        digis,
    };
    batch.validate()?;
    Ok(batch)
}

/// Convert integer-valued `values` of column `name`. Nulls (NaN), fractions and values out
/// of range for `T` are rejected.
fn integers<T: TryFrom<i64>>(name: &str, values: Vec<f64>) -> Result<Vec<T>> {
    values
        .into_iter()
        .map(|x| {
            let int = (x.is_finite() && x.fract() == 0.0)
                .then(|| T::try_from(x as i64).ok())
                .flatten();
            int.ok_or_else(|| {
                Error::Validation(format!("column '{name}' has non-integer value {x}"))
            })
        })
        .collect()
}

/// A flag is set when it is non-zero and not null.
fn flags(values: Vec<f64>) -> Vec<bool> {
    values.into_iter().map(|x| !x.is_nan() && x != 0.0).collect()
}

fn read_collection(
    cols: &dyn Columns,
    subdet: Subdetector,
    coll: &str,
    n_events: usize,
    want_tdc: bool,
) -> Result<DigiCollection> {
    let ieta = cols.jagged(&format!("{coll}_ieta"))?;
    if ieta.n_entries() != n_events {
        return Err(Error::Validation(format!(
            "{coll}_ieta covers {} events, expected {n_events}",
            ieta.n_entries()
        )));
    }
    let offsets = ieta.offsets.clone();
    let same_shape = |name: String| -> Result<Vec<f64>> {
        let col = cols.jagged(&name)?;
        if col.offsets != offsets {
            return Err(Error::Validation(format!(
                "{name} does not match the shape of {coll}_ieta"
            )));
        }
        Ok(col.flat)
    };
    let index = |field: &str| -> Result<Vec<i32>> {
        let name = format!("{coll}_{field}");
        let values = if field == "ieta" { ieta.flat.clone() } else { same_shape(name.clone())? };
        integers(&name, values)
    };

    let n_ts = subdet.n_ts();
    let stack = |field: &str| -> Result<Vec<f64>> {
        let slices = (0..n_ts)
            .map(|ts| same_shape(format!("{coll}_{field}{ts}")))
            .collect::<Result<Vec<_>>>()?;
        let n_ch = offsets.last().copied().unwrap_or(0);
        let mut out = Vec::with_capacity(n_ch * n_ts);
        for ch in 0..n_ch {
            out.extend(slices.iter().map(|s| s[ch]));
        }
        Ok(out)
    };

    let has_tdc = want_tdc && cols.has(&format!("{coll}_tdc0"));
    let tdc = if has_tdc { Some(stack("tdc")?) } else { None };
    Ok(DigiCollection {
        subdet,
        ieta: index("ieta")?,
        iphi: index("iphi")?,
        depth: index("depth")?,
        valid: flags(same_shape(format!("{coll}_valid"))?),
        adc: stack("adc")?,
        fc: stack("fc")?,
        pedestal_fc: stack("pedestalfc")?,
        tdc,
        offsets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// In-memory columns keyed by name.
    struct MapColumns {
        scalars: HashMap<String, Vec<f64>>,
        jagged: HashMap<String, JaggedCol>,
    }

    impl Columns for MapColumns {
        fn has(&self, name: &str) -> bool {
            self.scalars.contains_key(name) || self.jagged.contains_key(name)
        }
        fn scalar(&self, name: &str) -> Result<Vec<f64>> {
            self.scalars.get(name).cloned().ok_or_else(|| Error::MissingColumn {
                path: "mem".into(),
                column: name.into(),
            })
        }
        fn jagged(&self, name: &str) -> Result<JaggedCol> {
            self.jagged.get(name).cloned().ok_or_else(|| Error::MissingColumn {
                path: "mem".into(),
                column: name.into(),
            })
        }
    }

    /// Two events of HF digis: [ch0, ch1], [ch2]; `fc{ts}` of channel c is `10c + ts`.
    fn hf_columns(with_tdc: bool) -> MapColumns {
        let offsets = vec![0, 2, 3];
        let col = |flat: Vec<f64>| JaggedCol { flat, offsets: offsets.clone() };
        let mut jagged = HashMap::new();
        jagged.insert("DigiHF_ieta".into(), col(vec![30.0, -30.0, 41.0]));
        jagged.insert("DigiHF_iphi".into(), col(vec![1.0, 3.0, 71.0]));
        jagged.insert("DigiHF_depth".into(), col(vec![1.0, 2.0, 4.0]));
        jagged.insert("DigiHF_valid".into(), col(vec![1.0, 0.0, 1.0]));
        for ts in 0..3 {
            let t = ts as f64;
            jagged.insert(format!("DigiHF_fc{ts}"), col(vec![t, 10.0 + t, 20.0 + t]));
            jagged.insert(format!("DigiHF_pedestalfc{ts}"), col(vec![0.5; 3]));
            jagged.insert(format!("DigiHF_adc{ts}"), col(vec![t; 3]));
            if with_tdc {
                jagged.insert(format!("DigiHF_tdc{ts}"), col(vec![62.0; 3]));
            }
        }
        let scalars = HashMap::from([
            ("run".to_string(), vec![365373.0, 365373.0]),
            ("event".to_string(), vec![216.0, 217.0]),
            ("bunchCrossing".to_string(), vec![1.0, 2.0]),
            ("luminosityBlock".to_string(), vec![9.0, 9.0]),
        ]);
        MapColumns { scalars, jagged }
    }

    fn hf_request(tdc: bool) -> ReadRequest {
        ReadRequest { subdets: vec![Subdetector::HF], naming: CollectionNaming::DigiPrefix, tdc }
    }

    #[test]
    fn stacks_time_slices_channel_major() {
        let batch = assemble(&hf_columns(false), "splash", 40, &hf_request(true)).unwrap();
        assert_eq!(batch.event, vec![216, 217]);
        assert_eq!(batch.first_entry, 40);
        let hf = batch.digis(Subdetector::HF).unwrap();
        assert_eq!(hf.offsets, vec![0, 2, 3]);
        assert_eq!(hf.fc(1), &[10.0, 11.0, 12.0]);
        assert_eq!(hf.valid, vec![true, false, true]);
        assert_eq!(hf.ieta, vec![30, -30, 41]);
        assert!(hf.tdc.is_none());
    }

    #[test]
    fn tdc_is_read_when_present() {
        let batch = assemble(&hf_columns(true), "splash", 0, &hf_request(true)).unwrap();
        assert_eq!(batch.digis(Subdetector::HF).unwrap().tdc(2), Some(&[62.0, 62.0, 62.0][..]));
    }

    #[test]
    fn missing_collection_is_reported() {
        let request = ReadRequest { subdets: vec![Subdetector::HB], ..hf_request(false) };
        let err = assemble(&hf_columns(false), "splash", 0, &request).unwrap_err();
        assert!(matches!(err, Error::MissingColumn { column, .. } if column == "DigiHB_ieta"));
    }

    #[test]
    fn ragged_field_is_rejected() {
        let mut cols = hf_columns(false);
        cols.jagged.insert(
            "DigiHF_fc1".into(),
            JaggedCol { flat: vec![1.0, 2.0, 3.0], offsets: vec![0, 1, 3] },
        );
        assert!(matches!(
            assemble(&cols, "splash", 0, &hf_request(false)),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn null_valid_flag_is_not_valid() {
        let mut cols = hf_columns(false);
        cols.jagged.insert(
            "DigiHF_valid".into(),
            JaggedCol { flat: vec![1.0, f64::NAN, 2.0], offsets: vec![0, 2, 3] },
        );
        let batch = assemble(&cols, "splash", 0, &hf_request(false)).unwrap();
        assert_eq!(batch.digis(Subdetector::HF).unwrap().valid, vec![true, false, true]);
    }

    #[test]
    fn null_channel_index_is_rejected() {
        for field in ["ieta", "iphi", "depth"] {
            let mut cols = hf_columns(false);
            let name = format!("DigiHF_{field}");
            cols.jagged.insert(
                name.clone(),
                JaggedCol { flat: vec![30.0, f64::NAN, 41.0], offsets: vec![0, 2, 3] },
            );
            match assemble(&cols, "splash", 0, &hf_request(false)) {
                Err(Error::Validation(msg)) => assert!(msg.contains(&name), "{msg}"),
                other => panic!("{field}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn event_numbers_must_be_integers() {
        let mut cols = hf_columns(false);
        cols.scalars.insert("event".into(), vec![216.0, f64::NAN]);
        assert!(matches!(
            assemble(&cols, "splash", 0, &hf_request(false)),
            Err(Error::Validation(msg)) if msg.contains("'event'")
        ));
        let mut cols = hf_columns(false);
        cols.scalars.insert("bunchCrossing".into(), vec![1.5, 2.0]);
        assert!(assemble(&cols, "splash", 0, &hf_request(false)).is_err());
    }

    #[test]
    fn integers_reject_out_of_range() {
        assert_eq!(integers::<u32>("run", vec![365373.0]).unwrap(), vec![365373]);
        assert!(integers::<u32>("run", vec![-1.0]).is_err());
        assert!(integers::<i32>("ieta", vec![f64::INFINITY]).is_err());
    }

    #[test]
    fn request_lists_optional_tdc() {
        let req = ReadRequest {
            subdets: vec![Subdetector::HE],
            naming: CollectionNaming::DigisSuffix,
            tdc: true,
        };
        let without = req.columns(|_| false);
        assert_eq!(without.len(), 4 + 4 + 3 * 8);
        assert!(without.contains(&"HEDigis_pedestalfc7".to_string()));
        let with = req.columns(|n| n == "HEDigis_tdc0");
        assert_eq!(with.len(), without.len() + 8);
    }
}
