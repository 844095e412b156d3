//! ROOT `TTree` input.

use std::ops::Range;
use std::path::{Path, PathBuf};

use hcal_root::{BranchReader, JaggedCol, RootError, RootFile, Tree};

use super::{Columns, EventSource, ReadRequest, assemble};
use crate::error::{Error, Result};
use crate::events::EventBatch;

/// A memory-mapped ROOT file and its event tree.
pub struct RootEventSource {
    file: RootFile,
    tree: Tree,
    path: PathBuf,
}

impl RootEventSource {
    pub fn open(path: &Path, tree: &str) -> Result<Self> {
        let file = RootFile::open(path)?;
        let tree = file.get_tree(tree)?;
        tracing::debug!(path = %path.display(), entries = tree.entries, "opened ROOT tree");
        Ok(Self { file, tree, path: path.to_path_buf() })
    }

    /// Wrap an already opened file.
    pub fn from_file(file: RootFile, tree: &str) -> Result<Self> {
        let tree = file.get_tree(tree)?;
        let path = file.path().to_path_buf();
        Ok(Self { file, tree, path })
    }
}

struct RootColumns<'a> {
    src: &'a RootEventSource,
    range: Range<u64>,
}

impl<'a> RootColumns<'a> {
    fn reader(&self, name: &str) -> Result<BranchReader<'a>> {
        let src = self.src;
        src.file.branch_reader(&src.tree, name).map_err(|e| self.missing(e))
    }

    fn missing(&self, e: RootError) -> Error {
        match e {
            RootError::BranchNotFound(column) => {
                Error::MissingColumn { path: self.src.path.display().to_string(), column }
            }
            other => other.into(),
        }
    }
}

impl Columns for RootColumns<'_> {
    fn has(&self, name: &str) -> bool {
        self.src.tree.has_branch(name)
    }

    fn scalar(&self, name: &str) -> Result<Vec<f64>> {
        let reader = self.reader(name)?;
        Ok(reader.read_f64(self.range.clone())?)
    }

    fn scalar_u64(&self, name: &str) -> Result<Vec<u64>> {
        let reader = self.reader(name)?;
        Ok(reader.read_u64(self.range.clone())?)
    }

    fn jagged(&self, name: &str) -> Result<JaggedCol> {
        let reader = self.reader(name)?;
        Ok(reader.read_jagged_f64(self.range.clone())?)
    }
}

impl EventSource for RootEventSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn n_entries(&self) -> u64 {
        self.tree.entries
    }

    fn read(&self, dataset: &str, range: Range<u64>, request: &ReadRequest) -> Result<EventBatch> {
        let first = range.start;
        let cols = RootColumns { src: self, range };
        assemble(&cols, dataset, first, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnalysisConfig, CollectionNaming};
    use crate::processor::create_processor;
    use hcal_core::{BinKey, Subdetector};
    use hcal_root::testutil::TreeBuilder;

    /// Above 2^53, so only an integer read keeps it exact.
    const FIRST_EVENT: u64 = (1 << 53) + 1;
    /// HB channels per event.
    const CHANNELS: [usize; 5] = [2, 1, 3, 0, 1];

    fn per_channel<T: Clone>(f: impl Fn(usize, usize) -> T) -> Vec<Vec<T>> {
        CHANNELS.iter().enumerate().map(|(i, &n)| (0..n).map(|k| f(i, k)).collect()).collect()
    }

    /// Five events in baskets of two. Channel `k` of event `i` sits at ieta `k + 1`, is
    /// invalid when `k == 1`, and carries `100 * (i + 1)` fC in slice 3 over a 1 fC pedestal.
    fn nano_source() -> RootEventSource {
        let events: Vec<u64> = (0..5).map(|i| FIRST_EVENT + i).collect();
        let mut b = TreeBuilder::new("Events", 2)
            .scalar_u32("run", &[365537; 5])
            .scalar_u64("event", &events)
            .scalar_i32("bunchCrossing", &[1, 2, 1, 2, 1])
            .scalar_u32("luminosityBlock", &[4, 4, 5, 5, 5])
            .jagged_i32("DigiHB_ieta", "nDigiHB", &per_channel(|_, k| k as i32 + 1))
            .jagged_i32("DigiHB_iphi", "nDigiHB", &per_channel(|_, _| 11))
            .jagged_i32("DigiHB_depth", "nDigiHB", &per_channel(|_, _| 1))
            .jagged_bool("DigiHB_valid", "nDigiHB", &per_channel(|_, k| k != 1));
        for ts in 0..8 {
            let fc = per_channel(|i, _| if ts == 3 { 1.0 + 100.0 * (i + 1) as f32 } else { 1.0 });
            let flat = |v: f32| per_channel(move |_, _| v);
            b = b
                .jagged_f32(&format!("DigiHB_fc{ts}"), "nDigiHB", &fc)
                .jagged_f32(&format!("DigiHB_pedestalfc{ts}"), "nDigiHB", &flat(1.0))
                .jagged_f32(&format!("DigiHB_adc{ts}"), "nDigiHB", &flat(5.0));
        }
        let file = RootFile::from_bytes(b.build(), "nano.root").unwrap();
        RootEventSource::from_file(file, "Events").unwrap()
    }

    fn hb_request() -> ReadRequest {
        ReadRequest {
            subdets: vec![Subdetector::HB],
            naming: CollectionNaming::DigiPrefix,
            tdc: true,
        }
    }

    #[test]
    fn reads_the_whole_tree() {
        let src = nano_source();
        assert_eq!(src.n_entries(), 5);
        assert_eq!(src.path(), Path::new("nano.root"));
        let batch = src.read("r365537", 0..5, &hb_request()).unwrap();
        assert_eq!(batch.event, (0..5).map(|i| FIRST_EVENT + i).collect::<Vec<_>>());
        assert_eq!(batch.run, vec![365537; 5]);
        assert_eq!(batch.bunch_crossing, vec![1, 2, 1, 2, 1]);
        assert_eq!(batch.luminosity_block, vec![4, 4, 5, 5, 5]);

        let hb = batch.digis(Subdetector::HB).unwrap();
        assert_eq!(hb.offsets, vec![0, 2, 3, 6, 6, 7]);
        assert_eq!(hb.ieta, vec![1, 2, 1, 1, 2, 3, 1]);
        assert_eq!(hb.valid, vec![true, false, true, true, false, true, true]);
        assert!(hb.tdc(0).is_none());
        assert_eq!(hb.fc(2)[3], 201.0);
        assert_eq!(hb.fc(2)[0], 1.0);
        assert_eq!(hb.adc(6), &[5.0; 8]);
    }

    #[test]
    fn reads_a_range_across_baskets() {
        let batch = nano_source().read("r365537", 1..4, &hb_request()).unwrap();
        assert_eq!(batch.first_entry, 1);
        assert_eq!(batch.event, vec![FIRST_EVENT + 1, FIRST_EVENT + 2, FIRST_EVENT + 3]);
        let hb = batch.digis(Subdetector::HB).unwrap();
        assert_eq!(hb.offsets, vec![0, 1, 4, 4]);
        assert_eq!(hb.ieta, vec![1, 1, 2, 3]);
        assert_eq!(hb.fc(3)[3], 301.0);
    }

    #[test]
    fn chunks_merge_to_the_whole_tree() {
        let src = nano_source();
        let processor = create_processor("phase_scan", &AnalysisConfig::default()).unwrap();
        let request = processor.request();
        let whole = processor.process(&src.read("r365537", 0..5, &request).unwrap()).unwrap();

        let chunk = |range: Range<u64>| {
            processor.process(&src.read("r365537", range, &request).unwrap()).unwrap()
        };
        let mut merged = chunk(3..5);
        merged.merge(chunk(0..1)).unwrap();
        merged.merge(chunk(1..3)).unwrap();
        assert_eq!(merged, whole);
        assert_eq!(whole.count("nevents"), Some(5));
        let h = whole.hist("hist_tstime_hb").unwrap();
        // valid channels: two in lumi section 4, three in 5
        assert_eq!(h.entries(), 5);
        assert_eq!(h.project("ls").unwrap()[&BinKey::Index(4)], 2.0);
        assert_eq!(h.project("ls").unwrap()[&BinKey::Index(5)], 3.0);
    }

    #[test]
    fn missing_branch_is_a_missing_column() {
        let request =
            ReadRequest { subdets: vec![Subdetector::HB, Subdetector::HE], ..hb_request() };
        match nano_source().read("r365537", 0..5, &request) {
            Err(Error::MissingColumn { path, column }) => {
                assert_eq!(path, "nano.root");
                assert_eq!(column, "DigiHE_ieta");
            }
            other => panic!("unexpected {other:?}"),
        }
        let suffixed = ReadRequest { naming: CollectionNaming::DigisSuffix, ..hb_request() };
        assert!(matches!(
            nano_source().read("r365537", 0..5, &suffixed),
            Err(Error::MissingColumn { column, .. }) if column == "HBDigis_ieta"
        ));
    }

    #[test]
    fn range_past_the_end_is_an_error() {
        assert!(nano_source().read("r365537", 3..9, &hb_request()).is_err());
    }
}
