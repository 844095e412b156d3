//! Synthetic ROOT files for tests.
//!
//! [`TreeBuilder`] writes a small uncompressed file holding one `TTree`. Every branch is
//! split into baskets of `basket_entries` entries so range reads cross basket borders.
//!
//! ```
//! use hcal_root::RootFile;
//! use hcal_root::testutil::TreeBuilder;
//!
//! let bytes = TreeBuilder::new("Events", 3)
//!     .scalar_u32("run", &[7, 7, 8])
//!     .jagged_f32("DigiHB_fc0", "nDigiHB", &[vec![1.5, 2.5], vec![], vec![4.0]])
//!     .build();
//! let f = RootFile::from_bytes(bytes, "events.root").unwrap();
//! assert_eq!(f.get_tree("Events").unwrap().entries, 3);
//! ```

use crate::basket::encode_basket;
use crate::key::encode_key;
use crate::ttree::writer::{BranchSpec, Writer};

const BEGIN: usize = 100;
const NBYTES_NAME: usize = 50;
const HEADER_SPACE: usize = 200;

struct Column {
    name: String,
    leaf_class: &'static str,
    leaf_title: String,
    unsigned: bool,
    jagged: bool,
    /// Big-endian bytes of each entry.
    entries: Vec<Vec<u8>>,
}

/// Builder for a one-tree ROOT file.
pub struct TreeBuilder {
    tree: String,
    basket_entries: usize,
    columns: Vec<Column>,
}

impl TreeBuilder {
    /// A tree called `tree` whose baskets hold `basket_entries` entries each.
    pub fn new(tree: &str, basket_entries: usize) -> Self {
        Self { tree: tree.to_string(), basket_entries: basket_entries.max(1), columns: Vec::new() }
    }

    fn scalar<const N: usize>(
        mut self,
        name: &str,
        leaf_class: &'static str,
        code: char,
        unsigned: bool,
        values: impl Iterator<Item = [u8; N]>,
    ) -> Self {
        self.columns.push(Column {
            name: name.to_string(),
            leaf_class,
            leaf_title: format!("{name}/{code}"),
            unsigned,
            jagged: false,
            entries: values.map(|b| b.to_vec()).collect(),
        });
        self
    }

    fn jagged<T: Copy, const N: usize>(
        mut self,
        name: &str,
        count: &str,
        leaf_class: &'static str,
        code: char,
        rows: &[Vec<T>],
        bytes: impl Fn(T) -> [u8; N],
    ) -> Self {
        self.columns.push(Column {
            name: name.to_string(),
            leaf_class,
            leaf_title: format!("{name}[{count}]/{code}"),
            unsigned: false,
            jagged: true,
            entries: rows.iter().map(|r| r.iter().flat_map(|&v| bytes(v)).collect()).collect(),
        });
        self
    }

    /// `UInt_t` branch.
    pub fn scalar_u32(self, name: &str, values: &[u32]) -> Self {
        self.scalar(name, "TLeafI", 'i', true, values.iter().map(|v| v.to_be_bytes()))
    }

    /// `ULong64_t` branch.
    pub fn scalar_u64(self, name: &str, values: &[u64]) -> Self {
        self.scalar(name, "TLeafL", 'l', true, values.iter().map(|v| v.to_be_bytes()))
    }

    /// `Int_t` branch.
    pub fn scalar_i32(self, name: &str, values: &[i32]) -> Self {
        self.scalar(name, "TLeafI", 'I', false, values.iter().map(|v| v.to_be_bytes()))
    }

    /// `Float_t` array branch counted by `count`.
    pub fn jagged_f32(self, name: &str, count: &str, rows: &[Vec<f32>]) -> Self {
        self.jagged(name, count, "TLeafF", 'F', rows, f32::to_be_bytes)
    }

    /// `Int_t` array branch counted by `count`.
    pub fn jagged_i32(self, name: &str, count: &str, rows: &[Vec<i32>]) -> Self {
        self.jagged(name, count, "TLeafI", 'I', rows, i32::to_be_bytes)
    }

    /// `Bool_t` array branch counted by `count`.
    pub fn jagged_bool(self, name: &str, count: &str, rows: &[Vec<bool>]) -> Self {
        self.jagged(name, count, "TLeafO", 'O', rows, |v| [u8::from(v)])
    }

    /// Serialize the file.
    pub fn build(self) -> Vec<u8> {
        let n_entries = self.columns.iter().map(|c| c.entries.len()).max().unwrap_or(0);
        let mut file = vec![0u8; HEADER_SPACE];

        let mut baskets: Vec<Vec<(i64, i64)>> = Vec::with_capacity(self.columns.len());
        for col in &self.columns {
            let mut spans = Vec::new();
            for (i, chunk) in col.entries.chunks(self.basket_entries).enumerate() {
                let seek = file.len();
                let data: Vec<u8> = chunk.concat();
                let sizes: Vec<usize> = chunk.iter().map(Vec::len).collect();
                let offsets = col.jagged.then_some(sizes.as_slice());
                file.extend(encode_basket(seek as u32, &data, offsets, chunk.len()));
                spans.push(((i * self.basket_entries) as i64, seek as i64));
            }
            baskets.push(spans);
        }

        let specs: Vec<BranchSpec<'_>> = self
            .columns
            .iter()
            .zip(baskets)
            .map(|(col, spans)| BranchSpec {
                name: &col.name,
                leaf_class: col.leaf_class,
                leaf_title: &col.leaf_title,
                unsigned: col.unsigned,
                entry_offset_len: if col.jagged { 40 } else { 0 },
                entries: col.entries.len() as i64,
                baskets: spans,
            })
            .collect();
        let key_len = encode_key("TTree", &self.tree, 0, 0, 0, &[]).len();
        let mut w = Writer::new(key_len);
        w.tree(&self.tree, n_entries as i64, &specs);

        let tree_seek = file.len() as u32;
        let n = w.buf.len() as u32;
        let tree_key = encode_key("TTree", &self.tree, tree_seek, n, n, &[]);
        file.extend_from_slice(&tree_key);
        file.extend(w.buf);

        let seek_keys = file.len() as u32;
        file.extend(encode_key("TFile", "test.root", seek_keys, 0, 0, &[]));
        file.extend_from_slice(&1u32.to_be_bytes());
        file.extend_from_slice(&tree_key);

        let end = file.len() as u32;
        let mut header = Vec::new();
        header.extend_from_slice(b"root");
        for v in [62206u32, BEGIN as u32, end, 0, 0, 0, NBYTES_NAME as u32] {
            header.extend_from_slice(&v.to_be_bytes());
        }
        file[..header.len()].copy_from_slice(&header);

        let mut dir = Vec::new();
        dir.extend_from_slice(&5u16.to_be_bytes());
        for v in [0u32, 0, 0, NBYTES_NAME as u32, BEGIN as u32, 0, seek_keys] {
            dir.extend_from_slice(&v.to_be_bytes());
        }
        let at = BEGIN + NBYTES_NAME;
        file[at..at + dir.len()].copy_from_slice(&dir);
        file
    }
}
