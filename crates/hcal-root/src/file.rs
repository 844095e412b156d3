//! `TFile` header parsing and the top-level file interface.

use std::fs;
use std::path::{Path, PathBuf};

use crate::branch_reader::BranchReader;
use crate::datasource::DataSource;
use crate::error::{Result, RootError};
use crate::key::{Directory, KeyInfo};
use crate::rbuffer::RBuffer;
use crate::tree::Tree;
use crate::ttree::read_ttree;

const ROOT_MAGIC: &[u8; 4] = b"root";

#[derive(Debug, Clone, Copy)]
struct FileHeader {
    /// `fVersion >= 1000000`: 64-bit seek pointers.
    is_large: bool,
    /// Location of the top directory's key list.
    seek_keys: u64,
}

impl FileHeader {
    /// Parse the fixed header, then the top `TDirectory` at `fBEGIN + fNbytesName`.
    fn parse(data: &[u8]) -> Result<Self> {
        let mut r = RBuffer::at(data, 4);
        let version = r.read_u32()?;
        let is_large = version >= 1_000_000;
        let begin = r.read_u32()? as usize;
        r.skip(if is_large { 16 } else { 8 })?; // fEND, fSeekFree
        let _nbytes_free = r.read_u32()?;
        let _nfree = r.read_u32()?;
        let nbytes_name = r.read_u32()? as usize;

        let mut d = RBuffer::at(data, begin + nbytes_name);
        let dir_version = d.read_u16()?;
        let _ctime = d.read_u32()?;
        let _mtime = d.read_u32()?;
        let _nbytes_keys = d.read_u32()?;
        let _nbytes_name = d.read_u32()?;
        let seek_keys = if dir_version > 1000 {
            d.skip(16)?; // fSeekDir, fSeekParent
            d.read_u64()?
        } else {
            d.skip(8)?;
            u64::from(d.read_u32()?)
        };
        log::debug!("ROOT file version {version}, keys at {seek_keys}");
        Ok(Self { is_large, seek_keys })
    }
}

/// A ROOT file opened for reading trees.
pub struct RootFile {
    data: DataSource,
    header: FileHeader,
    path: PathBuf,
}

impl RootFile {
    /// Memory-map and parse a file on disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = fs::File::open(&path)?;
        Self::from_source(DataSource::map(&file)?, path)
    }

    /// Parse a file held in memory.
    pub fn from_bytes(data: Vec<u8>, path: impl Into<PathBuf>) -> Result<Self> {
        Self::from_source(DataSource::Owned(data), path.into())
    }

    fn from_source(data: DataSource, path: PathBuf) -> Result<Self> {
        if data.len() < 64 || &data[..4] != ROOT_MAGIC {
            return Err(RootError::BadMagic);
        }
        let header = FileHeader::parse(&data)?;
        Ok(Self { data, header, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn top_directory(&self) -> Result<Directory> {
        Directory::read(&self.data, self.header.seek_keys, self.header.is_large)
    }

    /// Keys of the top-level directory.
    pub fn list_keys(&self) -> Result<Vec<KeyInfo>> {
        Ok(self.top_directory()?.keys().iter().map(KeyInfo::from).collect())
    }

    /// Read the tree `name` from the top-level directory.
    pub fn get_tree(&self, name: &str) -> Result<Tree> {
        let dir = self.top_directory()?;
        let key = dir.find(name).ok_or_else(|| RootError::TreeNotFound(name.to_string()))?;
        if key.class_name != "TTree" {
            return Err(RootError::TreeNotFound(format!("'{name}' is a {}", key.class_name)));
        }
        let payload = key.payload(&self.data)?;
        read_ttree(&payload, usize::from(key.key_len))
    }

    /// Reader for `branch` of `tree`.
    pub fn branch_reader<'a>(&'a self, tree: &'a Tree, branch: &str) -> Result<BranchReader<'a>> {
        let info = tree
            .find_branch(branch)
            .ok_or_else(|| RootError::BranchNotFound(branch.to_string()))?;
        Ok(BranchReader::new(&self.data, info, self.header.is_large))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TreeBuilder;

    /// `run` = [7, 7, 8]; `DigiHB_fc0` = [[1.5, 2.5], [], [4.0]]; one basket per branch.
    fn events_file() -> Vec<u8> {
        TreeBuilder::new("Events", 3)
            .scalar_u32("run", &[7, 7, 8])
            .jagged_f32("DigiHB_fc0", "nDigiHB", &[vec![1.5, 2.5], vec![], vec![4.0]])
            .build()
    }

    #[test]
    fn rejects_non_root_bytes() {
        assert!(matches!(RootFile::from_bytes(vec![0; 128], "x"), Err(RootError::BadMagic)));
    }

    #[test]
    fn reads_tree_and_branches() {
        let f = RootFile::from_bytes(events_file(), "events.root").unwrap();
        let keys = f.list_keys().unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].class_name, "TTree");

        let tree = f.get_tree("Events").unwrap();
        assert_eq!(tree.entries, 3);
        assert_eq!(f.branch_reader(&tree, "run").unwrap().as_f64().unwrap(), vec![7.0, 7.0, 8.0]);

        let fc = f.branch_reader(&tree, "DigiHB_fc0").unwrap().read_jagged_f64(0..3).unwrap();
        assert_eq!(fc.offsets, vec![0, 2, 2, 3]);
        assert_eq!(fc.flat, vec![1.5, 2.5, 4.0]);

        assert!(matches!(f.branch_reader(&tree, "DigiHE_fc0"), Err(RootError::BranchNotFound(_))));
        assert!(matches!(f.get_tree("Runs"), Err(RootError::TreeNotFound(_))));
    }

    #[test]
    fn ranges_cross_basket_borders() {
        let rows: Vec<Vec<f32>> = (0..7).map(|i| vec![i as f32; i % 3]).collect();
        let flags: Vec<Vec<bool>> = rows.iter().map(|r| vec![true; r.len()]).collect();
        let bytes = TreeBuilder::new("Events", 2)
            .scalar_u64("event", &[10, 11, 12, 13, 14, 15, 16])
            .jagged_f32("DigiHB_fc0", "nDigiHB", &rows)
            .jagged_bool("DigiHB_valid", "nDigiHB", &flags)
            .build();
        let f = RootFile::from_bytes(bytes, "events.root").unwrap();
        let tree = f.get_tree("Events").unwrap();
        assert_eq!(tree.entries, 7);
        let event = f.branch_reader(&tree, "event").unwrap();
        assert_eq!(event.branch().n_baskets(), 4);
        assert_eq!(event.read_u64(3..6).unwrap(), vec![13, 14, 15]);

        let fc = f.branch_reader(&tree, "DigiHB_fc0").unwrap().read_jagged_f64(1..6).unwrap();
        assert_eq!(fc.counts().collect::<Vec<_>>(), vec![1, 2, 0, 1, 2]);
        assert_eq!(fc.row(4), &[5.0, 5.0]);
        let valid = f.branch_reader(&tree, "DigiHB_valid").unwrap().read_jagged_f64(5..7).unwrap();
        assert_eq!(valid.flat, vec![1.0, 1.0]);
    }
}
