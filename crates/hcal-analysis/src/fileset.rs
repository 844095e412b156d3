//! Input file lists.
//!
//! A [`Fileset`] maps dataset names to input files. File names are normalized so that
//! EOS paths in their `/eos/cms/store/...` or `/store/...` spellings become
//! `root://eoscms.cern.ch//store/...`; [`resolve_local`] then maps those URLs onto a
//! locally mounted EOS namespace, since no XRootD client is available.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Dataset name to input files.
pub type Fileset = BTreeMap<String, Vec<String>>;

/// Dataset used when none is given for a plain file list.
pub const DEFAULT_DATASET: &str = "default";

/// The CERN EOS redirector.
pub const EOS_REDIRECTOR: &str = "root://eoscms.cern.ch/";

/// Rewrite EOS paths to redirector URLs. Other names are returned unchanged.
pub fn normalize_path(name: &str) -> String {
    let name = name.trim();
    if let Some(rest) = name.strip_prefix("/eos/cms/store") {
        format!("{EOS_REDIRECTOR}/store{rest}")
    } else if let Some(rest) = name.strip_prefix("/store") {
        format!("{EOS_REDIRECTOR}/store{rest}")
    } else {
        name.to_string()
    }
}

/// Map a (normalized) file name to a path on disk.
///
/// Redirector URLs resolve under `eos_mount`; any other remote URL is an error.
pub fn resolve_local(name: &str, eos_mount: &Path) -> Result<PathBuf> {
    if let Some(rest) = name.strip_prefix(EOS_REDIRECTOR) {
        let rest = rest.trim_start_matches('/');
        let rest = rest.strip_prefix("eos/cms/").unwrap_or(rest);
        return Ok(eos_mount.join(rest));
    }
    if name.contains("://") {
        return Err(Error::Input(format!(
            "cannot open remote file '{name}': only {EOS_REDIRECTOR} URLs backed by a local \
             mount are supported"
        )));
    }
    Ok(PathBuf::from(name))
}

fn dataset_or_default(dataset: Option<&str>) -> String {
    match dataset {
        Some(d) => d.to_string(),
        None => {
            tracing::warn!("no dataset name given, using '{DEFAULT_DATASET}'");
            DEFAULT_DATASET.to_string()
        }
    }
}

fn single(dataset: Option<&str>, files: Vec<String>) -> Fileset {
    let mut fs = Fileset::new();
    fs.insert(dataset_or_default(dataset), files);
    fs
}

/// Comma-separated list of files.
pub fn from_list(list: &str, dataset: Option<&str>) -> Fileset {
    let files =
        list.split(',').map(str::trim).filter(|f| !f.is_empty()).map(normalize_path).collect();
    single(dataset, files)
}

/// One file per line; blank lines are ignored.
pub fn from_text_file(path: &Path, dataset: Option<&str>) -> Result<Fileset> {
    let text = std::fs::read_to_string(path)?;
    let files =
        text.lines().map(str::trim).filter(|l| !l.is_empty()).map(normalize_path).collect();
    Ok(single(dataset, files))
}

/// YAML mapping of dataset to file list.
pub fn from_yaml_file(path: &Path) -> Result<Fileset> {
    let fs: Fileset = serde_yaml_ng::from_slice(&std::fs::read(path)?)?;
    Ok(normalize(fs))
}

/// JSON mapping of dataset to file list.
pub fn from_json_file(path: &Path) -> Result<Fileset> {
    let fs: Fileset = serde_json::from_slice(&std::fs::read(path)?)?;
    Ok(normalize(fs))
}

fn normalize(fs: Fileset) -> Fileset {
    fs.into_iter()
        .map(|(dataset, files)| (dataset, files.iter().map(|f| normalize_path(f)).collect()))
        .collect()
}

/// Keep the first `n` files of every dataset.
pub fn truncate_files(fs: &mut Fileset, n: usize) {
    for files in fs.values_mut() {
        files.truncate(n);
    }
}
