//! Integration tests against a real HCAL nanoAOD file.
//!
//! Point `HCAL_NANO_FIXTURE` at a nanoAOD file with HB digis, or drop one at
//! `tests/fixtures/nano_digis.root` in the workspace. Tests are skipped otherwise.

use std::path::PathBuf;

use hcal_root::{LeafType, RootFile};

fn fixture() -> Option<PathBuf> {
    let path = std::env::var_os("HCAL_NANO_FIXTURE").map(PathBuf::from).unwrap_or_else(|| {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../tests/fixtures/nano_digis.root")
    });
    if path.exists() {
        Some(path)
    } else {
        eprintln!("Fixture not found at {}; skipping", path.display());
        None
    }
}

#[test]
fn events_tree_has_digi_branches() {
    let Some(path) = fixture() else { return };
    let f = RootFile::open(&path).expect("open");
    let tree = f.get_tree("Events").expect("Events tree");
    assert!(tree.entries > 0);
    for name in ["run", "event", "bunchCrossing", "luminosityBlock", "nDigiHB", "DigiHB_fc0"] {
        assert!(tree.has_branch(name), "missing branch {name}");
    }
    let valid = tree.find_branch("DigiHB_valid").expect("DigiHB_valid");
    assert_eq!(valid.leaf_type, Some(LeafType::Bool));
    assert!(valid.is_jagged());
}

#[test]
fn jagged_counts_match_counter_branch() {
    let Some(path) = fixture() else { return };
    let f = RootFile::open(&path).expect("open");
    let tree = f.get_tree("Events").expect("Events tree");
    let n = tree.entries.min(50);

    let counts = f.branch_reader(&tree, "nDigiHB").unwrap().read_f64(0..n).unwrap();
    let fc0 = f.branch_reader(&tree, "DigiHB_fc0").unwrap().read_jagged_f64(0..n).unwrap();
    assert_eq!(fc0.n_entries(), n as usize);
    for (row, (c, expected)) in fc0.counts().zip(&counts).enumerate() {
        assert_eq!(c as f64, *expected, "row {row}");
    }
}

#[test]
fn chunked_reads_concatenate_to_full_read() {
    let Some(path) = fixture() else { return };
    let f = RootFile::open(&path).expect("open");
    let tree = f.get_tree("Events").expect("Events tree");
    let n = tree.entries.min(40);
    let reader = f.branch_reader(&tree, "DigiHB_ieta").unwrap();

    let full = reader.read_jagged_f64(0..n).unwrap();
    let mut flat = Vec::new();
    let mut start = 0;
    while start < n {
        let end = (start + 7).min(n);
        flat.extend(reader.read_jagged_f64(start..end).unwrap().flat);
        start = end;
    }
    assert_eq!(flat, full.flat);
}
