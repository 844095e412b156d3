//! Saved run outputs: one JSON document, gzip-compressed when the path ends in `.gz`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use hcal_core::OutputSet;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

fn is_gzip_path(path: &Path) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case("gz"))
}

pub fn write_output(path: &Path, output: &OutputSet) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    if is_gzip_path(path) {
        let mut gz = GzEncoder::new(writer, Compression::default());
        serde_json::to_writer(&mut gz, output)?;
        gz.finish()?.flush()?;
    } else {
        serde_json::to_writer(&mut writer, output)?;
        writer.flush()?;
    }
    tracing::info!(path = %path.display(), datasets = output.len(), "output written");
    Ok(())
}

/// Read an output file; compression is detected from the content, not the name.
pub fn read_output(path: &Path) -> Result<OutputSet> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let parsed: serde_json::Result<OutputSet> = if bytes.starts_with(&GZIP_MAGIC) {
        serde_json::from_reader(GzDecoder::new(bytes.as_slice()))
    } else {
        serde_json::from_slice(&bytes)
    };
    parsed.with_context(|| format!("{} is not a saved output", path.display()))
}
