//! Chunked, parallel execution of a processor over a fileset.
//!
//! Every input file is split into entry ranges of at most `chunk_size` entries. Chunks
//! are independent: each is read, processed and turned into a one-dataset
//! [`OutputSet`], and the chunk results are reduced with [`OutputSet::merge`] in
//! whatever order the thread pool finishes them.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use hcal_core::OutputSet;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::fileset::{Fileset, resolve_local};
use crate::processor::Processor;
use crate::source::{EventSource, open_source};

/// Execution settings.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Thread pool size; 0 uses the global pool.
    pub workers: usize,
    pub chunk_size: u64,
    /// Per dataset; `None` processes everything.
    pub max_chunks: Option<usize>,
    pub tree: String,
    pub eos_mount: PathBuf,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            chunk_size: 250,
            max_chunks: None,
            tree: "Events".to_string(),
            eos_mount: PathBuf::from("/eos/cms"),
        }
    }
}

/// One unit of work: an entry range of one file.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub dataset: String,
    /// Index into the opened files.
    pub file: usize,
    pub range: Range<u64>,
}

/// Summary of a finished run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunStats {
    pub files: usize,
    pub chunks: usize,
    pub events: u64,
    pub elapsed: Duration,
}

impl RunStats {
    /// Events per second.
    pub fn rate_hz(&self) -> f64 {
        let s = self.elapsed.as_secs_f64();
        if s > 0.0 { self.events as f64 / s } else { 0.0 }
    }
}

/// Split files into chunks. `files` holds `(dataset, entries)` per opened file, in order.
pub fn plan_chunks(
    files: &[(String, u64)],
    chunk_size: u64,
    max_chunks: Option<usize>,
) -> Vec<WorkItem> {
    let chunk_size = chunk_size.max(1);
    let mut per_dataset = std::collections::HashMap::<&str, usize>::new();
    let mut items = Vec::new();
    for (file, (dataset, entries)) in files.iter().enumerate() {
        let mut start = 0;
        while start < *entries {
            let n = per_dataset.entry(dataset.as_str()).or_default();
            if max_chunks.is_some_and(|max| *n >= max) {
                break;
            }
            *n += 1;
            let end = (start + chunk_size).min(*entries);
            items.push(WorkItem { dataset: dataset.clone(), file, range: start..end });
            start = end;
        }
    }
    items
}

/// Open every file of `fileset`, in dataset order.
fn open_all(fileset: &Fileset, opts: &RunOptions) -> Result<Vec<(String, Box<dyn EventSource>)>> {
    let mut sources = Vec::new();
    for (dataset, files) in fileset {
        for name in files {
            let path = resolve_local(name, &opts.eos_mount)?;
            let source = open_source(&path, &opts.tree).map_err(|e| match e {
                Error::MissingColumn { .. } => e,
                other => Error::Input(format!("cannot open {}: {other}", path.display())),
            })?;
            tracing::info!(
                dataset = %dataset,
                path = %path.display(),
                entries = source.n_entries(),
                "input file"
            );
            sources.push((dataset.clone(), source));
        }
    }
    Ok(sources)
}

fn process_chunk(
    processor: &dyn Processor,
    source: &dyn EventSource,
    item: &WorkItem,
) -> Result<OutputSet> {
    let batch = source.read(&item.dataset, item.range.clone(), &processor.request())?;
    let output = processor.process(&batch)?;
    tracing::debug!(
        dataset = %item.dataset,
        path = %source.path().display(),
        start = item.range.start,
        end = item.range.end,
        "chunk done"
    );
    let mut set = OutputSet::new();
    set.add(&item.dataset, output)?;
    Ok(set)
}

fn chunk_error(path: &Path, item: &WorkItem, e: Error) -> Error {
    tracing::error!(path = %path.display(), range = ?item.range, error = %e, "chunk failed");
    e
}

/// Run `processor` over `fileset`.
pub fn run(
    fileset: &Fileset,
    processor: &dyn Processor,
    opts: &RunOptions,
) -> Result<(OutputSet, RunStats)> {
    let start = Instant::now();
    let sources = open_all(fileset, opts)?;
    let entries: Vec<(String, u64)> =
        sources.iter().map(|(d, s)| (d.clone(), s.n_entries())).collect();
    let items = plan_chunks(&entries, opts.chunk_size, opts.max_chunks);
    tracing::info!(
        processor = processor.name(),
        files = sources.len(),
        chunks = items.len(),
        workers = opts.workers,
        "starting run"
    );

    let run_items = || -> Result<OutputSet> {
        items
            .par_iter()
            .map(|item| {
                let source = sources[item.file].1.as_ref();
                process_chunk(processor, source, item)
                    .map_err(|e| chunk_error(source.path(), item, e))
            })
            .try_reduce(OutputSet::new, |mut a, b| {
                a.merge(b)?;
                Ok(a)
            })
    };
    let output = if opts.workers > 0 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(opts.workers)
            .build()
            .map_err(|e| Error::Execution(format!("failed to create thread pool: {e}")))?;
        pool.install(run_items)?
    } else {
        run_items()?
    };

    let events = items.iter().map(|i| i.range.end - i.range.start).sum();
    let stats =
        RunStats { files: sources.len(), chunks: items.len(), events, elapsed: start.elapsed() };
    tracing::info!(events = stats.events, seconds = stats.elapsed.as_secs_f64(), "run complete");
    Ok((output, stats))
}
