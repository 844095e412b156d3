//! hcalanalysis CLI

mod output;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use hcal_analysis::fileset::{self, Fileset};
use hcal_analysis::processors::top_events;
use hcal_analysis::{AnalysisConfig, RunOptions, create_processor, read_analysis_config, runner};
use hcal_core::OutputSet;
use hcal_root::RootFile;

use crate::output::{read_output, write_output};

#[derive(Parser)]
#[command(name = "hcalanalysis")]
#[command(about = "Processors for CMS HCAL nanoAOD digis")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a processor over a set of input files
    Run(RunArgs),

    /// Merge saved outputs into one
    Merge {
        /// Output file (`.gz` for gzip)
        #[arg(short, long)]
        output: PathBuf,

        /// Overwrite the output file
        #[arg(short, long)]
        force: bool,

        /// Saved outputs to merge
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Events with the largest total charge, per dataset
    Top {
        /// Saved output containing `event_sumq_dict`
        output: PathBuf,

        /// Number of events to list
        #[arg(short, default_value = "20")]
        n: usize,
    },

    /// List the keys, trees and branches of a ROOT file
    Inspect {
        /// ROOT file
        file: PathBuf,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct InputArgs {
    /// Input files, comma-separated
    #[arg(short = 'i', long = "inputfiles")]
    files: Option<String>,

    /// Text file with one input file per line
    #[arg(short = 'I', long = "inputfilestxt")]
    files_txt: Option<PathBuf>,

    /// YAML mapping of dataset to input files
    #[arg(short = 'y', long = "inputfilesyaml")]
    files_yaml: Option<PathBuf>,

    /// JSON mapping of dataset to input files
    #[arg(short = 'j', long = "inputfilesjson")]
    files_json: Option<PathBuf>,
}

#[derive(Args)]
struct RunArgs {
    /// Processor name, e.g. `bx1` or `bx1processor.BX1Processor`
    processor: String,

    #[command(flatten)]
    input: InputArgs,

    /// Output file (`.gz` for gzip)
    #[arg(short, long = "outputfile")]
    output: PathBuf,

    /// Overwrite the output file
    #[arg(short, long)]
    force: bool,

    /// Dataset name for `-i`/`-I` inputs (the key in the output)
    #[arg(short, long)]
    dataset: Option<String>,

    /// Worker threads
    #[arg(short, long, default_value = "4")]
    workers: usize,

    /// Batch-job mode: plain logs without colors
    #[arg(short, long)]
    condor: bool,

    /// Entries per chunk
    #[arg(long, default_value = "250")]
    chunksize: u64,

    /// Maximum chunks per dataset
    #[arg(long)]
    maxchunks: Option<usize>,

    /// Quick test: one file per dataset, 8 chunks, overwrite the output
    #[arg(short, long)]
    quicktest: bool,

    /// Event tree name. Defaults to the config file's `tree`, else `Events`.
    #[arg(long)]
    tree: Option<String>,

    /// Analysis config (YAML, or JSON by extension)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Local mount of the EOS namespace. Defaults to the config file's `eos_mount`.
    #[arg(long)]
    eos_mount: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let plain = matches!(&cli.command, Commands::Run(args) if args.condor);
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_ansi(!plain)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => cmd_run(args),
        Commands::Merge { output, force, inputs } => cmd_merge(&output, &inputs, force),
        Commands::Top { output, n } => cmd_top(&output, n),
        Commands::Inspect { file } => cmd_inspect(&file),
    }
}

fn load_fileset(input: &InputArgs, dataset: Option<&str>) -> Result<Fileset> {
    if dataset.is_some() {
        if input.files_yaml.is_some() {
            anyhow::bail!(
                "cannot specify --dataset/-d with --inputfilesyaml/-y: dataset names come from \
                 the YAML file"
            );
        }
        if input.files_json.is_some() {
            anyhow::bail!(
                "cannot specify --dataset/-d with --inputfilesjson/-j: dataset names come from \
                 the JSON file"
            );
        }
    }
    let fs = if let Some(list) = &input.files {
        fileset::from_list(list, dataset)
    } else if let Some(path) = &input.files_txt {
        fileset::from_text_file(path, dataset)
            .with_context(|| format!("failed to read file list {}", path.display()))?
    } else if let Some(path) = &input.files_yaml {
        fileset::from_yaml_file(path)
            .with_context(|| format!("failed to read fileset {}", path.display()))?
    } else if let Some(path) = &input.files_json {
        fileset::from_json_file(path)
            .with_context(|| format!("failed to read fileset {}", path.display()))?
    } else {
        anyhow::bail!("no input files given");
    };
    Ok(fs)
}

fn ensure_writable(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "output file {} already exists. Specify -f/--force to overwrite.",
            path.display()
        );
    }
    Ok(())
}

fn cmd_run(args: RunArgs) -> Result<()> {
    let mut fileset = load_fileset(&args.input, args.dataset.as_deref())?;
    let force = args.force || args.quicktest;
    let max_chunks = if args.quicktest {
        fileset::truncate_files(&mut fileset, 1);
        // at least two chunks so merging is exercised
        Some(8)
    } else {
        args.maxchunks
    };

    println!("Input fileset:");
    println!("{}", serde_json::to_string_pretty(&fileset)?);

    ensure_writable(&args.output, force)?;

    let config = match &args.config {
        Some(path) => read_analysis_config(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    let processor = create_processor(&args.processor, &config)?;
    let opts = RunOptions {
        workers: args.workers,
        chunk_size: args.chunksize,
        max_chunks,
        tree: args.tree.unwrap_or_else(|| config.tree.clone()),
        eos_mount: args.eos_mount.unwrap_or_else(|| config.eos_mount.clone()),
    };

    let (output, stats) = runner::run(&fileset, processor.as_ref(), &opts)
        .with_context(|| format!("processor '{}' failed", processor.name()))?;
    write_output(&args.output, &output)?;

    print_performance(&output, stats.elapsed.as_secs_f64());
    if processor.name() == "splash_finder" {
        print_top(&output, 20);
    }
    Ok(())
}

fn print_performance(output: &OutputSet, seconds: f64) {
    let counts: Option<Vec<u64>> = output.datasets().map(|(_, o)| o.count("nevents")).collect();
    match counts {
        Some(counts) if !counts.is_empty() => {
            let total: u64 = counts.iter().sum();
            let rate = if seconds > 0.0 { total as f64 / seconds } else { 0.0 };
            println!("Processor performance:");
            println!("\t{total} events");
            println!("\t{seconds:.3} s");
            println!("\t{rate:.3} Hz");
        }
        _ => println!(
            "Can't compute processor benchmarks. Create an int `nevents` in the output to enable."
        ),
    }
}

/// Print the top events of every dataset that has `event_sumq_dict`. Returns the number
/// of such datasets.
fn print_top(output: &OutputSet, n: usize) -> usize {
    let mut shown = 0;
    for (dataset, out) in output.datasets() {
        let Some(sums) = out.event_map("event_sumq_dict") else { continue };
        shown += 1;
        println!("{dataset}: {} events", sums.len());
        for (event, q) in top_events(sums, n) {
            println!("\t{event}\t{q:.1}");
        }
    }
    shown
}

fn cmd_merge(output: &Path, inputs: &[PathBuf], force: bool) -> Result<()> {
    ensure_writable(output, force)?;
    let mut merged = OutputSet::new();
    for input in inputs {
        let part = read_output(input)?;
        merged.merge(part).with_context(|| format!("failed to merge {}", input.display()))?;
        tracing::info!(path = %input.display(), "merged");
    }
    write_output(output, &merged)
}

fn cmd_top(path: &Path, n: usize) -> Result<()> {
    let output = read_output(path)?;
    if print_top(&output, n) == 0 {
        anyhow::bail!("{} has no event_sumq_dict", path.display());
    }
    Ok(())
}

fn cmd_inspect(path: &Path) -> Result<()> {
    let file = RootFile::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let keys = file.list_keys()?;
    println!("{}: {} keys", path.display(), keys.len());
    for key in &keys {
        println!("{};{}\t{}", key.name, key.cycle, key.class_name);
    }
    for key in keys.iter().filter(|k| k.class_name == "TTree") {
        let tree = file.get_tree(&key.name)?;
        println!();
        println!("{}: {} entries, {} branches", tree.name, tree.entries, tree.branches.len());
        for b in &tree.branches {
            let kind = b.leaf_type.map(|t| format!("{t:?}")).unwrap_or_else(|| "?".to_string());
            println!("\t{}\t{}\t{}", b.name, kind, b.leaf_title);
        }
    }
    Ok(())
}
