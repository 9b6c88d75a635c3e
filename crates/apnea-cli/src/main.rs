use anyhow::{Context, Result};
use apnea_lib::{
    config::{DataSpec, PrepConfig, RecordFormat},
    dataset::{read_record_list, DatasetBuilder, RecordErrorPolicy},
    extract::{ExtractionReport, WindowConfig},
    io::dataset::{write_split, SplitSummary},
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "apnea",
    version,
    about = "Cut quality-gated ECG windows around apnea annotations"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum FormatArg {
    #[value(name = "wfdb")]
    Wfdb,
    #[value(name = "text")]
    Text,
}

impl From<FormatArg> for RecordFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Wfdb => RecordFormat::Wfdb,
            FormatArg::Text => RecordFormat::Text,
        }
    }
}

/// Where records live and how windows are cut.
#[derive(Args, Clone, Debug)]
struct SourceArgs {
    /// Directory holding the records
    #[arg(long, default_value = ".")]
    root: PathBuf,
    #[arg(long, value_enum, default_value = "wfdb")]
    format: FormatArg,
    /// Extension of the annotation files next to each record
    #[arg(long, default_value = "apn")]
    annotation_extension: String,
    /// Sampling rate of text records (Hz)
    #[arg(long, default_value_t = 100)]
    text_fs: u32,
    /// Half-width of each window (seconds)
    #[arg(long, default_value_t = 60)]
    radius_s: u32,
    /// Windows with a lower mean quality are dropped
    #[arg(long, default_value_t = 0.5)]
    quality_threshold: f64,
}

impl SourceArgs {
    fn to_config(&self) -> PrepConfig {
        PrepConfig {
            window: WindowConfig {
                radius_s: self.radius_s,
                quality_threshold: self.quality_threshold,
            },
            data: DataSpec {
                root: self.root.clone(),
                format: self.format.into(),
                annotation_extension: self.annotation_extension.clone(),
                text_fs: self.text_fs,
            },
            ..PrepConfig::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Extract windows for a single record and print the result as JSON
    Extract {
        #[arg(long)]
        record: String,
        #[command(flatten)]
        source: SourceArgs,
        /// Include the per-window outcome list
        #[arg(long)]
        report: bool,
    },
    /// Build one dataset split from a record list and write it to disk
    Build {
        /// Record list, one identifier per line
        #[arg(long)]
        records: PathBuf,
        #[arg(long, default_value = "train")]
        split: String,
        #[arg(long, default_value = "out")]
        out: PathBuf,
        #[command(flatten)]
        source: SourceArgs,
        /// Worker threads (0 = one per core)
        #[arg(long, default_value_t = 1)]
        jobs: usize,
        /// Log and skip unreadable records instead of aborting
        #[arg(long)]
        skip_failed: bool,
    },
    /// Build every split declared in a TOML config
    Prepare {
        #[arg(long)]
        config: PathBuf,
    },
}

#[derive(Serialize)]
struct ExtractOutput {
    record: String,
    rows: usize,
    width: usize,
    labels: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<ExtractionReport>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Extract {
            record,
            source,
            report,
        } => cmd_extract(&record, &source, report)?,
        Commands::Build {
            records,
            split,
            out,
            source,
            jobs,
            skip_failed,
        } => {
            let mut cfg = source.to_config();
            cfg.build.jobs = jobs;
            if skip_failed {
                cfg.build.on_record_error = RecordErrorPolicy::Skip;
            }
            cfg.validate()?;
            let summary = build_split(&cfg, &split, &records, &out)?;
            println!("{}", serde_json::to_string(&summary)?);
        }
        Commands::Prepare { config } => cmd_prepare(&config)?,
    }
    Ok(())
}

fn cmd_extract(record: &str, source: &SourceArgs, with_report: bool) -> Result<()> {
    let cfg = source.to_config();
    cfg.validate()?;
    let extractor = cfg.data.extractor(cfg.window);
    let windows = extractor
        .extract_with_report(record)
        .with_context(|| format!("extraction failed for {}", record))?;
    let output = ExtractOutput {
        record: record.to_string(),
        rows: windows.split.signals.rows(),
        width: windows.split.signals.width(),
        labels: windows.split.labels,
        report: with_report.then_some(windows.report),
    };
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

fn build_split(cfg: &PrepConfig, name: &str, records: &Path, out: &Path) -> Result<SplitSummary> {
    let ids = read_record_list(records)?;
    info!("building split {} from {} records", name, ids.len());
    let extractor = cfg.data.extractor(cfg.window);
    let built = DatasetBuilder::new(&extractor)
        .jobs(cfg.build.jobs)
        .on_record_error(cfg.build.on_record_error)
        .build(&ids)
        .with_context(|| format!("failed to build split {}", name))?;
    write_split(out, name, &built)
}

fn cmd_prepare(path: &Path) -> Result<()> {
    let cfg = PrepConfig::load(path)?;
    if cfg.splits.is_empty() {
        anyhow::bail!("{} declares no [[splits]]", path.display());
    }
    let mut summaries = Vec::with_capacity(cfg.splits.len());
    for split in &cfg.splits {
        summaries.push(build_split(&cfg, &split.name, &split.records, &cfg.output.dir)?);
    }
    println!("{}", serde_json::to_string(&summaries)?);
    Ok(())
}
