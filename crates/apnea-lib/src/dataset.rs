use crate::{
    error::{DatasetError, RecordError},
    extract::{ExtractionReport, RecordWindows},
};
use anyhow::{Context, Result};
use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Row-major matrix of equally long windows.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalMatrix {
    width: usize,
    data: Vec<f64>,
}

impl SignalMatrix {
    /// A matrix with no rows yet whose rows will hold `width` samples.
    pub fn empty(width: usize) -> Self {
        Self {
            width,
            data: Vec::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn rows(&self) -> usize {
        if self.width == 0 {
            0
        } else {
            self.data.len() / self.width
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn row(&self, index: usize) -> &[f64] {
        &self.data[index * self.width..(index + 1) * self.width]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks_exact panics on zero; a zero-width matrix never holds data
        self.data.chunks_exact(self.width.max(1))
    }

    pub fn push_row(&mut self, row: Vec<f64>) -> Result<(), DatasetError> {
        if row.len() != self.width || self.width == 0 {
            return Err(DatasetError::WidthMismatch {
                expected: self.width,
                actual: row.len(),
            });
        }
        self.data.extend(row);
        Ok(())
    }

    /// Append all rows of `other`. A matrix without rows takes over the other's width.
    pub fn append(&mut self, other: SignalMatrix) -> Result<(), DatasetError> {
        if self.is_empty() {
            *self = other;
            return Ok(());
        }
        if other.is_empty() {
            return Ok(());
        }
        if other.width != self.width {
            return Err(DatasetError::WidthMismatch {
                expected: self.width,
                actual: other.width,
            });
        }
        self.data.extend(other.data);
        Ok(())
    }
}

/// Signal rows and labels, aligned one to one.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSplit {
    pub signals: SignalMatrix,
    pub labels: Vec<u8>,
}

impl DatasetSplit {
    pub fn new(signals: SignalMatrix, labels: Vec<u8>) -> Result<Self, DatasetError> {
        if signals.rows() != labels.len() {
            return Err(DatasetError::Misaligned {
                rows: signals.rows(),
                labels: labels.len(),
            });
        }
        Ok(Self { signals, labels })
    }

    pub fn empty(width: usize) -> Self {
        Self {
            signals: SignalMatrix::empty(width),
            labels: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Append another split's rows and labels after this one's.
    pub fn concat(&mut self, other: DatasetSplit) -> Result<(), DatasetError> {
        self.signals.append(other.signals)?;
        self.labels.extend(other.labels);
        Ok(())
    }

    /// Number of windows labelled 0 (normal) and 1 (apnea).
    pub fn label_counts(&self) -> (usize, usize) {
        let apnea = self.labels.iter().filter(|&&l| l == 1).count();
        (self.labels.len() - apnea, apnea)
    }
}

/// Anything that can turn a record identifier into aligned windows.
pub trait WindowSource: Sync {
    fn windows(&self, record: &str) -> Result<RecordWindows, RecordError>;
}

/// What to do when a whole record cannot be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordErrorPolicy {
    #[default]
    Abort,
    Skip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSummary {
    pub record: String,
    pub kept: usize,
    pub low_quality: usize,
    pub failed: usize,
}

impl From<&ExtractionReport> for RecordSummary {
    fn from(report: &ExtractionReport) -> Self {
        Self {
            record: report.record.clone(),
            kept: report.kept,
            low_quality: report.low_quality,
            failed: report.failed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedRecord {
    pub record: String,
    pub error: String,
}

/// A concatenated split plus per-record bookkeeping.
#[derive(Debug, Clone)]
pub struct BuiltSplit {
    pub split: DatasetSplit,
    pub records: Vec<RecordSummary>,
    pub failed: Vec<FailedRecord>,
}

/// Runs a [`WindowSource`] over a record list and concatenates the results in list order.
pub struct DatasetBuilder<'a, W: WindowSource> {
    source: &'a W,
    /// Worker threads; 1 runs serially, 0 uses rayon's default pool.
    pub jobs: usize,
    pub on_record_error: RecordErrorPolicy,
}

impl<'a, W: WindowSource> DatasetBuilder<'a, W> {
    pub fn new(source: &'a W) -> Self {
        Self {
            source,
            jobs: 1,
            on_record_error: RecordErrorPolicy::Abort,
        }
    }

    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn on_record_error(mut self, policy: RecordErrorPolicy) -> Self {
        self.on_record_error = policy;
        self
    }

    pub fn build(&self, records: &[String]) -> Result<BuiltSplit> {
        let results: Vec<Result<RecordWindows, RecordError>> = if self.jobs == 1 {
            records.iter().map(|id| self.source.windows(id)).collect()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.jobs)
                .build()
                .context("failed to start worker pool")?;
            pool.install(|| records.par_iter().map(|id| self.source.windows(id)).collect())
        };

        let mut split = DatasetSplit::empty(0);
        let mut summaries = Vec::with_capacity(records.len());
        let mut failed = Vec::new();
        for result in results {
            let windows = match result {
                Ok(windows) => windows,
                Err(err) if self.on_record_error == RecordErrorPolicy::Skip => {
                    let record = err.record().to_string();
                    let error = format!("{:#}", anyhow::Error::new(err));
                    warn!("skipping record {}: {}", record, error);
                    failed.push(FailedRecord { record, error });
                    continue;
                }
                Err(err) => {
                    let record = err.record().to_string();
                    return Err(anyhow::Error::new(err))
                        .with_context(|| format!("aborting split at record {}", record));
                }
            };
            summaries.push(RecordSummary::from(&windows.report));
            split.concat(windows.split).with_context(|| {
                format!("record {} cannot join the split", windows.report.record)
            })?;
        }

        let (normal, apnea) = split.label_counts();
        info!(
            "built split with {} windows ({} normal, {} apnea) from {} records, {} failed",
            split.len(),
            normal,
            apnea,
            summaries.len(),
            failed.len()
        );
        Ok(BuiltSplit {
            split,
            records: summaries,
            failed,
        })
    }
}

/// Read a record list: one identifier per line, blank lines and `#` comments ignored.
pub fn read_record_list(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read record list {}", path.display()))?;
    let records = parse_record_list(&text);
    if records.is_empty() {
        anyhow::bail!("record list {} is empty", path.display());
    }
    Ok(records)
}

pub fn parse_record_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
