//! Per-record windowing, cleaning and quality gating.
//!
//! Every interior annotation of a record yields one window of `2 * radius_s`
//! seconds centred on the whole second of the annotation. Windows that cannot
//! be cut, cleaned or scored, or that score below the quality threshold, are
//! dropped together with their label; the surviving rows and labels stay
//! aligned one to one.

use crate::{
    clean::SignalCleaner,
    dataset::{DatasetSplit, SignalMatrix, WindowSource},
    error::{RecordError, SegmentError},
    metrics::quality::QualityScorer,
    record::{AnnotationReader, SignalReader},
    signal::{Annotation, RawRecord},
};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Annotation symbol that marks a normal (non-apnea) minute.
pub const NORMAL_SYMBOL: &str = "N";

/// Window geometry and quality gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Half-width of each window in seconds.
    pub radius_s: u32,
    /// Windows scoring below this mean quality are discarded.
    pub quality_threshold: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            radius_s: 60,
            quality_threshold: 0.5,
        }
    }
}

impl WindowConfig {
    pub fn radius_samples(&self, fs: u32) -> usize {
        self.radius_s as usize * fs as usize
    }

    pub fn window_len(&self, fs: u32) -> usize {
        2 * self.radius_samples(fs)
    }
}

pub fn label_for_symbol(symbol: &str) -> u8 {
    if symbol == NORMAL_SYMBOL {
        0
    } else {
        1
    }
}

/// Window centre: the annotation time truncated to whole seconds, in samples.
pub fn window_center(time_s: f64, fs: u32) -> i64 {
    time_s.floor() as i64 * fs as i64
}

/// Sample range `[center - radius, center + radius)`, which must lie inside the signal.
pub fn window_bounds(center: i64, radius: usize, len: usize) -> Result<Range<usize>, SegmentError> {
    let start = center - radius as i64;
    let end = center + radius as i64;
    if start < 0 || end > len as i64 {
        return Err(SegmentError::OutOfBounds { start, end, len });
    }
    Ok(start as usize..end as usize)
}

/// First and last annotations never yield a window.
pub fn eligible_annotations(annotations: &[Annotation]) -> &[Annotation] {
    if annotations.len() < 2 {
        &[]
    } else {
        &annotations[1..annotations.len() - 1]
    }
}

/// A cleaned window together with its mean quality.
#[derive(Debug, Clone)]
pub struct ScoredWindow {
    pub samples: Vec<f64>,
    pub quality: f64,
}

/// Cut, clean and score the window around one annotation time.
pub fn process_window(
    signal: &[f64],
    time_s: f64,
    fs: u32,
    cfg: &WindowConfig,
    cleaner: &dyn SignalCleaner,
    scorer: &dyn QualityScorer,
) -> Result<ScoredWindow, SegmentError> {
    let center = window_center(time_s, fs);
    let range = window_bounds(center, cfg.radius_samples(fs), signal.len())?;
    let segment = &signal[range];

    let samples = cleaner
        .clean(segment, fs)
        .map_err(|err| SegmentError::Clean(format!("{:#}", err)))?;
    if samples.len() != segment.len() {
        return Err(SegmentError::LengthMismatch {
            expected: segment.len(),
            actual: samples.len(),
        });
    }

    let scores = scorer
        .score(&samples, fs)
        .map_err(|err| SegmentError::Score(format!("{:#}", err)))?;
    if scores.is_empty() {
        return Err(SegmentError::EmptyScore);
    }
    let quality = scores.iter().sum::<f64>() / scores.len() as f64;
    if !quality.is_finite() {
        return Err(SegmentError::NonFiniteScore(quality));
    }
    Ok(ScoredWindow { samples, quality })
}

/// What happened to one eligible annotation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WindowOutcome {
    Kept { quality: f64 },
    LowQuality { quality: f64 },
    Failed { reason: String },
}

impl WindowOutcome {
    pub fn is_kept(&self) -> bool {
        matches!(self, WindowOutcome::Kept { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WindowDiagnostic {
    pub sample: usize,
    pub time_s: f64,
    pub symbol: String,
    pub label: u8,
    #[serde(flatten)]
    pub outcome: WindowOutcome,
}

/// Per-record bookkeeping that tells low quality apart from processing failures.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionReport {
    pub record: String,
    pub fs: u32,
    pub annotations: usize,
    pub eligible: usize,
    pub kept: usize,
    pub low_quality: usize,
    pub failed: usize,
    pub windows: Vec<WindowDiagnostic>,
}

#[derive(Debug, Clone)]
pub struct RecordWindows {
    pub split: DatasetSplit,
    pub report: ExtractionReport,
}

/// Run the windowing pipeline over an already loaded record.
pub fn extract_from_parts(
    record_id: &str,
    record: &RawRecord,
    annotations: &[Annotation],
    cfg: &WindowConfig,
    cleaner: &dyn SignalCleaner,
    scorer: &dyn QualityScorer,
) -> Result<RecordWindows, RecordError> {
    let fs = record.fs;
    if fs == 0 {
        return Err(RecordError::InvalidSamplingRate {
            record: record_id.to_string(),
        });
    }

    let eligible = eligible_annotations(annotations);
    let labels: Vec<u8> = eligible
        .iter()
        .map(|ann| label_for_symbol(&ann.symbol))
        .collect();

    let mut signals = SignalMatrix::empty(cfg.window_len(fs));
    let mut bad = vec![false; eligible.len()];
    let mut windows = Vec::with_capacity(eligible.len());
    let mut report = ExtractionReport {
        record: record_id.to_string(),
        fs,
        annotations: annotations.len(),
        eligible: eligible.len(),
        ..ExtractionReport::default()
    };

    for (i, ann) in eligible.iter().enumerate() {
        let time_s = ann.time(fs);
        let outcome = match process_window(&record.signal, time_s, fs, cfg, cleaner, scorer) {
            Ok(window) if window.quality < cfg.quality_threshold => WindowOutcome::LowQuality {
                quality: window.quality,
            },
            Ok(window) => match signals.push_row(window.samples) {
                Ok(()) => WindowOutcome::Kept {
                    quality: window.quality,
                },
                Err(err) => WindowOutcome::Failed {
                    reason: err.to_string(),
                },
            },
            Err(err) => WindowOutcome::Failed {
                reason: err.to_string(),
            },
        };

        match &outcome {
            WindowOutcome::Kept { .. } => report.kept += 1,
            WindowOutcome::LowQuality { quality } => {
                debug!(
                    "{}: window at {:.1}s below quality gate ({:.3})",
                    record_id, time_s, quality
                );
                report.low_quality += 1;
                bad[i] = true;
            }
            WindowOutcome::Failed { reason } => {
                debug!("{}: window at {:.1}s dropped: {}", record_id, time_s, reason);
                report.failed += 1;
                bad[i] = true;
            }
        }
        windows.push(WindowDiagnostic {
            sample: ann.sample,
            time_s,
            symbol: ann.symbol.clone(),
            label: labels[i],
            outcome,
        });
    }
    report.windows = windows;

    let kept_labels: Vec<u8> = labels
        .into_iter()
        .zip(bad)
        .filter_map(|(label, is_bad)| (!is_bad).then_some(label))
        .collect();

    info!(
        "{}: kept {}/{} windows ({} low quality, {} failed)",
        record_id, report.kept, report.eligible, report.low_quality, report.failed
    );

    let split =
        DatasetSplit::new(signals, kept_labels).map_err(|source| RecordError::Dataset {
            record: record_id.to_string(),
            source,
        })?;
    Ok(RecordWindows { split, report })
}

/// Loads one record through the readers and turns it into aligned windows and labels.
pub struct RecordWindowExtractor<S, A, C, Q> {
    pub signals: S,
    pub annotations: A,
    pub cleaner: C,
    pub scorer: Q,
    pub annotation_extension: String,
    pub config: WindowConfig,
}

impl<S, A, C, Q> RecordWindowExtractor<S, A, C, Q>
where
    S: SignalReader,
    A: AnnotationReader,
    C: SignalCleaner,
    Q: QualityScorer,
{
    pub fn new(
        signals: S,
        annotations: A,
        cleaner: C,
        scorer: Q,
        annotation_extension: impl Into<String>,
        config: WindowConfig,
    ) -> Self {
        Self {
            signals,
            annotations,
            cleaner,
            scorer,
            annotation_extension: annotation_extension.into(),
            config,
        }
    }

    pub fn extract(&self, record_id: &str) -> Result<DatasetSplit, RecordError> {
        self.extract_with_report(record_id).map(|out| out.split)
    }

    pub fn extract_with_report(&self, record_id: &str) -> Result<RecordWindows, RecordError> {
        let annotations = self
            .annotations
            .read(record_id, &self.annotation_extension)
            .map_err(|err| RecordError::AnnotationRead {
                record: record_id.to_string(),
                source: err.into(),
            })?;
        let record = self
            .signals
            .read(record_id)
            .map_err(|err| RecordError::RecordRead {
                record: record_id.to_string(),
                source: err.into(),
            })?;
        extract_from_parts(
            record_id,
            &record,
            &annotations,
            &self.config,
            &self.cleaner,
            &self.scorer,
        )
    }
}

impl<S, A, C, Q> WindowSource for RecordWindowExtractor<S, A, C, Q>
where
    S: SignalReader,
    A: AnnotationReader,
    C: SignalCleaner,
    Q: QualityScorer,
{
    fn windows(&self, record: &str) -> Result<RecordWindows, RecordError> {
        self.extract_with_report(record)
    }
}
