use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures that abort processing of a whole record.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("failed to read signal for record {record}")]
    RecordRead {
        record: String,
        #[source]
        source: BoxError,
    },
    #[error("failed to read annotations for record {record}")]
    AnnotationRead {
        record: String,
        #[source]
        source: BoxError,
    },
    #[error("record {record} has a zero sampling rate")]
    InvalidSamplingRate { record: String },
    #[error("record {record} produced inconsistent output")]
    Dataset {
        record: String,
        #[source]
        source: DatasetError,
    },
}

impl RecordError {
    pub fn record(&self) -> &str {
        match self {
            RecordError::RecordRead { record, .. }
            | RecordError::AnnotationRead { record, .. }
            | RecordError::InvalidSamplingRate { record }
            | RecordError::Dataset { record, .. } => record,
        }
    }
}

/// Failures local to a single annotation window. These never escape the extractor.
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("window [{start}, {end}) is outside the {len}-sample signal")]
    OutOfBounds { start: i64, end: i64, len: usize },
    #[error("cleaning failed: {0}")]
    Clean(String),
    #[error("cleaner returned {actual} samples for a {expected}-sample window")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("quality scoring failed: {0}")]
    Score(String),
    #[error("quality scorer returned no values")]
    EmptyScore,
    #[error("quality score {0} is not a finite number")]
    NonFiniteScore(f64),
}

/// Failures while concatenating per-record outputs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DatasetError {
    #[error("row has {actual} samples, matrix expects {expected}")]
    WidthMismatch { expected: usize, actual: usize },
    #[error("{rows} signal rows but {labels} labels")]
    Misaligned { rows: usize, labels: usize },
}
