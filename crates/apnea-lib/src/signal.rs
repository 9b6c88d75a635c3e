use serde::{Deserialize, Serialize};

/// Basic typed time series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Uniform sampling frequency in Hz
    pub fs: f64,
    /// Samples
    pub data: Vec<f64>,
}

/// Point events on a timeline (e.g., R-peaks indices)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Events {
    pub indices: Vec<usize>,
}

impl Events {
    pub fn from_indices(indices: Vec<usize>) -> Self {
        Self { indices }
    }
}

/// Single-lead recording as handed over by a signal reader.
#[derive(Debug, Clone)]
pub struct RawRecord {
    /// Integer sampling rate (samples per second)
    pub fs: u32,
    pub signal: Vec<f64>,
}

impl RawRecord {
    pub fn new(signal: Vec<f64>, fs: u32) -> Self {
        Self { fs, signal }
    }
}

/// One expert-marked event: sample position plus its annotation mnemonic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub sample: usize,
    pub symbol: String,
}

impl Annotation {
    pub fn new(sample: usize, symbol: impl Into<String>) -> Self {
        Self {
            sample,
            symbol: symbol.into(),
        }
    }

    /// Position in seconds.
    pub fn time(&self, fs: u32) -> f64 {
        self.sample as f64 / fs as f64
    }
}

/// Convert a sampling frequency reported by a reader into a whole number of Hz.
pub fn integral_fs(fs: f64) -> Option<u32> {
    if fs.is_finite() && fs >= 1.0 && fs.fract() == 0.0 && fs <= u32::MAX as f64 {
        Some(fs as u32)
    } else {
        None
    }
}
