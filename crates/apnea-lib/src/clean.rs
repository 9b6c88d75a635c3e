use crate::filters::{centered_moving_average, zero_phase_highpass};
use anyhow::{bail, Result};

/// Value transform applied to every extracted window before scoring.
///
/// Implementations must return exactly as many samples as they receive.
pub trait SignalCleaner: Send + Sync {
    fn clean(&self, segment: &[f64], fs: u32) -> Result<Vec<f64>>;
}

/// Baseline-wander and mains-hum removal for single-lead ECG.
#[derive(Debug, Clone, Copy)]
pub struct EcgCleaner {
    /// High-pass cutoff for baseline wander (Hz).
    pub highpass_hz: f64,
    /// Mains frequency smoothed out by a moving average (Hz).
    pub powerline_hz: f64,
}

impl Default for EcgCleaner {
    fn default() -> Self {
        Self {
            highpass_hz: 0.5,
            powerline_hz: 50.0,
        }
    }
}

impl SignalCleaner for EcgCleaner {
    fn clean(&self, segment: &[f64], fs: u32) -> Result<Vec<f64>> {
        if fs == 0 {
            bail!("sampling rate must be positive");
        }
        if segment.is_empty() {
            bail!("cannot clean an empty segment");
        }
        if let Some(pos) = segment.iter().position(|x| !x.is_finite()) {
            bail!("segment contains a non-finite sample at {}", pos);
        }
        let fs = fs as f64;
        let detrended = zero_phase_highpass(segment, fs, self.highpass_hz);
        // Below 100 Hz the mains component aliases and smoothing would eat the QRS.
        if fs < 100.0 || self.powerline_hz <= 0.0 {
            return Ok(detrended);
        }
        let win = (fs / self.powerline_hz).round() as usize;
        Ok(centered_moving_average(&detrended, win))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn keeps_segment_length() {
        let segment: Vec<f64> = (0..12_000).map(|i| (i as f64 * 0.01).sin()).collect();
        let cleaned = EcgCleaner::default().clean(&segment, 100).unwrap();
        assert_eq!(cleaned.len(), segment.len());
    }

    #[test]
    fn removes_baseline_offset() {
        let fs = 100u32;
        let segment: Vec<f64> = (0..6000)
            .map(|i| 5.0 + (2.0 * PI * 8.0 * i as f64 / fs as f64).sin())
            .collect();
        let cleaned = EcgCleaner::default().clean(&segment, fs).unwrap();
        let mid = &cleaned[1000..5000];
        let mean = mid.iter().sum::<f64>() / mid.len() as f64;
        assert!(mean.abs() < 0.1, "offset survived cleaning: {}", mean);
    }

    #[test]
    fn suppresses_mains_hum() {
        let fs = 200u32;
        let segment: Vec<f64> = (0..4000)
            .map(|i| (2.0 * PI * 50.0 * i as f64 / fs as f64).sin())
            .collect();
        let cleaned = EcgCleaner::default().clean(&segment, fs).unwrap();
        let peak = cleaned[500..3500]
            .iter()
            .fold(0.0f64, |acc, x| acc.max(x.abs()));
        assert!(peak < 0.05, "mains hum amplitude {}", peak);
    }

    #[test]
    fn rejects_empty_and_nan_input() {
        let cleaner = EcgCleaner::default();
        assert!(cleaner.clean(&[], 100).is_err());
        assert!(cleaner.clean(&[1.0, f64::NAN, 2.0], 100).is_err());
        assert!(cleaner.clean(&[1.0, 2.0], 0).is_err());
    }
}
