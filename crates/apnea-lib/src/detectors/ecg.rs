//! R-peak detection used to segment heartbeats inside a window.

use crate::{
    filters::{bandpass, derivative, moving_average, square},
    signal::Events,
};

/// Tuning of the Pan–Tompkins-style R-peak detector.
#[derive(Debug, Clone, Copy)]
pub struct PeakDetectorConfig {
    /// Lower cutoff for the single-pole high-pass filter (Hz).
    pub lowcut_hz: f64,
    /// Upper cutoff for the single-pole low-pass filter (Hz).
    pub highcut_hz: f64,
    /// Moving window integration length (seconds).
    pub integration_window_s: f64,
    /// Minimum physiological RR distance / refractory period (seconds).
    pub min_rr_s: f64,
    /// Scale between noise and signal envelopes for the adaptive threshold.
    pub threshold_scale: f64,
    /// How far back to search (seconds) for the precise R-peak after a detection.
    pub search_back_s: f64,
}

impl Default for PeakDetectorConfig {
    fn default() -> Self {
        Self {
            lowcut_hz: 5.0,
            highcut_hz: 15.0,
            integration_window_s: 0.150,
            min_rr_s: 0.250,
            threshold_scale: 0.6,
            search_back_s: 0.150,
        }
    }
}

/// Detect R-peaks in a single-lead segment sampled at `fs` Hz.
///
/// Falls back to local maxima above a moving baseline when the adaptive
/// threshold finds fewer than two beats. A flat segment has no beats.
pub fn detect_r_peaks(signal: &[f64], fs: f64, cfg: &PeakDetectorConfig) -> Events {
    if signal.is_empty() || is_flat(signal) {
        return Events::from_indices(Vec::new());
    }
    let fs = fs.max(1.0);
    let (bandpassed, integrated) = pan_tompkins_envelope(signal, fs, cfg);
    let peaks = pick_peaks(&bandpassed, &integrated, fs, cfg);
    if peaks.len() < 2 {
        return Events::from_indices(fallback_peak_picker(signal, fs, cfg));
    }
    Events::from_indices(peaks)
}

fn is_flat(data: &[f64]) -> bool {
    let first = data[0];
    data.iter().all(|x| (x - first).abs() <= f64::EPSILON * first.abs().max(1.0))
}

fn pan_tompkins_envelope(
    signal: &[f64],
    fs: f64,
    cfg: &PeakDetectorConfig,
) -> (Vec<f64>, Vec<f64>) {
    let bandpassed = bandpass(signal, fs, cfg.lowcut_hz, cfg.highcut_hz);
    let derivative = derivative(&bandpassed);
    let squared = square(&derivative);
    let win = ((cfg.integration_window_s * fs).round() as usize).max(1);
    let integrated = moving_average(&squared, win);
    (bandpassed, integrated)
}

fn pick_peaks(
    bandpassed: &[f64],
    envelope: &[f64],
    fs: f64,
    cfg: &PeakDetectorConfig,
) -> Vec<usize> {
    if bandpassed.is_empty() || envelope.is_empty() {
        return Vec::new();
    }

    let refractory = (cfg.min_rr_s * fs).round().max(1.0) as usize;
    let search = (cfg.search_back_s * fs).round().max(1.0) as usize;

    let init = envelope.len().min((fs as usize).max(1));
    let avg = envelope[..init].iter().sum::<f64>() / init as f64;
    let mut signal_level = avg;
    let mut noise_level = avg * 0.5;
    let mut threshold = noise_level + cfg.threshold_scale * (signal_level - noise_level).max(0.0);
    let mut last_peak_sample = 0usize;
    let mut peaks = Vec::new();

    for (i, &sample) in envelope.iter().enumerate() {
        let refractory_ok = peaks.is_empty() || i - last_peak_sample >= refractory;
        if sample > 0.0 && sample >= threshold && refractory_ok {
            let start = i.saturating_sub(search);
            let end = i.min(bandpassed.len() - 1);
            let mut idx = start;
            let mut max_val = f64::MIN;
            for (j, &value) in bandpassed.iter().enumerate().take(end + 1).skip(start) {
                if value > max_val {
                    max_val = value;
                    idx = j;
                }
            }
            peaks.push(idx);
            last_peak_sample = i;
            signal_level = 0.125 * sample + 0.875 * signal_level;
        } else {
            noise_level = 0.125 * sample + 0.875 * noise_level;
        }

        threshold = noise_level + cfg.threshold_scale * (signal_level - noise_level).max(0.0);
    }

    peaks.sort_unstable();
    peaks.dedup();
    peaks
}

fn fallback_peak_picker(data: &[f64], fs: f64, cfg: &PeakDetectorConfig) -> Vec<usize> {
    if data.len() < 3 {
        return Vec::new();
    }
    let min_gap = (cfg.min_rr_s * fs).max(1.0) as usize;
    let baseline = moving_average(data, ((0.150 * fs) as usize).max(1));

    let mut peaks = Vec::new();
    let mut last_idx = 0usize;
    for i in 1..data.len() - 1 {
        let y = data[i] - baseline[i];
        if y > 0.0
            && y > (data[i - 1] - baseline[i - 1])
            && y > (data[i + 1] - baseline[i + 1])
            && (peaks.is_empty() || (i - last_idx) >= min_gap)
        {
            peaks.push(i);
            last_idx = i;
        }
    }
    peaks
}
