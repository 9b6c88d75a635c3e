use crate::detectors::ecg::{detect_r_peaks, PeakDetectorConfig};
use anyhow::{bail, Result};

/// Produces a quality sequence for a cleaned window; callers average it.
pub trait QualityScorer: Send + Sync {
    fn score(&self, segment: &[f64], fs: u32) -> Result<Vec<f64>>;
}

/// Template-matching quality: every beat is compared with the window's average beat.
///
/// Beats are cut from one third of the mean RR interval before each R-peak to two
/// thirds after it. The Euclidean distance of each beat to the average beat is
/// rescaled to [0, 1] and inverted, so the most typical beat scores 1 and the
/// most deviant scores 0. Beats truncated by the window edge score 0. Per-beat
/// values are then linearly interpolated onto every sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct AverageBeatQuality {
    pub detector: PeakDetectorConfig,
}

impl QualityScorer for AverageBeatQuality {
    fn score(&self, segment: &[f64], fs: u32) -> Result<Vec<f64>> {
        if fs == 0 {
            bail!("sampling rate must be positive");
        }
        let peaks = detect_r_peaks(segment, fs as f64, &self.detector).indices;
        if peaks.len() < 2 {
            bail!("found {} R-peaks, need at least two", peaks.len());
        }
        let mean_rr = (peaks[peaks.len() - 1] - peaks[0]) as f64 / (peaks.len() - 1) as f64;
        let before = (mean_rr / 3.0).round() as usize;
        let after = (mean_rr * 2.0 / 3.0).round() as usize;

        let beats: Vec<Option<&[f64]>> = peaks
            .iter()
            .map(|&p| {
                if p < before || p + after > segment.len() {
                    None
                } else {
                    Some(&segment[p - before..p + after])
                }
            })
            .collect();
        let complete: Vec<&[f64]> = beats.iter().flatten().copied().collect();
        if complete.len() < 2 {
            bail!("only {} complete heartbeat(s) in window", complete.len());
        }

        let mut complete_scores = beat_scores(&complete).into_iter();
        let per_beat: Vec<f64> = beats
            .iter()
            .map(|beat| match beat {
                Some(_) => complete_scores.next().unwrap_or(0.0),
                None => 0.0,
            })
            .collect();
        Ok(interpolate(&peaks, &per_beat, segment.len()))
    }
}

/// Inverted, min-max rescaled distance of each beat to the mean beat.
pub fn beat_scores(beats: &[&[f64]]) -> Vec<f64> {
    if beats.is_empty() {
        return Vec::new();
    }
    let width = beats[0].len();
    let mut template = vec![0.0; width];
    for beat in beats {
        for (acc, &x) in template.iter_mut().zip(beat.iter()) {
            *acc += x;
        }
    }
    for value in &mut template {
        *value /= beats.len() as f64;
    }

    let distances: Vec<f64> = beats
        .iter()
        .map(|beat| {
            beat.iter()
                .zip(template.iter())
                .map(|(x, t)| (x - t).powi(2))
                .sum::<f64>()
                .sqrt()
        })
        .collect();
    let min = distances.iter().copied().fold(f64::INFINITY, f64::min);
    let max = distances.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if range <= 1e-9 * max.max(1e-12) {
        return vec![1.0; beats.len()];
    }
    distances.iter().map(|d| 1.0 - (d - min) / range).collect()
}

/// Piecewise-linear interpolation of `values` known at sorted positions `xs`,
/// held constant beyond the first and last position.
pub fn interpolate(xs: &[usize], values: &[f64], len: usize) -> Vec<f64> {
    if xs.is_empty() || values.is_empty() {
        return vec![0.0; len];
    }
    let mut out = Vec::with_capacity(len);
    let mut seg = 0usize;
    for i in 0..len {
        if i <= xs[0] {
            out.push(values[0]);
            continue;
        }
        if i >= xs[xs.len() - 1] {
            out.push(values[values.len() - 1]);
            continue;
        }
        while xs[seg + 1] < i {
            seg += 1;
        }
        let (x0, x1) = (xs[seg] as f64, xs[seg + 1] as f64);
        let (y0, y1) = (values[seg], values[seg + 1]);
        let frac = (i as f64 - x0) / (x1 - x0);
        out.push(y0 + frac * (y1 - y0));
    }
    out
}
