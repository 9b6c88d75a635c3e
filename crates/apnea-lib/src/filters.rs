//! Small first-order filters shared by the cleaner and the beat detector.

use std::f64::consts::PI;

pub fn bandpass(data: &[f64], fs: f64, low: f64, high: f64) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    let hp = if low > 0.0 {
        single_pole_highpass(data, fs, low)
    } else {
        data.to_vec()
    };
    if high <= 0.0 || high >= fs * 0.5 {
        hp
    } else {
        single_pole_lowpass(&hp, fs, high)
    }
}

pub fn single_pole_highpass(data: &[f64], fs: f64, cutoff: f64) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    let dt = 1.0 / fs;
    let rc = 1.0 / (2.0 * PI * cutoff.max(0.01));
    let alpha = rc / (rc + dt);
    let mut out = Vec::with_capacity(data.len());
    let mut prev_y = 0.0;
    let mut prev_x = data[0];
    for &x in data {
        let y = alpha * (prev_y + x - prev_x);
        out.push(y);
        prev_y = y;
        prev_x = x;
    }
    out
}

pub fn single_pole_lowpass(data: &[f64], fs: f64, cutoff: f64) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    let dt = 1.0 / fs;
    let rc = 1.0 / (2.0 * PI * cutoff.max(0.01));
    let alpha = dt / (rc + dt);
    let mut out = Vec::with_capacity(data.len());
    let mut prev = data[0];
    for &x in data {
        prev += alpha * (x - prev);
        out.push(prev);
    }
    out
}

/// Forward/backward high-pass; cancels the phase lag of the single pole.
pub fn zero_phase_highpass(data: &[f64], fs: f64, cutoff: f64) -> Vec<f64> {
    let mut forward = single_pole_highpass(data, fs, cutoff);
    forward.reverse();
    let mut out = single_pole_highpass(&forward, fs, cutoff);
    out.reverse();
    out
}

pub fn derivative(data: &[f64]) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0; data.len()];
    for i in 1..data.len() {
        out[i] = data[i] - data[i - 1];
    }
    out
}

pub fn square(data: &[f64]) -> Vec<f64> {
    data.iter().map(|x| x * x).collect()
}

/// Trailing moving average (causal).
pub fn moving_average(data: &[f64], win: usize) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    if win <= 1 {
        return data.to_vec();
    }
    let mut out = vec![0.0; data.len()];
    let mut acc = 0.0;
    for (i, &sample) in data.iter().enumerate() {
        acc += sample;
        if i >= win {
            acc -= data[i - win];
        }
        out[i] = acc / win as f64;
    }
    out
}

/// Moving average centered on each sample; the window shrinks at the edges.
pub fn centered_moving_average(data: &[f64], win: usize) -> Vec<f64> {
    if win <= 1 || data.is_empty() {
        return data.to_vec();
    }
    let before = (win - 1) / 2;
    let after = win - 1 - before;
    let mut prefix = Vec::with_capacity(data.len() + 1);
    prefix.push(0.0);
    let mut acc = 0.0;
    for &x in data {
        acc += x;
        prefix.push(acc);
    }
    (0..data.len())
        .map(|i| {
            let start = i.saturating_sub(before);
            let end = (i + after + 1).min(data.len());
            (prefix[end] - prefix[start]) / (end - start) as f64
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highpass_removes_constant_offset() {
        let data = vec![3.0; 2000];
        let out = zero_phase_highpass(&data, 100.0, 0.5);
        assert_eq!(out.len(), data.len());
        assert!(out.iter().all(|x| x.abs() < 1e-9));
    }

    #[test]
    fn centered_average_keeps_length_and_mean() {
        let data: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let out = centered_moving_average(&data, 3);
        assert_eq!(out.len(), data.len());
        assert!((out[5] - 5.0).abs() < 1e-12);
        assert!((out[0] - 0.5).abs() < 1e-12);
        assert!((out[9] - 8.5).abs() < 1e-12);
    }

    #[test]
    fn trailing_average_ramps_up() {
        let out = moving_average(&[2.0, 2.0, 2.0, 2.0], 2);
        assert_eq!(out, vec![1.0, 2.0, 2.0, 2.0]);
    }
}
