use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use std::{error::Error, f64::consts::PI, fs, path::Path};
use tempfile::tempdir;

const FS: u32 = 250;

/// Gaussian R waves every 0.8 s on a slow baseline sway.
fn write_synthetic_record(dir: &Path, name: &str, seconds: usize, annotations: &[(f64, &str)]) {
    let fs = FS as f64;
    let samples = seconds * FS as usize;
    let mut text = String::with_capacity(samples * 8);
    for i in 0..samples {
        let t = i as f64 / fs;
        let phase = (t - 0.5).rem_euclid(0.8);
        let dist = phase.min(0.8 - phase);
        let v = 0.1 * (2.0 * PI * 0.2 * t).sin() + 1.2 * (-0.5 * (dist / 0.02).powi(2)).exp();
        text.push_str(&format!("{:.5}\n", v));
    }
    fs::write(dir.join(format!("{}.txt", name)), text).unwrap();

    let ann: String = annotations
        .iter()
        .map(|(t, sym)| format!("{} {}\n", (t * fs) as usize, sym))
        .collect();
    fs::write(dir.join(format!("{}.ann", name)), ann).unwrap();
}

fn annotations() -> Vec<(f64, &'static str)> {
    vec![
        (0.0, "N"),
        (5.0, "A"),
        (40.0, "N"),
        (70.0, "A"),
        (100.0, "A"),
        (130.0, "N"),
        (160.0, "N"),
        (195.0, "A"),
    ]
}

fn source_args(root: &Path) -> Vec<String> {
    vec![
        "--root".into(),
        root.to_string_lossy().to_string(),
        "--format".into(),
        "text".into(),
        "--annotation-extension".into(),
        "ann".into(),
        "--text-fs".into(),
        FS.to_string(),
        "--radius-s".into(),
        "10".into(),
    ]
}

#[test]
fn extract_keeps_rows_and_labels_aligned() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    write_synthetic_record(dir.path(), "x01", 200, &annotations());

    let mut cmd = cargo_bin_cmd!("apnea");
    cmd.args(["extract", "--record", "x01", "--report", "--quality-threshold", "0"])
        .args(source_args(dir.path()));
    let output = cmd.assert().success().get_output().stdout.clone();
    let json: Value = serde_json::from_slice(&output)?;

    assert_eq!(json["width"], 2 * 10 * FS as u64);
    let labels: Vec<u64> = json["labels"]
        .as_array()
        .expect("labels array")
        .iter()
        .map(|v| v.as_u64().unwrap())
        .collect();
    assert_eq!(json["rows"].as_u64().unwrap() as usize, labels.len());
    // the 5 s annotation cannot hold a 10 s radius; the rest survive a zero gate
    assert_eq!(labels, vec![0, 1, 1, 0, 0]);

    let report = &json["report"];
    assert_eq!(report["eligible"], 6);
    assert_eq!(report["failed"], 1);
    assert_eq!(report["low_quality"], 0);
    assert_eq!(report["windows"][0]["outcome"], "failed");
    assert_eq!(report["windows"][0]["symbol"], "A");
    Ok(())
}

#[test]
fn strict_gate_never_breaks_alignment() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    write_synthetic_record(dir.path(), "x02", 200, &annotations());

    let mut cmd = cargo_bin_cmd!("apnea");
    cmd.args(["extract", "--record", "x02", "--report", "--quality-threshold", "1"])
        .args(source_args(dir.path()));
    let output = cmd.assert().success().get_output().stdout.clone();
    let json: Value = serde_json::from_slice(&output)?;

    let rows = json["rows"].as_u64().unwrap();
    assert_eq!(rows as usize, json["labels"].as_array().unwrap().len());
    let report = &json["report"];
    let total = report["kept"].as_u64().unwrap()
        + report["low_quality"].as_u64().unwrap()
        + report["failed"].as_u64().unwrap();
    assert_eq!(total, 6);
    assert_eq!(report["kept"].as_u64().unwrap(), rows);
    Ok(())
}

#[test]
fn missing_record_fails() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let mut cmd = cargo_bin_cmd!("apnea");
    cmd.args(["extract", "--record", "nope"])
        .args(source_args(dir.path()));
    cmd.assert().failure();
    Ok(())
}
