use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use std::{error::Error, fs, path::Path};
use tempfile::tempdir;

const FS: u32 = 100;

/// Narrow Gaussian spikes every 0.75 s.
fn write_record(dir: &Path, name: &str, seconds: usize, annotations: &[(usize, &str)]) {
    let samples = seconds * FS as usize;
    let text: String = (0..samples)
        .map(|i| {
            let t = i as f64 / FS as f64;
            let phase = t.rem_euclid(0.75);
            let dist = phase.min(0.75 - phase);
            format!("{:.5}\n", (-0.5 * (dist / 0.025).powi(2)).exp())
        })
        .collect();
    fs::write(dir.join(format!("{}.txt", name)), text).unwrap();
    let ann: String = annotations
        .iter()
        .map(|(s, sym)| format!("{} {}\n", s, sym))
        .collect();
    fs::write(dir.join(format!("{}.ann", name)), ann).unwrap();
}

fn labels_file(path: &Path) -> Vec<u8> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| l.trim().parse().unwrap())
        .collect()
}

fn signal_rows(path: &Path) -> Vec<usize> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| l.split(',').count())
        .collect()
}

#[test]
fn build_writes_aligned_split_and_skips_missing_records() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let data = dir.path().join("db");
    fs::create_dir_all(&data)?;
    write_record(&data, "a01", 60, &[(0, "N"), (1500, "A"), (3000, "N"), (5900, "N")]);
    write_record(&data, "b01", 60, &[(100, "A"), (2000, "N"), (4000, "A"), (5000, "A")]);
    let list = dir.path().join("train.txt");
    fs::write(&list, "a01\n# ghost record\nmissing\nb01\n")?;
    let out = dir.path().join("out");

    let mut cmd = cargo_bin_cmd!("apnea");
    cmd.args([
        "build",
        "--records",
        list.to_str().unwrap(),
        "--split",
        "train",
        "--out",
        out.to_str().unwrap(),
        "--root",
        data.to_str().unwrap(),
        "--format",
        "text",
        "--annotation-extension",
        "ann",
        "--text-fs",
        "100",
        "--radius-s",
        "5",
        "--quality-threshold",
        "0",
        "--jobs",
        "2",
        "--skip-failed",
    ]);
    let stdout = cmd.assert().success().get_output().stdout.clone();
    let summary: Value = serde_json::from_slice(&stdout)?;

    let labels = labels_file(&out.join("train_labels.csv"));
    let rows = signal_rows(&out.join("train_signals.csv"));
    assert_eq!(labels.len(), rows.len());
    assert!(rows.iter().all(|&w| w == 2 * 5 * FS as usize));
    assert_eq!(summary["rows"].as_u64().unwrap() as usize, labels.len());
    assert_eq!(summary["failed"][0]["record"], "missing");
    assert_eq!(summary["records"][0]["record"], "a01");
    assert_eq!(summary["records"][1]["record"], "b01");

    let a01 = &summary["records"][0];
    let seen = ["kept", "low_quality", "failed"]
        .iter()
        .map(|k| a01[*k].as_u64().unwrap())
        .sum::<u64>();
    assert_eq!(seen, 2);
    if a01["kept"] == 2 {
        assert_eq!(&labels[..2], &[1, 0]);
    }
    assert!(out.join("train_summary.json").exists());
    Ok(())
}

#[test]
fn build_aborts_on_missing_record_by_default() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let list = dir.path().join("test.txt");
    fs::write(&list, "absent\n")?;
    let mut cmd = cargo_bin_cmd!("apnea");
    cmd.args([
        "build",
        "--records",
        list.to_str().unwrap(),
        "--out",
        dir.path().join("out").to_str().unwrap(),
        "--root",
        dir.path().to_str().unwrap(),
        "--format",
        "text",
    ]);
    cmd.assert().failure();
    assert!(!dir.path().join("out/train_labels.csv").exists());
    Ok(())
}

#[test]
fn prepare_builds_every_configured_split() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    fs::create_dir_all(dir.path().join("db"))?;
    write_record(
        &dir.path().join("db"),
        "c01",
        60,
        &[(0, "N"), (1500, "N"), (3000, "A"), (5900, "N")],
    );
    fs::write(dir.path().join("train.txt"), "c01\n")?;
    fs::write(dir.path().join("test.txt"), "c01\n")?;
    fs::write(
        dir.path().join("prep.toml"),
        r#"
[window]
radius_s = 5
quality_threshold = 0.0

[data]
root = "db"
format = "text"
annotation_extension = "ann"
text_fs = 100

[output]
dir = "arrays"

[[splits]]
name = "train"
records = "train.txt"

[[splits]]
name = "test"
records = "test.txt"
"#,
    )?;

    let mut cmd = cargo_bin_cmd!("apnea");
    cmd.args([
        "prepare",
        "--config",
        dir.path().join("prep.toml").to_str().unwrap(),
    ]);
    let stdout = cmd.assert().success().get_output().stdout.clone();
    let summaries: Value = serde_json::from_slice(&stdout)?;
    assert_eq!(summaries.as_array().unwrap().len(), 2);

    for split in ["train", "test"] {
        let labels = labels_file(&dir.path().join(format!("arrays/{}_labels.csv", split)));
        let rows = signal_rows(&dir.path().join(format!("arrays/{}_signals.csv", split)));
        assert_eq!(labels.len(), rows.len());
    }
    Ok(())
}

#[test]
fn prepare_without_splits_is_an_error() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let config = dir.path().join("prep.toml");
    fs::write(&config, "[window]\nradius_s = 5\n")?;
    let mut cmd = cargo_bin_cmd!("apnea");
    cmd.args(["prepare", "--config", config.to_str().unwrap()]);
    cmd.assert().failure();
    Ok(())
}
