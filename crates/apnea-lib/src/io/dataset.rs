use crate::dataset::{BuiltSplit, DatasetSplit, FailedRecord, RecordSummary};
use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Shape and provenance of a persisted split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitSummary {
    pub split: String,
    pub rows: usize,
    pub width: usize,
    pub normal: usize,
    pub apnea: usize,
    pub signals_path: PathBuf,
    pub labels_path: PathBuf,
    #[serde(default)]
    pub records: Vec<RecordSummary>,
    #[serde(default)]
    pub failed: Vec<FailedRecord>,
}

/// One window per row, no header.
pub fn write_signals_csv(path: &Path, split: &DatasetSplit) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for row in split.signals.iter_rows() {
        writer.write_record(row.iter().map(|v| v.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

/// One label per line.
pub fn write_labels_csv(path: &Path, split: &DatasetSplit) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for label in &split.labels {
        writer.write_record([label.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

/// Persist `<name>_signals.csv`, `<name>_labels.csv` and `<name>_summary.json` under `dir`.
pub fn write_split(dir: &Path, name: &str, built: &BuiltSplit) -> Result<SplitSummary> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let signals_path = dir.join(format!("{}_signals.csv", name));
    let labels_path = dir.join(format!("{}_labels.csv", name));
    write_signals_csv(&signals_path, &built.split)?;
    write_labels_csv(&labels_path, &built.split)?;

    let (normal, apnea) = built.split.label_counts();
    let summary = SplitSummary {
        split: name.to_string(),
        rows: built.split.signals.rows(),
        width: built.split.signals.width(),
        normal,
        apnea,
        signals_path,
        labels_path,
        records: built.records.clone(),
        failed: built.failed.clone(),
    };
    let summary_path = dir.join(format!("{}_summary.json", name));
    fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)
        .with_context(|| format!("failed to write {}", summary_path.display()))?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::SignalMatrix;

    fn read_labels_csv(path: &Path) -> Result<Vec<u8>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let mut labels = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let record = record?;
            let field = record.get(0).unwrap_or_default().trim();
            let label: u8 = field
                .parse()
                .with_context(|| format!("line {} is not a label: {}", idx + 1, field))?;
            labels.push(label);
        }
        Ok(labels)
    }

    #[test]
    fn writes_aligned_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let mut signals = SignalMatrix::empty(3);
        signals.push_row(vec![0.5, 1.0, -2.0]).unwrap();
        signals.push_row(vec![0.0, 0.25, 3.0]).unwrap();
        let built = BuiltSplit {
            split: DatasetSplit::new(signals, vec![0, 1]).unwrap(),
            records: vec![RecordSummary {
                record: "a01".into(),
                kept: 2,
                low_quality: 1,
                failed: 0,
            }],
            failed: vec![],
        };
        let summary = write_split(dir.path(), "train", &built).unwrap();
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.width, 3);
        assert_eq!((summary.normal, summary.apnea), (1, 1));

        let text = fs::read_to_string(&summary.signals_path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["0.5,1,-2", "0,0.25,3"]);
        assert_eq!(read_labels_csv(&summary.labels_path).unwrap(), vec![0, 1]);

        let json: SplitSummary = serde_json::from_str(
            &fs::read_to_string(dir.path().join("train_summary.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(json.records[0].record, "a01");
        assert_eq!(json.records[0].low_quality, 1);
    }

    #[test]
    fn empty_split_writes_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let built = BuiltSplit {
            split: DatasetSplit::empty(12_000),
            records: vec![],
            failed: vec![],
        };
        let summary = write_split(dir.path(), "test", &built).unwrap();
        assert_eq!(summary.rows, 0);
        assert_eq!(summary.width, 12_000);
        assert!(fs::read_to_string(&summary.signals_path).unwrap().is_empty());
        assert!(read_labels_csv(&summary.labels_path).unwrap().is_empty());
    }
}
