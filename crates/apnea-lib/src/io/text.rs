use crate::record::{ensure_increasing, AnnotationReader, SignalReader};
use crate::signal::{Annotation, RawRecord};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Parse newline-delimited floating point series, ignoring blank/comment lines.
pub fn parse_f64_series(text: &str) -> Result<Vec<f64>> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let val: f64 = trimmed
            .parse()
            .with_context(|| format!("line {} is not f64: {}", idx + 1, trimmed))?;
        out.push(val);
    }
    if out.is_empty() {
        anyhow::bail!("no numeric samples found");
    }
    Ok(out)
}

/// Read a newline-delimited floating point series from disk.
pub fn read_f64_series(path: &Path) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_f64_series(&text)
}

/// Parse `sample symbol` lines into annotations. An empty file is a valid, empty set.
pub fn parse_annotations(text: &str) -> Result<Vec<Annotation>> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut fields = trimmed.split_whitespace();
        let (Some(sample), Some(symbol), None) = (fields.next(), fields.next(), fields.next())
        else {
            anyhow::bail!(
                "line {} must hold exactly `sample symbol`: {}",
                idx + 1,
                trimmed
            );
        };
        let sample: usize = sample
            .parse()
            .with_context(|| format!("line {} is not an integer index: {}", idx + 1, sample))?;
        out.push(Annotation::new(sample, symbol));
    }
    ensure_increasing(&out)?;
    Ok(out)
}

/// Read annotations from a file.
pub fn read_annotations(path: &Path) -> Result<Vec<Annotation>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_annotations(&text).with_context(|| format!("in {}", path.display()))
}

/// Plain-text records: `<root>/<record>.txt` holds one sample per line at a fixed rate.
#[derive(Debug, Clone)]
pub struct TextSignalReader {
    pub root: PathBuf,
    pub fs: u32,
}

impl TextSignalReader {
    pub fn new(root: impl Into<PathBuf>, fs: u32) -> Self {
        Self {
            root: root.into(),
            fs,
        }
    }
}

impl SignalReader for TextSignalReader {
    fn read(&self, record: &str) -> Result<RawRecord> {
        let data = read_f64_series(&self.root.join(format!("{}.txt", record)))?;
        Ok(RawRecord::new(data, self.fs))
    }
}

/// Plain-text annotations: `<root>/<record>.<extension>` with `sample symbol` lines.
#[derive(Debug, Clone)]
pub struct TextAnnotationReader {
    pub root: PathBuf,
}

impl TextAnnotationReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AnnotationReader for TextAnnotationReader {
    fn read(&self, record: &str, extension: &str) -> Result<Vec<Annotation>> {
        read_annotations(&self.root.join(format!("{}.{}", record, extension)))
    }
}
