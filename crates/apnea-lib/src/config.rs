use crate::{
    clean::EcgCleaner,
    dataset::RecordErrorPolicy,
    extract::{RecordWindowExtractor, WindowConfig},
    io::{
        text::{TextAnnotationReader, TextSignalReader},
        wfdb::{WfdbAnnotationReader, WfdbSignalReader},
    },
    metrics::quality::AverageBeatQuality,
    record::{AnnotationReader, SignalReader},
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// On-disk layout of the recordings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFormat {
    /// `.hea`/`.dat` signal files plus MIT annotation files
    #[default]
    Wfdb,
    /// `.txt` sample-per-line signals plus `sample symbol` annotation files
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSpec {
    pub root: PathBuf,
    pub format: RecordFormat,
    pub annotation_extension: String,
    /// Sampling rate for text records, which carry no header.
    pub text_fs: u32,
}

impl Default for DataSpec {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            format: RecordFormat::Wfdb,
            annotation_extension: "apn".into(),
            text_fs: 100,
        }
    }
}

/// Extractor wired to the readers of a [`DataSpec`] and the default cleaner and scorer.
pub type DefaultExtractor = RecordWindowExtractor<
    Box<dyn SignalReader>,
    Box<dyn AnnotationReader>,
    EcgCleaner,
    AverageBeatQuality,
>;

impl DataSpec {
    pub fn extractor(&self, window: WindowConfig) -> DefaultExtractor {
        let (signals, annotations): (Box<dyn SignalReader>, Box<dyn AnnotationReader>) =
            match self.format {
                RecordFormat::Wfdb => (
                    Box::new(WfdbSignalReader::new(&self.root)),
                    Box::new(WfdbAnnotationReader::new(&self.root)),
                ),
                RecordFormat::Text => (
                    Box::new(TextSignalReader::new(&self.root, self.text_fs)),
                    Box::new(TextAnnotationReader::new(&self.root)),
                ),
            };
        RecordWindowExtractor::new(
            signals,
            annotations,
            EcgCleaner::default(),
            AverageBeatQuality::default(),
            self.annotation_extension.clone(),
            window,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSpec {
    pub dir: PathBuf,
}

impl Default for OutputSpec {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("out"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitSpec {
    pub name: String,
    /// Record list file, one identifier per line.
    pub records: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSpec {
    pub jobs: usize,
    pub on_record_error: RecordErrorPolicy,
}

/// Full preparation run as described by a TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepConfig {
    pub window: WindowConfig,
    pub data: DataSpec,
    pub output: OutputSpec,
    pub splits: Vec<SplitSpec>,
    pub build: BuildSpec,
}

impl PrepConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let cfg: PrepConfig = toml::from_str(text).context("invalid preparation config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load a config file; relative paths inside it resolve against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut cfg = Self::from_toml_str(&text)
            .with_context(|| format!("while loading {}", path.display()))?;
        if let Some(base) = path.parent() {
            cfg.rebase(base);
        }
        Ok(cfg)
    }

    fn rebase(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        join(&mut self.data.root);
        join(&mut self.output.dir);
        for split in &mut self.splits {
            join(&mut split.records);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.window.radius_s == 0 {
            anyhow::bail!("window.radius_s must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.window.quality_threshold) {
            anyhow::bail!(
                "window.quality_threshold must lie in [0, 1], got {}",
                self.window.quality_threshold
            );
        }
        if self.data.format == RecordFormat::Text && self.data.text_fs == 0 {
            anyhow::bail!("data.text_fs must be positive for text records");
        }
        if self.data.annotation_extension.is_empty() {
            anyhow::bail!("data.annotation_extension must not be empty");
        }
        let mut names: Vec<&str> = self.splits.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        if let Some(dup) = names.windows(2).find(|w| w[0] == w[1]) {
            anyhow::bail!("split {} is declared twice", dup[0]);
        }
        Ok(())
    }
}
