use crate::record::{ensure_increasing, AnnotationReader, SignalReader};
use crate::signal::{integral_fs, Annotation, RawRecord, TimeSeries};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use wfdb_rust::{header::StorageFormat, signal::parse_212_format};

/// Raw MIT-format annotation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WfdbAnnotation {
    pub sample: usize,
    pub code: u8,
}

impl WfdbAnnotation {
    pub fn symbol(&self) -> &'static str {
        annotation_symbol(self.code)
    }
}

/// Standard WFDB mnemonic for an annotation code (see `ecgcodes.h`).
pub fn annotation_symbol(code: u8) -> &'static str {
    match code {
        1 => "N",
        2 => "L",
        3 => "R",
        4 => "a",
        5 => "V",
        6 => "F",
        7 => "J",
        8 => "A",
        9 => "S",
        10 => "E",
        11 => "j",
        12 => "/",
        13 => "Q",
        14 => "~",
        16 => "|",
        18 => "s",
        19 => "T",
        20 => "*",
        21 => "D",
        22 => "\"",
        23 => "=",
        24 => "p",
        25 => "B",
        26 => "^",
        27 => "t",
        28 => "+",
        29 => "u",
        30 => "?",
        31 => "!",
        32 => "[",
        33 => "]",
        34 => "e",
        35 => "n",
        36 => "@",
        37 => "x",
        38 => "f",
        39 => "(",
        40 => ")",
        41 => "r",
        _ => "?",
    }
}

/// Sampling frequency assumed when the record line omits it.
const DEFAULT_FS: f64 = 250.0;
/// ADC gain assumed when the signal line omits it or gives 0.
const DEFAULT_GAIN: f64 = 200.0;

/// Record line plus signal specification lines of a `.hea` file.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordHeader {
    pub name: String,
    pub fs: f64,
    pub samples_per_signal: Option<usize>,
    pub signals: Vec<SignalSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalSpec {
    pub filename: String,
    pub format: StorageFormat,
    pub byte_offset: usize,
    /// ADC units per physical unit
    pub gain: f64,
    pub baseline: i32,
    pub description: Option<String>,
}

/// Parse a WFDB header. Fields past the ADC zero (initial value, checksum,
/// block size) are not needed for decoding and are not validated.
pub fn parse_header(text: &str) -> Result<RecordHeader> {
    let mut lines = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'));
    let record_line = lines.next().context("header has no record line")?;
    let tokens: Vec<&str> = record_line.split_whitespace().collect();
    let name = tokens[0].split('/').next().unwrap_or_default().to_string();
    let nsig: usize = tokens
        .get(1)
        .context("record line lacks the number of signals")?
        .parse()
        .context("number of signals is not an integer")?;
    let fs = match tokens.get(2) {
        Some(tok) => {
            let freq = tok.split('/').next().unwrap_or_default();
            freq.parse::<f64>()
                .with_context(|| format!("sampling frequency {:?} is not a number", tok))?
        }
        None => DEFAULT_FS,
    };
    let samples_per_signal = tokens
        .get(3)
        .map(|tok| tok.parse::<usize>())
        .transpose()
        .context("samples per signal is not an integer")?;

    let signals = lines
        .take(nsig)
        .enumerate()
        .map(|(idx, line)| {
            parse_signal_line(line).with_context(|| format!("signal line {}", idx + 1))
        })
        .collect::<Result<Vec<_>>>()?;
    if signals.len() != nsig {
        anyhow::bail!(
            "record line declares {} signals but {} are specified",
            nsig,
            signals.len()
        );
    }
    Ok(RecordHeader {
        name,
        fs,
        samples_per_signal,
        signals,
    })
}

fn storage_format(code: u32) -> Option<StorageFormat> {
    Some(match code {
        8 => StorageFormat::_8bit_first_difference,
        16 => StorageFormat::_16bit_twos_complement,
        24 => StorageFormat::_24bit_twos_complement_lsb,
        32 => StorageFormat::_32bit_twos_complement_lsb,
        61 => StorageFormat::_16bit_twos_complement_msb,
        80 => StorageFormat::_8bit_offset_binary,
        160 => StorageFormat::_16bit_offset_binary,
        212 => StorageFormat::_12bit_twos_complement,
        310 => StorageFormat::_10bit_twos_complement_sets_of_11,
        311 => StorageFormat::_10bit_twos_complement_sets_of_4,
        _ => return None,
    })
}

fn parse_signal_line(line: &str) -> Result<SignalSpec> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let filename = tokens[0].to_string();
    let format_tok: &str = tokens.get(1).copied().context("missing storage format")?;

    // format[xspf][:skew][+offset]
    let digits = format_tok
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(format_tok.len());
    let code: u32 = format_tok[..digits]
        .parse()
        .with_context(|| format!("storage format {:?} is not a number", format_tok))?;
    let format = storage_format(code)
        .with_context(|| format!("unknown storage format {}", code))?;
    if let Some((_, rest)) = format_tok.split_once('x') {
        let spf = rest.split(|c: char| c == ':' || c == '+').next().unwrap_or_default();
        if spf != "1" {
            anyhow::bail!("multi-frequency signals ({}) are not supported", format_tok);
        }
    }
    let byte_offset = format_tok
        .split_once('+')
        .map(|(_, off)| off.parse::<usize>())
        .transpose()
        .with_context(|| format!("byte offset in {:?} is not an integer", format_tok))?
        .unwrap_or(0);

    // gain[(baseline)][/units]
    let mut gain = DEFAULT_GAIN;
    let mut explicit_baseline = None;
    if let Some(tok) = tokens.get(2) {
        let adc = tok.split('/').next().unwrap_or_default();
        let (gain_str, base_str) = match adc.split_once('(') {
            Some((g, rest)) => (g, Some(rest.trim_end_matches(')'))),
            None => (adc, None),
        };
        let parsed: f64 = gain_str
            .parse()
            .with_context(|| format!("ADC gain {:?} is not a number", tok))?;
        if parsed != 0.0 {
            gain = parsed;
        }
        explicit_baseline = base_str
            .map(|b| b.parse::<i32>())
            .transpose()
            .with_context(|| format!("baseline in {:?} is not an integer", tok))?;
    }
    let adc_zero = tokens
        .get(4)
        .map(|tok| tok.parse::<i32>())
        .transpose()
        .context("ADC zero is not an integer")?
        .unwrap_or(0);
    let description = (tokens.len() > 8).then(|| tokens[8..].join(" "));

    Ok(SignalSpec {
        filename,
        format,
        byte_offset,
        gain,
        baseline: explicit_baseline.unwrap_or(adc_zero),
        description,
    })
}

/// Decode the raw ADC values of a signal file. Formats 16 and 212 are supported.
pub fn decode_samples(buf: &[u8], format: StorageFormat) -> Result<Vec<i16>> {
    match format {
        StorageFormat::_16bit_twos_complement => Ok(buf
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect()),
        StorageFormat::_12bit_twos_complement => Ok(parse_212_format(buf)),
        other => anyhow::bail!("WFDB storage format {:?} is not supported", other),
    }
}

/// Load the specified signal (lead) from a WFDB header/data pair into a TimeSeries.
pub fn load_wfdb_lead(header_path: &Path, lead: usize) -> Result<TimeSeries> {
    let text = fs::read_to_string(header_path)
        .with_context(|| format!("failed to read WFDB header {}", header_path.display()))?;
    let header =
        parse_header(&text).with_context(|| format!("invalid header {}", header_path.display()))?;
    let Some(spec) = header.signals.get(lead) else {
        anyhow::bail!(
            "WFDB record contains {} signals, but lead {} was requested",
            header.signals.len(),
            lead
        );
    };
    let dir = header_path.parent().unwrap_or_else(|| Path::new("."));
    for signal in &header.signals {
        let path = dir.join(&signal.filename);
        if !path.is_file() {
            anyhow::bail!(
                "signal file {} named in {} does not exist",
                path.display(),
                header_path.display()
            );
        }
    }

    // signals sharing a file are interleaved sample by sample
    let group: Vec<&SignalSpec> = header
        .signals
        .iter()
        .filter(|s| s.filename == spec.filename)
        .collect();
    if group.iter().any(|s| s.format != spec.format) {
        anyhow::bail!("signals stored in {} mix storage formats", spec.filename);
    }
    let position = header.signals[..lead]
        .iter()
        .filter(|s| s.filename == spec.filename)
        .count();

    let buf = read_bytes(&dir.join(&spec.filename))?;
    let body = buf.get(spec.byte_offset..).unwrap_or_default();
    let mut raw: Vec<i16> = decode_samples(body, spec.format)?
        .into_iter()
        .skip(position)
        .step_by(group.len())
        .collect();
    if let Some(n) = header.samples_per_signal {
        raw.truncate(n);
    }
    if raw.is_empty() {
        anyhow::bail!("{} holds no samples for lead {}", spec.filename, lead);
    }

    let baseline = spec.baseline as f64;
    let data = raw
        .iter()
        .map(|&sample| (sample as f64 - baseline) / spec.gain)
        .collect();
    Ok(TimeSeries {
        fs: header.fs,
        data,
    })
}

/// Parse MIT annotation binary stream into samples & codes.
pub fn parse_wfdb_annotations(buf: &[u8]) -> Vec<WfdbAnnotation> {
    let mut out = Vec::new();
    let mut idx = 0;
    let mut sample: usize = 0;
    while idx + 2 <= buf.len() {
        let word = u16::from_le_bytes([buf[idx], buf[idx + 1]]);
        idx += 2;
        let code = (word >> 10) as u8;
        let diff = (word & 0x03FF) as usize;
        if code == 0 && diff == 0 {
            break;
        }
        match code {
            59 => {
                if idx + 4 > buf.len() {
                    break;
                }
                let high = u16::from_le_bytes([buf[idx], buf[idx + 1]]) as u32;
                let low = u16::from_le_bytes([buf[idx + 2], buf[idx + 3]]) as u32;
                idx += 4;
                let skip = ((high << 16) | low) as i32;
                sample = (sample as i64 + skip as i64).max(0) as usize;
            }
            // NUM/SUB/CHN carry a field value, not a time offset
            60..=62 => {}
            63 => {
                idx += diff;
                if diff % 2 != 0 {
                    idx += 1;
                }
            }
            _ => {
                sample = sample.wrapping_add(diff);
                out.push(WfdbAnnotation { sample, code });
            }
        }
    }
    out
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Read a WFDB annotation file and convert it to symbol-tagged annotations.
pub fn load_wfdb_annotations(path: &Path) -> Result<Vec<Annotation>> {
    let buf = read_bytes(path)?;
    let annotations: Vec<Annotation> = parse_wfdb_annotations(&buf)
        .into_iter()
        .map(|ann| Annotation::new(ann.sample, ann.symbol()))
        .collect();
    ensure_increasing(&annotations).with_context(|| format!("in {}", path.display()))?;
    Ok(annotations)
}

/// WFDB records addressed as `<root>/<record>.hea`; lead 0 is used.
#[derive(Debug, Clone)]
pub struct WfdbSignalReader {
    pub root: PathBuf,
}

impl WfdbSignalReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SignalReader for WfdbSignalReader {
    fn read(&self, record: &str) -> Result<RawRecord> {
        let header = self.root.join(format!("{}.hea", record));
        let ts = load_wfdb_lead(&header, 0)?;
        let fs = integral_fs(ts.fs).with_context(|| {
            format!(
                "{} declares a non-integer sampling rate {}",
                header.display(),
                ts.fs
            )
        })?;
        Ok(RawRecord::new(ts.data, fs))
    }
}

/// MIT-format annotation files addressed as `<root>/<record>.<extension>`.
#[derive(Debug, Clone)]
pub struct WfdbAnnotationReader {
    pub root: PathBuf,
}

impl WfdbAnnotationReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AnnotationReader for WfdbAnnotationReader {
    fn read(&self, record: &str, extension: &str) -> Result<Vec<Annotation>> {
        load_wfdb_annotations(&self.root.join(format!("{}.{}", record, extension)))
    }
}
