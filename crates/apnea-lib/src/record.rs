//! Reader seams between the extractor and on-disk recordings.

use crate::signal::{Annotation, RawRecord};
use anyhow::{bail, Result};

/// Loads the raw single-lead signal and its sampling rate for a record.
pub trait SignalReader: Send + Sync {
    fn read(&self, record: &str) -> Result<RawRecord>;
}

/// Loads the annotation set stored next to a record under the given extension.
pub trait AnnotationReader: Send + Sync {
    fn read(&self, record: &str, extension: &str) -> Result<Vec<Annotation>>;
}

impl<T: SignalReader + ?Sized> SignalReader for Box<T> {
    fn read(&self, record: &str) -> Result<RawRecord> {
        (**self).read(record)
    }
}

impl<T: AnnotationReader + ?Sized> AnnotationReader for Box<T> {
    fn read(&self, record: &str, extension: &str) -> Result<Vec<Annotation>> {
        (**self).read(record, extension)
    }
}

/// Annotation sample positions must be strictly increasing.
pub fn ensure_increasing(annotations: &[Annotation]) -> Result<()> {
    for (idx, pair) in annotations.windows(2).enumerate() {
        if pair[1].sample <= pair[0].sample {
            bail!(
                "annotation {} at sample {} does not follow sample {}",
                idx + 1,
                pair[1].sample,
                pair[0].sample
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_increasing_and_rejects_repeats() {
        let ok = vec![Annotation::new(1, "N"), Annotation::new(5, "A")];
        assert!(ensure_increasing(&ok).is_ok());
        let bad = vec![Annotation::new(5, "N"), Annotation::new(5, "A")];
        assert!(ensure_increasing(&bad).is_err());
        assert!(ensure_increasing(&[]).is_ok());
    }
}
