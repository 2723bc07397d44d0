// src/utils/bam_reader.rs
use anyhow::{Context, Result};
use rust_htslib::bam::{self, Read};

pub struct BamReaderFactory;

impl BamReaderFactory {
    pub fn open(bam_path: &str, reference_path: Option<&str>) -> Result<bam::Reader> {
        let mut reader = bam::Reader::from_path(bam_path)
            .with_context(|| format!("Failed to open {}", bam_path))?;
        if let Some(ref_path) = reference_path {
            if bam_path.ends_with(".cram") {
                reader.set_reference(ref_path)?;
            }
        }
        Ok(reader)
    }
}

/// Reads records in fixed-size batches.
///
/// Each yielded record is a detached copy (no shared header handle), so
/// batches can be handed to worker threads.
pub struct RecordBatches {
    reader: bam::Reader,
    record: bam::Record,
    batch_size: usize,
    remaining: Option<usize>,
}

impl RecordBatches {
    /// `max_records == 0` reads the whole file.
    pub fn new(reader: bam::Reader, batch_size: usize, max_records: usize) -> Self {
        Self {
            reader,
            record: bam::Record::new(),
            batch_size: batch_size.max(1),
            remaining: (max_records > 0).then_some(max_records),
        }
    }
}

impl Iterator for RecordBatches {
    type Item = Result<Vec<bam::Record>>;

    fn next(&mut self) -> Option<Self::Item> {
        let limit = match self.remaining {
            Some(0) => return None,
            Some(remaining) => remaining.min(self.batch_size),
            None => self.batch_size,
        };

        let mut batch = Vec::with_capacity(limit);
        while batch.len() < limit {
            match self.reader.read(&mut self.record) {
                Some(Ok(())) => batch.push(self.record.clone()),
                Some(Err(e)) => return Some(Err(e).context("Failed to read record")),
                None => break,
            }
        }

        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= batch.len();
            if batch.len() < limit {
                *remaining = 0;
            }
        }
        (!batch.is_empty()).then_some(Ok(batch))
    }
}
