use crate::config::Config;
use crate::convert;
use crate::error::ReadError;
use crate::read::Read;
use crate::record::AlignmentRecord;
use crate::utils::bam_reader::{BamReaderFactory, RecordBatches};
use crate::utils::progress_bar_builder::ProgressBarBuilder;
use crate::utils::threading::ReadPool;
use anyhow::Result;
use log::{info, warn};
use std::collections::BTreeMap;

pub(crate) const BATCH_SIZE: usize = 10_000;

#[derive(Debug, Default)]
pub struct ValidationStats {
    pub total: u64,
    pub valid: u64,
    pub invalid: u64,
    pub aligned: u64,
    pub canonical: u64,
    pub by_invariant: BTreeMap<&'static str, u64>,
    pub failures: Vec<String>,
}

impl ValidationStats {
    pub fn add<R: AlignmentRecord>(
        &mut self,
        result: Result<&Read<R>, &ReadError>,
        max_failures: usize,
    ) {
        self.total += 1;
        match result {
            Ok(read) => {
                self.valid += 1;
                if read.is_aligned() {
                    self.aligned += 1;
                }
                if read.is_canonical_record() {
                    self.canonical += 1;
                }
            }
            Err(e) => {
                self.invalid += 1;
                let kind = e.invariant().map_or("other", |inv| inv.kind());
                *self.by_invariant.entry(kind).or_insert(0) += 1;
                if self.failures.len() < max_failures {
                    warn!("{}", e);
                    self.failures.push(e.to_string());
                }
            }
        }
    }

    pub fn print_summary(&self) {
        println!("\nValidation Summary:");
        println!("Records checked: {}", self.total);
        println!("Valid reads: {}", self.valid);
        println!("  aligned: {}", self.aligned);
        println!("  canonical: {}", self.canonical);
        println!("Invalid reads: {}", self.invalid);
        for (kind, count) in &self.by_invariant {
            println!("  {}: {}", kind, count);
        }
        if !self.failures.is_empty() {
            println!("\nFirst {} failures:", self.failures.len());
            for failure in &self.failures {
                println!("  {}", failure);
            }
        }
    }
}

pub fn run(
    bam_file: String,
    reference: Option<String>,
    threads: Option<usize>,
    max_records: Option<usize>,
    strict: bool,
) -> Result<()> {
    let mut config = Config::load();
    if let Some(threads) = threads {
        config.threads = threads;
    }
    if let Some(max_records) = max_records {
        config.max_records = max_records;
    }
    let num_threads = config.worker_threads();
    info!("Validating {} with {} worker threads", bam_file, num_threads);

    let reader = BamReaderFactory::open(&bam_file, reference.as_deref())?;
    let progress = ProgressBarBuilder::new("Validating reads")
        .with_template("{spinner:.green} [{elapsed_precise}] {pos} records validated ({per_sec})")
        .with_tick()
        .build()?;

    let mut stats = ValidationStats::default();
    for batch in RecordBatches::new(reader, BATCH_SIZE, config.max_records) {
        let batch = batch?;
        let count = batch.len() as u64;

        if strict {
            let reads = match convert::to_reads_parallel(batch, num_threads) {
                Ok(reads) => reads,
                Err(e) => {
                    progress.finish_and_clear();
                    return Err(e.into());
                }
            };
            for read in &reads {
                stats.add(Ok(read), config.report_failures);
            }
        } else {
            let mut pool = ReadPool::new(num_threads);
            for record in batch {
                pool.send(record);
            }
            for result in pool.finish() {
                stats.add(result.as_ref(), config.report_failures);
            }
        }

        progress.inc(count);
    }

    progress.finish_with_message("Validation complete");
    stats.print_summary();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RawRead;

    #[test]
    fn test_stats_tally_by_invariant() {
        let records = vec![
            RawRead::unaligned("ok", "ACGT", &[30; 4]),
            RawRead::aligned("canonical", "ACGT", &[30; 4], 0, "4M", Some("4")),
            RawRead::unaligned("short-qual", "ACGT", &[30; 3]),
            RawRead {
                mapping_quality: Some(94),
                ..RawRead::aligned("high-mapq", "ACGT", &[30; 4], 0, "4M", None)
            },
            RawRead::unaligned("short-qual-2", "ACG", &[30; 4]),
        ];

        let mut stats = ValidationStats::default();
        for record in records {
            let result = Read::new(record);
            stats.add(result.as_ref(), 2);
        }

        assert_eq!(stats.total, 5);
        assert_eq!(stats.valid, 2);
        assert_eq!(stats.aligned, 1);
        assert_eq!(stats.canonical, 1);
        assert_eq!(stats.invalid, 3);
        assert_eq!(stats.by_invariant.get("length-mismatch"), Some(&2));
        assert_eq!(stats.by_invariant.get("mapping-quality-range"), Some(&1));
        assert_eq!(stats.failures.len(), 2);
    }
}
