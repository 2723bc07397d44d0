use super::validate::BATCH_SIZE;
use crate::config::Config;
use crate::summary::ReadSummary;
use crate::utils::bam_reader::{BamReaderFactory, RecordBatches};
use crate::utils::progress_bar_builder::ProgressBarBuilder;
use crate::utils::threading::ReadPool;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};

#[derive(Debug, Serialize)]
pub struct InspectReport {
    pub generated_at: String,
    pub input: String,
    pub records: u64,
    pub invalid_records: u64,
    pub reads: Vec<ReadSummary>,
}

pub fn run(
    bam_file: String,
    output_file: String,
    reference: Option<String>,
    min_base_quality: Option<u8>,
    max_records: Option<usize>,
    canonical_only: bool,
) -> Result<()> {
    let mut config = Config::load();
    if let Some(min_base_quality) = min_base_quality {
        config.min_base_quality = min_base_quality;
    }
    if let Some(max_records) = max_records {
        config.max_records = max_records;
    }
    let num_threads = config.worker_threads();

    let reader = BamReaderFactory::open(&bam_file, reference.as_deref())?;
    let progress = ProgressBarBuilder::new("Inspecting reads")
        .with_template("{spinner:.green} [{elapsed_precise}] {pos} records inspected ({per_sec})")
        .with_tick()
        .build()?;

    let mut report = InspectReport {
        generated_at: chrono::Local::now().to_rfc3339(),
        input: bam_file.clone(),
        records: 0,
        invalid_records: 0,
        reads: Vec::new(),
    };

    for batch in RecordBatches::new(reader, BATCH_SIZE, config.max_records) {
        let batch = batch?;
        let count = batch.len() as u64;

        let mut pool = ReadPool::new(num_threads);
        for record in batch {
            pool.send(record);
        }

        for result in pool.finish() {
            report.records += 1;
            let read = match result {
                Ok(read) => read,
                Err(e) => {
                    report.invalid_records += 1;
                    debug!("Skipping record: {}", e);
                    continue;
                }
            };
            if canonical_only && !read.is_canonical_record() {
                continue;
            }
            match ReadSummary::from_read(&read, config.min_base_quality) {
                Ok(summary) => report.reads.push(summary),
                Err(e) => {
                    report.invalid_records += 1;
                    warn!("Could not summarize read: {}", e);
                }
            }
        }

        progress.inc(count);
    }
    progress.finish_with_message("Inspection complete");

    if report.invalid_records > 0 {
        warn!(
            "{} of {} records were skipped as invalid",
            report.invalid_records, report.records
        );
    }

    let file = File::create(&output_file)
        .with_context(|| format!("Failed to create {}", output_file))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &report)?;
    writer.flush()?;

    info!("Wrote {} read summaries to {}", report.reads.len(), output_file);
    println!("Read summaries written to: {}", output_file);

    Ok(())
}
