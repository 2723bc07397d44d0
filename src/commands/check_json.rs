use super::validate::ValidationStats;
use crate::config::Config;
use crate::read::Read;
use crate::record::RawRead;
use anyhow::{Context, Result};
use log::info;
use std::fs;
use std::path::Path;

pub fn load_records(path: &Path) -> Result<Vec<RawRead>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse records from {}", path.display()))
}

pub fn check_records(records: Vec<RawRead>, max_failures: usize) -> ValidationStats {
    let mut stats = ValidationStats::default();
    for record in records {
        let result = Read::new(record);
        stats.add(result.as_ref(), max_failures);
    }
    stats
}

pub fn run(json_file: String) -> Result<()> {
    let config = Config::load();
    let records = load_records(Path::new(&json_file))?;
    info!("Loaded {} records from {}", records.len(), json_file);

    let stats = check_records(records, config.report_failures);
    stats.print_summary();

    Ok(())
}
