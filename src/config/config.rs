use anyhow::Result;
use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Worker threads for validation; 0 uses all available cores.
    #[serde(default)]
    pub threads: usize,

    /// Stop after this many records; 0 reads everything.
    #[serde(default)]
    pub max_records: usize,

    /// Minimum base quality for a SNP to count as high quality.
    #[serde(default = "default_min_base_quality")]
    pub min_base_quality: u8,

    /// How many invalid reads to list in the validation report.
    #[serde(default = "default_report_failures")]
    pub report_failures: usize,
}

fn default_min_base_quality() -> u8 {
    20
}

fn default_report_failures() -> usize {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threads: 0,
            max_records: 0,
            min_base_quality: default_min_base_quality(),
            report_failures: default_report_failures(),
        }
    }
}

impl Config {
    pub fn path() -> Option<PathBuf> {
        ProjectDirs::from("com", "decodingus", "decodingus-reads")
            .map(|proj_dirs| proj_dirs.config_dir().join("config.toml"))
    }

    /// Loads the user config, falling back to defaults when it is missing
    /// or unreadable.
    pub fn load() -> Self {
        match Self::path() {
            Some(path) if path.exists() => Self::load_from(&path).unwrap_or_else(|e| {
                warn!("Ignoring config at {}: {}", path.display(), e);
                Config::default()
            }),
            _ => Config::default(),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        if let Some(path) = Self::path() {
            self.save_to(&path)?;
        }
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Number of worker threads to use, resolving 0 to the core count.
    pub fn worker_threads(&self) -> usize {
        if self.threads > 0 {
            return self.threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            threads: 3,
            max_records: 1000,
            min_base_quality: 30,
            report_failures: 5,
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "threads = 2\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.threads, 2);
        assert_eq!(config.min_base_quality, 20);
        assert_eq!(config.report_failures, 10);
        assert_eq!(config.worker_threads(), 2);
    }
}
