use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionPolicy {
    /// Compact after a write once both thresholds are crossed.
    pub auto: bool,
    pub min_dead_bytes: u64,
    /// Fraction of the log that must be dead (0.0..=1.0).
    pub dead_ratio: f64,
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        Self {
            auto: true,
            min_dead_bytes: 64 * 1024,
            dead_ratio: 0.5,
        }
    }
}

impl CompactionPolicy {
    pub fn should_compact(&self, log_bytes: u64, dead_bytes: u64) -> bool {
        self.auto
            && log_bytes > 0
            && dead_bytes >= self.min_dead_bytes
            && (dead_bytes as f64 / log_bytes as f64) >= self.dead_ratio
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// fsync the data log before every manifest commit.
    pub sync_writes: bool,
    /// Read every live record at open; unreadable ones are dropped and reported.
    pub verify_on_open: bool,
    /// Replay the data log when the manifest is missing or damaged.
    pub rebuild_from_log: bool,
    pub compaction: CompactionPolicy,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            sync_writes: true,
            verify_on_open: false,
            rebuild_from_log: false,
            compaction: CompactionPolicy::default(),
        }
    }
}

impl StoreOptions {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read(path)?;
        let options: StoreOptions = serde_json::from_slice(&raw)
            .map_err(|e| StoreError::Options(format!("{}: {e}", path.display())))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        let ratio = self.compaction.dead_ratio;
        if !(0.0..=1.0).contains(&ratio) {
            return Err(StoreError::Options(format!(
                "compaction.dead_ratio must be within 0..=1, got {ratio}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn partial_json_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, r#"{"verify_on_open": true, "compaction": {"auto": false}}"#).unwrap();
        let options = StoreOptions::load(&path).unwrap();
        assert!(options.verify_on_open);
        assert!(options.sync_writes);
        assert!(!options.compaction.auto);
        assert_eq!(options.compaction.min_dead_bytes, 64 * 1024);
    }

    #[test]
    fn invalid_ratio_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, r#"{"compaction": {"dead_ratio": 1.5}}"#).unwrap();
        assert!(matches!(
            StoreOptions::load(&path),
            Err(StoreError::Options(_))
        ));
    }

    #[test]
    fn compaction_thresholds() {
        let policy = CompactionPolicy {
            auto: true,
            min_dead_bytes: 100,
            dead_ratio: 0.5,
        };
        assert!(!policy.should_compact(1000, 99));
        assert!(!policy.should_compact(1000, 400));
        assert!(policy.should_compact(1000, 500));
        assert!(!CompactionPolicy { auto: false, ..policy }.should_compact(1000, 900));
    }
}
