//! Snapshot Persistence
//!
//! Durable storage for the rule store: two named whole-collection JSON
//! snapshots (mock rules and blocked domains) in a data directory. Writes
//! replace the full snapshot; there is no append log.

use crate::error::{CoreError, CoreResult};
use crate::model::MockRule;
use std::fs;
use std::path::{Path, PathBuf};

const RULES_FILE: &str = "mock_rules.json";
const DOMAINS_FILE: &str = "blocked_domains.json";

/// Whole-collection snapshot files under one data directory
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    data_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Load the persisted mock rules; a missing snapshot is an empty store
    pub fn load_rules(&self) -> CoreResult<Vec<MockRule>> {
        self.load_collection(RULES_FILE)
    }

    /// Replace the mock-rule snapshot with the given collection
    pub fn save_rules(&self, rules: &[MockRule]) -> CoreResult<()> {
        self.save_collection(RULES_FILE, rules)
    }

    /// Load the persisted blocked domains; a missing snapshot is empty
    pub fn load_domains(&self) -> CoreResult<Vec<String>> {
        self.load_collection(DOMAINS_FILE)
    }

    /// Replace the blocked-domain snapshot with the given collection
    pub fn save_domains(&self, domains: &[String]) -> CoreResult<()> {
        self.save_collection(DOMAINS_FILE, domains)
    }

    fn load_collection<T: serde::de::DeserializeOwned>(&self, file: &str) -> CoreResult<Vec<T>> {
        let path = self.data_dir.join(file);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&path)?;
        serde_json::from_str(&data)
            .map_err(|e| CoreError::Persistence(format!("corrupt snapshot {}: {}", file, e)))
    }

    fn save_collection<T: serde::Serialize>(&self, file: &str, items: &[T]) -> CoreResult<()> {
        fs::create_dir_all(&self.data_dir)?;
        let json = serde_json::to_string_pretty(items)?;
        fs::write(self.data_dir.join(file), json)?;
        Ok(())
    }
}
