//! Rule Store
//!
//! In-memory mock rules and blocked domains, mirrored to snapshot storage on
//! every mutation. The in-memory copy is authoritative for the lifetime of
//! the process; the snapshot is best-effort durability for the next
//! activation, so persistence failures are logged and never fail the
//! mutation itself.

use crate::error::{CoreError, CoreResult};
use crate::model::MockRule;
use crate::store::SnapshotStore;
use std::collections::HashSet;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Domains every fresh install refuses to talk to
const DEFAULT_BLOCKED_DOMAINS: &[&str] = &["malicious-site.com", "evil-cdn.tk"];

#[derive(Debug, Default)]
struct Inner {
    /// Insertion order is the tie-break for rule matching; no priority field
    rules: Vec<MockRule>,
    blocked: HashSet<String>,
}

/// Mock rules plus the blocked-domain set, durably persisted
#[derive(Debug)]
pub struct RuleStore {
    inner: RwLock<Inner>,
    snapshots: SnapshotStore,
}

impl RuleStore {
    /// Create a store with the seeded blocked domains and no rules.
    /// Persisted state is brought in explicitly via [`RuleStore::hydrate`].
    pub fn new(snapshots: SnapshotStore) -> Self {
        let blocked = DEFAULT_BLOCKED_DOMAINS
            .iter()
            .map(|d| d.to_string())
            .collect();
        Self {
            inner: RwLock::new(Inner {
                rules: Vec::new(),
                blocked,
            }),
            snapshots,
        }
    }

    /// Load persisted rules and blocked domains into memory.
    ///
    /// Returns what was loaded so the caller can replay it as events and
    /// reconstruct downstream state deterministically.
    pub async fn hydrate(&self) -> CoreResult<(Vec<MockRule>, Vec<String>)> {
        let rules = self.snapshots.load_rules()?;
        let domains = self.snapshots.load_domains()?;

        let mut inner = self.inner.write().await;
        for rule in &rules {
            upsert(&mut inner.rules, rule.clone());
        }
        for domain in &domains {
            inner.blocked.insert(domain.to_lowercase());
        }
        info!(
            rules = rules.len(),
            domains = domains.len(),
            "loaded persisted interception state"
        );
        Ok((rules, domains))
    }

    /// Find the first enabled rule matching the request, in insertion order
    pub async fn find_matching_rule(&self, url: &str, method: &str) -> Option<MockRule> {
        let inner = self.inner.read().await;
        inner
            .rules
            .iter()
            .find(|rule| rule.matches(url, method))
            .cloned()
    }

    /// Insert a rule, replacing any existing rule with the same id in place
    pub async fn insert_rule(&self, rule: MockRule) {
        let mut inner = self.inner.write().await;
        upsert(&mut inner.rules, rule);
        self.persist_rules(&inner);
    }

    /// Flip a rule's enabled flag; returns the new state
    pub async fn toggle_rule(&self, rule_id: &str) -> CoreResult<bool> {
        let mut inner = self.inner.write().await;
        let rule = inner
            .rules
            .iter_mut()
            .find(|r| r.id == rule_id)
            .ok_or_else(|| CoreError::RuleNotFound {
                id: rule_id.to_string(),
            })?;
        rule.enabled = !rule.enabled;
        let enabled = rule.enabled;
        debug!(rule_id, enabled, "mock rule toggled");
        self.persist_rules(&inner);
        Ok(enabled)
    }

    /// Remove a rule; removing an unknown id is a no-op
    pub async fn delete_rule(&self, rule_id: &str) {
        let mut inner = self.inner.write().await;
        inner.rules.retain(|r| r.id != rule_id);
        self.persist_rules(&inner);
    }

    pub async fn block_domain(&self, domain: &str) {
        let mut inner = self.inner.write().await;
        inner.blocked.insert(domain.to_lowercase());
        self.persist_domains(&inner);
    }

    pub async fn unblock_domain(&self, domain: &str) {
        let mut inner = self.inner.write().await;
        inner.blocked.remove(&domain.to_lowercase());
        self.persist_domains(&inner);
    }

    /// Snapshot of the blocked-domain set for classification
    pub async fn blocked_domains(&self) -> HashSet<String> {
        self.inner.read().await.blocked.clone()
    }

    /// All rules in insertion order
    pub async fn rules(&self) -> Vec<MockRule> {
        self.inner.read().await.rules.clone()
    }

    /// Serialize the rule collection for export
    pub async fn export_json(&self) -> CoreResult<String> {
        let inner = self.inner.read().await;
        Ok(serde_json::to_string_pretty(&inner.rules)?)
    }

    /// Import a rule collection, upserting by id; returns what was
    /// imported.
    ///
    /// The whole import fails atomically on malformed JSON or a non-array
    /// top level; nothing is stored in that case.
    pub async fn import_json(&self, data: &str) -> CoreResult<Vec<MockRule>> {
        let value: serde_json::Value = serde_json::from_str(data)
            .map_err(|e| CoreError::Import(format!("invalid JSON: {}", e)))?;
        if !value.is_array() {
            return Err(CoreError::Import(
                "invalid format - must be an array of mock rules".to_string(),
            ));
        }
        let imported: Vec<MockRule> = serde_json::from_value(value)
            .map_err(|e| CoreError::Import(format!("invalid mock rule: {}", e)))?;

        let mut inner = self.inner.write().await;
        for rule in &imported {
            upsert(&mut inner.rules, rule.clone());
        }
        self.persist_rules(&inner);
        info!(count = imported.len(), "imported mock rules");
        Ok(imported)
    }

    /// Drop the in-memory rules without touching the persisted snapshot;
    /// they come back on the next hydrate
    pub async fn clear_in_memory(&self) {
        self.inner.write().await.rules.clear();
    }

    fn persist_rules(&self, inner: &Inner) {
        if let Err(e) = self.snapshots.save_rules(&inner.rules) {
            warn!(error = %e, "failed to persist mock rules; in-memory state remains authoritative");
        }
    }

    fn persist_domains(&self, inner: &Inner) {
        let mut domains: Vec<String> = inner.blocked.iter().cloned().collect();
        domains.sort();
        if let Err(e) = self.snapshots.save_domains(&domains) {
            warn!(error = %e, "failed to persist blocked domains; in-memory state remains authoritative");
        }
    }
}

fn upsert(rules: &mut Vec<MockRule>, rule: MockRule) {
    match rules.iter_mut().find(|r| r.id == rule.id) {
        Some(existing) => *existing = rule,
        None => rules.push(rule),
    }
}
