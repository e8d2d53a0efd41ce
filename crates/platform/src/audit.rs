//! Audit trail: tamper-evident event store with cryptographic hash chaining,
//! tenant-scoped queries, and compliance reporting.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

const GENESIS_HASH: &str = "genesis";

/// A single audit event with tamper-evident hash chaining.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub sequence: u64,
    pub tenant_id: Uuid,
    /// `None` for system-initiated actions.
    pub user_id: Option<Uuid>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub compliance_flags: Vec<String>,
    /// SHA-256 hash of this event's content.
    pub event_hash: String,
    /// Hash of the previous event in the chain (`genesis` for the first).
    pub previous_hash: String,
}

/// Tamper-evident append-only audit log with hash chaining.
pub struct AuditLogger {
    events: DashMap<Uuid, AuditEvent>,
    sequence: parking_lot::Mutex<u64>,
    last_hash: parking_lot::Mutex<String>,
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLogger {
    /// Create a new empty audit logger with genesis hash.
    pub fn new() -> Self {
        Self {
            events: DashMap::new(),
            sequence: parking_lot::Mutex::new(0),
            last_hash: parking_lot::Mutex::new(GENESIS_HASH.to_string()),
        }
    }

    /// Record an action and return the chained event.
    pub fn log_action(
        &self,
        tenant_id: Uuid,
        user_id: Option<Uuid>,
        action: &str,
        resource_type: &str,
        resource_id: &str,
        details: serde_json::Value,
        compliance_flags: Vec<String>,
    ) -> AuditEvent {
        let event = AuditEvent {
            id: Uuid::new_v4(),
            sequence: 0,
            tenant_id,
            user_id,
            action: action.to_string(),
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            details,
            timestamp: Utc::now(),
            compliance_flags,
            event_hash: String::new(),
            previous_hash: String::new(),
        };
        let chained = self.chain_event(event);
        info!(
            event_id = %chained.id,
            tenant_id = %tenant_id,
            sequence = chained.sequence,
            action = %chained.action,
            resource = %chained.resource_type,
            "Audit event logged"
        );
        self.events.insert(chained.id, chained.clone());
        chained
    }

    /// Chain an event: assign sequence, compute hash, link to previous.
    fn chain_event(&self, mut event: AuditEvent) -> AuditEvent {
        let mut seq = self.sequence.lock();
        *seq += 1;
        event.sequence = *seq;

        let mut prev_hash = self.last_hash.lock();
        event.previous_hash = prev_hash.clone();
        event.event_hash = content_hash(&event);
        *prev_hash = event.event_hash.clone();

        event
    }

    /// Verify the integrity of the audit chain.
    pub fn verify_chain(&self) -> ChainVerification {
        let mut events: Vec<AuditEvent> = self.events.iter().map(|e| e.value().clone()).collect();
        events.sort_by_key(|e| e.sequence);

        let total = events.len();
        let mut valid = 0;
        let mut tampered = Vec::new();
        let mut expected_prev = GENESIS_HASH.to_string();

        for event in &events {
            if event.previous_hash == expected_prev && content_hash(event) == event.event_hash {
                valid += 1;
            } else {
                tampered.push(event.sequence);
            }
            expected_prev = event.event_hash.clone();
        }

        ChainVerification {
            total_events: total,
            valid_events: valid,
            tampered_sequences: tampered,
            chain_intact: valid == total,
        }
    }

    /// Query events for a tenant with optional time range, action filter, and limit.
    /// Newest first.
    pub fn query(
        &self,
        tenant_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        action: Option<&str>,
        limit: usize,
    ) -> Vec<AuditEvent> {
        let mut results: Vec<AuditEvent> = self
            .events
            .iter()
            .filter(|e| {
                let ev = e.value();
                ev.tenant_id == tenant_id
                    && from.map_or(true, |f| ev.timestamp >= f)
                    && to.map_or(true, |t| ev.timestamp <= t)
                    && action.map_or(true, |a| ev.action == a)
            })
            .map(|e| e.value().clone())
            .collect();

        results.sort_by(|a, b| b.sequence.cmp(&a.sequence));
        results.truncate(limit);
        results
    }

    /// Events recorded against one resource, oldest first.
    pub fn resource_history(
        &self,
        tenant_id: Uuid,
        resource_type: &str,
        resource_id: &str,
    ) -> Vec<AuditEvent> {
        let mut results: Vec<AuditEvent> = self
            .events
            .iter()
            .filter(|e| {
                e.tenant_id == tenant_id
                    && e.resource_type == resource_type
                    && e.resource_id == resource_id
            })
            .map(|e| e.value().clone())
            .collect();
        results.sort_by_key(|e| e.sequence);
        results
    }

    /// Generate a compliance report summarising events in a time range.
    pub fn export_compliance_report(
        &self,
        tenant_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> serde_json::Value {
        let mut action_counts: HashMap<String, u64> = HashMap::new();
        let mut total: u64 = 0;
        let mut compliance_flagged: u64 = 0;

        for entry in self.events.iter() {
            let ev = entry.value();
            if ev.tenant_id != tenant_id || ev.timestamp < from || ev.timestamp > to {
                continue;
            }
            *action_counts.entry(ev.action.clone()).or_default() += 1;
            total += 1;
            if !ev.compliance_flags.is_empty() {
                compliance_flagged += 1;
            }
        }

        let chain = self.verify_chain();

        serde_json::json!({
            "tenant_id": tenant_id,
            "period": { "from": from, "to": to },
            "total_events": total,
            "compliance_flagged_events": compliance_flagged,
            "events_by_action": action_counts,
            "chain_integrity": {
                "total": chain.total_events,
                "valid": chain.valid_events,
                "intact": chain.chain_intact,
            },
        })
    }

    #[cfg(test)]
    fn tamper(&self, sequence: u64, action: &str) {
        for mut e in self.events.iter_mut() {
            if e.sequence == sequence {
                e.action = action.to_string();
            }
        }
    }
}

/// Result of verifying the audit chain integrity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainVerification {
    pub total_events: usize,
    pub valid_events: usize,
    pub tampered_sequences: Vec<u64>,
    pub chain_intact: bool,
}

/// SHA-256 over sequence, action, resource, timestamp and previous hash.
fn content_hash(event: &AuditEvent) -> String {
    let content = format!(
        "{}:{}:{}:{}:{}:{}",
        event.sequence,
        event.action,
        event.resource_type,
        event.resource_id,
        event.timestamp.to_rfc3339(),
        event.previous_hash,
    );
    sha256_hex(&content)
}

/// Compute SHA-256 hex digest.
fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
