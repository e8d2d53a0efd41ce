//! Audit engagements and their findings.

use crate::models::{CreateAuditRequest, CreateFindingRequest};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use grc_core::config::RemediationSla;
use grc_core::error::{GrcError, GrcResult};
use grc_core::types::day_span;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditType {
    Internal,
    External,
    Regulatory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditStatus {
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

impl AuditStatus {
    pub fn can_transition_to(&self, to: AuditStatus) -> bool {
        use AuditStatus::*;
        matches!(
            (self, to),
            (Planned, InProgress)
                | (InProgress, Completed)
                | (Planned, Cancelled)
                | (InProgress, Cancelled)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FindingSeverity {
    Critical,
    High,
    Medium,
    Low,
}

impl FindingSeverity {
    /// Remediation window for a finding of this severity.
    pub fn sla_days(&self, sla: &RemediationSla) -> i64 {
        match self {
            FindingSeverity::Critical => sla.critical,
            FindingSeverity::High => sla.high,
            FindingSeverity::Medium => sla.medium,
            FindingSeverity::Low => sla.low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FindingStatus {
    Open,
    Remediating,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditFinding {
    pub id: Uuid,
    pub audit_id: Uuid,
    pub title: String,
    pub description: String,
    pub severity: FindingSeverity,
    pub status: FindingStatus,
    pub due_date: DateTime<Utc>,
    pub owner_id: Option<Uuid>,
    pub closure_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEngagement {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    pub audit_type: AuditType,
    pub scope: String,
    pub status: AuditStatus,
    pub planned_start: DateTime<Utc>,
    pub planned_end: DateTime<Utc>,
    pub actual_start: Option<DateTime<Utc>>,
    pub actual_end: Option<DateTime<Utc>>,
    pub lead_auditor_id: Option<Uuid>,
    pub findings: Vec<AuditFinding>,
    pub created_at: DateTime<Utc>,
}

pub struct AuditEngagementService {
    audits: DashMap<Uuid, AuditEngagement>,
    sla: RemediationSla,
}

impl AuditEngagementService {
    pub fn new(sla: RemediationSla) -> Self {
        Self {
            audits: DashMap::new(),
            sla,
        }
    }

    pub fn create(&self, tenant_id: Uuid, req: CreateAuditRequest) -> GrcResult<AuditEngagement> {
        if req.title.trim().is_empty() {
            return Err(GrcError::Validation("Audit title is required".into()));
        }
        if req.planned_end < req.planned_start {
            return Err(GrcError::Validation("Planned end must not precede planned start".into()));
        }
        let audit = AuditEngagement {
            id: Uuid::new_v4(),
            tenant_id,
            title: req.title,
            audit_type: req.audit_type,
            scope: req.scope,
            status: AuditStatus::Planned,
            planned_start: req.planned_start,
            planned_end: req.planned_end,
            actual_start: None,
            actual_end: None,
            lead_auditor_id: req.lead_auditor_id,
            findings: Vec::new(),
            created_at: Utc::now(),
        };
        info!(tenant_id = %tenant_id, audit_id = %audit.id, audit_type = ?audit.audit_type, "Audit planned");
        self.audits.insert(audit.id, audit.clone());
        Ok(audit)
    }

    pub fn get(&self, tenant_id: Uuid, id: Uuid) -> GrcResult<AuditEngagement> {
        self.audits
            .get(&id)
            .filter(|a| a.tenant_id == tenant_id)
            .map(|a| a.value().clone())
            .ok_or_else(|| GrcError::not_found("Audit", id))
    }

    pub fn list(&self, tenant_id: Uuid) -> Vec<AuditEngagement> {
        let mut list: Vec<AuditEngagement> = self
            .audits
            .iter()
            .filter(|a| a.tenant_id == tenant_id)
            .map(|a| a.value().clone())
            .collect();
        list.sort_by(|a, b| a.planned_start.cmp(&b.planned_start));
        list
    }

    pub fn transition(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        to: AuditStatus,
    ) -> GrcResult<AuditEngagement> {
        let mut entry = self
            .audits
            .get_mut(&id)
            .filter(|a| a.tenant_id == tenant_id)
            .ok_or_else(|| GrcError::not_found("Audit", id))?;
        if !entry.status.can_transition_to(to) {
            return Err(GrcError::invalid_transition(entry.status, to));
        }
        let now = Utc::now();
        match to {
            AuditStatus::InProgress => entry.actual_start = Some(now),
            AuditStatus::Completed | AuditStatus::Cancelled => entry.actual_end = Some(now),
            AuditStatus::Planned => {}
        }
        entry.status = to;
        info!(tenant_id = %tenant_id, audit_id = %id, status = ?to, "Audit status changed");
        Ok(entry.clone())
    }

    /// Planned audits starting within the next `days` days.
    pub fn upcoming(&self, tenant_id: Uuid, days: i64) -> GrcResult<Vec<AuditEngagement>> {
        let now = Utc::now();
        let horizon = now + day_span("upcoming_days", days)?;
        Ok(self
            .list(tenant_id)
            .into_iter()
            .filter(|a| {
                a.status == AuditStatus::Planned
                    && a.planned_start >= now
                    && a.planned_start <= horizon
            })
            .collect())
    }

    /// Add a finding; without an explicit due date the remediation SLA for its severity applies.
    pub fn add_finding(
        &self,
        tenant_id: Uuid,
        audit_id: Uuid,
        req: CreateFindingRequest,
    ) -> GrcResult<AuditFinding> {
        let mut entry = self
            .audits
            .get_mut(&audit_id)
            .filter(|a| a.tenant_id == tenant_id)
            .ok_or_else(|| GrcError::not_found("Audit", audit_id))?;
        if matches!(entry.status, AuditStatus::Cancelled) {
            return Err(GrcError::Conflict("Cannot add findings to a cancelled audit".into()));
        }
        let now = Utc::now();
        let finding = AuditFinding {
            id: Uuid::new_v4(),
            audit_id,
            title: req.title,
            description: req.description,
            severity: req.severity,
            status: FindingStatus::Open,
            due_date: req
                .due_date
                .unwrap_or_else(|| now + Duration::days(req.severity.sla_days(&self.sla))),
            owner_id: req.owner_id,
            closure_note: None,
            created_at: now,
            closed_at: None,
        };
        entry.findings.push(finding.clone());
        info!(tenant_id = %tenant_id, audit_id = %audit_id, severity = ?finding.severity, "Audit finding raised");
        Ok(finding)
    }

    fn update_finding<F>(
        &self,
        tenant_id: Uuid,
        audit_id: Uuid,
        finding_id: Uuid,
        apply: F,
    ) -> GrcResult<AuditFinding>
    where
        F: FnOnce(&mut AuditFinding) -> GrcResult<()>,
    {
        let mut entry = self
            .audits
            .get_mut(&audit_id)
            .filter(|a| a.tenant_id == tenant_id)
            .ok_or_else(|| GrcError::not_found("Audit", audit_id))?;
        let finding = entry
            .findings
            .iter_mut()
            .find(|f| f.id == finding_id)
            .ok_or_else(|| GrcError::not_found("Finding", finding_id))?;
        apply(finding)?;
        Ok(finding.clone())
    }

    pub fn start_remediation(
        &self,
        tenant_id: Uuid,
        audit_id: Uuid,
        finding_id: Uuid,
    ) -> GrcResult<AuditFinding> {
        self.update_finding(tenant_id, audit_id, finding_id, |f| {
            if f.status != FindingStatus::Open {
                return Err(GrcError::invalid_transition(f.status, FindingStatus::Remediating));
            }
            f.status = FindingStatus::Remediating;
            Ok(())
        })
    }

    pub fn close_finding(
        &self,
        tenant_id: Uuid,
        audit_id: Uuid,
        finding_id: Uuid,
        note: Option<String>,
    ) -> GrcResult<AuditFinding> {
        self.update_finding(tenant_id, audit_id, finding_id, |f| {
            if f.status == FindingStatus::Closed {
                return Err(GrcError::invalid_transition(f.status, FindingStatus::Closed));
            }
            f.status = FindingStatus::Closed;
            f.closure_note = note;
            f.closed_at = Some(Utc::now());
            Ok(())
        })
    }

    /// Open (not closed) findings by severity.
    pub fn finding_counts(&self, tenant_id: Uuid) -> BTreeMap<FindingSeverity, usize> {
        let mut counts = BTreeMap::new();
        for audit in self.audits.iter().filter(|a| a.tenant_id == tenant_id) {
            for f in audit.findings.iter().filter(|f| f.status != FindingStatus::Closed) {
                *counts.entry(f.severity).or_insert(0) += 1;
            }
        }
        counts
    }

    pub fn overdue_findings(&self, tenant_id: Uuid, now: DateTime<Utc>) -> Vec<AuditFinding> {
        self.audits
            .iter()
            .filter(|a| a.tenant_id == tenant_id)
            .flat_map(|a| a.findings.clone())
            .filter(|f| f.status != FindingStatus::Closed && f.due_date < now)
            .collect()
    }
}
