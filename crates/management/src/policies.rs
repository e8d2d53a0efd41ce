//! Governance policy documents: review/approval lifecycle, publication and violations.

use crate::audits::FindingSeverity;
use crate::enforcement::{resource_document, PolicyGate};
use crate::models::{CreatePolicyRequest, UpdatePolicyRequest};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use grc_core::error::{GrcError, GrcResult};
use grc_core::types::day_span;
use grc_platform::policy::Principal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyStatus {
    Draft,
    UnderReview,
    Approved,
    Published,
    Retired,
}

impl PolicyStatus {
    pub fn can_transition_to(&self, to: PolicyStatus) -> bool {
        use PolicyStatus::*;
        matches!(
            (self, to),
            (Draft, UnderReview)
                | (UnderReview, Approved)
                | (UnderReview, Draft)
                | (Approved, Published)
                | (Approved, Retired)
                | (Published, Retired)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationStatus {
    Open,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyViolation {
    pub id: Uuid,
    pub policy_id: Uuid,
    pub description: String,
    pub severity: FindingSeverity,
    pub status: ViolationStatus,
    pub reported_by: Uuid,
    pub reported_at: DateTime<Utc>,
    pub resolution: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernancePolicy {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub code: String,
    pub title: String,
    pub category: String,
    pub content: String,
    pub version: String,
    pub status: PolicyStatus,
    pub is_active: bool,
    pub effective_date: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub owner_id: Option<Uuid>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyStatistics {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
    pub open_violations: usize,
    pub expiring_30_days: usize,
}

pub struct PolicyService {
    policies: DashMap<Uuid, GovernancePolicy>,
    violations: DashMap<Uuid, PolicyViolation>,
    gate: Arc<PolicyGate>,
}

impl PolicyService {
    pub fn new(gate: Arc<PolicyGate>) -> Self {
        Self {
            policies: DashMap::new(),
            violations: DashMap::new(),
            gate,
        }
    }

    pub fn create(&self, tenant_id: Uuid, req: CreatePolicyRequest) -> GrcResult<GovernancePolicy> {
        let code = req.code.trim().to_uppercase();
        if code.is_empty() || req.title.trim().is_empty() {
            return Err(GrcError::Validation("Policy code and title are required".into()));
        }
        validate_dates(req.effective_date, req.expiry_date)?;
        if self.policies.iter().any(|p| p.tenant_id == tenant_id && p.code == code) {
            return Err(GrcError::Conflict(format!("Policy '{code}' already exists")));
        }
        let now = Utc::now();
        let policy = GovernancePolicy {
            id: Uuid::new_v4(),
            tenant_id,
            code,
            title: req.title,
            category: req.category,
            content: req.content,
            version: "1.0".into(),
            status: PolicyStatus::Draft,
            is_active: true,
            effective_date: req.effective_date,
            expiry_date: req.expiry_date,
            owner_id: req.owner_id,
            approved_by: None,
            approved_at: None,
            published_at: None,
            created_at: now,
            updated_at: now,
        };
        info!(tenant_id = %tenant_id, policy = %policy.code, "Governance policy created");
        self.policies.insert(policy.id, policy.clone());
        Ok(policy)
    }

    pub fn get(&self, tenant_id: Uuid, id: Uuid) -> GrcResult<GovernancePolicy> {
        self.policies
            .get(&id)
            .filter(|p| p.tenant_id == tenant_id)
            .map(|p| p.value().clone())
            .ok_or_else(|| GrcError::not_found("Policy", id))
    }

    pub fn list(&self, tenant_id: Uuid) -> Vec<GovernancePolicy> {
        let mut list: Vec<GovernancePolicy> = self
            .policies
            .iter()
            .filter(|p| p.tenant_id == tenant_id)
            .map(|p| p.value().clone())
            .collect();
        list.sort_by(|a, b| a.code.cmp(&b.code));
        list
    }

    /// Only Draft policies are editable.
    pub fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        req: UpdatePolicyRequest,
    ) -> GrcResult<GovernancePolicy> {
        let mut entry = self
            .policies
            .get_mut(&id)
            .filter(|p| p.tenant_id == tenant_id)
            .ok_or_else(|| GrcError::not_found("Policy", id))?;
        if entry.status != PolicyStatus::Draft {
            return Err(GrcError::Conflict(format!(
                "Policy is {:?}; only drafts can be edited",
                entry.status
            )));
        }
        validate_dates(
            req.effective_date.or(entry.effective_date),
            req.expiry_date.or(entry.expiry_date),
        )?;
        let p = entry.value_mut();
        if let Some(title) = req.title {
            p.title = title;
        }
        if let Some(category) = req.category {
            p.category = category;
        }
        if let Some(content) = req.content {
            p.content = content;
        }
        if let Some(version) = req.version {
            p.version = version;
        }
        if req.effective_date.is_some() {
            p.effective_date = req.effective_date;
        }
        if req.expiry_date.is_some() {
            p.expiry_date = req.expiry_date;
        }
        if let Some(owner) = req.owner_id {
            p.owner_id = Some(owner);
        }
        p.updated_at = Utc::now();
        Ok(p.clone())
    }

    pub fn delete(&self, tenant_id: Uuid, id: Uuid) -> GrcResult<()> {
        let policy = self.get(tenant_id, id)?;
        if policy.status == PolicyStatus::Published {
            return Err(GrcError::Conflict(
                "Published policies must be retired, not deleted".into(),
            ));
        }
        self.policies.remove(&id);
        self.violations.retain(|_, v| v.policy_id != id);
        Ok(())
    }

    fn transition(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        to: PolicyStatus,
        actor: Option<Uuid>,
    ) -> GrcResult<GovernancePolicy> {
        let mut entry = self
            .policies
            .get_mut(&id)
            .filter(|p| p.tenant_id == tenant_id)
            .ok_or_else(|| GrcError::not_found("Policy", id))?;
        if !entry.status.can_transition_to(to) {
            return Err(GrcError::invalid_transition(entry.status, to));
        }
        let now = Utc::now();
        match to {
            PolicyStatus::Approved => {
                entry.approved_by = actor;
                entry.approved_at = Some(now);
            }
            PolicyStatus::Published => entry.published_at = Some(now),
            PolicyStatus::Retired => entry.is_active = false,
            PolicyStatus::Draft => {
                entry.approved_by = None;
                entry.approved_at = None;
            }
            PolicyStatus::UnderReview => {}
        }
        entry.status = to;
        entry.updated_at = now;
        info!(tenant_id = %tenant_id, policy = %entry.code, status = ?to, "Policy status changed");
        Ok(entry.clone())
    }

    pub fn submit_for_review(&self, tenant_id: Uuid, id: Uuid) -> GrcResult<GovernancePolicy> {
        self.transition(tenant_id, id, PolicyStatus::UnderReview, None)
    }

    pub fn request_changes(&self, tenant_id: Uuid, id: Uuid) -> GrcResult<GovernancePolicy> {
        self.transition(tenant_id, id, PolicyStatus::Draft, None)
    }

    pub fn approve(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        approver: Uuid,
    ) -> GrcResult<GovernancePolicy> {
        self.transition(tenant_id, id, PolicyStatus::Approved, Some(approver))
    }

    /// Publish an approved policy. The policy enforcer sees the document first.
    pub fn publish(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        principal: Principal,
    ) -> GrcResult<GovernancePolicy> {
        let policy = self.get(tenant_id, id)?;
        let doc = resource_document(
            "Policy",
            &format!("{:?}", policy.status),
            policy.owner_id,
            policy.approved_by,
            None,
            serde_json::json!({
                "code": policy.code,
                "category": policy.category,
                "version": policy.version,
            }),
        );
        self.gate.check(tenant_id, principal, "publish", "Policy", &id.to_string(), doc)?;
        self.transition(tenant_id, id, PolicyStatus::Published, None)
    }

    pub fn retire(&self, tenant_id: Uuid, id: Uuid) -> GrcResult<GovernancePolicy> {
        self.transition(tenant_id, id, PolicyStatus::Retired, None)
    }

    // ─── Violations ────────────────────────────────────────────────────

    pub fn record_violation(
        &self,
        tenant_id: Uuid,
        policy_id: Uuid,
        description: String,
        severity: FindingSeverity,
        reported_by: Uuid,
    ) -> GrcResult<PolicyViolation> {
        let policy = self.get(tenant_id, policy_id)?;
        if description.trim().is_empty() {
            return Err(GrcError::Validation("Violation description is required".into()));
        }
        let violation = PolicyViolation {
            id: Uuid::new_v4(),
            policy_id,
            description,
            severity,
            status: ViolationStatus::Open,
            reported_by,
            reported_at: Utc::now(),
            resolution: None,
            resolved_at: None,
        };
        info!(tenant_id = %tenant_id, policy = %policy.code, severity = ?severity, "Policy violation recorded");
        self.violations.insert(violation.id, violation.clone());
        Ok(violation)
    }

    pub fn resolve_violation(
        &self,
        tenant_id: Uuid,
        violation_id: Uuid,
        resolution: String,
    ) -> GrcResult<PolicyViolation> {
        let policy_id = self
            .violations
            .get(&violation_id)
            .map(|v| v.policy_id)
            .ok_or_else(|| GrcError::not_found("PolicyViolation", violation_id))?;
        self.get(tenant_id, policy_id)?;

        let mut entry = self
            .violations
            .get_mut(&violation_id)
            .ok_or_else(|| GrcError::not_found("PolicyViolation", violation_id))?;
        if entry.status == ViolationStatus::Resolved {
            return Err(GrcError::invalid_transition(entry.status, ViolationStatus::Resolved));
        }
        entry.status = ViolationStatus::Resolved;
        entry.resolution = Some(resolution);
        entry.resolved_at = Some(Utc::now());
        Ok(entry.clone())
    }

    pub fn violations(&self, tenant_id: Uuid, policy_id: Uuid) -> GrcResult<Vec<PolicyViolation>> {
        self.get(tenant_id, policy_id)?;
        let mut list: Vec<PolicyViolation> = self
            .violations
            .iter()
            .filter(|v| v.policy_id == policy_id)
            .map(|v| v.value().clone())
            .collect();
        list.sort_by(|a, b| b.reported_at.cmp(&a.reported_at));
        Ok(list)
    }

    fn open_violation_count(&self, policy_id: Uuid) -> usize {
        self.violations
            .iter()
            .filter(|v| v.policy_id == policy_id && v.status == ViolationStatus::Open)
            .count()
    }

    pub fn is_compliant(&self, tenant_id: Uuid, id: Uuid) -> GrcResult<bool> {
        let policy = self.get(tenant_id, id)?;
        Ok(policy.is_active
            && matches!(policy.status, PolicyStatus::Approved | PolicyStatus::Published)
            && self.open_violation_count(id) == 0)
    }

    /// Active policies whose expiry falls within the next `days` days.
    pub fn expiring_within(&self, tenant_id: Uuid, days: i64) -> GrcResult<Vec<GovernancePolicy>> {
        let now = Utc::now();
        let horizon = now + day_span("expiring_within_days", days)?;
        Ok(self
            .list(tenant_id)
            .into_iter()
            .filter(|p| p.is_active && p.expiry_date.map_or(false, |d| d >= now && d <= horizon))
            .collect())
    }

    pub fn statistics(&self, tenant_id: Uuid) -> PolicyStatistics {
        let policies = self.list(tenant_id);
        let mut stats = PolicyStatistics {
            total: policies.len(),
            expiring_30_days: self.expiring_within(tenant_id, 30).map_or(0, |p| p.len()),
            ..Default::default()
        };
        for p in &policies {
            *stats.by_status.entry(format!("{:?}", p.status)).or_insert(0) += 1;
            *stats.by_category.entry(p.category.clone()).or_insert(0) += 1;
            stats.open_violations += self.open_violation_count(p.id);
        }
        stats
    }
}

fn validate_dates(
    effective: Option<DateTime<Utc>>,
    expiry: Option<DateTime<Utc>>,
) -> GrcResult<()> {
    match (effective, expiry) {
        (Some(e), Some(x)) if x <= e => Err(GrcError::Validation(
            "Expiry date must be after the effective date".into(),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use grc_platform::{AuditLogger, PolicyEnforcer};

    fn service() -> PolicyService {
        let enforcer = Arc::new(PolicyEnforcer::default());
        enforcer.load_baseline().unwrap();
        PolicyService::new(Arc::new(PolicyGate::new(enforcer, Arc::new(AuditLogger::new()))))
    }

    fn request(code: &str, category: &str) -> CreatePolicyRequest {
        CreatePolicyRequest {
            code: code.into(),
            title: format!("{code} policy"),
            category: category.into(),
            content: "Body".into(),
            effective_date: None,
            expiry_date: None,
            owner_id: Some(Uuid::new_v4()),
        }
    }

    #[test]
    fn test_lifecycle_and_publish_gate() {
        let svc = service();
        let tenant = Uuid::new_v4();
        let approver = Uuid::new_v4();
        let p = svc.create(tenant, request("isp-01", "Security")).unwrap();
        assert_eq!(p.code, "ISP-01");

        assert!(matches!(
            svc.approve(tenant, p.id, approver),
            Err(GrcError::InvalidTransition { .. })
        ));
        svc.submit_for_review(tenant, p.id).unwrap();
        svc.request_changes(tenant, p.id).unwrap();
        svc.submit_for_review(tenant, p.id).unwrap();
        let approved = svc.approve(tenant, p.id, approver).unwrap();
        assert_eq!(approved.approved_by, Some(approver));
        assert!(svc
            .update(tenant, p.id, UpdatePolicyRequest::default())
            .is_err());

        let published = svc.publish(tenant, p.id, Principal::default()).unwrap();
        assert_eq!(published.status, PolicyStatus::Published);
        assert!(svc.is_compliant(tenant, p.id).unwrap());

        let retired = svc.retire(tenant, p.id).unwrap();
        assert!(!retired.is_active);
        assert!(!svc.is_compliant(tenant, p.id).unwrap());
    }

    #[test]
    fn test_publish_without_approval_is_blocked() {
        let svc = service();
        let tenant = Uuid::new_v4();
        let p = svc.create(tenant, request("AUP", "HR")).unwrap();
        let err = svc.publish(tenant, p.id, Principal::default()).unwrap_err();
        assert!(matches!(err, GrcError::PolicyViolation { .. }));
    }

    #[test]
    fn test_violations_affect_compliance() {
        let svc = service();
        let tenant = Uuid::new_v4();
        let user = Uuid::new_v4();
        let p = svc.create(tenant, request("BCP", "Resilience")).unwrap();
        svc.submit_for_review(tenant, p.id).unwrap();
        svc.approve(tenant, p.id, user).unwrap();
        assert!(svc.is_compliant(tenant, p.id).unwrap());

        let v = svc
            .record_violation(
                tenant,
                p.id,
                "No DR test this year".into(),
                FindingSeverity::High,
                user,
            )
            .unwrap();
        assert!(!svc.is_compliant(tenant, p.id).unwrap());
        assert_eq!(svc.statistics(tenant).open_violations, 1);

        svc.resolve_violation(tenant, v.id, "Test scheduled".into()).unwrap();
        assert!(svc.is_compliant(tenant, p.id).unwrap());
        assert!(svc.resolve_violation(tenant, v.id, "again".into()).is_err());
    }

    #[test]
    fn test_expiring_and_statistics() {
        let svc = service();
        let tenant = Uuid::new_v4();
        let now = Utc::now();
        let mut soon = request("A", "Security");
        soon.effective_date = Some(now - Duration::days(300));
        soon.expiry_date = Some(now + Duration::days(10));
        let mut later = request("B", "Security");
        later.expiry_date = Some(now + Duration::days(200));
        svc.create(tenant, soon).unwrap();
        svc.create(tenant, later).unwrap();
        svc.create(tenant, request("C", "Privacy")).unwrap();

        let mut bad = request("D", "Privacy");
        bad.effective_date = Some(now);
        bad.expiry_date = Some(now - Duration::days(1));
        assert!(matches!(svc.create(tenant, bad), Err(GrcError::Validation(_))));
        assert!(matches!(
            svc.create(tenant, request("a", "Dup")),
            Err(GrcError::Conflict(_))
        ));

        assert_eq!(svc.expiring_within(tenant, 30).unwrap().len(), 1);
        assert!(matches!(svc.expiring_within(tenant, i64::MAX), Err(GrcError::Validation(_))));
        assert!(matches!(svc.expiring_within(tenant, -1), Err(GrcError::Validation(_))));
        let stats = svc.statistics(tenant);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_category["Security"], 2);
        assert_eq!(stats.by_status["Draft"], 3);
        assert_eq!(stats.expiring_30_days, 1);
    }
}
