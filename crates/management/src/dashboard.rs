//! Tenant dashboard: one read-only summary assembled from every domain service.

use crate::assessments::{AssessmentService, EvidenceStatistics};
use crate::audits::AuditEngagementService;
use crate::onboarding::{OnboardingService, OnboardingStep};
use crate::policies::{PolicyService, PolicyStatistics};
use crate::risks::{round2, RiskService, RiskStatistics};
use crate::workflows::{ApprovalStatus, WorkflowEngine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

const UPCOMING_AUDIT_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingProgress {
    pub current_step: OnboardingStep,
    pub completion_percentage: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub tenant_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// Mean of all assessment scores, 0 when there are none.
    pub compliance_score: f64,
    pub compliance_by_baseline: BTreeMap<String, f64>,
    pub risks: RiskStatistics,
    pub open_tasks: usize,
    pub overdue_tasks: usize,
    pub pending_approvals: usize,
    pub evidence: EvidenceStatistics,
    pub evidence_awaiting_review: usize,
    pub upcoming_audits: usize,
    pub open_findings: BTreeMap<String, usize>,
    pub overdue_findings: usize,
    pub policies: PolicyStatistics,
    pub onboarding: OnboardingProgress,
}

pub struct DashboardService {
    assessments: Arc<AssessmentService>,
    risks: Arc<RiskService>,
    workflows: Arc<WorkflowEngine>,
    audits: Arc<AuditEngagementService>,
    policies: Arc<PolicyService>,
    onboarding: Arc<OnboardingService>,
}

impl DashboardService {
    pub fn new(
        assessments: Arc<AssessmentService>,
        risks: Arc<RiskService>,
        workflows: Arc<WorkflowEngine>,
        audits: Arc<AuditEngagementService>,
        policies: Arc<PolicyService>,
        onboarding: Arc<OnboardingService>,
    ) -> Self {
        Self {
            assessments,
            risks,
            workflows,
            audits,
            policies,
            onboarding,
        }
    }

    pub fn summary(&self, tenant_id: Uuid, now: DateTime<Utc>) -> DashboardSummary {
        let assessments = self.assessments.list(tenant_id);
        let compliance_score = if assessments.is_empty() {
            0.0
        } else {
            round2(assessments.iter().map(|a| a.score()).sum::<f64>() / assessments.len() as f64)
        };
        let mut per_baseline: BTreeMap<String, (f64, usize)> = BTreeMap::new();
        for a in &assessments {
            let entry = per_baseline.entry(a.baseline_code.clone()).or_insert((0.0, 0));
            entry.0 += a.score();
            entry.1 += 1;
        }
        let compliance_by_baseline = per_baseline
            .into_iter()
            .map(|(code, (sum, n))| (code, round2(sum / n as f64)))
            .collect();

        let evidence = self.assessments.statistics(tenant_id);
        let onboarding = self.onboarding.status(tenant_id);

        DashboardSummary {
            tenant_id,
            generated_at: now,
            compliance_score,
            compliance_by_baseline,
            risks: self.risks.statistics(tenant_id),
            open_tasks: self.workflows.open_tasks(tenant_id).len(),
            overdue_tasks: self.workflows.overdue_tasks(tenant_id, now).len(),
            pending_approvals: self
                .workflows
                .list_approvals(tenant_id)
                .iter()
                .filter(|r| r.status == ApprovalStatus::Pending)
                .count(),
            evidence_awaiting_review: evidence.pending_review,
            evidence,
            upcoming_audits: self
                .audits
                .upcoming(tenant_id, UPCOMING_AUDIT_DAYS)
                .map_or(0, |a| a.len()),
            open_findings: self
                .audits
                .finding_counts(tenant_id)
                .into_iter()
                .map(|(severity, n)| (format!("{severity:?}").to_lowercase(), n))
                .collect(),
            overdue_findings: self.audits.overdue_findings(tenant_id, now).len(),
            policies: self.policies.statistics(tenant_id),
            onboarding: OnboardingProgress {
                current_step: onboarding.current_step,
                completion_percentage: onboarding.completion_percentage,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audits::FindingSeverity;
    use crate::controls::ControlService;
    use crate::enforcement::PolicyGate;
    use crate::models::{
        AddRequirementRequest, CreateAssessmentRequest, CreateAuditRequest, CreateFindingRequest,
        CreateRiskRequest,
    };
    use crate::routing::AssigneeRouter;
    use crate::rules::RulesEngine;
    use crate::store::ManagementStore;
    use chrono::Duration;
    use grc_core::config::{EvidenceConfig, OnboardingConfig, RemediationSla};
    use grc_platform::{AuditLogger, PolicyEnforcer, RbacEngine, TenantManager};

    struct Fixture {
        dashboard: DashboardService,
        assessments: Arc<AssessmentService>,
        risks: Arc<RiskService>,
        audits: Arc<AuditEngagementService>,
    }

    fn fixture() -> Fixture {
        let audit = Arc::new(AuditLogger::new());
        let store = Arc::new(ManagementStore::new());
        let gate = Arc::new(PolicyGate::new(Arc::new(PolicyEnforcer::default()), audit.clone()));
        let assessments = Arc::new(AssessmentService::new(
            EvidenceConfig::default(),
            "{TenantId}-{ControlId}-{Date}-{Sequence}".into(),
            5,
            gate.clone(),
        ));
        let risks = Arc::new(RiskService::new(Arc::new(ControlService::new())));
        let router = Arc::new(AssigneeRouter::new(
            Arc::new(TenantManager::new()),
            Arc::new(RbacEngine::new()),
        ));
        let workflows = Arc::new(WorkflowEngine::new(router, 7));
        let audits = Arc::new(AuditEngagementService::new(RemediationSla::default()));
        let policies = Arc::new(PolicyService::new(gate));
        let rules = Arc::new(RulesEngine::new(store.clone(), audit.clone()));
        let onboarding =
            Arc::new(OnboardingService::new(store, rules, audit, OnboardingConfig::default()));
        Fixture {
            dashboard: DashboardService::new(
                assessments.clone(),
                risks.clone(),
                workflows,
                audits.clone(),
                policies,
                onboarding,
            ),
            assessments,
            risks,
            audits,
        }
    }

    #[test]
    fn test_empty_tenant_summary() {
        let f = fixture();
        let s = f.dashboard.summary(Uuid::new_v4(), Utc::now());
        assert_eq!(s.compliance_score, 0.0);
        assert!(s.compliance_by_baseline.is_empty());
        assert_eq!((s.open_tasks, s.pending_approvals, s.upcoming_audits), (0, 0, 0));
        assert_eq!(s.onboarding.current_step, OnboardingStep::OrgProfile);
        assert_eq!(s.onboarding.completion_percentage, 25);
    }

    #[test]
    fn test_summary_aggregates_services() {
        let f = fixture();
        let tenant = Uuid::new_v4();
        let now = Utc::now();

        let a = f
            .assessments
            .create(
                tenant,
                CreateAssessmentRequest {
                    name: "ECC 2026".into(),
                    baseline_code: "NCA_ECC".into(),
                },
            )
            .unwrap();
        f.assessments
            .add_requirement(
                tenant,
                a.id,
                AddRequirementRequest {
                    control_code: "ECC-1-1".into(),
                    title: "Policy".into(),
                },
            )
            .unwrap();

        f.risks
            .create(
                tenant,
                CreateRiskRequest {
                    title: "Ransomware".into(),
                    description: String::new(),
                    category: "Cyber".into(),
                    likelihood: 5,
                    impact: 5,
                    owner_id: None,
                },
            )
            .unwrap();

        let engagement = f
            .audits
            .create(
                tenant,
                CreateAuditRequest {
                    title: "SAMA review".into(),
                    audit_type: crate::audits::AuditType::Regulatory,
                    scope: String::new(),
                    planned_start: now + Duration::days(10),
                    planned_end: now + Duration::days(20),
                    lead_auditor_id: None,
                },
            )
            .unwrap();
        f.audits
            .add_finding(
                tenant,
                engagement.id,
                CreateFindingRequest {
                    title: "MFA gaps".into(),
                    description: String::new(),
                    severity: FindingSeverity::High,
                    due_date: None,
                    owner_id: None,
                },
            )
            .unwrap();

        let s = f.dashboard.summary(tenant, now);
        assert_eq!(s.compliance_by_baseline.get("NCA_ECC"), Some(&0.0));
        assert_eq!(s.risks.total, 1);
        assert_eq!(s.risks.high, 1);
        assert_eq!(s.upcoming_audits, 1);
        assert_eq!(s.open_findings.get("high"), Some(&1));
        assert_eq!(s.overdue_findings, 0);
    }
}
