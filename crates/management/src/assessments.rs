//! Assessments, their requirements, and the evidence lifecycle that scores them.

use crate::enforcement::{resource_document, PolicyGate};
use crate::models::{AddRequirementRequest, CreateAssessmentRequest, CreateEvidenceRequest};
use crate::risks::round2;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use grc_core::config::EvidenceConfig;
use grc_core::error::{GrcError, GrcResult};
use grc_core::types::DataClassification;
use grc_platform::policy::Principal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

// ─── Assessments ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssessmentStatus {
    Draft,
    InProgress,
    Submitted,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequirementStatus {
    NotStarted,
    InProgress,
    Compliant,
    PartiallyCompliant,
    NonCompliant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Requirement {
    pub id: Uuid,
    pub control_code: String,
    pub title: String,
    pub status: RequirementStatus,
    /// Average final score of approved evidence; `None` until something is approved.
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub baseline_code: String,
    pub status: AssessmentStatus,
    pub requirements: Vec<Requirement>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Assessment {
    /// Average requirement score; unscored requirements count as zero.
    pub fn score(&self) -> f64 {
        if self.requirements.is_empty() {
            return 0.0;
        }
        let total: f64 = self.requirements.iter().map(|r| r.score.unwrap_or(0.0)).sum();
        round2(total / self.requirements.len() as f64)
    }

    #[cfg(test)]
    pub(crate) fn for_tests(tenant_id: Uuid, requirements: Vec<Requirement>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: "Test assessment".into(),
            baseline_code: "NCA_ECC".into(),
            status: AssessmentStatus::InProgress,
            requirements,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}

// ─── Evidence ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvidenceStatus {
    Draft,
    Submitted,
    InReview,
    ChangesRequested,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceScore {
    pub score: u8,
    pub comment: Option<String>,
    pub scored_by: Uuid,
    pub scored_at: DateTime<Utc>,
    pub is_final: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub assessment_id: Uuid,
    pub requirement_id: Uuid,
    pub control_code: String,
    pub title: String,
    pub file_name: String,
    pub owner_id: Option<Uuid>,
    pub classification: Option<DataClassification>,
    pub status: EvidenceStatus,
    pub scores: Vec<EvidenceScore>,
    pub reviewer_id: Option<Uuid>,
    pub approved_by: Option<Uuid>,
    pub review_comment: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl Evidence {
    pub fn final_score(&self) -> Option<u8> {
        self.scores.iter().rev().find(|s| s.is_final).map(|s| s.score)
    }

    fn policy_document(&self) -> serde_json::Value {
        resource_document(
            "Evidence",
            &format!("{:?}", self.status),
            self.owner_id,
            self.approved_by,
            self.classification.map(|c| c.as_str()),
            serde_json::json!({ "title": self.title, "file_name": self.file_name }),
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceStatistics {
    pub total: usize,
    pub draft: usize,
    pub submitted: usize,
    pub in_review: usize,
    pub changes_requested: usize,
    pub approved: usize,
    pub rejected: usize,
    pub pending_review: usize,
    pub overdue_review: usize,
    pub average_score: f64,
}

/// Expand `{TenantId}`, `{ControlId}`, `{Date}` and `{Sequence}` in an evidence naming pattern.
pub fn evidence_file_name(
    pattern: &str,
    tenant_id: Uuid,
    control_code: &str,
    date: DateTime<Utc>,
    sequence: u64,
) -> String {
    let tenant = tenant_id.simple().to_string();
    pattern
        .replace("{TenantId}", &tenant[..8])
        .replace("{ControlId}", control_code)
        .replace("{Date}", &date.format("%Y%m%d").to_string())
        .replace("{Sequence}", &format!("{sequence:04}"))
}

pub struct AssessmentService {
    assessments: DashMap<Uuid, Assessment>,
    evidence: DashMap<Uuid, Evidence>,
    /// tenant -> last evidence sequence number
    sequences: DashMap<Uuid, u64>,
    config: EvidenceConfig,
    naming_pattern: String,
    review_sla_days: i64,
    gate: Arc<PolicyGate>,
}

impl AssessmentService {
    pub fn new(
        config: EvidenceConfig,
        naming_pattern: String,
        review_sla_days: i64,
        gate: Arc<PolicyGate>,
    ) -> Self {
        Self {
            assessments: DashMap::new(),
            evidence: DashMap::new(),
            sequences: DashMap::new(),
            config,
            naming_pattern,
            review_sla_days,
            gate,
        }
    }

    pub fn create(&self, tenant_id: Uuid, req: CreateAssessmentRequest) -> GrcResult<Assessment> {
        if req.name.trim().is_empty() {
            return Err(GrcError::Validation("Assessment name is required".into()));
        }
        let now = Utc::now();
        let assessment = Assessment {
            id: Uuid::new_v4(),
            tenant_id,
            name: req.name,
            baseline_code: req.baseline_code.trim().to_uppercase(),
            status: AssessmentStatus::Draft,
            requirements: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        info!(tenant_id = %tenant_id, assessment_id = %assessment.id, baseline = %assessment.baseline_code, "Assessment created");
        self.assessments.insert(assessment.id, assessment.clone());
        Ok(assessment)
    }

    pub fn get(&self, tenant_id: Uuid, id: Uuid) -> GrcResult<Assessment> {
        self.assessments
            .get(&id)
            .filter(|a| a.tenant_id == tenant_id)
            .map(|a| a.value().clone())
            .ok_or_else(|| GrcError::not_found("Assessment", id))
    }

    pub fn list(&self, tenant_id: Uuid) -> Vec<Assessment> {
        let mut list: Vec<Assessment> = self
            .assessments
            .iter()
            .filter(|a| a.tenant_id == tenant_id)
            .map(|a| a.value().clone())
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list
    }

    pub fn add_requirement(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        req: AddRequirementRequest,
    ) -> GrcResult<Requirement> {
        let mut entry = self
            .assessments
            .get_mut(&id)
            .filter(|a| a.tenant_id == tenant_id)
            .ok_or_else(|| GrcError::not_found("Assessment", id))?;
        if !matches!(entry.status, AssessmentStatus::Draft | AssessmentStatus::InProgress) {
            return Err(GrcError::Conflict(format!(
                "Cannot add requirements to a {:?} assessment",
                entry.status
            )));
        }
        let requirement = Requirement {
            id: Uuid::new_v4(),
            control_code: req.control_code.trim().to_uppercase(),
            title: req.title,
            status: RequirementStatus::NotStarted,
            score: None,
        };
        entry.requirements.push(requirement.clone());
        entry.updated_at = Utc::now();
        Ok(requirement)
    }

    fn transition(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        from: AssessmentStatus,
        to: AssessmentStatus,
    ) -> GrcResult<Assessment> {
        let mut entry = self
            .assessments
            .get_mut(&id)
            .filter(|a| a.tenant_id == tenant_id)
            .ok_or_else(|| GrcError::not_found("Assessment", id))?;
        if entry.status != from {
            return Err(GrcError::invalid_transition(entry.status, to));
        }
        let now = Utc::now();
        entry.status = to;
        entry.updated_at = now;
        if to == AssessmentStatus::Completed {
            entry.completed_at = Some(now);
        }
        info!(tenant_id = %tenant_id, assessment_id = %id, status = ?to, "Assessment status changed");
        Ok(entry.clone())
    }

    pub fn start(&self, tenant_id: Uuid, id: Uuid) -> GrcResult<Assessment> {
        self.transition(tenant_id, id, AssessmentStatus::Draft, AssessmentStatus::InProgress)
    }

    pub fn submit(&self, tenant_id: Uuid, id: Uuid) -> GrcResult<Assessment> {
        self.transition(tenant_id, id, AssessmentStatus::InProgress, AssessmentStatus::Submitted)
    }

    pub fn complete(&self, tenant_id: Uuid, id: Uuid) -> GrcResult<Assessment> {
        self.transition(tenant_id, id, AssessmentStatus::Submitted, AssessmentStatus::Completed)
    }

    pub fn score(&self, tenant_id: Uuid, id: Uuid) -> GrcResult<f64> {
        Ok(self.get(tenant_id, id)?.score())
    }

    // ─── Evidence lifecycle ────────────────────────────────────────────

    pub fn create_evidence(
        &self,
        tenant_id: Uuid,
        req: CreateEvidenceRequest,
        principal: Principal,
    ) -> GrcResult<Evidence> {
        let assessment = self.get(tenant_id, req.assessment_id)?;
        let requirement = assessment
            .requirements
            .iter()
            .find(|r| r.id == req.requirement_id)
            .ok_or_else(|| GrcError::not_found("Requirement", req.requirement_id))?;
        if req.title.trim().is_empty() {
            return Err(GrcError::Validation("Evidence title is required".into()));
        }

        let now = Utc::now();
        let mut evidence = Evidence {
            id: Uuid::new_v4(),
            tenant_id,
            assessment_id: assessment.id,
            requirement_id: requirement.id,
            control_code: requirement.control_code.clone(),
            title: req.title,
            file_name: String::new(),
            owner_id: req.owner_id,
            classification: req.classification,
            status: EvidenceStatus::Draft,
            scores: Vec::new(),
            reviewer_id: None,
            approved_by: None,
            review_comment: None,
            created_by: principal.id,
            created_at: now,
            submitted_at: None,
            reviewed_at: None,
        };
        self.gate.check(
            tenant_id,
            principal,
            "create",
            "Evidence",
            &evidence.id.to_string(),
            evidence.policy_document(),
        )?;

        let sequence = {
            let mut seq = self.sequences.entry(tenant_id).or_insert(0);
            *seq += 1;
            *seq
        };
        evidence.file_name = evidence_file_name(
            &self.naming_pattern,
            tenant_id,
            &evidence.control_code,
            now,
            sequence,
        );

        info!(tenant_id = %tenant_id, evidence_id = %evidence.id, file = %evidence.file_name, "Evidence created");
        self.evidence.insert(evidence.id, evidence.clone());
        self.recompute_requirement(tenant_id, evidence.assessment_id, evidence.requirement_id);
        Ok(evidence)
    }

    pub fn get_evidence(&self, tenant_id: Uuid, id: Uuid) -> GrcResult<Evidence> {
        self.evidence
            .get(&id)
            .filter(|e| e.tenant_id == tenant_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| GrcError::not_found("Evidence", id))
    }

    pub fn list_evidence(&self, tenant_id: Uuid, assessment_id: Option<Uuid>) -> Vec<Evidence> {
        let mut list: Vec<Evidence> = self
            .evidence
            .iter()
            .filter(|e| {
                e.tenant_id == tenant_id && assessment_id.map_or(true, |a| e.assessment_id == a)
            })
            .map(|e| e.value().clone())
            .collect();
        list.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        list
    }

    /// Evidence waiting on a reviewer (Submitted or InReview).
    pub fn pending_review(&self, tenant_id: Uuid) -> Vec<Evidence> {
        self.list_evidence(tenant_id, None)
            .into_iter()
            .filter(|e| matches!(e.status, EvidenceStatus::Submitted | EvidenceStatus::InReview))
            .collect()
    }

    fn update_evidence<F>(&self, tenant_id: Uuid, id: Uuid, apply: F) -> GrcResult<Evidence>
    where
        F: FnOnce(&mut Evidence) -> GrcResult<()>,
    {
        let updated = {
            let mut entry = self
                .evidence
                .get_mut(&id)
                .filter(|e| e.tenant_id == tenant_id)
                .ok_or_else(|| GrcError::not_found("Evidence", id))?;
            apply(entry.value_mut())?;
            entry.clone()
        };
        self.recompute_requirement(tenant_id, updated.assessment_id, updated.requirement_id);
        Ok(updated)
    }

    pub fn submit_evidence(&self, tenant_id: Uuid, id: Uuid) -> GrcResult<Evidence> {
        self.update_evidence(tenant_id, id, |e| {
            if !matches!(e.status, EvidenceStatus::Draft | EvidenceStatus::ChangesRequested) {
                return Err(GrcError::invalid_transition(e.status, EvidenceStatus::Submitted));
            }
            e.status = EvidenceStatus::Submitted;
            e.submitted_at = Some(Utc::now());
            Ok(())
        })
    }

    pub fn start_review(&self, tenant_id: Uuid, id: Uuid, reviewer: Uuid) -> GrcResult<Evidence> {
        self.update_evidence(tenant_id, id, |e| {
            if e.status != EvidenceStatus::Submitted {
                return Err(GrcError::invalid_transition(e.status, EvidenceStatus::InReview));
            }
            e.status = EvidenceStatus::InReview;
            e.reviewer_id = Some(reviewer);
            Ok(())
        })
    }

    /// Record a reviewer score. Earlier scores stop being final; while the
    /// evidence is in review, the score decides approval.
    pub fn score_evidence(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        score: u8,
        reviewer: Uuid,
        comment: Option<String>,
    ) -> GrcResult<Evidence> {
        if score > 100 {
            return Err(GrcError::Validation("Score must be between 0 and 100.".into()));
        }
        let pass_score = self.config.pass_score;
        let evidence = self.update_evidence(tenant_id, id, |e| {
            for previous in e.scores.iter_mut() {
                previous.is_final = false;
            }
            let now = Utc::now();
            e.scores.push(EvidenceScore {
                score,
                comment: comment.clone(),
                scored_by: reviewer,
                scored_at: now,
                is_final: true,
            });
            if e.status == EvidenceStatus::InReview {
                if score >= pass_score {
                    e.status = EvidenceStatus::Approved;
                    e.approved_by = Some(reviewer);
                } else {
                    e.status = EvidenceStatus::ChangesRequested;
                }
                e.reviewer_id = Some(reviewer);
                e.reviewed_at = Some(now);
                e.review_comment = comment;
            }
            Ok(())
        })?;
        info!(tenant_id = %tenant_id, evidence_id = %id, score, status = ?evidence.status, "Evidence scored");
        Ok(evidence)
    }

    pub fn request_changes(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        reviewer: Uuid,
        comment: String,
    ) -> GrcResult<Evidence> {
        self.update_evidence(tenant_id, id, |e| {
            if e.status != EvidenceStatus::InReview {
                return Err(GrcError::invalid_transition(
                    e.status,
                    EvidenceStatus::ChangesRequested,
                ));
            }
            e.status = EvidenceStatus::ChangesRequested;
            e.reviewer_id = Some(reviewer);
            e.review_comment = Some(comment);
            e.reviewed_at = Some(Utc::now());
            Ok(())
        })
    }

    pub fn reject(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        reviewer: Uuid,
        reason: String,
    ) -> GrcResult<Evidence> {
        if reason.trim().is_empty() {
            return Err(GrcError::Validation("Rejection reason is required".into()));
        }
        self.update_evidence(tenant_id, id, |e| {
            if !matches!(e.status, EvidenceStatus::Submitted | EvidenceStatus::InReview) {
                return Err(GrcError::invalid_transition(e.status, EvidenceStatus::Rejected));
            }
            e.status = EvidenceStatus::Rejected;
            e.reviewer_id = Some(reviewer);
            e.review_comment = Some(reason);
            e.reviewed_at = Some(Utc::now());
            Ok(())
        })
    }

    /// Delete evidence after the policy gate has cleared it.
    pub fn delete_evidence(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        principal: Principal,
    ) -> GrcResult<()> {
        let evidence = self.get_evidence(tenant_id, id)?;
        self.gate.check(
            tenant_id,
            principal,
            "delete",
            "Evidence",
            &id.to_string(),
            evidence.policy_document(),
        )?;
        self.evidence.remove(&id);
        self.recompute_requirement(tenant_id, evidence.assessment_id, evidence.requirement_id);
        info!(tenant_id = %tenant_id, evidence_id = %id, "Evidence deleted");
        Ok(())
    }

    fn recompute_requirement(&self, tenant_id: Uuid, assessment_id: Uuid, requirement_id: Uuid) {
        let linked: Vec<Evidence> = self
            .evidence
            .iter()
            .filter(|e| e.tenant_id == tenant_id && e.requirement_id == requirement_id)
            .map(|e| e.value().clone())
            .collect();
        let approved: Vec<u8> = linked
            .iter()
            .filter(|e| e.status == EvidenceStatus::Approved)
            .filter_map(|e| e.final_score())
            .collect();

        let (status, score) = if linked.is_empty() {
            (RequirementStatus::NotStarted, None)
        } else if approved.is_empty() {
            (RequirementStatus::InProgress, None)
        } else {
            let avg = approved.iter().map(|s| f64::from(*s)).sum::<f64>() / approved.len() as f64;
            let status = if avg >= self.config.compliant_threshold {
                RequirementStatus::Compliant
            } else if avg >= self.config.partial_threshold {
                RequirementStatus::PartiallyCompliant
            } else {
                RequirementStatus::NonCompliant
            };
            (status, Some(round2(avg)))
        };

        let Some(mut assessment) = self.assessments.get_mut(&assessment_id) else {
            warn!(assessment_id = %assessment_id, "Evidence references a missing assessment");
            return;
        };
        if let Some(req) = assessment.requirements.iter_mut().find(|r| r.id == requirement_id) {
            req.status = status;
            req.score = score;
        }
        assessment.updated_at = Utc::now();
    }

    pub fn statistics(&self, tenant_id: Uuid) -> EvidenceStatistics {
        let now = Utc::now();
        let sla = Duration::days(self.review_sla_days);
        let mut stats = EvidenceStatistics::default();
        let mut scores = Vec::new();
        for e in self.evidence.iter().filter(|e| e.tenant_id == tenant_id) {
            stats.total += 1;
            match e.status {
                EvidenceStatus::Draft => stats.draft += 1,
                EvidenceStatus::Submitted => stats.submitted += 1,
                EvidenceStatus::InReview => stats.in_review += 1,
                EvidenceStatus::ChangesRequested => stats.changes_requested += 1,
                EvidenceStatus::Approved => stats.approved += 1,
                EvidenceStatus::Rejected => stats.rejected += 1,
            }
            if matches!(e.status, EvidenceStatus::Submitted | EvidenceStatus::InReview) {
                stats.pending_review += 1;
                if now - e.submitted_at.unwrap_or(e.created_at) > sla {
                    stats.overdue_review += 1;
                }
            }
            if let Some(score) = e.final_score() {
                scores.push(f64::from(score));
            }
        }
        if !scores.is_empty() {
            stats.average_score = round2(scores.iter().sum::<f64>() / scores.len() as f64);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grc_platform::{AuditLogger, PolicyEnforcer};

    struct Fixture {
        svc: AssessmentService,
        tenant: Uuid,
        assessment: Assessment,
        requirement: Requirement,
    }

    fn fixture() -> Fixture {
        let enforcer = Arc::new(PolicyEnforcer::default());
        enforcer.load_baseline().unwrap();
        let gate = Arc::new(PolicyGate::new(enforcer, Arc::new(AuditLogger::new())));
        let svc = AssessmentService::new(
            EvidenceConfig::default(),
            "{TenantId}-{ControlId}-{Date}-{Sequence}".into(),
            5,
            gate,
        );
        let tenant = Uuid::new_v4();
        let assessment = svc
            .create(
                tenant,
                CreateAssessmentRequest {
                    name: "ECC readiness".into(),
                    baseline_code: "nca_ecc".into(),
                },
            )
            .unwrap();
        let requirement = svc
            .add_requirement(
                tenant,
                assessment.id,
                AddRequirementRequest {
                    control_code: "ecc-1-1".into(),
                    title: "Cybersecurity strategy".into(),
                },
            )
            .unwrap();
        Fixture {
            svc,
            tenant,
            assessment,
            requirement,
        }
    }

    fn new_evidence(f: &Fixture, title: &str) -> Evidence {
        f.svc
            .create_evidence(
                f.tenant,
                CreateEvidenceRequest {
                    assessment_id: f.assessment.id,
                    requirement_id: f.requirement.id,
                    title: title.into(),
                    owner_id: Some(Uuid::new_v4()),
                    classification: None,
                },
                Principal::default(),
            )
            .unwrap()
    }

    fn requirement_state(f: &Fixture) -> Requirement {
        f.svc.get(f.tenant, f.assessment.id).unwrap().requirements[0].clone()
    }

    #[test]
    fn test_assessment_lifecycle() {
        let f = fixture();
        assert_eq!(f.assessment.baseline_code, "NCA_ECC");
        assert!(f.svc.submit(f.tenant, f.assessment.id).is_err());
        f.svc.start(f.tenant, f.assessment.id).unwrap();
        f.svc.submit(f.tenant, f.assessment.id).unwrap();
        assert!(matches!(
            f.svc.add_requirement(
                f.tenant,
                f.assessment.id,
                AddRequirementRequest { control_code: "X".into(), title: "late".into() }
            ),
            Err(GrcError::Conflict(_))
        ));
        let done = f.svc.complete(f.tenant, f.assessment.id).unwrap();
        assert_eq!(done.status, AssessmentStatus::Completed);
        assert!(done.completed_at.is_some());
    }

    #[test]
    fn test_evidence_naming() {
        let f = fixture();
        let first = new_evidence(&f, "Strategy document");
        let second = new_evidence(&f, "Board minutes");
        let prefix = &f.tenant.simple().to_string()[..8];
        assert!(first.file_name.starts_with(&format!("{prefix}-ECC-1-1-")));
        assert!(first.file_name.ends_with("-0001"));
        assert!(second.file_name.ends_with("-0002"));
        assert_eq!(requirement_state(&f).status, RequirementStatus::InProgress);
    }

    #[test]
    fn test_review_flow_drives_requirement_status() {
        let f = fixture();
        let reviewer = Uuid::new_v4();
        assert_eq!(requirement_state(&f).status, RequirementStatus::NotStarted);

        let ev = new_evidence(&f, "Policy");
        assert!(f.svc.start_review(f.tenant, ev.id, reviewer).is_err());
        f.svc.submit_evidence(f.tenant, ev.id).unwrap();
        f.svc.start_review(f.tenant, ev.id, reviewer).unwrap();

        let low = f.svc.score_evidence(f.tenant, ev.id, 50, reviewer, None).unwrap();
        assert_eq!(low.status, EvidenceStatus::ChangesRequested);
        assert_eq!(requirement_state(&f).status, RequirementStatus::InProgress);

        f.svc.submit_evidence(f.tenant, ev.id).unwrap();
        f.svc.start_review(f.tenant, ev.id, reviewer).unwrap();
        let ok = f
            .svc
            .score_evidence(f.tenant, ev.id, 80, reviewer, Some("Good".into()))
            .unwrap();
        assert_eq!(ok.status, EvidenceStatus::Approved);
        assert_eq!(ok.scores.iter().filter(|s| s.is_final).count(), 1);
        assert_eq!(ok.final_score(), Some(80));

        let req = requirement_state(&f);
        assert_eq!(req.status, RequirementStatus::PartiallyCompliant);
        assert_eq!(req.score, Some(80.0));

        // Rescoring approved evidence replaces the final score.
        f.svc.score_evidence(f.tenant, ev.id, 95, reviewer, None).unwrap();
        assert_eq!(requirement_state(&f).status, RequirementStatus::Compliant);
        assert_eq!(f.svc.score(f.tenant, f.assessment.id).unwrap(), 95.0);

        assert!(matches!(
            f.svc.score_evidence(f.tenant, ev.id, 101, reviewer, None),
            Err(GrcError::Validation(_))
        ));
    }

    #[test]
    fn test_approved_evidence_cannot_be_deleted() {
        let f = fixture();
        let reviewer = Uuid::new_v4();
        let ev = new_evidence(&f, "Pentest report");
        f.svc.submit_evidence(f.tenant, ev.id).unwrap();
        f.svc.start_review(f.tenant, ev.id, reviewer).unwrap();
        f.svc.score_evidence(f.tenant, ev.id, 90, reviewer, None).unwrap();

        let err = f.svc.delete_evidence(f.tenant, ev.id, Principal::default()).unwrap_err();
        assert!(matches!(err, GrcError::PolicyViolation { .. }));

        let draft = new_evidence(&f, "Draft notes");
        f.svc.delete_evidence(f.tenant, draft.id, Principal::default()).unwrap();
        assert!(f.svc.get_evidence(f.tenant, draft.id).is_err());
    }

    #[test]
    fn test_restricted_evidence_requires_owner() {
        let f = fixture();
        let err = f
            .svc
            .create_evidence(
                f.tenant,
                CreateEvidenceRequest {
                    assessment_id: f.assessment.id,
                    requirement_id: f.requirement.id,
                    title: "Customer extract".into(),
                    owner_id: None,
                    classification: Some(DataClassification::Restricted),
                },
                Principal::default(),
            )
            .unwrap_err();
        assert!(matches!(err, GrcError::PolicyViolation { .. }));
    }

    #[test]
    fn test_reject_and_statistics() {
        let f = fixture();
        let reviewer = Uuid::new_v4();
        let a = new_evidence(&f, "A");
        let b = new_evidence(&f, "B");
        new_evidence(&f, "C");

        f.svc.submit_evidence(f.tenant, a.id).unwrap();
        assert!(f.svc.reject(f.tenant, a.id, reviewer, "  ".into()).is_err());
        f.svc.reject(f.tenant, a.id, reviewer, "Illegible".into()).unwrap();

        f.svc.submit_evidence(f.tenant, b.id).unwrap();
        f.svc.score_evidence(f.tenant, b.id, 60, reviewer, None).unwrap();

        let stats = f.svc.statistics(f.tenant);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.submitted, 1);
        assert_eq!(stats.draft, 1);
        assert_eq!(stats.pending_review, 1);
        assert_eq!(stats.overdue_review, 0);
        assert_eq!(stats.average_score, 60.0);
        assert_eq!(f.svc.pending_review(f.tenant).len(), 1);
    }
}
