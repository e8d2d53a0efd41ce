//! Onboarding: the twelve-section questionnaire wizard and the four-step
//! onboarding journey (signup, profile, scope review, first plan).

use crate::rules::{DerivedScope, RulesEngine};
use crate::store::{ManagementStore, ScopeKind};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use grc_core::config::{OnboardingConfig, RemediationSla};
use grc_core::error::{GrcError, GrcResult};
use grc_platform::AuditLogger;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

// ─── Questionnaire layout ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SectionDef {
    pub code: &'static str,
    pub name: &'static str,
    pub questions: u8,
    pub required: bool,
}

const fn section(
    code: &'static str,
    name: &'static str,
    questions: u8,
    required: bool,
) -> SectionDef {
    SectionDef {
        code,
        name,
        questions,
        required,
    }
}

pub const SECTIONS: [SectionDef; 12] = [
    section("A", "Organization Identity", 13, true),
    section("B", "Assurance Objective", 5, false),
    section("C", "Regulatory Applicability", 7, false),
    section("D", "Scope Definition", 9, true),
    section("E", "Data & Risk Profile", 6, true),
    section("F", "Technology Landscape", 13, true),
    section("G", "Control Ownership", 7, false),
    section("H", "Teams/Roles/Access", 10, true),
    section("I", "Workflow & Cadence", 10, true),
    section("J", "Evidence Standards", 7, false),
    section("K", "Baseline & Overlays", 3, false),
    section("L", "Go-Live & Metrics", 6, false),
];

pub fn total_questions() -> u32 {
    SECTIONS.iter().map(|s| u32::from(s.questions)).sum()
}

fn section_index(code: &str) -> GrcResult<usize> {
    let code = code.trim().to_ascii_uppercase();
    SECTIONS
        .iter()
        .position(|s| s.code == code)
        .ok_or_else(|| GrcError::Validation(format!("Unknown wizard section '{code}'")))
}

// ─── Wizard ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WizardStatus {
    NotStarted,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionProgress {
    pub answers: serde_json::Value,
    pub is_complete: bool,
    pub saved_at: DateTime<Utc>,
}

/// Operating defaults stamped on the tenant when the wizard completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatingDefaults {
    pub escalation_days_overdue: i64,
    pub evidence_sla_submit_days: i64,
    pub remediation_sla_days: RemediationSla,
    pub exception_expiry_days: i64,
    pub evidence_retention_years: u32,
    pub evidence_naming_pattern: String,
}

impl From<&OnboardingConfig> for OperatingDefaults {
    fn from(c: &OnboardingConfig) -> Self {
        Self {
            escalation_days_overdue: c.escalation_days_overdue,
            evidence_sla_submit_days: c.evidence_sla_submit_days,
            remediation_sla_days: c.remediation_sla_days.clone(),
            exception_expiry_days: c.exception_expiry_days,
            evidence_retention_years: c.evidence_retention_years,
            evidence_naming_pattern: c.evidence_naming_pattern.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingWizard {
    pub tenant_id: Uuid,
    pub status: WizardStatus,
    /// 1-based section the user should work on next.
    pub current_step: u8,
    pub progress_percent: u8,
    pub sections: BTreeMap<String, SectionProgress>,
    pub operating_defaults: Option<OperatingDefaults>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<Uuid>,
}

impl OnboardingWizard {
    fn new(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            status: WizardStatus::InProgress,
            current_step: 1,
            progress_percent: 0,
            sections: BTreeMap::new(),
            operating_defaults: None,
            started_at: Utc::now(),
            completed_at: None,
            completed_by: None,
        }
    }

    pub fn is_section_complete(&self, code: &str) -> bool {
        self.sections.get(code).map_or(false, |s| s.is_complete)
    }

    pub fn completed_count(&self) -> usize {
        SECTIONS.iter().filter(|s| self.is_section_complete(s.code)).count()
    }

    fn mark_complete(&mut self, index: usize) {
        let next = (index as u8 + 2).min(SECTIONS.len() as u8);
        self.current_step = self.current_step.max(next);
        self.progress_percent = (self.completed_count() * 100 / SECTIONS.len()) as u8;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionStatus {
    pub code: String,
    pub name: String,
    pub questions: u8,
    pub required: bool,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WizardValidation {
    pub sections: Vec<SectionStatus>,
    pub completed_sections: usize,
    pub is_valid: bool,
    pub can_complete: bool,
    pub missing: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WizardCompletion {
    pub tenant_id: Uuid,
    pub completed_at: DateTime<Utc>,
    pub scope: Option<DerivedScope>,
    pub warnings: Vec<String>,
}

// ─── Onboarding journey ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnboardingStep {
    OrgProfile,
    ReviewScope,
    CreatePlan,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepState {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepStatus {
    pub number: u8,
    pub name: String,
    pub status: StepState,
    pub accessible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingStatus {
    pub tenant_id: Uuid,
    pub current_step: OnboardingStep,
    pub completion_percentage: u8,
    pub is_profile_complete: bool,
    pub is_scope_reviewed: bool,
    pub is_onboarding_complete: bool,
    pub next_action: Option<String>,
    pub steps: Vec<StepStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepValidation {
    pub can_proceed: bool,
    pub blocker_reason: Option<String>,
    pub missing_prerequisites: Vec<String>,
    pub redirect_to_step: Option<OnboardingStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextStep {
    pub step: OnboardingStep,
    pub name: String,
    pub description: String,
    pub estimated_minutes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeOnboarding {
    pub resume_step: OnboardingStep,
    pub completed_steps: u8,
    pub total_steps: u8,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentPlan {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub baselines: Vec<String>,
    pub packages: Vec<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct Journey {
    scope_reviewed_at: Option<DateTime<Utc>>,
    plan: Option<AssessmentPlan>,
}

const PROFILE_BLOCKER: &str = "Please complete your organization profile first.";
const SCOPE_BLOCKER: &str = "Please review your compliance scope first.";

// ─── Service ───────────────────────────────────────────────────────────────

pub struct OnboardingService {
    wizards: DashMap<Uuid, OnboardingWizard>,
    journeys: DashMap<Uuid, Journey>,
    store: Arc<ManagementStore>,
    rules: Arc<RulesEngine>,
    audit: Arc<AuditLogger>,
    config: OnboardingConfig,
}

impl OnboardingService {
    pub fn new(
        store: Arc<ManagementStore>,
        rules: Arc<RulesEngine>,
        audit: Arc<AuditLogger>,
        config: OnboardingConfig,
    ) -> Self {
        Self {
            wizards: DashMap::new(),
            journeys: DashMap::new(),
            store,
            rules,
            audit,
            config,
        }
    }

    pub fn wizard(&self, tenant_id: Uuid) -> Option<OnboardingWizard> {
        self.wizards.get(&tenant_id).map(|w| w.value().clone())
    }

    pub fn wizard_status(&self, tenant_id: Uuid) -> WizardStatus {
        self.wizards
            .get(&tenant_id)
            .map_or(WizardStatus::NotStarted, |w| w.status)
    }

    /// Start the wizard; returns the existing one when already started.
    pub fn start_wizard(&self, tenant_id: Uuid) -> OnboardingWizard {
        self.wizards
            .entry(tenant_id)
            .or_insert_with(|| {
                info!(tenant_id = %tenant_id, "Onboarding wizard started");
                OnboardingWizard::new(tenant_id)
            })
            .clone()
    }

    /// Save one section's answers and merge them into the organization profile.
    pub fn save_section(
        &self,
        tenant_id: Uuid,
        section: &str,
        answers: serde_json::Value,
        mark_complete: bool,
    ) -> GrcResult<OnboardingWizard> {
        let index = section_index(section)?;
        let code = SECTIONS[index].code;
        self.start_wizard(tenant_id);
        if self.wizard_status(tenant_id) == WizardStatus::Completed {
            return Err(GrcError::Conflict("Onboarding wizard is already completed".into()));
        }

        self.store
            .merge_profile_answers(tenant_id, &self.config.default_country, &answers)?;

        let mut wizard = self
            .wizards
            .get_mut(&tenant_id)
            .ok_or_else(|| GrcError::not_found("OnboardingWizard", tenant_id))?;
        let was_complete = wizard.is_section_complete(code);
        wizard.sections.insert(
            code.to_string(),
            SectionProgress {
                answers,
                is_complete: was_complete || mark_complete,
                saved_at: Utc::now(),
            },
        );
        if mark_complete {
            wizard.mark_complete(index);
        }
        info!(
            tenant_id = %tenant_id,
            section = code,
            complete = mark_complete,
            progress = wizard.progress_percent,
            "Wizard section saved"
        );
        Ok(wizard.clone())
    }

    /// Fast path: one set of answers that satisfies every required section.
    pub fn save_minimal(
        &self,
        tenant_id: Uuid,
        answers: serde_json::Value,
    ) -> GrcResult<OnboardingWizard> {
        let mut wizard = self.start_wizard(tenant_id);
        for def in SECTIONS.iter().filter(|s| s.required) {
            wizard = self.save_section(tenant_id, def.code, answers.clone(), true)?;
        }
        Ok(wizard)
    }

    pub fn validate(&self, tenant_id: Uuid, minimal: bool) -> WizardValidation {
        let wizard = self.wizard(tenant_id);
        let done = |code: &str| wizard.as_ref().map_or(false, |w| w.is_section_complete(code));

        let sections: Vec<SectionStatus> = SECTIONS
            .iter()
            .map(|s| SectionStatus {
                code: s.code.to_string(),
                name: s.name.to_string(),
                questions: s.questions,
                required: s.required,
                completed: done(s.code),
            })
            .collect();
        let completed_sections = sections.iter().filter(|s| s.completed).count();
        let missing: Vec<String> = sections
            .iter()
            .filter(|s| s.required && !s.completed)
            .map(|s| format!("Section {} incomplete", s.code))
            .collect();
        let warnings = if minimal {
            Vec::new()
        } else {
            sections
                .iter()
                .filter(|s| !s.required && !s.completed)
                .map(|s| format!("Optional Section {} not completed", s.code))
                .collect()
        };

        WizardValidation {
            is_valid: if minimal {
                missing.is_empty()
            } else {
                completed_sections == SECTIONS.len()
            },
            can_complete: wizard.is_some() && missing.is_empty(),
            sections,
            completed_sections,
            missing,
            warnings,
        }
    }

    /// Complete the wizard and derive scope. A failed derivation is reported
    /// as a warning; the wizard still completes.
    pub fn complete_wizard(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        minimal: bool,
    ) -> GrcResult<WizardCompletion> {
        if self.wizard_status(tenant_id) == WizardStatus::Completed {
            return Err(GrcError::Conflict("Onboarding wizard is already completed".into()));
        }
        let validation = self.validate(tenant_id, minimal);
        if !validation.can_complete {
            let reasons = if validation.missing.is_empty() {
                "Wizard not started".to_string()
            } else {
                validation.missing.join(", ")
            };
            return Err(GrcError::Validation(format!(
                "Cannot complete wizard - required sections incomplete: {reasons}"
            )));
        }

        let now = Utc::now();
        {
            let mut wizard = self
                .wizards
                .get_mut(&tenant_id)
                .ok_or_else(|| GrcError::not_found("OnboardingWizard", tenant_id))?;
            wizard.status = WizardStatus::Completed;
            wizard.progress_percent = 100;
            wizard.current_step = SECTIONS.len() as u8;
            wizard.completed_at = Some(now);
            wizard.completed_by = Some(user_id);
            wizard.operating_defaults = Some(OperatingDefaults::from(&self.config));
        }

        let mut warnings = validation.warnings;
        let scope = match self.rules.derive_and_persist_scope(tenant_id, Some(user_id)) {
            Ok(scope) => Some(scope),
            Err(e) => {
                warn!(tenant_id = %tenant_id, error = %e, "Scope derivation failed; wizard completed anyway");
                warnings.push(format!("Scope derivation failed: {e}"));
                None
            }
        };

        self.audit.log_action(
            tenant_id,
            Some(user_id),
            "onboarding.completed",
            "OnboardingWizard",
            &tenant_id.to_string(),
            serde_json::json!({
                "completed_sections": validation.completed_sections,
                "minimal": minimal,
                "scope_derived": scope.is_some(),
            }),
            vec![],
        );
        info!(tenant_id = %tenant_id, user_id = %user_id, "Onboarding wizard completed");

        Ok(WizardCompletion {
            tenant_id,
            completed_at: now,
            scope,
            warnings,
        })
    }

    // ─── Journey ───────────────────────────────────────────────────────

    fn flags(&self, tenant_id: Uuid) -> (bool, bool, bool) {
        let has_profile = self.wizard_status(tenant_id) == WizardStatus::Completed
            && self.store.get_profile(tenant_id).is_some();
        let journey = self.journeys.get(&tenant_id).map(|j| j.value().clone()).unwrap_or_default();
        (has_profile, journey.scope_reviewed_at.is_some(), journey.plan.is_some())
    }

    pub fn status(&self, tenant_id: Uuid) -> OnboardingStatus {
        let (has_profile, has_scope, is_complete) = self.flags(tenant_id);
        let current_step = match (has_profile, has_scope, is_complete) {
            (_, _, true) => OnboardingStep::Completed,
            (_, true, _) => OnboardingStep::CreatePlan,
            (true, _, _) => OnboardingStep::ReviewScope,
            _ => OnboardingStep::OrgProfile,
        };
        let completion_percentage = if is_complete {
            100
        } else if has_scope {
            75
        } else if has_profile {
            50
        } else {
            25
        };
        let next_action = if !has_profile {
            Some("Complete Organization Profile")
        } else if !has_scope {
            Some("Review Compliance Scope")
        } else if !is_complete {
            Some("Create Your First Plan")
        } else {
            None
        };
        let state = |done: bool, active: bool| {
            if done {
                StepState::Completed
            } else if active {
                StepState::InProgress
            } else {
                StepState::Pending
            }
        };
        let step = |number: u8, name: &str, status: StepState, accessible: bool| StepStatus {
            number,
            name: name.to_string(),
            status,
            accessible,
        };

        OnboardingStatus {
            tenant_id,
            current_step,
            completion_percentage,
            is_profile_complete: has_profile,
            is_scope_reviewed: has_scope,
            is_onboarding_complete: is_complete,
            next_action: next_action.map(str::to_string),
            steps: vec![
                step(1, "Organization Signup", StepState::Completed, true),
                step(2, "Organization Profile", state(has_profile, true), true),
                step(3, "Review Compliance Scope", state(has_scope, has_profile), has_profile),
                step(4, "Create First Plan", state(is_complete, has_scope), has_scope),
            ],
        }
    }

    pub fn can_proceed_to_step(&self, tenant_id: Uuid, step: &str) -> StepValidation {
        let (has_profile, has_scope, _) = self.flags(tenant_id);
        let blocked = |reason: &str, missing: &[&str], redirect: OnboardingStep| StepValidation {
            can_proceed: false,
            blocker_reason: Some(reason.to_string()),
            missing_prerequisites: missing.iter().map(|m| m.to_string()).collect(),
            redirect_to_step: Some(redirect),
        };
        let allowed = StepValidation {
            can_proceed: true,
            ..Default::default()
        };

        match step.to_ascii_lowercase().as_str() {
            "reviewscope" | "review-scope" | "scope" if !has_profile => {
                blocked(PROFILE_BLOCKER, &["Organization Profile"], OnboardingStep::OrgProfile)
            }
            "createplan" | "create-plan" | "plan" if !has_profile => blocked(
                PROFILE_BLOCKER,
                &["Organization Profile", "Scope Review"],
                OnboardingStep::OrgProfile,
            ),
            "createplan" | "create-plan" | "plan" if !has_scope => {
                blocked(SCOPE_BLOCKER, &["Scope Review"], OnboardingStep::ReviewScope)
            }
            _ => allowed,
        }
    }

    pub fn next_step(&self, tenant_id: Uuid) -> NextStep {
        let (has_profile, has_scope, is_complete) = self.flags(tenant_id);
        let next = |step, name: &str, description: &str, estimated_minutes| NextStep {
            step,
            name: name.to_string(),
            description: description.to_string(),
            estimated_minutes,
        };
        if !has_profile {
            next(
                OnboardingStep::OrgProfile,
                "Organization Profile",
                "Tell us about your organization so the right frameworks can be recommended.",
                5,
            )
        } else if !has_scope {
            next(
                OnboardingStep::ReviewScope,
                "Review Compliance Scope",
                "Review the baselines and packages derived from your profile.",
                3,
            )
        } else if !is_complete {
            next(
                OnboardingStep::CreatePlan,
                "Create Assessment Plan",
                "Create your first assessment plan from the reviewed scope.",
                2,
            )
        } else {
            next(OnboardingStep::Completed, "Dashboard", "Onboarding is complete.", 0)
        }
    }

    pub fn resume(&self, tenant_id: Uuid) -> ResumeOnboarding {
        let (has_profile, has_scope, is_complete) = self.flags(tenant_id);
        // Signup is done once the tenant exists.
        let completed_steps =
            1 + u8::from(has_profile) + u8::from(has_scope) + u8::from(is_complete);
        ResumeOnboarding {
            resume_step: self.status(tenant_id).current_step,
            completed_steps,
            total_steps: 4,
            message: format!(
                "Welcome back! You've completed {completed_steps} of 4 onboarding steps."
            ),
        }
    }

    pub fn mark_scope_reviewed(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> GrcResult<OnboardingStatus> {
        let check = self.can_proceed_to_step(tenant_id, "scope");
        if !check.can_proceed {
            return Err(GrcError::Validation(check.blocker_reason.unwrap_or_default()));
        }
        if self.store.scope(tenant_id).is_empty() {
            return Err(GrcError::Validation("No compliance scope has been derived yet.".into()));
        }
        self.journeys.entry(tenant_id).or_default().scope_reviewed_at = Some(Utc::now());
        self.audit.log_action(
            tenant_id,
            Some(user_id),
            "onboarding.scope_reviewed",
            "OnboardingWizard",
            &tenant_id.to_string(),
            serde_json::json!({}),
            vec![],
        );
        Ok(self.status(tenant_id))
    }

    /// Create the first assessment plan from the reviewed scope.
    pub fn create_plan(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        name: Option<String>,
    ) -> GrcResult<AssessmentPlan> {
        let check = self.can_proceed_to_step(tenant_id, "plan");
        if !check.can_proceed {
            return Err(GrcError::Validation(check.blocker_reason.unwrap_or_default()));
        }
        let mut journey = self.journeys.entry(tenant_id).or_default();
        if journey.plan.is_some() {
            return Err(GrcError::Conflict("An onboarding plan already exists".into()));
        }
        let plan = AssessmentPlan {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.unwrap_or_else(|| "Initial Compliance Plan".to_string()),
            baselines: self.store.scope_codes(tenant_id, ScopeKind::Baseline),
            packages: self.store.scope_codes(tenant_id, ScopeKind::Package),
            created_by: user_id,
            created_at: Utc::now(),
        };
        journey.plan = Some(plan.clone());
        drop(journey);

        self.audit.log_action(
            tenant_id,
            Some(user_id),
            "onboarding.plan_created",
            "AssessmentPlan",
            &plan.id.to_string(),
            serde_json::json!({ "baselines": plan.baselines }),
            vec![],
        );
        info!(tenant_id = %tenant_id, plan_id = %plan.id, "Onboarding plan created");
        Ok(plan)
    }

    pub fn plan(&self, tenant_id: Uuid) -> Option<AssessmentPlan> {
        self.journeys.get(&tenant_id).and_then(|j| j.plan.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service() -> (OnboardingService, Arc<ManagementStore>, Arc<AuditLogger>) {
        let store = Arc::new(ManagementStore::new());
        let audit = Arc::new(AuditLogger::new());
        let rules = Arc::new(RulesEngine::new(store.clone(), audit.clone()));
        rules.seed_default_ruleset().unwrap();
        let svc = OnboardingService::new(
            store.clone(),
            rules,
            audit.clone(),
            OnboardingConfig::default(),
        );
        (svc, store, audit)
    }

    fn answers() -> serde_json::Value {
        json!({
            "legal_name": "Gulf Bank",
            "sector": "Banking",
            "country": "SA",
            "data_types": ["PII", "PCI"],
            "hosting_model": "Hybrid"
        })
    }

    #[test]
    fn test_section_table() {
        assert_eq!(total_questions(), 96);
        let required: Vec<&str> = SECTIONS.iter().filter(|s| s.required).map(|s| s.code).collect();
        assert_eq!(required, vec!["A", "D", "E", "F", "H", "I"]);
        assert!(section_index("z").is_err());
        assert_eq!(section_index("d").unwrap(), 3);
    }

    #[test]
    fn test_save_section_progress() {
        let (svc, store, _) = service();
        let tenant = Uuid::new_v4();

        let w = svc.start_wizard(tenant);
        assert_eq!((w.status, w.current_step), (WizardStatus::InProgress, 1));
        assert_eq!(svc.start_wizard(tenant).started_at, w.started_at);

        let w = svc.save_section(tenant, "a", answers(), false).unwrap();
        assert_eq!(w.progress_percent, 0);
        assert_eq!(store.get_profile(tenant).unwrap().legal_name, "Gulf Bank");

        let w = svc.save_section(tenant, "A", json!({}), true).unwrap();
        assert_eq!((w.current_step, w.progress_percent), (2, 8));
        let w = svc.save_section(tenant, "L", json!({}), true).unwrap();
        assert_eq!(w.current_step, 12);
        // Completing an earlier section never moves the cursor back.
        let w = svc.save_section(tenant, "C", json!({}), true).unwrap();
        assert_eq!((w.current_step, w.progress_percent), (12, 25));

        assert!(matches!(
            svc.save_section(tenant, "B", json!({"employee_count": "many"}), true),
            Err(GrcError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_modes() {
        let (svc, _, _) = service();
        let tenant = Uuid::new_v4();
        let v = svc.validate(tenant, true);
        assert!(!v.can_complete);

        svc.save_section(tenant, "A", answers(), true).unwrap();
        let v = svc.validate(tenant, true);
        assert!(!v.is_valid);
        assert!(v.missing.contains(&"Section D incomplete".to_string()));
        assert!(v.warnings.is_empty());

        svc.save_minimal(tenant, answers()).unwrap();
        let v = svc.validate(tenant, true);
        assert!(v.is_valid && v.can_complete);
        let full = svc.validate(tenant, false);
        assert!(!full.is_valid);
        assert!(full.can_complete);
        assert_eq!(full.warnings.len(), 6);
        assert_eq!(full.warnings[0], "Optional Section B not completed");
    }

    #[test]
    fn test_complete_wizard_derives_scope() {
        let (svc, store, audit) = service();
        let tenant = Uuid::new_v4();
        let user = Uuid::new_v4();
        svc.save_section(tenant, "A", answers(), true).unwrap();
        assert!(matches!(
            svc.complete_wizard(tenant, user, true),
            Err(GrcError::Validation(_))
        ));

        svc.save_minimal(tenant, answers()).unwrap();
        let done = svc.complete_wizard(tenant, user, true).unwrap();
        let scope = done.scope.expect("scope derived");
        assert!(scope.baselines.contains(&"NCA_ECC".to_string()));
        assert!(!store.scope(tenant).is_empty());

        let wizard = svc.wizard(tenant).unwrap();
        assert_eq!(wizard.status, WizardStatus::Completed);
        assert_eq!(wizard.progress_percent, 100);
        assert_eq!(wizard.operating_defaults.unwrap().escalation_days_overdue, 3);
        assert_eq!(audit.query(tenant, None, None, Some("onboarding.completed"), 10).len(), 1);

        assert!(matches!(
            svc.save_section(tenant, "B", json!({}), true),
            Err(GrcError::Conflict(_))
        ));
        assert!(matches!(
            svc.complete_wizard(tenant, user, true),
            Err(GrcError::Conflict(_))
        ));
    }

    #[test]
    fn test_completion_survives_missing_ruleset() {
        let store = Arc::new(ManagementStore::new());
        let audit = Arc::new(AuditLogger::new());
        let rules = Arc::new(RulesEngine::new(store.clone(), audit.clone()));
        let svc = OnboardingService::new(store, rules, audit, OnboardingConfig::default());
        let tenant = Uuid::new_v4();

        svc.save_minimal(tenant, answers()).unwrap();
        let done = svc.complete_wizard(tenant, Uuid::new_v4(), true).unwrap();
        assert!(done.scope.is_none());
        assert!(done.warnings.iter().any(|w| w.contains("No active ruleset")));
        assert_eq!(svc.wizard_status(tenant), WizardStatus::Completed);
    }

    #[test]
    fn test_onboarding_journey() {
        let (svc, _, _) = service();
        let tenant = Uuid::new_v4();
        let user = Uuid::new_v4();

        let status = svc.status(tenant);
        assert_eq!(status.current_step, OnboardingStep::OrgProfile);
        assert_eq!(status.completion_percentage, 25);
        assert_eq!(svc.next_step(tenant).estimated_minutes, 5);

        let blocked = svc.can_proceed_to_step(tenant, "plan");
        assert!(!blocked.can_proceed);
        assert_eq!(blocked.blocker_reason.as_deref(), Some(PROFILE_BLOCKER));
        assert_eq!(blocked.missing_prerequisites.len(), 2);
        assert!(svc.mark_scope_reviewed(tenant, user).is_err());

        svc.save_minimal(tenant, answers()).unwrap();
        svc.complete_wizard(tenant, user, true).unwrap();
        let status = svc.status(tenant);
        assert_eq!(
            (status.current_step, status.completion_percentage),
            (OnboardingStep::ReviewScope, 50)
        );
        let blocked = svc.can_proceed_to_step(tenant, "create-plan");
        assert_eq!(blocked.blocker_reason.as_deref(), Some(SCOPE_BLOCKER));
        assert_eq!(blocked.redirect_to_step, Some(OnboardingStep::ReviewScope));
        assert!(svc.create_plan(tenant, user, None).is_err());

        svc.mark_scope_reviewed(tenant, user).unwrap();
        assert_eq!(svc.status(tenant).completion_percentage, 75);
        assert_eq!(svc.next_step(tenant).estimated_minutes, 2);

        let plan = svc.create_plan(tenant, user, None).unwrap();
        assert_eq!(plan.name, "Initial Compliance Plan");
        assert!(plan.baselines.contains(&"NCA_ECC".to_string()));
        assert!(matches!(svc.create_plan(tenant, user, None), Err(GrcError::Conflict(_))));

        let status = svc.status(tenant);
        assert_eq!(
            (status.current_step, status.completion_percentage),
            (OnboardingStep::Completed, 100)
        );
        assert!(status.steps.iter().all(|s| s.status == StepState::Completed));
        let resume = svc.resume(tenant);
        assert_eq!(resume.message, "Welcome back! You've completed 4 of 4 onboarding steps.");
        assert_eq!(svc.next_step(tenant).estimated_minutes, 0);
    }
}
