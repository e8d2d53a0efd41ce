//! Request and response bodies for the management API.

use crate::audits::{AuditStatus, AuditType, FindingSeverity};
use crate::controls::ImplementationStatus;
use crate::risks::RiskStatus;
use crate::routing::RaciRole;
use crate::workflows::{
    ApprovalDecision, ChainLevel, NewTask, TaskStatus, WorkflowStatus, WorkflowType,
};
use chrono::{DateTime, Utc};
use grc_core::types::{AssetCriticality, DataClassification};
use grc_platform::tenancy::{Tenant, TenantUser};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation_hint: Option<String>,
}

// ─── Auth & tenants ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub tenant_slug: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: Uuid,
    pub expires_at: DateTime<Utc>,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub organization_name: String,
    pub slug: String,
    pub admin_email: String,
    pub admin_name: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignupResponse {
    pub tenant: Tenant,
    pub admin_user: TenantUser,
    pub activation_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivateRequest {
    pub token: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuspendRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub display_name: String,
    pub password: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignRoleRequest {
    pub role: String,
}

// ─── Onboarding ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct SaveSectionRequest {
    pub answers: serde_json::Value,
    #[serde(default)]
    pub mark_complete: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinimalOnboardingRequest {
    pub answers: serde_json::Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompleteWizardRequest {
    #[serde(default)]
    pub minimal: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValidateQuery {
    #[serde(default)]
    pub minimal: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePlanRequest {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRulesetRequest {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub activate: bool,
}

// ─── Assets ────────────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAssetRequest {
    pub name: String,
    pub asset_type: String,
    pub criticality: AssetCriticality,
    pub data_classification: DataClassification,
    #[serde(default)]
    pub data_types: Vec<String>,
    pub hosting_model: String,
    #[serde(default)]
    pub cloud_provider: Option<String>,
    #[serde(default)]
    pub owner_id: Option<Uuid>,
    #[serde(default = "default_true")]
    pub is_in_scope: bool,
}

// ─── Risks & controls ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRiskRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub likelihood: u8,
    pub impact: u8,
    #[serde(default)]
    pub owner_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRiskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub likelihood: Option<u8>,
    pub impact: Option<u8>,
    pub owner_id: Option<Uuid>,
    pub status: Option<RiskStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AcceptRiskRequest {
    pub justification: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinkControlRequest {
    pub control_id: Uuid,
    pub expected_effectiveness: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateControlRequest {
    pub code: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub baseline_code: String,
    #[serde(default)]
    pub owner_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateControlRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub owner_id: Option<Uuid>,
    pub implementation_status: Option<ImplementationStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordTestRequest {
    pub score: u8,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ControlQuery {
    pub baseline: Option<String>,
}

// ─── Assessments & evidence ────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAssessmentRequest {
    pub name: String,
    pub baseline_code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddRequirementRequest {
    pub control_code: String,
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEvidenceRequest {
    pub assessment_id: Uuid,
    pub requirement_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub owner_id: Option<Uuid>,
    #[serde(default)]
    pub classification: Option<DataClassification>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoreEvidenceRequest {
    pub score: u8,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvidenceQuery {
    pub assessment_id: Option<Uuid>,
    #[serde(default)]
    pub pending_review: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RejectEvidenceRequest {
    pub reason: String,
}

// ─── Governance policies ───────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePolicyRequest {
    pub code: String,
    pub title: String,
    pub category: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub effective_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expiry_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub owner_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePolicyRequest {
    pub title: Option<String>,
    pub category: Option<String>,
    pub content: Option<String>,
    pub version: Option<String>,
    pub effective_date: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub owner_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordViolationRequest {
    pub description: String,
    #[serde(default)]
    pub severity: Option<FindingSeverity>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolveViolationRequest {
    pub resolution: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyQuery {
    pub expiring_within_days: Option<i64>,
}

// ─── Audit engagements ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAuditRequest {
    pub title: String,
    pub audit_type: AuditType,
    #[serde(default)]
    pub scope: String,
    pub planned_start: DateTime<Utc>,
    pub planned_end: DateTime<Utc>,
    #[serde(default)]
    pub lead_auditor_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransitionAuditRequest {
    pub status: AuditStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFindingRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub severity: FindingSeverity,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub owner_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CloseFindingRequest {
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditQuery {
    pub upcoming_days: Option<i64>,
}

// ─── Workflows & approvals ─────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct StartWorkflowRequest {
    pub workflow_type: WorkflowType,
    pub entity_type: String,
    pub entity_id: String,
    #[serde(default)]
    pub tasks: Vec<NewTask>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstanceTransitionRequest {
    pub status: WorkflowStatus,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskTransitionRequest {
    pub status: TaskStatus,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EscalateRequest {
    #[serde(default)]
    pub escalation_days: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitApprovalRequest {
    pub entity_type: String,
    pub entity_id: String,
    pub chain: Vec<ChainLevel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecisionRequest {
    pub decision: ApprovalDecision,
    #[serde(default)]
    pub comment: Option<String>,
}

// ─── Teams & RACI ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTeamRequest {
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    pub role_code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignRaciRequest {
    pub scope_type: String,
    pub scope_id: String,
    pub team_id: Uuid,
    pub role: RaciRole,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RaciQuery {
    pub scope_type: String,
    pub scope_id: String,
}

// ─── Audit trail & policy evaluation ───────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditTrailQuery {
    pub action: Option<String>,
    pub limit: Option<usize>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluatePolicyRequest {
    pub action: String,
    pub resource_type: String,
    #[serde(default)]
    pub environment: Option<String>,
    pub resource: serde_json::Value,
}
