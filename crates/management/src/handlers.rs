//! Axum REST handlers for the management API.
//!
//! Every handler follows the same shape: check the caller's permission, call
//! the service, audit and count mutations, and return the DTO.

use crate::assessments::{Assessment, AssessmentService, Evidence, EvidenceStatistics, Requirement};
use crate::audits::{AuditEngagement, AuditEngagementService, AuditFinding, FindingSeverity};
use crate::auth;
use crate::controls::{Control, ControlService};
use crate::dashboard::{DashboardService, DashboardSummary};
use crate::enforcement::{CallerContext, PolicyGate};
use crate::models::*;
use crate::onboarding::{
    AssessmentPlan, NextStep, OnboardingService, OnboardingStatus, OnboardingWizard,
    ResumeOnboarding, SectionDef, StepValidation, WizardCompletion, WizardValidation, SECTIONS,
};
use crate::policies::{GovernancePolicy, PolicyService, PolicyViolation};
use crate::risks::{HeatMap, Risk, RiskControlLink, RiskFilter, RiskPosture, RiskService};
use crate::routing::{AssigneeResolution, AssigneeRouter, RaciAssignment, RouteQuery, Team};
use crate::rules::{DerivedScope, Rule, RuleExecutionLog, Ruleset, RulesEngine};
use crate::store::{ManagementStore, ScopeItem};
use crate::workflows::{
    ApprovalRecord, ApprovalRequest, WorkflowEngine, WorkflowInstance, WorkflowTask,
    WorkflowTransition,
};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::Utc;
use grc_core::config::AppConfig;
use grc_core::error::{GrcError, GrcResult};
use grc_core::types::{Asset, OrganizationProfile};
use grc_platform::audit::{AuditEvent, ChainVerification};
use grc_platform::auth::AuthToken;
use grc_platform::permissions as perm;
use grc_platform::policy::{PolicyContext, PolicyDecision, PolicyDocument};
use grc_platform::rbac::{role_names, Role};
use grc_platform::tenancy::{Tenant, TenantUser};
use grc_platform::{AuditLogger, AuthManager, PolicyEnforcer, RbacEngine, TenantManager};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub const DEMO_TENANT_SLUG: &str = "demo";
pub const DEMO_ADMIN_EMAIL: &str = "admin@demo.local";
pub const DEMO_PASSWORD: &str = "ChangeMe123!";

/// Shared management state.
#[derive(Clone)]
pub struct ManagementState {
    pub config: Arc<AppConfig>,
    pub tenants: Arc<TenantManager>,
    pub rbac: Arc<RbacEngine>,
    pub auth: Arc<AuthManager>,
    pub audit: Arc<AuditLogger>,
    pub enforcer: Arc<PolicyEnforcer>,
    pub store: Arc<ManagementStore>,
    pub rules: Arc<RulesEngine>,
    pub onboarding: Arc<OnboardingService>,
    pub controls: Arc<ControlService>,
    pub risks: Arc<RiskService>,
    pub assessments: Arc<AssessmentService>,
    pub policies: Arc<PolicyService>,
    pub audits: Arc<AuditEngagementService>,
    pub assignees: Arc<AssigneeRouter>,
    pub workflows: Arc<WorkflowEngine>,
    pub dashboard: Arc<DashboardService>,
}

impl ManagementState {
    /// Wire every service and seed roles, the baseline policy and the default ruleset.
    pub fn new(config: &AppConfig) -> GrcResult<Self> {
        let tenants = Arc::new(TenantManager::new());
        let rbac = Arc::new(RbacEngine::new());
        rbac.seed_default_roles();
        let auth = Arc::new(AuthManager::new(&config.auth));
        let audit = Arc::new(AuditLogger::new());

        let enforcer = Arc::new(PolicyEnforcer::new(&config.policy));
        enforcer.load_baseline()?;
        let gate = Arc::new(PolicyGate::new(enforcer.clone(), audit.clone()));

        let store = Arc::new(ManagementStore::new());
        let rules = Arc::new(RulesEngine::new(store.clone(), audit.clone()));
        rules.seed_default_ruleset()?;
        let onboarding = Arc::new(OnboardingService::new(
            store.clone(),
            rules.clone(),
            audit.clone(),
            config.onboarding.clone(),
        ));

        let controls = Arc::new(ControlService::new());
        let risks = Arc::new(RiskService::new(controls.clone()));
        let assessments = Arc::new(AssessmentService::new(
            config.evidence.clone(),
            config.onboarding.evidence_naming_pattern.clone(),
            config.onboarding.evidence_sla_submit_days,
            gate.clone(),
        ));
        let policies = Arc::new(PolicyService::new(gate));
        let audits =
            Arc::new(AuditEngagementService::new(config.onboarding.remediation_sla_days.clone()));
        let assignees = Arc::new(AssigneeRouter::new(tenants.clone(), rbac.clone()));
        let workflows = Arc::new(WorkflowEngine::new(
            assignees.clone(),
            config.onboarding.evidence_sla_submit_days,
        ));
        let dashboard = Arc::new(DashboardService::new(
            assessments.clone(),
            risks.clone(),
            workflows.clone(),
            audits.clone(),
            policies.clone(),
            onboarding.clone(),
        ));

        let state = Self {
            config: Arc::new(config.clone()),
            tenants,
            rbac,
            auth,
            audit,
            enforcer,
            store,
            rules,
            onboarding,
            controls,
            risks,
            assessments,
            policies,
            audits,
            assignees,
            workflows,
            dashboard,
        };
        if config.seed_demo_data {
            state.seed_demo()?;
        }
        Ok(state)
    }

    /// Active demo tenant whose admin also holds the platform admin role.
    fn seed_demo(&self) -> GrcResult<()> {
        let tenant = self
            .tenants
            .create_tenant("Demo Organization", DEMO_TENANT_SLUG, DEMO_ADMIN_EMAIL)?;
        if let Some(token) = tenant.activation_token.as_deref() {
            self.tenants.activate(token)?;
        }
        let admin = self
            .tenants
            .add_user(tenant.id, DEMO_ADMIN_EMAIL, "Demo Administrator", DEMO_PASSWORD)?;
        self.rbac.assign_role_by_name(admin.id, role_names::TENANT_ADMIN);
        self.rbac.assign_role_by_name(admin.id, role_names::PLATFORM_ADMIN);
        let manager = self
            .tenants
            .add_user(
                tenant.id,
                "compliance@demo.local",
                "Demo Compliance Manager",
                DEMO_PASSWORD,
            )?;
        self.rbac.assign_role_by_name(manager.id, role_names::COMPLIANCE_MANAGER);
        info!(tenant_id = %tenant.id, slug = DEMO_TENANT_SLUG, "Demo tenant seeded");
        Ok(())
    }

    fn record(
        &self,
        caller: &CallerContext,
        action: &str,
        resource_type: &str,
        resource_id: impl ToString,
        details: serde_json::Value,
    ) {
        self.audit.log_action(
            caller.tenant_id,
            Some(caller.user_id),
            action,
            resource_type,
            &resource_id.to_string(),
            details,
            vec![],
        );
    }
}

// ─── Errors ────────────────────────────────────────────────────────────────

/// `GrcError` rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub GrcError);

impl From<GrcError> for ApiError {
    fn from(err: GrcError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, remediation_hint) = match &self.0 {
            GrcError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found", None),
            GrcError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error", None),
            GrcError::Serialization(_) => (StatusCode::BAD_REQUEST, "invalid_payload", None),
            GrcError::Conflict(_) => (StatusCode::CONFLICT, "conflict", None),
            GrcError::InvalidTransition { .. } => {
                (StatusCode::CONFLICT, "invalid_transition", None)
            }
            GrcError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden", None),
            GrcError::PolicyViolation { remediation_hint, .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "policy_violation",
                remediation_hint.clone(),
            ),
            GrcError::RulesEngine(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "rules_engine_error", None)
            }
            GrcError::Config(_) | GrcError::Io(_) | GrcError::Internal(_) => {
                warn!(error = %self.0, "Internal error while handling request");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };
        (
            status,
            Json(ErrorResponse {
                error: error.to_string(),
                message: self.0.to_string(),
                remediation_hint,
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

type Caller = Extension<CallerContext>;

// ─── Auth ──────────────────────────────────────────────────────────────────

pub async fn handle_login(
    State(state): State<ManagementState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, Json<ErrorResponse>)> {
    match auth::authenticate(&state, &req) {
        Ok(resp) => {
            metrics::counter!("grc.auth.logins").increment(1);
            Ok(Json(resp))
        }
        Err(err) => {
            metrics::counter!("grc.auth.login_failures").increment(1);
            let status = match err {
                GrcError::Forbidden(_) | GrcError::NotFound { .. } => StatusCode::UNAUTHORIZED,
                _ => StatusCode::BAD_REQUEST,
            };
            Err((
                status,
                Json(ErrorResponse {
                    error: "auth_failed".to_string(),
                    message: err.to_string(),
                    remediation_hint: None,
                }),
            ))
        }
    }
}

pub async fn handle_logout(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    headers: axum::http::HeaderMap,
) -> StatusCode {
    let header_value = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    match auth::bearer_token(header_value) {
        Some(token) if state.auth.revoke_session(token) => {
            state.record(&caller, "auth.logout", "User", caller.user_id, json!({}));
            StatusCode::NO_CONTENT
        }
        _ => StatusCode::NOT_FOUND,
    }
}

pub async fn whoami(Extension(caller): Caller) -> Json<CallerContext> {
    Json(caller)
}

pub async fn create_api_key(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
) -> ApiResult<(StatusCode, Json<AuthToken>)> {
    caller.require(perm::admin::ACCESS)?;
    let key = state
        .auth
        .generate_api_key(caller.user_id, caller.tenant_id, caller.roles.clone());
    state.record(
        &caller,
        "auth.api_key_created",
        "ApiKey",
        key.token_id,
        json!({ "expires_at": key.expires_at }),
    );
    Ok((StatusCode::CREATED, Json(key)))
}

// ─── Tenants ───────────────────────────────────────────────────────────────

pub async fn signup(
    State(state): State<ManagementState>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<SignupResponse>)> {
    if !req.admin_email.contains('@') {
        return Err(GrcError::Validation(format!("Invalid email '{}'", req.admin_email)).into());
    }
    if req.password.len() < 8 {
        return Err(GrcError::Validation("Password must be at least 8 characters".into()).into());
    }
    let tenant = state
        .tenants
        .create_tenant(&req.organization_name, &req.slug, &req.admin_email)?;
    let admin_user = state
        .tenants
        .add_user(tenant.id, &req.admin_email, &req.admin_name, &req.password)?;
    state.rbac.assign_role_by_name(admin_user.id, role_names::TENANT_ADMIN);
    state.audit.log_action(
        tenant.id,
        Some(admin_user.id),
        "tenant.created",
        "Tenant",
        &tenant.id.to_string(),
        json!({ "slug": tenant.slug }),
        vec![],
    );
    metrics::counter!("grc.tenants.created").increment(1);
    let activation_token = tenant.activation_token.clone().unwrap_or_default();
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            tenant,
            admin_user,
            activation_token,
        }),
    ))
}

pub async fn activate_tenant(
    State(state): State<ManagementState>,
    Json(req): Json<ActivateRequest>,
) -> ApiResult<Json<Tenant>> {
    let tenant = state.tenants.activate(&req.token)?;
    state.audit.log_action(
        tenant.id,
        None,
        "tenant.activated",
        "Tenant",
        &tenant.id.to_string(),
        json!({}),
        vec![],
    );
    metrics::counter!("grc.tenants.activated").increment(1);
    Ok(Json(tenant))
}

pub async fn list_tenants(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
) -> ApiResult<Json<Vec<Tenant>>> {
    caller.require(perm::tenants::VIEW)?;
    Ok(Json(state.tenants.list_tenants()))
}

pub async fn get_tenant(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Tenant>> {
    caller.require(perm::tenants::VIEW)?;
    let tenant = state.tenants.get_tenant(id).ok_or_else(|| GrcError::not_found("Tenant", id))?;
    Ok(Json(tenant))
}

pub async fn suspend_tenant(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<SuspendRequest>,
) -> ApiResult<Json<Tenant>> {
    caller.require(perm::tenants::MANAGE)?;
    let tenant = state.tenants.suspend_tenant(id, req.reason.clone())?;
    state.record(&caller, "tenant.suspended", "Tenant", id, json!({ "reason": req.reason }));
    metrics::counter!("grc.tenants.suspended").increment(1);
    Ok(Json(tenant))
}

pub async fn reactivate_tenant(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Tenant>> {
    caller.require(perm::tenants::MANAGE)?;
    let tenant = state.tenants.reactivate_tenant(id)?;
    state.record(&caller, "tenant.reactivated", "Tenant", id, json!({}));
    Ok(Json(tenant))
}

pub async fn archive_tenant(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Tenant>> {
    caller.require(perm::tenants::MANAGE)?;
    let tenant = state.tenants.archive_tenant(id)?;
    state.record(&caller, "tenant.archived", "Tenant", id, json!({}));
    Ok(Json(tenant))
}

pub async fn delete_tenant(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    caller.require(perm::tenants::MANAGE)?;
    if id == caller.tenant_id {
        return Err(
            GrcError::Conflict("Cannot delete the tenant you are signed in to".into()).into(),
        );
    }
    state.tenants.soft_delete(id)?;
    state.record(&caller, "tenant.deleted", "Tenant", id, json!({}));
    metrics::counter!("grc.tenants.deleted").increment(1);
    Ok(StatusCode::NO_CONTENT)
}

// ─── Users & roles ─────────────────────────────────────────────────────────

fn assign_role(
    state: &ManagementState,
    caller: &CallerContext,
    user_id: Uuid,
    role: &str,
) -> GrcResult<()> {
    if role == role_names::PLATFORM_ADMIN && !caller.has_permission(perm::admin::TENANTS) {
        return Err(GrcError::Forbidden(
            "Only platform administrators can grant PlatformAdmin".into(),
        ));
    }
    if !state.rbac.assign_role_by_name(user_id, role) {
        return Err(GrcError::Validation(format!("Unknown role '{role}'")));
    }
    Ok(())
}

pub async fn list_users(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
) -> ApiResult<Json<Vec<TenantUser>>> {
    caller.require(perm::users::VIEW)?;
    Ok(Json(state.tenants.list_users(caller.tenant_id)))
}

pub async fn create_user(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<TenantUser>)> {
    caller.require(perm::users::CREATE)?;
    if let Some(unknown) = req.roles.iter().find(|r| state.rbac.role_by_name(r).is_none()) {
        return Err(GrcError::Validation(format!("Unknown role '{unknown}'")).into());
    }
    let user = state
        .tenants
        .add_user(caller.tenant_id, &req.email, &req.display_name, &req.password)?;
    for role in &req.roles {
        assign_role(&state, &caller, user.id, role)?;
    }
    state.record(&caller, "user.created", "User", user.id, json!({ "roles": req.roles }));
    metrics::counter!("grc.users.created").increment(1);
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn assign_user_role(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<AssignRoleRequest>,
) -> ApiResult<Json<Vec<String>>> {
    caller.require(perm::users::ASSIGN_ROLE)?;
    state
        .tenants
        .get_user(caller.tenant_id, id)
        .ok_or_else(|| GrcError::not_found("User", id))?;
    assign_role(&state, &caller, id, &req.role)?;
    state.record(&caller, "user.role_assigned", "User", id, json!({ "role": req.role }));
    Ok(Json(state.rbac.user_role_names(id)))
}

pub async fn deactivate_user(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TenantUser>> {
    caller.require(perm::users::EDIT)?;
    let user = state.tenants.deactivate_user(caller.tenant_id, id)?;
    for session in state.auth.list_active_sessions(id) {
        state.auth.revoke_session(session.token.token_id);
    }
    state.record(&caller, "user.deactivated", "User", id, json!({}));
    Ok(Json(user))
}

pub async fn list_roles(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
) -> ApiResult<Json<Vec<Role>>> {
    caller.require(perm::roles::VIEW)?;
    Ok(Json(state.rbac.list_roles()))
}

// ─── Onboarding ────────────────────────────────────────────────────────────

pub async fn wizard_sections(Extension(caller): Caller) -> ApiResult<Json<Vec<SectionDef>>> {
    caller.require(perm::onboarding::VIEW)?;
    Ok(Json(SECTIONS.to_vec()))
}

pub async fn get_wizard(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
) -> ApiResult<Json<OnboardingWizard>> {
    caller.require(perm::onboarding::VIEW)?;
    let wizard = state
        .onboarding
        .wizard(caller.tenant_id)
        .ok_or_else(|| GrcError::not_found("OnboardingWizard", caller.tenant_id))?;
    Ok(Json(wizard))
}

pub async fn start_wizard(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
) -> ApiResult<Json<OnboardingWizard>> {
    caller.require(perm::onboarding::MANAGE)?;
    Ok(Json(state.onboarding.start_wizard(caller.tenant_id)))
}

pub async fn save_wizard_section(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(section): Path<String>,
    Json(req): Json<SaveSectionRequest>,
) -> ApiResult<Json<OnboardingWizard>> {
    caller.require(perm::onboarding::MANAGE)?;
    let wizard = state
        .onboarding
        .save_section(caller.tenant_id, &section, req.answers, req.mark_complete)?;
    metrics::counter!("grc.onboarding.sections_saved").increment(1);
    Ok(Json(wizard))
}

pub async fn save_minimal_onboarding(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Json(req): Json<MinimalOnboardingRequest>,
) -> ApiResult<Json<OnboardingWizard>> {
    caller.require(perm::onboarding::MANAGE)?;
    Ok(Json(state.onboarding.save_minimal(caller.tenant_id, req.answers)?))
}

pub async fn validate_wizard(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Query(q): Query<ValidateQuery>,
) -> ApiResult<Json<WizardValidation>> {
    caller.require(perm::onboarding::VIEW)?;
    Ok(Json(state.onboarding.validate(caller.tenant_id, q.minimal)))
}

pub async fn complete_wizard(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Json(req): Json<CompleteWizardRequest>,
) -> ApiResult<Json<WizardCompletion>> {
    caller.require(perm::onboarding::MANAGE)?;
    let completion = state
        .onboarding
        .complete_wizard(caller.tenant_id, caller.user_id, req.minimal)?;
    metrics::counter!("grc.onboarding.completed").increment(1);
    Ok(Json(completion))
}

pub async fn onboarding_status(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
) -> ApiResult<Json<OnboardingStatus>> {
    caller.require(perm::onboarding::VIEW)?;
    Ok(Json(state.onboarding.status(caller.tenant_id)))
}

pub async fn onboarding_next_step(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
) -> ApiResult<Json<NextStep>> {
    caller.require(perm::onboarding::VIEW)?;
    Ok(Json(state.onboarding.next_step(caller.tenant_id)))
}

pub async fn onboarding_resume(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
) -> ApiResult<Json<ResumeOnboarding>> {
    caller.require(perm::onboarding::VIEW)?;
    Ok(Json(state.onboarding.resume(caller.tenant_id)))
}

pub async fn onboarding_can_proceed(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(step): Path<String>,
) -> ApiResult<Json<StepValidation>> {
    caller.require(perm::onboarding::VIEW)?;
    Ok(Json(state.onboarding.can_proceed_to_step(caller.tenant_id, &step)))
}

pub async fn review_scope(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
) -> ApiResult<Json<OnboardingStatus>> {
    caller.require(perm::onboarding::MANAGE)?;
    Ok(Json(state.onboarding.mark_scope_reviewed(caller.tenant_id, caller.user_id)?))
}

pub async fn create_onboarding_plan(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Json(req): Json<CreatePlanRequest>,
) -> ApiResult<(StatusCode, Json<AssessmentPlan>)> {
    caller.require(perm::assessments::CREATE)?;
    let plan = state.onboarding.create_plan(caller.tenant_id, caller.user_id, req.name)?;
    metrics::counter!("grc.onboarding.plans_created").increment(1);
    Ok((StatusCode::CREATED, Json(plan)))
}

// ─── Profile, scope & rules ────────────────────────────────────────────────

pub async fn get_profile(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
) -> ApiResult<Json<OrganizationProfile>> {
    caller.require(perm::onboarding::VIEW)?;
    let profile = state
        .store
        .get_profile(caller.tenant_id)
        .ok_or_else(|| GrcError::not_found("OrganizationProfile", caller.tenant_id))?;
    Ok(Json(profile))
}

pub async fn get_scope(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
) -> ApiResult<Json<Vec<ScopeItem>>> {
    caller.require(perm::onboarding::VIEW)?;
    Ok(Json(state.store.scope(caller.tenant_id)))
}

pub async fn derive_scope(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
) -> ApiResult<Json<DerivedScope>> {
    caller.require(perm::onboarding::DERIVE_SCOPE)?;
    let scope = state.rules.derive_and_persist_scope(caller.tenant_id, Some(caller.user_id))?;
    metrics::counter!("grc.scope.derived").increment(1);
    Ok(Json(scope))
}

pub async fn list_rulesets(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
) -> ApiResult<Json<Vec<Ruleset>>> {
    caller.require(perm::onboarding::VIEW)?;
    Ok(Json(state.rules.list_rulesets(caller.tenant_id)))
}

pub async fn create_ruleset(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Json(req): Json<CreateRulesetRequest>,
) -> ApiResult<(StatusCode, Json<Ruleset>)> {
    caller.require(perm::onboarding::MANAGE)?;
    let mut ruleset = state.rules.create_ruleset(Some(caller.tenant_id), &req.code, &req.name);
    if req.activate {
        ruleset = state.rules.activate_ruleset(ruleset.id)?;
    }
    state.record(
        &caller,
        "ruleset.created",
        "Ruleset",
        ruleset.id,
        json!({ "code": ruleset.code }),
    );
    Ok((StatusCode::CREATED, Json(ruleset)))
}

/// Global rulesets are shared by every tenant and stay read-only here.
fn tenant_ruleset(state: &ManagementState, caller: &CallerContext, id: Uuid) -> GrcResult<Ruleset> {
    let ruleset = state.rules.get_ruleset(id)?;
    match ruleset.tenant_id {
        Some(t) if t == caller.tenant_id => Ok(ruleset),
        Some(_) => Err(GrcError::not_found("Ruleset", id)),
        None => Err(GrcError::Forbidden("Global rulesets cannot be modified by a tenant".into())),
    }
}

pub async fn activate_ruleset(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Ruleset>> {
    caller.require(perm::onboarding::MANAGE)?;
    tenant_ruleset(&state, &caller, id)?;
    let ruleset = state.rules.activate_ruleset(id)?;
    state.record(&caller, "ruleset.activated", "Ruleset", id, json!({}));
    Ok(Json(ruleset))
}

pub async fn add_rule(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
    Json(raw): Json<serde_json::Value>,
) -> ApiResult<(StatusCode, Json<Rule>)> {
    caller.require(perm::onboarding::MANAGE)?;
    tenant_ruleset(&state, &caller, id)?;
    let rule = state.rules.add_rule_json(id, raw)?;
    state.record(&caller, "rule.added", "Ruleset", id, json!({ "rule": rule.code }));
    Ok((StatusCode::CREATED, Json(rule)))
}

pub async fn rule_executions(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
) -> ApiResult<Json<Vec<RuleExecutionLog>>> {
    caller.require(perm::onboarding::VIEW)?;
    Ok(Json(state.rules.execution_logs(caller.tenant_id)))
}

// ─── Assets ────────────────────────────────────────────────────────────────

pub async fn list_assets(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
) -> ApiResult<Json<Vec<Asset>>> {
    caller.require(perm::onboarding::VIEW)?;
    Ok(Json(state.store.list_assets(caller.tenant_id)))
}

pub async fn create_asset(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Json(req): Json<CreateAssetRequest>,
) -> ApiResult<(StatusCode, Json<Asset>)> {
    caller.require(perm::onboarding::MANAGE)?;
    let asset = state.store.create_asset(caller.tenant_id, req)?;
    state.record(&caller, "asset.created", "Asset", asset.id, json!({ "name": asset.name }));
    metrics::counter!("grc.assets.created").increment(1);
    Ok((StatusCode::CREATED, Json(asset)))
}

pub async fn get_asset(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Asset>> {
    caller.require(perm::onboarding::VIEW)?;
    Ok(Json(state.store.get_asset(caller.tenant_id, id)?))
}

pub async fn delete_asset(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    caller.require(perm::onboarding::MANAGE)?;
    state.store.delete_asset(caller.tenant_id, id)?;
    state.record(&caller, "asset.deleted", "Asset", id, json!({}));
    Ok(StatusCode::NO_CONTENT)
}

// ─── Risks ─────────────────────────────────────────────────────────────────

pub async fn list_risks(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Query(filter): Query<RiskFilter>,
) -> ApiResult<Json<Vec<Risk>>> {
    caller.require(perm::risks::VIEW)?;
    Ok(Json(state.risks.list(caller.tenant_id, &filter)))
}

pub async fn create_risk(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Json(req): Json<CreateRiskRequest>,
) -> ApiResult<(StatusCode, Json<Risk>)> {
    caller.require(perm::risks::CREATE)?;
    let risk = state.risks.create(caller.tenant_id, req)?;
    state.record(
        &caller,
        "risk.created",
        "Risk",
        risk.id,
        json!({ "inherent_score": risk.inherent_score }),
    );
    metrics::counter!("grc.risks.created").increment(1);
    Ok((StatusCode::CREATED, Json(risk)))
}

pub async fn get_risk(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Risk>> {
    caller.require(perm::risks::VIEW)?;
    Ok(Json(state.risks.get(caller.tenant_id, id)?))
}

pub async fn update_risk(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateRiskRequest>,
) -> ApiResult<Json<Risk>> {
    caller.require(perm::risks::EDIT)?;
    let risk = state.risks.update(caller.tenant_id, id, req)?;
    state.record(&caller, "risk.updated", "Risk", id, json!({ "status": risk.status }));
    Ok(Json(risk))
}

pub async fn delete_risk(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    caller.require(perm::risks::DELETE)?;
    state.risks.delete(caller.tenant_id, id)?;
    state.record(&caller, "risk.deleted", "Risk", id, json!({}));
    metrics::counter!("grc.risks.deleted").increment(1);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn accept_risk(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<AcceptRiskRequest>,
) -> ApiResult<Json<Risk>> {
    caller.require(perm::risks::ACCEPT)?;
    let risk = state
        .risks
        .accept(caller.tenant_id, id, caller.user_id, &req.justification)?;
    state.record(
        &caller,
        "risk.accepted",
        "Risk",
        id,
        json!({ "justification": req.justification }),
    );
    metrics::counter!("grc.risks.accepted").increment(1);
    Ok(Json(risk))
}

pub async fn mitigate_risk(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Risk>> {
    caller.require(perm::risks::MANAGE)?;
    let risk = state.risks.mitigate(caller.tenant_id, id)?;
    state.record(&caller, "risk.mitigated", "Risk", id, json!({}));
    Ok(Json(risk))
}

pub async fn link_risk_control(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<LinkControlRequest>,
) -> ApiResult<(StatusCode, Json<RiskControlLink>)> {
    caller.require(perm::risks::MANAGE)?;
    let link = state
        .risks
        .link_control(caller.tenant_id, id, req.control_id, req.expected_effectiveness)?;
    state.record(
        &caller,
        "risk.control_linked",
        "Risk",
        id,
        json!({ "control_id": req.control_id }),
    );
    Ok((StatusCode::CREATED, Json(link)))
}

pub async fn risk_controls(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<RiskControlLink>>> {
    caller.require(perm::risks::VIEW)?;
    state.risks.get(caller.tenant_id, id)?;
    Ok(Json(state.risks.linked_controls(id)))
}

pub async fn risk_effectiveness(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    caller.require(perm::risks::VIEW)?;
    let effectiveness = state.risks.control_effectiveness(caller.tenant_id, id)?;
    Ok(Json(json!({ "risk_id": id, "control_effectiveness": effectiveness })))
}

pub async fn risk_heat_map(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
) -> ApiResult<Json<HeatMap>> {
    caller.require(perm::risks::VIEW)?;
    Ok(Json(state.risks.heat_map(caller.tenant_id)))
}

pub async fn risk_posture(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
) -> ApiResult<Json<RiskPosture>> {
    caller.require(perm::risks::VIEW)?;
    Ok(Json(state.risks.posture(caller.tenant_id)))
}

// ─── Controls ──────────────────────────────────────────────────────────────

pub async fn list_controls(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Query(q): Query<ControlQuery>,
) -> ApiResult<Json<Vec<Control>>> {
    caller.require(perm::controls::VIEW)?;
    let controls = match q.baseline {
        Some(code) => state.controls.list_by_baseline(caller.tenant_id, &code),
        None => state.controls.list(caller.tenant_id),
    };
    Ok(Json(controls))
}

pub async fn create_control(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Json(req): Json<CreateControlRequest>,
) -> ApiResult<(StatusCode, Json<Control>)> {
    caller.require(perm::controls::CREATE)?;
    let control = state.controls.create(caller.tenant_id, req)?;
    state.record(
        &caller,
        "control.created",
        "Control",
        control.id,
        json!({ "code": control.code }),
    );
    metrics::counter!("grc.controls.created").increment(1);
    Ok((StatusCode::CREATED, Json(control)))
}

pub async fn get_control(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Control>> {
    caller.require(perm::controls::VIEW)?;
    Ok(Json(state.controls.get(caller.tenant_id, id)?))
}

pub async fn update_control(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateControlRequest>,
) -> ApiResult<Json<Control>> {
    caller.require(perm::controls::EDIT)?;
    let control = state.controls.update(caller.tenant_id, id, req)?;
    state.record(&caller, "control.updated", "Control", id, json!({}));
    Ok(Json(control))
}

pub async fn delete_control(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    caller.require(perm::controls::DELETE)?;
    state.controls.delete(caller.tenant_id, id)?;
    state.record(&caller, "control.deleted", "Control", id, json!({}));
    Ok(StatusCode::NO_CONTENT)
}

pub async fn record_control_test(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<RecordTestRequest>,
) -> ApiResult<Json<Control>> {
    caller.require(perm::controls::TEST)?;
    let control = state.controls.record_test(caller.tenant_id, id, req.score, caller.user_id)?;
    state.record(&caller, "control.tested", "Control", id, json!({ "score": req.score }));
    metrics::counter!("grc.controls.tested").increment(1);
    Ok(Json(control))
}

// ─── Assessments ───────────────────────────────────────────────────────────

pub async fn list_assessments(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
) -> ApiResult<Json<Vec<Assessment>>> {
    caller.require(perm::assessments::VIEW)?;
    Ok(Json(state.assessments.list(caller.tenant_id)))
}

pub async fn create_assessment(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Json(req): Json<CreateAssessmentRequest>,
) -> ApiResult<(StatusCode, Json<Assessment>)> {
    caller.require(perm::assessments::CREATE)?;
    let assessment = state.assessments.create(caller.tenant_id, req)?;
    state.record(
        &caller,
        "assessment.created",
        "Assessment",
        assessment.id,
        json!({ "baseline": assessment.baseline_code }),
    );
    metrics::counter!("grc.assessments.created").increment(1);
    Ok((StatusCode::CREATED, Json(assessment)))
}

pub async fn get_assessment(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Assessment>> {
    caller.require(perm::assessments::VIEW)?;
    Ok(Json(state.assessments.get(caller.tenant_id, id)?))
}

pub async fn add_requirement(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<AddRequirementRequest>,
) -> ApiResult<(StatusCode, Json<Requirement>)> {
    caller.require(perm::assessments::UPDATE)?;
    let requirement = state.assessments.add_requirement(caller.tenant_id, id, req)?;
    state.record(
        &caller,
        "assessment.requirement_added",
        "Assessment",
        id,
        json!({ "control_code": requirement.control_code }),
    );
    Ok((StatusCode::CREATED, Json(requirement)))
}

pub async fn start_assessment(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Assessment>> {
    caller.require(perm::assessments::UPDATE)?;
    let assessment = state.assessments.start(caller.tenant_id, id)?;
    state.record(&caller, "assessment.started", "Assessment", id, json!({}));
    Ok(Json(assessment))
}

pub async fn submit_assessment(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Assessment>> {
    caller.require(perm::assessments::SUBMIT)?;
    let assessment = state.assessments.submit(caller.tenant_id, id)?;
    state.record(&caller, "assessment.submitted", "Assessment", id, json!({}));
    Ok(Json(assessment))
}

pub async fn complete_assessment(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Assessment>> {
    caller.require(perm::assessments::APPROVE)?;
    let assessment = state.assessments.complete(caller.tenant_id, id)?;
    state.record(
        &caller,
        "assessment.completed",
        "Assessment",
        id,
        json!({ "score": assessment.score() }),
    );
    metrics::counter!("grc.assessments.completed").increment(1);
    Ok(Json(assessment))
}

pub async fn assessment_score(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    caller.require(perm::assessments::VIEW)?;
    let score = state.assessments.score(caller.tenant_id, id)?;
    Ok(Json(json!({ "assessment_id": id, "score": score })))
}

pub async fn generate_gap_risks(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<Vec<Risk>>)> {
    caller.require(perm::risks::CREATE)?;
    let assessment = state.assessments.get(caller.tenant_id, id)?;
    let risks = state
        .risks
        .generate_from_assessment_gaps(&assessment, Some(caller.user_id))?;
    state.record(
        &caller,
        "risk.generated_from_gaps",
        "Assessment",
        id,
        json!({ "count": risks.len() }),
    );
    metrics::counter!("grc.risks.created").increment(risks.len() as u64);
    Ok((StatusCode::CREATED, Json(risks)))
}

// ─── Evidence ──────────────────────────────────────────────────────────────

pub async fn list_evidence(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Query(q): Query<EvidenceQuery>,
) -> ApiResult<Json<Vec<Evidence>>> {
    caller.require(perm::evidence::VIEW)?;
    let evidence = if q.pending_review {
        state.assessments.pending_review(caller.tenant_id)
    } else {
        state.assessments.list_evidence(caller.tenant_id, q.assessment_id)
    };
    Ok(Json(evidence))
}

pub async fn create_evidence(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Json(req): Json<CreateEvidenceRequest>,
) -> ApiResult<(StatusCode, Json<Evidence>)> {
    caller.require(perm::evidence::UPLOAD)?;
    let evidence = state
        .assessments
        .create_evidence(caller.tenant_id, req, caller.principal())?;
    state.record(
        &caller,
        "evidence.created",
        "Evidence",
        evidence.id,
        json!({ "file_name": evidence.file_name }),
    );
    metrics::counter!("grc.evidence.created").increment(1);
    Ok((StatusCode::CREATED, Json(evidence)))
}

pub async fn get_evidence(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Evidence>> {
    caller.require(perm::evidence::VIEW)?;
    Ok(Json(state.assessments.get_evidence(caller.tenant_id, id)?))
}

pub async fn submit_evidence(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Evidence>> {
    caller.require(perm::evidence::SUBMIT)?;
    let evidence = state.assessments.submit_evidence(caller.tenant_id, id)?;
    state.record(&caller, "evidence.submitted", "Evidence", id, json!({}));
    Ok(Json(evidence))
}

pub async fn start_evidence_review(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Evidence>> {
    caller.require(perm::evidence::REVIEW)?;
    let evidence = state.assessments.start_review(caller.tenant_id, id, caller.user_id)?;
    state.record(&caller, "evidence.review_started", "Evidence", id, json!({}));
    Ok(Json(evidence))
}

pub async fn score_evidence(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<ScoreEvidenceRequest>,
) -> ApiResult<Json<Evidence>> {
    caller.require(perm::evidence::REVIEW)?;
    let evidence = state
        .assessments
        .score_evidence(caller.tenant_id, id, req.score, caller.user_id, req.comment)?;
    state.record(
        &caller,
        "evidence.scored",
        "Evidence",
        id,
        json!({ "score": req.score, "status": evidence.status }),
    );
    metrics::counter!("grc.evidence.scored").increment(1);
    Ok(Json(evidence))
}

pub async fn request_evidence_changes(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<RejectEvidenceRequest>,
) -> ApiResult<Json<Evidence>> {
    caller.require(perm::evidence::REVIEW)?;
    let evidence = state
        .assessments
        .request_changes(caller.tenant_id, id, caller.user_id, req.reason.clone())?;
    state.record(
        &caller,
        "evidence.changes_requested",
        "Evidence",
        id,
        json!({ "comment": req.reason }),
    );
    Ok(Json(evidence))
}

pub async fn reject_evidence(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<RejectEvidenceRequest>,
) -> ApiResult<Json<Evidence>> {
    caller.require(perm::evidence::REVIEW)?;
    let evidence = state
        .assessments
        .reject(caller.tenant_id, id, caller.user_id, req.reason.clone())?;
    state.record(&caller, "evidence.rejected", "Evidence", id, json!({ "reason": req.reason }));
    metrics::counter!("grc.evidence.rejected").increment(1);
    Ok(Json(evidence))
}

pub async fn delete_evidence(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    caller.require(perm::evidence::DELETE)?;
    state
        .assessments
        .delete_evidence(caller.tenant_id, id, caller.principal())?;
    state.record(&caller, "evidence.deleted", "Evidence", id, json!({}));
    Ok(StatusCode::NO_CONTENT)
}

pub async fn evidence_statistics(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
) -> ApiResult<Json<EvidenceStatistics>> {
    caller.require(perm::evidence::VIEW)?;
    Ok(Json(state.assessments.statistics(caller.tenant_id)))
}

// ─── Governance policies ───────────────────────────────────────────────────

pub async fn list_policies(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Query(q): Query<PolicyQuery>,
) -> ApiResult<Json<Vec<GovernancePolicy>>> {
    caller.require(perm::policies::VIEW)?;
    let policies = match q.expiring_within_days {
        Some(days) => state.policies.expiring_within(caller.tenant_id, days)?,
        None => state.policies.list(caller.tenant_id),
    };
    Ok(Json(policies))
}

pub async fn create_policy(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Json(req): Json<CreatePolicyRequest>,
) -> ApiResult<(StatusCode, Json<GovernancePolicy>)> {
    caller.require(perm::policies::CREATE)?;
    let policy = state.policies.create(caller.tenant_id, req)?;
    state.record(&caller, "policy.created", "Policy", policy.id, json!({ "code": policy.code }));
    metrics::counter!("grc.policies.created").increment(1);
    Ok((StatusCode::CREATED, Json(policy)))
}

pub async fn get_policy(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<GovernancePolicy>> {
    caller.require(perm::policies::VIEW)?;
    Ok(Json(state.policies.get(caller.tenant_id, id)?))
}

pub async fn update_policy(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePolicyRequest>,
) -> ApiResult<Json<GovernancePolicy>> {
    caller.require(perm::policies::EDIT)?;
    let policy = state.policies.update(caller.tenant_id, id, req)?;
    state.record(&caller, "policy.updated", "Policy", id, json!({ "version": policy.version }));
    Ok(Json(policy))
}

pub async fn delete_policy(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    caller.require(perm::policies::DELETE)?;
    state.policies.delete(caller.tenant_id, id)?;
    state.record(&caller, "policy.deleted", "Policy", id, json!({}));
    Ok(StatusCode::NO_CONTENT)
}

pub async fn submit_policy(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<GovernancePolicy>> {
    caller.require(perm::policies::EDIT)?;
    let policy = state.policies.submit_for_review(caller.tenant_id, id)?;
    state.record(&caller, "policy.submitted", "Policy", id, json!({}));
    Ok(Json(policy))
}

pub async fn request_policy_changes(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<GovernancePolicy>> {
    caller.require(perm::policies::REVIEW)?;
    let policy = state.policies.request_changes(caller.tenant_id, id)?;
    state.record(&caller, "policy.changes_requested", "Policy", id, json!({}));
    Ok(Json(policy))
}

pub async fn approve_policy(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<GovernancePolicy>> {
    caller.require(perm::policies::APPROVE)?;
    let policy = state.policies.approve(caller.tenant_id, id, caller.user_id)?;
    state.record(&caller, "policy.approved", "Policy", id, json!({}));
    Ok(Json(policy))
}

pub async fn publish_policy(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<GovernancePolicy>> {
    caller.require(perm::policies::PUBLISH)?;
    let policy = state.policies.publish(caller.tenant_id, id, caller.principal())?;
    state.record(&caller, "policy.published", "Policy", id, json!({ "version": policy.version }));
    metrics::counter!("grc.policies.published").increment(1);
    Ok(Json(policy))
}

pub async fn retire_policy(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<GovernancePolicy>> {
    caller.require(perm::policies::MANAGE)?;
    let policy = state.policies.retire(caller.tenant_id, id)?;
    state.record(&caller, "policy.retired", "Policy", id, json!({}));
    Ok(Json(policy))
}

pub async fn policy_compliance(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    caller.require(perm::policies::VIEW)?;
    let compliant = state.policies.is_compliant(caller.tenant_id, id)?;
    Ok(Json(json!({ "policy_id": id, "is_compliant": compliant })))
}

pub async fn list_policy_violations(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<PolicyViolation>>> {
    caller.require(perm::policies::VIEW)?;
    Ok(Json(state.policies.violations(caller.tenant_id, id)?))
}

pub async fn record_policy_violation(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<RecordViolationRequest>,
) -> ApiResult<(StatusCode, Json<PolicyViolation>)> {
    caller.require(perm::policies::MANAGE)?;
    let violation = state.policies.record_violation(
        caller.tenant_id,
        id,
        req.description,
        req.severity.unwrap_or(FindingSeverity::Medium),
        caller.user_id,
    )?;
    state.record(
        &caller,
        "policy.violation_recorded",
        "Policy",
        id,
        json!({ "violation_id": violation.id }),
    );
    metrics::counter!("grc.policies.violations").increment(1);
    Ok((StatusCode::CREATED, Json(violation)))
}

pub async fn resolve_policy_violation(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<ResolveViolationRequest>,
) -> ApiResult<Json<PolicyViolation>> {
    caller.require(perm::policies::MANAGE)?;
    let violation = state.policies.resolve_violation(caller.tenant_id, id, req.resolution)?;
    state.record(&caller, "policy.violation_resolved", "PolicyViolation", id, json!({}));
    Ok(Json(violation))
}

// ─── Audit engagements ─────────────────────────────────────────────────────

pub async fn list_audits(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Query(q): Query<AuditQuery>,
) -> ApiResult<Json<Vec<AuditEngagement>>> {
    caller.require(perm::audits::VIEW)?;
    let audits = match q.upcoming_days {
        Some(days) => state.audits.upcoming(caller.tenant_id, days)?,
        None => state.audits.list(caller.tenant_id),
    };
    Ok(Json(audits))
}

pub async fn create_audit(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Json(req): Json<CreateAuditRequest>,
) -> ApiResult<(StatusCode, Json<AuditEngagement>)> {
    caller.require(perm::audits::CREATE)?;
    let audit = state.audits.create(caller.tenant_id, req)?;
    state.record(
        &caller,
        "audit.created",
        "AuditEngagement",
        audit.id,
        json!({ "type": audit.audit_type }),
    );
    metrics::counter!("grc.audits.created").increment(1);
    Ok((StatusCode::CREATED, Json(audit)))
}

pub async fn get_audit(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AuditEngagement>> {
    caller.require(perm::audits::VIEW)?;
    Ok(Json(state.audits.get(caller.tenant_id, id)?))
}

pub async fn transition_audit(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<TransitionAuditRequest>,
) -> ApiResult<Json<AuditEngagement>> {
    caller.require(perm::audits::MANAGE)?;
    let audit = state.audits.transition(caller.tenant_id, id, req.status)?;
    state.record(
        &caller,
        "audit.transitioned",
        "AuditEngagement",
        id,
        json!({ "status": req.status }),
    );
    Ok(Json(audit))
}

pub async fn add_audit_finding(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateFindingRequest>,
) -> ApiResult<(StatusCode, Json<AuditFinding>)> {
    caller.require(perm::audits::FIELDWORK)?;
    let finding = state.audits.add_finding(caller.tenant_id, id, req)?;
    state.record(
        &caller,
        "audit.finding_added",
        "AuditEngagement",
        id,
        json!({ "finding_id": finding.id, "severity": finding.severity }),
    );
    metrics::counter!("grc.audits.findings").increment(1);
    Ok((StatusCode::CREATED, Json(finding)))
}

pub async fn remediate_finding(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path((id, finding_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<AuditFinding>> {
    caller.require(perm::audits::EDIT)?;
    let finding = state.audits.start_remediation(caller.tenant_id, id, finding_id)?;
    state.record(&caller, "audit.finding_remediating", "AuditFinding", finding_id, json!({}));
    Ok(Json(finding))
}

pub async fn close_finding(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path((id, finding_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<CloseFindingRequest>,
) -> ApiResult<Json<AuditFinding>> {
    caller.require(perm::audits::CLOSE)?;
    let finding = state.audits.close_finding(caller.tenant_id, id, finding_id, req.note)?;
    state.record(&caller, "audit.finding_closed", "AuditFinding", finding_id, json!({}));
    Ok(Json(finding))
}

pub async fn overdue_findings(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
) -> ApiResult<Json<Vec<AuditFinding>>> {
    caller.require(perm::audits::VIEW)?;
    Ok(Json(state.audits.overdue_findings(caller.tenant_id, Utc::now())))
}

// ─── Workflows ─────────────────────────────────────────────────────────────

pub async fn list_workflows(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
) -> ApiResult<Json<Vec<WorkflowInstance>>> {
    caller.require(perm::workflow::VIEW)?;
    Ok(Json(state.workflows.list_instances(caller.tenant_id)))
}

pub async fn start_workflow(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Json(req): Json<StartWorkflowRequest>,
) -> ApiResult<(StatusCode, Json<WorkflowInstance>)> {
    caller.require(perm::workflow::CREATE)?;
    let instance = state.workflows.start_workflow(
        caller.tenant_id,
        req.workflow_type,
        &req.entity_type,
        &req.entity_id,
        caller.user_id,
        req.tasks,
    )?;
    state.record(
        &caller,
        "workflow.started",
        "WorkflowInstance",
        instance.id,
        json!({ "type": instance.workflow_type }),
    );
    metrics::counter!("grc.workflows.started").increment(1);
    Ok((StatusCode::CREATED, Json(instance)))
}

pub async fn get_workflow(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WorkflowInstance>> {
    caller.require(perm::workflow::VIEW)?;
    Ok(Json(state.workflows.get_instance(caller.tenant_id, id)?))
}

pub async fn transition_workflow(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<InstanceTransitionRequest>,
) -> ApiResult<Json<WorkflowInstance>> {
    caller.require(perm::workflow::MANAGE)?;
    let instance = state
        .workflows
        .transition_instance(caller.tenant_id, id, req.status, Some(caller.user_id), req.comment)?;
    state.record(
        &caller,
        "workflow.transitioned",
        "WorkflowInstance",
        id,
        json!({ "status": instance.status }),
    );
    Ok(Json(instance))
}

pub async fn workflow_tasks(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<WorkflowTask>>> {
    caller.require(perm::workflow::VIEW)?;
    Ok(Json(state.workflows.tasks_for(caller.tenant_id, id)?))
}

pub async fn workflow_history(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<WorkflowTransition>>> {
    caller.require(perm::workflow::VIEW)?;
    Ok(Json(state.workflows.history(caller.tenant_id, id)?))
}

pub async fn get_task(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WorkflowTask>> {
    caller.require(perm::workflow::VIEW)?;
    Ok(Json(state.workflows.get_task(caller.tenant_id, id)?))
}

/// Assignees may move their own tasks; anyone else needs workflow management rights.
pub async fn transition_task(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<TaskTransitionRequest>,
) -> ApiResult<Json<WorkflowTask>> {
    let task = state.workflows.get_task(caller.tenant_id, id)?;
    if !task.assignee_ids.contains(&caller.user_id) {
        caller.require(perm::workflow::MANAGE)?;
    }
    let task = state
        .workflows
        .transition_task(caller.tenant_id, id, req.status, Some(caller.user_id), req.comment)?;
    state.record(
        &caller,
        "workflow.task_transitioned",
        "WorkflowTask",
        id,
        json!({ "status": task.status }),
    );
    metrics::counter!("grc.workflows.task_transitions").increment(1);
    Ok(Json(task))
}

pub async fn my_tasks(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
) -> Json<Vec<WorkflowTask>> {
    Json(state.workflows.my_tasks(caller.tenant_id, caller.user_id))
}

pub async fn overdue_tasks(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
) -> ApiResult<Json<Vec<WorkflowTask>>> {
    caller.require(perm::workflow::MONITOR)?;
    Ok(Json(state.workflows.overdue_tasks(caller.tenant_id, Utc::now())))
}

pub async fn escalate_overdue(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Json(req): Json<EscalateRequest>,
) -> ApiResult<Json<Vec<WorkflowTask>>> {
    caller.require(perm::workflow::ESCALATE)?;
    let days = req
        .escalation_days
        .unwrap_or(state.config.onboarding.escalation_days_overdue);
    let escalated = state.workflows.escalate_overdue(caller.tenant_id, Utc::now(), days)?;
    state.record(
        &caller,
        "workflow.escalated",
        "WorkflowTask",
        caller.tenant_id,
        json!({ "count": escalated.len() }),
    );
    metrics::counter!("grc.workflows.escalations").increment(escalated.len() as u64);
    Ok(Json(escalated))
}

// ─── Approvals ─────────────────────────────────────────────────────────────

pub async fn list_approvals(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
) -> ApiResult<Json<Vec<ApprovalRequest>>> {
    caller.require(perm::workflow::VIEW)?;
    Ok(Json(state.workflows.list_approvals(caller.tenant_id)))
}

pub async fn submit_approval(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Json(req): Json<SubmitApprovalRequest>,
) -> ApiResult<(StatusCode, Json<ApprovalRequest>)> {
    caller.require(perm::workflow::CREATE)?;
    let request = state.workflows.submit_for_approval(
        caller.tenant_id,
        &req.entity_type,
        &req.entity_id,
        caller.user_id,
        req.chain,
    )?;
    state.record(
        &caller,
        "approval.submitted",
        "ApprovalRequest",
        request.id,
        json!({ "entity_type": request.entity_type }),
    );
    metrics::counter!("grc.approvals.submitted").increment(1);
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn get_approval(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApprovalRequest>> {
    caller.require(perm::workflow::VIEW)?;
    Ok(Json(state.workflows.get_approval(caller.tenant_id, id)?))
}

pub async fn record_approval_decision(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<DecisionRequest>,
) -> ApiResult<Json<ApprovalRequest>> {
    caller.require(perm::workflow::APPROVE)?;
    let request = state
        .workflows
        .record_decision(caller.tenant_id, id, caller.user_id, req.decision, req.comment)?;
    state.record(
        &caller,
        "approval.decided",
        "ApprovalRequest",
        id,
        json!({ "decision": req.decision, "status": request.status }),
    );
    metrics::counter!("grc.approvals.decisions").increment(1);
    Ok(Json(request))
}

pub async fn resubmit_approval(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApprovalRequest>> {
    caller.require(perm::workflow::CREATE)?;
    let request = state.workflows.resubmit(caller.tenant_id, id, caller.user_id)?;
    state.record(
        &caller,
        "approval.resubmitted",
        "ApprovalRequest",
        id,
        json!({ "round": request.round }),
    );
    Ok(Json(request))
}

pub async fn approval_history(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<ApprovalRecord>>> {
    caller.require(perm::workflow::VIEW)?;
    Ok(Json(state.workflows.approval_history(caller.tenant_id, id)?))
}

pub async fn my_approvals(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
) -> Json<Vec<ApprovalRequest>> {
    Json(state.workflows.pending_for(caller.tenant_id, caller.user_id))
}

// ─── Teams, RACI & routing ─────────────────────────────────────────────────

pub async fn list_teams(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
) -> ApiResult<Json<Vec<Team>>> {
    caller.require(perm::workflow::VIEW)?;
    Ok(Json(state.assignees.list_teams(caller.tenant_id)))
}

pub async fn create_team(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Json(req): Json<CreateTeamRequest>,
) -> ApiResult<(StatusCode, Json<Team>)> {
    caller.require(perm::workflow::ASSIGN_TASK)?;
    let team = state.assignees.create_team(caller.tenant_id, &req.name, req.is_default)?;
    state.record(&caller, "team.created", "Team", team.id, json!({ "name": team.name }));
    Ok((StatusCode::CREATED, Json(team)))
}

pub async fn get_team(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Team>> {
    caller.require(perm::workflow::VIEW)?;
    Ok(Json(state.assignees.get_team(caller.tenant_id, id)?))
}

pub async fn add_team_member(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<AddMemberRequest>,
) -> ApiResult<Json<Team>> {
    caller.require(perm::workflow::ASSIGN_TASK)?;
    let team = state
        .assignees
        .add_member(caller.tenant_id, id, req.user_id, &req.role_code)?;
    state.record(
        &caller,
        "team.member_added",
        "Team",
        id,
        json!({ "user_id": req.user_id, "role_code": req.role_code }),
    );
    Ok(Json(team))
}

pub async fn remove_team_member(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Team>> {
    caller.require(perm::workflow::ASSIGN_TASK)?;
    let team = state.assignees.remove_member(caller.tenant_id, id, user_id)?;
    state.record(&caller, "team.member_removed", "Team", id, json!({ "user_id": user_id }));
    Ok(Json(team))
}

pub async fn assign_raci(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Json(req): Json<AssignRaciRequest>,
) -> ApiResult<(StatusCode, Json<RaciAssignment>)> {
    caller.require(perm::workflow::ASSIGN_TASK)?;
    let assignment = state.assignees.assign_raci(
        caller.tenant_id,
        &req.scope_type,
        &req.scope_id,
        req.team_id,
        req.role,
    )?;
    state.record(
        &caller,
        "raci.assigned",
        "RaciAssignment",
        assignment.id,
        json!({ "scope_type": req.scope_type, "scope_id": req.scope_id }),
    );
    Ok((StatusCode::CREATED, Json(assignment)))
}

pub async fn list_raci(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Query(q): Query<RaciQuery>,
) -> ApiResult<Json<Vec<RaciAssignment>>> {
    caller.require(perm::workflow::VIEW)?;
    Ok(Json(state.assignees.raci_for(caller.tenant_id, &q.scope_type, &q.scope_id)))
}

pub async fn resolve_assignees(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Query(q): Query<RouteQuery>,
) -> ApiResult<Json<AssigneeResolution>> {
    caller.require(perm::workflow::VIEW)?;
    Ok(Json(state.assignees.resolve(caller.tenant_id, &q)))
}

// ─── Dashboard ─────────────────────────────────────────────────────────────

pub async fn dashboard_summary(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
) -> ApiResult<Json<DashboardSummary>> {
    caller.require(perm::dashboard::DEFAULT)?;
    Ok(Json(state.dashboard.summary(caller.tenant_id, Utc::now())))
}

// ─── Audit trail ───────────────────────────────────────────────────────────

pub async fn audit_trail(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Query(q): Query<AuditTrailQuery>,
) -> ApiResult<Json<Vec<AuditEvent>>> {
    caller.require(perm::reports::VIEW)?;
    Ok(Json(state.audit.query(
        caller.tenant_id,
        q.from,
        q.to,
        q.action.as_deref(),
        q.limit.unwrap_or(100),
    )))
}

pub async fn audit_report(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Query(q): Query<ReportQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    caller.require(perm::reports::EXPORT)?;
    if q.to < q.from {
        return Err(GrcError::Validation("Report end must not precede its start".into()).into());
    }
    Ok(Json(state.audit.export_compliance_report(caller.tenant_id, q.from, q.to)))
}

pub async fn resource_history(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Path((resource_type, resource_id)): Path<(String, String)>,
) -> ApiResult<Json<Vec<AuditEvent>>> {
    caller.require(perm::reports::VIEW)?;
    Ok(Json(state.audit.resource_history(caller.tenant_id, &resource_type, &resource_id)))
}

pub async fn verify_audit_chain(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
) -> ApiResult<Json<ChainVerification>> {
    caller.require(perm::admin::ACCESS)?;
    Ok(Json(state.audit.verify_chain()))
}

// ─── Policy evaluation ─────────────────────────────────────────────────────

/// Dry-run the policy enforcer against a caller-supplied resource.
pub async fn evaluate_policy(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
    Json(req): Json<EvaluatePolicyRequest>,
) -> ApiResult<Json<PolicyDecision>> {
    caller.require(perm::policies::VIEW)?;
    let ctx = PolicyContext {
        action: req.action,
        resource_type: req.resource_type,
        environment: req.environment.unwrap_or_else(|| "production".to_string()),
        resource: req.resource,
        principal: caller.principal(),
    };
    Ok(Json(state.enforcer.evaluate(&ctx)))
}

pub async fn list_policy_documents(
    State(state): State<ManagementState>,
    Extension(caller): Caller,
) -> ApiResult<Json<Vec<PolicyDocument>>> {
    caller.require(perm::policies::VIEW)?;
    Ok(Json(state.enforcer.list_policies()))
}
