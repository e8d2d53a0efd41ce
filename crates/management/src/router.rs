//! Management API router — mounts all GRC endpoints under /api/v1.

use crate::auth::auth_middleware;
use crate::handlers::{self, ManagementState};
use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;

/// Build the management router. Login, signup and activation are public;
/// everything else sits behind the bearer token middleware.
pub fn management_router(state: ManagementState) -> Router {
    let public = Router::new()
        .route("/api/v1/auth/login", post(handlers::handle_login))
        .route("/api/v1/tenants", post(handlers::signup))
        .route("/api/v1/tenants/activate", post(handlers::activate_tenant));

    let protected = Router::new()
        // Auth
        .route("/api/v1/auth/logout", post(handlers::handle_logout))
        .route("/api/v1/auth/me", get(handlers::whoami))
        .route("/api/v1/auth/api-keys", post(handlers::create_api_key))
        // Tenant administration
        .route("/api/v1/admin/tenants", get(handlers::list_tenants))
        .route(
            "/api/v1/admin/tenants/:id",
            get(handlers::get_tenant).delete(handlers::delete_tenant),
        )
        .route("/api/v1/admin/tenants/:id/suspend", post(handlers::suspend_tenant))
        .route("/api/v1/admin/tenants/:id/reactivate", post(handlers::reactivate_tenant))
        .route("/api/v1/admin/tenants/:id/archive", post(handlers::archive_tenant))
        // Users & roles
        .route("/api/v1/users", get(handlers::list_users).post(handlers::create_user))
        .route("/api/v1/users/:id/roles", post(handlers::assign_user_role))
        .route("/api/v1/users/:id/deactivate", post(handlers::deactivate_user))
        .route("/api/v1/roles", get(handlers::list_roles))
        // Onboarding
        .route("/api/v1/onboarding/sections", get(handlers::wizard_sections))
        .route("/api/v1/onboarding/wizard", get(handlers::get_wizard))
        .route("/api/v1/onboarding/wizard/start", post(handlers::start_wizard))
        .route("/api/v1/onboarding/wizard/sections/:section", put(handlers::save_wizard_section))
        .route("/api/v1/onboarding/wizard/minimal", post(handlers::save_minimal_onboarding))
        .route("/api/v1/onboarding/wizard/validate", get(handlers::validate_wizard))
        .route("/api/v1/onboarding/wizard/complete", post(handlers::complete_wizard))
        .route("/api/v1/onboarding/status", get(handlers::onboarding_status))
        .route("/api/v1/onboarding/next-step", get(handlers::onboarding_next_step))
        .route("/api/v1/onboarding/resume", get(handlers::onboarding_resume))
        .route("/api/v1/onboarding/can-proceed/:step", get(handlers::onboarding_can_proceed))
        .route("/api/v1/onboarding/scope/review", post(handlers::review_scope))
        .route("/api/v1/onboarding/plan", post(handlers::create_onboarding_plan))
        // Profile, scope & rules
        .route("/api/v1/profile", get(handlers::get_profile))
        .route("/api/v1/scope", get(handlers::get_scope))
        .route("/api/v1/scope/derive", post(handlers::derive_scope))
        .route("/api/v1/rulesets", get(handlers::list_rulesets).post(handlers::create_ruleset))
        .route("/api/v1/rulesets/:id/activate", post(handlers::activate_ruleset))
        .route("/api/v1/rulesets/:id/rules", post(handlers::add_rule))
        .route("/api/v1/rule-executions", get(handlers::rule_executions))
        // Assets
        .route("/api/v1/assets", get(handlers::list_assets).post(handlers::create_asset))
        .route("/api/v1/assets/:id", get(handlers::get_asset).delete(handlers::delete_asset))
        // Risks
        .route("/api/v1/risks", get(handlers::list_risks).post(handlers::create_risk))
        .route(
            "/api/v1/risks/:id",
            get(handlers::get_risk).put(handlers::update_risk).delete(handlers::delete_risk),
        )
        .route("/api/v1/risks/:id/accept", post(handlers::accept_risk))
        .route("/api/v1/risks/:id/mitigate", post(handlers::mitigate_risk))
        .route(
            "/api/v1/risks/:id/controls",
            get(handlers::risk_controls).post(handlers::link_risk_control),
        )
        .route("/api/v1/risks/:id/effectiveness", get(handlers::risk_effectiveness))
        // Controls
        .route("/api/v1/controls", get(handlers::list_controls).post(handlers::create_control))
        .route(
            "/api/v1/controls/:id",
            get(handlers::get_control)
                .put(handlers::update_control)
                .delete(handlers::delete_control),
        )
        .route("/api/v1/controls/:id/tests", post(handlers::record_control_test))
        // Assessments
        .route(
            "/api/v1/assessments",
            get(handlers::list_assessments).post(handlers::create_assessment),
        )
        .route("/api/v1/assessments/:id", get(handlers::get_assessment))
        .route("/api/v1/assessments/:id/requirements", post(handlers::add_requirement))
        .route("/api/v1/assessments/:id/start", post(handlers::start_assessment))
        .route("/api/v1/assessments/:id/submit", post(handlers::submit_assessment))
        .route("/api/v1/assessments/:id/complete", post(handlers::complete_assessment))
        .route("/api/v1/assessments/:id/score", get(handlers::assessment_score))
        .route("/api/v1/assessments/:id/generate-risks", post(handlers::generate_gap_risks))
        // Evidence
        .route("/api/v1/evidence", get(handlers::list_evidence).post(handlers::create_evidence))
        .route(
            "/api/v1/evidence/:id",
            get(handlers::get_evidence).delete(handlers::delete_evidence),
        )
        .route("/api/v1/evidence/:id/submit", post(handlers::submit_evidence))
        .route("/api/v1/evidence/:id/review", post(handlers::start_evidence_review))
        .route("/api/v1/evidence/:id/score", post(handlers::score_evidence))
        .route("/api/v1/evidence/:id/request-changes", post(handlers::request_evidence_changes))
        .route("/api/v1/evidence/:id/reject", post(handlers::reject_evidence))
        // Governance policies
        .route("/api/v1/policies", get(handlers::list_policies).post(handlers::create_policy))
        .route(
            "/api/v1/policies/:id",
            get(handlers::get_policy).put(handlers::update_policy).delete(handlers::delete_policy),
        )
        .route("/api/v1/policies/:id/submit", post(handlers::submit_policy))
        .route("/api/v1/policies/:id/request-changes", post(handlers::request_policy_changes))
        .route("/api/v1/policies/:id/approve", post(handlers::approve_policy))
        .route("/api/v1/policies/:id/publish", post(handlers::publish_policy))
        .route("/api/v1/policies/:id/retire", post(handlers::retire_policy))
        .route("/api/v1/policies/:id/compliance", get(handlers::policy_compliance))
        .route(
            "/api/v1/policies/:id/violations",
            get(handlers::list_policy_violations).post(handlers::record_policy_violation),
        )
        .route("/api/v1/policy-violations/:id/resolve", post(handlers::resolve_policy_violation))
        // Audit engagements
        .route("/api/v1/audits", get(handlers::list_audits).post(handlers::create_audit))
        .route("/api/v1/audits/:id", get(handlers::get_audit))
        .route("/api/v1/audits/:id/transition", post(handlers::transition_audit))
        .route("/api/v1/audits/:id/findings", post(handlers::add_audit_finding))
        .route(
            "/api/v1/audits/:id/findings/:finding_id/remediate",
            post(handlers::remediate_finding),
        )
        .route("/api/v1/audits/:id/findings/:finding_id/close", post(handlers::close_finding))
        // Workflows
        .route("/api/v1/workflows", get(handlers::list_workflows).post(handlers::start_workflow))
        .route("/api/v1/workflows/:id", get(handlers::get_workflow))
        .route("/api/v1/workflows/:id/transition", post(handlers::transition_workflow))
        .route("/api/v1/workflows/:id/tasks", get(handlers::workflow_tasks))
        .route("/api/v1/workflows/:id/history", get(handlers::workflow_history))
        .route("/api/v1/tasks/:id", get(handlers::get_task))
        .route("/api/v1/tasks/:id/transition", post(handlers::transition_task))
        .route("/api/v1/escalations/run", post(handlers::escalate_overdue))
        // Approvals
        .route("/api/v1/approvals", get(handlers::list_approvals).post(handlers::submit_approval))
        .route("/api/v1/approvals/:id", get(handlers::get_approval))
        .route("/api/v1/approvals/:id/decisions", post(handlers::record_approval_decision))
        .route("/api/v1/approvals/:id/resubmit", post(handlers::resubmit_approval))
        .route("/api/v1/approvals/:id/history", get(handlers::approval_history))
        .route("/api/v1/me/tasks", get(handlers::my_tasks))
        .route("/api/v1/me/approvals", get(handlers::my_approvals))
        // Teams, RACI & routing
        .route("/api/v1/teams", get(handlers::list_teams).post(handlers::create_team))
        .route("/api/v1/teams/:id", get(handlers::get_team))
        .route("/api/v1/teams/:id/members", post(handlers::add_team_member))
        .route("/api/v1/teams/:id/members/:user_id", delete(handlers::remove_team_member))
        .route("/api/v1/raci", get(handlers::list_raci).post(handlers::assign_raci))
        .route("/api/v1/routing/resolve", get(handlers::resolve_assignees))
        // Dashboard
        .route("/api/v1/dashboard", get(handlers::dashboard_summary))
        .route("/api/v1/dashboard/risks/heat-map", get(handlers::risk_heat_map))
        .route("/api/v1/dashboard/risks/posture", get(handlers::risk_posture))
        .route("/api/v1/dashboard/evidence", get(handlers::evidence_statistics))
        .route("/api/v1/dashboard/tasks/overdue", get(handlers::overdue_tasks))
        .route("/api/v1/dashboard/findings/overdue", get(handlers::overdue_findings))
        // Audit trail
        .route("/api/v1/audit-trail", get(handlers::audit_trail))
        .route("/api/v1/audit-trail/report", get(handlers::audit_report))
        .route("/api/v1/audit-trail/verify", get(handlers::verify_audit_chain))
        .route(
            "/api/v1/audit-trail/resources/:resource_type/:resource_id",
            get(handlers::resource_history),
        )
        // Policy evaluation
        .route("/api/v1/policy/evaluate", post(handlers::evaluate_policy))
        .route("/api/v1/policy/documents", get(handlers::list_policy_documents))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    public.merge(protected).with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use grc_core::config::AppConfig;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app() -> Router {
        let state = ManagementState::new(&AppConfig::default()).unwrap();
        management_router(state)
    }

    async fn login(app: &Router) -> String {
        let body = serde_json::json!({
            "tenant_slug": handlers::DEMO_TENANT_SLUG,
            "email": handlers::DEMO_ADMIN_EMAIL,
            "password": handlers::DEMO_PASSWORD,
        });
        let resp = app
            .clone()
            .oneshot(
                Request::post("/api/v1/auth/login")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        json["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        let app = app();
        let resp = app
            .oneshot(Request::get("/api/v1/risks").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_then_list_roles() {
        let app = app();
        let token = login(&app).await;
        let resp = app
            .oneshot(
                Request::get("/api/v1/roles")
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let roles: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(roles.as_array().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_wrong_password_is_unauthorized() {
        let app = app();
        let body = serde_json::json!({
            "tenant_slug": handlers::DEMO_TENANT_SLUG,
            "email": handlers::DEMO_ADMIN_EMAIL,
            "password": "not-the-password",
        });
        let resp = app
            .oneshot(
                Request::post("/api/v1/auth/login")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
