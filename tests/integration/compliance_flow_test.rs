//! Integration test for the compliance flow on the demo tenant: controls and
//! risks, assessment evidence, governance policies, approvals and workflows.

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use axum::Router;
    use grc_core::config::AppConfig;
    use grc_management::handlers::{DEMO_ADMIN_EMAIL, DEMO_PASSWORD, DEMO_TENANT_SLUG};
    use grc_management::{management_router, ManagementState};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct Session {
        token: String,
        user_id: String,
    }

    fn app() -> Router {
        let state = ManagementState::new(&AppConfig::default()).unwrap();
        management_router(state)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {token}"));
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = app.clone().oneshot(request).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn login(app: &Router, email: &str) -> Session {
        let body =
            json!({ "tenant_slug": DEMO_TENANT_SLUG, "email": email, "password": DEMO_PASSWORD });
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
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        Session {
            token: json["token"].as_str().unwrap().to_string(),
            user_id: json["user_id"].as_str().unwrap().to_string(),
        }
    }

    fn id(value: &Value) -> String {
        value["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_risk_with_tested_control() {
        let app = app();
        let admin = login(&app, DEMO_ADMIN_EMAIL).await;
        let t = admin.token.as_str();

        let (status, control) = send(
            &app,
            Method::POST,
            "/api/v1/controls",
            t,
            Some(json!({
                "code": "ECC-1-1",
                "title": "Cybersecurity strategy",
                "baseline_code": "NCA_ECC",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let control_id = id(&control);

        let (status, tested) = send(
            &app,
            Method::POST,
            &format!("/api/v1/controls/{control_id}/tests"),
            t,
            Some(json!({ "score": 80 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(tested["effectiveness"], 80);

        let (status, risk) = send(
            &app,
            Method::POST,
            "/api/v1/risks",
            t,
            Some(json!({
                "title": "Ransomware outbreak",
                "category": "Cyber",
                "likelihood": 4,
                "impact": 5,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(risk["inherent_score"], 20);
        let risk_id = id(&risk);

        // Likelihood outside 1-5 is rejected.
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/risks",
            t,
            Some(json!({ "title": "Bad", "category": "Cyber", "likelihood": 9, "impact": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/v1/risks/{risk_id}/controls"),
            t,
            Some(json!({ "control_id": control_id, "expected_effectiveness": 100 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, effectiveness) = send(
            &app,
            Method::GET,
            &format!("/api/v1/risks/{risk_id}/effectiveness"),
            t,
            None,
        ).await;
        assert_eq!(effectiveness["control_effectiveness"].as_f64(), Some(80.0));

        let (_, heat_map) =
            send(&app, Method::GET, "/api/v1/dashboard/risks/heat-map", t, None).await;
        assert!(heat_map.is_object());
    }

    #[tokio::test]
    async fn test_evidence_review_scores_assessment() {
        let app = app();
        let admin = login(&app, DEMO_ADMIN_EMAIL).await;
        let t = admin.token.as_str();

        let (status, assessment) = send(
            &app,
            Method::POST,
            "/api/v1/assessments",
            t,
            Some(json!({ "name": "ECC readiness", "baseline_code": "NCA_ECC" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let assessment_id = id(&assessment);

        let (status, requirement) = send(
            &app,
            Method::POST,
            &format!("/api/v1/assessments/{assessment_id}/requirements"),
            t,
            Some(json!({ "control_code": "ECC-2-1", "title": "Asset inventory" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let requirement_id = id(&requirement);

        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/v1/assessments/{assessment_id}/start"),
            t,
            None,
        ).await;
        assert_eq!(status, StatusCode::OK);

        // Restricted evidence without an accountable owner is blocked by the baseline policy.
        let (status, denied) = send(
            &app,
            Method::POST,
            "/api/v1/evidence",
            t,
            Some(json!({
                "assessment_id": assessment_id,
                "requirement_id": requirement_id,
                "title": "Privileged access list",
                "classification": "restricted",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(denied["error"], "policy_violation");
        assert!(denied["remediation_hint"].is_string());

        let (status, evidence) = send(
            &app,
            Method::POST,
            "/api/v1/evidence",
            t,
            Some(json!({
                "assessment_id": assessment_id,
                "requirement_id": requirement_id,
                "title": "CMDB export",
                "owner_id": admin.user_id,
                "classification": "restricted",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(evidence["status"], "Draft");
        assert!(evidence["file_name"].as_str().unwrap().contains("ECC-2-1"));
        let evidence_id = id(&evidence);

        // A score outside review is recorded but does not decide the evidence.
        let (status, early) = send(
            &app,
            Method::POST,
            &format!("/api/v1/evidence/{evidence_id}/score"),
            t,
            Some(json!({ "score": 40 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(early["status"], "Draft");

        let (status, submitted) = send(
            &app,
            Method::POST,
            &format!("/api/v1/evidence/{evidence_id}/submit"),
            t,
            None,
        ).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(submitted["status"], "Submitted");

        let (_, pending) =
            send(&app, Method::GET, "/api/v1/evidence?pending_review=true", t, None).await;
        assert_eq!(pending.as_array().unwrap().len(), 1);

        let (status, in_review) = send(
            &app,
            Method::POST,
            &format!("/api/v1/evidence/{evidence_id}/review"),
            t,
            None,
        ).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(in_review["status"], "InReview");

        let (status, scored) = send(
            &app,
            Method::POST,
            &format!("/api/v1/evidence/{evidence_id}/score"),
            t,
            Some(json!({ "score": 85, "comment": "Complete export" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(scored["status"], "Approved");
        assert_eq!(scored["approved_by"], admin.user_id.as_str());

        let (_, score) = send(
            &app,
            Method::GET,
            &format!("/api/v1/assessments/{assessment_id}/score"),
            t,
            None,
        ).await;
        assert_eq!(score["score"].as_f64(), Some(85.0));

        // Approved evidence is immutable.
        let (status, denied) =
            send(&app, Method::DELETE, &format!("/api/v1/evidence/{evidence_id}"), t, None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(denied["error"], "policy_violation");

        let (_, denials) = send(
            &app,
            Method::GET,
            "/api/v1/audit-trail?action=evidence.create.denied",
            t,
            None,
        ).await;
        assert_eq!(denials.as_array().unwrap().len(), 1);
        let (_, denials) = send(
            &app,
            Method::GET,
            "/api/v1/audit-trail?action=evidence.delete.denied",
            t,
            None,
        ).await;
        assert_eq!(denials.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_policy_publish_requires_approval() {
        let app = app();
        let admin = login(&app, DEMO_ADMIN_EMAIL).await;
        let t = admin.token.as_str();

        let (status, policy) = send(
            &app,
            Method::POST,
            "/api/v1/policies",
            t,
            Some(json!({
                "code": "POL-ACCESS",
                "title": "Access control policy",
                "category": "Security",
                "content": "Access is granted on least privilege.",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(policy["status"], "Draft");
        let policy_id = id(&policy);

        let (status, denied) = send(
            &app,
            Method::POST,
            &format!("/api/v1/policies/{policy_id}/publish"),
            t,
            None,
        ).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(denied["error"], "policy_violation");

        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/v1/policies/{policy_id}/submit"),
            t,
            None,
        ).await;
        assert_eq!(status, StatusCode::OK);
        let (status, approved) = send(
            &app,
            Method::POST,
            &format!("/api/v1/policies/{policy_id}/approve"),
            t,
            None,
        ).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(approved["approved_by"], admin.user_id.as_str());

        let (status, published) = send(
            &app,
            Method::POST,
            &format!("/api/v1/policies/{policy_id}/publish"),
            t,
            None,
        ).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(published["status"], "Published");

        // Published policies cannot go back to draft.
        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/v1/policies/{policy_id}/request-changes"),
            t,
            None,
        ).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_two_level_approval_chain() {
        let app = app();
        let admin = login(&app, DEMO_ADMIN_EMAIL).await;
        let compliance = login(&app, "compliance@demo.local").await;

        let (status, request) = send(
            &app,
            Method::POST,
            "/api/v1/approvals",
            &admin.token,
            Some(json!({
                "entity_type": "Policy",
                "entity_id": "POL-ACCESS",
                "chain": [
                    { "level": "manager", "approvers": [admin.user_id] },
                    { "level": "compliance", "approvers": [compliance.user_id] },
                ],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(request["status"], "Pending");
        let request_id = id(&request);
        let decide = format!("/api/v1/approvals/{request_id}/decisions");

        let (status, after_manager) = send(
            &app,
            Method::POST,
            &decide,
            &admin.token,
            Some(json!({ "decision": "approve" })),
        ).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(after_manager["current_level"], 1);
        assert_eq!(after_manager["status"], "Pending");

        // The manager is not an approver at the compliance level.
        let (status, _) = send(
            &app,
            Method::POST,
            &decide,
            &admin.token,
            Some(json!({ "decision": "approve" })),
        ).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, waiting) =
            send(&app, Method::GET, "/api/v1/me/approvals", &compliance.token, None).await;
        assert_eq!(waiting.as_array().unwrap().len(), 1);

        let (status, done) = send(
            &app,
            Method::POST,
            &decide,
            &compliance.token,
            Some(json!({ "decision": "approve", "comment": "Meets ECC" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(done["status"], "Approved");
        assert_eq!(done["decisions"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_workflow_completes_when_tasks_finish() {
        let app = app();
        let admin = login(&app, DEMO_ADMIN_EMAIL).await;
        let t = admin.token.as_str();

        let (status, instance) = send(
            &app,
            Method::POST,
            "/api/v1/workflows",
            t,
            Some(json!({
                "workflow_type": "EvidenceCollection",
                "entity_type": "Assessment",
                "entity_id": "ECC readiness",
                "tasks": [{ "name": "Collect firewall rules", "assignee_id": admin.user_id }],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(instance["status"], "InProgress");
        let instance_id = id(&instance);
        let task_id = instance["task_ids"][0].as_str().unwrap().to_string();

        let (_, mine) = send(&app, Method::GET, "/api/v1/me/tasks", t, None).await;
        assert_eq!(mine.as_array().unwrap().len(), 1);

        let transition = format!("/api/v1/tasks/{task_id}/transition");
        // Pending tasks must be started before they can be approved.
        let (status, _) =
            send(&app, Method::POST, &transition, t, Some(json!({ "status": "Approved" }))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) =
            send(&app, Method::POST, &transition, t, Some(json!({ "status": "InProgress" }))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, task) =
            send(&app, Method::POST, &transition, t, Some(json!({ "status": "Approved" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(task["status"], "Approved");

        let (_, finished) =
            send(&app, Method::GET, &format!("/api/v1/workflows/{instance_id}"), t, None).await;
        assert_eq!(finished["status"], "Completed");

        let (_, history) = send(
            &app,
            Method::GET,
            &format!("/api/v1/workflows/{instance_id}/history"),
            t,
            None,
        ).await;
        assert!(history.as_array().unwrap().len() >= 4);
    }

    #[tokio::test]
    async fn test_out_of_range_day_counts_are_rejected() {
        let app = app();
        let admin = login(&app, DEMO_ADMIN_EMAIL).await;
        let t = admin.token.as_str();

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/workflows",
            t,
            Some(json!({
                "workflow_type": "Remediation",
                "entity_type": "Finding",
                "entity_id": "F-1",
                "tasks": [{
                    "name": "Patch",
                    "assignee_id": admin.user_id,
                    "due_in_days": 1_000_000_000_000i64,
                }],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/workflows",
            t,
            Some(json!({
                "workflow_type": "Remediation",
                "entity_type": "Finding",
                "entity_id": "F-1",
                "tasks": [],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/escalations/run",
            t,
            Some(json!({ "escalation_days": i64::MAX })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            Method::GET,
            "/api/v1/policies?expiring_within_days=9223372036854775807",
            t,
            None,
        ).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, Method::GET, "/api/v1/audits?upcoming_days=-5", t, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // The server keeps answering after the rejected requests.
        let (status, audits) =
            send(&app, Method::GET, "/api/v1/audits?upcoming_days=30", t, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(audits.is_array());
    }
}
