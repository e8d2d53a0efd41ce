//! Integration test for the tenant journey: signup, activation, the
//! onboarding wizard, scope review and the first assessment plan.

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use axum::Router;
    use grc_core::config::AppConfig;
    use grc_management::{management_router, ManagementState};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        let state = ManagementState::new(&AppConfig::default()).unwrap();
        management_router(state)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
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

    async fn login(app: &Router, slug: &str, email: &str, password: &str) -> (StatusCode, Value) {
        send(
            app,
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "tenant_slug": slug, "email": email, "password": password })),
        )
        .await
    }

    /// Sign up and activate a tenant, returning an admin token.
    async fn onboard_tenant(app: &Router) -> String {
        let (status, signup) = send(
            app,
            Method::POST,
            "/api/v1/tenants",
            None,
            Some(json!({
                "organization_name": "Acme Financial",
                "slug": "acme",
                "admin_email": "owner@acme.test",
                "admin_name": "Acme Owner",
                "password": "S3cure-pass",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(signup["tenant"]["slug"], "acme");
        let activation_token = signup["activation_token"].as_str().unwrap().to_string();
        assert!(!activation_token.is_empty());

        // Pending tenants cannot log in yet.
        let (status, _) = login(app, "acme", "owner@acme.test", "S3cure-pass").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, tenant) = send(
            app,
            Method::POST,
            "/api/v1/tenants/activate",
            None,
            Some(json!({ "token": activation_token })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(tenant["status"], "active");

        let (status, session) = login(app, "acme", "owner@acme.test", "S3cure-pass").await;
        assert_eq!(status, StatusCode::OK);
        session["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_signup_rejects_short_password() {
        let app = app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/tenants",
            None,
            Some(json!({
                "organization_name": "Short",
                "slug": "short",
                "admin_email": "a@short.test",
                "admin_name": "A",
                "password": "123",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
    }

    #[tokio::test]
    async fn test_duplicate_slug_conflicts() {
        let app = app();
        let _ = onboard_tenant(&app).await;
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/tenants",
            None,
            Some(json!({
                "organization_name": "Acme Again",
                "slug": "acme",
                "admin_email": "other@acme.test",
                "admin_name": "Other",
                "password": "S3cure-pass",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_full_onboarding_journey() {
        let app = app();
        let token = onboard_tenant(&app).await;
        let token = Some(token.as_str());

        // Fresh tenant starts at the organization profile.
        let (status, initial) =
            send(&app, Method::GET, "/api/v1/onboarding/status", token, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(initial["current_step"], "OrgProfile");
        assert_eq!(initial["completion_percentage"], 25);

        // Completing before any section is saved is refused.
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/onboarding/wizard/complete",
            token,
            Some(json!({ "minimal": true })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, wizard) = send(
            &app,
            Method::POST,
            "/api/v1/onboarding/wizard/minimal",
            token,
            Some(json!({ "answers": { "legal_name": "Acme Financial LLC", "country": "SA" } })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(wizard["status"], "InProgress");

        let (status, validation) = send(
            &app,
            Method::GET,
            "/api/v1/onboarding/wizard/validate?minimal=true",
            token,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(validation["can_complete"], true);

        let (status, completion) = send(
            &app,
            Method::POST,
            "/api/v1/onboarding/wizard/complete",
            token,
            Some(json!({ "minimal": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let baselines = completion["scope"]["baselines"].as_array().unwrap();
        assert!(baselines.iter().any(|b| b == "NCA_ECC"));

        let (_, profile) = send(&app, Method::GET, "/api/v1/profile", token, None).await;
        assert_eq!(profile["legal_name"], "Acme Financial LLC");
        assert!(profile["last_scope_derived_at"].is_string());

        let (_, status_body) =
            send(&app, Method::GET, "/api/v1/onboarding/status", token, None).await;
        assert_eq!(status_body["current_step"], "ReviewScope");
        assert_eq!(status_body["completion_percentage"], 50);

        // The plan step stays locked until scope is reviewed.
        let (_, check) =
            send(&app, Method::GET, "/api/v1/onboarding/can-proceed/plan", token, None).await;
        assert_eq!(check["can_proceed"], false);

        let (status, reviewed) =
            send(&app, Method::POST, "/api/v1/onboarding/scope/review", token, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reviewed["current_step"], "CreatePlan");
        assert_eq!(reviewed["completion_percentage"], 75);

        let (status, plan) = send(
            &app,
            Method::POST,
            "/api/v1/onboarding/plan",
            token,
            Some(json!({ "name": "Year one readiness" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(plan["name"], "Year one readiness");
        assert!(plan["baselines"].as_array().unwrap().iter().any(|b| b == "NCA_ECC"));

        // A second plan is a conflict.
        let (status, _) =
            send(&app, Method::POST, "/api/v1/onboarding/plan", token, Some(json!({}))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, dashboard) = send(&app, Method::GET, "/api/v1/dashboard", token, None).await;
        assert_eq!(dashboard["onboarding"]["current_step"], "Completed");
        assert_eq!(dashboard["onboarding"]["completion_percentage"], 100);

        let (_, trail) = send(
            &app,
            Method::GET,
            "/api/v1/audit-trail?action=onboarding.completed",
            token,
            None,
        ).await;
        assert_eq!(trail.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_tenants_are_isolated() {
        let app = app();
        let acme = onboard_tenant(&app).await;

        let (_, demo) = login(
            &app,
            grc_management::handlers::DEMO_TENANT_SLUG,
            grc_management::handlers::DEMO_ADMIN_EMAIL,
            grc_management::handlers::DEMO_PASSWORD,
        )
        .await;
        let demo = demo["token"].as_str().unwrap().to_string();

        let (status, risk) = send(
            &app,
            Method::POST,
            "/api/v1/risks",
            Some(demo.as_str()),
            Some(json!({
                "title": "Demo only",
                "category": "Operational",
                "likelihood": 2,
                "impact": 3,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let risk_id = risk["id"].as_str().unwrap();

        let (status, _) = send(
            &app,
            Method::GET,
            &format!("/api/v1/risks/{risk_id}"),
            Some(acme.as_str()),
            None,
        ).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, list) = send(&app, Method::GET, "/api/v1/risks", Some(acme.as_str()), None).await;
        assert!(list.as_array().unwrap().is_empty());
    }
}
