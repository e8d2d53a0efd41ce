//! Integration test for platform tenant administration and the operational
//! surface served by the API server.

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use axum::Router;
    use grc_api::server::ApiServer;
    use grc_core::config::AppConfig;
    use grc_management::handlers::{DEMO_ADMIN_EMAIL, DEMO_PASSWORD, DEMO_TENANT_SLUG};
    use grc_management::ManagementState;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        let config = AppConfig::default();
        let state = ManagementState::new(&config).unwrap();
        ApiServer::new(config, state).router()
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

    async fn login(app: &Router, slug: &str, email: &str, password: &str) -> String {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "tenant_slug": slug, "email": email, "password": password })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    /// Create and activate a tenant; returns (tenant id, admin token).
    async fn new_tenant(app: &Router, slug: &str) -> (String, String) {
        let email = format!("admin@{slug}.test");
        let (status, signup) = send(
            app,
            Method::POST,
            "/api/v1/tenants",
            None,
            Some(json!({
                "organization_name": format!("{slug} Holdings"),
                "slug": slug,
                "admin_email": email,
                "admin_name": "Tenant Admin",
                "password": "Tenant-pass-1",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let tenant_id = signup["tenant"]["id"].as_str().unwrap().to_string();
        let token = signup["activation_token"].as_str().unwrap().to_string();
        let (status, _) = send(
            app,
            Method::POST,
            "/api/v1/tenants/activate",
            None,
            Some(json!({ "token": token })),
        ).await;
        assert_eq!(status, StatusCode::OK);
        (tenant_id, login(app, slug, &email, "Tenant-pass-1").await)
    }

    #[tokio::test]
    async fn test_operational_endpoints() {
        let app = app();

        let (status, health) = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health["status"], "healthy");

        let (status, ready) = send(&app, Method::GET, "/ready", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ready["ready"], true);
        assert_eq!(ready["audit_chain_valid"], true);

        let (status, _) = send(&app, Method::GET, "/live", None, None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, doc) = send(&app, Method::GET, "/api-docs/openapi.json", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(doc["info"]["title"], "GRC Platform API");
    }

    #[tokio::test]
    async fn test_suspended_tenant_is_locked_out() {
        let app = app();
        let platform = login(&app, DEMO_TENANT_SLUG, DEMO_ADMIN_EMAIL, DEMO_PASSWORD).await;
        let (tenant_id, tenant_token) = new_tenant(&app, "globex").await;

        let (status, tenants) =
            send(&app, Method::GET, "/api/v1/admin/tenants", Some(platform.as_str()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(tenants
            .as_array()
            .unwrap()
            .iter()
            .any(|t| t["slug"] == "globex"));

        let (status, _) =
            send(&app, Method::GET, "/api/v1/auth/me", Some(tenant_token.as_str()), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, suspended) = send(
            &app,
            Method::POST,
            &format!("/api/v1/admin/tenants/{tenant_id}/suspend"),
            Some(platform.as_str()),
            Some(json!({ "reason": "Unpaid invoice" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(suspended["status"], "suspended");

        // Existing sessions are refused while the tenant is suspended.
        let (status, body) =
            send(&app, Method::GET, "/api/v1/auth/me", Some(tenant_token.as_str()), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "tenant_inactive");

        let (status, reactivated) = send(
            &app,
            Method::POST,
            &format!("/api/v1/admin/tenants/{tenant_id}/reactivate"),
            Some(platform.as_str()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reactivated["status"], "active");

        let (status, _) =
            send(&app, Method::GET, "/api/v1/auth/me", Some(tenant_token.as_str()), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_tenant_admin_cannot_manage_tenants() {
        let app = app();
        let (_, tenant_token) = new_tenant(&app, "initech").await;

        let (status, body) = send(
            &app,
            Method::GET,
            "/api/v1/admin/tenants",
            Some(tenant_token.as_str()),
            None,
        ).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "forbidden");

        // Tenant admins still manage their own organization.
        let (status, users) =
            send(&app, Method::GET, "/api/v1/users", Some(tenant_token.as_str()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(users.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_logout_revokes_session() {
        let app = app();
        let token = login(&app, DEMO_TENANT_SLUG, DEMO_ADMIN_EMAIL, DEMO_PASSWORD).await;

        let (status, _) =
            send(&app, Method::POST, "/api/v1/auth/logout", Some(token.as_str()), None).await;
        assert!(status.is_success());

        let (status, _) =
            send(&app, Method::GET, "/api/v1/auth/me", Some(token.as_str()), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
