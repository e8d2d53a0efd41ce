//! Bearer token authentication for the management API.
//!
//! Login checks tenant credentials and issues a session token from the
//! platform `AuthManager`. The middleware resolves the token into a
//! `CallerContext` that handlers pull out of the request extensions.

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use grc_core::error::{GrcError, GrcResult};
use uuid::Uuid;

use crate::enforcement::CallerContext;
use crate::handlers::ManagementState;
use crate::models::{ErrorResponse, LoginRequest, LoginResponse};

/// Validate a login request and open a session.
pub fn authenticate(state: &ManagementState, req: &LoginRequest) -> GrcResult<LoginResponse> {
    let (tenant, user) = state
        .tenants
        .verify_credentials(&req.tenant_slug, &req.email, &req.password)?;
    state.tenants.ensure_active(tenant.id)?;

    let roles = state.rbac.user_role_names(user.id);
    let session = state.auth.create_session(user.id, tenant.id, roles.clone());
    state.audit.log_action(
        tenant.id,
        Some(user.id),
        "auth.login",
        "User",
        &user.id.to_string(),
        serde_json::json!({ "session_id": session.session_id }),
        vec![],
    );
    Ok(LoginResponse {
        token: session.token.token_id,
        expires_at: session.token.expires_at,
        tenant_id: tenant.id,
        user_id: user.id,
        roles,
    })
}

/// Parse `Authorization: Bearer <token>`.
pub fn bearer_token(value: Option<&str>) -> Option<Uuid> {
    value?.strip_prefix("Bearer ")?.trim().parse().ok()
}

/// Resolve a bearer token into the caller. Fails when the token is unknown or
/// expired, the user is gone or inactive, or the tenant is not active.
pub fn resolve_caller(state: &ManagementState, token_id: Uuid) -> GrcResult<CallerContext> {
    let token = state
        .auth
        .validate_token(token_id)
        .ok_or_else(|| GrcError::not_found("Session", token_id))?;
    state
        .tenants
        .get_user(token.tenant_id, token.user_id)
        .filter(|u| u.is_active)
        .ok_or_else(|| GrcError::not_found("User", token.user_id))?;
    state.tenants.ensure_active(token.tenant_id)?;

    Ok(CallerContext {
        tenant_id: token.tenant_id,
        user_id: token.user_id,
        roles: state.rbac.user_role_names(token.user_id),
        permissions: state.rbac.get_user_permissions(token.user_id),
    })
}

fn reject(status: StatusCode, error: &str, message: String) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message,
            remediation_hint: None,
        }),
    )
        .into_response()
}

/// Axum middleware guarding every authenticated route.
pub async fn auth_middleware(
    State(state): State<ManagementState>,
    mut req: Request,
    next: Next,
) -> Response {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let Some(token_id) = bearer_token(header_value) else {
        metrics::counter!("grc.auth.rejected", "reason" => "missing").increment(1);
        return reject(
            StatusCode::UNAUTHORIZED,
            "missing_auth",
            "Authorization header with Bearer token required".to_string(),
        );
    };

    match resolve_caller(&state, token_id) {
        Ok(caller) => {
            req.extensions_mut().insert(caller);
            next.run(req).await
        }
        Err(GrcError::Forbidden(msg)) => {
            metrics::counter!("grc.auth.rejected", "reason" => "tenant_inactive").increment(1);
            reject(StatusCode::FORBIDDEN, "tenant_inactive", msg)
        }
        Err(_) => {
            metrics::counter!("grc.auth.rejected", "reason" => "invalid_token").increment(1);
            reject(
                StatusCode::UNAUTHORIZED,
                "invalid_token",
                "Invalid or expired bearer token".to_string(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        let id = Uuid::new_v4();
        assert_eq!(bearer_token(Some(&format!("Bearer {id}"))), Some(id));
        assert_eq!(bearer_token(Some("Bearer not-a-uuid")), None);
        assert_eq!(bearer_token(Some(&format!("Basic {id}"))), None);
        assert_eq!(bearer_token(None), None);
    }
}
