//! Permission and policy checks consulted before mutating actions.

use grc_core::error::{GrcError, GrcResult};
use grc_platform::policy::{PolicyContext, PolicyDecision, Principal};
use grc_platform::{AuditLogger, PolicyEnforcer};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// The authenticated caller of a request, inserted by the auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerContext {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

impl CallerContext {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    /// `Forbidden` unless the caller holds `permission`.
    pub fn require(&self, permission: &str) -> GrcResult<()> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(GrcError::Forbidden(format!("missing permission {permission}")))
        }
    }

    pub fn principal(&self) -> Principal {
        Principal {
            id: Some(self.user_id),
            roles: self.roles.clone(),
        }
    }
}

/// Shape an entity into the document layout policies are written against:
/// `{ type, status, metadata: { owner, approvedBy, labels: { dataClassification } }, spec }`.
pub fn resource_document(
    resource_type: &str,
    status: &str,
    owner: Option<Uuid>,
    approved_by: Option<Uuid>,
    classification: Option<&str>,
    spec: serde_json::Value,
) -> serde_json::Value {
    let mut labels = serde_json::Map::new();
    if let Some(c) = classification {
        labels.insert("dataClassification".into(), c.into());
    }
    let mut metadata = serde_json::Map::new();
    if let Some(o) = owner {
        metadata.insert("owner".into(), o.to_string().into());
    }
    if let Some(a) = approved_by {
        metadata.insert("approvedBy".into(), a.to_string().into());
    }
    metadata.insert("labels".into(), labels.into());
    serde_json::json!({
        "type": resource_type,
        "status": status.to_ascii_lowercase(),
        "metadata": metadata,
        "spec": spec,
    })
}

/// Runs the policy enforcer and records denials in the audit trail.
pub struct PolicyGate {
    enforcer: Arc<PolicyEnforcer>,
    audit: Arc<AuditLogger>,
}

impl PolicyGate {
    pub fn new(enforcer: Arc<PolicyEnforcer>, audit: Arc<AuditLogger>) -> Self {
        Self { enforcer, audit }
    }

    pub fn enforcer(&self) -> &PolicyEnforcer {
        &self.enforcer
    }

    /// Enforce policy for `action` on a resource document. A deny is audited
    /// with the `policy_violation` flag and returned as `PolicyViolation`.
    pub fn check(
        &self,
        tenant_id: Uuid,
        principal: Principal,
        action: &str,
        resource_type: &str,
        resource_id: &str,
        resource: serde_json::Value,
    ) -> GrcResult<PolicyDecision> {
        let actor = principal.id;
        let ctx = PolicyContext {
            action: action.to_string(),
            resource_type: resource_type.to_string(),
            environment: "production".to_string(),
            resource,
            principal,
        };
        match self.enforcer.enforce(&ctx) {
            Ok(decision) => Ok(decision),
            Err(err) => {
                if let GrcError::PolicyViolation { rule_id, message, .. } = &err {
                    warn!(tenant_id = %tenant_id, rule = %rule_id, action, resource_type, "Action blocked by policy");
                    self.audit.log_action(
                        tenant_id,
                        actor,
                        &format!("{}.{}.denied", resource_type.to_ascii_lowercase(), action),
                        resource_type,
                        resource_id,
                        serde_json::json!({ "rule_id": rule_id, "message": message }),
                        vec!["policy_violation".to_string()],
                    );
                }
                Err(err)
            }
        }
    }
}
