//! Role-Based Access Control (RBAC) over the `Grc.*` permission catalog.

use crate::permissions::{self, *};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Built-in role names.
pub mod role_names {
    pub const PLATFORM_ADMIN: &str = "PlatformAdmin";
    pub const TENANT_ADMIN: &str = "TenantAdmin";
    pub const COMPLIANCE_MANAGER: &str = "ComplianceManager";
    pub const RISK_MANAGER: &str = "RiskManager";
    pub const AUDITOR: &str = "Auditor";
    pub const EVIDENCE_OFFICER: &str = "EvidenceOfficer";
    pub const CONTROL_OWNER: &str = "ControlOwner";
    pub const VIEWER: &str = "Viewer";
}

/// A named role containing a set of permissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub permissions: Vec<String>,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
}

/// RBAC engine backed by DashMap stores.
pub struct RbacEngine {
    roles: DashMap<Uuid, Role>,
    user_roles: DashMap<Uuid, Vec<Uuid>>,
}

impl Default for RbacEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RbacEngine {
    /// Create a new, empty RBAC engine.
    pub fn new() -> Self {
        Self {
            roles: DashMap::new(),
            user_roles: DashMap::new(),
        }
    }

    /// Create a new role and return it. Unknown permission strings are dropped.
    pub fn create_role(
        &self,
        name: &str,
        description: &str,
        permissions: Vec<String>,
        is_system: bool,
    ) -> Role {
        let permissions = permissions
            .into_iter()
            .filter(|p| permissions::is_known(p))
            .collect();
        let role = Role {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.to_string(),
            permissions,
            is_system,
            created_at: Utc::now(),
        };
        info!(role_id = %role.id, role_name = %role.name, "Role created");
        self.roles.insert(role.id, role.clone());
        role
    }

    pub fn role_by_name(&self, name: &str) -> Option<Role> {
        self.roles
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
            .map(|r| r.value().clone())
    }

    /// Assign an existing role to a user. Returns `true` when newly assigned.
    pub fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> bool {
        if !self.roles.contains_key(&role_id) {
            return false;
        }
        let mut entry = self.user_roles.entry(user_id).or_default();
        if entry.contains(&role_id) {
            return false;
        }
        entry.push(role_id);
        info!(user_id = %user_id, role_id = %role_id, "Role assigned");
        true
    }

    /// Assign a role by name. Returns `false` for unknown roles or duplicates.
    pub fn assign_role_by_name(&self, user_id: Uuid, role_name: &str) -> bool {
        match self.role_by_name(role_name) {
            Some(role) => self.assign_role(user_id, role.id),
            None => false,
        }
    }

    /// Remove a role from a user. Returns `true` when the role was actually removed.
    pub fn revoke_role(&self, user_id: Uuid, role_id: Uuid) -> bool {
        if let Some(mut entry) = self.user_roles.get_mut(&user_id) {
            let before = entry.len();
            entry.retain(|r| *r != role_id);
            let removed = entry.len() < before;
            if removed {
                info!(user_id = %user_id, role_id = %role_id, "Role revoked");
            }
            removed
        } else {
            false
        }
    }

    /// Check whether a user holds a specific permission through any assigned role.
    pub fn check_permission(&self, user_id: Uuid, permission: &str) -> bool {
        if let Some(role_ids) = self.user_roles.get(&user_id) {
            for role_id in role_ids.iter() {
                if let Some(role) = self.roles.get(role_id) {
                    if role.permissions.iter().any(|p| p == permission) {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Collect every permission a user holds (deduplicated).
    pub fn get_user_permissions(&self, user_id: Uuid) -> Vec<String> {
        let mut perms: Vec<String> = Vec::new();
        if let Some(role_ids) = self.user_roles.get(&user_id) {
            for role_id in role_ids.iter() {
                if let Some(role) = self.roles.get(role_id) {
                    for p in &role.permissions {
                        if !perms.contains(p) {
                            perms.push(p.clone());
                        }
                    }
                }
            }
        }
        perms
    }

    /// Names of every role assigned to a user.
    pub fn user_role_names(&self, user_id: Uuid) -> Vec<String> {
        self.user_roles
            .get(&user_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.roles.get(id).map(|r| r.name.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All users holding the named role, across tenants. Callers filter by tenant.
    pub fn users_with_role(&self, role_name: &str) -> Vec<Uuid> {
        let Some(role) = self.role_by_name(role_name) else {
            return Vec::new();
        };
        self.user_roles
            .iter()
            .filter(|e| e.value().contains(&role.id))
            .map(|e| *e.key())
            .collect()
    }

    /// List all defined roles.
    pub fn list_roles(&self) -> Vec<Role> {
        let mut roles: Vec<Role> = self.roles.iter().map(|e| e.value().clone()).collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        roles
    }

    /// Seed the default system roles.
    pub fn seed_default_roles(&self) {
        let everything = all_permissions();
        self.create_role(
            role_names::PLATFORM_ADMIN,
            "Full platform administrator across tenants",
            union(&[everything.as_slice()]),
            true,
        );

        let tenant_admin: Vec<&str> = everything
            .iter()
            .copied()
            .filter(|p| permissions::module_of(p) != Some("Tenants") && *p != admin::TENANTS)
            .collect();
        self.create_role(
            role_names::TENANT_ADMIN,
            "Administers a single tenant",
            union(&[tenant_admin.as_slice()]),
            true,
        );

        self.create_role(
            role_names::COMPLIANCE_MANAGER,
            "Owns frameworks, assessments, evidence and policies",
            union(&[
                dashboard::ALL,
                frameworks::ALL,
                regulators::ALL,
                assessments::ALL,
                evidence::ALL,
                policies::ALL,
                controls::ALL,
                workflow::ALL,
                compliance_calendar::ALL,
                onboarding::ALL,
                reports::ALL,
                &[risks::VIEW, audits::VIEW, users::VIEW],
            ]),
            true,
        );

        self.create_role(
            role_names::RISK_MANAGER,
            "Manages the risk register and treatment plans",
            union(&[
                risks::ALL,
                action_plans::ALL,
                vendors::ALL,
                &[
                    dashboard::DEFAULT,
                    controls::VIEW,
                    controls::TEST,
                    assessments::VIEW,
                    workflow::VIEW,
                    workflow::APPROVE,
                    workflow::REJECT,
                    reports::VIEW,
                ],
            ]),
            true,
        );

        self.create_role(
            role_names::AUDITOR,
            "Plans and executes audits, reviews evidence",
            union(&[
                audits::ALL,
                &[
                    dashboard::DEFAULT,
                    assessments::VIEW,
                    evidence::VIEW,
                    evidence::REVIEW,
                    controls::VIEW,
                    controls::TEST,
                    policies::VIEW,
                    risks::VIEW,
                    reports::VIEW,
                    reports::EXPORT,
                ],
            ]),
            true,
        );

        self.create_role(
            role_names::EVIDENCE_OFFICER,
            "Collects and submits evidence",
            union(&[&[
                dashboard::DEFAULT,
                evidence::VIEW,
                evidence::UPLOAD,
                evidence::UPDATE,
                evidence::SUBMIT,
                assessments::VIEW,
                controls::VIEW,
                workflow::VIEW,
            ]]),
            true,
        );

        self.create_role(
            role_names::CONTROL_OWNER,
            "Implements and tests assigned controls",
            union(&[&[
                dashboard::DEFAULT,
                controls::VIEW,
                controls::EDIT,
                controls::IMPLEMENT,
                controls::TEST,
                evidence::VIEW,
                evidence::UPLOAD,
                evidence::SUBMIT,
                risks::VIEW,
                workflow::VIEW,
            ]]),
            true,
        );

        let viewer: Vec<&str> = everything
            .iter()
            .copied()
            .filter(|p| p.ends_with(".View") || *p == dashboard::DEFAULT || *p == home::DEFAULT)
            .collect();
        self.create_role(
            role_names::VIEWER,
            "Read-only access to all resources",
            union(&[viewer.as_slice()]),
            true,
        );

        info!("Default RBAC roles seeded");
    }
}

/// Flatten permission groups into an owned, deduplicated list.
fn union(groups: &[&[&str]]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for p in groups.iter().flat_map(|g| g.iter()) {
        if !out.iter().any(|existing| existing == p) {
            out.push(p.to_string());
        }
    }
    out
}
