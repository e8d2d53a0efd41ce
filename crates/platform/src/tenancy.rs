//! Multi-tenancy: tenant lifecycle, activation, and tenant-scoped users.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use grc_core::error::{GrcError, GrcResult};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

/// Tenant lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    Pending,
    Active,
    Suspended,
    Archived,
    Deleted,
}

/// A single tenant (customer organization) in the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub status: TenantStatus,
    pub admin_email: String,
    #[serde(skip_serializing, default)]
    pub activation_token: Option<String>,
    pub suspension_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A user that belongs to exactly one tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantUser {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub display_name: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Multi-tenant manager backed by DashMap.
pub struct TenantManager {
    tenants: DashMap<Uuid, Tenant>,
    /// slug -> tenant id. Slugs stay reserved after soft delete.
    slugs: DashMap<String, Uuid>,
    users: DashMap<Uuid, TenantUser>,
}

impl Default for TenantManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TenantManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self {
            tenants: DashMap::new(),
            slugs: DashMap::new(),
            users: DashMap::new(),
        }
    }

    /// Normalize a requested slug: trimmed and lowercased.
    pub fn normalize_slug(slug: &str) -> String {
        slug.trim().to_lowercase()
    }

    /// Create a new tenant in `Pending` status with a one-time activation token.
    pub fn create_tenant(&self, name: &str, slug: &str, admin_email: &str) -> GrcResult<Tenant> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GrcError::Validation("Tenant name is required".into()));
        }
        let slug = Self::normalize_slug(slug);
        if slug.is_empty() || !slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(GrcError::Validation(format!(
                "Invalid tenant slug '{slug}': use lowercase letters, digits and '-'"
            )));
        }

        let now = Utc::now();
        let tenant = Tenant {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: slug.clone(),
            status: TenantStatus::Pending,
            admin_email: admin_email.trim().to_lowercase(),
            activation_token: Some(generate_token()),
            suspension_reason: None,
            created_at: now,
            updated_at: now,
            activated_at: None,
            deleted_at: None,
        };

        match self.slugs.entry(slug.clone()) {
            Entry::Occupied(_) => {
                return Err(GrcError::Conflict(format!(
                    "Tenant with slug '{slug}' already exists"
                )))
            }
            Entry::Vacant(v) => {
                v.insert(tenant.id);
            }
        }

        info!(tenant_id = %tenant.id, tenant_slug = %tenant.slug, "Tenant created");
        self.tenants.insert(tenant.id, tenant.clone());
        Ok(tenant)
    }

    /// Look up a tenant by id.
    pub fn get_tenant(&self, id: Uuid) -> Option<Tenant> {
        self.tenants.get(&id).map(|e| e.value().clone())
    }

    /// Look up a non-deleted tenant by slug.
    pub fn get_by_slug(&self, slug: &str) -> Option<Tenant> {
        let id = *self.slugs.get(&Self::normalize_slug(slug))?;
        self.get_tenant(id)
            .filter(|t| t.status != TenantStatus::Deleted)
    }

    /// List all tenants that are not soft-deleted, oldest first.
    pub fn list_tenants(&self) -> Vec<Tenant> {
        let mut tenants: Vec<Tenant> = self
            .tenants
            .iter()
            .filter(|e| e.value().status != TenantStatus::Deleted)
            .map(|e| e.value().clone())
            .collect();
        tenants.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        tenants
    }

    /// Activate a pending tenant using its activation token.
    pub fn activate(&self, token: &str) -> GrcResult<Tenant> {
        let mut entry = self
            .tenants
            .iter_mut()
            .find(|e| e.value().activation_token.as_deref() == Some(token))
            .ok_or_else(|| GrcError::not_found("Activation token", "<redacted>"))?;

        let tenant = entry.value_mut();
        if tenant.status != TenantStatus::Pending {
            return Err(GrcError::invalid_transition(tenant.status, TenantStatus::Active));
        }
        let now = Utc::now();
        tenant.status = TenantStatus::Active;
        tenant.activation_token = None;
        tenant.activated_at = Some(now);
        tenant.updated_at = now;
        info!(tenant_id = %tenant.id, "Tenant activated");
        Ok(tenant.clone())
    }

    /// Suspend an active tenant.
    pub fn suspend_tenant(&self, id: Uuid, reason: Option<String>) -> GrcResult<Tenant> {
        self.transition(id, TenantStatus::Suspended, |t| {
            t.suspension_reason = reason;
        })
    }

    /// Reactivate a suspended tenant.
    pub fn reactivate_tenant(&self, id: Uuid) -> GrcResult<Tenant> {
        self.transition(id, TenantStatus::Active, |t| {
            t.suspension_reason = None;
        })
    }

    /// Archive a tenant (read-only retention).
    pub fn archive_tenant(&self, id: Uuid) -> GrcResult<Tenant> {
        self.transition(id, TenantStatus::Archived, |_| {})
    }

    /// Soft-delete a tenant. The record and slug are kept.
    pub fn soft_delete(&self, id: Uuid) -> GrcResult<Tenant> {
        self.transition(id, TenantStatus::Deleted, |t| {
            t.deleted_at = Some(Utc::now());
        })
    }

    fn transition(
        &self,
        id: Uuid,
        to: TenantStatus,
        apply: impl FnOnce(&mut Tenant),
    ) -> GrcResult<Tenant> {
        let mut entry = self
            .tenants
            .get_mut(&id)
            .ok_or_else(|| GrcError::not_found("Tenant", id))?;
        let tenant = entry.value_mut();
        let allowed = matches!(
            (tenant.status, to),
            (TenantStatus::Active, TenantStatus::Suspended)
                | (TenantStatus::Suspended, TenantStatus::Active)
                | (TenantStatus::Pending, TenantStatus::Archived)
                | (TenantStatus::Active, TenantStatus::Archived)
                | (TenantStatus::Suspended, TenantStatus::Archived)
                | (TenantStatus::Pending, TenantStatus::Deleted)
                | (TenantStatus::Active, TenantStatus::Deleted)
                | (TenantStatus::Suspended, TenantStatus::Deleted)
                | (TenantStatus::Archived, TenantStatus::Deleted)
        );
        if !allowed {
            return Err(GrcError::invalid_transition(tenant.status, to));
        }
        apply(tenant);
        tenant.status = to;
        tenant.updated_at = Utc::now();
        info!(tenant_id = %id, status = ?to, "Tenant status changed");
        Ok(tenant.clone())
    }

    /// Fail with `Forbidden` unless the tenant exists and is active.
    pub fn ensure_active(&self, id: Uuid) -> GrcResult<()> {
        match self.tenants.get(&id).map(|t| t.status) {
            Some(TenantStatus::Active) => Ok(()),
            Some(status) => Err(GrcError::Forbidden(format!("Tenant is {status:?}"))),
            None => Err(GrcError::not_found("Tenant", id)),
        }
    }

    // ─── Users ──────────────────────────────────────────────────────────────

    /// Add a user to a tenant. Emails are unique per tenant (case-insensitive).
    pub fn add_user(
        &self,
        tenant_id: Uuid,
        email: &str,
        display_name: &str,
        password: &str,
    ) -> GrcResult<TenantUser> {
        if !self.tenants.contains_key(&tenant_id) {
            return Err(GrcError::not_found("Tenant", tenant_id));
        }
        let email = email.trim().to_lowercase();
        if !email.contains('@') {
            return Err(GrcError::Validation(format!("Invalid email '{email}'")));
        }
        if password.len() < 8 {
            return Err(GrcError::Validation(
                "Password must be at least 8 characters".into(),
            ));
        }
        if self.find_user_by_email(tenant_id, &email).is_some() {
            return Err(GrcError::Conflict(format!(
                "User '{email}' already exists in tenant"
            )));
        }

        let user = TenantUser {
            id: Uuid::new_v4(),
            tenant_id,
            email,
            display_name: display_name.to_string(),
            password_hash: hash_password(tenant_id, password),
            is_active: true,
            created_at: Utc::now(),
            last_login_at: None,
        };
        info!(tenant_id = %tenant_id, user_id = %user.id, "Tenant user added");
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    pub fn get_user(&self, tenant_id: Uuid, user_id: Uuid) -> Option<TenantUser> {
        self.users
            .get(&user_id)
            .filter(|u| u.tenant_id == tenant_id)
            .map(|u| u.value().clone())
    }

    pub fn find_user_by_email(&self, tenant_id: Uuid, email: &str) -> Option<TenantUser> {
        let email = email.trim().to_lowercase();
        self.users
            .iter()
            .find(|u| u.tenant_id == tenant_id && u.email == email)
            .map(|u| u.value().clone())
    }

    pub fn list_users(&self, tenant_id: Uuid) -> Vec<TenantUser> {
        let mut users: Vec<TenantUser> = self
            .users
            .iter()
            .filter(|u| u.tenant_id == tenant_id)
            .map(|u| u.value().clone())
            .collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        users
    }

    pub fn deactivate_user(&self, tenant_id: Uuid, user_id: Uuid) -> GrcResult<TenantUser> {
        let mut entry = self
            .users
            .get_mut(&user_id)
            .filter(|u| u.tenant_id == tenant_id)
            .ok_or_else(|| GrcError::not_found("User", user_id))?;
        entry.is_active = false;
        info!(tenant_id = %tenant_id, user_id = %user_id, "Tenant user deactivated");
        Ok(entry.clone())
    }

    /// Check a login attempt. Returns the tenant and user on success.
    pub fn verify_credentials(
        &self,
        slug: &str,
        email: &str,
        password: &str,
    ) -> GrcResult<(Tenant, TenantUser)> {
        let invalid = || GrcError::Forbidden("Invalid credentials".into());
        let tenant = self.get_by_slug(slug).ok_or_else(invalid)?;
        let user = self
            .find_user_by_email(tenant.id, email)
            .filter(|u| u.is_active)
            .ok_or_else(invalid)?;
        if user.password_hash != hash_password(tenant.id, password) {
            return Err(invalid());
        }
        if let Some(mut entry) = self.users.get_mut(&user.id) {
            entry.last_login_at = Some(Utc::now());
        }
        Ok((tenant, user))
    }
}

/// SHA-256 of `tenant_id:password`, hex encoded.
fn hash_password(tenant_id: Uuid, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{tenant_id}:{password}").as_bytes());
    hex::encode(hasher.finalize())
}

/// Random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
    hex::encode(bytes)
}
