//! In-memory tenant data store backed by DashMap.
//!
//! Holds the per-tenant organization profile, the asset register and the
//! derived compliance scope. Every read and write is keyed by tenant id.

use crate::models::CreateAssetRequest;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use grc_core::error::{GrcError, GrcResult};
use grc_core::types::{Asset, OrganizationProfile};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Kind of artefact a scope item brings into scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Baseline,
    Package,
    Template,
}

/// One baseline, package or template that applies to a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeItem {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub kind: ScopeKind,
    pub code: String,
    pub applicability: String,
    /// `{ "source": "RulesEngine", "execution_log_id": ... }`
    pub reason: serde_json::Value,
    pub derived_at: DateTime<Utc>,
}

/// Thread-safe store for profiles, assets and scope.
pub struct ManagementStore {
    profiles: DashMap<Uuid, OrganizationProfile>,
    assets: DashMap<Uuid, Asset>,
    /// tenant_id -> current scope
    scopes: DashMap<Uuid, Vec<ScopeItem>>,
}

impl Default for ManagementStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagementStore {
    pub fn new() -> Self {
        info!("Management store initialized (in-memory)");
        Self {
            profiles: DashMap::new(),
            assets: DashMap::new(),
            scopes: DashMap::new(),
        }
    }

    // ─── Organization profile ───────────────────────────────────────────────

    pub fn get_profile(&self, tenant_id: Uuid) -> Option<OrganizationProfile> {
        self.profiles.get(&tenant_id).map(|p| p.value().clone())
    }

    pub fn save_profile(&self, profile: OrganizationProfile) {
        self.profiles.insert(profile.tenant_id, profile);
    }

    /// Apply `change` to the tenant's profile under its entry lock and return
    /// the result. `None` when the tenant has no profile yet.
    pub fn update_profile<F>(&self, tenant_id: Uuid, change: F) -> Option<OrganizationProfile>
    where
        F: FnOnce(&mut OrganizationProfile),
    {
        let mut entry = self.profiles.get_mut(&tenant_id)?;
        change(entry.value_mut());
        Some(entry.clone())
    }

    /// Create the profile on first use and merge questionnaire answers into it.
    pub fn merge_profile_answers(
        &self,
        tenant_id: Uuid,
        default_country: &str,
        answers: &serde_json::Value,
    ) -> GrcResult<OrganizationProfile> {
        let mut entry = self
            .profiles
            .entry(tenant_id)
            .or_insert_with(|| OrganizationProfile::new(tenant_id, default_country));
        let applied = entry.merge_answers(answers)?;
        info!(tenant_id = %tenant_id, fields = applied, "Organization profile updated");
        Ok(entry.clone())
    }

    pub fn stamp_scope_derived(&self, tenant_id: Uuid, at: DateTime<Utc>) {
        if let Some(mut profile) = self.profiles.get_mut(&tenant_id) {
            profile.last_scope_derived_at = Some(at);
        }
    }

    // ─── Assets ─────────────────────────────────────────────────────────────

    pub fn create_asset(&self, tenant_id: Uuid, req: CreateAssetRequest) -> GrcResult<Asset> {
        if req.name.trim().is_empty() {
            return Err(GrcError::Validation("Asset name is required".into()));
        }
        let normalized = req.hosting_model.to_ascii_lowercase().replace(['-', ' '], "");
        let hosting_model = match normalized.as_str() {
            "cloud" => "Cloud",
            "onpremise" | "onprem" => "OnPremise",
            other => {
                return Err(GrcError::Validation(format!(
                    "Unknown hosting model '{other}' (expected Cloud or OnPremise)"
                )))
            }
        };
        let asset = Asset {
            id: Uuid::new_v4(),
            tenant_id,
            name: req.name.trim().to_string(),
            asset_type: req.asset_type,
            criticality: req.criticality,
            data_classification: req.data_classification,
            data_types: req.data_types,
            hosting_model: hosting_model.to_string(),
            cloud_provider: req.cloud_provider,
            owner_id: req.owner_id,
            is_in_scope: req.is_in_scope,
            created_at: Utc::now(),
        };
        info!(tenant_id = %tenant_id, asset_id = %asset.id, "Asset registered");
        self.assets.insert(asset.id, asset.clone());
        Ok(asset)
    }

    pub fn get_asset(&self, tenant_id: Uuid, id: Uuid) -> GrcResult<Asset> {
        self.assets
            .get(&id)
            .filter(|a| a.tenant_id == tenant_id)
            .map(|a| a.value().clone())
            .ok_or_else(|| GrcError::not_found("Asset", id))
    }

    pub fn list_assets(&self, tenant_id: Uuid) -> Vec<Asset> {
        let mut assets: Vec<Asset> = self
            .assets
            .iter()
            .filter(|a| a.tenant_id == tenant_id)
            .map(|a| a.value().clone())
            .collect();
        assets.sort_by(|a, b| a.name.cmp(&b.name));
        assets
    }

    pub fn in_scope_assets(&self, tenant_id: Uuid) -> Vec<Asset> {
        self.list_assets(tenant_id)
            .into_iter()
            .filter(|a| a.is_in_scope)
            .collect()
    }

    pub fn delete_asset(&self, tenant_id: Uuid, id: Uuid) -> GrcResult<()> {
        self.get_asset(tenant_id, id)?;
        self.assets.remove(&id);
        info!(tenant_id = %tenant_id, asset_id = %id, "Asset deleted");
        Ok(())
    }

    // ─── Scope ──────────────────────────────────────────────────────────────

    /// Replace the tenant's scope wholesale with a freshly derived set.
    pub fn replace_scope(&self, tenant_id: Uuid, items: Vec<ScopeItem>) {
        info!(tenant_id = %tenant_id, items = items.len(), "Compliance scope replaced");
        self.scopes.insert(tenant_id, items);
    }

    pub fn scope(&self, tenant_id: Uuid) -> Vec<ScopeItem> {
        self.scopes
            .get(&tenant_id)
            .map(|s| s.value().clone())
            .unwrap_or_default()
    }

    pub fn scope_codes(&self, tenant_id: Uuid, kind: ScopeKind) -> Vec<String> {
        self.scope(tenant_id)
            .into_iter()
            .filter(|i| i.kind == kind)
            .map(|i| i.code)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grc_core::types::{AssetCriticality, DataClassification};

    fn asset_request(name: &str, hosting: &str) -> CreateAssetRequest {
        CreateAssetRequest {
            name: name.into(),
            asset_type: "Application".into(),
            criticality: AssetCriticality::T2,
            data_classification: DataClassification::Internal,
            data_types: vec![],
            hosting_model: hosting.into(),
            cloud_provider: None,
            owner_id: None,
            is_in_scope: true,
        }
    }

    #[test]
    fn test_assets_are_tenant_scoped() {
        let store = ManagementStore::new();
        let tenant = Uuid::new_v4();
        let other = Uuid::new_v4();

        let asset =
            store.create_asset(tenant, asset_request("Core Banking", "on-premise")).unwrap();
        assert_eq!(asset.hosting_model, "OnPremise");

        assert!(store.get_asset(tenant, asset.id).is_ok());
        assert!(matches!(
            store.get_asset(other, asset.id),
            Err(GrcError::NotFound { .. })
        ));
        assert!(store.list_assets(other).is_empty());
        assert!(store.create_asset(tenant, asset_request("X", "mainframe")).is_err());

        store.delete_asset(tenant, asset.id).unwrap();
        assert!(store.list_assets(tenant).is_empty());
    }

    #[test]
    fn test_profile_created_on_first_merge() {
        let store = ManagementStore::new();
        let tenant = Uuid::new_v4();
        assert!(store.get_profile(tenant).is_none());

        let profile = store
            .merge_profile_answers(tenant, "AE", &serde_json::json!({"sector": "Banking"}))
            .unwrap();
        assert_eq!(profile.country, "AE");
        assert_eq!(profile.sector, "Banking");
        assert_eq!(profile.tenant_id, tenant);
    }

    #[test]
    fn test_update_profile_keeps_concurrent_merges() {
        let store = ManagementStore::new();
        let tenant = Uuid::new_v4();
        assert!(store.update_profile(tenant, |p| p.sector = "Banking".into()).is_none());

        store.save_profile(OrganizationProfile::new(tenant, "SA"));
        std::thread::scope(|s| {
            for i in 0..8u32 {
                let store = &store;
                s.spawn(move || {
                    store
                        .merge_profile_answers(
                            tenant,
                            "SA",
                            &serde_json::json!({ "employee_count": 100 + i }),
                        )
                        .unwrap();
                    store.update_profile(tenant, |p| p.data_types.push(format!("type-{i}")));
                });
            }
        });

        let profile = store.get_profile(tenant).unwrap();
        assert_eq!(profile.data_types.len(), 8);
        assert!(profile.employee_count >= 100);
    }

    #[test]
    fn test_replace_scope() {
        let store = ManagementStore::new();
        let tenant = Uuid::new_v4();
        let item = |code: &str| ScopeItem {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            kind: ScopeKind::Baseline,
            code: code.into(),
            applicability: "Required".into(),
            reason: serde_json::json!({}),
            derived_at: Utc::now(),
        };
        store.replace_scope(tenant, vec![item("NCA_ECC"), item("PDPL")]);
        store.replace_scope(tenant, vec![item("SAMA_CSF")]);
        assert_eq!(store.scope_codes(tenant, ScopeKind::Baseline), vec!["SAMA_CSF"]);
    }
}
