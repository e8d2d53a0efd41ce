//! Control library: per-tenant controls mapped to baselines, with test results.

use crate::models::{CreateControlRequest, UpdateControlRequest};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use grc_core::error::{GrcError, GrcResult};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImplementationStatus {
    #[default]
    NotImplemented,
    Planned,
    PartiallyImplemented,
    Implemented,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Control {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub code: String,
    pub title: String,
    pub description: String,
    pub baseline_code: String,
    pub owner_id: Option<Uuid>,
    pub implementation_status: ImplementationStatus,
    /// Latest tested effectiveness, 0-100.
    pub effectiveness: u8,
    pub last_tested_at: Option<DateTime<Utc>>,
    pub last_tested_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct ControlService {
    controls: DashMap<Uuid, Control>,
}

impl Default for ControlService {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlService {
    pub fn new() -> Self {
        Self {
            controls: DashMap::new(),
        }
    }

    pub fn create(&self, tenant_id: Uuid, req: CreateControlRequest) -> GrcResult<Control> {
        let code = req.code.trim().to_uppercase();
        if code.is_empty() || req.title.trim().is_empty() {
            return Err(GrcError::Validation("Control code and title are required".into()));
        }
        if self
            .controls
            .iter()
            .any(|c| c.tenant_id == tenant_id && c.code == code)
        {
            return Err(GrcError::Conflict(format!("Control '{code}' already exists")));
        }
        let now = Utc::now();
        let control = Control {
            id: Uuid::new_v4(),
            tenant_id,
            code,
            title: req.title,
            description: req.description,
            baseline_code: req.baseline_code,
            owner_id: req.owner_id,
            implementation_status: ImplementationStatus::NotImplemented,
            effectiveness: 0,
            last_tested_at: None,
            last_tested_by: None,
            created_at: now,
            updated_at: now,
        };
        info!(tenant_id = %tenant_id, control = %control.code, "Control created");
        self.controls.insert(control.id, control.clone());
        Ok(control)
    }

    pub fn get(&self, tenant_id: Uuid, id: Uuid) -> GrcResult<Control> {
        self.controls
            .get(&id)
            .filter(|c| c.tenant_id == tenant_id)
            .map(|c| c.value().clone())
            .ok_or_else(|| GrcError::not_found("Control", id))
    }

    pub fn list(&self, tenant_id: Uuid) -> Vec<Control> {
        let mut controls: Vec<Control> = self
            .controls
            .iter()
            .filter(|c| c.tenant_id == tenant_id)
            .map(|c| c.value().clone())
            .collect();
        controls.sort_by(|a, b| a.code.cmp(&b.code));
        controls
    }

    pub fn list_by_baseline(&self, tenant_id: Uuid, baseline_code: &str) -> Vec<Control> {
        self.list(tenant_id)
            .into_iter()
            .filter(|c| c.baseline_code.eq_ignore_ascii_case(baseline_code))
            .collect()
    }

    pub fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        req: UpdateControlRequest,
    ) -> GrcResult<Control> {
        let mut entry = self
            .controls
            .get_mut(&id)
            .filter(|c| c.tenant_id == tenant_id)
            .ok_or_else(|| GrcError::not_found("Control", id))?;
        let c = entry.value_mut();
        if let Some(title) = req.title {
            c.title = title;
        }
        if let Some(description) = req.description {
            c.description = description;
        }
        if let Some(owner) = req.owner_id {
            c.owner_id = Some(owner);
        }
        if let Some(status) = req.implementation_status {
            c.implementation_status = status;
        }
        c.updated_at = Utc::now();
        Ok(c.clone())
    }

    pub fn delete(&self, tenant_id: Uuid, id: Uuid) -> GrcResult<()> {
        self.get(tenant_id, id)?;
        self.controls.remove(&id);
        info!(tenant_id = %tenant_id, control_id = %id, "Control deleted");
        Ok(())
    }

    /// Record a control test; the score becomes the control's effectiveness.
    pub fn record_test(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        score: u8,
        tester: Uuid,
    ) -> GrcResult<Control> {
        if score > 100 {
            return Err(GrcError::Validation("Test score must be between 0 and 100".into()));
        }
        let mut entry = self
            .controls
            .get_mut(&id)
            .filter(|c| c.tenant_id == tenant_id)
            .ok_or_else(|| GrcError::not_found("Control", id))?;
        let now = Utc::now();
        entry.effectiveness = score;
        entry.last_tested_at = Some(now);
        entry.last_tested_by = Some(tester);
        entry.updated_at = now;
        info!(tenant_id = %tenant_id, control = %entry.code, score, "Control tested");
        Ok(entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(code: &str, baseline: &str) -> CreateControlRequest {
        CreateControlRequest {
            code: code.into(),
            title: format!("Control {code}"),
            description: String::new(),
            baseline_code: baseline.into(),
            owner_id: None,
        }
    }

    #[test]
    fn test_control_crud_and_uniqueness() {
        let svc = ControlService::new();
        let tenant = Uuid::new_v4();

        let c = svc.create(tenant, request("ecc-1-1", "NCA_ECC")).unwrap();
        assert_eq!(c.code, "ECC-1-1");
        assert!(matches!(
            svc.create(tenant, request("ECC-1-1", "NCA_ECC")),
            Err(GrcError::Conflict(_))
        ));
        // Same code in another tenant is fine.
        assert!(svc.create(Uuid::new_v4(), request("ECC-1-1", "NCA_ECC")).is_ok());

        svc.create(tenant, request("CSF-3-1", "SAMA_CSF")).unwrap();
        assert_eq!(svc.list_by_baseline(tenant, "nca_ecc").len(), 1);

        let updated = svc
            .update(
                tenant,
                c.id,
                UpdateControlRequest {
                    implementation_status: Some(ImplementationStatus::Implemented),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.implementation_status, ImplementationStatus::Implemented);

        svc.delete(tenant, c.id).unwrap();
        assert!(svc.get(tenant, c.id).is_err());
    }

    #[test]
    fn test_record_test() {
        let svc = ControlService::new();
        let tenant = Uuid::new_v4();
        let tester = Uuid::new_v4();
        let c = svc.create(tenant, request("ECC-2-1", "NCA_ECC")).unwrap();

        let tested = svc.record_test(tenant, c.id, 85, tester).unwrap();
        assert_eq!(tested.effectiveness, 85);
        assert_eq!(tested.last_tested_by, Some(tester));
        assert!(svc.record_test(tenant, c.id, 101, tester).is_err());
    }
}
