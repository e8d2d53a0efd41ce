use crate::error::{GrcError, GrcResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Organization profile captured by the onboarding questionnaire.
/// One per tenant; the rules engine reads it to derive compliance scope.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct OrganizationProfile {
    pub tenant_id: Uuid,

    // Identity
    pub legal_name: String,
    pub country: String,
    pub sector: String,
    pub org_type: String,
    pub organization_size: String,
    pub employee_count: u32,
    pub branch_count: u32,
    pub is_publicly_traded: bool,
    pub is_subsidiary: bool,

    // Regulatory
    pub is_regulated_entity: bool,
    pub is_critical_infrastructure: bool,
    pub primary_regulator: String,
    pub secondary_regulators: Vec<String>,
    pub regulatory_certifications: Vec<String>,
    pub industry_licenses: Vec<String>,

    // Data
    pub data_types: Vec<String>,
    pub processes_personal_data: bool,
    pub processes_sensitive_data: bool,
    pub data_subject_count: u64,
    pub has_data_center_in_ksa: bool,

    // Technology
    pub hosting_model: String,
    pub cloud_providers: Vec<String>,

    // Third parties
    pub has_third_party_data_processing: bool,
    pub vendor_count: u32,
    pub critical_vendor_count: u32,
    pub third_party_risk_level: String,

    pub compliance_maturity: String,

    pub last_scope_derived_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Default for OrganizationProfile {
    fn default() -> Self {
        Self {
            tenant_id: Uuid::nil(),
            legal_name: String::new(),
            country: "SA".to_string(),
            sector: String::new(),
            org_type: String::new(),
            organization_size: String::new(),
            employee_count: 0,
            branch_count: 0,
            is_publicly_traded: false,
            is_subsidiary: false,
            is_regulated_entity: false,
            is_critical_infrastructure: false,
            primary_regulator: String::new(),
            secondary_regulators: Vec::new(),
            regulatory_certifications: Vec::new(),
            industry_licenses: Vec::new(),
            data_types: Vec::new(),
            processes_personal_data: false,
            processes_sensitive_data: false,
            data_subject_count: 0,
            has_data_center_in_ksa: false,
            hosting_model: String::new(),
            cloud_providers: Vec::new(),
            has_third_party_data_processing: false,
            vendor_count: 0,
            critical_vendor_count: 0,
            third_party_risk_level: String::new(),
            compliance_maturity: String::new(),
            last_scope_derived_at: None,
            updated_at: Utc::now(),
        }
    }
}

/// Fields that questionnaire answers may never overwrite.
const PROTECTED_PROFILE_FIELDS: &[&str] = &["tenant_id", "last_scope_derived_at", "updated_at"];

impl OrganizationProfile {
    pub fn new(tenant_id: Uuid, country: &str) -> Self {
        Self {
            tenant_id,
            country: country.to_string(),
            ..Self::default()
        }
    }

    /// Overlay a JSON object of questionnaire answers onto the profile.
    ///
    /// Keys that are not profile fields are ignored so a section can carry
    /// answers that only live in the wizard. Returns the number of fields applied.
    pub fn merge_answers(&mut self, answers: &serde_json::Value) -> GrcResult<usize> {
        let answers = answers
            .as_object()
            .ok_or_else(|| GrcError::Validation("answers must be a JSON object".into()))?;

        let mut current = serde_json::to_value(&*self)?;
        let fields = current
            .as_object_mut()
            .ok_or_else(|| GrcError::Validation("profile is not an object".into()))?;

        let mut applied = 0;
        for (key, value) in answers {
            if PROTECTED_PROFILE_FIELDS.contains(&key.as_str()) || !fields.contains_key(key) {
                continue;
            }
            fields.insert(key.clone(), value.clone());
            applied += 1;
        }

        let mut merged: OrganizationProfile = serde_json::from_value(current)
            .map_err(|e| GrcError::Validation(format!("invalid profile answer: {e}")))?;
        merged.updated_at = Utc::now();
        *self = merged;
        Ok(applied)
    }
}

/// Business criticality tier of an asset; T1 is most critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum AssetCriticality {
    T1,
    T2,
    T3,
    T4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DataClassification {
    Public,
    Internal,
    Confidential,
    Restricted,
}

impl DataClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataClassification::Public => "public",
            DataClassification::Internal => "internal",
            DataClassification::Confidential => "confidential",
            DataClassification::Restricted => "restricted",
        }
    }
}

/// An information asset registered by a tenant.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Asset {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub asset_type: String,
    pub criticality: AssetCriticality,
    pub data_classification: DataClassification,
    /// Regulated data categories held by the asset, e.g. `PII`, `PCI`, `PHI`.
    pub data_types: Vec<String>,
    /// `Cloud` or `OnPremise`.
    pub hosting_model: String,
    pub cloud_provider: Option<String>,
    pub owner_id: Option<Uuid>,
    pub is_in_scope: bool,
    pub created_at: DateTime<Utc>,
}

/// Longest day count accepted for due dates, escalation thresholds and
/// lookahead windows.
pub const MAX_DAY_SPAN: i64 = 3650;

/// Convert a caller-supplied day count into a `Duration`, rejecting values
/// outside `0..=MAX_DAY_SPAN`.
pub fn day_span(field: &str, days: i64) -> GrcResult<Duration> {
    if !(0..=MAX_DAY_SPAN).contains(&days) {
        return Err(GrcError::Validation(format!(
            "{field} must be between 0 and {MAX_DAY_SPAN} days, got {days}"
        )));
    }
    Ok(Duration::days(days))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_span_bounds() {
        assert_eq!(day_span("due_in_days", 0).unwrap(), Duration::zero());
        assert_eq!(day_span("due_in_days", MAX_DAY_SPAN).unwrap().num_days(), MAX_DAY_SPAN);
        assert!(matches!(day_span("due_in_days", -1), Err(GrcError::Validation(_))));
        assert!(matches!(day_span("due_in_days", i64::MAX), Err(GrcError::Validation(_))));
        assert!(matches!(day_span("due_in_days", i64::MIN), Err(GrcError::Validation(_))));
    }

    #[test]
    fn test_merge_answers_overlays_known_fields() {
        let mut profile = OrganizationProfile::new(Uuid::new_v4(), "SA");
        let tenant_id = profile.tenant_id;

        let applied = profile
            .merge_answers(&serde_json::json!({
                "legal_name": "Riyadh Bank",
                "sector": "Banking",
                "employee_count": 1200,
                "data_types": ["PII", "financial"],
                "tenant_id": Uuid::new_v4(),
                "preferred_language": "ar"
            }))
            .unwrap();

        assert_eq!(applied, 4);
        assert_eq!(profile.legal_name, "Riyadh Bank");
        assert_eq!(profile.sector, "Banking");
        assert_eq!(profile.employee_count, 1200);
        assert_eq!(profile.data_types, vec!["PII", "financial"]);
        // Protected field untouched.
        assert_eq!(profile.tenant_id, tenant_id);
    }

    #[test]
    fn test_merge_answers_rejects_type_mismatch() {
        let mut profile = OrganizationProfile::default();
        let result = profile.merge_answers(&serde_json::json!({ "employee_count": "many" }));
        assert!(matches!(result, Err(GrcError::Validation(_))));

        let result = profile.merge_answers(&serde_json::json!(["not", "an", "object"]));
        assert!(result.is_err());
    }
}
