//! Rules engine that derives a tenant's compliance scope from its
//! organization profile.
//!
//! A ruleset is an ordered list of rules. Each rule has an `and`/`or`
//! condition over a flat string context built from the profile, and a list
//! of actions (`apply_baseline`, `apply_package`, `apply_template`, `tag`).
//! Every evaluation is recorded in an execution log.

use crate::store::{ManagementStore, ScopeItem, ScopeKind};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use grc_core::error::{GrcError, GrcResult};
use grc_core::types::{AssetCriticality, DataClassification, OrganizationProfile};
use grc_platform::AuditLogger;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

// ─── Rule model ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionKind {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    In,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldCondition {
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleCondition {
    #[serde(rename = "type")]
    pub kind: ConditionKind,
    #[serde(default)]
    pub conditions: Vec<FieldCondition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RuleAction {
    ApplyBaseline { code: String },
    ApplyPackage { code: String },
    ApplyTemplate { code: String },
    Tag { key: String, value: String },
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub priority: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub condition: RuleCondition,
    pub actions: Vec<RuleAction>,
}

/// Versioned ruleset. `tenant_id = None` makes it the platform-wide default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ruleset {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub code: String,
    pub name: String,
    pub version: u32,
    pub is_active: bool,
    pub rules: Vec<Rule>,
    pub created_at: DateTime<Utc>,
}

// ─── Execution records ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedRule {
    pub code: String,
    pub name: String,
    pub priority: i32,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleExecutionLog {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub ruleset_id: Uuid,
    pub ruleset_version: u32,
    pub executed_by: Option<Uuid>,
    pub status: ExecutionStatus,
    pub matched_rules: Vec<MatchedRule>,
    pub baselines: Vec<String>,
    pub packages: Vec<String>,
    pub templates: Vec<String>,
    pub tags: BTreeMap<String, String>,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesEvaluation {
    pub execution_log_id: Uuid,
    pub matched_rules: Vec<MatchedRule>,
    pub baselines: Vec<String>,
    pub packages: Vec<String>,
    pub templates: Vec<String>,
    pub tags: BTreeMap<String, String>,
}

/// Result of `derive_and_persist_scope`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivedScope {
    pub tenant_id: Uuid,
    pub execution_log_id: Uuid,
    pub baselines: Vec<String>,
    pub packages: Vec<String>,
    pub templates: Vec<String>,
    pub tags: BTreeMap<String, String>,
    pub matched_rules: Vec<MatchedRule>,
    pub items: Vec<ScopeItem>,
    pub derived_at: DateTime<Utc>,
}

// ─── Engine ─────────────────────────────────────────────────────────────────

pub struct RulesEngine {
    rulesets: DashMap<Uuid, Ruleset>,
    logs: DashMap<Uuid, RuleExecutionLog>,
    store: Arc<ManagementStore>,
    audit: Arc<AuditLogger>,
}

impl RulesEngine {
    pub fn new(store: Arc<ManagementStore>, audit: Arc<AuditLogger>) -> Self {
        Self {
            rulesets: DashMap::new(),
            logs: DashMap::new(),
            store,
            audit,
        }
    }

    /// Create an empty, inactive ruleset. The version is one past the highest
    /// existing version with the same code.
    pub fn create_ruleset(&self, tenant_id: Option<Uuid>, code: &str, name: &str) -> Ruleset {
        let version = self
            .rulesets
            .iter()
            .filter(|r| r.code == code && r.tenant_id == tenant_id)
            .map(|r| r.version)
            .max()
            .unwrap_or(0)
            + 1;
        let ruleset = Ruleset {
            id: Uuid::new_v4(),
            tenant_id,
            code: code.to_string(),
            name: name.to_string(),
            version,
            is_active: false,
            rules: Vec::new(),
            created_at: Utc::now(),
        };
        info!(ruleset_id = %ruleset.id, code, version, "Ruleset created");
        self.rulesets.insert(ruleset.id, ruleset.clone());
        ruleset
    }

    /// Activate a ruleset, deactivating the others with the same tenant scope.
    pub fn activate_ruleset(&self, id: Uuid) -> GrcResult<Ruleset> {
        let tenant_id = self
            .rulesets
            .get(&id)
            .map(|r| r.tenant_id)
            .ok_or_else(|| GrcError::not_found("Ruleset", id))?;
        for mut r in self.rulesets.iter_mut() {
            if r.tenant_id == tenant_id {
                r.is_active = r.id == id;
            }
        }
        info!(ruleset_id = %id, "Ruleset activated");
        self.get_ruleset(id)
    }

    pub fn get_ruleset(&self, id: Uuid) -> GrcResult<Ruleset> {
        self.rulesets
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or_else(|| GrcError::not_found("Ruleset", id))
    }

    /// Rulesets visible to a tenant: its own plus the platform defaults.
    pub fn list_rulesets(&self, tenant_id: Uuid) -> Vec<Ruleset> {
        let mut sets: Vec<Ruleset> = self
            .rulesets
            .iter()
            .filter(|r| r.tenant_id.map_or(true, |t| t == tenant_id))
            .map(|r| r.value().clone())
            .collect();
        sets.sort_by(|a, b| a.code.cmp(&b.code).then(b.version.cmp(&a.version)));
        sets
    }

    /// The tenant's own active ruleset, falling back to the platform default.
    pub fn active_ruleset(&self, tenant_id: Uuid) -> Option<Ruleset> {
        let pick = |scope: Option<Uuid>| {
            self.rulesets
                .iter()
                .filter(|r| r.is_active && r.tenant_id == scope)
                .max_by_key(|r| r.version)
                .map(|r| r.value().clone())
        };
        pick(Some(tenant_id)).or_else(|| pick(None))
    }

    /// Add a rule given as raw JSON. Malformed rules are rejected here so
    /// evaluation never has to guess.
    pub fn add_rule_json(&self, ruleset_id: Uuid, raw: serde_json::Value) -> GrcResult<Rule> {
        let rule: Rule = serde_json::from_value(raw)
            .map_err(|e| GrcError::Validation(format!("invalid rule: {e}")))?;
        self.add_rule(ruleset_id, rule)
    }

    pub fn add_rule(&self, ruleset_id: Uuid, rule: Rule) -> GrcResult<Rule> {
        if rule.code.trim().is_empty() {
            return Err(GrcError::Validation("rule code is required".into()));
        }
        if let Some(c) = rule
            .condition
            .conditions
            .iter()
            .find(|c| {
                c.operator == Operator::In && c.values.is_empty() && c.value.trim().is_empty()
            })
        {
            return Err(GrcError::Validation(format!(
                "rule {}: 'in' on '{}' needs values",
                rule.code, c.field
            )));
        }
        let mut ruleset = self
            .rulesets
            .get_mut(&ruleset_id)
            .ok_or_else(|| GrcError::not_found("Ruleset", ruleset_id))?;
        if ruleset.rules.iter().any(|r| r.code == rule.code) {
            return Err(GrcError::Conflict(format!(
                "Rule '{}' already exists in ruleset {}",
                rule.code, ruleset.code
            )));
        }
        ruleset.rules.push(rule.clone());
        ruleset.rules.sort_by_key(|r| r.priority);
        Ok(rule)
    }

    /// Flatten a profile into the lowercase-insensitive string context rules read.
    /// Lists are comma-joined; booleans are `"true"`/`"false"`.
    pub fn build_context(profile: &OrganizationProfile) -> BTreeMap<String, String> {
        let mut ctx = BTreeMap::new();
        let mut put = |k: &str, v: String| {
            ctx.insert(k.to_string(), v);
        };
        put("country", profile.country.clone());
        put("sector", profile.sector.clone());
        put("orgType", profile.org_type.clone());
        put("dataTypes", profile.data_types.join(","));
        put("hostingModel", profile.hosting_model.clone());
        put("organizationSize", profile.organization_size.clone());
        put("complianceMaturity", profile.compliance_maturity.clone());
        put("isRegulatedEntity", profile.is_regulated_entity.to_string());
        put("isCriticalInfrastructure", profile.is_critical_infrastructure.to_string());
        put("primaryRegulator", profile.primary_regulator.clone());
        put("secondaryRegulators", profile.secondary_regulators.join(","));
        put("regulatoryCertifications", profile.regulatory_certifications.join(","));
        put("industryLicenses", profile.industry_licenses.join(","));
        put("processesPersonalData", profile.processes_personal_data.to_string());
        put("processesSensitiveData", profile.processes_sensitive_data.to_string());
        put("hasDataCenterInKSA", profile.has_data_center_in_ksa.to_string());
        put("cloudProviders", profile.cloud_providers.join(","));
        put("dataSubjectCount", profile.data_subject_count.to_string());
        put("hasThirdPartyDataProcessing", profile.has_third_party_data_processing.to_string());
        put("vendorCount", profile.vendor_count.to_string());
        put("criticalVendorCount", profile.critical_vendor_count.to_string());
        put("thirdPartyRiskLevel", profile.third_party_risk_level.clone());
        put("isPubliclyTraded", profile.is_publicly_traded.to_string());
        put("isSubsidiary", profile.is_subsidiary.to_string());
        put("employeeCount", profile.employee_count.to_string());
        put("branchCount", profile.branch_count.to_string());
        ctx
    }

    /// Run a ruleset against a profile and record the execution log.
    pub fn evaluate(
        &self,
        ruleset: &Ruleset,
        tenant_id: Uuid,
        profile: &OrganizationProfile,
        executed_by: Option<Uuid>,
    ) -> GrcResult<RulesEvaluation> {
        let log_id = Uuid::new_v4();
        self.logs.insert(
            log_id,
            RuleExecutionLog {
                id: log_id,
                tenant_id,
                ruleset_id: ruleset.id,
                ruleset_version: ruleset.version,
                executed_by,
                status: ExecutionStatus::InProgress,
                matched_rules: Vec::new(),
                baselines: Vec::new(),
                packages: Vec::new(),
                templates: Vec::new(),
                tags: BTreeMap::new(),
                error_message: None,
                started_at: Utc::now(),
                completed_at: None,
            },
        );

        match Self::run(ruleset, profile) {
            Ok(mut evaluation) => {
                evaluation.execution_log_id = log_id;
                if let Some(mut log) = self.logs.get_mut(&log_id) {
                    log.status = ExecutionStatus::Completed;
                    log.matched_rules = evaluation.matched_rules.clone();
                    log.baselines = evaluation.baselines.clone();
                    log.packages = evaluation.packages.clone();
                    log.templates = evaluation.templates.clone();
                    log.tags = evaluation.tags.clone();
                    log.completed_at = Some(Utc::now());
                }
                info!(
                    tenant_id = %tenant_id,
                    ruleset = %ruleset.code,
                    matched = evaluation.matched_rules.len(),
                    baselines = evaluation.baselines.len(),
                    "Rules evaluated"
                );
                Ok(evaluation)
            }
            Err(e) => {
                if let Some(mut log) = self.logs.get_mut(&log_id) {
                    log.status = ExecutionStatus::Failed;
                    log.error_message = Some(e.to_string());
                    log.completed_at = Some(Utc::now());
                }
                error!(tenant_id = %tenant_id, error = %e, "Rules evaluation failed");
                Err(e)
            }
        }
    }

    fn run(ruleset: &Ruleset, profile: &OrganizationProfile) -> GrcResult<RulesEvaluation> {
        if ruleset.rules.iter().all(|r| !r.is_active) {
            return Err(GrcError::RulesEngine(format!(
                "Ruleset {} has no active rules",
                ruleset.code
            )));
        }
        let ctx = Self::build_context(profile);
        let mut rules: Vec<&Rule> = ruleset.rules.iter().filter(|r| r.is_active).collect();
        rules.sort_by_key(|r| r.priority);

        let mut out = RulesEvaluation {
            execution_log_id: Uuid::nil(),
            matched_rules: Vec::new(),
            baselines: Vec::new(),
            packages: Vec::new(),
            templates: Vec::new(),
            tags: BTreeMap::new(),
        };
        let push = |list: &mut Vec<String>, code: &str| {
            if !list.iter().any(|c| c == code) {
                list.push(code.to_string());
            }
        };

        for rule in rules {
            let Some(reasons) = condition_matches(&rule.condition, &ctx) else {
                continue;
            };
            for action in &rule.actions {
                match action {
                    RuleAction::ApplyBaseline { code } => push(&mut out.baselines, code),
                    RuleAction::ApplyPackage { code } => push(&mut out.packages, code),
                    RuleAction::ApplyTemplate { code } => push(&mut out.templates, code),
                    RuleAction::Tag { key, value } => {
                        out.tags.insert(key.clone(), value.clone());
                    }
                }
            }
            out.matched_rules.push(MatchedRule {
                code: rule.code.clone(),
                name: rule.name.clone(),
                priority: rule.priority,
                reasons,
            });
        }
        Ok(out)
    }

    pub fn execution_logs(&self, tenant_id: Uuid) -> Vec<RuleExecutionLog> {
        let mut logs: Vec<RuleExecutionLog> = self
            .logs
            .iter()
            .filter(|l| l.tenant_id == tenant_id)
            .map(|l| l.value().clone())
            .collect();
        logs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        logs
    }

    /// Enrich the tenant's profile from its in-scope assets, evaluate the
    /// active ruleset and replace the tenant's scope with the result.
    pub fn derive_and_persist_scope(
        &self,
        tenant_id: Uuid,
        user_id: Option<Uuid>,
    ) -> GrcResult<DerivedScope> {
        let ruleset = self
            .active_ruleset(tenant_id)
            .ok_or_else(|| GrcError::RulesEngine("No active ruleset found".into()))?;
        let assets = self.store.in_scope_assets(tenant_id);
        let profile = self
            .store
            .update_profile(tenant_id, |p| enrich_from_assets(p, &assets))
            .ok_or_else(|| {
                GrcError::Validation("Complete onboarding questionnaire first.".into())
            })?;

        let evaluation = self.evaluate(&ruleset, tenant_id, &profile, user_id)?;
        let now = Utc::now();
        let reason = serde_json::json!({
            "source": "RulesEngine",
            "execution_log_id": evaluation.execution_log_id,
        });
        let item = |kind: ScopeKind, code: &String| ScopeItem {
            id: Uuid::new_v4(),
            tenant_id,
            kind,
            code: code.clone(),
            applicability: "Required".to_string(),
            reason: reason.clone(),
            derived_at: now,
        };
        let items: Vec<ScopeItem> = evaluation
            .baselines
            .iter()
            .map(|c| item(ScopeKind::Baseline, c))
            .chain(evaluation.packages.iter().map(|c| item(ScopeKind::Package, c)))
            .chain(evaluation.templates.iter().map(|c| item(ScopeKind::Template, c)))
            .collect();

        self.store.replace_scope(tenant_id, items.clone());
        self.store.stamp_scope_derived(tenant_id, now);
        self.audit.log_action(
            tenant_id,
            user_id,
            "scope.derived",
            "scope",
            &tenant_id.to_string(),
            serde_json::json!({
                "execution_log_id": evaluation.execution_log_id,
                "baselines": evaluation.baselines,
                "packages": evaluation.packages,
            }),
            vec![],
        );
        metrics::counter!("grc.scope.derived").increment(1);

        Ok(DerivedScope {
            tenant_id,
            execution_log_id: evaluation.execution_log_id,
            baselines: evaluation.baselines,
            packages: evaluation.packages,
            templates: evaluation.templates,
            tags: evaluation.tags,
            matched_rules: evaluation.matched_rules,
            items,
            derived_at: now,
        })
    }

    /// Install and activate the platform-wide default derivation ruleset.
    pub fn seed_default_ruleset(&self) -> GrcResult<Ruleset> {
        let ruleset =
            self.create_ruleset(None, "DEFAULT_DERIVATION", "Default scope derivation rules");
        for rule in default_rules() {
            self.add_rule(ruleset.id, rule)?;
        }
        self.activate_ruleset(ruleset.id)
    }
}

/// Returns the matching reasons, or `None` when the condition fails.
fn condition_matches(
    condition: &RuleCondition,
    ctx: &BTreeMap<String, String>,
) -> Option<Vec<String>> {
    if condition.conditions.is_empty() {
        return Some(vec!["unconditional".to_string()]);
    }
    let hits: Vec<String> = condition
        .conditions
        .iter()
        .filter(|c| field_matches(c, ctx))
        .map(describe)
        .collect();
    let matched = match condition.kind {
        ConditionKind::And => hits.len() == condition.conditions.len(),
        ConditionKind::Or => !hits.is_empty(),
    };
    matched.then_some(hits)
}

fn field_matches(cond: &FieldCondition, ctx: &BTreeMap<String, String>) -> bool {
    let actual = ctx.get(&cond.field).map(|v| v.to_lowercase()).unwrap_or_default();
    let expected = cond.value.trim().to_lowercase();
    match cond.operator {
        Operator::Equals => actual == expected,
        Operator::NotEquals => actual != expected,
        Operator::Contains => !expected.is_empty() && actual.contains(&expected),
        Operator::In => {
            let candidates: Vec<String> = if cond.values.is_empty() {
                cond.value.split(',').map(|v| v.trim().to_lowercase()).collect()
            } else {
                cond.values.iter().map(|v| v.trim().to_lowercase()).collect()
            };
            candidates.iter().any(|c| !c.is_empty() && *c == actual)
        }
    }
}

fn describe(cond: &FieldCondition) -> String {
    let expected = if cond.values.is_empty() {
        cond.value.clone()
    } else {
        cond.values.join(",")
    };
    let op = match cond.operator {
        Operator::Equals => "equals",
        Operator::NotEquals => "not_equals",
        Operator::Contains => "contains",
        Operator::In => "in",
    };
    format!("{} {} {}", cond.field, op, expected)
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v.eq_ignore_ascii_case(value)) {
        list.push(value.to_string());
    }
}

/// Fold the asset register into the profile before evaluation.
pub fn enrich_from_assets(profile: &mut OrganizationProfile, assets: &[grc_core::types::Asset]) {
    if assets.is_empty() {
        return;
    }
    for asset in assets {
        for dt in &asset.data_types {
            push_unique(&mut profile.data_types, dt);
        }
        if let Some(provider) = &asset.cloud_provider {
            push_unique(&mut profile.cloud_providers, provider);
        }
    }

    if profile.hosting_model.trim().is_empty() {
        let cloud = assets.iter().any(|a| a.hosting_model == "Cloud");
        let on_prem = assets.iter().any(|a| a.hosting_model == "OnPremise");
        profile.hosting_model = match (cloud, on_prem) {
            (true, true) => "Hybrid",
            (true, false) => "Cloud",
            _ => "OnPremise",
        }
        .to_string();
    }

    if assets.iter().any(|a| a.criticality == AssetCriticality::T1) {
        profile.is_critical_infrastructure = true;
    }
    let holds = |kind: &str| {
        assets
            .iter()
            .any(|a| a.data_types.iter().any(|d| d.eq_ignore_ascii_case(kind)))
    };
    if assets.iter().any(|a| {
        matches!(
            a.data_classification,
            DataClassification::Restricted | DataClassification::Confidential
        )
    }) || holds("PCI")
        || holds("PHI")
    {
        profile.processes_sensitive_data = true;
    }
    if holds("PII") {
        profile.processes_personal_data = true;
    }
}

fn when(field: &str, operator: Operator, value: &str) -> FieldCondition {
    FieldCondition {
        field: field.to_string(),
        operator,
        value: value.to_string(),
        values: Vec::new(),
    }
}

fn rule(
    code: &str,
    name: &str,
    priority: i32,
    kind: ConditionKind,
    conditions: Vec<FieldCondition>,
    actions: Vec<RuleAction>,
) -> Rule {
    Rule {
        id: Uuid::new_v4(),
        code: code.to_string(),
        name: name.to_string(),
        description: String::new(),
        priority,
        is_active: true,
        condition: RuleCondition { kind, conditions },
        actions,
    }
}

fn baseline(code: &str) -> RuleAction {
    RuleAction::ApplyBaseline { code: code.to_string() }
}

fn package(code: &str) -> RuleAction {
    RuleAction::ApplyPackage { code: code.to_string() }
}

fn template(code: &str) -> RuleAction {
    RuleAction::ApplyTemplate { code: code.to_string() }
}

fn tag(key: &str, value: &str) -> RuleAction {
    RuleAction::Tag {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn default_rules() -> Vec<Rule> {
    use ConditionKind::{And, Or};
    use Operator::{Contains, Equals, In, NotEquals};

    vec![
        // Jurisdiction
        rule(
            "RULE_KSA_JURISDICTION",
            "Saudi Arabia Jurisdiction",
            1,
            And,
            vec![when("country", Equals, "SA")],
            vec![baseline("NCA_ECC"), tag("jurisdiction", "KSA")],
        ),
        rule(
            "RULE_GCC_JURISDICTION",
            "GCC Regional Jurisdiction",
            2,
            Or,
            vec![when("country", In, "SA,AE,BH,KW,OM,QA")],
            vec![tag("region", "GCC"), package("PKG_GCC_COMMON")],
        ),
        // Sectors
        rule(
            "RULE_SECTOR_BANKING",
            "Banking Sector",
            10,
            And,
            vec![when("sector", In, "Banking,Banks,Commercial Banking")],
            vec![
                baseline("SAMA_CSF"),
                baseline("NCA_ECC"),
                package("PKG_SAMA_CYBER"),
                tag("sama_regulated", "true"),
            ],
        ),
        rule(
            "RULE_SECTOR_INSURANCE",
            "Insurance Sector",
            11,
            And,
            vec![when("sector", In, "Insurance,Reinsurance")],
            vec![
                baseline("SAMA_CSF"),
                baseline("IA_REQUIREMENTS"),
                package("PKG_INSURANCE_CONTROLS"),
                tag("ia_regulated", "true"),
            ],
        ),
        rule(
            "RULE_SECTOR_FINTECH",
            "FinTech Sector",
            12,
            And,
            vec![when("sector", In, "FinTech,Financial Technology,Payment Services")],
            vec![
                baseline("SAMA_CSF"),
                baseline("NCA_ECC"),
                baseline("PDPL"),
                package("PKG_FINTECH_SANDBOX"),
                tag("sama_fintech", "true"),
            ],
        ),
        rule(
            "RULE_SECTOR_HEALTHCARE",
            "Healthcare Sector",
            13,
            And,
            vec![when("sector", In, "Healthcare,Hospital,Clinic,Medical,Pharmaceutical")],
            vec![
                baseline("MOH_REQUIREMENTS"),
                baseline("NCA_ECC"),
                baseline("PDPL"),
                package("PKG_HEALTH_DATA"),
                tag("moh_regulated", "true"),
            ],
        ),
        rule(
            "RULE_SECTOR_TELECOM",
            "Telecommunications Sector",
            14,
            And,
            vec![when("sector", In, "Telecom,Telecommunications,ISP,Mobile")],
            vec![
                baseline("CITC_REQUIREMENTS"),
                baseline("NCA_ECC"),
                baseline("NCA_CTCC"),
                tag("citc_regulated", "true"),
            ],
        ),
        rule(
            "RULE_SECTOR_ENERGY",
            "Energy Sector",
            15,
            And,
            vec![when("sector", In, "Energy,Oil,Gas,Petroleum,Electricity,Power")],
            vec![
                baseline("NCA_ECC"),
                baseline("NCA_CTCC"),
                package("PKG_CRITICAL_INFRA"),
                package("PKG_ICS_OT"),
                tag("critical_infrastructure", "true"),
            ],
        ),
        rule(
            "RULE_SECTOR_GOVERNMENT",
            "Government Sector",
            16,
            And,
            vec![when("sector", In, "Government,Public Sector,Ministry")],
            vec![
                baseline("NCA_ECC"),
                baseline("NCA_DCC"),
                baseline("PDPL"),
                package("PKG_GOVT_SECURITY"),
                tag("government", "true"),
            ],
        ),
        // Data
        rule(
            "RULE_DATA_PERSONAL",
            "Personal Data Processing",
            20,
            Or,
            vec![
                when("processesPersonalData", Equals, "true"),
                when("dataTypes", Contains, "personal"),
                when("dataTypes", Contains, "PII"),
            ],
            vec![
                baseline("PDPL"),
                package("PKG_DATA_PROTECTION"),
                template("TEMP_PDPL_ASSESSMENT"),
                tag("pdpl_scope", "true"),
            ],
        ),
        rule(
            "RULE_DATA_SENSITIVE",
            "Sensitive Personal Data",
            21,
            Or,
            vec![
                when("processesSensitiveData", Equals, "true"),
                when("dataTypes", Contains, "health"),
                when("dataTypes", Contains, "PHI"),
                when("dataTypes", Contains, "biometric"),
            ],
            vec![
                baseline("PDPL"),
                package("PKG_SENSITIVE_DATA"),
                package("PKG_ENHANCED_CONSENT"),
                tag("sensitive_data", "true"),
            ],
        ),
        rule(
            "RULE_DATA_FINANCIAL",
            "Payment Data Processing",
            22,
            Or,
            vec![
                when("dataTypes", Contains, "payment"),
                when("dataTypes", Contains, "PCI"),
                when("dataTypes", Contains, "credit card"),
            ],
            vec![baseline("PCI_DSS"), package("PKG_PAYMENT_SECURITY"), tag("pci_scope", "true")],
        ),
        // Infrastructure
        rule(
            "RULE_INFRA_CLOUD",
            "Cloud Hosting",
            30,
            Or,
            vec![when("hostingModel", In, "Cloud,Hybrid"), when("cloudProviders", NotEquals, "")],
            vec![baseline("NCA_CCC"), package("PKG_DATA_RESIDENCY"), tag("cloud", "true")],
        ),
        rule(
            "RULE_INFRA_CRITICAL",
            "Critical Infrastructure",
            31,
            Or,
            vec![when("isCriticalInfrastructure", Equals, "true")],
            vec![
                baseline("NCA_CTCC"),
                package("PKG_CRITICAL_INFRA"),
                package("PKG_INCIDENT_RESPONSE"),
                package("PKG_BCM"),
                tag("critical_infra", "true"),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use grc_core::types::Asset;

    fn engine() -> (RulesEngine, Arc<ManagementStore>) {
        let store = Arc::new(ManagementStore::new());
        let engine = RulesEngine::new(store.clone(), Arc::new(AuditLogger::new()));
        engine.seed_default_ruleset().unwrap();
        (engine, store)
    }

    fn asset(
        tenant_id: Uuid,
        criticality: AssetCriticality,
        hosting: &str,
        data_types: &[&str],
    ) -> Asset {
        Asset {
            id: Uuid::new_v4(),
            tenant_id,
            name: "asset".into(),
            asset_type: "Application".into(),
            criticality,
            data_classification: DataClassification::Internal,
            data_types: data_types.iter().map(|s| s.to_string()).collect(),
            hosting_model: hosting.into(),
            cloud_provider: None,
            owner_id: None,
            is_in_scope: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_build_context_keys() {
        let mut profile = OrganizationProfile::new(Uuid::new_v4(), "SA");
        profile.data_types = vec!["PII".into(), "payment".into()];
        profile.processes_personal_data = true;

        let ctx = RulesEngine::build_context(&profile);
        assert_eq!(ctx.len(), 26);
        assert_eq!(ctx["country"], "SA");
        assert_eq!(ctx["dataTypes"], "PII,payment");
        assert_eq!(ctx["processesPersonalData"], "true");
        assert_eq!(ctx["hasDataCenterInKSA"], "false");
    }

    #[test]
    fn test_operators() {
        let mut ctx = BTreeMap::new();
        ctx.insert("sector".to_string(), "Banking".to_string());
        ctx.insert("dataTypes".to_string(), "PII,financial".to_string());

        assert!(field_matches(&when("sector", Operator::Equals, "banking"), &ctx));
        assert!(field_matches(&when("sector", Operator::NotEquals, "Energy"), &ctx));
        assert!(field_matches(&when("dataTypes", Operator::Contains, "pii"), &ctx));
        assert!(field_matches(&when("sector", Operator::In, "Insurance, Banking"), &ctx));

        let explicit = FieldCondition {
            field: "sector".into(),
            operator: Operator::In,
            value: "Banking".into(),
            values: vec!["Energy".into()],
        };
        // `values` wins over the comma string when present.
        assert!(!field_matches(&explicit, &ctx));

        // Missing fields compare as empty.
        assert!(!field_matches(&when("orgType", Operator::Equals, "bank"), &ctx));
    }

    #[test]
    fn test_evaluate_saudi_bank() {
        let (engine, _) = engine();
        let tenant = Uuid::new_v4();
        let mut profile = OrganizationProfile::new(tenant, "SA");
        profile.sector = "Banking".into();
        profile.data_types = vec!["PII".into()];

        let ruleset = engine.active_ruleset(tenant).unwrap();
        let result = engine.evaluate(&ruleset, tenant, &profile, None).unwrap();

        assert_eq!(result.baselines, vec!["NCA_ECC", "SAMA_CSF", "PDPL"]);
        assert!(result.packages.contains(&"PKG_GCC_COMMON".to_string()));
        assert_eq!(result.templates, vec!["TEMP_PDPL_ASSESSMENT"]);
        assert_eq!(result.tags["jurisdiction"], "KSA");
        assert_eq!(result.matched_rules[0].code, "RULE_KSA_JURISDICTION");
        assert_eq!(result.matched_rules[0].reasons, vec!["country equals SA"]);

        let logs = engine.execution_logs(tenant);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, ExecutionStatus::Completed);
        assert_eq!(logs[0].id, result.execution_log_id);
    }

    #[test]
    fn test_failed_execution_is_logged() {
        let (engine, _) = engine();
        let tenant = Uuid::new_v4();
        let empty = engine.create_ruleset(Some(tenant), "EMPTY", "Empty");
        let profile = OrganizationProfile::new(tenant, "SA");

        assert!(engine.evaluate(&empty, tenant, &profile, None).is_err());
        let logs = engine.execution_logs(tenant);
        assert_eq!(logs[0].status, ExecutionStatus::Failed);
        assert!(logs[0].error_message.is_some());
    }

    #[test]
    fn test_malformed_rule_rejected() {
        let (engine, _) = engine();
        let ruleset = engine.create_ruleset(None, "CUSTOM", "Custom");

        let bad = serde_json::json!({
            "code": "R1", "name": "bad", "priority": 1,
            "condition": {"type": "xor", "conditions": []},
            "actions": []
        });
        assert!(matches!(
            engine.add_rule_json(ruleset.id, bad),
            Err(GrcError::Validation(_))
        ));

        let good = serde_json::json!({
            "code": "R2", "name": "uae", "priority": 1,
            "condition": {"type": "and", "conditions": [
                {"field": "country", "operator": "in", "values": ["AE"]}
            ]},
            "actions": [{"action": "apply_baseline", "code": "UAE_IA"}]
        });
        let rule = engine.add_rule_json(ruleset.id, good.clone()).unwrap();
        assert_eq!(rule.actions, vec![baseline("UAE_IA")]);
        assert!(matches!(
            engine.add_rule_json(ruleset.id, good),
            Err(GrcError::Conflict(_))
        ));
    }

    #[test]
    fn test_enrich_from_assets() {
        let tenant = Uuid::new_v4();
        let mut profile = OrganizationProfile::new(tenant, "SA");
        let mut db = asset(tenant, AssetCriticality::T1, "OnPremise", &["PCI"]);
        db.data_classification = DataClassification::Restricted;
        let mut app = asset(tenant, AssetCriticality::T3, "Cloud", &["PII"]);
        app.cloud_provider = Some("Azure".into());

        enrich_from_assets(&mut profile, &[db, app]);

        assert_eq!(profile.hosting_model, "Hybrid");
        assert_eq!(profile.data_types, vec!["PCI", "PII"]);
        assert_eq!(profile.cloud_providers, vec!["Azure"]);
        assert!(profile.is_critical_infrastructure);
        assert!(profile.processes_sensitive_data);
        assert!(profile.processes_personal_data);
    }

    #[test]
    fn test_derive_and_persist_scope() {
        let (engine, store) = engine();
        let tenant = Uuid::new_v4();

        let err = engine.derive_and_persist_scope(tenant, None).unwrap_err();
        assert!(err.to_string().contains("Complete onboarding questionnaire first."));

        store.save_profile(OrganizationProfile::new(tenant, "SA"));
        let first = engine.derive_and_persist_scope(tenant, None).unwrap();
        assert_eq!(first.baselines, vec!["NCA_ECC"]);
        assert!(store.get_profile(tenant).unwrap().last_scope_derived_at.is_some());

        // Re-deriving replaces rather than appends.
        store
            .merge_profile_answers(tenant, "SA", &serde_json::json!({"sector": "Healthcare"}))
            .unwrap();
        let second = engine.derive_and_persist_scope(tenant, None).unwrap();
        let scope = store.scope(tenant);
        assert_eq!(scope.len(), second.items.len());
        assert!(store
            .scope_codes(tenant, ScopeKind::Baseline)
            .contains(&"MOH_REQUIREMENTS".to_string()));
        assert!(scope.iter().all(|i| i.applicability == "Required"
            && i.reason["source"] == "RulesEngine"
            && i.reason["execution_log_id"] == serde_json::json!(second.execution_log_id)));
    }
}
