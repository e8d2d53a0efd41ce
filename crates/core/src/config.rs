use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `GRC_PLATFORM__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default = "default_seed_demo_data")]
    pub seed_demo_data: bool,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub onboarding: OnboardingConfig,
    #[serde(default)]
    pub evidence: EvidenceConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
    #[serde(default = "default_api_key_ttl_days")]
    pub api_key_ttl_days: i64,
}

// Default functions
fn default_node_id() -> String {
    "grc-node-01".to_string()
}
fn default_seed_demo_data() -> bool {
    true
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_session_ttl_hours() -> i64 {
    8
}
fn default_api_key_ttl_days() -> i64 {
    365
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: default_session_ttl_hours(),
            api_key_ttl_days: default_api_key_ttl_days(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            seed_demo_data: default_seed_demo_data(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            auth: AuthConfig::default(),
            onboarding: OnboardingConfig::default(),
            evidence: EvidenceConfig::default(),
            policy: PolicyConfig::default(),
        }
    }
}

// ─── Onboarding Config ──────────────────────────────────────────────────────

/// Operating defaults stamped onto a tenant when its onboarding wizard completes.
#[derive(Debug, Clone, Deserialize)]
pub struct OnboardingConfig {
    #[serde(default = "default_country")]
    pub default_country: String,
    #[serde(default = "default_escalation_days_overdue")]
    pub escalation_days_overdue: i64,
    #[serde(default = "default_evidence_sla_submit_days")]
    pub evidence_sla_submit_days: i64,
    #[serde(default)]
    pub remediation_sla_days: RemediationSla,
    #[serde(default = "default_exception_expiry_days")]
    pub exception_expiry_days: i64,
    #[serde(default = "default_evidence_retention_years")]
    pub evidence_retention_years: u32,
    #[serde(default = "default_evidence_naming_pattern")]
    pub evidence_naming_pattern: String,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, PartialEq, Eq)]
pub struct RemediationSla {
    #[serde(default = "default_sla_critical")]
    pub critical: i64,
    #[serde(default = "default_sla_high")]
    pub high: i64,
    #[serde(default = "default_sla_medium")]
    pub medium: i64,
    #[serde(default = "default_sla_low")]
    pub low: i64,
}

fn default_country() -> String { "SA".to_string() }
fn default_escalation_days_overdue() -> i64 { 3 }
fn default_evidence_sla_submit_days() -> i64 { 5 }
fn default_exception_expiry_days() -> i64 { 90 }
fn default_evidence_retention_years() -> u32 { 7 }
fn default_evidence_naming_pattern() -> String {
    "{TenantId}-{ControlId}-{Date}-{Sequence}".to_string()
}
fn default_sla_critical() -> i64 { 7 }
fn default_sla_high() -> i64 { 14 }
fn default_sla_medium() -> i64 { 30 }
fn default_sla_low() -> i64 { 60 }

impl Default for RemediationSla {
    fn default() -> Self {
        Self {
            critical: default_sla_critical(),
            high: default_sla_high(),
            medium: default_sla_medium(),
            low: default_sla_low(),
        }
    }
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            default_country: default_country(),
            escalation_days_overdue: default_escalation_days_overdue(),
            evidence_sla_submit_days: default_evidence_sla_submit_days(),
            remediation_sla_days: RemediationSla::default(),
            exception_expiry_days: default_exception_expiry_days(),
            evidence_retention_years: default_evidence_retention_years(),
            evidence_naming_pattern: default_evidence_naming_pattern(),
        }
    }
}

// ─── Evidence Config ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct EvidenceConfig {
    #[serde(default = "default_pass_score")]
    pub pass_score: u8,
    #[serde(default = "default_compliant_threshold")]
    pub compliant_threshold: f64,
    #[serde(default = "default_partial_threshold")]
    pub partial_threshold: f64,
}

fn default_pass_score() -> u8 { 70 }
fn default_compliant_threshold() -> f64 { 90.0 }
fn default_partial_threshold() -> f64 { 70.0 }

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            pass_score: default_pass_score(),
            compliant_threshold: default_compliant_threshold(),
            partial_threshold: default_partial_threshold(),
        }
    }
}

// ─── Policy Config ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_short_circuit")]
    pub short_circuit: bool,
    /// One of `deny_overrides`, `allow_overrides`, `highest_priority_wins`.
    #[serde(default = "default_conflict_strategy")]
    pub conflict_strategy: String,
}

fn default_short_circuit() -> bool { true }
fn default_conflict_strategy() -> String { "deny_overrides".to_string() }

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            short_circuit: default_short_circuit(),
            conflict_strategy: default_conflict_strategy(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("GRC_PLATFORM")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.api.http_port, 8080);
        assert_eq!(config.auth.session_ttl_hours, 8);
        assert_eq!(config.onboarding.default_country, "SA");
        assert_eq!(config.onboarding.remediation_sla_days.critical, 7);
        assert_eq!(config.onboarding.remediation_sla_days.low, 60);
        assert_eq!(config.evidence.pass_score, 70);
        assert_eq!(config.policy.conflict_strategy, "deny_overrides");
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config: AppConfig =
            serde_json::from_value(serde_json::json!({ "api": { "http_port": 9000 } })).unwrap();
        assert_eq!(config.api.http_port, 9000);
        assert_eq!(config.api.host, "0.0.0.0");
        assert_eq!(config.onboarding.exception_expiry_days, 90);
    }
}
