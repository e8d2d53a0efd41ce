//! Declarative policy enforcement over JSON resource documents.
//!
//! A [`PolicyDocument`] carries prioritized rules with `when` clauses over
//! dot-paths into the resource (e.g. `metadata.labels.dataClassification`).
//! Rules may allow, deny, or mutate the working resource; time-boxed
//! exceptions waive named rules, and a conflict strategy resolves the final
//! decision when several rules fire.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use grc_core::config::PolicyConfig;
use grc_core::error::{GrcError, GrcResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use tracing::{info, warn};
use uuid::Uuid;

// ─── Document model ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Allow,
    Deny,
    Mutate,
}

impl Effect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::Allow => "allow",
            Effect::Deny => "deny",
            Effect::Mutate => "mutate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    #[serde(alias = "denyOverrides")]
    DenyOverrides,
    #[serde(alias = "allowOverrides")]
    AllowOverrides,
    #[serde(alias = "highestPriorityWins")]
    HighestPriorityWins,
}

impl FromStr for ConflictStrategy {
    type Err = GrcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "").as_str() {
            "denyoverrides" => Ok(ConflictStrategy::DenyOverrides),
            "allowoverrides" => Ok(ConflictStrategy::AllowOverrides),
            "highestprioritywins" => Ok(ConflictStrategy::HighestPriorityWins),
            other => Err(GrcError::Config(format!("unknown conflict strategy '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl Severity {
    pub fn weight(&self) -> u8 {
        match self {
            Severity::Critical => 4,
            Severity::High => 3,
            Severity::Medium => 2,
            Severity::Low => 1,
        }
    }
}

/// Resource types and environments a document applies to. Empty, `*` or
/// `Any` match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyTarget {
    #[serde(default)]
    pub resource_types: Vec<String>,
    #[serde(default)]
    pub environments: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrincipalMatch {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleMatch {
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub principal: Option<PrincipalMatch>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOp {
    Exists,
    Equals,
    #[serde(alias = "notEquals")]
    NotEquals,
    In,
    #[serde(alias = "notIn")]
    NotIn,
    Matches,
    #[serde(alias = "notMatches")]
    NotMatches,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub op: ConditionOp,
    pub path: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mutation {
    pub path: String,
    pub value: Value,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    pub id: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, rename = "match")]
    pub match_on: RuleMatch,
    #[serde(default)]
    pub when: Vec<Condition>,
    pub effect: Effect,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub remediation_hint: Option<String>,
    #[serde(default)]
    pub mutations: Vec<Mutation>,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyException {
    pub id: String,
    pub rule_ids: Vec<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "match")]
    pub match_on: RuleMatch,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExecutionOptions {
    pub short_circuit: bool,
    pub conflict_strategy: ConflictStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDocument {
    pub name: String,
    pub default_effect: Effect,
    #[serde(default)]
    pub target: PolicyTarget,
    pub rules: Vec<PolicyRule>,
    #[serde(default)]
    pub exceptions: Vec<PolicyException>,
    /// Falls back to the enforcer's configured defaults when absent.
    #[serde(default)]
    pub execution: Option<ExecutionOptions>,
}

// ─── Evaluation model ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Principal {
    pub id: Option<Uuid>,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Everything a policy can look at for one decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyContext {
    pub action: String,
    pub resource_type: String,
    #[serde(default = "default_environment")]
    pub environment: String,
    pub resource: Value,
    #[serde(default)]
    pub principal: Principal,
}

fn default_environment() -> String {
    "production".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub rule_id: String,
    pub effect: Effect,
    pub severity: Severity,
    pub message: String,
    pub remediation_hint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDecision {
    /// `Allow` or `Deny`; mutations never decide.
    pub effect: Effect,
    pub policy: Option<String>,
    pub deciding_rule: Option<String>,
    pub message: Option<String>,
    pub remediation_hint: Option<String>,
    pub matched_rules: Vec<RuleOutcome>,
    pub waived_rules: Vec<String>,
    /// Resource after all applicable mutations.
    pub resource: Value,
    pub evaluated_at: DateTime<Utc>,
}

impl PolicyDecision {
    pub fn is_allowed(&self) -> bool {
        self.effect != Effect::Deny
    }

    fn default_for(effect: Effect, policy: Option<String>, resource: Value) -> Self {
        Self {
            effect: if effect == Effect::Deny { Effect::Deny } else { Effect::Allow },
            policy,
            deciding_rule: None,
            message: None,
            remediation_hint: None,
            matched_rules: Vec::new(),
            waived_rules: Vec::new(),
            resource,
            evaluated_at: Utc::now(),
        }
    }
}

// ─── Enforcer ───────────────────────────────────────────────────────────────

/// Holds loaded policy documents and evaluates contexts against them.
pub struct PolicyEnforcer {
    policies: DashMap<String, PolicyDocument>,
    patterns: DashMap<String, Regex>,
    defaults: ExecutionOptions,
}

impl Default for PolicyEnforcer {
    fn default() -> Self {
        Self::new(&PolicyConfig::default())
    }
}

impl PolicyEnforcer {
    pub fn new(config: &PolicyConfig) -> Self {
        let conflict_strategy = config.conflict_strategy.parse().unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to deny_overrides");
            ConflictStrategy::DenyOverrides
        });
        Self {
            policies: DashMap::new(),
            patterns: DashMap::new(),
            defaults: ExecutionOptions {
                short_circuit: config.short_circuit,
                conflict_strategy,
            },
        }
    }

    /// Validate and register a policy document, replacing any with the same name.
    pub fn add_policy(&self, doc: PolicyDocument) -> GrcResult<()> {
        if doc.name.trim().is_empty() {
            return Err(GrcError::Validation("policy name is required".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for rule in &doc.rules {
            if !seen.insert(rule.id.as_str()) {
                return Err(GrcError::Validation(format!(
                    "duplicate rule id '{}' in policy '{}'",
                    rule.id, doc.name
                )));
            }
            for cond in &rule.when {
                if matches!(cond.op, ConditionOp::Matches | ConditionOp::NotMatches) {
                    let pattern = cond.value.as_str().ok_or_else(|| {
                        GrcError::Validation(format!(
                            "rule '{}': pattern must be a string",
                            rule.id
                        ))
                    })?;
                    self.compile(pattern).map_err(|e| {
                        GrcError::Validation(format!("rule '{}': invalid pattern: {e}", rule.id))
                    })?;
                }
                if matches!(cond.op, ConditionOp::In | ConditionOp::NotIn)
                    && !cond.value.is_array()
                {
                    return Err(GrcError::Validation(format!(
                        "rule '{}': '{:?}' needs an array value",
                        rule.id, cond.op
                    )));
                }
            }
        }
        info!(policy = %doc.name, rules = doc.rules.len(), "Policy loaded");
        self.policies.insert(doc.name.clone(), doc);
        Ok(())
    }

    pub fn remove_policy(&self, name: &str) -> bool {
        self.policies.remove(name).is_some()
    }

    pub fn list_policies(&self) -> Vec<PolicyDocument> {
        let mut docs: Vec<PolicyDocument> =
            self.policies.iter().map(|p| p.value().clone()).collect();
        docs.sort_by(|a, b| a.name.cmp(&b.name));
        docs
    }

    fn compile(&self, pattern: &str) -> Result<Regex, regex::Error> {
        if let Some(re) = self.patterns.get(pattern) {
            return Ok(re.value().clone());
        }
        let re = Regex::new(pattern)?;
        self.patterns.insert(pattern.to_string(), re.clone());
        Ok(re)
    }

    /// Evaluate a context against every loaded policy. The first denying
    /// policy decides; otherwise the last allow carries the mutated resource.
    pub fn evaluate(&self, ctx: &PolicyContext) -> PolicyDecision {
        let mut docs = self.list_policies();
        docs.retain(|d| target_applies(&d.target, ctx));

        let mut working = ctx.clone();
        let mut outcome = PolicyDecision::default_for(Effect::Allow, None, ctx.resource.clone());
        for doc in &docs {
            let decision = self.evaluate_document(doc, &working, Utc::now());
            working.resource = decision.resource.clone();
            let denied = !decision.is_allowed();
            outcome = decision;
            if denied {
                break;
            }
        }

        metrics::counter!(
            "grc.policy.decisions",
            "resource" => ctx.resource_type.clone(),
            "effect" => outcome.effect.as_str()
        )
        .increment(1);
        outcome
    }

    /// Evaluate and turn a deny into a `PolicyViolation` error.
    pub fn enforce(&self, ctx: &PolicyContext) -> GrcResult<PolicyDecision> {
        let decision = self.evaluate(ctx);
        if decision.is_allowed() {
            return Ok(decision);
        }
        warn!(
            action = %ctx.action,
            resource = %ctx.resource_type,
            rule = ?decision.deciding_rule,
            "Policy denied action"
        );
        Err(GrcError::PolicyViolation {
            rule_id: decision.deciding_rule.clone().unwrap_or_else(|| "default".into()),
            message: decision
                .message
                .clone()
                .unwrap_or_else(|| "Denied by policy default".into()),
            remediation_hint: decision.remediation_hint.clone(),
        })
    }

    /// Evaluate one document at instant `now`.
    pub fn evaluate_document(
        &self,
        doc: &PolicyDocument,
        ctx: &PolicyContext,
        now: DateTime<Utc>,
    ) -> PolicyDecision {
        let mut resource = ctx.resource.clone();
        if !target_applies(&doc.target, ctx) {
            return PolicyDecision::default_for(
                doc.default_effect,
                Some(doc.name.clone()),
                resource,
            );
        }
        let execution = doc.execution.unwrap_or(self.defaults);

        let waived: Vec<String> = doc
            .exceptions
            .iter()
            .filter(
                |ex| ex.expires_at.map_or(true, |exp| exp > now) && rule_matches(&ex.match_on,
                ctx),
            )
            .flat_map(|ex| ex.rule_ids.iter().cloned())
            .collect();

        let mut rules: Vec<&PolicyRule> = doc
            .rules
            .iter()
            .filter(|r| r.enabled && rule_matches(&r.match_on, ctx) && !waived.contains(&r.id))
            .collect();
        rules.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));

        let mut matched: Vec<RuleOutcome> = Vec::new();
        for rule in rules {
            if !rule.when.iter().all(|c| self.condition_holds(c, &resource)) {
                continue;
            }
            let outcome = RuleOutcome {
                rule_id: rule.id.clone(),
                effect: rule.effect,
                severity: rule.severity,
                message: rule.message.clone(),
                remediation_hint: rule.remediation_hint.clone(),
            };
            match rule.effect {
                Effect::Mutate => {
                    for m in &rule.mutations {
                        set_path(&mut resource, &m.path, m.value.clone());
                    }
                    matched.push(outcome);
                }
                Effect::Deny => {
                    matched.push(outcome);
                    if execution.short_circuit {
                        break;
                    }
                }
                Effect::Allow => matched.push(outcome),
            }
        }

        let decisive: Vec<&RuleOutcome> =
            matched.iter().filter(|o| o.effect != Effect::Mutate).collect();
        let winner = resolve_conflict(&decisive, execution.conflict_strategy).cloned();

        let mut decision = match winner {
            None => {
                PolicyDecision::default_for(doc.default_effect, Some(doc.name.clone()), resource)
            }
            Some(w) => PolicyDecision {
                effect: w.effect,
                policy: Some(doc.name.clone()),
                deciding_rule: Some(w.rule_id.clone()),
                message: Some(w.message.clone()),
                remediation_hint: w.remediation_hint.clone(),
                matched_rules: Vec::new(),
                waived_rules: Vec::new(),
                resource,
                evaluated_at: Utc::now(),
            },
        };
        decision.matched_rules = matched;
        decision.waived_rules = waived;
        decision
    }

    fn condition_holds(&self, cond: &Condition, resource: &Value) -> bool {
        let actual = resolve_path(resource, &cond.path).filter(|v| !v.is_null());
        match cond.op {
            ConditionOp::Exists => {
                let want = cond.value.as_bool().unwrap_or(true);
                actual.is_some() == want
            }
            ConditionOp::Equals => actual.map_or(false, |a| loosely_equal(a, &cond.value)),
            ConditionOp::NotEquals => !actual.map_or(false, |a| loosely_equal(a, &cond.value)),
            ConditionOp::In => actual.map_or(false, |a| in_list(a, &cond.value)),
            ConditionOp::NotIn => !actual.map_or(false, |a| in_list(a, &cond.value)),
            ConditionOp::Matches => actual.map_or(false, |a| self.pattern_matches(&cond.value, a)),
            ConditionOp::NotMatches => {
                !actual.map_or(false, |a| self.pattern_matches(&cond.value, a))
            }
        }
    }

    fn pattern_matches(&self, pattern: &Value, actual: &Value) -> bool {
        let (Some(pattern), Some(text)) = (pattern.as_str(), as_text(actual)) else {
            return false;
        };
        match self.compile(pattern) {
            Ok(re) => re.is_match(&text),
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "Ignoring invalid policy pattern");
                false
            }
        }
    }

    /// Load the built-in baseline guardrails.
    pub fn load_baseline(&self) -> GrcResult<()> {
        self.add_policy(baseline_policy())
    }
}

fn resolve_conflict<'a>(
    decisions: &[&'a RuleOutcome],
    strategy: ConflictStrategy,
) -> Option<&'a RuleOutcome> {
    let first_with = |effect: Effect| decisions.iter().copied().find(|d| d.effect == effect);
    match strategy {
        ConflictStrategy::DenyOverrides => {
            first_with(Effect::Deny).or_else(|| first_with(Effect::Allow))
        }
        ConflictStrategy::AllowOverrides => {
            first_with(Effect::Allow).or_else(|| first_with(Effect::Deny))
        }
        ConflictStrategy::HighestPriorityWins => {
            let mut best: Option<&RuleOutcome> = None;
            for d in decisions.iter().copied() {
                if best.map_or(true, |b| d.severity.weight() > b.severity.weight()) {
                    best = Some(d);
                }
            }
            best
        }
    }
}

fn wildcard(value: &str) -> bool {
    value == "*" || value.eq_ignore_ascii_case("any")
}

fn list_applies(list: &[String], actual: &str) -> bool {
    list.is_empty() || list.iter().any(|v| wildcard(v) || v.eq_ignore_ascii_case(actual))
}

fn target_applies(target: &PolicyTarget, ctx: &PolicyContext) -> bool {
    list_applies(&target.resource_types, &ctx.resource_type)
        && list_applies(&target.environments, &ctx.environment)
}

fn rule_matches(m: &RuleMatch, ctx: &PolicyContext) -> bool {
    let single = |v: &Option<String>, actual: &str| {
        v.as_deref().map_or(true, |v| wildcard(v) || v.eq_ignore_ascii_case(actual))
    };
    if !single(&m.resource_type, &ctx.resource_type) || !single(&m.environment, &ctx.environment) {
        return false;
    }
    if !list_applies(&m.actions, &ctx.action) {
        return false;
    }
    if let Some(p) = &m.principal {
        if p.id.is_some() && p.id != ctx.principal.id {
            return false;
        }
        if !p.roles.is_empty()
            && !p
                .roles
                .iter()
                .any(|r| ctx.principal.roles.iter().any(|pr| pr.eq_ignore_ascii_case(r)))
        {
            return false;
        }
    }
    true
}

/// Resolve a dot path (`metadata.labels.owner`, `items.0.id`). A leading
/// `resource.` segment is accepted and ignored.
pub fn resolve_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.strip_prefix("resource.").unwrap_or(path);
    if path.is_empty() {
        return Some(root);
    }
    path.split('.').try_fold(root, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Set a value at a dot path, creating intermediate objects.
pub fn set_path(root: &mut Value, path: &str, value: Value) {
    let path = path.strip_prefix("resource.").unwrap_or(path);
    let mut current = root;
    let segments: Vec<&str> = path.split('.').collect();
    for (i, segment) in segments.iter().enumerate() {
        if !current.is_object() {
            *current = Value::Object(serde_json::Map::new());
        }
        let Value::Object(map) = current else {
            return;
        };
        if i == segments.len() - 1 {
            map.insert(segment.to_string(), value);
            return;
        }
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
}

fn as_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (as_text(a), as_text(b)) {
        (Some(x), Some(y)) => x.eq_ignore_ascii_case(&y),
        _ => false,
    }
}

fn in_list(actual: &Value, list: &Value) -> bool {
    list.as_array()
        .map_or(false, |items| items.iter().any(|item| loosely_equal(actual, item)))
}

/// Guardrails every tenant gets: default classification, owner for
/// restricted data, approval before publishing, approved evidence is immutable.
pub fn baseline_policy() -> PolicyDocument {
    let rule = |id: &str, priority: i32, m: RuleMatch, when: Vec<Condition>, effect: Effect| {
        PolicyRule {
            id: id.to_string(),
            priority,
            enabled: true,
            match_on: m,
            when,
            effect,
            severity: Severity::High,
            message: String::new(),
            remediation_hint: None,
            mutations: Vec::new(),
            metadata: Value::Null,
        }
    };
    let cond = |op: ConditionOp, path: &str, value: Value| Condition {
        op,
        path: path.to_string(),
        value,
    };

    let mut default_classification = rule(
        "BASE-001-DEFAULT-CLASSIFICATION",
        0,
        RuleMatch::default(),
        vec![cond(ConditionOp::Exists, "metadata.labels.dataClassification", Value::Bool(false))],
        Effect::Mutate,
    );
    default_classification.severity = Severity::Low;
    default_classification.message = "Unlabelled resources default to internal".into();
    default_classification.mutations = vec![Mutation {
        path: "metadata.labels.dataClassification".into(),
        value: Value::String("internal".into()),
    }];

    let mut restricted_owner = rule(
        "BASE-010-RESTRICTED-OWNER",
        10,
        RuleMatch::default(),
        vec![
            cond(
                ConditionOp::In,
                "metadata.labels.dataClassification",
                serde_json::json!(["restricted", "confidential"]),
            ),
            cond(ConditionOp::Exists, "metadata.owner", Value::Bool(false)),
        ],
        Effect::Deny,
    );
    restricted_owner.message =
        "Restricted or confidential data must have an accountable owner".into();
    restricted_owner.remediation_hint = Some("Assign an owner before saving this resource".into());

    let mut publish_approval = rule(
        "BASE-020-PUBLISH-APPROVAL",
        20,
        RuleMatch {
            actions: vec!["publish".into()],
            ..RuleMatch::default()
        },
        vec![cond(ConditionOp::Exists, "metadata.approvedBy", Value::Bool(false))],
        Effect::Deny,
    );
    publish_approval.message = "Documents must be approved before publishing".into();
    publish_approval.remediation_hint = Some("Route the document through approval first".into());

    let mut approved_evidence = rule(
        "BASE-030-APPROVED-EVIDENCE-IMMUTABLE",
        30,
        RuleMatch {
            resource_type: Some("Evidence".into()),
            actions: vec!["delete".into()],
            ..RuleMatch::default()
        },
        vec![cond(ConditionOp::Equals, "status", Value::String("approved".into()))],
        Effect::Deny,
    );
    approved_evidence.severity = Severity::Critical;
    approved_evidence.message = "Approved evidence cannot be deleted".into();
    approved_evidence.remediation_hint = Some("Archive the evidence instead".into());

    PolicyDocument {
        name: "baseline".into(),
        default_effect: Effect::Allow,
        target: PolicyTarget::default(),
        rules: vec![default_classification, restricted_owner, publish_approval, approved_evidence],
        exceptions: Vec::new(),
        execution: None,
    }
}
