//! Risk register: scoring, acceptance, control mapping, heat map and posture.

use crate::assessments::Assessment;
use crate::controls::ControlService;
use crate::models::{CreateRiskRequest, UpdateRiskRequest};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use grc_core::error::{GrcError, GrcResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const MAX_GAP_RISKS: usize = 10;
const GAP_SCORE_THRESHOLD: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: u8) -> Self {
        match score {
            20.. => RiskLevel::Critical,
            12..=19 => RiskLevel::High,
            6..=11 => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskStatus {
    Identified,
    Active,
    Mitigated,
    Accepted,
    Closed,
}

impl RiskStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, RiskStatus::Identified | RiskStatus::Active)
    }

    /// Moves allowed through a plain update. Acceptance and mitigation have
    /// their own operations and are never reached this way.
    pub fn can_update_to(&self, to: RiskStatus) -> bool {
        use RiskStatus::*;
        matches!(
            (self, to),
            (Identified, Active)
                | (Identified, Closed)
                | (Active, Identified)
                | (Active, Closed)
                | (Mitigated, Active)
                | (Mitigated, Closed)
                | (Accepted, Active)
                | (Accepted, Closed)
                | (Closed, Active)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MappingStrength {
    Strong,
    Moderate,
    Weak,
}

impl MappingStrength {
    pub fn from_effectiveness(expected: u8) -> Self {
        match expected {
            80.. => MappingStrength::Strong,
            50..=79 => MappingStrength::Moderate,
            _ => MappingStrength::Weak,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Risk {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub likelihood: u8,
    pub impact: u8,
    pub inherent_score: u8,
    pub residual_score: f64,
    /// Weighted effectiveness of linked controls, 0-100.
    pub control_effectiveness: f64,
    pub level: RiskLevel,
    pub status: RiskStatus,
    pub owner_id: Option<Uuid>,
    pub accepted_by: Option<Uuid>,
    pub acceptance_justification: Option<String>,
    pub source_assessment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Risk {
    fn rescore(&mut self) {
        self.inherent_score = self.likelihood * self.impact;
        self.level = RiskLevel::from_score(self.inherent_score);
        self.residual_score =
            round2(f64::from(self.inherent_score) * (1.0 - self.control_effectiveness / 100.0));
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskControlLink {
    pub risk_id: Uuid,
    pub control_id: Uuid,
    pub expected_effectiveness: u8,
    pub strength: MappingStrength,
    pub linked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RiskFilter {
    pub status: Option<RiskStatus>,
    pub category: Option<String>,
    pub level: Option<RiskLevel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatMapCell {
    pub likelihood: u8,
    pub impact: u8,
    pub count: usize,
    pub top_risks: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatMap {
    pub tenant_id: Uuid,
    /// 25 cells, likelihood-major.
    pub cells: Vec<HeatMapCell>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskPosture {
    pub total: usize,
    pub open: usize,
    pub accepted: usize,
    pub mitigated: usize,
    pub average_inherent_score: f64,
    pub average_residual_score: f64,
    pub by_level: BTreeMap<String, usize>,
}

/// Dashboard buckets on the inherent score.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskStatistics {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub open: usize,
}

pub struct RiskService {
    risks: DashMap<Uuid, Risk>,
    /// risk_id -> linked controls
    links: DashMap<Uuid, Vec<RiskControlLink>>,
    controls: Arc<ControlService>,
}

impl RiskService {
    pub fn new(controls: Arc<ControlService>) -> Self {
        Self {
            risks: DashMap::new(),
            links: DashMap::new(),
            controls,
        }
    }

    pub fn create(&self, tenant_id: Uuid, req: CreateRiskRequest) -> GrcResult<Risk> {
        validate_scale("likelihood", req.likelihood)?;
        validate_scale("impact", req.impact)?;
        if req.title.trim().is_empty() {
            return Err(GrcError::Validation("Risk title is required".into()));
        }
        let now = Utc::now();
        let mut risk = Risk {
            id: Uuid::new_v4(),
            tenant_id,
            title: req.title,
            description: req.description,
            category: req.category,
            likelihood: req.likelihood,
            impact: req.impact,
            inherent_score: 0,
            residual_score: 0.0,
            control_effectiveness: 0.0,
            level: RiskLevel::Low,
            status: RiskStatus::Identified,
            owner_id: req.owner_id,
            accepted_by: None,
            acceptance_justification: None,
            source_assessment_id: None,
            created_at: now,
            updated_at: now,
        };
        risk.rescore();
        info!(tenant_id = %tenant_id, risk_id = %risk.id, score = risk.inherent_score, "Risk created");
        self.risks.insert(risk.id, risk.clone());
        Ok(risk)
    }

    pub fn get(&self, tenant_id: Uuid, id: Uuid) -> GrcResult<Risk> {
        self.risks
            .get(&id)
            .filter(|r| r.tenant_id == tenant_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| GrcError::not_found("Risk", id))
    }

    pub fn list(&self, tenant_id: Uuid, filter: &RiskFilter) -> Vec<Risk> {
        let mut risks: Vec<Risk> = self
            .risks
            .iter()
            .filter(|r| {
                r.tenant_id == tenant_id
                    && filter.status.map_or(true, |s| r.status == s)
                    && filter.level.map_or(true, |l| r.level == l)
                    && filter
                        .category
                        .as_deref()
                        .map_or(true, |c| r.category.eq_ignore_ascii_case(c))
            })
            .map(|r| r.value().clone())
            .collect();
        risks.sort_by(|a, b| b.inherent_score.cmp(&a.inherent_score).then(a.title.cmp(&b.title)));
        risks
    }

    fn modify<F>(&self, tenant_id: Uuid, id: Uuid, apply: F) -> GrcResult<Risk>
    where
        F: FnOnce(&mut Risk) -> GrcResult<()>,
    {
        let mut entry = self
            .risks
            .get_mut(&id)
            .filter(|r| r.tenant_id == tenant_id)
            .ok_or_else(|| GrcError::not_found("Risk", id))?;
        apply(entry.value_mut())?;
        entry.rescore();
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    pub fn update(&self, tenant_id: Uuid, id: Uuid, req: UpdateRiskRequest) -> GrcResult<Risk> {
        if let Some(l) = req.likelihood {
            validate_scale("likelihood", l)?;
        }
        if let Some(i) = req.impact {
            validate_scale("impact", i)?;
        }
        if let Some(status @ (RiskStatus::Accepted | RiskStatus::Mitigated)) = req.status {
            return Err(GrcError::Validation(format!(
                "Risk status {status:?} is set through its own operation"
            )));
        }
        self.modify(tenant_id, id, |r| {
            if let Some(status) = req.status.filter(|s| *s != r.status) {
                if !r.status.can_update_to(status) {
                    return Err(GrcError::invalid_transition(r.status, status));
                }
                if r.status == RiskStatus::Accepted {
                    r.accepted_by = None;
                    r.acceptance_justification = None;
                }
                r.status = status;
            }
            if let Some(title) = req.title {
                r.title = title;
            }
            if let Some(description) = req.description {
                r.description = description;
            }
            if let Some(category) = req.category {
                r.category = category;
            }
            if let Some(l) = req.likelihood {
                r.likelihood = l;
            }
            if let Some(i) = req.impact {
                r.impact = i;
            }
            if let Some(owner) = req.owner_id {
                r.owner_id = Some(owner);
            }
            Ok(())
        })
    }

    pub fn delete(&self, tenant_id: Uuid, id: Uuid) -> GrcResult<()> {
        self.get(tenant_id, id)?;
        self.risks.remove(&id);
        self.links.remove(&id);
        info!(tenant_id = %tenant_id, risk_id = %id, "Risk deleted");
        Ok(())
    }

    pub fn accept(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        user_id: Uuid,
        justification: &str,
    ) -> GrcResult<Risk> {
        if justification.trim().is_empty() {
            return Err(GrcError::Validation("Acceptance requires a justification".into()));
        }
        let risk = self.modify(tenant_id, id, |r| {
            if r.status == RiskStatus::Closed {
                return Err(GrcError::invalid_transition(r.status, RiskStatus::Accepted));
            }
            r.status = RiskStatus::Accepted;
            r.accepted_by = Some(user_id);
            r.acceptance_justification = Some(justification.to_string());
            Ok(())
        })?;
        info!(tenant_id = %tenant_id, risk_id = %id, user_id = %user_id, "Risk accepted");
        Ok(risk)
    }

    pub fn mitigate(&self, tenant_id: Uuid, id: Uuid) -> GrcResult<Risk> {
        self.modify(tenant_id, id, |r| {
            if matches!(r.status, RiskStatus::Closed | RiskStatus::Mitigated) {
                return Err(GrcError::invalid_transition(r.status, RiskStatus::Mitigated));
            }
            r.status = RiskStatus::Mitigated;
            Ok(())
        })
    }

    /// Link a control to a risk and recompute the residual score.
    pub fn link_control(
        &self,
        tenant_id: Uuid,
        risk_id: Uuid,
        control_id: Uuid,
        expected_effectiveness: u8,
    ) -> GrcResult<RiskControlLink> {
        if expected_effectiveness > 100 {
            return Err(GrcError::Validation("Expected effectiveness must be 0-100".into()));
        }
        self.get(tenant_id, risk_id)?;
        self.controls.get(tenant_id, control_id)?;

        let link = RiskControlLink {
            risk_id,
            control_id,
            expected_effectiveness,
            strength: MappingStrength::from_effectiveness(expected_effectiveness),
            linked_at: Utc::now(),
        };
        {
            let mut links = self.links.entry(risk_id).or_default();
            links.retain(|l| l.control_id != control_id);
            links.push(link.clone());
        }
        self.control_effectiveness(tenant_id, risk_id)?;
        info!(tenant_id = %tenant_id, risk_id = %risk_id, control_id = %control_id, "Control linked to risk");
        Ok(link)
    }

    pub fn linked_controls(&self, risk_id: Uuid) -> Vec<RiskControlLink> {
        self.links.get(&risk_id).map(|l| l.clone()).unwrap_or_default()
    }

    /// `Σ(actual × expected) / Σ expected` over linked controls, where
    /// actual is each control's tested effectiveness. Stores the result on
    /// the risk and refreshes its residual score.
    pub fn control_effectiveness(&self, tenant_id: Uuid, risk_id: Uuid) -> GrcResult<f64> {
        let links = self.linked_controls(risk_id);
        let (weighted, total) = links.iter().fold((0.0_f64, 0.0_f64), |(w, t), link| {
            let actual = self
                .controls
                .get(tenant_id, link.control_id)
                .map(|c| f64::from(c.effectiveness))
                .unwrap_or(0.0);
            let expected = f64::from(link.expected_effectiveness);
            (w + actual * expected, t + expected)
        });
        let effectiveness = if total > 0.0 { round2(weighted / total) } else { 0.0 };
        self.modify(tenant_id, risk_id, |r| {
            r.control_effectiveness = effectiveness;
            Ok(())
        })?;
        Ok(effectiveness)
    }

    /// Turn weak assessment requirements (score < 50) into risks, at most ten.
    pub fn generate_from_assessment_gaps(
        &self,
        assessment: &Assessment,
        owner_id: Option<Uuid>,
    ) -> GrcResult<Vec<Risk>> {
        let gaps = assessment
            .requirements
            .iter()
            .filter_map(|r| r.score.filter(|s| *s < GAP_SCORE_THRESHOLD).map(|s| (r, s)))
            .take(MAX_GAP_RISKS);

        let mut created = Vec::new();
        for (requirement, score) in gaps {
            let mut risk = self.create(
                assessment.tenant_id,
                CreateRiskRequest {
                    title: format!("Gap: {}", requirement.title),
                    description: format!(
                        "Requirement {} scored {:.0} in assessment '{}'",
                        requirement.control_code, score, assessment.name
                    ),
                    category: "Compliance".to_string(),
                    likelihood: 3,
                    impact: gap_impact(score),
                    owner_id,
                },
            )?;
            if let Some(mut stored) = self.risks.get_mut(&risk.id) {
                stored.source_assessment_id = Some(assessment.id);
                risk = stored.clone();
            }
            created.push(risk);
        }
        info!(
            tenant_id = %assessment.tenant_id,
            assessment_id = %assessment.id,
            created = created.len(),
            "Risks generated from assessment gaps"
        );
        Ok(created)
    }

    pub fn heat_map(&self, tenant_id: Uuid) -> HeatMap {
        let risks = self.list(tenant_id, &RiskFilter::default());
        let mut cells = Vec::with_capacity(25);
        for likelihood in 1..=5u8 {
            for impact in 1..=5u8 {
                let in_cell: Vec<&Risk> = risks
                    .iter()
                    .filter(|r| r.likelihood == likelihood && r.impact == impact)
                    .collect();
                cells.push(HeatMapCell {
                    likelihood,
                    impact,
                    count: in_cell.len(),
                    top_risks: in_cell.iter().take(5).map(|r| r.title.clone()).collect(),
                });
            }
        }
        HeatMap { tenant_id, cells }
    }

    pub fn posture(&self, tenant_id: Uuid) -> RiskPosture {
        let risks = self.list(tenant_id, &RiskFilter::default());
        let total = risks.len();
        let avg = |f: &dyn Fn(&Risk) -> f64| {
            if total == 0 {
                0.0
            } else {
                round2(risks.iter().map(f).sum::<f64>() / total as f64)
            }
        };
        let mut by_level = BTreeMap::new();
        for r in &risks {
            *by_level.entry(format!("{:?}", r.level)).or_insert(0) += 1;
        }
        RiskPosture {
            total,
            open: risks.iter().filter(|r| r.status.is_open()).count(),
            accepted: risks.iter().filter(|r| r.status == RiskStatus::Accepted).count(),
            mitigated: risks.iter().filter(|r| r.status == RiskStatus::Mitigated).count(),
            average_inherent_score: avg(&|r| f64::from(r.inherent_score)),
            average_residual_score: avg(&|r| r.residual_score),
            by_level,
        }
    }

    pub fn statistics(&self, tenant_id: Uuid) -> RiskStatistics {
        let mut stats = RiskStatistics::default();
        for r in self.risks.iter().filter(|r| r.tenant_id == tenant_id) {
            stats.total += 1;
            match r.inherent_score {
                8.. => stats.high += 1,
                4..=7 => stats.medium += 1,
                _ => stats.low += 1,
            }
            if r.status.is_open() {
                stats.open += 1;
            }
        }
        stats
    }
}

fn validate_scale(field: &str, value: u8) -> GrcResult<()> {
    if (1..=5).contains(&value) {
        Ok(())
    } else {
        Err(GrcError::Validation(format!("{field} must be between 1 and 5")))
    }
}

fn gap_impact(score: f64) -> u8 {
    match score {
        s if s < 20.0 => 5,
        s if s < 40.0 => 4,
        s if s < 60.0 => 3,
        s if s < 80.0 => 2,
        _ => 1,
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessments::{Requirement, RequirementStatus};
    use crate::models::CreateControlRequest;

    fn service() -> (RiskService, Arc<ControlService>) {
        let controls = Arc::new(ControlService::new());
        (RiskService::new(controls.clone()), controls)
    }

    fn risk_request(title: &str, likelihood: u8, impact: u8) -> CreateRiskRequest {
        CreateRiskRequest {
            title: title.into(),
            description: String::new(),
            category: "Operational".into(),
            likelihood,
            impact,
            owner_id: None,
        }
    }

    #[test]
    fn test_levels() {
        assert_eq!(RiskLevel::from_score(25), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(20), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(12), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(6), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(5), RiskLevel::Low);
        assert_eq!(MappingStrength::from_effectiveness(80), MappingStrength::Strong);
        assert_eq!(MappingStrength::from_effectiveness(50), MappingStrength::Moderate);
        assert_eq!(MappingStrength::from_effectiveness(49), MappingStrength::Weak);
    }

    #[test]
    fn test_create_validates_and_scores() {
        let (svc, _) = service();
        let tenant = Uuid::new_v4();

        assert!(matches!(
            svc.create(tenant, risk_request("bad", 0, 3)),
            Err(GrcError::Validation(_))
        ));
        assert!(svc.create(tenant, risk_request("bad", 3, 6)).is_err());

        let risk = svc.create(tenant, risk_request("Ransomware", 4, 5)).unwrap();
        assert_eq!(risk.inherent_score, 20);
        assert_eq!(risk.level, RiskLevel::Critical);
        assert_eq!(risk.residual_score, 20.0);
        assert_eq!(risk.status, RiskStatus::Identified);
    }

    #[test]
    fn test_accept_and_mitigate() {
        let (svc, _) = service();
        let tenant = Uuid::new_v4();
        let user = Uuid::new_v4();
        let risk = svc.create(tenant, risk_request("Vendor lock-in", 2, 3)).unwrap();

        let accepted = svc.accept(tenant, risk.id, user, "Within appetite").unwrap();
        assert_eq!(accepted.status, RiskStatus::Accepted);
        assert_eq!(accepted.accepted_by, Some(user));

        svc.update(
            tenant,
            risk.id,
            UpdateRiskRequest {
                status: Some(RiskStatus::Closed),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(matches!(
            svc.accept(tenant, risk.id, user, "again"),
            Err(GrcError::InvalidTransition { .. })
        ));

        let other = svc.create(tenant, risk_request("Phishing", 4, 3)).unwrap();
        assert_eq!(svc.mitigate(tenant, other.id).unwrap().status, RiskStatus::Mitigated);
    }

    #[test]
    fn test_update_cannot_bypass_status_rules() {
        let (svc, _) = service();
        let tenant = Uuid::new_v4();
        let user = Uuid::new_v4();
        let risk = svc.create(tenant, risk_request("Insider threat", 3, 4)).unwrap();
        let set_status = |status| UpdateRiskRequest {
            status: Some(status),
            ..Default::default()
        };

        svc.update(tenant, risk.id, set_status(RiskStatus::Closed)).unwrap();
        assert!(matches!(
            svc.update(tenant, risk.id, set_status(RiskStatus::Accepted)),
            Err(GrcError::Validation(_))
        ));
        assert!(matches!(
            svc.update(tenant, risk.id, set_status(RiskStatus::Mitigated)),
            Err(GrcError::Validation(_))
        ));
        let closed = svc.get(tenant, risk.id).unwrap();
        assert_eq!(closed.status, RiskStatus::Closed);
        assert_eq!(closed.accepted_by, None);

        // Reopen, accept, then reopen again drops the acceptance record.
        let reopened = svc.update(tenant, risk.id, set_status(RiskStatus::Active)).unwrap();
        assert_eq!(reopened.status, RiskStatus::Active);
        svc.accept(tenant, risk.id, user, "Compensating controls").unwrap();
        let active = svc.update(tenant, risk.id, set_status(RiskStatus::Active)).unwrap();
        assert_eq!(active.accepted_by, None);
        assert_eq!(active.acceptance_justification, None);

        let fresh = svc.create(tenant, risk_request("Shadow IT", 2, 2)).unwrap();
        svc.mitigate(tenant, fresh.id).unwrap();
        assert!(matches!(
            svc.update(tenant, fresh.id, set_status(RiskStatus::Identified)),
            Err(GrcError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_control_effectiveness_weighting() {
        let (svc, controls) = service();
        let tenant = Uuid::new_v4();
        let tester = Uuid::new_v4();
        let risk = svc.create(tenant, risk_request("Data leak", 4, 5)).unwrap();

        let mk = |code: &str, score: u8| {
            let c = controls
                .create(
                    tenant,
                    CreateControlRequest {
                        code: code.into(),
                        title: code.into(),
                        description: String::new(),
                        baseline_code: "NCA_ECC".into(),
                        owner_id: None,
                    },
                )
                .unwrap();
            controls.record_test(tenant, c.id, score, tester).unwrap();
            c.id
        };
        let dlp = mk("DLP-1", 90);
        let iam = mk("IAM-1", 60);

        let link = svc.link_control(tenant, risk.id, dlp, 80).unwrap();
        assert_eq!(link.strength, MappingStrength::Strong);
        svc.link_control(tenant, risk.id, iam, 40).unwrap();

        // (90*80 + 60*40) / 120 = 80
        let eff = svc.control_effectiveness(tenant, risk.id).unwrap();
        assert_eq!(eff, 80.0);
        let risk = svc.get(tenant, risk.id).unwrap();
        assert_eq!(risk.residual_score, 4.0);
    }

    #[test]
    fn test_generate_from_assessment_gaps() {
        let (svc, _) = service();
        let tenant = Uuid::new_v4();
        let requirement = |title: &str, score: Option<f64>| Requirement {
            id: Uuid::new_v4(),
            control_code: "ECC-1".into(),
            title: title.into(),
            status: RequirementStatus::InProgress,
            score,
        };
        let mut requirements = vec![
            requirement("Asset inventory", Some(10.0)),
            requirement("Patch management", Some(45.0)),
            requirement("Logging", Some(75.0)),
            requirement("Unscored", None),
        ];
        for i in 0..12 {
            requirements.push(requirement(&format!("Filler {i}"), Some(30.0)));
        }
        let assessment = Assessment::for_tests(tenant, requirements);

        let risks = svc.generate_from_assessment_gaps(&assessment, None).unwrap();
        assert_eq!(risks.len(), 10);
        assert_eq!(risks[0].title, "Gap: Asset inventory");
        assert_eq!(risks[0].impact, 5);
        assert_eq!(risks[1].impact, 3);
        assert_eq!(risks[2].impact, 4);
        assert!(risks.iter().all(|r| r.likelihood == 3
            && r.category == "Compliance"
            && r.source_assessment_id == Some(assessment.id)));
    }

    #[test]
    fn test_heat_map_posture_statistics() {
        let (svc, _) = service();
        let tenant = Uuid::new_v4();
        for i in 0..7 {
            svc.create(tenant, risk_request(&format!("R{i}"), 5, 5)).unwrap();
        }
        let low = svc.create(tenant, risk_request("Minor", 1, 2)).unwrap();
        svc.create(tenant, risk_request("Medium", 2, 3)).unwrap();
        svc.accept(tenant, low.id, Uuid::new_v4(), "ok").unwrap();

        let map = svc.heat_map(tenant);
        assert_eq!(map.cells.len(), 25);
        let hot = map.cells.iter().find(|c| c.likelihood == 5 && c.impact == 5).unwrap();
        assert_eq!(hot.count, 7);
        assert_eq!(hot.top_risks.len(), 5);

        let posture = svc.posture(tenant);
        assert_eq!(posture.total, 9);
        assert_eq!(posture.accepted, 1);
        assert_eq!(posture.open, 8);
        assert_eq!(posture.by_level["Critical"], 7);

        let stats = svc.statistics(tenant);
        assert_eq!((stats.high, stats.medium, stats.low), (7, 1, 1));
    }
}
