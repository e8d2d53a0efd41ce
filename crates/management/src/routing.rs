//! Teams, RACI assignments and assignee resolution for workflow tasks.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use grc_core::error::{GrcError, GrcResult};
use grc_platform::{RbacEngine, TenantManager};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMember {
    pub user_id: Uuid,
    /// Functional role inside the team, e.g. `ControlOwner`.
    pub role_code: String,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub is_default: bool,
    pub members: Vec<TeamMember>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaciRole {
    Responsible,
    Accountable,
    Consulted,
    Informed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaciAssignment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub scope_type: String,
    pub scope_id: String,
    pub team_id: Uuid,
    pub role: RaciRole,
}

/// Which resolution step produced the assignees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentSource {
    DirectOwner,
    TeamRole,
    Raci,
    FallbackTeam,
    TenantRole,
    Unassigned,
}

/// What a task knows about who should pick it up.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteQuery {
    pub owner_id: Option<Uuid>,
    pub role_code: Option<String>,
    pub scope_type: Option<String>,
    pub scope_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssigneeResolution {
    pub user_ids: Vec<Uuid>,
    pub source: AssignmentSource,
}

impl AssigneeResolution {
    fn unassigned() -> Self {
        Self {
            user_ids: Vec::new(),
            source: AssignmentSource::Unassigned,
        }
    }

    pub fn primary(&self) -> Option<Uuid> {
        self.user_ids.first().copied()
    }
}

pub struct AssigneeRouter {
    teams: DashMap<Uuid, Team>,
    raci: DashMap<Uuid, RaciAssignment>,
    tenants: Arc<TenantManager>,
    rbac: Arc<RbacEngine>,
}

impl AssigneeRouter {
    pub fn new(tenants: Arc<TenantManager>, rbac: Arc<RbacEngine>) -> Self {
        Self {
            teams: DashMap::new(),
            raci: DashMap::new(),
            tenants,
            rbac,
        }
    }

    // ─── Teams ─────────────────────────────────────────────────────────

    /// Create a team. Marking it default clears the flag on the tenant's other teams.
    pub fn create_team(&self, tenant_id: Uuid, name: &str, is_default: bool) -> GrcResult<Team> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GrcError::Validation("Team name is required".into()));
        }
        if self
            .teams
            .iter()
            .any(|t| t.tenant_id == tenant_id && t.name.eq_ignore_ascii_case(name))
        {
            return Err(GrcError::Conflict(format!("Team '{name}' already exists")));
        }
        if is_default {
            for mut t in self.teams.iter_mut().filter(|t| t.tenant_id == tenant_id) {
                t.is_default = false;
            }
        }
        let team = Team {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.to_string(),
            is_default,
            members: Vec::new(),
            created_at: Utc::now(),
        };
        info!(tenant_id = %tenant_id, team = %team.name, "Team created");
        self.teams.insert(team.id, team.clone());
        Ok(team)
    }

    pub fn get_team(&self, tenant_id: Uuid, team_id: Uuid) -> GrcResult<Team> {
        self.teams
            .get(&team_id)
            .filter(|t| t.tenant_id == tenant_id)
            .map(|t| t.value().clone())
            .ok_or_else(|| GrcError::not_found("Team", team_id))
    }

    pub fn list_teams(&self, tenant_id: Uuid) -> Vec<Team> {
        let mut teams: Vec<Team> = self
            .teams
            .iter()
            .filter(|t| t.tenant_id == tenant_id)
            .map(|t| t.value().clone())
            .collect();
        teams.sort_by(|a, b| a.name.cmp(&b.name));
        teams
    }

    pub fn add_member(
        &self,
        tenant_id: Uuid,
        team_id: Uuid,
        user_id: Uuid,
        role_code: &str,
    ) -> GrcResult<Team> {
        if self.tenants.get_user(tenant_id, user_id).is_none() {
            return Err(GrcError::not_found("User", user_id));
        }
        let mut team = self
            .teams
            .get_mut(&team_id)
            .filter(|t| t.tenant_id == tenant_id)
            .ok_or_else(|| GrcError::not_found("Team", team_id))?;
        team.members.retain(|m| !(m.user_id == user_id && m.role_code == role_code));
        team.members.push(TeamMember {
            user_id,
            role_code: role_code.to_string(),
            added_at: Utc::now(),
        });
        Ok(team.clone())
    }

    pub fn remove_member(&self, tenant_id: Uuid, team_id: Uuid, user_id: Uuid) -> GrcResult<Team> {
        let mut team = self
            .teams
            .get_mut(&team_id)
            .filter(|t| t.tenant_id == tenant_id)
            .ok_or_else(|| GrcError::not_found("Team", team_id))?;
        team.members.retain(|m| m.user_id != user_id);
        Ok(team.clone())
    }

    // ─── RACI ──────────────────────────────────────────────────────────

    /// Assign a team a RACI role on a scope. A scope has one team per role.
    pub fn assign_raci(
        &self,
        tenant_id: Uuid,
        scope_type: &str,
        scope_id: &str,
        team_id: Uuid,
        role: RaciRole,
    ) -> GrcResult<RaciAssignment> {
        self.get_team(tenant_id, team_id)?;
        self.raci.retain(|_, a| {
            !(a.tenant_id == tenant_id
                && a.scope_type == scope_type
                && a.scope_id == scope_id
                && a.role == role)
        });
        let assignment = RaciAssignment {
            id: Uuid::new_v4(),
            tenant_id,
            scope_type: scope_type.to_string(),
            scope_id: scope_id.to_string(),
            team_id,
            role,
        };
        self.raci.insert(assignment.id, assignment.clone());
        Ok(assignment)
    }

    pub fn raci_for(
        &self,
        tenant_id: Uuid,
        scope_type: &str,
        scope_id: &str,
    ) -> Vec<RaciAssignment> {
        self.raci
            .iter()
            .filter(|a| {
                a.tenant_id == tenant_id && a.scope_type == scope_type && a.scope_id == scope_id
            })
            .map(|a| a.value().clone())
            .collect()
    }

    // ─── Resolution ────────────────────────────────────────────────────

    fn active(&self, tenant_id: Uuid, user_ids: impl IntoIterator<Item = Uuid>) -> Vec<Uuid> {
        let mut out: Vec<Uuid> = Vec::new();
        for id in user_ids {
            let is_active = self.tenants.get_user(tenant_id, id).map_or(false, |u| u.is_active);
            if is_active && !out.contains(&id) {
                out.push(id);
            }
        }
        out
    }

    fn team_members(&self, team: &Team, tenant_id: Uuid) -> Vec<Uuid> {
        self.active(tenant_id, team.members.iter().map(|m| m.user_id))
    }

    /// Resolve assignees: direct owner, team role, RACI Responsible team,
    /// the default team, then tenant users holding the RBAC role.
    pub fn resolve(&self, tenant_id: Uuid, query: &RouteQuery) -> AssigneeResolution {
        let found = |user_ids: Vec<Uuid>, source: AssignmentSource| {
            debug!(tenant_id = %tenant_id, source = ?source, count = user_ids.len(), "Assignees resolved");
            AssigneeResolution { user_ids, source }
        };

        if let Some(owner) = query.owner_id {
            let owner = self.active(tenant_id, [owner]);
            if !owner.is_empty() {
                return found(owner, AssignmentSource::DirectOwner);
            }
        }

        let teams = self.list_teams(tenant_id);

        if let Some(role) = query.role_code.as_deref() {
            let members = self.active(
                tenant_id,
                teams
                    .iter()
                    .flat_map(|t| t.members.iter())
                    .filter(|m| m.role_code.eq_ignore_ascii_case(role))
                    .map(|m| m.user_id),
            );
            if !members.is_empty() {
                return found(members, AssignmentSource::TeamRole);
            }
        }

        if let (Some(scope_type), Some(scope_id)) = (
            query.scope_type.as_deref(),
            query.scope_id.as_deref(),
        ) {
            let responsible = self
                .raci_for(tenant_id, scope_type, scope_id)
                .into_iter()
                .find(|a| a.role == RaciRole::Responsible)
                .and_then(|a| teams.iter().find(|t| t.id == a.team_id));
            if let Some(team) = responsible {
                let members = self.team_members(team, tenant_id);
                if !members.is_empty() {
                    return found(members, AssignmentSource::Raci);
                }
            }
        }

        if let Some(default_team) = teams.iter().find(|t| t.is_default) {
            let members = self.team_members(default_team, tenant_id);
            if !members.is_empty() {
                return found(members, AssignmentSource::FallbackTeam);
            }
        }

        if let Some(role) = query.role_code.as_deref() {
            let holders = self.active(tenant_id, self.rbac.users_with_role(role));
            if !holders.is_empty() {
                return found(holders, AssignmentSource::TenantRole);
            }
        }

        AssigneeResolution::unassigned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grc_platform::rbac::role_names;

    struct Fixture {
        router: AssigneeRouter,
        tenants: Arc<TenantManager>,
        rbac: Arc<RbacEngine>,
        tenant: Uuid,
    }

    fn fixture() -> Fixture {
        let tenants = Arc::new(TenantManager::new());
        let rbac = Arc::new(RbacEngine::new());
        rbac.seed_default_roles();
        let tenant = tenants.create_tenant("Acme", "acme", "admin@acme.sa").unwrap().id;
        Fixture {
            router: AssigneeRouter::new(tenants.clone(), rbac.clone()),
            tenants,
            rbac,
            tenant,
        }
    }

    fn user(f: &Fixture, email: &str) -> Uuid {
        f.tenants.add_user(f.tenant, email, email, "password123").unwrap().id
    }

    #[test]
    fn test_direct_owner_wins_when_active() {
        let f = fixture();
        let owner = user(&f, "owner@acme.sa");
        let res = f.router.resolve(
            f.tenant,
            &RouteQuery {
                owner_id: Some(owner),
                ..Default::default()
            },
        );
        assert_eq!(res.source, AssignmentSource::DirectOwner);
        assert_eq!(res.primary(), Some(owner));

        f.tenants.deactivate_user(f.tenant, owner).unwrap();
        let res = f.router.resolve(
            f.tenant,
            &RouteQuery {
                owner_id: Some(owner),
                ..Default::default()
            },
        );
        assert_eq!(res.source, AssignmentSource::Unassigned);
    }

    #[test]
    fn test_resolution_order() {
        let f = fixture();
        let reviewer = user(&f, "reviewer@acme.sa");
        let raci_user = user(&f, "raci@acme.sa");
        let fallback = user(&f, "fallback@acme.sa");
        let rbac_user = user(&f, "rbac@acme.sa");

        let grc = f.router.create_team(f.tenant, "GRC", false).unwrap();
        f.router.add_member(f.tenant, grc.id, reviewer, "EvidenceReviewer").unwrap();
        let it = f.router.create_team(f.tenant, "IT Ops", false).unwrap();
        f.router.add_member(f.tenant, it.id, raci_user, "Engineer").unwrap();
        let default_team = f.router.create_team(f.tenant, "Service Desk", true).unwrap();
        f.router.add_member(f.tenant, default_team.id, fallback, "Agent").unwrap();
        f.rbac.assign_role_by_name(rbac_user, role_names::AUDITOR);
        f.router
            .assign_raci(f.tenant, "Control", "ECC-1-1", it.id, RaciRole::Responsible)
            .unwrap();

        let team_role = f.router.resolve(
            f.tenant,
            &RouteQuery {
                role_code: Some("evidencereviewer".into()),
                ..Default::default()
            },
        );
        assert_eq!(team_role.source, AssignmentSource::TeamRole);
        assert_eq!(team_role.user_ids, vec![reviewer]);

        let raci = f.router.resolve(
            f.tenant,
            &RouteQuery {
                role_code: Some("Nobody".into()),
                scope_type: Some("Control".into()),
                scope_id: Some("ECC-1-1".into()),
                ..Default::default()
            },
        );
        assert_eq!(raci.source, AssignmentSource::Raci);
        assert_eq!(raci.user_ids, vec![raci_user]);

        let fallback_res = f.router.resolve(f.tenant, &RouteQuery::default());
        assert_eq!(fallback_res.source, AssignmentSource::FallbackTeam);
        assert_eq!(fallback_res.user_ids, vec![fallback]);

        f.router.remove_member(f.tenant, default_team.id, fallback).unwrap();
        let tenant_role = f.router.resolve(
            f.tenant,
            &RouteQuery {
                role_code: Some(role_names::AUDITOR.into()),
                ..Default::default()
            },
        );
        assert_eq!(tenant_role.source, AssignmentSource::TenantRole);
        assert_eq!(tenant_role.user_ids, vec![rbac_user]);
    }

    #[test]
    fn test_default_team_is_unique_and_raci_replaces() {
        let f = fixture();
        let a = f.router.create_team(f.tenant, "A", true).unwrap();
        let b = f.router.create_team(f.tenant, "B", true).unwrap();
        assert!(!f.router.get_team(f.tenant, a.id).unwrap().is_default);
        assert!(f.router.get_team(f.tenant, b.id).unwrap().is_default);
        assert!(matches!(
            f.router.create_team(f.tenant, "a", false),
            Err(GrcError::Conflict(_))
        ));

        f.router.assign_raci(f.tenant, "Risk", "R1", a.id, RaciRole::Accountable).unwrap();
        f.router.assign_raci(f.tenant, "Risk", "R1", b.id, RaciRole::Accountable).unwrap();
        let raci = f.router.raci_for(f.tenant, "Risk", "R1");
        assert_eq!(raci.len(), 1);
        assert_eq!(raci[0].team_id, b.id);
    }
}
