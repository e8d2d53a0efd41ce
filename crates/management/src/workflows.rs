//! Workflow orchestration and approval chains.
//!
//! Workflow instances carry tasks through their own state machines; tasks are
//! routed to assignees on creation and escalated when overdue. Approval
//! requests walk a chain of levels, each needing a minimum number of approvals.

use crate::routing::{AssigneeRouter, AssignmentSource, RouteQuery};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use grc_core::error::{GrcError, GrcResult};
use grc_core::types::day_span;
use grc_platform::rbac::role_names;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Workflow Type / Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowType {
    Approval,
    EvidenceCollection,
    EvidenceReview,
    Remediation,
}

/// Lifecycle status of a workflow instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowStatus {
    #[default]
    Pending,
    InProgress,
    InApproval,
    Completed,
    Rejected,
    Suspended,
    Cancelled,
    Failed,
}

impl WorkflowStatus {
    pub fn allowed_transitions(&self) -> &'static [WorkflowStatus] {
        use WorkflowStatus::*;
        match self {
            Pending => &[InProgress, Cancelled],
            InProgress => &[InApproval, Completed, Rejected, Suspended, Cancelled, Failed],
            InApproval => &[Completed, Rejected, InProgress, Cancelled],
            Suspended => &[InProgress, Cancelled],
            Rejected => &[InProgress],
            Failed => &[InProgress],
            Completed | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, to: WorkflowStatus) -> bool {
        *self == to || self.allowed_transitions().contains(&to)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

/// Lifecycle status of a single workflow task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Approved,
    Rejected,
    Skipped,
    Cancelled,
}

impl TaskStatus {
    pub fn allowed_transitions(&self) -> &'static [TaskStatus] {
        use TaskStatus::*;
        match self {
            Pending => &[InProgress, Skipped, Cancelled],
            InProgress => &[Approved, Rejected, Cancelled],
            Rejected => &[InProgress],
            Approved | Skipped | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, to: TaskStatus) -> bool {
        *self == to || self.allowed_transitions().contains(&to)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Instances, Tasks, History
// ---------------------------------------------------------------------------

/// A task to create when a workflow starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub name: String,
    #[serde(default)]
    pub assignee_id: Option<Uuid>,
    #[serde(default)]
    pub role_code: Option<String>,
    #[serde(default)]
    pub due_in_days: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowTask {
    pub id: Uuid,
    pub instance_id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub role_code: Option<String>,
    pub assignee_ids: Vec<Uuid>,
    pub assignment_source: AssignmentSource,
    pub status: TaskStatus,
    pub due_at: DateTime<Utc>,
    pub escalated_at: Option<DateTime<Utc>>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub workflow_type: WorkflowType,
    pub entity_type: String,
    pub entity_id: String,
    pub status: WorkflowStatus,
    pub initiated_by: Uuid,
    pub task_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A recorded state change on an instance or one of its tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowTransition {
    pub id: Uuid,
    pub instance_id: Uuid,
    pub task_id: Option<Uuid>,
    pub from_status: String,
    pub to_status: String,
    pub actor_id: Option<Uuid>,
    pub comment: Option<String>,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Approval Chains
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalLevel {
    Manager,
    Compliance,
    Executive,
}

fn default_min_approvals() -> u32 {
    1
}

/// One level of an approval chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainLevel {
    pub level: ApprovalLevel,
    pub approvers: Vec<Uuid>,
    #[serde(default = "default_min_approvals")]
    pub min_approvals: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approve,
    Reject,
    RequestRevision,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    RevisionRequested,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub round: u32,
    pub level: ApprovalLevel,
    pub approver_id: Uuid,
    pub decision: ApprovalDecision,
    pub comment: Option<String>,
    pub decided_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub entity_type: String,
    pub entity_id: String,
    pub requested_by: Uuid,
    pub chain: Vec<ChainLevel>,
    /// Index into `chain`.
    pub current_level: usize,
    /// Starts at 1; bumped by each resubmission.
    pub round: u32,
    pub status: ApprovalStatus,
    pub decisions: Vec<ApprovalRecord>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ApprovalRequest {
    fn current(&self) -> Option<&ChainLevel> {
        self.chain.get(self.current_level)
    }

    fn has_decided(&self, approver: Uuid) -> bool {
        let Some(level) = self.current() else {
            return false;
        };
        self.decisions
            .iter()
            .any(|d| d.round == self.round && d.level == level.level && d.approver_id == approver)
    }

    fn awaits(&self, approver: Uuid) -> bool {
        self.status == ApprovalStatus::Pending
            && self.current().map_or(false, |l| l.approvers.contains(&approver))
            && !self.has_decided(approver)
    }
}

// ---------------------------------------------------------------------------
// Workflow Engine
// ---------------------------------------------------------------------------

pub struct WorkflowEngine {
    instances: DashMap<Uuid, WorkflowInstance>,
    tasks: DashMap<Uuid, WorkflowTask>,
    /// instance_id -> ordered transitions
    transitions: DashMap<Uuid, Vec<WorkflowTransition>>,
    approvals: DashMap<Uuid, ApprovalRequest>,
    router: Arc<AssigneeRouter>,
    default_due_days: i64,
}

impl WorkflowEngine {
    pub fn new(router: Arc<AssigneeRouter>, default_due_days: i64) -> Self {
        Self {
            instances: DashMap::new(),
            tasks: DashMap::new(),
            transitions: DashMap::new(),
            approvals: DashMap::new(),
            router,
            default_due_days,
        }
    }

    fn record(
        &self,
        instance_id: Uuid,
        task_id: Option<Uuid>,
        from: String,
        to: String,
        actor: Option<Uuid>,
        comment: Option<String>,
    ) {
        self.transitions.entry(instance_id).or_default().push(WorkflowTransition {
            id: Uuid::new_v4(),
            instance_id,
            task_id,
            from_status: from,
            to_status: to,
            actor_id: actor,
            comment,
            timestamp: Utc::now(),
        });
    }

    /// Start a workflow on an entity. Each task is routed to assignees, using
    /// the entity as the RACI scope.
    pub fn start_workflow(
        &self,
        tenant_id: Uuid,
        workflow_type: WorkflowType,
        entity_type: &str,
        entity_id: &str,
        initiated_by: Uuid,
        tasks: Vec<NewTask>,
    ) -> GrcResult<WorkflowInstance> {
        if entity_type.trim().is_empty() || entity_id.trim().is_empty() {
            return Err(GrcError::Validation("Workflow entity type and id are required".into()));
        }
        if tasks.is_empty() {
            return Err(GrcError::Validation("Workflow needs at least one task".into()));
        }
        if tasks.iter().any(|t| t.name.trim().is_empty()) {
            return Err(GrcError::Validation("Task name is required".into()));
        }
        let due_spans = tasks
            .iter()
            .map(|t| day_span("due_in_days", t.due_in_days.unwrap_or(self.default_due_days)))
            .collect::<GrcResult<Vec<_>>>()?;

        let now = Utc::now();
        let instance_id = Uuid::new_v4();
        let mut task_ids = Vec::with_capacity(tasks.len());
        for (new_task, due_span) in tasks.into_iter().zip(due_spans) {
            let resolution = self.router.resolve(
                tenant_id,
                &RouteQuery {
                    owner_id: new_task.assignee_id,
                    role_code: new_task.role_code.clone(),
                    scope_type: Some(entity_type.to_string()),
                    scope_id: Some(entity_id.to_string()),
                },
            );
            if resolution.source == AssignmentSource::Unassigned {
                warn!(tenant_id = %tenant_id, task = %new_task.name, "No assignee found for workflow task");
            }
            let task = WorkflowTask {
                id: Uuid::new_v4(),
                instance_id,
                tenant_id,
                name: new_task.name,
                role_code: new_task.role_code,
                assignee_ids: resolution.user_ids,
                assignment_source: resolution.source,
                status: TaskStatus::Pending,
                due_at: now + due_span,
                escalated_at: None,
                comment: None,
                created_at: now,
                completed_at: None,
            };
            task_ids.push(task.id);
            self.tasks.insert(task.id, task);
        }

        let instance = WorkflowInstance {
            id: instance_id,
            tenant_id,
            workflow_type,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            status: WorkflowStatus::InProgress,
            initiated_by,
            task_ids,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        self.record(
            instance_id,
            None,
            format!("{:?}", WorkflowStatus::Pending),
            format!("{:?}", WorkflowStatus::InProgress),
            Some(initiated_by),
            Some("Workflow started".into()),
        );
        info!(
            tenant_id = %tenant_id,
            instance_id = %instance_id,
            workflow_type = ?workflow_type,
            tasks = instance.task_ids.len(),
            "Workflow started"
        );
        self.instances.insert(instance_id, instance.clone());
        Ok(instance)
    }

    pub fn get_instance(&self, tenant_id: Uuid, id: Uuid) -> GrcResult<WorkflowInstance> {
        self.instances
            .get(&id)
            .filter(|i| i.tenant_id == tenant_id)
            .map(|i| i.value().clone())
            .ok_or_else(|| GrcError::not_found("WorkflowInstance", id))
    }

    pub fn list_instances(&self, tenant_id: Uuid) -> Vec<WorkflowInstance> {
        let mut list: Vec<WorkflowInstance> = self
            .instances
            .iter()
            .filter(|i| i.tenant_id == tenant_id)
            .map(|i| i.value().clone())
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list
    }

    pub fn get_task(&self, tenant_id: Uuid, id: Uuid) -> GrcResult<WorkflowTask> {
        self.tasks
            .get(&id)
            .filter(|t| t.tenant_id == tenant_id)
            .map(|t| t.value().clone())
            .ok_or_else(|| GrcError::not_found("WorkflowTask", id))
    }

    pub fn tasks_for(&self, tenant_id: Uuid, instance_id: Uuid) -> GrcResult<Vec<WorkflowTask>> {
        let instance = self.get_instance(tenant_id, instance_id)?;
        Ok(instance
            .task_ids
            .iter()
            .filter_map(|id| self.tasks.get(id).map(|t| t.value().clone()))
            .collect())
    }

    /// Open tasks assigned to a user.
    pub fn my_tasks(&self, tenant_id: Uuid, user_id: Uuid) -> Vec<WorkflowTask> {
        let mut list: Vec<WorkflowTask> = self
            .tasks
            .iter()
            .filter(|t| {
                t.tenant_id == tenant_id
                    && !t.status.is_terminal()
                    && t.assignee_ids.contains(&user_id)
            })
            .map(|t| t.value().clone())
            .collect();
        list.sort_by(|a, b| a.due_at.cmp(&b.due_at));
        list
    }

    pub fn open_tasks(&self, tenant_id: Uuid) -> Vec<WorkflowTask> {
        self.tasks
            .iter()
            .filter(|t| t.tenant_id == tenant_id && !t.status.is_terminal())
            .map(|t| t.value().clone())
            .collect()
    }

    pub fn history(
        &self,
        tenant_id: Uuid,
        instance_id: Uuid,
    ) -> GrcResult<Vec<WorkflowTransition>> {
        self.get_instance(tenant_id, instance_id)?;
        Ok(self
            .transitions
            .get(&instance_id)
            .map(|v| v.clone())
            .unwrap_or_default())
    }

    /// Move an instance to `to`. Moving to the current status is a no-op.
    /// Cancelling an instance cancels its open tasks.
    pub fn transition_instance(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        to: WorkflowStatus,
        actor: Option<Uuid>,
        comment: Option<String>,
    ) -> GrcResult<WorkflowInstance> {
        let (from, instance) = {
            let mut entry = self
                .instances
                .get_mut(&id)
                .filter(|i| i.tenant_id == tenant_id)
                .ok_or_else(|| GrcError::not_found("WorkflowInstance", id))?;
            let from = entry.status;
            if !from.can_transition_to(to) {
                return Err(GrcError::invalid_transition(from, to));
            }
            if from == to {
                return Ok(entry.clone());
            }
            let now = Utc::now();
            entry.status = to;
            entry.updated_at = now;
            if to == WorkflowStatus::Completed {
                entry.completed_at = Some(now);
            }
            (from, entry.clone())
        };

        self.record(id, None, format!("{from:?}"), format!("{to:?}"), actor, comment);
        if to == WorkflowStatus::Cancelled {
            for task_id in &instance.task_ids {
                if let Some(mut task) = self.tasks.get_mut(task_id) {
                    if task.status.can_transition_to(TaskStatus::Cancelled)
                        && task.status != TaskStatus::Cancelled
                    {
                        let previous = task.status;
                        task.status = TaskStatus::Cancelled;
                        task.completed_at = Some(Utc::now());
                        drop(task);
                        self.record(
                            id,
                            Some(*task_id),
                            format!("{previous:?}"),
                            format!("{:?}", TaskStatus::Cancelled),
                            actor,
                            Some("Workflow cancelled".into()),
                        );
                    }
                }
            }
        }
        info!(tenant_id = %tenant_id, instance_id = %id, from = ?from, to = ?to, "Workflow transitioned");
        Ok(instance)
    }

    /// Move a task to `to`. When every task of the instance is terminal,
    /// the instance completes.
    pub fn transition_task(
        &self,
        tenant_id: Uuid,
        task_id: Uuid,
        to: TaskStatus,
        actor: Option<Uuid>,
        comment: Option<String>,
    ) -> GrcResult<WorkflowTask> {
        let (from, task) = {
            let mut entry = self
                .tasks
                .get_mut(&task_id)
                .filter(|t| t.tenant_id == tenant_id)
                .ok_or_else(|| GrcError::not_found("WorkflowTask", task_id))?;
            let from = entry.status;
            if !from.can_transition_to(to) {
                return Err(GrcError::invalid_transition(from, to));
            }
            if from == to {
                return Ok(entry.clone());
            }
            entry.status = to;
            entry.comment = comment.clone();
            if to.is_terminal() {
                entry.completed_at = Some(Utc::now());
            }
            (from, entry.clone())
        };

        let instance = self.get_instance(tenant_id, task.instance_id)?;
        if instance.status.is_terminal() {
            warn!(instance_id = %instance.id, task_id = %task_id, "Task changed on a closed workflow");
        }
        self.record(
            task.instance_id,
            Some(task_id),
            format!("{from:?}"),
            format!("{to:?}"),
            actor,
            comment,
        );
        info!(tenant_id = %tenant_id, task_id = %task_id, from = ?from, to = ?to, "Workflow task transitioned");

        let all_done = instance
            .task_ids
            .iter()
            .all(|id| self.tasks.get(id).map_or(true, |t| t.status.is_terminal()));
        if all_done && matches!(
            instance.status,
            WorkflowStatus::InProgress | WorkflowStatus::InApproval
        ) {
            self.transition_instance(
                tenant_id,
                instance.id,
                WorkflowStatus::Completed,
                actor,
                Some("All tasks finished".into()),
            )?;
        }
        Ok(task)
    }

    pub fn overdue_tasks(&self, tenant_id: Uuid, now: DateTime<Utc>) -> Vec<WorkflowTask> {
        let mut list: Vec<WorkflowTask> = self
            .tasks
            .iter()
            .filter(|t| t.tenant_id == tenant_id && !t.status.is_terminal() && t.due_at < now)
            .map(|t| t.value().clone())
            .collect();
        list.sort_by(|a, b| a.due_at.cmp(&b.due_at));
        list
    }

    /// Escalate tasks overdue by at least `escalation_days` to the tenant's
    /// compliance managers. Each task escalates once.
    pub fn escalate_overdue(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
        escalation_days: i64,
    ) -> GrcResult<Vec<WorkflowTask>> {
        let threshold = now - day_span("escalation_days", escalation_days)?;
        let candidates: Vec<WorkflowTask> = self
            .overdue_tasks(tenant_id, now)
            .into_iter()
            .filter(|t| t.escalated_at.is_none() && t.due_at <= threshold)
            .collect();

        let mut escalated = Vec::new();
        for task in candidates {
            let managers = self.router.resolve(
                tenant_id,
                &RouteQuery {
                    role_code: Some(role_names::COMPLIANCE_MANAGER.to_string()),
                    ..Default::default()
                },
            );
            let Some(mut entry) = self.tasks.get_mut(&task.id) else {
                continue;
            };
            for user in managers.user_ids {
                if !entry.assignee_ids.contains(&user) {
                    entry.assignee_ids.push(user);
                }
            }
            entry.escalated_at = Some(now);
            let updated = entry.clone();
            drop(entry);

            self.record(
                updated.instance_id,
                Some(updated.id),
                format!("{:?}", updated.status),
                format!("{:?}", updated.status),
                None,
                Some(format!("Escalated after {escalation_days} days overdue")),
            );
            warn!(tenant_id = %tenant_id, task_id = %updated.id, "Overdue task escalated");
            escalated.push(updated);
        }
        Ok(escalated)
    }

    // -----------------------------------------------------------------------
    // Approvals
    // -----------------------------------------------------------------------

    /// Open an approval request. Levels must ascend and each level must be
    /// able to reach its `min_approvals`.
    pub fn submit_for_approval(
        &self,
        tenant_id: Uuid,
        entity_type: &str,
        entity_id: &str,
        requested_by: Uuid,
        chain: Vec<ChainLevel>,
    ) -> GrcResult<ApprovalRequest> {
        if chain.is_empty() {
            return Err(GrcError::Validation("Approval chain needs at least one level".into()));
        }
        if chain.windows(2).any(|w| w[0].level >= w[1].level) {
            return Err(GrcError::Validation(
                "Approval levels must ascend: manager, compliance, executive".into(),
            ));
        }
        for level in &chain {
            if level.min_approvals == 0 || level.min_approvals as usize > level.approvers.len() {
                return Err(GrcError::Validation(format!(
                    "Level {:?} needs {} approvals but lists {} approvers",
                    level.level,
                    level.min_approvals,
                    level.approvers.len()
                )));
            }
        }

        let request = ApprovalRequest {
            id: Uuid::new_v4(),
            tenant_id,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            requested_by,
            chain,
            current_level: 0,
            round: 1,
            status: ApprovalStatus::Pending,
            decisions: Vec::new(),
            created_at: Utc::now(),
            resolved_at: None,
        };
        info!(tenant_id = %tenant_id, request_id = %request.id, entity_type, entity_id, "Approval requested");
        self.approvals.insert(request.id, request.clone());
        Ok(request)
    }

    pub fn get_approval(&self, tenant_id: Uuid, id: Uuid) -> GrcResult<ApprovalRequest> {
        self.approvals
            .get(&id)
            .filter(|r| r.tenant_id == tenant_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| GrcError::not_found("ApprovalRequest", id))
    }

    pub fn list_approvals(&self, tenant_id: Uuid) -> Vec<ApprovalRequest> {
        let mut list: Vec<ApprovalRequest> = self
            .approvals
            .iter()
            .filter(|r| r.tenant_id == tenant_id)
            .map(|r| r.value().clone())
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list
    }

    /// Record one approver's decision at the current level.
    pub fn record_decision(
        &self,
        tenant_id: Uuid,
        request_id: Uuid,
        approver: Uuid,
        decision: ApprovalDecision,
        comment: Option<String>,
    ) -> GrcResult<ApprovalRequest> {
        let mut entry = self
            .approvals
            .get_mut(&request_id)
            .filter(|r| r.tenant_id == tenant_id)
            .ok_or_else(|| GrcError::not_found("ApprovalRequest", request_id))?;
        if entry.status != ApprovalStatus::Pending {
            return Err(GrcError::Conflict(format!("Approval request is {:?}", entry.status)));
        }
        let level = entry
            .current()
            .cloned()
            .ok_or_else(|| GrcError::Conflict("Approval chain exhausted".into()))?;
        if !level.approvers.contains(&approver) {
            return Err(GrcError::Forbidden(format!(
                "User is not an approver at the {:?} level",
                level.level
            )));
        }
        if entry.has_decided(approver) {
            return Err(GrcError::Conflict("Approver already decided at this level".into()));
        }

        let now = Utc::now();
        let round = entry.round;
        entry.decisions.push(ApprovalRecord {
            round,
            level: level.level,
            approver_id: approver,
            decision,
            comment,
            decided_at: now,
        });

        match decision {
            ApprovalDecision::Approve => {
                let approvals = entry
                    .decisions
                    .iter()
                    .filter(|d| {
                        d.round == round
                            && d.level == level.level
                            && d.decision == ApprovalDecision::Approve
                    })
                    .count() as u32;
                if approvals >= level.min_approvals {
                    entry.current_level += 1;
                    if entry.current_level >= entry.chain.len() {
                        entry.status = ApprovalStatus::Approved;
                        entry.resolved_at = Some(now);
                    }
                }
            }
            ApprovalDecision::Reject => {
                entry.status = ApprovalStatus::Rejected;
                entry.resolved_at = Some(now);
            }
            ApprovalDecision::RequestRevision => {
                entry.status = ApprovalStatus::RevisionRequested;
            }
        }
        info!(
            tenant_id = %tenant_id,
            request_id = %request_id,
            decision = ?decision,
            status = ?entry.status,
            "Approval decision recorded"
        );
        Ok(entry.clone())
    }

    /// Restart a request sent back for revision at the first level.
    pub fn resubmit(
        &self,
        tenant_id: Uuid,
        request_id: Uuid,
        user_id: Uuid,
    ) -> GrcResult<ApprovalRequest> {
        let mut entry = self
            .approvals
            .get_mut(&request_id)
            .filter(|r| r.tenant_id == tenant_id)
            .ok_or_else(|| GrcError::not_found("ApprovalRequest", request_id))?;
        if entry.status != ApprovalStatus::RevisionRequested {
            return Err(GrcError::invalid_transition(entry.status, ApprovalStatus::Pending));
        }
        if entry.requested_by != user_id {
            return Err(GrcError::Forbidden("Only the requester can resubmit".into()));
        }
        entry.status = ApprovalStatus::Pending;
        entry.current_level = 0;
        entry.round += 1;
        info!(tenant_id = %tenant_id, request_id = %request_id, round = entry.round, "Approval resubmitted");
        Ok(entry.clone())
    }

    pub fn approval_history(
        &self,
        tenant_id: Uuid,
        request_id: Uuid,
    ) -> GrcResult<Vec<ApprovalRecord>> {
        Ok(self.get_approval(tenant_id, request_id)?.decisions)
    }

    /// Pending requests waiting on this user at their current level.
    pub fn pending_for(&self, tenant_id: Uuid, user_id: Uuid) -> Vec<ApprovalRequest> {
        self.approvals
            .iter()
            .filter(|r| r.tenant_id == tenant_id && r.awaits(user_id))
            .map(|r| r.value().clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
