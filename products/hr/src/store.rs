//! Seams to the record store and the caller's identity.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::{
    EmployeeRecord, EmployeeStatus, HrRosterRecord, LeadSnapshot, OrgChartEntry, ProjectRecord,
    Role, RoleChange, TeamRecord,
};

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum StoreError {
    #[error("record store unavailable: {0}")]
    Backend(String),
    #[error("write conflict: {0}")]
    Conflict(String),
    #[error("malformed record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A single mutation inside a [`WriteBatch`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum WriteOp {
    InsertEmployee(EmployeeRecord),
    UpdateEmployee {
        employee_id: String,
        role: Role,
        first_name: String,
        last_name: String,
        designation: String,
    },
    SetEmployeeStatus {
        employee_id: String,
        status: EmployeeStatus,
    },
    DeleteEmployee { employee_id: String },
    AppendRoleHistory {
        employee_id: String,
        change: RoleChange,
    },
    ClearManager { employee_id: String },
    InsertOrgChartEntry(OrgChartEntry),
    UpdateOrgChartEntry(OrgChartEntry),
    DeleteOrgChartEntry { employee_id: String },
    InsertTeam(TeamRecord),
    SetTeamLead {
        team_id: String,
        lead: Option<LeadSnapshot>,
    },
    InsertHrRoster(HrRosterRecord),
    SetHrRosterEntry {
        roster_id: String,
        hr: Option<LeadSnapshot>,
    },
    InsertProject(ProjectRecord),
    SetProjectManager {
        project_id: String,
        manager: Option<LeadSnapshot>,
    },
}

/// Ordered writes applied all-or-nothing by [`RecordStore::commit`].
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: WriteOp) {
        self.ops.push(op);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

impl From<Vec<WriteOp>> for WriteBatch {
    fn from(ops: Vec<WriteOp>) -> Self {
        Self { ops }
    }
}

impl Extend<WriteOp> for WriteBatch {
    fn extend<T: IntoIterator<Item = WriteOp>>(&mut self, iter: T) {
        self.ops.extend(iter);
    }
}

/// Query and batch-write surface of the hosted record store.
///
/// Lookups by business key return `Ok(None)` when nothing matches; only
/// transport or decoding failures are errors.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn employees(&self) -> StoreResult<Vec<EmployeeRecord>>;

    async fn employee(&self, employee_id: &str) -> StoreResult<Option<EmployeeRecord>>;

    async fn employees_managed_by(&self, manager_id: &str) -> StoreResult<Vec<EmployeeRecord>>;

    async fn org_chart_entries(&self) -> StoreResult<Vec<OrgChartEntry>>;

    async fn org_chart_entry(&self, employee_id: &str) -> StoreResult<Option<OrgChartEntry>>;

    async fn teams(&self) -> StoreResult<Vec<TeamRecord>>;

    async fn team(&self, team_id: &str) -> StoreResult<Option<TeamRecord>>;

    async fn team_led_by(&self, employee_id: &str) -> StoreResult<Option<TeamRecord>>;

    async fn hr_rosters(&self) -> StoreResult<Vec<HrRosterRecord>>;

    async fn hr_roster(&self, roster_id: &str) -> StoreResult<Option<HrRosterRecord>>;

    async fn hr_roster_for(&self, employee_id: &str) -> StoreResult<Option<HrRosterRecord>>;

    async fn projects(&self) -> StoreResult<Vec<ProjectRecord>>;

    /// Applies every op of `batch` or none of them.
    async fn commit(&self, batch: WriteBatch) -> StoreResult<()>;
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Who is acting; used to stamp `changed_by`.
pub trait IdentityProvider: Send + Sync {
    fn current_actor(&self) -> Option<Actor>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<Actor>);

impl StaticIdentity {
    pub fn new(actor: Actor) -> Self {
        Self(Some(actor))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_actor(&self) -> Option<Actor> {
        self.0.clone()
    }
}
