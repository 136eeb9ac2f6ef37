//! In-process [`RecordStore`] used by tests and local development.
//!
//! Batches are applied to a copy of the collections and swapped in only when
//! every op succeeds.

use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    record::{
        EmployeeRecord, HrRosterRecord, LeadSnapshot, OrgChartEntry, ProjectRecord, Role,
        TeamRecord,
    },
    store::{RecordStore, StoreError, StoreResult, WriteBatch, WriteOp},
};

#[derive(Debug, Clone, Default)]
struct Collections {
    employees: Vec<EmployeeRecord>,
    org_chart: Vec<OrgChartEntry>,
    teams: Vec<TeamRecord>,
    hr_rosters: Vec<HrRosterRecord>,
    projects: Vec<ProjectRecord>,
}

#[derive(Debug, Default)]
struct Faults {
    fail_next_commit: Option<StoreError>,
    fail_reads: Option<StoreError>,
    race_after_commit: Option<(String, Role)>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: RwLock<Collections>,
    faults: Mutex<Faults>,
    commits: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_employees(employees: Vec<EmployeeRecord>) -> Self {
        let org_chart = employees.iter().map(OrgChartEntry::snapshot).collect();
        Self {
            data: RwLock::new(Collections {
                employees: employees.into_iter().map(EmployeeRecord::normalized).collect(),
                org_chart,
                ..Collections::default()
            }),
            ..Self::default()
        }
    }

    pub async fn seed_team(&self, team: TeamRecord) {
        self.data.write().await.teams.push(team);
    }

    pub async fn seed_hr_roster(&self, roster: HrRosterRecord) {
        self.data.write().await.hr_rosters.push(roster);
    }

    pub async fn seed_project(&self, project: ProjectRecord) {
        self.data.write().await.projects.push(project);
    }

    /// Number of batches that committed successfully.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Makes the next `commit` fail with `err` without applying anything.
    pub fn fail_next_commit(&self, err: StoreError) {
        self.faults().fail_next_commit = Some(err);
    }

    /// Makes every read fail with `err` until cleared with `None`.
    pub fn fail_reads(&self, err: Option<StoreError>) {
        self.faults().fail_reads = err;
    }

    /// After the next successful commit, overwrites `employee_id`'s role as a
    /// concurrent session would.
    pub fn race_after_commit(&self, employee_id: impl Into<String>, role: Role) {
        self.faults().race_after_commit = Some((employee_id.into(), role));
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_reads(&self) -> StoreResult<()> {
        match &self.faults().fail_reads {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn employees(&self) -> StoreResult<Vec<EmployeeRecord>> {
        self.check_reads()?;
        Ok(self.data.read().await.employees.clone())
    }

    async fn employee(&self, employee_id: &str) -> StoreResult<Option<EmployeeRecord>> {
        self.check_reads()?;
        let data = self.data.read().await;
        Ok(data
            .employees
            .iter()
            .find(|e| e.employee_id == employee_id)
            .cloned())
    }

    async fn employees_managed_by(&self, manager_id: &str) -> StoreResult<Vec<EmployeeRecord>> {
        self.check_reads()?;
        let data = self.data.read().await;
        Ok(data
            .employees
            .iter()
            .filter(|e| e.manager_id.as_deref() == Some(manager_id))
            .cloned()
            .collect())
    }

    async fn org_chart_entries(&self) -> StoreResult<Vec<OrgChartEntry>> {
        self.check_reads()?;
        Ok(self.data.read().await.org_chart.clone())
    }

    async fn org_chart_entry(&self, employee_id: &str) -> StoreResult<Option<OrgChartEntry>> {
        self.check_reads()?;
        let data = self.data.read().await;
        Ok(data
            .org_chart
            .iter()
            .find(|e| e.employee_id == employee_id)
            .cloned())
    }

    async fn teams(&self) -> StoreResult<Vec<TeamRecord>> {
        self.check_reads()?;
        Ok(self.data.read().await.teams.clone())
    }

    async fn team(&self, team_id: &str) -> StoreResult<Option<TeamRecord>> {
        self.check_reads()?;
        let data = self.data.read().await;
        Ok(data.teams.iter().find(|t| t.team_id == team_id).cloned())
    }

    async fn team_led_by(&self, employee_id: &str) -> StoreResult<Option<TeamRecord>> {
        self.check_reads()?;
        let data = self.data.read().await;
        Ok(data
            .teams
            .iter()
            .find(|t| t.team_lead_id.as_deref() == Some(employee_id))
            .cloned())
    }

    async fn hr_rosters(&self) -> StoreResult<Vec<HrRosterRecord>> {
        self.check_reads()?;
        Ok(self.data.read().await.hr_rosters.clone())
    }

    async fn hr_roster(&self, roster_id: &str) -> StoreResult<Option<HrRosterRecord>> {
        self.check_reads()?;
        let data = self.data.read().await;
        Ok(data
            .hr_rosters
            .iter()
            .find(|r| r.roster_id == roster_id)
            .cloned())
    }

    async fn hr_roster_for(&self, employee_id: &str) -> StoreResult<Option<HrRosterRecord>> {
        self.check_reads()?;
        let data = self.data.read().await;
        Ok(data
            .hr_rosters
            .iter()
            .find(|r| r.hr_id.as_deref() == Some(employee_id))
            .cloned())
    }

    async fn projects(&self) -> StoreResult<Vec<ProjectRecord>> {
        self.check_reads()?;
        Ok(self.data.read().await.projects.clone())
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let injected = self.faults().fail_next_commit.take();
        if let Some(err) = injected {
            return Err(err);
        }
        let mut data = self.data.write().await;
        let mut next = data.clone();
        for op in batch.into_ops() {
            apply(&mut next, op)?;
        }
        let race = self.faults().race_after_commit.take();
        if let Some((employee_id, role)) = race {
            if let Some(record) = next
                .employees
                .iter_mut()
                .find(|e| e.employee_id == employee_id)
            {
                record.role = role;
            }
        }
        *data = next;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn apply(data: &mut Collections, op: WriteOp) -> StoreResult<()> {
    match op {
        WriteOp::InsertEmployee(record) => {
            if data
                .employees
                .iter()
                .any(|e| e.employee_id == record.employee_id)
            {
                return Err(StoreError::Conflict(format!(
                    "employee {} already exists",
                    record.employee_id
                )));
            }
            data.employees.push(record.normalized());
        }
        WriteOp::UpdateEmployee {
            employee_id,
            role,
            first_name,
            last_name,
            designation,
        } => {
            let record = employee_mut(data, &employee_id)?;
            record.role = role;
            record.first_name = first_name;
            record.last_name = last_name;
            record.designation = designation;
        }
        WriteOp::SetEmployeeStatus {
            employee_id,
            status,
        } => employee_mut(data, &employee_id)?.status = status,
        WriteOp::DeleteEmployee { employee_id } => {
            let before = data.employees.len();
            data.employees.retain(|e| e.employee_id != employee_id);
            if data.employees.len() == before {
                return Err(missing("employee", &employee_id));
            }
        }
        WriteOp::AppendRoleHistory {
            employee_id,
            change,
        } => employee_mut(data, &employee_id)?.role_history.push(change),
        WriteOp::ClearManager { employee_id } => employee_mut(data, &employee_id)?.manager_id = None,
        WriteOp::InsertOrgChartEntry(entry) => {
            if data
                .org_chart
                .iter()
                .any(|e| e.employee_id == entry.employee_id)
            {
                return Err(StoreError::Conflict(format!(
                    "org chart entry {} already exists",
                    entry.employee_id
                )));
            }
            data.org_chart.push(entry);
        }
        WriteOp::UpdateOrgChartEntry(entry) => {
            let slot = data
                .org_chart
                .iter_mut()
                .find(|e| e.employee_id == entry.employee_id)
                .ok_or_else(|| missing("org chart entry", &entry.employee_id))?;
            *slot = entry;
        }
        WriteOp::DeleteOrgChartEntry { employee_id } => {
            data.org_chart.retain(|e| e.employee_id != employee_id);
        }
        WriteOp::InsertTeam(team) => {
            if data.teams.iter().any(|t| t.team_id == team.team_id) {
                return Err(StoreError::Conflict(format!(
                    "team {} already exists",
                    team.team_id
                )));
            }
            data.teams.push(team);
        }
        WriteOp::SetTeamLead { team_id, lead } => {
            let team = data
                .teams
                .iter_mut()
                .find(|t| t.team_id == team_id)
                .ok_or_else(|| missing("team", &team_id))?;
            let (id, name, role) = split_snapshot(lead);
            team.team_lead_id = id;
            team.team_lead_name = name;
            team.team_lead_role = role;
        }
        WriteOp::InsertHrRoster(roster) => {
            if data
                .hr_rosters
                .iter()
                .any(|r| r.roster_id == roster.roster_id)
            {
                return Err(StoreError::Conflict(format!(
                    "hr roster {} already exists",
                    roster.roster_id
                )));
            }
            data.hr_rosters.push(roster);
        }
        WriteOp::SetHrRosterEntry { roster_id, hr } => {
            let roster = data
                .hr_rosters
                .iter_mut()
                .find(|r| r.roster_id == roster_id)
                .ok_or_else(|| missing("hr roster", &roster_id))?;
            let (id, name, role) = split_snapshot(hr);
            roster.hr_id = id;
            roster.hr_name = name;
            roster.hr_role = role;
        }
        WriteOp::InsertProject(project) => {
            if data
                .projects
                .iter()
                .any(|p| p.project_id == project.project_id)
            {
                return Err(StoreError::Conflict(format!(
                    "project {} already exists",
                    project.project_id
                )));
            }
            data.projects.push(project);
        }
        WriteOp::SetProjectManager {
            project_id,
            manager,
        } => {
            let project = data
                .projects
                .iter_mut()
                .find(|p| p.project_id == project_id)
                .ok_or_else(|| missing("project", &project_id))?;
            let (id, name, role) = split_snapshot(manager);
            project.manager_id = id;
            project.manager_name = name;
            project.manager_role = role;
        }
    }
    Ok(())
}

fn employee_mut<'a>(
    data: &'a mut Collections,
    employee_id: &str,
) -> StoreResult<&'a mut EmployeeRecord> {
    data.employees
        .iter_mut()
        .find(|e| e.employee_id == employee_id)
        .ok_or_else(|| missing("employee", employee_id))
}

fn split_snapshot(snapshot: Option<LeadSnapshot>) -> (Option<String>, Option<String>, Option<Role>) {
    match snapshot {
        Some(s) => (Some(s.employee_id), Some(s.name), Some(s.role)),
        None => (None, None, None),
    }
}

fn missing(kind: &str, id: &str) -> StoreError {
    StoreError::Conflict(format!("{kind} {id} not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Role;

    #[tokio::test]
    async fn failed_op_leaves_the_store_untouched() {
        let store = InMemoryStore::with_employees(vec![EmployeeRecord::new(
            "E1",
            Role::Employee,
            "Ada",
            "Lovelace",
        )]);
        let batch = WriteBatch::from(vec![
            WriteOp::ClearManager {
                employee_id: "E1".into(),
            },
            WriteOp::SetEmployeeStatus {
                employee_id: "E1".into(),
                status: crate::record::EmployeeStatus::Inactive,
            },
            WriteOp::ClearManager {
                employee_id: "missing".into(),
            },
        ]);
        let err = store.commit(batch).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.commit_count(), 0);
        let record = store.employee("E1").await.unwrap().unwrap();
        assert!(record.is_active());
    }

    #[tokio::test]
    async fn injected_commit_failure_fires_once() {
        let store = InMemoryStore::new();
        store.fail_next_commit(StoreError::Backend("offline".into()));
        assert!(store.commit(WriteBatch::new()).await.is_err());
        assert!(store.commit(WriteBatch::new()).await.is_ok());
        assert_eq!(store.commit_count(), 1);
    }

    #[tokio::test]
    async fn seeding_employees_creates_org_chart_entries() {
        let store = InMemoryStore::with_employees(vec![
            EmployeeRecord::new("E1", Role::Manager, "Grace", "Hopper").with_designation("CTO"),
        ]);
        let entry = store.org_chart_entry("E1").await.unwrap().unwrap();
        assert_eq!(entry.name, "Grace Hopper");
        assert_eq!(entry.title, "CTO");
        assert_eq!(entry.role, Role::Manager);
    }
}
