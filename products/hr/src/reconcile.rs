//! Recomputes every denormalized copy (org chart, teams, HR rosters,
//! projects) from the employee records.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, instrument};

use crate::{
    record::{
        EmployeeRecord, HrRosterRecord, LeadSnapshot, OrgChartEntry, ProjectRecord, Role,
        TeamRecord,
    },
    store::{RecordStore, StoreResult, WriteBatch, WriteOp},
};

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub org_chart_refreshed: usize,
    pub org_chart_created: usize,
    pub org_chart_removed: usize,
    pub teams_refreshed: usize,
    pub teams_vacated: usize,
    pub teams_created: usize,
    pub rosters_refreshed: usize,
    pub rosters_vacated: usize,
    pub rosters_created: usize,
    pub projects_refreshed: usize,
    pub projects_cleared: usize,
}

impl ReconcileReport {
    pub fn total(&self) -> usize {
        self.org_chart_refreshed
            + self.org_chart_created
            + self.org_chart_removed
            + self.teams_refreshed
            + self.teams_vacated
            + self.teams_created
            + self.rosters_refreshed
            + self.rosters_vacated
            + self.rosters_created
            + self.projects_refreshed
            + self.projects_cleared
    }
}

/// Everything reconciliation reads, loaded up front.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub employees: Vec<EmployeeRecord>,
    pub org_chart: Vec<OrgChartEntry>,
    pub teams: Vec<TeamRecord>,
    pub hr_rosters: Vec<HrRosterRecord>,
    pub projects: Vec<ProjectRecord>,
}

impl Snapshot {
    pub async fn load(store: &dyn RecordStore) -> StoreResult<Self> {
        Ok(Self {
            employees: store.employees().await?,
            org_chart: store.org_chart_entries().await?,
            teams: store.teams().await?,
            hr_rosters: store.hr_rosters().await?,
            projects: store.projects().await?,
        })
    }
}

#[instrument(name = "hr.reconcile", skip_all)]
pub async fn reconcile(store: &dyn RecordStore) -> StoreResult<ReconcileReport> {
    let snapshot = Snapshot::load(store).await?;
    let (batch, report) = plan_reconciliation(&snapshot);
    if !batch.is_empty() {
        store.commit(batch).await?;
    }
    debug!(?report, "reconciliation finished");
    Ok(report)
}

pub fn plan_reconciliation(snapshot: &Snapshot) -> (WriteBatch, ReconcileReport) {
    let mut batch = WriteBatch::new();
    let mut report = ReconcileReport::default();
    let by_id: HashMap<&str, &EmployeeRecord> = snapshot
        .employees
        .iter()
        .map(|e| (e.employee_id.as_str(), e))
        .collect();

    plan_org_chart(snapshot, &by_id, &mut batch, &mut report);

    let teams: Vec<Slot<'_>> = snapshot
        .teams
        .iter()
        .map(|t| Slot {
            key: &t.team_id,
            holder: t.team_lead_id.as_deref(),
            name: t.team_lead_name.as_deref(),
            role: t.team_lead_role,
        })
        .collect();
    for action in plan_slots(&teams, &snapshot.employees, &by_id, Role::Manager, TeamRecord::key_for_lead) {
        match action {
            SlotAction::Assign { key, snapshot } => {
                report.teams_refreshed += 1;
                batch.push(WriteOp::SetTeamLead {
                    team_id: key,
                    lead: Some(snapshot),
                });
            }
            SlotAction::Vacate { key } => {
                report.teams_vacated += 1;
                batch.push(WriteOp::SetTeamLead {
                    team_id: key,
                    lead: None,
                });
            }
            SlotAction::Create { snapshot } => {
                report.teams_created += 1;
                batch.push(WriteOp::InsertTeam(TeamRecord::led_by(&snapshot)));
            }
        }
    }

    let rosters: Vec<Slot<'_>> = snapshot
        .hr_rosters
        .iter()
        .map(|r| Slot {
            key: &r.roster_id,
            holder: r.hr_id.as_deref(),
            name: r.hr_name.as_deref(),
            role: r.hr_role,
        })
        .collect();
    for action in plan_slots(&rosters, &snapshot.employees, &by_id, Role::Hr, HrRosterRecord::key_for_hr) {
        match action {
            SlotAction::Assign { key, snapshot } => {
                report.rosters_refreshed += 1;
                batch.push(WriteOp::SetHrRosterEntry {
                    roster_id: key,
                    hr: Some(snapshot),
                });
            }
            SlotAction::Vacate { key } => {
                report.rosters_vacated += 1;
                batch.push(WriteOp::SetHrRosterEntry {
                    roster_id: key,
                    hr: None,
                });
            }
            SlotAction::Create { snapshot } => {
                report.rosters_created += 1;
                batch.push(WriteOp::InsertHrRoster(HrRosterRecord::for_hr(&snapshot)));
            }
        }
    }

    for project in &snapshot.projects {
        let Some(manager_id) = project.manager_id.as_deref() else {
            continue;
        };
        match by_id.get(manager_id) {
            Some(manager) => {
                let fresh = LeadSnapshot::of(manager);
                if project.manager_name.as_deref() != Some(fresh.name.as_str())
                    || project.manager_role != Some(fresh.role)
                {
                    report.projects_refreshed += 1;
                    batch.push(WriteOp::SetProjectManager {
                        project_id: project.project_id.clone(),
                        manager: Some(fresh),
                    });
                }
            }
            None => {
                report.projects_cleared += 1;
                batch.push(WriteOp::SetProjectManager {
                    project_id: project.project_id.clone(),
                    manager: None,
                });
            }
        }
    }

    (batch, report)
}

fn plan_org_chart(
    snapshot: &Snapshot,
    by_id: &HashMap<&str, &EmployeeRecord>,
    batch: &mut WriteBatch,
    report: &mut ReconcileReport,
) {
    let mut covered = HashSet::new();
    for entry in &snapshot.org_chart {
        covered.insert(entry.employee_id.as_str());
        match by_id.get(entry.employee_id.as_str()) {
            Some(employee) => {
                let fresh = OrgChartEntry::snapshot(employee);
                if &fresh != entry {
                    report.org_chart_refreshed += 1;
                    batch.push(WriteOp::UpdateOrgChartEntry(fresh));
                }
            }
            None => {
                report.org_chart_removed += 1;
                batch.push(WriteOp::DeleteOrgChartEntry {
                    employee_id: entry.employee_id.clone(),
                });
            }
        }
    }
    for employee in &snapshot.employees {
        if covered.insert(employee.employee_id.as_str()) {
            report.org_chart_created += 1;
            batch.push(WriteOp::InsertOrgChartEntry(OrgChartEntry::snapshot(employee)));
        }
    }
}

/// A team or roster seen through the fields they share.
struct Slot<'a> {
    key: &'a str,
    holder: Option<&'a str>,
    name: Option<&'a str>,
    role: Option<Role>,
}

enum SlotAction {
    Assign { key: String, snapshot: LeadSnapshot },
    Vacate { key: String },
    Create { snapshot: LeadSnapshot },
}

/// Slots held by someone no longer in `role` are vacated, live holders are
/// refreshed, and every employee in `role` without a slot gets one (reusing
/// their vacated keyed slot when it exists).
fn plan_slots(
    slots: &[Slot<'_>],
    employees: &[EmployeeRecord],
    by_id: &HashMap<&str, &EmployeeRecord>,
    role: Role,
    key_for: fn(&str) -> String,
) -> Vec<SlotAction> {
    let mut actions = Vec::new();
    let mut held: HashSet<&str> = HashSet::new();
    let mut claimed: HashSet<&str> = HashSet::new();

    for slot in slots {
        let live = slot
            .holder
            .and_then(|id| by_id.get(id))
            .filter(|e| e.role == role && !held.contains(e.employee_id.as_str()));
        match live {
            Some(holder) => {
                held.insert(holder.employee_id.as_str());
                claimed.insert(slot.key);
                let fresh = LeadSnapshot::of(holder);
                if slot.name != Some(fresh.name.as_str()) || slot.role != Some(fresh.role) {
                    actions.push(SlotAction::Assign {
                        key: slot.key.to_string(),
                        snapshot: fresh,
                    });
                }
            }
            None => {
                if slot.holder.is_some() || slot.name.is_some() || slot.role.is_some() {
                    actions.push(SlotAction::Vacate {
                        key: slot.key.to_string(),
                    });
                }
            }
        }
    }

    for employee in employees.iter().filter(|e| e.role == role) {
        if held.contains(employee.employee_id.as_str()) {
            continue;
        }
        let key = key_for(&employee.employee_id);
        let snapshot = LeadSnapshot::of(employee);
        if claimed.contains(key.as_str()) {
            debug!(key = %key, employee_id = %employee.employee_id, "keyed slot held by another employee");
            continue;
        }
        held.insert(employee.employee_id.as_str());
        if slots.iter().any(|slot| slot.key == key) {
            actions.push(SlotAction::Assign { key, snapshot });
        } else {
            actions.push(SlotAction::Create { snapshot });
        }
    }
    actions
}
