//! Role changes and the denormalized copies they touch.
//!
//! A change runs in phases: validate the request, read the records it
//! affects, plan the writes, commit them as one batch, then re-read the
//! employee to confirm the new role stuck. Only the commit is atomic; the
//! reads before it are not.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::{
    reconcile::reconcile,
    record::{
        EmployeeRecord, HrRosterRecord, LeadSnapshot, MAX_ID_LEN, MAX_TEXT_LEN, OrgChartEntry,
        Role, RoleChange, TeamRecord, check_width,
    },
    store::{Actor, IdentityProvider, RecordStore, StoreError, WriteBatch, WriteOp},
};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleChangeRequest {
    pub employee_id: String,
    /// Unparsed; rejected before any read when not an assignable role.
    pub new_role: String,
    pub first_name: String,
    pub last_name: String,
    pub designation: String,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CascadeErrorKind {
    Validation,
    NotFound,
    Discovery,
    Commit,
    Unverified,
}

#[derive(Debug, Error)]
pub enum CascadeError {
    #[error("invalid role change: {0}")]
    Validation(String),
    #[error("employee {0} not found")]
    NotFound(String),
    #[error("failed to load related records")]
    Discovery(#[source] StoreError),
    #[error("failed to commit role change")]
    Commit(#[source] StoreError),
    #[error("role change for {employee_id} not visible after commit: expected {expected}, found {found:?}")]
    Unverified {
        employee_id: String,
        expected: Role,
        found: Option<Role>,
    },
}

impl CascadeError {
    pub fn kind(&self) -> CascadeErrorKind {
        match self {
            CascadeError::Validation(_) => CascadeErrorKind::Validation,
            CascadeError::NotFound(_) => CascadeErrorKind::NotFound,
            CascadeError::Discovery(_) => CascadeErrorKind::Discovery,
            CascadeError::Commit(_) => CascadeErrorKind::Commit,
            CascadeError::Unverified { .. } => CascadeErrorKind::Unverified,
        }
    }

    /// Message shown to the person who asked for the change.
    pub fn user_message(&self) -> String {
        match self {
            CascadeError::Validation(reason) => reason.clone(),
            CascadeError::NotFound(_) => "Employee not found".to_string(),
            CascadeError::Discovery(_) | CascadeError::Commit(_) => {
                "Failed to update employee role".to_string()
            }
            CascadeError::Unverified { .. } => "Employee update could not be verified".to_string(),
        }
    }
}

/// Records a role change reads before planning.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Discovery {
    pub employee: EmployeeRecord,
    pub org_chart_entry: Option<OrgChartEntry>,
    /// Team led by the employee, or the vacated team keyed to them.
    pub team: Option<TeamRecord>,
    /// The team keyed to the employee is led by someone else, so none is
    /// created for them.
    pub team_key_taken: bool,
    /// HR roster naming the employee, or the vacated roster keyed to them.
    pub hr_roster: Option<HrRosterRecord>,
    pub roster_key_taken: bool,
    pub subordinates: Vec<EmployeeRecord>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CascadePlan {
    pub from: Role,
    pub to: Role,
    pub batch: WriteBatch,
}

impl CascadePlan {
    pub fn role_changed(&self) -> bool {
        self.from != self.to
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleChangeOutcome {
    pub employee: EmployeeRecord,
    pub from: Role,
    pub to: Role,
    pub writes: usize,
}

/// Parses and checks a request without touching the store.
pub fn validate_request(request: &RoleChangeRequest) -> Result<Role, CascadeError> {
    if request.employee_id.trim().is_empty() {
        return Err(CascadeError::Validation("employee id is required".into()));
    }
    if request.first_name.trim().is_empty() {
        return Err(CascadeError::Validation("first name is required".into()));
    }
    check_width("employee id", request.employee_id.trim(), MAX_ID_LEN)
        .and_then(|()| check_width("first name", request.first_name.trim(), MAX_TEXT_LEN))
        .and_then(|()| check_width("last name", request.last_name.trim(), MAX_TEXT_LEN))
        .and_then(|()| check_width("designation", request.designation.trim(), MAX_TEXT_LEN))
        .map_err(CascadeError::Validation)?;
    let role: Role = request
        .new_role
        .parse()
        .map_err(|err: crate::record::UnknownRole| CascadeError::Validation(err.to_string()))?;
    if !role.is_assignable() {
        return Err(CascadeError::Validation(format!(
            "role `{role}` cannot be assigned"
        )));
    }
    Ok(role)
}

/// Writes for one role change. Pure: the same inputs give the same plan.
pub fn plan_role_change(
    discovery: &Discovery,
    request: &RoleChangeRequest,
    new_role: Role,
    actor: &Actor,
    now: DateTime<Utc>,
) -> CascadePlan {
    let employee = &discovery.employee;
    let old_role = employee.role;
    let employee_id = employee.employee_id.clone();
    let mut batch = WriteBatch::new();

    let first_name = request.first_name.trim().to_string();
    let last_name = request.last_name.trim().to_string();
    let designation = request.designation.trim().to_string();
    let mut updated = employee.clone();
    updated.role = new_role;
    updated.first_name = first_name.clone();
    updated.last_name = last_name.clone();
    updated.designation = designation.clone();
    let snapshot = LeadSnapshot::of(&updated);

    batch.push(WriteOp::UpdateEmployee {
        employee_id: employee_id.clone(),
        role: new_role,
        first_name,
        last_name,
        designation,
    });

    if old_role != new_role {
        batch.push(WriteOp::AppendRoleHistory {
            employee_id: employee_id.clone(),
            change: RoleChange {
                from: old_role,
                to: new_role,
                timestamp: now,
                changed_by: actor.id.clone(),
            },
        });
    }

    if discovery.org_chart_entry.is_some() {
        batch.push(WriteOp::UpdateOrgChartEntry(OrgChartEntry::snapshot(
            &updated,
        )));
    }

    if new_role == Role::Manager {
        match &discovery.team {
            Some(team) => batch.push(WriteOp::SetTeamLead {
                team_id: team.team_id.clone(),
                lead: Some(snapshot.clone()),
            }),
            None if !discovery.team_key_taken => {
                batch.push(WriteOp::InsertTeam(TeamRecord::led_by(&snapshot)))
            }
            None => {}
        }
    } else if old_role == Role::Manager {
        if let Some(team) = &discovery.team {
            batch.push(WriteOp::SetTeamLead {
                team_id: team.team_id.clone(),
                lead: None,
            });
        }
    }

    if old_role == Role::Supermanager && new_role != Role::Supermanager {
        batch.extend(
            discovery
                .subordinates
                .iter()
                .map(|sub| WriteOp::ClearManager {
                    employee_id: sub.employee_id.clone(),
                }),
        );
    }

    if new_role == Role::Hr {
        match &discovery.hr_roster {
            Some(roster) => batch.push(WriteOp::SetHrRosterEntry {
                roster_id: roster.roster_id.clone(),
                hr: Some(snapshot),
            }),
            None if !discovery.roster_key_taken => {
                batch.push(WriteOp::InsertHrRoster(HrRosterRecord::for_hr(&snapshot)))
            }
            None => {}
        }
    } else if old_role == Role::Hr {
        if let Some(roster) = &discovery.hr_roster {
            batch.push(WriteOp::SetHrRosterEntry {
                roster_id: roster.roster_id.clone(),
                hr: None,
            });
        }
    }

    CascadePlan {
        from: old_role,
        to: new_role,
        batch,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CascadeOptions {
    /// Run a full reconciliation after an unverified commit.
    pub repair_on_mismatch: bool,
}

#[derive(Clone)]
pub struct RoleCascade {
    store: Arc<dyn RecordStore>,
    identity: Arc<dyn IdentityProvider>,
    options: CascadeOptions,
}

impl RoleCascade {
    pub fn new(store: Arc<dyn RecordStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            store,
            identity,
            options: CascadeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CascadeOptions) -> Self {
        self.options = options;
        self
    }

    #[instrument(
        name = "hr.role_change",
        skip_all,
        fields(employee_id = %request.employee_id, new_role = %request.new_role)
    )]
    pub async fn apply_role_change(
        &self,
        request: RoleChangeRequest,
    ) -> Result<RoleChangeOutcome, CascadeError> {
        let new_role = validate_request(&request)?;
        let actor = self
            .identity
            .current_actor()
            .ok_or_else(|| CascadeError::Validation("no acting identity".into()))?;
        check_width("actor id", &actor.id, MAX_ID_LEN).map_err(CascadeError::Validation)?;

        let discovery = self.discover(request.employee_id.trim(), new_role).await?;
        let plan = plan_role_change(&discovery, &request, new_role, &actor, Utc::now());
        let writes = plan.batch.len();
        let employee_id = discovery.employee.employee_id.clone();

        self.store
            .commit(plan.batch)
            .await
            .map_err(CascadeError::Commit)?;
        info!(from = %plan.from, to = %plan.to, writes, "role change committed");

        match self.verify(&employee_id, new_role).await {
            Ok(employee) => Ok(RoleChangeOutcome {
                employee,
                from: plan.from,
                to: plan.to,
                writes,
            }),
            Err(err) => {
                warn!(error = %err, "role change could not be verified");
                if self.options.repair_on_mismatch {
                    match reconcile(self.store.as_ref()).await {
                        Ok(report) => info!(?report, "denormalized records reconciled"),
                        Err(repair_err) => warn!(error = %repair_err, "reconciliation failed"),
                    }
                }
                Err(err)
            }
        }
    }

    /// Reads the employee and every related record the plan may touch.
    pub async fn discover(
        &self,
        employee_id: &str,
        new_role: Role,
    ) -> Result<Discovery, CascadeError> {
        let employee = self
            .store
            .employee(employee_id)
            .await
            .map_err(CascadeError::Discovery)?
            .ok_or_else(|| CascadeError::NotFound(employee_id.to_string()))?;
        let old_role = employee.role;
        let involves = |role: Role| old_role == role || new_role == role;

        let org_chart_entry = self
            .store
            .org_chart_entry(employee_id)
            .await
            .map_err(CascadeError::Discovery)?;

        let (team, team_key_taken) = if involves(Role::Manager) {
            match self
                .store
                .team_led_by(employee_id)
                .await
                .map_err(CascadeError::Discovery)?
            {
                Some(team) => (Some(team), false),
                None => {
                    let keyed = self
                        .store
                        .team(&TeamRecord::key_for_lead(employee_id))
                        .await
                        .map_err(CascadeError::Discovery)?;
                    match keyed {
                        Some(team) if team.team_lead_id.is_some() => {
                            warn!(team_id = %team.team_id, "keyed team is led by another employee");
                            (None, true)
                        }
                        keyed => (keyed, false),
                    }
                }
            }
        } else {
            (None, false)
        };

        let (hr_roster, roster_key_taken) = if involves(Role::Hr) {
            match self
                .store
                .hr_roster_for(employee_id)
                .await
                .map_err(CascadeError::Discovery)?
            {
                Some(roster) => (Some(roster), false),
                None => {
                    let keyed = self
                        .store
                        .hr_roster(&HrRosterRecord::key_for_hr(employee_id))
                        .await
                        .map_err(CascadeError::Discovery)?;
                    match keyed {
                        Some(roster) if roster.hr_id.is_some() => {
                            warn!(roster_id = %roster.roster_id, "keyed roster names another employee");
                            (None, true)
                        }
                        keyed => (keyed, false),
                    }
                }
            }
        } else {
            (None, false)
        };

        let subordinates = if involves(Role::Supermanager) {
            self.store
                .employees_managed_by(employee_id)
                .await
                .map_err(CascadeError::Discovery)?
        } else {
            Vec::new()
        };

        Ok(Discovery {
            employee,
            org_chart_entry,
            team,
            team_key_taken,
            hr_roster,
            roster_key_taken,
            subordinates,
        })
    }

    async fn verify(&self, employee_id: &str, expected: Role) -> Result<EmployeeRecord, CascadeError> {
        let reread = self.store.employee(employee_id).await;
        match reread {
            Ok(Some(employee)) if employee.role == expected => Ok(employee),
            Ok(found) => Err(CascadeError::Unverified {
                employee_id: employee_id.to_string(),
                expected,
                found: found.map(|e| e.role),
            }),
            Err(err) => {
                warn!(error = %err, "re-read after commit failed");
                Err(CascadeError::Unverified {
                    employee_id: employee_id.to_string(),
                    expected,
                    found: None,
                })
            }
        }
    }
}
