use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use entity::{employees, hr_roster, org_chart, projects, role_history, teams};
use products_hr::{
    EmployeeRecord, EmployeeStatus, HrRosterRecord, LeadSnapshot, OrgChartEntry, ProjectRecord,
    RecordStore, Role, RoleChange, StoreError, StoreResult, TeamRecord, WriteBatch, WriteOp,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, Set, TransactionTrait,
    prelude::DateTimeWithTimeZone,
};
use tracing::instrument;
use uuid::Uuid;

/// [`RecordStore`] over the tables created by the `migration` crate.
///
/// Each batch runs inside one database transaction.
#[derive(Clone, Debug)]
pub struct SeaOrmRecordStore {
    db: DatabaseConnection,
}

impl SeaOrmRecordStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn history_for(&self, employee_id: &str) -> StoreResult<Vec<RoleChange>> {
        let rows = role_history::Entity::find()
            .filter(role_history::Column::EmployeeId.eq(employee_id))
            .order_by_asc(role_history::Column::Id)
            .all(&self.db)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(role_change).collect())
    }

    async fn hydrate(&self, models: Vec<employees::Model>) -> StoreResult<Vec<EmployeeRecord>> {
        let mut history: HashMap<String, Vec<RoleChange>> = HashMap::new();
        if !models.is_empty() {
            let ids: Vec<String> = models.iter().map(|m| m.employee_id.clone()).collect();
            let rows = role_history::Entity::find()
                .filter(role_history::Column::EmployeeId.is_in(ids))
                .order_by_asc(role_history::Column::Id)
                .all(&self.db)
                .await
                .map_err(store_error)?;
            for row in rows {
                history
                    .entry(row.employee_id.clone())
                    .or_default()
                    .push(role_change(row));
            }
        }
        Ok(models
            .into_iter()
            .map(|model| {
                let changes = history.remove(&model.employee_id).unwrap_or_default();
                employee_record(model, changes)
            })
            .collect())
    }
}

#[async_trait]
impl RecordStore for SeaOrmRecordStore {
    async fn employees(&self) -> StoreResult<Vec<EmployeeRecord>> {
        let models = employees::Entity::find()
            .order_by_asc(employees::Column::CreatedAt)
            .order_by_asc(employees::Column::EmployeeId)
            .all(&self.db)
            .await
            .map_err(store_error)?;
        self.hydrate(models).await
    }

    async fn employee(&self, employee_id: &str) -> StoreResult<Option<EmployeeRecord>> {
        let Some(model) = find_employee(&self.db, employee_id).await? else {
            return Ok(None);
        };
        let history = self.history_for(employee_id).await?;
        Ok(Some(employee_record(model, history)))
    }

    async fn employees_managed_by(&self, manager_id: &str) -> StoreResult<Vec<EmployeeRecord>> {
        let models = employees::Entity::find()
            .filter(employees::Column::ManagerId.eq(manager_id))
            .order_by_asc(employees::Column::CreatedAt)
            .order_by_asc(employees::Column::EmployeeId)
            .all(&self.db)
            .await
            .map_err(store_error)?;
        self.hydrate(models).await
    }

    async fn org_chart_entries(&self) -> StoreResult<Vec<OrgChartEntry>> {
        let rows = org_chart::Entity::find()
            .order_by_asc(org_chart::Column::EmployeeId)
            .all(&self.db)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(org_chart_entry).collect())
    }

    async fn org_chart_entry(&self, employee_id: &str) -> StoreResult<Option<OrgChartEntry>> {
        let row = org_chart::Entity::find_by_id(employee_id.to_string())
            .one(&self.db)
            .await
            .map_err(store_error)?;
        Ok(row.map(org_chart_entry))
    }

    async fn teams(&self) -> StoreResult<Vec<TeamRecord>> {
        let rows = teams::Entity::find()
            .order_by_asc(teams::Column::TeamId)
            .all(&self.db)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(team_record).collect())
    }

    async fn team(&self, team_id: &str) -> StoreResult<Option<TeamRecord>> {
        let row = teams::Entity::find_by_id(team_id.to_string())
            .one(&self.db)
            .await
            .map_err(store_error)?;
        Ok(row.map(team_record))
    }

    async fn team_led_by(&self, employee_id: &str) -> StoreResult<Option<TeamRecord>> {
        let row = teams::Entity::find()
            .filter(teams::Column::TeamLeadId.eq(employee_id))
            .order_by_asc(teams::Column::TeamId)
            .one(&self.db)
            .await
            .map_err(store_error)?;
        Ok(row.map(team_record))
    }

    async fn hr_rosters(&self) -> StoreResult<Vec<HrRosterRecord>> {
        let rows = hr_roster::Entity::find()
            .order_by_asc(hr_roster::Column::RosterId)
            .all(&self.db)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(roster_record).collect())
    }

    async fn hr_roster(&self, roster_id: &str) -> StoreResult<Option<HrRosterRecord>> {
        let row = hr_roster::Entity::find_by_id(roster_id.to_string())
            .one(&self.db)
            .await
            .map_err(store_error)?;
        Ok(row.map(roster_record))
    }

    async fn hr_roster_for(&self, employee_id: &str) -> StoreResult<Option<HrRosterRecord>> {
        let row = hr_roster::Entity::find()
            .filter(hr_roster::Column::HrId.eq(employee_id))
            .order_by_asc(hr_roster::Column::RosterId)
            .one(&self.db)
            .await
            .map_err(store_error)?;
        Ok(row.map(roster_record))
    }

    async fn projects(&self) -> StoreResult<Vec<ProjectRecord>> {
        let rows = projects::Entity::find()
            .order_by_asc(projects::Column::ProjectId)
            .all(&self.db)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(project_record).collect())
    }

    #[instrument(name = "db.commit", skip_all, fields(ops = batch.len()))]
    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let txn = self.db.begin().await.map_err(store_error)?;
        let now = Utc::now();
        for (position, op) in batch.into_ops().into_iter().enumerate() {
            // Dropping `txn` on error rolls the whole batch back.
            let stamp = (now + Duration::microseconds(position as i64)).into();
            apply(&txn, op, stamp).await?;
        }
        txn.commit().await.map_err(store_error)
    }
}

async fn apply<C: ConnectionTrait>(
    db: &C,
    op: WriteOp,
    now: DateTimeWithTimeZone,
) -> StoreResult<()> {
    match op {
        WriteOp::InsertEmployee(record) => {
            let record = record.normalized();
            if find_employee(db, &record.employee_id).await?.is_some() {
                return Err(StoreError::Conflict(format!(
                    "employee {} already exists",
                    record.employee_id
                )));
            }
            employees::ActiveModel {
                id: Set(Uuid::new_v4()),
                employee_id: Set(record.employee_id.clone()),
                manager_id: Set(record.manager_id),
                super_manager_id: Set(record.super_manager_id),
                role: Set(to_db_role(record.role)),
                first_name: Set(record.first_name),
                last_name: Set(record.last_name),
                designation: Set(record.designation),
                department: Set(record.department),
                status: Set(to_db_status(record.status)),
                assigned_project: Set(record.assigned_project),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(db)
            .await
            .map_err(store_error)?;
            for change in record.role_history {
                insert_history(db, &record.employee_id, change).await?;
            }
        }
        WriteOp::UpdateEmployee {
            employee_id,
            role,
            first_name,
            last_name,
            designation,
        } => {
            let mut active = require_employee(db, &employee_id).await?.into_active_model();
            active.role = Set(to_db_role(role));
            active.first_name = Set(first_name);
            active.last_name = Set(last_name);
            active.designation = Set(designation);
            active.updated_at = Set(now);
            active.update(db).await.map_err(store_error)?;
        }
        WriteOp::SetEmployeeStatus {
            employee_id,
            status,
        } => {
            let mut active = require_employee(db, &employee_id).await?.into_active_model();
            active.status = Set(to_db_status(status));
            active.updated_at = Set(now);
            active.update(db).await.map_err(store_error)?;
        }
        WriteOp::DeleteEmployee { employee_id } => {
            // SQLite leaves foreign keys unenforced by default, so history
            // goes explicitly rather than through the cascade.
            role_history::Entity::delete_many()
                .filter(role_history::Column::EmployeeId.eq(employee_id.as_str()))
                .exec(db)
                .await
                .map_err(store_error)?;
            let result = employees::Entity::delete_many()
                .filter(employees::Column::EmployeeId.eq(employee_id.as_str()))
                .exec(db)
                .await
                .map_err(store_error)?;
            if result.rows_affected == 0 {
                return Err(missing("employee", &employee_id));
            }
        }
        WriteOp::AppendRoleHistory {
            employee_id,
            change,
        } => {
            require_employee(db, &employee_id).await?;
            insert_history(db, &employee_id, change).await?;
        }
        WriteOp::ClearManager { employee_id } => {
            let mut active = require_employee(db, &employee_id).await?.into_active_model();
            active.manager_id = Set(None);
            active.updated_at = Set(now);
            active.update(db).await.map_err(store_error)?;
        }
        WriteOp::InsertOrgChartEntry(entry) => {
            let existing = org_chart::Entity::find_by_id(entry.employee_id.clone())
                .one(db)
                .await
                .map_err(store_error)?;
            if existing.is_some() {
                return Err(StoreError::Conflict(format!(
                    "org chart entry {} already exists",
                    entry.employee_id
                )));
            }
            org_chart::ActiveModel {
                employee_id: Set(entry.employee_id),
                name: Set(entry.name),
                role: Set(to_db_role(entry.role)),
                title: Set(entry.title),
            }
            .insert(db)
            .await
            .map_err(store_error)?;
        }
        WriteOp::UpdateOrgChartEntry(entry) => {
            let mut active = org_chart::Entity::find_by_id(entry.employee_id.clone())
                .one(db)
                .await
                .map_err(store_error)?
                .ok_or_else(|| missing("org chart entry", &entry.employee_id))?
                .into_active_model();
            active.name = Set(entry.name);
            active.role = Set(to_db_role(entry.role));
            active.title = Set(entry.title);
            active.update(db).await.map_err(store_error)?;
        }
        WriteOp::DeleteOrgChartEntry { employee_id } => {
            org_chart::Entity::delete_by_id(employee_id)
                .exec(db)
                .await
                .map_err(store_error)?;
        }
        WriteOp::InsertTeam(team) => {
            let existing = teams::Entity::find_by_id(team.team_id.clone())
                .one(db)
                .await
                .map_err(store_error)?;
            if existing.is_some() {
                return Err(StoreError::Conflict(format!(
                    "team {} already exists",
                    team.team_id
                )));
            }
            teams::ActiveModel {
                team_id: Set(team.team_id),
                name: Set(team.name),
                team_lead_id: Set(team.team_lead_id),
                team_lead_name: Set(team.team_lead_name),
                team_lead_role: Set(team.team_lead_role.map(to_db_role)),
            }
            .insert(db)
            .await
            .map_err(store_error)?;
        }
        WriteOp::SetTeamLead { team_id, lead } => {
            let mut active = teams::Entity::find_by_id(team_id.clone())
                .one(db)
                .await
                .map_err(store_error)?
                .ok_or_else(|| missing("team", &team_id))?
                .into_active_model();
            let (id, name, role) = split_snapshot(lead);
            active.team_lead_id = Set(id);
            active.team_lead_name = Set(name);
            active.team_lead_role = Set(role);
            active.update(db).await.map_err(store_error)?;
        }
        WriteOp::InsertHrRoster(roster) => {
            let existing = hr_roster::Entity::find_by_id(roster.roster_id.clone())
                .one(db)
                .await
                .map_err(store_error)?;
            if existing.is_some() {
                return Err(StoreError::Conflict(format!(
                    "hr roster {} already exists",
                    roster.roster_id
                )));
            }
            hr_roster::ActiveModel {
                roster_id: Set(roster.roster_id),
                hr_id: Set(roster.hr_id),
                hr_name: Set(roster.hr_name),
                hr_role: Set(roster.hr_role.map(to_db_role)),
            }
            .insert(db)
            .await
            .map_err(store_error)?;
        }
        WriteOp::SetHrRosterEntry { roster_id, hr } => {
            let mut active = hr_roster::Entity::find_by_id(roster_id.clone())
                .one(db)
                .await
                .map_err(store_error)?
                .ok_or_else(|| missing("hr roster", &roster_id))?
                .into_active_model();
            let (id, name, role) = split_snapshot(hr);
            active.hr_id = Set(id);
            active.hr_name = Set(name);
            active.hr_role = Set(role);
            active.update(db).await.map_err(store_error)?;
        }
        WriteOp::InsertProject(project) => {
            let existing = projects::Entity::find_by_id(project.project_id.clone())
                .one(db)
                .await
                .map_err(store_error)?;
            if existing.is_some() {
                return Err(StoreError::Conflict(format!(
                    "project {} already exists",
                    project.project_id
                )));
            }
            projects::ActiveModel {
                project_id: Set(project.project_id),
                name: Set(project.name),
                manager_id: Set(project.manager_id),
                manager_name: Set(project.manager_name),
                manager_role: Set(project.manager_role.map(to_db_role)),
            }
            .insert(db)
            .await
            .map_err(store_error)?;
        }
        WriteOp::SetProjectManager {
            project_id,
            manager,
        } => {
            let mut active = projects::Entity::find_by_id(project_id.clone())
                .one(db)
                .await
                .map_err(store_error)?
                .ok_or_else(|| missing("project", &project_id))?
                .into_active_model();
            let (id, name, role) = split_snapshot(manager);
            active.manager_id = Set(id);
            active.manager_name = Set(name);
            active.manager_role = Set(role);
            active.update(db).await.map_err(store_error)?;
        }
    }
    Ok(())
}

async fn find_employee<C: ConnectionTrait>(
    db: &C,
    employee_id: &str,
) -> StoreResult<Option<employees::Model>> {
    employees::Entity::find()
        .filter(employees::Column::EmployeeId.eq(employee_id))
        .one(db)
        .await
        .map_err(store_error)
}

async fn require_employee<C: ConnectionTrait>(
    db: &C,
    employee_id: &str,
) -> StoreResult<employees::Model> {
    find_employee(db, employee_id)
        .await?
        .ok_or_else(|| missing("employee", employee_id))
}

async fn insert_history<C: ConnectionTrait>(
    db: &C,
    employee_id: &str,
    change: RoleChange,
) -> StoreResult<()> {
    role_history::ActiveModel {
        employee_id: Set(employee_id.to_string()),
        from_role: Set(to_db_role(change.from)),
        to_role: Set(to_db_role(change.to)),
        changed_at: Set(change.timestamp.into()),
        changed_by: Set(change.changed_by),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(store_error)?;
    Ok(())
}

fn split_snapshot(
    snapshot: Option<LeadSnapshot>,
) -> (Option<String>, Option<String>, Option<entity::Role>) {
    match snapshot {
        Some(s) => (Some(s.employee_id), Some(s.name), Some(to_db_role(s.role))),
        None => (None, None, None),
    }
}

/// Rows that do not decode into records are corrupt; everything else is
/// the database being unavailable or refusing the statement.
fn store_error(err: DbErr) -> StoreError {
    match err {
        DbErr::Type(_) | DbErr::Json(_) | DbErr::TryIntoErr { .. } => {
            StoreError::Corrupt(err.to_string())
        }
        _ => StoreError::Backend(err.to_string()),
    }
}

fn missing(kind: &str, id: &str) -> StoreError {
    StoreError::Conflict(format!("{kind} {id} not found"))
}

fn employee_record(model: employees::Model, role_history: Vec<RoleChange>) -> EmployeeRecord {
    EmployeeRecord {
        employee_id: model.employee_id,
        manager_id: model.manager_id,
        super_manager_id: model.super_manager_id,
        role: from_db_role(model.role),
        first_name: model.first_name,
        last_name: model.last_name,
        designation: model.designation,
        department: model.department,
        status: match model.status {
            entity::Status::Active => EmployeeStatus::Active,
            entity::Status::Inactive => EmployeeStatus::Inactive,
        },
        assigned_project: model.assigned_project,
        role_history,
    }
    .normalized()
}

fn role_change(row: role_history::Model) -> RoleChange {
    RoleChange {
        from: from_db_role(row.from_role),
        to: from_db_role(row.to_role),
        timestamp: row.changed_at.with_timezone(&Utc),
        changed_by: row.changed_by,
    }
}

fn org_chart_entry(row: org_chart::Model) -> OrgChartEntry {
    OrgChartEntry {
        employee_id: row.employee_id,
        name: row.name,
        role: from_db_role(row.role),
        title: row.title,
    }
}

fn team_record(row: teams::Model) -> TeamRecord {
    TeamRecord {
        team_id: row.team_id,
        name: row.name,
        team_lead_id: row.team_lead_id,
        team_lead_name: row.team_lead_name,
        team_lead_role: row.team_lead_role.map(from_db_role),
    }
}

fn roster_record(row: hr_roster::Model) -> HrRosterRecord {
    HrRosterRecord {
        roster_id: row.roster_id,
        hr_id: row.hr_id,
        hr_name: row.hr_name,
        hr_role: row.hr_role.map(from_db_role),
    }
}

fn project_record(row: projects::Model) -> ProjectRecord {
    ProjectRecord {
        project_id: row.project_id,
        name: row.name,
        manager_id: row.manager_id,
        manager_name: row.manager_name,
        manager_role: row.manager_role.map(from_db_role),
    }
}

fn to_db_status(status: EmployeeStatus) -> entity::Status {
    match status {
        EmployeeStatus::Active => entity::Status::Active,
        EmployeeStatus::Inactive => entity::Status::Inactive,
    }
}

fn to_db_role(role: Role) -> entity::Role {
    match role {
        Role::Employee => entity::Role::Employee,
        Role::Manager => entity::Role::Manager,
        Role::Supermanager => entity::Role::Supermanager,
        Role::Hr => entity::Role::Hr,
        Role::Admin => entity::Role::Admin,
        Role::CSuite => entity::Role::CSuite,
        Role::Client => entity::Role::Client,
    }
}

fn from_db_role(role: entity::Role) -> Role {
    match role {
        entity::Role::Employee => Role::Employee,
        entity::Role::Manager => Role::Manager,
        entity::Role::Supermanager => Role::Supermanager,
        entity::Role::Hr => Role::Hr,
        entity::Role::Admin => Role::Admin,
        entity::Role::CSuite => Role::CSuite,
        entity::Role::Client => Role::Client,
    }
}
