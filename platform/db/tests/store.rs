use std::sync::Arc;

use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use platform_db::SeaOrmRecordStore;
use pretty_assertions::assert_eq;
use products_hr::{
    Actor, EmployeeRecord, EmployeeStatus, HrModule, LeadSnapshot, OrgChartEntry, ProjectRecord,
    RecordStore, Role, RoleChange, RoleChangeRequest, StaticIdentity, StoreError, TeamRecord,
    WriteBatch, WriteOp,
};
use sea_orm::Database;

async fn store() -> SeaOrmRecordStore {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    SeaOrmRecordStore::new(db)
}

fn onboard(record: &EmployeeRecord) -> [WriteOp; 2] {
    [
        WriteOp::InsertEmployee(record.clone()),
        WriteOp::InsertOrgChartEntry(OrgChartEntry::snapshot(record)),
    ]
}

#[tokio::test]
async fn committed_batch_is_readable_in_insertion_order() {
    let store = store().await;
    let ceo = EmployeeRecord::new("Z-CEO", Role::CSuite, "Nia", "Okafor");
    let mut lead = EmployeeRecord::new("A-M1", Role::Manager, "Mia", "Chen").reporting_to("Z-CEO");
    lead.role_history.push(RoleChange {
        from: Role::Employee,
        to: Role::Manager,
        timestamp: Utc::now(),
        changed_by: "admin-1".into(),
    });

    let mut batch = WriteBatch::new();
    batch.extend(onboard(&ceo));
    batch.extend(onboard(&lead));
    store.commit(batch).await.unwrap();

    let ids: Vec<String> = store
        .employees()
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.employee_id)
        .collect();
    assert_eq!(ids, vec!["Z-CEO", "A-M1"]);

    let stored = store.employee("A-M1").await.unwrap().unwrap();
    assert_eq!(stored.manager_id.as_deref(), Some("Z-CEO"));
    assert_eq!(stored.role_history.len(), 1);
    assert_eq!(stored.role_history[0].changed_by, "admin-1");

    let reports = store.employees_managed_by("Z-CEO").await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(
        store.org_chart_entry("A-M1").await.unwrap().unwrap().name,
        "Mia Chen"
    );
}

#[tokio::test]
async fn failing_op_rolls_back_the_whole_batch() {
    let store = store().await;
    let record = EmployeeRecord::new("E1", Role::Employee, "Tom", "Ng");
    let mut batch = WriteBatch::from(onboard(&record).to_vec());
    batch.push(WriteOp::SetTeamLead {
        team_id: "team-missing".into(),
        lead: None,
    });

    let err = store.commit(batch).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
    assert!(store.employee("E1").await.unwrap().is_none());
    assert!(store.org_chart_entry("E1").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_employee_is_a_conflict() {
    let store = store().await;
    let record = EmployeeRecord::new("E1", Role::Employee, "Tom", "Ng");
    store
        .commit(WriteBatch::from(vec![WriteOp::InsertEmployee(record.clone())]))
        .await
        .unwrap();
    let err = store
        .commit(WriteBatch::from(vec![WriteOp::InsertEmployee(record)]))
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::Conflict("employee E1 already exists".into()));
}

#[tokio::test]
async fn manager_exit_cascades_through_the_database() {
    let store = Arc::new(store().await);
    let lead = EmployeeRecord::new("M1", Role::Manager, "Mia", "Chen").with_designation("Lead");
    let mut batch = WriteBatch::from(onboard(&lead).to_vec());
    batch.push(WriteOp::InsertTeam(TeamRecord::led_by(&LeadSnapshot::of(&lead))));
    store.commit(batch).await.unwrap();

    let hr = HrModule::new(store.clone());
    let outcome = hr
        .apply_role_change(
            Arc::new(StaticIdentity::new(Actor::new("admin-1"))),
            RoleChangeRequest {
                employee_id: "M1".into(),
                new_role: "employee".into(),
                first_name: "Mia".into(),
                last_name: "Chen".into(),
                designation: "Engineer".into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.employee.role, Role::Employee);

    let team = store.team("team-M1").await.unwrap().unwrap();
    assert!(team.is_vacant());
    let record = store.employee("M1").await.unwrap().unwrap();
    assert_eq!(record.designation, "Engineer");
    assert_eq!(record.role_history.len(), 1);
    assert_eq!(record.role_history[0].to, Role::Employee);
    let entry = store.org_chart_entry("M1").await.unwrap().unwrap();
    assert_eq!((entry.role, entry.title.as_str()), (Role::Employee, "Engineer"));
}

#[tokio::test]
async fn reconcile_repairs_stale_project_copies() {
    let store = Arc::new(store().await);
    let lead = EmployeeRecord::new("M1", Role::Manager, "Mia", "Chen");
    let mut batch = WriteBatch::from(onboard(&lead).to_vec());
    batch.push(WriteOp::InsertProject(ProjectRecord {
        project_id: "P1".into(),
        name: "Payroll".into(),
        manager_id: Some("M1".into()),
        manager_name: Some("Old Name".into()),
        manager_role: Some(Role::Manager),
    }));
    store.commit(batch).await.unwrap();

    let report = HrModule::new(store.clone()).reconcile().await.unwrap();
    assert_eq!(report.projects_refreshed, 1);
    assert_eq!(report.teams_created, 1);

    let projects = store.projects().await.unwrap();
    assert_eq!(projects[0].manager_name.as_deref(), Some("Mia Chen"));
    let team = store.team_led_by("M1").await.unwrap().unwrap();
    assert_eq!(team.team_id, "team-M1");
}

#[tokio::test]
async fn deleting_an_employee_drops_their_history() {
    let store = Arc::new(store().await);
    let mut record = EmployeeRecord::new("E1", Role::Employee, "Tom", "Ng");
    record.status = EmployeeStatus::Inactive;
    record.role_history.push(RoleChange {
        from: Role::Client,
        to: Role::Employee,
        timestamp: Utc::now(),
        changed_by: "admin-1".into(),
    });
    store
        .commit(WriteBatch::from(onboard(&record).to_vec()))
        .await
        .unwrap();
    assert_eq!(
        store.employee("E1").await.unwrap().unwrap().status,
        EmployeeStatus::Inactive
    );

    HrModule::new(store.clone()).delete_employee("E1").await.unwrap();
    assert!(store.employee("E1").await.unwrap().is_none());
    store
        .commit(WriteBatch::from(vec![WriteOp::InsertEmployee(
            EmployeeRecord::new("E1", Role::Employee, "Tom", "Ng"),
        )]))
        .await
        .unwrap();
    assert!(store.employee("E1").await.unwrap().unwrap().role_history.is_empty());
}
