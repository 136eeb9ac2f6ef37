use std::sync::Arc;

use pretty_assertions::assert_eq;
use products_hr::{
    Actor, CascadeError, CascadeErrorKind, CascadeOptions, EmployeeRecord, HrRosterRecord,
    InMemoryStore, LeadSnapshot, RecordStore, Role, RoleCascade, RoleChangeRequest,
    StaticIdentity, StoreError, TeamRecord, build_org_forest,
};

fn cascade(store: &Arc<InMemoryStore>) -> RoleCascade {
    RoleCascade::new(
        store.clone(),
        Arc::new(StaticIdentity::new(Actor::new("admin-1"))),
    )
}

fn change(record: &EmployeeRecord, new_role: &str) -> RoleChangeRequest {
    RoleChangeRequest {
        employee_id: record.employee_id.clone(),
        new_role: new_role.to_string(),
        first_name: record.first_name.clone(),
        last_name: record.last_name.clone(),
        designation: record.designation.clone(),
    }
}

fn manager() -> EmployeeRecord {
    EmployeeRecord::new("M1", Role::Manager, "Mia", "Chen").with_designation("Team Lead")
}

async fn store_with_team() -> Arc<InMemoryStore> {
    let lead = manager();
    let store = Arc::new(InMemoryStore::with_employees(vec![
        lead.clone(),
        EmployeeRecord::new("E1", Role::Employee, "Tom", "Ng").reporting_to("M1"),
    ]));
    store.seed_team(TeamRecord::led_by(&LeadSnapshot::of(&lead))).await;
    store
}

#[tokio::test]
async fn manager_exit_vacates_the_team_and_records_history() {
    let store = store_with_team().await;
    let outcome = cascade(&store)
        .apply_role_change(change(&manager(), "employee"))
        .await
        .unwrap();
    assert_eq!((outcome.from, outcome.to), (Role::Manager, Role::Employee));

    let team = store.team("team-M1").await.unwrap().unwrap();
    assert_eq!(team.team_lead_id, None);
    assert_eq!(team.team_lead_name, None);
    assert_eq!(team.team_lead_role, None);

    let record = store.employee("M1").await.unwrap().unwrap();
    assert_eq!(record.role, Role::Employee);
    let last = record.role_history.last().unwrap();
    assert_eq!((last.from, last.to), (Role::Manager, Role::Employee));
    assert_eq!(last.changed_by, "admin-1");

    let entry = store.org_chart_entry("M1").await.unwrap().unwrap();
    assert_eq!(entry.role, Role::Employee);
}

#[tokio::test]
async fn returning_manager_reclaims_their_vacated_team() {
    let store = store_with_team().await;
    let cascade = cascade(&store);
    cascade
        .apply_role_change(change(&manager(), "employee"))
        .await
        .unwrap();
    cascade
        .apply_role_change(change(&manager(), "manager"))
        .await
        .unwrap();

    let teams = store.teams().await.unwrap();
    assert_eq!(teams.len(), 1);
    assert_eq!(teams[0].team_lead_id.as_deref(), Some("M1"));
    let record = store.employee("M1").await.unwrap().unwrap();
    assert_eq!(record.role_history.len(), 2);
}

#[tokio::test]
async fn supermanager_exit_orphans_subordinates() {
    let boss = EmployeeRecord::new("S", Role::Supermanager, "Sara", "Lind");
    let store = Arc::new(InMemoryStore::with_employees(vec![
        boss.clone(),
        EmployeeRecord::new("A", Role::Manager, "Ari", "Vo").reporting_to("S"),
        EmployeeRecord::new("B", Role::Manager, "Bo", "Yu").reporting_to("S"),
    ]));

    cascade(&store)
        .apply_role_change(change(&boss, "c-suite"))
        .await
        .unwrap();

    for id in ["A", "B"] {
        let record = store.employee(id).await.unwrap().unwrap();
        assert_eq!(record.manager_id, None, "{id} still reports to S");
    }

    let forest = build_org_forest(&store.employees().await.unwrap());
    let roots: Vec<&str> = forest.iter().map(|node| node.employee_id()).collect();
    assert_eq!(roots, vec!["S", "A", "B"]);
}

#[tokio::test]
async fn hr_exit_vacates_the_roster() {
    let hr = EmployeeRecord::new("H1", Role::Hr, "Ivy", "Stone");
    let store = Arc::new(InMemoryStore::with_employees(vec![hr.clone()]));
    store
        .seed_hr_roster(HrRosterRecord::for_hr(&LeadSnapshot::of(&hr)))
        .await;

    cascade(&store)
        .apply_role_change(change(&hr, "admin"))
        .await
        .unwrap();

    let roster = store.hr_roster("hr-H1").await.unwrap().unwrap();
    assert_eq!(roster.hr_id, None);
    assert_eq!(roster.hr_name, None);
}

#[tokio::test]
async fn becoming_hr_creates_a_keyed_roster() {
    let tom = EmployeeRecord::new("E1", Role::Employee, "Tom", "Ng");
    let store = Arc::new(InMemoryStore::with_employees(vec![tom.clone()]));

    let outcome = cascade(&store)
        .apply_role_change(change(&tom, "hr"))
        .await
        .unwrap();
    assert_eq!(outcome.to, Role::Hr);

    let roster = store.hr_roster("hr-E1").await.unwrap().unwrap();
    assert_eq!(roster.hr_id.as_deref(), Some("E1"));
    assert_eq!(roster.hr_name.as_deref(), Some("Tom Ng"));
    assert_eq!(roster.hr_role, Some(Role::Hr));
}

#[tokio::test]
async fn returning_hr_reclaims_their_vacated_roster() {
    let hr = EmployeeRecord::new("H1", Role::Hr, "Ivy", "Stone");
    let store = Arc::new(InMemoryStore::with_employees(vec![hr.clone()]));
    store
        .seed_hr_roster(HrRosterRecord::for_hr(&LeadSnapshot::of(&hr)))
        .await;
    let cascade = cascade(&store);

    cascade.apply_role_change(change(&hr, "admin")).await.unwrap();
    cascade.apply_role_change(change(&hr, "hr")).await.unwrap();

    let rosters = store.hr_rosters().await.unwrap();
    assert_eq!(rosters.len(), 1);
    assert_eq!(rosters[0].roster_id, "hr-H1");
    assert_eq!(rosters[0].hr_id.as_deref(), Some("H1"));
}

#[tokio::test]
async fn manager_moving_to_hr_vacates_the_team_and_fills_a_roster() {
    let store = store_with_team().await;
    let outcome = cascade(&store)
        .apply_role_change(change(&manager(), "hr"))
        .await
        .unwrap();
    // employee, history, org chart, team, roster
    assert_eq!(outcome.writes, 5);

    let team = store.team("team-M1").await.unwrap().unwrap();
    assert!(team.is_vacant());
    let roster = store.hr_roster("hr-M1").await.unwrap().unwrap();
    assert_eq!(roster.hr_id.as_deref(), Some("M1"));
    assert_eq!(roster.hr_role, Some(Role::Hr));
}

#[tokio::test]
async fn keyed_team_led_by_someone_else_is_left_alone() {
    let other = EmployeeRecord::new("M2", Role::Manager, "Ola", "Berg");
    let tom = EmployeeRecord::new("E1", Role::Employee, "Tom", "Ng");
    let store = Arc::new(InMemoryStore::with_employees(vec![other.clone(), tom.clone()]));
    let mut team = TeamRecord::led_by(&LeadSnapshot::of(&other));
    team.team_id = TeamRecord::key_for_lead("E1");
    store.seed_team(team).await;

    let outcome = cascade(&store)
        .apply_role_change(change(&tom, "manager"))
        .await
        .unwrap();
    assert_eq!(outcome.to, Role::Manager);

    let teams = store.teams().await.unwrap();
    assert_eq!(teams.len(), 1);
    assert_eq!(teams[0].team_id, "team-E1");
    assert_eq!(teams[0].team_lead_id.as_deref(), Some("M2"));
}

#[tokio::test]
async fn overlong_actor_id_is_rejected_before_any_write() {
    let store = store_with_team().await;
    let cascade = RoleCascade::new(
        store.clone(),
        Arc::new(StaticIdentity::new(Actor::new("a".repeat(65)))),
    );
    let err = cascade
        .apply_role_change(change(&manager(), "employee"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), CascadeErrorKind::Validation);
    assert_eq!(store.commit_count(), 0);
}

#[tokio::test]
async fn invalid_role_performs_no_writes() {
    let store = store_with_team().await;
    let err = cascade(&store)
        .apply_role_change(change(&manager(), "superhero"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), CascadeErrorKind::Validation);
    assert_eq!(store.commit_count(), 0);
    assert_eq!(store.employee("M1").await.unwrap().unwrap().role, Role::Manager);
}

#[tokio::test]
async fn missing_identity_is_a_validation_failure() {
    let store = store_with_team().await;
    let err = RoleCascade::new(store.clone(), Arc::new(StaticIdentity::anonymous()))
        .apply_role_change(change(&manager(), "employee"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), CascadeErrorKind::Validation);
    assert_eq!(store.commit_count(), 0);
}

#[tokio::test]
async fn unknown_employee_is_not_found() {
    let store = store_with_team().await;
    let mut request = change(&manager(), "employee");
    request.employee_id = "nobody".into();
    let err = cascade(&store).apply_role_change(request).await.unwrap_err();
    assert!(matches!(err, CascadeError::NotFound(id) if id == "nobody"));
}

#[tokio::test]
async fn discovery_failure_aborts_before_any_write() {
    let store = store_with_team().await;
    store.fail_reads(Some(StoreError::Backend("timeout".into())));
    let err = cascade(&store)
        .apply_role_change(change(&manager(), "employee"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), CascadeErrorKind::Discovery);
    store.fail_reads(None);
    assert_eq!(store.commit_count(), 0);
}

#[tokio::test]
async fn commit_failure_changes_nothing() {
    let store = store_with_team().await;
    store.fail_next_commit(StoreError::Backend("connection reset".into()));
    let err = cascade(&store)
        .apply_role_change(change(&manager(), "employee"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), CascadeErrorKind::Commit);
    let team = store.team("team-M1").await.unwrap().unwrap();
    assert_eq!(team.team_lead_id.as_deref(), Some("M1"));
    assert_eq!(store.employee("M1").await.unwrap().unwrap().role, Role::Manager);
}

#[tokio::test]
async fn lost_update_surfaces_as_unverified() {
    let store = store_with_team().await;
    store.race_after_commit("M1", Role::Admin);
    let err = cascade(&store)
        .apply_role_change(change(&manager(), "employee"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), CascadeErrorKind::Unverified);
    assert!(matches!(
        err,
        CascadeError::Unverified {
            expected: Role::Employee,
            found: Some(Role::Admin),
            ..
        }
    ));
    assert_eq!(store.commit_count(), 1);
}

#[tokio::test]
async fn mismatch_triggers_repair_when_enabled() {
    let store = store_with_team().await;
    store.race_after_commit("M1", Role::Manager);
    let err = cascade(&store)
        .with_options(CascadeOptions {
            repair_on_mismatch: true,
        })
        .apply_role_change(change(&manager(), "employee"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), CascadeErrorKind::Unverified);

    // The racing write left M1 a manager, so reconciliation hands the team back.
    let team = store.team("team-M1").await.unwrap().unwrap();
    assert_eq!(team.team_lead_id.as_deref(), Some("M1"));
    assert_eq!(team.team_lead_role, Some(Role::Manager));
    let entry = store.org_chart_entry("M1").await.unwrap().unwrap();
    assert_eq!(entry.role, Role::Manager);
}
