use anyhow::{Context, Result};
use products_hr::{
    EmployeeRecord, HrModule, LeadSnapshot, ProjectRecord, ReconcileReport, Role, WriteBatch,
    WriteOp,
};
use tracing::info;

/// Small demo organization: one executive, a supermanager, two teams and HR.
pub fn demo_employees() -> Vec<EmployeeRecord> {
    vec![
        EmployeeRecord::new("E-001", Role::CSuite, "Nia", "Okafor")
            .with_designation("Chief Executive Officer")
            .with_department("Executive"),
        EmployeeRecord::new("E-002", Role::Supermanager, "Sara", "Lind")
            .reporting_to("E-001")
            .with_designation("Head of Engineering")
            .with_department("Engineering"),
        EmployeeRecord::new("E-003", Role::Manager, "Mia", "Chen")
            .reporting_to("E-002")
            .with_designation("Engineering Manager")
            .with_department("Engineering"),
        EmployeeRecord::new("E-004", Role::Manager, "Ari", "Vo")
            .reporting_to("E-002")
            .with_designation("Engineering Manager")
            .with_department("Engineering"),
        EmployeeRecord::new("E-005", Role::Employee, "Tom", "Ng")
            .reporting_to("E-003")
            .with_designation("Software Engineer")
            .with_department("Engineering"),
        EmployeeRecord::new("E-006", Role::Employee, "Lea", "Roth")
            .reporting_to("E-004")
            .with_designation("Software Engineer")
            .with_department("Engineering"),
        EmployeeRecord::new("E-007", Role::Hr, "Ivy", "Stone")
            .reporting_to("E-001")
            .with_designation("People Partner")
            .with_department("People"),
    ]
}

/// Onboards the demo organization into an empty store. Stores that already
/// hold employees are left alone.
pub async fn seed_demo(hr: &HrModule) -> Result<Option<ReconcileReport>> {
    if !hr.employees().await?.is_empty() {
        info!("store already has employees; skipping seed");
        return Ok(None);
    }

    let employees = demo_employees();
    for record in &employees {
        hr.onboard_employee(record.clone())
            .await
            .with_context(|| format!("failed to seed {}", record.employee_id))?;
    }

    let lead = employees
        .iter()
        .find(|record| record.role == Role::Manager)
        .map(LeadSnapshot::of);
    let project = ProjectRecord {
        project_id: "P-001".into(),
        name: "Payroll migration".into(),
        manager_id: lead.as_ref().map(|l| l.employee_id.clone()),
        manager_name: lead.as_ref().map(|l| l.name.clone()),
        manager_role: lead.as_ref().map(|l| l.role),
    };
    hr.store()
        .commit(WriteBatch::from(vec![WriteOp::InsertProject(project)]))
        .await
        .context("failed to seed projects")?;

    // Teams and HR rosters are derived from roles.
    let report = hr.reconcile().await.context("failed to derive teams")?;
    info!(
        employees = employees.len(),
        teams = report.teams_created,
        rosters = report.rosters_created,
        "demo organization seeded"
    );
    Ok(Some(report))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use products_hr::{InMemoryStore, build_org_tree};

    use super::*;

    #[tokio::test]
    async fn seeding_builds_a_complete_chart() {
        let hr = HrModule::new(Arc::new(InMemoryStore::new()));
        let report = seed_demo(&hr).await.unwrap().unwrap();
        assert_eq!(report.teams_created, 2);
        assert_eq!(report.rosters_created, 1);

        let root = build_org_tree(&hr.employees().await.unwrap()).unwrap();
        assert_eq!(root.employee_id(), "E-001");
        assert_eq!(root.len(), demo_employees().len());
    }

    #[tokio::test]
    async fn seeding_twice_is_a_no_op() {
        let hr = HrModule::new(Arc::new(InMemoryStore::new()));
        seed_demo(&hr).await.unwrap();
        assert!(seed_demo(&hr).await.unwrap().is_none());
        assert_eq!(hr.store().projects().await.unwrap().len(), 1);
    }
}
