//! HR vertical slice: employee records, the org chart and role changes.
//!
//! Storage and identity are injected through [`RecordStore`] and
//! [`IdentityProvider`]; nothing here reaches for a global client.

pub mod cascade;
pub mod memory;
pub mod org_tree;
pub mod reconcile;
pub mod record;
pub mod store;

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument};

pub use cascade::{
    CascadeError, CascadeErrorKind, CascadeOptions, CascadePlan, Discovery, RoleCascade,
    RoleChangeOutcome, RoleChangeRequest, plan_role_change, validate_request,
};
pub use memory::InMemoryStore;
pub use org_tree::{
    ExpandedKeys, OrgNode, PreOrder, VisibleNode, build_org_forest, build_org_tree,
};
pub use reconcile::{ReconcileReport, Snapshot, plan_reconciliation, reconcile};
pub use record::{
    EmployeeRecord, EmployeeStatus, HrRosterRecord, LeadSnapshot, OrgChartEntry, ProjectRecord,
    MAX_ID_LEN, MAX_TEXT_LEN, Role, RoleChange, TeamRecord, UnknownRole, check_width,
};
pub use store::{
    Actor, IdentityProvider, RecordStore, StaticIdentity, StoreError, StoreResult, WriteBatch,
    WriteOp,
};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("invalid employee: {0}")]
    Validation(String),
    #[error("employee {0} already exists")]
    Duplicate(String),
    #[error("employee {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Entry point the API layer talks to.
#[derive(Clone)]
pub struct HrModule {
    store: Arc<dyn RecordStore>,
    options: CascadeOptions,
}

impl HrModule {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            options: CascadeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CascadeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub async fn employees(&self) -> StoreResult<Vec<EmployeeRecord>> {
        self.store.employees().await
    }

    pub async fn employee(&self, employee_id: &str) -> StoreResult<Option<EmployeeRecord>> {
        self.store.employee(employee_id).await
    }

    pub async fn org_tree(&self) -> StoreResult<Option<OrgNode>> {
        Ok(build_org_tree(&self.store.employees().await?))
    }

    pub async fn org_forest(&self) -> StoreResult<Vec<OrgNode>> {
        Ok(build_org_forest(&self.store.employees().await?))
    }

    /// Role change on behalf of whoever `identity` names.
    pub async fn apply_role_change(
        &self,
        identity: Arc<dyn IdentityProvider>,
        request: RoleChangeRequest,
    ) -> Result<RoleChangeOutcome, CascadeError> {
        RoleCascade::new(self.store.clone(), identity)
            .with_options(self.options)
            .apply_role_change(request)
            .await
    }

    pub async fn reconcile(&self) -> StoreResult<ReconcileReport> {
        reconcile(self.store.as_ref()).await
    }

    /// Adds a new employee together with their org-chart entry.
    #[instrument(name = "hr.onboard", skip_all, fields(employee_id = %record.employee_id))]
    pub async fn onboard_employee(
        &self,
        record: EmployeeRecord,
    ) -> Result<EmployeeRecord, LifecycleError> {
        let mut record = record.normalized();
        record.employee_id = record.employee_id.trim().to_string();
        if record.employee_id.is_empty() {
            return Err(LifecycleError::Validation("employee id is required".into()));
        }
        if record.first_name.trim().is_empty() {
            return Err(LifecycleError::Validation("first name is required".into()));
        }
        record.check_widths().map_err(LifecycleError::Validation)?;
        if record.manager_id.as_deref() == Some(record.employee_id.as_str()) {
            return Err(LifecycleError::Validation(
                "an employee cannot manage themselves".into(),
            ));
        }
        if self.store.employee(&record.employee_id).await?.is_some() {
            return Err(LifecycleError::Duplicate(record.employee_id));
        }
        record.role_history.clear();

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::InsertEmployee(record.clone()));
        if self
            .store
            .org_chart_entry(&record.employee_id)
            .await?
            .is_some()
        {
            batch.push(WriteOp::UpdateOrgChartEntry(OrgChartEntry::snapshot(&record)));
        } else {
            batch.push(WriteOp::InsertOrgChartEntry(OrgChartEntry::snapshot(&record)));
        }
        self.store.commit(batch).await?;
        info!(role = %record.role, "employee onboarded");
        Ok(record)
    }

    /// Soft delete: the record stays and reads as inactive.
    #[instrument(name = "hr.deactivate", skip(self))]
    pub async fn deactivate_employee(
        &self,
        employee_id: &str,
    ) -> Result<EmployeeRecord, LifecycleError> {
        let mut record = self
            .store
            .employee(employee_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(employee_id.to_string()))?;
        if !record.is_active() {
            return Ok(record);
        }
        self.store
            .commit(WriteBatch::from(vec![WriteOp::SetEmployeeStatus {
                employee_id: employee_id.to_string(),
                status: EmployeeStatus::Inactive,
            }]))
            .await?;
        record.status = EmployeeStatus::Inactive;
        Ok(record)
    }

    /// Hard delete of the employee and their org-chart entry. Reports and
    /// denormalized copies naming them are left for [`reconcile`].
    #[instrument(name = "hr.delete", skip(self))]
    pub async fn delete_employee(&self, employee_id: &str) -> Result<(), LifecycleError> {
        if self.store.employee(employee_id).await?.is_none() {
            return Err(LifecycleError::NotFound(employee_id.to_string()));
        }
        self.store
            .commit(WriteBatch::from(vec![
                WriteOp::DeleteEmployee {
                    employee_id: employee_id.to_string(),
                },
                WriteOp::DeleteOrgChartEntry {
                    employee_id: employee_id.to_string(),
                },
            ]))
            .await?;
        info!("employee deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module() -> HrModule {
        HrModule::new(Arc::new(InMemoryStore::with_employees(vec![
            EmployeeRecord::new("CEO", Role::CSuite, "Nia", "Okafor"),
            EmployeeRecord::new("E1", Role::Employee, "Tom", "Ng").reporting_to("CEO"),
        ])))
    }

    #[tokio::test]
    async fn onboarding_rejects_duplicates() {
        let hr = module();
        let err = hr
            .onboard_employee(EmployeeRecord::new("E1", Role::Employee, "Dup", "Licate"))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Duplicate(id) if id == "E1"));
    }

    #[tokio::test]
    async fn onboarding_rejects_values_wider_than_their_columns() {
        let hr = module();
        let err = hr
            .onboard_employee(EmployeeRecord::new(
                "E2",
                Role::Employee,
                "L".repeat(MAX_TEXT_LEN + 1),
                "Roth",
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(msg) if msg.contains("first name")));
        assert!(hr.employee("E2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn onboarded_employee_joins_the_tree() {
        let hr = module();
        hr.onboard_employee(
            EmployeeRecord::new(" E2 ", Role::Employee, "Lea", "Roth").reporting_to("E1"),
        )
        .await
        .unwrap();
        let root = hr.org_tree().await.unwrap().unwrap();
        assert_eq!(root.ids(), vec!["CEO", "E1", "E2"]);
        let entry = hr.store().org_chart_entry("E2").await.unwrap().unwrap();
        assert_eq!(entry.name, "Lea Roth");
    }

    #[tokio::test]
    async fn deactivation_is_a_soft_delete() {
        let hr = module();
        let record = hr.deactivate_employee("E1").await.unwrap();
        assert_eq!(record.status, EmployeeStatus::Inactive);
        let stored = hr.employee("E1").await.unwrap().unwrap();
        assert!(!stored.is_active());
    }

    #[tokio::test]
    async fn hard_delete_removes_the_record() {
        let hr = module();
        hr.delete_employee("E1").await.unwrap();
        assert!(hr.employee("E1").await.unwrap().is_none());
        assert!(hr.store().org_chart_entry("E1").await.unwrap().is_none());
        assert!(matches!(
            hr.delete_employee("E1").await,
            Err(LifecycleError::NotFound(_))
        ));
    }
}
