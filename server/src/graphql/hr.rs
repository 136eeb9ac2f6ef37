use std::sync::Arc;

use async_graphql::{Context, InputObject, Object, Result, SimpleObject};
use platform_api::{ApiError, graphql_error};
use products_hr::{
    EmployeeRecord, ExpandedKeys, HrModule, OrgNode, ReconcileReport, Role, RoleChange,
    RoleChangeOutcome, RoleChangeRequest, build_org_tree,
};
use tracing::instrument;

use super::{GraphqlData, RequestActor};

fn hr_module<'a>(ctx: &Context<'a>) -> &'a HrModule {
    &ctx.data_unchecked::<GraphqlData>().hr
}

fn request_actor(ctx: &Context<'_>) -> RequestActor {
    ctx.data_opt::<RequestActor>().cloned().unwrap_or_default()
}

#[derive(Clone, Debug, SimpleObject)]
pub struct RoleChangeNode {
    pub from: String,
    pub to: String,
    /// RFC 3339.
    pub timestamp: String,
    pub changed_by: String,
}

impl From<&RoleChange> for RoleChangeNode {
    fn from(change: &RoleChange) -> Self {
        Self {
            from: change.from.to_string(),
            to: change.to.to_string(),
            timestamp: change.timestamp.to_rfc3339(),
            changed_by: change.changed_by.clone(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct EmployeeNode {
    pub employee_id: String,
    pub manager_id: Option<String>,
    pub super_manager_id: Option<String>,
    pub role: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub designation: String,
    pub department: String,
    pub status: String,
    pub assigned_project: Option<String>,
    pub role_history: Vec<RoleChangeNode>,
}

impl From<&EmployeeRecord> for EmployeeNode {
    fn from(record: &EmployeeRecord) -> Self {
        Self {
            employee_id: record.employee_id.clone(),
            manager_id: record.manager_id.clone(),
            super_manager_id: record.super_manager_id.clone(),
            role: record.role.to_string(),
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            full_name: record.full_name(),
            designation: record.designation.clone(),
            department: record.department.clone(),
            status: record.status.as_str().to_string(),
            assigned_project: record.assigned_project.clone(),
            role_history: record.role_history.iter().map(<RoleChangeNode as From<&RoleChange>>::from).collect(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct OrgTreeNode {
    pub employee: EmployeeNode,
    pub children: Vec<OrgTreeNode>,
}

impl From<&OrgNode> for OrgTreeNode {
    fn from(root: &OrgNode) -> Self {
        let mut stack = vec![(root, false)];
        let mut built: Vec<OrgTreeNode> = Vec::new();
        while let Some((node, ready)) = stack.pop() {
            if ready {
                let children = built.split_off(built.len() - node.children.len());
                built.push(Self {
                    employee: EmployeeNode::from(&node.record),
                    children,
                });
            } else {
                stack.push((node, true));
                stack.extend(node.children.iter().rev().map(|child| (child, false)));
            }
        }
        built.pop().unwrap_or_else(|| Self {
            employee: EmployeeNode::from(&root.record),
            children: Vec::new(),
        })
    }
}

impl Drop for OrgTreeNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// One row of the collapsible chart, in display order.
#[derive(Clone, Debug, SimpleObject)]
pub struct VisibleOrgNode {
    pub depth: i32,
    pub expanded: bool,
    pub has_children: bool,
    pub employee: EmployeeNode,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct RoleChangePayload {
    pub employee: EmployeeNode,
    pub from: String,
    pub to: String,
    pub writes: i32,
}

impl From<RoleChangeOutcome> for RoleChangePayload {
    fn from(outcome: RoleChangeOutcome) -> Self {
        Self {
            employee: EmployeeNode::from(&outcome.employee),
            from: outcome.from.to_string(),
            to: outcome.to.to_string(),
            writes: clamp(outcome.writes),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct ReconcilePayload {
    pub org_chart_refreshed: i32,
    pub org_chart_created: i32,
    pub org_chart_removed: i32,
    pub teams_refreshed: i32,
    pub teams_vacated: i32,
    pub teams_created: i32,
    pub rosters_refreshed: i32,
    pub rosters_vacated: i32,
    pub rosters_created: i32,
    pub projects_refreshed: i32,
    pub projects_cleared: i32,
    pub total: i32,
}

impl From<ReconcileReport> for ReconcilePayload {
    fn from(report: ReconcileReport) -> Self {
        Self {
            org_chart_refreshed: clamp(report.org_chart_refreshed),
            org_chart_created: clamp(report.org_chart_created),
            org_chart_removed: clamp(report.org_chart_removed),
            teams_refreshed: clamp(report.teams_refreshed),
            teams_vacated: clamp(report.teams_vacated),
            teams_created: clamp(report.teams_created),
            rosters_refreshed: clamp(report.rosters_refreshed),
            rosters_vacated: clamp(report.rosters_vacated),
            rosters_created: clamp(report.rosters_created),
            projects_refreshed: clamp(report.projects_refreshed),
            projects_cleared: clamp(report.projects_cleared),
            total: clamp(report.total()),
        }
    }
}

fn clamp(count: usize) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}

#[derive(Clone, Debug, InputObject)]
pub struct RoleChangeInput {
    pub employee_id: String,
    pub new_role: String,
    pub first_name: String,
    pub last_name: String,
    #[graphql(default)]
    pub designation: String,
}

impl From<RoleChangeInput> for RoleChangeRequest {
    fn from(input: RoleChangeInput) -> Self {
        Self {
            employee_id: input.employee_id,
            new_role: input.new_role,
            first_name: input.first_name,
            last_name: input.last_name,
            designation: input.designation,
        }
    }
}

#[derive(Clone, Debug, InputObject)]
pub struct OnboardEmployeeInput {
    pub employee_id: String,
    pub role: String,
    pub first_name: String,
    pub last_name: String,
    pub manager_id: Option<String>,
    pub super_manager_id: Option<String>,
    #[graphql(default)]
    pub designation: String,
    #[graphql(default)]
    pub department: String,
    pub assigned_project: Option<String>,
}

impl OnboardEmployeeInput {
    fn into_record(self) -> Result<EmployeeRecord, ApiError> {
        let role: Role = self
            .role
            .parse()
            .map_err(|err: products_hr::UnknownRole| ApiError::InvalidInput(err.to_string()))?;
        let mut record = EmployeeRecord::new(self.employee_id, role, self.first_name, self.last_name)
            .with_designation(self.designation)
            .with_department(self.department);
        record.manager_id = self.manager_id;
        record.super_manager_id = self.super_manager_id;
        record.assigned_project = self.assigned_project;
        Ok(record)
    }
}

#[derive(Default)]
pub struct HrQuery;

#[Object]
impl HrQuery {
    #[instrument(name = "graphql.hr.employees", skip_all)]
    async fn employees(
        &self,
        ctx: &Context<'_>,
        #[graphql(default)] include_inactive: bool,
    ) -> Result<Vec<EmployeeNode>> {
        let records = hr_module(ctx).employees().await.map_err(graphql_error)?;
        Ok(records
            .iter()
            .filter(|record| include_inactive || record.is_active())
            .map(EmployeeNode::from)
            .collect())
    }

    #[instrument(name = "graphql.hr.employee", skip(self, ctx))]
    async fn employee(&self, ctx: &Context<'_>, id: String) -> Result<Option<EmployeeNode>> {
        let record = hr_module(ctx).employee(&id).await.map_err(graphql_error)?;
        Ok(record.as_ref().map(EmployeeNode::from))
    }

    /// The chart rooted at the first employee with no manager.
    #[instrument(name = "graphql.hr.org_chart", skip_all)]
    async fn org_chart(&self, ctx: &Context<'_>) -> Result<Option<OrgTreeNode>> {
        let root = hr_module(ctx).org_tree().await.map_err(graphql_error)?;
        Ok(root.as_ref().map(OrgTreeNode::from))
    }

    /// Every root with its reachable subtree.
    #[instrument(name = "graphql.hr.org_forest", skip_all)]
    async fn org_forest(&self, ctx: &Context<'_>) -> Result<Vec<OrgTreeNode>> {
        let forest = hr_module(ctx).org_forest().await.map_err(graphql_error)?;
        Ok(forest.iter().map(OrgTreeNode::from).collect())
    }

    /// Rows of the chart visible for `expanded`; defaults to just the root
    /// expanded.
    #[instrument(name = "graphql.hr.visible_org_chart", skip(self, ctx))]
    async fn visible_org_chart(
        &self,
        ctx: &Context<'_>,
        expanded: Option<Vec<String>>,
    ) -> Result<Vec<VisibleOrgNode>> {
        let records = hr_module(ctx).employees().await.map_err(graphql_error)?;
        let Some(root) = build_org_tree(&records) else {
            return Ok(Vec::new());
        };
        let keys = match expanded {
            Some(ids) => ExpandedKeys::from_ids(ids),
            None => ExpandedKeys::for_root(&root),
        };
        Ok(keys
            .visible(&root)
            .into_iter()
            .map(|row| VisibleOrgNode {
                depth: clamp(row.depth),
                expanded: keys.is_expanded(row.node.employee_id()),
                has_children: !row.node.is_leaf(),
                employee: EmployeeNode::from(&row.node.record),
            })
            .collect())
    }
}

#[derive(Default)]
pub struct HrMutation;

#[Object]
impl HrMutation {
    #[instrument(
        name = "graphql.hr.apply_role_change",
        skip(self, ctx, input),
        fields(employee_id = %input.employee_id, new_role = %input.new_role)
    )]
    async fn apply_role_change(
        &self,
        ctx: &Context<'_>,
        input: RoleChangeInput,
    ) -> Result<RoleChangePayload> {
        let identity = Arc::new(request_actor(ctx));
        let outcome = hr_module(ctx)
            .apply_role_change(identity, input.into())
            .await
            .map_err(graphql_error)?;
        Ok(outcome.into())
    }

    #[instrument(name = "graphql.hr.onboard_employee", skip_all)]
    async fn onboard_employee(
        &self,
        ctx: &Context<'_>,
        input: OnboardEmployeeInput,
    ) -> Result<EmployeeNode> {
        require_actor(ctx)?;
        let record = input.into_record().map_err(graphql_error)?;
        let record = hr_module(ctx)
            .onboard_employee(record)
            .await
            .map_err(graphql_error)?;
        Ok(EmployeeNode::from(&record))
    }

    #[instrument(name = "graphql.hr.deactivate_employee", skip(self, ctx))]
    async fn deactivate_employee(&self, ctx: &Context<'_>, id: String) -> Result<EmployeeNode> {
        require_actor(ctx)?;
        let record = hr_module(ctx)
            .deactivate_employee(&id)
            .await
            .map_err(graphql_error)?;
        Ok(EmployeeNode::from(&record))
    }

    #[instrument(name = "graphql.hr.delete_employee", skip(self, ctx))]
    async fn delete_employee(&self, ctx: &Context<'_>, id: String) -> Result<bool> {
        require_actor(ctx)?;
        hr_module(ctx)
            .delete_employee(&id)
            .await
            .map_err(graphql_error)?;
        Ok(true)
    }

    #[instrument(name = "graphql.hr.reconcile", skip_all)]
    async fn reconcile(&self, ctx: &Context<'_>) -> Result<ReconcilePayload> {
        require_actor(ctx)?;
        let report = hr_module(ctx).reconcile().await.map_err(graphql_error)?;
        Ok(report.into())
    }
}

fn require_actor(ctx: &Context<'_>) -> Result<()> {
    match request_actor(ctx).0 {
        Some(_) => Ok(()),
        None => Err(graphql_error(ApiError::Unauthorized)),
    }
}
