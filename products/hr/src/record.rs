use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Employee,
    Manager,
    Supermanager,
    Hr,
    Admin,
    CSuite,
    Client,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Employee,
        Role::Manager,
        Role::Supermanager,
        Role::Hr,
        Role::Admin,
        Role::CSuite,
        Role::Client,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Employee => "employee",
            Role::Manager => "manager",
            Role::Supermanager => "supermanager",
            Role::Hr => "hr",
            Role::Admin => "admin",
            Role::CSuite => "c-suite",
            Role::Client => "client",
        }
    }

    /// Roles an edit may move an employee into. `client` records exist but
    /// are never produced by a role change.
    pub fn is_assignable(self) -> bool {
        !matches!(self, Role::Client)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, Eq, PartialEq)]
#[error("unknown role `{0}`")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == value.trim())
            .ok_or_else(|| UnknownRole(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmployeeStatus {
    #[default]
    Active,
    Inactive,
}

impl EmployeeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EmployeeStatus::Active => "active",
            EmployeeStatus::Inactive => "inactive",
        }
    }
}

/// One entry of an employee's append-only role history.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleChange {
    pub from: Role,
    pub to: Role,
    pub timestamp: DateTime<Utc>,
    pub changed_by: String,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRecord {
    pub employee_id: String,
    #[serde(default)]
    pub manager_id: Option<String>,
    #[serde(default)]
    pub super_manager_id: Option<String>,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub designation: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub status: EmployeeStatus,
    #[serde(default)]
    pub assigned_project: Option<String>,
    #[serde(default)]
    pub role_history: Vec<RoleChange>,
}

impl EmployeeRecord {
    pub fn new(
        employee_id: impl Into<String>,
        role: Role,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            employee_id: employee_id.into(),
            manager_id: None,
            super_manager_id: None,
            role,
            first_name: first_name.into(),
            last_name: last_name.into(),
            designation: String::new(),
            department: String::new(),
            status: EmployeeStatus::Active,
            assigned_project: None,
            role_history: Vec::new(),
        }
    }

    pub fn reporting_to(mut self, manager_id: impl Into<String>) -> Self {
        self.manager_id = normalize_ref(Some(manager_id.into()));
        self
    }

    pub fn with_designation(mut self, designation: impl Into<String>) -> Self {
        self.designation = designation.into();
        self
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = department.into();
        self
    }

    pub fn full_name(&self) -> String {
        let first = self.first_name.trim();
        let last = self.last_name.trim();
        match (first.is_empty(), last.is_empty()) {
            (false, false) => format!("{first} {last}"),
            (false, true) => first.to_string(),
            (true, false) => last.to_string(),
            (true, true) => String::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == EmployeeStatus::Active
    }

    /// Normalizes optional references read from a store: blank ids become
    /// `None` so a blank manager reads as a root.
    pub fn normalized(mut self) -> Self {
        self.manager_id = normalize_ref(self.manager_id);
        self.super_manager_id = normalize_ref(self.super_manager_id);
        self.assigned_project = normalize_ref(self.assigned_project);
        self
    }
}

/// Widest employee id, manager reference or actor id the tables hold.
pub const MAX_ID_LEN: usize = 64;
/// Widest name, designation or department the tables hold.
pub const MAX_TEXT_LEN: usize = 128;

/// Rejects a value wider than its column, counted in characters.
pub fn check_width(field: &str, value: &str, max: usize) -> Result<(), String> {
    if value.chars().count() > max {
        Err(format!("{field} must be at most {max} characters"))
    } else {
        Ok(())
    }
}

impl EmployeeRecord {
    /// First field that would not fit its column.
    pub fn check_widths(&self) -> Result<(), String> {
        check_width("employee id", &self.employee_id, MAX_ID_LEN)?;
        for (field, value) in [
            ("manager id", &self.manager_id),
            ("super manager id", &self.super_manager_id),
            ("assigned project", &self.assigned_project),
        ] {
            if let Some(value) = value {
                check_width(field, value, MAX_ID_LEN)?;
            }
        }
        check_width("first name", &self.first_name, MAX_TEXT_LEN)?;
        check_width("last name", &self.last_name, MAX_TEXT_LEN)?;
        check_width("designation", &self.designation, MAX_TEXT_LEN)?;
        check_width("department", &self.department, MAX_TEXT_LEN)
    }
}

pub fn normalize_ref(value: Option<String>) -> Option<String> {
    value.and_then(|raw| {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == raw.len() {
            Some(raw)
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Org-chart row caching an employee's display name, role and title.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgChartEntry {
    pub employee_id: String,
    pub name: String,
    pub role: Role,
    pub title: String,
}

impl OrgChartEntry {
    pub fn snapshot(record: &EmployeeRecord) -> Self {
        Self {
            employee_id: record.employee_id.clone(),
            name: record.full_name(),
            role: record.role,
            title: record.designation.clone(),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamRecord {
    pub team_id: String,
    pub name: String,
    pub team_lead_id: Option<String>,
    pub team_lead_name: Option<String>,
    pub team_lead_role: Option<Role>,
}

impl TeamRecord {
    /// Id given to the team created when an employee first becomes a manager.
    pub fn key_for_lead(employee_id: &str) -> String {
        format!("team-{employee_id}")
    }

    pub fn led_by(lead: &LeadSnapshot) -> Self {
        Self {
            team_id: Self::key_for_lead(&lead.employee_id),
            name: format!("{} team", lead.name),
            team_lead_id: Some(lead.employee_id.clone()),
            team_lead_name: Some(lead.name.clone()),
            team_lead_role: Some(lead.role),
        }
    }

    pub fn is_vacant(&self) -> bool {
        self.team_lead_id.is_none() && self.team_lead_name.is_none() && self.team_lead_role.is_none()
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HrRosterRecord {
    pub roster_id: String,
    pub hr_id: Option<String>,
    pub hr_name: Option<String>,
    pub hr_role: Option<Role>,
}

impl HrRosterRecord {
    pub fn key_for_hr(employee_id: &str) -> String {
        format!("hr-{employee_id}")
    }

    pub fn for_hr(hr: &LeadSnapshot) -> Self {
        Self {
            roster_id: Self::key_for_hr(&hr.employee_id),
            hr_id: Some(hr.employee_id.clone()),
            hr_name: Some(hr.name.clone()),
            hr_role: Some(hr.role),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub project_id: String,
    pub name: String,
    pub manager_id: Option<String>,
    pub manager_name: Option<String>,
    pub manager_role: Option<Role>,
}

/// Name and role copied from an employee into a denormalized record.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadSnapshot {
    pub employee_id: String,
    pub name: String,
    pub role: Role,
}

impl LeadSnapshot {
    pub fn of(record: &EmployeeRecord) -> Self {
        Self {
            employee_id: record.employee_id.clone(),
            name: record.full_name(),
            role: record.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_parse_from_wire_names() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert_eq!(" hr ".parse::<Role>(), Ok(Role::Hr));
        assert_eq!(
            "superuser".parse::<Role>(),
            Err(UnknownRole("superuser".into()))
        );
    }

    #[test]
    fn client_is_not_assignable() {
        let assignable: Vec<_> = Role::ALL.into_iter().filter(|r| r.is_assignable()).collect();
        assert_eq!(assignable.len(), 6);
        assert!(!Role::Client.is_assignable());
    }

    #[test]
    fn widths_count_characters_not_bytes() {
        let name = "é".repeat(MAX_TEXT_LEN);
        assert!(check_width("first name", &name, MAX_TEXT_LEN).is_ok());

        let mut record = EmployeeRecord::new("E1", Role::Employee, name, "Lovelace");
        assert_eq!(record.check_widths(), Ok(()));
        record.manager_id = Some("m".repeat(MAX_ID_LEN + 1));
        assert_eq!(
            record.check_widths(),
            Err("manager id must be at most 64 characters".to_string())
        );
    }

    #[test]
    fn blank_references_read_as_missing() {
        let mut record = EmployeeRecord::new("E1", Role::Employee, "Ada", "Lovelace");
        record.manager_id = Some("   ".into());
        record.assigned_project = Some(" P-7 ".into());
        let record = record.normalized();
        assert_eq!(record.manager_id, None);
        assert_eq!(record.assigned_project.as_deref(), Some("P-7"));
    }

    #[test]
    fn records_use_camel_case_on_the_wire() {
        let record = EmployeeRecord::new("E1", Role::CSuite, "Grace", "Hopper").reporting_to("E0");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["employeeId"], "E1");
        assert_eq!(json["managerId"], "E0");
        assert_eq!(json["role"], "c-suite");
        assert_eq!(json["status"], "active");
    }

    #[test]
    fn full_name_skips_blank_parts() {
        let record = EmployeeRecord::new("E1", Role::Employee, "Ada", " ");
        assert_eq!(record.full_name(), "Ada");
    }
}
