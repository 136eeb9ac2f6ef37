pub mod employees;
pub mod hr_roster;
pub mod org_chart;
pub mod projects;
pub mod role_history;
pub mod teams;

pub use employees::{Role, Status};
