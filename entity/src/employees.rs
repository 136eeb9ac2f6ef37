use crate::role_history;
use sea_orm::prelude::{DateTimeWithTimeZone, *};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "employees")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub employee_id: String,
    #[sea_orm(indexed)]
    pub manager_id: Option<String>,
    pub super_manager_id: Option<String>,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub designation: String,
    pub department: String,
    pub status: Status,
    pub assigned_project: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "role_history::Entity")]
    RoleHistory,
}

impl Related<role_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RoleHistory.def()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
pub enum Role {
    #[sea_orm(string_value = "employee")]
    Employee,
    #[sea_orm(string_value = "manager")]
    Manager,
    #[sea_orm(string_value = "supermanager")]
    Supermanager,
    #[sea_orm(string_value = "hr")]
    Hr,
    #[sea_orm(string_value = "admin")]
    Admin,
    #[sea_orm(string_value = "c-suite")]
    CSuite,
    #[sea_orm(string_value = "client")]
    Client,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
pub enum Status {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "inactive")]
    Inactive,
}

impl ActiveModelBehavior for ActiveModel {}
