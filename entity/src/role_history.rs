use crate::employees::{self, Role};
use sea_orm::prelude::{DateTimeWithTimeZone, *};

/// Append-only; rows are never updated.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "role_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub employee_id: String,
    pub from_role: Role,
    pub to_role: Role,
    pub changed_at: DateTimeWithTimeZone,
    pub changed_by: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "employees::Entity",
        from = "Column::EmployeeId",
        to = "employees::Column::EmployeeId",
        on_delete = "Cascade"
    )]
    Employee,
}

impl Related<employees::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Employee.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
