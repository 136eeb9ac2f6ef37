use crate::employees::Role;
use sea_orm::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "hr_roster")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub roster_id: String,
    #[sea_orm(indexed)]
    pub hr_id: Option<String>,
    pub hr_name: Option<String>,
    pub hr_role: Option<Role>,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        panic!("no relations")
    }
}

impl ActiveModelBehavior for ActiveModel {}
