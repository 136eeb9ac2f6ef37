use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Employees {
    Table,
    Id,
    EmployeeId,
    ManagerId,
    SuperManagerId,
    Role,
    FirstName,
    LastName,
    Designation,
    Department,
    Status,
    AssignedProject,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum RoleHistory {
    Table,
    Id,
    EmployeeId,
    FromRole,
    ToRole,
    ChangedAt,
    ChangedBy,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Employees::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Employees::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Employees::EmployeeId)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Employees::ManagerId).string_len(64))
                    .col(ColumnDef::new(Employees::SuperManagerId).string_len(64))
                    .col(ColumnDef::new(Employees::Role).string_len(16).not_null())
                    .col(ColumnDef::new(Employees::FirstName).string_len(128).not_null())
                    .col(ColumnDef::new(Employees::LastName).string_len(128).not_null())
                    .col(
                        ColumnDef::new(Employees::Designation)
                            .string_len(128)
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Employees::Department)
                            .string_len(128)
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Employees::Status)
                            .string_len(16)
                            .not_null()
                            .default("active"),
                    )
                    .col(ColumnDef::new(Employees::AssignedProject).string_len(64))
                    .col(
                        ColumnDef::new(Employees::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Employees::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_employees_manager")
                    .table(Employees::Table)
                    .col(Employees::ManagerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RoleHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RoleHistory::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RoleHistory::EmployeeId).string_len(64).not_null())
                    .col(ColumnDef::new(RoleHistory::FromRole).string_len(16).not_null())
                    .col(ColumnDef::new(RoleHistory::ToRole).string_len(16).not_null())
                    .col(
                        ColumnDef::new(RoleHistory::ChangedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RoleHistory::ChangedBy).string_len(64).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_role_history_employee")
                            .from(RoleHistory::Table, RoleHistory::EmployeeId)
                            .to(Employees::Table, Employees::EmployeeId)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_role_history_employee")
                    .table(RoleHistory::Table)
                    .col(RoleHistory::EmployeeId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RoleHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Employees::Table).to_owned())
            .await?;
        Ok(())
    }
}
