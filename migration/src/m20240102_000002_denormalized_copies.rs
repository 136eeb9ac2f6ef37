use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum OrgChart {
    Table,
    EmployeeId,
    Name,
    Role,
    Title,
}

#[derive(DeriveIden)]
enum Teams {
    Table,
    TeamId,
    Name,
    TeamLeadId,
    TeamLeadName,
    TeamLeadRole,
}

#[derive(DeriveIden)]
enum HrRoster {
    Table,
    RosterId,
    HrId,
    HrName,
    HrRole,
}

#[derive(DeriveIden)]
enum Projects {
    Table,
    ProjectId,
    Name,
    ManagerId,
    ManagerName,
    ManagerRole,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OrgChart::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OrgChart::EmployeeId)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OrgChart::Name).string_len(320).not_null())
                    .col(ColumnDef::new(OrgChart::Role).string_len(16).not_null())
                    .col(ColumnDef::new(OrgChart::Title).string_len(128).not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Teams::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Teams::TeamId)
                            .string_len(80)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Teams::Name).string_len(320).not_null())
                    .col(ColumnDef::new(Teams::TeamLeadId).string_len(64))
                    .col(ColumnDef::new(Teams::TeamLeadName).string_len(320))
                    .col(ColumnDef::new(Teams::TeamLeadRole).string_len(16))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_teams_lead")
                    .table(Teams::Table)
                    .col(Teams::TeamLeadId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(HrRoster::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(HrRoster::RosterId)
                            .string_len(80)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(HrRoster::HrId).string_len(64))
                    .col(ColumnDef::new(HrRoster::HrName).string_len(320))
                    .col(ColumnDef::new(HrRoster::HrRole).string_len(16))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_hr_roster_hr")
                    .table(HrRoster::Table)
                    .col(HrRoster::HrId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Projects::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Projects::ProjectId)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Projects::Name).string_len(320).not_null())
                    .col(ColumnDef::new(Projects::ManagerId).string_len(64))
                    .col(ColumnDef::new(Projects::ManagerName).string_len(320))
                    .col(ColumnDef::new(Projects::ManagerRole).string_len(16))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Projects::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(HrRoster::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Teams::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OrgChart::Table).if_exists().to_owned())
            .await?;
        Ok(())
    }
}
