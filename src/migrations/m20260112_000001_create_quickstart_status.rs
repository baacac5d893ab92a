use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(QuickstartStatus::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(QuickstartStatus::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(QuickstartStatus::Step)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(QuickstartStatus::Position).integer().not_null())
                    .col(
                        ColumnDef::new(QuickstartStatus::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(QuickstartStatus::Message).string())
                    .col(ColumnDef::new(QuickstartStatus::StartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(QuickstartStatus::CompletedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(QuickstartStatus::Error).text())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(QuickstartStatus::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum QuickstartStatus {
    Table,
    Id,
    Step,
    Position,
    Status,
    Message,
    StartedAt,
    CompletedAt,
    Error,
}
