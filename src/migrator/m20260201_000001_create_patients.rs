use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Patients::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Patients::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Patients::Name).string().not_null())
                    .col(ColumnDef::new(Patients::Age).integer().not_null())
                    .col(ColumnDef::new(Patients::Bmi).double())
                    .col(ColumnDef::new(Patients::Condition).string().not_null())
                    .col(ColumnDef::new(Patients::Email).string().not_null())
                    .col(
                        ColumnDef::new(Patients::EmergencyContact)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Patients::CreatedAt).date_time().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Patients::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Patients {
    Table,
    Id,
    Name,
    Age,
    Bmi,
    Condition,
    Email,
    EmergencyContact,
    CreatedAt,
}
