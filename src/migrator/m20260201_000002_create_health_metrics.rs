use sea_orm_migration::prelude::*;

use super::m20260201_000001_create_patients::Patients;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(HealthMetrics::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(HealthMetrics::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(HealthMetrics::PatientId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(HealthMetrics::MetricType)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(HealthMetrics::Value).double().not_null())
                    .col(
                        ColumnDef::new(HealthMetrics::CreatedAt)
                            .date_time()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_health_metrics_patient")
                            .from(HealthMetrics::Table, HealthMetrics::PatientId)
                            .to(Patients::Table, Patients::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Latest-per-type lookups filter on (patient_id, metric_type) and
        // order by created_at.
        manager
            .create_index(
                Index::create()
                    .name("idx_health_metrics_patient_type_time")
                    .table(HealthMetrics::Table)
                    .col(HealthMetrics::PatientId)
                    .col(HealthMetrics::MetricType)
                    .col(HealthMetrics::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(HealthMetrics::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum HealthMetrics {
    Table,
    Id,
    PatientId,
    MetricType,
    Value,
    CreatedAt,
}
