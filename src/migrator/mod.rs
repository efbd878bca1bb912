use sea_orm_migration::prelude::*;

mod m20260201_000001_create_patients;
mod m20260201_000002_create_health_metrics;
mod m20260201_000003_create_alerts;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260201_000001_create_patients::Migration),
            Box::new(m20260201_000002_create_health_metrics::Migration),
            Box::new(m20260201_000003_create_alerts::Migration),
        ]
    }
}
