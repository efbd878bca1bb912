use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Patient row. Owned by the patient-management side; the telemetry pipeline
/// only reads age/bmi/contact info and overwrites `condition`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "patients")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub age: i32,
    #[sea_orm(nullable)]
    pub bmi: Option<f64>,
    pub condition: String,
    pub email: String,
    /// Clinician / emergency contact email, target of emergency notifications.
    pub emergency_contact: String,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::health_metric::Entity")]
    HealthMetric,
    #[sea_orm(has_many = "super::alert::Entity")]
    Alert,
}

impl Related<super::health_metric::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::HealthMetric.def()
    }
}

impl Related<super::alert::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Alert.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
