use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Persisted health alert. Created only by the alert synthesizer when at
/// least one classifier sub-status is non-normal, so `severity` is never
/// "normal" at creation. `status` lifecycle (active -> resolved) belongs to
/// the alert-management side.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "alerts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub patient_id: i32,
    #[sea_orm(column_type = "Text")]
    pub message: String,
    pub severity: String,
    pub status: String,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::patient::Entity",
        from = "Column::PatientId",
        to = "super::patient::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Patient,
}

impl Related<super::patient::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Patient.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
