use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{DatabaseConnection, EntityTrait, Set};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use crate::classifier::ClassifierHandle;
use crate::entities::health_metric;
use crate::error::PipelineError;
use crate::ingest::{classify_batch, normalize_batch, IngestConfig, Observation};
use crate::pipeline;

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub message: String,
}

fn success(message: impl Into<String>) -> Response {
    (
        StatusCode::OK,
        Json(StatusResponse {
            status: "success",
            message: message.into(),
        }),
    )
        .into_response()
}

fn failure(code: StatusCode, message: impl Into<String>) -> Response {
    (
        code,
        Json(StatusResponse {
            status: "error",
            message: message.into(),
        }),
    )
        .into_response()
}

fn error_response(err: PipelineError) -> Response {
    match err {
        PipelineError::MalformedPayload(message) => failure(StatusCode::BAD_REQUEST, message),
        other => {
            error!("Ingestion pipeline error: {}", other);
            failure(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

async fn insert_observations(
    db: &DatabaseConnection,
    patient_id: i32,
    observations: &[Observation],
) -> Result<(), sea_orm::DbErr> {
    if observations.is_empty() {
        return Ok(());
    }

    let rows = observations.iter().map(|obs| health_metric::ActiveModel {
        patient_id: Set(patient_id),
        metric_type: Set(obs.metric_type.clone()),
        value: Set(obs.value),
        created_at: Set(obs.observed_at),
        ..Default::default()
    });

    health_metric::Entity::insert_many(rows)
        .exec_without_returning(db)
        .await?;

    for obs in observations {
        crate::metrics::increment_observations_ingested(&obs.metric_type, 1);
    }
    Ok(())
}

/// POST /api/data — scalar vitals batch from the watch. Observations commit
/// on their own, then the classification pipeline runs; only a malformed
/// payload or a persistence failure reaches the caller.
pub async fn receive_vitals(
    Extension(db): Extension<DatabaseConnection>,
    Extension(redis_client): Extension<redis::Client>,
    Extension(classifier): Extension<ClassifierHandle>,
    Extension(config): Extension<IngestConfig>,
    Json(payload): Json<Value>,
) -> Response {
    crate::metrics::increment_batches_received("vitals");

    let Some(batch) = payload.as_array() else {
        crate::metrics::increment_batches_rejected("vitals");
        return failure(StatusCode::BAD_REQUEST, "payload must be an array");
    };

    let observations = match normalize_batch(batch) {
        Ok(observations) => observations,
        Err(e) => {
            crate::metrics::increment_batches_rejected("vitals");
            return error_response(e);
        }
    };

    let patient_id = config.default_patient_id;
    info!(
        "Normalized {} observations from {} entries for patient {}",
        observations.len(),
        batch.len(),
        patient_id
    );

    if let Err(e) = insert_observations(&db, patient_id, &observations).await {
        return error_response(PipelineError::Persistence(e));
    }

    if let Err(e) = pipeline::evaluate_patient(&db, &classifier, &redis_client, patient_id).await {
        return error_response(e);
    }

    success("Data saved and condition updated")
}

/// POST /api/static — ECG or sleep batch. The first entry decides the batch
/// kind; an unrecognized shape fails the whole request with no writes. These
/// payloads carry no vitals triple, so the classification pipeline does not
/// run here.
pub async fn receive_static(
    Extension(db): Extension<DatabaseConnection>,
    Extension(config): Extension<IngestConfig>,
    Json(payload): Json<Value>,
) -> Response {
    let Some(batch) = payload.as_array() else {
        crate::metrics::increment_batches_rejected("static");
        return failure(StatusCode::BAD_REQUEST, "payload must be an array");
    };

    let kind = match classify_batch(batch) {
        Ok(kind) => kind,
        Err(e) => {
            crate::metrics::increment_batches_rejected("static");
            return error_response(e);
        }
    };
    crate::metrics::increment_batches_received(kind.label());

    let observations = match normalize_batch(batch) {
        Ok(observations) => observations,
        Err(e) => {
            crate::metrics::increment_batches_rejected(kind.label());
            return error_response(e);
        }
    };

    let patient_id = config.default_patient_id;
    info!(
        "Normalized {} {} observations for patient {}",
        observations.len(),
        kind.label(),
        patient_id
    );

    if let Err(e) = insert_observations(&db, patient_id, &observations).await {
        return error_response(PipelineError::Persistence(e));
    }

    success(format!("{} data saved successfully", kind.label()))
}
