use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::entities::health_metric;

#[derive(Deserialize)]
pub struct EcgQuery {
    pub metric_type: Option<String>,
}

/// One chart point. `time` is the observation's position in ascending
/// timestamp order, not real elapsed time; sub-sample offsets were discarded
/// at normalization.
#[derive(Serialize)]
pub struct EcgPoint {
    pub time: usize,
    pub value: f64,
    pub created_at: chrono::NaiveDateTime,
}

/// GET /api/static/ecg/:patient_id — ordered waveform read-back, defaulting
/// to the flattened voltage samples.
pub async fn get_ecg_data(
    Extension(db): Extension<DatabaseConnection>,
    Path(patient_id): Path<i32>,
    Query(query): Query<EcgQuery>,
) -> Response {
    let metric_type = query.metric_type.as_deref().unwrap_or("voltage");

    let rows = match health_metric::Entity::find()
        .filter(health_metric::Column::PatientId.eq(patient_id))
        .filter(health_metric::Column::MetricType.eq(metric_type))
        .order_by_asc(health_metric::Column::CreatedAt)
        // Flattened sub-samples share a timestamp; id preserves insert order.
        .order_by_asc(health_metric::Column::Id)
        .all(&db)
        .await
    {
        Ok(rows) => rows,
        Err(e) => {
            error!("Failed to fetch {} data: {}", metric_type, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"status": "error", "message": "Database error"})),
            )
                .into_response();
        }
    };

    if rows.is_empty() {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "status": "error",
                "message": "No ECG data found for this patient"
            })),
        )
            .into_response();
    }

    let points: Vec<EcgPoint> = rows
        .into_iter()
        .enumerate()
        .map(|(index, row)| EcgPoint {
            time: index,
            value: row.value,
            created_at: row.created_at,
        })
        .collect();

    (StatusCode::OK, Json(points)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn voltage_row(id: i32, value: f64, observed_at: chrono::NaiveDateTime) -> health_metric::Model {
        health_metric::Model {
            id,
            patient_id: 1,
            metric_type: "voltage".to_string(),
            value,
            created_at: observed_at,
        }
    }

    async fn body_json(response: Response) -> (StatusCode, serde_json::Value) {
        let (parts, body) = response.into_parts();
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        (parts.status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn reads_back_flattened_samples_in_insert_order_with_positional_time() {
        // Three sub-samples flattened from one entry share the parent
        // timestamp; insert order (id) breaks the tie.
        let observed_at = Utc::now().naive_utc();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![
                voltage_row(1, 0.11, observed_at),
                voltage_row(2, 0.12, observed_at),
                voltage_row(3, 0.13, observed_at),
            ]])
            .into_connection();

        // With the mock feature, DatabaseConnection is not Clone; share the
        // inner mock connection so the transaction log stays inspectable.
        let db_handle = match &db {
            DatabaseConnection::MockDatabaseConnection(conn) => {
                DatabaseConnection::MockDatabaseConnection(std::sync::Arc::clone(conn))
            }
            _ => unreachable!(),
        };

        let response = get_ecg_data(
            Extension(db_handle),
            Path(1),
            Query(EcgQuery { metric_type: None }),
        )
        .await;

        let (status, json) = body_json(response).await;
        assert_eq!(status, StatusCode::OK);

        let points = json.as_array().unwrap();
        assert_eq!(points.len(), 3);
        for (index, point) in points.iter().enumerate() {
            assert_eq!(point["time"].as_u64().unwrap() as usize, index);
        }
        let values: Vec<f64> = points.iter().map(|p| p["value"].as_f64().unwrap()).collect();
        assert_eq!(values, vec![0.11, 0.12, 0.13]);

        // The query orders by timestamp with id as tie-break.
        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains(r#""created_at" ASC"#));
        assert!(log.contains(r#""id" ASC"#));
    }

    #[tokio::test]
    async fn missing_data_returns_not_found_error_body() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<health_metric::Model>::new()])
            .into_connection();

        let response = get_ecg_data(
            Extension(db),
            Path(9),
            Query(EcgQuery { metric_type: None }),
        )
        .await;

        let (status, json) = body_json(response).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "No ECG data found for this patient");
    }
}
