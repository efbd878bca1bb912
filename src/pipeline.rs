use redis::AsyncCommands;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use tracing::{error, info, warn};

use crate::alerts::{synthesize, NotificationIntent};
use crate::classifier::{ClassifierHandle, VitalFeatures};
use crate::entities::{health_metric, HealthMetric, Patient};
use crate::error::PipelineError;
use crate::notifications::ALERT_EMAIL_QUEUE;

/// The three metric types a classification run requires, in feature order.
const REQUIRED_VITALS: [&str; 3] = ["heart_rate", "respiratory_rate", "body_temp"];

/// Latest-value aggregation result. Deliberately a tri-state rather than
/// three optionals: an incomplete snapshot halts the pipeline instead of
/// feeding zeros to the classifier.
#[derive(Debug, PartialEq)]
pub enum VitalsSnapshot {
    Complete {
        heart_rate: f64,
        respiratory_rate: f64,
        body_temp: f64,
    },
    Incomplete {
        missing: Vec<&'static str>,
    },
}

/// Fetches the most recent observation of each required vital type.
pub async fn latest_vitals(
    db: &DatabaseConnection,
    patient_id: i32,
) -> Result<VitalsSnapshot, sea_orm::DbErr> {
    let mut values = [None; 3];
    for (slot, metric_type) in values.iter_mut().zip(REQUIRED_VITALS) {
        *slot = HealthMetric::find()
            .filter(health_metric::Column::PatientId.eq(patient_id))
            .filter(health_metric::Column::MetricType.eq(metric_type))
            .order_by_desc(health_metric::Column::CreatedAt)
            .one(db)
            .await?
            .map(|m| m.value);
    }

    match values {
        [Some(heart_rate), Some(respiratory_rate), Some(body_temp)] => {
            Ok(VitalsSnapshot::Complete {
                heart_rate,
                respiratory_rate,
                body_temp,
            })
        }
        _ => Ok(VitalsSnapshot::Incomplete {
            missing: values
                .iter()
                .zip(REQUIRED_VITALS)
                .filter(|(v, _)| v.is_none())
                .map(|(_, t)| t)
                .collect(),
        }),
    }
}

/// Runs aggregation -> classification -> alert synthesis -> notification
/// enqueue for one patient.
///
/// Only a persistence failure in the alert/condition transaction propagates;
/// incomplete vitals and classifier conditions halt quietly with a log line,
/// and a notification enqueue failure never affects the result.
pub async fn evaluate_patient(
    db: &DatabaseConnection,
    classifier: &ClassifierHandle,
    redis_client: &redis::Client,
    patient_id: i32,
) -> Result<(), PipelineError> {
    let snapshot = latest_vitals(db, patient_id).await?;
    let (heart_rate, respiratory_rate, body_temp) = match snapshot {
        VitalsSnapshot::Complete {
            heart_rate,
            respiratory_rate,
            body_temp,
        } => (heart_rate, respiratory_rate, body_temp),
        VitalsSnapshot::Incomplete { missing } => {
            info!(
                "Patient {}: {}, skipping classification",
                patient_id,
                PipelineError::IncompleteVitals { missing }
            );
            return Ok(());
        }
    };

    let patient = match Patient::find_by_id(patient_id).one(db).await? {
        Some(p) => p,
        None => {
            warn!("Patient {} not found, skipping classification", patient_id);
            return Ok(());
        }
    };

    let features = VitalFeatures {
        age: patient.age as f64,
        bmi: patient.bmi.unwrap_or(0.0),
        heart_rate,
        respiratory_rate,
        body_temp,
    };

    let output = match classifier.infer(&features) {
        Ok(output) => output,
        Err(e) => {
            // Condition update and alert are both skipped when the model
            // cannot run; the ingestion request itself still succeeds.
            error!("Classification failed for patient {}: {}", patient_id, e);
            return Ok(());
        }
    };
    info!("Patient {} classified: {}", patient_id, output);

    let outcome = synthesize(db, patient_id, &output).await?;

    if let Some(intent) = outcome.intent {
        enqueue_notification(redis_client, &intent).await;
    }

    Ok(())
}

/// Fire-and-forget handoff to the notification worker. Failures are logged
/// and swallowed; the alert transaction has already committed.
async fn enqueue_notification(redis_client: &redis::Client, intent: &NotificationIntent) {
    let payload = match serde_json::to_string(intent) {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to serialize notification intent: {}", e);
            return;
        }
    };

    match redis_client.get_multiplexed_async_connection().await {
        Ok(mut conn) => {
            let pushed: redis::RedisResult<()> = conn.rpush(ALERT_EMAIL_QUEUE, payload).await;
            match pushed {
                Ok(()) => info!(
                    "Enqueued {} notification for {}",
                    intent.severity.as_str(),
                    intent.patient_name
                ),
                Err(e) => warn!("Failed to enqueue notification: {}", e),
            }
        }
        Err(e) => warn!("Failed to get redis connection for notification: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn metric(metric_type: &str, value: f64) -> health_metric::Model {
        health_metric::Model {
            id: 1,
            patient_id: 1,
            metric_type: metric_type.to_string(),
            value,
            created_at: Utc::now().naive_utc(),
        }
    }

    #[tokio::test]
    async fn complete_snapshot_when_all_three_vitals_exist() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([
                vec![metric("heart_rate", 72.0)],
                vec![metric("respiratory_rate", 16.0)],
                vec![metric("body_temp", 98.6)],
            ])
            .into_connection();

        let snapshot = latest_vitals(&db, 1).await.unwrap();
        assert_eq!(
            snapshot,
            VitalsSnapshot::Complete {
                heart_rate: 72.0,
                respiratory_rate: 16.0,
                body_temp: 98.6
            }
        );
    }

    #[tokio::test]
    async fn incomplete_regardless_of_heart_rate_count() {
        // Only the latest heart-rate row comes back; respiratory and temp
        // queries find nothing.
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([
                vec![metric("heart_rate", 72.0)],
                Vec::new(),
                Vec::new(),
            ])
            .into_connection();

        let snapshot = latest_vitals(&db, 1).await.unwrap();
        assert_eq!(
            snapshot,
            VitalsSnapshot::Incomplete {
                missing: vec!["respiratory_rate", "body_temp"]
            }
        );
    }
}
