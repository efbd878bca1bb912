use crate::entities::{alert, health_metric, patient};
use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait};

pub async fn init_metrics(db: &DatabaseConnection) {
    let patient_count = patient::Entity::find().count(db).await.unwrap_or(0);
    metrics::gauge!("vitalrelay_patients_total").set(patient_count as f64);

    let observation_count = health_metric::Entity::find().count(db).await.unwrap_or(0);
    metrics::gauge!("vitalrelay_observations_total").set(observation_count as f64);

    let alert_count = alert::Entity::find().count(db).await.unwrap_or(0);
    metrics::gauge!("vitalrelay_alerts_total").set(alert_count as f64);

    tracing::info!(
        "Initialized metrics: Patients={}, Observations={}, Alerts={}",
        patient_count,
        observation_count,
        alert_count
    );
}

pub fn increment_observations_ingested(metric_type: &str, count: u64) {
    metrics::counter!("vitalrelay_observations_ingested_total", "metric_type" => metric_type.to_string())
        .increment(count);
}

pub fn increment_batches_received(kind: &str) {
    metrics::counter!("vitalrelay_batches_received_total", "kind" => kind.to_string()).increment(1);
}

pub fn increment_batches_rejected(kind: &str) {
    metrics::counter!("vitalrelay_batches_rejected_total", "kind" => kind.to_string()).increment(1);
}

pub fn increment_notifications_sent(channel: &str) {
    metrics::counter!("vitalrelay_notifications_sent_total", "channel" => channel.to_string())
        .increment(1);
}

pub fn increment_notifications_failed(channel: &str) {
    metrics::counter!("vitalrelay_notifications_failed_total", "channel" => channel.to_string())
        .increment(1);
}
