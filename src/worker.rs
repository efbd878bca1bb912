use redis::AsyncCommands;
use std::sync::Arc;
use tracing::Instrument;

use crate::alerts::NotificationIntent;
use crate::notifications::{Mailer, ALERT_EMAIL_QUEUE};

// Queue Monitoring
pub async fn start_queue_monitor(redis_client: redis::Client) {
    let redis_client = Arc::new(redis_client);

    tokio::spawn(async move {
        tracing::info!("Queue Monitor started");
        loop {
            let mut conn = match redis_client.get_multiplexed_async_connection().await {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!("Queue Monitor: Failed to get redis conn: {}", e);
                    tokio::time::sleep(tokio::time::Duration::from_secs(15)).await;
                    continue;
                }
            };

            let queue_len: redis::RedisResult<u64> = conn.llen(ALERT_EMAIL_QUEUE).await;
            match queue_len {
                Ok(len) => metrics::gauge!("vitalrelay_queue_depth", "queue" => ALERT_EMAIL_QUEUE)
                    .set(len as f64),
                Err(e) => tracing::error!("Failed to get {} len: {}", ALERT_EMAIL_QUEUE, e),
            }

            tokio::time::sleep(tokio::time::Duration::from_secs(15)).await;
        }
    });
}

/// Consumes notification intents and delivers them. Delivery failure is
/// terminal for the intent: logged, counted, never retried.
pub async fn start_notification_workers(
    redis_client: redis::Client,
    mailer: Mailer,
    concurrency: usize,
) {
    start_queue_monitor(redis_client.clone()).await;

    let redis_client = Arc::new(redis_client);
    let mailer = Arc::new(mailer);

    for i in 0..concurrency {
        let redis_client = redis_client.clone();
        let mailer = mailer.clone();

        tokio::spawn(async move {
            tracing::info!("Notification Worker {} started", i);
            loop {
                let mut conn = match redis_client.get_multiplexed_async_connection().await {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::error!("Worker {}: Failed to get redis conn: {}", i, e);
                        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let result: redis::RedisResult<(String, String)> =
                    conn.blpop(ALERT_EMAIL_QUEUE, 0.0).await;

                match result {
                    Ok((_key, payload_str)) => {
                        let intent: NotificationIntent = match serde_json::from_str(&payload_str) {
                            Ok(intent) => intent,
                            Err(e) => {
                                tracing::error!("Worker {}: Bad intent payload: {}", i, e);
                                continue;
                            }
                        };

                        deliver_intent(&mailer, intent, i).await;
                    }
                    Err(e) => {
                        tracing::error!("Worker {}: Redis error: {}", i, e);
                        tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
                    }
                }
            }
        });
    }
}

async fn deliver_intent(mailer: &Mailer, intent: NotificationIntent, worker_id: usize) {
    let span = tracing::info_span!(
        "deliver_notification",
        "otel.name" = "deliver_notification",
        severity = intent.severity.as_str(),
        worker = worker_id
    );

    async {
        tracing::info!(
            "Dequeued {} notification for {}",
            intent.severity.as_str(),
            intent.patient_name
        );
        mailer.deliver(&intent).await;
    }
    .instrument(span)
    .await
}
