use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::classifier::{ClassifierOutput, Status};
use crate::entities::{alert, patient, Alert, Patient};
use crate::error::PipelineError;

/// Overall alert severity, the max over the three sub-statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Normal,
    Abnormal,
    Emergency,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Normal => "normal",
            Severity::Abnormal => "abnormal",
            Severity::Emergency => "emergency",
        }
    }

    fn from_status(status: Status) -> Self {
        match status {
            Status::Normal => Severity::Normal,
            Status::Abnormal => Severity::Abnormal,
            Status::Emergency => Severity::Emergency,
        }
    }
}

/// What the synthesizer asks the notification worker to deliver. Crossing a
/// queue boundary, so it is plain serializable data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationIntent {
    pub severity: Severity,
    pub patient_name: String,
    pub issue_text: String,
    pub patient_email: String,
    pub clinician_email: String,
}

/// Result of one synthesis run. `alert`/`intent` are both `None` for a fully
/// normal reading.
#[derive(Debug)]
pub struct AlertOutcome {
    pub alert: Option<alert::Model>,
    pub intent: Option<NotificationIntent>,
}

/// Sub-status message phrasing, in the fixed (heart rate, respiratory, body
/// temperature) order.
const VITAL_MESSAGES: [(&str, &str); 3] = [
    ("Abnormal heart rate", "Emergency! Heart rate is critical"),
    (
        "Abnormal respiratory rate",
        "Emergency! Respiratory rate is critical",
    ),
    (
        "Abnormal body temperature",
        "Emergency! Body temperature is critical",
    ),
];

/// Folds the classifier output into a combined message and overall severity.
/// Escalation is monotonic: an emergency sub-status is never downgraded by a
/// later abnormal one. A fully normal output composes to `None`.
pub fn compose(output: &ClassifierOutput) -> Option<(String, Severity)> {
    let statuses = [output.heart_rate, output.respiratory_rate, output.body_temp];
    let mut messages = Vec::new();
    let mut severity = Severity::Normal;

    for (status, (abnormal_msg, emergency_msg)) in statuses.into_iter().zip(VITAL_MESSAGES) {
        match status {
            Status::Normal => {}
            Status::Abnormal => messages.push(abnormal_msg),
            Status::Emergency => messages.push(emergency_msg),
        }
        severity = severity.max(Severity::from_status(status));
    }

    if messages.is_empty() {
        None
    } else {
        Some((messages.join("; "), severity))
    }
}

/// Persists the classification outcome: overwrites the patient's condition
/// with the stringified output tuple and, when any sub-status deviates,
/// inserts one active Alert. Both writes share one transaction with the
/// patient row locked, so racing batches for the same patient serialize and
/// condition always reflects the last completed classification.
pub async fn synthesize(
    db: &DatabaseConnection,
    patient_id: i32,
    output: &ClassifierOutput,
) -> Result<AlertOutcome, PipelineError> {
    let txn = db.begin().await?;

    let patient = Patient::find_by_id(patient_id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or_else(|| {
            PipelineError::Persistence(DbErr::RecordNotFound(format!(
                "patient {} not found",
                patient_id
            )))
        })?;

    Patient::update_many()
        .col_expr(patient::Column::Condition, Expr::value(output.to_string()))
        .filter(patient::Column::Id.eq(patient_id))
        .exec(&txn)
        .await?;

    let composed = compose(output);
    let alert = if let Some((message, severity)) = &composed {
        let alert = alert::Model {
            id: Uuid::new_v4(),
            patient_id,
            message: message.clone(),
            severity: severity.as_str().to_string(),
            status: "active".to_string(),
            created_at: Utc::now().naive_utc(),
        };
        Alert::insert(alert::ActiveModel {
            id: Set(alert.id),
            patient_id: Set(alert.patient_id),
            message: Set(alert.message.clone()),
            severity: Set(alert.severity.clone()),
            status: Set(alert.status.clone()),
            created_at: Set(alert.created_at),
        })
        .exec_without_returning(&txn)
        .await?;
        Some(alert)
    } else {
        None
    };

    txn.commit().await?;

    let intent = composed.map(|(issue_text, severity)| {
        metrics::counter!("vitalrelay_alerts_created_total", "severity" => severity.as_str())
            .increment(1);
        info!(
            "Alert created for patient {}: severity={}, message={}",
            patient_id,
            severity.as_str(),
            issue_text
        );
        NotificationIntent {
            severity,
            patient_name: patient.name.clone(),
            issue_text,
            patient_email: patient.email.clone(),
            clinician_email: patient.emergency_contact.clone(),
        }
    });

    if intent.is_none() {
        info!(
            "Patient {} classified fully normal, condition updated, no alert",
            patient_id
        );
    }

    Ok(AlertOutcome { alert, intent })
}
