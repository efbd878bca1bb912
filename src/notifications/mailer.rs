use sendgrid::{Destination, Mail, SGClient};
use std::env;
use tracing::{error, info};

use super::NotificationTemplates;
use crate::alerts::{NotificationIntent, Severity};

/// Outbound mail relay. Credentials are resolved once at startup; a missing
/// credential is a fatal misconfiguration there, never a per-delivery error.
#[derive(Clone)]
pub struct Mailer {
    client: SGClient,
    from: String,
    details_url: String,
}

impl Mailer {
    pub fn from_env() -> Result<Self, String> {
        let api_key = env::var("SENDGRID_API_KEY")
            .map_err(|_| "SENDGRID_API_KEY must be set".to_string())?;
        let from = env::var("ALERT_EMAIL_FROM")
            .map_err(|_| "ALERT_EMAIL_FROM must be set".to_string())?;
        let details_url = env::var("ALERT_DETAILS_URL")
            .unwrap_or_else(|_| "http://localhost:5173/alerts".to_string());

        Ok(Self {
            client: SGClient::new(api_key),
            from,
            details_url,
        })
    }

    /// Recipient routing: abnormal goes to the patient, emergency to the
    /// clinician contact, normal to nobody.
    pub fn recipient(intent: &NotificationIntent) -> Option<&str> {
        match intent.severity {
            Severity::Normal => None,
            Severity::Abnormal => Some(intent.patient_email.as_str()),
            Severity::Emergency => Some(intent.clinician_email.as_str()),
        }
    }

    /// Delivers one alert notification. Every failure is logged and
    /// swallowed; the alert has already been committed and the pipeline's
    /// correctness never depends on delivery.
    pub async fn deliver(&self, intent: &NotificationIntent) {
        let Some(to_email) = Self::recipient(intent) else {
            // Defensive: the synthesizer never emits normal intents.
            info!("Normal severity intent, nothing to deliver");
            return;
        };

        let subject = match intent.severity {
            Severity::Emergency => "Health Alert: Emergency",
            _ => "Health Alert: Abnormal",
        };
        let body = NotificationTemplates::health_alert_email(
            &intent.patient_name,
            &intent.issue_text,
            &self.details_url,
        );

        if let Err(e) = self.send_email(to_email, subject, &body).await {
            error!("Failed to send alert email: {}", e);
        }
    }

    async fn send_email(&self, to_email: &str, subject: &str, body: &str) -> Result<(), String> {
        // Owned copies move into the blocking task; SGClient is blocking.
        let to_email = to_email.to_string();
        let subject = subject.to_string();
        let body = body.to_string();
        let from = self.from.clone();
        let client = self.client.clone();
        let to_email_log = to_email.clone();

        match tokio::task::spawn_blocking(move || {
            let mail = Mail::new()
                .add_to(Destination {
                    address: &to_email,
                    name: "Patient",
                })
                .add_from(&from)
                .add_subject(&subject)
                .add_html(&body);
            client.send(mail)
        })
        .await
        {
            Ok(Ok(_)) => {
                info!("Email sent successfully to {}", to_email_log);
                crate::metrics::increment_notifications_sent("email");
                Ok(())
            }
            Ok(Err(e)) => {
                crate::metrics::increment_notifications_failed("email");
                Err(format!("SendGrid error: {}", e))
            }
            Err(e) => {
                crate::metrics::increment_notifications_failed("email");
                Err(format!("Task join error: {}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(severity: Severity) -> NotificationIntent {
        NotificationIntent {
            severity,
            patient_name: "Ada".to_string(),
            issue_text: "Abnormal heart rate".to_string(),
            patient_email: "ada@example.com".to_string(),
            clinician_email: "clinic@example.com".to_string(),
        }
    }

    #[test]
    fn abnormal_routes_to_patient() {
        assert_eq!(
            Mailer::recipient(&intent(Severity::Abnormal)),
            Some("ada@example.com")
        );
    }

    #[test]
    fn emergency_routes_to_clinician_not_patient() {
        assert_eq!(
            Mailer::recipient(&intent(Severity::Emergency)),
            Some("clinic@example.com")
        );
    }

    #[test]
    fn normal_routes_nowhere() {
        assert_eq!(Mailer::recipient(&intent(Severity::Normal)), None);
    }
}
