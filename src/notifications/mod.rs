pub mod mailer;
pub mod templates;

pub use mailer::Mailer;
pub use templates::NotificationTemplates;

/// Redis list carrying serialized `NotificationIntent`s from the alert
/// synthesizer to the delivery worker.
pub const ALERT_EMAIL_QUEUE: &str = "alert_email_queue";
