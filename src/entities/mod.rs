pub mod alert;
pub mod health_metric;
pub mod patient;

pub use alert::Entity as Alert;
pub use health_metric::Entity as HealthMetric;
pub use patient::Entity as Patient;
