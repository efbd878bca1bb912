pub mod alerts;
pub mod api;
pub mod classifier;
pub mod entities;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod migrator;
pub mod notifications;
pub mod pipeline;
pub mod telemetry;
pub mod worker;

pub use sea_orm;
pub use redis;
