pub mod normalizer;

pub use normalizer::{classify_batch, normalize_batch, BatchKind, Observation};

/// Ingestion configuration injected into the handlers. Device batches carry
/// no routing information, so every observation lands on one configured
/// patient (the original upstream hard-coded this; here it is injectable).
#[derive(Clone, Copy, Debug)]
pub struct IngestConfig {
    pub default_patient_id: i32,
}

impl IngestConfig {
    pub fn from_env() -> Self {
        let default_patient_id = std::env::var("INGEST_PATIENT_ID")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);
        Self { default_patient_id }
    }
}
