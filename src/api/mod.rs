pub mod ecg;
pub mod ingest;
