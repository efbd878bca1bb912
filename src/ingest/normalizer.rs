use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;
use tracing::debug;

use crate::error::PipelineError;

/// A normalized telemetry fact, ready to persist once a patient id is
/// attached.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub metric_type: String,
    pub value: f64,
    pub observed_at: NaiveDateTime,
}

/// Timestamp alias fields, checked in order. Entries carrying none of these
/// are silently skipped (devices emit partial frames).
const TIMESTAMP_ALIASES: [&str; 3] = ["timestamp", "ecgStartDate", "sleepStartDate"];

/// Raw device key -> canonical metric type. Keys absent from this table pass
/// through verbatim so new device fields keep flowing without a deploy.
const METRIC_ALIASES: [(&str, &str); 11] = [
    ("heartRate", "heart_rate"),
    ("respiratoryRate", "respiratory_rate"),
    ("bodyTemperature", "body_temp"),
    ("ecgSignal", "ecg_signal"),
    ("ecgHeartRate", "ecg_heart_rate"),
    ("inBed", "in_bed"),
    ("awake", "awake"),
    ("rem", "rem"),
    ("deep", "deep"),
    ("core", "core"),
    ("unspecified", "unspecified"),
];

const VOLTAGE_SAMPLES_KEY: &str = "voltageMeasurements";
const PATIENT_ID_KEY: &str = "patient_id";

fn canonical_metric_type(raw: &str) -> &str {
    METRIC_ALIASES
        .iter()
        .find(|(alias, _)| *alias == raw)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(raw)
}

fn resolve_timestamp(entry: &serde_json::Map<String, Value>) -> Option<NaiveDateTime> {
    TIMESTAMP_ALIASES
        .iter()
        .find_map(|alias| entry.get(*alias))
        .and_then(Value::as_f64)
        .and_then(|epoch| {
            let secs = epoch.trunc() as i64;
            let nanos = (epoch.fract() * 1e9) as u32;
            DateTime::from_timestamp(secs, nanos).map(|dt| dt.naive_utc())
        })
}

/// Batch kind, decided from the shape of the first entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Ecg,
    Sleep,
}

impl BatchKind {
    pub fn label(&self) -> &'static str {
        match self {
            BatchKind::Ecg => "Ecg",
            BatchKind::Sleep => "Sleep",
        }
    }
}

/// Decides whether an ECG/sleep batch is ECG or sleep data. An unrecognized
/// first entry fails the whole batch before anything is written.
pub fn classify_batch(batch: &[Value]) -> Result<BatchKind, PipelineError> {
    let first = batch
        .first()
        .and_then(Value::as_object)
        .ok_or_else(|| PipelineError::MalformedPayload("empty or malformed batch".to_string()))?;

    if first.contains_key(VOLTAGE_SAMPLES_KEY) {
        Ok(BatchKind::Ecg)
    } else if first.contains_key("inBed") || first.contains_key("rem") {
        Ok(BatchKind::Sleep)
    } else {
        Err(PipelineError::MalformedPayload(
            "Unknown data type".to_string(),
        ))
    }
}

/// Flattens a heterogeneous telemetry batch into observations.
///
/// Per entry: the first present timestamp alias becomes the observation time
/// (no alias: entry skipped), every remaining field maps through the alias
/// table, and `voltageMeasurements` sub-samples are each flattened to a
/// `voltage` observation sharing the entry timestamp. Sub-samples or scalar
/// fields without a numeric value are dropped individually: a bad field
/// never fails its entry or the batch, so one corrupt reading cannot block
/// the rest of a frame from persisting. The sample time-offset inside a
/// sub-sample is discarded; the read side substitutes array position for it.
///
/// A non-object entry is a malformed batch: the whole request fails with no
/// partial writes.
pub fn normalize_batch(batch: &[Value]) -> Result<Vec<Observation>, PipelineError> {
    let mut observations = Vec::new();

    for (idx, raw_entry) in batch.iter().enumerate() {
        let entry = raw_entry.as_object().ok_or_else(|| {
            PipelineError::MalformedPayload(format!("entry {} is not an object", idx))
        })?;

        let Some(observed_at) = resolve_timestamp(entry) else {
            debug!("Entry {} has no timestamp alias, skipping", idx);
            continue;
        };

        for (key, value) in entry {
            if TIMESTAMP_ALIASES.contains(&key.as_str()) || key == PATIENT_ID_KEY {
                continue;
            }

            if key == VOLTAGE_SAMPLES_KEY {
                let samples = value.as_array().map(Vec::as_slice).unwrap_or_default();
                for sample in samples {
                    let offset = sample.get("timeSinceSampleStart").and_then(Value::as_f64);
                    let voltage = sample.get("voltage").and_then(Value::as_f64);
                    match (offset, voltage) {
                        (Some(_), Some(voltage)) => observations.push(Observation {
                            metric_type: "voltage".to_string(),
                            value: voltage,
                            observed_at,
                        }),
                        _ => debug!("Dropping malformed voltage sub-sample in entry {}", idx),
                    }
                }
                continue;
            }

            match value.as_f64() {
                Some(value) => observations.push(Observation {
                    metric_type: canonical_metric_type(key).to_string(),
                    value,
                    observed_at,
                }),
                None => debug!("Dropping non-numeric field '{}' in entry {}", key, idx),
            }
        }
    }

    Ok(observations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_vitals_through_alias_table() {
        let batch = vec![json!({
            "timestamp": 1700000000,
            "heartRate": 72.0,
            "respiratoryRate": 16.0,
            "bodyTemperature": 98.6
        })];
        let obs = normalize_batch(&batch).unwrap();
        assert_eq!(obs.len(), 3);
        let types: Vec<_> = obs.iter().map(|o| o.metric_type.as_str()).collect();
        assert!(types.contains(&"heart_rate"));
        assert!(types.contains(&"respiratory_rate"));
        assert!(types.contains(&"body_temp"));
    }

    #[test]
    fn unknown_keys_pass_through_verbatim() {
        let batch = vec![json!({ "timestamp": 1700000000, "oxygenSaturation": 97.0 })];
        let obs = normalize_batch(&batch).unwrap();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].metric_type, "oxygenSaturation");
        assert_eq!(obs[0].value, 97.0);
    }

    #[test]
    fn entry_without_timestamp_contributes_nothing_and_does_not_fail() {
        let batch = vec![
            json!({ "heartRate": 72.0 }),
            json!({ "timestamp": 1700000000, "heartRate": 75.0 }),
        ];
        let obs = normalize_batch(&batch).unwrap();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].value, 75.0);
    }

    #[test]
    fn timestamp_aliases_resolve_in_order() {
        let batch = vec![
            json!({ "ecgStartDate": 1700000000, "ecgHeartRate": 70.0 }),
            json!({ "sleepStartDate": 1700000100, "rem": 90.0 }),
        ];
        let obs = normalize_batch(&batch).unwrap();
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].metric_type, "ecg_heart_rate");
        assert_eq!(obs[1].metric_type, "rem");
        assert!(obs[1].observed_at > obs[0].observed_at);
    }

    #[test]
    fn voltage_sub_samples_flatten_in_order_under_parent_timestamp() {
        let batch = vec![json!({
            "ecgStartDate": 1700000000,
            "voltageMeasurements": [
                { "timeSinceSampleStart": 0.0, "voltage": 0.11 },
                { "timeSinceSampleStart": 0.002, "voltage": 0.12 },
                { "timeSinceSampleStart": 0.004, "voltage": 0.13 }
            ]
        })];
        let obs = normalize_batch(&batch).unwrap();
        assert_eq!(obs.len(), 3);
        let values: Vec<_> = obs.iter().map(|o| o.value).collect();
        assert_eq!(values, vec![0.11, 0.12, 0.13]);
        assert!(obs.iter().all(|o| o.metric_type == "voltage"));
        assert!(obs.iter().all(|o| o.observed_at == obs[0].observed_at));
    }

    #[test]
    fn malformed_sub_samples_are_dropped_individually() {
        let batch = vec![json!({
            "ecgStartDate": 1700000000,
            "voltageMeasurements": [
                { "timeSinceSampleStart": 0.0, "voltage": 0.11 },
                { "voltage": 0.12 },
                { "timeSinceSampleStart": 0.004 }
            ]
        })];
        let obs = normalize_batch(&batch).unwrap();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].value, 0.11);
    }

    #[test]
    fn patient_id_and_non_numeric_fields_are_not_persisted() {
        let batch = vec![json!({
            "timestamp": 1700000000,
            "patient_id": 7,
            "deviceName": "watch-se",
            "heartRate": 64.0
        })];
        let obs = normalize_batch(&batch).unwrap();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].metric_type, "heart_rate");
    }

    #[test]
    fn non_object_entry_fails_the_whole_batch() {
        let batch = vec![json!({ "timestamp": 1700000000, "heartRate": 64.0 }), json!(42)];
        let err = normalize_batch(&batch).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedPayload(_)));
    }

    #[test]
    fn empty_batch_normalizes_to_nothing() {
        assert!(normalize_batch(&[]).unwrap().is_empty());
    }

    #[test]
    fn classifies_ecg_sleep_and_rejects_unknown() {
        let ecg = vec![json!({ "ecgStartDate": 1.0, "voltageMeasurements": [] })];
        assert_eq!(classify_batch(&ecg).unwrap(), BatchKind::Ecg);

        let sleep = vec![json!({ "sleepStartDate": 1.0, "inBed": 420.0 })];
        assert_eq!(classify_batch(&sleep).unwrap(), BatchKind::Sleep);

        let unknown = vec![json!({ "timestamp": 1.0, "heartRate": 70.0 })];
        assert!(matches!(
            classify_batch(&unknown).unwrap_err(),
            PipelineError::MalformedPayload(_)
        ));

        assert!(classify_batch(&[]).is_err());
    }
}
