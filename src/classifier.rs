use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

use crate::error::PipelineError;

/// One classifier sub-status. Ordering matters: severity escalation folds
/// these with `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Status {
    Normal,
    Abnormal,
    Emergency,
}

impl Status {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Status::Normal,
            1 => Status::Abnormal,
            _ => Status::Emergency,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Status::Normal => 0,
            Status::Abnormal => 1,
            Status::Emergency => 2,
        }
    }
}

/// Ordered triple of sub-statuses, positionally bound to
/// (heart_rate, respiratory_rate, body_temp). The ordering is a contract
/// with the frozen model artifact; do not reorder without retraining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierOutput {
    pub heart_rate: Status,
    pub respiratory_rate: Status,
    pub body_temp: Status,
}

impl ClassifierOutput {
    pub fn is_all_normal(&self) -> bool {
        self.heart_rate == Status::Normal
            && self.respiratory_rate == Status::Normal
            && self.body_temp == Status::Normal
    }
}

impl fmt::Display for ClassifierOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {})",
            self.heart_rate.code(),
            self.respiratory_rate.code(),
            self.body_temp.code()
        )
    }
}

/// Feature vector for one inference. Field order mirrors the artifact's
/// training columns: age, bmi, heart_rate, respiratory_rate, body_temp.
#[derive(Debug, Clone, Copy)]
pub struct VitalFeatures {
    pub age: f64,
    pub bmi: f64,
    pub heart_rate: f64,
    pub respiratory_rate: f64,
    pub body_temp: f64,
}

impl VitalFeatures {
    fn to_vec(&self) -> [f64; 5] {
        [
            self.age,
            self.bmi,
            self.heart_rate,
            self.respiratory_rate,
            self.body_temp,
        ]
    }
}

pub trait Classifier: Send + Sync {
    fn infer(&self, features: &VitalFeatures) -> Result<ClassifierOutput, PipelineError>;
}

/// Process-wide classifier handle, read-only after startup.
pub type ClassifierHandle = Arc<dyn Classifier>;

// ============================================================================
// Frozen forest artifact
// ============================================================================

/// Flattened decision-tree node. `feature == -1` marks a leaf, in which case
/// `value` is the predicted class code.
#[derive(Debug, Deserialize)]
struct Node {
    feature: i32,
    threshold: f64,
    left: usize,
    right: usize,
    value: u8,
}

#[derive(Debug, Deserialize)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn predict(&self, x: &[f64; 5]) -> u8 {
        let mut idx = 0usize;
        // Depth bound guards against a cyclic artifact.
        for _ in 0..self.nodes.len() + 1 {
            let node = &self.nodes[idx];
            if node.feature < 0 {
                return node.value;
            }
            idx = if x[node.feature as usize] <= node.threshold {
                node.left
            } else {
                node.right
            };
        }
        self.nodes[idx].value
    }
}

#[derive(Debug, Deserialize)]
struct OutputForest {
    target: String,
    trees: Vec<Tree>,
}

impl OutputForest {
    /// Majority vote across trees.
    fn predict(&self, x: &[f64; 5]) -> Status {
        let mut votes = [0usize; 3];
        for tree in &self.trees {
            let code = tree.predict(x).min(2);
            votes[code as usize] += 1;
        }
        let winner = votes
            .iter()
            .enumerate()
            .max_by_key(|(_, count)| **count)
            .map(|(code, _)| code as u8)
            .unwrap_or(0);
        Status::from_code(winner)
    }
}

#[derive(Debug, Deserialize)]
struct ForestArtifact {
    feature_names: Vec<String>,
    outputs: Vec<OutputForest>,
}

const FEATURE_NAMES: [&str; 5] = ["age", "bmi", "heart_rate", "respiratory_rate", "body_temp"];
const OUTPUT_TARGETS: [&str; 3] = ["heart_rate", "respiratory_rate", "body_temp"];

impl ForestArtifact {
    fn validate(&self) -> Result<(), String> {
        if self.feature_names != FEATURE_NAMES {
            return Err(format!("unexpected feature columns: {:?}", self.feature_names));
        }
        if self.outputs.len() != OUTPUT_TARGETS.len() {
            return Err(format!("expected 3 outputs, got {}", self.outputs.len()));
        }
        for (forest, expected) in self.outputs.iter().zip(OUTPUT_TARGETS) {
            if forest.target != expected {
                return Err(format!(
                    "output target mismatch: got '{}', expected '{}'",
                    forest.target, expected
                ));
            }
            if forest.trees.is_empty() {
                return Err(format!("output '{}' has no trees", forest.target));
            }
            for tree in &forest.trees {
                if tree.nodes.is_empty() {
                    return Err(format!("output '{}' has an empty tree", forest.target));
                }
                for node in &tree.nodes {
                    let out_of_range = node.feature >= 0
                        && (node.feature as usize >= FEATURE_NAMES.len()
                            || node.left >= tree.nodes.len()
                            || node.right >= tree.nodes.len());
                    if out_of_range {
                        return Err(format!("output '{}' has an invalid node", forest.target));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Adapter around the frozen multi-output forest. Loaded once at startup; a
/// load failure leaves it permanently disabled and every `infer` reports
/// `ModelUnavailable` instead of crashing the service.
pub struct ForestClassifier {
    artifact: Option<ForestArtifact>,
}

impl ForestClassifier {
    pub fn load(path: &str) -> Self {
        info!("Loading classifier artifact from {}", path);
        let artifact = std::fs::read_to_string(path)
            .map_err(|e| format!("read failed: {}", e))
            .and_then(|raw| {
                serde_json::from_str::<ForestArtifact>(&raw)
                    .map_err(|e| format!("parse failed: {}", e))
            })
            .and_then(|artifact| artifact.validate().map(|_| artifact));

        match artifact {
            Ok(artifact) => {
                info!(
                    "Classifier artifact loaded: {} trees",
                    artifact.outputs.iter().map(|o| o.trees.len()).sum::<usize>()
                );
                Self {
                    artifact: Some(artifact),
                }
            }
            Err(e) => {
                error!("Failed to load classifier artifact: {}. Inference disabled.", e);
                metrics::counter!("vitalrelay_classifier_errors_total", "kind" => "load")
                    .increment(1);
                Self { artifact: None }
            }
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.artifact.is_none()
    }
}

impl Classifier for ForestClassifier {
    fn infer(&self, features: &VitalFeatures) -> Result<ClassifierOutput, PipelineError> {
        let x = features.to_vec();
        if let Some(pos) = x.iter().position(|v| !v.is_finite()) {
            metrics::counter!("vitalrelay_classifier_errors_total", "kind" => "invalid_input")
                .increment(1);
            return Err(PipelineError::InvalidInput(format!(
                "feature '{}' is not a finite number",
                FEATURE_NAMES[pos]
            )));
        }

        let artifact = self.artifact.as_ref().ok_or_else(|| {
            metrics::counter!("vitalrelay_classifier_errors_total", "kind" => "unavailable")
                .increment(1);
            PipelineError::ModelUnavailable
        })?;

        Ok(ClassifierOutput {
            heart_rate: artifact.outputs[0].predict(&x),
            respiratory_rate: artifact.outputs[1].predict(&x),
            body_temp: artifact.outputs[2].predict(&x),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(heart_rate: f64, respiratory_rate: f64, body_temp: f64) -> VitalFeatures {
        VitalFeatures {
            age: 30.0,
            bmi: 22.5,
            heart_rate,
            respiratory_rate,
            body_temp,
        }
    }

    /// Single-tree-per-output artifact: heart_rate output splits on the
    /// heart_rate feature at 100 bpm (normal vs abnormal); the other two
    /// outputs always predict normal / emergency respectively.
    fn test_artifact() -> ForestArtifact {
        let raw = serde_json::json!({
            "feature_names": ["age", "bmi", "heart_rate", "respiratory_rate", "body_temp"],
            "outputs": [
                {
                    "target": "heart_rate",
                    "trees": [{ "nodes": [
                        { "feature": 2, "threshold": 100.0, "left": 1, "right": 2, "value": 0 },
                        { "feature": -1, "threshold": 0.0, "left": 0, "right": 0, "value": 0 },
                        { "feature": -1, "threshold": 0.0, "left": 0, "right": 0, "value": 1 }
                    ]}]
                },
                {
                    "target": "respiratory_rate",
                    "trees": [{ "nodes": [
                        { "feature": -1, "threshold": 0.0, "left": 0, "right": 0, "value": 0 }
                    ]}]
                },
                {
                    "target": "body_temp",
                    "trees": [{ "nodes": [
                        { "feature": -1, "threshold": 0.0, "left": 0, "right": 0, "value": 2 }
                    ]}]
                }
            ]
        });
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn predicts_per_output_in_fixed_order() {
        let clf = ForestClassifier {
            artifact: Some(test_artifact()),
        };
        let out = clf.infer(&features(120.0, 16.0, 98.6)).unwrap();
        assert_eq!(out.heart_rate, Status::Abnormal);
        assert_eq!(out.respiratory_rate, Status::Normal);
        assert_eq!(out.body_temp, Status::Emergency);

        let out = clf.infer(&features(80.0, 16.0, 98.6)).unwrap();
        assert_eq!(out.heart_rate, Status::Normal);
    }

    #[test]
    fn non_finite_input_is_rejected_before_inference() {
        let clf = ForestClassifier {
            artifact: Some(test_artifact()),
        };
        let err = clf.infer(&features(f64::NAN, 16.0, 98.6)).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[test]
    fn disabled_classifier_reports_model_unavailable() {
        let clf = ForestClassifier { artifact: None };
        assert!(clf.is_disabled());
        let err = clf.infer(&features(80.0, 16.0, 98.6)).unwrap_err();
        assert!(matches!(err, PipelineError::ModelUnavailable));
    }

    #[test]
    fn load_failure_disables_instead_of_panicking() {
        let clf = ForestClassifier::load("/nonexistent/model.json");
        assert!(clf.is_disabled());
    }

    #[test]
    fn artifact_with_wrong_output_order_is_rejected() {
        let mut artifact = test_artifact();
        artifact.outputs.swap(0, 1);
        assert!(artifact.validate().is_err());
    }

    #[test]
    fn output_displays_as_code_tuple() {
        let out = ClassifierOutput {
            heart_rate: Status::Normal,
            respiratory_rate: Status::Emergency,
            body_temp: Status::Abnormal,
        };
        assert_eq!(out.to_string(), "(0, 2, 1)");
    }
}
