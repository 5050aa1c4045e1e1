use crate::error::{AuditError, Result};
use crate::model::{Classifier, NearestCentroid, SoftmaxClassifier};
use serde::{Deserialize, Serialize};

/// On-disk JSON form of the bundled models, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelArtifact {
    Softmax(SoftmaxClassifier),
    NearestCentroid(NearestCentroid),
}

impl ModelArtifact {
    /// Shapes were already checked when the artifact was deserialized.
    pub fn into_classifier(self) -> Box<dyn Classifier> {
        match self {
            ModelArtifact::Softmax(m) => Box::new(m),
            ModelArtifact::NearestCentroid(m) => Box::new(m),
        }
    }
}

/// Deserialize a trusted model artifact from JSON bytes.
pub fn load_model(bytes: &[u8]) -> Result<Box<dyn Classifier>> {
    let artifact: ModelArtifact = serde_json::from_slice(bytes)
        .map_err(|e| AuditError::parse(format!("Failed to load model: {}", e)))?;
    Ok(artifact.into_classifier())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_softmax_with_probabilities() {
        let json = br#"{"type":"softmax","classes":["0","1"],"weights":[[1.0],[-1.0]],"intercepts":[0.0,0.0]}"#;
        let model = load_model(json).unwrap();
        assert!(model.probabilistic().is_some());
    }

    #[test]
    fn loads_centroid_without_probabilities() {
        let json = br#"{"type":"nearest_centroid","classes":["a"],"centroids":[[0.0,1.0]]}"#;
        let model = load_model(json).unwrap();
        assert!(model.probabilistic().is_none());
    }

    #[test]
    fn inconsistent_shapes_are_a_parse_error() {
        let json = br#"{"type":"softmax","classes":["0","1"],"weights":[[1.0]],"intercepts":[0.0]}"#;
        let err = load_model(json).err().unwrap();
        assert!(matches!(err, AuditError::Parse(msg) if msg.contains("Failed to load model")));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(
            load_model(b"\x80\x04pickle").err().unwrap(),
            AuditError::Parse(_)
        ));
    }
}
