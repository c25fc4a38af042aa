//! Skin-lesion classification domain types and the Classifier trait.
//!
//! The label set is closed: the deployed model scores exactly five
//! categories, in the order of [`DiseaseLabel::ALL`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ClassifierError;

/// Description used when a label has no curated text.
pub const FALLBACK_DESCRIPTION: &str =
    "Please consult a dermatologist for proper diagnosis and treatment.";

/// Disease categories the classifier can predict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiseaseLabel {
    #[serde(rename = "Acne")]
    Acne,
    #[serde(rename = "Actinic Keratosis")]
    ActinicKeratosis,
    #[serde(rename = "Basal Cell Carcinoma")]
    BasalCellCarcinoma,
    #[serde(rename = "Eczema")]
    Eczema,
    #[serde(rename = "Rosacea")]
    Rosacea,
}

impl DiseaseLabel {
    /// All labels, in the model's output order.
    pub const ALL: [DiseaseLabel; 5] = [
        Self::Acne,
        Self::ActinicKeratosis,
        Self::BasalCellCarcinoma,
        Self::Eczema,
        Self::Rosacea,
    ];

    /// Label at a model output index.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Acne => "Acne",
            Self::ActinicKeratosis => "Actinic Keratosis",
            Self::BasalCellCarcinoma => "Basal Cell Carcinoma",
            Self::Eczema => "Eczema",
            Self::Rosacea => "Rosacea",
        }
    }

    /// Curated patient-facing description of the condition.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Acne => {
                "Common inflammatory skin condition affecting hair follicles and oil glands. \
                 Treatment options include topical retinoids, benzoyl peroxide, and antibiotics."
            }
            Self::ActinicKeratosis => {
                "Precancerous skin condition caused by sun exposure. \
                 May require cryotherapy or topical treatments."
            }
            Self::BasalCellCarcinoma => {
                "Most common type of skin cancer. \
                 Usually appears as a pearly bump or sore that doesn't heal."
            }
            Self::Eczema => {
                "Chronic skin condition causing inflammation and irritation. \
                 Managed with moisturizers and anti-inflammatory medications."
            }
            Self::Rosacea => {
                "Chronic skin condition causing facial redness and visible blood vessels. \
                 Treated with topical medications and lifestyle changes."
            }
        }
    }
}

impl std::fmt::Display for DiseaseLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DiseaseLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|label| label.as_str().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| format!("unknown disease label '{s}'"))
    }
}

/// The outcome of classifying one image.
///
/// Serialized as `{"disease", "confidence", "description"}`, the same shape
/// callers send back on `/chat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawClassification")]
pub struct ClassificationResult {
    #[serde(rename = "disease")]
    label: DiseaseLabel,
    confidence: f64,
    description: String,
}

#[derive(Deserialize)]
struct RawClassification {
    disease: DiseaseLabel,
    confidence: f64,
    description: String,
}

impl TryFrom<RawClassification> for ClassificationResult {
    type Error = String;

    fn try_from(raw: RawClassification) -> Result<Self, Self::Error> {
        Self::new(raw.disease, raw.confidence, raw.description)
    }
}

impl ClassificationResult {
    /// Build a result, rejecting confidences outside `[0, 1]`.
    pub fn new(
        label: DiseaseLabel,
        confidence: f64,
        description: impl Into<String>,
    ) -> Result<Self, String> {
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(format!("confidence {confidence} is outside [0, 1]"));
        }
        Ok(Self {
            label,
            confidence,
            description: description.into(),
        })
    }

    /// Pick the top-scoring label from a model's probability vector.
    ///
    /// The vector must hold one finite probability per label.
    pub fn from_scores(scores: &[f64]) -> Result<Self, ClassifierError> {
        if scores.len() != DiseaseLabel::ALL.len() {
            return Err(ClassifierError::MalformedOutput(format!(
                "expected {} scores, got {}",
                DiseaseLabel::ALL.len(),
                scores.len()
            )));
        }
        if let Some(bad) = scores.iter().find(|s| !s.is_finite()) {
            return Err(ClassifierError::MalformedOutput(format!(
                "non-finite score {bad}"
            )));
        }

        // First maximum wins on ties, matching argmax.
        let (index, confidence) = scores
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::MIN), |best, (i, s)| if s > best.1 { (i, s) } else { best });

        let label = DiseaseLabel::from_index(index).ok_or_else(|| {
            ClassifierError::MalformedOutput(format!("no label at index {index}"))
        })?;

        Self::new(label, confidence, label.description())
            .map_err(ClassifierError::MalformedOutput)
    }

    pub fn label(&self) -> DiseaseLabel {
        self.label
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Confidence as a percentage with two decimals, e.g. `87.00%`.
    pub fn confidence_percent(&self) -> String {
        format!("{:.2}%", self.confidence * 100.0)
    }
}

/// The core Classifier trait.
///
/// Implementations own preprocessing (decode, resize, normalize) and inference.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// The backend name (e.g., "tf-serving").
    fn name(&self) -> &str;

    /// Classify raw image bytes.
    async fn classify(&self, image: &[u8]) -> Result<ClassificationResult, ClassifierError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_through_display_names() {
        for label in DiseaseLabel::ALL {
            assert_eq!(label.as_str().parse::<DiseaseLabel>().unwrap(), label);
        }
        assert_eq!(
            "basal cell carcinoma".parse::<DiseaseLabel>().unwrap(),
            DiseaseLabel::BasalCellCarcinoma
        );
        assert!("Melanoma".parse::<DiseaseLabel>().is_err());
    }

    #[test]
    fn from_scores_picks_argmax() {
        let result = ClassificationResult::from_scores(&[0.05, 0.02, 0.01, 0.87, 0.05]).unwrap();
        assert_eq!(result.label(), DiseaseLabel::Eczema);
        assert!((result.confidence() - 0.87).abs() < 1e-9);
        assert_eq!(result.description(), DiseaseLabel::Eczema.description());
    }

    #[test]
    fn from_scores_ties_go_to_first_label() {
        let result = ClassificationResult::from_scores(&[0.4, 0.4, 0.1, 0.05, 0.05]).unwrap();
        assert_eq!(result.label(), DiseaseLabel::Acne);
    }

    #[test]
    fn from_scores_rejects_wrong_arity_and_nan() {
        assert!(ClassificationResult::from_scores(&[0.5, 0.5]).is_err());
        assert!(ClassificationResult::from_scores(&[f64::NAN, 0.1, 0.1, 0.1, 0.1]).is_err());
    }

    #[test]
    fn from_scores_rejects_logits() {
        let err = ClassificationResult::from_scores(&[3.2, 0.1, -1.0, 0.4, 0.2]).unwrap_err();
        assert!(matches!(err, ClassifierError::MalformedOutput(_)));
    }

    #[test]
    fn confidence_percent_has_two_decimals() {
        let result = ClassificationResult::new(DiseaseLabel::Acne, 0.87, "x").unwrap();
        assert_eq!(result.confidence_percent(), "87.00%");
        let result = ClassificationResult::new(DiseaseLabel::Acne, 0.123456, "x").unwrap();
        assert_eq!(result.confidence_percent(), "12.35%");
    }

    #[test]
    fn serializes_with_disease_key() {
        let result =
            ClassificationResult::new(DiseaseLabel::Acne, 0.87, "Common inflammatory...").unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "disease": "Acne",
                "confidence": 0.87,
                "description": "Common inflammatory..."
            })
        );
    }

    #[test]
    fn deserialization_validates_confidence() {
        let ok: ClassificationResult = serde_json::from_str(
            r#"{"disease":"Rosacea","confidence":0.5,"description":"redness"}"#,
        )
        .unwrap();
        assert_eq!(ok.label(), DiseaseLabel::Rosacea);

        let bad = serde_json::from_str::<ClassificationResult>(
            r#"{"disease":"Rosacea","confidence":1.5,"description":"redness"}"#,
        );
        assert!(bad.is_err());

        let unknown = serde_json::from_str::<ClassificationResult>(
            r#"{"disease":"Psoriasis","confidence":0.5,"description":"scales"}"#,
        );
        assert!(unknown.is_err());
    }
}
