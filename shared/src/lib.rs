use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, EnumIter, EnumString, IntoStaticStr};

/// Classes the fecal-image classifier distinguishes, in model output order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
pub enum DiseaseLabel {
    #[strum(serialize = "cocci")]
    Cocci,
    #[strum(serialize = "healthy")]
    Healthy,
    #[strum(serialize = "NCD")]
    Ncd,
    #[strum(serialize = "salmo")]
    Salmo,
}

impl DiseaseLabel {
    pub const COUNT: usize = 4;

    pub fn from_index(index: usize) -> Option<Self> {
        Self::iter().nth(index)
    }

    /// Short class name the model was trained with.
    pub fn abbreviation(&self) -> &'static str {
        (*self).into()
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DiseaseLabel::Cocci => "Coccidiosis",
            DiseaseLabel::Healthy => "Healthy",
            DiseaseLabel::Ncd => "Newcastle Disease",
            DiseaseLabel::Salmo => "Salmonella",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PredictionResponse {
    pub prediction: String,
    pub confidence: f64,
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    pub success: bool,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            success: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StatusResponse {
    pub status: String,
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AckResponse {
    pub success: bool,
}
