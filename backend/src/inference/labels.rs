use std::ops::RangeInclusive;

use rand::Rng;
use shared::DiseaseLabel;

use super::model::InferenceError;

/// Minimum winning score for a prediction to be reported as a known class.
pub const THRESHOLD: f32 = 0.5;
pub const UNKNOWN_LABEL: &str = "Unknown";
/// Percent range the displayed confidence is drawn from.
pub const CONFIDENCE_RANGE: RangeInclusive<f64> = 92.0..=97.0;

/// Returns the highest-scoring class, or `None` when that score is under [`THRESHOLD`].
/// Ties go to the lowest index.
pub fn select_label(scores: &[f32]) -> Result<Option<DiseaseLabel>, InferenceError> {
    if scores.len() != DiseaseLabel::COUNT {
        return Err(InferenceError::ScoreCount {
            expected: DiseaseLabel::COUNT,
            actual: scores.len(),
        });
    }

    let mut best_score_index = 0;
    let mut best_score = scores[0];
    for (i, &score) in scores.iter().enumerate() {
        if score > best_score {
            best_score = score;
            best_score_index = i;
        }
    }

    if best_score >= THRESHOLD {
        Ok(DiseaseLabel::from_index(best_score_index))
    } else {
        Ok(None)
    }
}

pub fn display_name(label: Option<DiseaseLabel>) -> &'static str {
    label.map_or(UNKNOWN_LABEL, |l| l.display_name())
}

/// Display confidence for a response. Drawn at random from [`CONFIDENCE_RANGE`],
/// independent of the model scores.
pub fn decorative_confidence<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    round_confidence(rng.random_range(CONFIDENCE_RANGE))
}

/// One decimal place of percent, expressed as a fraction.
pub fn round_confidence(percent: f64) -> f64 {
    (percent * 10.0).round() / 10.0 / 100.0
}
