//! Detailed text report for a prediction
//!
//! Layout: diagnosis header, confidence line, separator, overview and profile sections,
//! then an optional correctness note when the true label is known. Parts are separated
//! by blank lines.

use super::DiseaseKind;
use crate::utils::format_confidence;

const SEPARATOR_WIDTH: usize = 50;

/// Note comparing the prediction against the true label
pub fn correctness_note(predicted: &str, actual: &str) -> String {
    if predicted == actual {
        "✅ VALIDATION: Correct identification! The AI successfully detected this condition."
            .to_string()
    } else {
        format!(
            "❌ CORRECTION: AI predicted {}, but actual condition is {}. This helps improve the model's learning.",
            predicted, actual
        )
    }
}

/// Render the report for `predicted` at `confidence_percent`
///
/// Labels that match no known condition get the header and separator only.
pub fn render_report(predicted: &str, confidence_percent: f64, actual: Option<&str>) -> String {
    let mut parts = vec![
        format!("🌾 DIAGNOSIS: {}", predicted),
        format!(
            "🎯 CONFIDENCE LEVEL: {}% confident",
            format_confidence(confidence_percent)
        ),
        "=".repeat(SEPARATOR_WIDTH),
    ];

    if let Some(profile) = DiseaseKind::classify(predicted).profile() {
        parts.push(format!("📋 DISEASE OVERVIEW:\n{}", profile.overview));
        parts.extend(profile.sections().iter().map(|s| s.to_string()));
    }

    if let Some(actual) = actual {
        parts.push(correctness_note(predicted, actual));
    }

    parts.join("\n\n")
}
