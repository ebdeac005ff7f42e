//! Explanations for predictions
//!
//! This module provides:
//! - `DiseaseKind`: maps free-form label strings onto the known rice conditions
//! - A curated profile for every known condition (`rules`)
//! - The detailed text report with an optional correctness note (`report`)
//! - One-sentence explanations from an external text-generation service (`generative`)

pub mod generative;
pub mod report;
pub mod rules;

use serde::{Deserialize, Serialize};

pub use generative::{AiExplanation, ExplanationGenerator, GeminiClient, GeminiConfig, TextGenerator};
pub use report::render_report;
pub use rules::{DiseaseProfile, Guidance};

/// Known rice leaf conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiseaseKind {
    BacterialBlight,
    Blast,
    BrownSpot,
    Healthy,
    Tungro,
    Unknown,
}

impl DiseaseKind {
    /// Classify a label by case-insensitive substring
    ///
    /// Keywords are checked in the order `blight`, `blast`, `brown`, `healthy`, `tungro`;
    /// the first match wins.
    pub fn classify(label: &str) -> Self {
        let label = label.to_lowercase();
        if label.contains("blight") {
            Self::BacterialBlight
        } else if label.contains("blast") {
            Self::Blast
        } else if label.contains("brown") {
            Self::BrownSpot
        } else if label.contains("healthy") {
            Self::Healthy
        } else if label.contains("tungro") {
            Self::Tungro
        } else {
            Self::Unknown
        }
    }

    /// Human-readable name of the condition
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::BacterialBlight => "Bacterial leaf blight",
            Self::Blast => "Blast",
            Self::BrownSpot => "Brown spot",
            Self::Healthy => "Healthy",
            Self::Tungro => "Tungro",
            Self::Unknown => "Unknown",
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// Curated profile, `None` for `Unknown`
    pub fn profile(&self) -> Option<&'static DiseaseProfile> {
        rules::profile(*self)
    }
}

impl std::fmt::Display for DiseaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serving_labels() {
        assert_eq!(DiseaseKind::classify("Bacterialblight"), DiseaseKind::BacterialBlight);
        assert_eq!(DiseaseKind::classify("Blast"), DiseaseKind::Blast);
        assert_eq!(DiseaseKind::classify("Brownspot"), DiseaseKind::BrownSpot);
        assert_eq!(DiseaseKind::classify("Healthy"), DiseaseKind::Healthy);
        assert_eq!(DiseaseKind::classify("Tungro"), DiseaseKind::Tungro);
    }

    #[test]
    fn test_any_blight_label_is_bacterial_blight() {
        for label in ["Bacterial leaf blight", "BLIGHT", "leaf_Blight_stage2", "blight"] {
            assert_eq!(DiseaseKind::classify(label), DiseaseKind::BacterialBlight);
        }
    }

    #[test]
    fn test_keyword_order() {
        // "blight" is checked before "blast"
        assert_eq!(DiseaseKind::classify("blast-like blight"), DiseaseKind::BacterialBlight);
        assert_eq!(DiseaseKind::classify("Brown healthy"), DiseaseKind::BrownSpot);
    }

    #[test]
    fn test_unknown() {
        assert_eq!(DiseaseKind::classify("Leaf smut"), DiseaseKind::Unknown);
        assert!(DiseaseKind::Unknown.profile().is_none());
        assert!(DiseaseKind::Healthy.is_healthy());
    }
}
