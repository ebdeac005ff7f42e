//! Curated descriptions of the known rice leaf conditions

use serde::Serialize;

use super::DiseaseKind;

/// Closing guidance of a profile
///
/// Diseases carry impact and management advice; a healthy leaf carries why health
/// matters and how to keep it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Guidance {
    Disease {
        severity: &'static str,
        management: &'static str,
    },
    Healthy {
        importance: &'static str,
        maintenance: &'static str,
    },
}

/// Static description of one condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiseaseProfile {
    pub overview: &'static str,
    pub target_areas: &'static str,
    pub visual_symptoms: &'static str,
    pub why_detected: &'static str,
    pub guidance: Guidance,
}

impl DiseaseProfile {
    /// Sections in report order, overview excluded
    pub fn sections(&self) -> [&'static str; 5] {
        let (first, second) = match self.guidance {
            Guidance::Disease {
                severity,
                management,
            } => (severity, management),
            Guidance::Healthy {
                importance,
                maintenance,
            } => (importance, maintenance),
        };
        [
            self.target_areas,
            self.visual_symptoms,
            self.why_detected,
            first,
            second,
        ]
    }
}

const BACTERIAL_BLIGHT: DiseaseProfile = DiseaseProfile {
    overview: "Bacterial leaf blight is caused by the bacterium Xanthomonas oryzae. It's one of the most serious bacterial diseases affecting rice worldwide.",
    target_areas: "🎯 Target Areas: Leaf edges and tips, leaf sheaths, and sometimes entire leaves. The bacteria enter through water pores and wounds.",
    visual_symptoms: "👀 What to Look For: Yellow to brown lesions along leaf margins, water-soaked appearance, 'kresek' symptom (wilting of entire tillers), and bacterial ooze in morning dew.",
    why_detected: "🤖 Why I Think This: I detected characteristic leaf margin yellowing and lesions with a wavy pattern typical of bacterial infection.",
    guidance: Guidance::Disease {
        severity: "⚠️ Impact: Can cause 20-40% yield loss in severe cases. Most damaging during wet, warm weather conditions.",
        management: "💡 Management: Use resistant varieties, avoid over-fertilization with nitrogen, ensure proper field drainage, and apply copper-based bactericides if needed.",
    },
};

const BLAST: DiseaseProfile = DiseaseProfile {
    overview: "Rice Blast is a destructive fungal disease caused by Magnaporthe oryzae. It can infect all above-ground parts of the rice plant.",
    target_areas: "🎯 Target Areas: Leaves (Leaf Blast), stem nodes (Node Blast), and the neck of the panicle (Neck Blast), which is the most damaging.",
    visual_symptoms: "👀 What to Look For: Diamond-shaped or spindle-shaped lesions on leaves with gray or white centers and brown or reddish borders. Infected necks turn brown to black and can break.",
    why_detected: "🤖 Why I Think This: I identified the distinct diamond-shaped lesions with grayish centers and dark borders, a classic symptom of Rice Blast.",
    guidance: Guidance::Disease {
        severity: "⚠️ Impact: Extremely high. Neck blast can cause complete crop loss (100% yield loss) by preventing grain formation. It is a major threat to rice production globally.",
        management: "💡 Management: Use resistant varieties, apply appropriate fungicides preventively, manage water and nitrogen levels carefully, and remove infected crop debris.",
    },
};

const BROWN_SPOT: DiseaseProfile = DiseaseProfile {
    overview: "Brown spot is a fungal disease caused by Bipolaris oryzae. It's often an indicator of nutrient-deficient soil.",
    target_areas: "🎯 Target Areas: Leaves, leaf sheaths, panicles, and grains. Affects plants at all growth stages.",
    visual_symptoms: "👀 What to Look For: Small, circular to oval brown spots with gray or white centers. Spots may have yellow halos and can merge into large blotches.",
    why_detected: "🤖 Why I Think This: I identified multiple small, round brown spots with lighter centers, scattered across the leaf surface in a pattern typical of this fungal issue.",
    guidance: Guidance::Disease {
        severity: "⚠️ Impact: Reduces photosynthesis and grain quality. Can cause significant yield loss (10-45%) if not managed, especially in poor soil conditions.",
        management: "💡 Management: Improve soil fertility (especially potassium), ensure balanced nutrition, use resistant varieties, and apply fungicides during favorable conditions.",
    },
};

const HEALTHY: DiseaseProfile = DiseaseProfile {
    overview: "This rice plant shows no signs of disease! Healthy rice has vibrant green leaves, strong stems, and good overall vigor.",
    target_areas: "🎯 What I See: Uniform green coloration, no lesions or spots, strong upright growth, and healthy leaf structure throughout the plant.",
    visual_symptoms: "👀 Signs of Health: Bright green leaves without discoloration, clean leaf surfaces, strong stems, and active growth patterns.",
    why_detected: "🤖 Why I Think This: My analysis shows a uniform green color, the absence of spots or lesions, and a healthy leaf texture, indicating no signs of stress or disease.",
    guidance: Guidance::Healthy {
        importance: "🌟 Why This Matters: Healthy plants achieve maximum yield potential, have better grain quality, and are more resistant to environmental stresses.",
        maintenance: "💡 Keep It Healthy: Maintain proper nutrition, ensure adequate water management, monitor for early disease signs, and follow integrated pest management practices.",
    },
};

const TUNGRO: DiseaseProfile = DiseaseProfile {
    overview: "Tungro is a viral disease complex transmitted by green leafhoppers. It involves two different viruses working together.",
    target_areas: "🎯 Target Areas: Affects the entire plant systemically. The virus spreads through the plant's vascular system, stunting its growth.",
    visual_symptoms: "👀 What to Look For: Yellow-orange discoloration of leaves (starting from the tip), stunted growth, reduced number of tillers, and empty or partially filled grains.",
    why_detected: "🤖 Why I Think This: I identified the significant yellow-orange leaf discoloration and stunted plant appearance characteristic of a systemic viral infection like Tungro.",
    guidance: Guidance::Disease {
        severity: "⚠️ Impact: Can cause 10-100% yield loss depending on how early the infection occurs. Younger plants are much more susceptible to severe damage.",
        management: "💡 Management: Control the leafhopper vector with insecticides, use resistant varieties, remove and destroy infected plants early, and avoid planting near infected fields.",
    },
};

/// Profile for a condition, `None` for `Unknown`
pub fn profile(kind: DiseaseKind) -> Option<&'static DiseaseProfile> {
    match kind {
        DiseaseKind::BacterialBlight => Some(&BACTERIAL_BLIGHT),
        DiseaseKind::Blast => Some(&BLAST),
        DiseaseKind::BrownSpot => Some(&BROWN_SPOT),
        DiseaseKind::Healthy => Some(&HEALTHY),
        DiseaseKind::Tungro => Some(&TUNGRO),
        DiseaseKind::Unknown => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_healthy_has_healthy_guidance() {
        for kind in [
            DiseaseKind::BacterialBlight,
            DiseaseKind::Blast,
            DiseaseKind::BrownSpot,
            DiseaseKind::Tungro,
        ] {
            assert!(matches!(
                profile(kind).unwrap().guidance,
                Guidance::Disease { .. }
            ));
        }
        assert!(matches!(
            profile(DiseaseKind::Healthy).unwrap().guidance,
            Guidance::Healthy { .. }
        ));
    }

    #[test]
    fn test_sections_order() {
        let sections = profile(DiseaseKind::Blast).unwrap().sections();
        assert!(sections[0].starts_with("🎯"));
        assert!(sections[3].starts_with("⚠️ Impact"));
        assert!(sections[4].starts_with("💡 Management"));
    }
}
