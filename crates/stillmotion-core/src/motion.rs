//! Motion classification.
//!
//! Maps a free-text motion description onto one dominant whole-frame effect
//! plus any number of region overlays, using case-insensitive matching
//! against fixed Ukrainian and English keyword tables.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{StillmotionError, StillmotionResult};

/// Every effect the synthesizer knows how to draw.
///
/// Declaration order is also the order region overlays are applied in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionCategory {
    CameraMove,
    Sway,
    Flow,
    Flicker,
    HairRegion,
    ClothRegion,
    WaterRegion,
    FireRegion,
    EyesRegion,
    SmokeRegion,
    DefaultPulse,
}

impl MotionCategory {
    /// Region categories are additive masked overlays, never dominant.
    pub fn is_region(&self) -> bool {
        matches!(
            self,
            MotionCategory::HairRegion
                | MotionCategory::ClothRegion
                | MotionCategory::WaterRegion
                | MotionCategory::FireRegion
                | MotionCategory::EyesRegion
                | MotionCategory::SmokeRegion
        )
    }
}

impl fmt::Display for MotionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MotionCategory::CameraMove => "camera_move",
            MotionCategory::Sway => "sway",
            MotionCategory::Flow => "flow",
            MotionCategory::Flicker => "flicker",
            MotionCategory::HairRegion => "hair_region",
            MotionCategory::ClothRegion => "cloth_region",
            MotionCategory::WaterRegion => "water_region",
            MotionCategory::FireRegion => "fire_region",
            MotionCategory::EyesRegion => "eyes_region",
            MotionCategory::SmokeRegion => "smoke_region",
            MotionCategory::DefaultPulse => "default_pulse",
        };
        write!(f, "{}", name)
    }
}

/// Result of classifying a description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionPlan {
    /// The single whole-frame effect.
    pub dominant: MotionCategory,
    /// All matching region overlays, in application order.
    pub regions: BTreeSet<MotionCategory>,
}

impl MotionPlan {
    pub fn new(dominant: MotionCategory) -> Self {
        Self {
            dominant,
            regions: BTreeSet::new(),
        }
    }

    pub fn with_region(mut self, region: MotionCategory) -> Self {
        if region.is_region() {
            self.regions.insert(region);
        }
        self
    }

    pub fn has_region(&self, region: MotionCategory) -> bool {
        self.regions.contains(&region)
    }
}

impl Default for MotionPlan {
    fn default() -> Self {
        Self::new(MotionCategory::DefaultPulse)
    }
}

/// Dominant categories in priority order. The first table with any hit wins.
///
/// Cyrillic stems match anywhere in the text. Latin keywords match whole
/// words; a trailing `*` lets them match as a word prefix instead.
const DOMINANT_KEYWORDS: &[(MotionCategory, &[&str])] = &[
    (
        MotionCategory::CameraMove,
        &[
            "камер", "рух", "наближ", "віддал", "вперед", "панорам", "зум", "camera*", "zoom*",
            "dolly", "push in", "panning", "panorama*", "forward*",
        ],
    ),
    (
        MotionCategory::Sway,
        &[
            "хита", "гойда", "колиш", "вітр", "вітер", "трепе", "оберт", "листя", "sway*",
            "swing*", "wind", "winds", "windy", "breeze*", "rotat*", "leaves",
        ],
    ),
    (
        MotionCategory::Flow,
        &[
            "вод", "хвил", "теч", "плив", "хмар", "річк", "струм", "літа", "water*", "wave*",
            "flow", "flows", "flowing", "ripple*", "stream*", "river*", "cloud*", "drift*",
            "float*",
        ],
    ),
    (
        MotionCategory::Flicker,
        &[
            "мерех", "вогон", "вогн", "полум", "світл", "відблиск", "блиск", "сяй", "свічк",
            "flicker*", "fire*", "flame*", "light", "lights", "lighting", "glow*", "sparkl*",
            "shimmer*", "candle*",
        ],
    ),
];

/// Region categories, each evaluated on its own.
const REGION_KEYWORDS: &[(MotionCategory, &[&str])] = &[
    (
        MotionCategory::HairRegion,
        &["волосс", "локон", "кучер", "hair*"],
    ),
    (
        MotionCategory::ClothRegion,
        &[
            "одяг", "сукн", "плащ", "шарф", "тканин", "сорочк", "cloth*", "dress*", "cape",
            "capes", "scarf*", "fabric*", "shirt*",
        ],
    ),
    (
        MotionCategory::WaterRegion,
        &[
            "вод", "озер", "море", "моря", "морськ", "річк", "water*", "lake*", "sea", "seas",
            "ocean*", "river*",
        ],
    ),
    (
        MotionCategory::FireRegion,
        &["вогон", "вогн", "полум", "багатт", "fire*", "flame*"],
    ),
    (
        MotionCategory::EyesRegion,
        &["очі", "очей", "погляд", "морга", "моргн", "кліпа", "eye*", "blink*", "wink*"],
    ),
    (
        MotionCategory::SmokeRegion,
        &[
            "дим", "туман", "серпан", "smok*", "fog*", "mist", "mists", "misty", "haze", "hazy",
            "steam*",
        ],
    ),
];

fn is_word_char(c: Option<char>) -> bool {
    c.is_some_and(char::is_alphanumeric)
}

fn keyword_matches(text: &str, keyword: &str) -> bool {
    if !keyword.is_ascii() {
        return text.contains(keyword);
    }
    let (stem, prefix) = match keyword.strip_suffix('*') {
        Some(stem) => (stem, true),
        None => (keyword, false),
    };
    text.match_indices(stem).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + stem.len()..].chars().next();
        !is_word_char(before) && (prefix || !is_word_char(after))
    })
}

fn matches_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| keyword_matches(haystack, k))
}

/// Classify a motion description.
///
/// Blank or whitespace-only descriptions are rejected with `InvalidInput`.
pub fn classify(description: &str) -> StillmotionResult<MotionPlan> {
    if description.trim().is_empty() {
        return Err(StillmotionError::invalid_input(
            "motion description must not be blank",
        ));
    }
    let text = description.to_lowercase();

    let dominant = DOMINANT_KEYWORDS
        .iter()
        .find(|(_, keywords)| matches_any(&text, keywords))
        .map(|(category, _)| *category)
        .unwrap_or(MotionCategory::DefaultPulse);

    let regions = REGION_KEYWORDS
        .iter()
        .filter(|(_, keywords)| matches_any(&text, keywords))
        .map(|(category, _)| *category)
        .collect();

    Ok(MotionPlan { dominant, regions })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_move_ukrainian() {
        let plan = classify("Камера повільно наближається").unwrap();
        assert_eq!(plan.dominant, MotionCategory::CameraMove);
        assert!(plan.regions.is_empty());
    }

    #[test]
    fn test_camera_move_english_case_insensitive() {
        let plan = classify("The CAMERA slowly zooms in").unwrap();
        assert_eq!(plan.dominant, MotionCategory::CameraMove);
    }

    #[test]
    fn test_camera_beats_sway() {
        let plan = classify("Камера наближається, дерева хитаються").unwrap();
        assert_eq!(plan.dominant, MotionCategory::CameraMove);
    }

    #[test]
    fn test_sway_beats_flow_and_flicker() {
        let plan = classify("Легке хитання на вітрі, хвилі і мерехтливе світло").unwrap();
        assert_eq!(plan.dominant, MotionCategory::Sway);
    }

    #[test]
    fn test_flow_with_water_region() {
        let plan = classify("М'які хвилі на воді").unwrap();
        assert_eq!(plan.dominant, MotionCategory::Flow);
        assert!(plan.has_region(MotionCategory::WaterRegion));
    }

    #[test]
    fn test_flicker_with_fire_region() {
        let plan = classify("Вогонь танцює в каміні").unwrap();
        assert_eq!(plan.dominant, MotionCategory::Flicker);
        assert_eq!(
            plan.regions.iter().copied().collect::<Vec<_>>(),
            vec![MotionCategory::FireRegion]
        );
    }

    #[test]
    fn test_default_pulse_when_nothing_matches() {
        let plan = classify("Дим піднімається вгору").unwrap();
        assert_eq!(plan.dominant, MotionCategory::DefaultPulse);
        assert!(plan.has_region(MotionCategory::SmokeRegion));

        let plan = classify("a quiet portrait").unwrap();
        assert_eq!(plan, MotionPlan::default());
    }

    #[test]
    fn test_all_matching_regions_returned() {
        let plan = classify("hair and dress move, eyes blink, smoke drifts").unwrap();
        let regions: Vec<_> = plan.regions.iter().copied().collect();
        assert_eq!(
            regions,
            vec![
                MotionCategory::HairRegion,
                MotionCategory::ClothRegion,
                MotionCategory::EyesRegion,
                MotionCategory::SmokeRegion,
            ]
        );
    }

    #[test]
    fn test_english_keywords_need_word_boundaries() {
        let plan = classify("a woman smiles slightly").unwrap();
        assert_eq!(plan, MotionPlan::default());

        let plan = classify("a man sits on a chair").unwrap();
        assert!(!plan.has_region(MotionCategory::HairRegion));

        let plan = classify("in this season").unwrap();
        assert!(!plan.has_region(MotionCategory::WaterRegion));

        let plan = classify("flowers by the window, a landscape").unwrap();
        assert_eq!(plan, MotionPlan::default());
    }

    #[test]
    fn test_english_stems_match_inflections() {
        let plan = classify("Lights flickering, hair blowing by the sea").unwrap();
        assert_eq!(plan.dominant, MotionCategory::Flicker);
        assert!(plan.has_region(MotionCategory::HairRegion));
        assert!(plan.has_region(MotionCategory::WaterRegion));

        let plan = classify("slow push in, smoky room").unwrap();
        assert_eq!(plan.dominant, MotionCategory::CameraMove);
        assert!(plan.has_region(MotionCategory::SmokeRegion));
    }

    #[test]
    fn test_blank_description_rejected() {
        assert!(matches!(
            classify(""),
            Err(StillmotionError::InvalidInput(_))
        ));
        assert!(matches!(
            classify("   \n\t"),
            Err(StillmotionError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_classify_is_deterministic() {
        let text = "Волосся розвівається на вітрі";
        assert_eq!(classify(text).unwrap(), classify(text).unwrap());
    }

    #[test]
    fn test_with_region_ignores_dominant_categories() {
        let plan = MotionPlan::new(MotionCategory::Flow).with_region(MotionCategory::Sway);
        assert!(plan.regions.is_empty());
    }

    #[test]
    fn test_plan_serializes_snake_case() {
        let plan = MotionPlan::new(MotionCategory::CameraMove).with_region(MotionCategory::EyesRegion);
        let json = serde_json::to_string(&plan).unwrap();
        assert_eq!(json, r#"{"dominant":"camera_move","regions":["eyes_region"]}"#);
    }
}
