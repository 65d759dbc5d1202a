// src/models.rs
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::services::response_parser::{
    lenient_count, lenient_flag, lenient_list, lenient_object, lenient_optional, lenient_score,
};

/// Declares a closed set of upper-case wire labels.
///
/// The `else Variant` form deserializes any unrecognised or non-string value
/// to that variant. Without it, an unknown label is a decode error, which the
/// list readers in `response_parser` use to drop the offending entry.
macro_rules! label_enum {
    (@base $(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            /// Case-insensitive lookup of a wire label.
            pub fn parse_label(label: &str) -> Option<Self> {
                let label = label.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|variant| variant.as_str().eq_ignore_ascii_case(label))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }
    };
    ($(#[$meta:meta])* pub enum $name:ident { $($variant:ident => $label:literal),+ $(,)? } else $fallback:ident) => {
        label_enum!(@base $(#[$meta])* $name { $($variant => $label),+ });

        impl Default for $name {
            fn default() -> Self {
                $name::$fallback
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = Value::deserialize(deserializer)?;
                Ok(value.as_str().and_then(Self::parse_label).unwrap_or_default())
            }
        }
    };
    ($(#[$meta:meta])* pub enum $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        label_enum!(@base $(#[$meta])* $name { $($variant => $label),+ });

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let label = String::deserialize(deserializer)?;
                Self::parse_label(&label).ok_or_else(|| {
                    de::Error::custom(format!(
                        "unknown {} label `{}`",
                        stringify!($name),
                        label
                    ))
                })
            }
        }
    };
}

label_enum! {
    /// Defect categories, in the fixed order restoration directives are emitted.
    pub enum DefectType {
        Scratches => "SCRATCHES",
        DustSpots => "DUST_SPOTS",
        FadedColors => "FADED_COLORS",
        NoiseGrain => "NOISE_GRAIN",
        TearsFolds => "TEARS_FOLDS",
        WaterDamage => "WATER_DAMAGE",
    }
}

impl DefectType {
    /// Applied when a restoration is requested without any defect selection.
    pub const DEFAULT_SELECTION: [DefectType; 4] = [
        DefectType::Scratches,
        DefectType::DustSpots,
        DefectType::FadedColors,
        DefectType::NoiseGrain,
    ];
}

label_enum! {
    pub enum Severity {
        Low => "LOW",
        Medium => "MEDIUM",
        High => "HIGH",
        Unknown => "UNKNOWN",
    } else Unknown
}

label_enum! {
    pub enum FixTime {
        Quick => "QUICK",
        Moderate => "MODERATE",
        Complex => "COMPLEX",
        Unknown => "UNKNOWN",
    } else Unknown
}

label_enum! {
    pub enum OverallCondition {
        Poor => "POOR",
        Fair => "FAIR",
        Good => "GOOD",
        Excellent => "EXCELLENT",
        Unknown => "UNKNOWN",
    } else Unknown
}

label_enum! {
    /// Shared scale for saturation and contrast.
    pub enum Level {
        Low => "LOW",
        Normal => "NORMAL",
        High => "HIGH",
        Unknown => "UNKNOWN",
    } else Unknown
}

label_enum! {
    pub enum WhiteBalance {
        Cool => "COOL",
        Neutral => "NEUTRAL",
        Warm => "WARM",
        Unknown => "UNKNOWN",
    } else Unknown
}

label_enum! {
    pub enum ColorCast {
        None => "NONE",
        Blue => "BLUE",
        Yellow => "YELLOW",
        Red => "RED",
        Green => "GREEN",
        Unknown => "UNKNOWN",
    } else Unknown
}

label_enum! {
    /// Tri-state answer reported by the model.
    pub enum YesNo {
        Yes => "YES",
        No => "NO",
        Unknown => "UNKNOWN",
    } else Unknown
}

label_enum! {
    pub enum AttributeArea {
        Hands => "hands",
        Nails => "nails",
        Clothing => "clothing",
        Face => "face",
        Hair => "hair",
        Background => "background",
        Other => "other",
    } else Other
}

label_enum! {
    pub enum OverallResult {
        Passed => "PASSED",
        Failed => "FAILED",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefectReport {
    #[serde(rename = "type")]
    pub defect_type: DefectType,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub estimated_fix_time: FixTime,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColorProfile {
    pub saturation_level: Level,
    pub contrast_level: Level,
    pub white_balance: WhiteBalance,
    pub color_cast: ColorCast,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonEntry {
    #[serde(deserialize_with = "lenient_count")]
    pub count: u32,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facial_features: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    #[serde(deserialize_with = "lenient_count")]
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackgroundElement {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    #[serde(deserialize_with = "lenient_list")]
    pub prominent_features: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Composition {
    pub framing: String,
    pub perspective: String,
    #[serde(deserialize_with = "lenient_list")]
    pub key_elements: Vec<String>,
}

/// Catalogue of what the original photo contains. Restoration and validation
/// both treat it as read-only ground truth.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElementInventory {
    #[serde(deserialize_with = "lenient_list")]
    pub people: Vec<PersonEntry>,
    #[serde(deserialize_with = "lenient_list")]
    pub objects: Vec<ObjectEntry>,
    #[serde(deserialize_with = "lenient_list")]
    pub background_elements: Vec<BackgroundElement>,
    #[serde(
        deserialize_with = "lenient_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub composition: Option<Composition>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisResult {
    #[serde(deserialize_with = "lenient_list")]
    pub defects: Vec<DefectReport>,
    pub overall_condition: OverallCondition,
    #[serde(deserialize_with = "lenient_list")]
    pub recommendations: Vec<String>,
    #[serde(
        deserialize_with = "lenient_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub color_analysis: Option<ColorProfile>,
    #[serde(
        deserialize_with = "lenient_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub element_inventory: Option<ElementInventory>,
}

impl AnalysisResult {
    pub fn defect_types(&self) -> BTreeSet<DefectType> {
        self.defects.iter().map(|d| d.defect_type).collect()
    }
}

/// Caller intent for the restore stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestorationRequest {
    pub defects_to_fix: BTreeSet<DefectType>,
    pub enhance_colors: bool,
    pub preserve_original: bool,
    pub analysis: Option<AnalysisResult>,
}

impl Default for RestorationRequest {
    fn default() -> Self {
        Self {
            defects_to_fix: BTreeSet::new(),
            enhance_colors: false,
            preserve_original: true,
            analysis: None,
        }
    }
}

impl RestorationRequest {
    /// Fix everything the analysis found, with color enhancement on.
    pub fn from_analysis(analysis: AnalysisResult) -> Self {
        Self {
            defects_to_fix: analysis.defect_types(),
            enhance_colors: true,
            preserve_original: true,
            analysis: Some(analysis),
        }
    }

    /// The selection the prompt is built from; an empty selection falls back
    /// to [`DefectType::DEFAULT_SELECTION`].
    pub fn effective_defects(&self) -> BTreeSet<DefectType> {
        if self.defects_to_fix.is_empty() {
            DefectType::DEFAULT_SELECTION.into_iter().collect()
        } else {
            self.defects_to_fix.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountComparison {
    #[serde(deserialize_with = "lenient_count")]
    pub original: u32,
    #[serde(deserialize_with = "lenient_count")]
    pub restored: u32,
    /// `None` when the model did not say; treated as a match.
    #[serde(
        rename = "match",
        deserialize_with = "lenient_flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub matches: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElementComparison {
    #[serde(deserialize_with = "lenient_object")]
    pub people_count: CountComparison,
    #[serde(deserialize_with = "lenient_object")]
    pub objects_count: CountComparison,
    #[serde(deserialize_with = "lenient_list")]
    pub added_elements: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub removed_elements: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub altered_elements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeChange {
    #[serde(default)]
    pub area: AttributeArea,
    #[serde(default)]
    pub change: String,
    #[serde(default)]
    pub severity: Severity,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationResult {
    pub has_added_elements: YesNo,
    pub has_removed_elements: YesNo,
    pub has_altered_faces: YesNo,
    pub has_changed_composition: YesNo,
    #[serde(deserialize_with = "lenient_score")]
    pub fidelity_score: u8,
    #[serde(deserialize_with = "lenient_object")]
    pub element_comparison: ElementComparison,
    #[serde(deserialize_with = "lenient_list")]
    pub fine_grained_attribute_changes: Vec<AttributeChange>,
    #[serde(deserialize_with = "lenient_list")]
    pub issues_found: Vec<String>,
    pub validation_passed: YesNo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub overall_result: OverallResult,
    pub confidence_score: u8,
    pub message: String,
}

impl Verdict {
    pub fn passed(&self) -> bool {
        self.overall_result == OverallResult::Passed
    }
}
