//! Garment configuration: the closed set of garment types, styling options,
//! per-type defaults and the built-in dress templates.
//!
//! Clients send a lenient [`GarmentConfigInput`] (the `dress_config` wire
//! object) where most fields may be omitted. [`GarmentConfigInput::resolve`]
//! fills the gaps from per-type defaults and clamps opacity, producing the
//! immutable [`GarmentConfig`] the renderer consumes.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/* --------------------------------------------------------------------------
Named constants
-------------------------------------------------------------------------- */

/// Lowest opacity a garment overlay may be rendered with.
pub const MIN_OPACITY: f32 = 0.1;

/// Highest opacity a garment overlay may be rendered with.
pub const MAX_OPACITY: f32 = 1.0;

/// Neckline used when the client does not ask for one.
pub const DEFAULT_NECKLINE: &str = "default";

/* --------------------------------------------------------------------------
Enums
-------------------------------------------------------------------------- */

/// Garment variants. Each variant has its own geometry strategy in
/// [`crate::render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GarmentType {
    #[default]
    EveningGown,
    WeddingDress,
    CocktailDress,
    FormalGown,
    CasualDress,
    PromDress,
}

impl GarmentType {
    pub const ALL: [GarmentType; 6] = [
        GarmentType::EveningGown,
        GarmentType::WeddingDress,
        GarmentType::CocktailDress,
        GarmentType::FormalGown,
        GarmentType::CasualDress,
        GarmentType::PromDress,
    ];

    /// Wire name, e.g. `"wedding_dress"`.
    pub fn as_str(self) -> &'static str {
        match self {
            GarmentType::EveningGown => "evening_gown",
            GarmentType::WeddingDress => "wedding_dress",
            GarmentType::CocktailDress => "cocktail_dress",
            GarmentType::FormalGown => "formal_gown",
            GarmentType::CasualDress => "casual_dress",
            GarmentType::PromDress => "prom_dress",
        }
    }

    /// Default `(bodice, skirt)` colours.
    pub fn default_palette(self) -> (Rgb, Rgb) {
        match self {
            GarmentType::EveningGown => (Rgb(255, 182, 193), Rgb(176, 196, 222)),
            GarmentType::WeddingDress => (Rgb(255, 255, 255), Rgb(250, 250, 250)),
            GarmentType::CocktailDress => (Rgb(0, 0, 0), Rgb(0, 0, 0)),
            GarmentType::FormalGown => (Rgb(128, 0, 128), Rgb(138, 43, 226)),
            GarmentType::CasualDress => (Rgb(135, 206, 235), Rgb(70, 130, 180)),
            GarmentType::PromDress => (Rgb(255, 105, 180), Rgb(219, 112, 147)),
        }
    }

    pub fn default_opacity(self) -> f32 {
        match self {
            GarmentType::WeddingDress => 0.8,
            GarmentType::CocktailDress => 0.75,
            _ => 0.7,
        }
    }

    pub fn default_hem(self) -> HemLength {
        match self {
            GarmentType::CocktailDress => HemLength::Mini,
            GarmentType::CasualDress => HemLength::Knee,
            GarmentType::PromDress => HemLength::Midi,
            _ => HemLength::Floor,
        }
    }

    pub fn default_neckline(self) -> &'static str {
        match self {
            GarmentType::WeddingDress => "sweetheart",
            _ => DEFAULT_NECKLINE,
        }
    }

    /// Whether a veil is drawn unless the client says otherwise.
    pub fn veil_by_default(self) -> bool {
        self == GarmentType::WeddingDress
    }
}

/// Skirt silhouette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GarmentStyle {
    ALine,
    BallGown,
    Mermaid,
    Sheath,
    FitAndFlare,
    EmpireWaist,
}

/// Where the skirt ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HemLength {
    Floor,
    Midi,
    Knee,
    Mini,
}

/// An sRGB colour. Serialized as a `[r, g, b]` array; components outside
/// `0..=255` are rejected at deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn to_array(self) -> [u8; 3] {
        [self.0, self.1, self.2]
    }
}

/* --------------------------------------------------------------------------
Resolved config
-------------------------------------------------------------------------- */

/// Fully resolved garment configuration for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GarmentConfig {
    #[serde(rename = "type")]
    pub garment_type: GarmentType,
    pub style: Option<GarmentStyle>,
    pub bodice_color: Rgb,
    pub skirt_color: Rgb,
    pub sleeve_color: Option<Rgb>,
    /// Always within `[MIN_OPACITY, MAX_OPACITY]`.
    pub opacity: f32,
    pub include_sleeves: bool,
    pub include_train: bool,
    pub include_veil: bool,
    pub neckline_style: String,
    pub hem_length: HemLength,
}

impl GarmentConfig {
    /// Defaults for `garment_type` with nothing overridden.
    pub fn for_type(garment_type: GarmentType) -> Self {
        GarmentConfigInput {
            garment_type: Some(garment_type),
            ..Default::default()
        }
        .resolve()
    }

    /// Parse and resolve a `dress_config` JSON value.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, CoreError> {
        let input: GarmentConfigInput = serde_json::from_value(value.clone())
            .map_err(|e| CoreError::Validation(format!("Invalid dress_config: {e}")))?;
        Ok(input.resolve())
    }

    /// Colour used for sleeves (falls back to the bodice colour).
    pub fn effective_sleeve_color(&self) -> Rgb {
        self.sleeve_color.unwrap_or(self.bodice_color)
    }
}

impl Default for GarmentConfig {
    fn default() -> Self {
        Self::for_type(GarmentType::default())
    }
}

/// Clamp an opacity into the renderable range. Non-finite values fall back to
/// `fallback`.
pub fn clamp_opacity(opacity: f32, fallback: f32) -> f32 {
    let value = if opacity.is_finite() { opacity } else { fallback };
    value.clamp(MIN_OPACITY, MAX_OPACITY)
}

/* --------------------------------------------------------------------------
Wire input
-------------------------------------------------------------------------- */

/// Client-supplied garment configuration. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GarmentConfigInput {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub garment_type: Option<GarmentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<GarmentStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bodice_color: Option<Rgb>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skirt_color: Option<Rgb>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleeve_color: Option<Rgb>,
    /// Single colour for one-piece dresses; fills both bodice and skirt unless
    /// those are given explicitly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dress_color: Option<Rgb>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_sleeves: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_train: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_veil: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neckline_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hem_length: Option<HemLength>,
}

impl GarmentConfigInput {
    /// Fill unset fields from the garment type's defaults.
    pub fn resolve(self) -> GarmentConfig {
        let garment_type = self.garment_type.unwrap_or_default();
        let (bodice, skirt) = garment_type.default_palette();
        let default_opacity = garment_type.default_opacity();

        GarmentConfig {
            garment_type,
            style: self.style,
            bodice_color: self.bodice_color.or(self.dress_color).unwrap_or(bodice),
            skirt_color: self.skirt_color.or(self.dress_color).unwrap_or(skirt),
            sleeve_color: self.sleeve_color,
            opacity: clamp_opacity(self.opacity.unwrap_or(default_opacity), default_opacity),
            include_sleeves: self.include_sleeves.unwrap_or(true),
            include_train: self.include_train.unwrap_or(false),
            include_veil: self
                .include_veil
                .unwrap_or_else(|| garment_type.veil_by_default()),
            neckline_style: self
                .neckline_style
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| garment_type.default_neckline().to_string()),
            hem_length: self
                .hem_length
                .unwrap_or_else(|| garment_type.default_hem()),
        }
    }

    /// Field-wise overlay: values set in `top` win over values in `self`.
    pub fn overlay(self, top: GarmentConfigInput) -> GarmentConfigInput {
        GarmentConfigInput {
            garment_type: top.garment_type.or(self.garment_type),
            style: top.style.or(self.style),
            bodice_color: top.bodice_color.or(self.bodice_color),
            skirt_color: top.skirt_color.or(self.skirt_color),
            sleeve_color: top.sleeve_color.or(self.sleeve_color),
            dress_color: top.dress_color.or(self.dress_color),
            opacity: top.opacity.or(self.opacity),
            include_sleeves: top.include_sleeves.or(self.include_sleeves),
            include_train: top.include_train.or(self.include_train),
            include_veil: top.include_veil.or(self.include_veil),
            neckline_style: top.neckline_style.or(self.neckline_style),
            hem_length: top.hem_length.or(self.hem_length),
        }
    }
}

/* --------------------------------------------------------------------------
Templates
-------------------------------------------------------------------------- */

/// A named starting point clients can pick and customise.
#[derive(Debug, Clone, Serialize)]
pub struct DressTemplate {
    pub id: &'static str,
    pub name: &'static str,
    #[serde(rename = "type")]
    pub garment_type: GarmentType,
    pub description: &'static str,
    pub config: GarmentConfigInput,
}

/// A template with client customisations applied.
#[derive(Debug, Clone, Serialize)]
pub struct CustomDress {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub garment_type: GarmentType,
    pub description: String,
    pub config: GarmentConfig,
}

/// The built-in dress templates.
pub fn dress_templates() -> Vec<DressTemplate> {
    vec![
        DressTemplate {
            id: "evening_gown_classic",
            name: "Classic Evening Gown",
            garment_type: GarmentType::EveningGown,
            description: "Elegant floor-length evening gown",
            config: GarmentConfigInput {
                garment_type: Some(GarmentType::EveningGown),
                bodice_color: Some(Rgb(75, 0, 130)),
                skirt_color: Some(Rgb(123, 104, 238)),
                opacity: Some(0.7),
                ..Default::default()
            },
        },
        DressTemplate {
            id: "wedding_dress_ball",
            name: "Ball Gown Wedding Dress",
            garment_type: GarmentType::WeddingDress,
            description: "Traditional white ball gown with veil",
            config: GarmentConfigInput {
                garment_type: Some(GarmentType::WeddingDress),
                style: Some(GarmentStyle::BallGown),
                include_veil: Some(true),
                opacity: Some(0.8),
                ..Default::default()
            },
        },
        DressTemplate {
            id: "cocktail_dress_black",
            name: "Little Black Dress",
            garment_type: GarmentType::CocktailDress,
            description: "Classic black cocktail dress",
            config: GarmentConfigInput {
                garment_type: Some(GarmentType::CocktailDress),
                dress_color: Some(Rgb(0, 0, 0)),
                include_sleeves: Some(false),
                opacity: Some(0.75),
                ..Default::default()
            },
        },
        DressTemplate {
            id: "formal_gown_purple",
            name: "Purple Formal Gown",
            garment_type: GarmentType::FormalGown,
            description: "Elegant purple formal gown with an empire waist",
            config: GarmentConfigInput {
                garment_type: Some(GarmentType::FormalGown),
                style: Some(GarmentStyle::EmpireWaist),
                bodice_color: Some(Rgb(128, 0, 128)),
                skirt_color: Some(Rgb(138, 43, 226)),
                opacity: Some(0.7),
                ..Default::default()
            },
        },
        DressTemplate {
            id: "casual_dress_sky",
            name: "Sky Day Dress",
            garment_type: GarmentType::CasualDress,
            description: "Knee-length A-line day dress",
            config: GarmentConfigInput {
                garment_type: Some(GarmentType::CasualDress),
                style: Some(GarmentStyle::ALine),
                ..Default::default()
            },
        },
        DressTemplate {
            id: "prom_dress_rose",
            name: "Rose Prom Dress",
            garment_type: GarmentType::PromDress,
            description: "Fit-and-flare midi prom dress",
            config: GarmentConfigInput {
                garment_type: Some(GarmentType::PromDress),
                style: Some(GarmentStyle::FitAndFlare),
                include_sleeves: Some(false),
                ..Default::default()
            },
        },
    ]
}

/// Apply `customizations` on top of the template `template_id`.
///
/// The garment type always comes from the template.
pub fn customize_dress(
    template_id: &str,
    customizations: GarmentConfigInput,
) -> Result<CustomDress, CoreError> {
    let template = dress_templates()
        .into_iter()
        .find(|t| t.id == template_id)
        .ok_or_else(|| CoreError::NotFound {
            entity: "DressTemplate",
            id: template_id.to_string(),
        })?;

    let mut merged = template.config.overlay(customizations);
    merged.garment_type = Some(template.garment_type);

    Ok(CustomDress {
        id: format!("{}_custom", template.id),
        name: format!("Custom {}", template.name),
        garment_type: template.garment_type,
        description: format!("Customized {}", template.description),
        config: merged.resolve(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn empty_input_resolves_to_evening_gown_defaults() {
        let config = GarmentConfigInput::default().resolve();
        assert_eq!(config.garment_type, GarmentType::EveningGown);
        assert_eq!(config.bodice_color, Rgb(255, 182, 193));
        assert_eq!(config.opacity, 0.7);
        assert!(config.include_sleeves);
        assert!(!config.include_veil);
        assert_eq!(config.hem_length, HemLength::Floor);
        assert_eq!(config.neckline_style, "default");
    }

    #[test]
    fn opacity_is_clamped_into_range() {
        let low = GarmentConfig::from_json(&json!({"opacity": 0.0})).unwrap();
        assert_eq!(low.opacity, MIN_OPACITY);

        let high = GarmentConfig::from_json(&json!({"opacity": 3.5})).unwrap();
        assert_eq!(high.opacity, MAX_OPACITY);

        assert_eq!(clamp_opacity(f32::NAN, 0.7), 0.7);
    }

    #[test]
    fn out_of_range_colour_is_rejected() {
        let result = GarmentConfig::from_json(&json!({"bodice_color": [300, 0, 0]}));
        assert_matches!(result, Err(CoreError::Validation(_)));

        let short = GarmentConfig::from_json(&json!({"skirt_color": [1, 2]}));
        assert_matches!(short, Err(CoreError::Validation(_)));
    }

    #[test]
    fn unknown_garment_type_is_rejected() {
        let result = GarmentConfig::from_json(&json!({"type": "spacesuit"}));
        assert_matches!(result, Err(CoreError::Validation(_)));
    }

    #[test]
    fn wedding_dress_defaults_to_veil_unless_disabled() {
        let with = GarmentConfig::from_json(&json!({"type": "wedding_dress"})).unwrap();
        assert!(with.include_veil);
        assert_eq!(with.neckline_style, "sweetheart");

        let without =
            GarmentConfig::from_json(&json!({"type": "wedding_dress", "include_veil": false}))
                .unwrap();
        assert!(!without.include_veil);
    }

    #[test]
    fn dress_color_fills_both_parts() {
        let config =
            GarmentConfig::from_json(&json!({"type": "cocktail_dress", "dress_color": [10, 20, 30]}))
                .unwrap();
        assert_eq!(config.bodice_color, Rgb(10, 20, 30));
        assert_eq!(config.skirt_color, Rgb(10, 20, 30));
        assert_eq!(config.hem_length, HemLength::Mini);
    }

    #[test]
    fn config_serializes_type_and_array_colours() {
        let value = serde_json::to_value(GarmentConfig::for_type(GarmentType::FormalGown)).unwrap();
        assert_eq!(value["type"], "formal_gown");
        assert_eq!(value["bodice_color"], json!([128, 0, 128]));
    }

    #[test]
    fn customize_overrides_template_fields() {
        let custom = customize_dress(
            "evening_gown_classic",
            GarmentConfigInput {
                skirt_color: Some(Rgb(1, 2, 3)),
                garment_type: Some(GarmentType::PromDress),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(custom.id, "evening_gown_classic_custom");
        assert_eq!(custom.config.garment_type, GarmentType::EveningGown);
        assert_eq!(custom.config.skirt_color, Rgb(1, 2, 3));
        assert_eq!(custom.config.bodice_color, Rgb(75, 0, 130));
    }

    #[test]
    fn customize_unknown_template_is_not_found() {
        let result = customize_dress("nope", GarmentConfigInput::default());
        assert_matches!(result, Err(CoreError::NotFound { .. }));
    }

    #[test]
    fn every_type_has_a_template() {
        let templates = dress_templates();
        for t in GarmentType::ALL {
            assert!(templates.iter().any(|tpl| tpl.garment_type == t), "{t:?}");
        }
    }
}
