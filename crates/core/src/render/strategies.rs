//! Per-garment geometry.
//!
//! Each [`GarmentType`] maps to a [`Silhouette`] (flare, waistline, which
//! extras it allows); every type shares the part builders below. All offsets
//! are multiples of shoulder width or torso length so the garment scales with
//! the person.

use serde::Serialize;

use super::anchors::{distance, Anchors, Point, Side};
use crate::garment::{GarmentConfig, GarmentStyle, GarmentType, HemLength, Rgb};

/* --------------------------------------------------------------------------
Named constants
-------------------------------------------------------------------------- */

/// How far past the shoulder joint the bodice extends, × shoulder width.
const SHOULDER_OVERHANG: f32 = 0.1;

/// Neck opening half-width, × shoulder width.
const NECK_HALF_WIDTH: f32 = 0.2;

/// Sleeve half-thickness at the shoulder, × shoulder width.
const SLEEVE_HALF_WIDTH: f32 = 0.15;

/// Fallback knee and ankle depths below the hips, × torso length.
const KNEE_DEPTH: f32 = 1.0;
const ANKLE_DEPTH: f32 = 2.0;

/// Mini hem depth below the hips, × torso length.
const MINI_DEPTH: f32 = 0.4;

const VEIL_COLOR: Rgb = Rgb(248, 248, 255);

/* --------------------------------------------------------------------------
Parts
-------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PartKind {
    Train,
    Skirt,
    Bodice,
    Sleeve,
    Veil,
}

/// One closed polygon of the overlay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GarmentPart {
    pub kind: PartKind,
    pub polygon: Vec<Point>,
    pub color: Rgb,
}

/// Shape parameters that distinguish one garment type from another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Silhouette {
    /// Hem half-width, × shoulder width.
    pub flare: f32,
    /// Waistline position between shoulders (0) and hips (1).
    pub waist: f32,
    pub allows_train: bool,
    pub allows_veil: bool,
}

impl Silhouette {
    fn new(flare: f32, waist: f32, allows_train: bool, allows_veil: bool) -> Self {
        Self { flare, waist, allows_train, allows_veil }
    }
}

/// Base silhouette of each garment type, before any style override.
pub fn silhouette_for(garment_type: GarmentType) -> Silhouette {
    match garment_type {
        GarmentType::EveningGown => Silhouette::new(1.25, 0.65, true, false),
        GarmentType::WeddingDress => Silhouette::new(1.5, 0.65, true, true),
        GarmentType::CocktailDress => Silhouette::new(0.7, 0.7, false, false),
        GarmentType::FormalGown => Silhouette::new(1.0, 0.35, true, false),
        GarmentType::CasualDress => Silhouette::new(0.8, 0.65, false, false),
        GarmentType::PromDress => Silhouette::new(1.1, 0.6, false, false),
    }
}

/// Build every part `config` asks for that the anchors can support.
pub fn build_parts(a: &Anchors, config: &GarmentConfig) -> Vec<GarmentPart> {
    build(a, config, silhouette_for(config.garment_type))
}

/* --------------------------------------------------------------------------
Builders
-------------------------------------------------------------------------- */

fn build(a: &Anchors, c: &GarmentConfig, base: Silhouette) -> Vec<GarmentPart> {
    let shape = apply_style(base, c.style);
    let waist_y = a.shoulder_y() + a.torso_length() * shape.waist;
    let waist_half = waist_half_width(a, shape.waist);
    let hem_y = hem_y(a, c.hem_length);
    let hem_half = a.shoulder_width() * shape.flare;

    let mut parts = Vec::with_capacity(6);

    if c.include_train && shape.allows_train {
        parts.push(train(a, c, hem_y, hem_half));
    }
    parts.push(skirt(a, c, waist_y, waist_half, hem_y, hem_half));
    parts.push(bodice(a, c, waist_y, waist_half));
    if c.include_sleeves {
        parts.extend([Side::Left, Side::Right].into_iter().filter_map(|s| sleeve(a, c, s)));
    }
    if c.include_veil && shape.allows_veil {
        parts.extend(veil(a));
    }

    parts
}

fn apply_style(base: Silhouette, style: Option<GarmentStyle>) -> Silhouette {
    let Some(style) = style else {
        return base;
    };
    let (flare, waist) = match style {
        GarmentStyle::ALine => (1.0, base.waist),
        GarmentStyle::BallGown => (1.5, base.waist),
        GarmentStyle::Mermaid => (0.6, base.waist),
        GarmentStyle::Sheath => (0.55, base.waist),
        GarmentStyle::FitAndFlare => (0.9, base.waist),
        GarmentStyle::EmpireWaist => (0.8, 0.35),
    };
    Silhouette { flare, waist, ..base }
}

fn waist_half_width(a: &Anchors, waist: f32) -> f32 {
    let s = a.shoulder_half_width();
    let h = a.hip_half_width();
    (s + (h - s) * waist) * 0.9
}

fn hem_y(a: &Anchors, hem: HemLength) -> f32 {
    let tl = a.torso_length();
    let hip_y = a.hip_y();
    let knee_y = a.knee_y().unwrap_or(hip_y + tl * KNEE_DEPTH);
    let ankle_y = a.ankle_y().unwrap_or(hip_y + tl * ANKLE_DEPTH);
    match hem {
        HemLength::Floor => ankle_y + tl * 0.05,
        HemLength::Midi => (knee_y + ankle_y) / 2.0,
        HemLength::Knee => knee_y,
        HemLength::Mini => hip_y + tl * MINI_DEPTH,
    }
}

/// Neckline depth below the shoulder line, × torso length.
fn neckline_drop(style: &str) -> f32 {
    match style {
        "sweetheart" => 0.25,
        "v_neck" => 0.35,
        "scoop" => 0.2,
        "boat" | "off_shoulder" => 0.02,
        _ => 0.05,
    }
}

fn bodice(a: &Anchors, c: &GarmentConfig, waist_y: f32, waist_half: f32) -> GarmentPart {
    let sw = a.shoulder_width();
    let cx = a.center_x();
    let drop = neckline_drop(&c.neckline_style) * a.torso_length();

    let shoulder_outer = |side: Side| {
        let p = a.shoulder(side);
        Point::new(p.x + a.outward(side) * sw * SHOULDER_OVERHANG, p.y)
    };
    let neck = |side: Side| Point::new(cx + a.outward(side) * sw * NECK_HALF_WIDTH, a.shoulder(side).y);
    let waist = |side: Side| Point::new(cx + a.outward(side) * waist_half, waist_y);

    GarmentPart {
        kind: PartKind::Bodice,
        polygon: vec![
            shoulder_outer(Side::Left),
            neck(Side::Left),
            Point::new(cx, a.shoulder_y() + drop),
            neck(Side::Right),
            shoulder_outer(Side::Right),
            waist(Side::Right),
            waist(Side::Left),
        ],
        color: c.bodice_color,
    }
}

fn skirt(
    a: &Anchors,
    c: &GarmentConfig,
    waist_y: f32,
    waist_half: f32,
    hem_y: f32,
    hem_half: f32,
) -> GarmentPart {
    let sw = a.shoulder_width();
    let cx = a.center_x();
    let hip_half = a.hip_half_width() + sw * 0.1;
    let hip_y = a.hip_y().max(waist_y);
    let at = |side: Side, half: f32, y: f32| Point::new(cx + a.outward(side) * half, y);

    GarmentPart {
        kind: PartKind::Skirt,
        polygon: vec![
            at(Side::Left, waist_half, waist_y),
            at(Side::Right, waist_half, waist_y),
            at(Side::Right, hip_half, hip_y),
            at(Side::Right, hem_half, hem_y),
            at(Side::Left, hem_half, hem_y),
            at(Side::Left, hip_half, hip_y),
        ],
        color: c.skirt_color,
    }
}

fn sleeve(a: &Anchors, c: &GarmentConfig, side: Side) -> Option<GarmentPart> {
    let shoulder = a.shoulder(side);
    let elbow = a.elbow(side)?;
    let length = distance(shoulder, elbow);
    if length < 1.0 {
        return None;
    }

    let half = a.shoulder_width() * SLEEVE_HALF_WIDTH;
    let (nx, ny) = ((shoulder.y - elbow.y) / length, (elbow.x - shoulder.x) / length);
    let offset = |p: Point, w: f32| Point::new(p.x + nx * w, p.y + ny * w);

    Some(GarmentPart {
        kind: PartKind::Sleeve,
        polygon: vec![
            offset(shoulder, half),
            offset(elbow, half * 0.8),
            offset(elbow, -half * 0.8),
            offset(shoulder, -half),
        ],
        color: c.effective_sleeve_color(),
    })
}

fn veil(a: &Anchors) -> Option<GarmentPart> {
    let nose = a.nose?;
    let sw = a.shoulder_width();
    let cx = a.center_x();
    let head = (a.shoulder_y() - nose.y).abs().max(1.0);
    let top = nose.y - head * 0.6;
    let bottom = a.shoulder_y() + a.torso_length() * 0.5;

    Some(GarmentPart {
        kind: PartKind::Veil,
        polygon: vec![
            Point::new(cx - sw * 0.3, top),
            Point::new(cx + sw * 0.3, top),
            Point::new(cx + sw * 0.9, bottom),
            Point::new(cx - sw * 0.9, bottom),
        ],
        color: VEIL_COLOR,
    })
}

fn train(a: &Anchors, c: &GarmentConfig, hem_y: f32, hem_half: f32) -> GarmentPart {
    let cx = a.center_x();
    let tl = a.torso_length();
    GarmentPart {
        kind: PartKind::Train,
        polygon: vec![
            Point::new(cx - hem_half * 0.8, hem_y - tl * 0.1),
            Point::new(cx + hem_half * 0.8, hem_y - tl * 0.1),
            Point::new(cx + hem_half * 1.3, hem_y + tl * 0.4),
            Point::new(cx - hem_half * 1.3, hem_y + tl * 0.4),
        ],
        color: c.skirt_color,
    }
}
