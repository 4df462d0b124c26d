//! 2-D garment overlay: polygon planning and alpha compositing.

mod anchors;
mod strategies;

pub use anchors::{Anchors, Point, Side};
pub use strategies::{build_parts, silhouette_for, GarmentPart, PartKind, Silhouette};

use image::{Rgb as Pixel, RgbImage};
use imageproc::drawing::draw_polygon_mut;

use crate::garment::GarmentConfig;
use crate::pose::PoseResult;

/// Default confidence a keypoint needs to anchor garment geometry.
pub const DEFAULT_ANCHOR_CONFIDENCE: f32 = 0.5;

/// Polygon vertices are clamped to this many frame sizes around the frame.
const COORD_LIMIT_FACTOR: f32 = 4.0;

#[derive(Debug, Clone)]
pub struct GarmentRenderer {
    min_confidence: f32,
}

impl Default for GarmentRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_ANCHOR_CONFIDENCE)
    }
}

impl GarmentRenderer {
    pub fn new(min_confidence: f32) -> Self {
        Self { min_confidence }
    }

    /// Polygons for `config` on `pose`, in draw order.
    ///
    /// Empty when the shoulders or hips are not usable.
    pub fn plan(&self, pose: &PoseResult, config: &GarmentConfig) -> Vec<GarmentPart> {
        match Anchors::from_pose(pose, self.min_confidence) {
            Some(anchors) => build_parts(&anchors, config),
            None => Vec::new(),
        }
    }

    /// Draw the garment onto a copy of `frame`.
    pub fn render(&self, frame: &RgbImage, pose: &PoseResult, config: &GarmentConfig) -> RgbImage {
        let parts = self.plan(pose, config);
        if parts.is_empty() {
            return frame.clone();
        }

        let mut overlay = frame.clone();
        for part in &parts {
            fill_polygon(&mut overlay, &part.polygon, Pixel(part.color.to_array()));
        }
        blend(frame, &overlay, config.opacity)
    }
}

fn fill_polygon(canvas: &mut RgbImage, polygon: &[Point], color: Pixel<u8>) {
    let limit_x = canvas.width().max(1) as f32 * COORD_LIMIT_FACTOR;
    let limit_y = canvas.height().max(1) as f32 * COORD_LIMIT_FACTOR;

    if polygon.iter().any(|p| !(p.x.is_finite() && p.y.is_finite())) {
        return;
    }

    let mut points: Vec<imageproc::point::Point<i32>> = Vec::with_capacity(polygon.len());
    for p in polygon {
        let q = imageproc::point::Point::new(
            p.x.clamp(-limit_x, limit_x).round() as i32,
            p.y.clamp(-limit_y, limit_y).round() as i32,
        );
        if points.last() != Some(&q) {
            points.push(q);
        }
    }
    // draw_polygon_mut rejects explicitly closed polygons.
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    if points.len() < 3 {
        return;
    }

    draw_polygon_mut(canvas, &points, color);
}

/// `frame·(1−α) + overlay·α`, per channel, for pixels where the overlay
/// differs from the frame.
pub fn blend(frame: &RgbImage, overlay: &RgbImage, opacity: f32) -> RgbImage {
    let alpha = opacity.clamp(0.0, 1.0);
    let mut out = frame.clone();
    for (dst, src) in out.pixels_mut().zip(overlay.pixels()) {
        if dst == src {
            continue;
        }
        for c in 0..3 {
            let mixed = f32::from(dst[c]) * (1.0 - alpha) + f32::from(src[c]) * alpha;
            dst[c] = mixed.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::garment::{GarmentConfigInput, GarmentType, Rgb};
    use crate::pose::{FrameShape, Keypoint, Landmark, PoseScheme, LANDMARK_COUNT};

    const GREY: [u8; 3] = [128, 128, 128];

    fn pose(points: &[(Landmark, f32, f32)]) -> PoseResult {
        let mut kps = vec![Keypoint::default(); LANDMARK_COUNT];
        for &(l, x, y) in points {
            kps[l.index()] = Keypoint::new(x, y, 0.9);
        }
        PoseResult::from_keypoints(kps, PoseScheme::BlazePose33, FrameShape::new(320, 480)).unwrap()
    }

    fn frontal() -> PoseResult {
        pose(&[
            (Landmark::Nose, 150.0, 20.0),
            (Landmark::LeftShoulder, 100.0, 50.0),
            (Landmark::RightShoulder, 200.0, 50.0),
            (Landmark::LeftHip, 110.0, 300.0),
            (Landmark::RightHip, 190.0, 300.0),
        ])
    }

    fn config(json: serde_json::Value) -> GarmentConfig {
        GarmentConfig::from_json(&json).unwrap()
    }

    fn grey_frame() -> RgbImage {
        RgbImage::from_pixel(320, 480, Pixel(GREY))
    }

    fn kinds(parts: &[GarmentPart]) -> Vec<PartKind> {
        parts.iter().map(|p| p.kind).collect()
    }

    #[test]
    fn every_type_has_bodice_and_skirt() {
        let renderer = GarmentRenderer::default();
        for t in GarmentType::ALL {
            let parts = renderer.plan(&frontal(), &GarmentConfig::for_type(t));
            let k = kinds(&parts);
            assert!(k.contains(&PartKind::Bodice), "{t:?}");
            assert!(k.contains(&PartKind::Skirt), "{t:?}");
        }
    }

    #[test]
    fn only_wedding_dress_allows_a_veil() {
        for t in GarmentType::ALL {
            assert_eq!(silhouette_for(t).allows_veil, t == GarmentType::WeddingDress, "{t:?}");
        }
        assert!(silhouette_for(GarmentType::WeddingDress).flare > silhouette_for(GarmentType::CocktailDress).flare);
        assert!(!silhouette_for(GarmentType::PromDress).allows_train);
    }

    #[test]
    fn wedding_veil_follows_config() {
        let renderer = GarmentRenderer::default();

        let with = renderer.plan(&frontal(), &config(serde_json::json!({"type": "wedding_dress"})));
        assert!(kinds(&with).contains(&PartKind::Veil));

        let without = renderer.plan(
            &frontal(),
            &config(serde_json::json!({"type": "wedding_dress", "include_veil": false})),
        );
        assert!(!kinds(&without).contains(&PartKind::Veil));
    }

    #[test]
    fn veil_needs_nose_and_wedding_type() {
        let renderer = GarmentRenderer::default();
        let headless = pose(&[
            (Landmark::LeftShoulder, 100.0, 50.0),
            (Landmark::RightShoulder, 200.0, 50.0),
            (Landmark::LeftHip, 110.0, 300.0),
            (Landmark::RightHip, 190.0, 300.0),
        ]);
        let wedding = config(serde_json::json!({"type": "wedding_dress", "include_veil": true}));
        assert!(!kinds(&renderer.plan(&headless, &wedding)).contains(&PartKind::Veil));

        let evening = config(serde_json::json!({"type": "evening_gown", "include_veil": true}));
        assert!(!kinds(&renderer.plan(&frontal(), &evening)).contains(&PartKind::Veil));
    }

    #[test]
    fn train_only_for_long_gowns() {
        let renderer = GarmentRenderer::default();
        let evening = config(serde_json::json!({"type": "evening_gown", "include_train": true}));
        assert_eq!(kinds(&renderer.plan(&frontal(), &evening))[0], PartKind::Train);

        let cocktail = config(serde_json::json!({"type": "cocktail_dress", "include_train": true}));
        assert!(!kinds(&renderer.plan(&frontal(), &cocktail)).contains(&PartKind::Train));
    }

    #[test]
    fn sleeves_need_elbows() {
        let renderer = GarmentRenderer::default();
        let cfg = GarmentConfig::for_type(GarmentType::EveningGown);
        assert!(!kinds(&renderer.plan(&frontal(), &cfg)).contains(&PartKind::Sleeve));

        let with_elbow = pose(&[
            (Landmark::LeftShoulder, 100.0, 50.0),
            (Landmark::RightShoulder, 200.0, 50.0),
            (Landmark::LeftHip, 110.0, 300.0),
            (Landmark::RightHip, 190.0, 300.0),
            (Landmark::LeftElbow, 80.0, 170.0),
        ]);
        let sleeves: Vec<_> = renderer
            .plan(&with_elbow, &cfg)
            .into_iter()
            .filter(|p| p.kind == PartKind::Sleeve)
            .collect();
        assert_eq!(sleeves.len(), 1);
    }

    #[test]
    fn missing_hips_plan_nothing_and_frame_is_unchanged() {
        let renderer = GarmentRenderer::default();
        let shoulders_only = pose(&[
            (Landmark::LeftShoulder, 100.0, 50.0),
            (Landmark::RightShoulder, 200.0, 50.0),
        ]);
        let cfg = GarmentConfig::default();
        assert!(renderer.plan(&shoulders_only, &cfg).is_empty());

        let frame = grey_frame();
        assert_eq!(renderer.render(&frame, &shoulders_only, &cfg), frame);
    }

    #[test]
    fn mirrored_pose_keeps_bodice_outside_shoulders() {
        let mirrored = pose(&[
            (Landmark::LeftShoulder, 200.0, 50.0),
            (Landmark::RightShoulder, 100.0, 50.0),
            (Landmark::LeftHip, 190.0, 300.0),
            (Landmark::RightHip, 110.0, 300.0),
        ]);
        let parts = GarmentRenderer::default().plan(&mirrored, &GarmentConfig::default());
        let bodice = parts.iter().find(|p| p.kind == PartKind::Bodice).unwrap();
        let min_x = bodice.polygon.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
        let max_x = bodice.polygon.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);
        assert!(min_x < 100.0);
        assert!(max_x > 200.0);
    }

    #[test]
    fn full_opacity_paints_garment_colour() {
        let cfg = config(serde_json::json!({"bodice_color": [255, 0, 0], "opacity": 1.0}));
        let out = GarmentRenderer::default().render(&grey_frame(), &frontal(), &cfg);
        assert_eq!(out.get_pixel(150, 150).0, [255, 0, 0]);
        // Far outside the garment.
        assert_eq!(out.get_pixel(5, 5).0, GREY);
    }

    #[test]
    fn low_opacity_stays_close_to_frame() {
        let cfg = config(serde_json::json!({"bodice_color": [255, 0, 0], "opacity": 0.1}));
        let out = GarmentRenderer::default().render(&grey_frame(), &frontal(), &cfg);
        let px = out.get_pixel(150, 150).0;

        let dist = |a: [u8; 3], b: [u8; 3]| -> i32 {
            a.iter().zip(b.iter()).map(|(x, y)| (*x as i32 - *y as i32).abs()).sum()
        };
        assert_ne!(px, GREY);
        assert!(dist(px, GREY) < dist(px, [255, 0, 0]));
    }

    #[test]
    fn blend_mixes_channels() {
        let frame = RgbImage::from_pixel(1, 1, Pixel([0, 0, 0]));
        let overlay = RgbImage::from_pixel(1, 1, Pixel([200, 100, 0]));
        let out = blend(&frame, &overlay, 0.5);
        assert_eq!(out.get_pixel(0, 0).0, [100, 50, 0]);
    }

    #[test]
    fn degenerate_polygons_are_skipped() {
        let mut img = grey_frame();
        let same = Point::new(10.0, 10.0);
        fill_polygon(&mut img, &[same, same, same, same], Pixel([1, 2, 3]));
        fill_polygon(&mut img, &[Point::new(f32::NAN, 0.0), same, Point::new(50.0, 50.0)], Pixel([1, 2, 3]));
        assert_eq!(img, grey_frame());
    }

    #[test]
    fn custom_colour_reaches_skirt() {
        let cfg = GarmentConfigInput {
            skirt_color: Some(Rgb(1, 2, 3)),
            ..Default::default()
        }
        .resolve();
        let parts = GarmentRenderer::default().plan(&frontal(), &cfg);
        let skirt = parts.iter().find(|p| p.kind == PartKind::Skirt).unwrap();
        assert_eq!(skirt.color, Rgb(1, 2, 3));
    }
}
