use crate::config::EngineConfig;
use crate::error::Error;
use crate::landmarks::LandmarkSet;
use crate::mask::{Mask, MaskBuilder};
use crate::params::{MakeupParameter, ParameterSet};
use crate::regions::MakeupKind;
use crate::shapes::rect::Rect;
use image::{GrayImage, RgbImage, imageops};
use imageproc::filter::gaussian_blur_f32;
use tracing::{Level, span, trace, warn};

/// Outcome of one `apply_makeup` call.
#[derive(Debug, Default)]
pub struct CompositeReport {
    pub applied: Vec<MakeupKind>,
    pub skipped: Vec<(MakeupKind, Error)>,
}

#[derive(Debug, Clone)]
pub struct Compositor {
    masks: MaskBuilder,
    smoothing_sigma: f32,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl Compositor {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            masks: MaskBuilder::new(config.mask),
            smoothing_sigma: config.smoothing_sigma,
        }
    }

    pub fn masks(&self) -> &MaskBuilder {
        &self.masks
    }

    /// Paint every type in `params` onto `target` in place, in `MakeupKind`
    /// order, then smooth the seams. Types whose regions cannot be built are
    /// skipped and reported; the others are still painted.
    ///
    /// `landmarks` must describe a face: callers handle frames without one.
    pub fn apply_makeup(
        &self,
        target: &mut RgbImage,
        landmarks: &LandmarkSet,
        params: &ParameterSet,
    ) -> CompositeReport {
        let span = span!(Level::DEBUG, "apply_makeup");
        let _guard = span.enter();

        let (width, height) = target.dimensions();
        let mut coverage = GrayImage::new(width, height);
        let mut touched: Option<Rect> = None;
        let mut report = CompositeReport::default();

        for (kind, param) in params {
            let mask = self.masks.build(landmarks, kind.config(), width, height);
            match self.blend_region(target, &mask, param, &mut coverage) {
                Some(bounds) => {
                    trace!("Applied {kind}");
                    touched = Some(touched.map_or(bounds, |acc| acc.union(&bounds)));
                    report.applied.push(*kind);
                }
                None => {
                    let e = Error::EmptyMask(kind.name());
                    warn!("Skipping {kind}: {e}");
                    report.skipped.push((*kind, e));
                }
            }
        }

        if let Some(region) = touched {
            self.smooth(target, &coverage, region);
        }

        report
    }

    /// `apply_makeup` for each face independently.
    pub fn apply_to_faces(
        &self,
        target: &mut RgbImage,
        faces: &[LandmarkSet],
        params: &ParameterSet,
    ) -> Vec<CompositeReport> {
        faces
            .iter()
            .map(|landmarks| self.apply_makeup(target, landmarks, params))
            .collect()
    }

    /// Blend `param`'s color into `target` under `mask`:
    /// `intensity * color + (1 - intensity) * target`, scaled by the mask
    /// weight. Pixels with zero weight are left exactly as they were. Records
    /// `weight * intensity` into `coverage`. Returns the area painted, or
    /// `None` for an empty mask.
    pub fn blend_region(
        &self,
        target: &mut RgbImage,
        mask: &Mask,
        param: &MakeupParameter,
        coverage: &mut GrayImage,
    ) -> Option<Rect> {
        let bounds = mask.bounds()?;
        let intensity = param.intensity();
        let o = param.color.to_rgb().0;

        for y in bounds.top()..bounds.bottom() {
            for x in bounds.left()..bounds.right() {
                let m = mask.weight(x, y);
                if m == 0 {
                    continue;
                }

                let weight = m as f32 / 255.;
                let t = target.get_pixel_mut(x, y);
                for c in 0..3 {
                    let base = t.0[c] as f32;
                    let blended = intensity * o[c] as f32 + (1. - intensity) * base;
                    t.0[c] = (base + (blended - base) * weight).round().clamp(0., 255.) as u8;
                }

                let cover = (m as f32 * intensity).round() as u8;
                let cp = coverage.get_pixel_mut(x, y);
                cp.0[0] = cp.0[0].max(cover);
            }
        }

        Some(bounds)
    }

    /// Tint each type's region with its configured color, for checking
    /// region placement against a face.
    pub fn visualize_regions(&self, target: &mut RgbImage, landmarks: &LandmarkSet) {
        let (width, height) = target.dimensions();
        let mut coverage = GrayImage::new(width, height);

        for kind in MakeupKind::ALL {
            let config = kind.config();
            let mask = self.masks.build(landmarks, config, width, height);
            let tint = MakeupParameter::new(config.default_color, 0.3);
            if self.blend_region(target, &mask, &tint, &mut coverage).is_none() {
                trace!("Nothing to show for {kind}");
            }
        }
    }

    // Blends a blurred copy back in proportion to how strongly each pixel was
    // painted, so untouched pixels stay bit-identical.
    fn smooth(&self, target: &mut RgbImage, coverage: &GrayImage, region: Rect) {
        if self.smoothing_sigma <= 0. {
            return;
        }

        let span = span!(Level::TRACE, "smooth");
        let _guard = span.enter();

        let (width, height) = target.dimensions();
        let pad = (self.smoothing_sigma * 3.).ceil() as u32 + 1;
        let work = region.pad(pad, width, height);
        let crop = imageops::crop_imm(target, work.x, work.y, work.w, work.h).to_image();
        let blurred = gaussian_blur_f32(&crop, self.smoothing_sigma);

        for y in region.top()..region.bottom() {
            for x in region.left()..region.right() {
                let cover = coverage.get_pixel(x, y).0[0];
                if cover == 0 {
                    continue;
                }

                let weight = cover as f32 / 255.;
                let b = blurred.get_pixel(x - work.x, y - work.y).0;
                let t = target.get_pixel_mut(x, y);
                for c in 0..3 {
                    let base = t.0[c] as f32;
                    t.0[c] = (base + (b[c] as f32 - base) * weight).round().clamp(0., 255.) as u8;
                }
            }
        }
    }
}
