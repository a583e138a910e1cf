use crate::config::MaskConfig;
use crate::error::{Error, Result};
use crate::landmarks::LandmarkSet;
use crate::regions::{MakeupTypeConfig, SubRegion};
use crate::shapes::point::Point;
use crate::shapes::polygon::Polygon;
use crate::shapes::rect::Rect;
use image::{GrayImage, Luma, imageops};
use imageproc::distance_transform::Norm;
use imageproc::drawing::draw_polygon_mut;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::open;
use tracing::{Level, span, trace, warn};

/// Per-pixel weight in 0..=255 selecting where an effect applies. Same size
/// as the frame it was built for.
#[derive(Debug)]
pub struct Mask {
    image: GrayImage,
    bounds: Option<Rect>,
    skipped: Vec<Error>,
}

impl Mask {
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            image: GrayImage::new(width, height),
            bounds: None,
            skipped: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// True when no pixel carries any weight.
    pub fn is_empty(&self) -> bool {
        self.bounds.is_none()
    }

    /// Tight box around the non-zero pixels.
    pub fn bounds(&self) -> Option<Rect> {
        self.bounds
    }

    pub fn weight(&self, x: u32, y: u32) -> u8 {
        self.image.get_pixel(x, y).0[0]
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    /// Subregions left out of the mask and why.
    pub fn skipped(&self) -> &[Error] {
        &self.skipped
    }

    pub fn count_nonzero(&self) -> usize {
        self.image.pixels().filter(|p| p.0[0] > 0).count()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MaskBuilder {
    config: MaskConfig,
}

impl MaskBuilder {
    pub fn new(config: MaskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MaskConfig {
        &self.config
    }

    pub fn build(
        &self,
        landmarks: &LandmarkSet,
        config: &MakeupTypeConfig,
        width: u32,
        height: u32,
    ) -> Mask {
        let span = span!(Level::TRACE, "build_mask", kind = config.name());
        let _guard = span.enter();

        self.build_region_mask(
            landmarks,
            config.subregions,
            config.exclusions,
            width,
            height,
        )
    }

    /// Union of the convex hulls of `subregions`, minus the hulls of
    /// `exclusions`, opened and feathered. A subregion with bad indices or
    /// too few points is skipped and recorded in `Mask::skipped`; the rest
    /// still contribute.
    pub fn build_region_mask(
        &self,
        landmarks: &LandmarkSet,
        subregions: &[SubRegion],
        exclusions: &[SubRegion],
        width: u32,
        height: u32,
    ) -> Mask {
        let mut image = GrayImage::new(width, height);
        let mut skipped = Vec::new();
        let mut bounds: Option<Rect> = None;

        for region in subregions {
            let hull = match region_hull(landmarks, region) {
                Ok(hull) => hull,
                Err(e) => {
                    warn!("Skipping subregion: {e}");
                    skipped.push(e);
                    continue;
                }
            };

            match hull.bounds(width, height) {
                Some(b) => {
                    fill_hull(&mut image, &hull, 255);
                    bounds = Some(bounds.map_or(b, |acc| acc.union(&b)));
                }
                None => trace!("Subregion {} lies outside the frame", region.name),
            }
        }

        let Some(bounds) = bounds else {
            return Mask {
                image,
                bounds: None,
                skipped,
            };
        };

        for region in exclusions {
            match region_hull(landmarks, region) {
                Ok(hull) if hull.bounds(width, height).is_some() => {
                    fill_hull(&mut image, &hull, 0);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Skipping exclusion: {e}");
                    skipped.push(e);
                }
            }
        }

        let mut mask = self.finish(image, bounds);
        mask.skipped = skipped;
        mask
    }

    /// Mask of every pixel carrying `label` in a face segmentation map.
    pub fn from_label_map(&self, labels: &GrayImage, label: u8) -> Mask {
        let (width, height) = labels.dimensions();
        let mut image = GrayImage::new(width, height);
        let mut bounds: Option<Rect> = None;

        for (x, y, p) in labels.enumerate_pixels() {
            if p.0[0] == label {
                image.put_pixel(x, y, Luma([255u8]));
                let b = Rect::from_tl(x, y, 1, 1);
                bounds = Some(bounds.map_or(b, |acc| acc.union(&b)));
            }
        }

        match bounds {
            Some(bounds) => self.finish(image, bounds),
            None => Mask::empty(width, height),
        }
    }

    // Opening and feathering work on a padded crop around `filled`.
    fn finish(&self, mut image: GrayImage, filled: Rect) -> Mask {
        let (width, height) = image.dimensions();
        let open_radius = self.config.open_radius;
        let sigma = self.config.feather_sigma;

        let pad = open_radius as u32 + 1 + (sigma.max(0.) * 3.).ceil() as u32;
        let work = filled.pad(pad, width, height);
        let region = imageops::crop_imm(&image, work.x, work.y, work.w, work.h).to_image();

        let cleaned = if open_radius > 0 {
            open(&region, Norm::LInf, open_radius)
        } else {
            region
        };

        let feathered = if sigma > 0. {
            let mut blurred = gaussian_blur_f32(&cleaned, sigma);
            // Feather inwards only: nothing outside the cleaned region.
            for (b, c) in blurred.pixels_mut().zip(cleaned.pixels()) {
                b.0[0] = b.0[0].min(c.0[0]);
            }
            blurred
        } else {
            cleaned
        };

        let bounds = nonzero_bounds(&feathered).map(|r| {
            Rect::from_tl(r.x + work.x, r.y + work.y, r.w, r.h)
        });
        imageops::replace(&mut image, &feathered, work.x as i64, work.y as i64);

        Mask {
            image,
            bounds,
            skipped: Vec::new(),
        }
    }
}

// Landmarks may lie far outside the frame, so the hull is cut down to one
// pixel around it before rasterizing.
fn fill_hull(image: &mut GrayImage, hull: &Polygon, value: u8) {
    let (width, height) = image.dimensions();
    let visible = hull.clip(-1, -1, width as i32, height as i32);
    if !visible.is_degenerate() {
        draw_polygon_mut(image, &visible.to_imageproc(), Luma([value]));
    }
}

fn region_hull(landmarks: &LandmarkSet, region: &SubRegion) -> Result<Polygon> {
    let mut points: Vec<Point> = Vec::new();
    for index in region.landmark_indices() {
        match landmarks.get(index) {
            Some(p) => points.push(p),
            None => {
                return Err(Error::LandmarkOutOfRange {
                    subregion: region.name,
                    index,
                    len: landmarks.len(),
                });
            }
        }
    }

    let hull = Polygon::convex_hull(&points);
    if hull.is_degenerate() {
        return Err(Error::DegenerateRegion {
            subregion: region.name,
            points: hull.points.len(),
        });
    }

    Ok(hull)
}

fn nonzero_bounds(image: &GrayImage) -> Option<Rect> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, p) in image.enumerate_pixels() {
        if p.0[0] == 0 {
            continue;
        }
        bounds = Some(match bounds {
            Some((l, t, r, b)) => (l.min(x), t.min(y), r.max(x), b.max(y)),
            None => (x, y, x, y),
        });
    }

    bounds.map(|(l, t, r, b)| Rect::from_tl(l, t, r - l + 1, b - t + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: SubRegion = SubRegion {
        name: "triangle",
        edges: &[(0, 1), (1, 2), (2, 0)],
    };

    fn square(name: &'static str) -> SubRegion {
        SubRegion {
            name,
            edges: &[(3, 4), (4, 5), (5, 6), (6, 3)],
        }
    }

    fn landmarks() -> LandmarkSet {
        LandmarkSet::from(vec![
            (0, 0),
            (10, 0),
            (5, 10),
            (20, 20),
            (60, 20),
            (60, 60),
            (20, 60),
            (35, 35),
            (45, 35),
            (45, 45),
            (35, 45),
        ])
    }

    #[test]
    fn test_triangle_stays_inside_its_box() {
        let mask = MaskBuilder::default().build_region_mask(&landmarks(), &[TRIANGLE], &[], 20, 20);

        assert!(mask.count_nonzero() > 0);
        assert!(mask.skipped().is_empty());
        for (x, y, p) in mask.image().enumerate_pixels() {
            if p.0[0] > 0 {
                assert!(x <= 10 && y <= 10, "({x}, {y}) outside the triangle box");
            }
        }

        let hull = Polygon::convex_hull(&landmarks().points()[..3]);
        let inside = mask
            .image()
            .enumerate_pixels()
            .any(|(x, y, p)| p.0[0] > 0 && hull.contains_point(Point::new(x as i32, y as i32)));
        assert!(inside);
    }

    #[test]
    fn test_out_of_range_skips_only_that_subregion() {
        let bad = SubRegion {
            name: "bad",
            edges: &[(0, 1), (1, 400)],
        };
        let mask = MaskBuilder::default().build_region_mask(
            &landmarks(),
            &[bad, square("square")],
            &[],
            80,
            80,
        );

        assert!(!mask.is_empty());
        assert_eq!(mask.skipped().len(), 1);
        assert!(matches!(
            mask.skipped()[0],
            Error::LandmarkOutOfRange {
                index: 400,
                len: 11,
                ..
            }
        ));
        assert!(mask.weight(40, 40) >= 250);
        assert_eq!(mask.weight(5, 3), 0);
    }

    #[test]
    fn test_degenerate_region_is_skipped() {
        let line = SubRegion {
            name: "line",
            edges: &[(0, 1)],
        };
        let mask = MaskBuilder::default().build_region_mask(&landmarks(), &[line], &[], 20, 20);

        assert!(mask.is_empty());
        assert_eq!(mask.count_nonzero(), 0);
        assert!(matches!(
            mask.skipped()[0],
            Error::DegenerateRegion { points: 2, .. }
        ));
    }

    #[test]
    fn test_subregions_are_unioned() {
        let builder = MaskBuilder::new(MaskConfig {
            open_radius: 0,
            feather_sigma: 0.,
        });
        let mask =
            builder.build_region_mask(&landmarks(), &[TRIANGLE, square("square")], &[], 80, 80);

        assert_eq!(mask.weight(5, 2), 255);
        assert_eq!(mask.weight(40, 40), 255);
        assert_eq!(mask.weight(15, 15), 0);
        assert_eq!(mask.bounds(), Some(Rect::from_tl(0, 0, 61, 61)));
    }

    #[test]
    fn test_hard_edges_without_feather() {
        let builder = MaskBuilder::new(MaskConfig {
            open_radius: 1,
            feather_sigma: 0.,
        });
        let mask = builder.build_region_mask(&landmarks(), &[square("square")], &[], 80, 80);

        assert!(mask.image().pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn test_feather_softens_edge() {
        let mask =
            MaskBuilder::default().build_region_mask(&landmarks(), &[square("square")], &[], 80, 80);

        let edge = mask.weight(20, 40);
        assert!(edge > 0 && edge < 255, "edge weight {edge}");
        assert!(mask.weight(40, 40) >= 250);
        assert_eq!(mask.weight(19, 40), 0);
    }

    #[test]
    fn test_exclusion_cuts_hole() {
        let hole = SubRegion {
            name: "hole",
            edges: &[(7, 8), (8, 9), (9, 10), (10, 7)],
        };
        let builder = MaskBuilder::new(MaskConfig {
            open_radius: 1,
            feather_sigma: 0.,
        });
        let mask = builder.build_region_mask(&landmarks(), &[square("square")], &[hole], 80, 80);

        assert_eq!(mask.weight(40, 40), 0);
        assert_eq!(mask.weight(25, 25), 255);
    }

    #[test]
    fn test_far_landmarks_fill_visible_part() {
        let wide = SubRegion {
            name: "wide",
            edges: &[(0, 1), (1, 2), (2, 3), (3, 0)],
        };
        let landmarks = LandmarkSet::from(vec![
            (-5, 0),
            (i32::MAX - 1, 0),
            (i32::MAX - 1, i32::MAX - 1),
            (-5, i32::MAX - 1),
        ]);
        let builder = MaskBuilder::new(MaskConfig {
            open_radius: 1,
            feather_sigma: 0.,
        });
        let mask = builder.build_region_mask(&landmarks, &[wide], &[], 20, 20);

        assert!(mask.skipped().is_empty());
        assert_eq!(mask.weight(10, 10), 255);
        assert_eq!(mask.weight(19, 19), 255);
        assert_eq!(mask.bounds(), Some(Rect::from_tl(0, 0, 20, 20)));
    }

    #[test]
    fn test_label_map_mask() {
        let mut labels = GrayImage::new(30, 30);
        for y in 10..20 {
            for x in 5..25 {
                labels.put_pixel(x, y, Luma([13u8]));
            }
        }
        // isolated speck removed by the opening
        labels.put_pixel(1, 1, Luma([13u8]));

        let builder = MaskBuilder::new(MaskConfig {
            open_radius: 1,
            feather_sigma: 0.,
        });
        let mask = builder.from_label_map(&labels, 13);
        assert_eq!(mask.weight(15, 15), 255);
        assert_eq!(mask.weight(1, 1), 0);
        assert_eq!(mask.bounds(), Some(Rect::from_tl(5, 10, 20, 10)));

        assert!(builder.from_label_map(&labels, 2).is_empty());
    }
}
