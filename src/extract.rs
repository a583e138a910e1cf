use crate::landmarks::{LandmarkOracle, LandmarkSet};
use crate::mask::{Mask, MaskBuilder};
use crate::params::{Bgr, ParameterStore};
use crate::regions::MakeupKind;
use anyhow::{Error, Result};
use image::RgbImage;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{Level, debug, info, span, warn};

/// Mean color of `image` under `mask`, each pixel weighted by its mask value
/// so feathered edges count proportionally. `None` for an all-zero mask.
pub fn mean_color(image: &RgbImage, mask: &Mask) -> Option<Bgr> {
    let bounds = mask.bounds()?;

    let mut total = 0u64;
    let mut sums = [0u64; 3];
    for y in bounds.top()..bounds.bottom().min(image.height()) {
        for x in bounds.left()..bounds.right().min(image.width()) {
            let w = mask.weight(x, y) as u64;
            if w == 0 {
                continue;
            }
            let p = image.get_pixel(x, y).0;
            for c in 0..3 {
                sums[c] += w * p[c] as u64;
            }
            total += w;
        }
    }

    if total == 0 {
        return None;
    }

    let [r, g, b] = sums.map(|s| ((s as f64) / (total as f64)).round() as u8);
    Some(Bgr::new(b, g, r))
}

/// Mean reference color for each requested type name. Unknown names are
/// skipped with a warning, as are types whose regions could not be built.
pub fn extract_colors<I, S>(
    reference: &RgbImage,
    landmarks: &LandmarkSet,
    types: I,
    masks: &MaskBuilder,
) -> BTreeMap<MakeupKind, Bgr>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let span = span!(Level::DEBUG, "extract_colors");
    let _guard = span.enter();

    let mut colors = BTreeMap::new();
    for name in types {
        let name = name.as_ref();
        let kind: MakeupKind = match name.parse() {
            Ok(kind) => kind,
            Err(e) => {
                warn!("Not extracting: {e}");
                continue;
            }
        };

        let mask = masks.build(
            landmarks,
            kind.config(),
            reference.width(),
            reference.height(),
        );
        match mean_color(reference, &mask) {
            Some(color) => {
                debug!("Extracted {kind}: {color:?}");
                colors.insert(kind, color);
            }
            None => warn!("No region found for {kind}, leaving it out"),
        }
    }

    colors
}

/// Decode a reference image, locate its first face and seed `store` with the
/// colors found there. User-picked colors survive unless `reload` is set.
pub fn load_reference<I, S>(
    path: impl AsRef<Path>,
    oracle: &mut dyn LandmarkOracle,
    types: I,
    masks: &MaskBuilder,
    store: &ParameterStore,
    reload: bool,
) -> Result<BTreeMap<MakeupKind, Bgr>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let path = path.as_ref();
    info!("Loading reference image from {path:?}");
    let reference = image::open(path)?.into_rgb8();

    let faces = oracle.detect(&reference)?;
    let Some(landmarks) = faces.first() else {
        return Err(Error::msg(format!("No face found in reference image {path:?}")));
    };
    if faces.len() > 1 {
        debug!("{} faces in reference, using the first", faces.len());
    }

    let colors = extract_colors(&reference, landmarks, types, masks);
    let seeded = store.seed_colors(&colors, reload);
    info!("Extracted {} colors, seeded {seeded}", colors.len());

    Ok(colors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MaskConfig;
    use crate::landmarks::FixedLandmarks;
    use crate::regions::SubRegion;
    use image::Rgb;

    #[test]
    fn test_weighted_mean() {
        let mut img = RgbImage::from_pixel(10, 10, Rgb([0, 0, 0]));
        for x in 0..5 {
            for y in 0..10 {
                img.put_pixel(x, y, Rgb([200, 100, 50]));
            }
        }

        let landmarks = LandmarkSet::from(vec![(0, 0), (9, 0), (9, 9), (0, 9)]);
        let region = SubRegion {
            name: "all",
            edges: &[(0, 1), (1, 2), (2, 3), (3, 0)],
        };
        let builder = MaskBuilder::new(MaskConfig {
            open_radius: 0,
            feather_sigma: 0.,
        });
        let mask = builder.build_region_mask(&landmarks, &[region], &[], 10, 10);

        assert_eq!(mean_color(&img, &mask), Some(Bgr::new(25, 50, 100)));
        assert_eq!(mean_color(&img, &Mask::empty(10, 10)), None);
    }

    #[test]
    fn test_load_reference_without_face() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ref.png");
        RgbImage::new(8, 8).save(&path).unwrap();

        let store = ParameterStore::new();
        let mut oracle = FixedLandmarks::new(Vec::new());
        let res = load_reference(
            &path,
            &mut oracle,
            ["Blush"],
            &MaskBuilder::default(),
            &store,
            false,
        );

        assert!(res.is_err());
        assert!(store.is_empty());
    }
}
