use crate::error::Result;
use crate::regions::MakeupKind;
use image::Rgb;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

mod store;

pub use store::ParameterStore;

/// Color in blue, green, red channel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Bgr {
    pub b: u8,
    pub g: u8,
    pub r: u8,
}

impl Bgr {
    pub const fn new(b: u8, g: u8, r: u8) -> Self {
        Self { b, g, r }
    }

    /// Clamps each channel to 0..=255.
    pub fn from_channels([b, g, r]: [i64; 3]) -> Self {
        Self::new(clamp_channel(b), clamp_channel(g), clamp_channel(r))
    }

    pub fn from_rgb(rgb: Rgb<u8>) -> Self {
        let [r, g, b] = rgb.0;
        Self::new(b, g, r)
    }

    pub fn to_rgb(&self) -> Rgb<u8> {
        Rgb([self.r, self.g, self.b])
    }

    pub fn channels(&self) -> [i64; 3] {
        [self.b as i64, self.g as i64, self.r as i64]
    }
}

fn clamp_channel(v: i64) -> u8 {
    v.clamp(0, 255) as u8
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MakeupParameter {
    pub color: Bgr,
    intensity: f32,
}

impl MakeupParameter {
    pub fn new(color: Bgr, intensity: f32) -> Self {
        Self {
            color,
            intensity: clamp_intensity(intensity),
        }
    }

    pub fn defaults_for(kind: MakeupKind) -> Self {
        let config = kind.config();
        Self::new(config.default_color, config.default_intensity)
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn set_intensity(&mut self, intensity: f32) {
        self.intensity = clamp_intensity(intensity);
    }
}

fn clamp_intensity(v: f32) -> f32 {
    if v.is_nan() { 0. } else { v.clamp(0., 1.) }
}

/// Parameters for the enabled makeup types, in compositing order.
pub type ParameterSet = BTreeMap<MakeupKind, MakeupParameter>;

/// One saved makeup type. Disabled entries keep their values so they can be
/// re-enabled later.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SavedParameter {
    pub param: MakeupParameter,
    pub enabled: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ParameterRecord {
    color: [i64; 3],
    intensity: f32,
    #[serde(default = "enabled_by_default")]
    enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

pub fn parse_parameters(json: &str) -> Result<BTreeMap<MakeupKind, SavedParameter>> {
    let records: BTreeMap<String, ParameterRecord> = serde_json::from_str(json)?;

    let mut saved = BTreeMap::new();
    for (name, record) in records {
        let kind: MakeupKind = name.parse()?;
        saved.insert(
            kind,
            SavedParameter {
                param: MakeupParameter::new(Bgr::from_channels(record.color), record.intensity),
                enabled: record.enabled,
            },
        );
    }

    Ok(saved)
}

pub fn render_parameters(saved: &BTreeMap<MakeupKind, SavedParameter>) -> Result<String> {
    let records: BTreeMap<&str, ParameterRecord> = saved
        .iter()
        .map(|(kind, s)| {
            (
                kind.name(),
                ParameterRecord {
                    color: s.param.color.channels(),
                    intensity: s.param.intensity(),
                    enabled: s.enabled,
                },
            )
        })
        .collect();

    Ok(serde_json::to_string_pretty(&records)?)
}

pub fn load_parameters(path: impl AsRef<Path>) -> Result<BTreeMap<MakeupKind, SavedParameter>> {
    let path = path.as_ref();
    let saved = parse_parameters(&fs::read_to_string(path)?)?;
    info!("Loaded {} makeup parameters from {path:?}", saved.len());
    Ok(saved)
}

pub fn save_parameters(
    path: impl AsRef<Path>,
    saved: &BTreeMap<MakeupKind, SavedParameter>,
) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, render_parameters(saved)?)?;
    debug!("Saved {} makeup parameters to {path:?}", saved.len());
    Ok(())
}

/// Enabled entries only, ready for `ParameterStore::set_many`.
pub fn enabled(saved: &BTreeMap<MakeupKind, SavedParameter>) -> ParameterSet {
    saved
        .iter()
        .filter(|(_, s)| s.enabled)
        .map(|(kind, s)| (*kind, s.param))
        .collect()
}
