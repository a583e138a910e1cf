use crate::error::{Error, Result};
use crate::params::Bgr;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

mod table;

pub use table::TABLE;

/// Landmark count of the face-mesh topology the table is written against.
pub const MESH_LANDMARKS: usize = 468;

/// Two landmarks adjacent on a region boundary.
pub type RegionEdge = (usize, usize);

#[derive(Debug, Clone, Copy)]
pub struct SubRegion {
    pub name: &'static str,
    pub edges: &'static [RegionEdge],
}

impl SubRegion {
    /// Distinct landmark indices referenced by the edges, ascending. Masks
    /// only need the point set; edge order is irrelevant to the hull.
    pub fn landmark_indices(&self) -> Vec<usize> {
        self.edges
            .iter()
            .flat_map(|&(a, b)| [a, b])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Closed set of makeup types. Declaration order is the compositing order:
/// earlier types are painted first and later ones land on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MakeupKind {
    Foundation,
    Blush,
    Eyeshadow,
    Eyebrow,
    EyelinerLeft,
    EyelinerRight,
    LipstickUpper,
    LipstickLower,
}

impl MakeupKind {
    pub const ALL: [MakeupKind; 8] = [
        MakeupKind::Foundation,
        MakeupKind::Blush,
        MakeupKind::Eyeshadow,
        MakeupKind::Eyebrow,
        MakeupKind::EyelinerLeft,
        MakeupKind::EyelinerRight,
        MakeupKind::LipstickUpper,
        MakeupKind::LipstickLower,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MakeupKind::Foundation => "Foundation",
            MakeupKind::Blush => "Blush",
            MakeupKind::Eyeshadow => "Eyeshadow",
            MakeupKind::Eyebrow => "Eyebrow",
            MakeupKind::EyelinerLeft => "Eyeliner Left",
            MakeupKind::EyelinerRight => "Eyeliner Right",
            MakeupKind::LipstickUpper => "Lipstick Upper",
            MakeupKind::LipstickLower => "Lipstick Lower",
        }
    }

    pub fn config(&self) -> &'static MakeupTypeConfig {
        &TABLE[*self as usize]
    }
}

impl fmt::Display for MakeupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MakeupKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        MakeupKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownMakeupType(s.to_string()))
    }
}

#[derive(Debug)]
pub struct MakeupTypeConfig {
    pub kind: MakeupKind,
    /// Hulls unioned into the type's mask.
    pub subregions: &'static [SubRegion],
    /// Hulls cut back out of the union before cleaning.
    pub exclusions: &'static [SubRegion],
    pub default_color: Bgr,
    pub default_intensity: f32,
}

impl MakeupTypeConfig {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Resolve a makeup type by name, failing on names absent from the table.
pub fn lookup(name: &str) -> Result<&'static MakeupTypeConfig> {
    Ok(name.parse::<MakeupKind>()?.config())
}
