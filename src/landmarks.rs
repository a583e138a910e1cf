use crate::error::Result;
use crate::shapes::point::Point;
use anyhow::Result as AnyResult;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[cfg(feature = "onnx")]
mod mesh;

#[cfg(feature = "onnx")]
pub use mesh::MeshLandmarker;

/// Landmarks of one face, indexed by the oracle's fixed topology.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet {
    points: Vec<Point>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<Point> {
        self.points.get(idx).copied()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Reads a JSON array of `{"x": .., "y": ..}` points.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }
}

impl From<Vec<(i32, i32)>> for LandmarkSet {
    fn from(points: Vec<(i32, i32)>) -> Self {
        Self::new(points.into_iter().map(Point::from).collect())
    }
}

/// Face landmark detector. Returns one set per detected face, possibly none.
pub trait LandmarkOracle: Send {
    fn detect(&mut self, img: &RgbImage) -> AnyResult<Vec<LandmarkSet>>;
}

/// Reports the same faces for every image. Stands in for a detector when
/// landmarks were computed ahead of time.
#[derive(Debug, Clone, Default)]
pub struct FixedLandmarks {
    faces: Vec<LandmarkSet>,
}

impl FixedLandmarks {
    pub fn new(faces: Vec<LandmarkSet>) -> Self {
        Self { faces }
    }

    /// Reads either a single face or an array of faces.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Faces {
            One(LandmarkSet),
            Many(Vec<LandmarkSet>),
        }

        let faces = match serde_json::from_str(&fs::read_to_string(path)?)? {
            Faces::One(face) => vec![face],
            Faces::Many(faces) => faces,
        };

        Ok(Self::new(faces))
    }
}

impl LandmarkOracle for FixedLandmarks {
    fn detect(&mut self, _img: &RgbImage) -> AnyResult<Vec<LandmarkSet>> {
        Ok(self.faces.clone())
    }
}
