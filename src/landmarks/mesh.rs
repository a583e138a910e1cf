use super::{LandmarkOracle, LandmarkSet};
use crate::regions::MESH_LANDMARKS;
use crate::shapes::point::Point;
use crate::shapes::rect::Rect;
use anyhow::{Error, Result};
use image::RgbImage;
use image::imageops::{self, FilterType};
use ndarray::Array;
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::Tensor;
use std::path::Path;
use tracing::{Level, debug, span};

const HEIGHT: u32 = 192;
const WIDTH: u32 = 192;

/// Face-mesh landmark model run on the centered square of each frame. Suits
/// a webcam where the subject faces the camera; there is no separate face
/// detection stage, so at most one face is reported.
pub struct MeshLandmarker {
    model: Session,
    min_presence: f32,
}

impl MeshLandmarker {
    pub fn new(model_path: impl AsRef<Path>, threads: usize) -> Result<MeshLandmarker> {
        let model = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(threads)?
            .commit_from_file(model_path)?;

        Ok(MeshLandmarker {
            model,
            min_presence: 0.5,
        })
    }

    pub fn with_min_presence(mut self, min_presence: f32) -> Self {
        self.min_presence = min_presence;
        self
    }
}

impl LandmarkOracle for MeshLandmarker {
    fn detect(&mut self, img: &RgbImage) -> Result<Vec<LandmarkSet>> {
        let span = span!(Level::DEBUG, "mesh_landmarker");
        let _guard = span.enter();

        let side = img.width().min(img.height());
        if side == 0 {
            return Ok(Vec::new());
        }
        let bounds = Rect::from_tl(
            (img.width() - side) / 2,
            (img.height() - side) / 2,
            side,
            side,
        );

        let face_img = imageops::crop_imm(img, bounds.x, bounds.y, bounds.w, bounds.h).to_image();
        let input_img = imageops::resize(&face_img, WIDTH, HEIGHT, FilterType::Triangle);

        let input_arr =
            Array::from_shape_fn((1, HEIGHT as usize, WIDTH as usize, 3), |(_, y, x, c)| {
                input_img.get_pixel(x as u32, y as u32)[c] as f32 / 255. // 0. - 1. range
            });
        let input = Tensor::from_array(input_arr)?;

        let model_span = span!(Level::DEBUG, "mesh_landmarker:model_run");
        let model_guard = model_span.enter();
        let outputs = self.model.run(ort::inputs!["input_1" => input]?)?;
        drop(model_guard);

        let presence = outputs["conv2d_31"].try_extract_tensor::<f32>()?;
        let logit = presence.iter().next().copied().unwrap_or(f32::NEG_INFINITY);
        let score = 1. / (1. + (-logit).exp());
        if score < self.min_presence {
            debug!("Face presence {score:.2} below {:.2}", self.min_presence);
            return Ok(Vec::new());
        }

        let output = outputs["conv2d_21"].try_extract_tensor::<f32>()?;
        let mesh: Vec<f32> = output.iter().copied().collect();
        if mesh.len() < MESH_LANDMARKS * 3 {
            return Err(Error::msg(format!(
                "face mesh output holds {} values, expected {}",
                mesh.len(),
                MESH_LANDMARKS * 3
            )));
        }

        Ok(vec![extract_landmarks(&mesh, bounds)])
    }
}

fn extract_landmarks(mesh: &[f32], run_bounds: Rect) -> LandmarkSet {
    let x_scale = run_bounds.w as f32 / WIDTH as f32;
    let y_scale = run_bounds.h as f32 / HEIGHT as f32;
    let x_offset = run_bounds.left() as f32;
    let y_offset = run_bounds.top() as f32;

    let points = (0..MESH_LANDMARKS)
        .map(|i| {
            let idx = i * 3;
            let x = x_offset + mesh[idx] * x_scale;
            let y = y_offset + mesh[idx + 1] * y_scale;
            Point::new(x.round() as i32, y.round() as i32)
        })
        .collect();

    LandmarkSet::new(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_landmarks_maps_into_frame() {
        let mut mesh = vec![0f32; MESH_LANDMARKS * 3];
        mesh[3] = 96.;
        mesh[4] = 192.;

        let set = extract_landmarks(&mesh, Rect::from_tl(80, 0, 384, 384));
        assert_eq!(set.len(), MESH_LANDMARKS);
        assert_eq!(set.get(0), Some(Point::new(80, 0)));
        assert_eq!(set.get(1), Some(Point::new(272, 384)));
    }
}
