use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Tuning for mask cleanup and feathering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskConfig {
    /// Opening radius in pixels (chessboard norm). 1 is a 3x3 square, 0 skips.
    pub open_radius: u8,
    /// Gaussian sigma of the edge feather. 0 keeps hard edges.
    pub feather_sigma: f32,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            open_radius: 1,
            feather_sigma: 2.6,
        }
    }
}

/// Engine tuning. Unknown keys are ignored, so older files carrying an
/// `overlay_sigma` still load: the overlay is one flat color and a blur
/// leaves it unchanged, so there is nothing for it to tune.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub mask: MaskConfig,
    /// Final smoothing over composited regions. 0 disables.
    pub smoothing_sigma: f32,
    /// Frames buffered between producer and consumer.
    pub queue_capacity: usize,
    /// Face-mesh presence score below which a frame counts as faceless.
    pub min_presence: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mask: MaskConfig::default(),
            smoothing_sigma: 0.8,
            queue_capacity: 10,
            min_presence: 0.5,
        }
    }
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() -> Result<()> {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "mask": { "feather_sigma": 0 }, "queue_capacity": 4 }"#)?;

        assert_eq!(config.queue_capacity, 4);
        assert_eq!(config.mask.feather_sigma, 0.);
        assert_eq!(config.mask.open_radius, 1);
        assert_eq!(config.smoothing_sigma, 0.8);
        assert_eq!(config.min_presence, 0.5);
        Ok(())
    }

    #[test]
    fn test_overlay_sigma_is_accepted_and_ignored() -> Result<()> {
        let config: EngineConfig = serde_json::from_str(r#"{ "overlay_sigma": 3.5 }"#)?;
        assert_eq!(config, EngineConfig::default());
        Ok(())
    }
}
