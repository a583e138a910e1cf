pub mod compositor;
pub mod config;
pub mod error;
pub mod extract;
pub mod landmarks;
pub mod mask;
pub mod params;
pub mod pipeline;
pub mod regions;
pub mod shapes;

pub use error::{Error, Result};
