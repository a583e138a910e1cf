use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown makeup type: {0:?}")]
    UnknownMakeupType(String),

    #[error("landmark {index} in subregion {subregion:?} is out of range for {len} landmarks")]
    LandmarkOutOfRange {
        subregion: &'static str,
        index: usize,
        len: usize,
    },

    #[error("subregion {subregion:?} spans only {points} distinct points")]
    DegenerateRegion {
        subregion: &'static str,
        points: usize,
    },

    #[error("no region of {0} could be built for this face")]
    EmptyMask(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parameter file error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, Error>;
