use anyhow::Result;
use image::{EncodableLayout, RgbImage};
use std::io::Write;
use std::process::{Command, Stdio};
use tracing::error;

pub use camera::CameraSource;

/// Raw frames piped to ffplay, or to a v4l2 loopback device through ffmpeg.
pub struct OutputVideoStream {
    output_proc: std::process::Child,
}

impl Drop for OutputVideoStream {
    fn drop(&mut self) {
        drop(self.output_proc.stdin.take());
        if let Err(e) = self.output_proc.kill() {
            error!("Failed to stop output process {e:?}");
        }
        let _ = self.output_proc.wait();
    }
}

impl OutputVideoStream {
    pub fn new(width: u32, height: u32, device: Option<String>) -> Result<Self> {
        let size = format!("{width}x{height}");
        let mut command = match device {
            Some(d) => {
                let mut command = Command::new("ffmpeg");
                command.args([
                    "-f",
                    "rawvideo",
                    "-pix_fmt",
                    "rgb24",
                    "-s",
                    &size,
                    "-i",
                    "-",
                    "-map",
                    "0:v",
                    "-preset",
                    "fast",
                    "-vf",
                    "format=yuv420p",
                    "-f",
                    "v4l2",
                    &format!("/dev/{d}"),
                ]);
                command
            }
            None => {
                let mut command = Command::new("ffplay");
                command.args([
                    "-f",
                    "rawvideo",
                    "-pixel_format",
                    "rgb24",
                    "-video_size",
                    &size,
                    "-fflags",
                    "nobuffer",
                    "-flags",
                    "low_delay",
                    "-",
                ]);
                command
            }
        };
        let output_proc = command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()?;

        Ok(Self { output_proc })
    }

    pub fn write_frame(&mut self, img: &RgbImage) -> Result<()> {
        if let Some(stdin) = self.output_proc.stdin.as_mut() {
            stdin.write_all(img.as_bytes())?;
        }

        Ok(())
    }
}

mod camera {
    use anyhow::{Error, Result};
    use facepaint::pipeline::FrameSource;
    use image::RgbImage;
    use nokhwa::{
        Camera, nokhwa_initialize,
        pixel_format::RgbFormat,
        query,
        utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType},
    };
    use std::thread;
    use std::time::Duration;
    use tracing::{Level, debug, error, info, span, warn};

    const OPEN_ATTEMPTS: u32 = 5;
    const OPEN_BACKOFF: Duration = Duration::from_millis(500);

    pub struct CameraSource {
        camera: Camera,
    }

    impl CameraSource {
        /// Opens the camera at `index`, or the last one found. Retries with a
        /// fixed backoff before giving up.
        pub fn open(index: Option<u32>, fps: u32) -> Result<Self> {
            let mut attempt = 1;
            loop {
                match create_input_stream(index, fps) {
                    Ok(camera) => {
                        info!("Camera open at {:?}", camera.resolution());
                        return Ok(Self { camera });
                    }
                    Err(e) if attempt < OPEN_ATTEMPTS => {
                        warn!("Failed to open camera (attempt {attempt}/{OPEN_ATTEMPTS}): {e:?}");
                        thread::sleep(OPEN_BACKOFF);
                        attempt += 1;
                    }
                    Err(e) => {
                        return Err(e.context(format!(
                            "Camera unavailable after {OPEN_ATTEMPTS} attempts"
                        )));
                    }
                }
            }
        }
    }

    impl FrameSource for CameraSource {
        fn next_frame(&mut self) -> Result<RgbImage> {
            let span = span!(Level::DEBUG, "get_frame");
            let _guard = span.enter();

            let frame = self.camera.frame()?;
            Ok(frame.decode_image::<RgbFormat>()?)
        }
    }

    impl Drop for CameraSource {
        fn drop(&mut self) {
            if let Err(e) = self.camera.stop_stream() {
                error!("Failed to stop camera stream {e:?}");
            }
        }
    }

    fn create_input_stream(index: Option<u32>, fps: u32) -> Result<Camera> {
        nokhwa_initialize(|granted| {
            debug!("User said {}", granted);
        });

        let cameras = query(ApiBackend::Auto)?;
        cameras
            .iter()
            .for_each(|cam| debug!("Found camera: {:?}", cam));

        let index = match index {
            Some(i) => CameraIndex::Index(i),
            None => cameras
                .last()
                .map(|cam| cam.index().clone())
                .ok_or_else(|| Error::msg("No camera found"))?,
        };

        let mut camera = Camera::new(
            index,
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        )?;

        camera.set_frame_rate(fps)?;
        camera.open_stream()?;
        Ok(camera)
    }
}
