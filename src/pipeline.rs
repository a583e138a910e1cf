use crate::compositor::Compositor;
use crate::landmarks::LandmarkOracle;
use crate::params::ParameterStore;
use anyhow::{Error, Result};
use image::RgbImage;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{Level, debug, error, info, span, trace, warn};

mod queue;

pub use queue::{FrameReceiver, FrameSender, ProcessedFrame, frame_queue};

/// Something that yields raw frames on demand, such as a camera. Sources
/// are opened and dropped on the producer thread.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<RgbImage>;
}

/// Opens a fresh capture each time the pipeline starts.
pub type SourceFactory = Box<dyn FnMut() -> Result<Box<dyn FrameSource>> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PipelineState {
    Idle = 0,
    Running = 1,
    Stopping = 2,
}

impl PipelineState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => PipelineState::Running,
            2 => PipelineState::Stopping,
            _ => PipelineState::Idle,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// Everything the producer borrows for one run and hands back when it ends.
struct Worker {
    open_source: SourceFactory,
    oracle: Box<dyn LandmarkOracle>,
}

struct Control {
    idle: Option<Worker>,
    running: Option<JoinHandle<Worker>>,
}

/// Capture, detect and composite on a producer thread, handing finished
/// frames to a consumer through a bounded queue.
pub struct FramePipeline {
    state: Arc<AtomicU8>,
    control: Mutex<Control>,
    params: Arc<ParameterStore>,
    compositor: Arc<Compositor>,
    sender: FrameSender,
}

impl FramePipeline {
    pub fn new(
        open_source: SourceFactory,
        oracle: Box<dyn LandmarkOracle>,
        params: Arc<ParameterStore>,
        compositor: Arc<Compositor>,
        capacity: usize,
    ) -> (Self, FrameReceiver) {
        let (sender, receiver) = frame_queue(capacity);
        let pipeline = Self {
            state: Arc::new(AtomicU8::new(PipelineState::Idle as u8)),
            control: Mutex::new(Control {
                idle: Some(Worker {
                    open_source,
                    oracle,
                }),
                running: None,
            }),
            params,
            compositor,
            sender,
        };

        (pipeline, receiver)
    }

    pub fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Frames dropped because the consumer fell behind.
    pub fn dropped(&self) -> u64 {
        self.sender.dropped()
    }

    pub fn params(&self) -> &Arc<ParameterStore> {
        &self.params
    }

    /// Open the capture and start producing. Does nothing, apart from a
    /// warning, unless the pipeline is idle. Returns once the source is open.
    pub fn start(&self) -> Result<()> {
        let mut control = self.lock();

        if self.state() != PipelineState::Idle {
            warn!("Pipeline already {}, ignoring start", self.state());
            return Ok(());
        }

        // A producer that stopped on its own still has to be joined
        self.reclaim(&mut control);
        let Some(worker) = control.idle.take() else {
            return Err(Error::msg("Frame source lost to a failed producer"));
        };

        self.state
            .store(PipelineState::Running as u8, Ordering::Release);

        let producer = Producer {
            state: Arc::clone(&self.state),
            params: Arc::clone(&self.params),
            compositor: Arc::clone(&self.compositor),
            sender: self.sender.clone(),
        };
        let (ready_tx, ready_rx) = flume::bounded(1);
        let spawned = thread::Builder::new()
            .name("facepaint-producer".to_string())
            .spawn(move || producer.run(worker, ready_tx));

        match spawned {
            Ok(handle) => control.running = Some(handle),
            Err(e) => {
                self.state.store(PipelineState::Idle as u8, Ordering::Release);
                return Err(Error::from(e).context("Failed to spawn producer thread"));
            }
        }

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("Pipeline started");
                Ok(())
            }
            Ok(Err(e)) => {
                self.reclaim(&mut control);
                Err(e.context("Failed to open frame source"))
            }
            Err(_) => {
                self.reclaim(&mut control);
                self.state.store(PipelineState::Idle as u8, Ordering::Release);
                Err(Error::msg("Producer exited before opening its source"))
            }
        }
    }

    /// Ask the producer to finish its current frame and wait for it. The
    /// capture is released once this returns.
    pub fn stop(&self) {
        let mut control = self.lock();

        match self.state.compare_exchange(
            PipelineState::Running as u8,
            PipelineState::Stopping as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => debug!("Stopping pipeline"),
            Err(s) => trace!("Stop while {}", PipelineState::from_u8(s)),
        }

        self.reclaim(&mut control);
        self.state.store(PipelineState::Idle as u8, Ordering::Release);
    }

    fn reclaim(&self, control: &mut Control) {
        if let Some(handle) = control.running.take() {
            match handle.join() {
                Ok(worker) => control.idle = Some(worker),
                Err(_) => {
                    error!("Producer thread panicked");
                    self.state.store(PipelineState::Idle as u8, Ordering::Release);
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Producer {
    state: Arc<AtomicU8>,
    params: Arc<ParameterStore>,
    compositor: Arc<Compositor>,
    sender: FrameSender,
}

// Stores Idle when the producer leaves `run`, unwinding included.
struct IdleOnExit<'a>(&'a AtomicU8);

impl Drop for IdleOnExit<'_> {
    fn drop(&mut self) {
        self.0.store(PipelineState::Idle as u8, Ordering::Release);
    }
}

impl Producer {
    fn running(&self) -> bool {
        self.state.load(Ordering::Acquire) == PipelineState::Running as u8
    }

    fn run(self, mut worker: Worker, ready: flume::Sender<Result<()>>) -> Worker {
        let _idle = IdleOnExit(&self.state);

        let opened = panic::catch_unwind(AssertUnwindSafe(|| (worker.open_source)()))
            .unwrap_or_else(|_| Err(Error::msg("Frame source panicked while opening")));
        let mut source = match opened {
            Ok(source) => source,
            Err(e) => {
                let _ = ready.send(Err(e));
                return worker;
            }
        };
        let _ = ready.send(Ok(()));

        let mut seq = 0u64;
        while self.running() {
            let span = span!(Level::DEBUG, "frame_loop_iter");
            let _guard = span.enter();

            let pulled = panic::catch_unwind(AssertUnwindSafe(|| source.next_frame()))
                .unwrap_or_else(|_| Err(Error::msg("Frame source panicked")));
            let image = match pulled {
                Ok(image) => image,
                Err(e) => {
                    error!("Failed to pull frame: {e:?}");
                    break;
                }
            };

            let processed = panic::catch_unwind(AssertUnwindSafe(|| {
                self.process(worker.oracle.as_mut(), &image, seq)
            }));
            let (image, faces) = match processed {
                Ok(Some(processed)) => processed,
                Ok(None) => (image, 0),
                Err(_) => {
                    error!("Processing frame {seq} panicked, passing it through");
                    (image, 0)
                }
            };

            let frame = ProcessedFrame { seq, image, faces };
            if !self.sender.push(frame) {
                debug!("Dropped frame {seq}");
            }
            seq += 1;
        }

        if panic::catch_unwind(AssertUnwindSafe(move || drop(source))).is_err() {
            error!("Frame source panicked while closing");
        }
        info!("Pipeline idle after {seq} frames");

        worker
    }

    // Composited copy of `image` and its face count, or `None` when the
    // frame goes out untouched.
    fn process(
        &self,
        oracle: &mut dyn LandmarkOracle,
        image: &RgbImage,
        seq: u64,
    ) -> Option<(RgbImage, usize)> {
        let faces = match oracle.detect(image) {
            Ok(faces) => faces,
            Err(e) => {
                warn!("Landmark detection failed: {e:?}");
                return None;
            }
        };

        if faces.is_empty() {
            trace!("No face in frame {seq}, passing through");
            return None;
        }

        let params = self.params.snapshot();
        let mut composited = image.clone();
        self.compositor
            .apply_to_faces(&mut composited, &faces, &params);
        Some((composited, faces.len()))
    }
}
