use anyhow::{Error, Result};
use facepaint::compositor::Compositor;
use facepaint::landmarks::{FixedLandmarks, LandmarkOracle, LandmarkSet};
use facepaint::params::{Bgr, MakeupParameter, ParameterStore};
use facepaint::pipeline::{
    FramePipeline, FrameReceiver, FrameSource, PipelineState, ProcessedFrame, SourceFactory,
};
use facepaint::regions::{MESH_LANDMARKS, MakeupKind};
use facepaint::shapes::point::Point;
use image::{Rgb, RgbImage};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const GRAY: Rgb<u8> = Rgb([90, 90, 90]);

/// Yields `limit` gray frames, then fails like an unplugged camera. `None`
/// never runs dry.
struct ScriptedSource {
    served: usize,
    limit: Option<usize>,
    delay: Duration,
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<RgbImage> {
        if self.limit.is_some_and(|limit| self.served >= limit) {
            return Err(Error::msg("device unplugged"));
        }
        self.served += 1;
        thread::sleep(self.delay);
        Ok(RgbImage::from_pixel(40, 40, GRAY))
    }
}

/// A detector that breaks on every frame, either by panicking or by
/// reporting an error.
struct BrokenOracle {
    panics: bool,
    calls: Arc<AtomicUsize>,
}

impl LandmarkOracle for BrokenOracle {
    fn detect(&mut self, _img: &RgbImage) -> Result<Vec<LandmarkSet>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panics {
            panic!("detector crashed");
        }
        Err(Error::msg("model returned garbage"))
    }
}

fn factory(limit: Option<usize>, delay: Duration, opens: Arc<AtomicUsize>) -> SourceFactory {
    Box::new(move || {
        opens.fetch_add(1, Ordering::SeqCst);
        let source: Box<dyn FrameSource> = Box::new(ScriptedSource {
            served: 0,
            limit,
            delay,
        });
        Ok(source)
    })
}

fn pipeline(
    open_source: SourceFactory,
    faces: Vec<LandmarkSet>,
    store: ParameterStore,
    capacity: usize,
) -> (FramePipeline, FrameReceiver) {
    FramePipeline::new(
        open_source,
        Box::new(FixedLandmarks::new(faces)),
        Arc::new(store),
        Arc::new(Compositor::default()),
        capacity,
    )
}

fn broken_pipeline(
    panics: bool,
    limit: usize,
) -> (FramePipeline, FrameReceiver, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let oracle = BrokenOracle {
        panics,
        calls: Arc::clone(&calls),
    };
    let (pipeline, frames) = FramePipeline::new(
        factory(Some(limit), Duration::ZERO, Arc::new(AtomicUsize::new(0))),
        Box::new(oracle),
        Arc::new(ParameterStore::with_defaults()),
        Arc::new(Compositor::default()),
        10,
    );
    (pipeline, frames, calls)
}

fn assert_raw(frames: &[ProcessedFrame], count: usize) {
    assert_eq!(frames.len(), count);
    for frame in frames {
        assert_eq!(frame.faces, 0);
        assert!(frame.image.pixels().all(|p| *p == GRAY));
    }
}

fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(2));
    }
}

/// Face oval as a circle of radius 15 around (20, 20).
fn face() -> LandmarkSet {
    let mut points = vec![Point::new(0, 0); MESH_LANDMARKS];
    let indices = MakeupKind::Foundation.config().subregions[0].landmark_indices();
    let n = indices.len() as f32;
    for (i, idx) in indices.into_iter().enumerate() {
        let t = i as f32 / n * std::f32::consts::TAU;
        points[idx] = Point::new(
            (20. + 15. * t.cos()).round() as i32,
            (20. + 15. * t.sin()).round() as i32,
        );
    }
    LandmarkSet::new(points)
}

#[test]
fn capture_failure_returns_to_idle() -> Result<()> {
    let opens = Arc::new(AtomicUsize::new(0));
    let (pipeline, frames) = pipeline(
        factory(Some(5), Duration::ZERO, Arc::clone(&opens)),
        Vec::new(),
        ParameterStore::with_defaults(),
        10,
    );

    pipeline.start()?;
    wait_until("idle", || pipeline.state() == PipelineState::Idle);

    let received: Vec<ProcessedFrame> = frames.drain();
    let seqs: Vec<u64> = received.iter().map(|f| f.seq).collect();
    assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
    for frame in &received {
        assert_eq!(frame.faces, 0);
        assert!(frame.image.pixels().all(|p| *p == GRAY));
    }

    // The source is reopened on restart
    pipeline.start()?;
    wait_until("second idle", || pipeline.state() == PipelineState::Idle);
    pipeline.stop();
    assert_eq!(opens.load(Ordering::SeqCst), 2);
    assert_eq!(frames.drain().len(), 5);
    Ok(())
}

#[test]
fn start_and_stop_are_idempotent() -> Result<()> {
    let opens = Arc::new(AtomicUsize::new(0));
    let (pipeline, frames) = pipeline(
        factory(None, Duration::from_millis(1), Arc::clone(&opens)),
        Vec::new(),
        ParameterStore::new(),
        4,
    );

    pipeline.stop();
    assert_eq!(pipeline.state(), PipelineState::Idle);

    pipeline.start()?;
    pipeline.start()?;
    assert_eq!(pipeline.state(), PipelineState::Running);
    assert_eq!(opens.load(Ordering::SeqCst), 1);

    wait_until("a frame", || !frames.is_empty());
    pipeline.stop();
    pipeline.stop();
    assert_eq!(pipeline.state(), PipelineState::Idle);

    pipeline.start()?;
    assert_eq!(opens.load(Ordering::SeqCst), 2);
    pipeline.stop();
    Ok(())
}

#[test]
fn slow_consumer_never_overfills_queue() -> Result<()> {
    let opens = Arc::new(AtomicUsize::new(0));
    let (pipeline, frames) = pipeline(
        factory(None, Duration::ZERO, opens),
        Vec::new(),
        ParameterStore::new(),
        3,
    );

    pipeline.start()?;
    wait_until("dropped frames", || pipeline.dropped() >= 5);
    assert!(frames.len() <= 3);
    pipeline.stop();

    // Oldest frames were kept, newer ones dropped
    let seqs: Vec<u64> = frames.drain().into_iter().map(|f| f.seq).collect();
    assert_eq!(seqs, vec![0, 1, 2]);
    Ok(())
}

#[test]
fn frames_are_delivered_once() -> Result<()> {
    let opens = Arc::new(AtomicUsize::new(0));
    let (pipeline, frames) = pipeline(
        factory(Some(50), Duration::ZERO, opens),
        Vec::new(),
        ParameterStore::new(),
        8,
    );

    pipeline.start()?;
    let mut seen = HashSet::new();
    let mut total = 0;
    while pipeline.state() != PipelineState::Idle || !frames.is_empty() {
        if let Some(frame) = frames.pop_timeout(Duration::from_millis(10)) {
            assert!(seen.insert(frame.seq), "frame {} delivered twice", frame.seq);
            total += 1;
        }
    }
    pipeline.stop();

    assert_eq!(total as u64 + pipeline.dropped(), 50);
    Ok(())
}

#[test]
fn faces_are_composited() -> Result<()> {
    let store = ParameterStore::new();
    store.set(
        MakeupKind::Foundation,
        MakeupParameter::new(Bgr::new(0, 0, 255), 1.),
    );

    let opens = Arc::new(AtomicUsize::new(0));
    let (pipeline, frames) = pipeline(
        factory(Some(3), Duration::ZERO, opens),
        vec![face()],
        store,
        10,
    );

    pipeline.start()?;
    wait_until("idle", || pipeline.state() == PipelineState::Idle);

    let received = frames.drain();
    assert_eq!(received.len(), 3);
    for frame in received {
        assert_eq!(frame.faces, 1);
        let center = frame.image.get_pixel(20, 20).0;
        assert!(center[0] >= 250 && center[1] <= 5 && center[2] <= 5, "{center:?}");
        assert_eq!(*frame.image.get_pixel(1, 1), GRAY);
    }

    // Edits reach the next frames without restarting
    pipeline
        .params()
        .set_intensity(MakeupKind::Foundation, 0.);
    pipeline.start()?;
    wait_until("idle", || pipeline.state() == PipelineState::Idle);
    for frame in frames.drain() {
        assert!(frame.image.pixels().all(|p| *p == GRAY));
    }
    Ok(())
}

#[test]
fn detection_errors_pass_frames_through() -> Result<()> {
    let (pipeline, frames, calls) = broken_pipeline(false, 4);

    pipeline.start()?;
    wait_until("idle", || pipeline.state() == PipelineState::Idle);

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_raw(&frames.drain(), 4);
    Ok(())
}

#[test]
fn detector_panic_leaves_pipeline_restartable() -> Result<()> {
    let (pipeline, frames, calls) = broken_pipeline(true, 3);

    pipeline.start()?;
    wait_until("idle", || pipeline.state() == PipelineState::Idle);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_raw(&frames.drain(), 3);

    // Nothing was lost with the panics
    pipeline.start()?;
    wait_until("second idle", || pipeline.state() == PipelineState::Idle);
    pipeline.stop();
    assert_eq!(calls.load(Ordering::SeqCst), 6);
    assert_raw(&frames.drain(), 3);

    pipeline.start()?;
    pipeline.stop();
    assert_eq!(pipeline.state(), PipelineState::Idle);
    Ok(())
}

#[test]
fn source_panic_ends_capture_cleanly() -> Result<()> {
    struct PanickingSource(usize);

    impl FrameSource for PanickingSource {
        fn next_frame(&mut self) -> Result<RgbImage> {
            if self.0 == 0 {
                panic!("driver crashed");
            }
            self.0 -= 1;
            Ok(RgbImage::from_pixel(40, 40, GRAY))
        }
    }

    let opens = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&opens);
    let open_source: SourceFactory = Box::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        let source: Box<dyn FrameSource> = Box::new(PanickingSource(2));
        Ok(source)
    });
    let (pipeline, frames) = pipeline(open_source, Vec::new(), ParameterStore::new(), 10);

    pipeline.start()?;
    wait_until("idle", || pipeline.state() == PipelineState::Idle);
    assert_raw(&frames.drain(), 2);

    pipeline.start()?;
    wait_until("second idle", || pipeline.state() == PipelineState::Idle);
    pipeline.stop();
    assert_eq!(opens.load(Ordering::SeqCst), 2);
    assert_raw(&frames.drain(), 2);
    Ok(())
}
