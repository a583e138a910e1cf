use flume::{Receiver, RecvTimeoutError, Sender, TrySendError};
use image::RgbImage;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::trace;

/// A frame ready for display.
#[derive(Debug, Clone)]
pub struct ProcessedFrame {
    /// Capture order, starting at 0 for each run of the producer.
    pub seq: u64,
    pub image: RgbImage,
    /// Faces composited into `image`. 0 means the frame passed through raw.
    pub faces: usize,
}

/// Bounded hand-off between the producer and the display consumer. Pushing
/// never blocks: when the queue is full the frame being pushed is dropped.
pub fn frame_queue(capacity: usize) -> (FrameSender, FrameReceiver) {
    // flume treats 0 as a rendezvous channel, which would drop everything
    let (tx, rx) = flume::bounded(capacity.max(1));
    let sender = FrameSender {
        tx,
        dropped: Arc::new(AtomicU64::new(0)),
    };

    (sender, FrameReceiver { rx })
}

#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: Sender<ProcessedFrame>,
    dropped: Arc<AtomicU64>,
}

impl FrameSender {
    /// Returns false if the frame was dropped.
    pub fn push(&self, frame: ProcessedFrame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) => {
                trace!("Queue full, dropping frame {}", frame.seq);
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Disconnected(frame)) => {
                trace!("No consumer, dropping frame {}", frame.seq);
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Frames dropped since the queue was created.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(usize::MAX)
    }
}

#[derive(Debug, Clone)]
pub struct FrameReceiver {
    rx: Receiver<ProcessedFrame>,
}

impl FrameReceiver {
    pub fn try_pop(&self) -> Option<ProcessedFrame> {
        self.rx.try_recv().ok()
    }

    /// Waits up to `timeout` for a frame. `None` on timeout, or once every
    /// sender is gone and the queue has drained.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<ProcessedFrame> {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Some(frame),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Everything currently queued, oldest first.
    pub fn drain(&self) -> Vec<ProcessedFrame> {
        self.rx.drain().collect()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(seq: u64) -> ProcessedFrame {
        ProcessedFrame {
            seq,
            image: RgbImage::new(2, 2),
            faces: 0,
        }
    }

    #[test]
    fn test_drops_newest_when_full() {
        let (tx, rx) = frame_queue(3);
        let pushed: Vec<bool> = (0..5).map(|seq| tx.push(frame(seq))).collect();

        assert_eq!(pushed, vec![true, true, true, false, false]);
        assert_eq!(tx.dropped(), 2);
        assert_eq!(rx.len(), 3);

        let seqs: Vec<u64> = rx.drain().into_iter().map(|f| f.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert!(rx.try_pop().is_none());
    }

    #[test]
    fn test_zero_capacity_still_buffers() {
        let (tx, rx) = frame_queue(0);
        assert_eq!(tx.capacity(), 1);
        assert!(tx.push(frame(0)));
        assert_eq!(rx.try_pop().map(|f| f.seq), Some(0));
    }

    #[test]
    fn test_push_without_consumer() {
        let (tx, rx) = frame_queue(2);
        drop(rx);
        assert!(!tx.push(frame(0)));
        assert_eq!(tx.dropped(), 1);
    }
}
