//! Background capture thread.
//!
//! The worker owns the transport for its whole life. Finished frames are
//! swapped into a shared slot; the lock is only held for the swap, so a slow
//! consumer never stalls a capture cycle.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use sayo_protocol::{FrameBuffer, ProtocolConstants};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::error::CaptureError;
use crate::query::ScreenSize;
use crate::session::{CaptureOutcome, CaptureSession, CaptureStats};
use crate::transport::Transport;

/// Pause after a cycle that produced nothing
const NO_DATA_BACKOFF: Duration = Duration::from_millis(5);

/// Most recently published frame
#[derive(Debug, Clone, Default)]
pub struct LatestFrame {
    pub frame: FrameBuffer,
    pub stats: CaptureStats,
    /// False when the frame was published from a partial capture
    pub complete: bool,
    /// Increments with every published frame, 0 before the first
    pub sequence: u64,
}

/// Events emitted by the capture thread
#[derive(Debug)]
pub enum CaptureEvent {
    /// A frame was published to the shared slot
    Frame { sequence: u64, outcome: CaptureOutcome },
    /// A cycle timed out without any data
    NoData(CaptureStats),
    /// The device went away. The channel is already closed and the thread
    /// has exited.
    Disconnected(CaptureError),
}

struct Shared {
    stop: AtomicBool,
    latest: Mutex<LatestFrame>,
}

impl Shared {
    fn latest(&self) -> MutexGuard<'_, LatestFrame> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to a running capture thread. Dropping it stops and joins the
/// thread.
pub struct CaptureWorker {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
    size: ScreenSize,
}

impl CaptureWorker {
    /// Move `transport` into a new capture thread
    pub fn spawn<T>(
        transport: T,
        size: ScreenSize,
        proto: ProtocolConstants,
        events: UnboundedSender<CaptureEvent>,
    ) -> io::Result<Self>
    where
        T: Transport + Send + 'static,
    {
        let shared = Arc::new(Shared {
            stop: AtomicBool::new(false),
            latest: Mutex::new(LatestFrame {
                frame: FrameBuffer::new(size.width, size.height),
                ..Default::default()
            }),
        });

        let session = CaptureSession::new(transport, proto);
        let thread_shared = shared.clone();
        let thread = std::thread::Builder::new()
            .name("sayo-capture".into())
            .spawn(move || capture_loop(session, size, &thread_shared, &events))?;

        Ok(Self {
            shared,
            thread: Some(thread),
            size,
        })
    }

    pub fn size(&self) -> ScreenSize {
        self.size
    }

    /// Copy out the latest published frame, if any
    pub fn latest(&self) -> Option<LatestFrame> {
        let latest = self.shared.latest();
        (latest.sequence > 0).then(|| latest.clone())
    }

    /// Borrow the latest frame without copying. Keep `f` short, capture
    /// waits on it to publish.
    pub fn with_latest<R>(&self, f: impl FnOnce(&LatestFrame) -> R) -> R {
        f(&self.shared.latest())
    }

    /// Ask the thread to stop after its current read
    pub fn request_stop(&self) {
        self.shared.stop.store(true, Ordering::Relaxed);
    }

    /// The thread has exited, either stopped or disconnected
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(|t| t.is_finished())
    }

    /// Stop and wait for the thread to exit
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.request_stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("capture thread panicked");
            }
        }
    }
}

impl Drop for CaptureWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn capture_loop<T: Transport>(
    mut session: CaptureSession<T>,
    size: ScreenSize,
    shared: &Shared,
    events: &UnboundedSender<CaptureEvent>,
) {
    debug!("capture thread started for {size} screen");
    let mut frame = FrameBuffer::new(size.width, size.height);
    let mut sequence = 0u64;

    while !shared.stop.load(Ordering::Relaxed) {
        match session.capture(&mut frame, Some(&shared.stop)) {
            Ok(outcome) if outcome.has_frame() => {
                sequence += 1;
                {
                    let mut latest = shared.latest();
                    std::mem::swap(&mut latest.frame, &mut frame);
                    latest.stats = *outcome.stats();
                    latest.complete = matches!(outcome, CaptureOutcome::Complete(_));
                    latest.sequence = sequence;
                }
                let _ = events.send(CaptureEvent::Frame { sequence, outcome });
            },
            Ok(outcome) => {
                let _ = events.send(CaptureEvent::NoData(*outcome.stats()));
                std::thread::sleep(NO_DATA_BACKOFF);
            },
            Err(e) => {
                warn!("capture failed: {e}");
                shared.stop.store(true, Ordering::Relaxed);
                // close the device before anyone hears about it
                drop(session);
                let _ = events.send(CaptureEvent::Disconnected(e));
                return;
            },
        }
    }
    debug!("capture thread stopped after {sequence} frames");
}
