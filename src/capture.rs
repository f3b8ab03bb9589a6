//! Async capture loop driving the background worker

use std::error::Error;
use std::time::{Duration, Instant};

use hidapi::HidApi;
use sayo_device::{
    query_screen_size, CaptureError, CaptureEvent, CaptureOutcome, CaptureStats, CaptureWorker,
};
use sayo_protocol::{DeviceIdentity, ProtocolConstants};
use tokio::sync::mpsc::unbounded_channel;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::CaptureConfig;
use crate::detection::open_channel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connected,
    Reconnecting,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Reconnecting => "reconnecting",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// Exit after this many frames
    pub frames: Option<u64>,
    pub reconnect: bool,
    pub retry: Duration,
    pub stats_interval: Duration,
}

impl From<&CaptureConfig> for CaptureOptions {
    fn from(c: &CaptureConfig) -> Self {
        Self {
            frames: None,
            reconnect: c.reconnect,
            retry: c.retry,
            stats_interval: c.stats_interval,
        }
    }
}

/// Why a connected session ended
enum Exit {
    /// Interrupted or the frame limit was reached
    Done,
    Disconnected(CaptureError),
}

/// Rolling frame rate over one stats interval
#[derive(Debug)]
pub struct StatsWindow {
    start: Instant,
    frames: u32,
    partial: u32,
}

impl StatsWindow {
    pub fn new(now: Instant) -> Self {
        Self {
            start: now,
            frames: 0,
            partial: 0,
        }
    }

    pub fn record(&mut self, complete: bool) {
        self.frames += 1;
        if !complete {
            self.partial += 1;
        }
    }

    /// Summarize the window and start a new one. Returns nothing if no frame
    /// arrived since the last flush. A window with no elapsed time is kept
    /// open so its frames count towards the next flush.
    pub fn flush(&mut self, now: Instant, last: &CaptureStats) -> Option<String> {
        let secs = now.saturating_duration_since(self.start).as_secs_f64();
        if secs <= 0.0 {
            return None;
        }
        let (frames, partial) = (self.frames, self.partial);
        *self = Self::new(now);
        if frames == 0 {
            return None;
        }

        let fps = (frames as f64 / secs).round() as u32;
        let mut line = format!(
            "{fps} fps, last={}ms, packets={}, bytes={}/{}",
            last.elapsed.as_millis(),
            last.packets,
            last.bytes_covered,
            last.expected
        );
        if partial > 0 {
            line.push_str(&format!(", partial={partial}"));
        }
        Some(line)
    }
}

/// Install a single Ctrl-C listener for the whole run. The flag stays set
/// once raised, so an interrupt during blocking device calls is not lost.
fn interrupt_listener() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = tx.send(true);
            },
            Err(e) => warn!("failed to listen for ctrl-c: {e}"),
        }
    });
    rx
}

/// Resolves once an interrupt was raised. Never resolves if the listener
/// went away without one.
async fn interrupted(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Capture until interrupted, optionally reconnecting after failures
pub async fn run(
    identity: DeviceIdentity,
    proto: ProtocolConstants,
    options: CaptureOptions,
) -> Result<(), Box<dyn Error>> {
    let mut stop = interrupt_listener();
    let mut api = HidApi::new()?;
    let mut status = ConnectionStatus::Disconnected;
    let mut frames = 0u64;

    loop {
        let err: Box<dyn Error> =
            match run_connected(
                &mut api,
                &identity,
                &proto,
                &options,
                &mut stop,
                &mut status,
                &mut frames,
            )
            .await
            {
                Ok(Exit::Done) => return Ok(()),
                Ok(Exit::Disconnected(e)) => e.into(),
                Err(e) => e,
            };

        // a bad screen size will not fix itself
        let terminal = matches!(
            err.downcast_ref::<CaptureError>(),
            Some(CaptureError::InvalidDimensions { .. })
        );
        if !options.reconnect || terminal {
            return Err(err);
        }

        if status == ConnectionStatus::Reconnecting {
            debug!("still waiting for device: {err}");
        } else {
            warn!("{err}");
            status = ConnectionStatus::Reconnecting;
            info!(
                "{}, retrying every {}",
                status.as_str(),
                humantime::format_duration(options.retry)
            );
        }

        tokio::select! {
            _ = interrupted(&mut stop) => return Ok(()),
            _ = tokio::time::sleep(options.retry) => {}
        }
    }
}

async fn run_connected(
    api: &mut HidApi,
    identity: &DeviceIdentity,
    proto: &ProtocolConstants,
    options: &CaptureOptions,
    stop: &mut watch::Receiver<bool>,
    status: &mut ConnectionStatus,
    frames: &mut u64,
) -> Result<Exit, Box<dyn Error>> {
    api.refresh_devices()?;
    let mut channel = open_channel(api, identity)?;
    let size = query_screen_size(&mut channel, proto)?
        .ok_or("opened device, but screen size query timed out")?;
    *status = ConnectionStatus::Connected;
    info!("{}: screen size {size}", status.as_str());
    if *stop.borrow() {
        return Ok(Exit::Done);
    }

    let (tx, mut rx) = unbounded_channel();
    let worker = CaptureWorker::spawn(channel, size, proto.clone(), tx)?;
    let mut stats_interval = tokio::time::interval(options.stats_interval);
    stats_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut window = StatsWindow::new(Instant::now());

    loop {
        tokio::select! {
            _ = interrupted(stop) => {
                info!("interrupted, stopping capture");
                worker.stop();
                return Ok(Exit::Done);
            }
            event = rx.recv() => match event {
                Some(CaptureEvent::Frame { sequence, outcome }) => {
                    window.record(matches!(outcome, CaptureOutcome::Complete(_)));
                    *frames += 1;
                    if options.frames.is_some_and(|limit| *frames >= limit) {
                        info!("captured {} frames, last sequence {sequence}", *frames);
                        worker.stop();
                        return Ok(Exit::Done);
                    }
                }
                Some(CaptureEvent::NoData(stats)) => {
                    debug!("no screen data after {}ms", stats.elapsed.as_millis());
                }
                Some(CaptureEvent::Disconnected(e)) => {
                    warn!("device {}", ConnectionStatus::Disconnected.as_str());
                    return Ok(Exit::Disconnected(e));
                }
                // the thread only exits silently after being stopped
                None => return Ok(Exit::Done),
            },
            _ = stats_interval.tick() => {
                let last = worker.with_latest(|l| l.stats);
                if let Some(line) = window.flush(Instant::now(), &last) {
                    info!("{line}");
                }
            }
        }
    }
}
