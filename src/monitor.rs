//! Single-writer task that owns the session's `VitalsMonitor`.
//!
//! Frame ingestion and the interval flush both mutate the same aggregator, so
//! they run inside one task: handlers send commands over a bounded channel and
//! the flush timer ticks in the same `select!`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use vital_signs_wasm::{
    EngineConfig, FatigueReading, FlushReport, FrameInput, FrameReport, IntervalStats,
    RateEstimate, VitalsMonitor,
};

const FLUSH_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("monitor task is not running")]
    Closed,
    #[error("monitor command queue is full")]
    Busy,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlushEvent {
    pub session_id: String,
    #[serde(flatten)]
    pub report: FlushReport,
    pub flushed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FramesOutcome {
    pub processed: usize,
    pub last: Option<FrameReport>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalsSnapshot {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub frames_processed: u64,
    pub face_frames: u64,
    pub fps: f64,
    pub estimate: RateEstimate,
    pub fatigue: FatigueReading,
    pub displayed_rate: Option<u32>,
    pub has_displayed_rate: bool,
    pub interval: IntervalStats,
    /// Fraction of the current measurement interval elapsed (0.0 - 1.0).
    pub interval_progress: f64,
    pub last_flush: Option<FlushEvent>,
}

enum Command {
    Frames {
        frames: Vec<FrameInput>,
        reply: oneshot::Sender<FramesOutcome>,
    },
    Snapshot {
        reply: oneshot::Sender<VitalsSnapshot>,
    },
    Flush {
        reply: oneshot::Sender<FlushEvent>,
    },
    Reset {
        reply: oneshot::Sender<String>,
    },
}

#[derive(Clone)]
pub struct MonitorHandle {
    tx: mpsc::Sender<Command>,
    flush_tx: broadcast::Sender<FlushEvent>,
    config: EngineConfig,
}

impl MonitorHandle {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Receives every interval flush from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<FlushEvent> {
        self.flush_tx.subscribe()
    }

    pub async fn process_frames(
        &self,
        frames: Vec<FrameInput>,
    ) -> Result<FramesOutcome, MonitorError> {
        self.request(|reply| Command::Frames { frames, reply }).await
    }

    pub async fn snapshot(&self) -> Result<VitalsSnapshot, MonitorError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Ends the current interval immediately and restarts the interval timer.
    pub async fn flush_now(&self) -> Result<FlushEvent, MonitorError> {
        self.request(|reply| Command::Flush { reply }).await
    }

    /// Starts a new session; returns the new session id.
    pub async fn reset(&self) -> Result<String, MonitorError> {
        self.request(|reply| Command::Reset { reply }).await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, MonitorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx.try_send(build(reply_tx)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => MonitorError::Busy,
            mpsc::error::TrySendError::Closed(_) => MonitorError::Closed,
        })?;
        reply_rx.await.map_err(|_| MonitorError::Closed)
    }
}

struct MonitorActor {
    monitor: VitalsMonitor,
    session_id: String,
    started_at: DateTime<Utc>,
    interval: Duration,
    interval_started: Instant,
    last_frame_ms: f64,
    last_flush: Option<FlushEvent>,
    flush_tx: broadcast::Sender<FlushEvent>,
}

impl MonitorActor {
    fn new(config: EngineConfig, flush_tx: broadcast::Sender<FlushEvent>) -> Self {
        let interval = Duration::from_millis(config.aggregation.interval_ms.max(1));
        Self {
            monitor: VitalsMonitor::with_config(config),
            session_id: new_session_id(),
            started_at: Utc::now(),
            interval,
            interval_started: Instant::now(),
            last_frame_ms: 0.0,
            last_flush: None,
            flush_tx,
        }
    }

    /// Returns true when the interval clock must restart.
    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Frames { frames, reply } => {
                let outcome = self.process_frames(frames);
                let _ = reply.send(outcome);
                false
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
                false
            }
            Command::Flush { reply } => {
                let event = self.flush_interval();
                let _ = reply.send(event);
                true
            }
            Command::Reset { reply } => {
                self.reset();
                let _ = reply.send(self.session_id.clone());
                true
            }
        }
    }

    fn process_frames(&mut self, frames: Vec<FrameInput>) -> FramesOutcome {
        let processed = frames.len();
        let mut last = None;
        for frame in frames {
            let was_calibrated = self.monitor.fatigue().calibrated;
            let report = self.monitor.process_frame(frame);
            self.last_frame_ms = self.last_frame_ms.max(frame.timestamp_ms);
            if report.fatigue.calibrated && !was_calibrated {
                tracing::info!(session_id = %self.session_id, "eye-openness baseline calibrated");
            }
            last = Some(report);
        }
        FramesOutcome { processed, last }
    }

    fn flush_interval(&mut self) -> FlushEvent {
        let report = self.monitor.flush_at(self.last_frame_ms);
        self.interval_started = Instant::now();

        let event = FlushEvent {
            session_id: self.session_id.clone(),
            report,
            flushed_at: Utc::now(),
        };

        tracing::info!(
            session_id = %self.session_id,
            resolution = ?report.resolution,
            displayed_rate = report.displayed_rate,
            samples = report.stats.total,
            high = report.stats.high,
            "measurement interval resolved"
        );

        // 没有订阅者时 send 返回错误，属于正常情况
        let _ = self.flush_tx.send(event.clone());
        self.last_flush = Some(event.clone());
        event
    }

    fn snapshot(&self) -> VitalsSnapshot {
        let progress =
            (self.interval_started.elapsed().as_secs_f64() / self.interval.as_secs_f64()).min(1.0);
        let displayed_rate = self.monitor.displayed_rate();
        VitalsSnapshot {
            session_id: self.session_id.clone(),
            started_at: self.started_at,
            frames_processed: self.monitor.frames_processed(),
            face_frames: self.monitor.face_frames(),
            fps: self.monitor.fps(),
            estimate: self.monitor.last_estimate(),
            fatigue: self.monitor.fatigue(),
            displayed_rate,
            has_displayed_rate: displayed_rate.is_some(),
            interval: self.monitor.interval_stats(),
            interval_progress: progress,
            last_flush: self.last_flush.clone(),
        }
    }

    fn reset(&mut self) {
        let previous = std::mem::replace(&mut self.session_id, new_session_id());
        self.monitor.reset();
        self.started_at = Utc::now();
        self.interval_started = Instant::now();
        self.last_frame_ms = 0.0;
        self.last_flush = None;
        tracing::info!(previous = %previous, session_id = %self.session_id, "session reset");
    }
}

fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Spawns the monitor task. The task exits on shutdown or when every handle
/// has been dropped.
pub fn spawn_monitor(
    config: EngineConfig,
    queue_capacity: usize,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> (MonitorHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel(queue_capacity.max(1));
    let (flush_tx, _) = broadcast::channel(FLUSH_CHANNEL_CAPACITY);
    let handle = MonitorHandle {
        tx,
        flush_tx: flush_tx.clone(),
        config: config.clone(),
    };

    let mut actor = MonitorActor::new(config, flush_tx);
    let task = tokio::spawn(async move {
        let period = actor.interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            session_id = %actor.session_id,
            interval_ms = period.as_millis() as u64,
            "monitor task started"
        );

        loop {
            tokio::select! {
                command = rx.recv() => {
                    let Some(command) = command else { break };
                    if actor.handle(command) {
                        ticker.reset();
                    }
                }
                _ = ticker.tick() => {
                    actor.flush_interval();
                }
                _ = shutdown_rx.recv() => {
                    break;
                }
            }
        }

        tracing::info!(session_id = %actor.session_id, "monitor task stopped");
    });

    (handle, task)
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use vital_signs_wasm::Resolution;

    use super::*;

    fn test_config(interval_ms: u64) -> EngineConfig {
        let mut config = EngineConfig::default();
        config.aggregation.interval_ms = interval_ms;
        config
    }

    fn pulse_frames(count: usize) -> Vec<FrameInput> {
        (0..count)
            .map(|i| FrameInput {
                timestamp_ms: i as f64 * 1000.0 / 30.0,
                face_detected: true,
                brightness: Some(120.0 + 2.0 * (2.0 * PI * i as f64 / 24.0).sin()),
                eye_ratio: Some(0.3),
            })
            .collect()
    }

    #[tokio::test]
    async fn processes_frames_in_order() {
        let (shutdown_tx, _) = broadcast::channel(1);
        let (handle, _task) = spawn_monitor(test_config(60_000), 16, shutdown_tx.subscribe());

        let outcome = handle.process_frames(pulse_frames(100)).await.unwrap();
        assert_eq!(outcome.processed, 100);
        let last = outcome.last.unwrap();
        assert!(last.estimate.is_reading());

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.frames_processed, 100);
        assert_eq!(snapshot.face_frames, 100);
        assert!(snapshot.fatigue.calibrated);
    }

    #[tokio::test]
    async fn manual_flush_broadcasts_event() {
        let (shutdown_tx, _) = broadcast::channel(1);
        let (handle, _task) = spawn_monitor(test_config(60_000), 16, shutdown_tx.subscribe());
        let mut events = handle.subscribe();

        handle.process_frames(pulse_frames(300)).await.unwrap();
        let flushed = handle.flush_now().await.unwrap();
        let rate = flushed.report.displayed_rate.unwrap();
        assert!((72..=78).contains(&rate), "rate = {rate}");

        let received = events.recv().await.unwrap();
        assert_eq!(received.session_id, flushed.session_id);
        assert_eq!(received.report.displayed_rate, Some(rate));

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.interval.total, 0);
        assert!(snapshot.last_flush.is_some());
    }

    #[tokio::test]
    async fn timer_flushes_without_frames() {
        let (shutdown_tx, _) = broadcast::channel(1);
        let (handle, _task) = spawn_monitor(test_config(50), 16, shutdown_tx.subscribe());
        let mut events = handle.subscribe();

        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("flush within timeout")
            .unwrap();
        assert_eq!(event.report.resolution, Resolution::Unchanged);
        assert_eq!(event.report.displayed_rate, None);
    }

    #[tokio::test]
    async fn reset_starts_new_session() {
        let (shutdown_tx, _) = broadcast::channel(1);
        let (handle, _task) = spawn_monitor(test_config(60_000), 16, shutdown_tx.subscribe());

        handle.process_frames(pulse_frames(10)).await.unwrap();
        let before = handle.snapshot().await.unwrap().session_id;
        let after = handle.reset().await.unwrap();
        assert_ne!(before, after);

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.session_id, after);
        assert_eq!(snapshot.frames_processed, 0);
    }

    #[tokio::test]
    async fn shutdown_closes_handle() {
        let (shutdown_tx, _) = broadcast::channel(1);
        let (handle, task) = spawn_monitor(test_config(60_000), 16, shutdown_tx.subscribe());

        shutdown_tx.send(()).unwrap();
        task.await.unwrap();

        assert!(!handle.is_running());
        assert!(matches!(handle.snapshot().await, Err(MonitorError::Closed)));
    }
}
