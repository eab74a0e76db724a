//! BakeQueue - one job per bake tick
//!
//! Jobs are detached recording snapshots. The queue owns its repeating timer
//! registration: it is registered by `begin` and cancelled once every job has
//! been processed (or on `clear`). While an external context is active the
//! queue only polls and bakes nothing.
//!
//! A job is released as soon as it has been handled, so a long session does
//! not keep baked snapshots alive. Progress is tracked by two counters that
//! cover the current run and reset when the next run starts.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use contracts::{
    is_valid_asset_path, AssetHandle, AssetSink, BakeStatus, RecordingSnapshot, Scheduler,
    TimerHandle, DEFAULT_ASSET_PATH,
};
use tracing::{error, info, instrument, warn};

use crate::error::BakeError;
use crate::metrics::BakeMetrics;
use crate::resample::Resampler;

pub const DEFAULT_BAKE_INTERVAL: Duration = Duration::from_millis(200);

/// A pending bake
#[derive(Debug, Clone)]
pub struct BakeJob {
    pub snapshot: RecordingSnapshot,
    pub asset_name: String,
}

/// Result of one bake tick
#[derive(Debug)]
pub enum BakeOutcome {
    /// External context still active; nothing processed
    Deferred,
    Baked {
        job: String,
        handle: AssetHandle,
    },
    /// Job rejected before resampling; not retried
    Skipped {
        job: String,
        error: BakeError,
    },
    /// Sink refused the asset; not retried
    Failed {
        job: String,
        error: BakeError,
    },
}

impl BakeOutcome {
    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Deferred => "deferred",
            Self::Baked { .. } => "baked",
            Self::Skipped { .. } => "skipped",
            Self::Failed { .. } => "failed",
        }
    }
}

/// FIFO of pending bake jobs
#[derive(Debug)]
pub struct BakeQueue {
    jobs: VecDeque<BakeJob>,
    /// Jobs handled in the current run
    done: usize,
    /// Jobs enqueued in the current run
    total: usize,
    resampler: Resampler,
    asset_path: String,
    interval: Duration,
    timer: Option<TimerHandle>,
    is_baking: bool,
    awaiting_external_context_end: bool,
    metrics: BakeMetrics,
}

impl Default for BakeQueue {
    fn default() -> Self {
        Self::new(30, DEFAULT_ASSET_PATH)
    }
}

impl BakeQueue {
    pub fn new(export_fps: u32, asset_path: impl Into<String>) -> Self {
        Self {
            jobs: VecDeque::new(),
            done: 0,
            total: 0,
            resampler: Resampler::new(export_fps),
            asset_path: asset_path.into(),
            interval: DEFAULT_BAKE_INTERVAL,
            timer: None,
            is_baking: false,
            awaiting_external_context_end: false,
            metrics: BakeMetrics::new(),
        }
    }

    // ===== Configuration =====

    /// Clamped to `[1, 240]`
    pub fn set_export_fps(&mut self, export_fps: u32) {
        self.resampler = Resampler::new(export_fps);
    }

    pub fn export_fps(&self) -> u32 {
        self.resampler.export_fps()
    }

    /// Stored as given; an invalid path falls back to the default at bake time
    pub fn set_asset_path(&mut self, asset_path: impl Into<String>) {
        self.asset_path = asset_path.into();
    }

    pub fn asset_path(&self) -> &str {
        &self.asset_path
    }

    /// Zero intervals are replaced by the default
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = if interval.is_zero() {
            DEFAULT_BAKE_INTERVAL
        } else {
            interval
        };
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    // ===== Jobs =====

    pub fn enqueue(&mut self, snapshot: RecordingSnapshot, asset_name: impl Into<String>) {
        let asset_name = asset_name.into();
        info!(
            job = %asset_name,
            frames = snapshot.frames.len(),
            start_sample = snapshot.start_sample_index,
            "bake job queued"
        );
        if !self.is_baking && self.jobs.is_empty() {
            // previous run fully drained
            self.done = 0;
            self.total = 0;
        }
        self.jobs.push_back(BakeJob {
            snapshot,
            asset_name,
        });
        self.total += 1;
        self.metrics.set_pending(self.pending());
    }

    pub fn pending(&self) -> usize {
        self.jobs.len()
    }

    /// Jobs not yet handled
    pub fn jobs(&self) -> &VecDeque<BakeJob> {
        &self.jobs
    }

    pub fn metrics(&self) -> &BakeMetrics {
        &self.metrics
    }

    pub fn timer(&self) -> Option<TimerHandle> {
        self.timer
    }

    pub fn is_baking(&self) -> bool {
        self.is_baking
    }

    pub fn status(&self) -> BakeStatus {
        BakeStatus {
            jobs_done: self.done,
            total_jobs: self.total,
            current_job_name: self
                .jobs
                .front()
                .map(|j| j.asset_name.clone())
                .unwrap_or_default(),
            is_baking: self.is_baking,
            awaiting_external_context_end: self.awaiting_external_context_end,
        }
    }

    /// Start baking if there is work
    ///
    /// Registers the bake timer once. With an active external context the
    /// queue waits; the flag is re-checked on every tick.
    #[instrument(name = "bake_queue_begin", skip(self, scheduler), fields(pending = self.pending()))]
    pub fn begin<S: Scheduler + ?Sized>(&mut self, scheduler: &mut S, external_context_active: bool) -> bool {
        if self.pending() == 0 {
            return false;
        }
        if self.timer.is_none() {
            self.timer = Some(scheduler.schedule_repeating(self.interval));
        }
        self.is_baking = true;
        self.awaiting_external_context_end = external_context_active;
        if external_context_active {
            info!("bake deferred until the external context ends");
        }
        true
    }

    /// Process at most one job
    ///
    /// Returns `None` when the queue is not baking. Once the last job has
    /// been handled the sink is flushed and the timer cancelled.
    #[instrument(
        name = "bake_queue_tick",
        skip(self, scheduler, sink),
        fields(done = self.done, total = self.total)
    )]
    pub async fn tick<S, K>(
        &mut self,
        scheduler: &mut S,
        external_context_active: bool,
        sink: &mut K,
    ) -> Option<BakeOutcome>
    where
        S: Scheduler + ?Sized,
        K: AssetSink,
    {
        if !self.is_baking {
            return None;
        }

        if self.awaiting_external_context_end {
            if external_context_active {
                return Some(BakeOutcome::Deferred);
            }
            self.awaiting_external_context_end = false;
            info!("external context ended, baking");
        }

        let Some(job) = self.jobs.pop_front() else {
            self.finish(scheduler, sink).await;
            return None;
        };
        self.done += 1;

        let started = Instant::now();
        let outcome = Self::process(&self.resampler, &self.asset_path, &job, sink).await;
        observability::record_bake_duration_ms(started.elapsed().as_secs_f64() * 1000.0);
        observability::record_bake_job(sink.name(), outcome.label());
        match outcome {
            BakeOutcome::Baked { .. } => self.metrics.inc_baked(),
            BakeOutcome::Skipped { .. } => self.metrics.inc_skipped(),
            BakeOutcome::Failed { .. } => self.metrics.inc_failure(),
            BakeOutcome::Deferred => {}
        }
        self.metrics.set_pending(self.pending());

        if self.pending() == 0 {
            self.finish(scheduler, sink).await;
        }
        Some(outcome)
    }

    async fn process<K: AssetSink>(
        resampler: &Resampler,
        asset_path: &str,
        job: &BakeJob,
        sink: &mut K,
    ) -> BakeOutcome {
        let name = job.asset_name.clone();
        let path = if is_valid_asset_path(asset_path) {
            asset_path
        } else {
            error!(
                asset_path = %asset_path,
                fallback = DEFAULT_ASSET_PATH,
                "invalid asset path, using default"
            );
            DEFAULT_ASSET_PATH
        };

        let asset = match resampler.bake(&job.snapshot, &name, path) {
            Ok(asset) => asset,
            Err(error) => {
                warn!(job = %name, error = %error, "bake job skipped");
                return BakeOutcome::Skipped { job: name, error };
            }
        };

        match sink.commit(&asset).await {
            Ok(handle) => {
                info!(
                    job = %name,
                    location = %handle.location,
                    frames = asset.frame_count,
                    fps = asset.frame_rate,
                    "bake succeeded"
                );
                BakeOutcome::Baked { job: name, handle }
            }
            Err(e) => {
                error!(job = %name, error = %e, "bake commit failed");
                BakeOutcome::Failed {
                    job: name,
                    error: e.into(),
                }
            }
        }
    }

    async fn finish<S, K>(&mut self, scheduler: &mut S, sink: &mut K)
    where
        S: Scheduler + ?Sized,
        K: AssetSink,
    {
        if let Err(e) = sink.flush().await {
            error!(sink = %sink.name(), error = %e, "sink flush failed");
        }
        if let Some(handle) = self.timer.take() {
            scheduler.cancel(handle);
        }
        self.is_baking = false;
        self.awaiting_external_context_end = false;
        self.jobs.shrink_to_fit();
        info!(
            jobs = self.total,
            baked = self.metrics.baked_count(),
            skipped = self.metrics.skipped_count(),
            failed = self.metrics.failure_count(),
            "bake queue drained"
        );
    }

    /// Drop every job and cancel the timer
    pub fn clear<S: Scheduler + ?Sized>(&mut self, scheduler: &mut S) {
        self.jobs.clear();
        self.jobs.shrink_to_fit();
        self.done = 0;
        self.total = 0;
        self.is_baking = false;
        self.awaiting_external_context_end = false;
        if let Some(handle) = self.timer.take() {
            scheduler.cancel(handle);
        }
        self.metrics.set_pending(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::LogSink;
    use contracts::{
        BakedAnimation, BaselinePolicy, CaptureMode, ContractError, Frame, SkeletonDescriptor,
    };
    use nalgebra::{UnitQuaternion, Vector3};
    use std::collections::HashSet;

    #[derive(Default)]
    struct TestScheduler {
        next: u64,
        active: HashSet<TimerHandle>,
        registrations: usize,
    }

    impl Scheduler for TestScheduler {
        fn schedule_repeating(&mut self, _interval: Duration) -> TimerHandle {
            self.next += 1;
            self.registrations += 1;
            self.active.insert(TimerHandle(self.next));
            TimerHandle(self.next)
        }

        fn cancel(&mut self, handle: TimerHandle) {
            self.active.remove(&handle);
        }
    }

    /// Records commits; fails any asset whose name starts with "fail"
    #[derive(Default)]
    struct RecordingSink {
        committed: Vec<BakedAnimation>,
        flushes: usize,
    }

    impl AssetSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn commit(&mut self, asset: &BakedAnimation) -> Result<AssetHandle, ContractError> {
            if asset.name.starts_with("fail") {
                return Err(ContractError::sink_write("recording", "refused"));
            }
            self.committed.push(asset.clone());
            Ok(AssetHandle {
                sink: "recording".into(),
                location: asset.object_path(),
            })
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            self.flushes += 1;
            Ok(())
        }
    }

    fn snapshot(frames: usize) -> RecordingSnapshot {
        RecordingSnapshot {
            source_name: "W".into(),
            descriptor: Some(SkeletonDescriptor::single_bone("root")),
            frames: (0..frames)
                .map(|k| Frame {
                    time: k as f64 / 60.0,
                    translations: vec![Vector3::zeros()],
                    rotations: vec![UnitQuaternion::identity()],
                    diagnostics: None,
                })
                .collect(),
            sample_rate_hz: 60.0,
            baseline_policy: BaselinePolicy::default(),
            capture_mode: CaptureMode::Skeletal,
            start_sample_index: 0,
        }
    }

    #[tokio::test]
    async fn test_one_job_per_tick_then_drain() {
        let mut sched = TestScheduler::default();
        let mut sink = RecordingSink::default();
        let mut queue = BakeQueue::new(30, "/MocapCaptures");
        queue.enqueue(snapshot(3), "a");
        queue.enqueue(snapshot(5), "b");

        assert!(queue.begin(&mut sched, false));
        assert_eq!(sched.active.len(), 1);
        assert_eq!(queue.status().current_job_name, "a");

        let first = queue.tick(&mut sched, false, &mut sink).await.unwrap();
        assert_eq!(first.label(), "baked");
        assert_eq!(queue.status().jobs_done, 1);
        assert_eq!(sched.active.len(), 1);

        queue.tick(&mut sched, false, &mut sink).await.unwrap();
        let status = queue.status();
        assert_eq!(status.jobs_done, 2);
        assert_eq!(status.total_jobs, 2);
        assert!(status.current_job_name.is_empty());
        assert!(!status.is_baking);
        assert!(sched.active.is_empty());
        assert_eq!(sink.flushes, 1);
        assert_eq!(sink.committed.len(), 2);

        assert!(queue.tick(&mut sched, false, &mut sink).await.is_none());
    }

    #[tokio::test]
    async fn test_drained_jobs_are_released() {
        let mut sched = TestScheduler::default();
        let mut sink = RecordingSink::default();
        let mut queue = BakeQueue::default();

        for run in 0..3 {
            queue.enqueue(snapshot(4), format!("take_{run}_a"));
            queue.enqueue(snapshot(4), format!("take_{run}_b"));
            assert!(queue.begin(&mut sched, false));

            queue.tick(&mut sched, false, &mut sink).await.unwrap();
            assert_eq!(queue.jobs().len(), 1);
            assert_eq!(queue.status().current_job_name, format!("take_{run}_b"));

            queue.tick(&mut sched, false, &mut sink).await.unwrap();
            assert!(queue.jobs().is_empty());
            let status = queue.status();
            assert_eq!((status.jobs_done, status.total_jobs), (2, 2));
            assert!(!status.is_baking);
        }
        assert_eq!(sink.committed.len(), 6);
        assert_eq!(sched.registrations, 3);
        assert!(sched.active.is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_during_bake_extends_run() {
        let mut sched = TestScheduler::default();
        let mut sink = RecordingSink::default();
        let mut queue = BakeQueue::default();
        queue.enqueue(snapshot(2), "a");
        queue.enqueue(snapshot(2), "b");
        queue.begin(&mut sched, false);
        queue.tick(&mut sched, false, &mut sink).await.unwrap();

        queue.enqueue(snapshot(2), "c");
        let status = queue.status();
        assert_eq!((status.jobs_done, status.total_jobs), (1, 3));

        queue.tick(&mut sched, false, &mut sink).await.unwrap();
        queue.tick(&mut sched, false, &mut sink).await.unwrap();
        let status = queue.status();
        assert_eq!((status.jobs_done, status.total_jobs), (3, 3));
        assert!(queue.jobs().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_and_failed_jobs_advance() {
        let mut sched = TestScheduler::default();
        let mut sink = RecordingSink::default();
        let mut queue = BakeQueue::default();
        queue.enqueue(snapshot(0), "empty");
        queue.enqueue(snapshot(2), "fail_me");
        queue.enqueue(snapshot(2), "ok");
        queue.begin(&mut sched, false);

        let labels = [
            queue.tick(&mut sched, false, &mut sink).await.unwrap().label(),
            queue.tick(&mut sched, false, &mut sink).await.unwrap().label(),
            queue.tick(&mut sched, false, &mut sink).await.unwrap().label(),
        ];
        assert_eq!(labels, ["skipped", "failed", "baked"]);
        assert_eq!(sink.committed.len(), 1);
        let m = queue.metrics().snapshot();
        assert_eq!((m.baked_count, m.skipped_count, m.failure_count), (1, 1, 1));
        assert_eq!(m.pending, 0);
    }

    #[tokio::test]
    async fn test_waits_for_external_context() {
        let mut sched = TestScheduler::default();
        let mut sink = RecordingSink::default();
        let mut queue = BakeQueue::default();
        queue.enqueue(snapshot(2), "a");

        queue.begin(&mut sched, true);
        assert!(queue.status().awaiting_external_context_end);
        for _ in 0..3 {
            let outcome = queue.tick(&mut sched, true, &mut sink).await.unwrap();
            assert!(matches!(outcome, BakeOutcome::Deferred));
        }
        assert!(sink.committed.is_empty());
        assert_eq!(sched.active.len(), 1);

        let outcome = queue.tick(&mut sched, false, &mut sink).await.unwrap();
        assert_eq!(outcome.label(), "baked");
        assert!(!queue.status().awaiting_external_context_end);
    }

    #[tokio::test]
    async fn test_invalid_asset_path_falls_back() {
        let mut sched = TestScheduler::default();
        let mut sink = RecordingSink::default();
        let mut queue = BakeQueue::new(30, "not a path");
        queue.enqueue(snapshot(2), "a");
        queue.begin(&mut sched, false);
        queue.tick(&mut sched, false, &mut sink).await;

        assert_eq!(sink.committed[0].asset_path, DEFAULT_ASSET_PATH);
    }

    #[tokio::test]
    async fn test_begin_twice_registers_once() {
        let mut sched = TestScheduler::default();
        let mut queue = BakeQueue::default();
        assert!(!queue.begin(&mut sched, false));

        queue.enqueue(snapshot(2), "a");
        queue.begin(&mut sched, false);
        queue.begin(&mut sched, false);
        assert_eq!(sched.registrations, 1);

        queue.clear(&mut sched);
        assert!(sched.active.is_empty());
        assert_eq!(queue.status(), BakeStatus::default());
    }

    #[tokio::test]
    async fn test_log_sink_integration() {
        let mut sched = TestScheduler::default();
        let mut sink = LogSink::new("log");
        let mut queue = BakeQueue::default();
        queue.enqueue(snapshot(4), "a");
        queue.begin(&mut sched, false);
        queue.tick(&mut sched, false, &mut sink).await;
        assert_eq!(sink.committed(), 1);
    }
}
