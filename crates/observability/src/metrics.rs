//! Capture and bake metrics
//!
//! Thin wrappers over the `metrics` facade plus an in-memory aggregator
//! used for end-of-run summaries.

use std::collections::BTreeMap;

use contracts::CaptureMode;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// Register help text and units with the installed recorder
pub fn describe_metrics() {
    describe_counter!("mocap_frames_sampled_total", "Frames appended to recorders");
    describe_counter!(
        "mocap_capture_failures_total",
        "Captures that failed closed, by reason"
    );
    describe_counter!(
        "mocap_auto_instances_started_total",
        "Auto-capture instances started, by rule index"
    );
    describe_counter!(
        "mocap_auto_instances_stopped_total",
        "Auto-capture instances finalized, by stop reason"
    );
    describe_gauge!("mocap_auto_instances_active", "Running auto-capture instances");
    describe_histogram!(
        "mocap_session_tick_ms",
        Unit::Milliseconds,
        "Wall time of one session tick"
    );
    describe_counter!("mocap_bake_jobs_total", "Bake jobs processed, by sink and outcome");
    describe_gauge!("mocap_bake_queue_depth", "Bake jobs not yet processed");
    describe_histogram!(
        "mocap_bake_duration_ms",
        Unit::Milliseconds,
        "Resample plus commit time of one bake job"
    );
}

fn mode_label(mode: CaptureMode) -> &'static str {
    match mode {
        CaptureMode::Skeletal => "skeletal",
        CaptureMode::TransformOnly => "transform_only",
    }
}

/// One frame appended to a recorder
pub fn record_frame_sampled(mode: CaptureMode) {
    counter!("mocap_frames_sampled_total", "mode" => mode_label(mode)).increment(1);
}

/// A capture that failed closed (no frame appended)
pub fn record_capture_failure(reason: &'static str) {
    counter!("mocap_capture_failures_total", "reason" => reason).increment(1);
}

/// Auto-capture started for a rule match
pub fn record_instance_started(rule_index: usize) {
    counter!(
        "mocap_auto_instances_started_total",
        "rule" => rule_index.to_string()
    )
    .increment(1);
}

/// Auto-capture instance finalized
pub fn record_instance_stopped(reason: &'static str) {
    counter!("mocap_auto_instances_stopped_total", "reason" => reason).increment(1);
}

pub fn record_active_instances(count: usize) {
    gauge!("mocap_auto_instances_active").set(count as f64);
}

pub fn record_session_tick_ms(elapsed_ms: f64) {
    histogram!("mocap_session_tick_ms").record(elapsed_ms);
}

/// Bake job processed; `outcome` is `baked`, `skipped` or `failed`
pub fn record_bake_job(sink: &str, outcome: &'static str) {
    counter!(
        "mocap_bake_jobs_total",
        "sink" => sink.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Jobs not yet processed
pub fn record_bake_queue_depth(pending: usize) {
    gauge!("mocap_bake_queue_depth").set(pending as f64);
}

pub fn record_bake_duration_ms(elapsed_ms: f64) {
    histogram!("mocap_bake_duration_ms").record(elapsed_ms);
}

/// Per-session aggregation for the CLI summary
#[derive(Debug, Clone, Default)]
pub struct SessionStatsAggregator {
    /// Session ticks executed
    pub ticks: u64,

    /// Recordings finalized (manual + auto)
    pub recordings: u64,

    /// Frames per finalized recording
    pub frames_per_recording: RunningStats,

    /// Finalized recordings by stop reason
    pub stop_reasons: BTreeMap<String, u64>,

    pub baked: u64,
    pub bake_skipped: u64,
    pub bake_failed: u64,
}

impl SessionStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_tick(&mut self) {
        self.ticks += 1;
    }

    pub fn on_recording_finished(&mut self, frames: usize, reason: &str) {
        self.recordings += 1;
        self.frames_per_recording.push(frames as f64);
        *self.stop_reasons.entry(reason.to_string()).or_insert(0) += 1;
    }

    pub fn on_bake_outcome(&mut self, outcome: &str) {
        match outcome {
            "baked" => self.baked += 1,
            "skipped" => self.bake_skipped += 1,
            _ => self.bake_failed += 1,
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            ticks: self.ticks,
            recordings: self.recordings,
            frames_per_recording: StatsSummary::from(&self.frames_per_recording),
            stop_reasons: self.stop_reasons.clone(),
            baked: self.baked,
            bake_skipped: self.bake_skipped,
            bake_failed: self.bake_failed,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionSummary {
    pub ticks: u64,
    pub recordings: u64,
    pub frames_per_recording: StatsSummary,
    pub stop_reasons: BTreeMap<String, u64>,
    pub baked: u64,
    pub bake_skipped: u64,
    pub bake_failed: u64,
}

impl std::fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Capture Session Summary ===")?;
        writeln!(f, "Ticks: {}", self.ticks)?;
        writeln!(f, "Recordings: {}", self.recordings)?;
        writeln!(f, "Frames per recording: {}", self.frames_per_recording)?;
        writeln!(
            f,
            "Bake jobs: {} baked, {} skipped, {} failed",
            self.baked, self.bake_skipped, self.bake_failed
        )?;
        if !self.stop_reasons.is_empty() {
            writeln!(f, "Stop reasons:")?;
            for (reason, count) in &self.stop_reasons {
                writeln!(f, "  {reason}: {count}")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online mean/variance (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
