//! Recorder - frame buffer and sampling clock for one target
//!
//! State machine: `Idle -> Recording -> Idle`. Timestamps are counted
//! (`k / sample_rate_hz`), never measured, so recordings started on the same
//! session tick share one timeline.

use contracts::{
    ActorId, BaselinePolicy, CaptureMode, Frame, RecordingSnapshot, SceneProvider,
    SkeletonDescriptor, SkeletonProvider, Transform,
};
use tracing::{debug, info, instrument, warn};

use crate::descriptor::build_descriptor;
use crate::error::{CaptureError, Result};
use crate::sampler::{Baseline, PoseSampler};

/// Fallback rate for non-positive or non-finite sample rates
pub const DEFAULT_SAMPLE_RATE_HZ: f64 = 60.0;

/// Recorder settings
#[derive(Debug, Clone, PartialEq)]
pub struct RecorderConfig {
    /// Samples per second
    pub sample_rate_hz: f64,
    pub baseline_policy: BaselinePolicy,
    pub capture_mode: CaptureMode,
    /// Bone name used for transform-only recordings
    pub root_bone_name: String,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            baseline_policy: BaselinePolicy::default(),
            capture_mode: CaptureMode::Skeletal,
            root_bone_name: "root".to_string(),
        }
    }
}

impl RecorderConfig {
    /// Rate actually used for the clock
    pub fn effective_sample_rate(&self) -> f64 {
        if self.sample_rate_hz.is_finite() && self.sample_rate_hz > 0.0 {
            self.sample_rate_hz
        } else {
            DEFAULT_SAMPLE_RATE_HZ
        }
    }

    pub fn sample_interval(&self) -> f64 {
        1.0 / self.effective_sample_rate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecorderState {
    #[default]
    Idle,
    Recording,
}

/// Host access needed to record: scene lookups plus skeleton reads
pub trait CaptureHost: SceneProvider + SkeletonProvider {}

impl<T: SceneProvider + SkeletonProvider + ?Sized> CaptureHost for T {}

/// Frame buffer for a single target
#[derive(Debug, Clone)]
pub struct Recorder {
    config: RecorderConfig,
    target: Option<ActorId>,
    source_name: String,
    descriptor: Option<SkeletonDescriptor>,
    frames: Vec<Frame>,
    baseline: Baseline,
    state: RecorderState,
    /// Sampling periods elapsed since start
    clock_ticks: u64,
    /// Standalone mode: host time not yet consumed by a sample
    accumulator: f64,
    driven_externally: bool,
    start_sample_index: u64,
}

impl Recorder {
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            config,
            target: None,
            source_name: String::new(),
            descriptor: None,
            frames: Vec::new(),
            baseline: Baseline::default(),
            state: RecorderState::Idle,
            clock_ticks: 0,
            accumulator: 0.0,
            driven_externally: false,
            start_sample_index: 0,
        }
    }

    pub fn for_target(target: ActorId, config: RecorderConfig) -> Self {
        let mut recorder = Self::new(config);
        recorder.target = Some(target);
        recorder
    }

    // ===== Configuration =====

    /// Replace the target; refused while recording
    pub fn set_target(&mut self, target: ActorId) -> Result<()> {
        self.ensure_idle()?;
        self.target = Some(target);
        Ok(())
    }

    /// Replace the settings; refused while recording
    pub fn set_config(&mut self, config: RecorderConfig) -> Result<()> {
        self.ensure_idle()?;
        self.config = config;
        Ok(())
    }

    pub fn set_sample_rate(&mut self, sample_rate_hz: f64) -> Result<()> {
        self.ensure_idle()?;
        self.config.sample_rate_hz = sample_rate_hz;
        Ok(())
    }

    /// Session sample index this recording was started at
    pub fn set_start_sample_index(&mut self, index: u64) {
        self.start_sample_index = index;
    }

    fn ensure_idle(&self) -> Result<()> {
        match (self.state, self.target) {
            (RecorderState::Recording, Some(actor_id)) => {
                Err(CaptureError::AlreadyRecording { actor_id })
            }
            (RecorderState::Recording, None) => Err(CaptureError::NoTarget),
            _ => Ok(()),
        }
    }

    // ===== Lifecycle =====

    /// Standalone start: captures an immediate first sample
    ///
    /// The recorder stays Idle if the first capture fails.
    #[instrument(name = "recorder_start", skip(self, host), fields(target = ?self.target))]
    pub fn start<H: CaptureHost + ?Sized>(&mut self, host: &H) -> Result<()> {
        self.begin(host, false)?;
        if let Err(e) = self.sample(host) {
            self.state = RecorderState::Idle;
            warn!(error = %e, "first sample failed, recording aborted");
            return Err(e);
        }
        Ok(())
    }

    /// Session-driven start with `pre_roll` static frames
    ///
    /// One real pose is captured and replicated at `0, dt, .. (n-1)dt`; live
    /// sampling continues at `n * dt`. With `pre_roll == 0` nothing is captured.
    #[instrument(
        name = "recorder_start_with_pre_roll",
        skip(self, host),
        fields(target = ?self.target, pre_roll)
    )]
    pub fn start_with_pre_roll<H: CaptureHost + ?Sized>(
        &mut self,
        host: &H,
        pre_roll: u64,
    ) -> Result<()> {
        self.begin(host, true)?;
        if pre_roll == 0 {
            return Ok(());
        }

        let pose = match self.capture(host) {
            Ok(pose) => pose,
            Err(e) => {
                self.state = RecorderState::Idle;
                warn!(error = %e, "pre-roll capture failed, recording aborted");
                return Err(e);
            }
        };

        let dt = self.config.sample_interval();
        self.frames.reserve(pre_roll as usize);
        for k in 0..pre_roll {
            self.frames.push(pose.retimed(k as f64 * dt));
        }
        self.clock_ticks = pre_roll;
        debug!(frames = pre_roll, "pre-roll frames written");
        Ok(())
    }

    fn begin<H: CaptureHost + ?Sized>(&mut self, host: &H, external: bool) -> Result<()> {
        let target = self.target.ok_or(CaptureError::NoTarget)?;
        if self.state == RecorderState::Recording {
            return Err(CaptureError::AlreadyRecording { actor_id: target });
        }
        if !host.actor_exists(target) {
            return Err(contracts::ContractError::ActorNotFound { actor_id: target }.into());
        }

        let descriptor = match self.config.capture_mode {
            CaptureMode::Skeletal => build_descriptor(host, target)?,
            CaptureMode::TransformOnly => {
                SkeletonDescriptor::single_bone(self.config.root_bone_name.clone())
            }
        };

        self.source_name = host
            .actor_info(target)
            .map(|info| info.name)
            .unwrap_or_else(|| target.to_string());
        self.descriptor = Some(descriptor);
        self.frames.clear();
        self.baseline.reset();
        self.clock_ticks = 0;
        self.accumulator = 0.0;
        self.driven_externally = external;
        self.state = RecorderState::Recording;

        info!(
            target = %target,
            source = %self.source_name,
            mode = ?self.config.capture_mode,
            sample_rate_hz = self.config.effective_sample_rate(),
            "recording started"
        );
        Ok(())
    }

    /// Append one frame at the next clock tick; no-op while Idle
    ///
    /// A failed capture appends nothing and does not advance the clock.
    pub fn sample<H: CaptureHost + ?Sized>(&mut self, host: &H) -> Result<()> {
        if self.state != RecorderState::Recording {
            return Ok(());
        }

        match self.capture(host) {
            Ok(mut frame) => {
                frame.time = self.clock_ticks as f64 * self.config.sample_interval();
                self.frames.push(frame);
                self.clock_ticks += 1;
                observability::record_frame_sampled(self.config.capture_mode);
                Ok(())
            }
            Err(e) => {
                observability::record_capture_failure(e.reason());
                Err(e)
            }
        }
    }

    /// Standalone driving: consume host frame time, sampling once per period
    ///
    /// Returns the number of frames appended. Session-driven recorders ignore this.
    pub fn advance<H: CaptureHost + ?Sized>(&mut self, host: &H, delta_seconds: f64) -> Result<usize> {
        if self.state != RecorderState::Recording || self.driven_externally {
            return Ok(0);
        }
        if !delta_seconds.is_finite() || delta_seconds <= 0.0 {
            return Ok(0);
        }

        let dt = self.config.sample_interval();
        self.accumulator += delta_seconds;
        let mut appended = 0;
        while self.accumulator >= dt {
            self.accumulator -= dt;
            self.sample(host)?;
            appended += 1;
        }
        Ok(appended)
    }

    /// Mark Idle; frames stay readable until the next start
    pub fn stop(&mut self) {
        if self.state == RecorderState::Idle {
            return;
        }
        self.state = RecorderState::Idle;
        info!(
            target = ?self.target,
            frames = self.frames.len(),
            "recording stopped"
        );
    }

    fn capture<H: CaptureHost + ?Sized>(&mut self, host: &H) -> Result<Frame> {
        let target = self.target.ok_or(CaptureError::NoTarget)?;
        match self.config.capture_mode {
            CaptureMode::Skeletal => {
                let descriptor = self
                    .descriptor
                    .as_ref()
                    .ok_or(CaptureError::MissingDescriptor)?;
                PoseSampler::capture(
                    host,
                    target,
                    descriptor,
                    &self.config.baseline_policy,
                    &mut self.baseline,
                )
            }
            CaptureMode::TransformOnly => PoseSampler::capture_transform(
                host,
                target,
                &self.config.baseline_policy,
                &mut self.baseline,
            ),
        }
    }

    // ===== Accessors =====

    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn target(&self) -> Option<ActorId> {
        self.target
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn descriptor(&self) -> Option<&SkeletonDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn baseline(&self) -> Option<Transform> {
        self.baseline.get()
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn start_sample_index(&self) -> u64 {
        self.start_sample_index
    }

    /// Detached copy for baking
    pub fn snapshot(&self) -> RecordingSnapshot {
        RecordingSnapshot {
            source_name: self.source_name.clone(),
            descriptor: self.descriptor.clone(),
            frames: self.frames.clone(),
            sample_rate_hz: self.config.effective_sample_rate(),
            baseline_policy: self.config.baseline_policy,
            capture_mode: self.config.capture_mode,
            start_sample_index: self.start_sample_index,
        }
    }
}
