//! SessionManager - tick-driven orchestration of every recorder
//!
//! One sampling tick runs, in order: drain scene events, sweep live actors,
//! start pending auto-captures, sample every recorder, evaluate auto-stop,
//! then advance the session sample counter exactly once. Bake ticks run on
//! their own (slower) timer through the owned [`BakeQueue`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use baker::{default_asset_name, BakeOutcome, BakeQueue, Resampler};
use capture_engine::{CaptureHost, Recorder, RecorderConfig};
use contracts::{
    is_valid_asset_name, is_valid_asset_path, scene_event_channel, ActorId, AssetSink, BakeStatus, CaptureBlueprint,
    CaptureMode, ClassRuleConfig, SceneEvent, SceneEventReceiver, SceneEventSender,
    SceneProvider, Scheduler, TargetConfig, TimerHandle, Transform,
};
use nalgebra::Vector3;
use observability::SessionStatsAggregator;
use slab::Slab;
use tracing::{debug, info, instrument, trace, warn};

use crate::error::{Result, SessionError};
use crate::instance::{AutoInstance, ManualTarget, StopReason};
use crate::settings::{clamp_capture_rate, SessionSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Stopped,
    Recording,
}

/// What one sampling tick did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTickReport {
    /// Actors whose auto-capture started this tick
    pub started: Vec<ActorId>,
    /// Auto-captures finalized this tick
    pub stopped: Vec<(ActorId, StopReason)>,
    /// The session stopped itself after auto-stop evaluation
    pub session_ended: bool,
}

/// Session Manager
///
/// Owns the manual targets, the auto-capture rules and instances, the
/// scheduler registrations and the bake queue. Host capabilities are passed
/// into every operation by reference.
pub struct SessionManager<S: Scheduler> {
    settings: SessionSettings,
    state: SessionState,
    scheduler: S,
    tick_timer: Option<TimerHandle>,

    events_tx: SceneEventSender,
    events_rx: SceneEventReceiver,

    targets: Vec<ManualTarget>,
    rules: Vec<ClassRuleConfig>,
    /// Enabled rules frozen at session start, with their original indices
    active_rules: Vec<(usize, ClassRuleConfig)>,

    instances: Slab<AutoInstance>,
    by_actor: HashMap<ActorId, usize>,
    seen: HashSet<ActorId>,
    pending: VecDeque<(ActorId, usize)>,
    pending_set: HashSet<ActorId>,
    sweep_cursor: usize,

    sample_counter: u64,
    bake: BakeQueue,
    stats: SessionStatsAggregator,
}

impl<S: Scheduler> SessionManager<S> {
    pub fn new(settings: SessionSettings, scheduler: S) -> Self {
        let (events_tx, events_rx) = scene_event_channel();
        // scene events only flow while recording
        events_rx.set_accepting(false);
        let mut bake = BakeQueue::new(settings.export_fps, settings.asset_path.clone());
        bake.set_interval(settings.bake_interval);
        Self {
            settings,
            state: SessionState::Stopped,
            scheduler,
            tick_timer: None,
            events_tx,
            events_rx,
            targets: Vec::new(),
            rules: Vec::new(),
            active_rules: Vec::new(),
            instances: Slab::new(),
            by_actor: HashMap::new(),
            seen: HashSet::new(),
            pending: VecDeque::new(),
            pending_set: HashSet::new(),
            sweep_cursor: 0,
            sample_counter: 0,
            bake,
            stats: SessionStatsAggregator::new(),
        }
    }

    /// Settings and rules from a blueprint; targets need a scene and are
    /// added with [`add_target_config`](Self::add_target_config)
    pub fn from_blueprint(blueprint: &CaptureBlueprint, scheduler: S) -> Self {
        let mut manager = Self::new(SessionSettings::from_config(&blueprint.session), scheduler);
        manager.rules = blueprint
            .rules
            .iter()
            .cloned()
            .map(|mut rule| {
                rule.auto_stop = rule.auto_stop.sanitized();
                rule
            })
            .collect();
        manager
    }

    // ===== Accessors =====

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == SessionState::Recording
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn tick_timer(&self) -> Option<TimerHandle> {
        self.tick_timer
    }

    /// Sending half for the host scene's notifications
    ///
    /// Events sent while the session is stopped are dropped by the sender.
    pub fn event_sender(&self) -> SceneEventSender {
        self.events_tx.clone()
    }

    pub fn sample_counter(&self) -> u64 {
        self.sample_counter
    }

    pub fn targets(&self) -> &[ManualTarget] {
        &self.targets
    }

    pub fn rules(&self) -> &[ClassRuleConfig] {
        &self.rules
    }

    pub fn active_instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Recorder of the live auto-capture for `actor`
    pub fn auto_recorder(&self, actor: ActorId) -> Option<&Recorder> {
        self.by_actor
            .get(&actor)
            .and_then(|&key| self.instances.get(key))
            .map(|inst| &inst.recorder)
    }

    pub fn bake_queue(&self) -> &BakeQueue {
        &self.bake
    }

    pub fn bake_status(&self) -> BakeStatus {
        self.bake.status()
    }

    /// True while the bake queue still has work or is waiting to start
    pub fn is_baking(&self) -> bool {
        self.bake.is_baking()
    }

    pub fn stats(&self) -> &SessionStatsAggregator {
        &self.stats
    }

    fn ensure_stopped(&self) -> Result<()> {
        if self.is_recording() {
            Err(SessionError::AlreadyRecording)
        } else {
            Ok(())
        }
    }

    fn recorder_config(&self, capture_mode: CaptureMode) -> RecorderConfig {
        RecorderConfig {
            sample_rate_hz: self.settings.capture_sample_rate_hz,
            baseline_policy: self.settings.baseline_policy(),
            capture_mode,
            ..RecorderConfig::default()
        }
    }

    // ===== Session settings =====
    //
    // Changes apply to recorders started afterwards.

    /// Clamped to `>= 1`
    pub fn set_capture_sample_rate(&mut self, hz: f64) {
        self.settings.capture_sample_rate_hz = clamp_capture_rate(hz);
    }

    /// Clamped to `[1, 240]`
    pub fn set_export_fps(&mut self, fps: u32) {
        self.settings.export_fps = Resampler::new(fps).export_fps();
        self.bake.set_export_fps(fps);
    }

    pub fn set_asset_path(&mut self, path: impl Into<String>) -> Result<()> {
        let path = path.into();
        if !is_valid_asset_path(&path) {
            return Err(SessionError::invalid_asset_path(path));
        }
        self.bake.set_asset_path(path.clone());
        self.settings.asset_path = path;
        Ok(())
    }

    pub fn set_auto_bake_on_stop(&mut self, enabled: bool) {
        self.settings.auto_bake_on_stop = enabled;
    }

    /// `true` keeps world placement relative to the session origin, `false`
    /// rebases each recording onto its own start pose
    pub fn set_preserve_starting_location(&mut self, preserve: bool) {
        self.settings.preserve_starting_location = preserve;
    }

    pub fn set_session_origin(&mut self, origin: Transform) {
        self.settings.session_origin = origin;
    }

    pub fn set_bake_interval(&mut self, interval: Duration) {
        self.settings.bake_interval = interval;
        self.bake.set_interval(interval);
    }

    // ===== Manual targets =====

    /// Add a manual target
    ///
    /// Rejects duplicates, unknown actors and skeleton-less actors (unless
    /// `capture_mode` is transform-only). Only allowed while stopped.
    #[instrument(name = "session_add_target", skip(self, host, output_name))]
    pub fn add_target<H: CaptureHost + ?Sized>(
        &mut self,
        host: &H,
        actor: ActorId,
        capture_mode: CaptureMode,
        output_name: Option<String>,
    ) -> Result<usize> {
        self.ensure_stopped()?;
        if self.targets.iter().any(|t| t.actor == actor) {
            return Err(SessionError::DuplicateTarget { actor_id: actor });
        }
        if !host.actor_exists(actor) {
            return Err(SessionError::ActorNotFound { actor_id: actor });
        }
        if capture_mode == CaptureMode::Skeletal && !host.has_skeleton(actor) {
            return Err(SessionError::NoSkeleton { actor_id: actor });
        }
        if let Some(name) = output_name.as_deref().filter(|n| !is_valid_asset_name(n)) {
            return Err(SessionError::invalid_output_name(name));
        }

        let recorder = Recorder::for_target(actor, self.recorder_config(capture_mode));
        self.targets.push(ManualTarget {
            actor,
            enabled: true,
            output_name,
            capture_mode,
            recorder,
            lost: false,
        });
        info!(actor = %actor, mode = ?capture_mode, "target added");
        Ok(self.targets.len() - 1)
    }

    /// Add a target from config, resolving the actor by name
    pub fn add_target_config<H: CaptureHost + ?Sized>(
        &mut self,
        host: &H,
        config: &TargetConfig,
    ) -> Result<usize> {
        let actor = host
            .live_actors()
            .into_iter()
            .find(|&id| {
                host.actor_info(id)
                    .is_some_and(|info| info.name == config.actor_name)
            })
            .ok_or_else(|| SessionError::unknown_actor(&config.actor_name))?;

        let index = self.add_target(host, actor, config.capture_mode, config.output_name.clone())?;
        self.targets[index].enabled = config.enabled;
        Ok(index)
    }

    pub fn clear_targets(&mut self) -> Result<()> {
        self.ensure_stopped()?;
        self.targets.clear();
        Ok(())
    }

    /// A disabled target is skipped by sampling and by the auto-end check
    pub fn set_target_enabled(&mut self, index: usize, enabled: bool) -> Result<()> {
        let len = self.targets.len();
        let target = self
            .targets
            .get_mut(index)
            .ok_or(SessionError::TargetIndex { index, len })?;
        target.enabled = enabled;
        Ok(())
    }

    // ===== Rules =====

    /// Append a default rule and return its index
    pub fn add_rule(&mut self) -> usize {
        self.rules.push(ClassRuleConfig::default());
        self.rules.len() - 1
    }

    pub fn add_rule_config(&mut self, mut rule: ClassRuleConfig) -> usize {
        rule.auto_stop = rule.auto_stop.sanitized();
        self.rules.push(rule);
        self.rules.len() - 1
    }

    pub fn remove_rule(&mut self, index: usize) -> Result<ClassRuleConfig> {
        self.rule_mut(index)?;
        Ok(self.rules.remove(index))
    }

    pub fn clear_rules(&mut self) {
        self.rules.clear();
    }

    fn rule_mut(&mut self, index: usize) -> Result<&mut ClassRuleConfig> {
        let len = self.rules.len();
        self.rules
            .get_mut(index)
            .ok_or(SessionError::RuleIndex { index, len })
    }

    pub fn set_rule_enabled(&mut self, index: usize, enabled: bool) -> Result<()> {
        self.rule_mut(index)?.enabled = enabled;
        Ok(())
    }

    /// `None` makes the rule match nothing
    pub fn set_rule_class(&mut self, index: usize, class: Option<String>) -> Result<()> {
        self.rule_mut(index)?.actor_class = class.filter(|c| !c.is_empty());
        Ok(())
    }

    pub fn set_rule_required_tag(&mut self, index: usize, tag: Option<String>) -> Result<()> {
        self.rule_mut(index)?.required_tag = tag.filter(|t| !t.is_empty());
        Ok(())
    }

    /// Auto-capture is skeletal-only; the request is logged and ignored
    pub fn set_rule_transform_only(&mut self, index: usize, transform_only: bool) -> Result<()> {
        self.rule_mut(index)?;
        if transform_only {
            warn!(rule = index, "transform-only auto-capture is not supported, ignored");
        }
        Ok(())
    }

    pub fn set_rule_speed_threshold(&mut self, index: usize, speed: f64) -> Result<()> {
        let auto_stop = &mut self.rule_mut(index)?.auto_stop;
        auto_stop.linear_speed_threshold = speed;
        *auto_stop = auto_stop.sanitized();
        Ok(())
    }

    pub fn set_rule_hold_seconds(&mut self, index: usize, seconds: f64) -> Result<()> {
        let auto_stop = &mut self.rule_mut(index)?.auto_stop;
        auto_stop.stationary_hold_seconds = seconds;
        *auto_stop = auto_stop.sanitized();
        Ok(())
    }

    pub fn set_rule_radius(&mut self, index: usize, radius: f64) -> Result<()> {
        let auto_stop = &mut self.rule_mut(index)?.auto_stop;
        auto_stop.radius = radius;
        *auto_stop = auto_stop.sanitized();
        Ok(())
    }

    pub fn set_rule_stop_when_stationary(&mut self, index: usize, enabled: bool) -> Result<()> {
        self.rule_mut(index)?.auto_stop.stop_when_nearly_stationary = enabled;
        Ok(())
    }

    pub fn set_rule_stop_when_out_of_radius(&mut self, index: usize, enabled: bool) -> Result<()> {
        self.rule_mut(index)?.auto_stop.stop_when_out_of_radius = enabled;
        Ok(())
    }

    pub fn set_rule_stop_on_hit(&mut self, index: usize, enabled: bool) -> Result<()> {
        self.rule_mut(index)?.auto_stop.stop_on_hit = enabled;
        Ok(())
    }

    pub fn set_rule_stop_on_destroyed(&mut self, index: usize, enabled: bool) -> Result<()> {
        self.rule_mut(index)?.auto_stop.stop_on_destroyed = enabled;
        Ok(())
    }

    pub fn set_rule_auto_bake(&mut self, index: usize, enabled: bool) -> Result<()> {
        self.rule_mut(index)?.auto_stop.auto_bake_on_auto_stop = enabled;
        Ok(())
    }

    /// A rule can only ever match when it is enabled and names a class
    fn has_live_rule(&self) -> bool {
        self.rules
            .iter()
            .any(|r| r.enabled && r.actor_class.is_some())
    }

    // ===== Lifecycle =====

    /// Start recording every enabled manual target and arm auto-capture
    #[instrument(
        name = "session_start",
        skip(self, host),
        fields(targets = self.targets.len(), rules = self.rules.len())
    )]
    pub fn start_session<H: CaptureHost + ?Sized>(&mut self, host: &H) -> Result<()> {
        self.ensure_stopped()?;

        self.sample_counter = 0;
        self.active_rules = self
            .rules
            .iter()
            .enumerate()
            .filter(|(_, r)| r.enabled)
            .map(|(i, r)| (i, r.clone()))
            .collect();
        self.clear_auto_state();
        let stale = self.events_rx.discard_pending();
        self.events_rx.set_accepting(true);
        if stale > 0 {
            debug!(events = stale, "stale scene events discarded");
        }

        let configs: Vec<RecorderConfig> = self
            .targets
            .iter()
            .map(|t| self.recorder_config(t.capture_mode))
            .collect();
        for (target, config) in self.targets.iter_mut().zip(configs) {
            target.lost = false;
            if !target.enabled {
                continue;
            }
            if let Err(e) = target.recorder.set_config(config) {
                warn!(actor = %target.actor, error = %e, "recorder reconfiguration failed");
                continue;
            }
            target.recorder.set_start_sample_index(0);
            if let Err(e) = target.recorder.start_with_pre_roll(host, 0) {
                warn!(actor = %target.actor, error = %e, "target failed to start");
            }
        }

        self.tick_timer = Some(
            self.scheduler
                .schedule_repeating(self.settings.tick_interval()),
        );
        self.state = SessionState::Recording;
        info!(
            sample_rate_hz = self.settings.capture_sample_rate_hz,
            active_rules = self.active_rules.len(),
            "session started"
        );
        Ok(())
    }

    fn clear_auto_state(&mut self) {
        self.instances.clear();
        self.by_actor.clear();
        self.seen.clear();
        self.pending.clear();
        self.pending_set.clear();
        self.sweep_cursor = 0;
    }

    /// One sampling tick; a no-op while stopped
    #[instrument(
        level = "trace",
        name = "session_tick",
        skip(self, host),
        fields(counter = self.sample_counter)
    )]
    pub fn tick<H: CaptureHost + ?Sized>(&mut self, host: &H) -> SessionTickReport {
        let mut report = SessionTickReport::default();
        if !self.is_recording() {
            return report;
        }
        let started = Instant::now();

        self.drain_events(host);
        self.sweep(host);
        report.started = self.process_pending(host);
        self.sample_all(host);
        report.stopped = self.tick_auto_stop(host);

        observability::record_active_instances(self.instances.len());
        self.stats.on_tick();

        if self.targets.iter().all(|t| !t.enabled) && !self.has_live_rule() {
            info!("no enabled targets or rules left, ending session");
            self.stop_session(host);
            report.session_ended = true;
        } else {
            self.sample_counter += 1;
        }

        observability::record_session_tick_ms(started.elapsed().as_secs_f64() * 1000.0);
        report
    }

    fn drain_events<H: CaptureHost + ?Sized>(&mut self, host: &H) {
        while let Ok(event) = self.events_rx.try_recv() {
            trace!(?event, "scene event");
            match event {
                SceneEvent::Spawned(actor) => self.evaluate_candidate(host, actor),
                SceneEvent::Destroyed(actor) => {
                    if self.pending_set.remove(&actor) {
                        self.pending.retain(|(a, _)| *a != actor);
                    }
                    self.request_stop(actor, StopReason::Destroyed);
                }
                SceneEvent::Hit { actor, .. } => self.request_stop(actor, StopReason::Hit),
            }
        }
    }

    fn request_stop(&mut self, actor: ActorId, reason: StopReason) {
        let Some(inst) = self
            .by_actor
            .get(&actor)
            .and_then(|&key| self.instances.get_mut(key))
        else {
            return;
        };
        let gated = match reason {
            StopReason::Destroyed => inst.settings.stop_on_destroyed,
            StopReason::Hit => inst.settings.stop_on_hit,
            _ => true,
        };
        if gated && inst.stop_requested.is_none() {
            debug!(actor = %actor, reason = %reason, "stop requested");
            inst.stop_requested = Some(reason);
        }
    }

    /// First enabled rule (declaration order) matching the actor
    fn match_rule<H: CaptureHost + ?Sized>(&self, host: &H, actor: ActorId) -> Option<usize> {
        let info = host.actor_info(actor)?;
        self.active_rules.iter().find_map(|(index, rule)| {
            let class = rule.actor_class.as_deref()?;
            let tag_ok = rule
                .required_tag
                .as_deref()
                .map_or(true, |tag| info.has_tag(tag));
            (info.is_a(class) && tag_ok).then_some(*index)
        })
    }

    /// Queue `actor` for capture if it matches a rule; never starts capture
    fn evaluate_candidate<H: CaptureHost + ?Sized>(&mut self, host: &H, actor: ActorId) {
        if !self.seen.insert(actor) {
            return;
        }
        if self.by_actor.contains_key(&actor) || self.is_manual_target(actor) {
            return;
        }
        if !host.has_skeleton(actor) {
            return;
        }
        if let Some(rule_index) = self.match_rule(host, actor) {
            if self.pending_set.insert(actor) {
                self.pending.push_back((actor, rule_index));
                debug!(actor = %actor, rule = rule_index, "queued for auto-capture");
            }
        }
    }

    fn is_manual_target(&self, actor: ActorId) -> bool {
        self.targets.iter().any(|t| t.actor == actor)
    }

    /// Scan up to the sweep budget of live actors, resuming where the last
    /// sweep stopped
    fn sweep<H: CaptureHost + ?Sized>(&mut self, host: &H) {
        if self.active_rules.is_empty() {
            return;
        }
        let live = host.live_actors();
        if live.is_empty() {
            return;
        }
        let start = self.sweep_cursor % live.len();
        let budget = self.settings.sweep_budget_per_tick.min(live.len());
        for offset in 0..budget {
            let actor = live[(start + offset) % live.len()];
            self.evaluate_candidate(host, actor);
        }
        self.sweep_cursor = (start + budget) % live.len();
    }

    fn process_pending<H: CaptureHost + ?Sized>(&mut self, host: &H) -> Vec<ActorId> {
        let mut started = Vec::new();
        for _ in 0..self.settings.max_auto_capture_per_tick {
            let Some((actor, rule_index)) = self.pending.pop_front() else {
                break;
            };
            self.pending_set.remove(&actor);
            if self.try_start_instance(host, actor, rule_index) {
                started.push(actor);
            }
        }
        started
    }

    fn try_start_instance<H: CaptureHost + ?Sized>(
        &mut self,
        host: &H,
        actor: ActorId,
        rule_index: usize,
    ) -> bool {
        if self.instances.len() >= self.settings.max_active_auto_instances {
            debug!(actor = %actor, "active auto-capture limit reached");
            return false;
        }
        if self.by_actor.contains_key(&actor) || self.is_manual_target(actor) {
            return false;
        }
        if !host.actor_exists(actor) || !host.has_skeleton(actor) {
            return false;
        }
        let Some(settings) = self
            .active_rules
            .iter()
            .find(|(i, _)| *i == rule_index)
            .map(|(_, r)| r.auto_stop.sanitized())
        else {
            return false;
        };
        let location = match host.actor_transform(actor) {
            Ok(t) => t.translation.vector,
            Err(e) => {
                warn!(actor = %actor, error = %e, "auto-capture skipped");
                return false;
            }
        };

        let mut recorder = Recorder::for_target(actor, self.recorder_config(CaptureMode::Skeletal));
        recorder.set_start_sample_index(self.sample_counter);
        if let Err(e) = recorder.start_with_pre_roll(host, self.sample_counter) {
            warn!(actor = %actor, error = %e, "auto-capture failed to start");
            return false;
        }

        let asset_name = default_asset_name(recorder.source_name());
        let key = self.instances.insert(AutoInstance {
            actor,
            rule_index,
            settings,
            recorder,
            last_location: location,
            started_at: self.sample_counter,
            stationary_ticks: 0,
            stop_requested: None,
            asset_name,
        });
        self.by_actor.insert(actor, key);
        observability::record_instance_started(rule_index);
        info!(
            actor = %actor,
            rule = rule_index,
            pre_roll = self.sample_counter,
            "auto-capture started"
        );
        true
    }

    fn sample_all<H: CaptureHost + ?Sized>(&mut self, host: &H) {
        for target in self.targets.iter_mut().filter(|t| t.enabled) {
            let Err(e) = target.recorder.sample(host) else {
                continue;
            };
            if host.actor_exists(target.actor) {
                warn!(actor = %target.actor, error = %e, "target sample failed");
            } else {
                target.recorder.stop();
                target.lost = true;
                warn!(
                    actor = %target.actor,
                    frames = target.recorder.frame_count(),
                    "target actor gone, recording stopped"
                );
            }
        }
        for (_, inst) in self.instances.iter_mut() {
            if let Err(e) = inst.recorder.sample(host) {
                // vanished actors are finalized by auto-stop right after
                debug!(actor = %inst.actor, error = %e, "auto-capture sample failed");
            }
        }
    }

    fn tick_auto_stop<H: CaptureHost + ?Sized>(&mut self, host: &H) -> Vec<(ActorId, StopReason)> {
        let dt = self.settings.sample_interval();
        let counter = self.sample_counter;
        let subject = host.primary_subject_location();

        let mut finished: Vec<(usize, StopReason)> = Vec::new();
        for (key, inst) in self.instances.iter_mut() {
            let reason = if !host.actor_exists(inst.actor) {
                Some(inst.stop_requested.unwrap_or(StopReason::ActorGone))
            } else if !inst.recorder.is_recording() {
                Some(StopReason::RecorderStopped)
            } else if let Some(reason) = inst.stop_requested {
                Some(reason)
            } else {
                match host.actor_transform(inst.actor) {
                    Ok(t) => Self::evaluate_auto_stop(inst, t.translation.vector, subject, dt, counter),
                    Err(_) => Some(StopReason::ActorGone),
                }
            };
            if let Some(reason) = reason {
                finished.push((key, reason));
            }
        }

        let mut stopped = Vec::with_capacity(finished.len());
        for (key, reason) in finished {
            let inst = self.instances.remove(key);
            self.by_actor.remove(&inst.actor);
            let bake = inst.settings.auto_bake_on_auto_stop;
            stopped.push((inst.actor, reason));
            self.finalize_instance(inst, reason, bake);
        }
        stopped
    }

    fn evaluate_auto_stop(
        inst: &mut AutoInstance,
        location: Vector3<f64>,
        subject: Option<Vector3<f64>>,
        dt: f64,
        counter: u64,
    ) -> Option<StopReason> {
        if inst.settings.stop_when_nearly_stationary {
            // the start tick has no motion to measure
            if inst.started_at != counter && inst.update_stationary(location, dt) {
                return Some(StopReason::Stationary);
            }
        } else {
            inst.last_location = location;
        }

        if inst.settings.stop_when_out_of_radius {
            if let Some(subject) = subject {
                if inst.is_out_of_radius(location, subject) {
                    return Some(StopReason::OutOfRadius);
                }
            }
        }
        None
    }

    fn finalize_instance(&mut self, mut inst: AutoInstance, reason: StopReason, bake: bool) {
        inst.recorder.stop();
        let frames = inst.recorder.frame_count();
        if bake && frames > 0 {
            self.bake.enqueue(inst.recorder.snapshot(), inst.asset_name.clone());
        }
        self.stats.on_recording_finished(frames, reason.as_str());
        observability::record_instance_stopped(reason.as_str());
        info!(
            actor = %inst.actor,
            rule = inst.rule_index,
            reason = %reason,
            frames,
            baked = bake && frames > 0,
            "auto-capture finalized"
        );
    }

    /// Stop every recorder, queue bake jobs and hand over to the bake queue
    ///
    /// Idempotent; returns the number of jobs enqueued by this call.
    #[instrument(name = "session_stop", skip(self, host), fields(counter = self.sample_counter))]
    pub fn stop_session<H: SceneProvider + ?Sized>(&mut self, host: &H) -> usize {
        if !self.is_recording() {
            debug!("session already stopped");
            return 0;
        }
        let queued_before = self.bake.pending();
        let auto_bake = self.settings.auto_bake_on_stop;

        for target in &mut self.targets {
            if !target.recorder.is_recording() && !target.lost {
                continue;
            }
            target.recorder.stop();
            target.lost = false;
            let frames = target.recorder.frame_count();
            if auto_bake && frames > 0 {
                let name = target
                    .output_name
                    .clone()
                    .unwrap_or_else(|| default_asset_name(target.recorder.source_name()));
                self.bake.enqueue(target.recorder.snapshot(), name);
            }
            self.stats
                .on_recording_finished(frames, StopReason::SessionStopped.as_str());
        }

        let keys: Vec<usize> = self.instances.iter().map(|(key, _)| key).collect();
        for key in keys {
            let inst = self.instances.remove(key);
            self.finalize_instance(inst, StopReason::SessionStopped, auto_bake);
        }
        self.clear_auto_state();
        self.active_rules.clear();
        self.events_rx.set_accepting(false);
        let dropped = self.events_rx.discard_pending();
        if dropped > 0 {
            debug!(events = dropped, "undelivered scene events discarded");
        }

        if let Some(handle) = self.tick_timer.take() {
            self.scheduler.cancel(handle);
        }
        self.state = SessionState::Stopped;
        observability::record_active_instances(0);

        let queued = self.bake.pending() - queued_before;
        self.bake
            .begin(&mut self.scheduler, host.is_external_context_active());
        info!(jobs = queued, ticks = self.sample_counter, "session stopped");
        queued
    }

    /// One bake tick; `None` when there is nothing to bake
    pub async fn tick_bake<H, K>(&mut self, host: &H, sink: &mut K) -> Option<BakeOutcome>
    where
        H: SceneProvider + ?Sized,
        K: AssetSink,
    {
        let outcome = self
            .bake
            .tick(&mut self.scheduler, host.is_external_context_active(), sink)
            .await?;
        if !matches!(outcome, BakeOutcome::Deferred) {
            self.stats.on_bake_outcome(outcome.label());
        }
        Some(outcome)
    }

    /// Drop every queued bake job
    pub fn clear_bake_queue(&mut self) {
        self.bake.clear(&mut self.scheduler);
    }
}
