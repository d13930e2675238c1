//! Closed-loop adaptive resolution control for Glowpaper.
//!
//! The controller consumes wall-clock frame durations and produces a render
//! scale in `[min_scale, max_scale]` that keeps frame time under a budget
//! without visible oscillation. The life of a controller:
//!
//! ```text
//!   Calibrating ──▶ Normal ◀──▶ Locked
//!        └───────────┴────┬──────┘
//!                     Emergency (overlay, any mode)
//! ```
//!
//! * **Calibrating** measures a short warm-up window and, when the machine
//!   clearly cannot hold the budget, jumps straight to the scale predicted by
//!   the pixel-count model (`cost ∝ scale²`).
//! * **Normal** nudges the target scale against a percentile of the recent
//!   spike-filtered history, with separate cooldowns for shrinking and
//!   growing.
//! * **Locked** pins the scale once performance has been stable long enough,
//!   re-opening only on a sustained drift.
//! * **Emergency** reacts to a single catastrophic frame by cutting two
//!   quantized levels immediately, bypassing every cooldown.
//!
//! All state lives on the controller value; two controllers never share
//! anything, and every decision is a pure function of the samples and the
//! `Instant`s the caller feeds in, which is what makes the state machine
//! testable with synthetic clocks.

mod stats;

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use stats::FrameHistory;

/// Samples above this are treated as clock glitches, not work.
const MAX_SAMPLE_SECONDS: f32 = 1.0;
/// Overage ratio past which a quantized down-move takes two levels at once.
const LARGE_OVERAGE_RATIO: f32 = 1.35;
/// Continuous-mode size of one "level" for emergency and thermal stepping.
const CONTINUOUS_LEVEL_FRACTION: f32 = 0.10;
/// Continuous-mode up-step before damping.
const CONTINUOUS_UP_FRACTION: f32 = 0.05;
/// Emergency clears once the decision time recovers below this share of the
/// target frame time.
const EMERGENCY_EXIT_FACTOR: f32 = 0.9;
/// A locked controller re-evaluates once the ratio drifts past these factors
/// applied to the normal thresholds.
const LOCK_DRIFT_HIGH: f32 = 1.1;
const LOCK_DRIFT_LOW: f32 = 0.9;
/// Direction reversals in a row that force an immediate lock.
const REVERSALS_TO_LOCK: u32 = 3;
/// Damping never shrinks adjustments below this factor.
const MIN_DAMPING: f32 = 0.2;
/// Upward trend tolerance when deciding whether FPS is worsening.
const TREND_TOLERANCE: f32 = 1.02;
/// Scale distances below this snap instead of easing forever.
const SCALE_SNAP_EPSILON: f32 = 1e-3;
/// Slack when comparing the target against the scale limits.
const SCALE_LIMIT_EPSILON: f32 = 1e-3;

/// Tuning knobs for the controller. Durations are plain seconds so the
/// struct deserializes from a flat TOML table without helper types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Frame rate the wallpaper aims for.
    pub target_fps: f32,
    /// Share of the target frame time treated as the working budget.
    pub headroom_factor: f32,
    /// Extra margin applied to the calibration jump.
    pub safety_margin: f32,
    pub min_scale: f32,
    pub max_scale: f32,
    /// Allowed scales, ascending. Empty enables continuous scaling.
    pub quantized_levels: Vec<f32>,
    /// Percentile of the filtered history used as the decision time.
    pub percentile: f32,
    /// Outliers beyond this many standard deviations are ignored.
    pub spike_sigma: f32,
    /// Band of budget ratios considered stable: `[threshold_up, threshold_down]`.
    pub threshold_up: f32,
    pub threshold_down: f32,
    /// Consecutive stable updates before the scale locks.
    pub stable_frames_to_lock: u32,
    /// Seconds between downward adjustments.
    pub down_cooldown: f32,
    /// Seconds between upward adjustments.
    pub up_cooldown: f32,
    /// Consecutive under-budget updates required before growing.
    pub min_under_budget_run: u32,
    /// Multiple of the target frame time that trips emergency mode.
    pub emergency_threshold: f32,
    /// Multiplied into the damping factor on every direction reversal.
    pub damping_factor: f32,
    /// Multiplied into the damping factor on same-direction moves.
    pub damping_recovery: f32,
    /// Smoothing fractions: how much of the remaining distance the applied
    /// scale covers per update.
    pub smooth_down: f32,
    pub smooth_up: f32,
    pub smooth_emergency: f32,
    /// Calibration warm-up, seconds.
    pub calibration_window: f32,
    pub calibration_min_samples: u32,
    /// Temperatures (Celsius) that engage and clear thermal throttling.
    pub throttle_temperature: f32,
    pub clear_temperature: f32,
    pub initial_scale: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            target_fps: 60.0,
            headroom_factor: 0.9,
            safety_margin: 0.9,
            min_scale: 0.25,
            max_scale: 1.0,
            quantized_levels: vec![0.25, 0.33, 0.40, 0.50, 0.60, 0.70, 0.80, 0.90, 1.00],
            percentile: 0.95,
            spike_sigma: 3.0,
            threshold_up: 0.85,
            threshold_down: 1.08,
            stable_frames_to_lock: 90,
            down_cooldown: 0.25,
            up_cooldown: 1.5,
            min_under_budget_run: 30,
            emergency_threshold: 1.5,
            damping_factor: 0.7,
            damping_recovery: 1.05,
            smooth_down: 0.35,
            smooth_up: 0.12,
            smooth_emergency: 0.85,
            calibration_window: 0.28,
            calibration_min_samples: 8,
            throttle_temperature: 85.0,
            clear_temperature: 78.0,
            initial_scale: 1.0,
        }
    }
}

impl ControllerConfig {
    /// Seconds one frame may take at the target rate.
    pub fn target_frame_time(&self) -> f32 {
        1.0 / self.target_fps.max(1.0)
    }

    /// The working budget the controller holds frame time under.
    pub fn budget(&self) -> f32 {
        self.target_frame_time() * self.headroom_factor
    }
}

/// Primary controller mode. Emergency is an overlay, not a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerMode {
    Calibrating,
    Normal,
    Locked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Down,
    Up,
}

/// Adaptive resolution state machine. See the crate docs for the model.
#[derive(Debug, Clone)]
pub struct ResolutionController {
    config: ControllerConfig,
    levels: Vec<f32>,
    history: FrameHistory,
    mode: ControllerMode,
    emergency: bool,
    current_scale: f32,
    target_scale: f32,
    locked_scale: Option<f32>,
    stable_frames: u32,
    under_budget_run: u32,
    consecutive_reversals: u32,
    oscillations: u32,
    damping: f32,
    last_direction: Option<Direction>,
    last_down: Option<Instant>,
    last_up: Option<Instant>,
    last_thermal_step: Option<Instant>,
    calibration_started: Option<Instant>,
    prev_decision: Option<f32>,
    throttling: bool,
}

impl ResolutionController {
    pub fn new(config: ControllerConfig) -> Self {
        let mut levels: Vec<f32> = config
            .quantized_levels
            .iter()
            .copied()
            .filter(|level| *level >= config.min_scale && *level <= config.max_scale)
            .collect();
        levels.sort_by(|a, b| a.total_cmp(b));
        levels.dedup();

        let initial = config.initial_scale.clamp(config.min_scale, config.max_scale);
        Self {
            levels,
            history: FrameHistory::new(),
            mode: ControllerMode::Calibrating,
            emergency: false,
            current_scale: initial,
            target_scale: initial,
            locked_scale: None,
            stable_frames: 0,
            under_budget_run: 0,
            consecutive_reversals: 0,
            oscillations: 0,
            damping: 1.0,
            last_direction: None,
            last_down: None,
            last_up: None,
            last_thermal_step: None,
            calibration_started: None,
            prev_decision: None,
            throttling: false,
            config,
        }
    }

    /// Feeds one measured frame duration and returns the applied scale for
    /// the upcoming frame. `now` is supplied by the caller so tests can run
    /// on a synthetic clock.
    pub fn update(&mut self, frame_time: Duration, now: Instant) -> f32 {
        let seconds = frame_time.as_secs_f32();
        if seconds <= 0.0 || seconds > MAX_SAMPLE_SECONDS {
            trace!(seconds, "discarding out-of-range frame-time sample");
            return self.smooth();
        }
        self.history.push(seconds);

        let target_frame = self.config.target_frame_time();
        if seconds > target_frame * self.config.emergency_threshold {
            // Raw sample, deliberately ahead of the spike filter: a frame bad
            // enough to trip emergency must not be smoothed away.
            self.trigger_emergency(seconds, now);
        }

        if self.emergency {
            let decision = self.decision_time().unwrap_or(seconds);
            if decision < EMERGENCY_EXIT_FACTOR * target_frame {
                debug!(decision_ms = decision * 1e3, "emergency cleared");
                self.emergency = false;
            }
        } else {
            match self.mode {
                ControllerMode::Calibrating => self.update_calibrating(now),
                ControllerMode::Normal => self.update_normal(now),
                ControllerMode::Locked => self.update_locked(),
            }
        }

        self.apply_thermal(now);
        self.smooth()
    }

    /// Optional thermal input; values are Celsius. Throttling engages above
    /// the configured threshold and clears below the (lower) clear point.
    pub fn submit_temperature(&mut self, celsius: f32) {
        if !celsius.is_finite() {
            return;
        }
        if !self.throttling && celsius >= self.config.throttle_temperature {
            warn!(celsius, "thermal throttle engaged; biasing scale down");
            self.throttling = true;
        } else if self.throttling && celsius <= self.config.clear_temperature {
            debug!(celsius, "thermal throttle cleared");
            self.throttling = false;
        }
    }

    /// Releases a locked scale and resumes normal regulation.
    pub fn unlock(&mut self) {
        if self.mode == ControllerMode::Locked {
            self.mode = ControllerMode::Normal;
            self.locked_scale = None;
            self.stable_frames = 0;
            self.under_budget_run = 0;
        }
    }

    /// Forgets all history and returns to calibration; used when the shader
    /// changes and old measurements describe a different workload.
    pub fn reset(&mut self) {
        let config = self.config.clone();
        *self = Self::new(config);
    }

    pub fn current_scale(&self) -> f32 {
        self.current_scale
    }

    pub fn target_scale(&self) -> f32 {
        self.target_scale
    }

    pub fn mode(&self) -> ControllerMode {
        self.mode
    }

    pub fn is_locked(&self) -> bool {
        self.mode == ControllerMode::Locked
    }

    /// Scale the controller holds while locked.
    pub fn locked_scale(&self) -> Option<f32> {
        self.locked_scale
    }

    pub fn is_emergency(&self) -> bool {
        self.emergency
    }

    pub fn is_throttling(&self) -> bool {
        self.throttling
    }

    /// Direction reversals observed since construction.
    pub fn oscillations(&self) -> u32 {
        self.oscillations
    }

    /// Mean of the recent history, if any samples survived validation.
    pub fn measured_frame_time(&self) -> Option<f32> {
        self.history.mean()
    }

    fn decision_time(&self) -> Option<f32> {
        self.history
            .percentile_filtered(self.config.percentile, self.config.spike_sigma)
    }

    fn update_calibrating(&mut self, now: Instant) {
        let started = *self.calibration_started.get_or_insert(now);
        let window = Duration::from_secs_f32(self.config.calibration_window.max(0.0));
        if now.duration_since(started) < window
            || (self.history.len() as u32) < self.config.calibration_min_samples
        {
            return;
        }
        let Some(mean) = self.history.mean() else {
            return;
        };

        let budget = self.config.budget();
        if mean > budget {
            // Fragment cost tracks pixel count, i.e. scale², so the scale
            // that meets the budget is the square root of the ratio.
            let optimal =
                self.current_scale * (budget / mean).sqrt() * self.config.safety_margin;
            let snapped = self.snap(optimal);
            debug!(
                mean_ms = mean * 1e3,
                budget_ms = budget * 1e3,
                scale = snapped,
                "calibration over budget; jumping to predicted scale"
            );
            self.target_scale = snapped;
            self.current_scale = snapped;
        } else {
            debug!(mean_ms = mean * 1e3, "calibration within budget");
        }
        // Samples taken at the pre-jump scale describe a different workload,
        // and the jump itself counts as the first adjustment for cooldowns.
        self.history.clear();
        self.prev_decision = None;
        self.last_down = Some(now);
        self.last_up = Some(now);
        self.mode = ControllerMode::Normal;
    }

    fn update_normal(&mut self, now: Instant) {
        let Some(decision) = self.decision_time() else {
            return;
        };
        let budget = self.config.budget();
        let ratio = decision / budget;
        let trend_ok = self
            .prev_decision
            .is_none_or(|prev| decision <= prev * TREND_TOLERANCE);
        self.prev_decision = Some(decision);

        let at_floor = self.target_scale <= self.config.min_scale + SCALE_LIMIT_EPSILON;
        let at_ceiling = self.target_scale >= self.config.max_scale - SCALE_LIMIT_EPSILON;
        let in_band = ratio >= self.config.threshold_up && ratio <= self.config.threshold_down;
        // With nothing left to trade (already at a limit, or pinned by the
        // thermal throttle) an out-of-band ratio still counts as stable.
        let pinned = (ratio > self.config.threshold_down && at_floor)
            || (ratio < self.config.threshold_up && (at_ceiling || self.throttling));

        if in_band || pinned {
            self.stable_frames += 1;
            if self.stable_frames >= self.config.stable_frames_to_lock {
                self.lock("sustained stability");
            }
            return;
        }

        self.stable_frames = 0;
        if ratio > self.config.threshold_down {
            self.under_budget_run = 0;
            if self.cooldown_elapsed(self.last_down, self.config.down_cooldown, now) {
                let next = self.shrink_target(ratio);
                self.move_target(next, Direction::Down, now);
            }
        } else {
            self.under_budget_run += 1;
            let can_grow = self.under_budget_run >= self.config.min_under_budget_run
                && trend_ok
                && !self.throttling
                && self.cooldown_elapsed(self.last_up, self.config.up_cooldown, now);
            if can_grow {
                let next = self.grow_target();
                self.move_target(next, Direction::Up, now);
                self.under_budget_run = 0;
            }
        }
    }

    fn update_locked(&mut self) {
        let Some(decision) = self.decision_time() else {
            return;
        };
        let ratio = decision / self.config.budget();
        if ratio > self.config.threshold_down * LOCK_DRIFT_HIGH
            || ratio < self.config.threshold_up * LOCK_DRIFT_LOW
        {
            debug!(ratio, scale = self.target_scale, "performance drifted; unlocking");
            self.mode = ControllerMode::Normal;
            self.locked_scale = None;
            self.stable_frames = 0;
            self.under_budget_run = 0;
            self.prev_decision = Some(decision);
        }
    }

    fn trigger_emergency(&mut self, seconds: f32, now: Instant) {
        if self.emergency {
            // Still drowning: keep stepping, one level per cooldown.
            if self.cooldown_elapsed(self.last_down, self.config.down_cooldown, now) {
                self.target_scale = self.step_down(self.target_scale, 1);
                self.last_down = Some(now);
            }
            return;
        }
        let before = self.target_scale;
        self.emergency = true;
        self.target_scale = self.step_down(self.target_scale, 2);
        self.last_down = Some(now);
        self.stable_frames = 0;
        self.under_budget_run = 0;
        self.last_direction = Some(Direction::Down);
        self.consecutive_reversals = 0;
        warn!(
            frame_ms = seconds * 1e3,
            from = before,
            to = self.target_scale,
            "emergency: severe frame drop, cutting resolution immediately"
        );
    }

    fn apply_thermal(&mut self, now: Instant) {
        if !self.throttling {
            return;
        }
        let at_floor = self.target_scale <= self.config.min_scale + SCALE_LIMIT_EPSILON;
        if at_floor
            || !self.cooldown_elapsed(self.last_thermal_step, self.config.down_cooldown, now)
        {
            return;
        }
        self.target_scale = self.step_down(self.target_scale, 1);
        self.last_thermal_step = Some(now);
        if self.mode == ControllerMode::Locked {
            self.locked_scale = Some(self.target_scale);
        }
        debug!(scale = self.target_scale, "thermal bias stepped scale down");
    }

    fn move_target(&mut self, next: f32, direction: Direction, now: Instant) {
        let next = next.clamp(self.config.min_scale, self.config.max_scale);
        if (next - self.target_scale).abs() < SCALE_SNAP_EPSILON {
            return;
        }
        trace!(
            from = self.target_scale,
            to = next,
            ?direction,
            damping = self.damping,
            "adjusting target scale"
        );
        self.target_scale = next;
        match direction {
            Direction::Down => self.last_down = Some(now),
            Direction::Up => self.last_up = Some(now),
        }
        self.note_direction(direction);
    }

    fn note_direction(&mut self, direction: Direction) {
        match self.last_direction {
            Some(previous) if previous != direction => {
                self.consecutive_reversals += 1;
                self.oscillations += 1;
                self.damping = (self.damping * self.config.damping_factor).max(MIN_DAMPING);
                if self.consecutive_reversals >= REVERSALS_TO_LOCK {
                    self.lock("oscillation limit");
                }
            }
            _ => {
                self.consecutive_reversals = 0;
                self.damping = (self.damping * self.config.damping_recovery).min(1.0);
            }
        }
        self.last_direction = Some(direction);
    }

    fn lock(&mut self, reason: &str) {
        debug!(scale = self.target_scale, reason, "locking resolution scale");
        self.mode = ControllerMode::Locked;
        self.locked_scale = Some(self.target_scale);
        self.stable_frames = 0;
        self.consecutive_reversals = 0;
    }

    /// One regulated shrink, sized by how far over budget we are.
    fn shrink_target(&mut self, ratio: f32) -> f32 {
        if self.quantized() {
            let mut steps = if ratio >= LARGE_OVERAGE_RATIO { 2 } else { 1 };
            if steps == 2 && self.damping < 0.75 {
                steps = 1;
            }
            self.step_down(self.target_scale, steps)
        } else {
            let cut = ((ratio.sqrt() - 1.0).clamp(0.02, 0.20)) * self.damping;
            self.target_scale * (1.0 - cut)
        }
    }

    /// One regulated grow: a single level, or a small damped step.
    fn grow_target(&mut self) -> f32 {
        if self.quantized() {
            self.step_up(self.target_scale)
        } else {
            self.target_scale * (1.0 + CONTINUOUS_UP_FRACTION * self.damping)
        }
    }

    fn quantized(&self) -> bool {
        !self.levels.is_empty()
    }

    /// Nearest allowed scale; clamps in continuous mode.
    fn snap(&self, scale: f32) -> f32 {
        let clamped = scale.clamp(self.config.min_scale, self.config.max_scale);
        if !self.quantized() {
            return clamped;
        }
        self.levels
            .iter()
            .copied()
            .min_by(|a, b| (a - clamped).abs().total_cmp(&(b - clamped).abs()))
            .unwrap_or(clamped)
    }

    fn step_down(&self, scale: f32, steps: usize) -> f32 {
        if self.quantized() {
            let index = self.nearest_level_index(scale);
            self.levels[index.saturating_sub(steps)]
        } else {
            (scale * (1.0 - CONTINUOUS_LEVEL_FRACTION).powi(steps as i32))
                .clamp(self.config.min_scale, self.config.max_scale)
        }
    }

    fn step_up(&self, scale: f32) -> f32 {
        if self.quantized() {
            let index = (self.nearest_level_index(scale) + 1).min(self.levels.len() - 1);
            self.levels[index]
        } else {
            (scale * (1.0 + CONTINUOUS_LEVEL_FRACTION))
                .clamp(self.config.min_scale, self.config.max_scale)
        }
    }

    fn nearest_level_index(&self, scale: f32) -> usize {
        self.levels
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| (*a - scale).abs().total_cmp(&(*b - scale).abs()))
            .map(|(index, _)| index)
            .unwrap_or(0)
    }

    fn cooldown_elapsed(&self, last: Option<Instant>, cooldown: f32, now: Instant) -> bool {
        last.is_none_or(|at| now.duration_since(at).as_secs_f32() >= cooldown)
    }

    /// Eases the applied scale toward the target. Shrinking moves fast so
    /// drops resolve quickly; growing moves slowly so the picture never
    /// visibly "zooms"; emergencies snap almost immediately.
    fn smooth(&mut self) -> f32 {
        let fraction = if self.emergency {
            self.config.smooth_emergency
        } else if self.target_scale < self.current_scale {
            self.config.smooth_down
        } else {
            self.config.smooth_up
        };
        self.current_scale += (self.target_scale - self.current_scale) * fraction;
        if (self.target_scale - self.current_scale).abs() < SCALE_SNAP_EPSILON {
            self.current_scale = self.target_scale;
        }
        self.current_scale = self
            .current_scale
            .clamp(self.config.min_scale, self.config.max_scale);
        self.current_scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn millis(ms: f32) -> Duration {
        Duration::from_secs_f32(ms / 1e3)
    }

    /// Runs `count` updates with a constant frame time, advancing the clock
    /// by the same amount each step, and returns the final applied scale.
    fn run_frames(
        controller: &mut ResolutionController,
        frame_ms: f32,
        count: usize,
        now: &mut Instant,
    ) -> f32 {
        let mut scale = controller.current_scale();
        for _ in 0..count {
            *now += millis(frame_ms);
            scale = controller.update(millis(frame_ms), *now);
        }
        scale
    }

    #[test]
    fn calibration_jump_matches_sqrt_model() {
        let config = ControllerConfig {
            quantized_levels: Vec::new(),
            emergency_threshold: 100.0,
            // Long cooldown so post-calibration regulation cannot disturb
            // the value under test.
            down_cooldown: 3600.0,
            ..ControllerConfig::default()
        };
        let budget = config.budget();
        let margin = config.safety_margin;
        let mut controller = ResolutionController::new(config);
        let mut now = Instant::now();

        run_frames(&mut controller, 30.0, 20, &mut now);
        assert_eq!(controller.mode(), ControllerMode::Normal);
        let expected = (budget / 0.030).sqrt() * margin;
        assert!(
            (controller.target_scale() - expected).abs() < 2e-2,
            "expected ~{expected}, got {}",
            controller.target_scale()
        );
        // The jump is direct, not ramped.
        assert_eq!(controller.current_scale(), controller.target_scale());
    }

    #[test]
    fn calibration_within_budget_keeps_full_scale() {
        let mut controller = ResolutionController::new(ControllerConfig::default());
        let mut now = Instant::now();
        run_frames(&mut controller, 10.0, 40, &mut now);
        assert_eq!(controller.mode(), ControllerMode::Normal);
        assert_eq!(controller.target_scale(), 1.0);
    }

    #[test]
    fn sustained_overload_converges_and_locks() {
        let config = ControllerConfig::default();
        let heavy_ms = config.budget() * 1.5 * 1e3;
        assert!(heavy_ms / 1e3 < config.target_frame_time() * config.emergency_threshold);
        let mut controller = ResolutionController::new(config);
        let mut now = Instant::now();

        let initial = controller.current_scale();
        let final_scale = run_frames(&mut controller, heavy_ms, 1200, &mut now);
        assert!(controller.is_locked(), "controller must settle into Locked");
        assert!(final_scale <= initial);
        assert!(
            (final_scale - controller.target_scale()).abs() < SCALE_SNAP_EPSILON,
            "applied scale must have settled onto the target"
        );
        assert!(
            controller.oscillations() == 0,
            "monotone overload must not produce reversals"
        );
    }

    #[test]
    fn steady_in_band_load_locks_at_full_scale() {
        let config = ControllerConfig::default();
        let in_band_ms = config.budget() * 0.95 * 1e3;
        let mut controller = ResolutionController::new(config);
        let mut now = Instant::now();
        run_frames(&mut controller, in_band_ms, 400, &mut now);
        assert!(controller.is_locked());
        assert_eq!(controller.target_scale(), 1.0);
    }

    #[test]
    fn locked_scale_reopens_on_sustained_drift() {
        let config = ControllerConfig::default();
        let in_band_ms = config.budget() * 0.95 * 1e3;
        let heavy_ms = config.budget() * 1.3 * 1e3;
        let mut controller = ResolutionController::new(config);
        let mut now = Instant::now();
        run_frames(&mut controller, in_band_ms, 400, &mut now);
        assert!(controller.is_locked());

        // 1.3x budget exceeds threshold_down * drift factor once enough of
        // the history has turned over.
        run_frames(&mut controller, heavy_ms, 200, &mut now);
        assert!(!controller.is_locked());
    }

    #[test]
    fn single_catastrophic_frame_cuts_two_levels_immediately() {
        let config = ControllerConfig::default();
        let trip_ms = config.target_frame_time() * config.emergency_threshold * 1.1 * 1e3;
        let mut controller = ResolutionController::new(config);
        let mut now = Instant::now();

        run_frames(&mut controller, 16.0, 4, &mut now);
        assert_eq!(controller.target_scale(), 1.0);

        now += millis(trip_ms);
        controller.update(millis(trip_ms), now);
        assert!(controller.is_emergency());
        assert!(
            controller.target_scale() <= 0.80 + SCALE_SNAP_EPSILON,
            "two quantized levels below 1.0, got {}",
            controller.target_scale()
        );
    }

    #[test]
    fn emergency_clears_after_recovery() {
        let config = ControllerConfig::default();
        let trip_ms = config.target_frame_time() * config.emergency_threshold * 1.1 * 1e3;
        let mut controller = ResolutionController::new(config);
        let mut now = Instant::now();

        now += millis(trip_ms);
        controller.update(millis(trip_ms), now);
        assert!(controller.is_emergency());

        run_frames(&mut controller, 8.0, 120, &mut now);
        assert!(!controller.is_emergency());
    }

    #[test]
    fn out_of_range_samples_are_discarded() {
        let mut controller = ResolutionController::new(ControllerConfig::default());
        let mut now = Instant::now();
        for _ in 0..50 {
            now += millis(16.0);
            controller.update(Duration::ZERO, now);
            controller.update(Duration::from_secs(5), now);
        }
        // Nothing valid was measured, so the controller never leaves
        // calibration and never moves the scale.
        assert_eq!(controller.mode(), ControllerMode::Calibrating);
        assert_eq!(controller.current_scale(), 1.0);
        assert!(controller.measured_frame_time().is_none());
    }

    #[test]
    fn three_reversals_force_a_lock() {
        // Two coarse levels and a workload whose cost follows scale² puts
        // every allowed scale outside the stable band, so the controller can
        // only flip direction on each adjustment until damping locks it.
        let config = ControllerConfig {
            stable_frames_to_lock: 100_000,
            quantized_levels: vec![0.5, 1.0],
            min_scale: 0.5,
            down_cooldown: 0.0,
            up_cooldown: 0.0,
            min_under_budget_run: 1,
            percentile: 0.5,
            emergency_threshold: 100.0,
            ..ControllerConfig::default()
        };
        let mut controller = ResolutionController::new(config);
        let mut now = Instant::now();

        let mut locked_after = None;
        for frame in 0..5000 {
            let scale = controller.current_scale();
            // 18ms at full scale: over budget at 1.0, far under at 0.5.
            let frame_ms = 18.0 * scale * scale;
            now += millis(frame_ms.max(1.0));
            controller.update(millis(frame_ms.max(1.0)), now);
            if controller.is_locked() {
                locked_after = Some(frame);
                break;
            }
        }

        assert!(
            locked_after.is_some(),
            "oscillating workload must be forced into Locked, oscillations={}",
            controller.oscillations()
        );
        assert!(controller.oscillations() >= REVERSALS_TO_LOCK);
    }

    #[test]
    fn thermal_throttle_biases_down_and_suppresses_growth() {
        let mut controller = ResolutionController::new(ControllerConfig::default());
        let mut now = Instant::now();
        run_frames(&mut controller, 8.0, 60, &mut now);
        assert_eq!(controller.target_scale(), 1.0);

        controller.submit_temperature(90.0);
        assert!(controller.is_throttling());
        run_frames(&mut controller, 8.0, 200, &mut now);
        assert!(
            controller.target_scale() < 1.0,
            "throttling must bias the target below full scale"
        );

        controller.submit_temperature(70.0);
        assert!(!controller.is_throttling());
    }

    #[test]
    fn unlock_resumes_regulation() {
        let config = ControllerConfig::default();
        let budget_ms = config.budget() * 1e3;
        let mut controller = ResolutionController::new(config);
        let mut now = Instant::now();
        run_frames(&mut controller, budget_ms, 400, &mut now);
        assert!(controller.is_locked());
        controller.unlock();
        assert_eq!(controller.mode(), ControllerMode::Normal);
    }

    #[test]
    fn config_deserializes_from_partial_toml() {
        let config: ControllerConfig = toml::from_str("target_fps = 120.0").unwrap();
        assert_eq!(config.target_fps, 120.0);
        assert_eq!(config.min_scale, ControllerConfig::default().min_scale);

        let defaults: ControllerConfig = toml::from_str("").unwrap();
        assert_eq!(defaults, ControllerConfig::default());
    }
}
