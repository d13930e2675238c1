//! Per-frame driver: feeds the resolution controller, resizes the graph when
//! the applied scale moves, and renders the passes in order.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use adaptive::{ControllerConfig, ResolutionController};

use crate::graph::{GraphError, PassGraph};
use crate::uniforms::FrameContext;
use crate::SurfaceSize;

/// Scale deltas below this are absorbed instead of reallocating textures.
const SCALE_EPSILON: f32 = 0.005;

/// Frame-time overruns past this multiple of the target are worth a warning.
const OVERRUN_WARN_FACTOR: f32 = 2.0;

/// Executor tuning; flat and serde-friendly like [`ControllerConfig`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorOptions {
    pub controller: ControllerConfig,
}

/// Per-frame inputs from the embedding daemon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInput {
    /// Shader time override in seconds; `None` uses the internal clock.
    /// Stills and tests pin this to a fixed value.
    pub time_override: Option<f32>,
    /// ShaderToy `iMouse` tuple: x, y, click x, click y.
    pub mouse: [f32; 4],
}

impl Default for FrameInput {
    fn default() -> Self {
        Self {
            time_override: None,
            mouse: [0.0; 4],
        }
    }
}

/// Snapshot for UI overlays and diagnostics, queryable at any time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Telemetry {
    pub fps: f32,
    pub current_scale: f32,
    pub target_scale: f32,
    pub locked: bool,
    pub emergency: bool,
    /// All passes compiled and GPU resources allocated.
    pub ready: bool,
}

/// Owns a [`PassGraph`] plus the adaptive controller and the frame clock.
///
/// Everything runs on the caller's render thread; the executor never spawns
/// work of its own.
pub struct FrameExecutor {
    graph: PassGraph,
    controller: ResolutionController,
    target_frame_time: f32,
    start_time: Instant,
    last_frame_time: Option<Instant>,
    frame_count: u32,
    last_fps_update: Instant,
    frames_since_last_update: u32,
    frames_per_second: f32,
}

impl FrameExecutor {
    pub fn new(graph: PassGraph, options: ExecutorOptions) -> Self {
        let now = Instant::now();
        Self {
            graph,
            target_frame_time: options.controller.target_frame_time(),
            controller: ResolutionController::new(options.controller),
            start_time: now,
            last_frame_time: None,
            frame_count: 0,
            last_fps_update: now,
            frames_since_last_update: 0,
            frames_per_second: 0.0,
        }
    }

    pub fn graph(&self) -> &PassGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut PassGraph {
        &mut self.graph
    }

    pub fn controller(&self) -> &ResolutionController {
        &self.controller
    }

    /// Optional thermal input forwarded to the controller.
    pub fn submit_temperature(&mut self, celsius: f32) {
        self.controller.submit_temperature(celsius);
    }

    /// Swaps in a new graph (shader change); controller history describes the
    /// old workload, so regulation restarts from calibration.
    pub fn replace_graph(&mut self, graph: PassGraph) {
        self.graph = graph;
        self.controller.reset();
        self.start_time = Instant::now();
        self.last_frame_time = None;
        self.frame_count = 0;
    }

    /// Propagates a window/output resize at the current scale.
    pub fn resize_output(&mut self, device: &wgpu::Device, output: SurfaceSize) {
        self.graph.resize(device, self.graph.scale(), output);
    }

    pub fn telemetry(&self) -> Telemetry {
        Telemetry {
            fps: self.frames_per_second,
            current_scale: self.controller.current_scale(),
            target_scale: self.controller.target_scale(),
            locked: self.controller.is_locked(),
            emergency: self.controller.is_emergency(),
            ready: self.graph.is_ready(),
        }
    }

    /// Renders one frame into `surface_view`.
    ///
    /// The controller consumes the wall-clock duration of the *previous*
    /// frame, so scale decisions for frame N are based on data measured
    /// through frame N-1.
    pub fn render_frame(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_view: &wgpu::TextureView,
        input: FrameInput,
    ) -> Result<(), GraphError> {
        let now = Instant::now();
        let delta = self
            .last_frame_time
            .map(|last| now.saturating_duration_since(last));
        self.last_frame_time = Some(now);

        let scale = match delta {
            Some(delta) => {
                let overrun =
                    Duration::from_secs_f32(self.target_frame_time * OVERRUN_WARN_FACTOR);
                if delta > overrun {
                    warn!(
                        frame_ms = delta.as_millis() as u64,
                        scale = self.controller.current_scale(),
                        "frame ran well past the target interval"
                    );
                }
                self.controller.update(delta, now)
            }
            None => self.controller.current_scale(),
        };

        if (scale - self.graph.scale()).abs() > SCALE_EPSILON {
            self.graph.resize(device, scale, self.graph.output());
        }

        if !self.graph.is_ready() {
            trace!("graph not ready; skipping frame");
            return Err(GraphError::NotReady(
                self.graph.compile_report().unwrap_or_default(),
            ));
        }

        let elapsed = now.duration_since(self.start_time).as_secs_f32();
        let frame = FrameContext {
            time: input.time_override.unwrap_or(elapsed),
            time_delta: delta.map(|d| d.as_secs_f32()).unwrap_or(0.0),
            frame_index: self.frame_count,
            mouse: input.mouse,
        };
        self.graph.render(device, queue, surface_view, &frame)?;
        self.frame_count = self.frame_count.saturating_add(1);

        self.frames_since_last_update += 1;
        let since_fps_update = now.saturating_duration_since(self.last_fps_update);
        if since_fps_update >= Duration::from_secs(1) {
            self.frames_per_second =
                self.frames_since_last_update as f32 / since_fps_update.as_secs_f32();
            self.frames_since_last_update = 0;
            self.last_fps_update = now;
            debug!(
                fps = self.frames_per_second.round(),
                scale = self.controller.current_scale(),
                target = self.controller.target_scale(),
                locked = self.controller.is_locked(),
                allocations = self.graph.allocation_count(),
                "render stats"
            );
        }

        Ok(())
    }
}
