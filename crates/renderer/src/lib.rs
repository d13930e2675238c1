//! Multipass rendering core for Glowpaper.
//!
//! The crate turns one ShaderToy-style text blob into a dependency-ordered
//! render graph and drives it under a frame-time budget:
//!
//! ```text
//!   shader text ──▶ multipass::split_source ──▶ PassGraph::new
//!                                                    │
//!        frame delta ──▶ adaptive controller ──▶ FrameExecutor::render_frame
//!                              ▲                     │
//!                              └── measured N-1 ◀────┘ Buffer A→B→C→D→Image
//! ```
//!
//! `PassGraph` owns pipelines, ping-pong texture pairs, the shared noise
//! texture, and per-pass uniforms. `FrameExecutor` owns the wall clock and
//! the [`adaptive::ResolutionController`], resizing buffer textures whenever
//! the applied scale moves materially. `GpuContext` is the optional bootstrap
//! for embedders that bring only a raw window handle.
//!
//! Everything is strictly single-threaded on the caller's render thread: no
//! locks, no background work, GPU submission is the only implicit blocking.

mod channels;
mod compile;
mod context;
mod executor;
mod graph;
mod layout;
mod uniforms;

pub use compile::CompileError;
pub use context::GpuContext;
pub use executor::{ExecutorOptions, FrameExecutor, FrameInput, Telemetry};
pub use graph::{GraphError, PassGraph};
pub use uniforms::FrameContext;

/// Output dimensions in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl From<(u32, u32)> for SurfaceSize {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_size_from_tuple() {
        assert_eq!(SurfaceSize::from((1920, 1080)), SurfaceSize::new(1920, 1080));
    }

    #[test]
    fn executor_options_deserialize_with_nested_controller() {
        let options: ExecutorOptions = toml::from_str(
            r#"
[controller]
target_fps = 30.0
min_scale = 0.5
"#,
        )
        .unwrap();
        assert_eq!(options.controller.target_fps, 30.0);
        assert_eq!(options.controller.min_scale, 0.5);
        assert_eq!(
            options.controller.max_scale,
            adaptive::ControllerConfig::default().max_scale
        );
    }
}
