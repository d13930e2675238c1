//! CPU-side mirror of the per-pass uniform block.
//!
//! The layout matches the `PassParams` block injected by `compile.rs` and
//! follows strict std140 rules: naga packs the `float` members into the
//! `vec3 _iResolution` tail, so no mirror tricks are needed.

use bytemuck::{Pod, Zeroable};
use chrono::{Datelike, Local, Timelike};

use multipass::CHANNEL_COUNT;

/// Per-frame inputs the embedding daemon feeds the executor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameContext {
    /// Shader time in seconds.
    pub time: f32,
    /// Seconds since the previous frame.
    pub time_delta: f32,
    /// Monotonic frame counter.
    pub frame_index: u32,
    /// ShaderToy `iMouse`: current x/y, pressed-anchor x/y, in pixels.
    pub mouse: [f32; 4],
}

#[repr(C, align(16))]
#[derive(Clone, Copy)]
pub(crate) struct PassUniforms {
    resolution: [f32; 3],
    time: f32,
    time_delta: f32,
    frame: i32,
    sample_rate: f32,
    _padding0: f32,
    mouse: [f32; 4],
    date: [f32; 4],
    channel_time: [[f32; 4]; CHANNEL_COUNT],
    channel_resolution: [[f32; 4]; CHANNEL_COUNT],
}

unsafe impl Zeroable for PassUniforms {}
unsafe impl Pod for PassUniforms {}

impl PassUniforms {
    pub fn new(width: u32, height: u32) -> Self {
        let mut uniforms = Self {
            resolution: [0.0; 3],
            time: 0.0,
            time_delta: 0.0,
            frame: 0,
            sample_rate: 44100.0,
            _padding0: 0.0,
            mouse: [0.0; 4],
            date: [0.0; 4],
            channel_time: [[0.0; 4]; CHANNEL_COUNT],
            channel_resolution: [[0.0; 4]; CHANNEL_COUNT],
        };
        uniforms.set_resolution(width, height);
        uniforms.refresh_date();
        uniforms
    }

    /// Writes the pass's own render dimensions into `iResolution`.
    pub fn set_resolution(&mut self, width: u32, height: u32) {
        self.resolution = [width.max(1) as f32, height.max(1) as f32, 1.0];
    }

    pub fn set_channel_resolution(&mut self, channel: usize, width: f32, height: f32) {
        if let Some(slot) = self.channel_resolution.get_mut(channel) {
            *slot = [width, height, 1.0, 0.0];
        }
    }

    /// Advances the time-dependent members for the frame being encoded.
    pub fn advance(&mut self, frame: &FrameContext) {
        self.time = frame.time;
        self.time_delta = frame.time_delta;
        self.frame = frame.frame_index.min(i32::MAX as u32) as i32;
        self.mouse = frame.mouse;
        for channel in &mut self.channel_time {
            channel[0] = frame.time;
        }
        self.refresh_date();
    }

    fn refresh_date(&mut self) {
        let local_now = Local::now();
        let seconds_since_midnight = local_now.num_seconds_from_midnight() as f32
            + local_now.nanosecond() as f32 / 1_000_000_000.0;
        self.date = [
            local_now.year() as f32,
            local_now.month() as f32,
            local_now.day() as f32,
            seconds_since_midnight,
        ];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_block_matches_std140_size() {
        // vec3+float, 4 scalars, 2 vec4s, 2 arrays of 4 vec4-strided slots.
        assert_eq!(std::mem::size_of::<PassUniforms>(), 192);
        assert_eq!(std::mem::align_of::<PassUniforms>(), 16);
    }

    #[test]
    fn advance_updates_time_and_channel_time() {
        let mut uniforms = PassUniforms::new(640, 480);
        uniforms.advance(&FrameContext {
            time: 2.5,
            time_delta: 0.016,
            frame_index: 41,
            mouse: [10.0, 20.0, 0.0, 0.0],
        });
        assert_eq!(uniforms.time, 2.5);
        assert_eq!(uniforms.frame, 41);
        assert!(uniforms.channel_time.iter().all(|slot| slot[0] == 2.5));
    }

    #[test]
    fn zero_dimensions_are_clamped() {
        let uniforms = PassUniforms::new(0, 0);
        assert_eq!(uniforms.resolution[0], 1.0);
        assert_eq!(uniforms.resolution[1], 1.0);
    }
}
