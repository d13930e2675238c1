//! Multipass shader analysis for Glowpaper.
//!
//! ShaderToy distributes a multipass shader as one text blob: a shared
//! "Common" section followed by up to four buffer passes and a final Image
//! pass, each introduced by its own `void mainImage(...)` entry point. This
//! crate turns that blob into a structured description the renderer can
//! allocate GPU resources for:
//!
//! ```text
//!   raw GLSL text ──▶ split_source() ──▶ SplitShader { common, passes }
//!                                              │
//!                                              ▼
//!                            resolve_channels() per pass
//!                                              │
//!                                              ▼
//!                              [ChannelBinding; 4] per pass
//! ```
//!
//! Everything here is plain text analysis: no GPU types, no I/O. Channel
//! resolution is a heuristic classifier over the pass body (ShaderToy pastes
//! carry no binding metadata), so its output is a best-effort guess that the
//! renderer treats as authoritative for the lifetime of the shader.

mod channels;
mod split;

pub use channels::{resolve_channels, score_channel, ChannelBinding, ChannelScores};
pub use split::{split_source, PassSource, SplitError, SplitShader};

/// ShaderToy exposes four optional input channels (`iChannel0-3`).
pub const CHANNEL_COUNT: usize = 4;

/// Largest number of passes one shader may declare: Buffer A-D plus Image.
pub const MAX_PASSES: usize = 5;

/// Logical role of one pass inside the render graph.
///
/// The declaration order doubles as the fixed execution order: buffers render
/// A through D, then Image presents. Deriving `Ord` keeps that contract in
/// one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PassKind {
    BufferA,
    BufferB,
    BufferC,
    BufferD,
    Image,
}

impl PassKind {
    /// Buffer kinds in execution order, excluding Image.
    pub const BUFFERS: [PassKind; 4] = [
        PassKind::BufferA,
        PassKind::BufferB,
        PassKind::BufferC,
        PassKind::BufferD,
    ];

    /// True for the offscreen buffer passes, false for Image.
    pub fn is_buffer(self) -> bool {
        !matches!(self, PassKind::Image)
    }

    /// Short label used in diagnostics and compile reports.
    pub fn label(self) -> &'static str {
        match self {
            PassKind::BufferA => "Buffer A",
            PassKind::BufferB => "Buffer B",
            PassKind::BufferC => "Buffer C",
            PassKind::BufferD => "Buffer D",
            PassKind::Image => "Image",
        }
    }
}

impl std::fmt::Display for PassKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_kinds_order_matches_execution_order() {
        let mut kinds = vec![
            PassKind::Image,
            PassKind::BufferC,
            PassKind::BufferA,
            PassKind::BufferD,
            PassKind::BufferB,
        ];
        kinds.sort();
        assert_eq!(
            kinds,
            vec![
                PassKind::BufferA,
                PassKind::BufferB,
                PassKind::BufferC,
                PassKind::BufferD,
                PassKind::Image,
            ]
        );
    }

    #[test]
    fn image_is_not_a_buffer() {
        assert!(!PassKind::Image.is_buffer());
        assert!(PassKind::BUFFERS.iter().all(|kind| kind.is_buffer()));
    }
}
