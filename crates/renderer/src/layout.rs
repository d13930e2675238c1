//! CPU-side bookkeeping of pass dimensions and texture allocations.
//!
//! Kept free of GPU types so the resize arithmetic, including the "same
//! size is a no-op" contract, is testable without a device. `PassGraph`
//! mirrors every reallocation this module reports.

use multipass::PassKind;

use crate::SurfaceSize;

/// Dimensions tracked for one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PassExtent {
    pub kind: PassKind,
    pub width: u32,
    pub height: u32,
}

/// Size plan for the whole graph plus an allocation counter covering every
/// ping-pong texture ever created.
#[derive(Debug, Clone)]
pub(crate) struct GraphLayout {
    pub scale: f32,
    pub output: SurfaceSize,
    pub extents: Vec<PassExtent>,
    pub allocations: u64,
}

/// Render dimensions for a pass: buffers shrink with the scale, the Image
/// pass always covers the full output.
pub(crate) fn pass_extent(kind: PassKind, scale: f32, output: SurfaceSize) -> (u32, u32) {
    if kind.is_buffer() {
        (scaled_dimension(output.width, scale), scaled_dimension(output.height, scale))
    } else {
        (output.width.max(1), output.height.max(1))
    }
}

fn scaled_dimension(size: u32, scale: f32) -> u32 {
    ((size as f32 * scale).round() as u32).max(1)
}

impl GraphLayout {
    pub fn new(kinds: &[PassKind], scale: f32, output: SurfaceSize) -> Self {
        let extents = kinds
            .iter()
            .map(|&kind| {
                let (width, height) = pass_extent(kind, scale, output);
                PassExtent { kind, width, height }
            })
            .collect::<Vec<_>>();
        let allocations = extents.iter().filter(|extent| extent.kind.is_buffer()).count() as u64 * 2;
        Self {
            scale,
            output,
            extents,
            allocations,
        }
    }

    /// Applies a new scale and output size. Returns the indices of buffer
    /// passes whose textures must be reallocated; an unchanged plan returns
    /// an empty list and allocates nothing.
    pub fn apply(&mut self, scale: f32, output: SurfaceSize) -> Vec<usize> {
        self.scale = scale;
        self.output = output;
        let mut changed = Vec::new();
        for (index, extent) in self.extents.iter_mut().enumerate() {
            let (width, height) = pass_extent(extent.kind, scale, output);
            if width == extent.width && height == extent.height {
                continue;
            }
            extent.width = width;
            extent.height = height;
            if extent.kind.is_buffer() {
                // Two textures per ping-pong pair.
                self.allocations += 2;
                changed.push(index);
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds() -> Vec<PassKind> {
        vec![PassKind::BufferA, PassKind::BufferB, PassKind::Image]
    }

    #[test]
    fn buffers_scale_and_image_stays_full_size() {
        let layout = GraphLayout::new(&kinds(), 0.5, SurfaceSize::new(1920, 1080));
        assert_eq!(layout.extents[0].width, 960);
        assert_eq!(layout.extents[0].height, 540);
        assert_eq!(layout.extents[2].width, 1920);
        assert_eq!(layout.extents[2].height, 1080);
    }

    #[test]
    fn resize_to_identical_plan_is_a_no_op() {
        let mut layout = GraphLayout::new(&kinds(), 0.5, SurfaceSize::new(1920, 1080));
        let before = layout.allocations;
        let changed = layout.apply(0.5, SurfaceSize::new(1920, 1080));
        assert!(changed.is_empty());
        assert_eq!(layout.allocations, before);
    }

    #[test]
    fn sub_pixel_scale_change_does_not_reallocate() {
        let mut layout = GraphLayout::new(&kinds(), 0.5, SurfaceSize::new(1920, 1080));
        let before = layout.allocations;
        // 0.5001 rounds to the same pixel dimensions.
        let changed = layout.apply(0.5001, SurfaceSize::new(1920, 1080));
        assert!(changed.is_empty());
        assert_eq!(layout.allocations, before);
    }

    #[test]
    fn scale_change_reallocates_buffer_passes_only() {
        let mut layout = GraphLayout::new(&kinds(), 1.0, SurfaceSize::new(1920, 1080));
        let before = layout.allocations;
        let changed = layout.apply(0.5, SurfaceSize::new(1920, 1080));
        assert_eq!(changed, vec![0, 1]);
        assert_eq!(layout.allocations, before + 4);
    }

    #[test]
    fn output_resize_touches_every_pass_but_counts_buffers() {
        let mut layout = GraphLayout::new(&kinds(), 1.0, SurfaceSize::new(1920, 1080));
        let before = layout.allocations;
        let changed = layout.apply(1.0, SurfaceSize::new(2560, 1440));
        assert_eq!(changed, vec![0, 1]);
        assert_eq!(layout.allocations, before + 4);
        assert_eq!(layout.extents[2].width, 2560);
    }

    #[test]
    fn dimensions_never_collapse_to_zero() {
        let layout = GraphLayout::new(&kinds(), 0.25, SurfaceSize::new(2, 2));
        assert!(layout.extents.iter().all(|e| e.width >= 1 && e.height >= 1));
    }

    #[test]
    fn initial_allocations_count_ping_pong_pairs() {
        let layout = GraphLayout::new(&kinds(), 1.0, SurfaceSize::new(800, 600));
        assert_eq!(layout.allocations, 4);
    }
}
