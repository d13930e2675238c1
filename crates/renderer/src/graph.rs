//! The multipass render graph: one pipeline per pass, ping-pong texture
//! pairs for buffers, and fixed Buffer A→B→C→D→Image execution.
//!
//! Ordering contract: a buffer pass renders into the texture opposite its
//! current read index and swaps immediately after its draw is encoded.
//! Within one frame, later passes therefore consume *this* frame's output of
//! earlier passes, while self-feedback and backward references observe the
//! previous frame. This is the ShaderToy-compatible schedule, not a general
//! dependency solver, and a pass never reads the texture it is writing.

use anyhow::Result;
use tracing::{debug, trace, warn};
use wgpu::util::DeviceExt;

use multipass::{
    resolve_channels, split_source, ChannelBinding, PassKind, SplitError, SplitShader,
    CHANNEL_COUNT,
};

use crate::channels::{
    create_external_texture, create_noise_texture, create_samplers, ChannelSamplers,
    ExternalTexture, NoiseTexture, NOISE_TEXTURE_SIZE,
};
use crate::compile::{
    create_fragment_module, create_vertex_module, validate_fragment, wrap_pass_fragment,
};
use crate::layout::GraphLayout;
use crate::uniforms::{FrameContext, PassUniforms};
use crate::SurfaceSize;

/// Offscreen buffer passes render into half-float targets so feedback loops
/// can accumulate values outside [0, 1].
const BUFFER_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Seed for the shared noise texture; fixed so identical shaders render
/// identically across runs.
const NOISE_SEED: u64 = 0x5eed_cafe;

/// Fatal graph construction and execution errors. Per-pass compile failures
/// are *not* here: they are captured on the pass and surfaced through
/// [`PassGraph::compile_report`].
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error(transparent)]
    Split(#[from] SplitError),
    #[error("shader defines no image pass")]
    MissingImagePass,
    #[error("shader defines more than one image pass")]
    DuplicateImagePass,
    #[error("render graph is not ready: {0}")]
    NotReady(String),
}

/// Read/write alternation for one ping-pong pair, kept separate from the
/// GPU objects so the invariant is testable on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PingPongIndex {
    read: usize,
}

impl PingPongIndex {
    pub fn new() -> Self {
        Self { read: 0 }
    }

    /// Texture holding the most recently completed frame for this buffer.
    pub fn read(&self) -> usize {
        self.read
    }

    /// Texture the next draw targets; always the opposite of `read`.
    pub fn write(&self) -> usize {
        1 - self.read
    }

    /// Called after a draw completes: the just-written texture becomes the
    /// read side for every subsequent consumer.
    pub fn swap(&mut self) {
        self.read = 1 - self.read;
    }
}

struct PingPong {
    _textures: [wgpu::Texture; 2],
    views: [wgpu::TextureView; 2],
    index: PingPongIndex,
}

impl PingPong {
    fn new(device: &wgpu::Device, kind: PassKind, width: u32, height: u32) -> Self {
        let make = |slot: usize| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(&format!("{kind} ping-pong #{slot}")),
                size: wgpu::Extent3d {
                    width: width.max(1),
                    height: height.max(1),
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: BUFFER_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
        };
        let textures = [make(0), make(1)];
        let views = [
            textures[0].create_view(&wgpu::TextureViewDescriptor::default()),
            textures[1].create_view(&wgpu::TextureViewDescriptor::default()),
        ];
        Self {
            _textures: textures,
            views,
            index: PingPongIndex::new(),
        }
    }

    fn read_view(&self) -> &wgpu::TextureView {
        &self.views[self.index.read()]
    }

    fn write_view(&self) -> &wgpu::TextureView {
        &self.views[self.index.write()]
    }
}

/// One compiled stage of the graph.
struct Pass {
    kind: PassKind,
    bindings: [ChannelBinding; CHANNEL_COUNT],
    pipeline: Option<wgpu::RenderPipeline>,
    compile_error: Option<String>,
    /// Ping-pong pair; `None` for the Image pass, which renders to the
    /// caller's surface.
    textures: Option<PingPong>,
    needs_clear: bool,
    uniforms: PassUniforms,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
}

struct PipelineLayouts {
    uniform_layout: wgpu::BindGroupLayout,
    channel_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    vertex_module: wgpu::ShaderModule,
}

impl PipelineLayouts {
    fn new(device: &wgpu::Device) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pass uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let mut channel_entries = Vec::with_capacity(CHANNEL_COUNT * 2);
        for index in 0..CHANNEL_COUNT {
            channel_entries.push(wgpu::BindGroupLayoutEntry {
                binding: (index as u32) * 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
            channel_entries.push(wgpu::BindGroupLayoutEntry {
                binding: (index as u32) * 2 + 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }
        let channel_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pass channel layout"),
            entries: &channel_entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pass pipeline layout"),
            bind_group_layouts: &[&uniform_layout, &channel_layout],
            push_constant_ranges: &[],
        });

        let vertex_module = create_vertex_module(device);

        Self {
            uniform_layout,
            channel_layout,
            pipeline_layout,
            vertex_module,
        }
    }
}

/// Owns every GPU object of one compiled multipass shader.
///
/// Dropping the graph releases programs, textures, and buffers together;
/// passes that failed to compile simply hold `None` where their pipeline
/// would be, so teardown of a partially built graph never touches absent
/// resources.
pub struct PassGraph {
    passes: Vec<Pass>,
    image_index: usize,
    layout: GraphLayout,
    layouts: PipelineLayouts,
    samplers: ChannelSamplers,
    noise: NoiseTexture,
    externals: [Option<ExternalTexture>; CHANNEL_COUNT],
    surface_format: wgpu::TextureFormat,
}

impl PassGraph {
    /// Splits, classifies, and compiles `source` into a render graph sized
    /// for `output` at `initial_scale`.
    ///
    /// Construction fails before any GPU allocation when the source cannot
    /// be split or does not contain exactly one Image pass. Individual pass
    /// compile failures do not fail construction; they leave the graph not
    /// ready and their diagnostics in [`Self::compile_report`].
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        source: &str,
        output: SurfaceSize,
        surface_format: wgpu::TextureFormat,
        initial_scale: f32,
    ) -> Result<Self, GraphError> {
        let mut split = split_source(source)?;
        validate_pass_plan(&split)?;
        // Execution order is fixed regardless of textual order.
        split.passes.sort_by_key(|pass| pass.kind);

        let layouts = PipelineLayouts::new(device);
        let samplers = create_samplers(device);
        let noise = create_noise_texture(device, queue, NOISE_SEED);

        let kinds: Vec<PassKind> = split.passes.iter().map(|pass| pass.kind).collect();
        let layout = GraphLayout::new(&kinds, initial_scale, output);

        let mut passes = Vec::with_capacity(split.passes.len());
        for (index, pass_source) in split.passes.iter().enumerate() {
            let bindings = resolve_channels(pass_source.kind, &pass_source.body);
            let wrapped = wrap_pass_fragment(&split.common, &pass_source.body);

            let (pipeline, compile_error) = match validate_fragment(&wrapped) {
                Ok(()) => {
                    let label = format!("{} fragment", pass_source.kind);
                    let module = create_fragment_module(device, &label, wrapped);
                    let target = if pass_source.kind.is_buffer() {
                        BUFFER_FORMAT
                    } else {
                        surface_format
                    };
                    (
                        Some(create_pass_pipeline(device, &layouts, &module, target)),
                        None,
                    )
                }
                Err(error) => {
                    warn!(pass = %pass_source.kind, %error, "pass failed to compile");
                    (None, Some(error.to_string()))
                }
            };

            let extent = layout.extents[index];
            let textures = pass_source
                .kind
                .is_buffer()
                .then(|| PingPong::new(device, pass_source.kind, extent.width, extent.height));

            let uniforms = PassUniforms::new(extent.width, extent.height);
            let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} uniforms", pass_source.kind)),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
            let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("{} uniform bind group", pass_source.kind)),
                layout: &layouts.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });

            passes.push(Pass {
                kind: pass_source.kind,
                bindings,
                pipeline,
                compile_error,
                textures,
                needs_clear: true,
                uniforms,
                uniform_buffer,
                uniform_bind_group,
            });
        }

        let image_index = passes
            .iter()
            .position(|pass| pass.kind == PassKind::Image)
            .ok_or(GraphError::MissingImagePass)?;

        debug!(
            passes = passes.len(),
            scale = initial_scale,
            width = output.width,
            height = output.height,
            ready = passes.iter().all(|pass| pass.pipeline.is_some()),
            "built multipass render graph"
        );

        Ok(Self {
            passes,
            image_index,
            layout,
            layouts,
            samplers,
            noise,
            externals: Default::default(),
            surface_format,
        })
    }

    /// True once every pass holds a compiled pipeline.
    pub fn is_ready(&self) -> bool {
        self.passes.iter().all(|pass| pass.pipeline.is_some())
    }

    /// Aggregated compile diagnostics across all failing passes, or `None`
    /// when everything compiled.
    pub fn compile_report(&self) -> Option<String> {
        let mut report = String::new();
        for pass in &self.passes {
            if let Some(error) = &pass.compile_error {
                report.push_str(&format!("{}: {error}\n", pass.kind));
            }
        }
        (!report.is_empty()).then_some(report)
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn scale(&self) -> f32 {
        self.layout.scale
    }

    pub fn output(&self) -> SurfaceSize {
        self.layout.output
    }

    /// Total ping-pong textures allocated over the graph's lifetime.
    pub fn allocation_count(&self) -> u64 {
        self.layout.allocations
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_format
    }

    /// Registers decoded RGBA pixels for a channel bound as
    /// [`ChannelBinding::External`]. Until registered, external channels
    /// sample noise.
    pub fn set_external_channel(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        channel: usize,
        rgba: &[u8],
        width: u32,
        height: u32,
    ) -> Result<()> {
        anyhow::ensure!(
            channel < CHANNEL_COUNT,
            "channel {channel} exceeds supported channel count ({CHANNEL_COUNT})"
        );
        self.externals[channel] = Some(create_external_texture(
            device, queue, channel, rgba, width, height,
        )?);
        Ok(())
    }

    /// Applies a new render scale and output size. Reallocates only the
    /// buffer passes whose pixel dimensions actually changed; a resize to
    /// the current plan is a no-op, observable via [`Self::allocation_count`].
    pub fn resize(&mut self, device: &wgpu::Device, scale: f32, output: SurfaceSize) {
        let changed = self.layout.apply(scale, output);
        for &index in &changed {
            let extent = self.layout.extents[index];
            let pass = &mut self.passes[index];
            pass.textures = Some(PingPong::new(device, pass.kind, extent.width, extent.height));
            // Fresh textures hold garbage as far as feedback is concerned.
            pass.needs_clear = true;
            pass.uniforms.set_resolution(extent.width, extent.height);
        }
        if let Some(extent) = self.layout.extents.get(self.image_index) {
            self.passes[self.image_index]
                .uniforms
                .set_resolution(extent.width, extent.height);
        }
        if !changed.is_empty() {
            debug!(
                scale,
                width = output.width,
                height = output.height,
                reallocated = changed.len(),
                allocations = self.layout.allocations,
                "resized buffer textures"
            );
        }
    }

    /// Renders every pass in fixed order into `surface_view`.
    ///
    /// Fails with [`GraphError::NotReady`] while any pass is uncompiled; the
    /// caller decides whether to fall back or surface the compile report.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_view: &wgpu::TextureView,
        frame: &FrameContext,
    ) -> Result<(), GraphError> {
        if !self.is_ready() {
            return Err(GraphError::NotReady(
                self.compile_report().unwrap_or_default(),
            ));
        }

        // Stage per-pass uniforms first; channel resolutions depend on an
        // immutable view of the whole graph.
        for index in 0..self.passes.len() {
            let extent = self.layout.extents[index];
            let channel_dims: [(f32, f32); CHANNEL_COUNT] =
                std::array::from_fn(|channel| self.channel_source_dims(index, channel));
            let pass = &mut self.passes[index];
            pass.uniforms.advance(frame);
            pass.uniforms.set_resolution(extent.width, extent.height);
            for (channel, (width, height)) in channel_dims.iter().enumerate() {
                pass.uniforms.set_channel_resolution(channel, *width, *height);
            }
            queue.write_buffer(
                &pass.uniform_buffer,
                0,
                bytemuck::bytes_of(&pass.uniforms),
            );
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("multipass encoder"),
        });

        for index in 0..self.passes.len() {
            if !self.passes[index].kind.is_buffer() {
                continue;
            }
            if self.passes[index].needs_clear {
                if let Some(pair) = &self.passes[index].textures {
                    // Both halves: the read side feeds self-feedback on the
                    // very next frame.
                    encode_clear(&mut encoder, &pair.views[0]);
                    encode_clear(&mut encoder, &pair.views[1]);
                }
                self.passes[index].needs_clear = false;
            }

            let channel_bind_group = self.channel_bind_group(device, index);
            {
                let pass = &self.passes[index];
                let (Some(pipeline), Some(pair)) = (&pass.pipeline, &pass.textures) else {
                    continue;
                };
                let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some(pass.kind.label()),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: pair.write_view(),
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    occlusion_query_set: None,
                    timestamp_writes: None,
                });
                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(0, &pass.uniform_bind_group, &[]);
                render_pass.set_bind_group(1, &channel_bind_group, &[]);
                render_pass.draw(0..3, 0..1);
            }
            // The freshly written texture becomes the read side for every
            // later consumer in this frame and for feedback next frame.
            if let Some(pair) = &mut self.passes[index].textures {
                pair.index.swap();
            }
        }

        let channel_bind_group = self.channel_bind_group(device, self.image_index);
        {
            let pass = &self.passes[self.image_index];
            let Some(pipeline) = &pass.pipeline else {
                return Err(GraphError::NotReady("image pass lost its pipeline".into()));
            };
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("image pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: surface_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, &pass.uniform_bind_group, &[]);
            render_pass.set_bind_group(1, &channel_bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }

        queue.submit(std::iter::once(encoder.finish()));
        trace!(frame = frame.frame_index, "submitted multipass frame");
        Ok(())
    }

    /// Builds the channel bind group for one pass against the graph's
    /// current read indices.
    fn channel_bind_group(&self, device: &wgpu::Device, index: usize) -> wgpu::BindGroup {
        let pass = &self.passes[index];
        let mut entries = Vec::with_capacity(CHANNEL_COUNT * 2);
        let slots: Vec<(&wgpu::TextureView, &wgpu::Sampler)> = pass
            .bindings
            .iter()
            .enumerate()
            .map(|(channel, binding)| self.channel_slot(pass, channel, *binding))
            .collect();
        for (channel, (view, sampler)) in slots.into_iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: (channel as u32) * 2,
                resource: wgpu::BindingResource::TextureView(view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: (channel as u32) * 2 + 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            });
        }
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{} channels", pass.kind)),
            layout: &self.layouts.channel_layout,
            entries: &entries,
        })
    }

    fn channel_slot<'a>(
        &'a self,
        pass: &'a Pass,
        channel: usize,
        binding: ChannelBinding,
    ) -> (&'a wgpu::TextureView, &'a wgpu::Sampler) {
        match binding {
            ChannelBinding::Buffer(kind) => (
                self.read_view_of(kind).unwrap_or(&self.noise.view),
                &self.samplers.clamp,
            ),
            ChannelBinding::SelfFeedback => (
                pass.textures
                    .as_ref()
                    .map(PingPong::read_view)
                    .unwrap_or(&self.noise.view),
                &self.samplers.clamp,
            ),
            ChannelBinding::External => (
                self.externals[channel]
                    .as_ref()
                    .map(|texture| &texture.view)
                    .unwrap_or(&self.noise.view),
                &self.samplers.clamp,
            ),
            ChannelBinding::Noise | ChannelBinding::Unbound => {
                (&self.noise.view, &self.samplers.repeat)
            }
        }
    }

    fn read_view_of(&self, kind: PassKind) -> Option<&wgpu::TextureView> {
        self.passes
            .iter()
            .find(|pass| pass.kind == kind)
            .and_then(|pass| pass.textures.as_ref())
            .map(PingPong::read_view)
    }

    /// Source dimensions reported through `iChannelResolution`.
    fn channel_source_dims(&self, index: usize, channel: usize) -> (f32, f32) {
        let noise = (NOISE_TEXTURE_SIZE as f32, NOISE_TEXTURE_SIZE as f32);
        match self.passes[index].bindings[channel] {
            ChannelBinding::Buffer(kind) => self
                .passes
                .iter()
                .position(|pass| pass.kind == kind && pass.textures.is_some())
                .map(|found| {
                    let extent = self.layout.extents[found];
                    (extent.width as f32, extent.height as f32)
                })
                .unwrap_or(noise),
            ChannelBinding::SelfFeedback => {
                let extent = self.layout.extents[index];
                (extent.width as f32, extent.height as f32)
            }
            ChannelBinding::External => self.externals[channel]
                .as_ref()
                .map(|texture| (texture.width as f32, texture.height as f32))
                .unwrap_or(noise),
            ChannelBinding::Noise | ChannelBinding::Unbound => noise,
        }
    }
}

/// Rejects plans the graph cannot execute before any GPU work happens.
fn validate_pass_plan(split: &SplitShader) -> Result<(), GraphError> {
    let image_count = split
        .passes
        .iter()
        .filter(|pass| pass.kind == PassKind::Image)
        .count();
    match image_count {
        0 => Err(GraphError::MissingImagePass),
        1 => Ok(()),
        _ => Err(GraphError::DuplicateImagePass),
    }
}

fn create_pass_pipeline(
    device: &wgpu::Device,
    layouts: &PipelineLayouts,
    fragment_module: &wgpu::ShaderModule,
    target_format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("pass pipeline"),
        layout: Some(&layouts.pipeline_layout),
        vertex: wgpu::VertexState {
            module: &layouts.vertex_module,
            entry_point: Some("main"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        fragment: Some(wgpu::FragmentState {
            module: fragment_module,
            entry_point: Some("main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: target_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    })
}

fn encode_clear(encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("buffer clear"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            depth_slice: None,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        occlusion_query_set: None,
        timestamp_writes: None,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_pong_never_reads_the_write_target() {
        let mut index = PingPongIndex::new();
        for _ in 0..100 {
            assert_ne!(index.read(), index.write());
            index.swap();
        }
    }

    #[test]
    fn texture_written_on_frame_n_is_read_on_frame_n_plus_one() {
        let mut index = PingPongIndex::new();
        for _ in 0..25 {
            let written = index.write();
            index.swap();
            // The consumer on the next frame (or later in this frame) reads
            // exactly the texture that was just written.
            assert_eq!(index.read(), written);
        }
    }

    #[test]
    fn plan_without_image_pass_is_rejected() {
        let source = r#"
// Buffer A
void mainImage(out vec4 c, in vec2 f) { c = vec4(0.0); }

// Buffer B
void mainImage(out vec4 c, in vec2 f) { c = vec4(1.0); }
"#;
        let split = split_source(source).unwrap();
        assert!(matches!(
            validate_pass_plan(&split),
            Err(GraphError::MissingImagePass)
        ));
    }

    #[test]
    fn plan_with_two_image_passes_is_rejected() {
        let source = r#"
// Image
void mainImage(out vec4 c, in vec2 f) { c = vec4(0.0); }

// Image
void mainImage(out vec4 c, in vec2 f) { c = vec4(1.0); }
"#;
        let split = split_source(source).unwrap();
        assert!(matches!(
            validate_pass_plan(&split),
            Err(GraphError::DuplicateImagePass)
        ));
    }

    #[test]
    fn single_pass_plan_is_accepted() {
        let split = split_source("void mainImage(out vec4 c, in vec2 f) { c = vec4(1.0); }")
            .unwrap();
        assert!(validate_pass_plan(&split).is_ok());
    }
}
