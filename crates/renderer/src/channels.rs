//! Shared channel resources: the procedural noise texture, caller-supplied
//! external textures, and the samplers every pass binds.

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use wgpu::util::{DeviceExt, TextureDataOrder};

/// Edge length of the procedural noise texture, matching the ShaderToy
/// "RGBA noise" lookup most pastes divide coordinates by.
pub(crate) const NOISE_TEXTURE_SIZE: u32 = 256;

const BYTES_PER_PIXEL: u32 = 4;

/// Deterministic RGBA noise shared by every pass that binds a noise channel.
pub(crate) struct NoiseTexture {
    _texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

pub(crate) fn create_noise_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    seed: u64,
) -> NoiseTexture {
    let pixel_count = (NOISE_TEXTURE_SIZE * NOISE_TEXTURE_SIZE * BYTES_PER_PIXEL) as usize;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; pixel_count];
    rng.fill(data.as_mut_slice());

    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some("procedural noise channel"),
            size: wgpu::Extent3d {
                width: NOISE_TEXTURE_SIZE,
                height: NOISE_TEXTURE_SIZE,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        TextureDataOrder::LayerMajor,
        &data,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    NoiseTexture {
        _texture: texture,
        view,
    }
}

/// A caller-registered channel texture (decoded pixels arrive from outside;
/// this crate never touches image files).
pub(crate) struct ExternalTexture {
    _texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

pub(crate) fn create_external_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    channel: usize,
    rgba: &[u8],
    width: u32,
    height: u32,
) -> Result<ExternalTexture> {
    if width == 0 || height == 0 {
        bail!("external texture for channel {channel} has zero extent ({width}x{height})");
    }
    let expected = (width * height * BYTES_PER_PIXEL) as usize;
    if rgba.len() != expected {
        bail!(
            "external texture for channel {channel} has {} bytes, expected {expected}",
            rgba.len()
        );
    }

    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(&format!("external channel texture #{channel}")),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        TextureDataOrder::LayerMajor,
        rgba,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    tracing::info!(channel, width, height, "registered external channel texture");
    Ok(ExternalTexture {
        _texture: texture,
        view,
        width,
        height,
    })
}

/// Samplers shared by every pass: buffers clamp at their edges, noise tiles.
pub(crate) struct ChannelSamplers {
    pub clamp: wgpu::Sampler,
    pub repeat: wgpu::Sampler,
}

pub(crate) fn create_samplers(device: &wgpu::Device) -> ChannelSamplers {
    let clamp = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("channel clamp sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    });
    let repeat = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("channel repeat sampler"),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    });
    ChannelSamplers { clamp, repeat }
}
