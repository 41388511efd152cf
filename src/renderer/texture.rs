use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use image::DynamicImage;

use crate::io;

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Highest anisotropy level wgpu accepts on a sampler.
pub const MAX_ANISOTROPY: u16 = 16;

/// Semantic role of a material texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureKind {
    Diffuse,
    Specular,
    Normal,
    Height,
}

impl TextureKind {
    /// Fixed order in which materials are queried for textures.
    pub const ALL: [TextureKind; 4] = [
        TextureKind::Diffuse,
        TextureKind::Specular,
        TextureKind::Normal,
        TextureKind::Height,
    ];

    /// Sampler uniform prefix, completed by a 1-based per-kind counter.
    pub fn uniform_prefix(self) -> &'static str {
        match self {
            TextureKind::Diffuse => "material.texture_diffuse",
            TextureKind::Specular => "material.texture_specular",
            TextureKind::Normal => "material.texture_normal",
            TextureKind::Height => "material.texture_height",
        }
    }
}

/// Pixel data ready for upload, in the format chosen from the image's channel count.
#[derive(Debug)]
pub struct DecodedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

impl DecodedImage {
    /// One channel stays single-channel, two stay two-channel, and three or four
    /// channels become RGBA (wgpu has no three-channel 8-bit format).
    pub fn from_image(img: DynamicImage) -> Self {
        let (width, height) = (img.width(), img.height());
        let (data, format) = match img.color().channel_count() {
            1 => (img.into_luma8().into_raw(), wgpu::TextureFormat::R8Unorm),
            2 => (img.into_luma_alpha8().into_raw(), wgpu::TextureFormat::Rg8Unorm),
            _ => (img.into_rgba8().into_raw(), wgpu::TextureFormat::Rgba8Unorm),
        };
        Self {
            data,
            width,
            height,
            format,
        }
    }

    pub fn solid(color: [u8; 4]) -> Self {
        Self {
            data: color.to_vec(),
            width: 1,
            height: 1,
            format: wgpu::TextureFormat::Rgba8Unorm,
        }
    }

    fn bytes_per_row(&self) -> u32 {
        self.format.block_copy_size(None).unwrap_or(4) * self.width
    }
}

/// Sampler configurations used across the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SamplerPreset {
    /// Repeat wrapping, trilinear and anisotropic.
    Material,
    /// Clamped linear sampling of a render target.
    Target,
    /// Clamped nearest sampling with a less-or-equal depth comparison.
    Comparison,
    /// Clamped linear sampling of one mip level.
    MipSource,
}

impl SamplerPreset {
    pub fn descriptor<'a>(self, label: Option<&'a str>) -> wgpu::SamplerDescriptor<'a> {
        let clamp = wgpu::AddressMode::ClampToEdge;
        let (address, filter, mipmap_filter) = match self {
            SamplerPreset::Material => (
                wgpu::AddressMode::Repeat,
                wgpu::FilterMode::Linear,
                wgpu::FilterMode::Linear,
            ),
            SamplerPreset::Target | SamplerPreset::MipSource => {
                (clamp, wgpu::FilterMode::Linear, wgpu::FilterMode::Nearest)
            }
            SamplerPreset::Comparison => {
                (clamp, wgpu::FilterMode::Nearest, wgpu::FilterMode::Nearest)
            }
        };
        wgpu::SamplerDescriptor {
            label,
            address_mode_u: address,
            address_mode_v: address,
            address_mode_w: address,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter,
            anisotropy_clamp: if self == SamplerPreset::Material {
                MAX_ANISOTROPY
            } else {
                1
            },
            compare: (self == SamplerPreset::Comparison).then_some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        }
    }
}

fn texture_2d(
    device: &wgpu::Device,
    label: Option<&str>,
    (width, height): (u32, u32),
    mip_level_count: u32,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label,
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    })
}

/// A texture with its default view and sampler.
#[derive(Debug)]
pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    id: u64,
}

impl Texture {
    fn assemble(texture: wgpu::Texture, view: wgpu::TextureView, sampler: wgpu::Sampler) -> Self {
        Self {
            texture,
            view,
            sampler,
            id: NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Process-unique identity, used to key bind group caches.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Levels in a full mip chain down to 1x1.
    pub fn mip_level_count(width: u32, height: u32) -> u32 {
        u32::BITS - width.max(height).max(1).leading_zeros()
    }

    pub fn from_path(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        mips: &mut MipGenerator,
        path: impl AsRef<Path>,
    ) -> Result<Self, String> {
        let path = path.as_ref();
        log::info!("Loading texture: {:?}", path);

        let bytes = io::load_binary(path)?;
        let img = image::load_from_memory(&bytes)
            .map_err(|e| format!("Failed to decode image {:?}: {}", path, e))?;
        Ok(Self::from_decoded(
            device,
            queue,
            mips,
            &DecodedImage::from_image(img),
            path.to_str(),
        ))
    }

    /// Decode an in-memory encoded image (embedded glTF images, data URIs).
    pub fn from_encoded(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        mips: &mut MipGenerator,
        bytes: &[u8],
        label: &str,
    ) -> Result<Self, String> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| format!("Failed to decode image {label}: {e}"))?;
        Ok(Self::from_decoded(
            device,
            queue,
            mips,
            &DecodedImage::from_image(img),
            Some(label),
        ))
    }

    /// Upload a material texture and fill its mip chain.
    pub fn from_decoded(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        mips: &mut MipGenerator,
        image: &DecodedImage,
        label: Option<&str>,
    ) -> Self {
        let mip_level_count = Self::mip_level_count(image.width, image.height);
        let texture = upload(device, queue, image, label, mip_level_count);
        if mip_level_count > 1 {
            mips.generate(device, queue, &texture);
        }
        Self::with_material_sampler(device, texture, label)
    }

    fn with_material_sampler(
        device: &wgpu::Device,
        texture: wgpu::Texture,
        label: Option<&str>,
    ) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&SamplerPreset::Material.descriptor(label));
        Self::assemble(texture, view, sampler)
    }

    /// Color attachment that later passes sample.
    pub fn render_target(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        label: &str,
    ) -> Self {
        let texture = texture_2d(
            device,
            Some(label),
            (width, height),
            1,
            format,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&SamplerPreset::Target.descriptor(Some(label)));
        Self::assemble(texture, view, sampler)
    }

    /// Depth attachment. Sampled depth targets expose only the depth aspect and
    /// carry a comparison sampler.
    pub fn depth_target(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        sampled: bool,
        label: &str,
    ) -> Self {
        let usage = if sampled {
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING
        } else {
            wgpu::TextureUsages::RENDER_ATTACHMENT
        };
        let texture = texture_2d(device, Some(label), (width, height), 1, format, usage);
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            aspect: if sampled {
                wgpu::TextureAspect::DepthOnly
            } else {
                wgpu::TextureAspect::All
            },
            ..Default::default()
        });
        let sampler = device.create_sampler(&SamplerPreset::Comparison.descriptor(Some(label)));
        Self::assemble(texture, view, sampler)
    }

    /// Single-texel texture; it has no mip chain to fill.
    pub fn from_color(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        color: [u8; 4],
        label: &str,
    ) -> Self {
        let texture = upload(device, queue, &DecodedImage::solid(color), Some(label), 1);
        Self::with_material_sampler(device, texture, Some(label))
    }

    pub fn white(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self::from_color(device, queue, [255, 255, 255, 255], "White")
    }

    /// Stand-in for textures that failed to load.
    pub fn black(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self::from_color(device, queue, [0, 0, 0, 255], "Black")
    }

    /// Tangent-space normal (0, 0, 1).
    pub fn default_normal(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self::from_color(device, queue, [128, 128, 255, 255], "DefaultNormal")
    }
}

fn upload(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    image: &DecodedImage,
    label: Option<&str>,
    mip_level_count: u32,
) -> wgpu::Texture {
    let texture = texture_2d(
        device,
        label,
        (image.width, image.height),
        mip_level_count,
        image.format,
        wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::RENDER_ATTACHMENT,
    );

    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &image.data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(image.bytes_per_row()),
            rows_per_image: Some(image.height),
        },
        texture.size(),
    );
    texture
}

/// Fills mip chains by rendering each level from the one above it with a linear
/// downsample. One pipeline is built per texture format and reused.
pub struct MipGenerator {
    shader: Option<wgpu::ShaderModule>,
    sampler: Option<wgpu::Sampler>,
    pipelines: HashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
}

impl Default for MipGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MipGenerator {
    pub fn new() -> Self {
        Self {
            shader: None,
            sampler: None,
            pipelines: HashMap::new(),
        }
    }

    /// Formats a downsample pipeline has been built for.
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    fn pipeline(
        &mut self,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
    ) -> &wgpu::RenderPipeline {
        let shader: &wgpu::ShaderModule = self.shader.get_or_insert_with(|| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Mip Downsample"),
                source: wgpu::ShaderSource::Wgsl(include_str!("blit.wgsl").into()),
            })
        });
        self.pipelines.entry(format).or_insert_with(|| {
            log::debug!("Building mip downsample pipeline for {:?}", format);
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Mip Downsample"),
                layout: None,
                vertex: wgpu::VertexState {
                    module: shader,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(format.into())],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        })
    }

    pub fn generate(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, texture: &wgpu::Texture) {
        let sampler = self
            .sampler
            .get_or_insert_with(|| {
                device.create_sampler(&SamplerPreset::MipSource.descriptor(Some("Mip Source")))
            })
            .clone();
        let pipeline = self.pipeline(device, texture.format());
        let layout = pipeline.get_bind_group_layout(0);

        let level_view = |level: u32| {
            texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some("Mip Level"),
                base_mip_level: level,
                mip_level_count: Some(1),
                ..Default::default()
            })
        };

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Mip Downsample"),
        });
        for level in 1..texture.mip_level_count() {
            let source = level_view(level - 1);
            let destination = level_view(level);
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Mip Source"),
                layout: &layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&source),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&sampler),
                    },
                ],
            });

            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Mip Downsample"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &destination,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        queue.submit(Some(encoder.finish()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_mip_chain_follows_the_larger_side() {
        assert_eq!(Texture::mip_level_count(1, 1), 1);
        assert_eq!(Texture::mip_level_count(4, 4), 3);
        assert_eq!(Texture::mip_level_count(2048, 2048), 12);
        assert_eq!(Texture::mip_level_count(256, 128), 9);
        assert_eq!(Texture::mip_level_count(1920, 1080), 11);
        assert_eq!(Texture::mip_level_count(0, 0), 1);
    }

    #[test]
    fn decoded_format_follows_channel_count() {
        let decoded = DecodedImage::from_image(DynamicImage::new_luma8(2, 2));
        assert_eq!(decoded.format, wgpu::TextureFormat::R8Unorm);
        assert_eq!(decoded.data.len(), 4);

        let decoded = DecodedImage::from_image(DynamicImage::new_luma_a8(2, 2));
        assert_eq!(decoded.format, wgpu::TextureFormat::Rg8Unorm);
        assert_eq!(decoded.bytes_per_row(), 4);

        let decoded = DecodedImage::from_image(DynamicImage::new_rgb8(2, 2));
        assert_eq!(decoded.format, wgpu::TextureFormat::Rgba8Unorm);
        assert_eq!(decoded.data.len(), 16);
    }

    #[test]
    fn sixteen_bit_images_are_narrowed() {
        let decoded = DecodedImage::from_image(DynamicImage::new_rgb16(2, 1));
        assert_eq!(decoded.format, wgpu::TextureFormat::Rgba8Unorm);
        assert_eq!(decoded.data.len(), 8);
    }

    #[test]
    fn material_sampler_repeats_and_filters_anisotropically() {
        let desc = SamplerPreset::Material.descriptor(None);
        assert_eq!(desc.address_mode_u, wgpu::AddressMode::Repeat);
        assert_eq!(desc.mipmap_filter, wgpu::FilterMode::Linear);
        assert_eq!(desc.anisotropy_clamp, MAX_ANISOTROPY);
        assert!(desc.compare.is_none());
    }

    #[test]
    fn only_the_comparison_preset_compares() {
        for preset in [SamplerPreset::Target, SamplerPreset::MipSource] {
            let desc = preset.descriptor(None);
            assert!(desc.compare.is_none());
            assert_eq!(desc.address_mode_v, wgpu::AddressMode::ClampToEdge);
        }
        let desc = SamplerPreset::Comparison.descriptor(None);
        assert_eq!(desc.compare, Some(wgpu::CompareFunction::LessEqual));
        assert_eq!(desc.mag_filter, wgpu::FilterMode::Nearest);
    }

    #[test]
    fn material_kinds_map_to_sampler_prefixes() {
        assert_eq!(TextureKind::ALL[0], TextureKind::Diffuse);
        assert_eq!(
            TextureKind::Specular.uniform_prefix(),
            "material.texture_specular"
        );
    }
}
