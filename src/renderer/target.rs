//! Offscreen render destinations.

use std::fmt;

use wgpu::util::DeviceExt;

use crate::renderer::texture::Texture;
use crate::renderer::vertex::QuadVertex;

/// Two triangles covering clip space, with UVs for sampling a target back.
#[derive(Debug)]
pub struct FullscreenQuad {
    vertex_buffer: wgpu::Buffer,
}

impl FullscreenQuad {
    pub fn new(device: &wgpu::Device) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Fullscreen Quad"),
            contents: bytemuck::cast_slice(&QuadVertex::QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });
        Self { vertex_buffer }
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.draw(0..QuadVertex::QUAD.len() as u32, 0..1);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TargetDesc {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub colors: Vec<wgpu::TextureFormat>,
    /// Depth format and whether later passes sample it.
    pub depth: Option<(wgpu::TextureFormat, bool)>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IncompleteTarget {
    ZeroSize { width: u32, height: u32 },
    NoAttachments,
    NotRenderable(wgpu::TextureFormat),
    NotFilterable(wgpu::TextureFormat),
    NotDepth(wgpu::TextureFormat),
    TooManyColors(usize),
}

impl fmt::Display for IncompleteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncompleteTarget::ZeroSize { width, height } => {
                write!(f, "zero-sized attachment ({width}x{height})")
            }
            IncompleteTarget::NoAttachments => write!(f, "no attachments"),
            IncompleteTarget::NotRenderable(format) => {
                write!(f, "{format:?} is not a color-renderable format")
            }
            IncompleteTarget::NotFilterable(format) => {
                write!(f, "{format:?} cannot be sampled with linear filtering")
            }
            IncompleteTarget::NotDepth(format) => write!(f, "{format:?} has no depth aspect"),
            IncompleteTarget::TooManyColors(count) => {
                write!(f, "{count} color attachments exceed the device limit")
            }
        }
    }
}

impl std::error::Error for IncompleteTarget {}

const MAX_COLOR_ATTACHMENTS: usize = 8;

/// Checks a target description against what the device can render and sample.
pub fn check_completeness(
    desc: &TargetDesc,
    features: wgpu::Features,
) -> Result<(), IncompleteTarget> {
    if desc.width == 0 || desc.height == 0 {
        return Err(IncompleteTarget::ZeroSize {
            width: desc.width,
            height: desc.height,
        });
    }
    if desc.colors.is_empty() && desc.depth.is_none() {
        return Err(IncompleteTarget::NoAttachments);
    }
    if desc.colors.len() > MAX_COLOR_ATTACHMENTS {
        return Err(IncompleteTarget::TooManyColors(desc.colors.len()));
    }
    for &format in &desc.colors {
        if format.has_depth_aspect() || format.has_stencil_aspect() || format.is_compressed() {
            return Err(IncompleteTarget::NotRenderable(format));
        }
        let float32 = matches!(
            format,
            wgpu::TextureFormat::R32Float
                | wgpu::TextureFormat::Rg32Float
                | wgpu::TextureFormat::Rgba32Float
        );
        if float32 && !features.contains(wgpu::Features::FLOAT32_FILTERABLE) {
            return Err(IncompleteTarget::NotFilterable(format));
        }
    }
    if let Some((format, _)) = desc.depth {
        if !format.has_depth_aspect() {
            return Err(IncompleteTarget::NotDepth(format));
        }
    }
    Ok(())
}

/// Color images plus an optional depth(+stencil) image, all the same size.
#[derive(Debug)]
pub struct OffscreenTarget {
    desc: TargetDesc,
    colors: Vec<Texture>,
    depth_stencil: Option<Texture>,
}

impl OffscreenTarget {
    /// Allocate every attachment. An incomplete description is logged and the
    /// target is still built.
    pub fn new(device: &wgpu::Device, desc: TargetDesc) -> Self {
        if let Err(reason) = check_completeness(&desc, device.features()) {
            log::error!("Framebuffer '{}' is not complete: {}", desc.label, reason);
        }

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let colors = desc
            .colors
            .iter()
            .enumerate()
            .map(|(slot, &format)| {
                Texture::render_target(
                    device,
                    desc.width,
                    desc.height,
                    format,
                    &format!("{} Color {}", desc.label, slot),
                )
            })
            .collect();
        let depth_stencil = desc.depth.map(|(format, sampled)| {
            Texture::depth_target(
                device,
                desc.width,
                desc.height,
                format,
                sampled,
                &format!("{} Depth", desc.label),
            )
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            log::error!("Creating framebuffer '{}' failed: {}", desc.label, err);
        }

        Self {
            desc,
            colors,
            depth_stencil,
        }
    }

    pub fn desc(&self) -> &TargetDesc {
        &self.desc
    }

    pub fn size(&self) -> (u32, u32) {
        (self.desc.width, self.desc.height)
    }

    pub fn color(&self, slot: usize) -> Option<&Texture> {
        self.colors.get(slot)
    }

    pub fn depth(&self) -> Option<&Texture> {
        self.depth_stencil.as_ref()
    }

    /// Attachments for the first `slots` color outputs. Slots past the target's own
    /// images stay `None`.
    pub fn color_attachments(
        &self,
        clear: Option<wgpu::Color>,
        slots: usize,
    ) -> Vec<Option<wgpu::RenderPassColorAttachment<'_>>> {
        let load = match clear {
            Some(color) => wgpu::LoadOp::Clear(color),
            None => wgpu::LoadOp::Load,
        };
        (0..slots)
            .map(|slot| {
                self.colors
                    .get(slot)
                    .map(|texture| wgpu::RenderPassColorAttachment {
                        view: &texture.view,
                        resolve_target: None,
                        depth_slice: None,
                        ops: wgpu::Operations {
                            load,
                            store: wgpu::StoreOp::Store,
                        },
                    })
            })
            .collect()
    }

    pub fn depth_stencil_attachment(&self) -> Option<wgpu::RenderPassDepthStencilAttachment<'_>> {
        let depth = self.depth_stencil.as_ref()?;
        let stencil_ops = depth.texture.format().has_stencil_aspect().then_some(wgpu::Operations {
            load: wgpu::LoadOp::Clear(0),
            store: wgpu::StoreOp::Store,
        });
        Some(wgpu::RenderPassDepthStencilAttachment {
            view: &depth.view,
            depth_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Clear(1.0),
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops,
        })
    }
}
