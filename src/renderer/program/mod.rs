//! Vertex/fragment program pairs loaded from WGSL files.
//!
//! A [`Program`] reflects its own resource interface: one uniform struct at
//! `@group(0) @binding(0)` and any number of `@group(1)` textures, each followed by
//! its sampler at the next binding. Uniform values and textures are set by name and
//! committed per draw.

mod reflect;
mod uniforms;

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};

use glam::{Mat4, Vec3};

pub use reflect::{
    binding_ident, compile, reflect, SampleKind, SamplerSlot, StageInterface, TextureSlot,
};
pub use uniforms::{UniformBlock, UniformField, UniformLayout, UniformType};

use crate::io;
use crate::renderer::pipeline_builder::PipelineBuilder;
use crate::renderer::texture::Texture;

const INITIAL_UNIFORM_SLOTS: u64 = 64;

/// Vertex buffer layout a program consumes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VertexInput {
    Mesh,
    Quad,
}

#[derive(Clone, Copy, Debug)]
pub struct DepthState {
    pub format: wgpu::TextureFormat,
    pub write: bool,
    pub compare: wgpu::CompareFunction,
    pub bias: Option<(i32, f32)>,
}

#[derive(Clone, Copy, Debug)]
pub struct ColorTarget {
    pub format: wgpu::TextureFormat,
    pub blend: Option<wgpu::BlendState>,
}

#[derive(Clone, Debug)]
pub struct ProgramDesc {
    pub label: String,
    pub vertex_path: PathBuf,
    pub fragment_path: PathBuf,
    pub vertex_input: VertexInput,
    /// `None` entries are color slots the fragment stage may write but no pass attaches.
    pub color_targets: Vec<Option<ColorTarget>>,
    pub depth: Option<DepthState>,
    pub cull_mode: Option<wgpu::Face>,
}

/// View and sampler of a texture bound to a program slot.
#[derive(Clone, Debug)]
pub struct BoundTexture {
    id: u64,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

impl From<&Texture> for BoundTexture {
    fn from(texture: &Texture) -> Self {
        Self {
            id: texture.id(),
            view: texture.view.clone(),
            sampler: texture.sampler.clone(),
        }
    }
}

/// Textures sampled by slots nobody bound.
#[derive(Clone, Debug)]
pub struct FallbackTextures {
    white: BoundTexture,
    normal: BoundTexture,
    depth: BoundTexture,
}

impl FallbackTextures {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let depth = Texture::depth_target(
            device,
            1,
            1,
            wgpu::TextureFormat::Depth32Float,
            true,
            "Fallback Depth",
        );
        Self {
            white: BoundTexture::from(&Texture::white(device, queue)),
            normal: BoundTexture::from(&Texture::default_normal(device, queue)),
            depth: BoundTexture::from(&depth),
        }
    }

    fn for_slot(&self, slot: &TextureSlot) -> &BoundTexture {
        match slot.kind {
            SampleKind::Depth => &self.depth,
            SampleKind::Float if slot.name.contains("normal") => &self.normal,
            SampleKind::Float => &self.white,
        }
    }
}

/// Per-frame ring of uniform blocks addressed through a dynamic offset.
struct UniformArena {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    block_size: u64,
    stride: u64,
    capacity: u64,
    cursor: u64,
}

impl UniformArena {
    fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        block_size: u64,
        capacity: u64,
        label: &str,
    ) -> Self {
        let alignment = u64::from(device.limits().min_uniform_buffer_offset_alignment);
        let stride = block_size.div_ceil(alignment) * alignment;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: stride * capacity,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: reflect::UNIFORM_BINDING,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: NonZeroU64::new(block_size),
                }),
            }],
        });
        Self {
            buffer,
            bind_group,
            block_size,
            stride,
            capacity,
            cursor: 0,
        }
    }

    fn push(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        bytes: &[u8],
        label: &str,
    ) -> u32 {
        if self.cursor == self.capacity {
            let cursor = self.cursor;
            *self = Self::new(device, layout, self.block_size, self.capacity * 2, label);
            self.cursor = cursor;
            log::debug!("Grew uniform arena '{}' to {} slots", label, self.capacity);
        }
        let offset = self.cursor * self.stride;
        queue.write_buffer(&self.buffer, offset, bytes);
        self.cursor += 1;
        offset as u32
    }
}

pub struct Program {
    label: String,
    pipeline: wgpu::RenderPipeline,
    interface: StageInterface,
    uniforms: UniformBlock,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    arena: Option<UniformArena>,
    empty_group: wgpu::BindGroup,
    bound: HashMap<u32, BoundTexture>,
    fallbacks: FallbackTextures,
    bind_groups: HashMap<Vec<u64>, wgpu::BindGroup>,
    color_slots: usize,
    linked: bool,
}

impl Program {
    /// Compile and link a program. Failures are logged and leave a program whose
    /// draws produce undefined output.
    pub fn new(device: &wgpu::Device, desc: &ProgramDesc, fallbacks: &FallbackTextures) -> Self {
        let label = desc.label.as_str();
        let vertex_source = load_stage(&desc.vertex_path);
        let fragment_source = load_stage(&desc.fragment_path);

        let mut compiled = true;
        let mut interface = StageInterface::default();
        for (path, source) in [
            (&desc.vertex_path, &vertex_source),
            (&desc.fragment_path, &fragment_source),
        ] {
            match reflect::compile(source) {
                Ok(module) => interface.merge(reflect::reflect(&module)),
                Err(diagnostic) => {
                    compiled = false;
                    log::error!("Shader compilation failed for {:?}:\n{}", path, diagnostic);
                }
            }
        }

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(vertex_source.into()),
        });
        let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(fragment_source.into()),
        });

        let uniform_entries: Vec<wgpu::BindGroupLayoutEntry> = if interface.uniforms.is_empty() {
            Vec::new()
        } else {
            vec![wgpu::BindGroupLayoutEntry {
                binding: reflect::UNIFORM_BINDING,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(u64::from(interface.uniforms.size())),
                },
                count: None,
            }]
        };
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &uniform_entries,
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &texture_layout_entries(&interface),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let pipeline = PipelineBuilder::new(
            device,
            &pipeline_layout,
            &vertex_module,
            &fragment_module,
            desc.vertex_input,
        )
        .label(label)
        .cull_mode(desc.cull_mode)
        .color_targets(&desc.color_targets)
        .depth(desc.depth)
        .build();

        let arena = (!interface.uniforms.is_empty()).then(|| {
            UniformArena::new(
                device,
                &uniform_layout,
                u64::from(interface.uniforms.size()),
                INITIAL_UNIFORM_SLOTS,
                label,
            )
        });
        let empty_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &uniform_layout,
            entries: &[],
        });

        let mut linked = compiled;
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            linked = false;
            log::error!("Program '{}' failed to link: {}", label, err);
        }
        if linked {
            log::info!(
                "Program '{}' ready ({} uniform bytes, {} texture slots)",
                label,
                interface.uniforms.size(),
                interface.textures.len()
            );
        }

        Self {
            label: desc.label.clone(),
            pipeline,
            uniforms: UniformBlock::new(interface.uniforms.clone()),
            interface,
            uniform_layout,
            texture_layout,
            arena,
            empty_group,
            bound: HashMap::new(),
            fallbacks: fallbacks.clone(),
            bind_groups: HashMap::new(),
            color_slots: desc.color_targets.len(),
            linked,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_linked(&self) -> bool {
        self.linked
    }

    pub fn interface(&self) -> &StageInterface {
        &self.interface
    }

    /// Number of color attachments passes using this program must provide.
    pub fn color_slots(&self) -> usize {
        self.color_slots
    }

    /// Rewind the uniform arena. Call once per frame before recording.
    pub fn begin_frame(&mut self) {
        if let Some(arena) = self.arena.as_mut() {
            arena.cursor = 0;
        }
    }

    /// Make this program current on the pass.
    pub fn activate(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
    }

    pub fn set_int(&mut self, name: &str, value: i32) {
        self.uniforms.set_int(name, value);
    }

    pub fn set_bool(&mut self, name: &str, value: bool) {
        self.uniforms.set_bool(name, value);
    }

    pub fn set_float(&mut self, name: &str, value: f32) {
        self.uniforms.set_float(name, value);
    }

    pub fn set_vec3(&mut self, name: &str, value: Vec3) {
        self.uniforms.set_vec3(name, value);
    }

    pub fn set_mat4(&mut self, name: &str, value: &Mat4) {
        self.uniforms.set_mat4(name, value);
    }

    /// Bind `texture` to the sampler slot called `name`; unknown names are ignored.
    pub fn set_texture(&mut self, name: &str, texture: &Texture) {
        if let Some(slot) = self.interface.texture(name) {
            self.bound.insert(slot.binding, BoundTexture::from(texture));
        }
    }

    /// Return the slot called `name` to its fallback texture.
    pub fn unbind_texture(&mut self, name: &str) {
        if let Some(slot) = self.interface.texture(name) {
            self.bound.remove(&slot.binding);
        }
    }

    /// Drop cached bind groups, e.g. after render targets were recreated.
    pub fn clear_bind_groups(&mut self) {
        self.bound.clear();
        self.bind_groups.clear();
    }

    /// Commit the staged uniforms and bound textures for the next draw.
    pub fn apply(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pass: &mut wgpu::RenderPass<'_>,
    ) {
        match self.arena.as_mut() {
            Some(arena) => {
                let offset = arena.push(
                    device,
                    queue,
                    &self.uniform_layout,
                    self.uniforms.bytes(),
                    &self.label,
                );
                pass.set_bind_group(reflect::UNIFORM_GROUP, &arena.bind_group, &[offset]);
            }
            None => pass.set_bind_group(reflect::UNIFORM_GROUP, &self.empty_group, &[]),
        }

        let resolved: Vec<&BoundTexture> = self
            .interface
            .textures
            .iter()
            .map(|slot| {
                self.bound
                    .get(&slot.binding)
                    .unwrap_or_else(|| self.fallbacks.for_slot(slot))
            })
            .collect();
        let key: Vec<u64> = resolved.iter().map(|texture| texture.id).collect();

        let group = self.bind_groups.entry(key).or_insert_with(|| {
            create_texture_group(
                device,
                &self.texture_layout,
                &self.interface,
                &resolved,
                &self.fallbacks,
                &self.label,
            )
        });
        pass.set_bind_group(reflect::TEXTURE_GROUP, &*group, &[]);
    }
}

fn load_stage(path: &Path) -> String {
    match io::load_string(path) {
        Ok(source) => source,
        Err(err) => {
            log::error!("{}", err);
            String::new()
        }
    }
}

fn texture_layout_entries(interface: &StageInterface) -> Vec<wgpu::BindGroupLayoutEntry> {
    let textures = interface.textures.iter().map(|slot| wgpu::BindGroupLayoutEntry {
        binding: slot.binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: match slot.kind {
                SampleKind::Float => wgpu::TextureSampleType::Float { filterable: true },
                SampleKind::Depth => wgpu::TextureSampleType::Depth,
            },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    });
    let samplers = interface.samplers.iter().map(|slot| wgpu::BindGroupLayoutEntry {
        binding: slot.binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Sampler(if slot.comparison {
            wgpu::SamplerBindingType::Comparison
        } else {
            wgpu::SamplerBindingType::Filtering
        }),
        count: None,
    });
    textures.chain(samplers).collect()
}

/// `resolved` holds one texture per entry of `interface.textures`, in the same order.
fn create_texture_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    interface: &StageInterface,
    resolved: &[&BoundTexture],
    fallbacks: &FallbackTextures,
    label: &str,
) -> wgpu::BindGroup {
    let mut entries: Vec<wgpu::BindGroupEntry<'_>> = interface
        .textures
        .iter()
        .zip(resolved)
        .map(|(slot, texture)| wgpu::BindGroupEntry {
            binding: slot.binding,
            resource: wgpu::BindingResource::TextureView(&texture.view),
        })
        .collect();

    for sampler in &interface.samplers {
        let owner = interface
            .textures
            .iter()
            .position(|slot| slot.binding + 1 == sampler.binding)
            .map(|index| resolved[index]);
        let source = match owner {
            Some(texture) => texture,
            None if sampler.comparison => &fallbacks.depth,
            None => &fallbacks.white,
        };
        entries.push(wgpu::BindGroupEntry {
            binding: sampler.binding,
            resource: wgpu::BindingResource::Sampler(&source.sampler),
        });
    }

    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &entries,
    })
}
