use wgpu::util::DeviceExt;

use crate::asset::{AssetCache, Handle};
use crate::renderer::program::Program;
use crate::renderer::texture::{Texture, TextureKind};
use crate::renderer::vertex::Vertex;

/// A texture a mesh samples, resolved against its owning model's texture store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureBinding {
    pub texture: Handle<Texture>,
    pub kind: TextureKind,
    pub path: String,
}

/// Sampler uniform names for textures in slot order, numbering each kind from 1.
pub fn sampler_uniform_names<I>(kinds: I) -> Vec<String>
where
    I: IntoIterator<Item = TextureKind>,
{
    let mut counters = [0u32; TextureKind::ALL.len()];
    kinds
        .into_iter()
        .map(|kind| {
            let counter = &mut counters[kind as usize];
            *counter += 1;
            format!("{}{}", kind.uniform_prefix(), counter)
        })
        .collect()
}

/// GPU-resident geometry plus the textures it samples. Immutable once built.
#[derive(Debug)]
pub struct Mesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    textures: Vec<TextureBinding>,
    sampler_names: Vec<String>,
}

impl Mesh {
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        vertices: &[Vertex],
        indices: &[u32],
        textures: Vec<TextureBinding>,
    ) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let sampler_names = sampler_uniform_names(textures.iter().map(|binding| binding.kind));

        Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
            textures,
            sampler_names,
        }
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn textures(&self) -> &[TextureBinding] {
        &self.textures
    }

    pub fn sampler_names(&self) -> &[String] {
        &self.sampler_names
    }

    /// Bind this mesh's textures to `program`, commit its uniforms and issue one
    /// indexed draw over every index. The texture slots are released afterwards so
    /// the next mesh starts from the program's fallbacks.
    pub fn draw(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pass: &mut wgpu::RenderPass<'_>,
        program: &mut Program,
        store: &AssetCache<Texture>,
    ) {
        for (binding, name) in self.textures.iter().zip(&self.sampler_names) {
            match store.get(binding.texture) {
                Some(texture) => program.set_texture(name, texture),
                None => log::warn!("Texture handle for {} is not resident", binding.path),
            }
        }

        program.apply(device, queue, pass);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, 0..1);

        for name in &self.sampler_names {
            program.unbind_texture(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_numbered_independently() {
        let names = sampler_uniform_names([
            TextureKind::Diffuse,
            TextureKind::Diffuse,
            TextureKind::Specular,
        ]);
        assert_eq!(
            names,
            [
                "material.texture_diffuse1",
                "material.texture_diffuse2",
                "material.texture_specular1"
            ]
        );
    }

    #[test]
    fn interleaved_kinds_keep_slot_order() {
        let names = sampler_uniform_names([
            TextureKind::Normal,
            TextureKind::Diffuse,
            TextureKind::Height,
            TextureKind::Normal,
        ]);
        assert_eq!(
            names,
            [
                "material.texture_normal1",
                "material.texture_diffuse1",
                "material.texture_height1",
                "material.texture_normal2"
            ]
        );
    }

    #[test]
    fn no_textures_no_names() {
        assert!(sampler_uniform_names(std::iter::empty()).is_empty());
    }
}
