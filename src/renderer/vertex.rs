use bytemuck::{Pod, Zeroable};
use std::mem;

/// Mesh vertex as consumed by the lit and depth programs.
///
/// The five attributes are bound to shader locations 0..=4 in declaration order.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, Default, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
}

impl Vertex {
    pub const ATTRS: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x2,
        3 => Float32x3,
        4 => Float32x3
    ];

    pub fn layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// Full-screen quad vertex: clip-space position and texture coordinate.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

impl QuadVertex {
    pub const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x2,
        1 => Float32x2
    ];

    /// Two counter-clockwise triangles covering clip space. Texture v grows downward.
    pub const QUAD: [QuadVertex; 6] = [
        QuadVertex { position: [-1.0, 1.0], uv: [0.0, 0.0] },
        QuadVertex { position: [-1.0, -1.0], uv: [0.0, 1.0] },
        QuadVertex { position: [1.0, -1.0], uv: [1.0, 1.0] },
        QuadVertex { position: [-1.0, 1.0], uv: [0.0, 0.0] },
        QuadVertex { position: [1.0, -1.0], uv: [1.0, 1.0] },
        QuadVertex { position: [1.0, 1.0], uv: [1.0, 0.0] },
    ];

    pub fn layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_stride_matches_struct_size() {
        assert_eq!(
            Vertex::layout().array_stride,
            std::mem::size_of::<Vertex>() as wgpu::BufferAddress
        );
        assert_eq!(std::mem::size_of::<Vertex>(), 14 * 4);
    }

    #[test]
    fn vertex_attributes_follow_field_offsets() {
        let offsets: Vec<u64> = Vertex::ATTRS.iter().map(|attr| attr.offset).collect();
        assert_eq!(offsets, vec![0, 12, 24, 32, 44]);

        let locations: Vec<u32> = Vertex::ATTRS
            .iter()
            .map(|attr| attr.shader_location)
            .collect();
        assert_eq!(locations, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn quad_covers_clip_space_with_ccw_triangles() {
        for tri in QuadVertex::QUAD.chunks(3) {
            let [a, b, c] = [tri[0].position, tri[1].position, tri[2].position];
            let signed_area = (b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1]);
            assert!(signed_area > 0.0, "triangle {tri:?} is not counter-clockwise");
        }

        let min_x = QuadVertex::QUAD.iter().map(|v| v.position[0]).fold(f32::MAX, f32::min);
        let max_y = QuadVertex::QUAD.iter().map(|v| v.position[1]).fold(f32::MIN, f32::max);
        assert_eq!(min_x, -1.0);
        assert_eq!(max_y, 1.0);
    }
}
