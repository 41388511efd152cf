//! Fixed-function state for a program's render pipeline.

use crate::renderer::program::{ColorTarget, DepthState, VertexInput};
use crate::renderer::vertex::{QuadVertex, Vertex};

const VERTEX_ENTRY: &str = "vs_main";
const FRAGMENT_ENTRY: &str = "fs_main";

/// Assembles one pipeline from a vertex and a fragment module. Defaults to
/// counter-clockwise triangle lists with back faces culled.
pub struct PipelineBuilder<'a> {
    device: &'a wgpu::Device,
    label: Option<&'a str>,
    layout: &'a wgpu::PipelineLayout,
    vertex_module: &'a wgpu::ShaderModule,
    fragment_module: &'a wgpu::ShaderModule,
    vertex_input: VertexInput,
    color_targets: Vec<Option<wgpu::ColorTargetState>>,
    depth_stencil: Option<wgpu::DepthStencilState>,
    cull_mode: Option<wgpu::Face>,
}

impl<'a> PipelineBuilder<'a> {
    pub fn new(
        device: &'a wgpu::Device,
        layout: &'a wgpu::PipelineLayout,
        vertex_module: &'a wgpu::ShaderModule,
        fragment_module: &'a wgpu::ShaderModule,
        vertex_input: VertexInput,
    ) -> Self {
        Self {
            device,
            label: None,
            layout,
            vertex_module,
            fragment_module,
            vertex_input,
            color_targets: Vec::new(),
            depth_stencil: None,
            cull_mode: Some(wgpu::Face::Back),
        }
    }

    pub fn label(mut self, label: &'a str) -> Self {
        self.label = Some(label);
        self
    }

    pub fn cull_mode(mut self, cull_mode: Option<wgpu::Face>) -> Self {
        self.cull_mode = cull_mode;
        self
    }

    /// One state per fragment output location; `None` leaves the slot unattached.
    pub fn color_targets(mut self, targets: &[Option<ColorTarget>]) -> Self {
        self.color_targets = targets.iter().map(color_state).collect();
        self
    }

    pub fn depth(mut self, depth: Option<DepthState>) -> Self {
        self.depth_stencil = depth.map(depth_stencil_state);
        self
    }

    pub fn build(self) -> wgpu::RenderPipeline {
        let buffers = [match self.vertex_input {
            VertexInput::Mesh => Vertex::layout(),
            VertexInput::Quad => QuadVertex::layout(),
        }];
        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: self.label,
                layout: Some(self.layout),
                vertex: wgpu::VertexState {
                    module: self.vertex_module,
                    entry_point: Some(VERTEX_ENTRY),
                    buffers: &buffers,
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: self.fragment_module,
                    entry_point: Some(FRAGMENT_ENTRY),
                    targets: &self.color_targets,
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: self.cull_mode,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    ..Default::default()
                },
                depth_stencil: self.depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
    }
}

fn color_state(target: &Option<ColorTarget>) -> Option<wgpu::ColorTargetState> {
    target.map(|target| wgpu::ColorTargetState {
        format: target.format,
        blend: target.blend,
        write_mask: wgpu::ColorWrites::ALL,
    })
}

fn depth_stencil_state(depth: DepthState) -> wgpu::DepthStencilState {
    let bias = match depth.bias {
        Some((constant, slope_scale)) => wgpu::DepthBiasState {
            constant,
            slope_scale,
            clamp: 0.0,
        },
        None => wgpu::DepthBiasState::default(),
    };
    wgpu::DepthStencilState {
        format: depth.format,
        depth_write_enabled: depth.write,
        depth_compare: depth.compare,
        stencil: wgpu::StencilState::default(),
        bias,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_color_slots_stay_unattached() {
        let targets = [
            Some(ColorTarget {
                format: wgpu::TextureFormat::Rgba16Float,
                blend: None,
            }),
            None,
        ];
        let states: Vec<_> = targets.iter().map(color_state).collect();
        assert_eq!(states[0].as_ref().map(|s| s.format), Some(wgpu::TextureFormat::Rgba16Float));
        assert!(states[1].is_none());
    }

    #[test]
    fn depth_bias_is_only_set_when_requested() {
        let plain = depth_stencil_state(DepthState {
            format: wgpu::TextureFormat::Depth24PlusStencil8,
            write: true,
            compare: wgpu::CompareFunction::Less,
            bias: None,
        });
        assert_eq!(plain.bias, wgpu::DepthBiasState::default());

        let biased = depth_stencil_state(DepthState {
            format: wgpu::TextureFormat::Depth32Float,
            write: true,
            compare: wgpu::CompareFunction::LessEqual,
            bias: Some((2, 2.0)),
        });
        assert_eq!(biased.bias.constant, 2);
        assert_eq!(biased.bias.slope_scale, 2.0);
    }
}
