use std::borrow::Cow;

use naga::{AddressSpace, ImageClass, ScalarKind, TypeInner, VectorSize};

use super::uniforms::{UniformField, UniformLayout, UniformType};

pub const UNIFORM_GROUP: u32 = 0;
pub const UNIFORM_BINDING: u32 = 0;
pub const TEXTURE_GROUP: u32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleKind {
    Float,
    Depth,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureSlot {
    pub name: String,
    pub binding: u32,
    pub kind: SampleKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SamplerSlot {
    pub name: String,
    pub binding: u32,
    pub comparison: bool,
}

/// Resource interface of one shader stage.
#[derive(Clone, Debug, Default)]
pub struct StageInterface {
    pub uniforms: UniformLayout,
    pub textures: Vec<TextureSlot>,
    pub samplers: Vec<SamplerSlot>,
}

impl StageInterface {
    pub fn merge(&mut self, other: StageInterface) {
        self.uniforms.merge(&other.uniforms);
        for texture in other.textures {
            if !self.textures.iter().any(|t| t.binding == texture.binding) {
                self.textures.push(texture);
            }
        }
        for sampler in other.samplers {
            if !self.samplers.iter().any(|s| s.binding == sampler.binding) {
                self.samplers.push(sampler);
            }
        }
        self.textures.sort_by_key(|t| t.binding);
        self.samplers.sort_by_key(|s| s.binding);
    }

    pub fn texture(&self, name: &str) -> Option<&TextureSlot> {
        let ident = binding_ident(name);
        self.textures.iter().find(|t| t.name == ident)
    }
}

/// WGSL global that a dotted uniform name (`material.texture_diffuse1`) refers to.
pub fn binding_ident(name: &str) -> Cow<'_, str> {
    if name.contains('.') {
        Cow::Owned(name.replace('.', "_"))
    } else {
        Cow::Borrowed(name)
    }
}

/// Parse and validate one WGSL stage, returning the driver-style diagnostic on failure.
pub fn compile(source: &str) -> Result<naga::Module, String> {
    let module = naga::front::wgsl::parse_str(source).map_err(|err| err.emit_to_string(source))?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|err| err.emit_to_string(source))?;
    Ok(module)
}

pub fn reflect(module: &naga::Module) -> StageInterface {
    let mut interface = StageInterface::default();

    for (_, global) in module.global_variables.iter() {
        let Some(binding) = &global.binding else {
            continue;
        };
        let name = global.name.clone().unwrap_or_default();
        let inner = &module.types[global.ty].inner;

        match (global.space, inner) {
            (AddressSpace::Uniform, TypeInner::Struct { members, span })
                if binding.group == UNIFORM_GROUP && binding.binding == UNIFORM_BINDING =>
            {
                let fields = members
                    .iter()
                    .filter_map(|member| {
                        let ty = uniform_type(&module.types[member.ty].inner)?;
                        Some(UniformField {
                            name: member.name.clone()?,
                            ty,
                            offset: member.offset,
                        })
                    })
                    .collect();
                interface.uniforms = UniformLayout::new(fields, *span);
            }
            (_, TypeInner::Image { class, .. }) if binding.group == TEXTURE_GROUP => {
                let kind = match class {
                    ImageClass::Depth { .. } => SampleKind::Depth,
                    _ => SampleKind::Float,
                };
                interface.textures.push(TextureSlot {
                    name,
                    binding: binding.binding,
                    kind,
                });
            }
            (_, TypeInner::Sampler { comparison }) if binding.group == TEXTURE_GROUP => {
                interface.samplers.push(SamplerSlot {
                    name,
                    binding: binding.binding,
                    comparison: *comparison,
                });
            }
            _ => log::debug!(
                "Skipping resource '{}' at group {} binding {}",
                name,
                binding.group,
                binding.binding
            ),
        }
    }

    interface.textures.sort_by_key(|t| t.binding);
    interface.samplers.sort_by_key(|s| s.binding);
    interface
}

fn uniform_type(inner: &TypeInner) -> Option<UniformType> {
    match *inner {
        TypeInner::Scalar(scalar) => match scalar.kind {
            ScalarKind::Float => Some(UniformType::Float),
            ScalarKind::Sint => Some(UniformType::Int),
            ScalarKind::Uint => Some(UniformType::UInt),
            _ => None,
        },
        TypeInner::Vector { size, scalar } if scalar.kind == ScalarKind::Float => match size {
            VectorSize::Bi => Some(UniformType::Vec2),
            VectorSize::Tri => Some(UniformType::Vec3),
            VectorSize::Quad => Some(UniformType::Vec4),
        },
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            ..
        } => Some(UniformType::Mat4),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"
struct Uniforms {
    view: mat4x4<f32>,
    eye: vec3<f32>,
    strength: f32,
    mode: u32,
};
@group(0) @binding(0) var<uniform> u: Uniforms;
@group(1) @binding(0) var material_texture_diffuse1: texture_2d<f32>;
@group(1) @binding(1) var material_texture_diffuse1_sampler: sampler;
@group(1) @binding(2) var depth_map: texture_depth_2d;
@group(1) @binding(3) var depth_map_sampler: sampler_comparison;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    let base = textureSample(material_texture_diffuse1, material_texture_diffuse1_sampler, uv);
    let lit = textureSampleCompare(depth_map, depth_map_sampler, uv, 0.5);
    return base * lit * u.strength + vec4<f32>(u.eye, f32(u.mode)) * u.view[0].x;
}
"#;

    #[test]
    fn reflects_uniform_members_with_offsets() {
        let module = compile(SOURCE).expect("valid wgsl");
        let interface = reflect(&module);

        let eye = interface.uniforms.field("eye").unwrap();
        assert_eq!(eye.offset, 64);
        assert_eq!(eye.ty, UniformType::Vec3);

        let strength = interface.uniforms.field("strength").unwrap();
        assert_eq!(strength.offset, 76);
        assert_eq!(interface.uniforms.field("mode").unwrap().offset, 80);
        assert_eq!(interface.uniforms.size(), 96);
    }

    #[test]
    fn reflects_textures_and_samplers_in_binding_order() {
        let module = compile(SOURCE).expect("valid wgsl");
        let interface = reflect(&module);

        let names: Vec<_> = interface.textures.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["material_texture_diffuse1", "depth_map"]);
        assert_eq!(interface.textures[1].kind, SampleKind::Depth);
        assert!(interface.samplers[1].comparison);
        assert!(!interface.samplers[0].comparison);
    }

    #[test]
    fn dotted_names_resolve_to_globals() {
        let module = compile(SOURCE).expect("valid wgsl");
        let interface = reflect(&module);
        assert_eq!(
            interface.texture("material.texture_diffuse1").map(|t| t.binding),
            Some(0)
        );
        assert!(interface.texture("material.texture_specular1").is_none());
    }

    #[test]
    fn compile_reports_diagnostics() {
        let err = compile("fn broken( {").unwrap_err();
        assert!(!err.is_empty());
    }
}
