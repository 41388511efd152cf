use std::path::Path;
use std::sync::Arc;

use glam::Vec3;
use gltf::mesh::Mode;

use super::{
    postprocess, ImportError, ImportedMaterial, ImportedMesh, ImportedNode, ImportedScene,
    ImportedTexture, PostProcessSteps, SceneImporter,
};
use crate::io;
use crate::renderer::TextureKind;

/// Node trees deeper than this are cut off; valid glTF trees never get close.
const MAX_NODE_DEPTH: usize = 256;

/// `.gltf` / `.glb` reader. Images are only referenced, never decoded here.
#[derive(Clone, Copy, Debug, Default)]
pub struct GltfImporter;

impl SceneImporter for GltfImporter {
    fn import(&self, path: &Path, steps: PostProcessSteps) -> Result<ImportedScene, ImportError> {
        let gltf::Gltf { document, blob } = gltf::Gltf::open(path).map_err(|err| match err {
            gltf::Error::Io(io_err) => ImportError::Io {
                path: path.display().to_string(),
                message: io_err.to_string(),
            },
            other => ImportError::parse(path, other),
        })?;

        let buffers = gltf::import_buffers(&document, Some(io::asset_directory(path)), blob)
            .map_err(|err| ImportError::parse(path, err))?;

        let mut scene = read_document(&document, &buffers);
        postprocess::apply(&mut scene, steps);
        Ok(scene)
    }
}

fn read_document(document: &gltf::Document, buffers: &[gltf::buffer::Data]) -> ImportedScene {
    let mut meshes = Vec::new();
    let mut mesh_primitives: Vec<Vec<usize>> = Vec::with_capacity(document.meshes().len());

    for mesh in document.meshes() {
        let mut indices = Vec::new();
        for primitive in mesh.primitives() {
            let name = match mesh.name() {
                Some(name) => format!("{}#{}", name, primitive.index()),
                None => format!("mesh{}#{}", mesh.index(), primitive.index()),
            };
            if let Some(imported) = read_primitive(&primitive, buffers, name) {
                indices.push(meshes.len());
                meshes.push(imported);
            }
        }
        mesh_primitives.push(indices);
    }

    let materials = document
        .materials()
        .map(|material| read_material(&material, buffers))
        .collect();

    let roots: Vec<gltf::Node> = match document.default_scene().or_else(|| document.scenes().next()) {
        Some(scene) => scene.nodes().collect(),
        None => {
            let children: Vec<usize> = document
                .nodes()
                .flat_map(|node| node.children().map(|child| child.index()).collect::<Vec<_>>())
                .collect();
            document
                .nodes()
                .filter(|node| !children.contains(&node.index()))
                .collect()
        }
    };

    let root = ImportedNode {
        name: "root".into(),
        meshes: Vec::new(),
        children: roots
            .iter()
            .map(|node| read_node(node, &mesh_primitives, 0))
            .collect(),
    };

    ImportedScene {
        incomplete: meshes.is_empty(),
        root: Some(root),
        meshes,
        materials,
    }
}

fn read_node(node: &gltf::Node, mesh_primitives: &[Vec<usize>], depth: usize) -> ImportedNode {
    let children = if depth < MAX_NODE_DEPTH {
        node.children()
            .map(|child| read_node(&child, mesh_primitives, depth + 1))
            .collect()
    } else {
        log::warn!("glTF node hierarchy deeper than {} levels; truncating", MAX_NODE_DEPTH);
        Vec::new()
    };
    ImportedNode {
        name: node.name().unwrap_or_default().to_string(),
        meshes: node
            .mesh()
            .and_then(|mesh| mesh_primitives.get(mesh.index()).cloned())
            .unwrap_or_default(),
        children,
    }
}

fn read_primitive(
    primitive: &gltf::Primitive,
    buffers: &[gltf::buffer::Data],
    name: String,
) -> Option<ImportedMesh> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));

    let Some(positions) = reader.read_positions() else {
        log::warn!("Skipping primitive {} without positions", name);
        return None;
    };
    let positions: Vec<[f32; 3]> = positions.collect();

    let normals: Vec<[f32; 3]> = reader
        .read_normals()
        .map(|normals| normals.collect())
        .unwrap_or_default();

    // glTF puts the UV origin top-left; imported meshes carry v pointing up.
    let mut tex_coords = Vec::new();
    while let Some(channel) = reader.read_tex_coords(tex_coords.len() as u32) {
        tex_coords.push(channel.into_f32().map(|[u, v]| [u, 1.0 - v]).collect::<Vec<_>>());
    }

    let (tangents, bitangents) = match reader.read_tangents() {
        Some(tangents) if normals.len() == positions.len() => tangents
            .zip(&normals)
            .map(|([x, y, z, w], normal)| {
                let tangent = Vec3::new(x, y, z);
                let bitangent = Vec3::from(*normal).cross(tangent) * w;
                (tangent.to_array(), bitangent.to_array())
            })
            .unzip(),
        _ => (Vec::new(), Vec::new()),
    };

    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };

    let faces = match primitive.mode() {
        Mode::Triangles => indices.chunks_exact(3).map(<[u32]>::to_vec).collect(),
        Mode::TriangleStrip => (0..indices.len().saturating_sub(2))
            .map(|i| {
                if i % 2 == 0 {
                    vec![indices[i], indices[i + 1], indices[i + 2]]
                } else {
                    vec![indices[i + 1], indices[i], indices[i + 2]]
                }
            })
            .collect(),
        // A fan is a single convex polygon around its first vertex.
        Mode::TriangleFan if indices.len() >= 3 => vec![indices],
        mode => {
            log::warn!("Skipping primitive {} with unsupported mode {:?}", name, mode);
            return None;
        }
    };

    Some(ImportedMesh {
        name,
        positions,
        normals,
        tex_coords,
        tangents,
        bitangents,
        faces,
        material: primitive.material().index(),
    })
}

fn read_material(material: &gltf::Material, buffers: &[gltf::buffer::Data]) -> ImportedMaterial {
    let mut textures = Vec::new();
    if let Some(info) = material.pbr_metallic_roughness().base_color_texture() {
        textures.push((TextureKind::Diffuse, read_image(&info.texture().source(), buffers)));
    }
    if let Some(normal) = material.normal_texture() {
        textures.push((TextureKind::Normal, read_image(&normal.texture().source(), buffers)));
    }
    ImportedMaterial {
        name: material.name().unwrap_or_default().to_string(),
        textures,
    }
}

fn read_image(image: &gltf::Image, buffers: &[gltf::buffer::Data]) -> ImportedTexture {
    let embedded_key = format!("*{}", image.index());
    match image.source() {
        gltf::image::Source::Uri { uri, .. } if uri.starts_with("data:") => {
            let payload = uri.split_once(";base64,").map(|(_, data)| data);
            match payload.map(base64::decode) {
                Some(Ok(bytes)) => ImportedTexture {
                    path: embedded_key,
                    embedded: Some(Arc::from(bytes)),
                },
                _ => {
                    log::warn!("Image {} has an unreadable data URI", image.index());
                    ImportedTexture::file(embedded_key)
                }
            }
        }
        gltf::image::Source::Uri { uri, .. } => ImportedTexture::file(percent_decode(uri)),
        gltf::image::Source::View { view, .. } => {
            let bytes = buffers.get(view.buffer().index()).and_then(|data| {
                data.0.get(view.offset()..view.offset() + view.length())
            });
            match bytes {
                Some(bytes) => ImportedTexture {
                    path: embedded_key,
                    embedded: Some(Arc::from(bytes)),
                },
                None => {
                    log::warn!("Image {} points outside its buffer", image.index());
                    ImportedTexture::file(embedded_key)
                }
            }
        }
    }
}

/// Decode `%XX` escapes in a relative URI.
fn percent_decode(uri: &str) -> String {
    let bytes = uri.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let escape = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = escape.and_then(|hex| u8::from_str_radix(hex, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_escapes_are_decoded() {
        assert_eq!(percent_decode("textures/stone%20wall.png"), "textures/stone wall.png");
        assert_eq!(percent_decode("plain.png"), "plain.png");
        assert_eq!(percent_decode("bad%zz.png"), "bad%zz.png");
        assert_eq!(percent_decode("tail%2"), "tail%2");
    }
}
