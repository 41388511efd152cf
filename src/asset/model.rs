//! Imported models flattened into draw units.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::asset::import::{ImportedMesh, ImportedScene, PostProcessSteps, SceneImporter};
use crate::asset::{AssetCache, Handle};
use crate::renderer::mesh::{Mesh, TextureBinding};
use crate::renderer::program::Program;
use crate::renderer::texture::{MipGenerator, Texture, TextureKind};
use crate::renderer::vertex::Vertex;

/// One texture the model needs uploaded, keyed by the path the material gave.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureRequest {
    pub path: String,
    pub kind: TextureKind,
    pub embedded: Option<Arc<[u8]>>,
}

/// CPU-side geometry of one draw unit. `textures` pairs a kind with an index into
/// [`FlatScene::textures`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnitData {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub textures: Vec<(TextureKind, usize)>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlatScene {
    pub units: Vec<UnitData>,
    pub textures: Vec<TextureRequest>,
}

/// Walk the node tree depth-first, parent before children, emitting one unit per
/// mesh reference. Textures sharing a path are requested once. Meshes left with no
/// triangles (only points or lines) are skipped.
pub fn flatten_scene(scene: &ImportedScene) -> FlatScene {
    let mut flat = FlatScene::default();
    let Some(root) = scene.root.as_ref() else {
        return flat;
    };

    let mut loaded: HashMap<String, usize> = HashMap::new();
    for node in root.pre_order() {
        for &mesh_index in &node.meshes {
            let Some(mesh) = scene.meshes.get(mesh_index) else {
                log::warn!("Node '{}' references missing mesh {}", node.name, mesh_index);
                continue;
            };
            let mut unit = process_mesh(mesh);
            if unit.indices.is_empty() {
                log::warn!(
                    "Skipping mesh '{}' on node '{}': no triangles",
                    mesh.name,
                    node.name
                );
                continue;
            }
            if let Some(material) = mesh.material.and_then(|index| scene.materials.get(index)) {
                for kind in TextureKind::ALL {
                    for texture in material.textures_of(kind) {
                        let index = load_material_texture(
                            &mut flat.textures,
                            &mut loaded,
                            kind,
                            &texture.path,
                            texture.embedded.clone(),
                        );
                        unit.textures.push((kind, index));
                    }
                }
            }
            flat.units.push(unit);
        }
    }
    flat
}

fn load_material_texture(
    requests: &mut Vec<TextureRequest>,
    loaded: &mut HashMap<String, usize>,
    kind: TextureKind,
    path: &str,
    embedded: Option<Arc<[u8]>>,
) -> usize {
    *loaded.entry(path.to_string()).or_insert_with(|| {
        requests.push(TextureRequest {
            path: path.to_string(),
            kind,
            embedded,
        });
        requests.len() - 1
    })
}

fn process_mesh(mesh: &ImportedMesh) -> UnitData {
    let uvs = mesh.uv_channel();
    let has_tangents = uvs.is_some() && mesh.has_tangent_space();

    let vertices = (0..mesh.positions.len())
        .map(|i| {
            let mut vertex = Vertex {
                position: mesh.positions[i],
                normal: mesh.normals.get(i).copied().unwrap_or_default(),
                ..Default::default()
            };
            if let Some(uvs) = uvs {
                vertex.tex_coords = uvs[i];
                if has_tangents {
                    vertex.tangent = mesh.tangents[i];
                    vertex.bitangent = mesh.bitangents[i];
                }
            }
            vertex
        })
        .collect();

    UnitData {
        name: mesh.name.clone(),
        vertices,
        indices: mesh.faces.iter().flatten().copied().collect(),
        textures: Vec::new(),
    }
}

/// A loaded scene file: its draw units in traversal order and the textures they
/// share.
#[derive(Debug)]
pub struct Model {
    path: PathBuf,
    meshes: Vec<Mesh>,
    textures: AssetCache<Texture>,
}

impl Model {
    /// Import `path` and upload it. Any import failure yields an empty model.
    pub fn load(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        importer: &dyn SceneImporter,
        path: impl AsRef<Path>,
    ) -> Self {
        let path = path.as_ref();
        match importer.import(path, PostProcessSteps::MODEL_RECIPE) {
            Ok(scene) if !scene.incomplete && scene.root.is_some() => {
                Self::from_scene(device, queue, path, &scene)
            }
            Ok(_) => {
                log::error!("Cannot load model with path {}: scene is incomplete", path.display());
                Self::empty(path)
            }
            Err(err) => {
                log::error!("Cannot load model with path {}: {}", path.display(), err);
                Self::empty(path)
            }
        }
    }

    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            meshes: Vec::new(),
            textures: AssetCache::new(),
        }
    }

    pub fn from_scene(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        path: &Path,
        scene: &ImportedScene,
    ) -> Self {
        let flat = flatten_scene(scene);
        let directory = crate::io::asset_directory(path);

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let mut mips = MipGenerator::new();
        let mut textures = AssetCache::new();
        let handles: Vec<Handle<Texture>> = flat
            .textures
            .iter()
            .map(|request| {
                let texture = match &request.embedded {
                    Some(bytes) => {
                        Texture::from_encoded(device, queue, &mut mips, bytes, &request.path)
                    }
                    None => {
                        Texture::from_path(device, queue, &mut mips, directory.join(&request.path))
                    }
                };
                textures.insert(texture.unwrap_or_else(|err| {
                    log::error!("Texture failed to load at path: {} ({})", request.path, err);
                    Texture::black(device, queue)
                }))
            })
            .collect();

        let meshes = flat
            .units
            .iter()
            .map(|unit| {
                let bindings = unit
                    .textures
                    .iter()
                    .map(|&(kind, index)| TextureBinding {
                        texture: handles[index],
                        kind,
                        path: flat.textures[index].path.clone(),
                    })
                    .collect();
                Mesh::new(device, &unit.name, &unit.vertices, &unit.indices, bindings)
            })
            .collect::<Vec<_>>();

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            log::error!("Uploading model {} failed: {}", path.display(), err);
        }

        log::info!(
            "Loaded model {}: {} meshes, {} textures",
            path.display(),
            meshes.len(),
            textures.len()
        );

        Self {
            path: path.to_path_buf(),
            meshes,
            textures,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn textures(&self) -> &AssetCache<Texture> {
        &self.textures
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Draw every unit in order with `program`; returns the draw call count.
    pub fn draw(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pass: &mut wgpu::RenderPass<'_>,
        program: &mut Program,
    ) -> u32 {
        for mesh in &self.meshes {
            mesh.draw(device, queue, pass, program, &self.textures);
        }
        self.meshes.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::import::{ImportedMaterial, ImportedNode, ImportedTexture};

    fn quad_mesh(name: &str, material: Option<usize>) -> ImportedMesh {
        ImportedMesh {
            name: name.into(),
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
            normals: vec![[0.0, 0.0, 1.0]; 4],
            tex_coords: vec![vec![[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]]],
            tangents: vec![[1.0, 0.0, 0.0]; 4],
            bitangents: vec![[0.0, 1.0, 0.0]; 4],
            faces: vec![vec![0, 1, 2], vec![0, 2, 3]],
            material,
        }
    }

    fn node(name: &str, meshes: Vec<usize>, children: Vec<ImportedNode>) -> ImportedNode {
        ImportedNode {
            name: name.into(),
            meshes,
            children,
        }
    }

    fn diffuse(path: &str) -> ImportedMaterial {
        ImportedMaterial {
            name: path.into(),
            textures: vec![(TextureKind::Diffuse, ImportedTexture::file(path))],
        }
    }

    #[test]
    fn textured_quad_becomes_one_unit() {
        let scene = ImportedScene {
            root: Some(node("root", vec![0], vec![])),
            meshes: vec![quad_mesh("quad", Some(0))],
            materials: vec![diffuse("a.png")],
            incomplete: false,
        };
        let flat = flatten_scene(&scene);
        assert_eq!(flat.units.len(), 1);
        assert_eq!(flat.units[0].vertices.len(), 4);
        assert_eq!(flat.units[0].indices, [0, 1, 2, 0, 2, 3]);
        assert_eq!(flat.units[0].textures, [(TextureKind::Diffuse, 0)]);
        assert_eq!(flat.textures.len(), 1);
        assert_eq!(flat.units[0].vertices[1].tangent, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn shared_texture_paths_are_requested_once() {
        let scene = ImportedScene {
            root: Some(node("root", vec![0, 1], vec![])),
            meshes: vec![quad_mesh("a", Some(0)), quad_mesh("b", Some(1))],
            materials: vec![diffuse("shared.png"), diffuse("shared.png")],
            incomplete: false,
        };
        let flat = flatten_scene(&scene);
        assert_eq!(flat.textures.len(), 1);
        assert_eq!(flat.units[0].textures, flat.units[1].textures);
    }

    #[test]
    fn units_follow_depth_first_pre_order() {
        let meshes = ["root", "a", "a1", "b"]
            .iter()
            .map(|name| quad_mesh(name, None))
            .collect();
        let scene = ImportedScene {
            root: Some(node(
                "root",
                vec![0],
                vec![
                    node("a", vec![1], vec![node("a1", vec![2], vec![])]),
                    node("b", vec![3], vec![]),
                ],
            )),
            meshes,
            materials: Vec::new(),
            incomplete: false,
        };
        let names: Vec<_> = flatten_scene(&scene)
            .units
            .into_iter()
            .map(|unit| unit.name)
            .collect();
        assert_eq!(names, ["root", "a", "a1", "b"]);
    }

    #[test]
    fn meshes_without_uvs_zero_fill_texture_space() {
        let mut mesh = quad_mesh("bare", None);
        mesh.tex_coords.clear();
        let scene = ImportedScene {
            root: Some(node("root", vec![0], vec![])),
            meshes: vec![mesh],
            materials: Vec::new(),
            incomplete: false,
        };
        let flat = flatten_scene(&scene);
        for vertex in &flat.units[0].vertices {
            assert_eq!(vertex.tex_coords, [0.0, 0.0]);
            assert_eq!(vertex.tangent, [0.0; 3]);
            assert_eq!(vertex.bitangent, [0.0; 3]);
        }
    }

    #[test]
    fn meshes_without_triangles_are_skipped() {
        let mut lines = quad_mesh("lines", Some(0));
        lines.faces.clear();
        let scene = ImportedScene {
            root: Some(node("root", vec![0, 1], vec![node("child", vec![0], vec![])])),
            meshes: vec![lines, quad_mesh("quad", None)],
            materials: vec![diffuse("unused.png")],
            incomplete: false,
        };
        let flat = flatten_scene(&scene);
        let names: Vec<_> = flat.units.iter().map(|unit| unit.name.as_str()).collect();
        assert_eq!(names, ["quad"]);
        assert!(flat.textures.is_empty());
    }

    #[test]
    fn scene_without_root_is_empty() {
        let scene = ImportedScene::default();
        assert_eq!(flatten_scene(&scene), FlatScene::default());
    }
}
