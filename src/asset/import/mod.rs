//! Scene-file importers.
//!
//! Importers turn a file into an owned [`ImportedScene`] snapshot: a node tree whose
//! nodes reference meshes by index, plus the meshes and materials themselves. The
//! renderer never touches file bytes beyond this boundary.

mod gltf_scene;
mod obj_scene;
pub mod postprocess;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::renderer::TextureKind;

pub use gltf_scene::GltfImporter;
pub use obj_scene::ObjImporter;

bitflags::bitflags! {
    /// Cleanup steps applied to an imported scene before it is handed out.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct PostProcessSteps: u32 {
        const TRIANGULATE = 1 << 0;
        const GEN_SMOOTH_NORMALS = 1 << 1;
        const FLIP_UVS = 1 << 2;
        const CALC_TANGENT_SPACE = 1 << 3;
        const OPTIMIZE_MESHES = 1 << 4;
    }
}

impl PostProcessSteps {
    /// Recipe every model load uses.
    pub const MODEL_RECIPE: Self = Self::TRIANGULATE
        .union(Self::GEN_SMOOTH_NORMALS)
        .union(Self::FLIP_UVS)
        .union(Self::CALC_TANGENT_SPACE)
        .union(Self::OPTIMIZE_MESHES);
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportedMesh {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    /// Empty when the source carries no normals.
    pub normals: Vec<[f32; 3]>,
    /// Texture coordinate channels, v pointing up. Channel 0 drives texturing.
    pub tex_coords: Vec<Vec<[f32; 2]>>,
    pub tangents: Vec<[f32; 3]>,
    pub bitangents: Vec<[f32; 3]>,
    /// Polygons as vertex index lists.
    pub faces: Vec<Vec<u32>>,
    pub material: Option<usize>,
}

impl ImportedMesh {
    /// First UV channel, if it covers every vertex.
    pub fn uv_channel(&self) -> Option<&[[f32; 2]]> {
        self.tex_coords
            .first()
            .filter(|channel| !channel.is_empty() && channel.len() == self.positions.len())
            .map(Vec::as_slice)
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty() && self.normals.len() == self.positions.len()
    }

    pub fn has_tangent_space(&self) -> bool {
        self.tangents.len() == self.positions.len()
            && self.bitangents.len() == self.positions.len()
            && !self.positions.is_empty()
    }
}

/// Image a material references: a path relative to the scene file, or bytes
/// stored inside the file (keyed `*<image index>`).
#[derive(Clone, Debug, PartialEq)]
pub struct ImportedTexture {
    pub path: String,
    pub embedded: Option<Arc<[u8]>>,
}

impl ImportedTexture {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            embedded: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportedMaterial {
    pub name: String,
    pub textures: Vec<(TextureKind, ImportedTexture)>,
}

impl ImportedMaterial {
    pub fn textures_of(&self, kind: TextureKind) -> impl Iterator<Item = &ImportedTexture> {
        self.textures
            .iter()
            .filter(move |(texture_kind, _)| *texture_kind == kind)
            .map(|(_, texture)| texture)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportedNode {
    pub name: String,
    pub meshes: Vec<usize>,
    pub children: Vec<ImportedNode>,
}

impl ImportedNode {
    /// Depth-first pre-order walk: a node, then each child subtree in listed order.
    pub fn pre_order(&self) -> PreOrder<'_> {
        PreOrder { stack: vec![self] }
    }
}

pub struct PreOrder<'a> {
    stack: Vec<&'a ImportedNode>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a ImportedNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ImportedScene {
    pub root: Option<ImportedNode>,
    pub meshes: Vec<ImportedMesh>,
    pub materials: Vec<ImportedMaterial>,
    /// Set when the importer could not produce a drawable scene.
    pub incomplete: bool,
}

#[derive(Debug)]
pub enum ImportError {
    Io { path: String, message: String },
    Parse { path: String, message: String },
    Unsupported { path: String },
}

impl ImportError {
    pub(crate) fn parse(path: &Path, err: impl fmt::Display) -> Self {
        ImportError::Parse {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::Io { path, message } => write!(f, "cannot read {path}: {message}"),
            ImportError::Parse { path, message } => write!(f, "cannot parse {path}: {message}"),
            ImportError::Unsupported { path } => write!(f, "no importer for {path}"),
        }
    }
}

impl std::error::Error for ImportError {}

/// Reads a scene file into an owned snapshot and applies `steps` to it.
pub trait SceneImporter {
    fn import(&self, path: &Path, steps: PostProcessSteps) -> Result<ImportedScene, ImportError>;
}

/// Picks an importer from the file extension.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultImporter;

impl SceneImporter for DefaultImporter {
    fn import(&self, path: &Path, steps: PostProcessSteps) -> Result<ImportedScene, ImportError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("gltf") | Some("glb") => GltfImporter.import(path, steps),
            Some("obj") => ObjImporter.import(path, steps),
            _ => Err(ImportError::Unsupported {
                path: path.display().to_string(),
            }),
        }
    }
}
