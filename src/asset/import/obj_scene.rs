use std::path::Path;

use super::{
    postprocess, ImportError, ImportedMaterial, ImportedMesh, ImportedNode, ImportedScene,
    ImportedTexture, PostProcessSteps, SceneImporter,
};
use crate::renderer::TextureKind;

/// Wavefront `.obj` reader. Material libraries are resolved next to the file.
#[derive(Clone, Copy, Debug, Default)]
pub struct ObjImporter;

impl SceneImporter for ObjImporter {
    fn import(&self, path: &Path, steps: PostProcessSteps) -> Result<ImportedScene, ImportError> {
        let options = tobj::LoadOptions {
            single_index: true,
            triangulate: false,
            ignore_points: true,
            ignore_lines: true,
            ..Default::default()
        };

        let (models, materials) = tobj::load_obj(path, &options).map_err(|err| match err {
            tobj::LoadError::OpenFileFailed | tobj::LoadError::ReadError => ImportError::Io {
                path: path.display().to_string(),
                message: err.to_string(),
            },
            other => ImportError::parse(path, other),
        })?;

        let materials = materials.unwrap_or_else(|err| {
            log::warn!("Failed to load materials for {}: {}", path.display(), err);
            Vec::new()
        });

        let meshes: Vec<ImportedMesh> = models.into_iter().map(read_model).collect();
        let root = ImportedNode {
            name: path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default(),
            meshes: Vec::new(),
            children: meshes
                .iter()
                .enumerate()
                .map(|(index, mesh)| ImportedNode {
                    name: mesh.name.clone(),
                    meshes: vec![index],
                    children: Vec::new(),
                })
                .collect(),
        };

        let mut scene = ImportedScene {
            incomplete: meshes.is_empty(),
            root: Some(root),
            meshes,
            materials: materials.iter().map(read_material).collect(),
        };
        postprocess::apply(&mut scene, steps);
        Ok(scene)
    }
}

fn read_model(model: tobj::Model) -> ImportedMesh {
    let mesh = model.mesh;

    let faces = if mesh.face_arities.is_empty() {
        mesh.indices.chunks_exact(3).map(<[u32]>::to_vec).collect()
    } else {
        let mut faces = Vec::with_capacity(mesh.face_arities.len());
        let mut start = 0usize;
        for &arity in &mesh.face_arities {
            let end = start + arity as usize;
            if let Some(face) = mesh.indices.get(start..end) {
                faces.push(face.to_vec());
            }
            start = end;
        }
        faces
    };

    // OBJ already stores v pointing up.
    let tex_coords = if mesh.texcoords.is_empty() {
        Vec::new()
    } else {
        vec![mesh.texcoords.chunks_exact(2).map(|uv| [uv[0], uv[1]]).collect()]
    };

    ImportedMesh {
        name: model.name,
        positions: mesh
            .positions
            .chunks_exact(3)
            .map(|p| [p[0], p[1], p[2]])
            .collect(),
        normals: mesh
            .normals
            .chunks_exact(3)
            .map(|n| [n[0], n[1], n[2]])
            .collect(),
        tex_coords,
        tangents: Vec::new(),
        bitangents: Vec::new(),
        faces,
        material: mesh.material_id,
    }
}

fn read_material(material: &tobj::Material) -> ImportedMaterial {
    let textures = [
        (TextureKind::Diffuse, &material.diffuse_texture),
        (TextureKind::Specular, &material.specular_texture),
        // `map_Bump` lands in the normal slot; it is sampled as a height map.
        (TextureKind::Height, &material.normal_texture),
    ]
    .into_iter()
    .filter_map(|(kind, texture)| {
        texture
            .as_deref()
            .filter(|path| !path.is_empty())
            .map(|path| (kind, ImportedTexture::file(path)))
    })
    .collect();

    ImportedMaterial {
        name: material.name.clone(),
        textures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("wgpu-bloom-obj-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn quad_is_triangulated_and_textured() {
        write_temp(
            "quad.mtl",
            "newmtl stone\nmap_Kd stone.png\nmap_Ks stone_spec.png\nmap_Bump stone_h.png\n",
        );
        let path = write_temp(
            "quad.obj",
            "mtllib quad.mtl\no quad\n\
             v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
             vt 0 0\nvt 1 0\nvt 1 1\nvt 0 1\n\
             vn 0 0 1\n\
             usemtl stone\nf 1/1/1 2/2/1 3/3/1 4/4/1\n",
        );

        let scene = ObjImporter
            .import(&path, PostProcessSteps::MODEL_RECIPE)
            .unwrap();

        assert!(!scene.incomplete);
        assert_eq!(scene.meshes.len(), 1);
        assert_eq!(scene.meshes[0].faces.len(), 2);
        assert!(scene.meshes[0].has_tangent_space());

        let material = &scene.materials[scene.meshes[0].material.unwrap()];
        let kinds: Vec<_> = material.textures.iter().map(|(kind, _)| *kind).collect();
        assert_eq!(
            kinds,
            [TextureKind::Diffuse, TextureKind::Specular, TextureKind::Height]
        );
        assert_eq!(material.textures[0].1.path, "stone.png");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = ObjImporter
            .import(Path::new("does/not/exist.obj"), PostProcessSteps::empty())
            .unwrap_err();
        assert!(matches!(err, ImportError::Io { .. }));
    }
}
