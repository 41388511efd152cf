use std::collections::HashMap;

use glam::{Vec2, Vec3};

use super::{ImportedMesh, ImportedNode, ImportedScene, PostProcessSteps};

/// Apply `steps` in a fixed order: triangulate, normals, UV flip, tangents, merge.
pub fn apply(scene: &mut ImportedScene, steps: PostProcessSteps) {
    for mesh in &mut scene.meshes {
        if steps.contains(PostProcessSteps::TRIANGULATE) {
            triangulate(mesh);
        }
        if steps.contains(PostProcessSteps::GEN_SMOOTH_NORMALS) && !mesh.has_normals() {
            generate_smooth_normals(mesh);
        }
        if steps.contains(PostProcessSteps::FLIP_UVS) {
            flip_uvs(mesh);
        }
        if steps.contains(PostProcessSteps::CALC_TANGENT_SPACE) && !mesh.has_tangent_space() {
            calc_tangent_space(mesh);
        }
    }
    if steps.contains(PostProcessSteps::OPTIMIZE_MESHES) {
        optimize_meshes(scene);
    }
}

/// Fan-triangulate polygons; points and lines are dropped.
pub fn triangulate(mesh: &mut ImportedMesh) {
    if mesh.faces.iter().all(|face| face.len() == 3) {
        return;
    }
    let mut dropped = 0usize;
    let mut faces = Vec::with_capacity(mesh.faces.len());
    for face in mesh.faces.drain(..) {
        match face.len() {
            3 => faces.push(face),
            n if n > 3 => faces.extend((1..n - 1).map(|i| vec![face[0], face[i], face[i + 1]])),
            _ => dropped += 1,
        }
    }
    if dropped > 0 {
        log::debug!("Dropped {} point/line faces from mesh '{}'", dropped, mesh.name);
    }
    mesh.faces = faces;
}

/// Area-weighted vertex normals from face geometry.
pub fn generate_smooth_normals(mesh: &mut ImportedMesh) {
    let mut normals = vec![Vec3::ZERO; mesh.positions.len()];
    for [a, b, c] in triangles(&mesh.faces) {
        let (Some(pa), Some(pb), Some(pc)) = (
            mesh.positions.get(a),
            mesh.positions.get(b),
            mesh.positions.get(c),
        ) else {
            continue;
        };
        let (pa, pb, pc) = (Vec3::from(*pa), Vec3::from(*pb), Vec3::from(*pc));
        let face_normal = (pb - pa).cross(pc - pa);
        for index in [a, b, c] {
            normals[index] += face_normal;
        }
    }
    mesh.normals = normals
        .into_iter()
        .map(|n| n.normalize_or_zero().to_array())
        .collect();
}

/// Mirror every texture coordinate channel vertically.
pub fn flip_uvs(mesh: &mut ImportedMesh) {
    for channel in &mut mesh.tex_coords {
        for uv in channel.iter_mut() {
            uv[1] = 1.0 - uv[1];
        }
    }
}

/// Per-vertex tangents and bitangents from the first UV channel. Meshes without
/// texture coordinates are left without a tangent space.
pub fn calc_tangent_space(mesh: &mut ImportedMesh) {
    let Some(uvs) = mesh.uv_channel() else {
        return;
    };
    let count = mesh.positions.len();
    let mut tangents = vec![Vec3::ZERO; count];
    let mut bitangents = vec![Vec3::ZERO; count];

    for [a, b, c] in triangles(&mesh.faces) {
        if a >= count || b >= count || c >= count {
            continue;
        }
        let p = [a, b, c].map(|i| Vec3::from(mesh.positions[i]));
        let t = [a, b, c].map(|i| Vec2::from(uvs[i]));
        let (edge1, edge2) = (p[1] - p[0], p[2] - p[0]);
        let (duv1, duv2) = (t[1] - t[0], t[2] - t[0]);
        let det = duv1.x * duv2.y - duv2.x * duv1.y;
        if det.abs() <= f32::EPSILON {
            continue;
        }
        let r = 1.0 / det;
        let tangent = (edge1 * duv2.y - edge2 * duv1.y) * r;
        let bitangent = (edge2 * duv1.x - edge1 * duv2.x) * r;
        for index in [a, b, c] {
            tangents[index] += tangent;
            bitangents[index] += bitangent;
        }
    }

    let normals = &mesh.normals;
    mesh.tangents = tangents
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let n = normals.get(i).copied().map(Vec3::from).unwrap_or(Vec3::ZERO);
            (*t - n * n.dot(*t)).normalize_or_zero().to_array()
        })
        .collect();
    mesh.bitangents = bitangents
        .into_iter()
        .map(|b| b.normalize_or_zero().to_array())
        .collect();
}

/// Within each node, merge runs of consecutive single-use meshes that share a
/// material and vertex format, then drop meshes no node references.
pub fn optimize_meshes(scene: &mut ImportedScene) {
    let Some(mut root) = scene.root.take() else {
        return;
    };

    let mut uses: HashMap<usize, usize> = HashMap::new();
    for node in root.pre_order() {
        for &mesh in &node.meshes {
            *uses.entry(mesh).or_default() += 1;
        }
    }

    let before = scene.meshes.len();
    for_each_node_mut(&mut root, &mut |node| merge_node_meshes(node, &mut scene.meshes, &uses));
    prune_unreferenced(&mut root, &mut scene.meshes);
    if scene.meshes.len() != before {
        log::debug!("Merged {} meshes into {}", before, scene.meshes.len());
    }

    scene.root = Some(root);
}

fn merge_node_meshes(
    node: &mut ImportedNode,
    meshes: &mut Vec<ImportedMesh>,
    uses: &HashMap<usize, usize>,
) {
    let mut runs: Vec<Vec<usize>> = Vec::new();
    for &index in &node.meshes {
        let mergeable = uses.get(&index) == Some(&1) && index < meshes.len();
        let joins = match runs.last() {
            Some(run) if mergeable => {
                let last = run[run.len() - 1];
                uses.get(&last) == Some(&1)
                    && last < meshes.len()
                    && compatible(&meshes[last], &meshes[index])
            }
            _ => false,
        };
        match runs.last_mut() {
            Some(run) if joins => run.push(index),
            _ => runs.push(vec![index]),
        }
    }

    node.meshes = runs
        .into_iter()
        .map(|run| {
            if run.len() == 1 {
                return run[0];
            }
            let mut merged = meshes[run[0]].clone();
            for &index in &run[1..] {
                append_mesh(&mut merged, &meshes[index]);
            }
            meshes.push(merged);
            meshes.len() - 1
        })
        .collect();
}

fn compatible(a: &ImportedMesh, b: &ImportedMesh) -> bool {
    a.material == b.material
        && a.has_normals() == b.has_normals()
        && a.tex_coords.len() == b.tex_coords.len()
        && a.has_tangent_space() == b.has_tangent_space()
        && a.positions.len() + b.positions.len() <= u32::MAX as usize
}

fn append_mesh(target: &mut ImportedMesh, source: &ImportedMesh) {
    let base = target.positions.len() as u32;
    target.positions.extend_from_slice(&source.positions);
    target.normals.extend_from_slice(&source.normals);
    for (channel, extra) in target.tex_coords.iter_mut().zip(&source.tex_coords) {
        channel.extend_from_slice(extra);
    }
    target.tangents.extend_from_slice(&source.tangents);
    target.bitangents.extend_from_slice(&source.bitangents);
    target.faces.extend(
        source
            .faces
            .iter()
            .map(|face| face.iter().map(|i| i + base).collect::<Vec<_>>()),
    );
}

fn prune_unreferenced(root: &mut ImportedNode, meshes: &mut Vec<ImportedMesh>) {
    let mut slots: Vec<Option<ImportedMesh>> = std::mem::take(meshes).into_iter().map(Some).collect();
    let mut remap: HashMap<usize, usize> = HashMap::new();
    let mut kept: Vec<ImportedMesh> = Vec::new();

    for_each_node_mut(root, &mut |node| {
        let name = node.name.clone();
        node.meshes.retain_mut(|index| {
            if let Some(&new) = remap.get(index) {
                *index = new;
                return true;
            }
            match slots.get_mut(*index).and_then(Option::take) {
                Some(mesh) => {
                    kept.push(mesh);
                    remap.insert(*index, kept.len() - 1);
                    *index = kept.len() - 1;
                    true
                }
                None => {
                    log::warn!("Node '{}' references missing mesh {}", name, index);
                    false
                }
            }
        });
    });

    *meshes = kept;
}

fn for_each_node_mut(node: &mut ImportedNode, visit: &mut impl FnMut(&mut ImportedNode)) {
    visit(node);
    for child in &mut node.children {
        for_each_node_mut(child, visit);
    }
}

/// Index triples of every triangle, fanning any polygon that is still present.
fn triangles(faces: &[Vec<u32>]) -> impl Iterator<Item = [usize; 3]> + '_ {
    faces.iter().flat_map(|face| {
        (1..face.len().saturating_sub(1))
            .map(move |i| [face[0] as usize, face[i] as usize, face[i + 1] as usize])
    })
}
