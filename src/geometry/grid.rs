use super::{GeometryError, Mesh, MeshProcessor, Result};
use glam::Vec3;
use std::collections::HashMap;

const AREA_EPSILON: f32 = 1.0e-10;

/// In-process mesh processor built on uniform grids.
///
/// Remeshing clusters vertices into voxels, decimation merges near-coplanar
/// neighbouring faces into single polygons.
#[derive(Debug, Default, Clone, Copy)]
pub struct GridProcessor;

impl GridProcessor {
    pub fn new() -> Self {
        Self
    }
}

type CellKey = (i64, i64, i64);

fn cell_of(p: Vec3, size: f32) -> CellKey {
    (
        (p.x / size).floor() as i64,
        (p.y / size).floor() as i64,
        (p.z / size).floor() as i64,
    )
}

fn face_normal(vertices: &[[f32; 3]], face: &[u32]) -> Vec3 {
    // Newell's method, valid for non-planar and concave loops.
    let mut normal = Vec3::ZERO;
    for (i, &a) in face.iter().enumerate() {
        let b = face[(i + 1) % face.len()];
        let pa = Vec3::from_array(vertices[a as usize]);
        let pb = Vec3::from_array(vertices[b as usize]);
        normal.x += (pa.y - pb.y) * (pa.z + pb.z);
        normal.y += (pa.z - pb.z) * (pa.x + pb.x);
        normal.z += (pa.x - pb.x) * (pa.y + pb.y);
    }
    normal * 0.5
}

fn drop_collapsed_faces(mesh: &mut Mesh) -> usize {
    let before = mesh.faces.len();
    mesh.faces.retain(|face| {
        let mut distinct = face.clone();
        distinct.sort_unstable();
        distinct.dedup();
        distinct.len() >= 3
    });
    before - mesh.faces.len()
}

fn find(parents: &mut [usize], mut i: usize) -> usize {
    while parents[i] != i {
        parents[i] = parents[parents[i]];
        i = parents[i];
    }
    i
}

/// Joins the boundary of a face region into one loop, or `None` when the
/// region boundary is not a single simple cycle.
fn boundary_loop(faces: &[&Vec<u32>]) -> Option<Vec<u32>> {
    let mut edge_counts: HashMap<(u32, u32), usize> = HashMap::new();
    for face in faces {
        for (i, &a) in face.iter().enumerate() {
            let b = face[(i + 1) % face.len()];
            *edge_counts.entry((a.min(b), a.max(b))).or_default() += 1;
        }
    }

    let mut next: HashMap<u32, u32> = HashMap::new();
    let mut start = None;
    for face in faces {
        for (i, &a) in face.iter().enumerate() {
            let b = face[(i + 1) % face.len()];
            if edge_counts[&(a.min(b), a.max(b))] == 1 {
                if next.insert(a, b).is_some() {
                    return None;
                }
                start.get_or_insert(a);
            }
        }
    }

    let start = start?;
    let mut polygon = vec![start];
    let mut current = *next.get(&start)?;
    while current != start {
        if polygon.len() > next.len() {
            return None;
        }
        polygon.push(current);
        current = *next.get(&current)?;
    }
    (polygon.len() == next.len() && polygon.len() >= 3).then_some(polygon)
}

impl MeshProcessor for GridProcessor {
    fn remesh(&mut self, mesh: &mut Mesh, voxel_size: f32) -> Result<()> {
        if !(voxel_size.is_finite() && voxel_size > 0.0) {
            return Err(GeometryError::InvalidVoxelSize(voxel_size));
        }
        mesh.validate()?;

        let mut clusters: HashMap<CellKey, u32> = HashMap::new();
        let mut kept = Vec::new();
        let remap: Vec<u32> = mesh
            .vertices
            .iter()
            .map(|v| {
                let key = cell_of(Vec3::from_array(*v), voxel_size);
                *clusters.entry(key).or_insert_with(|| {
                    let center = (Vec3::new(key.0 as f32, key.1 as f32, key.2 as f32)
                        + Vec3::splat(0.5))
                        * voxel_size;
                    kept.push(center.to_array());
                    (kept.len() - 1) as u32
                })
            })
            .collect();

        let before = mesh.vertices.len();
        mesh.apply_remap(&remap, kept);
        drop_collapsed_faces(mesh);

        let mut seen = std::collections::HashSet::new();
        mesh.faces.retain(|face| {
            let mut key = face.clone();
            key.sort_unstable();
            seen.insert(key)
        });
        log::debug!(
            "Remeshed '{}' at voxel size {:.4}: {} -> {} vertices",
            mesh.name,
            voxel_size,
            before,
            mesh.vertices.len()
        );
        Ok(())
    }

    fn decimate(&mut self, mesh: &mut Mesh, angle_limit: f32) -> Result<()> {
        if !(angle_limit > 0.0 && angle_limit <= std::f32::consts::PI) {
            return Err(GeometryError::InvalidAngleLimit(angle_limit));
        }
        mesh.validate()?;

        let normals: Vec<Vec3> = mesh
            .faces
            .iter()
            .map(|face| face_normal(&mesh.vertices, face).normalize_or_zero())
            .collect();

        let mut edge_faces: HashMap<(u32, u32), Vec<usize>> = HashMap::new();
        for (index, face) in mesh.faces.iter().enumerate() {
            for (i, &a) in face.iter().enumerate() {
                let b = face[(i + 1) % face.len()];
                edge_faces.entry((a.min(b), a.max(b))).or_default().push(index);
            }
        }

        let mut parents: Vec<usize> = (0..mesh.faces.len()).collect();
        for shared in edge_faces.values() {
            if let &[f0, f1] = shared.as_slice() {
                let (n0, n1) = (normals[f0], normals[f1]);
                if n0 == Vec3::ZERO || n1 == Vec3::ZERO {
                    continue;
                }
                if n0.angle_between(n1) < angle_limit {
                    let (r0, r1) = (find(&mut parents, f0), find(&mut parents, f1));
                    if r0 != r1 {
                        parents[r1.max(r0)] = r0.min(r1);
                    }
                }
            }
        }

        let mut regions: HashMap<usize, Vec<usize>> = HashMap::new();
        for index in 0..mesh.faces.len() {
            let root = find(&mut parents, index);
            regions.entry(root).or_default().push(index);
        }

        let before = mesh.faces.len();
        let mut faces = Vec::with_capacity(before);
        for index in 0..mesh.faces.len() {
            let root = find(&mut parents, index);
            if root != index {
                continue;
            }
            let members = &regions[&root];
            if members.len() == 1 {
                faces.push(mesh.faces[index].clone());
                continue;
            }
            let region: Vec<&Vec<u32>> = members.iter().map(|&i| &mesh.faces[i]).collect();
            match boundary_loop(&region) {
                Some(polygon) => faces.push(polygon),
                None => faces.extend(region.into_iter().cloned()),
            }
        }
        mesh.faces = faces;
        log::debug!(
            "Decimated '{}' with angle limit {:.3}: {} -> {} faces",
            mesh.name,
            angle_limit,
            before,
            mesh.faces.len()
        );
        Ok(())
    }

    fn merge_close(&mut self, mesh: &mut Mesh, threshold: f32) -> Result<usize> {
        if !(threshold.is_finite() && threshold >= 0.0) {
            return Err(GeometryError::InvalidThreshold(threshold));
        }
        mesh.validate()?;

        let cell_size = threshold.max(f32::EPSILON);
        let mut grid: HashMap<CellKey, Vec<u32>> = HashMap::new();
        let mut kept: Vec<[f32; 3]> = Vec::new();
        let mut remap = Vec::with_capacity(mesh.vertices.len());

        for v in &mesh.vertices {
            let p = Vec3::from_array(*v);
            let (cx, cy, cz) = cell_of(p, cell_size);
            let mut found = None;
            'search: for dx in -1..=1 {
                for dy in -1..=1 {
                    for dz in -1..=1 {
                        if let Some(candidates) = grid.get(&(cx + dx, cy + dy, cz + dz)) {
                            for &candidate in candidates {
                                let q = Vec3::from_array(kept[candidate as usize]);
                                if p.distance(q) <= threshold {
                                    found = Some(candidate);
                                    break 'search;
                                }
                            }
                        }
                    }
                }
            }
            let index = match found {
                Some(index) => index,
                None => {
                    kept.push(*v);
                    let index = (kept.len() - 1) as u32;
                    grid.entry((cx, cy, cz)).or_default().push(index);
                    index
                }
            };
            remap.push(index);
        }

        let removed = mesh.vertices.len() - kept.len();
        mesh.apply_remap(&remap, kept);
        drop_collapsed_faces(mesh);
        Ok(removed)
    }

    fn remove_degenerate(&mut self, mesh: &mut Mesh) -> Result<usize> {
        mesh.validate()?;
        let mut removed = drop_collapsed_faces(mesh);
        let before = mesh.faces.len();
        let vertices = &mesh.vertices;
        mesh.faces
            .retain(|face| face_normal(vertices, face).length() > AREA_EPSILON);
        removed += before - mesh.faces.len();
        Ok(removed)
    }

    fn remove_loose(&mut self, mesh: &mut Mesh) -> Result<usize> {
        mesh.validate()?;
        let mut used = vec![false; mesh.vertices.len()];
        for face in &mesh.faces {
            for &index in face {
                used[index as usize] = true;
            }
        }

        let mut remap = vec![0u32; mesh.vertices.len()];
        let mut kept = Vec::new();
        for (index, vertex) in mesh.vertices.iter().enumerate() {
            if used[index] {
                remap[index] = kept.len() as u32;
                kept.push(*vertex);
            }
        }
        let removed = mesh.vertices.len() - kept.len();
        mesh.apply_remap(&remap, kept);
        Ok(removed)
    }
}
