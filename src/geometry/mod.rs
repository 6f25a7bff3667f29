pub mod grid;
pub mod primitives;

pub use grid::GridProcessor;

use glam::Vec3;

#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    #[error("voxel size must be positive and finite, got {0}")]
    InvalidVoxelSize(f32),
    #[error("angle limit must be within (0, pi], got {0}")]
    InvalidAngleLimit(f32),
    #[error("merge threshold must be non-negative, got {0}")]
    InvalidThreshold(f32),
    #[error("face {face} references vertex {index} but mesh '{mesh}' has {count} vertices")]
    IndexOutOfRange {
        mesh: String,
        face: usize,
        index: u32,
        count: usize,
    },
}

pub type Result<T> = std::result::Result<T, GeometryError>;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Material {
    pub name: String,
    pub base_color: [f32; 4],
}

/// Polygon mesh data. Faces are vertex index loops of three or more entries.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Mesh {
    pub name: String,
    pub vertices: Vec<[f32; 3]>,
    pub faces: Vec<Vec<u32>>,
    #[serde(default)]
    pub materials: Vec<Material>,
}

impl Mesh {
    pub fn new(name: impl Into<String>, vertices: Vec<[f32; 3]>, faces: Vec<Vec<u32>>) -> Self {
        Self {
            name: name.into(),
            vertices,
            faces,
            materials: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Axis-aligned bounds as `(min, max)`, `None` for a mesh without vertices.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut iter = self.vertices.iter().map(|v| Vec3::from_array(*v));
        let first = iter.next()?;
        Some(iter.fold((first, first), |(min, max), v| (min.min(v), max.max(v))))
    }

    pub fn dimensions(&self) -> Vec3 {
        self.bounds()
            .map(|(min, max)| max - min)
            .unwrap_or(Vec3::ZERO)
    }

    pub fn clear_materials(&mut self) {
        self.materials.clear();
    }

    pub fn validate(&self) -> Result<()> {
        let count = self.vertices.len();
        for (face, indices) in self.faces.iter().enumerate() {
            if let Some(&index) = indices.iter().find(|&&i| i as usize >= count) {
                return Err(GeometryError::IndexOutOfRange {
                    mesh: self.name.clone(),
                    face,
                    index,
                    count,
                });
            }
        }
        Ok(())
    }

    /// Rewrites faces through `remap`, drops vertices that map nowhere and
    /// collapses repeated consecutive indices inside each face.
    pub(crate) fn apply_remap(&mut self, remap: &[u32], kept: Vec<[f32; 3]>) {
        for face in &mut self.faces {
            let mut rewritten: Vec<u32> = Vec::with_capacity(face.len());
            for &index in face.iter() {
                let mapped = remap[index as usize];
                if rewritten.last() != Some(&mapped) {
                    rewritten.push(mapped);
                }
            }
            while rewritten.len() > 1 && rewritten.first() == rewritten.last() {
                rewritten.pop();
            }
            *face = rewritten;
        }
        self.vertices = kept;
    }
}

/// Mesh-processing services applied by the simple collider path. Each call is
/// one atomic step; a failure leaves the mesh as it was before that step.
pub trait MeshProcessor {
    fn remesh(&mut self, mesh: &mut Mesh, voxel_size: f32) -> Result<()>;
    fn decimate(&mut self, mesh: &mut Mesh, angle_limit: f32) -> Result<()>;
    /// Returns the number of vertices removed.
    fn merge_close(&mut self, mesh: &mut Mesh, threshold: f32) -> Result<usize>;
    /// Returns the number of faces removed.
    fn remove_degenerate(&mut self, mesh: &mut Mesh) -> Result<usize>;
    /// Returns the number of vertices removed.
    fn remove_loose(&mut self, mesh: &mut Mesh) -> Result<usize>;
}
