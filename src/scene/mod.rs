pub mod node;
pub mod serialization;

pub use node::{
    ColliderNode, ColliderShape, LodNode, MeshNode, NodeRole, PhysicsType, RigidbodyNode,
    SnapNode,
};

use crate::geometry::Mesh;
use glam::{EulerRot, Mat4, Vec3};

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("no object with id {0}")]
    UnknownObject(ObjectId),
    #[error("parenting {child} under {parent} would create a cycle")]
    ParentCycle { child: ObjectId, parent: ObjectId },
    #[error("object id {0} is used more than once")]
    DuplicateId(ObjectId),
}

pub type Result<T> = std::result::Result<T, SceneError>;

/// Stable object handle. Ids are never reused within one scene.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Local transform relative to the parent. Rotation is Euler degrees
/// applied in Z * Y * X order.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Transform {
    pub position: [f32; 3],
    pub rotation_deg: [f32; 3],
    pub scale: [f32; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: [0.0, 0.0, 0.0],
        rotation_deg: [0.0, 0.0, 0.0],
        scale: [1.0, 1.0, 1.0],
    };

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position: position.to_array(),
            ..Self::IDENTITY
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_cols_array(&compose_transform_matrix(
            self.position,
            self.rotation_deg,
            self.scale,
        ))
    }

    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        let (z, y, x) = rotation.to_euler(EulerRot::ZYX);
        Self {
            position: translation.to_array(),
            rotation_deg: [x.to_degrees(), y.to_degrees(), z.to_degrees()],
            scale: scale.to_array(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyShape {
    #[default]
    PlainAxes,
    Sphere,
    Cube,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EmptyDisplay {
    pub shape: EmptyShape,
    pub size: f32,
}

impl EmptyDisplay {
    pub fn axes(size: f32) -> Self {
        Self {
            shape: EmptyShape::PlainAxes,
            size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bone {
    pub name: String,
    #[serde(default)]
    pub parent: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Armature {
    pub bones: Vec<Bone>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ObjectKind {
    Mesh(Mesh),
    Empty(EmptyDisplay),
    Armature(Armature),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayType {
    #[default]
    Textured,
    Wire,
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SceneObject {
    pub id: ObjectId,
    pub name: String,
    pub kind: ObjectKind,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default)]
    pub parent: Option<ObjectId>,
    #[serde(default)]
    pub role: Option<NodeRole>,
    #[serde(default)]
    pub display: DisplayType,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

impl SceneObject {
    pub fn mesh(&self) -> Option<&Mesh> {
        match &self.kind {
            ObjectKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn mesh_mut(&mut self) -> Option<&mut Mesh> {
        match &mut self.kind {
            ObjectKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn is_mesh(&self) -> bool {
        matches!(self.kind, ObjectKind::Mesh(_))
    }

    pub fn is_rigidbody(&self) -> bool {
        self.role.as_ref().is_some_and(NodeRole::is_rigidbody)
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SceneState {
    objects: Vec<SceneObject>,
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    selection: Vec<ObjectId>,
    #[serde(default)]
    active: Option<ObjectId>,
}

impl SceneState {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> ObjectId {
        let id = self
            .objects
            .iter()
            .map(|object| object.id.0 + 1)
            .max()
            .unwrap_or(0)
            .max(self.next_id);
        self.next_id = id + 1;
        ObjectId(id)
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn object_names(&self) -> Vec<&str> {
        self.objects
            .iter()
            .map(|object| object.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn add_object(&mut self, name: impl Into<String>, kind: ObjectKind) -> ObjectId {
        let id = self.allocate_id();
        self.objects.push(SceneObject {
            id,
            name: name.into(),
            kind,
            transform: Transform::IDENTITY,
            parent: None,
            role: None,
            display: DisplayType::Textured,
            visible: true,
        });
        id
    }

    pub fn add_mesh(&mut self, name: impl Into<String>, mesh: Mesh) -> ObjectId {
        self.add_object(name, ObjectKind::Mesh(mesh))
    }

    pub fn add_empty(&mut self, name: impl Into<String>, display: EmptyDisplay) -> ObjectId {
        self.add_object(name, ObjectKind::Empty(display))
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.iter().find(|object| object.id == id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.iter_mut().find(|object| object.id == id)
    }

    pub fn require(&self, id: ObjectId) -> Result<&SceneObject> {
        self.get(id).ok_or(SceneError::UnknownObject(id))
    }

    pub fn require_mut(&mut self, id: ObjectId) -> Result<&mut SceneObject> {
        self.get_mut(id).ok_or(SceneError::UnknownObject(id))
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.get(id).is_some()
    }

    pub fn name_of(&self, id: ObjectId) -> Option<&str> {
        self.get(id).map(|object| object.name.as_str())
    }

    pub fn find_by_name(&self, name: &str) -> Option<ObjectId> {
        self.objects
            .iter()
            .find(|object| object.name == name)
            .map(|object| object.id)
    }

    /// Every object called `name`, in scene order. Names are not unique.
    pub fn find_all_by_name(&self, name: &str) -> Vec<ObjectId> {
        self.objects
            .iter()
            .filter(|object| object.name == name)
            .map(|object| object.id)
            .collect()
    }

    pub fn parent_of(&self, id: ObjectId) -> Option<ObjectId> {
        self.get(id).and_then(|object| object.parent)
    }

    pub fn children(&self, id: ObjectId) -> Vec<ObjectId> {
        self.objects
            .iter()
            .filter(|object| object.parent == Some(id))
            .map(|object| object.id)
            .collect()
    }

    /// All descendants in depth-first order, excluding `id` itself.
    pub fn descendants(&self, id: ObjectId) -> Vec<ObjectId> {
        let mut out = Vec::new();
        let mut stack: Vec<ObjectId> = self.children(id).into_iter().rev().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).into_iter().rev());
        }
        out
    }

    pub fn top_level(&self) -> Vec<ObjectId> {
        self.objects
            .iter()
            .filter(|object| object.parent.is_none())
            .map(|object| object.id)
            .collect()
    }

    /// Parents `child` under `parent` keeping its local transform.
    pub fn set_parent(&mut self, child: ObjectId, parent: Option<ObjectId>) -> Result<()> {
        self.require(child)?;
        if let Some(parent) = parent {
            self.require(parent)?;
            let mut cursor = Some(parent);
            while let Some(current) = cursor {
                if current == child {
                    return Err(SceneError::ParentCycle { child, parent });
                }
                cursor = self.parent_of(current);
            }
        }
        self.require_mut(child)?.parent = parent;
        Ok(())
    }

    /// Checks invariants that `set_parent` enforces but a deserialized scene
    /// may break: unique ids, known parents and acyclic parent chains. Stale
    /// selection entries are dropped.
    pub fn validate(&mut self) -> Result<()> {
        let mut ids = std::collections::HashSet::with_capacity(self.objects.len());
        for object in &self.objects {
            if !ids.insert(object.id) {
                return Err(SceneError::DuplicateId(object.id));
            }
        }
        for object in &self.objects {
            let Some(parent) = object.parent else {
                continue;
            };
            let mut cursor = Some(parent);
            let mut steps = 0;
            while let Some(current) = cursor {
                steps += 1;
                if current == object.id || steps > self.objects.len() {
                    return Err(SceneError::ParentCycle {
                        child: object.id,
                        parent,
                    });
                }
                cursor = self.require(current)?.parent;
            }
        }
        self.selection.retain(|id| ids.contains(id));
        if self.active.is_some_and(|id| !ids.contains(&id)) {
            self.active = None;
        }
        Ok(())
    }

    pub fn world_matrix(&self, id: ObjectId) -> Option<Mat4> {
        let mut matrix = self.get(id)?.transform.matrix();
        let mut cursor = self.parent_of(id);
        while let Some(parent) = cursor {
            let object = self.get(parent)?;
            matrix = object.transform.matrix() * matrix;
            cursor = object.parent;
        }
        Some(matrix)
    }

    pub fn world_position(&self, id: ObjectId) -> Option<Vec3> {
        self.world_matrix(id)
            .map(|matrix| matrix.transform_point3(Vec3::ZERO))
    }

    /// Nearest object on the chain from `id` up to the scene root (inclusive)
    /// that carries a rigidbody role.
    pub fn rigidbody_ancestor(&self, id: ObjectId) -> Option<ObjectId> {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let object = self.get(current)?;
            if object.is_rigidbody() {
                return Some(current);
            }
            cursor = object.parent;
        }
        None
    }

    /// Deletes an object. Its children move to the scene root and keep
    /// their world transform.
    pub fn remove(&mut self, id: ObjectId) -> Result<SceneObject> {
        self.require(id)?;
        for child in self.children(id) {
            if let Some(world) = self.world_matrix(child) {
                let object = self.require_mut(child)?;
                object.transform = Transform::from_matrix(world);
                object.parent = None;
            }
        }
        self.selection.retain(|selected| *selected != id);
        if self.active == Some(id) {
            self.active = None;
        }
        let index = self
            .objects
            .iter()
            .position(|object| object.id == id)
            .ok_or(SceneError::UnknownObject(id))?;
        Ok(self.objects.remove(index))
    }

    pub fn selection(&self) -> &[ObjectId] {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: Vec<ObjectId>) {
        self.selection = selection
            .into_iter()
            .filter(|id| self.objects.iter().any(|object| object.id == *id))
            .collect();
    }

    pub fn select(&mut self, id: ObjectId) {
        if self.contains(id) && !self.selection.contains(&id) {
            self.selection.push(id);
        }
    }

    pub fn deselect_all(&mut self) {
        self.selection.clear();
    }

    pub fn is_selected(&self, id: ObjectId) -> bool {
        self.selection.contains(&id)
    }

    pub fn active(&self) -> Option<ObjectId> {
        self.active.filter(|id| self.contains(*id))
    }

    pub fn set_active(&mut self, id: Option<ObjectId>) {
        self.active = id;
    }
}

pub fn compose_transform_matrix(
    position: [f32; 3],
    rotation_deg: [f32; 3],
    scale: [f32; 3],
) -> [f32; 16] {
    let (rx, ry, rz) = (
        rotation_deg[0].to_radians(),
        rotation_deg[1].to_radians(),
        rotation_deg[2].to_radians(),
    );
    let (sx, cx) = rx.sin_cos();
    let (sy, cy) = ry.sin_cos();
    let (sz, cz) = rz.sin_cos();

    // Rotation order: Z (roll) * Y (yaw) * X (pitch)
    let r00 = cz * cy;
    let r01 = cz * sy * sx - sz * cx;
    let r02 = cz * sy * cx + sz * sx;
    let r10 = sz * cy;
    let r11 = sz * sy * sx + cz * cx;
    let r12 = sz * sy * cx - cz * sx;
    let r20 = -sy;
    let r21 = cy * sx;
    let r22 = cy * cx;

    let (sx, sy, sz) = (scale[0], scale[1], scale[2]);
    [
        r00 * sx,
        r10 * sx,
        r20 * sx,
        0.0,
        r01 * sy,
        r11 * sy,
        r21 * sy,
        0.0,
        r02 * sz,
        r12 * sz,
        r22 * sz,
        0.0,
        position[0],
        position[1],
        position[2],
        1.0,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::primitives;

    fn approx(a: Vec3, b: Vec3) -> bool {
        a.abs_diff_eq(b, 1e-4)
    }

    #[test]
    fn test_ids_are_not_reused_after_remove() {
        let mut scene = SceneState::new();
        let a = scene.add_empty("A", EmptyDisplay::axes(1.0));
        scene.remove(a).unwrap();
        let b = scene.add_empty("B", EmptyDisplay::axes(1.0));
        assert_ne!(a, b);
    }

    #[test]
    fn test_world_position_composes_parents() {
        let mut scene = SceneState::new();
        let parent = scene.add_empty("Parent", EmptyDisplay::axes(1.0));
        let child = scene.add_mesh("Child", primitives::cube("Child", 1.0));
        scene.get_mut(parent).unwrap().transform = Transform {
            position: [1.0, 0.0, 0.0],
            rotation_deg: [0.0, 0.0, 90.0],
            scale: [2.0, 2.0, 2.0],
        };
        scene.get_mut(child).unwrap().transform = Transform::from_position(Vec3::X);
        scene.set_parent(child, Some(parent)).unwrap();

        // Child offset (1,0,0) scaled by 2 and rotated 90 degrees about Z.
        assert!(approx(
            scene.world_position(child).unwrap(),
            Vec3::new(1.0, 2.0, 0.0)
        ));
    }

    #[test]
    fn test_set_parent_rejects_cycles() {
        let mut scene = SceneState::new();
        let a = scene.add_empty("A", EmptyDisplay::axes(1.0));
        let b = scene.add_empty("B", EmptyDisplay::axes(1.0));
        scene.set_parent(b, Some(a)).unwrap();
        assert!(matches!(
            scene.set_parent(a, Some(b)),
            Err(SceneError::ParentCycle { .. })
        ));
        assert!(matches!(
            scene.set_parent(a, Some(a)),
            Err(SceneError::ParentCycle { .. })
        ));
    }

    #[test]
    fn test_remove_keeps_child_world_transform() {
        let mut scene = SceneState::new();
        let parent = scene.add_empty("Parent", EmptyDisplay::axes(1.0));
        let child = scene.add_empty("Child", EmptyDisplay::axes(1.0));
        scene.get_mut(parent).unwrap().transform =
            Transform::from_position(Vec3::new(0.0, 3.0, 0.0));
        scene.get_mut(child).unwrap().transform =
            Transform::from_position(Vec3::new(1.0, 0.0, 0.0));
        scene.set_parent(child, Some(parent)).unwrap();
        scene.select(parent);
        scene.set_active(Some(parent));

        scene.remove(parent).unwrap();

        assert_eq!(scene.parent_of(child), None);
        assert!(approx(
            scene.world_position(child).unwrap(),
            Vec3::new(1.0, 3.0, 0.0)
        ));
        assert!(scene.selection().is_empty());
        assert_eq!(scene.active(), None);
    }

    #[test]
    fn test_rigidbody_ancestor_walks_up() {
        let mut scene = SceneState::new();
        let root = scene.add_empty("Rock", EmptyDisplay::axes(1.0));
        scene.get_mut(root).unwrap().role = Some(NodeRole::Rigidbody(RigidbodyNode {
            mass: 1.0,
            body_type: PhysicsType::Static,
        }));
        let lod = scene.add_empty("LOD", EmptyDisplay::axes(0.75));
        let mesh = scene.add_mesh("RockMeshLOD0", primitives::cube("Rock", 1.0));
        scene.set_parent(lod, Some(root)).unwrap();
        scene.set_parent(mesh, Some(lod)).unwrap();

        assert_eq!(scene.rigidbody_ancestor(mesh), Some(root));
        assert_eq!(scene.rigidbody_ancestor(root), Some(root));
        assert_eq!(scene.descendants(root), vec![lod, mesh]);
    }

    #[test]
    fn test_transform_matrix_round_trip() {
        let transform = Transform {
            position: [1.0, -2.0, 0.5],
            rotation_deg: [0.0, 0.0, 30.0],
            scale: [1.0, 2.0, 3.0],
        };
        let back = Transform::from_matrix(transform.matrix());
        assert!(approx(Vec3::from_array(back.position), Vec3::from_array(transform.position)));
        assert!(approx(Vec3::from_array(back.scale), Vec3::from_array(transform.scale)));
        assert!((back.rotation_deg[2] - 30.0).abs() < 1e-3);
    }
}
