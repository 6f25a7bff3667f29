//! Snap point empties attached to rigidbodies.

use crate::scene::{EmptyDisplay, EmptyShape, NodeRole, ObjectId, SceneError, SceneState, SnapNode};
use glam::Vec3;

pub const SNAP_POINT_SIZE: f32 = 0.2;

#[derive(Debug, thiserror::Error)]
pub enum SnapError {
    #[error("no rigidbody object selected")]
    NoRigidbody,
    #[error("active object has no mesh data")]
    NotAMesh,
    #[error("vertex {index} out of range, mesh has {count} vertices")]
    VertexOutOfRange { index: usize, count: usize },
    #[error(transparent)]
    Scene(#[from] SceneError),
}

pub fn snap_point_name(number: usize) -> String {
    format!("SnapPoint.{:03}", number)
}

/// Adds snap points under the rigidbody owning the active object.
///
/// With `vertices`, one point is placed at each listed vertex of the active
/// mesh, otherwise a single point sits at the rigidbody origin. The new
/// points replace the selection and the last one becomes active.
pub fn add_snap_points(
    scene: &mut SceneState,
    vertices: Option<&[usize]>,
) -> Result<Vec<ObjectId>, SnapError> {
    let active = scene.active().ok_or(SnapError::NoRigidbody)?;
    let body = scene
        .rigidbody_ancestor(active)
        .ok_or(SnapError::NoRigidbody)?;
    let to_body_local = scene.world_matrix(body).unwrap_or_default().inverse();

    let locations: Vec<Vec3> = match vertices.filter(|indices| !indices.is_empty()) {
        Some(indices) => {
            let object = scene.require(active)?;
            let mesh = object.mesh().ok_or(SnapError::NotAMesh)?;
            let world = scene.world_matrix(active).unwrap_or_default();
            indices
                .iter()
                .map(|&index| {
                    let vertex = mesh.vertices.get(index).ok_or(SnapError::VertexOutOfRange {
                        index,
                        count: mesh.vertices.len(),
                    })?;
                    let world_point = world.transform_point3(Vec3::from_array(*vertex));
                    Ok(to_body_local.transform_point3(world_point))
                })
                .collect::<Result<_, SnapError>>()?
        }
        None => vec![Vec3::ZERO],
    };

    let mut created = Vec::with_capacity(locations.len());
    for (i, location) in locations.into_iter().enumerate() {
        let id = scene.add_empty(
            snap_point_name(i + 1),
            EmptyDisplay {
                shape: EmptyShape::Sphere,
                size: SNAP_POINT_SIZE,
            },
        );
        let object = scene.require_mut(id)?;
        object.role = Some(NodeRole::Snap(SnapNode {}));
        object.transform.position = location.to_array();
        scene.set_parent(id, Some(body))?;
        created.push(id);
    }

    scene.set_selection(created.clone());
    scene.set_active(created.last().copied());
    log::info!(
        "Added {} snap point{}",
        created.len(),
        if created.len() > 1 { "s" } else { "" }
    );
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::primitives;
    use crate::scene::{PhysicsType, RigidbodyNode};

    fn scene_with_body() -> (SceneState, ObjectId, ObjectId) {
        let mut scene = SceneState::new();
        let body = scene.add_empty("Cart", EmptyDisplay::axes(1.0));
        {
            let object = scene.get_mut(body).unwrap();
            object.role = Some(NodeRole::Rigidbody(RigidbodyNode {
                mass: 1.0,
                body_type: PhysicsType::Dynamic,
            }));
            object.transform.position = [10.0, 0.0, 0.0];
        }
        let mesh = scene.add_mesh("CartMesh", primitives::cube("CartMesh", 2.0));
        scene.get_mut(mesh).unwrap().transform.position = [0.0, 5.0, 0.0];
        scene.set_parent(mesh, Some(body)).unwrap();
        (scene, body, mesh)
    }

    #[test]
    fn test_single_point_at_rigidbody_origin() {
        let (mut scene, body, mesh) = scene_with_body();
        scene.set_active(Some(mesh));
        let created = add_snap_points(&mut scene, None).unwrap();
        assert_eq!(created.len(), 1);
        let point = scene.get(created[0]).unwrap();
        assert_eq!(point.name, "SnapPoint.001");
        assert_eq!(point.parent, Some(body));
        assert_eq!(point.transform.position, [0.0; 3]);
        assert_eq!(point.role, Some(NodeRole::Snap(SnapNode {})));
        assert_eq!(scene.active(), Some(created[0]));
    }

    #[test]
    fn test_points_at_vertices_in_body_space() {
        let (mut scene, _, mesh) = scene_with_body();
        scene.set_active(Some(mesh));
        let vertex = scene.get(mesh).unwrap().mesh().unwrap().vertices[0];
        let created = add_snap_points(&mut scene, Some(&[0, 1])).unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(scene.name_of(created[1]), Some("SnapPoint.002"));

        let expected = Vec3::from_array(vertex) + Vec3::new(0.0, 5.0, 0.0);
        let local = Vec3::from_array(scene.get(created[0]).unwrap().transform.position);
        assert!(local.abs_diff_eq(expected, 1e-5));
        assert_eq!(scene.selection(), created.as_slice());
    }

    #[test]
    fn test_requires_rigidbody() {
        let mut scene = SceneState::new();
        let loose = scene.add_mesh("Loose", primitives::cube("Loose", 1.0));
        scene.set_active(Some(loose));
        assert!(matches!(
            add_snap_points(&mut scene, None),
            Err(SnapError::NoRigidbody)
        ));
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn test_bad_vertex_index_creates_nothing() {
        let (mut scene, _, mesh) = scene_with_body();
        scene.set_active(Some(mesh));
        let before = scene.len();
        assert!(matches!(
            add_snap_points(&mut scene, Some(&[99])),
            Err(SnapError::VertexOutOfRange { index: 99, count: 8 })
        ));
        assert_eq!(scene.len(), before);
    }
}
