use super::BuildError;
use crate::geometry::{primitives, MeshProcessor};
use crate::scene::{
    ColliderNode, ColliderShape, DisplayType, NodeRole, ObjectId, ObjectKind, SceneState,
    Transform,
};
use crate::ui::ToolConfig;

pub const COLLIDER_NAME: &str = "Collider";

/// Voxel size of the simple collider remesh is the largest dimension over this.
pub const SIMPLE_VOXEL_DIVISOR: f32 = 4.0;
pub const SIMPLE_DECIMATE_ANGLE: f32 = 0.5;
pub const SIMPLE_MERGE_DISTANCE: f32 = 0.05;

/// Turns an object into a collider: fixed name, wireframe display, no
/// materials, identity transform and the configured physics flags.
pub fn setup_collider(
    scene: &mut SceneState,
    id: ObjectId,
    shape: ColliderShape,
    config: &ToolConfig,
) -> Result<(), BuildError> {
    let object = scene.require_mut(id)?;
    object.name = COLLIDER_NAME.to_string();
    object.display = DisplayType::Wire;
    if let Some(mesh) = object.mesh_mut() {
        mesh.clear_materials();
    }
    object.role = Some(NodeRole::Collider(ColliderNode {
        shape,
        convex: config.convex,
        trigger: config.trigger,
    }));
    object.transform = Transform::IDENTITY;
    Ok(())
}

pub fn is_collider(scene: &SceneState, id: ObjectId) -> bool {
    scene.get(id).is_some_and(|object| {
        matches!(object.role, Some(NodeRole::Collider(_))) && object.display == DisplayType::Wire
    })
}

pub fn create_box_collider(
    scene: &mut SceneState,
    config: &ToolConfig,
) -> Result<ObjectId, BuildError> {
    let id = scene.add_mesh(COLLIDER_NAME, primitives::cube(COLLIDER_NAME, 1.0));
    let shape = ColliderShape::Box {
        width: config.box_width,
        height: config.box_height,
        depth: config.box_depth,
    };
    setup_collider(scene, id, shape, config)?;
    scene.require_mut(id)?.transform.scale =
        [config.box_width, config.box_height, config.box_depth];
    Ok(id)
}

pub fn create_sphere_collider(
    scene: &mut SceneState,
    config: &ToolConfig,
) -> Result<ObjectId, BuildError> {
    let mesh = primitives::uv_sphere(
        COLLIDER_NAME,
        config.sphere_radius,
        primitives::SPHERE_SEGMENTS,
        primitives::SPHERE_RINGS,
    );
    let id = scene.add_mesh(COLLIDER_NAME, mesh);
    let shape = ColliderShape::Sphere {
        radius: config.sphere_radius,
    };
    setup_collider(scene, id, shape, config)?;
    Ok(id)
}

/// Deep-copies `source` into a new collider object. Returns `None` when the
/// source carries no mesh data.
pub fn copy_mesh_collider(
    scene: &mut SceneState,
    source: ObjectId,
    shape: ColliderShape,
    config: &ToolConfig,
) -> Result<Option<ObjectId>, BuildError> {
    let Some(mesh) = scene.require(source)?.mesh().cloned() else {
        log::warn!(
            "'{}' has no mesh data, no collider copied",
            scene.name_of(source).unwrap_or_default()
        );
        return Ok(None);
    };
    let id = scene.add_object(COLLIDER_NAME, ObjectKind::Mesh(mesh));
    setup_collider(scene, id, shape, config)?;
    Ok(Some(id))
}

/// Simplified collision hull: a deep copy of `source`, voxel remeshed,
/// planar-decimated and cleaned. On a processing failure the partially
/// processed collider stays in the scene.
pub fn create_simple_collider(
    scene: &mut SceneState,
    source: ObjectId,
    config: &ToolConfig,
    processor: &mut dyn MeshProcessor,
) -> Result<Option<ObjectId>, BuildError> {
    let Some(id) = copy_mesh_collider(scene, source, ColliderShape::SimpleMesh, config)? else {
        return Ok(None);
    };
    let mesh = scene
        .require_mut(id)?
        .mesh_mut()
        .ok_or_else(|| BuildError::InvalidSelection("collider copy lost its mesh".to_string()))?;
    let label = mesh.name.clone();
    let partial = |source| BuildError::PartialMutation {
        object: label.clone(),
        source,
    };

    let voxel_size = mesh.dimensions().max_element() / SIMPLE_VOXEL_DIVISOR;
    processor.remesh(mesh, voxel_size).map_err(partial)?;
    processor
        .decimate(mesh, SIMPLE_DECIMATE_ANGLE)
        .map_err(partial)?;
    processor
        .merge_close(mesh, SIMPLE_MERGE_DISTANCE)
        .map_err(partial)?;
    processor.remove_degenerate(mesh).map_err(partial)?;
    processor.remove_loose(mesh).map_err(partial)?;

    log::debug!(
        "Simple collider for '{}': {} vertices, {} faces",
        label,
        mesh.vertices.len(),
        mesh.faces.len()
    );
    Ok(Some(id))
}
