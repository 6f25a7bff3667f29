//! Rigidbody hierarchy construction.
//!
//! A built tree looks like:
//!
//! ```text
//! Rock            rigidbody {mass, type}
//! ├── LOD         lod
//! │   ├── RockMeshLOD0   Mesh {castShadow, receiveShadow, maxDistance: 25}
//! │   └── RockMeshLOD1   Mesh {maxDistance: 50}
//! └── Collider    collider {convex, trigger}
//! ```
//!
//! Builders only copy from their inputs; deleting the consumed source objects
//! is left to the caller.

pub mod collider;

use crate::geometry::{primitives, GeometryError, MeshProcessor};
use crate::grouping::group_variants;
use crate::naming::{base_name, is_collision_name, lod_index, stem};
use crate::scene::{
    ColliderShape, EmptyDisplay, LodNode, MeshNode, NodeRole, ObjectId, ObjectKind,
    RigidbodyNode, SceneError, SceneState, Transform,
};
use crate::ui::{ColliderType, ToolConfig};
use glam::Vec3;

pub const LOD_NAME: &str = "LOD";
pub const DEFAULT_ROOT_NAME: &str = "Rigidbody";
pub const LOD_DISTANCE_STEP: f32 = 25.0;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid selection: {0}")]
    InvalidSelection(String),
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error("mesh processing failed on '{object}': {source}")]
    PartialMutation {
        object: String,
        #[source]
        source: GeometryError,
    },
}

pub type Result<T> = std::result::Result<T, BuildError>;

/// Display distance for the mesh at position `index` of the LOD sequence.
pub fn lod_max_distance(index: usize) -> f32 {
    if index == 0 {
        LOD_DISTANCE_STEP
    } else {
        LOD_DISTANCE_STEP + LOD_DISTANCE_STEP * index as f32
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    pub root: ObjectId,
    pub lod: ObjectId,
    pub meshes: Vec<ObjectId>,
    pub collider: Option<ObjectId>,
    /// Source objects whose data was copied; the caller deletes them.
    pub processed: Vec<ObjectId>,
}

pub struct RigidbodyBuilder<'a> {
    config: &'a ToolConfig,
    processor: &'a mut dyn MeshProcessor,
}

impl<'a> RigidbodyBuilder<'a> {
    pub fn new(config: &'a ToolConfig, processor: &'a mut dyn MeshProcessor) -> Self {
        Self { config, processor }
    }

    /// Synthesizes a rigidbody tree for `main` and its optional LOD/collision
    /// variants. Without variants the LOD sequence is `main` alone.
    pub fn build(
        &mut self,
        scene: &mut SceneState,
        main: ObjectId,
        variants: Option<&[ObjectId]>,
    ) -> Result<BuildOutput> {
        let main = resolve_main(scene, main)?;
        let main_name = scene.require(main)?.name.clone();
        let mut root_name = stem(&main_name);
        if root_name.is_empty() {
            root_name = DEFAULT_ROOT_NAME.to_string();
        }

        let root = self.create_root(scene, main, &root_name)?;

        let lod = scene.add_empty(LOD_NAME, EmptyDisplay::axes(0.75));
        scene.require_mut(lod)?.role = Some(NodeRole::Lod(LodNode {}));
        scene.set_parent(lod, Some(root))?;

        let sequence = lod_sequence(scene, main, variants);
        let mut processed = Vec::new();
        let mut meshes = Vec::with_capacity(sequence.len());
        for (index, &source) in sequence.iter().enumerate() {
            let mesh_id = self.copy_lod_mesh(scene, source, &root_name, index)?;
            scene.set_parent(mesh_id, Some(lod))?;
            meshes.push(mesh_id);
            processed.push(source);
        }

        let candidates: Vec<ObjectId> = match variants {
            Some(variants) => variants.to_vec(),
            None => scene.selection().to_vec(),
        };
        let main_base = base_name(&main_name);
        let collision_source = candidates.iter().copied().find(|id| {
            scene
                .name_of(*id)
                .is_some_and(|name| is_collision_name(name) && base_name(name) == main_base)
        });

        let collider = match collision_source {
            Some(source) => {
                let collider = collider::copy_mesh_collider(
                    scene,
                    source,
                    ColliderShape::ExactMesh,
                    self.config,
                )?;
                processed.push(source);
                collider
            }
            None => self.synthesize_collider(scene, main, &sequence)?,
        };
        if let Some(collider) = collider {
            scene.set_parent(collider, Some(root))?;
        }

        let mut seen = std::collections::HashSet::new();
        processed.retain(|id| seen.insert(*id));

        log::info!(
            "Built rigidbody '{}' with {} LOD mesh(es){}",
            root_name,
            meshes.len(),
            if collider.is_some() { " and collider" } else { "" }
        );
        Ok(BuildOutput {
            root,
            lod,
            meshes,
            collider,
            processed,
        })
    }

    fn create_root(&self, scene: &mut SceneState, main: ObjectId, name: &str) -> Result<ObjectId> {
        let world_position = scene.world_position(main).unwrap_or(Vec3::ZERO);
        let parent_body = scene
            .parent_of(main)
            .and_then(|parent| scene.rigidbody_ancestor(parent));

        let root = scene.add_empty(name, EmptyDisplay::axes(1.0));
        scene.require_mut(root)?.role = Some(NodeRole::Rigidbody(RigidbodyNode {
            mass: self.config.mass,
            body_type: self.config.physics_type,
        }));

        let local_position = match parent_body {
            Some(parent) => {
                scene.set_parent(root, Some(parent))?;
                let parent_world = scene.world_matrix(parent).unwrap_or_default();
                parent_world.inverse().transform_point3(world_position)
            }
            None => world_position,
        };
        scene.require_mut(root)?.transform = Transform::from_position(local_position);
        Ok(root)
    }

    fn copy_lod_mesh(
        &self,
        scene: &mut SceneState,
        source: ObjectId,
        root_name: &str,
        index: usize,
    ) -> Result<ObjectId> {
        let name = format!("{}MeshLOD{}", root_name, index);
        let source_object = scene.require(source)?;
        let mut kind = source_object.kind.clone();
        let display = source_object.display;
        if let ObjectKind::Mesh(mesh) = &mut kind {
            mesh.name = name.clone();
        }

        let id = scene.add_object(name, kind);
        let object = scene.require_mut(id)?;
        object.display = display;
        object.transform = Transform::IDENTITY;
        object.role = Some(NodeRole::Mesh(MeshNode {
            cast_shadow: self.config.cast_shadow,
            receive_shadow: self.config.receive_shadow,
            max_distance: lod_max_distance(index),
        }));
        Ok(id)
    }

    fn synthesize_collider(
        &mut self,
        scene: &mut SceneState,
        main: ObjectId,
        sequence: &[ObjectId],
    ) -> Result<Option<ObjectId>> {
        match self.config.collider_type {
            ColliderType::Box => collider::create_box_collider(scene, self.config).map(Some),
            ColliderType::Sphere => collider::create_sphere_collider(scene, self.config).map(Some),
            ColliderType::Simple => {
                let source = sequence
                    .iter()
                    .copied()
                    .filter_map(|id| {
                        let index = lod_index(scene.name_of(id)?)?;
                        Some((index, id))
                    })
                    .max_by_key(|(index, _)| *index)
                    .map(|(_, id)| id)
                    .unwrap_or(main);
                collider::create_simple_collider(scene, source, self.config, &mut *self.processor)
            }
            ColliderType::Geometry => {
                collider::copy_mesh_collider(scene, main, ColliderShape::ExactMesh, self.config)
            }
        }
    }
}

/// A collision-named main object hands over to a selected non-collision
/// object with the same base name, when there is one.
fn resolve_main(scene: &SceneState, main: ObjectId) -> Result<ObjectId> {
    let name = &scene.require(main)?.name;
    if !is_collision_name(name) {
        return Ok(main);
    }
    let base = base_name(name);
    let promoted = scene.selection().iter().copied().find(|id| {
        scene
            .name_of(*id)
            .is_some_and(|other| !is_collision_name(other) && base_name(other) == base)
    });
    match promoted {
        Some(id) => {
            log::debug!(
                "Using '{}' instead of collision object '{}'",
                scene.name_of(id).unwrap_or_default(),
                name
            );
            Ok(id)
        }
        None => Ok(main),
    }
}

/// Mesh-bearing, non-collision variants ordered by LOD number; names without
/// a number keep their relative order after all numbered ones.
fn lod_sequence(
    scene: &SceneState,
    main: ObjectId,
    variants: Option<&[ObjectId]>,
) -> Vec<ObjectId> {
    let mut sequence: Vec<(Option<u32>, ObjectId)> = match variants {
        Some(variants) => variants
            .iter()
            .copied()
            .filter_map(|id| {
                let name = scene.name_of(id)?;
                (!is_collision_name(name)).then(|| (lod_index(name), id))
            })
            .collect(),
        None => vec![(None, main)],
    };
    sequence.sort_by_key(|(index, _)| (index.is_none(), index.unwrap_or(0)));

    sequence
        .into_iter()
        .map(|(_, id)| id)
        .filter(|id| {
            let has_mesh = scene.get(*id).is_some_and(|object| object.is_mesh());
            if !has_mesh {
                log::warn!(
                    "'{}' has no mesh data, skipped as LOD",
                    scene.name_of(*id).unwrap_or_default()
                );
            }
            has_mesh
        })
        .collect()
}

/// Tree used when nothing is selected: a default cube under `LOD` plus a
/// box collider.
pub fn create_default_rigidbody(
    scene: &mut SceneState,
    config: &ToolConfig,
) -> Result<BuildOutput> {
    let root = scene.add_empty(DEFAULT_ROOT_NAME, EmptyDisplay::axes(1.0));
    scene.require_mut(root)?.role = Some(NodeRole::Rigidbody(RigidbodyNode {
        mass: config.mass,
        body_type: config.physics_type,
    }));

    let lod = scene.add_empty(LOD_NAME, EmptyDisplay::axes(0.75));
    scene.require_mut(lod)?.role = Some(NodeRole::Lod(LodNode {}));
    scene.set_parent(lod, Some(root))?;

    let mesh = scene.add_mesh("Mesh", primitives::cube("Mesh", 2.0));
    scene.require_mut(mesh)?.role = Some(NodeRole::Mesh(MeshNode {
        cast_shadow: config.cast_shadow,
        receive_shadow: config.receive_shadow,
        max_distance: lod_max_distance(0),
    }));
    scene.set_parent(mesh, Some(lod))?;

    let collider = collider::create_box_collider(scene, config)?;
    scene.set_parent(collider, Some(root))?;

    Ok(BuildOutput {
        root,
        lod,
        meshes: vec![mesh],
        collider: Some(collider),
        processed: Vec::new(),
    })
}

fn delete_processed(scene: &mut SceneState, processed: &[ObjectId]) -> Result<()> {
    for &id in processed {
        if scene.contains(id) {
            scene.remove(id)?;
        }
    }
    Ok(())
}

/// Single-object command: builds from the active object, or the default
/// tree when nothing is active, then deletes the consumed source.
pub fn create_rigidbody(
    scene: &mut SceneState,
    config: &ToolConfig,
    processor: &mut dyn MeshProcessor,
) -> Result<BuildOutput> {
    let Some(active) = scene.active() else {
        let output = create_default_rigidbody(scene, config)?;
        scene.deselect_all();
        scene.select(output.root);
        scene.set_active(Some(output.root));
        return Ok(output);
    };
    if !scene.require(active)?.is_mesh() {
        return Err(BuildError::InvalidSelection(
            "No valid objects to process".to_string(),
        ));
    }

    let output = RigidbodyBuilder::new(config, processor).build(scene, active, None)?;
    delete_processed(scene, &output.processed)?;
    scene.deselect_all();
    scene.select(output.root);
    scene.set_active(Some(output.root));
    Ok(output)
}

/// Batch command: groups the selected meshes by base name and builds one
/// rigidbody per group. Meshes whose parent is also selected ride along
/// with that parent and are not grouped themselves.
pub fn create_rigidbodies(
    scene: &mut SceneState,
    config: &ToolConfig,
    processor: &mut dyn MeshProcessor,
) -> Result<Vec<BuildOutput>> {
    let candidates: Vec<ObjectId> = scene
        .selection()
        .iter()
        .copied()
        .filter(|id| {
            scene.get(*id).is_some_and(|object| {
                object.is_mesh()
                    && object
                        .parent
                        .map_or(true, |parent| !scene.is_selected(parent))
            })
        })
        .collect();
    if candidates.is_empty() {
        return Err(BuildError::InvalidSelection(
            "No valid objects selected".to_string(),
        ));
    }

    let groups = group_variants(scene, &candidates);
    let mut outputs = Vec::with_capacity(groups.len());
    let mut builder = RigidbodyBuilder::new(config, processor);
    for group in &groups {
        outputs.push(builder.build(scene, group.key, Some(&group.variants))?);
    }

    let processed: Vec<ObjectId> = outputs
        .iter()
        .flat_map(|output| output.processed.iter().copied())
        .collect();
    delete_processed(scene, &processed)?;

    scene.deselect_all();
    for output in &outputs {
        scene.select(output.root);
    }
    scene.set_active(outputs.last().map(|output| output.root));
    log::info!("Created {} rigidbodies", outputs.len());
    Ok(outputs)
}
