//! Batch edits of node role attributes.
//!
//! Targets are given as a comma-separated list of object names. A name
//! selects every object carrying it; names that do not resolve, or objects
//! without the matching role, are skipped.

use crate::scene::{NodeRole, ObjectId, PhysicsType, SceneState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFlag {
    CastShadow,
    ReceiveShadow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColliderFlag {
    Convex,
    Trigger,
}

impl std::str::FromStr for MeshFlag {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "castShadow" | "cast-shadow" => Ok(Self::CastShadow),
            "receiveShadow" | "receive-shadow" => Ok(Self::ReceiveShadow),
            other => Err(format!("unknown mesh flag '{}'", other)),
        }
    }
}

impl std::str::FromStr for ColliderFlag {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "convex" => Ok(Self::Convex),
            "trigger" => Ok(Self::Trigger),
            other => Err(format!("unknown collider flag '{}'", other)),
        }
    }
}

/// Every object carrying one of the listed names, each id once.
fn resolve_targets(scene: &SceneState, targets: &str) -> Vec<ObjectId> {
    let mut resolved: Vec<ObjectId> = Vec::new();
    for name in targets.split(',').map(str::trim).filter(|name| !name.is_empty()) {
        let found = scene.find_all_by_name(name);
        if found.is_empty() {
            log::warn!("Skipping '{}': no such object", name);
        }
        for id in found {
            if !resolved.contains(&id) {
                resolved.push(id);
            }
        }
    }
    resolved
}

fn update_roles(
    scene: &mut SceneState,
    targets: &str,
    mut update: impl FnMut(&mut NodeRole) -> bool,
) -> usize {
    let mut updated = 0;
    for id in resolve_targets(scene, targets) {
        let Some(object) = scene.get_mut(id) else {
            continue;
        };
        if object.role.as_mut().is_some_and(|role| update(role)) {
            updated += 1;
        } else {
            log::warn!("Skipping '{}': role does not have that property", object.name);
        }
    }
    updated
}

pub fn set_rigidbody_type(scene: &mut SceneState, body_type: PhysicsType, targets: &str) -> usize {
    update_roles(scene, targets, |role| match role {
        NodeRole::Rigidbody(body) => {
            body.body_type = body_type;
            true
        }
        _ => false,
    })
}

pub fn toggle_mesh_flag(scene: &mut SceneState, flag: MeshFlag, targets: &str) -> usize {
    update_roles(scene, targets, |role| match role {
        NodeRole::Mesh(mesh) => {
            let value = match flag {
                MeshFlag::CastShadow => &mut mesh.cast_shadow,
                MeshFlag::ReceiveShadow => &mut mesh.receive_shadow,
            };
            *value = !*value;
            true
        }
        _ => false,
    })
}

pub fn toggle_collider_flag(scene: &mut SceneState, flag: ColliderFlag, targets: &str) -> usize {
    update_roles(scene, targets, |role| match role {
        NodeRole::Collider(collider) => {
            let value = match flag {
                ColliderFlag::Convex => &mut collider.convex,
                ColliderFlag::Trigger => &mut collider.trigger,
            };
            *value = !*value;
            true
        }
        _ => false,
    })
}

/// Writes `body_type` to the rigidbody owning the active object.
pub fn apply_physics_type(scene: &mut SceneState, body_type: PhysicsType) -> Option<ObjectId> {
    let body = scene.rigidbody_ancestor(scene.active()?)?;
    if let Some(NodeRole::Rigidbody(node)) = scene.get_mut(body)?.role.as_mut() {
        node.body_type = body_type;
    }
    Some(body)
}

/// Writes `mass` to the active object when it is a rigidbody itself.
pub fn apply_mass(scene: &mut SceneState, mass: f32) -> Option<ObjectId> {
    let active = scene.active()?;
    match scene.get_mut(active)?.role.as_mut() {
        Some(NodeRole::Rigidbody(node)) => {
            node.mass = mass;
            Some(active)
        }
        _ => None,
    }
}
