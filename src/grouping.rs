//! Partitions candidate objects into LOD/collision asset groups.

use crate::naming::{base_name, is_collision_name};
use crate::scene::{ObjectId, SceneState};

/// One logical asset: a representative key plus every member sharing its
/// base name, in first-seen order. The key is itself a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetGroup {
    pub base_name: String,
    pub key: ObjectId,
    pub variants: Vec<ObjectId>,
}

impl AssetGroup {
    /// Members that are not collision objects.
    pub fn mesh_variants(&self, scene: &SceneState) -> Vec<ObjectId> {
        self.variants
            .iter()
            .copied()
            .filter(|id| scene.name_of(*id).is_some_and(|name| !is_collision_name(name)))
            .collect()
    }

    /// First collision-named member, if any.
    pub fn collision_variant(&self, scene: &SceneState) -> Option<ObjectId> {
        self.variants
            .iter()
            .copied()
            .find(|id| scene.name_of(*id).is_some_and(is_collision_name))
    }
}

/// Groups candidates by base name, preserving the order in which keys and
/// members were first seen. A collision object only keys its group until a
/// non-collision member arrives, which then takes over as key.
pub fn group_variants(scene: &SceneState, candidates: &[ObjectId]) -> Vec<AssetGroup> {
    let mut groups: Vec<AssetGroup> = Vec::new();

    for &candidate in candidates {
        let Some(name) = scene.name_of(candidate) else {
            log::warn!("Skipping unknown object {} while grouping", candidate);
            continue;
        };
        let base = base_name(name);
        let candidate_is_collision = is_collision_name(name);

        let existing = groups.iter_mut().find(|group| {
            scene
                .name_of(group.key)
                .map(base_name)
                .is_some_and(|key_base| key_base == base)
        });

        match existing {
            Some(group) => {
                if group.variants.contains(&candidate) {
                    continue;
                }
                group.variants.push(candidate);
                let key_is_collision = scene.name_of(group.key).is_some_and(is_collision_name);
                if key_is_collision && !candidate_is_collision {
                    log::debug!(
                        "Group '{}' re-keyed from collision object to '{}'",
                        group.base_name,
                        name
                    );
                    group.key = candidate;
                }
            }
            None => groups.push(AssetGroup {
                base_name: base,
                key: candidate,
                variants: vec![candidate],
            }),
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::primitives;

    fn scene_with(names: &[&str]) -> (SceneState, Vec<ObjectId>) {
        let mut scene = SceneState::new();
        let ids = names
            .iter()
            .map(|name| scene.add_mesh(*name, primitives::cube(name, 1.0)))
            .collect();
        (scene, ids)
    }

    #[test]
    fn test_empty_input_gives_no_groups() {
        let scene = SceneState::new();
        assert!(group_variants(&scene, &[]).is_empty());
    }

    #[test]
    fn test_rock_scenario() {
        let (scene, ids) = scene_with(&["Rock", "RockLOD1", "RockCOL"]);
        let groups = group_variants(&scene, &ids);
        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.key, ids[0]);
        assert_eq!(group.variants, ids);
        assert_eq!(group.mesh_variants(&scene), vec![ids[0], ids[1]]);
        assert_eq!(group.collision_variant(&scene), Some(ids[2]));
    }

    #[test]
    fn test_single_base_name_forms_one_group() {
        let (scene, ids) = scene_with(&["treeLOD2", "Tree_LOD0", "TREE", "TreeLOD1", "treecol"]);
        let groups = group_variants(&scene, &ids);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].variants.len(), ids.len());
    }

    #[test]
    fn test_groups_keep_first_seen_order() {
        let (scene, ids) = scene_with(&["Rock", "Tree", "RockLOD1", "Bush", "TreeLOD1"]);
        let groups = group_variants(&scene, &ids);
        let keys: Vec<ObjectId> = groups.iter().map(|g| g.key).collect();
        assert_eq!(keys, vec![ids[0], ids[1], ids[3]]);
        assert_eq!(groups[0].variants, vec![ids[0], ids[2]]);
        assert_eq!(groups[1].variants, vec![ids[1], ids[4]]);
    }

    #[test]
    fn test_collision_key_is_superseded_by_mesh() {
        let (scene, ids) = scene_with(&["RockCOL", "RockLOD0", "RockLOD1"]);
        let groups = group_variants(&scene, &ids);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].key, ids[1]);
        assert_eq!(groups[0].variants, ids);
    }

    #[test]
    fn test_lone_collision_object_stays_key() {
        let (scene, ids) = scene_with(&["RockCOL"]);
        let groups = group_variants(&scene, &ids);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].key, ids[0]);
        assert!(groups[0].mesh_variants(&scene).is_empty());
    }

    #[test]
    fn test_no_two_groups_share_a_base_name() {
        let (scene, ids) = scene_with(&["A", "B", "a_LOD1", "bCOL", "C", "cLOD3"]);
        let groups = group_variants(&scene, &ids);
        let mut names: Vec<&str> = groups.iter().map(|g| g.base_name.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), groups.len());
        assert_eq!(groups.len(), 3);
    }
}
