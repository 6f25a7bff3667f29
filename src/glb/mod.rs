//! GLB codec seam: traits the commands talk to plus the batch export
//! helpers.

mod gltf_io;

pub use gltf_io::{encode_glb, GltfExporter, GltfImporter};

use crate::scene::{ObjectId, SceneError, SceneState};
use serde_json::{Map, Value};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum GlbError {
    #[error("glTF error: {0}")]
    Gltf(#[from] gltf::Error),
    #[error("failed to encode glTF JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("buffer {0} is not embedded in the GLB")]
    ExternalBuffer(usize),
    #[error("no objects selected")]
    NothingSelected,
    #[error(transparent)]
    Scene(#[from] SceneError),
}

pub type Result<T> = std::result::Result<T, GlbError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    /// Embed node roles as glTF node extras.
    pub include_extras: bool,
    /// Export root nodes with their world transform instead of the local one.
    pub apply_transforms: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_extras: true,
            apply_transforms: false,
        }
    }
}

pub trait GlbImporter {
    /// Populates `scene` from a GLB blob and returns the created objects.
    fn import(&mut self, scene: &mut SceneState, bytes: &[u8]) -> Result<Vec<ObjectId>>;
}

pub trait GlbExporter {
    fn export(
        &mut self,
        scene: &SceneState,
        objects: &[ObjectId],
        path: &Path,
        options: &ExportOptions,
    ) -> Result<()>;
}

/// Extras written for an object: its role fields, or nothing for plain
/// objects.
pub fn extras_for(scene: &SceneState, id: ObjectId) -> Option<Map<String, Value>> {
    scene.get(id)?.role.map(|role| role.to_extras())
}

pub fn export_selected(
    scene: &SceneState,
    path: &Path,
    exporter: &mut dyn GlbExporter,
) -> Result<()> {
    let selection = scene.selection();
    if selection.is_empty() {
        return Err(GlbError::NothingSelected);
    }
    exporter.export(scene, selection, path, &ExportOptions::default())?;
    log::info!("Exported selected objects to: {}", path.display());
    Ok(())
}

/// Writes every visible top-level object with its descendants to
/// `{directory}/{name}.glb`, exported at the origin. Positions and the
/// selection are restored afterwards.
pub fn export_all(
    scene: &mut SceneState,
    directory: &Path,
    exporter: &mut dyn GlbExporter,
) -> Result<usize> {
    let saved_selection = scene.selection().to_vec();
    let saved_active = scene.active();
    let roots: Vec<ObjectId> = scene
        .top_level()
        .into_iter()
        .filter(|id| scene.get(*id).is_some_and(|object| object.visible))
        .collect();

    let mut count = 0;
    let mut failure = None;
    for root in roots {
        if let Err(err) = export_root(scene, root, directory, exporter) {
            failure = Some(err);
            break;
        }
        count += 1;
    }

    scene.set_selection(saved_selection);
    scene.set_active(saved_active);
    if let Some(err) = failure {
        return Err(err);
    }
    log::info!("Exported {} objects to GLB files", count);
    Ok(count)
}

fn export_root(
    scene: &mut SceneState,
    root: ObjectId,
    directory: &Path,
    exporter: &mut dyn GlbExporter,
) -> Result<()> {
    let object = scene.require_mut(root)?;
    let saved_position = object.transform.position;
    object.transform.position = [0.0; 3];
    let path = directory.join(format!("{}.glb", object.name));

    let mut objects = vec![root];
    objects.extend(scene.descendants(root));
    scene.set_selection(objects.clone());
    scene.set_active(Some(root));

    let exported = exporter.export(scene, &objects, &path, &ExportOptions::default());
    scene.require_mut(root)?.transform.position = saved_position;
    exported
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::primitives;
    use crate::scene::{EmptyDisplay, LodNode, NodeRole};
    use std::path::PathBuf;

    #[derive(Default)]
    struct RecordingExporter {
        calls: Vec<(PathBuf, Vec<String>, [f32; 3])>,
        fail_on: Option<String>,
    }

    impl GlbExporter for RecordingExporter {
        fn export(
            &mut self,
            scene: &SceneState,
            objects: &[ObjectId],
            path: &Path,
            _options: &ExportOptions,
        ) -> Result<()> {
            let names: Vec<String> = objects
                .iter()
                .filter_map(|id| scene.name_of(*id).map(str::to_string))
                .collect();
            if self.fail_on.as_deref() == names.first().map(String::as_str) {
                return Err(GlbError::Io(std::io::Error::other("disk full")));
            }
            let position = scene.get(objects[0]).unwrap().transform.position;
            self.calls.push((path.to_path_buf(), names, position));
            Ok(())
        }
    }

    fn sample_scene() -> (SceneState, ObjectId, ObjectId) {
        let mut scene = SceneState::new();
        let rock = scene.add_empty("Rock", EmptyDisplay::axes(1.0));
        scene.get_mut(rock).unwrap().transform.position = [4.0, 5.0, 6.0];
        let lod = scene.add_empty("LOD", EmptyDisplay::axes(0.75));
        scene.set_parent(lod, Some(rock)).unwrap();
        let hidden = scene.add_mesh("Hidden", primitives::cube("Hidden", 1.0));
        scene.get_mut(hidden).unwrap().visible = false;
        scene.add_mesh("Tree", primitives::cube("Tree", 1.0));
        (scene, rock, lod)
    }

    #[test]
    fn test_export_selected_requires_selection() {
        let (scene, _, _) = sample_scene();
        let mut exporter = RecordingExporter::default();
        let err = export_selected(&scene, Path::new("out.glb"), &mut exporter).unwrap_err();
        assert!(matches!(err, GlbError::NothingSelected));
        assert!(exporter.calls.is_empty());
    }

    #[test]
    fn test_export_all_writes_visible_roots_at_origin() {
        let (mut scene, rock, lod) = sample_scene();
        scene.set_selection(vec![lod]);
        scene.set_active(Some(lod));
        let mut exporter = RecordingExporter::default();

        let count = export_all(&mut scene, Path::new("/tmp/out"), &mut exporter).unwrap();
        assert_eq!(count, 2);
        assert_eq!(exporter.calls[0].0, PathBuf::from("/tmp/out/Rock.glb"));
        assert_eq!(exporter.calls[0].1, vec!["Rock", "LOD"]);
        assert_eq!(exporter.calls[0].2, [0.0; 3]);
        assert_eq!(exporter.calls[1].1, vec!["Tree"]);

        assert_eq!(scene.get(rock).unwrap().transform.position, [4.0, 5.0, 6.0]);
        assert_eq!(scene.selection(), &[lod]);
        assert_eq!(scene.active(), Some(lod));
    }

    #[test]
    fn test_export_all_restores_state_on_failure() {
        let (mut scene, rock, _) = sample_scene();
        let mut exporter = RecordingExporter {
            fail_on: Some("Rock".to_string()),
            ..Default::default()
        };
        assert!(export_all(&mut scene, Path::new("/tmp/out"), &mut exporter).is_err());
        assert_eq!(scene.get(rock).unwrap().transform.position, [4.0, 5.0, 6.0]);
        assert!(scene.selection().is_empty());
    }

    #[test]
    fn test_extras_for_tagged_and_plain_objects() {
        let (mut scene, rock, lod) = sample_scene();
        scene.get_mut(lod).unwrap().role = Some(NodeRole::Lod(LodNode {}));
        assert_eq!(
            Value::Object(extras_for(&scene, lod).unwrap()),
            serde_json::json!({"node": "lod"})
        );
        assert!(extras_for(&scene, rock).is_none());
    }
}
