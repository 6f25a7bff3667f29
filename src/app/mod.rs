//! Command surface over one editing session: the scene, the panel state and
//! the mesh processor. Every command runs to completion or aborts with a
//! `CommandError`; nothing is rolled back.

use crate::geometry::{primitives, GeometryError, GridProcessor, MeshProcessor};
use crate::glb::{self, GlbError, GlbExporter, GlbImporter, GltfExporter, GltfImporter};
use crate::hyp::{self, HypError, ModelPayload, ScriptPayload};
use crate::properties::{self, ColliderFlag, MeshFlag};
use crate::rename::{self, RenameError, RenameOptions};
use crate::rig::{self, RigDirection, RigError};
use crate::rigidbody::{self, BuildError};
use crate::scene::serialization::{self, SerializationError};
use crate::scene::{ObjectId, PhysicsType, SceneError, SceneState};
use crate::snap::{self, SnapError};
use crate::ui::{HypProperties, ToolConfig, UiState};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum SceneCommand {
    CreateRigidbody,
    CreateRigidbodies,
    AddSnapPoints { vertices: Option<Vec<usize>> },
    BatchRename { options: RenameOptions },
    CleanNames,
    ConvertRig { direction: RigDirection },
    ImportHyp { path: PathBuf, override_privilege: bool },
    ExportGlb { path: PathBuf },
    ExportAllGlb { directory: PathBuf },
    SetRigidbodyType { body_type: PhysicsType, targets: String },
    ToggleMeshFlag { flag: MeshFlag, targets: String },
    ToggleColliderFlag { flag: ColliderFlag, targets: String },
    SaveScene { path: PathBuf },
    LoadScene { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    None,
    Message(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{0}")]
    InvalidSelection(String),
    #[error("malformed container: {0}")]
    MalformedContainer(String),
    #[error("container has no {0} asset")]
    MissingAsset(String),
    #[error("mesh processing failed on '{object}': {source}")]
    PartialMutationFailure {
        object: String,
        #[source]
        source: GeometryError,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error("GLB codec error: {0}")]
    Codec(GlbError),
    #[error("scene file error: {0}")]
    Serialization(#[from] SerializationError),
}

impl From<BuildError> for CommandError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::InvalidSelection(message) => CommandError::InvalidSelection(message),
            BuildError::Scene(err) => CommandError::Scene(err),
            BuildError::PartialMutation { object, source } => {
                CommandError::PartialMutationFailure { object, source }
            }
        }
    }
}

impl From<HypError> for CommandError {
    fn from(err: HypError) -> Self {
        match err {
            HypError::Malformed(message) => CommandError::MalformedContainer(message),
            HypError::MissingAsset(kind) => CommandError::MissingAsset(kind.to_string()),
            HypError::Io(err) => CommandError::Io(err),
        }
    }
}

impl From<GlbError> for CommandError {
    fn from(err: GlbError) -> Self {
        match err {
            GlbError::NothingSelected => {
                CommandError::InvalidSelection("No objects selected".to_string())
            }
            GlbError::Io(err) => CommandError::Io(err),
            GlbError::Scene(err) => CommandError::Scene(err),
            other => CommandError::Codec(other),
        }
    }
}

impl From<SnapError> for CommandError {
    fn from(err: SnapError) -> Self {
        match err {
            SnapError::Scene(err) => CommandError::Scene(err),
            other => CommandError::InvalidSelection(other.to_string()),
        }
    }
}

impl From<RenameError> for CommandError {
    fn from(err: RenameError) -> Self {
        CommandError::InvalidSelection(err.to_string())
    }
}

impl From<RigError> for CommandError {
    fn from(err: RigError) -> Self {
        match err {
            RigError::Scene(err) => CommandError::Scene(err),
            other => CommandError::InvalidSelection(other.to_string()),
        }
    }
}

/// GLB collaborators used by import and export commands.
pub struct Codecs {
    pub importer: Box<dyn GlbImporter>,
    pub exporter: Box<dyn GlbExporter>,
}

impl Default for Codecs {
    fn default() -> Self {
        Self {
            importer: Box::new(GltfImporter),
            exporter: Box::new(GltfExporter),
        }
    }
}

pub struct App {
    pub scene: SceneState,
    pub ui: UiState,
    /// Script texts brought in by `.hyp` imports, replaced by name.
    pub scripts: Vec<ScriptPayload>,
    processor: Box<dyn MeshProcessor>,
}

impl Default for App {
    fn default() -> Self {
        Self::new(ToolConfig::default())
    }
}

impl App {
    pub fn new(config: ToolConfig) -> Self {
        Self::with_processor(config, Box::new(GridProcessor::new()))
    }

    pub fn with_processor(config: ToolConfig, processor: Box<dyn MeshProcessor>) -> Self {
        Self {
            scene: SceneState::new(),
            ui: UiState::with_config(config),
            scripts: Vec::new(),
            processor,
        }
    }

    pub fn with_scene(mut self, scene: SceneState) -> Self {
        self.scene = scene;
        self.ui.update(&self.scene);
        self
    }

    pub fn execute(
        &mut self,
        command: SceneCommand,
        codecs: &mut Codecs,
    ) -> Result<CommandOutcome, CommandError> {
        let outcome = self.run(command, codecs);
        self.ui.update(&self.scene);
        if let Err(err) = &outcome {
            log::warn!("Command failed: {}", err);
        }
        outcome
    }

    fn run(
        &mut self,
        command: SceneCommand,
        codecs: &mut Codecs,
    ) -> Result<CommandOutcome, CommandError> {
        let config = self.ui.config;
        match command {
            SceneCommand::CreateRigidbody => {
                let output =
                    rigidbody::create_rigidbody(&mut self.scene, &config, self.processor.as_mut())?;
                Ok(CommandOutcome::Message(format!(
                    "Created rigidbody '{}'",
                    self.scene.name_of(output.root).unwrap_or_default()
                )))
            }
            SceneCommand::CreateRigidbodies => {
                let outputs = rigidbody::create_rigidbodies(
                    &mut self.scene,
                    &config,
                    self.processor.as_mut(),
                )?;
                Ok(CommandOutcome::Message(format!(
                    "Created {} rigidbodies",
                    outputs.len()
                )))
            }
            SceneCommand::AddSnapPoints { vertices } => {
                let created = snap::add_snap_points(&mut self.scene, vertices.as_deref())?;
                Ok(CommandOutcome::Message(format!(
                    "Added {} snap point{}",
                    created.len(),
                    if created.len() > 1 { "s" } else { "" }
                )))
            }
            SceneCommand::BatchRename { options } => {
                rename::batch_rename(&mut self.scene, &options)?;
                Ok(CommandOutcome::None)
            }
            SceneCommand::CleanNames => {
                rename::clean_names(&mut self.scene)?;
                Ok(CommandOutcome::None)
            }
            SceneCommand::ConvertRig { direction } => {
                let active = self.scene.active().ok_or_else(|| {
                    CommandError::InvalidSelection("Please select an armature".to_string())
                })?;
                let target = rig::convert_rig(&mut self.scene, active, direction)?;
                Ok(CommandOutcome::Message(format!(
                    "Converted to {}",
                    target.object_name()
                )))
            }
            SceneCommand::ImportHyp {
                path,
                override_privilege,
            } => self.import_hyp(path, override_privilege, codecs),
            SceneCommand::ExportGlb { path } => {
                glb::export_selected(&self.scene, &path, codecs.exporter.as_mut())?;
                Ok(CommandOutcome::Message(format!(
                    "Exported selected objects to: {}",
                    path.display()
                )))
            }
            SceneCommand::ExportAllGlb { directory } => {
                let count =
                    glb::export_all(&mut self.scene, &directory, codecs.exporter.as_mut())?;
                Ok(CommandOutcome::Message(format!(
                    "Exported {} objects to GLB files",
                    count
                )))
            }
            SceneCommand::SetRigidbodyType { body_type, targets } => {
                let updated = properties::set_rigidbody_type(&mut self.scene, body_type, &targets);
                Ok(CommandOutcome::Message(format!("Updated {} rigidbodies", updated)))
            }
            SceneCommand::ToggleMeshFlag { flag, targets } => {
                let updated = properties::toggle_mesh_flag(&mut self.scene, flag, &targets);
                Ok(CommandOutcome::Message(format!("Updated {} meshes", updated)))
            }
            SceneCommand::ToggleColliderFlag { flag, targets } => {
                let updated = properties::toggle_collider_flag(&mut self.scene, flag, &targets);
                Ok(CommandOutcome::Message(format!("Updated {} colliders", updated)))
            }
            SceneCommand::SaveScene { path } => {
                serialization::save_scene_to_file(&self.scene, &path)?;
                log::info!("Scene saved to {:?}", path);
                Ok(CommandOutcome::None)
            }
            SceneCommand::LoadScene { path } => {
                self.scene = serialization::load_scene_from_file(&path)?;
                log::info!("Scene loaded from {:?}", path);
                Ok(CommandOutcome::None)
            }
        }
    }

    /// The container is fully parsed before the scene is touched.
    fn import_hyp(
        &mut self,
        path: PathBuf,
        override_privilege: bool,
        codecs: &mut Codecs,
    ) -> Result<CommandOutcome, CommandError> {
        let contents = hyp::read_hyp_file(&path, override_privilege)?;

        let created: Vec<ObjectId> = match &contents.model {
            ModelPayload::Glb(bytes) => codecs.importer.import(&mut self.scene, bytes)?,
            ModelPayload::Frozen => {
                let name = format!(
                    "FROZEN_{}",
                    contents
                        .blueprint
                        .name
                        .as_deref()
                        .filter(|name| !name.is_empty())
                        .unwrap_or("Object")
                );
                vec![self.scene.add_mesh(name.clone(), primitives::marker(&name))]
            }
        };

        if let Some(script) = &contents.script {
            self.scripts.retain(|existing| existing.name != script.name);
            self.scripts.push(script.clone());
        }
        self.ui.hyp = HypProperties::from_contents(&contents);

        self.scene.set_selection(created.clone());
        self.scene.set_active(created.first().copied());

        let message = if contents.is_gated() {
            "This is a frozen file. Loading placeholder model.".to_string()
        } else if contents.blueprint.frozen {
            "Admin Override Active".to_string()
        } else {
            format!("Successfully imported .hyp file: {}", path.display())
        };
        Ok(CommandOutcome::Message(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glb::ExportOptions;
    use crate::scene::{EmptyDisplay, NodeRole};
    use std::path::Path;

    struct FakeImporter;

    impl GlbImporter for FakeImporter {
        fn import(&mut self, scene: &mut SceneState, bytes: &[u8]) -> glb::Result<Vec<ObjectId>> {
            let name = String::from_utf8_lossy(bytes).to_string();
            Ok(vec![scene.add_empty(name, EmptyDisplay::axes(1.0))])
        }
    }

    struct NullExporter;

    impl GlbExporter for NullExporter {
        fn export(
            &mut self,
            _scene: &SceneState,
            _objects: &[ObjectId],
            _path: &Path,
            _options: &ExportOptions,
        ) -> glb::Result<()> {
            Ok(())
        }
    }

    fn codecs() -> Codecs {
        Codecs {
            importer: Box::new(FakeImporter),
            exporter: Box::new(NullExporter),
        }
    }

    fn write_hyp(dir: &Path, header: &str, payloads: &[&[u8]]) -> PathBuf {
        let mut bytes = (header.len() as u32).to_le_bytes().to_vec();
        bytes.extend_from_slice(header.as_bytes());
        for payload in payloads {
            bytes.extend_from_slice(payload);
        }
        let path = dir.join("app.hyp");
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_import_hyp_populates_scene_and_panel() {
        let dir = tempfile::tempdir().unwrap();
        let header = r#"{"blueprint":{"name":"Lamp","version":3,"script":"s"},
            "assets":[{"type":"model","size":8},{"type":"script","size":5}]}"#;
        let path = write_hyp(dir.path(), header, &[b"LampMesh", b"hi();"]);

        let mut app = App::default();
        let outcome = app
            .execute(
                SceneCommand::ImportHyp {
                    path,
                    override_privilege: false,
                },
                &mut codecs(),
            )
            .unwrap();
        assert!(matches!(outcome, CommandOutcome::Message(m) if m.starts_with("Successfully")));
        assert!(app.scene.find_by_name("LampMesh").is_some());
        assert_eq!(app.ui.hyp.name, "Lamp");
        assert_eq!(app.ui.hyp.version, 3);
        assert_eq!(app.ui.hyp.script, "Lamp.js");
        assert_eq!(app.scripts[0].text, "hi();");
    }

    #[test]
    fn test_frozen_import_adds_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let header = r#"{"blueprint":{"name":"Vault","frozen":true},
            "assets":[{"type":"model","size":4}]}"#;
        let path = write_hyp(dir.path(), header, &[b"real"]);

        let mut app = App::default();
        app.execute(
            SceneCommand::ImportHyp {
                path,
                override_privilege: false,
            },
            &mut codecs(),
        )
        .unwrap();
        let id = app.scene.find_by_name("FROZEN_Vault").unwrap();
        let mesh = app.scene.get(id).unwrap().mesh().unwrap();
        assert_eq!(mesh.materials[0].name, "Frozen_FROZEN_Vault");
        assert!(app.scene.find_by_name("real").is_none());
        assert!(app.ui.hyp.frozen);
    }

    #[test]
    fn test_malformed_container_leaves_scene_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_hyp(dir.path(), "{oops", &[]);
        let mut app = App::default();
        let err = app
            .execute(
                SceneCommand::ImportHyp {
                    path,
                    override_privilege: false,
                },
                &mut codecs(),
            )
            .unwrap_err();
        assert!(matches!(err, CommandError::MalformedContainer(_)));
        assert!(app.scene.is_empty());
    }

    #[test]
    fn test_export_without_selection_is_invalid() {
        let mut app = App::default();
        let err = app
            .execute(
                SceneCommand::ExportGlb {
                    path: PathBuf::from("out.glb"),
                },
                &mut codecs(),
            )
            .unwrap_err();
        assert!(matches!(err, CommandError::InvalidSelection(_)));
    }

    #[test]
    fn test_create_rigidbodies_then_toggle() {
        let mut scene = SceneState::new();
        let rock = scene.add_mesh("Rock", primitives::cube("Rock", 1.0));
        scene.set_selection(vec![rock]);
        let mut app = App::default().with_scene(scene);
        let mut codecs = codecs();

        app.execute(SceneCommand::CreateRigidbodies, &mut codecs).unwrap();
        assert!(app.ui.summary().starts_with("Rock [dynamic mass 1.00]"));

        let outcome = app
            .execute(
                SceneCommand::ToggleMeshFlag {
                    flag: MeshFlag::CastShadow,
                    targets: "RockMeshLOD0,Missing".to_string(),
                },
                &mut codecs,
            )
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Message("Updated 1 meshes".to_string()));
        let mesh = app.scene.find_by_name("RockMeshLOD0").unwrap();
        assert!(matches!(
            app.scene.get(mesh).unwrap().role,
            Some(NodeRole::Mesh(node)) if !node.cast_shadow
        ));
    }

    #[test]
    fn test_save_and_load_scene() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.json");
        let mut scene = SceneState::new();
        scene.add_empty("Marker", EmptyDisplay::axes(1.0));
        let mut app = App::default().with_scene(scene);
        let mut codecs = codecs();
        app.execute(SceneCommand::SaveScene { path: path.clone() }, &mut codecs)
            .unwrap();

        let mut fresh = App::default();
        fresh
            .execute(SceneCommand::LoadScene { path }, &mut codecs)
            .unwrap();
        assert_eq!(fresh.scene.object_names(), vec!["Marker"]);
    }
}
