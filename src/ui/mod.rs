//! Tool settings and panel state.
//!
//! `ToolConfig` holds the user-editable defaults that rigidbody creation
//! reads; it is passed explicitly into every builder call.

use crate::hyp::HypContents;
use crate::scene::{NodeRole, ObjectId, PhysicsType, SceneState};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColliderType {
    Box,
    Sphere,
    Simple,
    #[default]
    Geometry,
}

impl std::str::FromStr for ColliderType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "box" => Ok(Self::Box),
            "sphere" => Ok(Self::Sphere),
            "simple" => Ok(Self::Simple),
            "geometry" => Ok(Self::Geometry),
            other => Err(format!("unknown collider type '{}'", other)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be a finite value >= 0, got {value}")]
    OutOfRange { field: &'static str, value: f32 },
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub physics_type: PhysicsType,
    pub mass: f32,
    pub convex: bool,
    pub trigger: bool,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
    pub collider_type: ColliderType,
    pub box_width: f32,
    pub box_height: f32,
    pub box_depth: f32,
    pub sphere_radius: f32,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            physics_type: PhysicsType::Dynamic,
            mass: 1.0,
            convex: false,
            trigger: false,
            cast_shadow: true,
            receive_shadow: true,
            collider_type: ColliderType::Geometry,
            box_width: 1.0,
            box_height: 1.0,
            box_depth: 1.0,
            sphere_radius: 1.0,
        }
    }
}

impl ToolConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("mass", self.mass),
            ("box_width", self.box_width),
            ("box_height", self.box_height),
            ("box_depth", self.box_depth),
            ("sphere_radius", self.sphere_radius),
        ];
        for (field, value) in fields {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::OutOfRange { field, value });
            }
        }
        Ok(())
    }
}

pub fn load_config_from_file(path: &Path) -> Result<ToolConfig, ConfigError> {
    let json = std::fs::read_to_string(path)?;
    let config: ToolConfig = serde_json::from_str(&json)?;
    config.validate()?;
    Ok(config)
}

/// Metadata of the most recently imported `.hyp` file.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct HypProperties {
    pub name: String,
    pub frozen: bool,
    pub script: String,
    pub interact: bool,
    pub click_distance: f32,
    pub collision: bool,
    pub visible: bool,
    pub id: String,
    pub version: i64,
    pub author: String,
    pub created: String,
    pub modified: String,
}

impl Default for HypProperties {
    fn default() -> Self {
        Self {
            name: String::new(),
            frozen: false,
            script: String::new(),
            interact: false,
            click_distance: 10.0,
            collision: true,
            visible: true,
            id: String::new(),
            version: 0,
            author: String::new(),
            created: String::new(),
            modified: String::new(),
        }
    }
}

impl HypProperties {
    pub fn from_contents(contents: &HypContents) -> Self {
        let blueprint = &contents.blueprint;
        Self {
            name: blueprint.name.clone().unwrap_or_default(),
            frozen: blueprint.frozen,
            script: contents
                .script
                .as_ref()
                .map(|script| script.name.clone())
                .unwrap_or_default(),
            interact: blueprint.props.interact,
            click_distance: blueprint.props.click_distance,
            collision: blueprint.props.collision,
            visible: blueprint.props.visible,
            id: blueprint.id.clone().unwrap_or_default(),
            version: blueprint.version,
            author: blueprint.author.clone().unwrap_or_default(),
            created: blueprint.created.clone().unwrap_or_default(),
            modified: blueprint.modified.clone().unwrap_or_default(),
        }
    }
}

pub struct UiState {
    pub config: ToolConfig,
    pub hyp: HypProperties,
    summary: String,
}

impl Default for UiState {
    fn default() -> Self {
        Self::new()
    }
}

impl UiState {
    pub fn new() -> Self {
        Self::with_config(ToolConfig::default())
    }

    pub fn with_config(config: ToolConfig) -> Self {
        Self {
            config,
            hyp: HypProperties::default(),
            summary: String::new(),
        }
    }

    /// Rebuilds the text summary: one block per rigidbody with its LOD
    /// meshes and collider, followed by a count of untagged objects.
    pub fn update(&mut self, scene: &SceneState) {
        let mut summary = String::new();
        let mut untagged = 0;
        for object in scene.objects() {
            match &object.role {
                Some(NodeRole::Rigidbody(body)) => {
                    summary.push_str(&format!(
                        "{} [{} mass {:.2}]\n",
                        object.name,
                        body.body_type.as_str(),
                        body.mass
                    ));
                    for id in scene.descendants(object.id) {
                        summary.push_str(&describe_child(scene, id));
                    }
                }
                None => untagged += 1,
                _ => {}
            }
        }
        summary.push_str(&format!("Untagged objects: {}", untagged));
        if !self.hyp.name.is_empty() {
            summary.push_str(&format!(
                "\nImported: {} v{}{}",
                self.hyp.name,
                self.hyp.version,
                if self.hyp.frozen { " (frozen)" } else { "" }
            ));
        }
        self.summary = summary;
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }
}

fn describe_child(scene: &SceneState, id: ObjectId) -> String {
    let Some(object) = scene.get(id) else {
        return String::new();
    };
    match &object.role {
        Some(NodeRole::Mesh(mesh)) => format!(
            "  mesh {} (max distance {:.0}, shadows {}/{})\n",
            object.name, mesh.max_distance, mesh.cast_shadow, mesh.receive_shadow
        ),
        Some(NodeRole::Collider(collider)) => format!(
            "  collider {} ({:?}, convex {}, trigger {})\n",
            object.name, collider.shape, collider.convex, collider.trigger
        ),
        Some(NodeRole::Snap(_)) => format!("  snap {}\n", object.name),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_panel_defaults() {
        let config = ToolConfig::default();
        assert_eq!(config.physics_type, PhysicsType::Dynamic);
        assert_eq!(config.collider_type, ColliderType::Geometry);
        assert_eq!(config.mass, 1.0);
        assert!(config.cast_shadow && config.receive_shadow);
        assert!(!config.convex && !config.trigger);
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"mass": 2.5, "physics_type": "static"}"#).unwrap();
        let config = load_config_from_file(&path).unwrap();
        assert_eq!(config.mass, 2.5);
        assert_eq!(config.physics_type, PhysicsType::Static);
        assert_eq!(config.sphere_radius, 1.0);
    }

    #[test]
    fn test_negative_mass_is_rejected() {
        let config = ToolConfig {
            mass: -1.0,
            ..ToolConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "mass", .. })
        ));
    }

    #[test]
    fn test_summary_lists_rigidbodies() {
        use crate::scene::{EmptyDisplay, RigidbodyNode};
        let mut scene = SceneState::new();
        let root = scene.add_empty("Crate", EmptyDisplay::axes(1.0));
        scene.get_mut(root).unwrap().role = Some(NodeRole::Rigidbody(RigidbodyNode {
            mass: 3.0,
            body_type: PhysicsType::Static,
        }));
        scene.add_empty("Loose", EmptyDisplay::axes(1.0));

        let mut ui = UiState::new();
        ui.update(&scene);
        assert!(ui.summary().starts_with("Crate [static mass 3.00]"));
        assert!(ui.summary().ends_with("Untagged objects: 1"));
    }
}
