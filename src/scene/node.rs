//! Semantic roles of nodes in a rigidbody tree.
//!
//! Roles serialize to the flat property bag the web engine reads from glTF
//! extras, e.g. `{"node": "rigidbody", "mass": 1.0, "type": "dynamic"}`.

use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhysicsType {
    Static,
    #[default]
    Dynamic,
    Kinematic,
}

impl PhysicsType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Dynamic => "dynamic",
            Self::Kinematic => "kinematic",
        }
    }
}

impl std::str::FromStr for PhysicsType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "dynamic" => Ok(Self::Dynamic),
            "kinematic" => Ok(Self::Kinematic),
            other => Err(format!("unknown physics type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ColliderShape {
    Box {
        width: f32,
        height: f32,
        depth: f32,
    },
    Sphere {
        radius: f32,
    },
    SimpleMesh,
    #[default]
    ExactMesh,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RigidbodyNode {
    pub mass: f32,
    #[serde(rename = "type", default)]
    pub body_type: PhysicsType,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct LodNode {}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshNode {
    #[serde(default = "default_true")]
    pub cast_shadow: bool,
    #[serde(default = "default_true")]
    pub receive_shadow: bool,
    pub max_distance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ColliderNode {
    #[serde(default)]
    pub shape: ColliderShape,
    #[serde(default)]
    pub convex: bool,
    #[serde(default)]
    pub trigger: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct SnapNode {}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "node")]
pub enum NodeRole {
    #[serde(rename = "rigidbody")]
    Rigidbody(RigidbodyNode),
    #[serde(rename = "lod")]
    Lod(LodNode),
    #[serde(rename = "Mesh")]
    Mesh(MeshNode),
    #[serde(rename = "collider")]
    Collider(ColliderNode),
    #[serde(rename = "snap")]
    Snap(SnapNode),
}

impl NodeRole {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Rigidbody(_) => "rigidbody",
            Self::Lod(_) => "lod",
            Self::Mesh(_) => "Mesh",
            Self::Collider(_) => "collider",
            Self::Snap(_) => "snap",
        }
    }

    pub fn is_rigidbody(&self) -> bool {
        matches!(self, Self::Rigidbody(_))
    }

    pub fn to_extras(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => {
                let mut map = Map::new();
                map.insert("node".to_string(), Value::from(self.tag()));
                map
            }
        }
    }

    /// Reads a role back from an extras object; `None` when there is no
    /// recognizable `node` tag.
    pub fn from_extras(extras: &Value) -> Option<Self> {
        extras.get("node")?.as_str()?;
        match serde_json::from_value(extras.clone()) {
            Ok(role) => Some(role),
            Err(err) => {
                log::warn!("Ignoring node extras {}: {}", extras, err);
                None
            }
        }
    }
}
