//! Reader for `.hyp` app containers.
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! [0..4)                 u32 header size
//! [4..4+size)            UTF-8 JSON header {blueprint, assets}
//! [4+size..)             asset payloads, concatenated in header order
//! ```

use serde_json::Value;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum HypError {
    #[error("malformed container: {0}")]
    Malformed(String),
    #[error("container has no {0} asset")]
    MissingAsset(&'static str),
    #[error("failed to read container: {0}")]
    Io(std::io::Error),
}

impl From<std::io::Error> for HypError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            HypError::Malformed(format!("truncated stream ({})", err))
        } else {
            HypError::Io(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, HypError>;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BlueprintProps {
    pub interact: bool,
    pub click_distance: f32,
    pub collision: bool,
    pub visible: bool,
}

impl Default for BlueprintProps {
    fn default() -> Self {
        Self {
            interact: false,
            click_distance: 10.0,
            collision: true,
            visible: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Blueprint {
    pub id: Option<String>,
    pub version: i64,
    pub name: Option<String>,
    pub author: Option<String>,
    pub created: Option<String>,
    pub modified: Option<String>,
    pub frozen: bool,
    /// Script reference; only its truthiness matters here.
    pub script: Option<Value>,
    pub props: BlueprintProps,
}

impl Blueprint {
    pub fn has_script(&self) -> bool {
        match &self.script {
            None | Some(Value::Null) => false,
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(text)) => !text.is_empty(),
            Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
            Some(Value::Array(items)) => !items.is_empty(),
            Some(Value::Object(map)) => !map.is_empty(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().filter(|name| !name.is_empty()).unwrap_or("script")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Model,
    Script,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AssetEntry {
    #[serde(rename = "type")]
    pub kind: AssetKind,
    pub size: u32,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct HypHeader {
    pub blueprint: Blueprint,
    pub assets: Vec<AssetEntry>,
}

impl HypHeader {
    /// Index of the first asset of `kind` and its offset into the payload
    /// region.
    pub fn locate(&self, kind: AssetKind) -> Option<(usize, u64)> {
        let index = self.assets.iter().position(|asset| asset.kind == kind)?;
        let offset = self.assets[..index]
            .iter()
            .map(|asset| u64::from(asset.size))
            .sum();
        Some((index, offset))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelPayload {
    Glb(Vec<u8>),
    /// Real payload withheld; callers show a placeholder marker.
    Frozen,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptPayload {
    pub name: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HypContents {
    pub header_size: u32,
    pub blueprint: Blueprint,
    pub model: ModelPayload,
    pub script: Option<ScriptPayload>,
}

impl HypContents {
    pub fn is_gated(&self) -> bool {
        self.model == ModelPayload::Frozen
    }
}

pub const FROZEN_SCRIPT_NAME: &str = "frozen.js";

pub fn frozen_notice(name: &str) -> String {
    format!(
        "// This file ({}) is frozen\n\
         // Scripts cannot be viewed or edited on frozen files\n\
         // This is to prevent unauthorized modifications\n\
         //\n\
         // If you need to modify this file, please contact an administrator\n",
        name
    )
}

pub struct HypContainer;

impl HypContainer {
    /// Parses a container. With `override_privilege` unset, frozen
    /// containers only expose their metadata.
    pub fn parse<R: Read + Seek>(reader: &mut R, override_privilege: bool) -> Result<HypContents> {
        let mut size_bytes = [0u8; 4];
        reader.read_exact(&mut size_bytes)?;
        let header_size = u32::from_le_bytes(size_bytes);

        let mut header_bytes = vec![0u8; header_size as usize];
        reader.read_exact(&mut header_bytes)?;
        let header_text = std::str::from_utf8(&header_bytes)
            .map_err(|err| HypError::Malformed(format!("header is not UTF-8: {}", err)))?;
        let header: HypHeader = serde_json::from_str(header_text)
            .map_err(|err| HypError::Malformed(format!("invalid header JSON: {}", err)))?;
        log::debug!(
            "Header size {}, {} asset(s)",
            header_size,
            header.assets.len()
        );

        let (model_index, model_offset) = header
            .locate(AssetKind::Model)
            .ok_or(HypError::MissingAsset("model"))?;
        let payload_start = 4 + u64::from(header_size);
        let gated = header.blueprint.frozen && !override_privilege;

        let model = if gated {
            log::warn!("Frozen container, loading placeholder model");
            ModelPayload::Frozen
        } else {
            if header.blueprint.frozen {
                log::warn!("Frozen container opened with override");
            }
            let size = header.assets[model_index].size;
            ModelPayload::Glb(read_payload(reader, payload_start + model_offset, size)?)
        };

        let script = match header.locate(AssetKind::Script) {
            Some((index, offset)) if header.blueprint.has_script() => {
                let name = header.blueprint.display_name().to_string();
                if gated {
                    Some(ScriptPayload {
                        name: FROZEN_SCRIPT_NAME.to_string(),
                        text: frozen_notice(&name),
                    })
                } else {
                    let bytes = read_payload(
                        reader,
                        payload_start + offset,
                        header.assets[index].size,
                    )?;
                    let text = String::from_utf8(bytes).map_err(|err| {
                        HypError::Malformed(format!("script is not UTF-8: {}", err))
                    })?;
                    Some(ScriptPayload {
                        name: format!("{}.js", name),
                        text,
                    })
                }
            }
            _ => None,
        };

        Ok(HypContents {
            header_size,
            blueprint: header.blueprint,
            model,
            script,
        })
    }
}

fn read_payload<R: Read + Seek>(reader: &mut R, position: u64, size: u32) -> Result<Vec<u8>> {
    reader.seek(SeekFrom::Start(position))?;
    let mut payload = vec![0u8; size as usize];
    reader.read_exact(&mut payload)?;
    Ok(payload)
}

pub fn read_hyp_file(path: &Path, override_privilege: bool) -> Result<HypContents> {
    let mut file = std::io::BufReader::new(std::fs::File::open(path).map_err(HypError::Io)?);
    let contents = HypContainer::parse(&mut file, override_privilege)?;
    log::info!("Read .hyp container {}", path.display());
    Ok(contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn container(header: &str, payloads: &[&[u8]]) -> Vec<u8> {
        let mut bytes = (header.len() as u32).to_le_bytes().to_vec();
        bytes.extend_from_slice(header.as_bytes());
        for payload in payloads {
            bytes.extend_from_slice(payload);
        }
        bytes
    }

    #[test]
    fn test_model_only_container() {
        let header = r#"{"blueprint":{},"assets":[{"type":"model","size":1024}]}"#;
        assert_eq!(header.len(), 57);
        let model: Vec<u8> = (0..1024).map(|i| (i % 251) as u8).collect();
        let bytes = container(header, &[&model]);

        let contents = HypContainer::parse(&mut Cursor::new(bytes), false).unwrap();
        assert_eq!(contents.header_size, 57);
        assert_eq!(contents.model, ModelPayload::Glb(model));
        assert!(contents.script.is_none());
        assert!(!contents.blueprint.frozen);
    }

    #[test]
    fn test_payloads_recovered_at_summed_offsets() {
        let header = r#"{"blueprint":{"name":"Door","script":"asset://door.js"},
            "assets":[{"type":"texture","size":3},{"type":"script","size":11},
                {"type":"model","size":4}]}"#;
        let script = b"app.on(1);\n";
        let bytes = container(header, &[b"xyz", script, b"glTF"]);

        let contents = HypContainer::parse(&mut Cursor::new(bytes), false).unwrap();
        assert_eq!(contents.model, ModelPayload::Glb(b"glTF".to_vec()));
        let script_payload = contents.script.unwrap();
        assert_eq!(script_payload.name, "Door.js");
        assert_eq!(script_payload.text.as_bytes(), script);
    }

    #[test]
    fn test_first_asset_of_each_type_wins() {
        let header = r#"{"blueprint":{},
            "assets":[{"type":"model","size":2},{"type":"model","size":2}]}"#;
        let bytes = container(header, &[b"AA", b"BB"]);
        let contents = HypContainer::parse(&mut Cursor::new(bytes), false).unwrap();
        assert_eq!(contents.model, ModelPayload::Glb(b"AA".to_vec()));
    }

    #[test]
    fn test_falsy_script_reference_hides_script() {
        let header = r#"{"blueprint":{"script":""},
            "assets":[{"type":"model","size":1},{"type":"script","size":1}]}"#;
        let bytes = container(header, &[b"m", b"s"]);
        let contents = HypContainer::parse(&mut Cursor::new(bytes), false).unwrap();
        assert!(contents.script.is_none());
    }

    #[test]
    fn test_frozen_gates_payloads_but_keeps_metadata() {
        let header = r#"{"blueprint":{"id":"abc","version":7,"name":"Vault","author":"kim",
            "created":"2024-01-01","modified":"2024-02-01","frozen":true,"script":"x",
            "props":{"interact":true,"clickDistance":4.5,"collision":false,"visible":true}},
            "assets":[{"type":"model","size":4},{"type":"script","size":6}]}"#;
        let bytes = container(header, &[b"glTF", b"secret"]);

        let gated = HypContainer::parse(&mut Cursor::new(bytes.clone()), false).unwrap();
        assert!(gated.is_gated());
        let script = gated.script.clone().unwrap();
        assert_eq!(script.name, FROZEN_SCRIPT_NAME);
        assert!(script.text.contains("(Vault) is frozen"));
        assert!(!script.text.contains("secret"));

        let blueprint = &gated.blueprint;
        assert_eq!(blueprint.id.as_deref(), Some("abc"));
        assert_eq!(blueprint.version, 7);
        assert_eq!(blueprint.author.as_deref(), Some("kim"));
        assert_eq!(blueprint.created.as_deref(), Some("2024-01-01"));
        assert_eq!(blueprint.modified.as_deref(), Some("2024-02-01"));
        assert_eq!(
            blueprint.props,
            BlueprintProps {
                interact: true,
                click_distance: 4.5,
                collision: false,
                visible: true,
            }
        );

        let opened = HypContainer::parse(&mut Cursor::new(bytes), true).unwrap();
        assert_eq!(opened.model, ModelPayload::Glb(b"glTF".to_vec()));
        assert_eq!(opened.script.unwrap().text, "secret");
        assert_eq!(opened.blueprint, gated.blueprint);
    }

    #[test]
    fn test_truncated_streams_are_malformed() {
        let short_prefix = vec![0x10, 0x00];
        assert!(matches!(
            HypContainer::parse(&mut Cursor::new(short_prefix), false),
            Err(HypError::Malformed(_))
        ));

        let header = r#"{"blueprint":{},"assets":[{"type":"model","size":100}]}"#;
        let mut short_header = container(header, &[]);
        short_header.truncate(20);
        assert!(matches!(
            HypContainer::parse(&mut Cursor::new(short_header), false),
            Err(HypError::Malformed(_))
        ));

        let short_payload = container(header, &[&[0u8; 40]]);
        assert!(matches!(
            HypContainer::parse(&mut Cursor::new(short_payload), false),
            Err(HypError::Malformed(_))
        ));
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let bytes = container("{not json", &[]);
        assert!(matches!(
            HypContainer::parse(&mut Cursor::new(bytes), false),
            Err(HypError::Malformed(_))
        ));
    }

    #[test]
    fn test_missing_model_asset() {
        let header = r#"{"blueprint":{},"assets":[{"type":"script","size":0}]}"#;
        let bytes = container(header, &[]);
        assert!(matches!(
            HypContainer::parse(&mut Cursor::new(bytes), false),
            Err(HypError::MissingAsset("model"))
        ));
    }

    #[test]
    fn test_read_hyp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crate.hyp");
        let header = r#"{"blueprint":{"name":"Crate"},"assets":[{"type":"model","size":3}]}"#;
        std::fs::write(&path, container(header, &[b"abc"])).unwrap();
        let contents = read_hyp_file(&path, false).unwrap();
        assert_eq!(contents.blueprint.name.as_deref(), Some("Crate"));

        let missing = read_hyp_file(&dir.path().join("nope.hyp"), false);
        assert!(matches!(missing, Err(HypError::Io(_))));
    }
}
