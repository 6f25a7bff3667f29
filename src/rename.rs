//! Batch renaming of the selected objects.

use crate::scene::{ObjectId, SceneState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AffixOperation {
    #[default]
    Add,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseConversion {
    #[default]
    Upper,
    Lower,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberPosition {
    Prefix,
    #[default]
    Suffix,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Numbering {
    pub position: NumberPosition,
    pub start: u32,
    pub step: u32,
    pub padding: usize,
    pub separator: String,
}

impl Default for Numbering {
    fn default() -> Self {
        Self {
            position: NumberPosition::Suffix,
            start: 1,
            step: 1,
            padding: 2,
            separator: "_".to_string(),
        }
    }
}

/// Every step is optional; enabled steps run in field order.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RenameOptions {
    pub find_replace: Option<(String, String)>,
    pub prefix: Option<(AffixOperation, String)>,
    pub suffix: Option<(AffixOperation, String)>,
    pub case: Option<CaseConversion>,
    pub numbering: Option<Numbering>,
}

#[derive(Debug, thiserror::Error)]
pub enum RenameError {
    #[error("no objects selected")]
    NothingSelected,
}

fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_word = false;
    for c in value.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

/// New name for the object at `position` in the selection.
pub fn apply_rename(name: &str, position: usize, options: &RenameOptions) -> String {
    let mut name = name.to_string();

    if let Some((find, replace)) = &options.find_replace {
        if !find.is_empty() {
            name = name.replace(find.as_str(), replace);
        }
    }

    if let Some((operation, prefix)) = &options.prefix {
        match operation {
            AffixOperation::Add => name.insert_str(0, prefix),
            AffixOperation::Remove => {
                if let Some(rest) = name.strip_prefix(prefix.as_str()) {
                    name = rest.to_string();
                }
            }
        }
    }

    if let Some((operation, suffix)) = &options.suffix {
        match operation {
            AffixOperation::Add => name.push_str(suffix),
            AffixOperation::Remove => {
                if let Some(rest) = name.strip_suffix(suffix.as_str()) {
                    name = rest.to_string();
                }
            }
        }
    }

    match options.case {
        Some(CaseConversion::Upper) => name = name.to_uppercase(),
        Some(CaseConversion::Lower) => name = name.to_lowercase(),
        Some(CaseConversion::Title) => name = title_case(&name),
        None => {}
    }

    if let Some(numbering) = &options.numbering {
        let base = name
            .trim_end_matches(|c: char| c.is_ascii_digit())
            .trim_end_matches(['.', '_', '-', ' ']);
        let number = u64::from(numbering.start) + u64::from(numbering.step) * position as u64;
        let number = format!("{:0width$}", number, width = numbering.padding);
        name = match numbering.position {
            NumberPosition::Prefix => format!("{}{}{}", number, numbering.separator, base),
            NumberPosition::Suffix => format!("{}{}{}", base, numbering.separator, number),
        };
    }

    name
}

/// Renames every selected object. Returns the renamed ids.
pub fn batch_rename(
    scene: &mut SceneState,
    options: &RenameOptions,
) -> Result<Vec<ObjectId>, RenameError> {
    let selection = scene.selection().to_vec();
    if selection.is_empty() {
        return Err(RenameError::NothingSelected);
    }
    for (position, id) in selection.iter().enumerate() {
        if let Some(object) = scene.get_mut(*id) {
            let renamed = apply_rename(&object.name, position, options);
            log::debug!("Renamed '{}' to '{}'", object.name, renamed);
            object.name = renamed;
        }
    }
    log::info!("Renamed {} object(s)", selection.len());
    Ok(selection)
}

/// Non-word characters become `_`, runs of `_` collapse and the ends are
/// trimmed.
pub fn clean_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
            c
        } else {
            '_'
        };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('_').to_string()
}

pub fn clean_names(scene: &mut SceneState) -> Result<Vec<ObjectId>, RenameError> {
    let selection = scene.selection().to_vec();
    if selection.is_empty() {
        return Err(RenameError::NothingSelected);
    }
    for id in &selection {
        if let Some(object) = scene.get_mut(*id) {
            object.name = clean_name(&object.name);
        }
    }
    Ok(selection)
}
