//! Object-name conventions for LOD and collision variants.
//!
//! `RockLOD0`, `Rock_LOD2` and `RockCOL` all belong to the asset `Rock`:
//! the `LOD` marker and everything after it is dropped, and `COL` marks a
//! custom collision mesh.

const SEPARATORS: &[char] = &['_', '-', '.'];

fn trim_separators(value: &str) -> &str {
    value.trim_matches(|c: char| c.is_whitespace() || SEPARATORS.contains(&c))
}

/// Grouping key of an object name: lower-cased, cut at the first `lod`, or
/// with every `col` removed when there is no `lod`, then trimmed.
pub fn base_name(name: &str) -> String {
    let lower = name.to_lowercase();
    let stripped = match lower.find("lod") {
        Some(at) => lower[..at].to_string(),
        None if lower.contains("col") => lower.replace("col", ""),
        None => lower,
    };
    trim_separators(&stripped).to_string()
}

/// Case-preserving asset name used for a new rigidbody root: cut at the
/// first `LOD` and with every `COL` removed. Only the upper-case markers
/// count, so `Column` stays intact.
pub fn stem(name: &str) -> String {
    let truncated = match name.find("LOD") {
        Some(at) => &name[..at],
        None => name,
    };
    trim_separators(&truncated.replace("COL", "")).to_string()
}

/// Number written directly after the first `LOD` marker.
pub fn lod_index(name: &str) -> Option<u32> {
    let lower = name.to_ascii_lowercase();
    let at = lower.find("lod")?;
    let digits: String = lower[at + 3..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

pub fn is_collision_name(name: &str) -> bool {
    name.trim_end().to_ascii_lowercase().ends_with("col")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameToken {
    pub base_name: String,
    pub lod_index: Option<u32>,
    pub is_collision: bool,
}

impl NameToken {
    pub fn parse(name: &str) -> Self {
        Self {
            base_name: base_name(name),
            lod_index: lod_index(name),
            is_collision: is_collision_name(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_name_strips_lod_suffix() {
        assert_eq!(base_name("RockLOD1"), "rock");
        assert_eq!(base_name("Rock_LOD12"), "rock");
        assert_eq!(base_name("rocklod"), "rock");
        assert_eq!(base_name("Rock"), "rock");
    }

    #[test]
    fn test_base_name_strips_collision_suffix() {
        assert_eq!(base_name("RockCOL"), "rock");
        assert_eq!(base_name("Rock_col"), "rock");
        assert_eq!(base_name("  Rock COL "), "rock");
    }

    #[test]
    fn test_base_name_is_case_insensitive() {
        for name in ["TreeLOD0", "treelod2", "TREEcol", "tree", "Tree_Lod3"] {
            assert_eq!(base_name(name), "tree", "{}", name);
        }
    }

    #[test]
    fn test_lod_marker_wins_over_collision_marker() {
        // Only the part before LOD is kept, so the col inside survives.
        assert_eq!(base_name("ColumnLOD0"), "column");
    }

    #[test]
    fn test_stem_preserves_case() {
        assert_eq!(stem("RockLOD0"), "Rock");
        assert_eq!(stem("BigRock_LOD3"), "BigRock");
        assert_eq!(stem("BigRockCOL"), "BigRock");
        assert_eq!(stem("Crate"), "Crate");
    }

    #[test]
    fn test_stem_ignores_lower_case_markers() {
        assert_eq!(stem("Column"), "Column");
        assert_eq!(stem("Protocol_Box"), "Protocol_Box");
        assert_eq!(stem("Colorful_lod1"), "Colorful_lod1");
        assert_eq!(stem("ColumnLOD0"), "Column");
    }

    #[test]
    fn test_lod_index() {
        assert_eq!(lod_index("RockLOD0"), Some(0));
        assert_eq!(lod_index("Rock_lod12.001"), Some(12));
        assert_eq!(lod_index("RockLOD"), None);
        assert_eq!(lod_index("Rock"), None);
    }

    #[test]
    fn test_collision_detection() {
        assert!(is_collision_name("RockCOL"));
        assert!(is_collision_name("rock_col"));
        assert!(!is_collision_name("Collider"));
        assert!(!is_collision_name("RockLOD1"));
    }

    #[test]
    fn test_name_token() {
        let token = NameToken::parse("Rock_LOD2");
        assert_eq!(
            token,
            NameToken {
                base_name: "rock".to_string(),
                lod_index: Some(2),
                is_collision: false,
            }
        );
    }
}
