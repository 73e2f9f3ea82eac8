//! Mod catalog payload types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One mod file in the catalog directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModEntry {
    /// File name, including the `.jar` extension.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time, Unix seconds.
    pub mod_time: i64,
}

/// The full catalog listing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModList {
    /// Entries sorted case-insensitively by name.
    pub mods: Vec<ModEntry>,
}

/// Kind of catalog change recorded in the changelog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModChangeType {
    /// A mod appeared.
    Added,
    /// A mod was removed.
    Deleted,
    /// A mod's size or modification time changed.
    Updated,
}

impl fmt::Display for ModChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Added => "added",
            Self::Deleted => "deleted",
            Self::Updated => "updated",
        })
    }
}

/// One changelog entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModChange {
    /// RFC 3339 timestamp.
    pub time: String,
    /// What happened.
    #[serde(rename = "type")]
    pub kind: ModChangeType,
    /// File name of the affected mod.
    pub name: String,
}

impl ModChange {
    /// Build a change stamped with the current local time.
    pub fn now(kind: ModChangeType, name: impl Into<String>) -> Self {
        Self {
            time: chrono::Local::now().to_rfc3339(),
            kind,
            name: name.into(),
        }
    }
}

/// All recorded changes, oldest first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changelog {
    /// Changelog entries.
    pub changes: Vec<ModChange>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_uses_camel_case() {
        let entry = ModEntry {
            name: "sodium.jar".into(),
            size: 42,
            mod_time: 1_700_000_000,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["modTime"], 1_700_000_000);
        assert_eq!(json["size"], 42);
    }

    #[test]
    fn change_serializes_type_field() {
        let change = ModChange {
            time: "2024-01-01T00:00:00+00:00".into(),
            kind: ModChangeType::Deleted,
            name: "lithium.jar".into(),
        };
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["type"], "deleted");
        assert_eq!(json["name"], "lithium.jar");
    }

    #[test]
    fn change_now_has_rfc3339_time() {
        let change = ModChange::now(ModChangeType::Added, "a.jar");
        assert!(chrono::DateTime::parse_from_rfc3339(&change.time).is_ok());
    }

    #[test]
    fn change_type_display() {
        assert_eq!(ModChangeType::Updated.to_string(), "updated");
    }
}
