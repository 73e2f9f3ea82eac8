//! Log tailing and mod catalog settings.

use serde::{Deserialize, Serialize};

/// Log tailer settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogSettings {
    /// File to tail.
    pub path: String,
    /// How often the file is checked for growth or rotation.
    pub poll_interval_ms: u64,
    /// How often new lines are broadcast.
    pub flush_interval_ms: u64,
    /// Lines kept in memory.
    pub buffer_lines: usize,
    /// Lines sent to a client on connect.
    pub snapshot_lines: usize,
    /// Capacity of the queue between the poller and the buffer.
    pub queue_capacity: usize,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            path: "logs/latest.log".to_string(),
            poll_interval_ms: 1_000,
            flush_interval_ms: 1_000,
            buffer_lines: 500,
            snapshot_lines: 350,
            queue_capacity: 1_000,
        }
    }
}

/// Mod catalog settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogSettings {
    /// Directory holding `.jar` mods.
    pub mods_dir: String,
    /// Directory of daily changelog files.
    pub changelog_dir: String,
    /// Period of the out-of-band change scan.
    pub scan_interval_secs: u64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            mods_dir: "mods".to_string(),
            changelog_dir: "logs/modlist-changelog".to_string(),
            scan_interval_secs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_defaults() {
        let s = LogSettings::default();
        assert_eq!(s.path, "logs/latest.log");
        assert_eq!(s.buffer_lines, 500);
        assert_eq!(s.snapshot_lines, 350);
        assert_eq!(s.queue_capacity, 1_000);
    }

    #[test]
    fn catalog_defaults() {
        let s = CatalogSettings::default();
        assert_eq!(s.mods_dir, "mods");
        assert_eq!(s.changelog_dir, "logs/modlist-changelog");
    }

    #[test]
    fn log_settings_serialize_camel_case() {
        let json = serde_json::to_value(LogSettings::default()).unwrap();
        assert_eq!(json["bufferLines"], 500);
        assert_eq!(json["pollIntervalMs"], 1_000);
    }
}
