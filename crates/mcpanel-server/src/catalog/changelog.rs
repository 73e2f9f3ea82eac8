//! Append-only daily changelog of catalog changes.

use std::io;
use std::path::{Path, PathBuf};

use mcpanel_core::{Changelog, ModChange};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::CatalogError;

/// Writes one JSON line per change to `<dir>/YYYY-MM-DD.log`.
#[derive(Debug, Clone)]
pub struct ModChangelog {
    dir: PathBuf,
}

impl ModChangelog {
    /// Changelog stored under `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Changelog directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append `change` to today's file.
    pub async fn record(&self, change: &ModChange) -> Result<(), CatalogError> {
        fs::create_dir_all(&self.dir).await?;
        let file_name = format!("{}.log", chrono::Local::now().format("%Y-%m-%d"));
        let mut line = serde_json::to_vec(change)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(file_name))
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        debug!(kind = %change.kind, name = %change.name, "recorded catalog change");
        Ok(())
    }

    /// Every recorded change, oldest day first. Unparseable lines are skipped.
    pub async fn read_all(&self) -> Result<Changelog, CatalogError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Changelog::default()),
            Err(e) => return Err(e.into()),
        };

        let mut days = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "log") {
                days.push(path);
            }
        }
        days.sort();

        let mut changes = Vec::new();
        for day in days {
            let text = fs::read_to_string(&day).await?;
            for line in text.lines().filter(|l| !l.trim().is_empty()) {
                match serde_json::from_str::<ModChange>(line) {
                    Ok(change) => changes.push(change),
                    Err(e) => debug!(file = %day.display(), error = %e, "skipping changelog line"),
                }
            }
        }
        Ok(Changelog { changes })
    }
}

#[cfg(test)]
mod tests {
    use mcpanel_core::ModChangeType;
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn missing_directory_reads_empty() {
        let dir = TempDir::new().unwrap();
        let log = ModChangelog::new(dir.path().join("nope"));
        assert!(log.read_all().await.unwrap().changes.is_empty());
    }

    #[tokio::test]
    async fn records_are_read_back_in_order() {
        let dir = TempDir::new().unwrap();
        let log = ModChangelog::new(dir.path().join("changelog"));
        let first = ModChange::now(ModChangeType::Added, "a.jar");
        let second = ModChange::now(ModChangeType::Deleted, "b.jar");
        log.record(&first).await.unwrap();
        log.record(&second).await.unwrap();

        assert_eq!(log.read_all().await.unwrap().changes, vec![first, second]);
    }

    #[tokio::test]
    async fn older_days_come_first_and_garbage_is_skipped() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("2024-01-02.log"),
            "{\"time\":\"t2\",\"type\":\"updated\",\"name\":\"b.jar\"}\nnot json\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("2024-01-01.log"),
            "{\"time\":\"t1\",\"type\":\"added\",\"name\":\"a.jar\"}\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let changes = ModChangelog::new(dir.path()).read_all().await.unwrap().changes;
        let names: Vec<_> = changes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a.jar", "b.jar"]);
        assert_eq!(changes[1].kind, ModChangeType::Updated);
    }
}
