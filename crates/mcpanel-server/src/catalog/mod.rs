//! File-backed mod catalog.
//!
//! Listings and the changelog are cached so connection snapshots can be
//! built without touching the file system.

mod changelog;

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use mcpanel_core::{Changelog, ModChange, ModChangeType, ModEntry, ModList, ServerEvent};
use parking_lot::RwLock;
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use changelog::ModChangelog;

use crate::websocket::Hub;

/// Catalog failures.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// File system error.
    #[error("catalog io error: {0}")]
    Io(#[from] io::Error),
    /// The name could escape the mods directory.
    #[error("invalid mod name: {0}")]
    InvalidName(String),
    /// No such mod.
    #[error("mod not found: {0}")]
    NotFound(String),
    /// A changelog entry could not be encoded.
    #[error("changelog encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Catalog locations and scan cadence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    /// Directory holding the `.jar` files.
    pub mods_dir: PathBuf,
    /// Directory holding the daily changelog files.
    pub changelog_dir: PathBuf,
    /// How often the directory is rescanned for out-of-band changes.
    pub scan_interval: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            mods_dir: PathBuf::from("mods"),
            changelog_dir: PathBuf::from("logs/modlist-changelog"),
            scan_interval: Duration::from_secs(10),
        }
    }
}

/// The mods directory plus its cached listing and changelog.
pub struct Catalog {
    dir: PathBuf,
    listing: RwLock<ModList>,
    changes: RwLock<Changelog>,
    changelog: ModChangelog,
    /// Listing the scanner last diffed against. Also serializes scans and
    /// deletes so each change is recorded once.
    baseline: Mutex<Option<ModList>>,
}

impl Catalog {
    /// Catalog over `config.mods_dir`. Caches start empty until [`refresh`].
    ///
    /// [`refresh`]: Catalog::refresh
    pub fn new(config: &CatalogConfig) -> Self {
        Self {
            dir: config.mods_dir.clone(),
            listing: RwLock::new(ModList::default()),
            changes: RwLock::new(Changelog::default()),
            changelog: ModChangelog::new(&config.changelog_dir),
            baseline: Mutex::new(None),
        }
    }

    /// Mods directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read the directory. A missing directory is an empty catalog.
    pub async fn list(&self) -> Result<ModList, CatalogError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ModList::default()),
            Err(e) => return Err(e.into()),
        };

        let mut mods = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_jar(&name) {
                continue;
            }
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let mod_time = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .and_then(|d| i64::try_from(d.as_secs()).ok())
                .unwrap_or_default();
            mods.push(ModEntry {
                name,
                size: meta.len(),
                mod_time,
            });
        }
        mods.sort_by_cached_key(|m| m.name.to_lowercase());
        Ok(ModList { mods })
    }

    /// Re-read the directory and changelog into the caches.
    ///
    /// The first successful refresh also becomes the scanner's baseline.
    pub async fn refresh(&self) -> Result<ModList, CatalogError> {
        let listing = self.list().await?;
        *self.listing.write() = listing.clone();
        {
            let mut baseline = self.baseline.lock().await;
            if baseline.is_none() {
                *baseline = Some(listing.clone());
            }
        }
        let _ = self.reload_changelog().await?;
        Ok(listing)
    }

    /// Last cached listing.
    pub fn cached(&self) -> ModList {
        self.listing.read().clone()
    }

    /// Last cached changelog.
    pub fn cached_changelog(&self) -> Changelog {
        self.changes.read().clone()
    }

    /// Read the changelog from disk and cache it.
    pub async fn reload_changelog(&self) -> Result<Changelog, CatalogError> {
        let changes = self.changelog.read_all().await?;
        *self.changes.write() = changes.clone();
        Ok(changes)
    }

    /// Delete the mod named `name` and record the change.
    pub async fn delete(&self, name: &str) -> Result<ModChange, CatalogError> {
        if name.is_empty() || name.contains("..") || name.contains('/') || name.contains('\\') {
            return Err(CatalogError::InvalidName(name.to_string()));
        }
        let mut baseline = self.baseline.lock().await;

        match fs::remove_file(self.dir.join(name)).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CatalogError::NotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
        info!(name, "mod deleted");

        if let Some(known) = baseline.as_mut() {
            known.mods.retain(|m| m.name != name);
        }
        drop(baseline);

        let change = ModChange::now(ModChangeType::Deleted, name);
        self.changelog.record(&change).await?;
        let _ = self.refresh().await?;
        Ok(change)
    }

    /// Diff the directory against the last scan.
    ///
    /// Returns one event per change followed by `modlist_update` and
    /// `modlist_changelog`, or nothing if the directory is unchanged. The
    /// first scan only records a baseline.
    pub async fn rescan(&self) -> Result<Vec<ServerEvent>, CatalogError> {
        let mut baseline = self.baseline.lock().await;
        let current = self.list().await?;
        let Some(previous) = baseline.replace(current.clone()) else {
            *self.listing.write() = current;
            return Ok(Vec::new());
        };

        let changes = diff(&previous, &current);
        if changes.is_empty() {
            return Ok(Vec::new());
        }

        let mut events = Vec::with_capacity(changes.len() + 2);
        for change in changes {
            self.changelog.record(&change).await?;
            info!(kind = %change.kind, name = %change.name, "catalog changed on disk");
            events.push(match change.kind {
                ModChangeType::Added => ServerEvent::ModAdded(change),
                ModChangeType::Deleted => ServerEvent::ModDeleted(change),
                ModChangeType::Updated => ServerEvent::ModUpdated(change),
            });
        }
        *self.listing.write() = current.clone();
        events.push(ServerEvent::ModlistUpdate(current));
        events.push(ServerEvent::ModlistChangelog(self.reload_changelog().await?));
        Ok(events)
    }
}

fn is_jar(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jar"))
}

/// Changes from `previous` to `current`, in listing order.
fn diff(previous: &ModList, current: &ModList) -> Vec<ModChange> {
    let before: HashMap<&str, &ModEntry> =
        previous.mods.iter().map(|m| (m.name.as_str(), m)).collect();
    let after: HashMap<&str, &ModEntry> =
        current.mods.iter().map(|m| (m.name.as_str(), m)).collect();

    let mut changes = Vec::new();
    for entry in &current.mods {
        match before.get(entry.name.as_str()) {
            None => changes.push(ModChange::now(ModChangeType::Added, &entry.name)),
            Some(old) if old.size != entry.size || old.mod_time != entry.mod_time => {
                changes.push(ModChange::now(ModChangeType::Updated, &entry.name));
            }
            Some(_) => {}
        }
    }
    for entry in &previous.mods {
        if !after.contains_key(entry.name.as_str()) {
            changes.push(ModChange::now(ModChangeType::Deleted, &entry.name));
        }
    }
    changes
}

/// Rescan the catalog every `period` and broadcast what changed.
pub async fn run_scanner(
    catalog: Arc<Catalog>,
    hub: Arc<Hub>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = time::interval_at(time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        match catalog.rescan().await {
            Ok(events) => {
                for event in events {
                    let _ = hub.broadcast(event).await;
                }
            }
            Err(e) => warn!(error = %e, dir = %catalog.dir().display(), "catalog scan failed"),
        }
    }
    info!("catalog scanner stopped");
}
