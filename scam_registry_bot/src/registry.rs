use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use crate::types::{AddedAlias, MergeResult, ScammerEntity};

/// Where the registry file lives, relative to the working directory.
const REGISTRY_PATH: &str = "scammer_registry.json";

static WAS_CONSTRUCTED: AtomicBool = AtomicBool::new(false);

/// Every scammer entity on record, backed by a JSON file.
///
/// All methods take `&self` and lock internally, and none of them
/// await, so they're fine to call from any handler.
pub struct Registry {
    entities: Mutex<Vec<ScammerEntity>>,
    path: PathBuf,
}

impl Registry {
    /// Load the registry from [`REGISTRY_PATH`], or start an empty one
    /// if the file is missing or unreadable.
    pub fn new() -> Arc<Registry> {
        assert!(
            !WAS_CONSTRUCTED.swap(true, Ordering::SeqCst),
            "Second registry was constructed. This is not allowed."
        );

        Arc::new(Registry::open(REGISTRY_PATH))
    }

    /// Open a registry at an arbitrary path, skipping the singleton
    /// guard, so tests can use scratch files.
    #[cfg(test)]
    pub(crate) fn open_for_tests(path: impl Into<PathBuf>) -> Registry {
        Registry::open(path)
    }

    fn open(path: impl Into<PathBuf>) -> Registry {
        let path = path.into();
        let entities = load_or_empty(&path);
        log::info!("Loaded {} scammer entities.", entities.len());

        Registry {
            entities: Mutex::new(entities),
            path,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ScammerEntity>> {
        self.entities.lock().expect("Registry lock is poisoned!")
    }

    /// Merge one reported scammer into the registry.
    ///
    /// The entity is found by case-insensitive name. If there is none,
    /// it's created; if there is one, the aliases it doesn't have yet
    /// are added to it. Empty alias strings are skipped rather than
    /// stored. Saves to disk whenever anything actually changed.
    pub fn upsert(&self, name: &str, cam4: &str, telegram: &str) -> MergeResult {
        let mut entities = self.lock();

        let name_key = name.to_lowercase();
        let Some(entity) = entities.iter_mut().find(|x| x.name_key() == name_key) else {
            let entity = ScammerEntity {
                name: name.to_string(),
                cam4_aliases: (!cam4.is_empty())
                    .then(|| cam4.to_string())
                    .into_iter()
                    .collect(),
                telegram_aliases: (!telegram.is_empty())
                    .then(|| telegram.to_string())
                    .into_iter()
                    .collect(),
            };
            entities.push(entity);
            self.save(&entities);

            return MergeResult::Created {
                name: name.to_string(),
                cam4: (!cam4.is_empty()).then(|| cam4.to_string()),
                telegram: (!telegram.is_empty()).then(|| telegram.to_string()),
            };
        };

        let mut added = Vec::new();
        if !cam4.is_empty() && !entity.cam4_aliases.iter().any(|x| x == cam4) {
            entity.cam4_aliases.push(cam4.to_string());
            added.push(AddedAlias::Cam4(cam4.to_string()));
        }
        if !telegram.is_empty() && !entity.telegram_aliases.iter().any(|x| x == telegram) {
            entity.telegram_aliases.push(telegram.to_string());
            added.push(AddedAlias::Telegram(telegram.to_string()));
        }

        // Keep the casing the entity was first registered under.
        let name = entity.name.clone();

        if !added.is_empty() {
            self.save(&entities);
        }

        MergeResult::Merged { name, added }
    }

    /// A copy of everything on record, for searching and listing.
    /// Later merges won't show up in it.
    pub fn snapshot(&self) -> Vec<ScammerEntity> {
        self.lock().clone()
    }

    /// Overwrite the registry file. Failures are logged and swallowed;
    /// the in-memory registry stays authoritative either way.
    fn save(&self, entities: &[ScammerEntity]) {
        if let Err(e) = save_to_file(&self.path, entities) {
            log::error!(
                "Failed saving the registry to {}: {}",
                self.path.display(),
                e
            );
        }
    }
}

fn load_or_empty(path: &Path) -> Vec<ScammerEntity> {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            log::warn!(
                "Failed reading {}: {}. Starting with an empty registry.",
                path.display(),
                e
            );
            return Vec::new();
        }
    };

    match serde_json::from_str(&data) {
        Ok(entities) => entities,
        Err(e) => {
            log::warn!(
                "Failed decoding {}: {}. Starting with an empty registry.",
                path.display(),
                e
            );
            Vec::new()
        }
    }
}

/// Write to a temporary file in the same directory, then move it over
/// the real one, so a crash mid-write never leaves a half-written
/// registry behind.
fn save_to_file(path: &Path, entities: &[ScammerEntity]) -> std::io::Result<()> {
    use std::io::Write;

    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(directory)?;
    let json = serde_json::to_string_pretty(entities)?;
    file.write_all(json.as_bytes())?;
    file.persist(path).map_err(|e| e.error)?;

    Ok(())
}
