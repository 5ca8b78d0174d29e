//! Persisted feature flags (`settings.json`).
//!
//! Keys are normalized (trimmed, spaces to `_`, lowercased). Writes are
//! debounced: changes mark the store dirty and [`FlagStore::flush_if_due`],
//! called from the dispatcher tick, saves once the delay has passed.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use hark_core::{flag_keys, FlagSource};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

pub const SETTINGS_FILE_NAME: &str = "settings.json";

pub const SAVE_DEBOUNCE: Duration = Duration::from_millis(500);

const BUILTIN_DEFAULTS: [(&str, bool); 2] = [
    (flag_keys::NOTIFICATIONS, true),
    (flag_keys::QUICK_COMMANDS, true),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default = "schema_version")]
    schema_version: u32,
    #[serde(default)]
    flags: BTreeMap<String, bool>,
}

fn schema_version() -> u32 {
    1
}

impl Default for SettingsFile {
    fn default() -> Self {
        Self {
            schema_version: schema_version(),
            flags: BTreeMap::new(),
        }
    }
}

impl SettingsFile {
    fn normalize(&mut self) {
        let flags = std::mem::take(&mut self.flags);
        self.flags = flags
            .into_iter()
            .filter(|(k, _)| !k.trim().is_empty())
            .map(|(k, v)| (normalize_key(&k), v))
            .collect();
    }

    fn merge_defaults(&mut self) {
        for (key, value) in BUILTIN_DEFAULTS {
            self.flags.entry(key.to_string()).or_insert(value);
        }
    }
}

/// Trim, replace spaces with `_`, lowercase.
pub fn normalize_key(key: &str) -> String {
    key.trim().replace(' ', "_").to_lowercase()
}

fn builtin_default(key: &str) -> Option<bool> {
    BUILTIN_DEFAULTS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| *v)
}

struct FlagState {
    file: SettingsFile,
    save_at: Option<Instant>,
}

pub struct FlagStore {
    path: PathBuf,
    state: Mutex<FlagState>,
}

impl FlagStore {
    /// Load `settings.json` from `dir`, creating it with defaults if missing.
    /// An unreadable file is logged and replaced with defaults.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create settings directory: {}", dir.display()))?;
        let path = dir.join(SETTINGS_FILE_NAME);

        let (file, existed) = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<SettingsFile>(&raw) {
                Ok(file) => (file, true),
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Settings load failed, using defaults");
                    (SettingsFile::default(), false)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (SettingsFile::default(), false),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read settings: {}", path.display()))
            }
        };

        let store = Self::with_file(path, file);
        if !existed {
            store.save_now()?;
        }
        Ok(store)
    }

    /// A store that never touched disk yet; nothing is written until a save.
    pub fn in_memory(path: PathBuf) -> Self {
        Self::with_file(path, SettingsFile::default())
    }

    fn with_file(path: PathBuf, mut file: SettingsFile) -> Self {
        file.normalize();
        file.merge_defaults();
        Self {
            path,
            state: Mutex::new(FlagState { file, save_at: None }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flag value, falling back to the built-in default and then `default`.
    pub fn is_enabled_or(&self, key: &str, default: bool) -> bool {
        if key.trim().is_empty() {
            return default;
        }
        let key = normalize_key(key);
        let fallback = builtin_default(&key).unwrap_or(default);
        self.state.lock().file.flags.get(&key).copied().unwrap_or(fallback)
    }

    pub fn set_enabled(&self, key: &str, enabled: bool, save_immediately: bool) {
        if key.trim().is_empty() {
            return;
        }
        let key = normalize_key(key);
        {
            let mut state = self.state.lock();
            state.file.flags.insert(key.clone(), enabled);
            state.save_at = Some(Instant::now() + SAVE_DEBOUNCE);
        }
        debug!(flag = %key, enabled, "Flag updated");

        if save_immediately {
            if let Err(e) = self.save_now() {
                error!(error = %e, "Settings save failed");
            }
        }
    }

    /// Flip a flag and return its new value.
    pub fn toggle(&self, key: &str, save_immediately: bool) -> bool {
        let next = !self.is_enabled_or(key, false);
        self.set_enabled(key, next, save_immediately);
        next
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().save_at.is_some()
    }

    /// Write atomically (temp file + rename). On failure the store stays dirty.
    pub fn save_now(&self) -> Result<()> {
        let json = {
            let mut state = self.state.lock();
            state.file.normalize();
            serde_json::to_string_pretty(&state.file).context("Failed to serialize settings")?
        };

        let result = write_atomic(&self.path, &json);
        let mut state = self.state.lock();
        match result {
            Ok(()) => {
                state.save_at = None;
                Ok(())
            }
            Err(e) => {
                state.save_at = Some(Instant::now() + SAVE_DEBOUNCE);
                Err(e)
            }
        }
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create settings directory: {}", parent.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to rename settings to {}", path.display()))?;
    Ok(())
}

impl FlagSource for FlagStore {
    fn is_enabled(&self, key: &str) -> bool {
        self.is_enabled_or(key, false)
    }

    fn flush_if_due(&self, now: Instant) {
        let due = matches!(self.state.lock().save_at, Some(at) if now >= at);
        if due {
            if let Err(e) = self.save_now() {
                warn!(error = %e, "Deferred settings save failed, will retry");
            }
        }
    }

    fn flush(&self) {
        if self.is_dirty() {
            if let Err(e) = self.save_now() {
                error!(error = %e, "Settings save failed");
            }
        }
    }
}
