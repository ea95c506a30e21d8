//! File-backed state and journal.

use edgeplan::backend::StateStore;
use edgeplan::domain::{JournalEntry, WizardState};
use edgeplan::{Error, Result};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// State as pretty JSON, journal as one compact JSON object per line.
///
/// One lock serializes every read and write made through this store.
#[derive(Debug, Default)]
pub struct JsonStateStore {
    gate: Mutex<()>,
}

impl JsonStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // Writes go through a temp file, so a poisoned lock guards nothing torn.
        self.gate
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Read all journal entries, oldest first. A missing journal is empty.
    pub fn read_journal(&self, path: &Path) -> Result<Vec<JournalEntry>> {
        let _guard = self.lock();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(path).map_err(|e| Error::io(path, e))?;
        let mut entries = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| Error::io(path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => log::warn!("Skipping journal line {} in {}: {e}", index + 1, path.display()),
            }
        }
        Ok(entries)
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

impl StateStore for JsonStateStore {
    fn load(&self, path: &Path) -> Result<WizardState> {
        let _guard = self.lock();
        if !path.exists() {
            log::debug!("No state file at {}, starting empty", path.display());
            return Ok(WizardState::default());
        }

        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        if content.trim().is_empty() {
            return Ok(WizardState::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, path: &Path, state: &WizardState) -> Result<()> {
        ensure_parent(path)?;
        let content = serde_json::to_string_pretty(state)?;
        let tmp = temp_path(path);

        let _guard = self.lock();
        fs::write(&tmp, content).map_err(|e| Error::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| Error::io(path, e))?;
        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    fn append_journal(&self, path: &Path, entry: &JournalEntry) -> Result<()> {
        ensure_parent(path)?;
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let _guard = self.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::io(path, e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| Error::io(path, e))
    }
}
