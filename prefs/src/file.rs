use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::{PreferenceError, PreferenceResult, PreferenceStore};

const FILE_NAME: &str = "preferences.json";

/// Preferences kept in a JSON file.
///
/// The whole map is cached in memory and rewritten on every change through a
/// temporary file, so a crash never leaves a half-written file behind.
#[derive(Debug)]
pub struct FilePreferences {
    path: PathBuf,
    values: Mutex<BTreeMap<String, bool>>,
}

impl FilePreferences {
    /// Opens the store for `app` under the user's configuration directory.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no configuration directory or the
    /// existing file cannot be read.
    pub fn for_app(app: &str) -> PreferenceResult<Self> {
        let dir = dirs::config_dir().ok_or(PreferenceError::NoDirectory)?;
        Self::open(dir.join(app).join(FILE_NAME))
    }

    /// Opens the store at `path`. A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> PreferenceResult<Self> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(err) if err.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };

        log::debug!("loaded {} preferences from {}", values.len(), path.display());
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn commit(&self, values: &BTreeMap<String, bool>) -> PreferenceResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(values)?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, contents)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

impl PreferenceStore for FilePreferences {
    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
            .unwrap_or(default)
    }

    fn set_bool(&self, key: &str, value: bool) -> PreferenceResult<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = values.insert(key.to_owned(), value);

        if let Err(err) = self.commit(&values) {
            // Keep memory and disk in agreement
            match previous {
                Some(previous) => values.insert(key.to_owned(), previous),
                None => values.remove(key),
            };
            return Err(err);
        }
        Ok(())
    }
}
