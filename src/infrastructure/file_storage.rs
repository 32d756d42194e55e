//! Rate-limit state persisted as a single JSON file.
//!
//! The file holds one object mapping client identifiers to their window
//! timestamps:
//!
//! ```json
//! { "203.0.113.7": [1700000000, 1700000012] }
//! ```
//!
//! Every access is a full read-modify-write of the file under a process-wide
//! mutex. Separate processes sharing the file are not coordinated; use the
//! Redis backend for that.

use crate::application::ports::{Storage, StorageError, WindowStorage};
use crate::domain::window::RequestWindow;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::warn;

type State = BTreeMap<String, RequestWindow>;

/// JSON file storage for request windows.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    /// Use the state file at `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Path of the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // The guarded data is the file; a panic mid-update leaves nothing to repair
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load(&self) -> Result<State, StorageError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(State::new()),
            Err(e) => {
                return Err(StorageError::Read(format!(
                    "{}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        if content.trim().is_empty() {
            return Ok(State::new());
        }

        match serde_json::from_str(&content) {
            Ok(state) => Ok(state),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "rate limit state file is not valid JSON, starting fresh"
                );
                Ok(State::new())
            }
        }
    }

    fn store(&self, state: &State) -> Result<(), StorageError> {
        let write_error = |e: &dyn std::fmt::Display| {
            StorageError::Write(format!("{}: {}", self.path.display(), e))
        };

        let bytes = serde_json::to_vec_pretty(state).map_err(|e| write_error(&e))?;

        // Write next to the target and rename so readers never see a partial file
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, bytes).map_err(|e| write_error(&e))?;
        fs::rename(&tmp, &self.path).map_err(|e| write_error(&e))
    }
}

impl WindowStorage for FileStorage {}

impl Storage<String, RequestWindow> for FileStorage {
    fn with_entry_mut<F, R>(
        &self,
        key: String,
        factory: impl FnOnce() -> RequestWindow,
        accessor: F,
    ) -> Result<R, StorageError>
    where
        F: FnOnce(&mut RequestWindow) -> R,
    {
        let _guard = self.guard();
        let mut state = self.load()?;

        let result = accessor(state.entry(key).or_insert_with(factory));

        if let Err(e) = self.store(&state) {
            warn!(error = %e, "failed to persist rate limit state");
        }

        Ok(result)
    }

    fn len(&self) -> Result<usize, StorageError> {
        let _guard = self.guard();
        Ok(self.load()?.len())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.guard();
        self.store(&State::new())
    }

    fn retain<F>(&self, mut f: F) -> Result<(), StorageError>
    where
        F: FnMut(&String, &mut RequestWindow) -> bool,
    {
        let _guard = self.guard();
        let mut state = self.load()?;
        state.retain(|key, window| f(key, window));
        self.store(&state)
    }
}
