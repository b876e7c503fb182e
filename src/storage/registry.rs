use crate::core::DqlError;
use crate::storage::disk::{TaskStore, DEFAULT_SNAPSHOT_THRESHOLD};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Open namespaces, shared by every connection.
///
/// Each namespace is a directory under `data_dir`. The lock is held for the
/// whole check-and-act sequence of every operation, so concurrent
/// create/use/drop calls on one name cannot interleave.
pub struct NamespaceRegistry {
    data_dir: PathBuf,
    snapshot_threshold: usize,
    open: Mutex<HashMap<String, Arc<TaskStore>>>,
}

impl NamespaceRegistry {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self, DqlError> {
        Self::with_snapshot_threshold(data_dir, DEFAULT_SNAPSHOT_THRESHOLD)
    }

    pub fn with_snapshot_threshold<P: AsRef<Path>>(
        data_dir: P,
        snapshot_threshold: usize,
    ) -> Result<Self, DqlError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)?;
        Ok(Self {
            data_dir,
            snapshot_threshold,
            open: Mutex::new(HashMap::new()),
        })
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Namespace names map straight to directory names.
    fn validate_name(name: &str) -> Result<(), DqlError> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');
        if valid {
            Ok(())
        } else {
            Err(DqlError::Validation(format!("invalid database name '{name}'")))
        }
    }

    fn path_of(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }

    /// Create an empty namespace directory.
    pub fn create(&self, name: &str) -> Result<(), DqlError> {
        Self::validate_name(name)?;
        let _guard = self.open.lock();

        let path = self.path_of(name);
        if path.exists() {
            return Err(DqlError::AlreadyExists(format!("database '{name}'")));
        }
        fs::create_dir_all(&path)?;
        tracing::info!(namespace = name, "created database");
        Ok(())
    }

    /// Handle to an existing namespace, opening it on first use.
    pub fn open(&self, name: &str) -> Result<Arc<TaskStore>, DqlError> {
        Self::validate_name(name)?;
        let mut open = self.open.lock();

        if let Some(store) = open.get(name) {
            return Ok(Arc::clone(store));
        }

        let path = self.path_of(name);
        if !path.is_dir() {
            return Err(DqlError::NotFound(format!("database '{name}'")));
        }
        let store = Arc::new(TaskStore::open_with_threshold(&path, self.snapshot_threshold)?);
        open.insert(name.to_string(), Arc::clone(&store));
        Ok(store)
    }

    /// Like [`open`](Self::open), creating the namespace first if needed.
    pub fn open_or_create(&self, name: &str) -> Result<Arc<TaskStore>, DqlError> {
        match self.create(name) {
            Ok(()) | Err(DqlError::AlreadyExists(_)) => self.open(name),
            Err(e) => Err(e),
        }
    }

    /// Namespace directory names, sorted.
    pub fn list(&self) -> Result<Vec<String>, DqlError> {
        let _guard = self.open.lock();
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir()
                && let Some(name) = entry.file_name().to_str()
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Close the namespace's handle (if open) and remove its storage.
    /// Sessions still holding the handle get "store is closed" errors.
    pub fn drop_namespace(&self, name: &str) -> Result<(), DqlError> {
        Self::validate_name(name)?;
        let mut open = self.open.lock();

        let path = self.path_of(name);
        if !path.is_dir() {
            return Err(DqlError::NotFound(format!("database '{name}'")));
        }
        if let Some(store) = open.remove(name) {
            store.close()?;
        }
        fs::remove_dir_all(&path)?;
        tracing::info!(namespace = name, "dropped database");
        Ok(())
    }

    /// Close every open handle. Used on shutdown.
    pub fn close_all(&self) {
        let mut open = self.open.lock();
        for (name, store) in open.drain() {
            if let Err(e) = store.close() {
                tracing::warn!(namespace = %name, error = %e, "failed to close database");
            }
        }
    }
}
