//! Database registry.
//!
//! Maps database names taken from request paths to backing files under the
//! data directory. Entries are created on first lookup and never removed, so
//! a name resolves to the same [`Database`] for the lifetime of the registry.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;

use regex::Regex;
use tracing::debug;

use super::errors::{StoreError, StoreResult};
use super::session::Session;

/// File extension of database files
const DATABASE_EXTENSION: &str = "db";

fn database_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid database name pattern"))
}

/// A named database backed by one SQLite file.
///
/// Acts as the connection factory for that file: every [`Session`] opened
/// through it is a fresh connection.
#[derive(Debug)]
pub struct Database {
    name: String,
    path: PathBuf,
    busy_timeout: Duration,
}

impl Database {
    /// Database name as it appears in URLs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a new session on this database
    pub fn session(&self) -> StoreResult<Session> {
        Session::open(&self.name, &self.path, self.busy_timeout)
    }
}

/// Process-wide registry of databases, keyed by name.
#[derive(Debug)]
pub struct DatabaseRegistry {
    data_dir: PathBuf,
    busy_timeout: Duration,
    databases: RwLock<HashMap<String, Arc<Database>>>,
}

impl DatabaseRegistry {
    /// Create a registry storing database files under `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>, busy_timeout: Duration) -> Self {
        Self {
            data_dir: data_dir.into(),
            busy_timeout,
            databases: RwLock::new(HashMap::new()),
        }
    }

    /// Directory holding the database files
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Resolve a database by name, registering it on first access.
    pub fn resolve(&self, name: &str) -> StoreResult<Arc<Database>> {
        if !database_name_pattern().is_match(name) {
            return Err(StoreError::InvalidName(name.to_string()));
        }

        {
            let databases = self
                .databases
                .read()
                .map_err(|_| StoreError::Connection("Registry lock poisoned".to_string()))?;
            if let Some(database) = databases.get(name) {
                return Ok(Arc::clone(database));
            }
        }

        let mut databases = self
            .databases
            .write()
            .map_err(|_| StoreError::Connection("Registry lock poisoned".to_string()))?;

        // Another request may have registered the name while we waited.
        if let Some(database) = databases.get(name) {
            return Ok(Arc::clone(database));
        }

        fs::create_dir_all(&self.data_dir).map_err(|e| {
            StoreError::Connection(format!(
                "Failed to create data directory {}: {}",
                self.data_dir.display(),
                e
            ))
        })?;

        let database = Arc::new(Database {
            name: name.to_string(),
            path: self.data_dir.join(format!("{}.{}", name, DATABASE_EXTENSION)),
            busy_timeout: self.busy_timeout,
        });
        debug!(database = name, path = %database.path.display(), "registered database");
        databases.insert(name.to_string(), Arc::clone(&database));

        Ok(database)
    }

    /// Names of the databases with a backing file in the data directory,
    /// sorted. A missing data directory holds no databases.
    pub fn database_names(&self) -> StoreResult<Vec<String>> {
        let entries = match fs::read_dir(&self.data_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::Connection(format!(
                    "Failed to read data directory {}: {}",
                    self.data_dir.display(),
                    e
                )))
            }
        };

        let mut names = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| StoreError::Connection(e.to_string()))?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some(DATABASE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if database_name_pattern().is_match(stem) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Number of databases resolved so far
    pub fn len(&self) -> usize {
        self.databases.read().map(|d| d.len()).unwrap_or(0)
    }

    /// Returns true if no database has been resolved yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry(dir: &TempDir) -> DatabaseRegistry {
        DatabaseRegistry::new(dir.path().join("data"), Duration::from_millis(100))
    }

    #[test]
    fn test_same_name_same_database() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);

        let first = registry.resolve("fixtures").unwrap();
        let second = registry.resolve("fixtures").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
        assert!(first.path().ends_with("fixtures.db"));
    }

    #[test]
    fn test_rejects_path_like_names() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);

        for name in ["../etc", "a/b", "", "with space"] {
            assert!(matches!(
                registry.resolve(name),
                Err(StoreError::InvalidName(_))
            ));
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_first_access() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(registry(&dir));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.resolve("shared").unwrap())
            })
            .collect();

        let resolved: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(resolved.iter().all(|db| Arc::ptr_eq(db, &resolved[0])));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_database_names_lists_files() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        assert!(registry.database_names().unwrap().is_empty());

        for name in ["weather", "fixtures"] {
            registry.resolve(name).unwrap().session().unwrap().begin().unwrap();
        }
        fs::write(dir.path().join("data").join("notes.txt"), "x").unwrap();

        assert_eq!(registry.database_names().unwrap(), vec!["fixtures", "weather"]);
    }
}
