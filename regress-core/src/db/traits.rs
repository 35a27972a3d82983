//! Storage backend traits
//!
//! A backend is a small persistent key-value medium. All durable state is one
//! serialized [`AppData`] under [`DATA_KEY`]; the login session is kept apart
//! under [`SESSION_KEY`].

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{StoreError, StoreResult};
use crate::models::{AppData, Folder, FolderUpdate, Project, ProjectUpdate, Script, ScriptUpdate, User};
use crate::session::Session;

/// Key holding the serialized aggregate
pub const DATA_KEY: &str = "regression_assistant_data";

/// Key holding the current login session
pub const SESSION_KEY: &str = "regression_assistant_session";

/// Browser local storage allows about 5 MiB per origin
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

/// Types of storage backends available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// A directory with one JSON file per key
    File,
    /// A SQLite database with a key-value table
    Sqlite,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendType::File => write!(f, "file"),
            BackendType::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for BackendType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" | "json" => Ok(BackendType::File),
            "sqlite" | "db" => Ok(BackendType::Sqlite),
            _ => Err(StoreError::validation(format!("Unknown backend: {}", s))),
        }
    }
}

/// Fails with `StorageQuotaExceeded` when `used + incoming` exceeds `quota`
pub(crate) fn check_quota(used: usize, incoming: usize, quota: usize) -> StoreResult<()> {
    let size = used + incoming;
    if size > quota {
        return Err(StoreError::StorageQuotaExceeded { size, quota });
    }
    Ok(())
}

/// Core trait for storage backends
///
/// Implementors provide raw key access; everything else is built on top and
/// follows one rule: read the whole aggregate, change one slice, write the
/// whole aggregate back. Nothing is cached between calls.
pub trait DocumentBackend: Send + Sync {
    /// Returns the backend type
    fn backend_type(&self) -> BackendType;

    /// Returns the path of the directory or database file
    fn path(&self) -> &Path;

    /// Byte budget shared by all keys
    fn quota_bytes(&self) -> usize;

    /// Reads a raw value, `None` when the key was never written
    fn read_key(&self, key: &str) -> StoreResult<Option<String>>;

    /// Writes a raw value, enforcing the quota
    fn write_key(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Removes a key; missing keys are fine
    fn remove_key(&self, key: &str) -> StoreResult<()>;

    // =========================================================================
    // Full Store Operations
    // =========================================================================

    /// Reads the aggregate, distinguishing "nothing stored" from "unreadable"
    fn try_load(&self) -> StoreResult<Option<AppData>> {
        match self.read_key(DATA_KEY)? {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| StoreError::StorageReadCorrupt(e.to_string())),
        }
    }

    /// Loads the aggregate. Missing or unreadable state yields the default
    /// aggregate with the seed accounts; the problem is logged, not returned.
    fn load(&self) -> AppData {
        match self.try_load() {
            Ok(Some(data)) => data,
            Ok(None) => AppData::new(),
            Err(e) => {
                tracing::warn!(path = %self.path().display(), error = %e, "falling back to default data");
                AppData::new()
            }
        }
    }

    /// Loads the aggregate ahead of a write. Missing or undecodable state
    /// still yields the default aggregate, but a failing medium is returned
    /// so the caller never overwrites data it could not read.
    fn load_for_update(&self) -> StoreResult<AppData> {
        match self.try_load() {
            Ok(data) => Ok(data.unwrap_or_default()),
            Err(e @ StoreError::StorageReadCorrupt(_)) => {
                tracing::warn!(path = %self.path().display(), error = %e, "replacing unreadable data");
                Ok(AppData::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Serializes and persists the aggregate
    fn save(&self, data: &AppData) -> StoreResult<()> {
        let json = serde_json::to_string(data)
            .map_err(|e| StoreError::StorageWriteFailed(e.to_string()))?;
        self.write_key(DATA_KEY, &json)?;
        tracing::debug!(bytes = json.len(), "saved data");
        Ok(())
    }

    // =========================================================================
    // Session Operations
    // =========================================================================

    /// Checks credentials against the stored accounts. On a match the session
    /// is written and the user returned; a mismatch is `Ok(None)`.
    fn authenticate(&self, username: &str, password: &str) -> StoreResult<Option<User>> {
        let data = self.load();
        let Some(user) = data.find_user(username, password).cloned() else {
            tracing::info!(username, "login rejected");
            return Ok(None);
        };
        let session = Session::new(user.clone());
        let json = serde_json::to_string(&session)
            .map_err(|e| StoreError::StorageWriteFailed(e.to_string()))?;
        self.write_key(SESSION_KEY, &json)?;
        tracing::info!(username, "logged in");
        Ok(Some(user))
    }

    /// Clears the session
    fn logout(&self) -> StoreResult<()> {
        self.remove_key(SESSION_KEY)
    }

    /// Current session, if any; an unreadable session counts as logged out
    fn current_session(&self) -> Option<Session> {
        let raw = match self.read_key(SESSION_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(error = %e, "could not read session");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable session");
                None
            }
        }
    }

    fn current_user(&self) -> Option<User> {
        self.current_session().map(|s| s.user)
    }

    // =========================================================================
    // Folder Operations
    // =========================================================================

    fn list_folders(&self) -> Vec<Folder> {
        self.load().folders
    }

    fn add_folder(&self, folder: Folder) -> StoreResult<()> {
        let mut data = self.load_for_update()?;
        data.add_folder(folder);
        self.save(&data)
    }

    /// Unknown ids are ignored
    fn update_folder(&self, id: &str, update: FolderUpdate) -> StoreResult<()> {
        let mut data = self.load_for_update()?;
        if data.update_folder(id, update) {
            self.save(&data)?;
        }
        Ok(())
    }

    /// Removes the folder and its direct subfolders
    fn delete_folder(&self, id: &str) -> StoreResult<()> {
        let mut data = self.load_for_update()?;
        data.delete_folder(id);
        self.save(&data)
    }

    // =========================================================================
    // Script Operations
    // =========================================================================

    fn list_scripts(&self) -> Vec<Script> {
        self.load().scripts
    }

    fn get_script(&self, id: &str) -> Option<Script> {
        self.load().get_script(id).cloned()
    }

    fn add_script(&self, script: Script) -> StoreResult<()> {
        let mut data = self.load_for_update()?;
        data.add_script(script);
        self.save(&data)
    }

    /// Unknown ids are ignored
    fn update_script(&self, id: &str, update: ScriptUpdate) -> StoreResult<()> {
        let mut data = self.load_for_update()?;
        if data.update_script(id, update) {
            self.save(&data)?;
        }
        Ok(())
    }

    fn delete_script(&self, id: &str) -> StoreResult<()> {
        let mut data = self.load_for_update()?;
        data.delete_script(id);
        self.save(&data)
    }

    // =========================================================================
    // Project Operations
    // =========================================================================

    fn list_projects(&self) -> Vec<Project> {
        self.load().projects
    }

    fn get_project(&self, id: &str) -> Option<Project> {
        self.load().get_project(id).cloned()
    }

    fn projects_by(&self, username: &str) -> Vec<Project> {
        self.load()
            .projects_by(username)
            .into_iter()
            .cloned()
            .collect()
    }

    fn add_project(&self, project: Project) -> StoreResult<()> {
        let mut data = self.load_for_update()?;
        data.add_project(project);
        self.save(&data)
    }

    /// Unknown ids are ignored
    fn update_project(&self, id: &str, update: ProjectUpdate) -> StoreResult<()> {
        let mut data = self.load_for_update()?;
        if data.update_project(id, update) {
            self.save(&data)?;
        }
        Ok(())
    }

    fn delete_project(&self, id: &str) -> StoreResult<()> {
        let mut data = self.load_for_update()?;
        data.delete_project(id);
        self.save(&data)
    }

    // =========================================================================
    // Utility Operations
    // =========================================================================

    /// Returns true once the aggregate has been written at least once
    fn exists(&self) -> bool {
        matches!(self.read_key(DATA_KEY), Ok(Some(_)))
    }

    /// Writes the default aggregate if nothing is stored yet
    fn create_if_not_exists(&self) -> StoreResult<()> {
        if !self.exists() {
            self.save(&AppData::new())?;
        }
        Ok(())
    }

    /// Returns counts and size of the stored data
    fn stats(&self) -> StoreStats {
        let data = self.load();
        let bytes = self
            .read_key(DATA_KEY)
            .ok()
            .flatten()
            .map_or(0, |raw| raw.len());
        StoreStats {
            folder_count: data.folders.len(),
            script_count: data.scripts.len(),
            project_count: data.projects.len(),
            issue_count: data.projects.iter().map(|p| p.issues.len()).sum(),
            bytes,
            quota_bytes: self.quota_bytes(),
            backend_type: self.backend_type(),
        }
    }
}

/// Statistics about a store
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub folder_count: usize,
    pub script_count: usize,
    pub project_count: usize,
    pub issue_count: usize,
    pub bytes: usize,
    pub quota_bytes: usize,
    pub backend_type: BackendType,
}
