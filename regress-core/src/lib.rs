pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod screenshot;
pub mod session;
pub mod table_markup;
pub mod workflow;

// Re-export commonly used types
pub use config::{get_config_path, Config};
pub use db::{create_backend, BackendType, DocumentBackend, FileBackend, SqliteBackend};
pub use error::{StoreError, StoreResult};
pub use models::{
    AppData, ExecutionStatus, Folder, FolderUpdate, ImportedScript, Issue, IssueStatus, Project,
    ProjectStats, ProjectUpdate, Screenshot, Script, ScriptUpdate, TestEnvironment, TestType,
    User, UserType,
};
pub use session::{require_session, Session};
pub use table_markup::{Segment, TableGrid};
pub use workflow::{ExecutionNotes, IssueTarget, ScriptDraft};
