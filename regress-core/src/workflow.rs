//! User actions over the store
//!
//! Each function performs one action from start to finish: load the
//! aggregate, validate the input against it, apply the change and save. A
//! validation failure returns before anything is written.

use chrono::Utc;

use crate::db::DocumentBackend;
use crate::error::{StoreError, StoreResult};
use crate::models::{
    clean_assumptions, AppData, ExecutionStatus, Folder, FolderUpdate, ImportedScript, Issue,
    IssueStatus, Project, Screenshot, Script, ScriptUpdate, TestEnvironment, TestType,
};
use crate::session::Session;
use crate::table_markup::{self, TableGrid};

/// Loads, applies `f`, and saves only if `f` succeeded
fn mutate<B, T, F>(store: &B, f: F) -> StoreResult<T>
where
    B: DocumentBackend + ?Sized,
    F: FnOnce(&mut AppData) -> StoreResult<T>,
{
    let mut data = store.load_for_update()?;
    let out = f(&mut data)?;
    store.save(&data)?;
    Ok(out)
}

fn required(value: &str, what: &str) -> StoreResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StoreError::validation(format!("{} is required", what)));
    }
    Ok(trimmed.to_string())
}

fn project_mut<'a>(data: &'a mut AppData, project_id: &str) -> StoreResult<&'a mut Project> {
    data.get_project_mut(project_id)
        .ok_or_else(|| StoreError::not_found("Project", project_id))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// =========================================================================
// Folders
// =========================================================================

/// Checks that `parent_id` names an existing root folder other than `self_id`
fn validate_parent(data: &AppData, parent_id: &str, self_id: Option<&str>) -> StoreResult<()> {
    if Some(parent_id) == self_id {
        return Err(StoreError::validation("A folder cannot be its own parent"));
    }
    let parent = data
        .get_folder(parent_id)
        .ok_or_else(|| StoreError::not_found("Folder", parent_id))?;
    if !parent.is_root() {
        return Err(StoreError::validation(format!(
            "'{}' is a subfolder; folders can only be nested one level deep",
            parent.name
        )));
    }
    Ok(())
}

pub fn create_folder<B: DocumentBackend + ?Sized>(
    store: &B,
    name: &str,
    parent_id: Option<&str>,
) -> StoreResult<Folder> {
    let name = required(name, "Folder name")?;
    mutate(store, |data| {
        if let Some(parent_id) = parent_id {
            validate_parent(data, parent_id, None)?;
        }
        let folder = Folder::new(name, parent_id.map(str::to_string));
        data.add_folder(folder.clone());
        tracing::debug!(folder_id = %folder.id, "created folder");
        Ok(folder)
    })
}

/// Renames and/or moves a folder. Scripts keep their stored folder path.
pub fn edit_folder<B: DocumentBackend + ?Sized>(
    store: &B,
    id: &str,
    update: FolderUpdate,
) -> StoreResult<()> {
    let name = match &update.name {
        Some(name) => Some(required(name, "Folder name")?),
        None => None,
    };
    mutate(store, |data| {
        if data.get_folder(id).is_none() {
            return Err(StoreError::not_found("Folder", id));
        }
        if let Some(Some(parent_id)) = &update.parent_id {
            validate_parent(data, parent_id, Some(id))?;
            if !data.subfolders(id).is_empty() {
                return Err(StoreError::validation(
                    "A folder with subfolders cannot become a subfolder",
                ));
            }
        }
        data.update_folder(
            id,
            FolderUpdate {
                name,
                parent_id: update.parent_id,
            },
        );
        Ok(())
    })
}

// =========================================================================
// Scripts
// =========================================================================

/// The fields of the "add script" form
#[derive(Debug, Clone)]
pub struct ScriptDraft {
    pub script_id: String,
    pub short_description: String,
    pub subfolder_id: String,
    pub test_environment: TestEnvironment,
    pub test_type: TestType,
    pub purpose: String,
    pub assumptions: Vec<String>,
    pub expected_results: String,
    pub script_details: String,
    pub screenshots: Vec<Screenshot>,
}

impl ScriptDraft {
    pub fn new(
        script_id: impl Into<String>,
        short_description: impl Into<String>,
        subfolder_id: impl Into<String>,
    ) -> Self {
        Self {
            script_id: script_id.into(),
            short_description: short_description.into(),
            subfolder_id: subfolder_id.into(),
            test_environment: TestEnvironment::Online,
            test_type: TestType::Positive,
            purpose: String::new(),
            assumptions: Vec::new(),
            expected_results: String::new(),
            script_details: String::new(),
            screenshots: Vec::new(),
        }
    }
}

/// Display path of a subfolder a script may be filed under
fn subfolder_path(data: &AppData, subfolder_id: &str) -> StoreResult<String> {
    match data.get_folder(subfolder_id) {
        Some(folder) if !folder.is_root() => Ok(data.folder_path(folder)),
        Some(_) => Err(StoreError::validation("Please select a valid subfolder")),
        None => Err(StoreError::not_found("Folder", subfolder_id)),
    }
}

pub fn create_script<B: DocumentBackend + ?Sized>(store: &B, draft: ScriptDraft) -> StoreResult<Script> {
    let script_id = required(&draft.script_id, "Script ID")?;
    let short_description = required(&draft.short_description, "Short description")?;
    mutate(store, |data| {
        let folder_path = subfolder_path(data, &draft.subfolder_id)?;
        let mut script = Script::new(script_id, short_description, draft.subfolder_id, folder_path);
        script.test_environment = draft.test_environment;
        script.test_type = draft.test_type;
        script.purpose = draft.purpose;
        script.assumptions = clean_assumptions(draft.assumptions);
        script.expected_results = draft.expected_results;
        script.script_details = draft.script_details;
        script.screenshots = draft.screenshots;
        data.add_script(script.clone());
        tracing::debug!(script = %script.script_id, "created script");
        Ok(script)
    })
}

/// Applies an edit; a new subfolder refreshes the stored folder path
pub fn edit_script<B: DocumentBackend + ?Sized>(
    store: &B,
    id: &str,
    mut update: ScriptUpdate,
) -> StoreResult<()> {
    if let Some(v) = &update.script_id {
        update.script_id = Some(required(v, "Script ID")?);
    }
    if let Some(v) = &update.short_description {
        update.short_description = Some(required(v, "Short description")?);
    }
    update.assumptions = update.assumptions.map(clean_assumptions);
    mutate(store, |data| {
        if data.get_script(id).is_none() {
            return Err(StoreError::not_found("Script", id));
        }
        if let Some(subfolder_id) = &update.subfolder_id {
            update.folder_path = Some(subfolder_path(data, subfolder_id)?);
        }
        data.update_script(id, update);
        Ok(())
    })
}

pub fn add_script_screenshot<B: DocumentBackend + ?Sized>(
    store: &B,
    id: &str,
    screenshot: Screenshot,
) -> StoreResult<()> {
    mutate(store, |data| {
        let script = data
            .scripts
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::not_found("Script", id))?;
        script.screenshots.push(screenshot);
        Ok(())
    })
}

/// Runs `f` on a script's details text and stores the result
fn edit_details<B, T, F>(store: &B, script_id: &str, f: F) -> StoreResult<T>
where
    B: DocumentBackend + ?Sized,
    F: FnOnce(&str) -> StoreResult<(String, T)>,
{
    mutate(store, |data| {
        let script = data
            .scripts
            .iter_mut()
            .find(|s| s.id == script_id)
            .ok_or_else(|| StoreError::not_found("Script", script_id))?;
        let (details, out) = f(script.script_details.as_str())?;
        script.script_details = details;
        Ok(out)
    })
}

/// Inserts a blank table (row 0 pre-filled with headers when asked) into a
/// script's details at a character offset; returns the table id
pub fn insert_script_table<B: DocumentBackend + ?Sized>(
    store: &B,
    script_id: &str,
    offset: usize,
    rows: usize,
    columns: usize,
    headers: bool,
) -> StoreResult<String> {
    table_markup::validate_dimensions(rows, columns)?;
    let grid = table_markup::blank_grid(rows, columns);
    let grid = if headers {
        table_markup::with_header_row(grid)
    } else {
        grid
    };
    edit_details(store, script_id, |details| {
        Ok(table_markup::insert_table(details, offset, &grid))
    })
}

/// Changes one table of a script's details through `edit`
pub fn edit_script_table<B, F>(store: &B, script_id: &str, table_id: &str, edit: F) -> StoreResult<TableGrid>
where
    B: DocumentBackend + ?Sized,
    F: FnOnce(&mut TableGrid) -> StoreResult<()>,
{
    edit_details(store, script_id, |details| {
        let mut grid = table_markup::get_table(details, table_id)
            .ok_or_else(|| StoreError::not_found("Table", table_id))?;
        edit(&mut grid)?;
        Ok((table_markup::update_table(details, table_id, &grid), grid))
    })
}

pub fn remove_script_table<B: DocumentBackend + ?Sized>(
    store: &B,
    script_id: &str,
    table_id: &str,
) -> StoreResult<()> {
    edit_details(store, script_id, |details| {
        if !table_markup::table_ids(details).iter().any(|t| t == table_id) {
            return Err(StoreError::not_found("Table", table_id));
        }
        Ok((table_markup::remove_table(details, table_id), ()))
    })
}

// =========================================================================
// Projects
// =========================================================================

/// Creates a project owned by the session user. Names must be unique among
/// that user's projects, ignoring case.
pub fn create_project<B: DocumentBackend + ?Sized>(
    store: &B,
    session: &Session,
    name: &str,
) -> StoreResult<Project> {
    let name = required(name, "Project name")?;
    mutate(store, |data| {
        if data.has_project_named(session.username(), &name) {
            return Err(StoreError::validation("A project with this name already exists"));
        }
        let project = Project::new(name, session.username());
        data.add_project(project.clone());
        tracing::debug!(project_id = %project.id, "created project");
        Ok(project)
    })
}

/// Copies a library script into a project with status Pending
pub fn import_script<B: DocumentBackend + ?Sized>(
    store: &B,
    project_id: &str,
    script_id: &str,
) -> StoreResult<ImportedScript> {
    mutate(store, |data| {
        let script = data
            .get_script(script_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Script", script_id))?;
        let project = project_mut(data, project_id)?;
        if project.is_imported(&script.id) {
            return Err(StoreError::validation(format!(
                "Script '{}' is already imported",
                script.script_id
            )));
        }
        let imported = ImportedScript::from_script(&script);
        project.imported_scripts.push(imported.clone());
        Ok(imported)
    })
}

// =========================================================================
// Test lab
// =========================================================================

/// What the tester recorded while executing a script
#[derive(Debug, Clone, Default)]
pub struct ExecutionNotes {
    pub remarks: Option<String>,
    pub screenshots: Vec<Screenshot>,
}

fn record_notes(script: &mut ImportedScript, notes: ExecutionNotes) {
    script.remarks = non_empty(notes.remarks);
    script.additional_screenshots = notes.screenshots;
}

/// The issue an execution is raised against
#[derive(Debug, Clone)]
pub enum IssueTarget {
    New {
        title: String,
        description: String,
        screenshot: Option<Screenshot>,
    },
    Existing(String),
}

fn with_imported<B, T, F>(store: &B, project_id: &str, script_id: &str, f: F) -> StoreResult<T>
where
    B: DocumentBackend + ?Sized,
    F: FnOnce(&mut Project, usize) -> StoreResult<T>,
{
    mutate(store, |data| {
        let project = project_mut(data, project_id)?;
        let index = project
            .imported_scripts
            .iter()
            .position(|s| s.id() == script_id)
            .ok_or_else(|| StoreError::not_found("Imported script", script_id))?;
        f(project, index)
    })
}

/// Stores remarks and screenshots without changing the status
pub fn save_execution<B: DocumentBackend + ?Sized>(
    store: &B,
    project_id: &str,
    script_id: &str,
    notes: ExecutionNotes,
) -> StoreResult<()> {
    with_imported(store, project_id, script_id, |project, i| {
        record_notes(&mut project.imported_scripts[i], notes);
        Ok(())
    })
}

/// Marks an imported script Completed and stamps the execution date
pub fn complete_execution<B: DocumentBackend + ?Sized>(
    store: &B,
    project_id: &str,
    script_id: &str,
    notes: ExecutionNotes,
) -> StoreResult<()> {
    with_imported(store, project_id, script_id, |project, i| {
        let script = &mut project.imported_scripts[i];
        record_notes(script, notes);
        script.status = ExecutionStatus::Completed;
        script.execution_date = Some(Utc::now());
        Ok(())
    })
}

/// Flags an imported script with an issue, creating the issue if needed.
/// The script and the issue are linked both ways. Returns the issue.
pub fn raise_issue<B: DocumentBackend + ?Sized>(
    store: &B,
    project_id: &str,
    script_id: &str,
    target: IssueTarget,
    notes: ExecutionNotes,
) -> StoreResult<Issue> {
    with_imported(store, project_id, script_id, |project, i| {
        let issue_id = match target {
            IssueTarget::New {
                title,
                description,
                screenshot,
            } => {
                let title = required(&title, "Issue title")?;
                let mut issue = Issue::new(project.next_issue_number(), title, description.trim());
                issue.screenshot = screenshot;
                let id = issue.id.clone();
                project.issues.push(issue);
                id
            }
            IssueTarget::Existing(id) => {
                if project.get_issue(&id).is_none() {
                    return Err(StoreError::not_found("Issue", id));
                }
                id
            }
        };

        let issue = project
            .get_issue_mut(&issue_id)
            .ok_or_else(|| StoreError::not_found("Issue", issue_id.as_str()))?;
        if !issue.linked_scripts.iter().any(|s| s == script_id) {
            issue.linked_scripts.push(script_id.to_string());
        }
        let issue = issue.clone();

        let script = &mut project.imported_scripts[i];
        record_notes(script, notes);
        script.status = ExecutionStatus::Issues;
        if !script.linked_issues.contains(&issue_id) {
            script.linked_issues.push(issue_id);
        }
        tracing::debug!(issue = issue.issue_number, script = %script_id, "raised issue");
        Ok(issue)
    })
}

// =========================================================================
// Issue log
// =========================================================================

fn with_issue<B, F>(store: &B, project_id: &str, issue_id: &str, f: F) -> StoreResult<Issue>
where
    B: DocumentBackend + ?Sized,
    F: FnOnce(&mut Issue),
{
    mutate(store, |data| {
        let project = project_mut(data, project_id)?;
        let issue = project
            .get_issue_mut(issue_id)
            .ok_or_else(|| StoreError::not_found("Issue", issue_id))?;
        f(issue);
        Ok(issue.clone())
    })
}

pub fn mark_issue_fixed<B: DocumentBackend + ?Sized>(
    store: &B,
    project_id: &str,
    issue_id: &str,
    resolution: Option<String>,
) -> StoreResult<Issue> {
    with_issue(store, project_id, issue_id, |issue| {
        issue.status = IssueStatus::Fixed;
        issue.resolution = non_empty(resolution);
        issue.resolved_at = Some(Utc::now());
    })
}

pub fn reopen_issue<B: DocumentBackend + ?Sized>(
    store: &B,
    project_id: &str,
    issue_id: &str,
    resolution: Option<String>,
) -> StoreResult<Issue> {
    with_issue(store, project_id, issue_id, |issue| {
        issue.status = IssueStatus::Reopened;
        issue.resolution = non_empty(resolution);
        issue.resolved_at = None;
    })
}

/// Updates the resolution notes only
pub fn save_resolution<B: DocumentBackend + ?Sized>(
    store: &B,
    project_id: &str,
    issue_id: &str,
    resolution: Option<String>,
) -> StoreResult<Issue> {
    with_issue(store, project_id, issue_id, |issue| {
        issue.resolution = non_empty(resolution);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::FileBackend;
    use crate::models::default_users;
    use crate::table_markup::{get_table, parse_tables};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        store: FileBackend,
        subfolder: Folder,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = FileBackend::new(dir.path());
        let root = create_folder(&store, "Payments", None).unwrap();
        let subfolder = create_folder(&store, "Cards", Some(&root.id)).unwrap();
        Fixture {
            _dir: dir,
            store,
            subfolder,
        }
    }

    fn session(username: &str) -> Session {
        let mut user = default_users()[1].clone();
        user.username = username.to_string();
        Session::new(user)
    }

    fn script(fx: &Fixture, label: &str) -> Script {
        create_script(&fx.store, ScriptDraft::new(label, "Card auth", &fx.subfolder.id)).unwrap()
    }

    #[test]
    fn test_folder_depth_is_limited() {
        let fx = fixture();
        let err = create_folder(&fx.store, "Deep", Some(&fx.subfolder.id)).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(matches!(
            create_folder(&fx.store, "X", Some("missing")),
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(create_folder(&fx.store, "  ", None), Err(StoreError::Validation(_))));
        assert_eq!(fx.store.list_folders().len(), 2);
    }

    #[test]
    fn test_edit_folder_keeps_script_path() {
        let fx = fixture();
        let s = script(&fx, "TC-1");

        edit_folder(
            &fx.store,
            &fx.subfolder.id,
            FolderUpdate {
                name: Some("Debit cards".into()),
                ..Default::default()
            },
        )
        .unwrap();

        let data = fx.store.load();
        assert_eq!(data.get_script(&s.id).unwrap().folder_path, "Payments > Cards");
        assert_eq!(
            data.resolve_folder_path(&fx.subfolder.id).unwrap(),
            "Payments > Debit cards"
        );
    }

    #[test]
    fn test_edit_folder_moves_subfolder_to_root() {
        let fx = fixture();

        edit_folder(
            &fx.store,
            &fx.subfolder.id,
            FolderUpdate {
                parent_id: Some(None),
                ..Default::default()
            },
        )
        .unwrap();

        let data = fx.store.load();
        assert!(data.get_folder(&fx.subfolder.id).unwrap().is_root());
        assert_eq!(data.root_folders().len(), 2);
        assert_eq!(data.resolve_folder_path(&fx.subfolder.id).unwrap(), "Cards");
    }

    #[test]
    fn test_root_with_children_cannot_move_under_another_root() {
        let fx = fixture();
        let data = fx.store.load();
        let payments = data.root_folders()[0].id.clone();
        let other = create_folder(&fx.store, "Accounts", None).unwrap();

        let err = edit_folder(
            &fx.store,
            &payments,
            FolderUpdate {
                parent_id: Some(Some(other.id.clone())),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let err = edit_folder(
            &fx.store,
            &other.id,
            FolderUpdate {
                parent_id: Some(Some(other.id.clone())),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn test_create_script_validates_and_computes_path() {
        let fx = fixture();
        let mut draft = ScriptDraft::new("TC-1", "Card auth", &fx.subfolder.id);
        draft.assumptions = vec!["Card is active".into(), "".into(), "   ".into()];
        let s = create_script(&fx.store, draft).unwrap();

        assert_eq!(s.folder_path, "Payments > Cards");
        assert_eq!(s.assumptions, vec!["Card is active".to_string()]);

        let root = fx.store.load().root_folders()[0].id.clone();
        assert!(matches!(
            create_script(&fx.store, ScriptDraft::new("TC-2", "x", &root)),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            create_script(&fx.store, ScriptDraft::new("", "x", &fx.subfolder.id)),
            Err(StoreError::Validation(_))
        ));
        assert_eq!(fx.store.list_scripts().len(), 1);
    }

    #[test]
    fn test_edit_script_moves_folder() {
        let fx = fixture();
        let s = script(&fx, "TC-1");
        let root = fx.store.load().root_folders()[0].id.clone();
        let wires = create_folder(&fx.store, "Wires", Some(&root)).unwrap();

        edit_script(
            &fx.store,
            &s.id,
            ScriptUpdate {
                subfolder_id: Some(wires.id.clone()),
                assumptions: Some(vec!["".into(), "a".into()]),
                ..Default::default()
            },
        )
        .unwrap();

        let updated = fx.store.get_script(&s.id).unwrap();
        assert_eq!(updated.folder_path, "Payments > Wires");
        assert_eq!(updated.assumptions, vec!["a".to_string()]);
        assert!(matches!(
            edit_script(&fx.store, "missing", ScriptUpdate::default()),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_add_script_screenshot() {
        let fx = fixture();
        let s = script(&fx, "TC-1");

        add_script_screenshot(&fx.store, &s.id, Screenshot::new("a.png", "data:image/png;base64,AA")).unwrap();
        add_script_screenshot(&fx.store, &s.id, Screenshot::new("b.png", "data:image/png;base64,BB")).unwrap();

        let names: Vec<String> = fx
            .store
            .get_script(&s.id)
            .unwrap()
            .screenshots
            .into_iter()
            .map(|sc| sc.file_name)
            .collect();
        assert_eq!(names, vec!["a.png", "b.png"]);

        assert!(matches!(
            add_script_screenshot(&fx.store, "missing", Screenshot::new("c.png", "data:")),
            Err(StoreError::NotFound { .. })
        ));
        assert_eq!(fx.store.get_script(&s.id).unwrap().screenshots.len(), 2);
    }

    #[test]
    fn test_script_tables() {
        let fx = fixture();
        let s = script(&fx, "TC-1");

        assert!(insert_script_table(&fx.store, &s.id, 0, 0, 3, true).is_err());
        let table_id = insert_script_table(&fx.store, &s.id, 0, 2, 2, true).unwrap();

        let grid = edit_script_table(&fx.store, &s.id, &table_id, |grid| {
            grid[1][0] = "4111".into();
            Ok(())
        })
        .unwrap();
        assert_eq!(grid[0], vec!["Header 1", "Header 2"]);

        let details = fx.store.get_script(&s.id).unwrap().script_details;
        assert_eq!(get_table(&details, &table_id).unwrap()[1][0], "4111");

        remove_script_table(&fx.store, &s.id, &table_id).unwrap();
        let details = fx.store.get_script(&s.id).unwrap().script_details;
        assert!(parse_tables(&details).is_empty());
        assert!(matches!(
            remove_script_table(&fx.store, &s.id, &table_id),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_project_names_unique_per_creator() {
        let fx = fixture();
        create_project(&fx.store, &session("u1"), "Alpha").unwrap();

        let err = create_project(&fx.store, &session("u1"), "alpha").unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(create_project(&fx.store, &session("u2"), "Alpha").is_ok());
        assert!(create_project(&fx.store, &session("u1"), "").is_err());
        assert_eq!(fx.store.list_projects().len(), 2);
    }

    #[test]
    fn test_import_is_a_snapshot() {
        let fx = fixture();
        let s = script(&fx, "TC-1");
        let project = create_project(&fx.store, &session("u1"), "Alpha").unwrap();

        let imported = import_script(&fx.store, &project.id, &s.id).unwrap();
        assert_eq!(imported.status, ExecutionStatus::Pending);
        assert!(matches!(
            import_script(&fx.store, &project.id, &s.id),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            import_script(&fx.store, "missing", &s.id),
            Err(StoreError::NotFound { .. })
        ));

        edit_script(
            &fx.store,
            &s.id,
            ScriptUpdate {
                short_description: Some("Changed".into()),
                ..Default::default()
            },
        )
        .unwrap();

        let project = fx.store.get_project(&project.id).unwrap();
        assert_eq!(project.imported_scripts[0].script.short_description, "Card auth");
    }

    #[test]
    fn test_complete_execution() {
        let fx = fixture();
        let s = script(&fx, "TC-1");
        let project = create_project(&fx.store, &session("u1"), "Alpha").unwrap();
        import_script(&fx.store, &project.id, &s.id).unwrap();

        complete_execution(
            &fx.store,
            &project.id,
            &s.id,
            ExecutionNotes {
                remarks: Some("  all good ".into()),
                screenshots: vec![Screenshot::new("a.png", "data:image/png;base64,")],
            },
        )
        .unwrap();

        let project = fx.store.get_project(&project.id).unwrap();
        let run = &project.imported_scripts[0];
        assert_eq!(run.status, ExecutionStatus::Completed);
        assert_eq!(run.remarks.as_deref(), Some("all good"));
        assert_eq!(run.additional_screenshots.len(), 1);
        assert!(run.execution_date.is_some());
    }

    #[test]
    fn test_save_execution_keeps_status() {
        let fx = fixture();
        let s = script(&fx, "TC-1");
        let project = create_project(&fx.store, &session("u1"), "Alpha").unwrap();
        import_script(&fx.store, &project.id, &s.id).unwrap();

        save_execution(
            &fx.store,
            &project.id,
            &s.id,
            ExecutionNotes {
                remarks: Some(" halfway ".into()),
                screenshots: vec![Screenshot::new("step1.png", "data:image/png;base64,")],
            },
        )
        .unwrap();

        let project = fx.store.get_project(&project.id).unwrap();
        let run = &project.imported_scripts[0];
        assert_eq!(run.status, ExecutionStatus::Pending);
        assert!(run.execution_date.is_none());
        assert_eq!(run.remarks.as_deref(), Some("halfway"));
        assert_eq!(run.additional_screenshots[0].file_name, "step1.png");

        assert!(matches!(
            save_execution(&fx.store, &project.id, "missing", ExecutionNotes::default()),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_raise_new_and_existing_issue() {
        let fx = fixture();
        let first = script(&fx, "TC-1");
        let second = script(&fx, "TC-2");
        let project = create_project(&fx.store, &session("u1"), "Alpha").unwrap();
        import_script(&fx.store, &project.id, &first.id).unwrap();
        import_script(&fx.store, &project.id, &second.id).unwrap();

        let issue = raise_issue(
            &fx.store,
            &project.id,
            &first.id,
            IssueTarget::New {
                title: "Declined".into(),
                description: "Valid card declined".into(),
                screenshot: None,
            },
            ExecutionNotes::default(),
        )
        .unwrap();
        assert_eq!(issue.issue_number, 1);
        assert_eq!(issue.status, IssueStatus::Open);

        let same = raise_issue(
            &fx.store,
            &project.id,
            &second.id,
            IssueTarget::Existing(issue.id.clone()),
            ExecutionNotes::default(),
        )
        .unwrap();
        assert_eq!(same.linked_scripts, vec![first.id.clone(), second.id.clone()]);

        let project = fx.store.get_project(&project.id).unwrap();
        assert_eq!(project.issues.len(), 1);
        for run in &project.imported_scripts {
            assert_eq!(run.status, ExecutionStatus::Issues);
            assert_eq!(run.linked_issues, vec![issue.id.clone()]);
        }
        assert_eq!(project.next_issue_number(), 2);
    }

    #[test]
    fn test_raise_issue_requires_title() {
        let fx = fixture();
        let s = script(&fx, "TC-1");
        let project = create_project(&fx.store, &session("u1"), "Alpha").unwrap();
        import_script(&fx.store, &project.id, &s.id).unwrap();

        let err = raise_issue(
            &fx.store,
            &project.id,
            &s.id,
            IssueTarget::New {
                title: " ".into(),
                description: String::new(),
                screenshot: None,
            },
            ExecutionNotes::default(),
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let project = fx.store.get_project(&project.id).unwrap();
        assert!(project.issues.is_empty());
        assert_eq!(project.imported_scripts[0].status, ExecutionStatus::Pending);
    }

    #[test]
    fn test_issue_lifecycle() {
        let fx = fixture();
        let s = script(&fx, "TC-1");
        let project = create_project(&fx.store, &session("u1"), "Alpha").unwrap();
        import_script(&fx.store, &project.id, &s.id).unwrap();
        let issue = raise_issue(
            &fx.store,
            &project.id,
            &s.id,
            IssueTarget::New {
                title: "Declined".into(),
                description: String::new(),
                screenshot: None,
            },
            ExecutionNotes::default(),
        )
        .unwrap();

        let fixed = mark_issue_fixed(&fx.store, &project.id, &issue.id, Some("Patched".into())).unwrap();
        assert_eq!(fixed.status, IssueStatus::Fixed);
        assert!(fixed.resolved_at.is_some());

        let reopened = reopen_issue(&fx.store, &project.id, &issue.id, Some("  ".into())).unwrap();
        assert_eq!(reopened.status, IssueStatus::Reopened);
        assert!(reopened.resolved_at.is_none());
        assert!(reopened.resolution.is_none());

        let noted = save_resolution(&fx.store, &project.id, &issue.id, Some("Root cause".into())).unwrap();
        assert_eq!(noted.status, IssueStatus::Reopened);
        assert_eq!(noted.resolution.as_deref(), Some("Root cause"));

        assert!(matches!(
            mark_issue_fixed(&fx.store, &project.id, "missing", None),
            Err(StoreError::NotFound { .. })
        ));
    }
}
