use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::StoreError;

/// Separator used when displaying a folder below its parent
pub const FOLDER_PATH_SEPARATOR: &str = " > ";

/// Generates a compact pseudo-unique id: nine random base-36 characters
/// followed by the base-36 millisecond timestamp.
pub fn generate_id() -> String {
    let random = to_base36(Uuid::new_v4().as_u128());
    let random: String = random.chars().take(9).collect();
    let millis = Utc::now().timestamp_millis().max(0) as u128;
    format!("{}{}", random, to_base36(millis))
}

fn to_base36(mut n: u128) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Reads `null` as the type's default, so a blob with one nulled field
/// keeps the rest of its data
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_default_users<'de, D>(deserializer: D) -> Result<Vec<User>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<User>>::deserialize(deserializer)?.unwrap_or_else(default_users))
}

/// Role of an account
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UserType {
    User,
    Administrator,
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserType::User => write!(f, "User"),
            UserType::Administrator => write!(f, "Administrator"),
        }
    }
}

/// An account from the fixed seed list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    pub password: String,
    pub user_type: UserType,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.user_type == UserType::Administrator
    }
}

/// The two accounts every fresh store starts with
pub fn default_users() -> Vec<User> {
    vec![
        User {
            username: "admin".to_string(),
            password: "admin".to_string(),
            user_type: UserType::Administrator,
        },
        User {
            username: "user01".to_string(),
            password: "user01".to_string(),
            user_type: UserType::User,
        },
    ]
}

/// A root folder (no parent) or a subfolder of a root folder
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl Folder {
    pub fn new(name: impl Into<String>, parent_id: Option<String>) -> Self {
        Self {
            id: generate_id(),
            name: name.into(),
            parent_id,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Shallow field overwrite for a folder; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct FolderUpdate {
    pub name: Option<String>,
    /// `Some(None)` turns the folder into a root folder
    pub parent_id: Option<Option<String>>,
}

impl FolderUpdate {
    pub fn apply(self, folder: &mut Folder) {
        if let Some(name) = self.name {
            folder.name = name;
        }
        if let Some(parent_id) = self.parent_id {
            folder.parent_id = parent_id;
        }
    }
}

/// An image attached to a script, an execution or an issue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Screenshot {
    pub id: String,
    pub file_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    /// `data:` URI holding the encoded image
    pub path: String,
}

impl Screenshot {
    pub fn new(file_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            file_name: file_name.into(),
            description: String::new(),
            path: path.into(),
        }
    }
}

/// Where a script is executed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TestEnvironment {
    Online,
    Batch,
    #[serde(rename = "Online & Batch")]
    OnlineAndBatch,
}

impl fmt::Display for TestEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestEnvironment::Online => write!(f, "Online"),
            TestEnvironment::Batch => write!(f, "Batch"),
            TestEnvironment::OnlineAndBatch => write!(f, "Online & Batch"),
        }
    }
}

impl FromStr for TestEnvironment {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(' ', "").as_str() {
            "online" => Ok(TestEnvironment::Online),
            "batch" => Ok(TestEnvironment::Batch),
            "online&batch" | "both" | "online-batch" => Ok(TestEnvironment::OnlineAndBatch),
            _ => Err(StoreError::validation(format!(
                "Invalid test environment: {} (expected Online, Batch or Online & Batch)",
                s
            ))),
        }
    }
}

/// Whether a script checks the happy path or a failure path
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TestType {
    Positive,
    Negative,
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestType::Positive => write!(f, "Positive"),
            TestType::Negative => write!(f, "Negative"),
        }
    }
}

impl FromStr for TestType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "positive" => Ok(TestType::Positive),
            "negative" => Ok(TestType::Negative),
            _ => Err(StoreError::validation(format!(
                "Invalid test type: {} (expected Positive or Negative)",
                s
            ))),
        }
    }
}

/// A test script in the administrator's library
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    pub id: String,

    /// User-chosen label, not required to be unique
    pub script_id: String,

    pub short_description: String,

    /// Should reference a subfolder; not enforced after creation
    pub subfolder_id: String,

    /// "Root > Sub" captured when the script was saved. Renaming or deleting
    /// the folder later does not refresh it.
    pub folder_path: String,

    pub test_environment: TestEnvironment,

    pub test_type: TestType,

    #[serde(default, deserialize_with = "null_as_default")]
    pub purpose: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub assumptions: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub expected_results: String,

    /// Free text that may embed table markers, see [`crate::table_markup`]
    #[serde(default, deserialize_with = "null_as_default")]
    pub script_details: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub screenshots: Vec<Screenshot>,

    pub created_at: DateTime<Utc>,
}

impl Script {
    /// Creates a script with default environment/type and empty body fields
    pub fn new(
        script_id: impl Into<String>,
        short_description: impl Into<String>,
        subfolder_id: impl Into<String>,
        folder_path: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_id(),
            script_id: script_id.into(),
            short_description: short_description.into(),
            subfolder_id: subfolder_id.into(),
            folder_path: folder_path.into(),
            test_environment: TestEnvironment::Online,
            test_type: TestType::Positive,
            purpose: String::new(),
            assumptions: Vec::new(),
            expected_results: String::new(),
            script_details: String::new(),
            screenshots: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Case-insensitive match against label, description and folder path
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.script_id.to_lowercase().contains(&term)
            || self.short_description.to_lowercase().contains(&term)
            || self.folder_path.to_lowercase().contains(&term)
    }
}

/// Drops blank assumption lines
pub fn clean_assumptions(assumptions: Vec<String>) -> Vec<String> {
    assumptions
        .into_iter()
        .filter(|a| !a.trim().is_empty())
        .collect()
}

/// Shallow field overwrite for a script
#[derive(Debug, Clone, Default)]
pub struct ScriptUpdate {
    pub script_id: Option<String>,
    pub short_description: Option<String>,
    pub subfolder_id: Option<String>,
    pub folder_path: Option<String>,
    pub test_environment: Option<TestEnvironment>,
    pub test_type: Option<TestType>,
    pub purpose: Option<String>,
    pub assumptions: Option<Vec<String>>,
    pub expected_results: Option<String>,
    pub script_details: Option<String>,
    pub screenshots: Option<Vec<Screenshot>>,
}

impl ScriptUpdate {
    pub fn apply(self, script: &mut Script) {
        if let Some(v) = self.script_id {
            script.script_id = v;
        }
        if let Some(v) = self.short_description {
            script.short_description = v;
        }
        if let Some(v) = self.subfolder_id {
            script.subfolder_id = v;
        }
        if let Some(v) = self.folder_path {
            script.folder_path = v;
        }
        if let Some(v) = self.test_environment {
            script.test_environment = v;
        }
        if let Some(v) = self.test_type {
            script.test_type = v;
        }
        if let Some(v) = self.purpose {
            script.purpose = v;
        }
        if let Some(v) = self.assumptions {
            script.assumptions = v;
        }
        if let Some(v) = self.expected_results {
            script.expected_results = v;
        }
        if let Some(v) = self.script_details {
            script.script_details = v;
        }
        if let Some(v) = self.screenshots {
            script.screenshots = v;
        }
    }
}

/// Execution state of a script inside a project
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExecutionStatus {
    Pending,
    Completed,
    Issues,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Pending => write!(f, "Pending"),
            ExecutionStatus::Completed => write!(f, "Completed"),
            ExecutionStatus::Issues => write!(f, "Issues"),
        }
    }
}

impl FromStr for ExecutionStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ExecutionStatus::Pending),
            "completed" => Ok(ExecutionStatus::Completed),
            "issues" => Ok(ExecutionStatus::Issues),
            _ => Err(StoreError::validation(format!(
                "Invalid execution status: {} (expected Pending, Completed or Issues)",
                s
            ))),
        }
    }
}

/// A snapshot of a [`Script`] taken when it was imported into a project
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportedScript {
    #[serde(flatten)]
    pub script: Script,

    pub status: ExecutionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub additional_screenshots: Vec<Screenshot>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_date: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub linked_issues: Vec<String>,
}

impl ImportedScript {
    /// Copies the script's fields; later edits to the source are not seen
    pub fn from_script(script: &Script) -> Self {
        Self {
            script: script.clone(),
            status: ExecutionStatus::Pending,
            remarks: None,
            additional_screenshots: Vec::new(),
            execution_date: None,
            linked_issues: Vec::new(),
        }
    }

    /// Id shared with the source script
    pub fn id(&self) -> &str {
        &self.script.id
    }
}

/// Lifecycle of an issue
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum IssueStatus {
    Open,
    Fixed,
    Reopened,
}

impl IssueStatus {
    /// Open and reopened issues still need attention
    pub fn is_active(&self) -> bool {
        matches!(self, IssueStatus::Open | IssueStatus::Reopened)
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueStatus::Open => write!(f, "Open"),
            IssueStatus::Fixed => write!(f, "Fixed"),
            IssueStatus::Reopened => write!(f, "Reopened"),
        }
    }
}

impl FromStr for IssueStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(IssueStatus::Open),
            "fixed" => Ok(IssueStatus::Fixed),
            "reopened" => Ok(IssueStatus::Reopened),
            _ => Err(StoreError::validation(format!(
                "Invalid issue status: {} (expected Open, Fixed or Reopened)",
                s
            ))),
        }
    }
}

/// A defect logged against one or more imported scripts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: String,
    pub issue_number: u32,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<Screenshot>,
    pub status: IssueStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub linked_scripts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Issue {
    pub fn new(issue_number: u32, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            issue_number,
            title: title.into(),
            description: description.into(),
            screenshot: None,
            status: IssueStatus::Open,
            linked_scripts: Vec::new(),
            resolution: None,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }
}

/// Counters shown on the project overview
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectStats {
    pub total_scripts: usize,
    pub completed_scripts: usize,
    pub pending_scripts: usize,
    pub issue_scripts: usize,
    pub total_issues: usize,
    pub open_issues: usize,
}

impl ProjectStats {
    /// Percentage of imported scripts marked completed
    pub fn progress_percent(&self) -> u32 {
        if self.total_scripts == 0 {
            return 0;
        }
        ((self.completed_scripts * 100) / self.total_scripts) as u32
    }
}

/// Project names compare trimmed and case-insensitively, Unicode included
fn same_project_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// A user's test campaign
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub imported_scripts: Vec<ImportedScript>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub issues: Vec<Issue>,
}

impl Project {
    pub fn new(name: impl Into<String>, created_by: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            name: name.into(),
            created_by: created_by.into(),
            created_at: Utc::now(),
            imported_scripts: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn get_imported(&self, id: &str) -> Option<&ImportedScript> {
        self.imported_scripts.iter().find(|s| s.id() == id)
    }

    pub fn get_imported_mut(&mut self, id: &str) -> Option<&mut ImportedScript> {
        self.imported_scripts.iter_mut().find(|s| s.id() == id)
    }

    pub fn is_imported(&self, script_id: &str) -> bool {
        self.get_imported(script_id).is_some()
    }

    pub fn get_issue(&self, id: &str) -> Option<&Issue> {
        self.issues.iter().find(|i| i.id == id)
    }

    pub fn get_issue_mut(&mut self, id: &str) -> Option<&mut Issue> {
        self.issues.iter_mut().find(|i| i.id == id)
    }

    /// Finds an issue by id or by its `#N` / `N` number
    pub fn find_issue(&self, key: &str) -> Option<&Issue> {
        let number = key.trim_start_matches('#').parse::<u32>().ok();
        self.issues
            .iter()
            .find(|i| i.id == key || Some(i.issue_number) == number)
    }

    /// Number for the next issue: current count plus one
    pub fn next_issue_number(&self) -> u32 {
        self.issues.len() as u32 + 1
    }

    /// Issues that list the given imported script
    pub fn issues_for_script(&self, script_id: &str) -> Vec<&Issue> {
        self.issues
            .iter()
            .filter(|i| i.linked_scripts.iter().any(|s| s == script_id))
            .collect()
    }

    /// Imported scripts that the given issue links to
    pub fn scripts_for_issue(&self, issue: &Issue) -> Vec<&ImportedScript> {
        self.imported_scripts
            .iter()
            .filter(|s| issue.linked_scripts.iter().any(|id| id == s.id()))
            .collect()
    }

    /// Imported scripts, optionally narrowed to one status
    pub fn scripts_with_status(&self, status: Option<ExecutionStatus>) -> Vec<&ImportedScript> {
        self.imported_scripts
            .iter()
            .filter(|s| status.map_or(true, |st| s.status == st))
            .collect()
    }

    pub fn stats(&self) -> ProjectStats {
        let count = |st: ExecutionStatus| {
            self.imported_scripts
                .iter()
                .filter(|s| s.status == st)
                .count()
        };
        ProjectStats {
            total_scripts: self.imported_scripts.len(),
            completed_scripts: count(ExecutionStatus::Completed),
            pending_scripts: count(ExecutionStatus::Pending),
            issue_scripts: count(ExecutionStatus::Issues),
            total_issues: self.issues.len(),
            open_issues: self.issues.iter().filter(|i| i.status.is_active()).count(),
        }
    }
}

/// Shallow field overwrite for a project
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub imported_scripts: Option<Vec<ImportedScript>>,
    pub issues: Option<Vec<Issue>>,
}

impl ProjectUpdate {
    pub fn apply(self, project: &mut Project) {
        if let Some(v) = self.name {
            project.name = v;
        }
        if let Some(v) = self.imported_scripts {
            project.imported_scripts = v;
        }
        if let Some(v) = self.issues {
            project.issues = v;
        }
    }
}

/// The single persisted aggregate holding all durable state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppData {
    #[serde(default = "default_users", deserialize_with = "null_as_default_users")]
    pub users: Vec<User>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub folders: Vec<Folder>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub scripts: Vec<Script>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub projects: Vec<Project>,
}

impl AppData {
    /// Creates a store holding only the seed accounts
    pub fn new() -> Self {
        Self {
            users: default_users(),
            folders: Vec::new(),
            scripts: Vec::new(),
            projects: Vec::new(),
        }
    }

    /// Exact, case-sensitive match on both fields
    pub fn find_user(&self, username: &str, password: &str) -> Option<&User> {
        self.users
            .iter()
            .find(|u| u.username == username && u.password == password)
    }

    // =========================================================================
    // Folders
    // =========================================================================

    pub fn get_folder(&self, id: &str) -> Option<&Folder> {
        self.folders.iter().find(|f| f.id == id)
    }

    pub fn root_folders(&self) -> Vec<&Folder> {
        self.folders.iter().filter(|f| f.is_root()).collect()
    }

    pub fn subfolders(&self, parent_id: &str) -> Vec<&Folder> {
        self.folders
            .iter()
            .filter(|f| f.parent_id.as_deref() == Some(parent_id))
            .collect()
    }

    /// "Parent > Child" for a subfolder, the bare name for a root folder or
    /// when the parent no longer exists. Only one parent level is walked.
    pub fn folder_path(&self, folder: &Folder) -> String {
        match folder.parent_id.as_deref().and_then(|p| self.get_folder(p)) {
            Some(parent) => format!("{}{}{}", parent.name, FOLDER_PATH_SEPARATOR, folder.name),
            None => folder.name.clone(),
        }
    }

    /// Live path for a script's subfolder, unlike the stored `folder_path`
    pub fn resolve_folder_path(&self, subfolder_id: &str) -> Option<String> {
        self.get_folder(subfolder_id).map(|f| self.folder_path(f))
    }

    /// Subfolders a script can be filed under, with their display paths
    pub fn subfolder_options(&self) -> Vec<(String, String)> {
        self.folders
            .iter()
            .filter(|f| !f.is_root())
            .map(|f| (f.id.clone(), self.folder_path(f)))
            .collect()
    }

    pub fn add_folder(&mut self, folder: Folder) {
        self.folders.push(folder);
    }

    /// Returns false when no folder has the id
    pub fn update_folder(&mut self, id: &str, update: FolderUpdate) -> bool {
        match self.folders.iter_mut().find(|f| f.id == id) {
            Some(folder) => {
                update.apply(folder);
                true
            }
            None => false,
        }
    }

    /// Removes the folder and its direct subfolders; returns how many went.
    /// Scripts filed under removed subfolders are left as they are.
    pub fn delete_folder(&mut self, id: &str) -> usize {
        let before = self.folders.len();
        self.folders
            .retain(|f| f.id != id && f.parent_id.as_deref() != Some(id));
        before - self.folders.len()
    }

    // =========================================================================
    // Scripts
    // =========================================================================

    pub fn get_script(&self, id: &str) -> Option<&Script> {
        self.scripts.iter().find(|s| s.id == id)
    }

    /// Finds a script by internal id, falling back to the first matching label
    pub fn find_script(&self, key: &str) -> Option<&Script> {
        self.get_script(key)
            .or_else(|| self.scripts.iter().find(|s| s.script_id == key))
    }

    pub fn add_script(&mut self, script: Script) {
        self.scripts.push(script);
    }

    pub fn update_script(&mut self, id: &str, update: ScriptUpdate) -> bool {
        match self.scripts.iter_mut().find(|s| s.id == id) {
            Some(script) => {
                update.apply(script);
                true
            }
            None => false,
        }
    }

    pub fn delete_script(&mut self, id: &str) -> bool {
        let before = self.scripts.len();
        self.scripts.retain(|s| s.id != id);
        self.scripts.len() != before
    }

    /// Scripts in a subfolder and/or matching a search term
    pub fn filter_scripts(&self, subfolder_id: Option<&str>, term: Option<&str>) -> Vec<&Script> {
        self.scripts
            .iter()
            .filter(|s| subfolder_id.map_or(true, |id| s.subfolder_id == id))
            .filter(|s| term.map_or(true, |t| t.is_empty() || s.matches_search(t)))
            .collect()
    }

    // =========================================================================
    // Projects
    // =========================================================================

    pub fn get_project(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn get_project_mut(&mut self, id: &str) -> Option<&mut Project> {
        self.projects.iter_mut().find(|p| p.id == id)
    }

    /// Finds a project by id, or by name among the given creator's projects
    pub fn find_project(&self, key: &str, created_by: Option<&str>) -> Option<&Project> {
        self.get_project(key).or_else(|| {
            self.projects.iter().find(|p| {
                same_project_name(&p.name, key)
                    && created_by.map_or(true, |u| p.created_by == u)
            })
        })
    }

    pub fn projects_by(&self, username: &str) -> Vec<&Project> {
        self.projects
            .iter()
            .filter(|p| p.created_by == username)
            .collect()
    }

    /// Case-insensitive name clash among one creator's projects
    pub fn has_project_named(&self, created_by: &str, name: &str) -> bool {
        self.projects
            .iter()
            .any(|p| p.created_by == created_by && same_project_name(&p.name, name))
    }

    pub fn add_project(&mut self, project: Project) {
        self.projects.push(project);
    }

    pub fn update_project(&mut self, id: &str, update: ProjectUpdate) -> bool {
        match self.get_project_mut(id) {
            Some(project) => {
                update.apply(project);
                true
            }
            None => false,
        }
    }

    pub fn delete_project(&mut self, id: &str) -> bool {
        let before = self.projects.len();
        self.projects.retain(|p| p.id != id);
        self.projects.len() != before
    }
}

impl Default for AppData {
    fn default() -> Self {
        Self::new()
    }
}
