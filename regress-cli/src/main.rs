mod cli;
mod prompts;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::Parser;
use colored::{ColoredString, Colorize};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use regress_core::db::{create_backend, export_to_json, import_from_json, migrate};
use regress_core::screenshot::screenshot_from_file;
use regress_core::table_markup::{self, Segment, TableGrid};
use regress_core::workflow::{self, ExecutionNotes, IssueTarget, ScriptDraft};
use regress_core::{
    get_config_path, require_session, AppData, BackendType, Config, DocumentBackend,
    ExecutionStatus, FolderUpdate, ImportedScript, IssueStatus, Project, Screenshot, ScriptUpdate,
    Session, StoreError, TestEnvironment, TestType,
};

use crate::cli::{
    AdminProjectsCommand, Cli, Command, DbCommand, FolderCommand, ImportCommand, IssueCommand,
    LabCommand, ProjectCommand, ScreenshotCommand, ScriptCommand, TableCommand,
};

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run(cli).map_err(explain)
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load_or_default(get_config_path()?)?;
    let backend = config.open_backend(cli.data.as_deref())?;
    let store = backend.as_ref();

    match cli.command {
        Command::Login { username, password } => {
            login(store, username, password)?;
        }
        Command::Logout => {
            store.logout()?;
            println!("{}", "Logged out.".green());
        }
        Command::Whoami => {
            whoami(store);
        }
        Command::Folder(cmd) => {
            admin_session(store)?;
            handle_folder_command(cmd, store)?;
        }
        Command::Script(cmd) => {
            admin_session(store)?;
            handle_script_command(cmd, store)?;
        }
        Command::Projects(cmd) => {
            admin_session(store)?;
            handle_admin_projects_command(cmd, store)?;
        }
        Command::Project(cmd) => {
            let session = session(store)?;
            handle_project_command(cmd, store, &session)?;
        }
        Command::Import(cmd) => {
            let session = session(store)?;
            handle_import_command(cmd, store, &session)?;
        }
        Command::Lab(cmd) => {
            let session = session(store)?;
            handle_lab_command(cmd, store, &session)?;
        }
        Command::Issue(cmd) => {
            let session = session(store)?;
            handle_issue_command(cmd, store, &session)?;
        }
        Command::Db(cmd) => {
            handle_db_command(cmd, store, &config)?;
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("REGRESS_LOG").unwrap_or_else(|_| EnvFilter::new("regress=warn"));

    let format = env::var("REGRESS_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// Adds a hint for the error kinds a user can act on
fn explain(err: anyhow::Error) -> anyhow::Error {
    tracing::debug!(error = ?err, "command failed");
    let hint = match err.downcast_ref::<StoreError>() {
        Some(e) if e.is_storage() => Some("Changes were not saved"),
        Some(StoreError::NotFound { .. }) => Some("Use the matching `list` command to find valid ids"),
        _ => None,
    };
    match hint {
        Some(hint) => err.context(hint),
        None => err,
    }
}

// =========================================================================
// Session
// =========================================================================

fn session(store: &dyn DocumentBackend) -> Result<Session> {
    Ok(require_session(store.current_session())?)
}

fn admin_session(store: &dyn DocumentBackend) -> Result<Session> {
    let session = session(store)?;
    session.require_admin()?;
    Ok(session)
}

fn login(store: &dyn DocumentBackend, username: Option<String>, password: Option<String>) -> Result<()> {
    let (username, password) = crate::prompts::prompt_login(username, password)?;

    match store.authenticate(&username, &password)? {
        Some(user) => {
            println!(
                "{} Logged in as {} ({})",
                "✓".green(),
                user.username.bold(),
                user.user_type
            );
            Ok(())
        }
        None => anyhow::bail!("Invalid username or password"),
    }
}

fn whoami(store: &dyn DocumentBackend) {
    match store.current_session() {
        Some(session) => println!(
            "{} ({}), logged in {}",
            session.username().bold(),
            session.user.user_type,
            format_time(&session.logged_in_at)
        ),
        None => println!("{}", "Not logged in.".yellow()),
    }
}

// =========================================================================
// Lookup and formatting helpers
// =========================================================================

fn format_time(time: &DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn resolve_script(data: &AppData, key: &str) -> Result<String> {
    data.find_script(key)
        .map(|s| s.id.clone())
        .ok_or_else(|| StoreError::not_found("Script", key).into())
}

/// A project owned by the session user, by id or name
fn own_project(data: &AppData, session: &Session, key: &str) -> Result<Project> {
    data.find_project(key, Some(session.username()))
        .filter(|p| p.created_by == session.username())
        .cloned()
        .ok_or_else(|| StoreError::not_found("Project", key).into())
}

fn resolve_imported<'a>(project: &'a Project, key: &str) -> Result<&'a ImportedScript> {
    project
        .imported_scripts
        .iter()
        .find(|s| s.id() == key || s.script.script_id == key)
        .ok_or_else(|| StoreError::not_found("Imported script", key).into())
}

fn resolve_issue(project: &Project, key: &str) -> Result<String> {
    project
        .find_issue(key)
        .map(|i| i.id.clone())
        .ok_or_else(|| StoreError::not_found("Issue", key).into())
}

fn load_screenshots(paths: &[PathBuf]) -> Result<Vec<Screenshot>> {
    paths
        .iter()
        .map(|p| screenshot_from_file(p, None).map_err(anyhow::Error::from))
        .collect()
}

fn status_label(status: ExecutionStatus) -> ColoredString {
    match status {
        ExecutionStatus::Pending => "Pending".yellow(),
        ExecutionStatus::Completed => "Completed".green(),
        ExecutionStatus::Issues => "Issues".red(),
    }
}

fn issue_status_label(status: IssueStatus) -> ColoredString {
    match status {
        IssueStatus::Open => "Open".red(),
        IssueStatus::Fixed => "Fixed".green(),
        IssueStatus::Reopened => "Reopened".yellow(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut)
}

fn print_table(rows: &TableGrid) {
    let width = table_markup::display_width(rows);
    let mut widths = vec![1; width];
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(width) {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let border = format!("+{}+", widths.iter().map(|w| "-".repeat(w + 2)).collect::<Vec<_>>().join("+"));
    println!("{}", border);
    for row in rows {
        let cells: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, w)| format!(" {:<w$} ", row.get(i).map(String::as_str).unwrap_or(""), w = *w))
            .collect();
        println!("|{}|", cells.join("|"));
    }
    println!("{}", border);
}

/// Prints free text with its embedded tables drawn as grids
fn print_details(text: &str) {
    if text.trim().is_empty() {
        println!("  {}", "(none)".dimmed());
        return;
    }
    for segment in table_markup::render(text, false) {
        match segment {
            Segment::Text(part) => println!("{}", part.trim_matches('\n')),
            Segment::Table { id, rows, .. } => {
                println!("{}", format!("[table {}]", id).dimmed());
                print_table(&rows);
            }
            Segment::Corrupted { id, raw, error } => {
                println!("{} table {} could not be read: {}", "!".yellow(), id, error);
                println!("{}", raw.dimmed());
            }
        }
    }
}

fn print_screenshots(label: &str, screenshots: &[Screenshot]) {
    if screenshots.is_empty() {
        return;
    }
    println!("\n{}:", label.green());
    for shot in screenshots {
        if shot.description.is_empty() {
            println!("  - {}", shot.file_name);
        } else {
            println!("  - {} ({})", shot.file_name, shot.description);
        }
    }
}

// =========================================================================
// Folders
// =========================================================================

fn handle_folder_command(cmd: FolderCommand, store: &dyn DocumentBackend) -> Result<()> {
    match cmd {
        FolderCommand::Add { name, parent } => {
            let folder = workflow::create_folder(store, &name, parent.as_deref())?;
            println!(
                "{} Folder '{}' created ({})",
                "✓".green(),
                folder.name,
                folder.id.dimmed()
            );
        }
        FolderCommand::List => {
            let data = store.load();
            if data.folders.is_empty() {
                println!("{}", "No folders found.".yellow());
                return Ok(());
            }

            for root in data.root_folders() {
                println!("{} {}", root.name.bold(), root.id.dimmed());
                for sub in data.subfolders(&root.id) {
                    let count = data.filter_scripts(Some(&sub.id), None).len();
                    println!("  └─ {} {} ({} scripts)", sub.name, sub.id.dimmed(), count);
                }
            }

            let orphans: Vec<_> = data
                .folders
                .iter()
                .filter(|f| matches!(&f.parent_id, Some(p) if data.get_folder(p).is_none()))
                .collect();
            if !orphans.is_empty() {
                println!("{}", "(parent missing)".yellow());
                for folder in orphans {
                    println!("  └─ {} {}", folder.name, folder.id.dimmed());
                }
            }
        }
        FolderCommand::Rename {
            id,
            name,
            parent,
            root,
        } => {
            let parent_id = if root { Some(None) } else { parent.map(Some) };
            if name.is_none() && parent_id.is_none() {
                anyhow::bail!("Nothing to change. Use --name, --parent or --root.");
            }
            workflow::edit_folder(store, &id, FolderUpdate { name, parent_id })?;
            println!("{} Folder updated.", "✓".green());
            println!(
                "{}",
                "Scripts keep the folder path they were saved with.".dimmed()
            );
        }
        FolderCommand::Delete { id, yes } => {
            let data = store.load();
            let folder = data
                .get_folder(&id)
                .ok_or_else(|| StoreError::not_found("Folder", id.as_str()))?;
            let children = data.subfolders(&id).len();

            if !yes {
                let message = if children > 0 {
                    format!(
                        "Delete folder '{}' and its {} subfolder(s)?",
                        folder.name, children
                    )
                } else {
                    format!("Delete folder '{}'?", folder.name)
                };
                if !crate::prompts::confirm(&message)? {
                    println!("Deletion cancelled.");
                    return Ok(());
                }
            }

            store.delete_folder(&id)?;
            println!("{} Folder deleted.", "✓".green());
        }
    }

    Ok(())
}

// =========================================================================
// Scripts
// =========================================================================

fn handle_script_command(cmd: ScriptCommand, store: &dyn DocumentBackend) -> Result<()> {
    match cmd {
        ScriptCommand::Add {
            script_id,
            description,
            subfolder,
            environment,
            test_type,
            purpose,
            assumptions,
            expected,
            details,
            screenshots,
            interactive,
        } => {
            // Default to interactive mode if none of the required fields are given
            let should_be_interactive =
                interactive || (script_id.is_none() && description.is_none() && subfolder.is_none());

            let draft = if should_be_interactive {
                crate::prompts::prompt_new_script(&store.load())?
            } else {
                let subfolder = subfolder.context("Please select a valid subfolder (--subfolder)")?;
                let mut draft = ScriptDraft::new(
                    script_id.unwrap_or_default(),
                    description.unwrap_or_default(),
                    subfolder,
                );
                if let Some(env) = environment {
                    draft.test_environment = env.parse::<TestEnvironment>()?;
                }
                if let Some(tt) = test_type {
                    draft.test_type = tt.parse::<TestType>()?;
                }
                draft.purpose = purpose.unwrap_or_default();
                draft.assumptions = assumptions;
                draft.expected_results = expected.unwrap_or_default();
                draft.script_details = details.unwrap_or_default();
                draft.screenshots = load_screenshots(&screenshots)?;
                draft
            };

            let script = workflow::create_script(store, draft)?;
            println!("{}", "Script added successfully!".green());
            println!("ID: {}", script.id);
            println!("Script ID: {}", script.script_id.green());
            println!("Folder: {}", script.folder_path);
        }
        ScriptCommand::List { subfolder, search } => {
            let data = store.load();
            let scripts = data.filter_scripts(subfolder.as_deref(), search.as_deref());

            if scripts.is_empty() {
                println!("{}", "No scripts found.".yellow());
                return Ok(());
            }

            println!(
                "{:<14} | {:<12} | {:<36} | {:<28} | {:<14} | {:<8}",
                "ID", "Script ID", "Description", "Folder", "Environment", "Type"
            );
            println!("{}", "-".repeat(126));

            for script in scripts {
                println!(
                    "{:<14} | {:<12} | {:<36} | {:<28} | {:<14} | {:<8}",
                    script.id,
                    truncate(&script.script_id, 12),
                    truncate(&script.short_description, 36),
                    truncate(&script.folder_path, 28),
                    script.test_environment.to_string(),
                    script.test_type.to_string()
                );
            }
        }
        ScriptCommand::Show { script } => {
            let data = store.load();
            let id = resolve_script(&data, &script)?;
            let Some(script) = data.get_script(&id) else {
                return Err(StoreError::not_found("Script", id).into());
            };

            println!("{} {}", script.script_id.bold(), script.short_description);
            println!("ID: {}", script.id.dimmed());

            let live = data.resolve_folder_path(&script.subfolder_id);
            match live {
                Some(path) if path != script.folder_path => {
                    println!("Folder: {} {}", script.folder_path, format!("(now {})", path).yellow())
                }
                _ => println!("Folder: {}", script.folder_path),
            }

            println!("Environment: {}", script.test_environment);
            println!("Type: {}", script.test_type);
            println!("Created: {}", format_time(&script.created_at));

            println!("\n{}:", "Purpose".green());
            println!("{}", script.purpose);

            if !script.assumptions.is_empty() {
                println!("\n{}:", "Assumptions".green());
                for assumption in &script.assumptions {
                    println!("  - {}", assumption);
                }
            }

            println!("\n{}:", "Expected results".green());
            println!("{}", script.expected_results);

            println!("\n{}:", "Script details".green());
            print_details(&script.script_details);

            print_screenshots("Screenshots", &script.screenshots);
        }
        ScriptCommand::Edit {
            script,
            script_id,
            description,
            subfolder,
            environment,
            test_type,
            purpose,
            assumptions,
            expected,
            details,
            edit_details,
        } => {
            let data = store.load();
            let id = resolve_script(&data, &script)?;

            let details = if edit_details {
                let current = data
                    .get_script(&id)
                    .map(|s| s.script_details.clone())
                    .unwrap_or_default();
                Some(crate::prompts::prompt_edit_details(&current)?)
            } else {
                details
            };

            let update = ScriptUpdate {
                script_id,
                short_description: description,
                subfolder_id: subfolder,
                test_environment: environment.map(|e| e.parse::<TestEnvironment>()).transpose()?,
                test_type: test_type.map(|t| t.parse::<TestType>()).transpose()?,
                purpose,
                assumptions: (!assumptions.is_empty()).then_some(assumptions),
                expected_results: expected,
                script_details: details,
                ..Default::default()
            };

            workflow::edit_script(store, &id, update)?;
            println!("{}", "Script updated successfully!".green());
        }
        ScriptCommand::Delete { script, yes } => {
            let data = store.load();
            let id = resolve_script(&data, &script)?;

            if !yes && !crate::prompts::confirm(&format!("Delete script '{}'?", script))? {
                println!("Deletion cancelled.");
                return Ok(());
            }

            store.delete_script(&id)?;
            println!("{}", "Script deleted successfully!".green());
        }
        ScriptCommand::Table(table_cmd) => {
            handle_table_command(table_cmd, store)?;
        }
        ScriptCommand::Screenshot(ScreenshotCommand::Add {
            script,
            file,
            description,
        }) => {
            let id = resolve_script(&store.load(), &script)?;
            let screenshot = screenshot_from_file(&file, description.as_deref())?;
            let name = screenshot.file_name.clone();
            workflow::add_script_screenshot(store, &id, screenshot)?;
            println!("{} Attached {}", "✓".green(), name);
        }
    }

    Ok(())
}

/// Parses `ROW,COL=VALUE`
fn parse_cell_edit(edit: &str) -> Result<(usize, usize, String)> {
    let (coords, value) = edit
        .split_once('=')
        .with_context(|| format!("Invalid cell edit '{}', expected ROW,COL=VALUE", edit))?;
    let (row, col) = coords
        .split_once(',')
        .with_context(|| format!("Invalid cell position '{}', expected ROW,COL", coords))?;
    let row = row.trim().parse().with_context(|| format!("Invalid row '{}'", row))?;
    let col = col.trim().parse().with_context(|| format!("Invalid column '{}'", col))?;
    Ok((row, col, value.to_string()))
}

fn handle_table_command(cmd: TableCommand, store: &dyn DocumentBackend) -> Result<()> {
    match cmd {
        TableCommand::Insert {
            script,
            rows,
            columns,
            offset,
            headers,
        } => {
            let data = store.load();
            let id = resolve_script(&data, &script)?;
            let end = data
                .get_script(&id)
                .map_or(0, |s| s.script_details.chars().count());

            let table_id = workflow::insert_script_table(
                store,
                &id,
                offset.unwrap_or(end),
                rows,
                columns,
                headers,
            )?;
            println!(
                "{} Inserted {}x{} table {}",
                "✓".green(),
                rows,
                columns,
                table_id.bold()
            );
        }
        TableCommand::Update {
            script,
            table,
            cells,
            add_row,
            add_column,
            remove_row,
            remove_column,
        } => {
            let id = resolve_script(&store.load(), &script)?;
            let edits = cells
                .iter()
                .map(|c| parse_cell_edit(c))
                .collect::<Result<Vec<_>>>()?;

            let grid = workflow::edit_script_table(store, &id, &table, |grid| {
                if let Some(index) = remove_row {
                    if !table_markup::remove_row(grid, index) {
                        return Err(StoreError::validation(format!("Cannot remove row {}", index)));
                    }
                }
                if let Some(index) = remove_column {
                    if !table_markup::remove_column(grid, index) {
                        return Err(StoreError::validation(format!(
                            "Cannot remove column {}",
                            index
                        )));
                    }
                }
                if add_row {
                    table_markup::add_row(grid);
                }
                if add_column {
                    table_markup::add_column(grid);
                }
                for (row, col, value) in edits {
                    if !table_markup::set_cell(grid, row, col, value) {
                        return Err(StoreError::validation(format!(
                            "Cell {},{} is outside the table",
                            row, col
                        )));
                    }
                }
                Ok(())
            })?;

            println!("{} Table {} updated", "✓".green(), table.bold());
            print_table(&grid);
        }
        TableCommand::Remove { script, table } => {
            let id = resolve_script(&store.load(), &script)?;
            workflow::remove_script_table(store, &id, &table)?;
            println!("{} Table {} removed", "✓".green(), table);
        }
        TableCommand::Show { script } => {
            let data = store.load();
            let id = resolve_script(&data, &script)?;
            let details = data
                .get_script(&id)
                .map(|s| s.script_details.as_str())
                .unwrap_or_default();

            let tables = table_markup::parse_tables(details);
            if tables.is_empty() {
                println!("{}", "No tables found.".yellow());
                return Ok(());
            }
            for table in tables {
                println!("{}", table.id.bold());
                match table.grid {
                    Ok(rows) => print_table(&rows),
                    Err(e) => println!("  {} {}", "corrupted:".red(), e),
                }
            }
        }
    }

    Ok(())
}

// =========================================================================
// Projects
// =========================================================================

fn print_project_rows(projects: &[&Project], with_owner: bool) {
    if with_owner {
        println!(
            "{:<14} | {:<24} | {:<10} | {:>7} | {:>9} | {:>11} | {:>8}",
            "ID", "Name", "Owner", "Scripts", "Completed", "Open issues", "Progress"
        );
    } else {
        println!(
            "{:<14} | {:<24} | {:>7} | {:>9} | {:>11} | {:>8}",
            "ID", "Name", "Scripts", "Completed", "Open issues", "Progress"
        );
    }
    println!("{}", "-".repeat(if with_owner { 104 } else { 91 }));

    for project in projects {
        let stats = project.stats();
        let progress = format!("{}%", stats.progress_percent());
        if with_owner {
            println!(
                "{:<14} | {:<24} | {:<10} | {:>7} | {:>9} | {:>11} | {:>8}",
                project.id,
                truncate(&project.name, 24),
                truncate(&project.created_by, 10),
                stats.total_scripts,
                stats.completed_scripts,
                stats.open_issues,
                progress
            );
        } else {
            println!(
                "{:<14} | {:<24} | {:>7} | {:>9} | {:>11} | {:>8}",
                project.id,
                truncate(&project.name, 24),
                stats.total_scripts,
                stats.completed_scripts,
                stats.open_issues,
                progress
            );
        }
    }
}

fn handle_admin_projects_command(cmd: AdminProjectsCommand, store: &dyn DocumentBackend) -> Result<()> {
    match cmd {
        AdminProjectsCommand::List => {
            let data = store.load();
            if data.projects.is_empty() {
                println!("{}", "No projects found.".yellow());
                return Ok(());
            }
            let projects: Vec<&Project> = data.projects.iter().collect();
            print_project_rows(&projects, true);
        }
        AdminProjectsCommand::Delete { project, yes } => {
            let data = store.load();
            let found = data
                .find_project(&project, None)
                .ok_or_else(|| StoreError::not_found("Project", project.as_str()))?;

            if !yes
                && !crate::prompts::confirm(&format!(
                    "Delete project '{}' owned by {}?",
                    found.name, found.created_by
                ))?
            {
                println!("Deletion cancelled.");
                return Ok(());
            }

            store.delete_project(&found.id)?;
            println!("{} Project '{}' deleted.", "✓".green(), found.name);
        }
    }

    Ok(())
}

fn handle_project_command(cmd: ProjectCommand, store: &dyn DocumentBackend, session: &Session) -> Result<()> {
    match cmd {
        ProjectCommand::Create { name } => {
            let project = workflow::create_project(store, session, &name)?;
            println!(
                "{} Project '{}' created ({})",
                "✓".green(),
                project.name,
                project.id.dimmed()
            );
        }
        ProjectCommand::List => {
            let data = store.load();
            let projects = data.projects_by(session.username());
            if projects.is_empty() {
                println!("{}", "No projects found. Create one with `regress project create`.".yellow());
                return Ok(());
            }
            print_project_rows(&projects, false);
        }
        ProjectCommand::Show { project } => {
            let data = store.load();
            let project = own_project(&data, session, &project)?;
            let stats = project.stats();

            println!("{}", project.name.bold());
            println!("ID: {}", project.id.dimmed());
            println!("Created: {}", format_time(&project.created_at));
            println!(
                "Progress: {}% ({} of {} completed)",
                stats.progress_percent(),
                stats.completed_scripts,
                stats.total_scripts
            );
            println!(
                "Scripts: {} pending, {} completed, {} with issues",
                stats.pending_scripts, stats.completed_scripts, stats.issue_scripts
            );
            println!("Issues: {} total, {} open", stats.total_issues, stats.open_issues);
        }
    }

    Ok(())
}

fn handle_import_command(cmd: ImportCommand, store: &dyn DocumentBackend, session: &Session) -> Result<()> {
    match cmd {
        ImportCommand::List {
            project,
            subfolder,
            search,
        } => {
            let data = store.load();
            let project = own_project(&data, session, &project)?;
            let scripts = data.filter_scripts(subfolder.as_deref(), search.as_deref());

            if scripts.is_empty() {
                println!("{}", "No scripts found.".yellow());
                return Ok(());
            }

            for script in scripts {
                let marker = if project.is_imported(&script.id) {
                    "imported".green()
                } else {
                    "".normal()
                };
                println!(
                    "{:<14} | {:<12} | {:<36} | {:<28} | {}",
                    script.id,
                    truncate(&script.script_id, 12),
                    truncate(&script.short_description, 36),
                    truncate(&script.folder_path, 28),
                    marker
                );
            }
        }
        ImportCommand::Add { project, scripts } => {
            let data = store.load();
            let project = own_project(&data, session, &project)?;

            let mut imported = 0;
            for key in &scripts {
                let id = resolve_script(&data, key)?;
                match workflow::import_script(store, &project.id, &id) {
                    Ok(script) => {
                        imported += 1;
                        println!("{} Imported {}", "✓".green(), script.script.script_id);
                    }
                    Err(StoreError::Validation(msg)) => println!("{} {}", "!".yellow(), msg),
                    Err(e) => return Err(e.into()),
                }
            }
            println!("{} script(s) imported into '{}'.", imported, project.name);
        }
    }

    Ok(())
}

// =========================================================================
// Test lab
// =========================================================================

/// Keeps the stored remarks unless new ones are given; new screenshots are
/// appended to the stored ones
fn execution_notes(
    imported: &ImportedScript,
    remarks: Option<String>,
    screenshots: &[PathBuf],
) -> Result<ExecutionNotes> {
    let mut all = imported.additional_screenshots.clone();
    all.extend(load_screenshots(screenshots)?);
    Ok(ExecutionNotes {
        remarks: remarks.or_else(|| imported.remarks.clone()),
        screenshots: all,
    })
}

fn handle_lab_command(cmd: LabCommand, store: &dyn DocumentBackend, session: &Session) -> Result<()> {
    let data = store.load();

    match cmd {
        LabCommand::List { project, status } => {
            let project = own_project(&data, session, &project)?;
            let status = status.map(|s| s.parse::<ExecutionStatus>()).transpose()?;
            let scripts = project.scripts_with_status(status);

            if scripts.is_empty() {
                println!("{}", "No scripts found.".yellow());
                return Ok(());
            }

            println!(
                "{:<14} | {:<12} | {:<36} | {:<10} | {:<16}",
                "ID", "Script ID", "Description", "Status", "Executed"
            );
            println!("{}", "-".repeat(100));
            for imported in scripts {
                let executed = imported
                    .execution_date
                    .as_ref()
                    .map(format_time)
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<14} | {:<12} | {:<36} | {:<10} | {:<16}",
                    imported.id(),
                    truncate(&imported.script.script_id, 12),
                    truncate(&imported.script.short_description, 36),
                    status_label(imported.status),
                    executed
                );
            }
        }
        LabCommand::Show { project, script } => {
            let project = own_project(&data, session, &project)?;
            let imported = resolve_imported(&project, &script)?;
            let script = &imported.script;

            println!("{} {}", script.script_id.bold(), script.short_description);
            println!("Status: {}", status_label(imported.status));
            if let Some(date) = &imported.execution_date {
                println!("Executed: {}", format_time(date));
            }
            println!("Folder: {}", script.folder_path);
            println!("Environment: {}", script.test_environment);
            println!("Type: {}", script.test_type);

            println!("\n{}:", "Purpose".green());
            println!("{}", script.purpose);
            if !script.assumptions.is_empty() {
                println!("\n{}:", "Assumptions".green());
                for assumption in &script.assumptions {
                    println!("  - {}", assumption);
                }
            }
            println!("\n{}:", "Expected results".green());
            println!("{}", script.expected_results);
            println!("\n{}:", "Script details".green());
            print_details(&script.script_details);
            print_screenshots("Screenshots", &script.screenshots);

            if let Some(remarks) = &imported.remarks {
                println!("\n{}:", "Remarks".green());
                println!("{}", remarks);
            }
            print_screenshots("Execution screenshots", &imported.additional_screenshots);

            let issues = project.issues_for_script(imported.id());
            if !issues.is_empty() {
                println!("\n{}:", "Issues".green());
                for issue in issues {
                    println!(
                        "  #{} {} [{}]",
                        issue.issue_number,
                        issue.title,
                        issue_status_label(issue.status)
                    );
                }
            }
        }
        LabCommand::Complete {
            project,
            script,
            remarks,
            screenshots,
        } => {
            let project = own_project(&data, session, &project)?;
            let imported = resolve_imported(&project, &script)?;
            let notes = execution_notes(imported, remarks, &screenshots)?;

            workflow::complete_execution(store, &project.id, imported.id(), notes)?;
            println!(
                "{} {} marked as completed",
                "✓".green(),
                imported.script.script_id
            );
        }
        LabCommand::Issue {
            project,
            script,
            title,
            description,
            issue_screenshot,
            existing,
            remarks,
            screenshots,
        } => {
            let project = own_project(&data, session, &project)?;
            let imported = resolve_imported(&project, &script)?;
            let notes = execution_notes(imported, remarks, &screenshots)?;

            let target = match existing {
                Some(key) => IssueTarget::Existing(resolve_issue(&project, &key)?),
                None => IssueTarget::New {
                    title: title.unwrap_or_default(),
                    description: description.unwrap_or_default(),
                    screenshot: issue_screenshot
                        .map(|p| screenshot_from_file(&p, None))
                        .transpose()?,
                },
            };

            let issue = workflow::raise_issue(store, &project.id, imported.id(), target, notes)?;
            println!(
                "{} Issue #{} '{}' linked to {}",
                "✓".green(),
                issue.issue_number,
                issue.title,
                imported.script.script_id
            );
        }
        LabCommand::Save {
            project,
            script,
            remarks,
            screenshots,
        } => {
            let project = own_project(&data, session, &project)?;
            let imported = resolve_imported(&project, &script)?;
            let notes = execution_notes(imported, remarks, &screenshots)?;

            workflow::save_execution(store, &project.id, imported.id(), notes)?;
            println!("{} Progress saved", "✓".green());
        }
    }

    Ok(())
}

// =========================================================================
// Issue log
// =========================================================================

fn handle_issue_command(cmd: IssueCommand, store: &dyn DocumentBackend, session: &Session) -> Result<()> {
    let data = store.load();

    match cmd {
        IssueCommand::List { project, status } => {
            let project = own_project(&data, session, &project)?;
            let status = status.map(|s| s.parse::<IssueStatus>()).transpose()?;
            let issues: Vec<_> = project
                .issues
                .iter()
                .filter(|i| status.map_or(true, |st| i.status == st))
                .collect();

            if issues.is_empty() {
                println!("{}", "No issues found.".yellow());
                return Ok(());
            }

            println!(
                "{:<5} | {:<40} | {:<10} | {:>7} | {:<16}",
                "#", "Title", "Status", "Scripts", "Created"
            );
            println!("{}", "-".repeat(90));
            for issue in issues {
                println!(
                    "{:<5} | {:<40} | {:<10} | {:>7} | {:<16}",
                    format!("#{}", issue.issue_number),
                    truncate(&issue.title, 40),
                    issue_status_label(issue.status),
                    issue.linked_scripts.len(),
                    format_time(&issue.created_at)
                );
            }
        }
        IssueCommand::Show { project, issue } => {
            let project = own_project(&data, session, &project)?;
            let id = resolve_issue(&project, &issue)?;
            let Some(issue) = project.get_issue(&id) else {
                return Err(StoreError::not_found("Issue", id).into());
            };

            println!("#{} {}", issue.issue_number, issue.title.bold());
            println!("Status: {}", issue_status_label(issue.status));
            println!("Created: {}", format_time(&issue.created_at));
            if let Some(resolved) = &issue.resolved_at {
                println!("Resolved: {}", format_time(resolved));
            }
            if !issue.description.is_empty() {
                println!("\n{}:", "Description".green());
                println!("{}", issue.description);
            }
            if let Some(shot) = &issue.screenshot {
                println!("\n{}: {}", "Screenshot".green(), shot.file_name);
            }
            if let Some(resolution) = &issue.resolution {
                println!("\n{}:", "Resolution".green());
                println!("{}", resolution);
            }

            let scripts = project.scripts_for_issue(issue);
            if !scripts.is_empty() {
                println!("\n{}:", "Affected scripts".green());
                for script in scripts {
                    println!(
                        "  {} {} [{}]",
                        script.script.script_id,
                        script.script.short_description,
                        status_label(script.status)
                    );
                }
            }
        }
        IssueCommand::Fix {
            project,
            issue,
            resolution,
        } => {
            let project = own_project(&data, session, &project)?;
            let id = resolve_issue(&project, &issue)?;
            let resolution = resolution.or_else(|| project.get_issue(&id).and_then(|i| i.resolution.clone()));

            let issue = workflow::mark_issue_fixed(store, &project.id, &id, resolution)?;
            println!("{} Issue #{} marked as fixed", "✓".green(), issue.issue_number);
        }
        IssueCommand::Reopen {
            project,
            issue,
            resolution,
        } => {
            let project = own_project(&data, session, &project)?;
            let id = resolve_issue(&project, &issue)?;
            let resolution = resolution.or_else(|| project.get_issue(&id).and_then(|i| i.resolution.clone()));

            let issue = workflow::reopen_issue(store, &project.id, &id, resolution)?;
            println!("{} Issue #{} reopened", "✓".green(), issue.issue_number);
        }
        IssueCommand::Resolve {
            project,
            issue,
            resolution,
        } => {
            let project = own_project(&data, session, &project)?;
            let id = resolve_issue(&project, &issue)?;

            let issue = workflow::save_resolution(store, &project.id, &id, Some(resolution))?;
            println!("{} Resolution saved for issue #{}", "✓".green(), issue.issue_number);
        }
    }

    Ok(())
}

// =========================================================================
// Database
// =========================================================================

fn handle_db_command(cmd: DbCommand, store: &dyn DocumentBackend, config: &Config) -> Result<()> {
    match cmd {
        DbCommand::Path => {
            println!("{}", store.path().display());
        }
        DbCommand::Stats => {
            let stats = store.stats();
            println!("{}", "Store".blue().bold());
            println!("  Backend:  {}", stats.backend_type);
            println!("  Path:     {}", store.path().display());
            println!("  Folders:  {}", stats.folder_count);
            println!("  Scripts:  {}", stats.script_count);
            println!("  Projects: {}", stats.project_count);
            println!("  Issues:   {}", stats.issue_count);
            println!("  Size:     {} of {} bytes", stats.bytes, stats.quota_bytes);
        }
        DbCommand::Export { output } => {
            export_to_json(store, &output)?;
            println!("{} Exported to {}", "✓".green(), output.display());
        }
        DbCommand::Import { input, yes } => {
            admin_session(store)?;
            if !yes
                && !crate::prompts::confirm(&format!(
                    "Replace all stored data with the contents of {}?",
                    input.display()
                ))?
            {
                println!("Import cancelled.");
                return Ok(());
            }

            let data = import_from_json(store, &input)?;
            println!(
                "{} Imported {} folders, {} scripts, {} projects",
                "✓".green(),
                data.folders.len(),
                data.scripts.len(),
                data.projects.len()
            );
        }
        DbCommand::Migrate { to, backend } => {
            let backend_type = backend.map(|b| b.parse::<BackendType>()).transpose()?;
            let target = create_backend(&to, backend_type, config.quota_bytes)
                .with_context(|| format!("Failed to open target store at {:?}", to))?;

            let count = migrate(store, target.as_ref())?;
            println!(
                "{} Migrated {} scripts to {} ({})",
                "✓".green(),
                count,
                to.display(),
                target.backend_type()
            );
            println!(
                "Set data_path in {} to switch to it.",
                get_config_path()?.display()
            );
        }
    }

    Ok(())
}
