use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Regression Assistant: test script library and test lab")]
pub struct Cli {
    /// Data directory, or a .db file for the SQLite backend
    #[clap(long, global = true)]
    pub data: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in with a username and password
    Login {
        #[clap(long, short = 'u')]
        username: Option<String>,

        #[clap(long)]
        password: Option<String>,
    },

    /// Log out of the current session
    Logout,

    /// Show who is logged in
    Whoami,

    /// Manage the folder tree (administrator)
    #[clap(subcommand)]
    Folder(FolderCommand),

    /// Manage the script library (administrator)
    #[clap(subcommand)]
    Script(ScriptCommand),

    /// Review every user's projects (administrator)
    #[clap(subcommand)]
    Projects(AdminProjectsCommand),

    /// Manage your own projects
    #[clap(subcommand)]
    Project(ProjectCommand),

    /// Import library scripts into a project
    #[clap(subcommand)]
    Import(ImportCommand),

    /// Execute imported scripts
    #[clap(subcommand)]
    Lab(LabCommand),

    /// Track the issues raised in a project
    #[clap(subcommand)]
    Issue(IssueCommand),

    /// Database management commands
    #[clap(subcommand)]
    Db(DbCommand),
}

#[derive(Subcommand, Debug)]
pub enum FolderCommand {
    /// Add a root folder, or a subfolder with --parent
    Add {
        /// Name of the folder
        name: String,

        /// Id of the root folder to nest under
        #[clap(long)]
        parent: Option<String>,
    },

    /// Show the folder tree
    List,

    /// Rename or move a folder
    Rename {
        /// Folder id
        id: String,

        /// New name
        #[clap(long)]
        name: Option<String>,

        /// Move under this root folder
        #[clap(long, conflicts_with = "root")]
        parent: Option<String>,

        /// Turn the folder into a root folder
        #[clap(long)]
        root: bool,
    },

    /// Delete a folder and its direct subfolders
    Delete {
        /// Folder id
        id: String,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ScriptCommand {
    /// Add a script to the library
    Add {
        /// Script label, e.g. TC-101
        #[clap(long)]
        script_id: Option<String>,

        /// Short description
        #[clap(long)]
        description: Option<String>,

        /// Subfolder id
        #[clap(long)]
        subfolder: Option<String>,

        /// Online, Batch or "Online & Batch"
        #[clap(long)]
        environment: Option<String>,

        /// Positive or Negative
        #[clap(long)]
        test_type: Option<String>,

        #[clap(long)]
        purpose: Option<String>,

        /// An assumption; repeat for several
        #[clap(long = "assumption")]
        assumptions: Vec<String>,

        #[clap(long)]
        expected: Option<String>,

        /// Script details text
        #[clap(long)]
        details: Option<String>,

        /// Image file to attach; repeat for several
        #[clap(long = "screenshot")]
        screenshots: Vec<PathBuf>,

        /// Use interactive mode (prompts)
        #[clap(long)]
        interactive: bool,
    },

    /// List scripts
    List {
        /// Only scripts in this subfolder
        #[clap(long)]
        subfolder: Option<String>,

        /// Case-insensitive search over label, description and folder path
        #[clap(long, short = 's')]
        search: Option<String>,
    },

    /// Show a script with its details and tables
    Show {
        /// Script id or label
        script: String,
    },

    /// Edit a script
    Edit {
        /// Script id or label
        script: String,

        #[clap(long)]
        script_id: Option<String>,

        #[clap(long)]
        description: Option<String>,

        /// Move to this subfolder
        #[clap(long)]
        subfolder: Option<String>,

        #[clap(long)]
        environment: Option<String>,

        #[clap(long)]
        test_type: Option<String>,

        #[clap(long)]
        purpose: Option<String>,

        /// Replaces all assumptions; repeat for several
        #[clap(long = "assumption")]
        assumptions: Vec<String>,

        #[clap(long)]
        expected: Option<String>,

        #[clap(long, conflicts_with = "edit_details")]
        details: Option<String>,

        /// Edit the details text in your editor
        #[clap(long)]
        edit_details: bool,
    },

    /// Delete a script from the library
    Delete {
        /// Script id or label
        script: String,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },

    /// Tables embedded in a script's details
    #[clap(subcommand)]
    Table(TableCommand),

    /// Screenshots attached to a script
    #[clap(subcommand)]
    Screenshot(ScreenshotCommand),
}

#[derive(Subcommand, Debug)]
pub enum TableCommand {
    /// Insert a blank table into the details text
    Insert {
        /// Script id or label
        script: String,

        #[clap(long, default_value = "3")]
        rows: usize,

        #[clap(long, default_value = "3")]
        columns: usize,

        /// Character offset to insert at (defaults to the end)
        #[clap(long)]
        offset: Option<usize>,

        /// Fill the first row with "Header N" labels
        #[clap(long)]
        headers: bool,
    },

    /// Change cells, rows or columns of a table
    Update {
        /// Script id or label
        script: String,

        /// Table id
        table: String,

        /// Set a cell: ROW,COL=VALUE (zero-based); repeat for several
        #[clap(long = "set")]
        cells: Vec<String>,

        /// Append an empty row
        #[clap(long)]
        add_row: bool,

        /// Append an empty column
        #[clap(long)]
        add_column: bool,

        /// Remove the row at this index
        #[clap(long)]
        remove_row: Option<usize>,

        /// Remove the column at this index
        #[clap(long)]
        remove_column: Option<usize>,
    },

    /// Remove a table from the details text
    Remove {
        /// Script id or label
        script: String,

        /// Table id
        table: String,
    },

    /// List the tables of a script
    Show {
        /// Script id or label
        script: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ScreenshotCommand {
    /// Attach an image file
    Add {
        /// Script id or label
        script: String,

        /// Image file
        file: PathBuf,

        #[clap(long)]
        description: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum AdminProjectsCommand {
    /// List all projects with progress
    List,

    /// Delete a project
    Delete {
        /// Project id or name
        project: String,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Create a project
    Create {
        /// Name of the project
        name: String,
    },

    /// List your projects
    List,

    /// Show a project overview
    Show {
        /// Project id or name
        project: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ImportCommand {
    /// List library scripts available for import
    List {
        /// Project id or name
        project: String,

        #[clap(long)]
        subfolder: Option<String>,

        #[clap(long, short = 's')]
        search: Option<String>,
    },

    /// Import scripts into a project
    Add {
        /// Project id or name
        project: String,

        /// Script ids or labels
        #[clap(required = true)]
        scripts: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum LabCommand {
    /// List imported scripts
    List {
        /// Project id or name
        project: String,

        /// Pending, Completed or Issues
        #[clap(long)]
        status: Option<String>,
    },

    /// Show an imported script with its execution record
    Show {
        /// Project id or name
        project: String,

        /// Script id or label
        script: String,
    },

    /// Mark a script as completed
    Complete {
        project: String,
        script: String,

        #[clap(long)]
        remarks: Option<String>,

        /// Execution screenshot; repeat for several
        #[clap(long = "screenshot")]
        screenshots: Vec<PathBuf>,
    },

    /// Raise an issue against a script
    Issue {
        project: String,
        script: String,

        /// Title of a new issue
        #[clap(long, required_unless_present = "existing")]
        title: Option<String>,

        /// Description of a new issue
        #[clap(long)]
        description: Option<String>,

        /// Screenshot for a new issue
        #[clap(long)]
        issue_screenshot: Option<PathBuf>,

        /// Link an existing issue (id or #number) instead
        #[clap(long, conflicts_with_all = ["title", "description", "issue_screenshot"])]
        existing: Option<String>,

        #[clap(long)]
        remarks: Option<String>,

        /// Execution screenshot; repeat for several
        #[clap(long = "screenshot")]
        screenshots: Vec<PathBuf>,
    },

    /// Save remarks and screenshots without changing the status
    Save {
        project: String,
        script: String,

        #[clap(long)]
        remarks: Option<String>,

        /// Execution screenshot; repeat for several
        #[clap(long = "screenshot")]
        screenshots: Vec<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum IssueCommand {
    /// List issues in a project
    List {
        /// Project id or name
        project: String,

        /// Open, Fixed or Reopened
        #[clap(long)]
        status: Option<String>,
    },

    /// Show an issue and the scripts it affects
    Show {
        project: String,

        /// Issue id or #number
        issue: String,
    },

    /// Mark an issue as fixed
    Fix {
        project: String,
        issue: String,

        #[clap(long)]
        resolution: Option<String>,
    },

    /// Reopen a fixed issue
    Reopen {
        project: String,
        issue: String,

        #[clap(long)]
        resolution: Option<String>,
    },

    /// Update the resolution notes only
    Resolve {
        project: String,
        issue: String,

        /// Resolution notes
        resolution: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum DbCommand {
    /// Print the path of the data store
    Path,

    /// Show counts and size of the stored data
    Stats,

    /// Write the aggregate to a JSON file
    Export {
        /// Output file
        output: PathBuf,
    },

    /// Replace the aggregate with the contents of a JSON file
    Import {
        /// Input file
        input: PathBuf,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },

    /// Copy the aggregate into another store
    Migrate {
        /// Target directory or .db file
        to: PathBuf,

        /// Target backend: file or sqlite (inferred from the path by default)
        #[clap(long)]
        backend: Option<String>,
    },
}
