use anyhow::Result;
use inquire::{Confirm, Editor, Password, Select, Text};
use std::fmt;

use regress_core::{AppData, ScriptDraft, TestEnvironment, TestType};

/// Prompts for whichever login fields were not given on the command line
pub fn prompt_login(username: Option<String>, password: Option<String>) -> Result<(String, String)> {
    let username = match username {
        Some(u) => u,
        None => Text::new("Username:").prompt()?,
    };
    let password = match password {
        Some(p) => p,
        None => Password::new("Password:").without_confirmation().prompt()?,
    };
    Ok((username, password))
}

/// Asks a yes/no question, defaulting to no
pub fn confirm(message: &str) -> Result<bool> {
    Ok(Confirm::new(message).with_default(false).prompt()?)
}

/// A selectable subfolder; only the path is shown, the id travels along
#[derive(Debug, Clone, PartialEq, Eq)]
struct SubfolderChoice {
    id: String,
    path: String,
}

impl fmt::Display for SubfolderChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}

fn subfolder_choices(data: &AppData) -> Vec<SubfolderChoice> {
    data.subfolder_options()
        .into_iter()
        .map(|(id, path)| SubfolderChoice { id, path })
        .collect()
}

/// Prompts the user for a new script
pub fn prompt_new_script(data: &AppData) -> Result<ScriptDraft> {
    let choices = subfolder_choices(data);
    if choices.is_empty() {
        anyhow::bail!("No subfolders exist yet. Create one with `regress folder add --parent`.");
    }

    let subfolder_id = Select::new("Subfolder:", choices).prompt()?.id;

    let script_id = Text::new("Script ID:").prompt()?;
    let short_description = Text::new("Short description:").prompt()?;

    let mut draft = ScriptDraft::new(script_id, short_description, subfolder_id);

    draft.test_environment = Select::new(
        "Test environment:",
        vec![
            TestEnvironment::Online,
            TestEnvironment::Batch,
            TestEnvironment::OnlineAndBatch,
        ],
    )
    .prompt()?;
    draft.test_type = Select::new("Test type:", vec![TestType::Positive, TestType::Negative]).prompt()?;

    draft.purpose = Text::new("Purpose:").prompt()?;

    // One assumption per line; blank lines are dropped when saving
    let assumptions = Editor::new("Assumptions (one per line):").prompt()?;
    draft.assumptions = assumptions.lines().map(str::to_string).collect();

    draft.expected_results = Editor::new("Expected results:").prompt()?;
    draft.script_details = Editor::new("Script details:").prompt()?;

    Ok(draft)
}

/// Opens the details text in an editor, pre-filled with the current value
pub fn prompt_edit_details(current: &str) -> Result<String> {
    Ok(Editor::new("Script details:")
        .with_predefined_text(current)
        .prompt()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use regress_core::Folder;

    #[test]
    fn test_subfolder_choices_keep_ids_for_duplicate_paths() {
        let mut data = AppData::new();
        let root = Folder::new("Payments", None);
        let first = Folder::new("Cards", Some(root.id.clone()));
        let second = Folder::new("Cards", Some(root.id.clone()));
        data.add_folder(root);
        data.add_folder(first.clone());
        data.add_folder(second.clone());

        let choices = subfolder_choices(&data);
        assert_eq!(choices.len(), 2);
        assert_eq!(choices[0].to_string(), "Payments > Cards");
        assert_eq!(choices[1].to_string(), "Payments > Cards");
        assert_eq!(choices[0].id, first.id);
        assert_eq!(choices[1].id, second.id);
    }
}
