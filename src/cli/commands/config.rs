//! Config command: show, edit, locate configuration.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use crate::error::{FinsightError, Result};

pub fn run_config(action: &ConfigAction, settings: Settings) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let content = toml::to_string_pretty(&settings)
                .map_err(|e| FinsightError::Config(e.to_string()))?;
            println!("{content}");
        }

        ConfigAction::Path => {
            println!("{}", Settings::default_config_path().display());
        }

        ConfigAction::Edit => {
            let path = Settings::default_config_path();
            if !path.exists() {
                // Materialize current (default) settings so there is
                // something to edit.
                settings.save_to(&path)?;
                Output::info(&format!("Created {}", path.display()));
            }

            let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
            let status = std::process::Command::new(&editor).arg(&path).status();

            match status {
                Ok(s) if s.success() => {}
                Ok(_) => {
                    return Err(FinsightError::Config(format!("{editor} exited with an error")))
                }
                Err(e) => {
                    return Err(FinsightError::Config(format!("failed to launch {editor}: {e}")))
                }
            }
        }
    }

    Ok(())
}
