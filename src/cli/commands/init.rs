//! Init command implementation.
//!
//! The `convoy init` command writes a starter `convoy.yml` that replaces a
//! running container with a freshly pulled image on one placeholder host.

use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::args::InitArgs;
use crate::config::{starter_config, CONFIG_FILE};
use crate::error::{ConvoyError, Result};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};

/// The init command implementation.
pub struct InitCommand {
    project_root: PathBuf,
    args: InitArgs,
}

impl InitCommand {
    /// Create a new init command.
    pub fn new(project_root: &Path, args: InitArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            args,
        }
    }

    fn project_name(&self) -> String {
        self.project_root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("app")
            .to_string()
    }

    fn render(&self) -> Result<String> {
        let name = self.project_name();
        let image = self.args.image.clone().unwrap_or_else(|| name.clone());
        let config = starter_config(&name, &image, &self.args.account, &self.args.ports);
        let body = serde_yaml::to_string(&config).map_err(anyhow::Error::from)?;

        Ok(format!(
            "# convoy deployment for {name}\n\
             #\n\
             # Every host runs its steps in order. When a critical step fails,\n\
             # the steps that already succeeded on that host are undone in\n\
             # reverse order. Other hosts are not affected.\n\
             #\n\
             # Replace web1 with your own hosts, then preview with `convoy plan`.\n\
             \n{body}"
        ))
    }
}

impl Command for InitCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let path = self.project_root.join(CONFIG_FILE);
        if path.exists() && !self.args.force {
            ui.error(&format!("{} already exists", CONFIG_FILE));
            ui.show_hint("Use --force to overwrite it");
            return Ok(CommandResult::failure(1));
        }

        let content = self.render()?;
        fs::write(&path, content).map_err(ConvoyError::Io)?;

        ui.success(&format!("Created {}", CONFIG_FILE));
        ui.show_hint("Edit the hosts section, then run `convoy plan`");
        Ok(CommandResult::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_config_file, validate};
    use crate::ui::MockUI;
    use tempfile::TempDir;

    fn args(image: &str) -> InitArgs {
        InitArgs {
            image: Some(image.to_string()),
            account: "whazzmaster".to_string(),
            ports: "80:80".to_string(),
            force: false,
        }
    }

    #[test]
    fn writes_a_valid_deployment() {
        let temp = TempDir::new().unwrap();
        let mut ui = MockUI::new();

        let result = InitCommand::new(temp.path(), args("dockertest"))
            .execute(&mut ui)
            .unwrap();

        assert!(result.success);
        let path = temp.path().join("convoy.yml");
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# convoy deployment"));

        let config = load_config_file(&path).unwrap();
        validate(&config).unwrap();
        assert_eq!(config.vars["image"], "dockertest");
        assert_eq!(config.vars["account"], "whazzmaster");
    }

    #[test]
    fn refuses_to_overwrite() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("convoy.yml"), "hosts: {}\n").unwrap();
        let mut ui = MockUI::new();

        let result = InitCommand::new(temp.path(), args("dockertest"))
            .execute(&mut ui)
            .unwrap();

        assert_eq!(result.exit_code, 1);
        assert!(ui.has_error("already exists"));
        assert_eq!(
            fs::read_to_string(temp.path().join("convoy.yml")).unwrap(),
            "hosts: {}\n"
        );
    }

    #[test]
    fn force_overwrites() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("convoy.yml"), "hosts: {}\n").unwrap();
        let mut init = args("shop");
        init.force = true;

        InitCommand::new(temp.path(), init)
            .execute(&mut MockUI::new())
            .unwrap();

        let content = fs::read_to_string(temp.path().join("convoy.yml")).unwrap();
        assert!(content.contains("docker pull ${account}/${image}:${tag}"));
    }

    #[test]
    fn image_defaults_to_directory_name() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("storefront");
        fs::create_dir(&root).unwrap();

        InitCommand::new(&root, InitArgs::default())
            .execute(&mut MockUI::new())
            .unwrap();

        let config = load_config_file(&root.join("convoy.yml")).unwrap();
        assert_eq!(config.vars["image"], "storefront");
        assert_eq!(config.app_name.as_deref(), Some("storefront"));
    }
}
