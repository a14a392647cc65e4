//! Weft - Main Entry Point
//!
//! Loads settings, installs logging and dispatches the subcommand.

mod cli;
mod commands;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use weft_domain::{EditorSettings, Project, ProjectId};
use weft_infrastructure::{
    HttpStringStore, SettingsRepository, load_snapshot, load_valid_snapshot, save_snapshot,
};

use crate::cli::{Cli, Command};
use crate::commands::CommandError;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let repository = cli
        .settings
        .clone()
        .map_or_else(SettingsRepository::new, SettingsRepository::with_path);
    let (settings, settings_error) = match repository.load().await {
        Ok(settings) => (settings, None),
        Err(e) => (EditorSettings::default(), Some(e)),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Some(e) = settings_error {
        tracing::warn!(error = %e, "Could not load settings, using defaults");
    }

    match run(cli.command, &settings).await {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, settings: &EditorSettings) -> Result<String, CommandError> {
    match command {
        Command::Refs { text } => Ok(commands::refs(&text)),
        Command::Check { snapshot } => {
            let project = load_snapshot(&snapshot).await?;
            Ok(commands::check(&project).to_string())
        }
        Command::Spawns {
            snapshot,
            container,
        } => {
            let project = load_valid_snapshot(&snapshot).await?;
            commands::spawns(&project, &container)
        }
        Command::Render {
            snapshot,
            name,
            selections,
        } => {
            let project = load_valid_snapshot(&snapshot).await?;
            let result = commands::render(&project, &name, &selections, settings.max_render_depth)?;
            if !result.unresolved.is_empty() {
                tracing::warn!(names = ?result.unresolved, "Unresolved references left verbatim");
            }
            if result.truncated {
                tracing::warn!(depth = settings.max_render_depth, "Rendering stopped at the depth limit");
            }
            Ok(format!("{}\n", result.rendered))
        }
        Command::Create {
            snapshot,
            content,
            name,
            out,
        } => {
            let project = load_valid_snapshot(&snapshot).await?;
            let created = commands::create(project, &content, name.as_deref(), settings).await?;
            write_project(out.as_deref().unwrap_or(snapshot.as_path()), &created.project).await?;
            Ok(created.to_string())
        }
        Command::Fetch { project_id, out } => {
            let store = HttpStringStore::from_settings(settings).map_err(|e| CommandError::Application(e.into()))?;
            tracing::info!(url = %store.base_url(), project = project_id, "Fetching project");
            let project = commands::fetch(&store, ProjectId(project_id)).await?;
            if let Some(out) = out {
                write_project(&out, &project).await?;
            }
            Ok(commands::summary(&project))
        }
    }
}

async fn write_project(path: &Path, project: &Project) -> Result<(), CommandError> {
    save_snapshot(path, project).await?;
    tracing::info!(path = %path.display(), "Snapshot written");
    Ok(())
}
