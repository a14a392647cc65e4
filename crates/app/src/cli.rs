//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "weft")]
#[command(about = "Inspect and edit string variables and their references")]
#[command(version)]
pub struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the references found in a piece of text
    Refs {
        /// Text to scan for `{{name}}` placeholders
        text: String,
    },

    /// Report duplicate names, unresolved placeholders and reference cycles
    Check {
        /// Project snapshot (JSON or YAML)
        snapshot: PathBuf,
    },

    /// Print the ordered spawns of a conditional variable
    Spawns {
        /// Project snapshot (JSON or YAML)
        snapshot: PathBuf,
        /// Name of the conditional container
        container: String,
    },

    /// Render a variable with its references expanded
    Render {
        /// Project snapshot (JSON or YAML)
        snapshot: PathBuf,
        /// Variable to render
        name: String,
        /// Selected value of a dimension, as `<dimension>=<value>`
        #[arg(long = "select", value_name = "DIMENSION=VALUE")]
        selections: Vec<String>,
    },

    /// Create a variable in a snapshot, creating whatever it references
    Create {
        /// Project snapshot (JSON or YAML); rewritten unless --out is given
        snapshot: PathBuf,
        /// Content of the new variable
        content: String,
        /// Custom variable name
        #[arg(long)]
        name: Option<String>,
        /// Where to write the updated snapshot (always JSON)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Fetch a project from the backend and print a summary
    Fetch {
        /// Project id
        project_id: u64,
        /// Also write the fetched snapshot to this file
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_collects_selections() {
        let cli = Cli::try_parse_from([
            "weft", "render", "p.json", "greeting", "--select", "tone=formal", "--select", "lang=en",
        ])
        .unwrap();

        match cli.command {
            Command::Render { name, selections, .. } => {
                assert_eq!(name, "greeting");
                assert_eq!(selections, vec!["tone=formal", "lang=en"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_settings_flag() {
        let cli = Cli::try_parse_from(["weft", "fetch", "7", "--settings", "/tmp/s.json"]).unwrap();
        assert_eq!(cli.settings, Some(PathBuf::from("/tmp/s.json")));
        assert!(matches!(cli.command, Command::Fetch { project_id: 7, out: None }));
    }

    #[test]
    fn test_fetch_requires_numeric_id() {
        assert!(Cli::try_parse_from(["weft", "fetch", "seven"]).is_err());
    }
}
