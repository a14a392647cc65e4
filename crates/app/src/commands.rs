//! Command implementations.
//!
//! Each command takes an already loaded project (or text) and returns what
//! `main` prints, so the logic is testable without touching the terminal.

use std::collections::HashMap;
use std::fmt::{self, Write as _};

use weft_application::ApplicationError;
use weft_application::drawer::{DrawerSession, FrameOptions, SessionError};
use weft_application::graph::{CycleCandidate, CyclePath, find_cycle, spawns_of};
use weft_application::ports::StringStore;
use weft_application::use_cases::CommitOutcome;
use weft_application::variable_resolver::{
    ContentRenderer, DimensionSelection, PendingVariables, RenderResult, classify_references,
    parse_references,
};
use weft_domain::{EditorSettings, Project, ProjectId};
use weft_infrastructure::{InMemoryStringStore, SnapshotError};

/// Errors surfaced by the `weft` commands.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// An application-layer operation failed.
    #[error(transparent)]
    Application(#[from] ApplicationError),

    /// A commit in the editing session failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A snapshot file could not be read or written.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// No node carries the name.
    #[error("No variable named '{0}'")]
    UnknownVariable(String),

    /// The node exists but has no spawns to list.
    #[error("'{0}' is not a conditional variable")]
    NotConditional(String),

    /// A `--select` argument without `=`.
    #[error("Invalid selection '{0}', expected <dimension>=<value>")]
    InvalidSelection(String),

    /// A `--select` argument naming no dimension of the project.
    #[error("Unknown dimension '{0}'")]
    UnknownDimension(String),
}

/// Lists the references in `text`, one per line with its byte span.
#[must_use]
pub fn refs(text: &str) -> String {
    let mut out = String::new();
    for reference in parse_references(text) {
        let _ = writeln!(
            out,
            "{}\t{}..{}",
            reference.name, reference.span.start, reference.span.end
        );
    }
    out
}

/// Problems found in a project snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    /// Effective names carried by more than one node.
    pub duplicates: Vec<String>,
    /// Variables whose content references names nothing carries.
    pub orphans: Vec<(String, Vec<String>)>,
    /// Variables sitting on a reference cycle, each with one such cycle.
    pub cycles: Vec<(String, CyclePath)>,
}

impl CheckReport {
    /// Returns true if nothing was found.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.duplicates.is_empty() && self.orphans.is_empty() && self.cycles.is_empty()
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return writeln!(f, "No problems found");
        }
        for name in &self.duplicates {
            writeln!(f, "duplicate name: {name}")?;
        }
        for (name, missing) in &self.orphans {
            writeln!(f, "unresolved in {name}: {}", missing.join(", "))?;
        }
        for (name, path) in &self.cycles {
            writeln!(f, "cycle through {name}: {path}")?;
        }
        Ok(())
    }
}

/// Checks a snapshot for duplicate names, unresolved placeholders and cycles.
#[must_use]
pub fn check(project: &Project) -> CheckReport {
    let mut report = CheckReport::default();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for node in &project.strings {
        *counts.entry(node.effective_name()).or_default() += 1;
    }
    for node in &project.strings {
        let name = node.effective_name();
        if counts[name] > 1 && !report.duplicates.iter().any(|d| d == name) {
            report.duplicates.push(name.to_string());
        }
    }

    let pending = PendingVariables::new();
    for node in &project.strings {
        let references = classify_references(&node.content, &project.strings, &pending);
        if !references.is_complete() {
            report
                .orphans
                .push((node.effective_name().to_string(), references.new));
        }
    }

    for node in &project.strings {
        let candidate = CycleCandidate::from_stored(project, node);
        if let Some(path) = find_cycle(&candidate, &project.strings, &project.dimensions) {
            report.cycles.push((node.effective_name().to_string(), path));
        }
    }

    report
}

/// Lists the spawns of `container` in display order.
///
/// # Errors
/// Fails if no variable is named `container` or it is not conditional.
pub fn spawns(project: &Project, container: &str) -> Result<String, CommandError> {
    let node = project
        .node_named(container)
        .ok_or_else(|| CommandError::UnknownVariable(container.to_string()))?;
    if !node.is_conditional_container {
        return Err(CommandError::NotConditional(container.to_string()));
    }

    let set = spawns_of(project, node);
    let mut out = String::new();
    for (i, spawn) in set.spawns.iter().enumerate() {
        let _ = writeln!(out, "{}. {}: {}", i + 1, spawn.effective_name(), spawn.content);
    }
    if set.is_empty() {
        out.push_str("(no spawns)\n");
    }
    let _ = writeln!(
        out,
        "hidden option: {}",
        if set.has_hidden_option { "yes" } else { "no" }
    );
    Ok(out)
}

/// Parses `<dimension>=<value>` arguments against the project's dimensions.
///
/// # Errors
/// Fails on a malformed argument or an unknown dimension name.
pub fn parse_selections(
    project: &Project,
    selections: &[String],
) -> Result<DimensionSelection, CommandError> {
    let mut selection = DimensionSelection::new();
    for raw in selections {
        let (dimension, value) = raw
            .split_once('=')
            .ok_or_else(|| CommandError::InvalidSelection(raw.clone()))?;
        let dimension = project
            .dimension_named(dimension)
            .ok_or_else(|| CommandError::UnknownDimension(dimension.to_string()))?;
        selection.select(dimension.id, value);
    }
    Ok(selection)
}

/// Renders the variable `name`.
///
/// # Errors
/// Fails on a bad selection or if no variable is named `name`.
pub fn render(
    project: &Project,
    name: &str,
    selections: &[String],
    max_depth: usize,
) -> Result<RenderResult, CommandError> {
    let selection = parse_selections(project, selections)?;
    ContentRenderer::new(project, &selection)
        .with_max_depth(max_depth)
        .render_node(name)
        .ok_or_else(|| CommandError::UnknownVariable(name.to_string()))
}

/// One-paragraph description of a project.
#[must_use]
pub fn summary(project: &Project) -> String {
    let conditionals = project
        .strings
        .iter()
        .filter(|n| n.is_conditional_container)
        .count();
    format!(
        "Project {} '{}': {} variables ({} conditional), {} dimensions\n",
        project.id,
        project.name,
        project.strings.len(),
        conditionals,
        project.dimensions.len()
    )
}

/// Fetches a project through any store.
///
/// # Errors
/// Returns the store error wrapped as an application error.
pub async fn fetch(store: &impl StringStore, project_id: ProjectId) -> Result<Project, CommandError> {
    store
        .fetch_project(project_id)
        .await
        .map_err(|e| CommandError::Application(e.into()))
}

/// The result of creating a variable in a snapshot.
#[derive(Debug)]
pub struct Created {
    /// The project after the save, as the store holds it.
    pub project: Project,
    /// What the commit did.
    pub outcome: CommitOutcome,
}

impl fmt::Display for Created {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .project
            .node(self.outcome.node_id)
            .map_or("?", |n| n.effective_name());
        writeln!(f, "created {name} ({})", self.outcome.node_id)?;
        for node in &self.outcome.materialized {
            writeln!(f, "also created {} ({})", node.name, node.node_id)?;
        }
        for skipped in &self.outcome.skipped {
            writeln!(f, "warning: {skipped}")?;
        }
        Ok(())
    }
}

/// Creates a variable in `project` through a full editing session over an
/// in-memory store.
///
/// # Errors
/// Fails if the commit is rejected (duplicate name, cycle, store failure).
pub async fn create(
    project: Project,
    content: &str,
    name: Option<&str>,
    settings: &EditorSettings,
) -> Result<Created, CommandError> {
    let project_id = project.id;
    let store = InMemoryStringStore::with_project(project.clone());
    let mut session = DrawerSession::new(project, store.clone(), |_: &Project| {}, settings);

    let frame = session
        .stack_mut()
        .open_create(content, false, FrameOptions::new().with_title("New variable"));
    if let Some(name) = name {
        session
            .stack_mut()
            .update_variable_name(frame, name)
            .map_err(ApplicationError::from)?;
    }

    let settled = session.commit(frame).await?;
    let outcome = settled
        .outcome
        .ok_or(SessionError::Detached(frame))?;
    let project = store
        .project(project_id)
        .ok_or_else(|| ApplicationError::NotFound(format!("project {project_id}")))?;

    Ok(Created { project, outcome })
}
