//! Project sink port

use weft_domain::Project;

/// Receives every fresh project snapshot after a successful commit.
pub trait ProjectSink: Send + Sync {
    /// Called with the refreshed project.
    fn on_project_updated(&self, project: &Project);
}

impl<F> ProjectSink for F
where
    F: Fn(&Project) + Send + Sync,
{
    fn on_project_updated(&self, project: &Project) {
        self(project);
    }
}
