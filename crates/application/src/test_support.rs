//! Hand-written store and sink doubles shared by the unit tests.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::significant_drop_tightening)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use weft_domain::{NodeId, Project, ProjectId, StringNode};

use crate::ports::{NewNode, ProjectSink, SaveNode, StoreError, StringStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Create(NewNode),
    Save(SaveNode),
    Fetch,
}

#[derive(Default)]
struct State {
    project: Option<Project>,
    calls: Vec<StoreCall>,
    next_id: u64,
    fail_create: HashSet<String>,
    fail_save: bool,
    fail_fetch: bool,
}

#[derive(Clone)]
pub struct MockStore {
    state: Arc<Mutex<State>>,
}

impl MockStore {
    pub fn new(project: Project) -> Self {
        let next_id = project.strings.iter().map(|n| n.id.0).max().unwrap_or(0) + 1;
        Self {
            state: Arc::new(Mutex::new(State {
                project: Some(project),
                next_id,
                ..State::default()
            })),
        }
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().expect("Lock poisoned").calls.clone()
    }

    pub fn create_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, StoreCall::Create(_)))
            .count()
    }

    pub fn save_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, StoreCall::Save(_)))
            .count()
    }

    pub fn fail_create_for(&self, name: &str) {
        self.state
            .lock()
            .expect("Lock poisoned")
            .fail_create
            .insert(name.to_string());
    }

    pub fn fail_saves(&self) {
        self.state.lock().expect("Lock poisoned").fail_save = true;
    }

    pub fn fail_fetches(&self) {
        self.state.lock().expect("Lock poisoned").fail_fetch = true;
    }

    fn insert(state: &mut State, content: &str, name: Option<&str>, is_conditional: bool) -> NodeId {
        let id = NodeId(state.next_id);
        state.next_id += 1;
        let mut node = StringNode::new(id, format!("hash{}", id.0), content);
        if let Some(name) = name {
            node = node.with_name(name);
        }
        node.is_conditional_container = is_conditional;
        if let Some(project) = state.project.as_mut() {
            project.strings.push(node);
        }
        id
    }
}

#[async_trait]
impl StringStore for MockStore {
    async fn create_node(&self, _: ProjectId, node: NewNode) -> Result<NodeId, StoreError> {
        let mut state = self.state.lock().expect("Lock poisoned");
        state.calls.push(StoreCall::Create(node.clone()));
        if node
            .name
            .as_ref()
            .is_some_and(|n| state.fail_create.contains(n))
        {
            return Err(StoreError::Conflict("refused".to_string()));
        }
        Ok(Self::insert(
            &mut state,
            &node.content,
            node.name.as_deref(),
            node.is_conditional,
        ))
    }

    async fn save_node(&self, _: ProjectId, save: SaveNode) -> Result<NodeId, StoreError> {
        let mut state = self.state.lock().expect("Lock poisoned");
        state.calls.push(StoreCall::Save(save.clone()));
        if state.fail_save {
            return Err(StoreError::Http {
                status: 500,
                message: "boom".to_string(),
            });
        }

        let existing = save.target.and_then(|id| {
            state
                .project
                .as_mut()
                .and_then(|p| p.strings.iter_mut().find(|n| n.id == id))
        });
        if let Some(node) = existing {
            node.content.clone_from(&save.content);
            node.variable_name.clone_from(&save.name);
            node.is_conditional_container = save.is_conditional;
            return Ok(node.id);
        }
        Ok(Self::insert(
            &mut state,
            &save.content,
            save.name.as_deref(),
            save.is_conditional,
        ))
    }

    async fn fetch_project(&self, id: ProjectId) -> Result<Project, StoreError> {
        let mut state = self.state.lock().expect("Lock poisoned");
        state.calls.push(StoreCall::Fetch);
        if state.fail_fetch {
            return Err(StoreError::Transport("offline".to_string()));
        }
        state
            .project
            .clone()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

pub type SeenProjects = Arc<Mutex<Vec<Project>>>;

pub fn recording_sink() -> (impl ProjectSink, SeenProjects) {
    let seen: SeenProjects = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&seen);
    let sink = move |project: &Project| {
        captured.lock().expect("Lock poisoned").push(project.clone());
    };
    (sink, seen)
}
