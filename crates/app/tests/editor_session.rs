//! Editor sessions driven end to end against the in-memory store.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use weft_application::drawer::{DrawerError, DrawerSession, FrameOptions, SessionError};
use weft_application::graph::spawns_of;
use weft_application::use_cases::CommitError;
use weft_domain::{
    CloseReason, CommitErrorKind, EditorSettings, FrameState, HIDDEN_VALUE, NodeId, Project,
    ProjectId, StringNode,
};
use weft_infrastructure::{InMemoryStringStore, load_valid_snapshot, save_snapshot};

const PROJECT: ProjectId = ProjectId(1);

fn seed() -> Project {
    Project::new(PROJECT, "Onboarding")
        .with_node(StringNode::new(NodeId(1), "k1", "Welcome {{user}}").with_name("welcome"))
        .with_node(StringNode::new(NodeId(2), "k2", "friend").with_name("user"))
}

fn session(
    store: &InMemoryStringStore,
) -> DrawerSession<InMemoryStringStore, impl Fn(&Project) + Send + Sync> {
    DrawerSession::new(
        store.project(PROJECT).unwrap(),
        store.clone(),
        |_: &Project| {},
        &EditorSettings::default(),
    )
}

fn stored(store: &InMemoryStringStore) -> Project {
    store.project(PROJECT).unwrap()
}

#[tokio::test]
async fn test_create_with_unknown_reference_creates_both() {
    let store = InMemoryStringStore::with_project(seed());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = Arc::clone(&seen);
    let mut session = DrawerSession::new(
        seed(),
        store.clone(),
        move |project: &Project| sink_seen.lock().unwrap().push(project.strings.len()),
        &EditorSettings::default(),
    );

    let frame = session
        .stack_mut()
        .open_create("Hello {{company}}", false, FrameOptions::new());
    session.stack_mut().update_variable_name(frame, "greeting").unwrap();
    let settled = session.commit(frame).await.unwrap();

    let project = stored(&store);
    let greeting = project.node_named("greeting").unwrap();
    let company = project.node_named("company").unwrap();
    assert_eq!(greeting.content, "Hello {{company}}");
    assert_eq!(company.content, EditorSettings::default().materialized_content);
    assert_eq!(settled.outcome.unwrap().node_id, greeting.id);
    assert_eq!(*seen.lock().unwrap(), vec![4]);
    assert!(session.stack().is_empty());
}

#[tokio::test]
async fn test_back_discards_nested_frames_without_saving() {
    let store = InMemoryStringStore::with_project(seed());
    let mut session = session(&store);

    let root = session
        .stack_mut()
        .open_create("{{headline}} and {{user}}", false, FrameOptions::new());
    let headline = session
        .stack_mut()
        .open_reference(root, "headline", FrameOptions::new())
        .unwrap();
    session.stack_mut().update_content(headline, "Big {{news}}").unwrap();
    let news = session
        .stack_mut()
        .open_reference(headline, "news", FrameOptions::new())
        .unwrap();
    let innermost = session.stack().frame(news).unwrap();
    assert_eq!(innermost.level(), 2);
    assert!(innermost.shows_back_button());

    let closed = session.stack_mut().back(headline).unwrap();

    let reasons: Vec<_> = closed.iter().map(|f| (f.id(), f.state().clone())).collect();
    assert_eq!(
        reasons,
        vec![
            (headline, FrameState::Closed { reason: CloseReason::Cancelled }),
            (news, FrameState::Closed { reason: CloseReason::Superseded }),
        ]
    );
    assert_eq!(session.stack().len(), 1);
    assert_eq!(session.stack().top().unwrap().id(), root);
    assert_eq!(stored(&store).strings.len(), 2);
}

#[tokio::test]
async fn test_nested_reference_to_existing_variable_edits_it() {
    let store = InMemoryStringStore::with_project(seed());
    let mut session = session(&store);

    let welcome = session.stack_mut().open_edit(NodeId(1), FrameOptions::new()).unwrap();
    let user = session
        .stack_mut()
        .open_reference(welcome, "user", FrameOptions::new())
        .unwrap();
    assert!(session.stack().frame(user).unwrap().is_edit());
    session.stack_mut().update_content(user, "pal").unwrap();

    session.commit(user).await.unwrap();

    assert_eq!(stored(&store).node(NodeId(2)).unwrap().content, "pal");
    let parent = session.stack().top().unwrap();
    assert_eq!(parent.id(), welcome);
    assert_eq!(parent.snapshot().node(NodeId(2)).unwrap().content, "pal");
}

#[tokio::test]
async fn test_conditional_with_new_spawns() {
    let store = InMemoryStringStore::with_project(seed());
    let mut session = session(&store);

    let tone = session.stack_mut().open_create("", true, FrameOptions::new());
    session.stack_mut().update_variable_name(tone, "tone").unwrap();
    session.stack_mut().set_include_hidden_option(tone, true).unwrap();
    session.stack_mut().update_spawn_content(tone, 0, "Hello").unwrap();
    let second = session.stack_mut().add_spawn(tone).unwrap();
    assert_eq!(second, 1);

    // edit the second spawn in its own frame; nothing is persisted yet
    let spawn = session.stack_mut().open_spawn(tone, second, FrameOptions::new()).unwrap();
    assert!(session.stack().frame(spawn).unwrap().applies_locally());
    session.stack_mut().update_content(spawn, "Hey {{nickname}}").unwrap();
    session.commit(spawn).await.unwrap();
    assert_eq!(stored(&store).strings.len(), 2);
    assert_eq!(
        session.stack().top().unwrap().draft().conditional_spawns[1].content,
        "Hey {{nickname}}"
    );

    session.commit(tone).await.unwrap();

    let project = stored(&store);
    let container = project.node_named("tone").unwrap();
    assert!(container.is_conditional_container);
    let set = spawns_of(&project, container);
    let mut contents: Vec<&str> = set.spawns.iter().map(|s| s.content.as_str()).collect();
    contents.sort_unstable();
    assert_eq!(contents, vec!["Hello", "Hey {{nickname}}"]);
    assert!(set.has_hidden_option);
    assert!(set.dimension.unwrap().value_named(HIDDEN_VALUE).is_some());
    assert!(project.node_named("nickname").is_some());
}

#[tokio::test]
async fn test_persisted_spawn_commits_through_the_store() {
    let store = InMemoryStringStore::with_project(seed());
    let mut session = session(&store);

    let tone = session.stack_mut().open_create("", true, FrameOptions::new());
    session.stack_mut().update_variable_name(tone, "tone").unwrap();
    session.stack_mut().update_spawn_content(tone, 0, "Hi").unwrap();
    session.commit(tone).await.unwrap();

    let container = stored(&store).node_named("tone").unwrap().id;
    let tone = session.stack_mut().open_edit(container, FrameOptions::new()).unwrap();
    let spawn_id = session.stack().frame(tone).unwrap().draft().conditional_spawns[0]
        .node_id
        .unwrap();
    let spawn = session.stack_mut().open_spawn(tone, 0, FrameOptions::new()).unwrap();
    assert!(!session.stack().frame(spawn).unwrap().applies_locally());
    session.stack_mut().update_content(spawn, "Hi there").unwrap();

    session.commit(spawn).await.unwrap();

    assert_eq!(stored(&store).node(spawn_id).unwrap().content, "Hi there");
    let parent = session.stack().frame(tone).unwrap();
    assert_eq!(parent.draft().conditional_spawns[0].content, "Hi there");
}

#[tokio::test]
async fn test_cycle_is_reported_then_fixed() {
    let store = InMemoryStringStore::with_project(seed());
    let mut session = session(&store);

    let user = session.stack_mut().open_edit(NodeId(2), FrameOptions::new()).unwrap();
    session.stack_mut().update_content(user, "see {{welcome}}").unwrap();

    let error = session.commit(user).await.unwrap_err();
    let SessionError::Commit(CommitError::CircularReference(path)) = error else {
        panic!("expected a cycle, got {error:?}");
    };
    assert_eq!(path.to_string(), "user -> welcome -> user");
    let frame = session.stack().frame(user).unwrap();
    assert_eq!(frame.state().error_kind(), Some(CommitErrorKind::CircularReference));
    assert_eq!(stored(&store).node(NodeId(2)).unwrap().content, "friend");

    session.stack_mut().update_content(user, "buddy").unwrap();
    session.commit(user).await.unwrap();
    assert_eq!(stored(&store).node(NodeId(2)).unwrap().content, "buddy");
}

#[tokio::test]
async fn test_nested_open_needs_the_top_frame() {
    let store = InMemoryStringStore::with_project(seed());
    let mut session = session(&store);

    let root = session.stack_mut().open_create("{{a}} {{b}}", false, FrameOptions::new());
    session
        .stack_mut()
        .open_reference(root, "a", FrameOptions::new())
        .unwrap();

    assert!(matches!(
        session.stack_mut().open_reference(root, "b", FrameOptions::new()),
        Err(DrawerError::NotTopFrame(_))
    ));
}

#[tokio::test]
async fn test_session_over_a_snapshot_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("project.json");
    save_snapshot(&path, &seed()).await.unwrap();

    let store = InMemoryStringStore::with_project(load_valid_snapshot(&path).await.unwrap());
    let mut session = session(&store);
    let frame = session
        .stack_mut()
        .open_create("Bye {{user}}", false, FrameOptions::new());
    session.stack_mut().update_variable_name(frame, "farewell").unwrap();
    session.commit(frame).await.unwrap();
    save_snapshot(&path, &stored(&store)).await.unwrap();

    let reloaded = load_valid_snapshot(&path).await.unwrap();
    assert_eq!(reloaded.node_named("farewell").unwrap().content, "Bye {{user}}");
    assert_eq!(reloaded.strings.len(), 3);
}
