//! REST string store using reqwest.
//!
//! This adapter implements the `StringStore` port against the backend's REST
//! API. A conditional save is several calls: the container itself, its
//! dimension, every spawn, then the dimension values and their links. Only
//! the node writes are fatal; the dimension wiring tolerates answers saying
//! the change was already made and logs the rest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use url::Url;
use weft_application::ports::{NewNode, SaveNode, SpawnSet, StoreError, StringStore};
use weft_domain::{EditorSettings, HIDDEN_VALUE, NodeId, Project, ProjectId};

use super::dto::{
    DimensionDto, DimensionPayload, DimensionValueDto, DimensionValuePayload, LinkPayload,
    ProjectDto, StringDto, StringPayload,
};

const STRINGS: &str = "api/strings/";
const DIMENSIONS: &str = "api/dimensions/";
const DIMENSION_VALUES: &str = "api/dimension-values/";
const STRING_DIMENSION_VALUES: &str = "api/string-dimension-values/";

fn project_path(project: ProjectId) -> String {
    format!("api/projects/{project}/")
}

fn string_path(node: NodeId) -> String {
    format!("{STRINGS}{node}/")
}

/// Parses a base URL so that relative API paths append to it.
fn parse_base_url(raw: &str) -> Result<Url, StoreError> {
    let mut base = raw.trim().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    Url::parse(&base).map_err(|e| StoreError::Invalid(format!("base URL {raw:?}: {e}")))
}

/// Maps an error status to a `StoreError`.
///
/// The backend reports uniqueness violations as a 400 mentioning a "unique
/// set"; those are conflicts.
fn map_status(status: StatusCode, message: String) -> StoreError {
    match status {
        StatusCode::NOT_FOUND => StoreError::NotFound(message),
        StatusCode::CONFLICT => StoreError::Conflict(message),
        StatusCode::BAD_REQUEST if message.contains("unique") => StoreError::Conflict(message),
        _ => StoreError::Http {
            status: status.as_u16(),
            message,
        },
    }
}

fn map_transport(error: &reqwest::Error) -> StoreError {
    if error.is_decode() {
        StoreError::Serialization(error.to_string())
    } else {
        StoreError::Transport(error.to_string())
    }
}

/// [`StringStore`] over the REST backend.
pub struct HttpStringStore {
    client: Client,
    base_url: Url,
}

impl HttpStringStore {
    /// Creates a store for `base_url` with a request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder()
            .user_agent(concat!("weft/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
        })
    }

    /// Creates a store from the configured URL and timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the client cannot be built.
    pub fn from_settings(settings: &EditorSettings) -> Result<Self, StoreError> {
        Self::new(
            &settings.api_base_url,
            Duration::from_secs(settings.request_timeout_secs),
        )
    }

    /// Creates a store with a custom reqwest client.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn with_client(client: Client, base_url: &str) -> Result<Self, StoreError> {
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
        })
    }

    /// Returns the base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, StoreError> {
        self.base_url
            .join(path)
            .map_err(|e| StoreError::Invalid(format!("{path}: {e}")))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request.send().await.map_err(|e| map_transport(&e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(map_status(status, message))
    }

    async fn read<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
        response
            .json()
            .await
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, StoreError> {
        let url = self.endpoint(path)?;
        Self::read(self.send(self.client.get(url)).await?).await
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, StoreError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        Self::read(self.send(self.client.post(url).json(body)).await?).await
    }

    async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T, StoreError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        Self::read(self.send(self.client.patch(url).json(body)).await?).await
    }

    async fn post_ignoring_body<B>(&self, path: &str, body: &B) -> Result<(), StoreError>
    where
        B: Serialize + Sync + ?Sized,
    {
        let url = self.endpoint(path)?;
        self.send(self.client.post(url).json(body)).await.map(|_| ())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let url = self.endpoint(path)?;
        self.send(self.client.delete(url)).await.map(|_| ())
    }

    async fn write_string(
        &self,
        target: Option<NodeId>,
        payload: &StringPayload<'_>,
    ) -> Result<StringDto, StoreError> {
        match target {
            Some(id) => self.patch(&string_path(id), payload).await,
            None => self.post(STRINGS, payload).await,
        }
    }

    /// Finds the container's dimension, creating it when missing.
    async fn ensure_dimension(
        &self,
        project: ProjectId,
        snapshot: ProjectDto,
        name: &str,
    ) -> Result<DimensionDto, StoreError> {
        if let Some(found) = snapshot.dimensions.into_iter().find(|d| d.name == name) {
            return Ok(found);
        }

        let payload = DimensionPayload {
            name,
            project: project.0,
        };
        match self.post_ignoring_body(DIMENSIONS, &payload).await {
            Ok(()) => debug!(dimension = name, "Dimension created"),
            Err(StoreError::Conflict(_)) => debug!(dimension = name, "Dimension already exists"),
            Err(e) => return Err(e),
        }

        let refreshed: ProjectDto = self.get(&project_path(project)).await?;
        refreshed
            .dimensions
            .into_iter()
            .find(|d| d.name == name)
            .ok_or_else(|| StoreError::Invalid(format!("dimension '{name}' missing after create")))
    }

    async fn sync_hidden(&self, dimension: &DimensionDto, include: bool) {
        let existing = dimension.values.iter().find(|v| v.value == HIDDEN_VALUE);
        match (include, existing) {
            (true, None) => {
                let payload = DimensionValuePayload {
                    dimension: dimension.id,
                    value: HIDDEN_VALUE,
                };
                match self.post_ignoring_body(DIMENSION_VALUES, &payload).await {
                    Ok(()) | Err(StoreError::Conflict(_)) => {}
                    Err(e) => warn!(dimension = %dimension.name, error = %e, "Could not add the Hidden value"),
                }
            }
            (false, Some(value)) => {
                match self.delete(&format!("{DIMENSION_VALUES}{}/", value.id)).await {
                    Ok(()) | Err(StoreError::NotFound(_)) => {}
                    Err(e) => warn!(dimension = %dimension.name, error = %e, "Could not remove the Hidden value"),
                }
            }
            _ => {}
        }
    }

    async fn sync_values(&self, dimension: &DimensionDto, members: &[(u64, String)]) {
        let values: Vec<&DimensionValueDto> = dimension
            .values
            .iter()
            .filter(|v| v.value != HIDDEN_VALUE)
            .collect();

        for orphan in values.iter().filter(|v| !members.iter().any(|(_, n)| *n == v.value)) {
            match self.delete(&format!("{DIMENSION_VALUES}{}/", orphan.id)).await {
                Ok(()) => debug!(value = %orphan.value, "Orphaned dimension value removed"),
                Err(StoreError::NotFound(_)) => {}
                Err(e) => warn!(value = %orphan.value, error = %e, "Could not remove orphaned dimension value"),
            }
        }

        for (string, name) in members {
            let value_id = if let Some(existing) = values.iter().find(|v| v.value == *name) {
                existing.id
            } else {
                let payload = DimensionValuePayload {
                    dimension: dimension.id,
                    value: name,
                };
                match self.post::<_, DimensionValueDto>(DIMENSION_VALUES, &payload).await {
                    Ok(created) => created.id,
                    Err(e) => {
                        warn!(value = %name, error = %e, "Could not create dimension value; spawn not linked");
                        continue;
                    }
                }
            };

            let link = LinkPayload {
                string: *string,
                dimension_value: value_id,
            };
            match self.post_ignoring_body(STRING_DIMENSION_VALUES, &link).await {
                Ok(()) | Err(StoreError::Conflict(_)) => {}
                Err(e) => warn!(spawn = %name, error = %e, "Could not link spawn"),
            }
        }
    }

    async fn sync_spawns(
        &self,
        project: ProjectId,
        container: &StringDto,
        set: &SpawnSet,
    ) -> Result<(), StoreError> {
        let snapshot: ProjectDto = self.get(&project_path(project)).await?;
        let names: Vec<(u64, String)> = snapshot
            .strings
            .iter()
            .map(|s| (s.id, s.effective_name().to_string()))
            .collect();
        let dimension = self
            .ensure_dimension(project, snapshot, container.effective_name())
            .await?;

        let mut members = Vec::with_capacity(set.spawns.len());
        for spawn in &set.spawns {
            if spawn.link_only {
                let known = spawn
                    .target
                    .and_then(|id| names.iter().find(|(n, _)| *n == id.0).cloned());
                match known {
                    Some(member) => members.push(member),
                    None => warn!(node = ?spawn.target, "Linked spawn not found; skipped"),
                }
                continue;
            }

            let payload = StringPayload {
                content: spawn.content.trim(),
                variable_name: spawn.name.as_deref(),
                is_conditional: false,
                is_conditional_container: false,
                project: project.0,
            };
            let saved = self.write_string(spawn.target, &payload).await?;
            members.push((saved.id, saved.effective_name().to_string()));
        }

        self.sync_hidden(&dimension, set.include_hidden_option).await;
        self.sync_values(&dimension, &members).await;
        debug!(dimension = %dimension.name, spawns = members.len(), "Spawns synced");
        Ok(())
    }
}

#[async_trait]
impl StringStore for HttpStringStore {
    async fn create_node(&self, project: ProjectId, node: NewNode) -> Result<NodeId, StoreError> {
        let payload = StringPayload {
            content: node.content.trim(),
            variable_name: node.name.as_deref(),
            is_conditional: node.is_conditional,
            is_conditional_container: node.is_conditional,
            project: project.0,
        };
        let created: StringDto = self.post(STRINGS, &payload).await?;
        debug!(node = created.id, name = created.effective_name(), "String created");
        Ok(NodeId(created.id))
    }

    async fn save_node(&self, project: ProjectId, save: SaveNode) -> Result<NodeId, StoreError> {
        let payload = StringPayload {
            content: save.content.trim(),
            variable_name: save.name.as_deref(),
            is_conditional: save.is_conditional,
            is_conditional_container: save.is_conditional,
            project: project.0,
        };
        let saved = self.write_string(save.target, &payload).await?;
        info!(node = saved.id, name = saved.effective_name(), "String saved");

        if let Some(set) = &save.spawns {
            self.sync_spawns(project, &saved, set).await?;
        }
        Ok(NodeId(saved.id))
    }

    async fn fetch_project(&self, project: ProjectId) -> Result<Project, StoreError> {
        let dto: ProjectDto = self.get(&project_path(project)).await?;
        Ok(dto.into())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    use axum::Router;
    use axum::extract::State;
    use axum::http::{Method, Uri};
    use weft_application::ports::SpawnSave;

    /// Stands in for the REST backend. Answers are queued per `METHOD path`
    /// and the last one repeats; every request is recorded.
    #[derive(Default)]
    struct Backend {
        replies: Mutex<HashMap<String, VecDeque<(u16, String)>>>,
        requests: Mutex<Vec<(String, String)>>,
    }

    impl Backend {
        fn reply(self, route: &str, status: u16, body: &str) -> Self {
            self.replies
                .lock()
                .unwrap()
                .entry(route.to_string())
                .or_default()
                .push_back((status, body.to_string()));
            self
        }

        fn routes(&self) -> Vec<String> {
            self.requests.lock().unwrap().iter().map(|(route, _)| route.clone()).collect()
        }

        fn body(&self, index: usize) -> serde_json::Value {
            serde_json::from_str(&self.requests.lock().unwrap()[index].1).unwrap()
        }
    }

    async fn answer(
        State(backend): State<Arc<Backend>>,
        method: Method,
        uri: Uri,
        body: String,
    ) -> (axum::http::StatusCode, String) {
        let route = format!("{method} {}", uri.path());
        backend.requests.lock().unwrap().push((route.clone(), body));
        let (status, body) = match backend.replies.lock().unwrap().get_mut(&route) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap(),
            None => (404, r#"{"detail": "Not found."}"#.to_string()),
        };
        (axum::http::StatusCode::from_u16(status).unwrap(), body)
    }

    async fn serve(backend: Backend) -> (HttpStringStore, Arc<Backend>) {
        let backend = Arc::new(backend);
        let app = Router::new().fallback(answer).with_state(Arc::clone(&backend));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let store = HttpStringStore::new(&format!("http://{address}"), Duration::from_secs(5)).unwrap();
        (store, backend)
    }

    const CONTAINER: &str = r#"{"id": 20, "variable_name": "tier", "variable_hash": "c1", "is_conditional_container": true}"#;
    const EMPTY_PROJECT: &str = r#"{"id": 1, "name": "demo", "strings": [], "dimensions": []}"#;

    fn tier_save() -> SaveNode {
        SaveNode {
            target: None,
            content: String::new(),
            name: Some("tier".to_string()),
            is_conditional: true,
            spawns: Some(SpawnSet {
                spawns: vec![SpawnSave {
                    target: None,
                    content: " Free ".to_string(),
                    name: Some("tier_1".to_string()),
                    link_only: false,
                }],
                include_hidden_option: true,
            }),
        }
    }

    fn dimension(values: &[(u64, &str)]) -> DimensionDto {
        DimensionDto {
            id: 7,
            name: "tier".to_string(),
            values: values
                .iter()
                .map(|(id, value)| DimensionValueDto {
                    id: *id,
                    value: (*value).to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_paths_append_to_base_with_prefix() {
        let store = HttpStringStore::new("https://copy.example.com/backend", Duration::from_secs(5)).unwrap();
        assert_eq!(
            store.endpoint(&project_path(ProjectId(4))).unwrap().as_str(),
            "https://copy.example.com/backend/api/projects/4/"
        );
        assert_eq!(
            store.endpoint(&string_path(NodeId(9))).unwrap().as_str(),
            "https://copy.example.com/backend/api/strings/9/"
        );
    }

    #[test]
    fn test_from_settings() {
        let store = HttpStringStore::from_settings(&EditorSettings::default()).unwrap();
        assert_eq!(store.base_url().as_str(), "http://localhost:8000/");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpStringStore::new("not a url", Duration::from_secs(1)),
            Err(StoreError::Invalid(_))
        ));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            map_status(StatusCode::NOT_FOUND, "Not found.".to_string()),
            StoreError::NotFound("Not found.".to_string())
        );
        assert!(matches!(
            map_status(
                StatusCode::BAD_REQUEST,
                r#"{"non_field_errors":["The fields name, project must make a unique set."]}"#.to_string()
            ),
            StoreError::Conflict(_)
        ));
        assert_eq!(
            map_status(StatusCode::BAD_REQUEST, "bad".to_string()),
            StoreError::Http {
                status: 400,
                message: "bad".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_conditional_save_wires_dimension_in_order() {
        let backend = Backend::default()
            .reply("POST /api/strings/", 201, CONTAINER)
            .reply(
                "POST /api/strings/",
                201,
                r#"{"id": 21, "content": "Free", "variable_name": "tier_1", "variable_hash": "s1"}"#,
            )
            .reply("GET /api/projects/1/", 200, EMPTY_PROJECT)
            .reply(
                "GET /api/projects/1/",
                200,
                r#"{"id": 1, "dimensions": [{"id": 7, "name": "tier", "values": []}]}"#,
            )
            .reply("POST /api/dimensions/", 409, "already exists")
            .reply("POST /api/dimension-values/", 201, r#"{"id": 50, "value": "Hidden"}"#)
            .reply("POST /api/dimension-values/", 201, r#"{"id": 51, "value": "tier_1"}"#)
            .reply("POST /api/string-dimension-values/", 201, "{}");
        let (store, backend) = serve(backend).await;

        let id = store.save_node(ProjectId(1), tier_save()).await.unwrap();

        assert_eq!(id, NodeId(20));
        assert_eq!(
            backend.routes(),
            vec![
                "POST /api/strings/",
                "GET /api/projects/1/",
                "POST /api/dimensions/",
                "GET /api/projects/1/",
                "POST /api/strings/",
                "POST /api/dimension-values/",
                "POST /api/dimension-values/",
                "POST /api/string-dimension-values/",
            ]
        );
        assert_eq!(backend.body(4)["content"], "Free");
        assert_eq!(backend.body(5)["value"], HIDDEN_VALUE);
        assert_eq!(backend.body(6)["value"], "tier_1");
        assert_eq!(
            backend.body(7),
            serde_json::json!({"string": 21, "dimension_value": 51})
        );
    }

    #[tokio::test]
    async fn test_dimension_create_failure_stops_the_save() {
        let backend = Backend::default()
            .reply("POST /api/strings/", 201, CONTAINER)
            .reply("GET /api/projects/1/", 200, EMPTY_PROJECT)
            .reply("POST /api/dimensions/", 500, "boom");
        let (store, backend) = serve(backend).await;

        let result = store.save_node(ProjectId(1), tier_save()).await;

        assert_eq!(
            result,
            Err(StoreError::Http {
                status: 500,
                message: "boom".to_string()
            })
        );
        assert_eq!(
            backend.routes(),
            vec!["POST /api/strings/", "GET /api/projects/1/", "POST /api/dimensions/"]
        );
    }

    #[tokio::test]
    async fn test_value_sync_tolerates_missing_and_duplicate_rows() {
        let backend = Backend::default()
            .reply("DELETE /api/dimension-values/40/", 404, r#"{"detail": "Not found."}"#)
            .reply("POST /api/dimension-values/", 201, r#"{"id": 42, "value": "tier_2"}"#)
            .reply(
                "POST /api/string-dimension-values/",
                400,
                r#"{"non_field_errors": ["The fields string, dimension_value must make a unique set."]}"#,
            )
            .reply("POST /api/string-dimension-values/", 201, "{}");
        let (store, backend) = serve(backend).await;
        let members = vec![(21, "tier_1".to_string()), (22, "tier_2".to_string())];

        store
            .sync_values(&dimension(&[(40, "old"), (41, "tier_1"), (60, HIDDEN_VALUE)]), &members)
            .await;

        assert_eq!(
            backend.routes(),
            vec![
                "DELETE /api/dimension-values/40/",
                "POST /api/string-dimension-values/",
                "POST /api/dimension-values/",
                "POST /api/string-dimension-values/",
            ]
        );
        assert_eq!(
            backend.body(1),
            serde_json::json!({"string": 21, "dimension_value": 41})
        );
        assert_eq!(
            backend.body(3),
            serde_json::json!({"string": 22, "dimension_value": 42})
        );
    }

    #[tokio::test]
    async fn test_hidden_sync_adds_removes_and_skips() {
        let backend = Backend::default()
            .reply("POST /api/dimension-values/", 409, "already exists")
            .reply("DELETE /api/dimension-values/60/", 404, r#"{"detail": "Not found."}"#);
        let (store, backend) = serve(backend).await;
        let without = dimension(&[(41, "tier_1")]);
        let with = dimension(&[(41, "tier_1"), (60, HIDDEN_VALUE)]);

        store.sync_hidden(&without, true).await;
        store.sync_hidden(&with, false).await;
        store.sync_hidden(&with, true).await;
        store.sync_hidden(&without, false).await;

        assert_eq!(
            backend.routes(),
            vec!["POST /api/dimension-values/", "DELETE /api/dimension-values/60/"]
        );
        assert_eq!(
            backend.body(0),
            serde_json::json!({"dimension": 7, "value": HIDDEN_VALUE})
        );
    }
}
