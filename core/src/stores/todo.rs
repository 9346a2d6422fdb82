//! Todo store.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use super::{remove, upsert, Slot, Store, StoreState};
use crate::adapter::HttpAdapter;
use crate::error::ApiError;
use crate::types::{NewTodo, Todo, TodoPatch};

pub struct TodoStore {
    adapter: Arc<HttpAdapter>,
    store: Store<Todo>,
}

impl TodoStore {
    pub fn new(adapter: Arc<HttpAdapter>) -> Self {
        Self {
            adapter,
            store: Store::new(),
        }
    }

    pub fn snapshot(&self) -> StoreState<Todo> {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreState<Todo>> {
        self.store.subscribe()
    }

    pub fn items(&self) -> Vec<Todo> {
        self.store.items()
    }

    /// `GET /todolists/user/:user_id`, replacing `items` wholesale.
    pub async fn fetch_all(&self, user_id: i64) {
        let _op = self.store.begin();
        let ticket = self.store.issue(Slot::Collection).await;
        let result = async {
            let client = self.adapter.client();
            let response = self.adapter.send(client.build_list_todos(user_id)).await?;
            let todos = client.parse_todos(response)?;
            self.store.apply(Some(&ticket), |items| *items = todos).await
        }
        .await;
        self.store.settle_read("fetching todos", result);
    }

    /// Refresh one todo, appending it when it is not loaded yet.
    pub async fn fetch_one(&self, todo_id: i64) {
        let _op = self.store.begin();
        let ticket = self.store.issue(Slot::Item(todo_id)).await;
        let result = async {
            let client = self.adapter.client();
            let response = self.adapter.send(client.build_get_todo(todo_id)).await?;
            let todo = client.parse_todo(response)?;
            self.store.apply(Some(&ticket), |items| upsert(items, todo)).await
        }
        .await;
        self.store.settle_read("fetching todo", result);
    }

    pub async fn create(&self, input: NewTodo) -> Result<Todo, ApiError> {
        let _op = self.store.begin();
        let result = async {
            input.validate()?;
            let client = self.adapter.client();
            let response = self.adapter.send(client.build_create_todo(&input)?).await?;
            let todo = client.parse_todo(response)?;
            let committed = todo.clone();
            self.store.apply(None, |items| items.push(committed)).await?;
            info!(todo_id = todo.todolist_id, "todo created");
            Ok(todo)
        }
        .await;
        self.store.settle(result)
    }

    /// `PUT /todolists/:id` with the changed fields; the server's copy
    /// replaces the local one.
    pub async fn update(&self, todo_id: i64, patch: TodoPatch) -> Result<Todo, ApiError> {
        let _op = self.store.begin();
        let ticket = self.store.issue(Slot::Item(todo_id)).await;
        let result = async {
            if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
                return Err(ApiError::validation("title is required"));
            }
            let client = self.adapter.client();
            let response = self.adapter.send(client.build_update_todo(todo_id, &patch)?).await?;
            let todo = client.parse_todo(response)?;
            let committed = todo.clone();
            self.store.apply(Some(&ticket), |items| upsert(items, committed)).await?;
            info!(todo_id, "todo updated");
            Ok(todo)
        }
        .await;
        self.store.settle(result)
    }

    pub async fn delete(&self, todo_id: i64) -> Result<(), ApiError> {
        let _op = self.store.begin();
        let ticket = self.store.issue(Slot::Item(todo_id)).await;
        let result = async {
            let client = self.adapter.client();
            let response = self.adapter.send(client.build_delete_todo(todo_id)).await?;
            client.parse_empty(response)?;
            self.store.apply(Some(&ticket), |items| remove(items, todo_id)).await?;
            info!(todo_id, "todo deleted");
            Ok(())
        }
        .await;
        self.store.settle(result)
    }

    /// Mark a todo done or not done.
    pub async fn complete(&self, todo_id: i64, is_completed: bool) -> Result<Todo, ApiError> {
        let _op = self.store.begin();
        let ticket = self.store.issue(Slot::Item(todo_id)).await;
        let result = async {
            let client = self.adapter.client();
            let response = self
                .adapter
                .send(client.build_complete_todo(todo_id, is_completed))
                .await?;
            let todo = client.parse_todo(response)?;
            let committed = todo.clone();
            self.store.apply(Some(&ticket), |items| upsert(items, committed)).await?;
            Ok(todo)
        }
        .await;
        self.store.settle(result)
    }

    pub async fn reset(&self) {
        self.store.clear().await;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::ClientConfig;
    use crate::credentials::CredentialStore;
    use crate::storage::MemoryStorage;
    use crate::testing::ScriptedTransport;
    use crate::types::UserProfile;

    async fn fixture() -> (TodoStore, Arc<ScriptedTransport>) {
        let credentials = Arc::new(CredentialStore::new(Arc::new(MemoryStorage::new())));
        credentials.save("tok", &UserProfile::default()).await.unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        let adapter = HttpAdapter::new(ClientConfig::default(), transport.clone(), credentials);
        (TodoStore::new(Arc::new(adapter)), transport)
    }

    fn todo(id: i64, title: &str, completed: bool) -> serde_json::Value {
        json!({
            "todolist_id": id,
            "title": title,
            "startDatetime": "2025-03-01T09:00",
            "isRecurring": "NONE",
            "completed": completed
        })
    }

    fn walk() -> NewTodo {
        NewTodo {
            title: "Walk".to_string(),
            start_datetime: "2025-03-01T09:00".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_appends_exactly_one() {
        let (store, transport) = fixture().await;
        transport.push_value(200, &json!([todo(1, "Feed", false)]));
        store.fetch_all(7).await;
        transport.push_value(201, &todo(2, "Walk", false));

        let created = store.create(walk()).await.unwrap();
        assert_eq!(created.todolist_id, 2);
        let ids: Vec<i64> = store.items().iter().map(|t| t.todolist_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(transport.requests()[0].path, "/todolists/user/7");
    }

    #[tokio::test]
    async fn update_replaces_in_place() {
        let (store, transport) = fixture().await;
        transport.push_value(
            200,
            &json!([todo(1, "Feed", false), todo(2, "Walk", false), todo(3, "Bath", false)]),
        );
        store.fetch_all(7).await;
        transport.push_value(200, &todo(2, "Long walk", false));

        store
            .update(2, TodoPatch {
                title: Some("Long walk".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let titles: Vec<String> = store.items().into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["Feed", "Long walk", "Bath"]);
    }

    #[tokio::test]
    async fn failed_delete_keeps_item_and_sets_error() {
        let (store, transport) = fixture().await;
        transport.push_value(200, &json!([todo(1, "Feed", false)]));
        store.fetch_all(7).await;
        transport.push_json(404, "missing");

        let err = store.delete(1).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.items().len(), 1);
        assert_eq!(store.snapshot().error, Some(err));
    }

    #[tokio::test]
    async fn complete_sends_flag_and_takes_server_copy() {
        let (store, transport) = fixture().await;
        transport.push_value(200, &json!([todo(1, "Feed", false)]));
        store.fetch_all(7).await;
        transport.push_value(200, &todo(1, "Feed", true));

        let done = store.complete(1, true).await.unwrap();
        assert!(done.completed);
        assert!(store.items()[0].completed);
        assert_eq!(
            transport.requests()[1].url,
            "http://localhost:3000/todolists/1/complete?isCompleted=true"
        );
    }

    #[tokio::test]
    async fn fetch_one_appends_unknown_todo() {
        let (store, transport) = fixture().await;
        transport.push_value(200, &todo(9, "Vet", false));
        store.fetch_one(9).await;
        assert_eq!(store.items()[0].todolist_id, 9);
    }

    #[tokio::test]
    async fn stale_fetch_does_not_clobber_newer_create() {
        let (store, transport) = fixture().await;
        let gate = transport.push_deferred(200, "[]");
        transport.push_value(201, &todo(5, "Walk", false));

        let fetch = store.fetch_all(7);
        let create = async {
            tokio::task::yield_now().await;
            let created = store.create(walk()).await;
            gate.release();
            created
        };
        let ((), created) = tokio::join!(fetch, create);

        assert_eq!(created.unwrap().todolist_id, 5);
        assert_eq!(store.items().len(), 1);
        assert_eq!(store.snapshot().error, None);
    }

    #[tokio::test]
    async fn reset_discards_fetch_in_flight() {
        let (store, transport) = fixture().await;
        let gate = transport.push_deferred(200, &json!([todo(1, "Feed", false)]).to_string());

        let fetch = store.fetch_all(7);
        let reset = async {
            tokio::task::yield_now().await;
            store.reset().await;
            gate.release();
        };
        tokio::join!(fetch, reset);

        assert!(store.items().is_empty());
        assert_eq!(store.snapshot().error, None);
        assert!(!store.snapshot().loading);
    }
}
