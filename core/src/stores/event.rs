//! Calendar event store.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use super::{remove, upsert, Slot, Store, StoreState};
use crate::adapter::HttpAdapter;
use crate::client::ApiClient;
use crate::error::ApiError;
use crate::http::HttpRequest;
use crate::types::{Event, EventPatch, EventRange, NewEvent};

pub struct EventStore {
    adapter: Arc<HttpAdapter>,
    store: Store<Event>,
}

impl EventStore {
    pub fn new(adapter: Arc<HttpAdapter>) -> Self {
        Self {
            adapter,
            store: Store::new(),
        }
    }

    pub fn snapshot(&self) -> StoreState<Event> {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreState<Event>> {
        self.store.subscribe()
    }

    pub fn items(&self) -> Vec<Event> {
        self.store.items()
    }

    /// `GET /events`.
    pub async fn fetch_all(&self) {
        self.fetch_collection("fetching events", ApiClient::build_list_events)
            .await;
    }

    /// Only the events inside the current day, week or month.
    pub async fn fetch_range(&self, range: EventRange) {
        self.fetch_collection("fetching event range", |client| client.build_event_range(range))
            .await;
    }

    async fn fetch_collection<F>(&self, what: &'static str, build: F)
    where
        F: FnOnce(&ApiClient) -> HttpRequest,
    {
        let _op = self.store.begin();
        let ticket = self.store.issue(Slot::Collection).await;
        let result = async {
            let client = self.adapter.client();
            let response = self.adapter.send(build(client)).await?;
            let events = client.parse_events(response)?;
            self.store.apply(Some(&ticket), |items| *items = events).await
        }
        .await;
        self.store.settle_read(what, result);
    }

    pub async fn fetch_one(&self, event_id: i64) {
        let _op = self.store.begin();
        let ticket = self.store.issue(Slot::Item(event_id)).await;
        let result = async {
            let client = self.adapter.client();
            let response = self.adapter.send(client.build_get_event(event_id)).await?;
            let event = client.parse_event(response)?;
            self.store.apply(Some(&ticket), |items| upsert(items, event)).await
        }
        .await;
        self.store.settle_read("fetching event", result);
    }

    pub async fn create(&self, input: NewEvent) -> Result<Event, ApiError> {
        let _op = self.store.begin();
        let result = async {
            input.validate()?;
            let client = self.adapter.client();
            let response = self.adapter.send(client.build_create_event(&input)?).await?;
            let event = client.parse_event(response)?;
            let committed = event.clone();
            self.store.apply(None, |items| items.push(committed)).await?;
            info!(event_id = event.event_id, "event created");
            Ok(event)
        }
        .await;
        self.store.settle(result)
    }

    pub async fn update(&self, event_id: i64, patch: EventPatch) -> Result<Event, ApiError> {
        let _op = self.store.begin();
        let ticket = self.store.issue(Slot::Item(event_id)).await;
        let result = async {
            if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
                return Err(ApiError::validation("title is required"));
            }
            let client = self.adapter.client();
            let response = self
                .adapter
                .send(client.build_update_event(event_id, &patch)?)
                .await?;
            let event = client.parse_event(response)?;
            let committed = event.clone();
            self.store.apply(Some(&ticket), |items| upsert(items, committed)).await?;
            info!(event_id, "event updated");
            Ok(event)
        }
        .await;
        self.store.settle(result)
    }

    pub async fn delete(&self, event_id: i64) -> Result<(), ApiError> {
        let _op = self.store.begin();
        let ticket = self.store.issue(Slot::Item(event_id)).await;
        let result = async {
            let client = self.adapter.client();
            let response = self.adapter.send(client.build_delete_event(event_id)).await?;
            client.parse_empty(response)?;
            self.store.apply(Some(&ticket), |items| remove(items, event_id)).await?;
            info!(event_id, "event deleted");
            Ok(())
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

    async fn fixture(signed_in: bool) -> (EventStore, Arc<ScriptedTransport>) {
        let credentials = Arc::new(CredentialStore::new(Arc::new(MemoryStorage::new())));
        if signed_in {
            credentials
                .save("tok", &crate::types::UserProfile::default())
                .await
                .unwrap();
        }
        let transport = Arc::new(ScriptedTransport::new());
        let adapter = HttpAdapter::new(ClientConfig::default(), transport.clone(), credentials);
        (EventStore::new(Arc::new(adapter)), transport)
    }

    fn event(id: i64, title: &str) -> serde_json::Value {
        json!({
            "event_id": id,
            "title": title,
            "startDatetime": "2025-03-01T09:00",
            "endDatetime": "2025-03-01T10:00",
            "isRecurring": "NONE",
            "memo": "",
            "category": "vet",
            "allDay": false
        })
    }

    #[tokio::test]
    async fn fetch_range_uses_range_path_and_replaces_items() {
        let (store, transport) = fixture(true).await;
        transport.push_value(200, &json!([event(1, "a"), event(2, "b")]));
        store.fetch_all().await;
        transport.push_value(200, &json!([event(3, "c")]));

        store.fetch_range(EventRange::Week).await;
        assert_eq!(store.items().len(), 1);
        assert_eq!(store.items()[0].event_id, 3);
        assert_eq!(transport.requests()[1].path, "/events/events/week");
    }

    #[tokio::test]
    async fn create_requires_both_ends_before_network() {
        let (store, transport) = fixture(true).await;
        let err = store
            .create(NewEvent {
                title: "Grooming".to_string(),
                start_datetime: "2025-03-01T09:00".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn signed_out_create_is_auth_required() {
        let (store, transport) = fixture(false).await;
        let err = store
            .create(NewEvent {
                title: "Grooming".to_string(),
                start_datetime: "2025-03-01T09:00".to_string(),
                end_datetime: "2025-03-01T10:00".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::AuthRequired);
        assert!(transport.requests().is_empty());
        assert!(store.items().is_empty());
    }

    #[tokio::test]
    async fn update_and_delete() {
        let (store, transport) = fixture(true).await;
        transport.push_value(200, &json!([event(1, "a"), event(2, "b")]));
        store.fetch_all().await;

        transport.push_value(200, &event(1, "renamed"));
        store
            .update(1, EventPatch {
                title: Some("renamed".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(store.items()[0].title, "renamed");

        transport.push_json(200, "");
        store.delete(2).await.unwrap();
        let ids: Vec<i64> = store.items().iter().map(|e| e.event_id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[tokio::test]
    async fn read_failure_keeps_items() {
        let (store, transport) = fixture(true).await;
        transport.push_value(200, &json!([event(1, "a")]));
        store.fetch_all().await;
        transport.push_json(503, "down");

        store.fetch_one(1).await;
        let state = store.snapshot();
        assert_eq!(state.items.len(), 1);
        assert!(matches!(state.error, Some(ApiError::Http { status: 503, .. })));
    }
}
