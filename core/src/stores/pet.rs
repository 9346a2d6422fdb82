//! Pet store: the user's pets with their record categories.
//!
//! This store is the single source of truth for pet data. The `pets` array
//! inside the persisted profile is regenerated from `items` on every commit,
//! and the persisted write happens first: if it fails, `items` stay as they
//! were and the caller gets `ApiError::Storage`.
//!
//! Until `items` has been loaded (from storage or the server) the persisted
//! list is the baseline: a write made straight after sign-in edits the stored
//! pets instead of replacing them with a one-element list.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use super::{remove, retires_fetches, upsert, Slot, Store, StoreState, Ticket};
use crate::adapter::HttpAdapter;
use crate::error::ApiError;
use crate::types::{Pet, PetDraft, PetUpdate, Record, RecordDraft};

pub struct PetStore {
    adapter: Arc<HttpAdapter>,
    store: Store<Pet>,
    seeded: AtomicBool,
}

impl PetStore {
    pub fn new(adapter: Arc<HttpAdapter>) -> Self {
        Self {
            adapter,
            store: Store::new(),
            seeded: AtomicBool::new(false),
        }
    }

    pub fn snapshot(&self) -> StoreState<Pet> {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreState<Pet>> {
        self.store.subscribe()
    }

    pub fn items(&self) -> Vec<Pet> {
        self.store.items()
    }

    pub fn get(&self, pet_id: i64) -> Option<Pet> {
        self.store.find(pet_id)
    }

    /// Seed `items` from the persisted profile. No network.
    pub async fn load_from_storage(&self) {
        let _op = self.store.begin();
        let result = async {
            let _commit = self.store.lock_commits().await;
            let pets = self.stored_pets().await?;
            self.store.publish(pets, true).await;
            self.seeded.store(true, Ordering::SeqCst);
            Ok(())
        }
        .await;
        self.store.settle_read("loading pets from storage", result);
    }

    /// `GET /users/pets`, replacing `items` wholesale.
    pub async fn fetch_all(&self) {
        let _op = self.store.begin();
        let ticket = self.store.issue(Slot::Collection).await;
        let result = async {
            let client = self.adapter.client();
            let response = self.adapter.send(client.build_list_pets()).await?;
            let pets = client.parse_pets(response)?;
            self.commit(Some(&ticket), |items| {
                *items = pets;
                Ok(())
            })
            .await
        }
        .await;
        self.store.settle_read("fetching pets", result);
    }

    /// Persist a draft. The returned pet carries the server-assigned id.
    pub async fn create(&self, draft: PetDraft) -> Result<Pet, ApiError> {
        let _op = self.store.begin();
        let result = async {
            draft.validate()?;
            let client = self.adapter.client();
            let response = self.adapter.send(client.build_create_pet(&draft)?).await?;
            let created = client.parse_create_pet(response)?;
            let pet = draft.into_pet(created.pet_id);
            let committed = pet.clone();
            self.commit(None, |items| {
                upsert(items, committed);
                Ok(())
            })
            .await?;
            info!(pet_id = pet.pet_id, "pet created");
            Ok(pet)
        }
        .await;
        self.store.settle(result)
    }

    /// Send a partial update and merge it into the local pet. Records are
    /// kept as they are.
    pub async fn update(&self, pet_id: i64, patch: PetUpdate) -> Result<Pet, ApiError> {
        let _op = self.store.begin();
        let ticket = self.store.issue(Slot::Item(pet_id)).await;
        let result = async {
            patch.validate()?;
            let client = self.adapter.client();
            let response = self.adapter.send(client.build_update_pet(pet_id, &patch)?).await?;
            client.parse_empty(response)?;

            let mut updated = None;
            self.commit(Some(&ticket), |items| {
                let pet = find_mut(items, pet_id)?;
                patch.apply_to(pet);
                updated = Some(pet.clone());
                Ok(())
            })
            .await?;
            info!(pet_id, "pet updated");
            updated.ok_or(ApiError::Superseded)
        }
        .await;
        self.store.settle(result)
    }

    /// Delete a pet. Clears the selection when it pointed at this pet.
    pub async fn delete(&self, pet_id: i64) -> Result<(), ApiError> {
        let _op = self.store.begin();
        let ticket = self.store.issue(Slot::Item(pet_id)).await;
        let result = async {
            let client = self.adapter.client();
            let response = self.adapter.send(client.build_delete_pet(pet_id)).await?;
            client.parse_empty(response)?;
            self.commit(Some(&ticket), |items| {
                remove(items, pet_id);
                Ok(())
            })
            .await?;
            info!(pet_id, "pet deleted");

            if let Err(e) = self.forget_selection(pet_id).await {
                warn!(pet_id, error = %e, "pet deleted but selection not cleared");
            }
            Ok(())
        }
        .await;
        self.store.settle(result)
    }

    /// Create a record category on one pet.
    pub async fn add_record(&self, pet_id: i64, draft: RecordDraft) -> Result<Record, ApiError> {
        let _op = self.store.begin();
        let result = async {
            draft.validate()?;
            if self.lookup(pet_id).await?.is_none() {
                return Err(ApiError::validation(format!("unknown pet {pet_id}")));
            }
            let client = self.adapter.client();
            let response = self
                .adapter
                .send(client.build_create_record(pet_id, &draft)?)
                .await?;
            let record = client.parse_record(response)?;
            let committed = record.clone();
            self.commit(None, |items| {
                find_mut(items, pet_id)?.records.push(committed);
                Ok(())
            })
            .await?;
            info!(pet_id, record_id = record.record_id, "record added");
            Ok(record)
        }
        .await;
        self.store.settle(result)
    }

    /// Delete one record category. Sibling records and other pets are left
    /// untouched.
    pub async fn remove_record(&self, pet_id: i64, record_id: i64) -> Result<(), ApiError> {
        let _op = self.store.begin();
        let result = async {
            if self.lookup(pet_id).await?.is_none() {
                return Err(ApiError::validation(format!("unknown pet {pet_id}")));
            }
            let client = self.adapter.client();
            let response = self.adapter.send(client.build_delete_record(record_id)).await?;
            client.parse_empty(response)?;
            self.commit(None, |items| {
                find_mut(items, pet_id)?
                    .records
                    .retain(|r| r.record_id != record_id);
                Ok(())
            })
            .await?;
            info!(pet_id, record_id, "record removed");
            Ok(())
        }
        .await;
        self.store.settle(result)
    }

    pub async fn selected_pet_id(&self) -> Result<Option<i64>, ApiError> {
        self.adapter.credentials().selected_pet_id().await
    }

    /// Remember `pet_id` as the selected pet. Only known pets can be selected.
    pub async fn select_pet(&self, pet_id: i64) -> Result<(), ApiError> {
        if self.lookup(pet_id).await?.is_none() {
            return Err(ApiError::validation(format!("unknown pet {pet_id}")));
        }
        self.adapter.credentials().set_selected_pet_id(Some(pet_id)).await
    }

    pub async fn clear_selection(&self) -> Result<(), ApiError> {
        self.adapter.credentials().set_selected_pet_id(None).await
    }

    /// Drop every pet from memory. The persisted copy is the credential
    /// store's to clear.
    pub async fn reset(&self) {
        self.store.clear().await;
        self.seeded.store(false, Ordering::SeqCst);
    }

    async fn stored_pets(&self) -> Result<Vec<Pet>, ApiError> {
        Ok(self
            .adapter
            .credentials()
            .profile()
            .await?
            .map(|p| p.pets)
            .unwrap_or_default())
    }

    async fn lookup(&self, pet_id: i64) -> Result<Option<Pet>, ApiError> {
        if self.seeded.load(Ordering::SeqCst) {
            return Ok(self.store.find(pet_id));
        }
        Ok(self.stored_pets().await?.into_iter().find(|p| p.pet_id == pet_id))
    }

    async fn forget_selection(&self, pet_id: i64) -> Result<(), ApiError> {
        let credentials = self.adapter.credentials();
        if credentials.selected_pet_id().await? == Some(pet_id) {
            credentials.set_selected_pet_id(None).await?;
        }
        Ok(())
    }

    /// Apply `edit` to a copy of the items, persist the copy, then publish.
    async fn commit<F>(&self, ticket: Option<&Ticket>, edit: F) -> Result<(), ApiError>
    where
        F: FnOnce(&mut Vec<Pet>) -> Result<(), ApiError>,
    {
        let _commit = self.store.lock_commits().await;
        self.store.check(ticket).await?;
        let mut pets = if self.seeded.load(Ordering::SeqCst) {
            self.store.items()
        } else {
            self.stored_pets().await?
        };
        edit(&mut pets)?;
        if self.adapter.credentials().replace_pets(&pets).await?.is_none() {
            warn!("no stored profile, pet snapshot not persisted");
        }
        self.store.publish(pets, retires_fetches(ticket)).await;
        self.seeded.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// The pet may have been removed by a request that committed first.
fn find_mut(items: &mut [Pet], pet_id: i64) -> Result<&mut Pet, ApiError> {
    items
        .iter_mut()
        .find(|p| p.pet_id == pet_id)
        .ok_or(ApiError::Superseded)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use serde_json::json;

    use super::*;
    use crate::config::ClientConfig;
    use crate::credentials::tests::FlakyStorage;
    use crate::credentials::{CredentialStore, SELECTED_PET_KEY, USER_INFO_KEY};
    use crate::storage::{MemoryStorage, SecureStorage};
    use crate::testing::ScriptedTransport;
    use crate::types::{RecordType, UserProfile};

    struct Fixture {
        pets: PetStore,
        transport: Arc<ScriptedTransport>,
        credentials: Arc<CredentialStore>,
    }

    async fn fixture_with(storage: Arc<dyn SecureStorage>) -> Fixture {
        let credentials = Arc::new(CredentialStore::new(storage));
        credentials
            .save("tok", &UserProfile {
                email: Some("a@b.com".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        let adapter = Arc::new(HttpAdapter::new(
            ClientConfig::default(),
            transport.clone(),
            credentials.clone(),
        ));
        Fixture {
            pets: PetStore::new(adapter),
            transport,
            credentials,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(Arc::new(MemoryStorage::new())).await
    }

    fn rex() -> PetDraft {
        PetDraft {
            pet_name: "Rex".to_string(),
            species: "dog".to_string(),
            breed: "beagle".to_string(),
            ..Default::default()
        }
    }

    fn pet_json(id: i64, name: &str, records: serde_json::Value) -> serde_json::Value {
        json!({"petId": id, "pet_name": name, "species": "dog", "records": records})
    }

    fn record_json(id: i64, title: &str) -> serde_json::Value {
        json!({"recordId": id, "title": title, "recordType": "GRAPH", "unit": "kg"})
    }

    async fn persisted_pets(credentials: &CredentialStore) -> Vec<Pet> {
        credentials.profile().await.unwrap().unwrap().pets
    }

    #[tokio::test]
    async fn create_appends_pet_with_server_id() {
        let f = fixture().await;
        f.transport.push_json(201, r#"{"petId":42}"#);

        let pet = f.pets.create(rex()).await.unwrap();
        assert_eq!(pet.pet_id, 42);
        assert_eq!(pet.pet_name, "Rex");

        let items = f.pets.items();
        assert_eq!(items, vec![pet.clone()]);
        assert_eq!(persisted_pets(&f.credentials).await, items);
        assert!(!f.pets.snapshot().loading);
    }

    #[tokio::test]
    async fn invalid_draft_never_reaches_network() {
        let f = fixture().await;
        let err = f
            .pets
            .create(PetDraft {
                species: "cat".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(f.transport.requests().is_empty());
        assert_eq!(f.pets.snapshot().error, Some(err));
    }

    #[tokio::test]
    async fn failed_create_leaves_items_and_snapshot() {
        let f = fixture().await;
        f.transport.push_value(200, &json!([pet_json(1, "Mia", json!([]))]));
        f.pets.fetch_all().await;
        let before = f.pets.items();

        f.transport.push_json(500, "boom");
        let err = f.pets.create(rex()).await.unwrap_err();
        assert!(matches!(err, ApiError::Http { status: 500, .. }));
        assert_eq!(f.pets.items(), before);
        assert_eq!(persisted_pets(&f.credentials).await, before);
    }

    #[tokio::test]
    async fn storage_failure_leaves_store_unchanged() {
        let storage = Arc::new(FlakyStorage::new(USER_INFO_KEY));
        let f = fixture_with(storage.clone()).await;
        storage.fail.store(true, Ordering::SeqCst);
        f.transport.push_json(201, r#"{"petId":7}"#);

        let err = f.pets.create(rex()).await.unwrap_err();
        assert!(matches!(err, ApiError::Storage(_)));
        assert!(f.pets.items().is_empty());
        assert!(persisted_pets(&f.credentials).await.is_empty());
    }

    async fn fetched(f: &Fixture) -> Vec<Pet> {
        f.transport.push_value(
            200,
            &json!([
                pet_json(1, "Mia", json!([record_json(10, "Weight")])),
                pet_json(2, "Bo", json!([]))
            ]),
        );
        f.pets.fetch_all().await;
        f.pets.items()
    }

    fn ids(pets: &[Pet]) -> Vec<i64> {
        pets.iter().map(|p| p.pet_id).collect()
    }

    #[tokio::test]
    async fn first_write_after_sign_in_keeps_stored_pets() {
        let f = fixture().await;
        let stored: Vec<Pet> = vec![
            serde_json::from_value(pet_json(1, "Mia", json!([]))).unwrap(),
            serde_json::from_value(pet_json(2, "Bo", json!([]))).unwrap(),
        ];
        f.credentials.replace_pets(&stored).await.unwrap();
        f.transport.push_json(201, r#"{"petId":3}"#);

        f.pets.create(rex()).await.unwrap();
        assert_eq!(ids(&persisted_pets(&f.credentials).await), vec![1, 2, 3]);
        assert_eq!(ids(&f.pets.items()), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn records_can_be_added_before_pets_are_loaded() {
        let f = fixture().await;
        let stored: Pet = serde_json::from_value(pet_json(1, "Mia", json!([]))).unwrap();
        f.credentials.replace_pets(&[stored]).await.unwrap();
        f.transport.push_value(201, &record_json(12, "Meals"));

        f.pets.add_record(1, RecordDraft::graph("Meals", "g")).await.unwrap();
        assert_eq!(persisted_pets(&f.credentials).await[0].records.len(), 1);
        assert_eq!(f.pets.get(1).unwrap().records.len(), 1);
    }

    #[tokio::test]
    async fn failed_update_leaves_items_and_snapshot() {
        let f = fixture().await;
        let before = fetched(&f).await;
        f.transport.push_json(500, "boom");

        let err = f
            .pets
            .update(1, PetUpdate {
                pet_name: Some("Max".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Http { status: 500, .. }));
        assert_eq!(f.pets.items(), before);
        assert_eq!(persisted_pets(&f.credentials).await, before);
    }

    #[tokio::test]
    async fn delete_with_unwritable_profile_keeps_pet() {
        let storage = Arc::new(FlakyStorage::new(USER_INFO_KEY));
        let f = fixture_with(storage.clone()).await;
        let before = fetched(&f).await;
        storage.fail.store(true, Ordering::SeqCst);
        f.transport.push_json(204, "");

        let err = f.pets.delete(1).await.unwrap_err();
        assert!(matches!(err, ApiError::Storage(_)));
        assert_eq!(f.pets.items(), before);
        assert_eq!(persisted_pets(&f.credentials).await, before);
    }

    #[tokio::test]
    async fn failed_add_record_leaves_items_and_snapshot() {
        let f = fixture().await;
        let before = fetched(&f).await;
        f.transport.push_json(500, "boom");

        let err = f
            .pets
            .add_record(1, RecordDraft::graph("Meals", "g"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Http { status: 500, .. }));
        assert_eq!(f.pets.items(), before);
        assert_eq!(persisted_pets(&f.credentials).await, before);
    }

    #[tokio::test]
    async fn remove_record_with_unwritable_profile_keeps_record() {
        let storage = Arc::new(FlakyStorage::new(USER_INFO_KEY));
        let f = fixture_with(storage.clone()).await;
        let before = fetched(&f).await;
        storage.fail.store(true, Ordering::SeqCst);
        f.transport.push_json(204, "");

        let err = f.pets.remove_record(1, 10).await.unwrap_err();
        assert!(matches!(err, ApiError::Storage(_)));
        assert_eq!(f.pets.items(), before);
        assert_eq!(persisted_pets(&f.credentials).await, before);
    }

    #[tokio::test]
    async fn delete_succeeds_when_selection_cannot_be_cleared() {
        let storage = Arc::new(FlakyStorage::new(SELECTED_PET_KEY));
        let f = fixture_with(storage.clone()).await;
        fetched(&f).await;
        f.pets.select_pet(1).await.unwrap();
        storage.fail.store(true, Ordering::SeqCst);
        f.transport.push_json(204, "");

        f.pets.delete(1).await.unwrap();
        assert_eq!(ids(&f.pets.items()), vec![2]);
        assert_eq!(persisted_pets(&f.credentials).await, f.pets.items());
        assert!(f.pets.snapshot().error.is_none());
    }

    #[tokio::test]
    async fn fetch_failure_is_recorded_not_returned() {
        let f = fixture().await;
        f.transport.push_network_error("offline");
        f.pets.fetch_all().await;

        let state = f.pets.snapshot();
        assert!(matches!(state.error, Some(ApiError::Network(_))));
        assert!(state.items.is_empty());
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn update_merges_patch_and_keeps_records() {
        let f = fixture().await;
        f.transport.push_value(
            200,
            &json!([
                pet_json(1, "Mia", json!([record_json(10, "Weight")])),
                pet_json(2, "Bo", json!([]))
            ]),
        );
        f.pets.fetch_all().await;
        f.transport.push_json(200, "{}");

        let updated = f
            .pets
            .update(1, PetUpdate {
                breed: Some("siamese".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.breed, "siamese");
        assert_eq!(updated.records.len(), 1);

        let items = f.pets.items();
        assert_eq!(items[0], updated);
        assert_eq!(items[1].pet_name, "Bo");
        assert_eq!(persisted_pets(&f.credentials).await, items);
    }

    #[tokio::test]
    async fn delete_cascades_to_snapshot_and_selection() {
        let f = fixture().await;
        f.transport
            .push_value(200, &json!([pet_json(1, "Mia", json!([])), pet_json(2, "Bo", json!([]))]));
        f.pets.fetch_all().await;
        f.pets.select_pet(1).await.unwrap();
        f.transport.push_json(204, "");

        f.pets.delete(1).await.unwrap();
        let items = f.pets.items();
        assert_eq!(items.iter().map(|p| p.pet_id).collect::<Vec<_>>(), vec![2]);
        assert_eq!(persisted_pets(&f.credentials).await, items);
        assert_eq!(f.pets.selected_pet_id().await.unwrap(), None);
    }

    #[tokio::test]
    async fn add_then_remove_record_restores_records() {
        let f = fixture().await;
        f.transport.push_value(
            200,
            &json!([
                pet_json(1, "Mia", json!([record_json(10, "Weight"), record_json(11, "Water")])),
                pet_json(2, "Bo", json!([record_json(20, "Walks")]))
            ]),
        );
        f.pets.fetch_all().await;
        let before = f.pets.items();

        f.transport.push_value(201, &record_json(12, "Meals"));
        let record = f.pets.add_record(1, RecordDraft::graph("Meals", "g")).await.unwrap();
        assert_eq!(record.record_type, RecordType::Graph);
        assert_eq!(f.pets.get(1).unwrap().records.len(), 3);

        f.transport.push_json(204, "");
        f.pets.remove_record(1, record.record_id).await.unwrap();
        assert_eq!(f.pets.items(), before);
        assert_eq!(persisted_pets(&f.credentials).await, before);

        let sent = f.transport.requests();
        assert_eq!(sent[1].url, "http://localhost:3000/records/category?pet_id=1");
        assert_eq!(sent[2].path, "/records/12");
    }

    #[tokio::test]
    async fn photo_record_with_unit_is_rejected() {
        let f = fixture().await;
        let mut draft = RecordDraft::photo("Walks");
        draft.unit = Some("km".to_string());
        let err = f.pets.add_record(1, draft).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(f.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn selecting_unknown_pet_is_validation_error() {
        let f = fixture().await;
        let err = f.pets.select_pet(99).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn load_from_storage_seeds_items() {
        let f = fixture().await;
        f.transport.push_json(201, r#"{"petId":5}"#);
        f.pets.create(rex()).await.unwrap();

        let fresh = PetStore::new(Arc::new(HttpAdapter::new(
            ClientConfig::default(),
            f.transport.clone(),
            f.credentials.clone(),
        )));
        fresh.load_from_storage().await;
        assert_eq!(fresh.items(), f.pets.items());
    }

    #[tokio::test]
    async fn stale_update_is_superseded() {
        let f = fixture().await;
        f.transport.push_value(200, &json!([pet_json(1, "Mia", json!([]))]));
        f.pets.fetch_all().await;

        let first_gate = f.transport.push_deferred(200, "{}");
        f.transport.push_json(200, "{}");
        let first = f.pets.update(1, PetUpdate {
            pet_name: Some("Old".to_string()),
            ..Default::default()
        });
        let second = async {
            tokio::task::yield_now().await;
            let result = f
                .pets
                .update(1, PetUpdate {
                    pet_name: Some("New".to_string()),
                    ..Default::default()
                })
                .await;
            first_gate.release();
            result
        };
        let (first, second) = tokio::join!(first, second);

        assert_eq!(first.unwrap_err(), ApiError::Superseded);
        assert_eq!(second.unwrap().pet_name, "New");
        assert_eq!(f.pets.get(1).unwrap().pet_name, "New");
        assert_eq!(f.pets.snapshot().error, None);
        assert!(!f.pets.snapshot().loading);
    }
}
