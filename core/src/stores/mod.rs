//! Resource stores: in-memory mirrors of server collections.
//!
//! # Design
//! Each store owns one `Store<T>`, which holds the observable state in a
//! `tokio::sync::watch` channel so a UI can subscribe and re-render on every
//! commit. The protocol for every operation is the same:
//!
//! 1. `begin()` marks the store loading and clears the last error. The
//!    returned guard ends the operation when dropped, even if the caller's
//!    future is cancelled.
//! 2. The request goes to the server. Nothing local changes yet.
//! 3. On success the store commits under `commit_lock`; on failure it records
//!    the error and leaves `items` untouched.
//!
//! Replacing operations (fetches, updates, deletes) take a generation ticket
//! for their slot before sending. A response whose ticket is no longer the
//! latest for that slot is dropped, so the last *issued* request wins rather
//! than the last to arrive. Every committed mutation also retires in-flight
//! collection fetches, whose lists predate it.

mod event;
mod pet;
mod todo;

pub use event::EventStore;
pub use pet::PetStore;
pub use todo::TodoStore;

use std::collections::HashMap;

use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::warn;

use crate::error::ApiError;
use crate::types::{Event, Pet, Todo};

/// Observable state of a resource store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreState<T> {
    pub items: Vec<T>,
    pub loading: bool,
    pub error: Option<ApiError>,
}

impl<T> Default for StoreState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
        }
    }
}

/// Entities with a server-assigned id.
pub trait Identified {
    fn id(&self) -> i64;
}

impl Identified for Pet {
    fn id(&self) -> i64 {
        self.pet_id
    }
}

impl Identified for Todo {
    fn id(&self) -> i64 {
        self.todolist_id
    }
}

impl Identified for Event {
    fn id(&self) -> i64 {
        self.event_id
    }
}

/// What a generation ticket protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Slot {
    Collection,
    Item(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ticket {
    slot: Slot,
    generation: u64,
}

impl Ticket {
    fn is_fetch(&self) -> bool {
        self.slot == Slot::Collection
    }
}

/// Whether committing under `ticket` should retire in-flight fetches.
pub(crate) fn retires_fetches(ticket: Option<&Ticket>) -> bool {
    !ticket.is_some_and(Ticket::is_fetch)
}

#[derive(Debug, Default)]
struct Generations {
    next: u64,
    latest: HashMap<Slot, u64>,
}

impl Generations {
    fn issue(&mut self, slot: Slot) -> Ticket {
        self.next += 1;
        self.latest.insert(slot, self.next);
        Ticket {
            slot,
            generation: self.next,
        }
    }

    fn is_current(&self, ticket: &Ticket) -> bool {
        self.latest.get(&ticket.slot) == Some(&ticket.generation)
    }
}

pub(crate) struct Store<T> {
    state: watch::Sender<StoreState<T>>,
    in_flight: std::sync::atomic::AtomicUsize,
    generations: Mutex<Generations>,
    commit_lock: Mutex<()>,
}

/// Ends an operation when dropped.
pub(crate) struct Pending<'a, T> {
    store: &'a Store<T>,
}

impl<T> Drop for Pending<'_, T> {
    fn drop(&mut self) {
        let in_flight = &self.store.in_flight;
        self.store.state.send_modify(|state| {
            let left = in_flight.fetch_sub(1, std::sync::atomic::Ordering::SeqCst) - 1;
            state.loading = left > 0;
        });
    }
}

impl<T: Clone + Identified> Store<T> {
    pub(crate) fn new() -> Self {
        let (state, _) = watch::channel(StoreState::default());
        Self {
            state,
            in_flight: std::sync::atomic::AtomicUsize::new(0),
            generations: Mutex::new(Generations::default()),
            commit_lock: Mutex::new(()),
        }
    }

    pub(crate) fn snapshot(&self) -> StoreState<T> {
        self.state.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<StoreState<T>> {
        self.state.subscribe()
    }

    pub(crate) fn items(&self) -> Vec<T> {
        self.state.borrow().items.clone()
    }

    pub(crate) fn find(&self, id: i64) -> Option<T> {
        self.state.borrow().items.iter().find(|i| i.id() == id).cloned()
    }

    pub(crate) fn begin(&self) -> Pending<'_, T> {
        let in_flight = &self.in_flight;
        self.state.send_modify(|state| {
            in_flight.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            state.loading = true;
            state.error = None;
        });
        Pending { store: self }
    }

    pub(crate) async fn issue(&self, slot: Slot) -> Ticket {
        self.generations.lock().await.issue(slot)
    }

    /// Record `err` as the store's last error and hand it back.
    pub(crate) fn fail(&self, err: ApiError) -> ApiError {
        let stored = err.clone();
        self.state.send_modify(|state| state.error = Some(stored));
        err
    }

    /// Serialize commits. Held across persistence writes by stores that keep
    /// a persisted copy, so the copy and `items` change together.
    pub(crate) async fn lock_commits(&self) -> MutexGuard<'_, ()> {
        self.commit_lock.lock().await
    }

    /// Whether a response for `ticket` may still be applied. Call with the
    /// commit lock held.
    pub(crate) async fn check(&self, ticket: Option<&Ticket>) -> Result<(), ApiError> {
        match ticket {
            Some(t) if !self.generations.lock().await.is_current(t) => {
                warn!(slot = ?t.slot, generation = t.generation, "discarding stale response");
                Err(ApiError::Superseded)
            }
            _ => Ok(()),
        }
    }

    /// Publish a new item list. Call with the commit lock held.
    pub(crate) async fn publish(&self, items: Vec<T>, retire_fetches: bool) {
        if retire_fetches {
            self.generations.lock().await.issue(Slot::Collection);
        }
        self.state.send_modify(|state| state.items = items);
    }

    /// Drop every item and retire in-flight fetches.
    pub(crate) async fn clear(&self) {
        let _commit = self.lock_commits().await;
        self.publish(Vec::new(), true).await;
    }

    /// Check the ticket, edit a copy of the items and publish it.
    pub(crate) async fn apply<F>(&self, ticket: Option<&Ticket>, edit: F) -> Result<(), ApiError>
    where
        F: FnOnce(&mut Vec<T>),
    {
        let _commit = self.lock_commits().await;
        self.check(ticket).await?;
        let mut items = self.items();
        edit(&mut items);
        self.publish(items, retires_fetches(ticket)).await;
        Ok(())
    }

    /// Finish a write: failures other than `Superseded` become the store's
    /// error, and every failure goes back to the caller.
    pub(crate) fn settle<R>(&self, result: Result<R, ApiError>) -> Result<R, ApiError> {
        result.map_err(|err| match err {
            ApiError::Superseded => err,
            other => self.fail(other),
        })
    }

    /// Finish a read: failures are recorded, never returned.
    pub(crate) fn settle_read(&self, what: &'static str, result: Result<(), ApiError>) {
        match result {
            Ok(()) | Err(ApiError::Superseded) => {}
            Err(err) => {
                warn!(error = %err, "{what} failed");
                self.fail(err);
            }
        }
    }
}

/// Replace the item with `item`'s id in place, or append it when absent.
pub(crate) fn upsert<T: Identified>(items: &mut Vec<T>, item: T) {
    match items.iter_mut().find(|i| i.id() == item.id()) {
        Some(slot) => *slot = item,
        None => items.push(item),
    }
}

pub(crate) fn remove<T: Identified>(items: &mut Vec<T>, id: i64) {
    items.retain(|i| i.id() != id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item(i64, &'static str);

    impl Identified for Item {
        fn id(&self) -> i64 {
            self.0
        }
    }

    #[test]
    fn upsert_replaces_in_place_and_keeps_order() {
        let mut items = vec![Item(1, "a"), Item(2, "b"), Item(3, "c")];
        upsert(&mut items, Item(2, "B"));
        assert_eq!(items, vec![Item(1, "a"), Item(2, "B"), Item(3, "c")]);
        upsert(&mut items, Item(4, "d"));
        assert_eq!(items.len(), 4);
    }

    #[tokio::test]
    async fn loading_tracks_overlapping_operations() {
        let store: Store<Item> = Store::new();
        let a = store.begin();
        let b = store.begin();
        assert!(store.snapshot().loading);
        drop(a);
        assert!(store.snapshot().loading);
        drop(b);
        assert!(!store.snapshot().loading);
    }

    #[tokio::test]
    async fn begin_clears_previous_error() {
        let store: Store<Item> = Store::new();
        store.fail(ApiError::AuthRequired);
        assert_eq!(store.snapshot().error, Some(ApiError::AuthRequired));
        let _op = store.begin();
        assert_eq!(store.snapshot().error, None);
    }

    #[tokio::test]
    async fn older_ticket_is_superseded() {
        let store: Store<Item> = Store::new();
        let first = store.issue(Slot::Item(1)).await;
        let second = store.issue(Slot::Item(1)).await;
        let other = store.issue(Slot::Item(2)).await;

        assert_eq!(
            store.apply(Some(&first), |items| items.push(Item(1, "old"))).await,
            Err(ApiError::Superseded)
        );
        store
            .apply(Some(&second), |items| items.push(Item(1, "new")))
            .await
            .unwrap();
        store.apply(Some(&other), |items| items.push(Item(2, "x"))).await.unwrap();
        assert_eq!(store.items(), vec![Item(1, "new"), Item(2, "x")]);
    }

    #[tokio::test]
    async fn mutation_retires_inflight_fetch() {
        let store: Store<Item> = Store::new();
        let fetch = store.issue(Slot::Collection).await;
        store.apply(None, |items| items.push(Item(9, "new"))).await.unwrap();

        let stale = store.apply(Some(&fetch), |items| *items = Vec::new()).await;
        assert_eq!(stale, Err(ApiError::Superseded));
        assert_eq!(store.items(), vec![Item(9, "new")]);
    }

    #[tokio::test]
    async fn subscribers_see_commits() {
        let store: Store<Item> = Store::new();
        let mut rx = store.subscribe();
        store.apply(None, |items| items.push(Item(1, "a"))).await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().items, vec![Item(1, "a")]);
    }
}
