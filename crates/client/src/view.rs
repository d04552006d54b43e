//! Per-screen local view of a remote collection.
//!
//! A view owns the list a screen is showing. It changes only on outcomes
//! the session reports as successful, so a failed remote delete never makes
//! an entity disappear.

use std::sync::Arc;

use storefront_core::{Entity, EntityId, Resource};

use crate::session::EndpointSession;
use crate::types::{CreateOutcome, DataSource, DeleteOutcome, PendingLocal};

pub struct ResourceView<R: Resource> {
    session: Arc<EndpointSession>,
    items: Vec<R::Entity>,
    source: Option<DataSource>,
}

impl<R: Resource> ResourceView<R> {
    pub fn new(session: Arc<EndpointSession>) -> Self {
        Self { session, items: Vec::new(), source: None }
    }

    pub fn session(&self) -> &Arc<EndpointSession> {
        &self.session
    }

    /// Reload the list from the session. Returns where the data came from.
    pub async fn refresh(&mut self) -> &DataSource {
        let fetched = self.session.fetch_collection::<R>().await;
        tracing::debug!(resource = R::NAME, items = fetched.items.len(), "view refreshed");
        self.items = fetched.items;
        self.source.insert(fetched.source)
    }

    pub fn items(&self) -> &[R::Entity] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &EntityId) -> Option<&R::Entity> {
        self.items.iter().find(|item| item.id() == id)
    }

    /// `None` until the first refresh.
    pub fn source(&self) -> Option<&DataSource> {
        self.source.as_ref()
    }

    /// True when the list shows sample data instead of server data.
    pub fn is_sample(&self) -> bool {
        self.source.as_ref().is_some_and(DataSource::is_sample)
    }

    /// Create through the session; the created entity is appended.
    pub async fn create(&mut self, draft: &R::Draft) -> CreateOutcome<R> {
        let outcome = self.session.create_entity::<R>(draft).await;
        if let Some(entity) = outcome.entity() {
            self.items.push(entity.clone());
        }
        outcome
    }

    /// Keep a failed create locally and show it.
    pub fn accept_local(&mut self, pending: PendingLocal<R>) -> CreateOutcome<R> {
        let outcome = self.session.accept_local(pending);
        if let Some(entity) = outcome.entity() {
            self.items.push(entity.clone());
        }
        outcome
    }

    /// Delete an entity shown in this view. It is removed from the list only
    /// when the session reports the removal.
    pub async fn delete(&mut self, id: &EntityId) -> DeleteOutcome {
        if self.get(id).is_none() {
            return DeleteOutcome::NotFound;
        }

        let outcome = self.session.delete_entity::<R>(id).await;
        if outcome.is_removed() {
            self.items.retain(|item| item.id() != id);
        }
        outcome
    }
}

impl<R: Resource> core::fmt::Debug for ResourceView<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ResourceView")
            .field("resource", &R::NAME)
            .field("items", &self.items.len())
            .field("source", &self.source)
            .finish()
    }
}
