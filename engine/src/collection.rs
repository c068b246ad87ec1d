//! The public collection facade.
//!
//! A [`Collection`] exposes the ordered list of live records, keyed access
//! that creates placeholders on demand, and one bound [`RouteHandle`] per
//! configured route.

use crate::coordinator::{CacheState, CollectionCore, PendingRequest, Spawner};
use crate::error::{Error, Result};
use crate::key::{Key, Selector};
use crate::record::{default_model, ItemRef, Model, Record};
use crate::route::Route;
use crate::transport::Transport;
use crate::{Fields, RouteName};
use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Names of facade methods. Routes may not use them.
pub const RESERVED_NAMES: &[&str] = &[
    "builder",
    "items",
    "item",
    "lookup",
    "route",
    "route_names",
    "perform",
    "is_loaded",
    "in_flight",
    "pending_count",
    "key",
];

/// Shared handle to a collection's ordered list of live records.
///
/// The handle stays valid for the life of the collection; reconciliation
/// updates the list it points at.
#[derive(Clone, Default)]
pub struct Items(Arc<RwLock<Vec<ItemRef>>>);

impl Items {
    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Vec<ItemRef>> {
        self.0.write()
    }

    /// Lock the list for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, Vec<ItemRef>> {
        self.0.read()
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<ItemRef> {
        self.0.read().get(index).cloned()
    }

    /// Position of the given record, by identity.
    pub fn position(&self, item: &ItemRef) -> Option<usize> {
        self.0.read().iter().position(|i| i.ptr_eq(item))
    }

    /// Clone the current handles, in order.
    pub fn to_vec(&self) -> Vec<ItemRef> {
        self.0.read().clone()
    }

    /// Clone the current records, in order.
    pub fn snapshot(&self) -> Vec<Record> {
        self.0.read().iter().map(ItemRef::snapshot).collect()
    }

    /// Whether both handles point at the same list.
    pub fn ptr_eq(&self, other: &Items) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Items {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.read().iter()).finish()
    }
}

/// A route bound to its collection.
#[derive(Clone)]
pub struct RouteHandle {
    name: RouteName,
    core: Arc<CollectionCore>,
}

impl RouteHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the route without a request item.
    pub fn call(&self) -> Result<PendingRequest> {
        self.core.perform(&self.name, None)
    }

    /// Run the route for `item`, a key value or a full or partial record.
    pub fn call_with(&self, item: impl Into<Selector>) -> Result<PendingRequest> {
        self.core.perform(&self.name, Some(item.into()))
    }
}

impl fmt::Debug for RouteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteHandle").field("name", &self.name).finish()
    }
}

/// Builder for [`Collection`].
pub struct CollectionBuilder {
    key: Key,
    model: Model,
    routes: Vec<(RouteName, Route)>,
    spawner: Option<Spawner>,
}

impl CollectionBuilder {
    fn new() -> Self {
        Self {
            key: Key::default(),
            model: default_model(),
            routes: Vec::new(),
            spawner: None,
        }
    }

    /// Set the key fields. Defaults to `id`.
    pub fn key(mut self, key: Key) -> Self {
        self.key = key;
        self
    }

    /// Set the model constructor. Defaults to a shallow field copy.
    ///
    /// The constructor runs while the collection is locked and must not call
    /// back into the collection.
    pub fn model<F>(mut self, model: F) -> Self
    where
        F: Fn(Fields) -> Record + Send + Sync + 'static,
    {
        self.model = Arc::new(model);
        self
    }

    /// Drive every new request to settlement in the background.
    ///
    /// Without a spawner a request only runs while someone polls it.
    pub fn spawner<F>(mut self, spawn: F) -> Self
    where
        F: Fn(BoxFuture<'static, ()>) + Send + Sync + 'static,
    {
        self.spawner = Some(Arc::new(spawn));
        self
    }

    pub fn route(mut self, name: impl Into<RouteName>, route: Route) -> Self {
        self.routes.push((name.into(), route));
        self
    }

    pub fn routes(mut self, routes: impl IntoIterator<Item = (RouteName, Route)>) -> Self {
        self.routes.extend(routes);
        self
    }

    /// Validate route names and build the collection.
    pub fn build(self, transport: Arc<dyn Transport>) -> Result<Collection> {
        let mut names = HashSet::new();
        for (name, _) in &self.routes {
            if RESERVED_NAMES.contains(&name.as_str()) {
                return Err(Error::ReservedRouteName(name.clone()));
            }
            if !names.insert(name.clone()) {
                return Err(Error::DuplicateRoute(name.clone()));
            }
        }

        let core = Arc::new(CollectionCore {
            key: self.key,
            model: self.model,
            routes: self.routes.into_iter().collect(),
            transport,
            spawner: self.spawner,
            items: Items::default(),
            state: Mutex::new(CacheState::default()),
        });

        let handles = names
            .into_iter()
            .map(|name| {
                let handle = RouteHandle {
                    name: name.clone(),
                    core: Arc::clone(&core),
                };
                (name, handle)
            })
            .collect();

        Ok(Collection {
            core,
            handles: Arc::new(handles),
        })
    }
}

/// A client-side cache of server-owned records.
///
/// Cloning a collection yields another handle to the same cache.
#[derive(Clone)]
pub struct Collection {
    core: Arc<CollectionCore>,
    handles: Arc<HashMap<RouteName, RouteHandle>>,
}

impl Collection {
    pub fn builder() -> CollectionBuilder {
        CollectionBuilder::new()
    }

    /// The ordered list of live records. Always the same list.
    pub fn items(&self) -> Items {
        self.core.items.clone()
    }

    /// The record for a key, creating a placeholder if none exists yet.
    ///
    /// Repeated calls with the same key return the same record. A placeholder
    /// is built from the selector's fields and joins [`Collection::items`]
    /// only once a response confirms it.
    pub fn item(&self, selector: impl Into<Selector>) -> ItemRef {
        let fields = self.core.key.normalize(selector.into());
        let key = self.core.key.key_of(&fields);

        let mut state = self.core.state.lock();
        if let Some(item) = state.index.lookup(&key) {
            return item.clone();
        }
        if let Some(item) = state.pending.lookup(&key) {
            return item.clone();
        }

        let placeholder = ItemRef::new((self.core.model)(fields));
        state.pending.store(&key, placeholder.clone());
        tracing::trace!(key = %key, "Created placeholder");
        placeholder
    }

    /// The indexed record for a key, ignoring placeholders.
    pub fn lookup(&self, selector: impl Into<Selector>) -> Option<ItemRef> {
        let fields = self.core.key.normalize(selector.into());
        let key = self.core.key.key_of(&fields);
        self.core.state.lock().index.lookup(&key).cloned()
    }

    /// The bound handle for a configured route.
    pub fn route(&self, name: &str) -> Result<&RouteHandle> {
        self.handles
            .get(name)
            .ok_or_else(|| Error::UnknownRoute(name.to_string()))
    }

    pub fn route_names(&self) -> impl Iterator<Item = &str> {
        self.handles.keys().map(String::as_str)
    }

    /// Run a route by name.
    pub fn perform(&self, name: &str, item: Option<Selector>) -> Result<PendingRequest> {
        self.core.perform(name, item)
    }

    /// Whether any GET request has succeeded.
    pub fn is_loaded(&self) -> bool {
        self.core.state.lock().loaded
    }

    /// Number of requests currently in flight.
    pub fn in_flight(&self) -> usize {
        self.core.state.lock().in_flight.len()
    }

    /// Number of placeholders not yet confirmed by the server.
    pub fn pending_count(&self) -> usize {
        self.core.state.lock().pending.len()
    }

    pub fn key(&self) -> &Key {
        &self.core.key
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("key", &self.core.key)
            .field("items", &self.core.items.len())
            .field("routes", &self.handles.len())
            .finish()
    }
}
