//! Request coordination: route resolution, in-flight deduplication and
//! response dispatch.
//!
//! Every request moves through `idle -> in-flight -> settled`. While a request
//! for a given `METHOD url` is in flight, further identical requests share its
//! outcome instead of reaching the transport. The in-flight entry is removed
//! before the outcome is delivered, so the next identical request after
//! settlement always issues a fresh call.

use crate::collection::Items;
use crate::error::{Error, Result};
use crate::index::KeyIndex;
use crate::key::{Key, Selector};
use crate::pending::PendingRegistry;
use crate::reconcile::Reconciler;
use crate::record::{ItemRef, Model};
use crate::route::{compose_url, Method, ResponseShape, Route};
use crate::transport::{Response, Transport, TransportError};
use crate::{Fields, RouteName};
use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

/// Result of a settled request.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The collection's ordered list (`array` and `remove` routes).
    Items(Items),
    /// The canonical record for the response's key (`one` routes).
    Item(ItemRef),
    /// The unreconciled payload (`ignore` routes).
    Raw(Value),
}

impl Outcome {
    pub fn into_items(self) -> Option<Items> {
        match self {
            Outcome::Items(items) => Some(items),
            _ => None,
        }
    }

    pub fn into_item(self) -> Option<ItemRef> {
        match self {
            Outcome::Item(item) => Some(item),
            _ => None,
        }
    }

    pub fn into_raw(self) -> Option<Value> {
        match self {
            Outcome::Raw(value) => Some(value),
            _ => None,
        }
    }
}

type SharedOutcome = Shared<BoxFuture<'static, Result<Outcome>>>;
type WeakOutcome = WeakShared<BoxFuture<'static, Result<Outcome>>>;

/// Runs a request to settlement in the background, e.g. `tokio::spawn`.
pub type Spawner = Arc<dyn Fn(BoxFuture<'static, ()>) + Send + Sync>;

/// A request registered with a collection.
///
/// Resolves to the request's [`Outcome`]. Piggybacked requests resolve to the
/// same value as the request they joined, failures included.
///
/// With a [`Spawner`] configured the request runs whether or not it is
/// polled. Without one, dropping every handle to a request cancels it.
#[must_use = "without a spawner, requests do nothing unless polled"]
pub struct PendingRequest {
    inner: SharedOutcome,
    piggybacked: bool,
}

impl PendingRequest {
    /// Whether this request joined one that was already in flight.
    pub fn is_piggybacked(&self) -> bool {
        self.piggybacked
    }
}

impl Future for PendingRequest {
    type Output = Result<Outcome>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx)
    }
}

/// Outstanding requests keyed by `METHOD url`.
///
/// Entries are weak. A request whose handles were all dropped before it
/// settled no longer counts as in flight.
#[derive(Default)]
pub(crate) struct InFlightTable {
    requests: HashMap<String, WeakOutcome>,
}

impl InFlightTable {
    fn get(&mut self, key: &str) -> Option<SharedOutcome> {
        let request = self.requests.get(key).and_then(WeakShared::upgrade);
        if request.is_none() {
            self.requests.remove(key);
        }
        request
    }

    fn insert(&mut self, key: String, request: &SharedOutcome) {
        if let Some(weak) = request.downgrade() {
            self.requests.insert(key, weak);
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        self.requests.remove(key).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.requests
            .values()
            .filter(|request| request.upgrade().is_some())
            .count()
    }
}

/// Deduplication key for a request.
pub fn dedup_key(method: Method, url: &str) -> String {
    format!("{} {}", method, url)
}

/// Mutable cache state, guarded by one lock per collection.
#[derive(Default)]
pub(crate) struct CacheState {
    pub(crate) index: KeyIndex<ItemRef>,
    pub(crate) pending: PendingRegistry,
    pub(crate) in_flight: InFlightTable,
    pub(crate) loaded: bool,
}

/// Everything a collection owns. Shared between the facade and its route
/// handles.
pub(crate) struct CollectionCore {
    pub(crate) key: Key,
    pub(crate) model: Model,
    pub(crate) routes: HashMap<RouteName, Route>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) spawner: Option<Spawner>,
    pub(crate) items: Items,
    pub(crate) state: Mutex<CacheState>,
}

impl CollectionCore {
    /// Resolve and issue `route_name`, or join an identical in-flight request.
    ///
    /// Configuration errors surface here, before anything is registered.
    pub(crate) fn perform(
        self: &Arc<Self>,
        route_name: &str,
        item: Option<Selector>,
    ) -> Result<PendingRequest> {
        let route = self
            .routes
            .get(route_name)
            .ok_or_else(|| Error::UnknownRoute(route_name.to_string()))?;
        let (method, url_source) = route.require(route_name)?;

        let item = item.map(|selector| self.key.normalize(selector));
        let url = compose_url(route_name, &url_source.resolve(), item.as_ref())?;
        let key = dedup_key(method, &url);

        let mut state = self.state.lock();
        if let Some(request) = state.in_flight.get(&key) {
            tracing::debug!(route = route_name, request = %key, "Piggybacking on in-flight request");
            return Ok(PendingRequest {
                inner: request,
                piggybacked: true,
            });
        }

        let body = item.as_ref().map(|fields| route.request_body(fields));
        let settlement = Settlement {
            core: Arc::downgrade(self),
            route_name: route_name.to_string(),
            route: route.clone(),
            method,
            item: item.unwrap_or_default(),
            key: key.clone(),
        };
        let transport = Arc::clone(&self.transport);

        let request = async move {
            let response = transport.call(method, &url, body).await;
            settlement.finish(response)
        }
        .boxed()
        .shared();

        state.in_flight.insert(key.clone(), &request);
        drop(state);
        tracing::debug!(route = route_name, request = %key, "Registered request");

        if let Some(spawn) = &self.spawner {
            spawn(request.clone().map(|_| ()).boxed());
        }

        Ok(PendingRequest {
            inner: request,
            piggybacked: false,
        })
    }

    /// Apply a settled payload according to the route's response shape.
    fn dispatch(
        &self,
        route_name: &str,
        route: &Route,
        method: Method,
        item: &Fields,
        payload: Value,
    ) -> Result<Outcome> {
        let mut state = self.state.lock();
        if method == Method::Get {
            state.loaded = true;
        }

        let shape = route.response_shape();
        if let ResponseShape::Ignore = shape {
            return Ok(Outcome::Raw(payload));
        }
        if let ResponseShape::Other(shape) = shape {
            return Err(Error::UnknownResponseShape {
                route: route_name.to_string(),
                shape: shape.clone(),
            });
        }

        let CacheState { index, pending, .. } = &mut *state;
        let mut items = self.items.write();
        let mut reconciler = Reconciler::new(&self.key, &self.model, index, pending, &mut items);

        match shape {
            ResponseShape::Array => {
                reconciler.apply_all(payload)?;
                Ok(Outcome::Items(self.items.clone()))
            }
            ResponseShape::One => Ok(Outcome::Item(reconciler.apply_one(payload)?)),
            ResponseShape::Remove => {
                reconciler.remove_one(item);
                Ok(Outcome::Items(self.items.clone()))
            }
            ResponseShape::Ignore | ResponseShape::Other(_) => Ok(Outcome::Raw(payload)),
        }
    }
}

/// What a request needs to settle once the transport answers.
struct Settlement {
    core: Weak<CollectionCore>,
    route_name: RouteName,
    route: Route,
    method: Method,
    item: Fields,
    key: String,
}

impl Settlement {
    fn finish(self, response: std::result::Result<Response, TransportError>) -> Result<Outcome> {
        let Some(core) = self.core.upgrade() else {
            // The collection is gone; there is no cache left to reconcile.
            return response.map(|r| Outcome::Raw(r.data)).map_err(Error::from);
        };

        core.state.lock().in_flight.remove(&self.key);

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(route = %self.route_name, request = %self.key, error = %err, "Request failed");
                return Err(err.into());
            }
        };

        tracing::debug!(
            route = %self.route_name,
            request = %self.key,
            status = response.status,
            "Request settled"
        );

        let payload = self.route.extract_payload(response.data, &self.item);
        core.dispatch(&self.route_name, &self.route, self.method, &self.item, payload)
    }
}
