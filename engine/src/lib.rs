//! # Roster Engine
//!
//! A client-side cache for collections of server-owned records.
//!
//! A [`Collection`] hands out one stable handle per record for as long as the
//! record exists locally. Server responses update the fields of records that
//! were already handed out instead of replacing them, so every holder of a
//! handle observes the update without fetching again.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine talks to the network only through [`Transport`]
//! - **Stable identity**: reconciliation merges into existing records in place
//! - **One request per key**: identical in-flight requests share one outcome
//!
//! ## Core Concepts
//!
//! ### Keys
//!
//! A [`Key`] names one or more record fields. Composite keys are indexed level
//! by level in a [`KeyIndex`].
//!
//! ### Placeholders
//!
//! [`Collection::item`] returns a placeholder for keys the server has not
//! produced yet. The first response that mentions the key fills in that same
//! placeholder and moves it into the collection.
//!
//! ### Routes
//!
//! Each [`Route`] declares a method, a URL template with `:field`
//! placeholders and a [`ResponseShape`]:
//! - `array` - a complete listing; records the listing omits are evicted
//! - `one` - a single record, merged by key
//! - `remove` - the request item is removed from the collection
//! - `ignore` - the raw payload is returned untouched
//!
//! ## Quick Start
//!
//! ```rust
//! use roster_engine::{Collection, MemoryTransport, Method, Route};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # futures::executor::block_on(async {
//! let transport = Arc::new(MemoryTransport::new());
//! transport.respond(Method::Get, "/users/1", json!({"id": 1, "name": "one"}));
//!
//! let users = Collection::builder()
//!     .route("getOne", Route::get("/users/:id").one())
//!     .build(transport)
//!     .unwrap();
//!
//! // A placeholder, before the server has said anything about user 1
//! let user = users.item(1);
//! assert!(users.items().is_empty());
//!
//! users.route("getOne").unwrap().call_with(1).unwrap().await.unwrap();
//!
//! // The same handle now carries the server's fields
//! assert_eq!(user.get("name"), Some(json!("one")));
//! assert_eq!(users.items().len(), 1);
//! # });
//! ```

pub mod collection;
pub mod coordinator;
pub mod error;
pub mod index;
pub mod key;
pub mod pending;
pub mod reconcile;
pub mod record;
pub mod route;
pub mod transport;

// Re-export main types at crate root
pub use collection::{Collection, CollectionBuilder, Items, RouteHandle, RESERVED_NAMES};
pub use coordinator::{dedup_key, Outcome, PendingRequest, Spawner};
pub use error::Error;
pub use index::KeyIndex;
pub use key::{Key, KeyPart, KeyValue, Selector};
pub use pending::{PendingRegistry, Promotion};
pub use reconcile::{Applied, ReconcileSummary, Reconciler};
pub use record::{default_model, merge_fields_into, ItemRef, Model, Record};
pub use route::{
    compose_url, routes_from_json, Method, RequestTransform, ResponseShape, ResponseTransform,
    Route, RouteConfig, UrlSource,
};
pub use transport::{MemoryTransport, RecordedRequest, Response, Transport, TransportError};

/// Type aliases for clarity
pub type RouteName = String;
pub type Fields = serde_json::Map<String, serde_json::Value>;
