//! The transport seam between collections and the network.
//!
//! The engine never performs IO itself. A [`Transport`] issues the call and
//! reports success (with a `data` payload) or failure. [`MemoryTransport`]
//! answers from canned responses and is meant for tests and benchmarks.

use crate::route::Method;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A successful transport response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub data: Value,
}

impl Response {
    pub fn ok(data: Value) -> Self {
        Self { status: 200, data }
    }
}

/// A failed transport call, propagated to callers unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transport failure{}: {message}", status.map(|s| format!(" (status {s})")).unwrap_or_default())]
pub struct TransportError {
    /// HTTP status, if the failure came with one.
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

/// Issues API calls on behalf of a collection.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> Result<Response, TransportError>;
}

/// A request seen by [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
}

/// In-memory transport with canned responses per method and URL.
///
/// Unregistered requests fail with status 404.
#[derive(Default)]
pub struct MemoryTransport {
    responses: Mutex<HashMap<(Method, String), Result<Response, TransportError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    calls: AtomicUsize,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `method url` with a 200 response carrying `data`.
    pub fn respond(&self, method: Method, url: impl Into<String>, data: Value) -> &Self {
        self.responses
            .lock()
            .insert((method, url.into()), Ok(Response::ok(data)));
        self
    }

    /// Fail `method url` with `error`.
    pub fn fail(&self, method: Method, url: impl Into<String>, error: TransportError) -> &Self {
        self.responses.lock().insert((method, url.into()), Err(error));
        self
    }

    /// Number of calls issued so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request issued so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn call(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> Result<Response, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(RecordedRequest {
            method,
            url: url.to_string(),
            body,
        });

        self.responses
            .lock()
            .get(&(method, url.to_string()))
            .cloned()
            .unwrap_or_else(|| {
                Err(TransportError::with_status(
                    404,
                    format!("no response registered for {} {}", method, url),
                ))
            })
    }
}
