//! HTTP transport backed by reqwest.

use crate::config::Config;
use async_trait::async_trait;
use roster_engine::{Method, Response, Transport, TransportError};
use serde_json::Value;
use std::time::Duration;

/// Issues collection requests over HTTP.
///
/// Relative route URLs are joined onto `base_url`; absolute `http(s)://` URLs
/// are used unchanged. `GET`, `HEAD` and `DELETE` carry no body, every other
/// method sends the request item as JSON.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        Self::new(config.base_url.clone(), config.timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The absolute URL a route URL is sent to.
    pub fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        if url.is_empty() {
            base.to_string()
        } else if url.starts_with('/') {
            format!("{}{}", base, url)
        } else {
            format!("{}/{}", base, url)
        }
    }
}

fn http_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
    }
}

fn sends_body(method: Method) -> bool {
    !matches!(method, Method::Get | Method::Head | Method::Delete)
}

fn request_failure(err: reqwest::Error) -> TransportError {
    match err.status() {
        Some(status) => TransportError::with_status(status.as_u16(), err.to_string()),
        None => TransportError::new(err.to_string()),
    }
}

/// Parse a response body, treating an empty body as `null`.
pub fn parse_body(status: u16, bytes: &[u8]) -> Result<Value, TransportError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes)
        .map_err(|e| TransportError::with_status(status, format!("invalid JSON body: {}", e)))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> Result<Response, TransportError> {
        let target = self.resolve(url);
        tracing::debug!(%method, url = %target, "Sending request");

        let mut request = self.client.request(http_method(method), &target);
        if sends_body(method) {
            if let Some(body) = body.as_ref() {
                request = request.json(body);
            }
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!(%method, url = %target, error = %e, "Request failed");
            request_failure(e)
        })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(request_failure)?;

        if !status.is_success() {
            let message = match String::from_utf8_lossy(&bytes).trim() {
                "" => status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string(),
                text => text.to_string(),
            };
            tracing::warn!(%method, url = %target, status = status.as_u16(), "Server rejected request");
            return Err(TransportError::with_status(status.as_u16(), message));
        }

        let data = parse_body(status.as_u16(), &bytes)?;
        tracing::debug!(%method, url = %target, status = status.as_u16(), "Received response");

        Ok(Response {
            status: status.as_u16(),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transport(base: &str) -> HttpTransport {
        HttpTransport::new(base, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn joins_relative_urls() {
        let t = transport("http://api.test/v1/");
        assert_eq!(t.resolve("/users/1"), "http://api.test/v1/users/1");
        assert_eq!(t.resolve("users"), "http://api.test/v1/users");
        assert_eq!(t.resolve(""), "http://api.test/v1");
    }

    #[test]
    fn keeps_absolute_urls() {
        let t = transport("http://api.test");
        assert_eq!(
            t.resolve("https://other.test:8443/users"),
            "https://other.test:8443/users"
        );
    }

    #[test]
    fn body_rules_follow_method() {
        assert!(!sends_body(Method::Get));
        assert!(!sends_body(Method::Head));
        assert!(!sends_body(Method::Delete));
        assert!(sends_body(Method::Post));
        assert!(sends_body(Method::Put));
        assert!(sends_body(Method::Patch));
    }

    #[test]
    fn empty_body_is_null() {
        assert_eq!(parse_body(204, b""), Ok(Value::Null));
        assert_eq!(parse_body(200, b"  \n"), Ok(Value::Null));
        assert_eq!(parse_body(200, br#"{"id":1}"#), Ok(json!({"id": 1})));

        let err = parse_body(200, b"<html>").unwrap_err();
        assert_eq!(err.status, Some(200));
    }
}
