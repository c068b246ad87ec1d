//! Route definitions.
//!
//! A route describes one API call a collection can make: the HTTP method, a
//! URL template with `:field` placeholders, and the shape of the response.
//! Routes are either built in code with [`Route`]'s builder methods or loaded
//! from JSON with [`routes_from_json`].

use crate::error::{Error, Result};
use crate::{Fields, RouteName};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// HTTP method of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    /// Parse a method name, ignoring case.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "HEAD" => Ok(Method::Head),
            _ => Err(s.to_string()),
        }
    }
}

/// How a successful response is applied to the collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ResponseShape {
    /// A complete listing; reconciled as a full snapshot.
    Array,
    /// A single record.
    One,
    /// The request item is removed; the response body is ignored.
    Remove,
    /// No mutation; the raw payload is returned.
    #[default]
    Ignore,
    /// A declared shape this engine does not know. Fails on dispatch.
    Other(String),
}

impl From<&str> for ResponseShape {
    fn from(s: &str) -> Self {
        match s {
            "array" => ResponseShape::Array,
            "one" => ResponseShape::One,
            "remove" => ResponseShape::Remove,
            "ignore" => ResponseShape::Ignore,
            other => ResponseShape::Other(other.to_string()),
        }
    }
}

/// Where a route's URL template comes from.
#[derive(Clone)]
pub enum UrlSource {
    Template(String),
    /// Evaluated on every request.
    Computed(Arc<dyn Fn() -> String + Send + Sync>),
}

impl UrlSource {
    pub fn resolve(&self) -> String {
        match self {
            UrlSource::Template(template) => template.clone(),
            UrlSource::Computed(f) => f(),
        }
    }
}

impl fmt::Debug for UrlSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlSource::Template(template) => f.debug_tuple("Template").field(template).finish(),
            UrlSource::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Transforms the request item into the request body.
pub type RequestTransform = Arc<dyn Fn(&Fields) -> Value + Send + Sync>;

/// Transforms the response payload. Receives the payload and the request item.
pub type ResponseTransform = Arc<dyn Fn(Value, &Fields) -> Value + Send + Sync>;

/// A configured API route.
#[derive(Clone, Default)]
pub struct Route {
    method: Option<Method>,
    url: Option<UrlSource>,
    response: ResponseShape,
    envelope: Option<String>,
    transform_request: Option<RequestTransform>,
    transform_response: Option<ResponseTransform>,
}

impl Route {
    /// An empty route. Method and URL must be set before it can run.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new().method(Method::Get).url(url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new().method(Method::Post).url(url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new().method(Method::Put).url(url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new().method(Method::Patch).url(url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new().method(Method::Delete).url(url)
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn url(mut self, template: impl Into<String>) -> Self {
        self.url = Some(UrlSource::Template(template.into()));
        self
    }

    /// Compute the URL template on every request.
    pub fn computed_url<F>(mut self, f: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.url = Some(UrlSource::Computed(Arc::new(f)));
        self
    }

    pub fn shape(mut self, shape: ResponseShape) -> Self {
        self.response = shape;
        self
    }

    pub fn array(self) -> Self {
        self.shape(ResponseShape::Array)
    }

    pub fn one(self) -> Self {
        self.shape(ResponseShape::One)
    }

    pub fn remove(self) -> Self {
        self.shape(ResponseShape::Remove)
    }

    pub fn ignore(self) -> Self {
        self.shape(ResponseShape::Ignore)
    }

    /// Read the payload from this field of the response body.
    pub fn envelope(mut self, field: impl Into<String>) -> Self {
        self.envelope = Some(field.into());
        self
    }

    pub fn transform_request<F>(mut self, f: F) -> Self
    where
        F: Fn(&Fields) -> Value + Send + Sync + 'static,
    {
        self.transform_request = Some(Arc::new(f));
        self
    }

    pub fn transform_response<F>(mut self, f: F) -> Self
    where
        F: Fn(Value, &Fields) -> Value + Send + Sync + 'static,
    {
        self.transform_response = Some(Arc::new(f));
        self
    }

    pub fn response_shape(&self) -> &ResponseShape {
        &self.response
    }

    /// Check that the route can run and return its method and URL source.
    pub fn require(&self, name: &str) -> Result<(Method, &UrlSource)> {
        let method = self.method.ok_or_else(|| Error::MissingRouteParameter {
            route: name.to_string(),
            parameter: "method",
        })?;
        let url = self.url.as_ref().ok_or_else(|| Error::MissingRouteParameter {
            route: name.to_string(),
            parameter: "url",
        })?;
        Ok((method, url))
    }

    /// Build the request body from the request item.
    pub fn request_body(&self, item: &Fields) -> Value {
        match &self.transform_request {
            Some(transform) => transform(item),
            None => Value::Object(item.clone()),
        }
    }

    /// Extract the payload from a response body.
    ///
    /// Unwraps the envelope field if one is configured (a missing field yields
    /// `null`), then applies the response transform.
    pub fn extract_payload(&self, mut data: Value, item: &Fields) -> Value {
        if let Some(field) = &self.envelope {
            data = data.get_mut(field.as_str()).map(Value::take).unwrap_or(Value::Null);
        }
        match &self.transform_response {
            Some(transform) => transform(data, item),
            None => data,
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("response", &self.response)
            .field("envelope", &self.envelope)
            .field("transform_request", &self.transform_request.is_some())
            .field("transform_response", &self.transform_response.is_some())
            .finish()
    }
}

/// Substitute every `:field` placeholder in `template` with the value of that
/// field on `item`.
///
/// Placeholder names start with a letter or underscore and continue with
/// letters, digits or underscores, so `host:8080` is left alone. A field that
/// is absent or `null` fails with [`Error::UnresolvedPlaceholder`].
pub fn compose_url(route: &str, template: &str, item: Option<&Fields>) -> Result<String> {
    let mut url = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(':') {
        url.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let name_len = placeholder_len(after);

        if name_len == 0 {
            url.push(':');
            rest = after;
            continue;
        }

        let name = &after[..name_len];
        let value = item
            .and_then(|fields| fields.get(name))
            .filter(|value| !value.is_null())
            .ok_or_else(|| Error::UnresolvedPlaceholder {
                route: route.to_string(),
                placeholder: name.to_string(),
            })?;

        match value {
            Value::String(s) => url.push_str(s),
            other => url.push_str(&other.to_string()),
        }
        rest = &after[name_len..];
    }

    url.push_str(rest);
    Ok(url)
}

fn placeholder_len(s: &str) -> usize {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return 0,
    }
    chars
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Route definition as it appears in a JSON route table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteConfig {
    pub method: Option<String>,
    pub url: Option<String>,
    pub response_type: Option<String>,
    pub response_prefix: Option<String>,
}

impl RouteConfig {
    /// Convert into a [`Route`], parsing the method name.
    pub fn into_route(self, name: &str) -> Result<Route> {
        let mut route = Route::new();
        if let Some(method) = self.method {
            let method = method.parse().map_err(|method| Error::InvalidMethod {
                route: name.to_string(),
                method,
            })?;
            route = route.method(method);
        }
        if let Some(url) = self.url {
            route = route.url(url);
        }
        if let Some(shape) = self.response_type {
            route = route.shape(ResponseShape::from(shape.as_str()));
        }
        if let Some(prefix) = self.response_prefix {
            route = route.envelope(prefix);
        }
        Ok(route)
    }
}

/// Load a route table from JSON.
///
/// ```json
/// {"getAll": {"method": "get", "url": "/users", "responseType": "array"}}
/// ```
pub fn routes_from_json(text: &str) -> Result<Vec<(RouteName, Route)>> {
    let table: BTreeMap<RouteName, RouteConfig> =
        serde_json::from_str(text).map_err(|e| Error::InvalidRouteConfig(e.to_string()))?;

    table
        .into_iter()
        .map(|(name, config)| {
            let route = config.into_route(&name)?;
            Ok((name, route))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn method_parsing_ignores_case() {
        assert_eq!("get".parse::<Method>(), Ok(Method::Get));
        assert_eq!("Delete".parse::<Method>(), Ok(Method::Delete));
        assert!("fetch".parse::<Method>().is_err());
        assert_eq!(Method::Patch.to_string(), "PATCH");
    }

    #[test]
    fn compose_url_substitutes_placeholders() {
        let item = fields(json!({"number": 1, "letter": "B"}));
        assert_eq!(
            compose_url("getOne", "/test/:number/:letter", Some(&item)).unwrap(),
            "/test/1/B"
        );
        assert_eq!(
            compose_url("getOne", "/test/:number?full=1", Some(&item)).unwrap(),
            "/test/1?full=1"
        );
    }

    #[test]
    fn compose_url_leaves_ports_and_plain_urls() {
        assert_eq!(
            compose_url("getAll", "http://localhost:8080/users", None).unwrap(),
            "http://localhost:8080/users"
        );
        assert_eq!(compose_url("getAll", "/users", None).unwrap(), "/users");
    }

    #[test]
    fn compose_url_fails_on_missing_field() {
        let item = fields(json!({"id": null}));
        let err = compose_url("getOne", "/users/:id", Some(&item)).unwrap_err();
        assert_eq!(
            err,
            Error::UnresolvedPlaceholder {
                route: "getOne".into(),
                placeholder: "id".into(),
            }
        );
        assert!(compose_url("getOne", "/users/:id", None).is_err());
    }

    #[test]
    fn require_reports_missing_parameters() {
        let err = Route::new().url("/x").require("broken").unwrap_err();
        assert_eq!(
            err,
            Error::MissingRouteParameter {
                route: "broken".into(),
                parameter: "method",
            }
        );

        let err = Route::new().method(Method::Get).require("broken").unwrap_err();
        assert!(matches!(
            err,
            Error::MissingRouteParameter {
                parameter: "url",
                ..
            }
        ));
    }

    #[test]
    fn extract_payload_unwraps_envelope_then_transforms() {
        let item = fields(json!({"id": 1}));
        let route = Route::get("/test/:id").envelope("prefix");
        assert_eq!(
            route.extract_payload(json!({"prefix": {"id": 1}}), &item),
            json!({"id": 1})
        );
        assert_eq!(route.extract_payload(json!({}), &item), Value::Null);

        let route = Route::get("/test/:id").transform_response(|_, item| json!({"echo": item}));
        assert_eq!(
            route.extract_payload(json!({"ignored": true}), &item),
            json!({"echo": {"id": 1}})
        );
    }

    #[test]
    fn request_body_defaults_to_item_copy() {
        let item = fields(json!({"id": 1, "name": "x"}));
        assert_eq!(Route::put("/u/:id").request_body(&item), json!({"id": 1, "name": "x"}));

        let route = Route::put("/u/:id").transform_request(|item| json!({"user": item}));
        assert_eq!(route.request_body(&item), json!({"user": {"id": 1, "name": "x"}}));
    }

    #[test]
    fn routes_from_json_parses_table() {
        let routes = routes_from_json(
            r#"{
                "getAll": {"method": "get", "url": "/users", "responseType": "array"},
                "getOne": {"method": "GET", "url": "/users/:id", "responseType": "one", "responsePrefix": "data"},
                "ping": {"method": "head", "url": "/ping"}
            }"#,
        )
        .unwrap();

        assert_eq!(routes.len(), 3);
        let (name, route) = &routes[0];
        assert_eq!(name, "getAll");
        assert_eq!(route.response_shape(), &ResponseShape::Array);
        assert_eq!(routes[2].1.response_shape(), &ResponseShape::Ignore);
    }

    #[test]
    fn routes_from_json_rejects_bad_input() {
        assert!(matches!(
            routes_from_json("[1,2]"),
            Err(Error::InvalidRouteConfig(_))
        ));
        assert!(matches!(
            routes_from_json(r#"{"x": {"method": "fetch", "url": "/"}}"#),
            Err(Error::InvalidMethod { .. })
        ));
    }

    #[test]
    fn unknown_shape_is_kept_for_dispatch() {
        assert_eq!(
            ResponseShape::from("many"),
            ResponseShape::Other("many".into())
        );
    }
}
