//! Command line arguments and output rendering for the `roster` binary.

use crate::error::{AppError, Result};
use clap::Parser;
use roster_engine::{routes_from_json, Outcome, Route, RouteName, Selector};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Perform one named route of a collection and print the result as JSON.
#[derive(Debug, Parser)]
#[command(name = "roster", version, about)]
pub struct Args {
    /// Name of the route to perform
    pub route: String,

    /// Request item: a JSON object, or a scalar key value
    pub item: Option<String>,

    /// Route table to load (overrides ROUTES_FILE)
    #[arg(short, long)]
    pub routes: Option<PathBuf>,

    /// Comma-separated key fields (overrides KEY_FIELDS)
    #[arg(short, long)]
    pub key: Option<String>,

    /// Pretty-print the output
    #[arg(long)]
    pub pretty: bool,
}

/// Parse a request item argument.
///
/// Anything that parses as JSON is used as-is; other text is taken as a
/// string key value.
pub fn parse_item(raw: &str) -> Selector {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => Selector::from(value),
        Err(_) => Selector::from(raw),
    }
}

/// Read and parse a route table file.
pub fn load_routes(path: &Path) -> Result<Vec<(RouteName, Route)>> {
    let text = std::fs::read_to_string(path)?;
    let routes = routes_from_json(&text)?;
    tracing::debug!(path = %path.display(), count = routes.len(), "Loaded route table");
    Ok(routes)
}

/// Serialize a settled request for output.
pub fn render_outcome(outcome: Outcome) -> Result<Value> {
    let value = match outcome {
        Outcome::Items(items) => serde_json::to_value(items.snapshot())?,
        Outcome::Item(item) => serde_json::to_value(item.snapshot())?,
        Outcome::Raw(value) => value,
    };
    Ok(value)
}

/// Route file from the command line, falling back to configuration.
pub fn routes_path(args: &Args, configured: Option<&PathBuf>) -> Result<PathBuf> {
    args.routes
        .clone()
        .or_else(|| configured.cloned())
        .ok_or_else(|| AppError::BadRequest("no route table: set ROUTES_FILE or pass --routes".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_engine::{Collection, MemoryTransport, Method};
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn parses_items() {
        assert_eq!(parse_item("1"), Selector::Scalar(json!(1)));
        assert_eq!(parse_item("alice"), Selector::Scalar(json!("alice")));
        assert_eq!(
            parse_item(r#"{"id": 2, "name": "two"}"#),
            Selector::from(json!({"id": 2, "name": "two"}))
        );
    }

    #[test]
    fn parses_arguments() {
        let args = Args::try_parse_from(["roster", "getOne", "7", "--routes", "r.json", "-k", "a,b"])
            .unwrap();
        assert_eq!(args.route, "getOne");
        assert_eq!(args.item.as_deref(), Some("7"));
        assert_eq!(args.routes, Some(PathBuf::from("r.json")));
        assert_eq!(args.key.as_deref(), Some("a,b"));
        assert!(!args.pretty);
    }

    #[test]
    fn routes_path_prefers_argument() {
        let args = Args::try_parse_from(["roster", "getAll"]).unwrap();
        assert!(routes_path(&args, None).is_err());
        assert_eq!(
            routes_path(&args, Some(&PathBuf::from("env.json"))).unwrap(),
            PathBuf::from("env.json")
        );

        let args = Args::try_parse_from(["roster", "getAll", "--routes", "cli.json"]).unwrap();
        assert_eq!(
            routes_path(&args, Some(&PathBuf::from("env.json"))).unwrap(),
            PathBuf::from("cli.json")
        );
    }

    #[tokio::test]
    async fn renders_each_outcome() {
        let transport = Arc::new(MemoryTransport::new());
        transport.respond(Method::Get, "/users", json!([{"id": 1}, {"id": 2}]));
        transport.respond(Method::Get, "/users/1", json!({"id": 1, "name": "one"}));
        transport.respond(Method::Get, "/ping", json!("pong"));

        let users = Collection::builder()
            .route("getAll", Route::get("/users").array())
            .route("getOne", Route::get("/users/:id").one())
            .route("ping", Route::get("/ping"))
            .build(transport)
            .unwrap();

        let all = users.perform("getAll", None).unwrap().await.unwrap();
        assert_eq!(render_outcome(all).unwrap(), json!([{"id": 1}, {"id": 2}]));

        let one = users.perform("getOne", Some(parse_item("1"))).unwrap().await.unwrap();
        assert_eq!(render_outcome(one).unwrap(), json!({"id": 1, "name": "one"}));

        let raw = users.perform("ping", None).unwrap().await.unwrap();
        assert_eq!(render_outcome(raw).unwrap(), json!("pong"));
    }
}
