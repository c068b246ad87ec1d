//! Roster CLI - perform one route of a collection against an HTTP API.

use clap::Parser;
use roster_client::cli::routes_path;
use roster_client::config::parse_key_fields;
use roster_client::{load_routes, parse_item, render_outcome, Args, Config, HttpTransport};
use roster_engine::Collection;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roster_client=debug,roster_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    // Load configuration
    dotenvy::dotenv().ok();
    let mut config = Config::from_env()?;
    if let Some(raw) = args.key.as_deref() {
        config.key_fields = parse_key_fields(raw)?;
    }

    let routes = load_routes(&routes_path(&args, config.routes_file.as_ref())?)?;
    let transport = Arc::new(HttpTransport::from_config(&config)?);

    tracing::info!(base_url = %config.base_url, route = %args.route, "Starting roster");

    let collection = Collection::builder()
        .key(config.key()?)
        .spawner(|request| {
            tokio::spawn(request);
        })
        .routes(routes)
        .build(transport)?;

    let item = args.item.as_deref().map(parse_item);
    let outcome = collection.perform(&args.route, item)?.await?;

    let output = render_outcome(outcome)?;
    let text = if args.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{}", text);

    Ok(())
}
