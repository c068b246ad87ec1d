//! # Roster Client
//!
//! Runs roster collections against a real HTTP API: an [`HttpTransport`]
//! built on reqwest, environment configuration, and the helpers behind the
//! `roster` command line tool.

pub mod cli;
pub mod config;
pub mod error;
pub mod transport;

pub use cli::{load_routes, parse_item, render_outcome, Args};
pub use config::{Config, ConfigError};
pub use error::{AppError, Result};
pub use transport::HttpTransport;
