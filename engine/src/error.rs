//! Error types for the roster engine.

use crate::transport::TransportError;
use crate::RouteName;
use thiserror::Error;

/// All possible errors from the roster engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Configuration errors
    #[error("unknown route named '{0}'")]
    UnknownRoute(RouteName),

    #[error("route '{route}' does not have required parameter: {parameter}")]
    MissingRouteParameter {
        route: RouteName,
        parameter: &'static str,
    },

    #[error("route '{route}' has invalid method '{method}'")]
    InvalidMethod { route: RouteName, method: String },

    #[error("route '{route}' could not resolve url placeholder ':{placeholder}'")]
    UnresolvedPlaceholder {
        route: RouteName,
        placeholder: String,
    },

    #[error("unknown response type '{shape}' for route '{route}'")]
    UnknownResponseShape { route: RouteName, shape: String },

    #[error("cannot create a route using reserved name '{0}'")]
    ReservedRouteName(RouteName),

    #[error("route '{0}' is declared more than once")]
    DuplicateRoute(RouteName),

    #[error("key must name at least one field")]
    EmptyKey,

    #[error("invalid route configuration: {0}")]
    InvalidRouteConfig(String),

    // Payload errors
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    // Transport errors
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl Error {
    /// Whether this error stems from collection or route configuration.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, Error::InvalidPayload(_) | Error::Transport(_))
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::UnknownRoute("getAll".into());
        assert_eq!(err.to_string(), "unknown route named 'getAll'");

        let err = Error::MissingRouteParameter {
            route: "update".into(),
            parameter: "url",
        };
        assert_eq!(
            err.to_string(),
            "route 'update' does not have required parameter: url"
        );

        let err = Error::UnresolvedPlaceholder {
            route: "getOne".into(),
            placeholder: "id".into(),
        };
        assert_eq!(
            err.to_string(),
            "route 'getOne' could not resolve url placeholder ':id'"
        );
    }

    #[test]
    fn transport_errors_pass_through() {
        let err: Error = TransportError::with_status(503, "unavailable").into();
        assert_eq!(err.to_string(), "transport failure (status 503): unavailable");
        assert!(!err.is_configuration());
        assert!(Error::ReservedRouteName("items".into()).is_configuration());
        assert!(!Error::InvalidPayload("x".into()).is_configuration());
    }
}
