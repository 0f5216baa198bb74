//! Storage-agnostic data access core for the skills directory.
//!
//! Callers depend on [`store::DataAccess`]; backends plug in behind it.
//! Read models that need data from several collections are assembled by
//! [`join`] and [`preload`] rather than by the backends.

pub mod config;
pub mod join;
pub mod logging;
pub mod model;
pub mod preload;
pub mod query;
pub mod store;

pub use config::{
    connect_object_store, connect_primary, connect_primary_with_session, AppConfig, ConfigError,
};
pub use join::{Association, DanglingReference, JoinResolver, Named, Resolved};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use preload::{preload_relations, PreloadFailure, PreloadReport};
pub use query::{Filter, QueryOptions};
pub use store::{
    BackendKind, Capabilities, Cascade, DataAccess, DataAccessExt, ErrorKind, Payload, Record,
    StoreError, StoreResult,
};

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
