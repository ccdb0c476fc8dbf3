//! Document models and repositories for the geodirect platform.
//!
//! Storage is CouchDB via [`geodirect_couch`]: one global database for
//! geodirect rules (`geodirect_geodirections`) plus one log database per
//! shop, provisioned lazily by [`repositories::PromptLogDatabase`].

use geodirect_couch::{CouchClient, CouchError};

pub mod models;
pub mod repositories;
pub mod views;

pub use repositories::{GeodirectRepo, PromptLog, PromptLogDatabase};

/// Verify the server is reachable and provision the global databases.
///
/// Called once at startup. Warns (but proceeds) when the server predates
/// CouchDB 2.0, since Mango `_find` queries need 2.x or later.
pub async fn bootstrap(couch: &CouchClient) -> Result<(), CouchError> {
    let info = couch.ping().await?;

    match info.major_version() {
        Some(major) if major < 2 => {
            tracing::warn!(
                version = %info.version,
                "CouchDB 2.0 or newer expected; some database methods may not work"
            );
        }
        None => {
            tracing::warn!(version = %info.version, "Could not parse CouchDB version");
        }
        _ => {}
    }

    GeodirectRepo::provision(couch).await?;

    tracing::info!(server = couch.base_url(), "Document store bootstrapped");
    Ok(())
}
