//! Console operations: database/collection discovery, document listing and mutation,
//! and auth user browsing, all resolved through one [`ConnectionManager`].

pub mod connection;
pub mod documents;
pub mod error;
pub mod users;


pub use self::connection::{ConnectionManager, Endpoints, HandleResolution};
pub use self::error::ConsoleError;

use crate::firestore::DEFAULT_DATABASE;
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSummary {
    pub id: String,
    pub name: String,
    pub display_name: String,
}

impl DatabaseSummary {
    fn named(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            display_name: id.to_string(),
        }
    }

    fn default_database() -> Self {
        Self {
            id: DEFAULT_DATABASE.to_string(),
            name: "Default Database".to_string(),
            display_name: "Default Database".to_string(),
        }
    }
}

/// Databases of the project. When the listing fails the default database is still
/// offered, alongside the reason.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseListing {
    pub databases: Vec<DatabaseSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn list_databases(manager: &ConnectionManager) -> DatabaseListing {
    match manager.list_databases().await {
        Ok(resources) if !resources.is_empty() => DatabaseListing {
            databases: resources
                .iter()
                .map(|db| DatabaseSummary::named(db.database_id()))
                .collect(),
            error: None,
        },
        Ok(_) => DatabaseListing {
            databases: vec![DatabaseSummary::default_database()],
            error: None,
        },
        Err(err) => {
            warn!(error = %err, "could not list databases");
            DatabaseListing {
                databases: vec![DatabaseSummary::default_database()],
                error: Some(
                    "Could not fetch all databases. Make sure your service account has sufficient permissions."
                        .to_string(),
                ),
            }
        }
    }
}
