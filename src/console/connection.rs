//! Per-database Firestore handles over one authenticated session.

use super::error::ConsoleError;
use crate::auth::tenant_mgt::TenantManager;
use crate::auth::{FirebaseAuth, IDENTITY_TOOLKIT_API};
use crate::core::credentials::Credentials;
use crate::core::middleware::{build_client, AuthMiddleware};
use crate::firestore::models::DatabaseResource;
use crate::firestore::{self, FirebaseFirestore, DEFAULT_DATABASE, FIRESTORE_V1_API};
use reqwest_middleware::ClientWithMiddleware;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// API roots the console talks to.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub firestore: String,
    pub identity_toolkit: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            firestore: FIRESTORE_V1_API.to_string(),
            identity_toolkit: IDENTITY_TOOLKIT_API.to_string(),
        }
    }
}

/// Outcome of resolving a database id to a handle.
#[derive(Clone)]
pub struct HandleResolution {
    pub handle: Arc<FirebaseFirestore>,
    /// The normalized id that was asked for.
    pub requested: String,
    /// `true` when `requested` could not be served and the default database was used instead.
    pub fell_back_to_default: bool,
}

impl HandleResolution {
    /// The id of the database actually reached.
    pub fn database_id(&self) -> &str {
        self.handle.database_id()
    }
}

/// Maps a caller-supplied database id to its cache key; blank and missing ids mean the default.
pub fn normalize_database_id(database_id: Option<&str>) -> String {
    match database_id.map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => DEFAULT_DATABASE.to_string(),
    }
}

/// Checks a named database id against Firestore's naming rules.
pub fn validate_database_id(id: &str) -> Result<(), String> {
    if id == DEFAULT_DATABASE {
        return Ok(());
    }
    if !(4..=63).contains(&id.len()) {
        return Err(format!("database id '{}' must be 4 to 63 characters", id));
    }
    if !id.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err(format!("database id '{}' must start with a letter", id));
    }
    if id.ends_with('-') {
        return Err(format!("database id '{}' must not end with a hyphen", id));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(format!(
            "database id '{}' may only contain lowercase letters, digits and hyphens",
            id
        ));
    }
    Ok(())
}

/// Owns the single authenticated HTTP session and caches one Firestore handle per database.
///
/// Build one per process and share it (`Arc<ConnectionManager>`) with whatever serves
/// requests. Handles are created on first use and live until [`clear_cache`] is called.
///
/// [`clear_cache`]: ConnectionManager::clear_cache
pub struct ConnectionManager {
    client: ClientWithMiddleware,
    project_id: String,
    endpoints: Endpoints,
    handles: RwLock<HashMap<String, Arc<FirebaseFirestore>>>,
}

impl ConnectionManager {
    /// Creates a manager authenticating with `credentials` against the public Google APIs.
    pub fn new(credentials: &Credentials, max_retries: u32) -> Result<Self, ConsoleError> {
        let middleware = AuthMiddleware::new(credentials.key().clone());
        let client = build_client(middleware, max_retries);
        Self::with_client(client, credentials.project_id(), Endpoints::default())
    }

    /// Creates a manager over an existing client (custom endpoints, tests).
    pub fn with_client(
        client: ClientWithMiddleware,
        project_id: &str,
        endpoints: Endpoints,
    ) -> Result<Self, ConsoleError> {
        if project_id.trim().is_empty() {
            return Err(ConsoleError::Configuration(
                "Could not determine Firebase project ID".to_string(),
            ));
        }

        Ok(Self {
            client,
            project_id: project_id.to_string(),
            endpoints,
            handles: RwLock::new(HashMap::new()),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Returns the cached handle for `database_id`, creating it on first use.
    ///
    /// A named database whose handle cannot be built resolves to the default database with
    /// `fell_back_to_default` set, so receiving a handle does not prove the requested
    /// database was reached.
    pub async fn handle(&self, database_id: Option<&str>) -> Result<HandleResolution, ConsoleError> {
        let requested = normalize_database_id(database_id);

        match self.get_or_create(&requested).await {
            Ok(handle) => Ok(HandleResolution {
                handle,
                requested,
                fell_back_to_default: false,
            }),
            Err(reason) if requested != DEFAULT_DATABASE => {
                warn!(database = %requested, %reason, "falling back to default database");
                let handle = self
                    .get_or_create(DEFAULT_DATABASE)
                    .await
                    .map_err(ConsoleError::Configuration)?;
                Ok(HandleResolution {
                    handle,
                    requested,
                    fell_back_to_default: true,
                })
            }
            Err(reason) => Err(ConsoleError::Configuration(reason)),
        }
    }

    async fn get_or_create(&self, key: &str) -> Result<Arc<FirebaseFirestore>, String> {
        if let Some(handle) = self.handles.read().await.get(key) {
            return Ok(Arc::clone(handle));
        }

        let mut handles = self.handles.write().await;
        // Another request may have built it while we waited for the write lock.
        if let Some(handle) = handles.get(key) {
            return Ok(Arc::clone(handle));
        }

        validate_database_id(key)?;
        let handle = Arc::new(FirebaseFirestore::new_with_url(
            self.client.clone(),
            &self.endpoints.firestore,
            &self.project_id,
            key,
        ));
        handles.insert(key.to_string(), Arc::clone(&handle));

        if key == DEFAULT_DATABASE {
            info!("Created Firestore instance for default database");
        } else {
            info!(database = %key, "Created Firestore instance for database");
        }
        Ok(handle)
    }

    /// Drops every cached handle; the next access rebuilds them.
    pub async fn clear_cache(&self) {
        let mut handles = self.handles.write().await;
        info!(count = handles.len(), "clearing cached Firestore handles");
        handles.clear();
    }

    /// Number of databases with a cached handle.
    pub async fn cached_handles(&self) -> usize {
        self.handles.read().await.len()
    }

    /// Auth access for the whole project, or for one tenant. A malformed tenant id is a
    /// query error, never a silent widening to the whole project.
    pub fn auth(&self, tenant_id: Option<&str>) -> Result<FirebaseAuth, ConsoleError> {
        match tenant_id {
            Some(tenant) => Ok(self.tenants().auth_for_tenant(tenant)?),
            None => Ok(FirebaseAuth::new(
                self.client.clone(),
                &self.endpoints.identity_toolkit,
                &self.project_id,
            )),
        }
    }

    pub fn tenants(&self) -> TenantManager {
        TenantManager::new(
            self.client.clone(),
            &self.endpoints.identity_toolkit,
            &self.project_id,
        )
    }

    /// Lists the project's Firestore databases.
    pub async fn list_databases(&self) -> Result<Vec<DatabaseResource>, ConsoleError> {
        Ok(firestore::list_databases(&self.client, &self.endpoints.firestore, &self.project_id).await?)
    }
}
