//! Cloud Firestore module.
//!
//! A thin client over the Firestore v1 REST API, bound to one database of one project.
//! It mirrors the Firebase Admin SDK's structure using `CollectionReference` and
//! `DocumentReference`, limited to what the console needs: single-filter queries with
//! ordering, limits and start-after cursors, count aggregations, merge writes and
//! collection listing.

pub mod models;
pub mod query;
pub mod reference;
pub mod snapshot;


use self::models::{DatabaseResource, ListCollectionIdsRequest, ListCollectionIdsResponse, ListDatabasesResponse};
use self::reference::CollectionReference;
use crate::core::{encode_path_segment, parse_error_response, ApiFailure};
use reqwest::header;
use reqwest_middleware::ClientWithMiddleware;
use thiserror::Error;
use tracing::instrument;

pub const FIRESTORE_V1_API: &str = "https://firestore.googleapis.com/v1";

/// Id of the database every project has.
pub const DEFAULT_DATABASE: &str = "(default)";

/// Errors that can occur during Firestore operations.
#[derive(Error, Debug)]
pub enum FirestoreError {
    /// Wrapper for `reqwest::Error`.
    #[error("HTTP Request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    /// Wrapper for `reqwest_middleware::Error`.
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),
    /// Errors returned by the Firestore API.
    #[error("API error: {0}")]
    ApiError(ApiFailure),
    /// Wrapper for `serde_json::Error`.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    /// The query could not be built from the given parameters.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    /// The API answered successfully but with a body we cannot interpret.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Client for one Cloud Firestore database.
pub struct FirebaseFirestore {
    client: ClientWithMiddleware,
    database_id: String,
    base_url: String,
}

impl FirebaseFirestore {
    /// Creates a client for `database_id` in `project_id` under `api_root`
    /// (normally [`FIRESTORE_V1_API`]).
    pub fn new_with_url(
        client: ClientWithMiddleware,
        api_root: &str,
        project_id: &str,
        database_id: &str,
    ) -> Self {
        let base_url = format!(
            "{}/projects/{}/databases/{}/documents",
            api_root.trim_end_matches('/'),
            encode_path_segment(project_id),
            database_id
        );

        Self {
            client,
            database_id: database_id.to_string(),
            base_url,
        }
    }

    /// The id of the database this client is bound to.
    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    /// Gets a `CollectionReference` for a root collection.
    ///
    /// # Arguments
    ///
    /// * `collection_id` - The ID of the collection (e.g., "users").
    pub fn collection(&self, collection_id: &str) -> CollectionReference<'_> {
        CollectionReference {
            client: &self.client,
            parent: self.base_url.clone(),
            id: collection_id.to_string(),
        }
    }

    /// Lists the ids of the root collections of the database.
    #[instrument(skip(self), fields(database = %self.database_id))]
    pub async fn list_collection_ids(&self) -> Result<Vec<String>, FirestoreError> {
        let url = format!("{}:listCollectionIds", self.base_url);
        let mut collections = Vec::new();
        let mut next_page_token = None;

        loop {
            let request = ListCollectionIdsRequest {
                page_size: Some(100),
                page_token: next_page_token.take(),
            };

            let response = self
                .client
                .post(&url)
                .header(header::CONTENT_TYPE, "application/json")
                .body(serde_json::to_vec(&request)?)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(FirestoreError::ApiError(
                    parse_error_response(response, "List collections failed").await,
                ));
            }

            let result: ListCollectionIdsResponse = response.json().await?;
            collections.extend(result.collection_ids);

            match result.next_page_token {
                Some(token) if !token.is_empty() => next_page_token = Some(token),
                _ => break,
            }
        }

        Ok(collections)
    }
}

/// Lists the Firestore databases of a project through the admin API.
#[instrument(skip(client))]
pub async fn list_databases(
    client: &ClientWithMiddleware,
    api_root: &str,
    project_id: &str,
) -> Result<Vec<DatabaseResource>, FirestoreError> {
    let url = format!(
        "{}/projects/{}/databases",
        api_root.trim_end_matches('/'),
        encode_path_segment(project_id)
    );

    let response = client.get(&url).send().await?;

    if !response.status().is_success() {
        return Err(FirestoreError::ApiError(
            parse_error_response(response, "List databases failed").await,
        ));
    }

    let result: ListDatabasesResponse = response.json().await?;
    Ok(result.databases)
}
