//! Firebase Authentication module.
//!
//! Read access to user accounts through the Identity Toolkit REST API, either for the
//! whole project or scoped to one tenant, plus tenant listing.

pub mod models;
pub mod tenant_mgt;

use crate::auth::models::ListUsersResponse;
use crate::core::{encode_path_segment, parse_error_response, ApiFailure};
use reqwest_middleware::ClientWithMiddleware;
use thiserror::Error;
use tracing::instrument;
use url::Url;

#[cfg(test)]
mod tests;

pub const IDENTITY_TOOLKIT_API: &str = "https://identitytoolkit.googleapis.com";

/// Upper bound the Identity Toolkit accepts for one page of users.
pub const MAX_LIST_USERS_RESULTS: u32 = 1000;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("HTTP Request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),
    #[error("API error: {0}")]
    ApiError(ApiFailure),
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Invalid tenant id: {0:?}")]
    InvalidTenantId(String),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Tenant ids are letters, digits and hyphens. Anything else could change the path a
/// tenant-scoped request is sent to.
pub fn validate_tenant_id(tenant_id: &str) -> Result<(), AuthError> {
    let valid = !tenant_id.is_empty()
        && tenant_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(AuthError::InvalidTenantId(tenant_id.to_string()))
    }
}

#[derive(Clone)]
pub struct FirebaseAuth {
    client: ClientWithMiddleware,
    base_url: String,
}

impl FirebaseAuth {
    /// Project-wide user access.
    pub fn new(client: ClientWithMiddleware, api_root: &str, project_id: &str) -> Self {
        let base_url = format!(
            "{}/v1/projects/{}",
            api_root.trim_end_matches('/'),
            encode_path_segment(project_id)
        );
        Self { client, base_url }
    }

    /// User access scoped to one tenant of a multi-tenant project.
    pub fn for_tenant(
        client: ClientWithMiddleware,
        api_root: &str,
        project_id: &str,
        tenant_id: &str,
    ) -> Result<Self, AuthError> {
        validate_tenant_id(tenant_id)?;
        let base_url = format!(
            "{}/v1/projects/{}/tenants/{}",
            api_root.trim_end_matches('/'),
            encode_path_segment(project_id),
            tenant_id
        );
        Ok(Self { client, base_url })
    }

    #[cfg(test)]
    pub(crate) fn new_with_client(client: ClientWithMiddleware, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Fetches one page of users. `page_token` continues a previous listing.
    #[instrument(skip(self), fields(base = %self.base_url))]
    pub async fn list_users(
        &self,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<ListUsersResponse, AuthError> {
        let mut url = Url::parse(&format!("{}/accounts:batchGet", self.base_url))?;
        {
            let mut query_pairs = url.query_pairs_mut();
            query_pairs.append_pair("maxResults", &max_results.to_string());
            if let Some(token) = page_token {
                query_pairs.append_pair("nextPageToken", token);
            }
        }

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(AuthError::ApiError(
                parse_error_response(response, "List users failed").await,
            ));
        }

        let result: ListUsersResponse = response.json().await?;
        Ok(result)
    }
}
