//! Tenant management module.

use crate::auth::models::{ListTenantsResponse, Tenant};
use crate::auth::{AuthError, FirebaseAuth};
use crate::core::{encode_path_segment, parse_error_response};
use reqwest_middleware::ClientWithMiddleware;
use tracing::instrument;
use url::Url;

/// Reads the tenants of a multi-tenant project.
#[derive(Clone)]
pub struct TenantManager {
    client: ClientWithMiddleware,
    api_root: String,
    project_id: String,
}

impl TenantManager {
    pub fn new(client: ClientWithMiddleware, api_root: &str, project_id: &str) -> Self {
        Self {
            client,
            api_root: api_root.trim_end_matches('/').to_string(),
            project_id: project_id.to_string(),
        }
    }

    /// Returns a `FirebaseAuth` instance scoped to the specified tenant.
    pub fn auth_for_tenant(&self, tenant_id: &str) -> Result<FirebaseAuth, AuthError> {
        FirebaseAuth::for_tenant(self.client.clone(), &self.api_root, &self.project_id, tenant_id)
    }

    /// Lists one page of tenants.
    pub async fn list_tenants(
        &self,
        max_results: Option<u32>,
        page_token: Option<&str>,
    ) -> Result<ListTenantsResponse, AuthError> {
        let url = format!(
            "{}/v2/projects/{}/tenants",
            self.api_root,
            encode_path_segment(&self.project_id)
        );
        let mut url_obj = Url::parse(&url)?;

        {
            let mut query_pairs = url_obj.query_pairs_mut();
            if let Some(max) = max_results {
                query_pairs.append_pair("pageSize", &max.to_string());
            }
            if let Some(token) = page_token {
                query_pairs.append_pair("pageToken", token);
            }
        }

        let response = self.client.get(url_obj).send().await?;

        if !response.status().is_success() {
            return Err(AuthError::ApiError(
                parse_error_response(response, "List tenants failed").await,
            ));
        }

        let result: ListTenantsResponse = response.json().await?;
        Ok(result)
    }

    /// Lists every tenant, following page tokens.
    #[instrument(skip(self), fields(project = %self.project_id))]
    pub async fn list_all_tenants(&self) -> Result<Vec<Tenant>, AuthError> {
        let mut tenants = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.list_tenants(Some(100), page_token.as_deref()).await?;
            tenants.extend(page.tenants.unwrap_or_default());

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(tenants)
    }
}
