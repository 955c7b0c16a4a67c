use serde::{Deserialize, Serialize};

/// A user account as returned by `accounts:batchGet`.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct UserRecord {
    pub local_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub phone_number: Option<String>,
    pub disabled: bool,
    pub custom_attributes: Option<String>, // JSON string for custom claims
    pub tenant_id: Option<String>,
    /// Milliseconds since the epoch, as a decimal string.
    pub created_at: Option<String>,
    /// Milliseconds since the epoch, as a decimal string.
    pub last_login_at: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersResponse {
    pub users: Option<Vec<UserRecord>>,
    pub next_page_token: Option<String>,
}

/// Represents a tenant in a multi-tenant project.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    /// The resource name of the tenant.
    /// Format: "projects/{project-id}/tenants/{tenant-id}"
    pub name: String,

    /// The display name of the tenant.
    pub display_name: Option<String>,
}

impl Tenant {
    /// The tenant id, i.e. the last segment of the resource name.
    pub fn tenant_id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or_default()
    }
}

/// Response from listing tenants.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListTenantsResponse {
    /// The list of tenants.
    pub tenants: Option<Vec<Tenant>>,
    /// The token for the next page of results.
    pub next_page_token: Option<String>,
}
