//! Authentication user browsing.
//!
//! Users come from the identity store one native page at a time. Every filter here runs
//! on that fetched page, not on the whole user set, so a narrow filter can return few or
//! no users while `has_more` still reports further pages.

use super::connection::ConnectionManager;
use super::error::ConsoleError;
use crate::auth::models::UserRecord;
use crate::auth::MAX_LIST_USERS_RESULTS;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::map::Map;
use serde_json::Value as SerdeValue;
use tracing::info;

pub const DEFAULT_USER_LIMIT: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    Enabled,
    Disabled,
}

impl StatusFilter {
    /// Parses `"enabled"` or `"disabled"`; anything else is `None`.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "enabled" => Some(Self::Enabled),
            "disabled" => Some(Self::Disabled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUserQuerySpec {
    pub tenant_id: Option<String>,
    pub limit: u32,
    pub page_token: Option<String>,
    pub search: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub status: Option<StatusFilter>,
}

impl Default for AuthUserQuerySpec {
    fn default() -> Self {
        Self {
            tenant_id: None,
            limit: DEFAULT_USER_LIMIT,
            page_token: None,
            search: None,
            email: None,
            display_name: None,
            phone: None,
            status: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUserMetadata {
    pub creation_time: Option<String>,
    pub last_sign_in_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub phone_number: Option<String>,
    pub tenant_id: Option<String>,
    pub disabled: bool,
    pub custom_claims: Map<String, SerdeValue>,
    pub metadata: AuthUserMetadata,
}

impl From<UserRecord> for AuthUser {
    fn from(record: UserRecord) -> Self {
        let custom_claims = record
            .custom_attributes
            .as_deref()
            .and_then(|raw| serde_json::from_str::<Map<String, SerdeValue>>(raw).ok())
            .unwrap_or_default();

        Self {
            uid: record.local_id,
            email: record.email,
            display_name: record.display_name,
            phone_number: record.phone_number,
            tenant_id: record.tenant_id,
            disabled: record.disabled,
            custom_claims,
            metadata: AuthUserMetadata {
                creation_time: record.created_at.as_deref().and_then(format_epoch_millis),
                last_sign_in_time: record.last_login_at.as_deref().and_then(format_epoch_millis),
            },
        }
    }
}

/// Renders an epoch-milliseconds string as an HTTP-style UTC date.
fn format_epoch_millis(raw: &str) -> Option<String> {
    let millis: i64 = raw.parse().ok()?;
    let time = DateTime::from_timestamp_millis(millis)?;
    Some(time.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUserPage {
    pub users: Vec<AuthUser>,
    pub has_more: bool,
    pub next_page_token: Option<String>,
}

/// Lists one page of users and filters it.
pub async fn list_users(
    manager: &ConnectionManager,
    spec: &AuthUserQuerySpec,
) -> Result<AuthUserPage, ConsoleError> {
    if spec.limit == 0 || spec.limit > MAX_LIST_USERS_RESULTS {
        return Err(ConsoleError::query(format!(
            "limit must be between 1 and {}",
            MAX_LIST_USERS_RESULTS
        )));
    }

    let tenant_id = spec.tenant_id.as_deref().filter(|t| !t.is_empty());
    let auth = manager.auth(tenant_id)?;
    let page_token = spec.page_token.as_deref().filter(|t| !t.is_empty());
    let result = auth.list_users(spec.limit, page_token).await?;

    let fetched: Vec<AuthUser> = result
        .users
        .unwrap_or_default()
        .into_iter()
        .map(AuthUser::from)
        .collect();
    let fetched_len = fetched.len();
    let users = filter_users(fetched, spec);

    let next_page_token = result.next_page_token.filter(|t| !t.is_empty());

    info!(
        tenant = tenant_id.unwrap_or("-"),
        fetched = fetched_len,
        returned = users.len(),
        "listed auth users"
    );

    Ok(AuthUserPage {
        users,
        has_more: next_page_token.is_some(),
        next_page_token,
    })
}

/// Applies the field filters and the combined search of `spec` to one page of users.
pub fn filter_users(users: Vec<AuthUser>, spec: &AuthUserQuerySpec) -> Vec<AuthUser> {
    let non_empty = |s: &Option<String>| s.clone().filter(|s| !s.is_empty());
    let email = non_empty(&spec.email);
    let display_name = non_empty(&spec.display_name).map(|s| s.to_lowercase());
    let phone = non_empty(&spec.phone);
    let search = non_empty(&spec.search).map(|s| s.to_lowercase());

    users
        .into_iter()
        .filter(|user| {
            email
                .as_deref()
                .map_or(true, |needle| contains(&user.email, needle))
        })
        .filter(|user| {
            display_name
                .as_deref()
                .map_or(true, |needle| contains_ignore_case(&user.display_name, needle))
        })
        .filter(|user| {
            phone
                .as_deref()
                .map_or(true, |needle| contains(&user.phone_number, needle))
        })
        .filter(|user| match spec.status {
            Some(StatusFilter::Disabled) => user.disabled,
            Some(StatusFilter::Enabled) => !user.disabled,
            None => true,
        })
        .filter(|user| {
            search.as_deref().map_or(true, |needle| {
                contains_ignore_case(&user.email, needle)
                    || contains_ignore_case(&user.display_name, needle)
                    || user.uid.to_lowercase().contains(needle)
                    || contains_ignore_case(&user.phone_number, needle)
            })
        })
        .collect()
}

fn contains(field: &Option<String>, needle: &str) -> bool {
    field.as_deref().is_some_and(|value| value.contains(needle))
}

// `needle` is expected to be lowercased already.
fn contains_ignore_case(field: &Option<String>, needle: &str) -> bool {
    field
        .as_deref()
        .is_some_and(|value| value.to_lowercase().contains(needle))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantSummary {
    pub id: String,
    pub display_name: String,
}

/// Lists all tenants of the project.
pub async fn list_tenants(manager: &ConnectionManager) -> Result<Vec<TenantSummary>, ConsoleError> {
    let tenants = manager.tenants().list_all_tenants().await?;

    Ok(tenants
        .into_iter()
        .map(|tenant| {
            let id = tenant.tenant_id().to_string();
            TenantSummary {
                display_name: tenant
                    .display_name
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| id.clone()),
                id,
            }
        })
        .collect())
}
