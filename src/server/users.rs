use super::{parse_limit, ApiError, AppState};
use crate::console::users::{self, AuthUserPage, AuthUserQuerySpec, StatusFilter};
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value as SerdeValue};
use tracing::warn;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UsersParams {
    limit: Option<String>,
    next_page_token: Option<String>,
    tenant_id: Option<String>,
    search: Option<String>,
    email: Option<String>,
    display_name: Option<String>,
    phone: Option<String>,
    status: Option<String>,
}

pub(crate) async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<UsersParams>,
) -> Result<Json<AuthUserPage>, ApiError> {
    let spec = AuthUserQuerySpec {
        tenant_id: params.tenant_id,
        limit: parse_limit(params.limit.as_deref(), state.default_limit)?,
        page_token: params.next_page_token,
        search: params.search,
        email: params.email,
        display_name: params.display_name,
        phone: params.phone,
        status: params
            .status
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|token| {
                StatusFilter::parse(token).unwrap_or_else(|| {
                    warn!(status = %token, "unknown status filter, using enabled");
                    StatusFilter::Enabled
                })
            }),
    };

    let page = users::list_users(&state.manager, &spec)
        .await
        .map_err(|e| ApiError::from_console(e, "Failed to fetch auth users"))?;

    Ok(Json(page))
}

pub(crate) async fn list_tenants(State(state): State<AppState>) -> Result<Json<SerdeValue>, ApiError> {
    let tenants = users::list_tenants(&state.manager)
        .await
        .map_err(|e| ApiError::from_console(e, "Failed to fetch tenants"))?;

    Ok(Json(json!({ "tenants": tenants })))
}
