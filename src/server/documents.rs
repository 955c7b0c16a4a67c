use super::{parse_limit, ApiError, AppState};
use crate::console::documents::{
    self, DocumentRecord, FieldFilterSpec, OrderSpec, Page, QuerySpec,
};
use crate::console::{self, ConsoleError, DatabaseListing};
use crate::firestore::models::{Direction, FieldOperator};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as SerdeValue};
use tracing::{error, info, warn};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DocumentsParams {
    collection: Option<String>,
    database: Option<String>,
    limit: Option<String>,
    last_doc_id: Option<String>,
    search: Option<String>,
    filter_field: Option<String>,
    filter_value: Option<String>,
    filter_operator: Option<String>,
    order_by: Option<String>,
    order_direction: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TargetParams {
    collection: Option<String>,
    database: Option<String>,
}

impl TargetParams {
    fn collection(&self) -> Result<&str, ApiError> {
        self.collection
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "Collection ID is required"))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DocumentsResponse {
    documents: Vec<DocumentRecord>,
    total: u64,
    has_more: bool,
    last_doc_id: Option<String>,
    database: String,
    fell_back_to_default: bool,
    cursor_applied: bool,
}

impl From<Page> for DocumentsResponse {
    fn from(page: Page) -> Self {
        Self {
            documents: page.documents,
            total: page.total,
            has_more: page.has_more,
            last_doc_id: page.next_cursor,
            database: page.database,
            fell_back_to_default: page.fell_back_to_default,
            cursor_applied: page.cursor_applied,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateDocumentBody {
    id: Option<String>,
    data: SerdeValue,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateDocumentBody {
    data: SerdeValue,
}

impl DocumentsParams {
    fn into_spec(self, default_limit: u32) -> Result<QuerySpec, ApiError> {
        let collection_id = self
            .collection
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "Collection ID is required"))?;
        let limit = parse_limit(self.limit.as_deref(), default_limit)?;

        let filter = match (self.filter_field, self.filter_value) {
            (Some(field), Some(value)) if !field.is_empty() => {
                let token = self.filter_operator.as_deref().unwrap_or("==");
                let operator = FieldOperator::from_token(token).unwrap_or_else(|| {
                    warn!(operator = %token, "unknown filter operator, using equality");
                    FieldOperator::Equal
                });
                Some(FieldFilterSpec {
                    field,
                    operator,
                    value: SerdeValue::String(value),
                })
            }
            _ => None,
        };

        let order_by = self.order_by.filter(|f| !f.is_empty()).map(|field| OrderSpec {
            field,
            direction: Direction::from_token(self.order_direction.as_deref().unwrap_or("asc")),
        });

        Ok(QuerySpec {
            database_id: self.database,
            collection_id,
            filter,
            order_by,
            limit,
            cursor: self.last_doc_id,
            search: self.search,
        })
    }
}

pub(crate) async fn list_documents(
    State(state): State<AppState>,
    Query(params): Query<DocumentsParams>,
) -> Result<Json<DocumentsResponse>, ApiError> {
    let spec = params.into_spec(state.default_limit)?;
    info!(
        collection = %spec.collection_id,
        database = spec.database_id.as_deref().unwrap_or("(default)"),
        "fetching documents"
    );

    let page = documents::list(&state.manager, &spec)
        .await
        .map_err(|e| ApiError::from_console(e, "Failed to fetch documents"))?;

    Ok(Json(page.into()))
}

pub(crate) async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<TargetParams>,
) -> Result<Json<DocumentRecord>, ApiError> {
    let collection = params.collection()?;

    documents::get(&state.manager, params.database.as_deref(), collection, &id)
        .await
        .map_err(|e| ApiError::from_console(e, "Failed to fetch document"))?
        .map(Json)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Document not found"))
}

pub(crate) async fn create_document(
    State(state): State<AppState>,
    Query(params): Query<TargetParams>,
    Json(body): Json<CreateDocumentBody>,
) -> Result<Json<SerdeValue>, ApiError> {
    let collection = params.collection()?;

    let write = documents::upsert(
        &state.manager,
        params.database.as_deref(),
        collection,
        body.id.as_deref(),
        &body.data,
    )
    .await
    .map_err(|e| ApiError::from_console(e, "Failed to create document"))?;

    Ok(Json(json!({
        "id": write.id,
        "success": true,
        "database": write.database,
        "fellBackToDefault": write.fell_back_to_default,
    })))
}

pub(crate) async fn update_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<TargetParams>,
    Json(body): Json<UpdateDocumentBody>,
) -> Result<Json<SerdeValue>, ApiError> {
    let collection = params.collection()?;

    let write = documents::upsert(
        &state.manager,
        params.database.as_deref(),
        collection,
        Some(&id),
        &body.data,
    )
    .await
    .map_err(|e| ApiError::from_console(e, "Failed to update document"))?;

    Ok(Json(json!({
        "id": write.id,
        "success": true,
        "database": write.database,
        "fellBackToDefault": write.fell_back_to_default,
    })))
}

pub(crate) async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<TargetParams>,
) -> Result<Json<SerdeValue>, ApiError> {
    let collection = params.collection()?;

    let write = documents::delete(&state.manager, params.database.as_deref(), collection, &id)
        .await
        .map_err(|e| ApiError::from_console(e, "Failed to delete document"))?;

    Ok(Json(json!({
        "id": write.id,
        "success": true,
        "database": write.database,
    })))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DatabaseParams {
    database: Option<String>,
}

pub(crate) async fn list_collections(
    State(state): State<AppState>,
    Query(params): Query<DatabaseParams>,
) -> Result<Json<SerdeValue>, ApiError> {
    let database = params.database.as_deref();

    match documents::list_collections(&state.manager, database).await {
        Ok(listing) => Ok(Json(json!({
            "collections": listing.collections,
            "database": listing.database,
            "fellBackToDefault": listing.fell_back_to_default,
        }))),
        Err(err @ ConsoleError::Configuration(_)) => Err(ApiError::from_console(
            err,
            "Failed to initialize Firebase. Check your service account credentials.",
        )
        .with_field("collections", json!([]))),
        Err(err) => {
            let database = database.unwrap_or("(default)");
            let message = format!(
                "Failed to list collections for database {}. The database may not exist or your service account may not have access.",
                database
            );
            error!(error = %err, "{}", message);
            Err(ApiError::new(StatusCode::NOT_FOUND, message).with_field("collections", json!([])))
        }
    }
}

pub(crate) async fn list_databases(State(state): State<AppState>) -> Json<DatabaseListing> {
    Json(console::list_databases(&state.manager).await)
}

pub(crate) async fn clear_cache(State(state): State<AppState>) -> Json<SerdeValue> {
    state.manager.clear_cache().await;
    Json(json!({ "success": true }))
}
