use super::{router, AppState};
use crate::console::{ConnectionManager, Endpoints};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use httpmock::prelude::*;
use reqwest::Client;
use reqwest_middleware::ClientBuilder;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const DOCS: &str = "/projects/test-project/databases/(default)/documents";

fn state(server: &MockServer) -> AppState {
    let client = ClientBuilder::new(Client::new()).build();
    let manager = ConnectionManager::with_client(
        client,
        "test-project",
        Endpoints {
            firestore: server.base_url(),
            identity_toolkit: server.base_url(),
        },
    )
    .unwrap();
    AppState::new(Arc::new(manager), 50)
}

async fn call(state: AppState, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router(state).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_documents_requires_collection() {
    let server = MockServer::start_async().await;

    let (status, body) = call(state(&server), Method::GET, "/api/documents", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Collection ID is required" }));

    let (status, _) = call(
        state(&server),
        Method::DELETE,
        "/api/documents/u1?collection=",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_documents_rejects_bad_limit() {
    let server = MockServer::start_async().await;

    let (status, body) = call(
        state(&server),
        Method::GET,
        "/api/documents?collection=users&limit=many",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid limit: many");
}

#[tokio::test]
async fn test_list_documents() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(POST).path(format!("{}:runAggregationQuery", DOCS));
            then.status(200).json_body(json!([{
                "result": { "aggregateFields": { "total": { "integerValue": "3" } } }
            }]));
        })
        .await;
    let read = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("{}:runQuery", DOCS))
                .json_body(json!({
                    "structuredQuery": {
                        "from": [{ "collectionId": "users" }],
                        "where": {
                            "fieldFilter": {
                                "field": { "fieldPath": "role" },
                                "op": "NOT_EQUAL",
                                "value": { "stringValue": "guest" }
                            }
                        },
                        "orderBy": [{ "field": { "fieldPath": "role" }, "direction": "DESCENDING" }],
                        "limit": 1
                    }
                }));
            then.status(200).json_body(json!([{
                "document": {
                    "name": "projects/test-project/databases/(default)/documents/users/u1",
                    "fields": { "role": { "stringValue": "admin" } }
                }
            }]));
        })
        .await;

    let (status, body) = call(
        state(&server),
        Method::GET,
        "/api/documents?collection=users&limit=1&filterField=role&filterOperator=!%3D&filterValue=guest&orderBy=role&orderDirection=desc",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "documents": [{ "id": "u1", "data": { "role": "admin" } }],
            "total": 3,
            "hasMore": true,
            "lastDocId": "u1",
            "database": "(default)",
            "fellBackToDefault": false,
            "cursorApplied": false
        })
    );
    read.assert_async().await;
}

#[tokio::test]
async fn test_unknown_operator_means_equality() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(POST).path(format!("{}:runAggregationQuery", DOCS));
            then.status(200).json_body(json!([{
                "result": { "aggregateFields": { "total": { "integerValue": "0" } } }
            }]));
        })
        .await;
    let read = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("{}:runQuery", DOCS))
                .json_body(json!({
                    "structuredQuery": {
                        "from": [{ "collectionId": "users" }],
                        "where": {
                            "fieldFilter": {
                                "field": { "fieldPath": "role" },
                                "op": "EQUAL",
                                "value": { "stringValue": "admin" }
                            }
                        },
                        "limit": 50
                    }
                }));
            then.status(200).json_body(json!([]));
        })
        .await;

    let (status, body) = call(
        state(&server),
        Method::GET,
        "/api/documents?collection=users&filterField=role&filterOperator=like&filterValue=admin",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
    assert_eq!(body["lastDocId"], Value::Null);
    read.assert_async().await;
}

#[tokio::test]
async fn test_rejected_query_is_bad_request() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(POST).path(format!("{}:runAggregationQuery", DOCS));
            then.status(400).json_body(json!({
                "error": {
                    "code": 400,
                    "message": "The query requires an index.",
                    "status": "FAILED_PRECONDITION"
                }
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(format!("{}:runQuery", DOCS));
            then.status(200).json_body(json!([]));
        })
        .await;

    let (status, body) = call(
        state(&server),
        Method::GET,
        "/api/documents?collection=users&orderBy=age",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("requires an index"));
}

#[tokio::test]
async fn test_store_failure_is_generic_error() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(POST).path(format!("{}:runAggregationQuery", DOCS));
            then.status(500).body("backend exploded");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(format!("{}:runQuery", DOCS));
            then.status(500).body("backend exploded");
        })
        .await;

    let (status, body) = call(
        state(&server),
        Method::GET,
        "/api/documents?collection=users",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Failed to fetch documents" }));
}

#[tokio::test]
async fn test_get_missing_document() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("{}/users/ghost", DOCS));
            then.status(404);
        })
        .await;

    let (status, body) = call(
        state(&server),
        Method::GET,
        "/api/documents/ghost?collection=users",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Document not found" }));
}

#[tokio::test]
async fn test_update_document_merges() {
    let server = MockServer::start_async().await;

    let mock = server
        .mock_async(|when, then| {
            when.method(PATCH)
                .path(format!("{}/users/u1", DOCS))
                .query_param("updateMask.fieldPaths", "age")
                .json_body(json!({ "fields": { "age": { "integerValue": "31" } } }));
            then.status(200).json_body(json!({}));
        })
        .await;

    let (status, body) = call(
        state(&server),
        Method::PUT,
        "/api/documents/u1?collection=users",
        Some(json!({ "data": { "age": 31 } })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "id": "u1", "success": true, "database": "(default)", "fellBackToDefault": false })
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn test_create_document_with_generated_id() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("{}/users", DOCS))
                .json_body(json!({ "fields": { "name": { "stringValue": "Eve" } } }));
            then.status(200).json_body(json!({
                "name": "projects/test-project/databases/(default)/documents/users/gen42"
            }));
        })
        .await;

    let (status, body) = call(
        state(&server),
        Method::POST,
        "/api/documents?collection=users",
        Some(json!({ "data": { "name": "Eve" } })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "gen42");
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_delete_document() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(DELETE)
                .path("/projects/test-project/databases/frankfurt/documents/users/u1");
            then.status(200).json_body(json!({}));
        })
        .await;

    let (status, body) = call(
        state(&server),
        Method::DELETE,
        "/api/documents/u1?collection=users&database=frankfurt",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "id": "u1", "success": true, "database": "frankfurt" }));
}

#[tokio::test]
async fn test_list_collections_failure_is_not_found() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/projects/test-project/databases/archive/documents:listCollectionIds");
            then.status(404).json_body(json!({
                "error": { "code": 404, "message": "database not found", "status": "NOT_FOUND" }
            }));
        })
        .await;

    let (status, body) = call(
        state(&server),
        Method::GET,
        "/api/collections?database=archive",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["collections"], json!([]));
    assert!(body["error"].as_str().unwrap().contains("database archive"));
}

#[tokio::test]
async fn test_list_collections() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(POST).path(format!("{}:listCollectionIds", DOCS));
            then.status(200).json_body(json!({ "collectionIds": ["orders", "users"] }));
        })
        .await;

    let (status, body) = call(state(&server), Method::GET, "/api/collections", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "collections": ["orders", "users"], "database": "(default)", "fellBackToDefault": false })
    );
}

#[tokio::test]
async fn test_databases_and_cache() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/projects/test-project/databases");
            then.status(500);
        })
        .await;

    let state = state(&server);
    state.manager.handle(Some("frankfurt")).await.unwrap();

    let (status, body) = call(state.clone(), Method::GET, "/api/databases", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["databases"][0]["id"], "(default)");
    assert!(body["error"].is_string());

    let (status, body) = call(state.clone(), Method::DELETE, "/api/databases/cache", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));
    assert_eq!(state.manager.cached_handles().await, 0);
}

#[tokio::test]
async fn test_list_users() {
    let server = MockServer::start_async().await;

    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/projects/test-project/accounts:batchGet")
                .query_param("maxResults", "10");
            then.status(200).json_body(json!({
                "users": [
                    { "localId": "uid-1", "email": "ann@example.com", "displayName": "Ann" },
                    { "localId": "uid-2", "email": "bob@example.com", "displayName": "Bob" }
                ]
            }));
        })
        .await;

    let (status, body) = call(
        state(&server),
        Method::GET,
        "/api/auth/users?limit=10&search=ann",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"].as_array().unwrap().len(), 1);
    assert_eq!(body["users"][0]["uid"], "uid-1");
    assert_eq!(body["users"][0]["displayName"], "Ann");
    assert_eq!(body["hasMore"], false);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_list_users_limit_out_of_range() {
    let server = MockServer::start_async().await;

    let (status, _) = call(
        state(&server),
        Method::GET,
        "/api/auth/users?limit=5000",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_tenants() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/v2/projects/test-project/tenants");
            then.status(200).json_body(json!({
                "tenants": [{ "name": "projects/test-project/tenants/t1", "displayName": "One" }]
            }));
        })
        .await;

    let (status, body) = call(state(&server), Method::GET, "/api/auth/tenants", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "tenants": [{ "id": "t1", "displayName": "One" }] })
    );
}

#[tokio::test]
async fn test_unknown_status_means_enabled() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/projects/test-project/accounts:batchGet");
            then.status(200).json_body(json!({
                "users": [
                    { "localId": "uid-1" },
                    { "localId": "uid-2", "disabled": true }
                ]
            }));
        })
        .await;

    let (status, body) = call(
        state(&server),
        Method::GET,
        "/api/auth/users?status=archived",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"].as_array().unwrap().len(), 1);
    assert_eq!(body["users"][0]["uid"], "uid-1");
}

#[tokio::test]
async fn test_tenant_path_escape_is_bad_request() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/projects/test-project/accounts:batchGet");
            then.status(200)
                .json_body(json!({ "users": [{ "localId": "project-level-user" }] }));
        })
        .await;

    let (status, body) = call(
        state(&server),
        Method::GET,
        "/api/auth/users?tenantId=x%2F..%2F..",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("users").is_none());
}
