use super::*;
use crate::auth::tenant_mgt::TenantManager;
use httpmock::prelude::*;
use reqwest::Client;
use reqwest_middleware::ClientBuilder;
use serde_json::json;

#[tokio::test]
async fn test_list_users() {
    let server = MockServer::start_async().await;
    let client = ClientBuilder::new(Client::new()).build();
    let auth = FirebaseAuth::new_with_client(client, server.url("/v1/projects/test-project"));

    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/projects/test-project/accounts:batchGet")
                .query_param("maxResults", "2")
                .query_param("nextPageToken", "page-1");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "users": [
                        {
                            "localId": "uid1",
                            "email": "ann@example.com",
                            "displayName": "Ann",
                            "customAttributes": "{\"admin\":true}",
                            "createdAt": "1609459200000"
                        },
                        { "localId": "uid2", "disabled": true }
                    ],
                    "nextPageToken": "page-2"
                }));
        })
        .await;

    let result = auth.list_users(2, Some("page-1")).await.unwrap();
    let users = result.users.unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].local_id, "uid1");
    assert_eq!(users[0].custom_attributes.as_deref(), Some("{\"admin\":true}"));
    assert!(users[1].disabled);
    assert!(users[1].email.is_none());
    assert_eq!(result.next_page_token.as_deref(), Some("page-2"));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_list_users_empty_project() {
    let server = MockServer::start_async().await;
    let client = ClientBuilder::new(Client::new()).build();
    let auth = FirebaseAuth::new(client, &server.base_url(), "test-project");

    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/projects/test-project/accounts:batchGet")
                .query_param("maxResults", "50");
            then.status(200).json_body(json!({}));
        })
        .await;

    let result = auth.list_users(50, None).await.unwrap();
    assert!(result.users.is_none());
    assert!(result.next_page_token.is_none());
}

#[tokio::test]
async fn test_list_users_api_error() {
    let server = MockServer::start_async().await;
    let client = ClientBuilder::new(Client::new()).build();
    let auth = FirebaseAuth::new(client, &server.base_url(), "test-project");

    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/projects/test-project/accounts:batchGet");
            then.status(403).json_body(json!({
                "error": {
                    "code": 403,
                    "message": "Caller does not have required permission",
                    "status": "PERMISSION_DENIED"
                }
            }));
        })
        .await;

    match auth.list_users(10, None).await {
        Err(AuthError::ApiError(failure)) => {
            assert_eq!(failure.code, 403);
            assert_eq!(failure.status.as_deref(), Some("PERMISSION_DENIED"));
            assert!(!failure.is_rejected_request());
        }
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_tenant_scoped_users() {
    let server = MockServer::start_async().await;
    let client = ClientBuilder::new(Client::new()).build();
    let tenants = TenantManager::new(client, &server.base_url(), "test-project");

    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/projects/test-project/tenants/tenant-a/accounts:batchGet");
            then.status(200).json_body(json!({
                "users": [{ "localId": "t-uid", "tenantId": "tenant-a" }]
            }));
        })
        .await;

    let result = tenants
        .auth_for_tenant("tenant-a")
        .unwrap()
        .list_users(10, None)
        .await
        .unwrap();
    let users = result.users.unwrap();
    assert_eq!(users[0].tenant_id.as_deref(), Some("tenant-a"));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_list_tenants() {
    let server = MockServer::start_async().await;
    let client = ClientBuilder::new(Client::new()).build();
    let tenants = TenantManager::new(client, &server.base_url(), "test-project");

    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v2/projects/test-project/tenants")
                .query_param("pageSize", "100");
            then.status(200).json_body(json!({
                "tenants": [
                    { "name": "projects/test-project/tenants/tenant-a", "displayName": "Tenant A" },
                    { "name": "projects/test-project/tenants/tenant-b" }
                ]
            }));
        })
        .await;

    let all = tenants.list_all_tenants().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].tenant_id(), "tenant-a");
    assert_eq!(all[0].display_name.as_deref(), Some("Tenant A"));
    assert_eq!(all[1].tenant_id(), "tenant-b");
    assert!(all[1].display_name.is_none());

    mock.assert_async().await;
}

#[test]
fn test_tenant_ids_cannot_leave_the_tenant_path() {
    let client = ClientBuilder::new(Client::new()).build();
    let tenants = TenantManager::new(client, "http://localhost", "test-project");

    for bad in ["x/../..", "..", ".", "", "%2e%2e", "tenant a", "t?x=1"] {
        assert!(
            matches!(tenants.auth_for_tenant(bad), Err(AuthError::InvalidTenantId(_))),
            "accepted tenant id {:?}",
            bad
        );
    }
    assert!(tenants.auth_for_tenant("Tenant-9x").is_ok());
}
