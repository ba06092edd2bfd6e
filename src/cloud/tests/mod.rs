use super::*;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn static_config(server: &MockServer) -> CloudConfig {
    CloudConfig {
        open_api_base_url: server.uri(),
        offline_api_base_url: server.uri(),
        access_token: Some("static-token".to_string()),
        ..Default::default()
    }
}

fn ok(data: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"code": 0, "message": "ok", "data": data}))
}

async fn mount_status(server: &MockServer, task_id: &str, data: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api/v1/offline/download/process"))
        .and(query_param("taskID", task_id))
        .respond_with(ok(data))
        .mount(server)
        .await;
}

#[tokio::test]
async fn resolve_then_submit_returns_task_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v2/offline_download/task/resolve"))
        .and(header("Authorization", "Bearer static-token"))
        .and(header("Platform", "open_platform"))
        .and(body_json(json!({"urls": "magnet:?xt=urn:btih:AAA"})))
        .respond_with(ok(json!({
            "list": [{"id": 77, "result": 0, "files": [{"id": 1}, {"id": "2"}]}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v2/offline_download/task/submit"))
        .and(body_json(json!({
            "resource_list": [{"resource_id": 77, "select_file_id": [1, 2]}],
            "upload_dir": 4242
        })))
        .respond_with(ok(json!({"task_list": [{"task_id": 9001}]})))
        .expect(1)
        .mount(&server)
        .await;

    let client = CloudClient::new(&static_config(&server)).unwrap();
    let task_id = client
        .resolve_and_submit("magnet:?xt=urn:btih:AAA", 4242)
        .await
        .unwrap();

    assert_eq!(task_id, 9001);
}

#[tokio::test]
async fn resolution_error_skips_submit() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v2/offline_download/task/resolve"))
        .respond_with(ok(json!({
            "list": [{"id": 0, "result": 1, "err_msg": "invalid magnet", "files": []}]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v2/offline_download/task/submit"))
        .respond_with(ok(json!({"task_list": [{"task_id": 1}]})))
        .expect(0)
        .mount(&server)
        .await;

    let client = CloudClient::new(&static_config(&server)).unwrap();
    let err = client
        .resolve_and_submit("magnet:?xt=urn:btih:DEAD", 0)
        .await
        .unwrap_err();

    assert_eq!(err, RemoteError::Resolution("invalid magnet".to_string()));
    assert!(err.to_string().contains("resolution failed"));
}

#[tokio::test]
async fn resolution_without_files_skips_submit() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v2/offline_download/task/resolve"))
        .respond_with(ok(json!({"list": [{"id": 5, "result": 0, "files": []}]})))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v2/offline_download/task/submit"))
        .respond_with(ok(json!({"task_list": [{"task_id": 1}]})))
        .expect(0)
        .mount(&server)
        .await;

    let client = CloudClient::new(&static_config(&server)).unwrap();
    let err = client
        .resolve_and_submit("magnet:?xt=urn:btih:EMPTY", 0)
        .await
        .unwrap_err();

    assert_eq!(err, RemoteError::EmptyResolution);
}

#[tokio::test]
async fn submit_without_task_list_fails() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v2/offline_download/task/resolve"))
        .respond_with(ok(json!({"list": [{"id": 5, "result": 0, "files": [{"id": 3}]}]})))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v2/offline_download/task/submit"))
        .respond_with(ok(json!({})))
        .mount(&server)
        .await;

    let client = CloudClient::new(&static_config(&server)).unwrap();
    let err = client
        .resolve_and_submit("magnet:?xt=urn:btih:AAA", 0)
        .await
        .unwrap_err();

    assert_eq!(err, RemoteError::MissingTaskId);
}

#[tokio::test]
async fn api_error_code_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v2/offline_download/task/resolve"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"code": 5113, "message": "quota exceeded"})),
        )
        .mount(&server)
        .await;

    let client = CloudClient::new(&static_config(&server)).unwrap();
    let err = client
        .resolve_and_submit("magnet:?xt=urn:btih:AAA", 0)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RemoteError::Api { endpoint: "resolve", code: 5113, ref message } if message == "quota exceeded"
    ));
}

#[tokio::test]
async fn http_error_status_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/offline/download/process"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = CloudClient::new(&static_config(&server)).unwrap();
    let err = client.poll_status(1).await.unwrap_err();

    assert_eq!(
        err,
        RemoteError::HttpStatus {
            endpoint: "status",
            status: 503
        }
    );
}

#[tokio::test]
async fn poll_status_maps_remote_codes() {
    let server = MockServer::start().await;
    mount_status(&server, "10", json!({"status": 0, "process": 42.5})).await;
    mount_status(&server, "11", json!({"status": 1, "failReason": "tracker timeout"})).await;
    mount_status(&server, "12", json!({"status": 2, "process": 100, "fileID": "5550"})).await;
    mount_status(&server, "13", json!({"status": 3})).await;
    mount_status(&server, "14", json!({"status": 1, "failReason": ""})).await;

    let client = CloudClient::new(&static_config(&server)).unwrap();

    assert_eq!(
        client.poll_status(10).await.unwrap(),
        RemoteTaskStatus::InProgress {
            progress: Some(42.5)
        }
    );
    assert_eq!(
        client.poll_status(11).await.unwrap(),
        RemoteTaskStatus::Failed {
            reason: Some("tracker timeout".to_string())
        }
    );
    assert_eq!(
        client.poll_status(12).await.unwrap(),
        RemoteTaskStatus::Succeeded { file_id: 5550 }
    );
    assert_eq!(
        client.poll_status(13).await.unwrap(),
        RemoteTaskStatus::InProgress { progress: None }
    );
    assert_eq!(
        client.poll_status(14).await.unwrap(),
        RemoteTaskStatus::Failed { reason: None }
    );
}

#[tokio::test]
async fn unknown_status_or_missing_file_id_is_malformed() {
    let server = MockServer::start().await;
    mount_status(&server, "20", json!({"status": 7})).await;
    mount_status(&server, "21", json!({"status": 2})).await;

    let client = CloudClient::new(&static_config(&server)).unwrap();

    assert!(matches!(
        client.poll_status(20).await.unwrap_err(),
        RemoteError::Malformed { endpoint: "status", .. }
    ));
    assert!(matches!(
        client.poll_status(21).await.unwrap_err(),
        RemoteError::Malformed { endpoint: "status", .. }
    ));
}

#[tokio::test]
async fn create_folder_returns_dir_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload/v1/file/mkdir"))
        .and(body_json(json!({"name": "Show A", "parentID": 12})))
        .respond_with(ok(json!({"dirID": 3456})))
        .expect(1)
        .mount(&server)
        .await;

    let client = CloudClient::new(&static_config(&server)).unwrap();
    assert_eq!(client.create_folder("Show A", 12).await.unwrap(), 3456);
}

#[tokio::test]
async fn missing_credentials_abort_before_any_request() {
    let server = MockServer::start().await;

    Mock::given(wiremock::matchers::any())
        .respond_with(ok(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let config = CloudConfig {
        open_api_base_url: server.uri(),
        offline_api_base_url: server.uri(),
        ..Default::default()
    };
    let client = CloudClient::new(&config).unwrap();

    let err = client
        .resolve_and_submit("magnet:?xt=urn:btih:AAA", 0)
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Credential(_)));

    let err = client.create_folder("x", 0).await.unwrap_err();
    assert!(matches!(err, RemoteError::Credential(_)));
}

#[tokio::test]
async fn token_cache_reuses_token_until_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .and(header("Platform", "open_platform"))
        .and(body_json(json!({"clientID": "id", "clientSecret": "secret"})))
        .respond_with(ok(json!({
            "accessToken": "fresh-token",
            "expiredAt": "2099-01-01T00:00:00+08:00"
        })))
        .expect(2)
        .mount(&server)
        .await;

    // First status call is rejected as unauthorized, later ones succeed.
    Mock::given(method("GET"))
        .and(path("/api/v1/offline/download/process"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"code": 401, "message": "token expired"})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/offline/download/process"))
        .and(header("Authorization", "Bearer fresh-token"))
        .respond_with(ok(json!({"status": 0})))
        .mount(&server)
        .await;

    let config = CloudConfig {
        open_api_base_url: server.uri(),
        offline_api_base_url: server.uri(),
        client_id: Some("id".to_string()),
        client_secret: Some("secret".to_string()),
        ..Default::default()
    };
    let client = CloudClient::new(&config).unwrap();

    let err = client.poll_status(1).await.unwrap_err();
    assert!(matches!(err, RemoteError::Api { code: 401, .. }));

    // Token was invalidated, so this call fetches a second one
    client.poll_status(1).await.unwrap();
    // And this one reuses it
    client.poll_status(1).await.unwrap();
}

#[tokio::test]
async fn token_endpoint_refusal_is_a_credential_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"code": 1, "message": "bad secret"})),
        )
        .mount(&server)
        .await;

    let config = CloudConfig {
        open_api_base_url: server.uri(),
        client_id: Some("id".to_string()),
        client_secret: Some("wrong".to_string()),
        ..Default::default()
    };
    let cache = TokenCache::new(&config, reqwest::Client::new());

    let err = cache.access_token().await.unwrap_err();
    assert!(matches!(err, RemoteError::Credential(ref m) if m.contains("bad secret")));
}

#[tokio::test]
async fn static_token_takes_precedence() {
    let config = CloudConfig {
        access_token: Some("pre-issued".to_string()),
        client_id: Some("id".to_string()),
        client_secret: Some("secret".to_string()),
        ..Default::default()
    };
    let provider = credentials::from_config(&config, reqwest::Client::new());
    assert_eq!(provider.access_token().await.unwrap(), "pre-issued");
}
