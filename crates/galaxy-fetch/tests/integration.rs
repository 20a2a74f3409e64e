//! Integration tests for galaxy-fetch using mockito

use galaxy_fetch::{Fetch, FetchErrorKind, FetchOptions, ResponseData, ResponseType};
use mockito::Matcher;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct TestPayload {
    name: String,
    value: i32,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct TestResponse {
    success: bool,
    data: String,
}

fn client_for(server: &mockito::Server) -> Fetch {
    Fetch::new().create(FetchOptions::new().base_url(server.url()))
}

#[tokio::test]
async fn test_fetch_success() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/api/data")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success": true, "data": "hello"}"#)
        .create_async()
        .await;

    let result: TestResponse = client_for(&server)
        .fetch("/api/data", FetchOptions::new())
        .await
        .expect("Fetch should succeed");

    assert!(result.success);
    assert_eq!(result.data, "hello");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_fetch_error_status_keeps_body() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/api/histories/missing")
        .with_status(404)
        .with_header("content-type", "application/json")
        .with_body(r#"{"err_msg": "History not found", "err_code": 404001}"#)
        .create_async()
        .await;

    let err = client_for(&server)
        .fetch::<serde_json::Value>("api/histories/missing", FetchOptions::new())
        .await
        .expect_err("Not found");

    assert_eq!(err.kind(), FetchErrorKind::Status);
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.status_text(), Some("Not Found"));
    assert_eq!(
        err.data().and_then(ResponseData::to_json),
        Some(json!({"err_msg": "History not found", "err_code": 404001}))
    );
    assert!(err.to_string().starts_with("[GET] "));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/api/flaky")
        .with_status(503)
        .with_body("Service Unavailable")
        .expect(3)
        .create_async()
        .await;

    let err = client_for(&server)
        .fetch_raw("/api/flaky", FetchOptions::new().retry(2))
        .await
        .expect_err("always unavailable");

    assert_eq!(err.status(), Some(503));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_post_json_body() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/api/submit")
        .match_header("content-type", "application/json")
        .match_header("accept", "application/json")
        .match_body(Matcher::Json(json!({"name": "test", "value": 42})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success": true, "data": "received"}"#)
        .create_async()
        .await;

    let payload = TestPayload {
        name: "test".to_string(),
        value: 42,
    };
    let result: TestResponse = client_for(&server)
        .fetch("/api/submit", FetchOptions::new().method("POST").json(&payload))
        .await
        .expect("POST should succeed");

    assert_eq!(result.data, "received");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_post_form_body() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/api/histories")
        .match_header("content-type", "application/x-www-form-urlencoded")
        .match_body("name=my+history")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": "h1", "name": "my history"}"#)
        .create_async()
        .await;

    let created: serde_json::Value = client_for(&server)
        .fetch(
            "api/histories",
            FetchOptions::new()
                .method("POST")
                .form(&[("name", "my history")]),
        )
        .await
        .expect("history created");

    assert_eq!(created["id"], "h1");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_query_parameters() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/api/tools/cat1/build")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("io_details".into(), "true".into()),
            Matcher::UrlEncoded("version".into(), "1.0.0".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": "cat1"}"#)
        .create_async()
        .await;

    let tool: serde_json::Value = client_for(&server)
        .fetch(
            "api/tools/cat1/build",
            FetchOptions::new()
                .query("io_details", true)
                .query("version", "1.0.0"),
        )
        .await
        .expect("tool found");

    assert_eq!(tool["id"], "cat1");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_text_and_no_content_responses() {
    let mut server = mockito::Server::new_async().await;

    let text_mock = server
        .mock("GET", "/api/datasets/d1/display")
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_body("chr1\t100\t200\n")
        .create_async()
        .await;
    let empty_mock = server
        .mock("DELETE", "/api/histories/h1")
        .with_status(204)
        .with_header("content-type", "application/json")
        .create_async()
        .await;

    let client = client_for(&server);

    let text = client
        .fetch_data("/api/datasets/d1/display", FetchOptions::new())
        .await
        .expect("dataset content");
    assert_eq!(text.as_text(), Some("chr1\t100\t200\n"));

    let empty = client
        .fetch_raw("/api/histories/h1", FetchOptions::new().method("DELETE"))
        .await
        .expect("deleted");
    assert!(empty.data().is_none());

    text_mock.assert_async().await;
    empty_mock.assert_async().await;
}

#[tokio::test]
async fn test_stream_response() {
    use futures::TryStreamExt;

    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/api/workflows/w1/download")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"a_galaxy_workflow": "true"}"#)
        .create_async()
        .await;

    let data = client_for(&server)
        .fetch_data(
            "/api/workflows/w1/download",
            FetchOptions::new().response_type(ResponseType::Stream),
        )
        .await
        .expect("stream");

    let ResponseData::Stream(stream) = data else {
        panic!("expected a stream");
    };
    let chunks: Vec<bytes::Bytes> = stream.try_collect().await.expect("body read");
    let body: Vec<u8> = chunks.concat();
    assert_eq!(body, br#"{"a_galaxy_workflow": "true"}"#);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_connection_refused() {
    let client = Fetch::new();
    let err = client
        .fetch_raw("http://127.0.0.1:1/api", FetchOptions::new().retry(0))
        .await
        .expect_err("nothing listens on port 1");

    assert_eq!(err.kind(), FetchErrorKind::Transport);
    assert!(err.response().is_none());
    assert!(err.to_string().contains("<no response>"));
}
