use super::*;
use crate::capabilities::EchoTool;
use crate::mcp::protocol::app_error_codes;
use crate::mcp::tools::{InvocationResult, ToolDescriptor, ToolHandler, ToolRegistry};
use async_trait::async_trait;
use axum::body::{Body, to_bytes};
use axum::http::Request;
use tower::ServiceExt;

/// Fails with a fixed kind, to exercise the status mapping
struct KindFailure {
    name: &'static str,
    kind: FailureKind,
}

#[async_trait]
impl ToolHandler for KindFailure {
    fn describe(&self) -> ToolDescriptor {
        ToolDescriptor::new(self.name, "fails with a fixed kind")
    }

    async fn invoke(&self, _params: Value) -> InvocationResult {
        InvocationResult::failure(self.kind, format!("{} failed", self.name))
    }
}

struct PanickingTool;

#[async_trait]
impl ToolHandler for PanickingTool {
    fn describe(&self) -> ToolDescriptor {
        ToolDescriptor::new("panicking", "panics")
    }

    async fn invoke(&self, _params: Value) -> InvocationResult {
        panic!("handler bug")
    }
}

fn test_app() -> Router {
    let mut registry = ToolRegistry::new();
    registry.register_handler(EchoTool).expect("registers");
    for (name, kind) in [
        ("command", FailureKind::CommandFailed),
        ("unavailable", FailureKind::CollaboratorUnavailable),
        ("rejected", FailureKind::InvalidArguments),
    ] {
        registry
            .register_handler(KindFailure { name, kind })
            .expect("registers");
    }
    registry.register_handler(PanickingTool).expect("registers");

    let server = McpServer::new("kube-mcp".to_string(), "0.1.0".to_string(), registry)
        .expect("server is created");
    make_app(Arc::new(server))
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body is readable");
    (status, body.to_vec())
}

async fn send_json(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, request).await;
    let value = serde_json::from_slice(&body).expect("body is JSON");
    (status, value)
}

#[tokio::test]
async fn home_describes_server() {
    let (status, body) = send_json(test_app(), get("/")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "kube-mcp");
    assert_eq!(body["version"], "0.1.0");
    assert_eq!(body["mcp_endpoint"], MCP_ENDPOINT);
    assert_eq!(body["tools_endpoint"], "/tools/{name}");
    assert!(body["uptime_secs"].is_u64());
    assert!(body["started_at"].is_string());
}

#[tokio::test]
async fn tools_listing_includes_endpoints() {
    let (status, body) = send_json(test_app(), get("/tools")).await;

    assert_eq!(status, StatusCode::OK);
    let tools = body["tools"].as_array().expect("tools array");
    assert_eq!(tools.len(), 5);
    assert_eq!(tools[0]["name"], "echo");
    assert_eq!(tools[0]["endpoint"], "/tools/echo");
    assert_eq!(tools[0]["method"], "POST");
    assert_eq!(tools[0]["inputSchema"]["required"], json!(["message"]));
}

#[tokio::test]
async fn direct_invocation_returns_payload() {
    let (status, body) =
        send_json(test_app(), post("/tools/echo", r#"{"message":"hi"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "hi"}));
}

#[tokio::test]
async fn direct_invocation_errors_map_to_statuses() {
    let cases = [
        ("/tools/ghost", "{}", StatusCode::NOT_FOUND, error_codes::METHOD_NOT_FOUND),
        ("/tools/echo", "", StatusCode::UNPROCESSABLE_ENTITY, error_codes::INVALID_PARAMS),
        ("/tools/echo", "{not json", StatusCode::BAD_REQUEST, error_codes::PARSE_ERROR),
        ("/tools/command", "{}", StatusCode::BAD_GATEWAY, app_error_codes::COMMAND_FAILED),
        (
            "/tools/unavailable",
            "{}",
            StatusCode::SERVICE_UNAVAILABLE,
            app_error_codes::COLLABORATOR_UNAVAILABLE,
        ),
        (
            "/tools/rejected",
            "{}",
            StatusCode::UNPROCESSABLE_ENTITY,
            app_error_codes::INVALID_ARGUMENTS,
        ),
        ("/tools/panicking", "{}", StatusCode::INTERNAL_SERVER_ERROR, error_codes::INTERNAL_ERROR),
    ];

    for (uri, body, expected_status, expected_code) in cases {
        let (status, response) = send_json(test_app(), post(uri, body)).await;
        assert_eq!(status, expected_status, "{uri} with {body:?}");
        assert_eq!(response["error"]["code"], expected_code, "{uri}");
        assert!(response["error"]["message"].is_string());
    }
}

#[tokio::test]
async fn collaborator_error_body_carries_message() {
    let (_, body) = send_json(test_app(), post("/tools/command", "")).await;

    assert_eq!(body["error"]["data"]["tool"], "command");
    assert_eq!(body["error"]["data"]["kind"], "command_failed");
    assert_eq!(body["error"]["data"]["message"], "command failed");
}

#[tokio::test]
async fn protocol_endpoint_answers_requests() {
    let (status, body) = send_json(
        test_app(),
        post(
            MCP_ENDPOINT,
            r#"{"jsonrpc":"2.0","method":"echo","params":{"message":"hi"},"id":1}"#,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"jsonrpc": "2.0", "result": {"message": "hi"}, "id": 1})
    );

    // Protocol errors are still envelopes on a successful exchange.
    let (status, body) = send_json(
        test_app(),
        post(MCP_ENDPOINT, r#"{"jsonrpc":"2.0","method":"nope","id":2}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"]["code"], error_codes::METHOD_NOT_FOUND);
    assert_eq!(body["id"], 2);
}

#[tokio::test]
async fn protocol_endpoint_parse_error() {
    let (status, body) = send_json(test_app(), post(MCP_ENDPOINT, "{oops")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], error_codes::PARSE_ERROR);
    assert_eq!(body["id"], Value::Null);
}

#[tokio::test]
async fn protocol_endpoint_notification_is_accepted_silently() {
    for raw in [
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        r#"{"jsonrpc":"2.0","method":"command","id":null}"#,
        r#"{"jsonrpc":"2.0","method":"nope"}"#,
    ] {
        let (status, body) = send(test_app(), post(MCP_ENDPOINT, raw)).await;
        assert_eq!(status, StatusCode::ACCEPTED, "{raw}");
        assert!(body.is_empty(), "{raw}");
    }
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let (status, _) = send(test_app(), get("/nowhere")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
