//! Dispatcher tests: protocol compliance, error mapping and notification
//! silence, driven through the same entry point the transports use.

use crate::capabilities::echo::EchoTool;
use crate::mcp::protocol::*;
use crate::mcp::server::McpServer;
use crate::mcp::tools::*;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fails the way a command-line collaborator does
struct FailingTool;

#[async_trait]
impl ToolHandler for FailingTool {
    fn describe(&self) -> ToolDescriptor {
        ToolDescriptor::new("failing", "always fails")
    }

    async fn invoke(&self, _params: Value) -> InvocationResult {
        InvocationResult::failure_with_detail(
            FailureKind::CommandFailed,
            "kubectl exited with status 1",
            json!({"stderr": "connection refused"}),
        )
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

/// Schema-less tool that reports what it received and counts calls
struct RecordingTool {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ToolHandler for RecordingTool {
    fn describe(&self) -> ToolDescriptor {
        ToolDescriptor::new("recording", "returns its params")
    }

    async fn invoke(&self, params: Value) -> InvocationResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        InvocationResult::success(json!({"received": params}))
    }
}

fn test_server() -> (McpServer, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut registry = ToolRegistry::new();
    registry.register_handler(EchoTool).expect("echo registers");
    registry
        .register_handler(FailingTool)
        .expect("failing registers");
    registry
        .register_handler(PanickingTool)
        .expect("panicking registers");
    registry
        .register_handler(RecordingTool {
            calls: Arc::clone(&calls),
        })
        .expect("recording registers");

    let server = McpServer::new("test-server".to_string(), "1.0.0".to_string(), registry)
        .expect("server is created");
    (server, calls)
}

async fn dispatch(server: &McpServer, raw: &str) -> Value {
    let message = server
        .handle_message(raw)
        .await
        .expect("request produces a response");
    serde_json::to_value(message).expect("response serializes")
}

#[tokio::test]
async fn echo_round_trip() {
    let (server, _) = test_server();

    let response = dispatch(
        &server,
        r#"{"jsonrpc":"2.0","method":"echo","params":{"message":"hi"},"id":1}"#,
    )
    .await;

    assert_eq!(
        response,
        json!({"jsonrpc": "2.0", "result": {"message": "hi"}, "id": 1})
    );
}

#[tokio::test]
async fn unknown_method_is_not_found() {
    let (server, _) = test_server();

    let response = dispatch(&server, r#"{"jsonrpc":"2.0","method":"nope","id":2}"#).await;

    assert_eq!(response["error"]["code"], error_codes::METHOD_NOT_FOUND);
    assert_eq!(response["id"], 2);
    assert!(response.get("result").is_none());
}

#[tokio::test]
async fn numeric_ids_are_echoed_unchanged() {
    let (server, _) = test_server();

    for id in ["18446744073709551615", "-7", "2.5"] {
        let raw = format!(
            r#"{{"jsonrpc":"2.0","method":"echo","params":{{"message":"x"}},"id":{}}}"#,
            id
        );
        let message = server
            .handle_message(&raw)
            .await
            .expect("request produces a response");
        let encoded = serde_json::to_string(&message).expect("response serializes");

        assert!(message.result().is_some(), "{encoded}");
        assert!(encoded.ends_with(&format!(r#""id":{}}}"#, id)), "{encoded}");
    }
}

#[tokio::test]
async fn schema_violation_is_invalid_params() {
    let (server, _) = test_server();

    let response = dispatch(
        &server,
        r#"{"jsonrpc":"2.0","method":"echo","params":{"message":42},"id":"req-3"}"#,
    )
    .await;

    assert_eq!(response["error"]["code"], error_codes::INVALID_PARAMS);
    assert_eq!(response["id"], "req-3");
    let errors = response["error"]["data"]["errors"]
        .as_array()
        .expect("validation errors are listed");
    assert!(!errors.is_empty());
}

#[tokio::test]
async fn collaborator_failure_is_structured() {
    let (server, _) = test_server();

    let response = dispatch(&server, r#"{"jsonrpc":"2.0","method":"failing","id":4}"#).await;

    assert_eq!(response["error"]["code"], app_error_codes::COMMAND_FAILED);
    assert_eq!(response["id"], 4);
    assert_eq!(
        response["error"]["data"]["message"],
        "kubectl exited with status 1"
    );
    assert_eq!(
        response["error"]["data"]["detail"]["stderr"],
        "connection refused"
    );

    // The server keeps serving after a failed collaborator.
    let response = dispatch(&server, r#"{"jsonrpc":"2.0","method":"ping","id":5}"#).await;
    assert_eq!(response["result"], json!({}));
}

#[tokio::test]
async fn panicking_tool_is_internal_error() {
    let (server, _) = test_server();

    let response = dispatch(&server, r#"{"jsonrpc":"2.0","method":"panicking","id":6}"#).await;
    assert_eq!(response["error"]["code"], error_codes::INTERNAL_ERROR);
    assert_eq!(response["id"], 6);

    let response = dispatch(
        &server,
        r#"{"jsonrpc":"2.0","method":"echo","params":{"message":"still here"},"id":7}"#,
    )
    .await;
    assert_eq!(response["result"]["message"], "still here");
}

#[tokio::test]
async fn malformed_json_is_parse_error_with_null_id() {
    let (server, _) = test_server();

    for raw in [
        "{",
        "not json at all",
        r#"{"jsonrpc":"2.0","method":"echo","id":1"#,
        "",
        "\u{0}",
    ] {
        let response = dispatch(&server, raw).await;
        assert_eq!(response["error"]["code"], error_codes::PARSE_ERROR, "{raw:?}");
        assert_eq!(response["id"], Value::Null);
    }
}

#[tokio::test]
async fn structurally_invalid_request_keeps_id() {
    let (server, _) = test_server();

    let response = dispatch(&server, r#"{"jsonrpc":"1.0","method":"ping","id":9}"#).await;
    assert_eq!(response["error"]["code"], error_codes::INVALID_REQUEST);
    assert_eq!(response["id"], 9);

    let response = dispatch(&server, r#"{"jsonrpc":"2.0","id":10}"#).await;
    assert_eq!(response["error"]["code"], error_codes::INVALID_REQUEST);
    assert_eq!(response["id"], 10);

    let response = dispatch(&server, "[]").await;
    assert_eq!(response["error"]["code"], error_codes::INVALID_REQUEST);
    assert_eq!(response["id"], Value::Null);
}

#[tokio::test]
async fn notifications_never_answer() {
    let (server, calls) = test_server();

    for raw in [
        r#"{"jsonrpc":"2.0","method":"echo","params":{"message":"hi"},"id":null}"#,
        r#"{"jsonrpc":"2.0","method":"echo","params":{"message":"hi"}}"#,
        r#"{"jsonrpc":"2.0","method":"echo","params":{"message":1},"id":null}"#,
        r#"{"jsonrpc":"2.0","method":"nope","id":null}"#,
        r#"{"jsonrpc":"2.0","method":"failing","id":null}"#,
        r#"{"jsonrpc":"2.0","method":"panicking"}"#,
        r#"{"jsonrpc":"1.0","method":"echo"}"#,
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        r#"{"jsonrpc":"2.0","method":"recording","params":{"x":1}}"#,
    ] {
        assert!(server.handle_message(raw).await.is_none(), "{raw}");
    }

    // Notifications are still executed.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn tools_list_matches_registration_order() {
    let (server, _) = test_server();

    let response = dispatch(&server, r#"{"jsonrpc":"2.0","method":"tools/list","id":1}"#).await;
    let names: Vec<&str> = response["result"]["tools"]
        .as_array()
        .expect("tools array")
        .iter()
        .map(|tool| tool["name"].as_str().expect("tool name"))
        .collect();

    assert_eq!(names, vec!["echo", "failing", "panicking", "recording"]);
    assert_eq!(
        response["result"]["tools"][0]["inputSchema"]["required"],
        json!(["message"])
    );
}

#[tokio::test]
async fn repeated_pure_invocations_are_identical() {
    let (server, _) = test_server();
    let raw = r#"{"jsonrpc":"2.0","method":"echo","params":{"message":"same"},"id":11}"#;

    let first = dispatch(&server, raw).await;
    let second = dispatch(&server, raw).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn schemaless_tool_passes_params_through() {
    let (server, _) = test_server();

    let response = dispatch(
        &server,
        r#"{"jsonrpc":"2.0","method":"recording","params":{"anything":[1,2,3]},"id":12}"#,
    )
    .await;
    assert_eq!(response["result"]["received"], json!({"anything": [1, 2, 3]}));

    let response = dispatch(&server, r#"{"jsonrpc":"2.0","method":"recording","id":13}"#).await;
    assert_eq!(response["result"]["received"], json!({}));
}

#[tokio::test]
async fn tools_call_wraps_payload_as_content() {
    let (server, _) = test_server();

    let response = dispatch(
        &server,
        r#"{"jsonrpc":"2.0","method":"tools/call","params":{"name":"echo","arguments":{"message":"hi"}},"id":14}"#,
    )
    .await;

    let result = &response["result"];
    assert_eq!(result["isError"], false);
    assert_eq!(result["structuredContent"], json!({"message": "hi"}));
    assert_eq!(result["content"][0]["type"], "text");
    let text = result["content"][0]["text"].as_str().expect("text content");
    let decoded: Value = serde_json::from_str(text).expect("content is JSON");
    assert_eq!(decoded, json!({"message": "hi"}));
}

#[tokio::test]
async fn tools_call_shares_error_mapping() {
    let (server, _) = test_server();

    let unknown = dispatch(
        &server,
        r#"{"jsonrpc":"2.0","method":"tools/call","params":{"name":"ghost"},"id":15}"#,
    )
    .await;
    assert_eq!(unknown["error"]["code"], error_codes::INVALID_PARAMS);

    let failing = dispatch(
        &server,
        r#"{"jsonrpc":"2.0","method":"tools/call","params":{"name":"failing"},"id":16}"#,
    )
    .await;
    let direct = dispatch(&server, r#"{"jsonrpc":"2.0","method":"failing","id":16}"#).await;
    assert_eq!(failing["error"], direct["error"]);
}

#[tokio::test]
async fn initialize_is_static_metadata() {
    let (server, _) = test_server();

    let response = dispatch(
        &server,
        r#"{"jsonrpc":"2.0","method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"client","version":"0.1"}},"id":0}"#,
    )
    .await;

    assert_eq!(response["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(response["result"]["serverInfo"]["name"], "test-server");
    assert_eq!(
        response["result"]["capabilities"]["tools"]["listChanged"],
        false
    );

    let bare = dispatch(&server, r#"{"jsonrpc":"2.0","method":"initialize","id":1}"#).await;
    assert_eq!(bare["result"]["protocolVersion"], MCP_VERSION);
}
