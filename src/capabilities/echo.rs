use crate::mcp::tools::{InvocationResult, ToolDescriptor, ToolHandler};
use async_trait::async_trait;
use serde_json::{Value, json};

/// Returns its `message` parameter unchanged. Pure, so repeated calls with
/// the same params always produce the same payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoTool;

#[async_trait]
impl ToolHandler for EchoTool {
    #[inline]
    fn describe(&self) -> ToolDescriptor {
        ToolDescriptor::new("echo", "Echo a message back to the caller").with_schema(json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "Text to echo back"
                }
            },
            "required": ["message"]
        }))
    }

    #[inline]
    async fn invoke(&self, params: Value) -> InvocationResult {
        let message = params.get("message").cloned().unwrap_or(Value::Null);
        InvocationResult::success(json!({ "message": message }))
    }
}
