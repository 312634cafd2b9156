//! Command-line collaborators.
//!
//! A [`CommandTool`] turns validated params into an argument vector, runs
//! the configured program and classifies the outcome. Nothing here ever
//! panics on bad input; every problem becomes an [`InvocationResult::Failure`].

use crate::mcp::tools::{FailureKind, InvocationResult, ToolDescriptor, ToolHandler};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::io;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Arguments for one run, plus whether stdout is JSON to be decoded
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandArgs {
    pub args: Vec<String>,
    pub json_output: bool,
}

impl CommandArgs {
    #[inline]
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            json_output: false,
        }
    }

    #[inline]
    pub fn push(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    #[inline]
    pub fn flag(&mut self, enabled: bool, flag: &str) -> &mut Self {
        if enabled {
            self.args.push(flag.to_string());
        }
        self
    }

    /// Push `flag value` when `value` is present
    #[inline]
    pub fn option(&mut self, flag: &str, value: Option<impl ToString>) -> &mut Self {
        if let Some(value) = value {
            self.args.push(flag.to_string());
            self.args.push(value.to_string());
        }
        self
    }

    /// Ask the program for JSON on stdout
    #[inline]
    pub fn json(&mut self, output_flag: &str) -> &mut Self {
        self.args.push(output_flag.to_string());
        self.args.push("json".to_string());
        self.json_output = true;
        self
    }
}

/// Maps params onto a command line. `Err` carries a message for argument
/// combinations a JSON schema cannot express.
pub type ArgBuilder = fn(&Value) -> Result<CommandArgs, String>;

/// Captured result of a finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Run `program` to completion without a terminal. The child is killed if
/// the invocation future is dropped.
#[inline]
pub async fn run_command(program: &str, args: &[String]) -> io::Result<CommandOutput> {
    debug!("Running {} {}", program, args.join(" "));

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await?;

    Ok(CommandOutput {
        exit_code: output.status.code(),
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// A capability backed by an external program
pub struct CommandTool {
    descriptor: ToolDescriptor,
    program: String,
    build_args: ArgBuilder,
}

impl CommandTool {
    #[inline]
    pub fn new(descriptor: ToolDescriptor, program: impl Into<String>, build_args: ArgBuilder) -> Self {
        Self {
            descriptor,
            program: program.into(),
            build_args,
        }
    }

    #[inline]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The exact command line `params` would produce
    #[inline]
    pub fn command_line(&self, params: &Value) -> Result<CommandArgs, String> {
        (self.build_args)(params)
    }

    fn render(&self, args: &[String]) -> String {
        std::iter::once(self.program.as_str())
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl ToolHandler for CommandTool {
    #[inline]
    fn describe(&self) -> ToolDescriptor {
        self.descriptor.clone()
    }

    #[inline]
    async fn invoke(&self, params: Value) -> InvocationResult {
        let command = match self.command_line(&params) {
            Ok(command) => command,
            Err(message) => return InvocationResult::failure(FailureKind::InvalidArguments, message),
        };

        let output = match run_command(&self.program, &command.args).await {
            Ok(output) => output,
            Err(e) => {
                warn!("Failed to start {}: {}", self.program, e);
                let kind = match e.kind() {
                    io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                        FailureKind::CollaboratorUnavailable
                    }
                    _ => FailureKind::Other,
                };
                return InvocationResult::failure_with_detail(
                    kind,
                    format!("Unable to run {}: {}", self.program, e),
                    json!({"command": self.render(&command.args)}),
                );
            }
        };

        if !output.success {
            let status = output
                .exit_code
                .map_or_else(|| "a signal".to_string(), |code| format!("exit code {}", code));
            return InvocationResult::failure_with_detail(
                FailureKind::CommandFailed,
                format!("{} failed with {}", self.program, status),
                json!({
                    "command": self.render(&command.args),
                    "exit_code": output.exit_code,
                    "stdout": output.stdout,
                    "stderr": output.stderr,
                }),
            );
        }

        if !command.json_output {
            return InvocationResult::success(json!({
                "status": "success",
                "stdout": output.stdout,
                "stderr": output.stderr,
            }));
        }

        let trimmed = output.stdout.trim();
        if trimmed.is_empty() {
            return InvocationResult::success(json!({"status": "success", "output": Value::Null}));
        }

        match serde_json::from_str::<Value>(trimmed) {
            Ok(parsed) => InvocationResult::success(json!({"status": "success", "output": parsed})),
            Err(e) => InvocationResult::failure_with_detail(
                FailureKind::Other,
                format!("Failed to parse JSON output of {}: {}", self.program, e),
                json!({"raw_output": output.stdout}),
            ),
        }
    }
}

/// Non-empty string parameter
#[inline]
pub fn str_param<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

/// Required string parameter. Schemas already enforce presence; this only
/// guards against an empty string.
#[inline]
pub fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, String> {
    str_param(params, key).ok_or_else(|| format!("'{}' must be a non-empty string", key))
}

#[inline]
pub fn bool_param(params: &Value, key: &str) -> bool {
    params.get(key).and_then(Value::as_bool).unwrap_or(false)
}

#[inline]
pub fn u64_param(params: &Value, key: &str) -> Option<u64> {
    params.get(key).and_then(Value::as_u64)
}

/// Schema fragment shared by every collaborator that talks to a cluster
#[inline]
pub fn cluster_properties() -> serde_json::Map<String, Value> {
    let mut properties = serde_json::Map::new();
    properties.insert(
        "kubeconfig".to_string(),
        json!({"type": "string", "description": "Path to a kubeconfig file"}),
    );
    properties.insert(
        "context".to_string(),
        json!({"type": "string", "description": "Kubeconfig context to use"}),
    );
    properties
}

/// Build an object schema from tool specific properties plus the shared
/// cluster selection ones
#[inline]
pub fn object_schema(properties: Value, required: &[&str]) -> Value {
    let mut merged = cluster_properties();
    if let Value::Object(specific) = properties {
        merged.extend(specific);
    }

    json!({
        "type": "object",
        "properties": merged,
        "required": required,
        "additionalProperties": false
    })
}
