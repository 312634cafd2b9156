//! `helm` backed capabilities

use super::command::{
    ArgBuilder, CommandArgs, CommandTool, bool_param, object_schema, required_str, str_param,
    u64_param,
};
use crate::mcp::tools::ToolDescriptor;
use serde_json::{Value, json};

/// Every helm capability, in catalog order
#[inline]
pub fn tools(program: &str) -> Vec<CommandTool> {
    let specs: [(ToolDescriptor, ArgBuilder); 4] = [
        (list_descriptor(), list_args),
        (status_descriptor(), status_args),
        (history_descriptor(), history_args),
        (uninstall_descriptor(), uninstall_args),
    ];

    specs
        .into_iter()
        .map(|(descriptor, build)| CommandTool::new(descriptor, program, build))
        .collect()
}

fn base(params: &Value, args: &[&str]) -> CommandArgs {
    let mut command = CommandArgs::new(args.iter().copied());
    command
        .option("--kubeconfig", str_param(params, "kubeconfig"))
        .option("--kube-context", str_param(params, "context"));
    command
}

fn release_properties() -> Value {
    json!({
        "release_name": {"type": "string"},
        "namespace": {"type": "string"}
    })
}

fn list_descriptor() -> ToolDescriptor {
    ToolDescriptor::new("helmlist", "List Helm releases").with_schema(object_schema(
        json!({
            "namespace": {"type": "string"},
            "all_namespaces": {"type": "boolean"},
            "filter": {"type": "string", "description": "Regular expression matched against release names"},
            "all": {"type": "boolean"},
            "deployed": {"type": "boolean"},
            "failed": {"type": "boolean"},
            "pending": {"type": "boolean"},
            "uninstalling": {"type": "boolean"}
        }),
        &[],
    ))
}

fn list_args(params: &Value) -> Result<CommandArgs, String> {
    let namespace = str_param(params, "namespace");
    let all_namespaces = bool_param(params, "all_namespaces");
    if namespace.is_some() && all_namespaces {
        return Err("'namespace' cannot be combined with 'all_namespaces'".to_string());
    }

    let mut command = base(params, &["list"]);
    command
        .flag(all_namespaces, "--all-namespaces")
        .option("--namespace", namespace)
        .option("--filter", str_param(params, "filter"));
    for status in ["all", "deployed", "failed", "pending", "uninstalling"] {
        command.flag(bool_param(params, status), &format!("--{}", status));
    }
    command.json("--output");
    Ok(command)
}

fn status_descriptor() -> ToolDescriptor {
    let mut properties = release_properties();
    properties["revision"] = json!({"type": "integer", "minimum": 1});
    properties["show_desc"] = json!({"type": "boolean"});

    ToolDescriptor::new("helmstatus", "Show the status of a Helm release")
        .with_schema(object_schema(properties, &["release_name"]))
}

fn status_args(params: &Value) -> Result<CommandArgs, String> {
    let release = required_str(params, "release_name")?;
    let mut command = base(params, &["status", release]);
    command
        .option("--namespace", str_param(params, "namespace"))
        .option("--revision", u64_param(params, "revision"))
        .flag(bool_param(params, "show_desc"), "--show-desc")
        .json("--output");
    Ok(command)
}

fn history_descriptor() -> ToolDescriptor {
    let mut properties = release_properties();
    properties["max"] = json!({"type": "integer", "minimum": 1});

    ToolDescriptor::new("helmhistory", "Show the revision history of a Helm release")
        .with_schema(object_schema(properties, &["release_name"]))
}

fn history_args(params: &Value) -> Result<CommandArgs, String> {
    let release = required_str(params, "release_name")?;
    let mut command = base(params, &["history", release]);
    command
        .option("--namespace", str_param(params, "namespace"))
        .option("--max", u64_param(params, "max"))
        .json("--output");
    Ok(command)
}

fn uninstall_descriptor() -> ToolDescriptor {
    let mut properties = release_properties();
    properties["keep_history"] = json!({"type": "boolean"});
    properties["dry_run"] = json!({"type": "boolean"});
    properties["no_hooks"] = json!({"type": "boolean"});
    properties["wait"] = json!({"type": "boolean"});
    properties["timeout"] = json!({"type": "string", "description": "Go duration, e.g. 5m"});

    ToolDescriptor::new("helmuninstall", "Uninstall a Helm release")
        .with_schema(object_schema(properties, &["release_name"]))
}

fn uninstall_args(params: &Value) -> Result<CommandArgs, String> {
    let release = required_str(params, "release_name")?;
    let mut command = base(params, &["uninstall", release]);
    command
        .option("--namespace", str_param(params, "namespace"))
        .flag(bool_param(params, "keep_history"), "--keep-history")
        .flag(bool_param(params, "dry_run"), "--dry-run")
        .flag(bool_param(params, "no_hooks"), "--no-hooks")
        .flag(bool_param(params, "wait"), "--wait")
        .option("--timeout", str_param(params, "timeout"));
    Ok(command)
}
