//! `kubectl` backed capabilities

use super::command::{
    ArgBuilder, CommandArgs, CommandTool, bool_param, object_schema, required_str, str_param,
    u64_param,
};
use crate::mcp::tools::ToolDescriptor;
use serde_json::{Value, json};

const ROLLOUT_ACTIONS: &[&str] = &["status", "history", "restart", "undo", "pause", "resume"];

/// Every kubectl capability, in catalog order
#[inline]
pub fn tools(program: &str) -> Vec<CommandTool> {
    let specs: [(ToolDescriptor, ArgBuilder); 6] = [
        (cluster_info_descriptor(), cluster_info_args),
        (get_descriptor(), get_args),
        (describe_descriptor(), describe_args),
        (logs_descriptor(), logs_args),
        (scale_descriptor(), scale_args),
        (rollout_descriptor(), rollout_args),
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
        .option("--context", str_param(params, "context"));
    command
}

fn namespace_scope(command: &mut CommandArgs, params: &Value) -> Result<(), String> {
    let namespace = str_param(params, "namespace");
    if bool_param(params, "all_namespaces") {
        if namespace.is_some() {
            return Err("'namespace' cannot be combined with 'all_namespaces'".to_string());
        }
        command.push("--all-namespaces");
    } else {
        command.option("--namespace", namespace);
    }
    Ok(())
}

fn cluster_info_descriptor() -> ToolDescriptor {
    ToolDescriptor::new(
        "kubernetesclusterinfo",
        "Show addresses of the control plane and cluster services",
    )
    .with_schema(object_schema(json!({}), &[]))
}

fn cluster_info_args(params: &Value) -> Result<CommandArgs, String> {
    Ok(base(params, &["cluster-info"]))
}

fn get_descriptor() -> ToolDescriptor {
    ToolDescriptor::new("kubernetesget", "Get or list Kubernetes resources as JSON").with_schema(
        object_schema(
            json!({
                "resource_type": {"type": "string", "description": "Resource type, e.g. pods or deployments", "default": "pods"},
                "name": {"type": "string"},
                "namespace": {"type": "string"},
                "all_namespaces": {"type": "boolean"},
                "label_selector": {"type": "string"},
                "field_selector": {"type": "string"}
            }),
            &[],
        ),
    )
}

fn get_args(params: &Value) -> Result<CommandArgs, String> {
    let resource_type = str_param(params, "resource_type").unwrap_or("pods");
    let name = str_param(params, "name");
    if name.is_some() && bool_param(params, "all_namespaces") {
        return Err("'name' cannot be combined with 'all_namespaces'".to_string());
    }

    let mut command = base(params, &["get", resource_type]);
    if let Some(name) = name {
        command.push(name);
    }
    namespace_scope(&mut command, params)?;
    command
        .option("--selector", str_param(params, "label_selector"))
        .option("--field-selector", str_param(params, "field_selector"))
        .json("--output");
    Ok(command)
}

fn describe_descriptor() -> ToolDescriptor {
    ToolDescriptor::new("kubernetesdescribe", "Show details of a resource or group of resources")
        .with_schema(object_schema(
            json!({
                "resource_type": {"type": "string"},
                "name": {"type": "string"},
                "namespace": {"type": "string"},
                "label_selector": {"type": "string"}
            }),
            &["resource_type"],
        ))
}

fn describe_args(params: &Value) -> Result<CommandArgs, String> {
    let resource_type = required_str(params, "resource_type")?;
    let mut command = base(params, &["describe", resource_type]);
    if let Some(name) = str_param(params, "name") {
        command.push(name);
    }
    command
        .option("--namespace", str_param(params, "namespace"))
        .option("--selector", str_param(params, "label_selector"));
    Ok(command)
}

fn logs_descriptor() -> ToolDescriptor {
    ToolDescriptor::new("kuberneteslogs", "Print the logs of a container in a pod").with_schema(
        object_schema(
            json!({
                "pod_name": {"type": "string"},
                "namespace": {"type": "string"},
                "container": {"type": "string"},
                "previous": {"type": "boolean"},
                "tail_lines": {"type": "integer", "minimum": 0},
                "since_seconds": {"type": "integer", "minimum": 1},
                "timestamps": {"type": "boolean"}
            }),
            &["pod_name"],
        ),
    )
}

fn logs_args(params: &Value) -> Result<CommandArgs, String> {
    let pod = required_str(params, "pod_name")?;
    let mut command = base(params, &["logs", pod]);
    command
        .option("--namespace", str_param(params, "namespace"))
        .option("--container", str_param(params, "container"))
        .flag(bool_param(params, "previous"), "--previous")
        .option("--tail", u64_param(params, "tail_lines"))
        .option(
            "--since",
            u64_param(params, "since_seconds").map(|seconds| format!("{}s", seconds)),
        )
        .flag(bool_param(params, "timestamps"), "--timestamps");
    Ok(command)
}

fn scale_descriptor() -> ToolDescriptor {
    ToolDescriptor::new("kubernetesscale", "Set a new size for a scalable resource").with_schema(
        object_schema(
            json!({
                "resource_type": {"type": "string", "default": "deployment"},
                "name": {"type": "string"},
                "namespace": {"type": "string"},
                "replicas": {"type": "integer", "minimum": 0}
            }),
            &["name", "replicas"],
        ),
    )
}

fn scale_args(params: &Value) -> Result<CommandArgs, String> {
    let resource_type = str_param(params, "resource_type").unwrap_or("deployment");
    let name = required_str(params, "name")?;
    let replicas = u64_param(params, "replicas")
        .ok_or_else(|| "'replicas' must be a non-negative integer".to_string())?;

    let mut command = base(params, &["scale"]);
    command
        .push(format!("{}/{}", resource_type, name))
        .push(format!("--replicas={}", replicas))
        .option("--namespace", str_param(params, "namespace"));
    Ok(command)
}

fn rollout_descriptor() -> ToolDescriptor {
    ToolDescriptor::new("kubernetesrollout", "Manage the rollout of a workload").with_schema(
        object_schema(
            json!({
                "action": {"type": "string", "enum": ROLLOUT_ACTIONS},
                "resource_type": {"type": "string", "default": "deployment"},
                "name": {"type": "string"},
                "namespace": {"type": "string"},
                "revision": {"type": "integer", "minimum": 1}
            }),
            &["action", "name"],
        ),
    )
}

fn rollout_args(params: &Value) -> Result<CommandArgs, String> {
    let action = required_str(params, "action")?;
    let resource_type = str_param(params, "resource_type").unwrap_or("deployment");
    let name = required_str(params, "name")?;
    let revision = u64_param(params, "revision");

    let mut command = base(params, &["rollout", action]);
    command
        .push(format!("{}/{}", resource_type, name))
        .option("--namespace", str_param(params, "namespace"));

    match (action, revision) {
        ("undo", Some(revision)) => {
            command.push(format!("--to-revision={}", revision));
        }
        ("history", Some(revision)) => {
            command.push(format!("--revision={}", revision));
        }
        (_, Some(_)) => {
            return Err(format!(
                "'revision' only applies to the undo and history actions, not '{}'",
                action
            ));
        }
        (_, None) => {}
    }

    Ok(command)
}
