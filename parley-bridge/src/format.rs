//! Chat-facing text for protocol results

use parley_client::{ClientError, EngineStatus, ServerInfo};
use parley_protocol::{
    CallToolResult, ListResourcesResult, LogMessageParams, ReadResourceResult, Tool,
};

use crate::commands::{binding_name, ADMIN_COMMANDS};

pub fn connected(server: &ServerInfo) -> String {
    format!(
        "Connected to {} {} (protocol {})",
        server.implementation.name, server.implementation.version, server.protocol_version
    )
}

pub fn status(status: &EngineStatus, tool_count: usize) -> String {
    let mut out = format!("MCP status: {}", status.state);
    if let Some(url) = &status.url {
        out.push_str(&format!("\nServer URL: {}", url));
    }
    if let Some(server) = &status.server {
        out.push_str(&format!(
            "\nServer: {} {} (protocol {})",
            server.implementation.name, server.implementation.version, server.protocol_version
        ));
        if let Some(session) = &server.session {
            out.push_str(&format!(
                "\nSession: {} (permissions: {})",
                session.id.as_deref().unwrap_or("-"),
                if session.permissions.is_empty() {
                    "none".to_string()
                } else {
                    session.permissions.join(", ")
                }
            ));
        }
    }
    out.push_str(&format!("\nTools: {}", tool_count));
    out
}

pub fn tool_list(tools: &[Tool]) -> String {
    if tools.is_empty() {
        return "No tools available".to_string();
    }

    let mut out = format!("Available tools ({}):", tools.len());
    for tool in tools {
        out.push_str(&format!("\n  {}", binding_name(&tool.name)));
        if let Some(desc) = &tool.description {
            out.push_str(&format!(" - {}", desc));
        }
    }
    out
}

pub fn resource_list(result: &ListResourcesResult) -> String {
    if result.resources.is_empty() {
        return "No resources available".to_string();
    }

    let mut out = format!("Available resources ({}):", result.resources.len());
    for resource in &result.resources {
        out.push_str(&format!("\n  {} ({})", resource.name, resource.uri));
        if let Some(desc) = &resource.description {
            out.push_str(&format!(" - {}", desc));
        }
    }
    if result.next_cursor.is_some() {
        out.push_str("\n  ...");
    }
    out
}

pub fn resource_contents(uri: &str, result: &ReadResourceResult) -> String {
    if result.contents.is_empty() {
        return format!("{} is empty", uri);
    }

    result
        .contents
        .iter()
        .map(|contents| match (&contents.text, &contents.blob) {
            (Some(text), _) => text.clone(),
            (None, Some(_)) => format!(
                "[binary: {}]",
                contents.mime_type.as_deref().unwrap_or("application/octet-stream")
            ),
            (None, None) => format!("[empty: {}]", contents.uri),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text of a successful tool result
pub fn tool_output(result: &CallToolResult) -> String {
    let text = result.text_content();
    if text.is_empty() {
        "(no output)".to_string()
    } else {
        text
    }
}

pub fn tool_failure(tool: &str, message: &str) -> String {
    ClientError::tool(tool, message).to_string()
}

/// Chat text for an in-band (`isError`) tool failure
pub fn tool_reported_error(tool: &str, result: &CallToolResult) -> String {
    let text = result.text_content();
    let message = if text.is_empty() { "tool reported an error" } else { text.as_str() };
    tool_failure(tool, message)
}

pub fn client_error(action: &str, error: &ClientError) -> String {
    format!("{} failed: {}", action, error)
}

pub fn server_log(params: &LogMessageParams) -> String {
    let level = params.level.as_str().to_uppercase();
    match &params.logger {
        Some(logger) => format!("[MCP {}] {}: {}", level, logger, params.data_text()),
        None => format!("[MCP {}] {}", level, params.data_text()),
    }
}

pub fn help(bindings: &[String]) -> String {
    let mut out = String::from("MCP commands:");
    for spec in ADMIN_COMMANDS {
        out.push_str(&format!("\n  {} - {}", spec.usage, spec.help));
    }
    if !bindings.is_empty() {
        out.push_str("\nTool commands:");
        for name in bindings {
            out.push_str(&format!("\n  {} [args]", name));
        }
    }
    out
}
