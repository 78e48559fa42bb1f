//! Chat command table and argument parsing
//!
//! Commands are looked up by name in a [`CommandTable`]: the fixed admin
//! commands plus one `/mcp_<tool>` binding per remote tool. The table is
//! rebuilt from each new tool snapshot, so bindings for removed tools
//! disappear with it.

use std::collections::HashMap;

use parley_protocol::Tool;
use serde_json::{json, Map, Value};

/// Prefix of the per-tool binding commands
pub const BINDING_PREFIX: &str = "/mcp_";

/// Fixed administrative commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminCommand {
    Connect,
    Disconnect,
    Status,
    Tools,
    Resources,
    Call,
    Read,
    Help,
}

/// Table entry describing an admin command
#[derive(Debug, Clone, Copy)]
pub struct AdminSpec {
    pub name: &'static str,
    pub command: AdminCommand,
    pub usage: &'static str,
    pub help: &'static str,
}

pub const ADMIN_COMMANDS: &[AdminSpec] = &[
    AdminSpec {
        name: "/mcp-connect",
        command: AdminCommand::Connect,
        usage: "/mcp-connect [serverUrl]",
        help: "Connect (or switch) to an MCP server",
    },
    AdminSpec {
        name: "/mcp-disconnect",
        command: AdminCommand::Disconnect,
        usage: "/mcp-disconnect",
        help: "Close the server connection without reconnecting",
    },
    AdminSpec {
        name: "/mcp-status",
        command: AdminCommand::Status,
        usage: "/mcp-status",
        help: "Show connection state and server details",
    },
    AdminSpec {
        name: "/mcp-tools",
        command: AdminCommand::Tools,
        usage: "/mcp-tools",
        help: "List the server's tools",
    },
    AdminSpec {
        name: "/mcp-resources",
        command: AdminCommand::Resources,
        usage: "/mcp-resources",
        help: "List the server's resources",
    },
    AdminSpec {
        name: "/mcp-call",
        command: AdminCommand::Call,
        usage: "/mcp-call <tool> <jsonArgs>",
        help: "Invoke a tool with JSON object arguments",
    },
    AdminSpec {
        name: "/mcp-read",
        command: AdminCommand::Read,
        usage: "/mcp-read <uri>",
        help: "Read a resource",
    },
    AdminSpec {
        name: "/mcp-help",
        command: AdminCommand::Help,
        usage: "/mcp-help",
        help: "Show available MCP commands",
    },
];

/// A chat command bound to a remote tool
#[derive(Debug, Clone, PartialEq)]
pub struct ToolBinding {
    /// Chat command name, `/mcp_<tool>`
    pub command: String,
    pub tool: String,
    pub description: Option<String>,
}

/// What a command name resolves to
#[derive(Debug, Clone, PartialEq)]
pub enum CommandTarget {
    Admin(AdminCommand),
    Tool(ToolBinding),
}

/// Name to handler lookup for chat commands
#[derive(Debug, Clone)]
pub struct CommandTable {
    entries: HashMap<String, CommandTarget>,
    /// Binding names in tool order
    bindings: Vec<String>,
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandTable {
    /// Admin commands only
    pub fn new() -> Self {
        let entries = ADMIN_COMMANDS
            .iter()
            .map(|spec| (spec.name.to_string(), CommandTarget::Admin(spec.command)))
            .collect();
        Self {
            entries,
            bindings: Vec::new(),
        }
    }

    /// Admin commands plus one binding per tool.
    ///
    /// Tools whose names cannot be typed as a single command word are skipped.
    pub fn with_bindings(tools: &[Tool]) -> Self {
        let mut table = Self::new();
        for tool in tools {
            if tool.name.is_empty() || tool.name.contains(char::is_whitespace) {
                tracing::warn!(tool = %tool.name, "Tool name is not a valid command, skipping");
                continue;
            }

            let command = binding_name(&tool.name);
            let binding = ToolBinding {
                command: command.clone(),
                tool: tool.name.clone(),
                description: tool.description.clone(),
            };
            if table
                .entries
                .insert(command.clone(), CommandTarget::Tool(binding))
                .is_none()
            {
                table.bindings.push(command);
            }
        }
        table
    }

    pub fn lookup(&self, name: &str) -> Option<&CommandTarget> {
        self.entries.get(name)
    }

    /// Current `/mcp_<tool>` names
    pub fn binding_names(&self) -> &[String] {
        &self.bindings
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// Every command as a tool-like descriptor, admin commands first
    pub fn descriptors(&self) -> Vec<Tool> {
        let admin = ADMIN_COMMANDS.iter().map(|spec| Tool {
            name: spec.name.to_string(),
            description: Some(format!("{} ({})", spec.help, spec.usage)),
            input_schema: json!({
                "type": "object",
                "properties": { "args": { "type": "string" } },
            }),
        });

        let bindings = self.bindings.iter().filter_map(|name| match self.entries.get(name) {
            Some(CommandTarget::Tool(binding)) => Some(Tool {
                name: binding.command.clone(),
                description: binding.description.clone(),
                input_schema: json!({
                    "type": "object",
                    "properties": { "args": { "type": "string" } },
                }),
            }),
            _ => None,
        });

        admin.chain(bindings).collect()
    }
}

/// Chat command name for a tool
pub fn binding_name(tool: &str) -> String {
    format!("{}{}", BINDING_PREFIX, tool)
}

/// Split `/name rest` into the command name and its trimmed arguments.
///
/// Returns `None` when the input is not a command.
///
/// # Examples
///
/// ```
/// use parley_bridge::commands::split_command;
///
/// assert_eq!(split_command("/mcp-call echo {}"), Some(("/mcp-call", "echo {}")));
/// assert_eq!(split_command("  /mcp-tools "), Some(("/mcp-tools", "")));
/// assert_eq!(split_command("hello"), None);
/// ```
pub fn split_command(input: &str) -> Option<(&str, &str)> {
    let input = input.trim();
    if !input.starts_with('/') || input.len() == 1 {
        return None;
    }

    match input.split_once(char::is_whitespace) {
        Some((name, rest)) => Some((name, rest.trim())),
        None => Some((input, "")),
    }
}

/// Error parsing command arguments
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Required argument absent
    Missing(&'static str),
    /// Arguments are not valid JSON
    InvalidJson(String),
    /// Arguments are JSON but not an object
    NotAnObject,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Missing(what) => write!(f, "missing {}", what),
            ParseError::InvalidJson(msg) => write!(f, "invalid JSON arguments: {}", msg),
            ParseError::NotAnObject => write!(f, "arguments must be a JSON object"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Arguments for a `/mcp_<tool>` binding.
///
/// Empty input is `{}`, a JSON object is passed as-is, and anything else
/// is wrapped as `{"input": <text>}`.
pub fn parse_tool_arguments(args: &str) -> Value {
    let args = args.trim();
    if args.is_empty() {
        return Value::Object(Map::new());
    }

    match serde_json::from_str::<Value>(args) {
        Ok(Value::Object(map)) => Value::Object(map),
        _ => json!({ "input": args }),
    }
}

/// Parse `/mcp-call` arguments: `<tool> [jsonObject]`
pub fn parse_call(args: &str) -> Result<(String, Value), ParseError> {
    let args = args.trim();
    if args.is_empty() {
        return Err(ParseError::Missing("tool name"));
    }

    let (tool, rest) = match args.split_once(char::is_whitespace) {
        Some((tool, rest)) => (tool, rest.trim()),
        None => (args, ""),
    };

    if rest.is_empty() {
        return Ok((tool.to_string(), Value::Object(Map::new())));
    }

    match serde_json::from_str::<Value>(rest) {
        Ok(Value::Object(map)) => Ok((tool.to_string(), Value::Object(map))),
        Ok(_) => Err(ParseError::NotAnObject),
        Err(e) => Err(ParseError::InvalidJson(e.to_string())),
    }
}
