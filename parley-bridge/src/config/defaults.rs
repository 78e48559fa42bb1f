//! Default configuration values
//!
//! Written out by `parley-bridge --print-config` as a starting point.

/// Default configuration as TOML
pub const DEFAULT_CONFIG_TOML: &str = r##"
# parley bridge configuration

[server]
url = "ws://localhost:3001"
auto_connect = false
request_timeout_ms = 30000
protocol_version = "2024-11-05"
client_name = "parley"

# Credentials for servers that require authentication
# [server.auth]
# username = "admin"
# password = "secret"

[reconnect]
enabled = true
max_attempts = 5
base_delay_ms = 1000

[agent]
name = "mcp-agent"
system_sender = "mcp-bridge"
mention = "@agent"
command_prefix = "/ask"
process_tool = "process_message"
context_messages = 10

[rooms]
window_capacity = 100
active = []
"##;
