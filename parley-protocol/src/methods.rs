//! Method names used on the wire

pub const INITIALIZE: &str = "initialize";
pub const INITIALIZED: &str = "notifications/initialized";
/// Sent between `initialize` and `initialized` when credentials are configured
pub const AUTHENTICATE: &str = "authenticate";
pub const PING: &str = "ping";

pub const TOOLS_LIST: &str = "tools/list";
pub const TOOLS_CALL: &str = "tools/call";
pub const RESOURCES_LIST: &str = "resources/list";
pub const RESOURCES_READ: &str = "resources/read";
pub const COMPLETION_COMPLETE: &str = "completion/complete";

// Notifications. Servers send either the short form or the
// `notifications/` form depending on protocol revision.
pub const TOOLS_LIST_CHANGED: &str = "tools/list_changed";
pub const TOOLS_LIST_CHANGED_NOTIFICATION: &str = "notifications/tools/list_changed";
pub const LOG_MESSAGE: &str = "log/message";
pub const LOG_MESSAGE_NOTIFICATION: &str = "notifications/message";
