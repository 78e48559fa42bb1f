//! Server notification handlers, keyed by method name

use std::collections::HashMap;

use parley_protocol::methods;
use serde_json::Value;

use super::IntegrationBridge;

pub(super) type NotificationHandler = fn(&mut IntegrationBridge, Option<Value>);

pub(super) fn handler_table() -> HashMap<&'static str, NotificationHandler> {
    let mut table: HashMap<&'static str, NotificationHandler> = HashMap::new();
    table.insert(methods::TOOLS_LIST_CHANGED, tools_list_changed);
    table.insert(methods::TOOLS_LIST_CHANGED_NOTIFICATION, tools_list_changed);
    table.insert(methods::LOG_MESSAGE, log_message);
    table.insert(methods::LOG_MESSAGE_NOTIFICATION, log_message);
    table
}

fn tools_list_changed(bridge: &mut IntegrationBridge, _params: Option<Value>) {
    tracing::info!("Server tool list changed, refreshing");
    bridge.spawn_refresh();
}

fn log_message(bridge: &mut IntegrationBridge, params: Option<Value>) {
    bridge.handle_log_message(params);
}
