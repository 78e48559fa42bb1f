//! Handlers for server-initiated requests
//!
//! The server may call back into the client. Each supported method maps to a
//! [`LocalHandler`]; unknown methods get `-32601 Method not found` and handler
//! failures get `-32603` carrying the handler's message.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parley_protocol::{
    methods, CompleteParams, CompleteResult, Completion, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, Tool,
};
use serde_json::Value;
use tracing::debug;

/// Handler for one server-initiated method
pub type LocalHandler = Arc<dyn Fn(Option<Value>) -> Result<Value, String> + Send + Sync>;

/// What this client offers back to the server
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalCapabilities {
    /// Answer to `tools/list`
    pub tools: Vec<Tool>,
}

/// Most completion candidates returned at once
const MAX_COMPLETIONS: usize = 100;

/// Method-name lookup table for server-initiated requests
#[derive(Clone)]
pub struct LocalHandlers {
    handlers: HashMap<String, LocalHandler>,
}

impl std::fmt::Debug for LocalHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut methods: Vec<_> = self.handlers.keys().collect();
        methods.sort();
        f.debug_struct("LocalHandlers").field("methods", &methods).finish()
    }
}

impl LocalHandlers {
    /// Empty table: every method is unknown
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Built-in handlers (`ping`, `tools/list`, `completion/complete`)
    /// reading from a shared capability snapshot
    pub fn builtin(capabilities: Arc<ArcSwap<LocalCapabilities>>) -> Self {
        let mut table = Self::empty();
        table.register(methods::PING, |_| Ok(Value::Object(Default::default())));

        let snapshot = Arc::clone(&capabilities);
        table.register(methods::TOOLS_LIST, move |_| {
            let result = ListToolsResult {
                tools: snapshot.load().tools.clone(),
                next_cursor: None,
            };
            serde_json::to_value(result).map_err(|e| e.to_string())
        });

        table.register(methods::COMPLETION_COMPLETE, move |params| {
            let params: CompleteParams = serde_json::from_value(params.unwrap_or(Value::Null))
                .map_err(|e| format!("invalid completion params: {}", e))?;
            let result = complete(&capabilities.load().tools, &params.argument.value);
            serde_json::to_value(result).map_err(|e| e.to_string())
        });
        table
    }

    /// Add or replace the handler for `method`
    pub fn register<F>(&mut self, method: impl Into<String>, handler: F)
    where
        F: Fn(Option<Value>) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.handlers.insert(method.into(), Arc::new(handler));
    }

    pub fn contains(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    /// Run the handler for a request and build the reply
    pub fn dispatch(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let Some(handler) = self.handlers.get(&request.method) else {
            debug!(method = %request.method, "No local handler for server request");
            return JsonRpcResponse::error(request.id.clone(), JsonRpcError::method_not_found());
        };

        match handler(request.params.clone()) {
            Ok(result) => JsonRpcResponse::success(request.id.clone(), result),
            Err(message) => {
                debug!(method = %request.method, %message, "Local handler failed");
                JsonRpcResponse::error(request.id.clone(), JsonRpcError::internal(message))
            }
        }
    }
}

/// Names that start with `prefix`, in their listed order
fn complete(tools: &[Tool], prefix: &str) -> CompleteResult {
    let matches: Vec<String> = tools
        .iter()
        .filter(|tool| tool.name.starts_with(prefix))
        .map(|tool| tool.name.clone())
        .collect();

    let total = matches.len();
    CompleteResult {
        completion: Completion {
            values: matches.into_iter().take(MAX_COMPLETIONS).collect(),
            total: Some(total),
            has_more: Some(total > MAX_COMPLETIONS),
        },
    }
}
