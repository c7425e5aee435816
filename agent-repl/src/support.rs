//! Built-in `support_tools` module and in-process dispatch of its tools.

use agent_tools::{ToolModule, ToolRegistry};
use serde_json::{Value, json};
use tracing::debug;

use crate::error::DispatchError;
use crate::session::ExecutionSession;

/// Module key of the built-in tools.
pub const SUPPORT_MODULE: &str = "support_tools";

/// Tool that runs a code fragment in the caller's session.
pub const RUN_PYTHON_REPL: &str = "run_python_repl";

fn support_tool_records() -> Vec<Value> {
    vec![json!({
        "name": RUN_PYTHON_REPL,
        "description": "Executes Python code in a persistent session and returns its printed output. \
                        Variables, functions and imports persist across calls.",
        "required_parameters": [
            {
                "name": "command",
                "type": "str",
                "description": "Python source to execute"
            }
        ],
        "optional_parameters": []
    })]
}

inventory::submit! {
    ToolModule::new(SUPPORT_MODULE, support_tool_records)
}

/// Validates a call against `registry` and runs it against `session`.
///
/// Returns the text an agent reads back: captured output, followed by the
/// traceback when the fragment failed.
///
/// # Errors
///
/// Returns [`DispatchError::Call`] when the registry rejects the call,
/// [`DispatchError::Unsupported`] for tools without an in-process
/// implementation, and [`DispatchError::Session`] when the session fails.
pub async fn dispatch(
    registry: &ToolRegistry,
    session: &ExecutionSession,
    name: &str,
    arguments: &Value,
) -> Result<String, DispatchError> {
    let spec = registry.validate_call(name, arguments)?;
    debug!(tool = spec.name(), module = %spec.module(), session_id = %session.id(), "dispatching tool call");

    match spec.name() {
        RUN_PYTHON_REPL => {
            let command = arguments
                .get("command")
                .and_then(Value::as_str)
                .ok_or(DispatchError::InvalidArgument {
                    parameter: "command",
                    reason: "expected a string",
                })?;
            let result = session.run(command).await?;
            Ok(result.render())
        }
        other => Err(DispatchError::Unsupported {
            name: other.to_owned(),
        }),
    }
}
