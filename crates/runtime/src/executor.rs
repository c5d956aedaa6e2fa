//! Validated capability dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use gates::{Caller, PermissionGate};
use jsonschema::Validator;
use serde_json::{Value, json};
use storage::RecordStore;
use tokio::sync::Mutex;

use crate::context::SessionContext;
use crate::envelope::{Action, ResultEnvelope};
use crate::error::{Error, Result};
use crate::handlers;

/// Caller id used when no caller is supplied.
pub(crate) const GUEST_CALLER: &str = "guest";

/// A capability's schema and description, as exposed to the host.
#[derive(Debug, Clone)]
pub struct CapabilitySpec {
    pub name: String,
    pub description: String,
    pub schema: Value,
}

/// What a handler produced: response data plus an optional declared action.
pub(crate) struct HandlerOutput {
    pub data: Value,
    pub action: Option<Action>,
}

impl HandlerOutput {
    pub(crate) fn data(data: Value) -> Self {
        Self { data, action: None }
    }

    pub(crate) fn with_action(data: Value, action: Action) -> Self {
        Self {
            data,
            action: Some(action),
        }
    }
}

/// Why an execution failed, before it is flattened into the envelope.
///
/// The gateway branches on this to feed the activity monitor.
#[derive(Debug)]
pub(crate) enum ExecFailure {
    UnknownTool(String),
    Invalid(String),
    NotFound(String),
    Ownership(String),
    Execution(String),
}

impl From<storage::Error> for ExecFailure {
    fn from(e: storage::Error) -> Self {
        match e {
            storage::Error::NotFound(id) => ExecFailure::NotFound(format!("record not found: {id}")),
            storage::Error::NotOwner(id) => {
                ExecFailure::Ownership(format!("record {id} is owned by another caller"))
            }
            other => ExecFailure::Execution(other.to_string()),
        }
    }
}

impl ExecFailure {
    pub(crate) fn into_envelope(self) -> ResultEnvelope {
        match self {
            ExecFailure::UnknownTool(name) => ResultEnvelope::unknown_tool(&name),
            ExecFailure::Invalid(message) => ResultEnvelope::validation_error(message),
            ExecFailure::NotFound(message) => ResultEnvelope::not_found(message),
            ExecFailure::Ownership(message) | ExecFailure::Execution(message) => {
                ResultEnvelope::execution_error(message)
            }
        }
    }
}

struct CompiledSpec {
    spec: CapabilitySpec,
    validator: Validator,
}

/// Dispatches validated inputs to capability handlers.
pub struct Executor {
    specs: HashMap<String, CompiledSpec>,
    permissions: PermissionGate,
    store: Arc<Mutex<RecordStore>>,
}

impl Executor {
    pub fn new(permissions: PermissionGate, store: Arc<Mutex<RecordStore>>) -> Result<Self> {
        let mut specs = HashMap::new();
        for (name, description, schema) in capability_schemas() {
            let validator = jsonschema::options().build(&schema).map_err(|e| Error::Schema {
                capability: name.to_string(),
                message: e.to_string(),
            })?;
            specs.insert(
                name.to_string(),
                CompiledSpec {
                    spec: CapabilitySpec {
                        name: name.to_string(),
                        description: description.to_string(),
                        schema,
                    },
                    validator,
                },
            );
        }

        Ok(Self {
            specs,
            permissions,
            store,
        })
    }

    /// Registered capability specs, sorted by name.
    pub fn specs(&self) -> Vec<CapabilitySpec> {
        let mut specs: Vec<_> = self.specs.values().map(|c| c.spec.clone()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Execute a capability and flatten the outcome into an envelope.
    ///
    /// Never panics across this boundary: unknown names, schema failures,
    /// and handler errors all come back as `success: false` envelopes.
    pub async fn execute(
        &self,
        capability: &str,
        input: Value,
        caller: Option<&Caller>,
        session: &SessionContext,
    ) -> ResultEnvelope {
        match self.run(capability, input, caller, session).await {
            Ok(output) => match output.action {
                Some(action) => ResultEnvelope::ok_with_action(output.data, action),
                None => ResultEnvelope::ok(output.data),
            },
            Err(failure) => failure.into_envelope(),
        }
    }

    /// Validate and dispatch, keeping the failure variant for the gateway.
    pub(crate) async fn run(
        &self,
        capability: &str,
        input: Value,
        caller: Option<&Caller>,
        session: &SessionContext,
    ) -> std::result::Result<HandlerOutput, ExecFailure> {
        let Some(compiled) = self.specs.get(capability) else {
            tracing::debug!(capability, "unknown capability");
            return Err(ExecFailure::UnknownTool(capability.to_string()));
        };

        if let Err(error) = compiled.validator.validate(&input) {
            return Err(ExecFailure::Invalid(error.to_string()));
        }

        let caller_id = caller.map(|c| c.id.as_str()).unwrap_or(GUEST_CALLER);

        match capability {
            "list_files" => handlers::list_files(session),
            "get_config" => handlers::get_config(session),
            "get_analysis_status" => handlers::get_analysis_status(session),
            "list_capabilities" => handlers::list_capabilities(&self.permissions, caller),
            "select_files" => handlers::select_files(&input, session),
            "set_config" => handlers::set_config(&input, session),
            "start_analysis" => handlers::start_analysis(session),
            "cancel_analysis" => handlers::cancel_analysis(session),
            "create_todo" => handlers::create_todo(&input, caller_id, &self.store).await,
            "list_todos" => handlers::list_todos(caller_id, &self.store).await,
            "update_todo" => handlers::update_todo(&input, caller_id, &self.store).await,
            "complete_todo" => handlers::complete_todo(&input, caller_id, &self.store).await,
            "delete_todo" => handlers::delete_todo(&input, caller_id, &self.store).await,
            // Registered but not dispatched: a catalog/handler drift bug,
            // reported rather than panicking.
            other => Err(ExecFailure::UnknownTool(other.to_string())),
        }
    }
}

fn empty_object() -> Value {
    json!({"type": "object", "additionalProperties": false})
}

fn capability_schemas() -> Vec<(&'static str, &'static str, Value)> {
    vec![
        (
            "list_files",
            "List the files known to this session and the current selection",
            empty_object(),
        ),
        (
            "get_config",
            "Fetch the session's analysis configuration",
            empty_object(),
        ),
        (
            "get_analysis_status",
            "Report where the session's analysis stands",
            empty_object(),
        ),
        (
            "list_capabilities",
            "List capabilities available and restricted for the caller",
            empty_object(),
        ),
        (
            "select_files",
            "Select session files for analysis",
            json!({
                "type": "object",
                "properties": {
                    "paths": {
                        "type": "array",
                        "items": {"type": "string"},
                        "minItems": 1
                    }
                },
                "required": ["paths"],
                "additionalProperties": false
            }),
        ),
        (
            "set_config",
            "Change one analysis configuration field",
            json!({
                "type": "object",
                "properties": {
                    "field": {"type": "string"},
                    "value": {}
                },
                "required": ["field"],
                "additionalProperties": false
            }),
        ),
        (
            "start_analysis",
            "Start analysing the selected files",
            empty_object(),
        ),
        (
            "cancel_analysis",
            "Cancel the running analysis",
            empty_object(),
        ),
        (
            "create_todo",
            "Create a todo record",
            json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string", "minLength": 1},
                    "notes": {"type": "string"}
                },
                "required": ["title"],
                "additionalProperties": false
            }),
        ),
        (
            "list_todos",
            "List the caller's todo records",
            empty_object(),
        ),
        (
            "update_todo",
            "Update a todo's title or notes",
            json!({
                "type": "object",
                "properties": {
                    "id": {"type": "string"},
                    "title": {"type": "string", "minLength": 1},
                    "notes": {"type": "string"}
                },
                "required": ["id"],
                "additionalProperties": false
            }),
        ),
        (
            "complete_todo",
            "Mark a todo done",
            json!({
                "type": "object",
                "properties": {"id": {"type": "string"}},
                "required": ["id"],
                "additionalProperties": false
            }),
        ),
        (
            "delete_todo",
            "Delete a todo record",
            json!({
                "type": "object",
                "properties": {"id": {"type": "string"}},
                "required": ["id"],
                "additionalProperties": false
            }),
        ),
    ]
}
