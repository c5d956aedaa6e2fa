//! Capability handlers.
//!
//! Session-scoped handlers are pure functions of `(input, session)` and
//! declare mutations through [`Action`] variants. The todo family is the
//! only one that touches the record store, and it runs after every gate
//! decision has been recorded.

use gates::{Caller, PermissionGate};
use serde_json::{Value, json};
use storage::{Record, RecordId, RecordKind, RecordStore};
use tokio::sync::Mutex;

use crate::context::{AnalysisState, SessionContext};
use crate::envelope::Action;
use crate::executor::{ExecFailure, HandlerOutput};

type HandlerResult = std::result::Result<HandlerOutput, ExecFailure>;

fn required_str<'a>(input: &'a Value, key: &str) -> std::result::Result<&'a str, ExecFailure> {
    input
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ExecFailure::Invalid(format!("missing string field '{key}'")))
}

fn to_data<T: serde::Serialize>(value: &T) -> std::result::Result<Value, ExecFailure> {
    serde_json::to_value(value).map_err(|e| ExecFailure::Execution(e.to_string()))
}

fn parse_record_id(input: &Value) -> std::result::Result<RecordId, ExecFailure> {
    required_str(input, "id")?
        .parse()
        .map_err(|_| ExecFailure::Invalid("'id' is not a valid record id".to_string()))
}

// --- Read-only introspection ---

pub(crate) fn list_files(session: &SessionContext) -> HandlerResult {
    Ok(HandlerOutput::data(json!({
        "files": to_data(&session.files)?,
        "selected": session.selected_files,
    })))
}

pub(crate) fn get_config(session: &SessionContext) -> HandlerResult {
    Ok(HandlerOutput::data(to_data(&session.config)?))
}

pub(crate) fn get_analysis_status(session: &SessionContext) -> HandlerResult {
    Ok(HandlerOutput::data(json!({
        "state": to_data(&session.analysis)?,
        "selected_count": session.selected_files.len(),
    })))
}

pub(crate) fn list_capabilities(
    permissions: &PermissionGate,
    caller: Option<&Caller>,
) -> HandlerResult {
    let split = permissions.available(caller);
    Ok(HandlerOutput::data(to_data(&split)?))
}

// --- Session-scoped mutation ---

pub(crate) fn select_files(input: &Value, session: &SessionContext) -> HandlerResult {
    let paths: Vec<String> = input
        .get("paths")
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    for path in &paths {
        if !session.has_file(path) {
            return Err(ExecFailure::Invalid(format!(
                "'{path}' is not a file in this session"
            )));
        }
    }

    Ok(HandlerOutput::with_action(
        json!({"selected": paths.len()}),
        Action::SelectFiles { paths },
    ))
}

pub(crate) fn set_config(input: &Value, _session: &SessionContext) -> HandlerResult {
    let field = required_str(input, "field")?;
    let value = input.get("value").cloned().unwrap_or(Value::Null);

    let valid = match field {
        "depth" => matches!(value.as_str(), Some("quick" | "standard" | "deep")),
        "include_suggestions" => value.is_boolean(),
        "focus" => value.is_string() || value.is_null(),
        _ => {
            return Err(ExecFailure::Invalid(format!(
                "unknown config field '{field}'"
            )));
        }
    };
    if !valid {
        return Err(ExecFailure::Invalid(format!(
            "invalid value for config field '{field}'"
        )));
    }

    Ok(HandlerOutput::with_action(
        json!({"field": field}),
        Action::SetConfigField {
            field: field.to_string(),
            value,
        },
    ))
}

pub(crate) fn start_analysis(session: &SessionContext) -> HandlerResult {
    if session.analysis == AnalysisState::Running {
        return Err(ExecFailure::Execution(
            "an analysis is already running".to_string(),
        ));
    }
    if session.selected_files.is_empty() {
        return Err(ExecFailure::Invalid(
            "no files selected for analysis".to_string(),
        ));
    }

    let file_count = session.selected_files.len();
    Ok(HandlerOutput::with_action(
        json!({"file_count": file_count}),
        Action::StartAnalysis { file_count },
    ))
}

pub(crate) fn cancel_analysis(session: &SessionContext) -> HandlerResult {
    if session.analysis != AnalysisState::Running {
        return Err(ExecFailure::Execution(
            "no analysis is running".to_string(),
        ));
    }
    Ok(HandlerOutput::with_action(
        json!({"cancelled": true}),
        Action::CancelAnalysis,
    ))
}

// --- Persistence-backed CRUD ---

pub(crate) async fn create_todo(
    input: &Value,
    caller_id: &str,
    store: &Mutex<RecordStore>,
) -> HandlerResult {
    let title = required_str(input, "title")?;
    let mut record = Record::new(caller_id, RecordKind::Todo, title);
    if let Some(notes) = input.get("notes").and_then(Value::as_str) {
        record = record.with_body(json!({"notes": notes}));
    }

    store.lock().await.create(&record)?;
    Ok(HandlerOutput::with_action(to_data(&record)?, Action::SyncTodos))
}

pub(crate) async fn list_todos(caller_id: &str, store: &Mutex<RecordStore>) -> HandlerResult {
    let todos = store.lock().await.list(caller_id, RecordKind::Todo)?;
    Ok(HandlerOutput::data(json!({"todos": to_data(&todos)?})))
}

pub(crate) async fn update_todo(
    input: &Value,
    caller_id: &str,
    store: &Mutex<RecordStore>,
) -> HandlerResult {
    let id = parse_record_id(input)?;
    let title = input.get("title").and_then(Value::as_str);
    let body = input
        .get("notes")
        .and_then(Value::as_str)
        .map(|notes| json!({"notes": notes}));

    let record = store
        .lock()
        .await
        .update(caller_id, id, title, body.as_ref())?;
    Ok(HandlerOutput::with_action(to_data(&record)?, Action::SyncTodos))
}

pub(crate) async fn complete_todo(
    input: &Value,
    caller_id: &str,
    store: &Mutex<RecordStore>,
) -> HandlerResult {
    let id = parse_record_id(input)?;
    let record = store.lock().await.set_done(caller_id, id, true)?;
    Ok(HandlerOutput::with_action(to_data(&record)?, Action::SyncTodos))
}

pub(crate) async fn delete_todo(
    input: &Value,
    caller_id: &str,
    store: &Mutex<RecordStore>,
) -> HandlerResult {
    let id = parse_record_id(input)?;
    store.lock().await.delete(caller_id, id)?;
    Ok(HandlerOutput::with_action(
        json!({"deleted": id.to_string()}),
        Action::SyncTodos,
    ))
}
