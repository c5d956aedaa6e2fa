//! The uniform result envelope and declarative actions.

use std::time::Duration;

use gates::{PermissionCheck, RateDecision};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which failure family an envelope reports.
///
/// All failures come back through the same envelope shape, so the host
/// application dispatches on this tag rather than on exception types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Permission,
    RateLimit,
    Execution,
}

/// A state change the caller should apply to its own session data.
///
/// Handlers never mutate domain state directly; they declare the mutation
/// here and the host's dispatcher applies it. Keeping the variants typed
/// lets that dispatcher match exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Action {
    SelectFiles { paths: Vec<String> },
    SetConfigField { field: String, value: Value },
    StartAnalysis { file_count: usize },
    CancelAnalysis,
    /// Refresh the session's todo snapshot from the record store.
    SyncTodos,
}

/// Uniform result of one capability invocation.
#[derive(Debug, Clone, Serialize)]
pub struct ResultEnvelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "kind", skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorCategory>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub not_found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violation_level: Option<u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub requires_confirmation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
}

impl ResultEnvelope {
    fn base(success: bool) -> Self {
        Self {
            success,
            data: None,
            error: None,
            error_kind: None,
            not_found: false,
            retry_after_secs: None,
            violation_level: None,
            requires_confirmation: false,
            confirmation_message: None,
            action: None,
        }
    }

    pub fn ok(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::base(true)
        }
    }

    pub fn ok_with_action(data: Value, action: Action) -> Self {
        Self {
            data: Some(data),
            action: Some(action),
            ..Self::base(true)
        }
    }

    /// Phase one of the two-phase protocol: allowed, but the caller must
    /// re-invoke with confirmation. Not an error.
    pub fn needs_confirmation(message: Option<String>) -> Self {
        Self {
            requires_confirmation: true,
            confirmation_message: message,
            ..Self::base(true)
        }
    }

    fn failure(error: impl Into<String>, kind: ErrorCategory) -> Self {
        Self {
            error: Some(error.into()),
            error_kind: Some(kind),
            ..Self::base(false)
        }
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::failure(message, ErrorCategory::Validation)
    }

    pub fn permission_denied(check: &PermissionCheck) -> Self {
        let reason = check
            .reason
            .clone()
            .unwrap_or_else(|| "permission denied".to_string());
        Self::failure(reason, ErrorCategory::Permission)
    }

    pub fn rate_limited(decision: &RateDecision) -> Self {
        let reason = decision
            .reason
            .clone()
            .unwrap_or_else(|| "rate limit exceeded".to_string());
        Self {
            retry_after_secs: decision.retry_after.map(ceil_secs),
            violation_level: Some(decision.violation_level),
            ..Self::failure(reason, ErrorCategory::RateLimit)
        }
    }

    pub fn execution_error(message: impl Into<String>) -> Self {
        Self::failure(message, ErrorCategory::Execution)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            not_found: true,
            ..Self::failure(message, ErrorCategory::Execution)
        }
    }

    pub fn unknown_tool(name: &str) -> Self {
        Self::failure(format!("Unknown tool: {name}"), ErrorCategory::Execution)
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    duration.as_secs_f64().ceil() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ok_envelope_omits_error_fields() {
        let envelope = ResultEnvelope::ok(json!({"n": 1}));
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["success"], json!(true));
        assert!(json.get("error").is_none());
        assert!(json.get("requires_confirmation").is_none());
    }

    #[test]
    fn action_serializes_tagged() {
        let action = Action::SetConfigField {
            field: "depth".into(),
            value: json!("deep"),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], json!("set_config_field"));
        assert_eq!(json["payload"]["field"], json!("depth"));
    }

    #[test]
    fn retry_after_rounds_up() {
        assert_eq!(ceil_secs(Duration::from_millis(500)), 1);
        assert_eq!(ceil_secs(Duration::from_secs(3)), 3);
    }

    #[test]
    fn not_found_is_execution_error_with_flag() {
        let envelope = ResultEnvelope::not_found("record not found");
        assert!(!envelope.success);
        assert_eq!(envelope.error_kind, Some(ErrorCategory::Execution));
        assert!(envelope.not_found);
    }
}
