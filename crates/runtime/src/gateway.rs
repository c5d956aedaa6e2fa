//! The governance pipeline facade.

use std::sync::Arc;
use std::time::Duration;

use catalog::Catalog;
use gates::{
    ActivityMonitor, Caller, CapabilitySplit, Clock, ErrorKind, PatternReport, PermissionGate,
    RateGate, RateStatus, SweepStats,
};
use serde::Serialize;
use serde_json::Value;
use storage::RecordStore;
use tokio::sync::Mutex;

use crate::context::SessionContext;
use crate::envelope::ResultEnvelope;
use crate::error::Result;
use crate::executor::{ExecFailure, Executor, GUEST_CALLER};

/// One capability invocation.
#[derive(Debug)]
pub struct CallRequest<'a> {
    pub capability: &'a str,
    pub input: Value,
    pub session: &'a SessionContext,
    pub caller: Option<&'a Caller>,
    pub network_address: Option<&'a str>,
    pub confirmed: bool,
}

impl<'a> CallRequest<'a> {
    pub fn new(capability: &'a str, session: &'a SessionContext) -> Self {
        Self {
            capability,
            input: Value::Object(Default::default()),
            session,
            caller: None,
            network_address: None,
            confirmed: false,
        }
    }

    pub fn input(mut self, input: Value) -> Self {
        self.input = input;
        self
    }

    pub fn caller(mut self, caller: &'a Caller) -> Self {
        self.caller = Some(caller);
        self
    }

    pub fn network_address(mut self, address: &'a str) -> Self {
        self.network_address = Some(address);
        self
    }

    pub fn confirmed(mut self) -> Self {
        self.confirmed = true;
        self
    }
}

/// What one GC sweep removed across all governance state.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SweepReport {
    pub rate: SweepStats,
    pub activity_callers_removed: usize,
}

/// Runs the full pipeline for each invocation: permission gate, rate gate,
/// activity record, executor. Owns all governance state; owns no domain
/// state.
pub struct Gateway {
    permissions: PermissionGate,
    rates: RateGate,
    monitor: ActivityMonitor,
    executor: Executor,
}

impl Gateway {
    pub fn new(catalog: Arc<Catalog>, clock: Arc<dyn Clock>, store: RecordStore) -> Result<Self> {
        let permissions = PermissionGate::new(catalog.clone());
        let rates = RateGate::new(catalog, clock.clone());
        let monitor = ActivityMonitor::new(clock);
        let executor = Executor::new(permissions.clone(), Arc::new(Mutex::new(store)))?;

        Ok(Self {
            permissions,
            rates,
            monitor,
            executor,
        })
    }

    /// Govern and execute one capability call.
    pub async fn call(&self, request: CallRequest<'_>) -> ResultEnvelope {
        let caller_id = request
            .caller
            .map(|c| c.id.as_str())
            .unwrap_or(GUEST_CALLER);

        // Gate checks are synchronous: no suspension between a gate's
        // read and its write.
        let permission =
            self.permissions
                .check(request.capability, request.caller, request.confirmed);
        if !permission.allowed {
            self.monitor.record_error(caller_id, ErrorKind::Permission);
            return ResultEnvelope::permission_denied(&permission);
        }
        if permission.requires_confirmation {
            return ResultEnvelope::needs_confirmation(permission.confirmation_message);
        }

        let rate = self
            .rates
            .check(caller_id, request.capability, request.network_address);
        if !rate.allowed {
            return ResultEnvelope::rate_limited(&rate);
        }

        self.monitor.record_call(caller_id, request.capability);

        let outcome = self
            .executor
            .run(request.capability, request.input, request.caller, request.session)
            .await;

        match outcome {
            Ok(output) => match output.action {
                Some(action) => ResultEnvelope::ok_with_action(output.data, action),
                None => ResultEnvelope::ok(output.data),
            },
            Err(failure) => {
                match &failure {
                    ExecFailure::Invalid(_) => {
                        self.monitor.record_error(caller_id, ErrorKind::Validation);
                    }
                    ExecFailure::Ownership(_) => {
                        self.monitor.record_error(caller_id, ErrorKind::Ownership);
                    }
                    _ => {}
                }
                failure.into_envelope()
            }
        }
    }

    // --- Management operations ---

    /// Clear rate state for one capability, or all of a caller's.
    pub fn reset_rate_limit(&self, caller_id: &str, capability: Option<&str>) {
        self.rates.reset(caller_id, capability);
    }

    /// Current usage against the effective limit.
    pub fn rate_limit_status(&self, caller_id: &str, capability: &str) -> RateStatus {
        self.rates.status(caller_id, capability)
    }

    pub fn block_address(&self, address: &str, duration: Duration) {
        self.rates.block_address(address, duration);
    }

    pub fn unblock_address(&self, address: &str) {
        self.rates.unblock_address(address);
    }

    /// Record an error the host classified itself (the pipeline already
    /// records validation, permission, and ownership failures it sees).
    pub fn record_error(&self, caller_id: &str, kind: ErrorKind) {
        self.monitor.record_error(caller_id, kind);
    }

    /// Advisory suspicious-pattern probe for a caller.
    pub fn suspicious_patterns(&self, caller_id: &str) -> PatternReport {
        self.monitor.check(caller_id)
    }

    /// Capabilities a caller may and may not invoke.
    pub fn available_capabilities(&self, caller: Option<&Caller>) -> CapabilitySplit {
        self.permissions.available(caller)
    }

    /// Drop expired governance state. The host drives this from a periodic
    /// timer (every five minutes or so); tests call it directly.
    pub fn sweep(&self) -> SweepReport {
        let report = SweepReport {
            rate: self.rates.sweep(),
            activity_callers_removed: self.monitor.sweep(),
        };
        tracing::debug!(?report, "governance sweep");
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FileEntry;
    use crate::envelope::{Action, ErrorCategory};
    use gates::ManualClock;
    use serde_json::json;

    fn gateway() -> (Gateway, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let gateway = Gateway::new(
            Arc::new(Catalog::builtin()),
            clock.clone(),
            RecordStore::in_memory().unwrap(),
        )
        .unwrap();
        (gateway, clock)
    }

    #[tokio::test]
    async fn guest_denied_and_recorded() {
        let (gateway, _) = gateway();
        let session = SessionContext::default();

        for _ in 0..3 {
            let envelope = gateway
                .call(CallRequest::new("create_todo", &session).input(json!({"title": "x"})))
                .await;
            assert!(!envelope.success);
            assert_eq!(envelope.error_kind, Some(ErrorCategory::Permission));
        }

        let report = gateway.suspicious_patterns(GUEST_CALLER);
        assert!(report.suspicious);
        assert!(report.patterns.contains(&"repeated_permission_denials"));
    }

    #[tokio::test]
    async fn dangerous_capability_runs_two_phases() {
        let (gateway, _) = gateway();
        let caller = Caller::new("u1");
        let session = SessionContext::default();

        let created = gateway
            .call(
                CallRequest::new("create_todo", &session)
                    .caller(&caller)
                    .input(json!({"title": "ship it"})),
            )
            .await;
        let id = created.data.unwrap()["id"].as_str().unwrap().to_string();

        // Phase one: no handler side effect, only a confirmation request.
        let first = gateway
            .call(
                CallRequest::new("delete_todo", &session)
                    .caller(&caller)
                    .input(json!({"id": id})),
            )
            .await;
        assert!(first.success);
        assert!(first.requires_confirmation);
        assert!(first.action.is_none());

        // The record survived phase one.
        let listed = gateway
            .call(CallRequest::new("list_todos", &session).caller(&caller))
            .await;
        assert_eq!(listed.data.unwrap()["todos"].as_array().unwrap().len(), 1);

        // Phase two executes.
        let second = gateway
            .call(
                CallRequest::new("delete_todo", &session)
                    .caller(&caller)
                    .input(json!({"id": id}))
                    .confirmed(),
            )
            .await;
        assert!(second.success);
        assert_eq!(second.action, Some(Action::SyncTodos));
    }

    #[tokio::test]
    async fn rate_denial_carries_retry_hint() {
        let (gateway, clock) = gateway();
        let caller = Caller::new("u1");
        let session = SessionContext::default();

        // Read burst ceiling is 10 per second.
        for _ in 0..10 {
            let envelope = gateway
                .call(CallRequest::new("list_files", &session).caller(&caller))
                .await;
            assert!(envelope.success);
            clock.advance(Duration::from_millis(10));
        }
        let denied = gateway
            .call(CallRequest::new("list_files", &session).caller(&caller))
            .await;
        assert!(!denied.success);
        assert_eq!(denied.error_kind, Some(ErrorCategory::RateLimit));
        assert_eq!(denied.retry_after_secs, Some(1));
        assert_eq!(denied.violation_level, Some(1));
    }

    #[tokio::test]
    async fn validation_failures_feed_pattern_detection() {
        let (gateway, _) = gateway();
        let caller = Caller::new("fuzzer");
        let session = SessionContext::default();

        for _ in 0..5 {
            let envelope = gateway
                .call(
                    CallRequest::new("create_todo", &session)
                        .caller(&caller)
                        .input(json!({"wrong": true})),
                )
                .await;
            assert_eq!(envelope.error_kind, Some(ErrorCategory::Validation));
        }

        let report = gateway.suspicious_patterns("fuzzer");
        assert!(report.suspicious);
        assert!(report.patterns.contains(&"repeated_validation_errors"));
    }

    #[tokio::test]
    async fn ownership_probing_is_flagged() {
        let (gateway, _) = gateway();
        let owner = Caller::new("owner");
        let prober = Caller::new("prober");
        let session = SessionContext::default();

        let created = gateway
            .call(
                CallRequest::new("create_todo", &session)
                    .caller(&owner)
                    .input(json!({"title": "private"})),
            )
            .await;
        let id = created.data.unwrap()["id"].as_str().unwrap().to_string();

        for _ in 0..3 {
            let envelope = gateway
                .call(
                    CallRequest::new("complete_todo", &session)
                        .caller(&prober)
                        .input(json!({"id": id})),
                )
                .await;
            assert!(!envelope.success);
        }

        let report = gateway.suspicious_patterns("prober");
        assert!(report.patterns.contains(&"repeated_ownership_denials"));
    }

    #[tokio::test]
    async fn address_block_overrides_caller_capacity() {
        let (gateway, clock) = gateway();
        let session = SessionContext::default();

        gateway.block_address("10.0.0.1", Duration::from_secs(300));
        let caller = Caller::new("u1");
        let denied = gateway
            .call(
                CallRequest::new("list_files", &session)
                    .caller(&caller)
                    .network_address("10.0.0.1"),
            )
            .await;
        assert!(!denied.success);
        assert_eq!(denied.error_kind, Some(ErrorCategory::RateLimit));

        clock.advance(Duration::from_secs(301));
        let allowed = gateway
            .call(
                CallRequest::new("list_files", &session)
                    .caller(&caller)
                    .network_address("10.0.0.1"),
            )
            .await;
        assert!(allowed.success);
    }

    #[tokio::test]
    async fn session_actions_round_trip() {
        let (gateway, _) = gateway();
        let caller = Caller::new("u1");
        let session = SessionContext {
            files: vec![
                FileEntry {
                    path: "a.rs".into(),
                    size: 1,
                },
                FileEntry {
                    path: "b.rs".into(),
                    size: 2,
                },
            ],
            ..Default::default()
        };

        let selected = gateway
            .call(
                CallRequest::new("select_files", &session)
                    .caller(&caller)
                    .input(json!({"paths": ["a.rs", "b.rs"]})),
            )
            .await;
        assert_eq!(
            selected.action,
            Some(Action::SelectFiles {
                paths: vec!["a.rs".into(), "b.rs".into()]
            })
        );

        // The host applies the action; this layer never did.
        let mut applied = session.clone();
        if let Some(Action::SelectFiles { paths }) = selected.action {
            applied.selected_files = paths;
        }

        let started = gateway
            .call(
                CallRequest::new("start_analysis", &applied)
                    .caller(&caller)
                    .confirmed(),
            )
            .await;
        assert_eq!(started.action, Some(Action::StartAnalysis { file_count: 2 }));
    }

    #[tokio::test]
    async fn sweep_reports_removals() {
        let (gateway, clock) = gateway();
        let caller = Caller::new("u1");
        let session = SessionContext::default();

        gateway
            .call(CallRequest::new("list_files", &session).caller(&caller))
            .await;
        clock.advance(Duration::from_secs(600));

        let report = gateway.sweep();
        assert_eq!(report.rate.callers_removed, 1);
        assert_eq!(report.activity_callers_removed, 1);
    }

    #[tokio::test]
    async fn management_status_and_reset() {
        let (gateway, _) = gateway();
        let caller = Caller::new("u1");
        let session = SessionContext::default();

        gateway
            .call(CallRequest::new("list_files", &session).caller(&caller))
            .await;
        let status = gateway.rate_limit_status("u1", "list_files");
        assert_eq!(status.used, 1);
        assert_eq!(status.remaining, status.max - 1);

        gateway.reset_rate_limit("u1", None);
        assert_eq!(gateway.rate_limit_status("u1", "list_files").used, 0);
    }
}
