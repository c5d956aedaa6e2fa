//! Purser runtime — capability execution behind the governance gates.
//!
//! This crate hosts the capability executor and the [`Gateway`] facade that
//! runs the full governance pipeline for one invocation:
//!
//! ```text
//! (caller, capability, input, session, address)
//!     → permission gate → rate gate → activity record → executor → envelope
//! ```
//!
//! Handlers are pure over `(input, session)`: they never mutate the
//! caller-supplied [`SessionContext`], they return a declarative [`Action`]
//! the caller applies to its own state. Only the persistence-backed handler
//! family performs I/O, and it runs after every gate decision has already
//! been made and recorded.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use catalog::Catalog;
//! use gates::{Caller, SystemClock};
//! use runtime::{CallRequest, Gateway, SessionContext};
//! use storage::RecordStore;
//!
//! # async fn example() -> runtime::Result<()> {
//! let gateway = Gateway::new(
//!     Arc::new(Catalog::builtin()),
//!     Arc::new(SystemClock),
//!     RecordStore::in_memory()?,
//! )?;
//!
//! let caller = Caller::new("u1");
//! let session = SessionContext::default();
//! let envelope = gateway
//!     .call(CallRequest::new("list_files", &session).caller(&caller))
//!     .await;
//! assert!(envelope.success);
//! # Ok(())
//! # }
//! ```

mod context;
mod envelope;
mod error;
mod executor;
mod gateway;
mod handlers;

pub use context::{AnalysisConfig, AnalysisDepth, AnalysisState, FileEntry, SessionContext};
pub use envelope::{Action, ErrorCategory, ResultEnvelope};
pub use error::{Error, Result};
pub use executor::{CapabilitySpec, Executor};
pub use gateway::{CallRequest, Gateway, SweepReport};

// Gate types callers need to drive the pipeline.
pub use gates::{
    Caller, Clock, ErrorKind, ManualClock, PatternReport, RateStatus, Severity, SystemClock,
};
