//! Workflow core for the ABE demonstration console.
//!
//! The [`WorkflowController`] sequences calls against an [`AccessControlService`],
//! records what they produced in [`SessionState`] and reports every step to an
//! append-only [`EventLog`].

pub mod controller;
pub mod event_log;
pub mod remote;
pub mod session;

pub use controller::{ActionKind, ActionOutcome, ActionReport, WorkflowController};
pub use event_log::{EventLog, LogEntry, Severity};
pub use remote::{
    AccessControlService, ClientConfigError, CredentialAck, CredentialRequest,
    HttpAccessControlClient, RemoteError,
};
pub use session::{DecryptionOutcome, SessionState, ACCESS_DENIED_TEXT};
