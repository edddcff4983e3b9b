//! Sequencing of the four console actions against the access-control service.
//!
//! Every action is a one-shot state machine: it validates local state, logs an
//! in-progress entry, awaits a single remote exchange (bootstrap awaits two,
//! strictly in order), then records a terminal outcome. Failures never escape
//! the action that produced them.

use std::{
    collections::HashSet,
    fmt,
    sync::{Arc, Mutex as StdMutex, PoisonError},
    time::{Duration, Instant},
};

use shared::domain::{
    Attribute, AuthorityName, Ciphertext, UserId, BOOTSTRAP_AUTHORITIES, HOSPITAL,
    INSURANCE_COMPANY,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::{
    event_log::EventLog,
    remote::{AccessControlService, CredentialRequest, RemoteError},
    session::{DecryptionOutcome, SessionState},
};

pub const NO_RECORD_NOTICE: &str = "No record has been encrypted yet; encrypt a record first.";
pub const NO_ATTRIBUTES_NOTICE: &str = "At least one attribute is required to issue a credential.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Bootstrap,
    IssueCredential,
    Encrypt,
    Decrypt,
}

impl ActionKind {
    pub fn name(self) -> &'static str {
        match self {
            ActionKind::Bootstrap => "bootstrap",
            ActionKind::IssueCredential => "issue_credential",
            ActionKind::Encrypt => "encrypt",
            ActionKind::Decrypt => "decrypt",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Succeeded,
    /// The service refused access on policy grounds.
    Denied,
    Failed,
    /// A local precondition failed; nothing was sent.
    Blocked(String),
    /// The same action was already in flight.
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionReport {
    pub action: ActionKind,
    pub invocation_id: Uuid,
    pub outcome: ActionOutcome,
    /// Time spent waiting on the service.
    pub remote_elapsed: Duration,
}

struct InflightGuard<'a> {
    inflight: &'a StdMutex<HashSet<ActionKind>>,
    action: ActionKind,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.action);
    }
}

pub struct WorkflowController {
    service: Arc<dyn AccessControlService>,
    log: Arc<EventLog>,
    session: Mutex<SessionState>,
    inflight: StdMutex<HashSet<ActionKind>>,
}

impl WorkflowController {
    pub fn new(service: Arc<dyn AccessControlService>, log: Arc<EventLog>) -> Self {
        Self {
            service,
            log,
            session: Mutex::new(SessionState::default()),
            inflight: StdMutex::new(HashSet::new()),
        }
    }

    pub fn log(&self) -> &Arc<EventLog> {
        &self.log
    }

    pub async fn session(&self) -> SessionState {
        self.session.lock().await.clone()
    }

    pub async fn current_ciphertext(&self) -> Option<Ciphertext> {
        self.session.lock().await.current_ciphertext().cloned()
    }

    pub async fn decryption_outcome(&self) -> DecryptionOutcome {
        self.session.lock().await.decryption_outcome().clone()
    }

    fn try_begin(&self, action: ActionKind) -> Option<InflightGuard<'_>> {
        let mut inflight = self
            .inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !inflight.insert(action) {
            return None;
        }
        Some(InflightGuard {
            inflight: &self.inflight,
            action,
        })
    }

    fn reject_reentry(&self, action: ActionKind, invocation_id: Uuid) -> ActionReport {
        warn!(action = action.name(), %invocation_id, "action already in progress");
        self.log.warning(format!("{action} already in progress; request ignored"));
        ActionReport {
            action,
            invocation_id,
            outcome: ActionOutcome::Rejected,
            remote_elapsed: Duration::ZERO,
        }
    }

    /// Creates the fixed authorities, strictly one after the other.
    pub async fn bootstrap(&self) -> ActionReport {
        let action = ActionKind::Bootstrap;
        let invocation_id = Uuid::new_v4();
        let Some(_guard) = self.try_begin(action) else {
            return self.reject_reentry(action, invocation_id);
        };

        async {
            self.log.warning("Initializing system authorities...");
            let started = Instant::now();
            for name in BOOTSTRAP_AUTHORITIES {
                let authority = AuthorityName::from(name);
                if let Err(err) = self.service.bootstrap_authority(&authority).await {
                    error!(authority = %authority, error = %err, "authority bootstrap failed");
                    self.log.error(format!("Initialization failed: {err}"));
                    return report(action, invocation_id, ActionOutcome::Failed, started);
                }
                debug!(authority = %authority, "authority created");
            }
            info!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "authorities initialized"
            );
            self.log.success(format!(
                "Authorities initialized: {HOSPITAL} & {INSURANCE_COMPANY}"
            ));
            report(action, invocation_id, ActionOutcome::Succeeded, started)
        }
        .instrument(info_span!("workflow_action", action = action.name(), %invocation_id))
        .await
    }

    pub async fn issue_credential(
        &self,
        user_id: UserId,
        authority_name: AuthorityName,
        attributes: Vec<Attribute>,
    ) -> ActionReport {
        let action = ActionKind::IssueCredential;
        let invocation_id = Uuid::new_v4();
        if attributes.is_empty() {
            return ActionReport {
                action,
                invocation_id,
                outcome: ActionOutcome::Blocked(NO_ATTRIBUTES_NOTICE.to_string()),
                remote_elapsed: Duration::ZERO,
            };
        }
        let Some(_guard) = self.try_begin(action) else {
            return self.reject_reentry(action, invocation_id);
        };

        async {
            self.log.warning(format!("Issuing credential to {user_id}..."));
            let request = CredentialRequest {
                authority_name,
                attributes,
                user_id,
            };
            let started = Instant::now();
            match self.service.issue_credential(&request).await {
                Ok(ack) => {
                    let granted = request
                        .attributes
                        .iter()
                        .map(Attribute::as_str)
                        .collect::<Vec<_>>()
                        .join(", ");
                    info!(
                        user_id = %request.user_id,
                        authority = %request.authority_name,
                        has_user_key = ack.user_key.is_some(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "credential issued"
                    );
                    self.session
                        .lock()
                        .await
                        .record_issued_user(request.user_id.clone());
                    self.log.success(format!("Granted {granted} to {}", request.user_id));
                    report(action, invocation_id, ActionOutcome::Succeeded, started)
                }
                Err(err) => {
                    error!(user_id = %request.user_id, error = %err, "credential issuance failed");
                    if err.is_transport() {
                        self.log.error(format!("Network error: {}", err.detail()));
                    } else {
                        self.log.error(format!("Credential issuance failed: {}", err.detail()));
                    }
                    report(action, invocation_id, ActionOutcome::Failed, started)
                }
            }
        }
        .instrument(info_span!("workflow_action", action = action.name(), %invocation_id))
        .await
    }

    /// Encrypts `payload` under `policy`; only success replaces the stored record.
    pub async fn encrypt(&self, policy: &str, payload: &str) -> ActionReport {
        let action = ActionKind::Encrypt;
        let invocation_id = Uuid::new_v4();
        let Some(_guard) = self.try_begin(action) else {
            return self.reject_reentry(action, invocation_id);
        };

        async {
            self.log.warning(format!("Encrypting record with policy: {policy}"));
            let started = Instant::now();
            match self.service.encrypt(policy, payload).await {
                Ok(ciphertext) => {
                    info!(
                        ciphertext_len = ciphertext.as_str().len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "record encrypted"
                    );
                    self.session.lock().await.store_ciphertext(ciphertext);
                    self.log.success("Encryption succeeded; the record is now protected.");
                    report(action, invocation_id, ActionOutcome::Succeeded, started)
                }
                Err(err) => {
                    error!(policy, error = %err, "encryption failed");
                    self.log.error(encryption_failure_message(&err));
                    report(action, invocation_id, ActionOutcome::Failed, started)
                }
            }
        }
        .instrument(info_span!("workflow_action", action = action.name(), %invocation_id))
        .await
    }

    /// Attempts to open the stored record as `user_id`.
    ///
    /// Without a stored record this returns [`ActionOutcome::Blocked`] and makes
    /// no remote call.
    pub async fn decrypt(&self, user_id: UserId) -> ActionReport {
        let action = ActionKind::Decrypt;
        let invocation_id = Uuid::new_v4();
        let Some(_guard) = self.try_begin(action) else {
            return self.reject_reentry(action, invocation_id);
        };

        async {
            let ciphertext = {
                let mut session = self.session.lock().await;
                let Some(ciphertext) = session.current_ciphertext().cloned() else {
                    warn!(user_id = %user_id, "decryption requested without a stored record");
                    return ActionReport {
                        action,
                        invocation_id,
                        outcome: ActionOutcome::Blocked(NO_RECORD_NOTICE.to_string()),
                        remote_elapsed: Duration::ZERO,
                    };
                };
                session.set_current_user(user_id.clone());
                session.set_decryption_outcome(DecryptionOutcome::Hidden);
                ciphertext
            };

            self.log.warning(format!("{user_id} is attempting to open the record..."));
            let started = Instant::now();
            let result = self.service.decrypt(&user_id, &ciphertext).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            let mut session = self.session.lock().await;
            if result.is_ok() || result.as_ref().is_err_and(RemoteError::is_access_denied) {
                // The record may have been reset or replaced while the call was out.
                if session.current_ciphertext() != Some(&ciphertext) {
                    warn!(
                        user_id = %user_id,
                        elapsed_ms,
                        "stored record changed during decryption"
                    );
                    drop(session);
                    self.log.warning(format!(
                        "{user_id}: record changed while opening it; result discarded"
                    ));
                    return report(action, invocation_id, ActionOutcome::Failed, started);
                }
            }
            match result {
                Ok(message) => {
                    info!(user_id = %user_id, elapsed_ms, "access granted");
                    session.set_decryption_outcome(DecryptionOutcome::Revealed(message));
                    drop(session);
                    self.log.success(format!("{user_id} access GRANTED"));
                    report(action, invocation_id, ActionOutcome::Succeeded, started)
                }
                Err(err) if err.is_access_denied() => {
                    info!(user_id = %user_id, elapsed_ms, reason = err.detail(), "access denied");
                    session.set_decryption_outcome(DecryptionOutcome::Denied);
                    drop(session);
                    self.log.error(format!("{user_id} denied: policy not satisfied"));
                    report(action, invocation_id, ActionOutcome::Denied, started)
                }
                Err(err) => {
                    drop(session);
                    error!(user_id = %user_id, error = %err, "decryption failed");
                    self.log.error(format!("Error: {}", err.detail()));
                    report(action, invocation_id, ActionOutcome::Failed, started)
                }
            }
        }
        .instrument(info_span!("workflow_action", action = action.name(), %invocation_id))
        .await
    }

    /// Discards the stored record and hides any shown decryption result.
    pub async fn reset_session(&self) {
        self.session.lock().await.reset();
        info!("session reset");
        self.log.info("Session reset; stored record discarded.");
    }
}

fn encryption_failure_message(err: &RemoteError) -> String {
    if err.is_transport() {
        format!("Error: {}", err.detail())
    } else {
        format!("Encryption failed: {}", err.detail())
    }
}

fn report(
    action: ActionKind,
    invocation_id: Uuid,
    outcome: ActionOutcome,
    started: Instant,
) -> ActionReport {
    ActionReport {
        action,
        invocation_id,
        outcome,
        remote_elapsed: started.elapsed(),
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
