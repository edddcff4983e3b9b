//! Maps console commands onto workflow actions.

use std::fmt;

use console_core::{ActionOutcome, ActionReport, DecryptionOutcome, WorkflowController};
use shared::domain::{Attribute, AuthorityName, UserId, HOSPITAL, INSURANCE_COMPANY};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::{
    commands::{parse_command, ConsoleCommand, HELP_TEXT},
    render::{format_entry, format_status, RenderProgress},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub const NO_DECRYPT_USER_NOTICE: &str =
    "No user given and no credential issued yet; use 'decrypt <user>'.";

pub struct Console<'a> {
    controller: &'a WorkflowController,
    rendered: Option<RenderProgress>,
}

impl<'a> Console<'a> {
    pub fn new(controller: &'a WorkflowController) -> Self {
        Self {
            controller,
            rendered: None,
        }
    }

    /// Holds command output back until the log renderer has caught up, so
    /// results never print ahead of the entries that led to them.
    pub fn with_renderer(mut self, progress: RenderProgress) -> Self {
        self.rendered = Some(progress);
        self
    }

    async fn say(&self, text: impl fmt::Display) {
        if let Some(rendered) = &self.rendered {
            rendered.wait_for(self.controller.log().len()).await;
        }
        println!("{text}");
    }

    pub async fn dispatch(&self, command: ConsoleCommand) -> Flow {
        debug!(command = command.name(), "dispatching console command");
        let controller = self.controller;
        match command {
            ConsoleCommand::Init => {
                controller.bootstrap().await;
            }
            ConsoleCommand::Issue {
                user_id,
                authority_name,
                attributes,
            } => {
                let report = controller
                    .issue_credential(user_id, authority_name, attributes)
                    .await;
                self.show_notice(&report).await;
            }
            ConsoleCommand::Encrypt { policy, payload } => {
                let report = controller.encrypt(&policy, &payload).await;
                if report.outcome == ActionOutcome::Succeeded {
                    if let Some(ciphertext) = controller.current_ciphertext().await {
                        self.say(format!("ciphertext: {}", ciphertext.preview())).await;
                    }
                }
            }
            ConsoleCommand::Decrypt { user_id } => {
                let user_id = match user_id {
                    Some(user_id) => user_id,
                    None => match controller.session().await.default_decrypt_user().cloned() {
                        Some(user_id) => user_id,
                        None => {
                            self.say(format!("!! {NO_DECRYPT_USER_NOTICE}")).await;
                            return Flow::Continue;
                        }
                    },
                };
                let report = controller.decrypt(user_id).await;
                if !self.show_notice(&report).await {
                    self.show_decryption_result(&controller.decryption_outcome().await).await;
                }
            }
            ConsoleCommand::Reset => controller.reset_session().await,
            ConsoleCommand::Status => self.say(format_status(&controller.session().await)).await,
            ConsoleCommand::Log => {
                for entry in controller.log().entries() {
                    self.say(format_entry(&entry)).await;
                }
            }
            ConsoleCommand::Help => self.say(HELP_TEXT).await,
            ConsoleCommand::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    /// Prints a local blocking notice; returns whether there was one.
    async fn show_notice(&self, report: &ActionReport) -> bool {
        match &report.outcome {
            ActionOutcome::Blocked(notice) => {
                self.say(format!("!! {notice}")).await;
                true
            }
            _ => false,
        }
    }

    async fn show_decryption_result(&self, outcome: &DecryptionOutcome) {
        if let Some(text) = outcome.display_text() {
            self.say(format!(">> {text}")).await;
        }
    }

    pub async fn run_demo(&self, policy: &str, payload: &str) {
        for command in demo_script(policy, payload) {
            self.dispatch(command).await;
        }
        self.say(format_status(&self.controller.session().await)).await;
    }

    pub async fn run_interactive(&self) -> anyhow::Result<()> {
        self.say(HELP_TEXT).await;
        let mut lines = BufReader::new(io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            match parse_command(&line) {
                Ok(Some(command)) => {
                    if self.dispatch(command).await == Flow::Quit {
                        break;
                    }
                }
                Ok(None) => {}
                Err(message) => self.say(message).await,
            }
        }
        Ok(())
    }
}

/// Commands for the scripted walkthrough, in order.
pub fn demo_script(policy: &str, payload: &str) -> Vec<ConsoleCommand> {
    vec![
        ConsoleCommand::Init,
        ConsoleCommand::Issue {
            user_id: UserId::from("alice"),
            authority_name: AuthorityName::from(HOSPITAL),
            attributes: vec![Attribute::from("doctor")],
        },
        ConsoleCommand::Issue {
            user_id: UserId::from("bob"),
            authority_name: AuthorityName::from(INSURANCE_COMPANY),
            attributes: vec![Attribute::from("auditor")],
        },
        ConsoleCommand::Encrypt {
            policy: policy.to_string(),
            payload: payload.to_string(),
        },
        ConsoleCommand::Decrypt {
            user_id: Some(UserId::from("alice")),
        },
        ConsoleCommand::Decrypt {
            user_id: Some(UserId::from("bob")),
        },
    ]
}

#[cfg(test)]
#[path = "tests/runner_tests.rs"]
mod tests;
