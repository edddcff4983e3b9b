//! Line commands accepted by the interactive console.

use shared::domain::{parse_attribute_list, Attribute, AuthorityName, UserId};

pub const HELP_TEXT: &str = "\
commands:
  init                                   create the HOSPITAL and INSURANCE_COMPANY authorities
  issue <user> <authority> <attr[,attr]> issue a credential for one or more attributes
  encrypt <policy> <payload...>          encrypt a record, e.g. encrypt DOCTOR@HOSPITAL patient record
  decrypt [user]                         open the stored record as <user> (defaults to the last issued user)
  reset                                  discard the stored record
  status                                 show the stored record and the decryption result
  log                                    print the full event log
  help                                   show this help
  quit                                   leave the console";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Init,
    Issue {
        user_id: UserId,
        authority_name: AuthorityName,
        attributes: Vec<Attribute>,
    },
    Encrypt {
        policy: String,
        payload: String,
    },
    Decrypt {
        user_id: Option<UserId>,
    },
    Reset,
    Status,
    Log,
    Help,
    Quit,
}

impl ConsoleCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ConsoleCommand::Init => "init",
            ConsoleCommand::Issue { .. } => "issue",
            ConsoleCommand::Encrypt { .. } => "encrypt",
            ConsoleCommand::Decrypt { .. } => "decrypt",
            ConsoleCommand::Reset => "reset",
            ConsoleCommand::Status => "status",
            ConsoleCommand::Log => "log",
            ConsoleCommand::Help => "help",
            ConsoleCommand::Quit => "quit",
        }
    }
}

/// Parses one input line. `Ok(None)` for blank lines.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let line = line.trim();
    let Some((verb, rest)) = split_word(line) else {
        return Ok(None);
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "init" | "bootstrap" => ConsoleCommand::Init,
        "issue" | "keygen" => {
            let usage = "usage: issue <user> <authority> <attr[,attr]>";
            let (user, rest) = split_word(rest).ok_or(usage)?;
            let (authority, rest) = split_word(rest).ok_or(usage)?;
            let attributes = parse_attribute_list(rest);
            if attributes.is_empty() {
                return Err(usage.to_string());
            }
            ConsoleCommand::Issue {
                user_id: UserId::from(user),
                authority_name: AuthorityName::from(authority),
                attributes,
            }
        }
        "encrypt" => {
            let usage = "usage: encrypt <policy> <payload...>";
            let (policy, payload) = split_word(rest).ok_or(usage)?;
            if payload.is_empty() {
                return Err(usage.to_string());
            }
            ConsoleCommand::Encrypt {
                policy: policy.to_string(),
                payload: payload.to_string(),
            }
        }
        "decrypt" => ConsoleCommand::Decrypt {
            user_id: split_word(rest).map(|(user, _)| UserId::from(user)),
        },
        "reset" => ConsoleCommand::Reset,
        "status" => ConsoleCommand::Status,
        "log" => ConsoleCommand::Log,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(format!("unknown command '{other}'; type 'help'")),
    };
    Ok(Some(command))
}

fn split_word(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    match input.split_once(char::is_whitespace) {
        Some((word, rest)) => Some((word, rest.trim())),
        None => Some((input, "")),
    }
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
