// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Command Protocol
//!
//! One request line per connection, one response line back.
//!
//! ## Requests
//!
//! | Command | Argument |
//! |---------|----------|
//! | `SET <amount>` | signed integer |
//! | `DEPOSIT <amount>` | signed integer |
//! | `WITHDRAW <amount>` | signed integer |
//! | `QUERY` | none |
//! | `SAVE` | none |
//! | `LOAD <path>` | file path (rest of line) |
//!
//! The verb and its argument are separated by a single space. Trailing
//! whitespace (including the newline) is ignored.
//!
//! ## Responses
//!
//! `|`-delimited; the first field is the result tag:
//!
//! - `OK|name|balance|txCount`
//! - `OK|saved`
//! - `REPLAY|<message>`
//! - `ERROR|<message>`

use std::path::PathBuf;

use thiserror::Error;

use crate::enclave::AccountInfo;

/// Longest request accepted by the server, in bytes.
pub const MAX_COMMAND_LEN: usize = 256;

/// Field delimiter in responses.
pub const DELIMITER: char = '|';

/// Tokenizer and response parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Unknown command")]
    UnknownCommand,

    #[error("Missing argument for {0}")]
    MissingArgument(&'static str),

    #[error("Unexpected argument for {0}")]
    UnexpectedArgument(&'static str),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Command too long")]
    TooLong,

    #[error("Command is not valid UTF-8")]
    NotUtf8,

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// A parsed client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set(i64),
    Deposit(i64),
    Withdraw(i64),
    Query,
    Save,
    Load(PathBuf),
}

impl Command {
    /// Tokenize a raw request.
    pub fn parse(raw: &[u8]) -> Result<Self, ProtocolError> {
        if raw.len() > MAX_COMMAND_LEN {
            return Err(ProtocolError::TooLong);
        }
        let line = std::str::from_utf8(raw).map_err(|_| ProtocolError::NotUtf8)?;
        let line = line.trim_end();

        let (verb, arg) = match line.split_once(' ') {
            Some((verb, arg)) => (verb, Some(arg.trim())),
            None => (line, None),
        };
        let arg = arg.filter(|a| !a.is_empty());

        match verb {
            "SET" => Ok(Command::Set(amount("SET", arg)?)),
            "DEPOSIT" => Ok(Command::Deposit(amount("DEPOSIT", arg)?)),
            "WITHDRAW" => Ok(Command::Withdraw(amount("WITHDRAW", arg)?)),
            "QUERY" => no_argument("QUERY", arg).map(|()| Command::Query),
            "SAVE" => no_argument("SAVE", arg).map(|()| Command::Save),
            "LOAD" => arg
                .map(|path| Command::Load(PathBuf::from(path)))
                .ok_or(ProtocolError::MissingArgument("LOAD")),
            _ => Err(ProtocolError::UnknownCommand),
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Command::Set(_) => "SET",
            Command::Deposit(_) => "DEPOSIT",
            Command::Withdraw(_) => "WITHDRAW",
            Command::Query => "QUERY",
            Command::Save => "SAVE",
            Command::Load(_) => "LOAD",
        }
    }

    /// Render as a request line.
    pub fn to_line(&self) -> String {
        match self {
            Command::Set(n) | Command::Deposit(n) | Command::Withdraw(n) => {
                format!("{} {n}\n", self.verb())
            }
            Command::Query | Command::Save => format!("{}\n", self.verb()),
            Command::Load(path) => format!("LOAD {}\n", path.display()),
        }
    }
}

fn amount(verb: &'static str, arg: Option<&str>) -> Result<i64, ProtocolError> {
    let arg = arg.ok_or(ProtocolError::MissingArgument(verb))?;
    arg.parse::<i64>()
        .map_err(|_| ProtocolError::InvalidAmount(arg.to_string()))
}

fn no_argument(verb: &'static str, arg: Option<&str>) -> Result<(), ProtocolError> {
    match arg {
        Some(_) => Err(ProtocolError::UnexpectedArgument(verb)),
        None => Ok(()),
    }
}

/// Result tag, the first field of every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseTag {
    Ok,
    Replay,
    Error,
}

impl ResponseTag {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseTag::Ok => "OK",
            ResponseTag::Replay => "REPLAY",
            ResponseTag::Error => "ERROR",
        }
    }
}

/// A server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Account(AccountInfo),
    Message(String),
    Replay(String),
    Error(String),
}

impl Response {
    pub fn saved() -> Self {
        Response::Message("saved".to_string())
    }

    pub fn tag(&self) -> ResponseTag {
        match self {
            Response::Account(_) | Response::Message(_) => ResponseTag::Ok,
            Response::Replay(_) => ResponseTag::Replay,
            Response::Error(_) => ResponseTag::Error,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.tag() == ResponseTag::Ok
    }

    /// Render without a trailing newline.
    pub fn to_line(&self) -> String {
        let tag = self.tag().as_str();
        match self {
            Response::Account(info) => format!(
                "{tag}{DELIMITER}{}{DELIMITER}{}{DELIMITER}{}",
                info.name, info.balance, info.transaction_count
            ),
            Response::Message(msg) | Response::Replay(msg) | Response::Error(msg) => {
                format!("{tag}{DELIMITER}{msg}")
            }
        }
    }

    /// Parse a response line. Only the tag is split off for messages, so a
    /// message may itself contain the delimiter.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let malformed = || ProtocolError::MalformedResponse(line.to_string());
        let (tag, rest) = line.split_once(DELIMITER).ok_or_else(malformed)?;

        match tag {
            "OK" => Ok(parse_account(rest)
                .unwrap_or_else(|| Response::Message(rest.to_string()))),
            "REPLAY" => Ok(Response::Replay(rest.to_string())),
            "ERROR" => Ok(Response::Error(rest.to_string())),
            _ => Err(malformed()),
        }
    }
}

/// `name|balance|tx_count`, with the numbers taken from the right so the
/// name may contain the delimiter.
fn parse_account(fields: &str) -> Option<Response> {
    let mut parts = fields.rsplitn(3, DELIMITER);
    let transaction_count = parts.next()?.parse().ok()?;
    let balance = parts.next()?.parse().ok()?;
    let name = parts.next()?;
    Some(Response::Account(AccountInfo {
        name: name.to_string(),
        balance,
        transaction_count,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_amount_commands() {
        assert_eq!(Command::parse(b"SET 100").unwrap(), Command::Set(100));
        assert_eq!(Command::parse(b"DEPOSIT 5\n").unwrap(), Command::Deposit(5));
        assert_eq!(Command::parse(b"WITHDRAW -3\r\n").unwrap(), Command::Withdraw(-3));
    }

    #[test]
    fn parses_bare_commands() {
        assert_eq!(Command::parse(b"QUERY").unwrap(), Command::Query);
        assert_eq!(Command::parse(b"SAVE\n").unwrap(), Command::Save);
    }

    #[test]
    fn load_takes_rest_of_line_as_path() {
        assert_eq!(
            Command::parse(b"LOAD /tmp/my state.bin\n").unwrap(),
            Command::Load(PathBuf::from("/tmp/my state.bin"))
        );
    }

    #[test]
    fn rejects_unknown_and_lowercase_verbs() {
        assert_eq!(Command::parse(b"TRANSFER 1"), Err(ProtocolError::UnknownCommand));
        assert_eq!(Command::parse(b"query"), Err(ProtocolError::UnknownCommand));
        assert_eq!(Command::parse(b""), Err(ProtocolError::UnknownCommand));
    }

    #[test]
    fn rejects_bad_arguments() {
        assert_eq!(
            Command::parse(b"DEPOSIT"),
            Err(ProtocolError::MissingArgument("DEPOSIT"))
        );
        assert_eq!(
            Command::parse(b"SET  "),
            Err(ProtocolError::MissingArgument("SET"))
        );
        assert_eq!(
            Command::parse(b"WITHDRAW 12abc"),
            Err(ProtocolError::InvalidAmount("12abc".to_string()))
        );
        assert_eq!(
            Command::parse(b"DEPOSIT 99999999999999999999"),
            Err(ProtocolError::InvalidAmount("99999999999999999999".to_string()))
        );
        assert_eq!(
            Command::parse(b"QUERY now"),
            Err(ProtocolError::UnexpectedArgument("QUERY"))
        );
        assert_eq!(Command::parse(b"LOAD"), Err(ProtocolError::MissingArgument("LOAD")));
    }

    #[test]
    fn rejects_oversized_and_non_utf8_input() {
        let long = vec![b'A'; MAX_COMMAND_LEN + 1];
        assert_eq!(Command::parse(&long), Err(ProtocolError::TooLong));
        assert_eq!(Command::parse(b"SET \xff"), Err(ProtocolError::NotUtf8));
    }

    #[test]
    fn request_lines_parse_back() {
        for cmd in [
            Command::Deposit(42),
            Command::Query,
            Command::Load(PathBuf::from("backup.bin")),
        ] {
            assert_eq!(Command::parse(cmd.to_line().as_bytes()).unwrap(), cmd);
        }
    }

    #[test]
    fn formats_responses() {
        let account = Response::Account(AccountInfo {
            name: "John's Account".to_string(),
            balance: 70,
            transaction_count: 2,
        });
        assert_eq!(account.to_line(), "OK|John's Account|70|2");
        assert_eq!(Response::saved().to_line(), "OK|saved");
        assert_eq!(
            Response::Replay("Replay attack detected".to_string()).to_line(),
            "REPLAY|Replay attack detected"
        );
        assert_eq!(
            Response::Error("Unknown command".to_string()).to_line(),
            "ERROR|Unknown command"
        );
    }

    #[test]
    fn parses_responses() {
        assert_eq!(
            Response::parse("OK|John's Account|-5|9\n").unwrap(),
            Response::Account(AccountInfo {
                name: "John's Account".to_string(),
                balance: -5,
                transaction_count: 9,
            })
        );
        assert_eq!(Response::parse("OK|saved").unwrap(), Response::saved());
        assert!(matches!(Response::parse("REPLAY|x").unwrap(), Response::Replay(_)));
        assert!(matches!(Response::parse("ERROR|x").unwrap(), Response::Error(_)));
    }

    #[test]
    fn messages_may_contain_delimiter() {
        assert_eq!(
            Response::parse("ERROR|Invalid amount: 1|2\n").unwrap(),
            Response::Error("Invalid amount: 1|2".to_string())
        );
        assert_eq!(
            Response::parse("REPLAY|a|b").unwrap(),
            Response::Replay("a|b".to_string())
        );
        assert_eq!(
            Response::parse("OK|n|ten|1").unwrap(),
            Response::Message("n|ten|1".to_string())
        );
        assert_eq!(
            Response::parse("OK|Savings|Main|12|3").unwrap(),
            Response::Account(AccountInfo {
                name: "Savings|Main".to_string(),
                balance: 12,
                transaction_count: 3,
            })
        );
    }

    #[test]
    fn error_line_with_delimiter_parses_back() {
        let reason = ProtocolError::InvalidAmount("1|2".to_string());
        let reply = Response::Error(reason.to_string());
        assert_eq!(Response::parse(&reply.to_line()).unwrap(), reply);
    }

    #[test]
    fn rejects_malformed_responses() {
        for line in ["", "OK", "ERROR", "NOPE|x", "ok|saved"] {
            assert!(
                matches!(Response::parse(line), Err(ProtocolError::MalformedResponse(_))),
                "accepted {line:?}"
            );
        }
    }
}
