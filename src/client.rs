// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client side of the command protocol.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

use crate::enclave::AccountInfo;
use crate::protocol::{Command, ProtocolError, Response};

/// Default connection and response timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Cannot connect to server at {}: {source}", .path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Timed out waiting for server")]
    Timeout,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Send one command and wait for the single response line.
pub async fn send_command(
    socket_path: &Path,
    command: &Command,
    timeout: Duration,
) -> Result<Response, ClientError> {
    let mut stream = tokio::time::timeout(timeout, UnixStream::connect(socket_path))
        .await
        .map_err(|_| ClientError::Timeout)?
        .map_err(|source| ClientError::Connect {
            path: socket_path.to_path_buf(),
            source,
        })?;

    stream.write_all(command.to_line().as_bytes()).await?;
    stream.shutdown().await?;

    let mut reply = String::new();
    tokio::time::timeout(timeout, stream.read_to_string(&mut reply))
        .await
        .map_err(|_| ClientError::Timeout)??;

    Ok(Response::parse(&reply)?)
}

/// Human-readable rendering of a response.
pub fn render(response: &Response) -> String {
    match response {
        Response::Account(info) => render_account(info),
        Response::Message(msg) => format!("OK: {msg}"),
        Response::Replay(msg) => format!("REPLAY ATTACK DETECTED\n{msg}"),
        Response::Error(msg) => format!("Error: {msg}"),
    }
}

fn render_account(info: &AccountInfo) -> String {
    const WIDTH: usize = 40;
    let rule = "-".repeat(WIDTH);
    let row = |label: &str, value: String| format!("| {label:<14}{value:<24} |");

    [
        format!("+{rule}+"),
        format!("| {:<38} |", "SECURE BANK ACCOUNT"),
        format!("+{rule}+"),
        row("Account:", info.name.clone()),
        row("Balance:", format!("${}", info.balance)),
        row("Transactions:", info.transaction_count.to_string()),
        format!("+{rule}+"),
    ]
    .join("\n")
}
