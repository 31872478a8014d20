// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Command Server
//!
//! Untrusted host process that owns the boundary and exposes it over a Unix
//! socket. Connections are handled strictly one at a time: accept, read one
//! command, reply, close.
//!
//! ## Persistence
//!
//! Every mutating command is followed by `save_state` before the reply is
//! written, so an `OK` for a mutation means the sealed blob is on disk.
//!
//! ## Shutdown
//!
//! SIGINT/SIGTERM cancel a `CancellationToken`. The accept loop stops, the
//! boundary performs exactly one final save and the socket file is removed.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::enclave::{
    Enclave, EnclaveError, LoadOutcome, MutationOutcome, RestoreOutcome, SealedStateStore,
};
use crate::error::HostError;
use crate::protocol::{Command, Response, MAX_COMMAND_LEN};
use crate::storage::state_file::read_blob;
use crate::storage::{AuditEvent, AuditEventType, AuditLog, FileStateStore};

/// Fatal server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("trust boundary error: {0}")]
    Enclave(#[from] EnclaveError),

    #[error("cannot bind {path}: {source}")]
    Bind {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Why a request could not be read.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("no request received before timeout")]
    Timeout,

    /// Bytes arrived but neither a newline nor EOF followed in time.
    #[error("request not terminated before timeout")]
    Incomplete,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Host-side command dispatcher wrapped around one boundary activation.
pub struct BankServer<S> {
    enclave: Enclave<S>,
    audit: Option<AuditLog>,
    read_timeout: Duration,
}

impl<S: SealedStateStore> BankServer<S> {
    pub fn new(enclave: Enclave<S>, audit: Option<AuditLog>, read_timeout: Duration) -> Self {
        Self {
            enclave,
            audit,
            read_timeout,
        }
    }

    /// Hand the stored blob back to the boundary. A rejected blob is logged
    /// and the server continues from defaults.
    pub fn restore(&mut self) -> Result<RestoreOutcome, EnclaveError> {
        let outcome = self.enclave.restore()?;
        let tx_count = self.enclave.account_info().transaction_count;

        match outcome {
            RestoreOutcome::Fresh => info!("No stored state, starting with a fresh account"),
            RestoreOutcome::Loaded(LoadOutcome::Success) => {
                info!(transaction_count = tx_count, "Restored sealed state");
                self.audit(
                    AuditEvent::new(AuditEventType::StateRestored).with_transaction_count(tx_count),
                );
            }
            RestoreOutcome::Loaded(LoadOutcome::Replay) => {
                warn!("Stored state rejected as replay, starting from defaults");
                self.audit(
                    AuditEvent::new(AuditEventType::ReplayDetected)
                        .with_command("STARTUP")
                        .failed("stale counter"),
                );
            }
            RestoreOutcome::Loaded(rejected) => {
                warn!(outcome = ?rejected, "Stored state rejected, starting from defaults");
                self.audit(
                    AuditEvent::new(AuditEventType::LoadRejected)
                        .with_command("STARTUP")
                        .failed(format!("{rejected:?}")),
                );
            }
        }
        Ok(outcome)
    }

    /// Parse and execute one raw request.
    pub fn handle_command(&mut self, raw: &[u8]) -> Response {
        let result = Command::parse(raw)
            .map_err(HostError::from)
            .and_then(|cmd| self.execute(cmd));

        match result {
            Ok(response) => response,
            Err(e) => {
                debug!(tag = e.tag.as_str(), message = %e.message, "Command failed");
                e.into_response()
            }
        }
    }

    fn execute(&mut self, cmd: Command) -> Result<Response, HostError> {
        let verb = cmd.verb();
        debug!(command = verb, "Handling command");

        match cmd {
            Command::Set(amount) => self.mutate(verb, |e| e.set_balance(amount)),
            Command::Deposit(amount) => self.mutate(verb, |e| e.deposit(amount)),
            Command::Withdraw(amount) => self.mutate(verb, |e| e.withdraw(amount)),
            Command::Query => Ok(Response::Account(self.enclave.account_info())),
            Command::Save => {
                self.persist(verb)?;
                Ok(Response::saved())
            }
            Command::Load(path) => self.load(&path),
        }
    }

    fn mutate(
        &mut self,
        verb: &'static str,
        op: impl FnOnce(&mut Enclave<S>) -> Result<MutationOutcome, EnclaveError>,
    ) -> Result<Response, HostError> {
        let outcome = op(&mut self.enclave).map_err(internal)?;
        if let MutationOutcome::Refused(reason) = outcome {
            info!(command = verb, ?reason, "Mutation refused, state unchanged");
        }

        let info = self.enclave.account_info();
        self.persist(verb)?;
        Ok(Response::Account(info))
    }

    fn persist(&mut self, verb: &'static str) -> Result<(), HostError> {
        match self.enclave.save_state() {
            Ok(()) => {
                let tx_count = self.enclave.account_info().transaction_count;
                self.audit(
                    AuditEvent::new(AuditEventType::StateSaved)
                        .with_command(verb)
                        .with_transaction_count(tx_count),
                );
                Ok(())
            }
            Err(e) => {
                error!(command = verb, error = %e, "Failed to persist sealed state");
                self.audit(
                    AuditEvent::new(AuditEventType::PersistFailed)
                        .with_command(verb)
                        .failed(e.to_string()),
                );
                Err(HostError::not_persisted(e))
            }
        }
    }

    fn load(&mut self, path: &Path) -> Result<Response, HostError> {
        let blob = read_blob(path).map_err(|e| {
            warn!(path = %path.display(), error = %e, "Cannot open state file");
            HostError::cannot_open_file()
        })?;

        let outcome = self.enclave.load_state(&blob).map_err(internal)?;
        let source = path.display().to_string();
        match outcome {
            LoadOutcome::Success => {
                let info = self.enclave.account_info();
                info!(path = %source, transaction_count = info.transaction_count, "Loaded state");
                self.audit(
                    AuditEvent::new(AuditEventType::StateLoaded)
                        .with_command("LOAD")
                        .with_source(source)
                        .with_transaction_count(info.transaction_count),
                );
                Ok(Response::Account(info))
            }
            LoadOutcome::Replay => {
                warn!(path = %source, "Replay attack detected");
                self.audit(
                    AuditEvent::new(AuditEventType::ReplayDetected)
                        .with_command("LOAD")
                        .with_source(source)
                        .failed("stale counter"),
                );
                Err(HostError::replay())
            }
            rejected @ (LoadOutcome::AuthenticationFailure | LoadOutcome::MalformedBlob) => {
                warn!(path = %source, outcome = ?rejected, "Rejected state file");
                self.audit(
                    AuditEvent::new(AuditEventType::LoadRejected)
                        .with_command("LOAD")
                        .with_source(source)
                        .failed(format!("{rejected:?}")),
                );
                Err(HostError::load_failed())
            }
        }
    }

    fn audit(&self, event: AuditEvent) {
        if let Some(log) = &self.audit {
            if let Err(e) = log.log(&event) {
                warn!(error = %e, event_type = ?event.event_type, "Failed to write audit event");
            }
        }
    }

    /// Serve one connection: read a command, write the response, close.
    pub async fn handle_connection(&mut self, mut stream: UnixStream) {
        let response = match read_request(&mut stream, self.read_timeout).await {
            Ok(raw) if raw.is_empty() => {
                debug!("Client closed without sending a command");
                return;
            }
            Ok(raw) => self.handle_command(&raw),
            Err(RequestError::Incomplete) => {
                warn!("Request not terminated before timeout, not executed");
                HostError::incomplete().into_response()
            }
            Err(e) => {
                warn!(error = %e, "Failed to read request");
                return;
            }
        };

        let mut line = response.to_line();
        line.push('\n');
        if let Err(e) = stream.write_all(line.as_bytes()).await {
            warn!(error = %e, "Failed to write response");
            return;
        }
        let _ = stream.shutdown().await;
    }

    /// Accept loop. Returns the store after the final save.
    pub async fn serve(
        mut self,
        listener: UnixListener,
        shutdown: CancellationToken,
    ) -> Result<S, EnclaveError> {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => self.handle_connection(stream).await,
                    Err(e) => warn!(error = %e, "Failed to accept connection"),
                },
            }
        }

        info!("Saving state before shutdown");
        self.enclave.shutdown()
    }
}

fn internal(e: EnclaveError) -> HostError {
    error!(error = %e, "Trust boundary call failed");
    HostError::error("Internal error")
}

/// Read one request: up to a newline, EOF or [`MAX_COMMAND_LEN`] bytes.
///
/// A request that is still unterminated when `limit` expires is reported as
/// [`RequestError::Incomplete`] and must not be executed.
pub async fn read_request<R>(reader: &mut R, limit: Duration) -> Result<Vec<u8>, RequestError>
where
    R: AsyncRead + Unpin,
{
    let deadline = tokio::time::Instant::now() + limit;
    let mut buf = Vec::with_capacity(MAX_COMMAND_LEN);
    let mut chunk = [0u8; MAX_COMMAND_LEN + 1];

    loop {
        let n = match tokio::time::timeout_at(deadline, reader.read(&mut chunk)).await {
            Ok(read) => read?,
            Err(_) if buf.is_empty() => return Err(RequestError::Timeout),
            Err(_) => return Err(RequestError::Incomplete),
        };
        if n == 0 {
            break;
        }

        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            buf.truncate(pos);
            break;
        }
        if buf.len() > MAX_COMMAND_LEN {
            break;
        }
    }

    Ok(buf)
}

/// Bind the server socket, removing a stale socket file first.
pub fn bind_socket(path: &Path) -> Result<UnixListener, ServerError> {
    remove_socket(path);
    UnixListener::bind(path).map_err(|source| ServerError::Bind {
        path: path.display().to_string(),
        source,
    })
}

fn remove_socket(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed socket file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove socket file"),
    }
}

/// Cancel `shutdown` on SIGINT or SIGTERM.
pub async fn watch_signals(shutdown: CancellationToken) {
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "Cannot listen for SIGINT");
                return;
            }
        }
        _ = terminate => {}
    }

    info!("Shutdown signal received");
    shutdown.cancel();
}

/// Launch the boundary, restore stored state and serve until a stop signal.
pub async fn run(config: ServerConfig) -> Result<(), ServerError> {
    let store = FileStateStore::with_paths(&config.paths);
    info!(state_file = %store.path().display(), "Launching trust boundary");

    let enclave = Enclave::launch(store)?;
    let audit = config.audit.then(|| AuditLog::new(config.paths.clone()));
    let mut server = BankServer::new(enclave, audit, config.read_timeout);
    server.restore()?;

    let socket_path: PathBuf = config.socket_path.clone();
    let listener = bind_socket(&socket_path)?;
    info!(socket = %socket_path.display(), "Banking service running");

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    let result = server.serve(listener, shutdown).await;
    remove_socket(&socket_path);
    result?;

    info!("Server stopped");
    Ok(())
}
