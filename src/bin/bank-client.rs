// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! bank-client - send one command to the sealed bank server.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sealed_bank::client::{render, send_command, DEFAULT_TIMEOUT};
use sealed_bank::config::{DEFAULT_SOCKET_PATH, SOCKET_PATH_ENV};
use sealed_bank::protocol::Command;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bank-client")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Print nothing; report the result through the exit code only
    #[arg(long)]
    silent: bool,

    /// Path to the server's Unix socket
    #[arg(long, env = SOCKET_PATH_ENV, default_value = DEFAULT_SOCKET_PATH)]
    socket: PathBuf,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Overwrite the balance
    Set {
        #[arg(allow_negative_numbers = true)]
        amount: i64,
    },

    /// Add to the balance
    Deposit {
        #[arg(allow_negative_numbers = true)]
        amount: i64,
    },

    /// Take from the balance (ignored if funds are insufficient)
    Withdraw {
        #[arg(allow_negative_numbers = true)]
        amount: i64,
    },

    /// Show the account
    Query,

    /// Persist the current sealed state
    Save,

    /// Ask the server to load a sealed state file
    Load {
        /// Path of the file, as seen by the server
        file: PathBuf,
    },
}

impl Action {
    fn into_command(self) -> Command {
        match self {
            Action::Set { amount } => Command::Set(amount),
            Action::Deposit { amount } => Command::Deposit(amount),
            Action::Withdraw { amount } => Command::Withdraw(amount),
            Action::Query => Command::Query,
            Action::Save => Command::Save,
            Action::Load { file } => Command::Load(file),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let command = cli.command.into_command();
    match send_command(&cli.socket, &command, DEFAULT_TIMEOUT).await {
        Ok(response) => {
            if !cli.silent {
                println!("{}", render(&response));
            }
            if response.is_ok() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            if !cli.silent {
                eprintln!("Error: {e}");
                eprintln!("Is the server running? Start it with: bank-server");
            }
            ExitCode::FAILURE
        }
    }
}
