// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sealed Bank - single-account ledger with sealed, replay-checked state
//!
//! The account lives inside a trust boundary that persists it to untrusted
//! storage as an AES-GCM blob. The host can store the blob but can neither
//! read it nor roll it back undetected within one boundary activation.
//!
//! ## Modules
//!
//! - `enclave` - Trust boundary: key derivation, sealing, replay check, ledger
//! - `storage` - Host-side blob storage and audit log
//! - `protocol` - Text command protocol
//! - `server` - Unix socket command server
//! - `client` - Command client

pub mod client;
pub mod config;
pub mod enclave;
pub mod error;
pub mod protocol;
pub mod server;
pub mod storage;
