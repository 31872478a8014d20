// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Host Storage
//!
//! Untrusted, host-side persistence. Nothing here can read or forge
//! boundary state: the state file only ever holds the opaque blob produced
//! by [`crate::enclave::Enclave::save_state`].
//!
//! ## Storage Layout
//!
//! ```text
//! {data_dir}/
//!   enclave_state.bin        # last sealed blob (100 bytes)
//!   audit/
//!     {date}/events.jsonl    # daily audit logs
//! ```

pub mod audit;
pub mod memory;
pub mod paths;
pub mod state_file;

pub use audit::{AuditEvent, AuditEventType, AuditLog};
pub use memory::MemoryStateStore;
pub use paths::StoragePaths;
pub use state_file::{FileStateStore, StorageError, StorageResult};
