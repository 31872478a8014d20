// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory sealed state store.
//!
//! Keeps every persisted blob so tests can replay old ones at the boundary
//! the way a hostile host would.

use std::io;

use crate::enclave::SealedStateStore;

#[derive(Debug, Default)]
pub struct MemoryStateStore {
    history: Vec<Vec<u8>>,
    fail_persist: bool,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `blob` already stored, as if left by a previous activation.
    pub fn with_blob(blob: impl Into<Vec<u8>>) -> Self {
        Self {
            history: vec![blob.into()],
            fail_persist: false,
        }
    }

    /// Most recently persisted blob.
    pub fn last(&self) -> Option<&[u8]> {
        self.history.last().map(Vec::as_slice)
    }

    /// Every blob ever persisted, oldest first.
    pub fn history(&self) -> &[Vec<u8>] {
        &self.history
    }

    pub fn persist_count(&self) -> usize {
        self.history.len()
    }

    /// Make subsequent `persist` calls fail.
    pub fn fail_persist(&mut self, fail: bool) {
        self.fail_persist = fail;
    }
}

impl SealedStateStore for MemoryStateStore {
    fn persist(&mut self, blob: &[u8]) -> io::Result<()> {
        if self.fail_persist {
            return Err(io::Error::other("persist disabled"));
        }
        self.history.push(blob.to_vec());
        Ok(())
    }

    fn retrieve(&mut self) -> io::Result<Option<Vec<u8>>> {
        Ok(self.history.last().cloned())
    }
}
