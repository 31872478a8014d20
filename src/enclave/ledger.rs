// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger state manager.
//!
//! Owns the account record, the runtime counter and the sealing engine.
//! Every operation either commits completely or leaves all three untouched.

use tracing::{debug, warn};

use super::key::derive_seal_key;
use super::record::{AccountInfo, AccountRecord};
use super::replay::{ReplayDetector, ReplayVerdict};
use super::sealing::{SealError, SealedRecord, SealingEngine};
use super::EnclaveError;

/// Result of a load attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Success,
    Replay,
    AuthenticationFailure,
    MalformedBlob,
}

/// Why a mutation was absorbed without effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    InsufficientFunds,
    Overflow,
}

/// Result of a mutating operation. Refusals are not errors; the caller only
/// sees unchanged state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Committed,
    Refused(Refusal),
}

/// The single in-boundary account.
#[derive(Debug, Default)]
pub struct Ledger {
    record: AccountRecord,
    detector: ReplayDetector,
    engine: Option<SealingEngine>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.is_some()
    }

    /// Set up default state and derive the seal key. Only the first call in
    /// an activation has any effect.
    pub fn initialize(&mut self) -> Result<(), EnclaveError> {
        if self.is_initialized() {
            return Ok(());
        }

        let engine = SealingEngine::new(&derive_seal_key())?;
        self.record = AccountRecord::default();
        self.detector = ReplayDetector::new();
        self.engine = Some(engine);
        debug!("Ledger initialized");
        Ok(())
    }

    pub fn runtime_counter(&self) -> u64 {
        self.detector.counter()
    }

    /// Close the startup load window without loading anything.
    pub fn finish_startup(&mut self) {
        self.detector.arm();
    }

    pub fn startup_pending(&self) -> bool {
        !self.detector.is_armed()
    }

    pub fn set_balance(&mut self, amount: i64) -> Result<MutationOutcome, EnclaveError> {
        self.commit(Ok(amount))
    }

    pub fn deposit(&mut self, amount: i64) -> Result<MutationOutcome, EnclaveError> {
        let balance = self
            .record
            .balance
            .checked_add(amount)
            .ok_or(Refusal::Overflow);
        self.commit(balance)
    }

    /// Withdrawals larger than the balance are refused silently.
    pub fn withdraw(&mut self, amount: i64) -> Result<MutationOutcome, EnclaveError> {
        let balance = if amount > self.record.balance {
            Err(Refusal::InsufficientFunds)
        } else {
            self.record
                .balance
                .checked_sub(amount)
                .ok_or(Refusal::Overflow)
        };
        self.commit(balance)
    }

    pub fn info(&self) -> AccountInfo {
        self.record.copy_out()
    }

    /// Seal the current record at the current runtime counter.
    pub fn seal_state(&self) -> Result<SealedRecord, EnclaveError> {
        let engine = self.engine()?;
        Ok(engine.seal(&self.record, self.detector.counter())?)
    }

    /// Unseal `blob`, run the replay check and adopt it if accepted.
    pub fn load_state(&mut self, blob: &[u8]) -> Result<LoadOutcome, EnclaveError> {
        let unsealed = self.engine()?.unseal(blob);
        let (record, saved) = match unsealed {
            Ok(opened) => opened,
            Err(SealError::AuthenticationFailure) => {
                self.detector.arm();
                return Ok(LoadOutcome::AuthenticationFailure);
            }
            Err(SealError::MalformedBlob) => {
                self.detector.arm();
                return Ok(LoadOutcome::MalformedBlob);
            }
            Err(e) => return Err(e.into()),
        };

        match self.detector.check(saved) {
            ReplayVerdict::Replay => {
                warn!(
                    saved_counter = saved,
                    runtime_counter = self.detector.counter(),
                    "Rejected stale sealed state"
                );
                Ok(LoadOutcome::Replay)
            }
            ReplayVerdict::Accept => {
                self.record = record;
                self.detector.adopt(saved);
                Ok(LoadOutcome::Success)
            }
        }
    }

    fn engine(&self) -> Result<&SealingEngine, EnclaveError> {
        self.engine.as_ref().ok_or(EnclaveError::NotInitialized)
    }

    fn commit(&mut self, balance: Result<i64, Refusal>) -> Result<MutationOutcome, EnclaveError> {
        self.engine()?;

        let next = balance.and_then(|balance| {
            let tx_count = self
                .record
                .transaction_count
                .checked_add(1)
                .ok_or(Refusal::Overflow)?;
            let counter = self.detector.next().ok_or(Refusal::Overflow)?;
            Ok((balance, tx_count, counter))
        });

        match next {
            Ok((balance, tx_count, counter)) => {
                self.record.balance = balance;
                self.record.transaction_count = tx_count;
                self.detector.advance_to(counter);
                Ok(MutationOutcome::Committed)
            }
            Err(reason) => {
                debug!(?reason, "Mutation refused");
                Ok(MutationOutcome::Refused(reason))
            }
        }
    }
}
