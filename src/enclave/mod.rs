// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Trust Boundary
//!
//! Everything in this module runs "inside" the boundary: the seal key, the
//! account record and the runtime counter never leave it.
//!
//! ## Call Interface
//!
//! The host drives the boundary through [`Enclave`]. Every entry point takes
//! plain scalars or byte slices and returns copies ([`AccountInfo`],
//! [`LoadOutcome`]); no reference into boundary state is handed out.
//!
//! The boundary in turn calls out to the host through [`SealedStateStore`]
//! to persist and retrieve the last sealed blob. The host only ever sees
//! opaque bytes.
//!
//! ```text
//! host ── set/deposit/withdraw/info/load ──▶ Enclave ──▶ Ledger ──▶ SealingEngine
//!   ▲                                           │
//!   └──────── persist(blob) / retrieve() ───────┘
//! ```

pub mod key;
pub mod ledger;
pub mod record;
pub mod replay;
pub mod sealing;

use std::io;

use thiserror::Error;
use tracing::{debug, info, warn};

pub use ledger::{Ledger, LoadOutcome, MutationOutcome, Refusal};
pub use record::{AccountInfo, AccountName, AccountRecord, DEFAULT_ACCOUNT_NAME};
pub use sealing::{SealError, SealedRecord, SEALED_LEN};

/// Errors surfaced by boundary entry points.
#[derive(Debug, Error)]
pub enum EnclaveError {
    #[error("boundary not initialized")]
    NotInitialized,

    #[error("sealing failed: {0}")]
    Seal(#[from] SealError),

    #[error("host failed to persist sealed state: {0}")]
    Persist(#[source] io::Error),

    #[error("host failed to retrieve sealed state: {0}")]
    Retrieve(#[source] io::Error),
}

/// Host callbacks for durable storage of the sealed blob.
///
/// Both calls are synchronous from the boundary's point of view.
pub trait SealedStateStore {
    /// Store `blob`, replacing whatever was stored before.
    fn persist(&mut self, blob: &[u8]) -> io::Result<()>;

    /// Return the last stored blob, or `None` if nothing was ever stored.
    fn retrieve(&mut self) -> io::Result<Option<Vec<u8>>>;
}

impl<T: SealedStateStore + ?Sized> SealedStateStore for Box<T> {
    fn persist(&mut self, blob: &[u8]) -> io::Result<()> {
        (**self).persist(blob)
    }

    fn retrieve(&mut self) -> io::Result<Option<Vec<u8>>> {
        (**self).retrieve()
    }
}

/// What happened during [`Enclave::restore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Host had nothing stored; defaults are in effect.
    Fresh,
    /// Host returned a blob and it was run through `load_state`.
    Loaded(LoadOutcome),
}

/// One activation of the trust boundary.
pub struct Enclave<S> {
    ledger: Ledger,
    store: S,
}

impl<S: SealedStateStore> Enclave<S> {
    /// Create and initialize a boundary that persists through `store`.
    pub fn launch(store: S) -> Result<Self, EnclaveError> {
        let mut enclave = Self {
            ledger: Ledger::new(),
            store,
        };
        enclave.initialize()?;
        info!("Trust boundary launched");
        Ok(enclave)
    }

    pub fn initialize(&mut self) -> Result<(), EnclaveError> {
        self.ledger.initialize()
    }

    /// Ask the host for the last sealed blob and load it.
    ///
    /// This is the startup load: the replay window is closed afterwards
    /// whether or not anything was stored.
    pub fn restore(&mut self) -> Result<RestoreOutcome, EnclaveError> {
        match self.store.retrieve().map_err(EnclaveError::Retrieve)? {
            Some(blob) => {
                let outcome = self.ledger.load_state(&blob)?;
                debug!(?outcome, len = blob.len(), "Startup load finished");
                Ok(RestoreOutcome::Loaded(outcome))
            }
            None => {
                self.ledger.finish_startup();
                Ok(RestoreOutcome::Fresh)
            }
        }
    }

    pub fn set_balance(&mut self, amount: i64) -> Result<MutationOutcome, EnclaveError> {
        self.ledger.set_balance(amount)
    }

    pub fn deposit(&mut self, amount: i64) -> Result<MutationOutcome, EnclaveError> {
        self.ledger.deposit(amount)
    }

    pub fn withdraw(&mut self, amount: i64) -> Result<MutationOutcome, EnclaveError> {
        self.ledger.withdraw(amount)
    }

    pub fn account_info(&self) -> AccountInfo {
        self.ledger.info()
    }

    /// The host-side store this boundary persists through.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Seal current state and hand the blob to the host.
    pub fn save_state(&mut self) -> Result<(), EnclaveError> {
        let sealed = self.ledger.seal_state()?;
        self.store
            .persist(sealed.as_bytes())
            .map_err(EnclaveError::Persist)?;
        debug!(
            len = sealed.as_bytes().len(),
            counter = self.ledger.runtime_counter(),
            "Sealed state persisted"
        );
        Ok(())
    }

    /// Load a blob supplied by the host.
    pub fn load_state(&mut self, blob: &[u8]) -> Result<LoadOutcome, EnclaveError> {
        self.ledger.load_state(blob)
    }

    /// Final save, then tear the boundary down.
    pub fn shutdown(mut self) -> Result<S, EnclaveError> {
        let result = self.save_state();
        if let Err(e) = &result {
            warn!(error = %e, "Final save before shutdown failed");
        }
        info!("Trust boundary destroyed");
        result.map(|()| self.store)
    }
}

impl<S> std::fmt::Debug for Enclave<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enclave").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStateStore;

    #[test]
    fn launch_initializes_defaults() {
        let enclave = Enclave::launch(MemoryStateStore::new()).unwrap();
        let info = enclave.account_info();
        assert_eq!(info.name, DEFAULT_ACCOUNT_NAME);
        assert_eq!(info.balance, 0);
        assert_eq!(info.transaction_count, 0);
    }

    #[test]
    fn restore_with_empty_store_is_fresh_and_arms_replay_check() {
        let mut enclave = Enclave::launch(MemoryStateStore::new()).unwrap();
        assert_eq!(enclave.restore().unwrap(), RestoreOutcome::Fresh);

        enclave.save_state().unwrap();
        let blob = enclave.store.last().unwrap().to_vec();
        assert_eq!(enclave.load_state(&blob).unwrap(), LoadOutcome::Replay);
    }

    #[test]
    fn save_state_hands_opaque_blob_to_host() {
        let mut enclave = Enclave::launch(MemoryStateStore::new()).unwrap();
        enclave.deposit(100).unwrap();
        enclave.save_state().unwrap();

        let blob = enclave.store.last().unwrap();
        assert_eq!(blob.len(), SEALED_LEN);
        let name = DEFAULT_ACCOUNT_NAME.as_bytes();
        assert!(!blob.windows(name.len()).any(|w| w == name));
        assert_eq!(enclave.store.persist_count(), 1);
    }

    #[test]
    fn restore_round_trips_through_store() {
        let mut first = Enclave::launch(MemoryStateStore::new()).unwrap();
        first.restore().unwrap();
        first.deposit(100).unwrap();
        first.withdraw(30).unwrap();
        let store = first.shutdown().unwrap();

        let mut second = Enclave::launch(store).unwrap();
        assert_eq!(
            second.restore().unwrap(),
            RestoreOutcome::Loaded(LoadOutcome::Success)
        );
        let info = second.account_info();
        assert_eq!((info.balance, info.transaction_count), (70, 2));
    }

    #[test]
    fn first_load_after_mutations_accepts_own_blob() {
        let mut enclave = Enclave::launch(MemoryStateStore::new()).unwrap();
        enclave.deposit(100).unwrap();
        enclave.withdraw(30).unwrap();
        enclave.withdraw(1000).unwrap();
        enclave.save_state().unwrap();

        let blob = enclave.store.last().unwrap().to_vec();
        assert_eq!(enclave.load_state(&blob).unwrap(), LoadOutcome::Success);
        let info = enclave.account_info();
        assert_eq!((info.balance, info.transaction_count), (70, 2));

        // Window is closed now; the same blob is stale.
        assert_eq!(enclave.load_state(&blob).unwrap(), LoadOutcome::Replay);
    }

    #[test]
    fn persist_failure_is_reported() {
        let mut store = MemoryStateStore::new();
        store.fail_persist(true);
        let mut enclave = Enclave::launch(store).unwrap();
        enclave.deposit(1).unwrap();
        assert!(matches!(enclave.save_state(), Err(EnclaveError::Persist(_))));
        assert_eq!(enclave.account_info().balance, 1);
    }

    #[test]
    fn shutdown_performs_exactly_one_save() {
        let mut enclave = Enclave::launch(MemoryStateStore::new()).unwrap();
        enclave.restore().unwrap();
        let store = enclave.shutdown().unwrap();
        assert_eq!(store.persist_count(), 1);
    }
}
