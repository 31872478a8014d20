// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authenticated sealing of the account record.
//!
//! ## Blob Layout
//!
//! ```text
//! nonce (12) || ciphertext (PLAINTEXT_LEN) || GCM tag (16)
//! ```
//!
//! AES-128-GCM with no associated data. A fresh nonce is drawn from the
//! system CSPRNG for every seal; nonces are never derived from state.
//!
//! Unsealing only answers "is this authentic, and what does it say".
//! Whether an authentic blob is *stale* is decided by [`super::replay`].

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_128_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;
use tracing::debug;
use zeroize::Zeroize;

use super::key::SealKey;
use super::record::{decode_plaintext, encode_plaintext, AccountRecord, PLAINTEXT_LEN};

/// Length of the GCM authentication tag.
pub const TAG_LEN: usize = 16;

/// Total length of a sealed blob.
pub const SEALED_LEN: usize = NONCE_LEN + PLAINTEXT_LEN + TAG_LEN;

/// Sealing engine failures.
///
/// `AuthenticationFailure` deliberately carries no detail: callers cannot
/// tell a flipped bit from a wrong key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SealError {
    #[error("sealed blob is malformed")]
    MalformedBlob,

    #[error("sealed blob failed authentication")]
    AuthenticationFailure,

    #[error("secure random source unavailable")]
    Randomness,

    #[error("encryption failed")]
    Encryption,

    #[error("seal key rejected by cipher")]
    KeySetup,
}

/// Opaque sealed state as handed to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedRecord(Vec<u8>);

impl SealedRecord {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for SealedRecord {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// AES-GCM sealer bound to one [`SealKey`].
pub struct SealingEngine {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl std::fmt::Debug for SealingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealingEngine").finish_non_exhaustive()
    }
}

impl SealingEngine {
    pub fn new(key: &SealKey) -> Result<Self, SealError> {
        let unbound =
            UnboundKey::new(&AES_128_GCM, key.as_bytes()).map_err(|_| SealError::KeySetup)?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    /// Encrypt `record` together with `counter` under a fresh nonce.
    pub fn seal(&self, record: &AccountRecord, counter: u64) -> Result<SealedRecord, SealError> {
        let mut nonce = [0u8; NONCE_LEN];
        self.rng.fill(&mut nonce).map_err(|_| SealError::Randomness)?;

        let mut in_out = encode_plaintext(record, counter);
        let tag = match self.key.seal_in_place_separate_tag(
            Nonce::assume_unique_for_key(nonce),
            Aad::empty(),
            &mut in_out,
        ) {
            Ok(tag) => tag,
            Err(_) => {
                in_out.zeroize();
                return Err(SealError::Encryption);
            }
        };

        let mut blob = Vec::with_capacity(SEALED_LEN);
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&in_out);
        blob.extend_from_slice(tag.as_ref());
        Ok(SealedRecord(blob))
    }

    /// Decrypt and verify a blob, returning the embedded record and saved
    /// counter. No plaintext is returned unless the tag verifies.
    pub fn unseal(&self, blob: &[u8]) -> Result<(AccountRecord, u64), SealError> {
        if blob.len() != SEALED_LEN {
            debug!(len = blob.len(), expected = SEALED_LEN, "Sealed blob has wrong length");
            return Err(SealError::MalformedBlob);
        }

        let (nonce_bytes, sealed) = blob.split_at(NONCE_LEN);
        let nonce =
            Nonce::try_assume_unique_for_key(nonce_bytes).map_err(|_| SealError::MalformedBlob)?;

        let mut in_out = sealed.to_vec();
        let mut plaintext = [0u8; PLAINTEXT_LEN];
        match self.key.open_in_place(nonce, Aad::empty(), &mut in_out) {
            Ok(opened) => plaintext.copy_from_slice(opened),
            Err(_) => return Err(SealError::AuthenticationFailure),
        }
        in_out.zeroize();

        let decoded = decode_plaintext(&plaintext).map_err(|e| {
            debug!(error = %e, "Authentic blob carries an unreadable record");
            SealError::MalformedBlob
        });
        plaintext.zeroize();
        decoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enclave::key::derive_seal_key;
    use crate::enclave::record::AccountName;

    fn engine() -> SealingEngine {
        SealingEngine::new(&derive_seal_key()).unwrap()
    }

    fn sample_record() -> AccountRecord {
        AccountRecord {
            name: AccountName::default(),
            balance: 70,
            transaction_count: 2,
        }
    }

    #[test]
    fn sealed_blob_has_fixed_length() {
        let blob = engine().seal(&sample_record(), 2).unwrap();
        assert_eq!(blob.as_bytes().len(), SEALED_LEN);
        assert_eq!(SEALED_LEN, 100);
    }

    #[test]
    fn seal_then_unseal_returns_record_and_counter() {
        let engine = engine();
        for (record, counter) in [
            (sample_record(), 2),
            (AccountRecord::default(), 0),
            (
                AccountRecord {
                    name: AccountName::new("Max").unwrap(),
                    balance: i64::MIN,
                    transaction_count: u64::MAX,
                },
                u64::MAX,
            ),
        ] {
            let blob = engine.seal(&record, counter).unwrap();
            assert_eq!(engine.unseal(blob.as_bytes()).unwrap(), (record, counter));
        }
    }

    #[test]
    fn separate_engines_with_derived_key_interoperate() {
        let blob = engine().seal(&sample_record(), 5).unwrap();
        let (record, counter) = engine().unseal(blob.as_bytes()).unwrap();
        assert_eq!(record, sample_record());
        assert_eq!(counter, 5);
    }

    #[test]
    fn nonces_are_fresh_per_seal() {
        let engine = engine();
        let a = engine.seal(&sample_record(), 1).unwrap();
        let b = engine.seal(&sample_record(), 1).unwrap();
        assert_ne!(a.as_bytes()[..NONCE_LEN], b.as_bytes()[..NONCE_LEN]);
        assert_ne!(a, b);
    }

    #[test]
    fn every_single_bit_flip_fails_authentication() {
        let engine = engine();
        let blob = engine.seal(&sample_record(), 3).unwrap().into_bytes();

        for byte in 0..blob.len() {
            for bit in 0..8 {
                let mut tampered = blob.clone();
                tampered[byte] ^= 1 << bit;
                assert_eq!(
                    engine.unseal(&tampered),
                    Err(SealError::AuthenticationFailure),
                    "flip of bit {bit} in byte {byte} was not detected"
                );
            }
        }
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let blob = engine().seal(&sample_record(), 1).unwrap();
        let other = SealingEngine::new(&SealKey::from_bytes([7u8; 16])).unwrap();
        assert_eq!(
            other.unseal(blob.as_bytes()),
            Err(SealError::AuthenticationFailure)
        );
    }

    #[test]
    fn short_blob_is_malformed() {
        let blob = engine().seal(&sample_record(), 1).unwrap().into_bytes();
        assert_eq!(
            engine().unseal(&blob[..SEALED_LEN - 1]),
            Err(SealError::MalformedBlob)
        );
        assert_eq!(engine().unseal(&[]), Err(SealError::MalformedBlob));
    }

    #[test]
    fn oversized_blob_is_malformed() {
        let mut blob = engine().seal(&sample_record(), 1).unwrap().into_bytes();
        blob.push(0);
        assert_eq!(engine().unseal(&blob), Err(SealError::MalformedBlob));
    }
}
