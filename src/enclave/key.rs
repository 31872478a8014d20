// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Seal key derivation.
//!
//! ## Security Note
//!
//! The key is derived from a constant compiled into the boundary, so every
//! activation recomputes the same key and can open any blob ever sealed by
//! any earlier activation. Together with the startup load window this
//! leaves rollbacks across restarts undetected (see [`super::replay`]).

use sha2::{Digest, Sha256};
use zeroize::Zeroize;

/// Constant seed hashed into the seal key.
const SEAL_KEY_SEED: &[u8] = b"DEMO_SEAL_KEY_SEED_DO_NOT_USE_IN_PRODUCTION";

/// AES-128-GCM key length in bytes.
pub const SEAL_KEY_LEN: usize = 16;

/// Symmetric sealing key. Never leaves the boundary and is wiped on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SealKey([u8; SEAL_KEY_LEN]);

impl SealKey {
    #[cfg(test)]
    pub(crate) fn from_bytes(bytes: [u8; SEAL_KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; SEAL_KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for SealKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SealKey(<redacted>)")
    }
}

/// Derive the seal key: SHA-256 of the constant seed, truncated to the
/// cipher's key length.
pub fn derive_seal_key() -> SealKey {
    let mut digest = Sha256::digest(SEAL_KEY_SEED);
    let mut key = [0u8; SEAL_KEY_LEN];
    key.copy_from_slice(&digest[..SEAL_KEY_LEN]);
    digest.as_mut_slice().zeroize();
    SealKey(key)
}
