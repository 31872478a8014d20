// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Protected account state and its fixed plaintext layout.
//!
//! ## Plaintext Layout
//!
//! ```text
//! offset  len  field
//!      0   32  account name (UTF-8, NUL padded)
//!     32    8  balance (i64 LE)
//!     40    8  transaction count (u64 LE)
//!     48   16  zero padding
//!     64    8  saved runtime counter (u64 LE)
//! ```
//!
//! The layout is not length-prefixed. Sealer and unsealer agree on
//! [`PLAINTEXT_LEN`] at compile time.

use serde::Serialize;
use thiserror::Error;

/// Capacity of the name field, including the terminating NUL.
pub const NAME_CAPACITY: usize = 32;

/// Name given to the account on first initialization.
pub const DEFAULT_ACCOUNT_NAME: &str = "John's Account";

const BALANCE_OFFSET: usize = NAME_CAPACITY;
const TX_COUNT_OFFSET: usize = BALANCE_OFFSET + 8;
const PADDING_OFFSET: usize = TX_COUNT_OFFSET + 8;
const PADDING_LEN: usize = 16;

/// Serialized size of an [`AccountRecord`].
pub const RECORD_LEN: usize = PADDING_OFFSET + PADDING_LEN;

/// Serialized size of a record followed by the saved counter.
pub const PLAINTEXT_LEN: usize = RECORD_LEN + 8;

/// Reasons a plaintext cannot be interpreted as an account record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("account name longer than {max} bytes")]
    NameTooLong { max: usize },

    #[error("account name contains a NUL byte")]
    NameContainsNul,

    #[error("account name is not valid UTF-8")]
    NameNotUtf8,

    #[error("record padding is not zero")]
    NonZeroPadding,
}

/// Fixed-capacity account name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountName(String);

impl AccountName {
    /// Longest name that fits the field next to its NUL terminator.
    pub const MAX_LEN: usize = NAME_CAPACITY - 1;

    pub fn new(name: impl Into<String>) -> Result<Self, RecordError> {
        let name = name.into();
        if name.len() > Self::MAX_LEN {
            return Err(RecordError::NameTooLong { max: Self::MAX_LEN });
        }
        if name.as_bytes().contains(&0) {
            return Err(RecordError::NameContainsNul);
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn to_field(&self) -> [u8; NAME_CAPACITY] {
        let mut field = [0u8; NAME_CAPACITY];
        field[..self.0.len()].copy_from_slice(self.0.as_bytes());
        field
    }

    fn from_field(field: &[u8]) -> Result<Self, RecordError> {
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        if end > Self::MAX_LEN || field[end..].iter().any(|&b| b != 0) {
            return Err(RecordError::NameTooLong { max: Self::MAX_LEN });
        }
        let name = std::str::from_utf8(&field[..end]).map_err(|_| RecordError::NameNotUtf8)?;
        Ok(Self(name.to_string()))
    }
}

impl Default for AccountName {
    fn default() -> Self {
        Self(DEFAULT_ACCOUNT_NAME.to_string())
    }
}

impl std::fmt::Display for AccountName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The protected account state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccountRecord {
    pub name: AccountName,
    pub balance: i64,
    pub transaction_count: u64,
}

impl AccountRecord {
    pub fn copy_out(&self) -> AccountInfo {
        AccountInfo {
            name: self.name.as_str().to_string(),
            balance: self.balance,
            transaction_count: self.transaction_count,
        }
    }
}

/// Copy of the account state handed across the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountInfo {
    pub name: String,
    pub balance: i64,
    pub transaction_count: u64,
}

/// Serialize a record and its saved counter into the sealed plaintext.
pub fn encode_plaintext(record: &AccountRecord, counter: u64) -> [u8; PLAINTEXT_LEN] {
    let mut buf = [0u8; PLAINTEXT_LEN];
    buf[..NAME_CAPACITY].copy_from_slice(&record.name.to_field());
    buf[BALANCE_OFFSET..TX_COUNT_OFFSET].copy_from_slice(&record.balance.to_le_bytes());
    buf[TX_COUNT_OFFSET..PADDING_OFFSET].copy_from_slice(&record.transaction_count.to_le_bytes());
    buf[RECORD_LEN..].copy_from_slice(&counter.to_le_bytes());
    buf
}

/// Parse the sealed plaintext back into a record and its saved counter.
pub fn decode_plaintext(buf: &[u8; PLAINTEXT_LEN]) -> Result<(AccountRecord, u64), RecordError> {
    if buf[PADDING_OFFSET..RECORD_LEN].iter().any(|&b| b != 0) {
        return Err(RecordError::NonZeroPadding);
    }

    let name = AccountName::from_field(&buf[..NAME_CAPACITY])?;
    let balance = i64::from_le_bytes(le_word(&buf[BALANCE_OFFSET..TX_COUNT_OFFSET]));
    let transaction_count = u64::from_le_bytes(le_word(&buf[TX_COUNT_OFFSET..PADDING_OFFSET]));
    let counter = u64::from_le_bytes(le_word(&buf[RECORD_LEN..]));

    Ok((
        AccountRecord {
            name,
            balance,
            transaction_count,
        },
        counter,
    ))
}

fn le_word(bytes: &[u8]) -> [u8; 8] {
    let mut word = [0u8; 8];
    word.copy_from_slice(bytes);
    word
}
