// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use crate::protocol::{ProtocolError, Response, ResponseTag};

/// A failed command, rendered to the client as a tagged response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostError {
    pub tag: ResponseTag,
    pub message: String,
}

impl HostError {
    pub fn new(tag: ResponseTag, message: impl Into<String>) -> Self {
        Self {
            tag,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ResponseTag::Error, message)
    }

    pub fn replay() -> Self {
        Self::new(ResponseTag::Replay, "Replay attack detected")
    }

    /// Authentication and format failures share one message so the client
    /// cannot tell them apart.
    pub fn load_failed() -> Self {
        Self::error("Load failed")
    }

    pub fn cannot_open_file() -> Self {
        Self::error("Cannot open file")
    }

    pub fn incomplete() -> Self {
        Self::error("Incomplete command")
    }

    pub fn not_persisted(reason: impl std::fmt::Display) -> Self {
        Self::error(format!("State not persisted: {reason}"))
    }

    pub fn into_response(self) -> Response {
        match self.tag {
            ResponseTag::Replay => Response::Replay(self.message),
            ResponseTag::Ok | ResponseTag::Error => Response::Error(self.message),
        }
    }
}

impl From<ProtocolError> for HostError {
    fn from(e: ProtocolError) -> Self {
        Self::error(e.to_string())
    }
}
