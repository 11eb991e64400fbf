use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::PageState;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MessageKind {
    Sync,
    Update,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Update => "update",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire envelope. Both kinds carry a complete state snapshot; they differ
/// only in direction:
///
/// - `sync`: peer -> page, authoritative snapshot
/// - `update`: page -> peer, full state after a local edit
///
/// Serialized as `{"type": "sync" | "update", "content": ...}`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum Message<T = PageState> {
    Sync(T),
    Update(T),
}

impl<T> Message<T> {
    pub fn update(content: T) -> Self {
        Self::Update(content)
    }

    pub fn sync(content: T) -> Self {
        Self::Sync(content)
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Sync(_) => MessageKind::Sync,
            Self::Update(_) => MessageKind::Update,
        }
    }

    pub fn content(&self) -> &T {
        match self {
            Self::Sync(content) | Self::Update(content) => content,
        }
    }

    pub fn into_content(self) -> T {
        match self {
            Self::Sync(content) | Self::Update(content) => content,
        }
    }

    /// Re-tags the same content as an authoritative snapshot.
    pub fn into_sync(self) -> Self {
        Self::Sync(self.into_content())
    }
}

pub fn encode<T: Serialize>(
    message: &Message<T>,
) -> Result<String, ProtocolError> {
    serde_json::to_string(message).map_err(ProtocolError::Encode)
}

pub fn decode<T: DeserializeOwned>(
    raw: &str,
) -> Result<Message<T>, ProtocolError> {
    serde_json::from_str(raw).map_err(ProtocolError::Decode)
}
