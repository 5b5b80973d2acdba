//! Error types for the sync layer, the session API and configuration.

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::models::RoomId;
use crate::games::ludo::{Color, Rejection};

/// Failures of the shared store itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store cannot be reached. The write may be retried.
    #[error("room store unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by [`crate::engine::session::ClientSession`] and the lobby.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error("room {room_id} is full")]
    RoomFull { room_id: RoomId },

    #[error("player count must be between 2 and 4, got {0}")]
    InvalidPlayerCount(u8),

    #[error("room {room_id} does not exist")]
    RoomMissing { room_id: RoomId },

    #[error("{color} has not joined room {room_id}")]
    NotJoined { room_id: RoomId, color: Color },

    /// Gave up after losing the race to other writers this many times.
    #[error("room {room_id} is contended, gave up after {attempts} attempts")]
    Contended { room_id: RoomId, attempts: u32 },
}

impl SessionError {
    /// Whether the same request may succeed if issued again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SessionError::Store(_) | SessionError::Contended { .. })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid setting {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomIdError {
    #[error("room id is empty")]
    Empty,
    #[error("room id is {found} characters long, max is {max}")]
    TooLong { max: usize, found: usize },
    #[error("room id contains '{ch}' at position {index}")]
    InvalidCharacter { ch: char, index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("link has no room parameter")]
    MissingRoom,
    #[error(transparent)]
    InvalidRoom(#[from] RoomIdError),
    #[error("numPlayers '{0}' is not a number")]
    InvalidPlayerCount(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let room_id = RoomId::parse("r1").unwrap();
        assert!(SessionError::Store(StoreError::Unavailable("down".into())).is_retryable());
        assert!(SessionError::Contended { room_id: room_id.clone(), attempts: 8 }.is_retryable());
        assert!(!SessionError::RoomFull { room_id: room_id.clone() }.is_retryable());
        assert!(!SessionError::RoomMissing { room_id }.is_retryable());
        assert!(!SessionError::Rejected(Rejection::DiceAlreadyRolled).is_retryable());
    }

    #[test]
    fn test_messages() {
        let room_id = RoomId::parse("room-1").unwrap();
        assert_eq!(SessionError::RoomFull { room_id }.to_string(), "room room-1 is full");
        assert_eq!(
            LinkError::InvalidPlayerCount("x".into()).to_string(),
            "numPlayers 'x' is not a number"
        );
    }
}
