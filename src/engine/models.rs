//! Sync-layer data types shared by the store, the sessions and the binaries.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::engine::error::{LinkError, RoomIdError};
use crate::games::ludo::{Color, Rejection, Room, RoomEvent};

pub const ROOM_ID_MAX_LEN: usize = 64;
pub const DEFAULT_NUM_PLAYERS: u8 = 4;

/// Opaque, creator-chosen room key. Restricted to characters that survive a
/// query string unescaped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(String);

impl RoomId {
    pub fn parse(value: &str) -> Result<Self, RoomIdError> {
        if value.is_empty() {
            return Err(RoomIdError::Empty);
        }
        if value.len() > ROOM_ID_MAX_LEN {
            return Err(RoomIdError::TooLong {
                max: ROOM_ID_MAX_LEN,
                found: value.len(),
            });
        }
        if let Some((index, ch)) = value
            .chars()
            .enumerate()
            .find(|(_, ch)| !(ch.is_ascii_alphanumeric() || *ch == '-' || *ch == '_'))
        {
            return Err(RoomIdError::InvalidCharacter { ch, index });
        }
        Ok(Self(value.to_string()))
    }

    /// For values built from the allowed alphabet only.
    pub(crate) fn from_valid(value: String) -> Self {
        debug_assert!(Self::parse(&value).is_ok());
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RoomId {
    type Err = RoomIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for RoomId {
    type Error = RoomIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomId> for String {
    fn from(id: RoomId) -> Self {
        id.0
    }
}

/// A committed room document together with the version the store assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u64,
    pub room: Room,
}

/// Condition a write must satisfy to commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// The document must not exist yet.
    Absent,
    /// The stored document must still be at this version.
    Version(u64),
}

impl Precondition {
    pub fn for_base(base: Option<&Snapshot>) -> Self {
        base.map_or(Precondition::Absent, |s| Precondition::Version(s.version))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Committed(Snapshot),
    /// The precondition no longer held; carries what is stored now.
    Conflict(Option<Snapshot>),
}

/// Result of a client action that did not fail on the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Committed {
        snapshot: Snapshot,
        events: Vec<RoomEvent>,
    },
    /// Refused locally; nothing was written.
    Rejected(Rejection),
    /// Another writer committed first. The caller should reconcile to the
    /// latest snapshot rather than retry blindly.
    Superseded(Option<Snapshot>),
}

impl Outcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Outcome::Committed { .. })
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            Outcome::Committed { snapshot, .. } => Some(snapshot),
            Outcome::Superseded(latest) => latest.as_ref(),
            Outcome::Rejected(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub room_id: RoomId,
    pub requested_color: Option<Color>,
    pub num_players: u8,
}

/// Shareable address of a seat in a room:
/// `?player=<color>&room=<id>&numPlayers=<n>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomLink {
    pub color: Color,
    pub room_id: RoomId,
    pub num_players: u8,
}

impl RoomLink {
    pub fn to_join_request(&self) -> JoinRequest {
        JoinRequest {
            room_id: self.room_id.clone(),
            requested_color: Some(self.color),
            num_players: self.num_players,
        }
    }
}

impl fmt::Display for RoomLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "?player={}&room={}&numPlayers={}",
            self.color, self.room_id, self.num_players
        )
    }
}

impl FromStr for RoomLink {
    type Err = LinkError;

    /// Accepts a bare query (with or without `?`) or a full URL. An unknown
    /// color falls back to red; a missing player count means four.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let query = match value.split_once('?') {
            Some((_, query)) => query,
            None => value,
        };

        let mut color = Color::Red;
        let mut room_id = None;
        let mut num_players = DEFAULT_NUM_PLAYERS;
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, val) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                "player" => color = val.parse().unwrap_or(Color::Red),
                "room" => room_id = Some(RoomId::parse(val)?),
                "numPlayers" => {
                    num_players = val
                        .parse()
                        .map_err(|_| LinkError::InvalidPlayerCount(val.to_string()))?;
                }
                _ => {}
            }
        }

        Ok(Self {
            color,
            room_id: room_id.ok_or(LinkError::MissingRoom)?,
            num_players,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_id_validation() {
        assert!(RoomId::parse("room-abc123").is_ok());
        assert_eq!(RoomId::parse(""), Err(RoomIdError::Empty));
        assert_eq!(
            RoomId::parse("bad room"),
            Err(RoomIdError::InvalidCharacter { ch: ' ', index: 3 })
        );
        assert!(matches!(
            RoomId::parse(&"x".repeat(65)),
            Err(RoomIdError::TooLong { max: 64, found: 65 })
        ));
    }

    #[test]
    fn test_link_parses_full_url() {
        let link: RoomLink = "https://ludo.example/?player=green&room=room-xyz&numPlayers=3"
            .parse()
            .unwrap();
        assert_eq!(link.color, Color::Green);
        assert_eq!(link.room_id.as_str(), "room-xyz");
        assert_eq!(link.num_players, 3);
        assert_eq!(link.to_string(), "?player=green&room=room-xyz&numPlayers=3");
    }

    #[test]
    fn test_link_defaults() {
        let link: RoomLink = "room=abc&player=PURPLE".parse().unwrap();
        assert_eq!(link.color, Color::Red);
        assert_eq!(link.num_players, DEFAULT_NUM_PLAYERS);

        let request = link.to_join_request();
        assert_eq!(request.requested_color, Some(Color::Red));
    }

    #[test]
    fn test_link_errors() {
        assert_eq!("?player=red".parse::<RoomLink>(), Err(LinkError::MissingRoom));
        assert_eq!(
            "?room=abc&numPlayers=many".parse::<RoomLink>(),
            Err(LinkError::InvalidPlayerCount("many".into()))
        );
    }

    #[test]
    fn test_precondition_for_base() {
        assert_eq!(Precondition::for_base(None), Precondition::Absent);
        let snapshot = Snapshot { version: 9, room: Room::new(2) };
        assert_eq!(Precondition::for_base(Some(&snapshot)), Precondition::Version(9));
    }
}
