//! Ludo core types: colors, tokens, players and the shared room document.

use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::board::{BASE_STEPS, FINISH_STEPS};

pub const TOKENS_PER_PLAYER: usize = 4;
pub const MIN_PLAYERS: u8 = 2;
pub const MAX_PLAYERS: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Blue,
    Green,
    Yellow,
}

impl Color {
    /// Canonical seating order. Also the order free colors are handed out in.
    pub const ALL: [Color; 4] = [Color::Red, Color::Blue, Color::Green, Color::Yellow];

    pub fn as_str(self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Blue => "blue",
            Color::Green => "green",
            Color::Yellow => "yellow",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown color '{0}'")]
pub struct UnknownColor(pub String);

impl FromStr for Color {
    type Err = UnknownColor;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "red" => Ok(Color::Red),
            "blue" => Ok(Color::Blue),
            "green" => Ok(Color::Green),
            "yellow" => Ok(Color::Yellow),
            _ => Err(UnknownColor(value.to_string())),
        }
    }
}

/// A single token. `steps` is the only source of truth for its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub steps: i8,
}

impl Token {
    pub const fn in_base() -> Self {
        Self { steps: BASE_STEPS }
    }

    pub fn is_finished(&self) -> bool {
        self.steps == FINISH_STEPS
    }
}

impl Default for Token {
    fn default() -> Self {
        Self::in_base()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub tokens: [Token; TOKENS_PER_PLAYER],
    pub is_active: bool,
}

impl Player {
    pub fn finished_count(&self) -> usize {
        self.tokens.iter().filter(|t| t.is_finished()).count()
    }

    pub fn has_finished(&self) -> bool {
        self.tokens.iter().all(Token::is_finished)
    }
}

/// All four colors are always present; a color becomes active when joined.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Players {
    pub red: Player,
    pub blue: Player,
    pub green: Player,
    pub yellow: Player,
}

impl Index<Color> for Players {
    type Output = Player;

    fn index(&self, color: Color) -> &Player {
        match color {
            Color::Red => &self.red,
            Color::Blue => &self.blue,
            Color::Green => &self.green,
            Color::Yellow => &self.yellow,
        }
    }
}

impl IndexMut<Color> for Players {
    fn index_mut(&mut self, color: Color) -> &mut Player {
        match color {
            Color::Red => &mut self.red,
            Color::Blue => &mut self.blue,
            Color::Green => &mut self.green,
            Color::Yellow => &mut self.yellow,
        }
    }
}

/// The shared room document. Always replaced wholesale on commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub players: Players,
    pub current_turn: Option<Color>,
    pub dice_value: Option<u8>,
    pub forced_value: Option<u8>,
    pub winner: Option<Color>,
    pub active_colors: Vec<Color>,
    pub num_players: u8,
}

impl Room {
    /// Fresh room with every token in base and nobody joined.
    /// `num_players` is not checked here; callers go through `validate_player_count`.
    pub fn new(num_players: u8) -> Self {
        Self {
            players: Players::default(),
            current_turn: None,
            dice_value: None,
            forced_value: None,
            winner: None,
            active_colors: Vec::new(),
            num_players,
        }
    }

    pub fn phase(&self) -> RoomPhase {
        if self.winner.is_some() {
            RoomPhase::GameOver
        } else if self.current_turn.is_none() {
            RoomPhase::WaitingForFirstPlayer
        } else if self.dice_value.is_some() {
            RoomPhase::DiceShown
        } else {
            RoomPhase::AwaitingRoll
        }
    }

    pub fn is_active(&self, color: Color) -> bool {
        self.active_colors.contains(&color)
    }

    pub fn is_full(&self) -> bool {
        self.active_colors.len() >= self.num_players as usize
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            num_players: self.num_players,
            active_colors: self.active_colors.clone(),
            current_turn: self.current_turn,
            dice_value: self.dice_value,
            winner: self.winner,
            finished: self
                .active_colors
                .iter()
                .map(|&c| (c, self.players[c].finished_count()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomPhase {
    WaitingForFirstPlayer,
    AwaitingRoll,
    DiceShown,
    GameOver,
}

/// Lightweight view of a room for listings and CLI output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub num_players: u8,
    pub active_colors: Vec<Color>,
    pub current_turn: Option<Color>,
    pub dice_value: Option<u8>,
    pub winner: Option<Color>,
    /// Finished tokens per active color, in join order.
    pub finished: Vec<(Color, usize)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_room_document_shape() {
        let room = Room::new(3);
        let json = serde_json::to_value(&room).unwrap();
        assert_eq!(json["numPlayers"], 3);
        assert_eq!(json["currentTurn"], serde_json::Value::Null);
        assert_eq!(json["diceValue"], serde_json::Value::Null);
        assert_eq!(json["activeColors"], serde_json::json!([]));
        assert_eq!(json["players"]["yellow"]["tokens"][3]["steps"], -1);
        assert_eq!(json["players"]["red"]["isActive"], false);

        let back: Room = serde_json::from_value(json).unwrap();
        assert_eq!(back, room);
    }

    #[test]
    fn test_phase_derivation() {
        let mut room = Room::new(2);
        assert_eq!(room.phase(), RoomPhase::WaitingForFirstPlayer);
        room.current_turn = Some(Color::Blue);
        assert_eq!(room.phase(), RoomPhase::AwaitingRoll);
        room.dice_value = Some(4);
        assert_eq!(room.phase(), RoomPhase::DiceShown);
        room.winner = Some(Color::Blue);
        assert_eq!(room.phase(), RoomPhase::GameOver);
    }

    #[test]
    fn test_color_parsing_is_case_insensitive() {
        assert_eq!("Yellow".parse::<Color>(), Ok(Color::Yellow));
        assert_eq!(" red ".parse::<Color>(), Ok(Color::Red));
        assert!("purple".parse::<Color>().is_err());
    }

    #[test]
    fn test_summary_counts_finished_tokens() {
        let mut room = Room::new(2);
        room.active_colors = vec![Color::Green, Color::Red];
        room.players[Color::Green].tokens[0].steps = FINISH_STEPS;
        room.players[Color::Green].tokens[2].steps = FINISH_STEPS;
        let summary = room.summary();
        assert_eq!(summary.finished, vec![(Color::Green, 2), (Color::Red, 0)]);
    }
}
