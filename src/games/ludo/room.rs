//! Room state machine. Every transition is a pure function from the current
//! room to a brand-new room plus the events it produced; the input is never
//! mutated, so a caller can publish the result as one conditional write.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::capture::{apply_captures, find_captures};
use super::moves::{has_legal_move, is_valid_dice, legal_moves, target_steps, DICE_FACES, ENTRY_ROLL};
use super::turns::next_player;
use super::types::{Color, Room, MAX_PLAYERS, MIN_PLAYERS};

/// Why a transition was refused. These are contract violations caught
/// locally before anything is written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("player count must be between 2 and 4, got {0}")]
    InvalidPlayerCount(u8),
    #[error("room already has all {num_players} players")]
    RoomFull { num_players: u8 },
    #[error("{0} has already joined")]
    ColorTaken(Color),
    #[error("nobody has joined yet")]
    NoCurrentTurn,
    #[error("it is {current}'s turn, not {attempted}'s")]
    NotYourTurn { current: Color, attempted: Color },
    #[error("{winner} has already won")]
    GameOver { winner: Color },
    #[error("the dice has already been rolled")]
    DiceAlreadyRolled,
    #[error("the dice has not been rolled yet")]
    DiceNotRolled,
    #[error("token {token} cannot move {dice}")]
    IllegalMove { token: usize, dice: u8 },
    #[error("a legal move exists for {dice}, the turn cannot be skipped")]
    MoveAvailable { dice: u8 },
    #[error("forced value must be between 1 and 6, got {0}")]
    InvalidForcedValue(u8),
    #[error("cheat mode is locked")]
    CheatLocked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RoomEvent {
    PlayerJoined { color: Color },
    DiceRolled { color: Color, value: u8, forced: bool },
    TokenMoved { color: Color, token: usize, from: i8, to: i8 },
    TokenCaptured { by: Color, color: Color, token: usize },
    ExtraTurn { color: Color },
    TurnPassed { from: Color, to: Color },
    TurnSkipped { color: Color, dice: u8 },
    ForcedValueSet { color: Color, value: u8 },
    GameWon { color: Color },
    RoomRestarted { num_players: u8 },
}

/// A computed next room, ready to be published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub room: Room,
    pub events: Vec<RoomEvent>,
}

pub fn validate_player_count(num_players: u8) -> Result<u8, Rejection> {
    if (MIN_PLAYERS..=MAX_PLAYERS).contains(&num_players) {
        Ok(num_players)
    } else {
        Err(Rejection::InvalidPlayerCount(num_players))
    }
}

impl Room {
    /// Color a joining client gets: the requested one if free, otherwise the
    /// first free color in canonical order.
    pub fn assign_color(&self, requested: Option<Color>) -> Result<Color, Rejection> {
        if self.is_full() {
            return Err(Rejection::RoomFull { num_players: self.num_players });
        }
        if let Some(color) = requested.filter(|&c| !self.is_active(c)) {
            return Ok(color);
        }
        Color::ALL
            .into_iter()
            .find(|&c| !self.is_active(c))
            .ok_or(Rejection::RoomFull { num_players: self.num_players })
    }

    pub fn join(&self, color: Color) -> Result<Transition, Rejection> {
        if self.is_active(color) {
            return Err(Rejection::ColorTaken(color));
        }
        if self.is_full() {
            return Err(Rejection::RoomFull { num_players: self.num_players });
        }

        let mut room = self.clone();
        room.active_colors.push(color);
        room.players[color].is_active = true;
        if room.current_turn.is_none() {
            room.current_turn = Some(color);
        }
        Ok(Transition {
            room,
            events: vec![RoomEvent::PlayerJoined { color }],
        })
    }

    /// Legal token indices for the pending roll of the current turn.
    pub fn pending_moves(&self) -> Vec<usize> {
        match (self.current_turn, self.dice_value) {
            (Some(color), Some(dice)) if self.winner.is_none() => legal_moves(self, color, dice),
            _ => Vec::new(),
        }
    }

    fn ensure_turn(&self, color: Color) -> Result<(), Rejection> {
        if let Some(winner) = self.winner {
            return Err(Rejection::GameOver { winner });
        }
        match self.current_turn {
            None => Err(Rejection::NoCurrentTurn),
            Some(current) if current != color => Err(Rejection::NotYourTurn {
                current,
                attempted: color,
            }),
            Some(_) => Ok(()),
        }
    }

    pub fn roll<R: Rng>(&self, color: Color, rng: &mut R) -> Result<Transition, Rejection> {
        self.ensure_turn(color)?;
        if self.dice_value.is_some() {
            return Err(Rejection::DiceAlreadyRolled);
        }

        let forced = self.forced_value.filter(|&v| is_valid_dice(v));
        let value = forced.unwrap_or_else(|| rng.gen_range(1..=DICE_FACES));

        let mut room = self.clone();
        room.dice_value = Some(value);
        room.forced_value = None;
        Ok(Transition {
            room,
            events: vec![RoomEvent::DiceRolled {
                color,
                value,
                forced: forced.is_some(),
            }],
        })
    }

    pub fn move_token(&self, color: Color, token: usize) -> Result<Transition, Rejection> {
        self.ensure_turn(color)?;
        let dice = self.dice_value.ok_or(Rejection::DiceNotRolled)?;
        let from = self.players[color]
            .tokens
            .get(token)
            .map(|t| t.steps)
            .ok_or(Rejection::IllegalMove { token, dice })?;
        let to = target_steps(from, dice).ok_or(Rejection::IllegalMove { token, dice })?;

        let mut room = self.clone();
        let mut events = vec![RoomEvent::TokenMoved { color, token, from, to }];

        let captures = find_captures(self, color, to);
        apply_captures(&mut room.players, &captures);
        events.extend(captures.iter().map(|c| RoomEvent::TokenCaptured {
            by: color,
            color: c.color,
            token: c.token,
        }));

        room.players[color].tokens[token].steps = to;
        room.dice_value = None;
        room.forced_value = None;

        if room.players[color].has_finished() {
            room.winner = Some(color);
            events.push(RoomEvent::GameWon { color });
        } else if dice == ENTRY_ROLL || !captures.is_empty() {
            events.push(RoomEvent::ExtraTurn { color });
        } else {
            let next = next_player(color, &room.active_colors);
            room.current_turn = Some(next);
            events.push(RoomEvent::TurnPassed { from: color, to: next });
        }

        Ok(Transition { room, events })
    }

    /// Pass the turn after a roll with no legal move. Never grants a bonus.
    pub fn skip(&self, color: Color) -> Result<Transition, Rejection> {
        self.ensure_turn(color)?;
        let dice = self.dice_value.ok_or(Rejection::DiceNotRolled)?;
        if has_legal_move(self, color, dice) {
            return Err(Rejection::MoveAvailable { dice });
        }

        let mut room = self.clone();
        let next = next_player(color, &room.active_colors);
        room.dice_value = None;
        room.forced_value = None;
        room.current_turn = Some(next);
        Ok(Transition {
            room,
            events: vec![
                RoomEvent::TurnSkipped { color, dice },
                RoomEvent::TurnPassed { from: color, to: next },
            ],
        })
    }

    /// Force the next roll of whoever holds the turn.
    pub fn set_forced_value(&self, value: u8) -> Result<Transition, Rejection> {
        if let Some(winner) = self.winner {
            return Err(Rejection::GameOver { winner });
        }
        let color = self.current_turn.ok_or(Rejection::NoCurrentTurn)?;
        if self.dice_value.is_some() {
            return Err(Rejection::DiceAlreadyRolled);
        }
        if !is_valid_dice(value) {
            return Err(Rejection::InvalidForcedValue(value));
        }

        let mut room = self.clone();
        room.forced_value = Some(value);
        Ok(Transition {
            room,
            events: vec![RoomEvent::ForcedValueSet { color, value }],
        })
    }

    /// A fresh room keeping only the player count. A stored document with
    /// an out-of-range count cannot be restarted.
    pub fn restarted(&self) -> Result<Transition, Rejection> {
        let num_players = validate_player_count(self.num_players)?;
        Ok(Transition {
            room: Room::new(num_players),
            events: vec![RoomEvent::RoomRestarted { num_players }],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::ludo::board::{cell_of, BASE_STEPS, FINISH_STEPS};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn joined(num_players: u8, colors: &[Color]) -> Room {
        colors
            .iter()
            .fold(Room::new(num_players), |room, &c| room.join(c).unwrap().room)
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn with_dice(mut room: Room, dice: u8) -> Room {
        room.dice_value = Some(dice);
        room
    }

    #[test]
    fn test_first_join_takes_turn() {
        let room = joined(4, &[Color::Red]);
        assert_eq!(room.current_turn, Some(Color::Red));
        assert_eq!(room.active_colors, vec![Color::Red]);
        assert!(room.players[Color::Red].is_active);

        let room = room.join(Color::Green).unwrap().room;
        assert_eq!(room.current_turn, Some(Color::Red));
        assert_eq!(room.active_colors, vec![Color::Red, Color::Green]);
    }

    #[test]
    fn test_join_rejections() {
        let room = joined(2, &[Color::Blue]);
        assert_eq!(room.join(Color::Blue), Err(Rejection::ColorTaken(Color::Blue)));
        let full = room.join(Color::Red).unwrap().room;
        assert_eq!(full.join(Color::Green), Err(Rejection::RoomFull { num_players: 2 }));
    }

    #[test]
    fn test_assign_color() {
        let room = joined(4, &[Color::Red, Color::Green]);
        assert_eq!(room.assign_color(Some(Color::Yellow)), Ok(Color::Yellow));
        assert_eq!(room.assign_color(Some(Color::Red)), Ok(Color::Blue));
        assert_eq!(room.assign_color(None), Ok(Color::Blue));

        let full = joined(2, &[Color::Red, Color::Green]);
        assert_eq!(full.assign_color(None), Err(Rejection::RoomFull { num_players: 2 }));
    }

    #[test]
    fn test_roll_uses_and_clears_forced_value() {
        let room = joined(4, &[Color::Red]);
        let room = room.set_forced_value(6).unwrap().room;
        assert_eq!(room.forced_value, Some(6));

        let t = room.roll(Color::Red, &mut rng()).unwrap();
        assert_eq!(t.room.dice_value, Some(6));
        assert_eq!(t.room.forced_value, None);
        assert_eq!(
            t.events,
            vec![RoomEvent::DiceRolled { color: Color::Red, value: 6, forced: true }]
        );
    }

    #[test]
    fn test_random_roll_in_range() {
        let room = joined(2, &[Color::Red, Color::Blue]);
        let mut rng = rng();
        for _ in 0..100 {
            let value = room.roll(Color::Red, &mut rng).unwrap().room.dice_value.unwrap();
            assert!((1..=6).contains(&value));
        }
    }

    #[test]
    fn test_roll_preconditions() {
        let room = Room::new(2);
        assert_eq!(room.roll(Color::Red, &mut rng()), Err(Rejection::NoCurrentTurn));

        let room = joined(2, &[Color::Red, Color::Blue]);
        assert_eq!(
            room.roll(Color::Blue, &mut rng()),
            Err(Rejection::NotYourTurn { current: Color::Red, attempted: Color::Blue })
        );
        let rolled = with_dice(room, 3);
        assert_eq!(rolled.roll(Color::Red, &mut rng()), Err(Rejection::DiceAlreadyRolled));
    }

    #[test]
    fn test_leave_base_on_six_keeps_turn() {
        let room = with_dice(joined(4, &[Color::Red, Color::Blue]), 6);
        let t = room.move_token(Color::Red, 0).unwrap();
        assert_eq!(t.room.players[Color::Red].tokens[0].steps, 0);
        assert_eq!(t.room.current_turn, Some(Color::Red));
        assert_eq!(t.room.dice_value, None);
        assert!(t.events.contains(&RoomEvent::ExtraTurn { color: Color::Red }));
    }

    #[test]
    fn test_plain_move_passes_turn() {
        let mut room = joined(4, &[Color::Red, Color::Blue]);
        room.players[Color::Red].tokens[1].steps = 3;
        let t = with_dice(room, 2).move_token(Color::Red, 1).unwrap();
        assert_eq!(t.room.players[Color::Red].tokens[1].steps, 5);
        assert_eq!(t.room.current_turn, Some(Color::Blue));
    }

    #[test]
    fn test_capture_grants_extra_turn() {
        let mut room = joined(4, &[Color::Red, Color::Blue]);
        room.players[Color::Red].tokens[0].steps = 10;
        let landing = cell_of(Color::Red, 14).unwrap();
        let blue_steps = (0..=51).find(|&s| cell_of(Color::Blue, s) == Some(landing)).unwrap();
        room.players[Color::Blue].tokens[3].steps = blue_steps;

        let t = with_dice(room, 4).move_token(Color::Red, 0).unwrap();
        assert_eq!(t.room.players[Color::Blue].tokens[3].steps, BASE_STEPS);
        assert_eq!(t.room.players[Color::Red].tokens[0].steps, 14);
        assert_eq!(t.room.current_turn, Some(Color::Red));
        assert!(t.events.contains(&RoomEvent::TokenCaptured {
            by: Color::Red,
            color: Color::Blue,
            token: 3
        }));
    }

    #[test]
    fn test_illegal_moves_rejected() {
        let room = joined(2, &[Color::Red, Color::Blue]);
        assert_eq!(room.move_token(Color::Red, 0), Err(Rejection::DiceNotRolled));
        let room = with_dice(room, 3);
        assert_eq!(
            room.move_token(Color::Red, 0),
            Err(Rejection::IllegalMove { token: 0, dice: 3 })
        );
        assert_eq!(
            room.move_token(Color::Red, 9),
            Err(Rejection::IllegalMove { token: 9, dice: 3 })
        );
    }

    #[test]
    fn test_final_token_wins_and_locks_room() {
        let mut room = joined(2, &[Color::Yellow, Color::Red]);
        for token in room.players[Color::Yellow].tokens.iter_mut() {
            token.steps = FINISH_STEPS;
        }
        room.players[Color::Yellow].tokens[2].steps = 55;
        let t = with_dice(room, 3).move_token(Color::Yellow, 2).unwrap();
        assert_eq!(t.room.winner, Some(Color::Yellow));
        assert!(t.events.contains(&RoomEvent::GameWon { color: Color::Yellow }));

        let over = t.room;
        let locked = Rejection::GameOver { winner: Color::Yellow };
        assert_eq!(over.roll(Color::Yellow, &mut rng()), Err(locked.clone()));
        assert_eq!(over.roll(Color::Red, &mut rng()), Err(locked.clone()));
        assert_eq!(with_dice(over.clone(), 1).move_token(Color::Yellow, 0), Err(locked.clone()));
        assert_eq!(over.set_forced_value(4), Err(locked));

        let fresh = over.restarted().unwrap().room;
        assert_eq!(fresh, Room::new(2));
    }

    #[test]
    fn test_restart_rejects_out_of_range_player_count() {
        let mut room = Room::new(4);
        room.num_players = 200;
        assert_eq!(room.restarted(), Err(Rejection::InvalidPlayerCount(200)));

        let decoded: Room = serde_json::from_value({
            let mut json = serde_json::to_value(Room::new(2)).unwrap();
            json["numPlayers"] = serde_json::json!(1);
            json
        })
        .unwrap();
        assert_eq!(decoded.restarted(), Err(Rejection::InvalidPlayerCount(1)));
    }

    #[test]
    fn test_skip_only_without_moves() {
        let room = joined(3, &[Color::Red, Color::Green]);
        let t = with_dice(room.clone(), 2).skip(Color::Red).unwrap();
        assert_eq!(t.room.current_turn, Some(Color::Green));
        assert_eq!(t.room.dice_value, None);

        assert_eq!(with_dice(room, 6).skip(Color::Red), Err(Rejection::MoveAvailable { dice: 6 }));
    }

    #[test]
    fn test_forced_value_validation() {
        let room = joined(2, &[Color::Red]);
        assert_eq!(room.set_forced_value(0), Err(Rejection::InvalidForcedValue(0)));
        assert_eq!(room.set_forced_value(7), Err(Rejection::InvalidForcedValue(7)));
        assert_eq!(with_dice(room, 2).set_forced_value(3), Err(Rejection::DiceAlreadyRolled));
        assert_eq!(Room::new(2).set_forced_value(3), Err(Rejection::NoCurrentTurn));
    }

    #[test]
    fn test_pending_moves() {
        let room = joined(2, &[Color::Red, Color::Blue]);
        assert!(room.pending_moves().is_empty());
        assert_eq!(with_dice(room, 6).pending_moves(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_validate_player_count() {
        assert_eq!(validate_player_count(1), Err(Rejection::InvalidPlayerCount(1)));
        assert_eq!(validate_player_count(2), Ok(2));
        assert_eq!(validate_player_count(4), Ok(4));
        assert_eq!(validate_player_count(5), Err(Rejection::InvalidPlayerCount(5)));
    }
}
