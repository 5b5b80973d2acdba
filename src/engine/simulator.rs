//! Synchronous game simulator: plays a room to completion on the pure rules,
//! without a store. Used by the arena and the benchmarks.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::engine::bot_strategy::BotStrategy;
use crate::games::ludo::{validate_player_count, Color, Rejection, Room, RoomEvent};

/// Upper bound on rolls before a game is abandoned. A real game needs a few
/// hundred at most.
pub const MAX_ROLLS: usize = 20_000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GameRecord {
    pub winner: Option<Color>,
    /// Seat colors in join order.
    pub seats: Vec<Color>,
    pub rolls: usize,
    pub moves: usize,
    pub captures: usize,
    pub skips: usize,
}

impl GameRecord {
    fn count(&mut self, events: &[RoomEvent]) {
        for event in events {
            match event {
                RoomEvent::DiceRolled { .. } => self.rolls += 1,
                RoomEvent::TokenMoved { .. } => self.moves += 1,
                RoomEvent::TokenCaptured { .. } => self.captures += 1,
                RoomEvent::TurnSkipped { .. } => self.skips += 1,
                _ => {}
            }
        }
    }
}

/// Seat one strategy per color (canonical order) and play until someone wins.
pub fn play_one_game(
    strategies: &[&dyn BotStrategy],
    seed: u64,
) -> Result<GameRecord, Rejection> {
    let num_players = strategies.len() as u8;
    let mut room = Room::new(validate_player_count(num_players)?);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut record = GameRecord::default();

    for color in Color::ALL.into_iter().take(strategies.len()) {
        room = room.join(color)?.room;
    }
    record.seats = room.active_colors.clone();

    while room.winner.is_none() && record.rolls < MAX_ROLLS {
        let color = room.current_turn.ok_or(Rejection::NoCurrentTurn)?;
        let rolled = room.roll(color, &mut rng)?;
        record.count(&rolled.events);
        room = rolled.room;

        let legal = room.pending_moves();
        let next = if legal.is_empty() {
            room.skip(color)?
        } else {
            let seat = seat_index(&room, color);
            let dice = room.dice_value.ok_or(Rejection::DiceNotRolled)?;
            let token = strategies[seat].choose_token(&room, color, dice, &legal, &mut rng);
            room.move_token(color, token)?
        };
        record.count(&next.events);
        room = next.room;
    }

    record.winner = room.winner;
    Ok(record)
}

fn seat_index(room: &Room, color: Color) -> usize {
    room.active_colors.iter().position(|&c| c == color).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::bot_strategy::{GreedyStrategy, RandomStrategy};

    #[test]
    fn test_games_finish_with_a_winner() {
        for seed in 0..10 {
            let record = play_one_game(&[&RandomStrategy, &GreedyStrategy], seed).unwrap();
            assert!(record.winner.is_some(), "seed {seed} did not finish");
            assert!(record.moves > 0);
            assert_eq!(record.seats, vec![Color::Red, Color::Blue]);
        }
    }

    #[test]
    fn test_same_seed_same_game() {
        let strategies: [&dyn BotStrategy; 3] = [&RandomStrategy, &RandomStrategy, &GreedyStrategy];
        let a = play_one_game(&strategies, 99).unwrap();
        let b = play_one_game(&strategies, 99).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_table_size() {
        assert_eq!(
            play_one_game(&[&RandomStrategy], 0),
            Err(Rejection::InvalidPlayerCount(1))
        );
    }
}
