//! Bot strategy trait and implementations.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::games::ludo::board::{is_in_base, FINISH_STEPS};
use crate::games::ludo::capture::find_captures;
use crate::games::ludo::moves::target_steps;
use crate::games::ludo::{Color, Room};

pub const STRATEGY_NAMES: [&str; 2] = ["random", "greedy"];

/// A bot strategy picks which token to move once the dice is known.
/// `legal` is never empty.
pub trait BotStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn choose_token(
        &self,
        room: &Room,
        color: Color,
        dice: u8,
        legal: &[usize],
        rng: &mut StdRng,
    ) -> usize;
}

/// Picks a uniformly random legal token.
pub struct RandomStrategy;

impl BotStrategy for RandomStrategy {
    fn name(&self) -> &str {
        "random"
    }

    fn choose_token(
        &self,
        _room: &Room,
        _color: Color,
        _dice: u8,
        legal: &[usize],
        rng: &mut StdRng,
    ) -> usize {
        legal.choose(rng).copied().unwrap_or(0)
    }
}

/// Capture first, then finish a token, then leave base, then push the
/// token that lands furthest along.
pub struct GreedyStrategy;

impl GreedyStrategy {
    fn score(room: &Room, color: Color, dice: u8, token: usize) -> i32 {
        let from = room.players[color].tokens[token].steps;
        let Some(to) = target_steps(from, dice) else {
            return i32::MIN;
        };
        let mut score = to as i32;
        score += 100 * find_captures(room, color, to).len() as i32;
        if to == FINISH_STEPS {
            score += 60;
        }
        if is_in_base(from) {
            score += 40;
        }
        score
    }
}

impl BotStrategy for GreedyStrategy {
    fn name(&self) -> &str {
        "greedy"
    }

    fn choose_token(
        &self,
        room: &Room,
        color: Color,
        dice: u8,
        legal: &[usize],
        _rng: &mut StdRng,
    ) -> usize {
        // max_by_key keeps the last maximum; iterate in reverse so ties go to the lowest index
        legal
            .iter()
            .rev()
            .copied()
            .max_by_key(|&token| Self::score(room, color, dice, token))
            .unwrap_or(0)
    }
}

pub fn strategy_from_name(name: &str) -> Option<Box<dyn BotStrategy>> {
    match name.trim().to_ascii_lowercase().as_str() {
        "random" => Some(Box::new(RandomStrategy)),
        "greedy" => Some(Box::new(GreedyStrategy)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::ludo::board::{cell_of, BASE_STEPS};
    use rand::SeedableRng;

    fn two_player_room() -> Room {
        let room = Room::new(2);
        let room = room.join(Color::Red).unwrap().room;
        room.join(Color::Blue).unwrap().room
    }

    #[test]
    fn test_random_stays_within_legal() {
        let room = two_player_room();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let token = RandomStrategy.choose_token(&room, Color::Red, 6, &[1, 3], &mut rng);
            assert!(token == 1 || token == 3);
        }
    }

    #[test]
    fn test_greedy_prefers_capture() {
        let mut room = two_player_room();
        room.players[Color::Red].tokens[0].steps = 40;
        room.players[Color::Red].tokens[1].steps = 10;
        // blue sits four cells ahead of red token 1
        let target_cell = cell_of(Color::Red, 14).unwrap() as i8;
        room.players[Color::Blue].tokens[0].steps = (target_cell - 13 + 52) % 52;

        let mut rng = StdRng::seed_from_u64(0);
        let token = GreedyStrategy.choose_token(&room, Color::Red, 4, &[0, 1], &mut rng);
        assert_eq!(token, 1);
    }

    #[test]
    fn test_greedy_leaves_base_over_small_step() {
        let mut room = two_player_room();
        room.players[Color::Red].tokens[0].steps = 2;
        room.players[Color::Red].tokens[1].steps = BASE_STEPS;
        let mut rng = StdRng::seed_from_u64(0);
        let token = GreedyStrategy.choose_token(&room, Color::Red, 6, &[0, 1], &mut rng);
        assert_eq!(token, 1);
    }

    #[test]
    fn test_strategy_lookup() {
        for name in STRATEGY_NAMES {
            assert_eq!(strategy_from_name(name).unwrap().name(), name);
        }
        assert_eq!(strategy_from_name(" Greedy ").unwrap().name(), "greedy");
        assert!(strategy_from_name("mcts").is_none());
    }
}
