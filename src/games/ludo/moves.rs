//! Move validation: which tokens may move for a rolled value.

use super::board::{is_in_base, FINISH_STEPS};
use super::types::{Color, Room};

pub const DICE_FACES: u8 = 6;
/// Value needed to bring a token out of base.
pub const ENTRY_ROLL: u8 = 6;

pub fn is_valid_dice(value: u8) -> bool {
    (1..=DICE_FACES).contains(&value)
}

/// Landing `steps` for a token at `steps` moved by `dice`, or `None` if the
/// move is illegal. Overshooting the finish is illegal (no bounce back).
pub fn target_steps(steps: i8, dice: u8) -> Option<i8> {
    if !is_valid_dice(dice) {
        return None;
    }
    if is_in_base(steps) {
        return (dice == ENTRY_ROLL).then_some(0);
    }
    if steps < 0 || steps >= FINISH_STEPS {
        return None;
    }
    let target = steps + dice as i8;
    (target <= FINISH_STEPS).then_some(target)
}

/// Indices of `color`'s tokens that can legally move `dice`, ascending.
pub fn legal_moves(room: &Room, color: Color, dice: u8) -> Vec<usize> {
    room.players[color]
        .tokens
        .iter()
        .enumerate()
        .filter(|(_, token)| target_steps(token.steps, dice).is_some())
        .map(|(idx, _)| idx)
        .collect()
}

pub fn has_legal_move(room: &Room, color: Color, dice: u8) -> bool {
    room.players[color]
        .tokens
        .iter()
        .any(|token| target_steps(token.steps, dice).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::ludo::board::BASE_STEPS;
    use proptest::prelude::*;

    fn room_with(color: Color, steps: [i8; 4]) -> Room {
        let mut room = Room::new(4);
        for (token, s) in room.players[color].tokens.iter_mut().zip(steps) {
            token.steps = s;
        }
        room
    }

    #[test]
    fn test_base_token_needs_six() {
        for dice in 1..=5 {
            assert_eq!(target_steps(BASE_STEPS, dice), None);
        }
        assert_eq!(target_steps(BASE_STEPS, 6), Some(0));
    }

    #[test]
    fn test_overshoot_is_illegal() {
        assert_eq!(target_steps(55, 4), None);
        assert_eq!(target_steps(55, 3), Some(58));
        assert_eq!(target_steps(58, 1), None);
    }

    #[test]
    fn test_entering_home_stretch() {
        assert_eq!(target_steps(50, 5), Some(55));
    }

    #[test]
    fn test_all_in_base_without_six_has_no_moves() {
        let room = Room::new(4);
        assert!(legal_moves(&room, Color::Red, 3).is_empty());
        assert!(!has_legal_move(&room, Color::Red, 3));
        assert_eq!(legal_moves(&room, Color::Red, 6), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_mixed_tokens() {
        let room = room_with(Color::Blue, [BASE_STEPS, 10, 56, 58]);
        assert_eq!(legal_moves(&room, Color::Blue, 2), vec![1, 2]);
        assert_eq!(legal_moves(&room, Color::Blue, 3), vec![1]);
        assert_eq!(legal_moves(&room, Color::Blue, 6), vec![0, 1]);
    }

    #[test]
    fn test_invalid_dice_values() {
        let room = room_with(Color::Red, [0, 1, 2, 3]);
        assert!(legal_moves(&room, Color::Red, 0).is_empty());
        assert!(legal_moves(&room, Color::Red, 7).is_empty());
    }

    proptest! {
        #[test]
        fn prop_target_never_passes_finish(steps in BASE_STEPS..=FINISH_STEPS, dice in 1u8..=6) {
            if let Some(target) = target_steps(steps, dice) {
                prop_assert!(target <= FINISH_STEPS);
                prop_assert!(target >= 0);
            }
        }

        #[test]
        fn prop_base_token_moves_only_on_six(dice in 1u8..=6) {
            prop_assert_eq!(target_steps(BASE_STEPS, dice).is_some(), dice == 6);
        }
    }
}
