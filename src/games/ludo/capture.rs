//! Capture resolution for a token landing on the shared ring.

use serde::{Deserialize, Serialize};

use super::board::{cell_of, BASE_STEPS};
use super::types::{Color, Players, Room};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capture {
    pub color: Color,
    pub token: usize,
}

/// Opposing tokens that `mover` would send back to base by landing on
/// `new_steps`. Landings on the home stretch never capture, and a color
/// never captures its own tokens.
pub fn find_captures(room: &Room, mover: Color, new_steps: i8) -> Vec<Capture> {
    let Some(landing) = cell_of(mover, new_steps) else {
        return Vec::new();
    };

    let mut captures = Vec::new();
    for &other in room.active_colors.iter().filter(|&&c| c != mover) {
        for (token, t) in room.players[other].tokens.iter().enumerate() {
            if cell_of(other, t.steps) == Some(landing) {
                captures.push(Capture { color: other, token });
            }
        }
    }
    captures
}

pub fn apply_captures(players: &mut Players, captures: &[Capture]) {
    for capture in captures {
        players[capture.color].tokens[capture.token].steps = BASE_STEPS;
    }
}
