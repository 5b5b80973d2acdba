//! Board geometry: maps a token's `steps` counter to a cell.
//!
//! Progress layout for every color:
//! - `-1`: in base
//! - `0..=51`: on the shared ring, counted from the color's entry cell
//! - `52..=57`: on the color's private home stretch
//! - `58`: finished

use super::types::Color;

pub const RING_CELLS: i8 = 52;
pub const HOME_STEPS: i8 = 6;
pub const BASE_STEPS: i8 = -1;
pub const LAST_RING_STEP: i8 = RING_CELLS - 1;
pub const FINISH_STEPS: i8 = RING_CELLS + HOME_STEPS;

/// Ring cell each color enters on, evenly spaced.
pub fn entry_offset(color: Color) -> u8 {
    match color {
        Color::Red => 0,
        Color::Blue => 13,
        Color::Green => 26,
        Color::Yellow => 39,
    }
}

/// Absolute ring cell for a token at `steps`, or `None` when the token is
/// not on the ring (base, home stretch, finished).
pub fn cell_of(color: Color, steps: i8) -> Option<u8> {
    if !is_on_ring(steps) {
        return None;
    }
    Some((entry_offset(color) + steps as u8) % RING_CELLS as u8)
}

pub fn is_in_base(steps: i8) -> bool {
    steps == BASE_STEPS
}

pub fn is_on_ring(steps: i8) -> bool {
    (0..=LAST_RING_STEP).contains(&steps)
}

pub fn is_on_home_stretch(steps: i8) -> bool {
    (RING_CELLS..FINISH_STEPS).contains(&steps)
}

pub fn is_finished(steps: i8) -> bool {
    steps == FINISH_STEPS
}

/// Position along the home stretch (0 = first home cell), if there.
pub fn home_stretch_index(steps: i8) -> Option<u8> {
    is_on_home_stretch(steps).then(|| (steps - RING_CELLS) as u8)
}
