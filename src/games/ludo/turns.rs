//! Turn rotation over the colors that actually joined, in join order.

use super::types::Color;

/// Color that acts after `current`. Rotation follows `active_colors`
/// (join order), not the canonical color order. A lone player keeps the turn.
pub fn next_player(current: Color, active_colors: &[Color]) -> Color {
    match active_colors.iter().position(|&c| c == current) {
        Some(idx) => active_colors[(idx + 1) % active_colors.len()],
        None => current,
    }
}
