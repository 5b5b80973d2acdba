//! Ludo rules: board geometry, move validation, captures, turn rotation and
//! the room state machine.

pub mod board;
pub mod capture;
pub mod moves;
pub mod room;
pub mod turns;
pub mod types;

pub use room::{validate_player_count, Rejection, RoomEvent, Transition};
pub use types::{Color, Player, Players, Room, RoomPhase, RoomSummary, Token};
