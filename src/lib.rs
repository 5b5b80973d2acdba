//! Multiplayer Ludo: pure rules plus a client-side sync protocol over a
//! shared versioned room store.

pub mod engine;
pub mod games;
