pub mod arena;
pub mod bot_client;
pub mod bot_strategy;
pub mod config;
pub mod error;
pub mod lobby;
pub mod models;
pub mod session;
pub mod simulator;
pub mod store;
pub mod sync;
