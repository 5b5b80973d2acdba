//! Automated player driving a [`ClientSession`] through the sync protocol.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::engine::bot_strategy::BotStrategy;
use crate::engine::error::SessionError;
use crate::engine::models::Outcome;
use crate::engine::session::ClientSession;
use crate::engine::store::RoomStore;
use crate::games::ludo::{Color, RoomEvent};

#[derive(Debug, Clone)]
pub struct BotOptions {
    /// Pause before each action, like a human looking at the board.
    pub think_delay: Duration,
    /// How long to wait for a room change before re-checking.
    pub poll_interval: Duration,
    /// Consecutive idle polls after which the bot gives up on the room.
    pub idle_limit: u32,
    /// Retries for connectivity failures and contention, per action.
    pub max_retries: u32,
    /// Hold the first roll until every seat is taken.
    pub wait_for_full_table: bool,
}

impl Default for BotOptions {
    fn default() -> Self {
        Self {
            think_delay: Duration::ZERO,
            poll_interval: Duration::from_secs(5),
            idle_limit: 12,
            max_retries: 5,
            wait_for_full_table: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BotReport {
    pub color: Option<Color>,
    pub strategy: String,
    pub winner: Option<Color>,
    pub rolls: usize,
    pub moves: usize,
    pub captures: usize,
    pub skips: usize,
    /// Writes that lost a race to another client.
    pub superseded: usize,
    pub rejected: usize,
    pub retries: usize,
    /// Gave up waiting for the room to move.
    pub stalled: bool,
}

impl BotReport {
    fn record(&mut self, color: Color, outcome: &Outcome) {
        match outcome {
            Outcome::Committed { events, .. } => {
                for event in events {
                    match event {
                        RoomEvent::DiceRolled { .. } => self.rolls += 1,
                        RoomEvent::TokenMoved { .. } => self.moves += 1,
                        RoomEvent::TokenCaptured { by, .. } if *by == color => self.captures += 1,
                        RoomEvent::TurnSkipped { .. } => self.skips += 1,
                        _ => {}
                    }
                }
            }
            Outcome::Superseded(_) => self.superseded += 1,
            Outcome::Rejected(_) => self.rejected += 1,
        }
    }
}

enum Step {
    Acted(Outcome),
    Wait,
    Done,
}

/// Play the session's color until the game has a winner.
///
/// Follow-ups scheduled by the session (auto-skip, auto-move) are left to
/// fire on their own; the bot only acts by hand when none is pending.
pub async fn run_bot_client<S: RoomStore>(
    mut session: ClientSession<S>,
    strategy: &dyn BotStrategy,
    options: &BotOptions,
    seed: u64,
) -> Result<BotReport, SessionError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut report = BotReport {
        color: Some(session.color()),
        strategy: strategy.name().to_string(),
        ..BotReport::default()
    };
    let mut idle = 0;
    let mut retries = 0;

    loop {
        match next_step(&mut session, strategy, options, &mut rng).await {
            Ok(Step::Done) => {
                report.winner = session.view().and_then(|room| room.winner);
                tracing::info!(
                    room = %session.room_id(),
                    color = %session.color(),
                    winner = ?report.winner,
                    "bot finished"
                );
                return Ok(report);
            }
            Ok(Step::Acted(outcome)) => {
                idle = 0;
                retries = 0;
                let rejected = matches!(outcome, Outcome::Rejected(_));
                report.record(session.color(), &outcome);
                if !rejected {
                    continue;
                }
            }
            Ok(Step::Wait) => {}
            Err(e) if e.is_retryable() && retries < options.max_retries => {
                retries += 1;
                report.retries += 1;
                tracing::warn!(
                    room = %session.room_id(),
                    color = %session.color(),
                    error = %e,
                    attempt = retries,
                    "action failed, retrying"
                );
                tokio::time::sleep(Duration::from_millis(50 * u64::from(retries))).await;
                continue;
            }
            Err(e) => return Err(e),
        }

        match tokio::time::timeout(options.poll_interval, session.changed()).await {
            Ok(true) => idle = 0,
            Ok(false) => {
                return Err(SessionError::RoomMissing {
                    room_id: session.room_id().clone(),
                })
            }
            Err(_) => {
                idle += 1;
                if idle >= options.idle_limit {
                    tracing::warn!(room = %session.room_id(), color = %session.color(), "room stalled, giving up");
                    report.stalled = true;
                    return Ok(report);
                }
            }
        }
    }
}

async fn next_step<S: RoomStore>(
    session: &mut ClientSession<S>,
    strategy: &dyn BotStrategy,
    options: &BotOptions,
    rng: &mut StdRng,
) -> Result<Step, SessionError> {
    let Some(room) = session.view() else {
        return Err(SessionError::RoomMissing {
            room_id: session.room_id().clone(),
        });
    };
    if room.winner.is_some() {
        return Ok(Step::Done);
    }

    let color = session.color();
    let ready = !options.wait_for_full_table || room.is_full();
    if room.current_turn != Some(color) || !ready || session.has_pending_follow_up() {
        return Ok(Step::Wait);
    }

    if !options.think_delay.is_zero() {
        tokio::time::sleep(options.think_delay).await;
    }

    let outcome = match room.dice_value {
        None => session.roll().await?,
        Some(dice) => {
            let legal = room.pending_moves();
            if legal.is_empty() {
                session.skip().await?
            } else {
                let token = strategy.choose_token(&room, color, dice, &legal, rng);
                session.move_token(token).await?
            }
        }
    };
    Ok(Step::Acted(outcome))
}
