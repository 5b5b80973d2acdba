//! Publishing room transitions as conditional writes.
//!
//! Turn actions (roll, move, skip, forcing the dice) get exactly one attempt
//! against the snapshot they were decided on. Losing that race is reported,
//! not retried. Restarts are published the same way, so a restart that lost
//! the race never lands on top of whatever committed after it. Joins instead
//! run a bounded reload/recompute loop, since their result does not depend
//! on whose turn it is.

use crate::engine::error::{SessionError, StoreError};
use crate::engine::models::{JoinRequest, Outcome, Precondition, RoomId, Snapshot, WriteOutcome};
use crate::engine::store::RoomStore;
use crate::games::ludo::{validate_player_count, Color, Rejection, Room, RoomEvent, Transition};

/// Publish `transition` on top of `base`.
pub async fn commit<S: RoomStore>(
    store: &S,
    room_id: &RoomId,
    base: &Snapshot,
    transition: Transition,
) -> Result<Outcome, StoreError> {
    let Transition { room, events } = transition;
    match store.put(room_id, room, Precondition::Version(base.version)).await? {
        WriteOutcome::Committed(snapshot) => Ok(Outcome::Committed { snapshot, events }),
        WriteOutcome::Conflict(latest) => {
            tracing::debug!(
                room = %room_id,
                base = base.version,
                latest = latest.as_ref().map(|s| s.version),
                "lost the race, write discarded"
            );
            Ok(Outcome::Superseded(latest))
        }
    }
}

/// What one `transact` attempt decided to do with the current document.
pub enum Plan<T> {
    Write { room: Room, value: T },
    Keep(T),
}

/// Reload, recompute and conditionally write until a write commits, the plan
/// declines to write, or `max_attempts` conflicts have happened.
pub async fn transact<S, T, F>(
    store: &S,
    room_id: &RoomId,
    max_attempts: u32,
    mut plan: F,
) -> Result<(Option<Snapshot>, T), SessionError>
where
    S: RoomStore,
    F: FnMut(Option<&Snapshot>) -> Result<Plan<T>, SessionError>,
{
    for attempt in 1..=max_attempts.max(1) {
        let base = store.load(room_id).await?;
        let (room, value) = match plan(base.as_ref())? {
            Plan::Keep(value) => return Ok((base, value)),
            Plan::Write { room, value } => (room, value),
        };
        match store.put(room_id, room, Precondition::for_base(base.as_ref())).await? {
            WriteOutcome::Committed(snapshot) => return Ok((Some(snapshot), value)),
            WriteOutcome::Conflict(_) => {
                tracing::debug!(room = %room_id, attempt, "conflict, reloading");
            }
        }
    }
    Err(SessionError::Contended {
        room_id: room_id.clone(),
        attempts: max_attempts.max(1),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joined {
    pub snapshot: Snapshot,
    pub color: Color,
    pub events: Vec<RoomEvent>,
}

/// Claim a seat, creating the room if needed. Color assignment is redone on
/// every attempt, so two racing joiners can never end up with the same color.
pub async fn join_room<S: RoomStore>(
    store: &S,
    request: &JoinRequest,
    max_attempts: u32,
) -> Result<Joined, SessionError> {
    let num_players = validate_player_count(request.num_players)
        .map_err(|_| SessionError::InvalidPlayerCount(request.num_players))?;
    let room_id = &request.room_id;

    let (snapshot, (color, events)) = transact(store, room_id, max_attempts, |base| {
        let fresh;
        let room = match base {
            Some(snapshot) => &snapshot.room,
            None => {
                fresh = Room::new(num_players);
                &fresh
            }
        };
        let color = room
            .assign_color(request.requested_color)
            .map_err(|e| full_or_rejected(e, room_id))?;
        let transition = room.join(color).map_err(|e| full_or_rejected(e, room_id))?;
        Ok(Plan::Write {
            room: transition.room,
            value: (color, transition.events),
        })
    })
    .await?;

    let snapshot = snapshot.ok_or_else(|| SessionError::RoomMissing {
        room_id: room_id.clone(),
    })?;
    tracing::info!(room = %room_id, color = %color, version = snapshot.version, "joined room");
    Ok(Joined { snapshot, color, events })
}

fn full_or_rejected(rejection: Rejection, room_id: &RoomId) -> SessionError {
    match rejection {
        Rejection::RoomFull { .. } => SessionError::RoomFull {
            room_id: room_id.clone(),
        },
        other => SessionError::Rejected(other),
    }
}

/// Reset the room seen at `base` to a fresh one with the same player count.
/// One attempt only: if anything committed since `base`, the restart is
/// reported as superseded.
pub async fn restart_room<S: RoomStore>(
    store: &S,
    room_id: &RoomId,
    base: &Snapshot,
) -> Result<Outcome, StoreError> {
    let transition = match base.room.restarted() {
        Ok(t) => t,
        Err(rejection) => return Ok(Outcome::Rejected(rejection)),
    };
    let outcome = commit(store, room_id, base, transition).await?;
    if let Outcome::Committed { snapshot, .. } = &outcome {
        tracing::info!(room = %room_id, version = snapshot.version, "room restarted");
    }
    Ok(outcome)
}
