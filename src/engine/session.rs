//! One player's connection to a room.
//!
//! A session keeps a live view of its room through the store's change feed,
//! decides every action locally against that view and publishes it as a
//! single conditional write. After its own roll it may schedule a follow-up
//! (skip when nothing can move, or play the only legal move) that is pinned
//! to the version it was scheduled against.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;

use crate::engine::config::{EngineConfig, SessionSettings};
use crate::engine::error::SessionError;
use crate::engine::models::{JoinRequest, Outcome, RoomId, Snapshot, DEFAULT_NUM_PLAYERS};
use crate::engine::store::RoomStore;
use crate::engine::sync::{commit, join_room, restart_room};
use crate::games::ludo::{Color, Rejection, Room, Transition};

/// Action a session takes on its own after rolling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    Skip,
    AutoMove { token: usize },
}

impl FollowUp {
    /// Follow-up owed by `color` for `room`, if any.
    pub fn plan(room: &Room, color: Color, settings: &SessionSettings) -> Option<Self> {
        if room.current_turn != Some(color) || room.winner.is_some() || room.dice_value.is_none() {
            return None;
        }
        match room.pending_moves().as_slice() {
            [] => Some(FollowUp::Skip),
            [token] if settings.auto_move => Some(FollowUp::AutoMove { token: *token }),
            _ => None,
        }
    }

    fn delay(self, settings: &SessionSettings) -> std::time::Duration {
        match self {
            FollowUp::Skip => settings.skip_delay(),
            FollowUp::AutoMove { .. } => settings.auto_move_delay(),
        }
    }

    fn apply(self, room: &Room, color: Color) -> Result<Transition, Rejection> {
        match self {
            FollowUp::Skip => room.skip(color),
            FollowUp::AutoMove { token } => room.move_token(color, token),
        }
    }
}

pub struct ClientSession<S: RoomStore> {
    store: Arc<S>,
    room_id: RoomId,
    color: Color,
    settings: SessionSettings,
    watcher: watch::Receiver<Option<Snapshot>>,
    rng: StdRng,
    cheat_unlocked: bool,
    follow_up: Option<JoinHandle<()>>,
}

impl<S: RoomStore> ClientSession<S> {
    /// Claim a seat (creating the room if needed) and start following it.
    pub async fn join(
        store: Arc<S>,
        request: JoinRequest,
        config: &EngineConfig,
    ) -> Result<Self, SessionError> {
        let watcher = store.subscribe(&request.room_id);
        let joined = join_room(store.as_ref(), &request, config.session.join_attempts).await?;
        Ok(Self::attach(store, request.room_id, joined.color, watcher, config))
    }

    /// Resume a color that already joined, without writing anything.
    pub async fn reconnect(
        store: Arc<S>,
        room_id: RoomId,
        color: Color,
        config: &EngineConfig,
    ) -> Result<Self, SessionError> {
        let watcher = store.subscribe(&room_id);
        let snapshot = store
            .load(&room_id)
            .await?
            .ok_or_else(|| SessionError::RoomMissing { room_id: room_id.clone() })?;
        if !snapshot.room.is_active(color) {
            return Err(SessionError::NotJoined { room_id, color });
        }

        tracing::info!(room = %room_id, color = %color, version = snapshot.version, "reconnected");
        let mut session = Self::attach(store, room_id, color, watcher, config);
        // a roll left pending by a previous connection is resolved from here
        session.schedule_follow_up(&snapshot);
        Ok(session)
    }

    fn attach(
        store: Arc<S>,
        room_id: RoomId,
        color: Color,
        watcher: watch::Receiver<Option<Snapshot>>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            store,
            room_id,
            color,
            settings: config.session.clone(),
            watcher,
            rng: StdRng::from_entropy(),
            cheat_unlocked: false,
            follow_up: None,
        }
    }

    /// Deterministic dice for this session.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Latest snapshot delivered to this session. `None` once the room is deleted.
    pub fn current(&self) -> Option<Snapshot> {
        self.watcher.borrow().clone()
    }

    pub fn view(&self) -> Option<Room> {
        self.watcher.borrow().as_ref().map(|s| s.room.clone())
    }

    /// Stream of snapshots, starting with the current one.
    pub fn snapshots(&self) -> WatchStream<Option<Snapshot>> {
        WatchStream::new(self.watcher.clone())
    }

    /// Wait until a snapshot newer than the last one observed here arrives.
    /// Returns `false` if the feed has closed.
    pub async fn changed(&mut self) -> bool {
        self.watcher.changed().await.is_ok()
    }

    pub fn has_pending_follow_up(&self) -> bool {
        self.follow_up.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    pub fn cheat_unlocked(&self) -> bool {
        self.cheat_unlocked
    }

    /// Unlock dice forcing for this session only.
    pub fn unlock_cheat(&mut self, passphrase: &str) -> bool {
        if self.settings.unlocks_cheat(passphrase) {
            self.cheat_unlocked = true;
            tracing::debug!(room = %self.room_id, color = %self.color, "cheat mode unlocked");
        }
        self.cheat_unlocked
    }

    fn base(&self) -> Result<Snapshot, SessionError> {
        self.current().ok_or_else(|| SessionError::RoomMissing {
            room_id: self.room_id.clone(),
        })
    }

    async fn publish(
        &mut self,
        base: Snapshot,
        action: &'static str,
        transition: Result<Transition, Rejection>,
    ) -> Result<Outcome, SessionError> {
        let transition = match transition {
            Ok(t) => t,
            Err(rejection) => {
                tracing::debug!(
                    room = %self.room_id,
                    color = %self.color,
                    action,
                    %rejection,
                    "action rejected"
                );
                return Ok(Outcome::Rejected(rejection));
            }
        };

        let outcome = match commit(self.store.as_ref(), &self.room_id, &base, transition).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(room = %self.room_id, color = %self.color, action, error = %e, "write failed");
                return Err(e.into());
            }
        };

        if let Outcome::Committed { snapshot, .. } = &outcome {
            tracing::info!(
                room = %self.room_id,
                color = %self.color,
                action,
                version = snapshot.version,
                "committed"
            );
            let snapshot = snapshot.clone();
            self.schedule_follow_up(&snapshot);
        }
        Ok(outcome)
    }

    pub async fn roll(&mut self) -> Result<Outcome, SessionError> {
        let base = self.base()?;
        let transition = base.room.roll(self.color, &mut self.rng);
        self.publish(base, "roll", transition).await
    }

    pub async fn move_token(&mut self, token: usize) -> Result<Outcome, SessionError> {
        let base = self.base()?;
        let transition = base.room.move_token(self.color, token);
        self.publish(base, "move", transition).await
    }

    pub async fn skip(&mut self) -> Result<Outcome, SessionError> {
        let base = self.base()?;
        let transition = base.room.skip(self.color);
        self.publish(base, "skip", transition).await
    }

    /// Force the next roll of whoever holds the turn. Requires `unlock_cheat`.
    pub async fn set_forced_value(&mut self, value: u8) -> Result<Outcome, SessionError> {
        let base = self.base()?;
        let transition = if self.cheat_unlocked {
            base.room.set_forced_value(value)
        } else {
            Err(Rejection::CheatLocked)
        };
        self.publish(base, "force", transition).await
    }

    /// Reset the room for everyone, keeping its player count. Every session,
    /// including this one, must `rejoin` to play again. Decided against the
    /// current view; if another write lands first the restart is superseded.
    pub async fn restart(&mut self) -> Result<Outcome, SessionError> {
        let base = self.base()?;
        let outcome = match restart_room(self.store.as_ref(), &self.room_id, &base).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(room = %self.room_id, color = %self.color, action = "restart", error = %e, "write failed");
                return Err(e.into());
            }
        };
        match &outcome {
            Outcome::Committed { .. } => self.cancel_follow_up(),
            Outcome::Rejected(rejection) => {
                tracing::debug!(room = %self.room_id, color = %self.color, %rejection, "restart rejected");
            }
            Outcome::Superseded(_) => {
                tracing::debug!(room = %self.room_id, color = %self.color, "restart lost the race");
            }
        }
        Ok(outcome)
    }

    /// Claim a seat again after a restart, preferring the previous color.
    pub async fn rejoin(&mut self) -> Result<Color, SessionError> {
        let current = self.current();
        if current.as_ref().is_some_and(|s| s.room.is_active(self.color)) {
            return Ok(self.color);
        }
        let num_players = current.map_or(DEFAULT_NUM_PLAYERS, |s| s.room.num_players);
        let request = JoinRequest {
            room_id: self.room_id.clone(),
            requested_color: Some(self.color),
            num_players,
        };
        let joined = join_room(self.store.as_ref(), &request, self.settings.join_attempts).await?;
        if joined.color != self.color {
            tracing::info!(room = %self.room_id, from = %self.color, to = %joined.color, "seat changed on rejoin");
            self.color = joined.color;
        }
        Ok(self.color)
    }

    fn cancel_follow_up(&mut self) {
        if let Some(handle) = self.follow_up.take() {
            handle.abort();
        }
    }

    fn schedule_follow_up(&mut self, snapshot: &Snapshot) {
        self.cancel_follow_up();
        let Some(follow_up) = FollowUp::plan(&snapshot.room, self.color, &self.settings) else {
            return;
        };
        tracing::debug!(
            room = %self.room_id,
            color = %self.color,
            version = snapshot.version,
            ?follow_up,
            "follow-up scheduled"
        );
        self.follow_up = Some(tokio::spawn(run_follow_up(
            Arc::clone(&self.store),
            self.room_id.clone(),
            self.color,
            snapshot.clone(),
            self.watcher.clone(),
            follow_up,
            self.settings.clone(),
        )));
    }

    /// Stop following the room. Pending follow-ups are dropped.
    pub fn leave(self) {
        tracing::info!(room = %self.room_id, color = %self.color, "left room");
    }
}

impl<S: RoomStore> Drop for ClientSession<S> {
    fn drop(&mut self) {
        self.cancel_follow_up();
    }
}

/// Snapshot the follow-up should now be pinned to: `base` itself, or a newer
/// snapshot that still owes exactly the same follow-up (a join landing while
/// the dice is shown, say). `None` means it no longer applies.
fn rebase(
    base: Snapshot,
    seen: Option<Snapshot>,
    color: Color,
    follow_up: FollowUp,
    settings: &SessionSettings,
) -> Option<Snapshot> {
    let seen = seen?;
    if seen.version == base.version {
        return Some(base);
    }
    (FollowUp::plan(&seen.room, color, settings) == Some(follow_up)).then_some(seen)
}

async fn run_follow_up<S: RoomStore>(
    store: Arc<S>,
    room_id: RoomId,
    color: Color,
    base: Snapshot,
    mut watcher: watch::Receiver<Option<Snapshot>>,
    follow_up: FollowUp,
    settings: SessionSettings,
) {
    let seen = watcher.borrow_and_update().clone();
    let Some(mut base) = rebase(base, seen, color, follow_up, &settings) else {
        tracing::debug!(room = %room_id, color = %color, ?follow_up, "follow-up cancelled");
        return;
    };

    // the deadline is kept across rebases; the roll has been on screen since it was scheduled
    let sleep = tokio::time::sleep(follow_up.delay(&settings));
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => break,
            changed = watcher.changed() => {
                let seen = match changed {
                    Ok(()) => watcher.borrow_and_update().clone(),
                    Err(_) => None,
                };
                let version = base.version;
                match rebase(base, seen, color, follow_up, &settings) {
                    Some(next) => {
                        if next.version != version {
                            tracing::debug!(room = %room_id, color = %color, ?follow_up, version = next.version, "follow-up carried to newer snapshot");
                        }
                        base = next;
                    }
                    None => {
                        tracing::debug!(room = %room_id, color = %color, ?follow_up, "follow-up cancelled");
                        return;
                    }
                }
            }
        }
    }

    let transition = match follow_up.apply(&base.room, color) {
        Ok(t) => t,
        Err(rejection) => {
            tracing::debug!(room = %room_id, color = %color, %rejection, "follow-up no longer applies");
            return;
        }
    };
    match commit(store.as_ref(), &room_id, &base, transition).await {
        Ok(Outcome::Committed { snapshot, .. }) => {
            tracing::info!(room = %room_id, color = %color, ?follow_up, version = snapshot.version, "follow-up committed");
        }
        Ok(_) => {
            tracing::debug!(room = %room_id, color = %color, ?follow_up, "follow-up lost the race");
        }
        Err(e) => {
            tracing::warn!(room = %room_id, color = %color, error = %e, "follow-up write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::store::MemoryStore;

    fn room_with_dice(color: Color, dice: u8, steps: [i8; 4]) -> Room {
        let mut room = Room::new(2).join(color).unwrap().room;
        for (token, s) in room.players[color].tokens.iter_mut().zip(steps) {
            token.steps = s;
        }
        room.dice_value = Some(dice);
        room
    }

    #[test]
    fn test_follow_up_plan() {
        let settings = SessionSettings::default();
        let stuck = room_with_dice(Color::Red, 3, [-1, -1, -1, -1]);
        assert_eq!(FollowUp::plan(&stuck, Color::Red, &settings), Some(FollowUp::Skip));
        assert_eq!(FollowUp::plan(&stuck, Color::Blue, &settings), None);

        let single = room_with_dice(Color::Red, 3, [10, -1, -1, -1]);
        assert_eq!(
            FollowUp::plan(&single, Color::Red, &settings),
            Some(FollowUp::AutoMove { token: 0 })
        );
        let manual = SessionSettings { auto_move: false, ..SessionSettings::default() };
        assert_eq!(FollowUp::plan(&single, Color::Red, &manual), None);

        let several = room_with_dice(Color::Red, 3, [10, 20, -1, -1]);
        assert_eq!(FollowUp::plan(&several, Color::Red, &settings), None);
    }

    #[test]
    fn test_rebase_carries_only_the_same_follow_up() {
        let settings = SessionSettings::default();
        let stuck = room_with_dice(Color::Red, 3, [-1, -1, -1, -1]);
        let base = Snapshot { version: 4, room: stuck.clone() };

        let joined = Snapshot { version: 5, room: stuck.join(Color::Blue).unwrap().room };
        assert_eq!(
            rebase(base.clone(), Some(joined.clone()), Color::Red, FollowUp::Skip, &settings),
            Some(joined)
        );
        assert_eq!(
            rebase(base.clone(), Some(base.clone()), Color::Red, FollowUp::Skip, &settings),
            Some(base.clone())
        );

        let skipped = Snapshot { version: 6, room: stuck.skip(Color::Red).unwrap().room };
        assert_eq!(rebase(base.clone(), Some(skipped), Color::Red, FollowUp::Skip, &settings), None);
        assert_eq!(rebase(base, None, Color::Red, FollowUp::Skip, &settings), None);
    }

    #[tokio::test]
    async fn test_cheat_requires_unlock() {
        let store = Arc::new(MemoryStore::new());
        let config = EngineConfig::default();
        let request = JoinRequest {
            room_id: RoomId::parse("cheat").unwrap(),
            requested_color: None,
            num_players: 2,
        };
        let mut session = ClientSession::join(store, request, &config).await.unwrap();

        let outcome = session.set_forced_value(6).await.unwrap();
        assert_eq!(outcome, Outcome::Rejected(Rejection::CheatLocked));
        assert!(!session.unlock_cheat("nope"));
        assert!(session.unlock_cheat(" bj"));
        assert!(session.set_forced_value(6).await.unwrap().is_committed());
        assert_eq!(session.view().unwrap().forced_value, Some(6));
    }

    #[tokio::test]
    async fn test_reconnect_requires_active_color() {
        let store = Arc::new(MemoryStore::new());
        let config = EngineConfig::default();
        let room_id = RoomId::parse("back").unwrap();
        let request = JoinRequest {
            room_id: room_id.clone(),
            requested_color: Some(Color::Yellow),
            num_players: 2,
        };
        let first = ClientSession::join(Arc::clone(&store), request, &config).await.unwrap();
        first.leave();

        let again = ClientSession::reconnect(Arc::clone(&store), room_id.clone(), Color::Yellow, &config)
            .await
            .unwrap();
        assert_eq!(again.color(), Color::Yellow);

        let err = ClientSession::reconnect(Arc::clone(&store), room_id, Color::Red, &config)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SessionError::NotJoined { color: Color::Red, .. }));

        let missing = RoomId::parse("missing").unwrap();
        assert!(matches!(
            ClientSession::reconnect(store, missing, Color::Red, &config).await,
            Err(SessionError::RoomMissing { .. })
        ));
    }
}
