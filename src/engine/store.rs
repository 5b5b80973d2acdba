//! Shared room store: versioned documents, conditional writes and per-room
//! change notification.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::watch;

use crate::engine::error::StoreError;
use crate::engine::models::{Precondition, RoomId, Snapshot, WriteOutcome};
use crate::games::ludo::Room;

/// Backend holding one versioned [`Room`] document per room id.
///
/// `put` is the only way to change a document and is always conditional.
/// Committed snapshots are delivered to subscribers in increasing version
/// order; a slow subscriber may miss intermediate snapshots but never sees
/// an older one after a newer one.
pub trait RoomStore: Send + Sync + 'static {
    fn load(
        &self,
        room_id: &RoomId,
    ) -> impl Future<Output = Result<Option<Snapshot>, StoreError>> + Send;

    fn put(
        &self,
        room_id: &RoomId,
        room: Room,
        precondition: Precondition,
    ) -> impl Future<Output = Result<WriteOutcome, StoreError>> + Send;

    /// Remove the document. Returns whether one existed.
    fn delete(&self, room_id: &RoomId) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// All current documents, ordered by room id.
    fn list(&self) -> impl Future<Output = Result<Vec<(RoomId, Snapshot)>, StoreError>> + Send;

    /// Change feed for one room. The receiver starts at the current value
    /// (`None` while the room does not exist).
    fn subscribe(&self, room_id: &RoomId) -> watch::Receiver<Option<Snapshot>>;
}

#[derive(Default)]
struct MemoryState {
    rooms: BTreeMap<RoomId, watch::Sender<Option<Snapshot>>>,
    last_version: u64,
}

impl MemoryState {
    fn channel(&mut self, room_id: &RoomId) -> &watch::Sender<Option<Snapshot>> {
        self.rooms
            .entry(room_id.clone())
            .or_insert_with(|| watch::channel(None).0)
    }
}

/// In-process store. A single lock makes check-and-apply atomic; it is never
/// held across an await point.
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    available: AtomicBool,
    write_latency: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            available: AtomicBool::new(true),
            write_latency: Duration::ZERO,
        }
    }

    /// Delay every write before it is applied, widening the window in which
    /// concurrent writers can race.
    pub fn with_write_latency(mut self, latency: Duration) -> Self {
        self.write_latency = latency;
        self
    }

    /// Simulate losing (or regaining) connectivity. Subscriptions survive.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
        if available {
            tracing::info!("room store back online");
        } else {
            tracing::warn!("room store offline");
        }
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("store is offline".into()))
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))
    }

    fn apply(
        &self,
        room_id: &RoomId,
        room: Room,
        precondition: Precondition,
    ) -> Result<WriteOutcome, StoreError> {
        let mut state = self.lock()?;
        let version = state.last_version + 1;
        let tx = state.channel(room_id);
        let current = tx.borrow().clone();

        let holds = match (precondition, &current) {
            (Precondition::Absent, None) => true,
            (Precondition::Version(expected), Some(stored)) => stored.version == expected,
            _ => false,
        };
        if !holds {
            tracing::debug!(
                room = %room_id,
                ?precondition,
                stored = current.as_ref().map(|s| s.version),
                "conditional write rejected"
            );
            return Ok(WriteOutcome::Conflict(current));
        }

        let snapshot = Snapshot { version, room };
        tx.send_replace(Some(snapshot.clone()));
        state.last_version = version;
        tracing::debug!(room = %room_id, version, "committed");
        Ok(WriteOutcome::Committed(snapshot))
    }
}

impl RoomStore for MemoryStore {
    async fn load(&self, room_id: &RoomId) -> Result<Option<Snapshot>, StoreError> {
        self.ensure_available()?;
        let state = self.lock()?;
        Ok(state.rooms.get(room_id).and_then(|tx| tx.borrow().clone()))
    }

    async fn put(
        &self,
        room_id: &RoomId,
        room: Room,
        precondition: Precondition,
    ) -> Result<WriteOutcome, StoreError> {
        self.ensure_available()?;
        if !self.write_latency.is_zero() {
            tokio::time::sleep(self.write_latency).await;
            self.ensure_available()?;
        }
        self.apply(room_id, room, precondition)
    }

    async fn delete(&self, room_id: &RoomId) -> Result<bool, StoreError> {
        self.ensure_available()?;
        let state = self.lock()?;
        let existed = state
            .rooms
            .get(room_id)
            .and_then(|tx| tx.send_replace(None))
            .is_some();
        if existed {
            tracing::info!(room = %room_id, "room deleted");
        }
        Ok(existed)
    }

    async fn list(&self) -> Result<Vec<(RoomId, Snapshot)>, StoreError> {
        self.ensure_available()?;
        let state = self.lock()?;
        Ok(state
            .rooms
            .iter()
            .filter_map(|(id, tx)| tx.borrow().clone().map(|s| (id.clone(), s)))
            .collect())
    }

    fn subscribe(&self, room_id: &RoomId) -> watch::Receiver<Option<Snapshot>> {
        match self.state.lock() {
            Ok(mut state) => state.channel(room_id).subscribe(),
            // A poisoned map still hands out a feed; it just never changes.
            Err(_) => watch::channel(None).1,
        }
    }
}
