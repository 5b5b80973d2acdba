//! Room browser helpers: id generation, live-room listing and deletion.

use rand::Rng;
use serde::Serialize;

use crate::engine::error::SessionError;
use crate::engine::models::{RoomId, ROOM_ID_MAX_LEN};
use crate::engine::store::RoomStore;
use crate::games::ludo::RoomSummary;

pub const DEFAULT_LISTING_LIMIT: usize = 20;
const ROOM_ID_PREFIX: &str = "room-";
const ROOM_ID_SUFFIX_LEN: usize = 7;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// `room-` followed by seven lowercase base-36 characters.
pub fn generate_room_id<R: Rng>(rng: &mut R) -> RoomId {
    let mut id = String::with_capacity(ROOM_ID_PREFIX.len() + ROOM_ID_SUFFIX_LEN);
    id.push_str(ROOM_ID_PREFIX);
    for _ in 0..ROOM_ID_SUFFIX_LEN {
        id.push(BASE36[rng.gen_range(0..BASE36.len())] as char);
    }
    debug_assert!(id.len() <= ROOM_ID_MAX_LEN);
    RoomId::from_valid(id)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomListing {
    pub room_id: RoomId,
    pub version: u64,
    pub summary: RoomSummary,
}

/// Rooms still in play (no winner), ordered by id, at most `limit`.
pub async fn live_rooms<S: RoomStore>(
    store: &S,
    limit: usize,
) -> Result<Vec<RoomListing>, SessionError> {
    let rooms = store.list().await?;
    Ok(rooms
        .into_iter()
        .filter(|(_, snapshot)| snapshot.room.winner.is_none())
        .take(limit)
        .map(|(room_id, snapshot)| RoomListing {
            room_id,
            version: snapshot.version,
            summary: snapshot.room.summary(),
        })
        .collect())
}

/// Remove a room regardless of its state. Sessions following it see the
/// document disappear.
pub async fn delete_room<S: RoomStore>(store: &S, room_id: &RoomId) -> Result<(), SessionError> {
    if store.delete(room_id).await? {
        Ok(())
    } else {
        Err(SessionError::RoomMissing {
            room_id: room_id.clone(),
        })
    }
}
