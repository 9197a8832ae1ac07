//! Track source port
//!
//! Playlist and track metadata comes from whatever library the host
//! application maintains. The engine only needs ordered records and a
//! way to write back the card id after a publish.

use anyhow::Result;

use crate::domain::{CardId, PlaylistId, PlaylistRecord};

/// Port for playlist and track metadata
#[async_trait::async_trait]
pub trait ITrackSource: Send + Sync {
    /// Fetch a playlist with its tracks in persisted order
    ///
    /// Returns `None` when no playlist with this id exists.
    async fn playlist(&self, id: &PlaylistId) -> Result<Option<PlaylistRecord>>;

    /// Persist the platform card id for a playlist
    ///
    /// Called after a publish returns a card id that differs from the
    /// stored one, so the next publish updates instead of creating.
    async fn set_card_id(&self, id: &PlaylistId, card_id: &CardId) -> Result<()>;
}
