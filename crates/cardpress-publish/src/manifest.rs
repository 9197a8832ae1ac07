//! Manifest assembly
//!
//! Builds the card manifest from the uploads that succeeded, keeping
//! each entry at its original playlist position. A mid-list upload
//! failure leaves a gap in the numbering instead of shifting the
//! tracks that follow it.

use cardpress_core::domain::{DomainError, ManifestTrack, PlaylistRecord, PublishManifest, UploadedTrack};

/// Assembles the manifest for a run's successful uploads
///
/// `uploads` pairs each transcoded asset with the zero-based index of
/// its track in `playlist.tracks`; indices must be in ascending order
/// (the engine uploads sequentially, so they are). Track numbers are
/// the 1-based original positions. The playlist's stored card id, when
/// present, is attached so the submission updates instead of creating.
///
/// # Errors
/// Returns a validation error when `uploads` is empty; the engine
/// treats the all-failed case before calling here.
pub fn assemble(
    playlist: &PlaylistRecord,
    uploads: &[(usize, UploadedTrack)],
) -> Result<PublishManifest, DomainError> {
    let tracks = uploads
        .iter()
        .map(|(index, uploaded)| {
            let record = &playlist.tracks[*index];
            ManifestTrack {
                title: record.title.clone(),
                track_number: *index as u32 + 1,
                asset_key: uploaded.asset_key.clone(),
                // The transcoder's measurement wins over library metadata
                duration_secs: uploaded.duration_secs.or(record.duration_secs),
                file_size: uploaded.file_size,
                format: uploaded.format.clone(),
            }
        })
        .collect();

    let manifest = PublishManifest::new(playlist.name.clone(), tracks)?;
    Ok(match &playlist.card_id {
        Some(card_id) => manifest.with_card_id(card_id.clone()),
        None => manifest,
    })
}
