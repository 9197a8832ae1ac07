//! Domain entities and business logic
//!
//! This module contains the core domain types for Cardpress:
//! - Newtypes for type-safe identifiers and validated domain types
//! - Credential management types
//! - Device-code authorization session types
//! - Track, playlist and manifest types for publishing
//! - Progress event types for the publish stream
//! - Domain-specific error types

pub mod credentials;
pub mod device;
pub mod errors;
pub mod newtypes;
pub mod progress;
pub mod track;

// Re-export commonly used types
pub use credentials::Credentials;
pub use device::{DeviceSession, LoginPhase};
pub use errors::DomainError;
pub use newtypes::*;
pub use progress::{ProgressEvent, TrackFailure};
pub use track::{ManifestTrack, PlaylistRecord, PublishManifest, TrackRecord, UploadedTrack};
