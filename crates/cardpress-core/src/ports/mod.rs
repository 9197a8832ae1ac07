//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IDeviceAuth`] - Device-code grant endpoints of the authorization server
//! - [`ICardPlatform`] - Upload, transcode and card submission operations
//! - [`ICredentialStore`] - Persistent storage for the credential pair
//! - [`ITrackSource`] - Playlist and track metadata from the local library
//! - [`ILocalLibrary`] - Audio file access on the local machine

pub mod card_platform;
pub mod credential_store;
pub mod device_auth;
pub mod local_library;
pub mod track_source;

pub use card_platform::{ICardPlatform, IProgressSink};
pub use credential_store::{ICredentialStore, MemoryCredentialStore};
pub use device_auth::{DeviceAuthorization, IDeviceAuth, PollOutcome, TokenGrant};
pub use local_library::ILocalLibrary;
pub use track_source::ITrackSource;
