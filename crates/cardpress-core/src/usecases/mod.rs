//! Use cases (interactors) for Cardpress
//!
//! This module contains the application use cases that orchestrate
//! domain entities and port interfaces. Use cases are thin coordinators
//! that delegate business rules to domain methods and I/O to ports.
//!
//! ## Use Cases
//!
//! - [`DeviceLoginUseCase`] - Device-code login state machine, logout
//! - [`CredentialCache`] - Process-wide credential state with read-through caching

pub mod credentials;
pub mod login;

pub use credentials::CredentialCache;
pub use login::{DeviceLoginUseCase, PollResult};
