pub mod auth;
pub mod completions;
pub mod playlists;
pub mod publish;
