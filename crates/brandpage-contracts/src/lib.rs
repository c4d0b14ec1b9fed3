//! Data shapes and pure transforms shared by the relay server and its clients.

pub mod events;
pub mod generation;
pub mod profile;
pub mod prompt_log;
pub mod wire;
