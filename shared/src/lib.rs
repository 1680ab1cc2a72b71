//! Types shared between the minigolf server and its browser client.

pub mod config;
pub mod map;
pub mod protocol;
