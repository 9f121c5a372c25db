pub mod config;
pub mod room;
pub mod sfu;
pub mod signaling;
