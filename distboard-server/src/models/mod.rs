//! Data models for the server

pub mod messages;
pub mod session;

pub use messages::*;
pub use session::*;
