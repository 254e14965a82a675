//! In-memory key-value sessions with a sliding time-to-live.
//!
//! This crate provides a [`Room`]: a set of named sessions, each holding
//! text key/value pairs, that delete themselves once they sit idle for the
//! room's lifetime. It is meant for short-lived per-client state such as
//! auth sessions or handshake scratch space.
//!
//! - One timer task per session; reads and writes push its deadline back
//! - A single reaper task per room deletes sessions whose timers fire
//! - All operations serialize on one lock and never wait on a timer
//! - [`Room::close`] stops the reaper and every timer
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use tarry_session::Room;
//!
//! let room = Room::new(Duration::from_secs(900));
//! room.create("client-42").await?;
//! room.set("client-42", "nonce", "abc123").await?;
//! let nonce = room.get("client-42", "nonce").await?;
//! ```

mod config;
mod error;
mod reaper;
mod room;
mod table;
mod timer;

pub use config::{DEFAULT_ACTIVITY_BUFFER, DEFAULT_LIFETIME, RoomConfig};
pub use error::{Error, Result};
pub use room::Room;
