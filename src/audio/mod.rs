//! # Audio Module
//!
//! Core playback engine for WaveQueue.
//!
//! This module owns the only real state in the bot: the per-channel
//! playback sessions. Everything else in the repository is I/O glue.
//!
//! ## Architecture
//!
//! ### [`session`] / [`controller`] / [`queue`] - Playback core
//! - One [`session::VoiceSession`] per voice channel, owning a FIFO
//!   [`queue::TrackQueue`] and a [`controller::PlaybackController`]
//! - Every transition is serialized on the session's mutex; completion
//!   callbacks and chat commands never interleave
//! - A stream generation counter resolves the skip-vs-completion race
//!
//! ### [`manager`] - Session lifecycle
//! - Guild → session map, join/teardown, typed request API
//! - Auto-disconnect when a session drains (configurable)
//!
//! ### [`pipeline`] / [`driver`] - Collaborator seam
//! - Transport/connection/stream traits consumed by the core
//! - [`driver`] implements them on top of songbird

pub mod controller;
pub mod driver;
pub mod error;
pub mod events;
pub mod manager;
pub mod pipeline;
pub mod queue;
pub mod session;
pub mod track;

#[cfg(test)]
pub mod testkit;
