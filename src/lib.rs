//! # quizzler-client
//!
//! Real-time client for multiplayer quiz sessions.
//!
//! A [`SessionChannel`] owns one WebSocket connection to the quiz backend.
//! It keeps the connection alive, routes server pushes into a
//! [`SessionStore`](client::SessionStore), runs the per-question countdown
//! and publishes [`SessionEvent`]s that UI code subscribes to.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use quizzler_client::{SessionChannel, SessionConfig, SessionEvent};
//!
//! # async fn demo() -> Result<(), quizzler_client::SessionError> {
//! let mut channel = SessionChannel::websocket(SessionConfig::default());
//! let mut events = channel.subscribe();
//!
//! channel.connect("ABC123", "alice", false).await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         SessionEvent::QuestionChanged { question } => {
//!             if let Some(choice) = question.choices.first() {
//!                 channel.submit_answer(choice.clone());
//!             }
//!         }
//!         SessionEvent::SessionEnded { .. } => break,
//!         _ => {}
//!     }
//! }
//!
//! channel.disconnect().await;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod client;
pub mod config;
mod error;
pub mod models;
pub mod protocol;

pub use client::{ConnectionState, SessionChannel, SessionEvent, SessionSnapshot, Subscription};
pub use config::SessionConfig;
pub use error::{DecodeError, SessionError, TransportError};
pub use models::{ItemKind, Player, QuestionView, ScoreEntry};
