//! Real-time chat broadcaster for Torbit Chat
//!
//! This crate is the core of the chat service: a single coordinator task that
//! owns the participant registry, and a bridge per connection that turns a
//! byte stream into chat events and back.
//!
//! # Features
//!
//! - Newline-delimited UTF-8 protocol, one display name per connection
//! - Registry mutated by exactly one control loop, no locks
//! - Join/leave announcements posted through the coordinator's own queue
//! - Bounded per-participant mailboxes with drop-on-full delivery
//! - Cooperative shutdown through a shared `CancellationToken`
//!
//! # Backpressure
//!
//! Fan-out never waits on a participant. When a mailbox is full the message
//! is discarded for that participant only; everyone else still receives it.
//! Losing messages for a slow reader is expected behaviour, not an error.
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use tokio_util::sync::CancellationToken;
//! use torbit_broadcaster::{Bridge, BridgeConfig, Coordinator, CoordinatorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let shutdown = CancellationToken::new();
//!     let (handle, _task) = Coordinator::spawn(CoordinatorConfig::default(), shutdown.clone());
//!     let bridge_config = Arc::new(BridgeConfig::default());
//!
//!     let listener = TcpListener::bind("127.0.0.1:2323").await?;
//!     loop {
//!         let (stream, addr) = listener.accept().await?;
//!         let mut bridge = Bridge::new(
//!             addr.to_string(),
//!             handle.clone(),
//!             Arc::clone(&bridge_config),
//!             shutdown.clone(),
//!         );
//!         tokio::spawn(async move {
//!             let _ = bridge.run(stream).await;
//!         });
//!     }
//! }
//! ```

pub mod bridge;
pub mod coordinator;
pub mod error;
pub mod events;

/// Tracing target carrying one record per delivered message
pub const AUDIT_TARGET: &str = "torbit::audit";

// Re-exports
pub use bridge::{Bridge, BridgeConfig, BridgeState};
pub use coordinator::{Coordinator, CoordinatorConfig, CoordinatorHandle, NamePolicy};
pub use error::{BroadcasterError, Result};
pub use events::{ChatMessage, Delivery, Participant, ParticipantId, TIMESTAMP_FORMAT};
