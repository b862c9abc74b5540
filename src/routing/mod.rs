//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted client (socket, peer, session id)
//!     → router.rs: registry.acquire() picks a broker
//!     → dedicated upstream connect, bounded by connection_timeout
//!     → session guard counts the session on the broker
//!     → two forwarders; the first to stop cancels the other
//!     → both sockets closed, session uncounted, summary logged
//! ```
//!
//! # Design Decisions
//! - Routing happens once per client connection, never per message
//! - A failed upstream connect drops the client; there is no retry on another broker
//! - Shutdown cancels live sessions instead of waiting for clients to hang up

pub mod router;

pub use router::{ConnectionRouter, SessionEnd, SessionSummary};
