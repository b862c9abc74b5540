//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, no framing imposed)
//!     → connection.rs (session ID, live session tracking)
//!     → routing layer picks a broker and opens the upstream socket
//!     → pipe.rs × 2 (client→broker, broker→client)
//! ```
//!
//! # Design Decisions
//! - Byte-transparent at layer 4; nothing is parsed
//! - One upstream connection per client session, never shared
//! - Each session tracked for graceful shutdown

pub mod connection;
pub mod listener;
pub mod pipe;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{Listener, ListenerError};
pub use pipe::{forward, Direction, PipeEnd, PipeReport, BUFFER_SIZE};
