//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → metrics exporter → ProxyServer::start
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → startup resumes and calls ProxyServer::stop
//!
//! Shutdown (shutdown.rs):
//!     trigger → accept loop, health timer and every session observe it
//! ```
//!
//! # Design Decisions
//! - Listener binds last, after every subsystem it depends on exists
//! - Ordered shutdown: stop accept, cancel sessions, close broker handles
//! - Session drain is bounded by a deadline

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::shutdown_signal;
