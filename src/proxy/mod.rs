//! Proxy server assembly.
//!
//! # Data Flow
//! ```text
//! ProxyServer::start
//!     → net::Listener (bind)
//!     → spawn health::HealthChecker::run
//!     → spawn accept loop → per client: tracker guard + routing::ConnectionRouter::route
//!
//! ProxyServer::stop
//!     → trigger root Shutdown (accept loop, health timer, live sessions)
//!     → wait for sessions (bounded) → join tasks → close broker handles
//! ```

pub mod server;

pub use server::{ProxyServer, DRAIN_DEADLINE};
