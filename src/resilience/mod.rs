//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Connect to broker:
//!     → timeouts.rs (enforce connection_timeout_ms)
//!     → On failure: broker marked disconnected, retried on the next
//!       health tick or the next empty-candidate acquire
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every outbound connect has a deadline
//! - No per-session retries: a failed upstream connect fails that session only

pub mod timeouts;
