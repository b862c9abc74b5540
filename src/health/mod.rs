//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Periodic timer (checker.rs)
//!     → for every enabled broker, concurrently:
//!         disconnected → registry connect
//!         connected    → probe.rs (error / EOF / writability, no bytes consumed)
//!     → broker state updated, outcome logged and counted
//! ```
//!
//! # Design Decisions
//! - Health state is per-broker; one broker's failure never touches another
//! - A failed probe evicts immediately; the next round may readmit
//! - The checker never panics or exits on broker errors

pub mod checker;
pub mod probe;

pub use checker::{CheckOutcome, HealthChecker};
