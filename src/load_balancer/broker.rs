//! Broker abstraction.
//!
//! # Responsibilities
//! - Represent a single broker node and its static descriptor
//! - Track connectivity, last health check and the registry's transport handle
//! - Track active client sessions (for Least Connections LB)
//!
//! # Invariants
//! - A transport handle is only ever stored while `connected` is true
//! - A connect attempt never overwrites the outcome of a newer attempt
//! - The session counter never goes below zero

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tokio::net::TcpStream;

use crate::config::BrokerConfig;

/// Connectivity fields guarded by the broker's lock.
#[derive(Debug, Default)]
struct BrokerLink {
    connected: bool,
    last_health_check: Option<Instant>,
    stream: Option<Arc<TcpStream>>,
    /// Generation handed to the most recent connect attempt.
    latest_attempt: u64,
    /// Generation of the attempt whose outcome is currently recorded.
    settled_attempt: u64,
}

/// Connectivity as seen under a single lock acquisition.
#[derive(Debug, Clone)]
pub enum LinkState {
    /// Connected with a usable handle.
    Ready(Arc<TcpStream>),
    /// A connect attempt has released the old handle and not finished yet.
    Connecting,
    Disconnected,
}

/// Ticket for one connect attempt, returned by [`Broker::begin_connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ConnectAttempt(u64);

/// A single broker node.
#[derive(Debug)]
pub struct Broker {
    config: BrokerConfig,
    link: Mutex<BrokerLink>,
    /// Number of client sessions currently routed here.
    active_sessions: AtomicUsize,
    /// Registry connect attempts, successful or not.
    connect_attempts: AtomicU64,
}

impl Broker {
    /// Create a disconnected broker.
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            link: Mutex::new(BrokerLink::default()),
            active_sessions: AtomicUsize::new(0),
            connect_attempts: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// `host:port`, the broker's identity.
    pub fn address(&self) -> String {
        self.config.to_string()
    }

    pub fn weight(&self) -> u32 {
        self.config.weight
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn is_connected(&self) -> bool {
        self.link().connected
    }

    /// Enabled and connected, i.e. part of the candidate set.
    pub fn is_available(&self) -> bool {
        self.config.enabled && self.is_connected()
    }

    pub fn last_health_check(&self) -> Option<Instant> {
        self.link().last_health_check
    }

    /// A shared handle to the registry's connection, if one is held.
    pub fn transport(&self) -> Option<Arc<TcpStream>> {
        self.link().stream.clone()
    }

    /// Snapshot of the connectivity flag and handle.
    pub fn link_state(&self) -> LinkState {
        let link = self.link();
        match (&link.stream, link.connected) {
            (Some(stream), true) => LinkState::Ready(Arc::clone(stream)),
            (None, true) => LinkState::Connecting,
            _ => LinkState::Disconnected,
        }
    }

    fn link(&self) -> MutexGuard<'_, BrokerLink> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- Link transitions ---
    // Each returns the handle it displaced so the caller closes it outside the lock.

    /// Start a connect attempt: release the current handle, leaving the
    /// connectivity flag untouched, and hand out a fresh generation.
    pub(crate) fn begin_connect(&self) -> (ConnectAttempt, Option<Arc<TcpStream>>) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
        let mut link = self.link();
        link.latest_attempt += 1;
        (ConnectAttempt(link.latest_attempt), link.stream.take())
    }

    /// Record a successful connect.
    ///
    /// Returns the displaced handle, or `Err(stream)` unused if a newer attempt
    /// has already settled.
    pub(crate) fn attach(
        &self,
        attempt: ConnectAttempt,
        stream: TcpStream,
    ) -> Result<Option<Arc<TcpStream>>, TcpStream> {
        let mut link = self.link();
        if attempt.0 < link.settled_attempt {
            return Err(stream);
        }
        link.settled_attempt = attempt.0;
        link.connected = true;
        link.last_health_check = Some(Instant::now());
        Ok(link.stream.replace(Arc::new(stream)))
    }

    /// Record a failed connect.
    ///
    /// Returns `None` when a newer attempt has already settled; its outcome stands.
    pub(crate) fn fail_connect(&self, attempt: ConnectAttempt) -> Option<(bool, Option<Arc<TcpStream>>)> {
        let mut link = self.link();
        if attempt.0 < link.settled_attempt {
            return None;
        }
        link.settled_attempt = attempt.0;
        let was_connected = std::mem::replace(&mut link.connected, false);
        Some((was_connected, link.stream.take()))
    }

    /// Drop the link unconditionally. Returns whether the broker was connected.
    ///
    /// Connect attempts still in flight are superseded and will not reattach.
    pub(crate) fn detach(&self) -> (bool, Option<Arc<TcpStream>>) {
        let mut link = self.link();
        link.settled_attempt = link.latest_attempt;
        let was_connected = std::mem::replace(&mut link.connected, false);
        (was_connected, link.stream.take())
    }

    /// Like [`detach`](Self::detach), but only if `stale` is still the held handle.
    pub(crate) fn detach_stale(&self, stale: &Arc<TcpStream>) -> Option<Arc<TcpStream>> {
        let mut link = self.link();
        match &link.stream {
            Some(current) if Arc::ptr_eq(current, stale) => {
                link.connected = false;
                link.stream.take()
            }
            _ => None,
        }
    }

    /// Refresh the last health check timestamp.
    pub(crate) fn touch(&self) {
        self.link().last_health_check = Some(Instant::now());
    }

    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts.load(Ordering::Relaxed)
    }

    // --- Session accounting ---

    /// Get the current number of active sessions.
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::Acquire)
    }

    /// Increment the active session count. Returns the new count.
    pub fn increment_sessions(&self) -> usize {
        self.active_sessions.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrement the active session count, saturating at zero. Returns the new count.
    pub fn decrement_sessions(&self) -> usize {
        match self
            .active_sessions
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(prev) => prev - 1,
            Err(_) => {
                tracing::error!(broker = %self, "Session count decremented below zero; ignoring");
                0
            }
        }
    }

    /// Count a new session; the returned guard uncounts it when dropped.
    pub fn begin_session(self: &Arc<Self>) -> SessionGuard {
        self.increment_sessions();
        SessionGuard { broker: Arc::clone(self) }
    }
}

impl fmt::Display for Broker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.config, f)
    }
}

/// A RAII guard that keeps one session counted on its broker.
#[derive(Debug)]
pub struct SessionGuard {
    broker: Arc<Broker>,
}

impl SessionGuard {
    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }
}

impl Deref for SessionGuard {
    type Target = Broker;
    fn deref(&self) -> &Self::Target {
        &self.broker
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.broker.decrement_sessions();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn broker() -> Arc<Broker> {
        Arc::new(Broker::new(BrokerConfig::new("127.0.0.1", 9092)))
    }

    #[test]
    fn starts_disconnected_without_handle() {
        let b = broker();
        assert!(b.is_enabled());
        assert!(!b.is_connected());
        assert!(!b.is_available());
        assert!(b.transport().is_none());
        assert!(b.last_health_check().is_none());
        assert_eq!(b.address(), "127.0.0.1:9092");
    }

    #[test]
    fn session_guard_pairs_increment_and_decrement() {
        let b = broker();
        let g1 = b.begin_session();
        let g2 = b.begin_session();
        assert_eq!(b.active_sessions(), 2);
        assert_eq!(g1.address(), "127.0.0.1:9092");

        drop(g1);
        assert_eq!(b.active_sessions(), 1);
        drop(g2);
        assert_eq!(b.active_sessions(), 0);
    }

    #[test]
    fn decrement_never_goes_negative() {
        let b = broker();
        assert_eq!(b.decrement_sessions(), 0);
        assert_eq!(b.active_sessions(), 0);
        b.increment_sessions();
        assert_eq!(b.decrement_sessions(), 0);
    }

    #[test]
    fn concurrent_sessions_do_not_lose_updates() {
        let b = broker();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let b = Arc::clone(&b);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let _guard = b.begin_session();
                    }
                    for _ in 0..1000 {
                        b.increment_sessions();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(b.active_sessions(), 8000);
    }

    #[tokio::test]
    async fn handle_is_present_only_while_connected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let stream = TcpStream::connect(listener.local_addr().unwrap()).await.unwrap();
        let b = broker();

        let (attempt, previous) = b.begin_connect();
        assert!(previous.is_none());
        assert!(b.attach(attempt, stream).unwrap().is_none());
        assert!(b.is_available());
        assert!(matches!(b.link_state(), LinkState::Ready(_)));
        assert!(b.last_health_check().is_some());

        let (_, stale) = b.begin_connect();
        assert!(stale.is_some());
        assert!(b.is_connected(), "releasing the handle alone keeps the flag");
        assert!(matches!(b.link_state(), LinkState::Connecting));

        let (was_connected, handle) = b.detach();
        assert!(was_connected);
        assert!(handle.is_none());
        assert!(!b.is_connected());
        assert!(b.transport().is_none());
        assert!(matches!(b.link_state(), LinkState::Disconnected));
    }

    async fn connected_stream(listener: &TcpListener) -> TcpStream {
        TcpStream::connect(listener.local_addr().unwrap()).await.unwrap()
    }

    #[tokio::test]
    async fn older_failure_keeps_newer_success() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let b = broker();

        let (slow, _) = b.begin_connect();
        let (fast, _) = b.begin_connect();
        assert!(slow < fast);
        assert_eq!(b.connect_attempts(), 2);

        assert!(b.attach(fast, connected_stream(&listener).await).unwrap().is_none());
        assert!(b.fail_connect(slow).is_none(), "superseded failure is ignored");
        assert!(b.is_available());
        assert!(b.transport().is_some());
    }

    #[tokio::test]
    async fn older_success_does_not_replace_newer_outcome() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let b = broker();

        let (slow, _) = b.begin_connect();
        let (fast, _) = b.begin_connect();
        let current = connected_stream(&listener).await;
        let current_port = current.local_addr().unwrap().port();
        b.attach(fast, current).unwrap();

        let late = b.attach(slow, connected_stream(&listener).await);
        assert!(late.is_err(), "late stream is handed back");
        assert_eq!(b.transport().unwrap().local_addr().unwrap().port(), current_port);

        // A newer failure still wins over an older success.
        let (next, _) = b.begin_connect();
        let (was_connected, _) = b.fail_connect(next).unwrap();
        assert!(was_connected);
        assert!(!b.is_connected());
    }

    #[tokio::test]
    async fn detach_supersedes_attempts_in_flight() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let b = broker();

        let (pending, _) = b.begin_connect();
        b.detach();
        assert!(b.attach(pending, connected_stream(&listener).await).is_err());
        assert!(!b.is_connected());
        assert!(b.transport().is_none());
    }
}
