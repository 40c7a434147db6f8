// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 simtap contributors

//! Session bookkeeping and cooperative shutdown.
//!
//! Every accepted connection is handed to a [`SessionFactory`], which
//! typically calls [`Session::spawn`] to run the protocol on its own thread.
//! The [`SessionRegistry`] tracks one [`CancelToken`] per live session plus
//! one for the accept loop, so a single [`shutdown`](SessionRegistry::shutdown)
//! call can ask everything to wind down without joining anyone:
//!
//! ```text
//!   ListenService ----- set_listen_handle ----> SessionRegistry
//!        |                                        |        |
//!   accept loop --- factory ---> Session::spawn --+   shutdown()
//!                                   (register)         cancel all tokens
//! ```
//!
//! Cancellation is cooperative: a token flips a flag, and each loop is
//! expected to observe it within one blocking slice (at most the listener's
//! 2 s poll for the accept loop).

use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

// ============================================================================
// Cancellation
// ============================================================================

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

// ============================================================================
// Session identity and spawning
// ============================================================================

/// Registry-scoped session identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Builds a session for one accepted connection.
///
/// Implemented for any `Fn(TcpStream, SocketAddr)` closure, so simple
/// embedders can pass a closure straight to the listen service.
pub trait SessionFactory: Send + Sync {
    fn create_session(&self, stream: TcpStream, peer: SocketAddr);
}

impl<F> SessionFactory for F
where
    F: Fn(TcpStream, SocketAddr) + Send + Sync,
{
    fn create_session(&self, stream: TcpStream, peer: SocketAddr) {
        self(stream, peer);
    }
}

/// Handle for spawning registered session threads.
pub struct Session;

impl Session {
    /// Run `work` on a dedicated thread registered with `registry`.
    ///
    /// The session's [`CancelToken`] is passed to `work`; long-running
    /// session loops should poll it. The registry entry is removed when
    /// `work` returns, however it exits.
    pub fn spawn<F>(
        registry: &Arc<SessionRegistry>,
        stream: TcpStream,
        peer: SocketAddr,
        work: F,
    ) -> crate::Result<SessionId>
    where
        F: FnOnce(TcpStream, SocketAddr, CancelToken) + Send + 'static,
    {
        let (id, token) = registry.register();
        let thread_registry = Arc::clone(registry);
        let spawned = thread::Builder::new()
            .name(format!("simtap-session-{id}"))
            .spawn(move || {
                log::debug!("[session] {} serving {}", id, peer);
                work(stream, peer, token);
                thread_registry.deregister(id);
                log::debug!("[session] {} finished", id);
            });
        match spawned {
            Ok(_) => Ok(id),
            Err(e) => {
                registry.deregister(id);
                Err(e.into())
            }
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Tracks live sessions and the accept loop for coordinated shutdown.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, CancelToken>>,
    next_id: AtomicU64,
    listen_handle: Mutex<Option<CancelToken>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Allocate an id and a fresh cancel token for a new session.
    pub fn register(&self) -> (SessionId, CancelToken) {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let token = CancelToken::new();
        self.sessions.lock().insert(id, token.clone());
        (id, token)
    }

    /// Drop a session's entry. Unknown ids are ignored.
    pub fn deregister(&self, id: SessionId) {
        self.sessions.lock().remove(&id);
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Ask every live session to stop. Entries stay registered until each
    /// session thread observes its token and deregisters itself.
    pub fn cancel_all(&self) {
        for token in self.sessions.lock().values() {
            token.cancel();
        }
    }

    /// Adopt the accept loop's cancel token so `shutdown` can reach it.
    pub fn set_listen_handle(&self, token: CancelToken) {
        *self.listen_handle.lock() = Some(token);
    }

    /// Stop accepting and cancel all sessions.
    ///
    /// Purely cooperative: no thread is joined here. The accept loop exits
    /// within one poll slice; sessions exit when they next check their
    /// token.
    pub fn shutdown(&self) {
        if let Some(listen) = self.listen_handle.lock().take() {
            listen.cancel();
        }
        let sessions = self.sessions.lock();
        for token in sessions.values() {
            token.cancel();
        }
        log::info!("[session] shutdown: cancelled {} session(s)", sessions.len());
    }
}
