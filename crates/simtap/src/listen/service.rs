// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 simtap contributors

//! Accept-loop service: owns the listener, its thread, and the pause gate.
//!
//! One background thread cycles through announce / poll / accept, handing
//! each new connection to the embedder's [`SessionFactory`]. Every blocking
//! step is bounded by the listener's 2 s poll slice, so a cancel request is
//! observed within one slice:
//!
//! ```text
//!   loop {
//!       cancelled? -----> exit
//!       broadcast? -----> announce(source, port, tag)
//!       poll 2 s   --not ready--> continue
//!       gate open? --paused----> wait one slice, continue
//!       accept     -----> factory.create_session(stream, peer)
//!   }
//! ```
//!
//! While paused, pending connections stay in the OS backlog; nothing is
//! accepted and nothing is dropped.

use crate::announce::Announcer;
use crate::config::LISTEN_POLL_TIMEOUT_MS;
use crate::error::Error;
use crate::listen::listener::ClientListener;
use crate::session::{SessionFactory, SessionRegistry};
use parking_lot::{Condvar, Mutex};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

// ============================================================================
// Configuration
// ============================================================================

/// Initial endpoint and identity for a [`ListenService`].
#[derive(Clone, Debug, Default)]
pub struct ListenConfig {
    /// Host to bind; empty selects the default loopback host.
    pub hostname: String,
    /// Port to bind; 0 requests an ephemeral port.
    pub port: u16,
    /// Free-form identity carried in announcements.
    pub tag: String,
    /// Whether the accept loop announces itself each poll slice.
    pub broadcast: bool,
}

impl ListenConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_broadcast(mut self, broadcast: bool) -> Self {
        self.broadcast = broadcast;
        self
    }
}

// ============================================================================
// Pause gate
// ============================================================================

/// Admission gate consulted between readiness and accept.
struct PauseGate {
    paused: Mutex<bool>,
    unpaused: Condvar,
}

impl PauseGate {
    fn new() -> Self {
        PauseGate {
            paused: Mutex::new(false),
            unpaused: Condvar::new(),
        }
    }

    fn pause(&self) {
        *self.paused.lock() = true;
    }

    fn resume(&self) {
        *self.paused.lock() = false;
        self.unpaused.notify_all();
    }

    fn is_paused(&self) -> bool {
        *self.paused.lock()
    }

    /// Wait for admission, at most `timeout`. Returns true when the gate is
    /// open; false when it stayed closed so the caller can re-check
    /// cancellation.
    fn wait_admission(&self, timeout: Duration) -> bool {
        let mut paused = self.paused.lock();
        if !*paused {
            return true;
        }
        let deadline = Instant::now() + timeout;
        while *paused {
            if self
                .unpaused
                .wait_until(&mut paused, deadline)
                .timed_out()
            {
                return !*paused;
            }
        }
        true
    }
}

// ============================================================================
// Service
// ============================================================================

/// State shared with the accept-loop thread.
struct ServiceState {
    listener: Mutex<ClientListener>,
    requested: Mutex<Requested>,
    broadcast: AtomicBool,
    gate: PauseGate,
    cancel: crate::session::CancelToken,
}

/// Requested endpoint and identity. `hostname`/`port` are rewritten to the
/// bound values whenever the listening device initializes.
struct Requested {
    hostname: String,
    port: u16,
    tag: String,
    source_address: String,
}

impl ServiceState {
    /// Announcement fields under one lock: the advertised host (source
    /// address override, else the bound host), the port and the tag.
    fn announce_fields(&self) -> (String, u16, String) {
        let req = self.requested.lock();
        let host = if req.source_address.is_empty() {
            req.hostname.clone()
        } else {
            req.source_address.clone()
        };
        (host, req.port, req.tag.clone())
    }
}

/// Listening front end of the service.
///
/// Owns the [`ClientListener`], the accept-loop thread and the pause gate.
/// Dropping the service cancels the loop and joins the thread.
pub struct ListenService {
    state: Arc<ServiceState>,
    factory: Arc<dyn SessionFactory>,
    registry: Arc<SessionRegistry>,
    announcer: Option<Arc<dyn Announcer>>,
    accept_thread: Mutex<Option<JoinHandle<()>>>,
}

impl ListenService {
    pub fn new(
        config: ListenConfig,
        factory: Arc<dyn SessionFactory>,
        registry: Arc<SessionRegistry>,
        announcer: Option<Arc<dyn Announcer>>,
    ) -> Self {
        ListenService {
            state: Arc::new(ServiceState {
                listener: Mutex::new(ClientListener::new()),
                requested: Mutex::new(Requested {
                    hostname: config.hostname,
                    port: config.port,
                    tag: config.tag,
                    source_address: String::new(),
                }),
                broadcast: AtomicBool::new(config.broadcast),
                gate: PauseGate::new(),
                cancel: crate::session::CancelToken::new(),
            }),
            factory,
            registry,
            announcer,
            accept_thread: Mutex::new(None),
        }
    }

    /// Bind the listening device to the currently requested endpoint.
    ///
    /// On success the requested hostname and port are rewritten to the
    /// resolved address and bound port, so a later rebind reproduces the
    /// same endpoint.
    pub fn init_listen_device(&self) -> crate::Result<()> {
        let (host, port) = {
            let req = self.state.requested.lock();
            (req.hostname.clone(), req.port)
        };
        let (bound_host, bound_port) = {
            let mut listener = self.state.listener.lock();
            listener.initialize(&host, port)?;
            (
                listener.hostname().to_string(),
                u16::try_from(listener.port()).unwrap_or(0),
            )
        };
        let mut req = self.state.requested.lock();
        req.hostname = bound_host;
        req.port = bound_port;
        Ok(())
    }

    /// Spawn the accept loop.
    ///
    /// Initializes the listening device first if that has not happened yet,
    /// and installs the loop's cancel token in the session registry so a
    /// registry-wide shutdown reaches it. Fails with `AlreadyListening`
    /// while a previous loop is still running. Cancellation is terminal:
    /// a cancelled service cannot be started again.
    pub fn start(&self) -> crate::Result<()> {
        let mut slot = self.accept_thread.lock();
        if let Some(handle) = slot.as_ref() {
            if !handle.is_finished() {
                return Err(Error::AlreadyListening);
            }
        }
        if let Some(handle) = slot.take() {
            if handle.join().is_err() {
                log::error!("[listen] previous accept thread panicked");
            }
        }

        if !self.state.listener.lock().is_initialized() {
            self.init_listen_device()?;
        }
        self.registry.set_listen_handle(self.state.cancel.clone());

        log::info!("[listen] serving on {}:{}", self.hostname(), self.port());
        let state = Arc::clone(&self.state);
        let factory = Arc::clone(&self.factory);
        let announcer = self.announcer.clone();
        let handle = thread::Builder::new()
            .name("simtap-accept".into())
            .spawn(move || accept_loop(&state, &*factory, announcer.as_deref()))?;
        *slot = Some(handle);
        Ok(())
    }

    /// Rebind the listening device in place to the currently requested
    /// endpoint. Takes effect within one poll slice.
    pub fn restart(&self) -> crate::Result<()> {
        self.init_listen_device()?;
        log::info!("[listen] restarted on {}:{}", self.hostname(), self.port());
        if self.broadcast() {
            if let Some(announcer) = &self.announcer {
                let (host, port, tag) = self.state.announce_fields();
                announcer.announce(&host, port, &tag);
            }
        }
        Ok(())
    }

    /// Close the admission gate. Pending connections queue in the OS
    /// backlog until [`restart_listening`](Self::restart_listening).
    pub fn pause_listening(&self) {
        log::debug!("[listen] paused");
        self.state.gate.pause();
    }

    /// Reopen the admission gate.
    pub fn restart_listening(&self) {
        log::debug!("[listen] resumed");
        self.state.gate.resume();
    }

    /// Ask the accept loop to exit. Observed within one poll slice.
    pub fn cancel(&self) {
        self.state.cancel.cancel();
    }

    /// Join the accept-loop thread if one was started.
    pub fn join(&self) {
        if let Some(handle) = self.accept_thread.lock().take() {
            if handle.join().is_err() {
                log::error!("[listen] accept thread panicked");
            }
        }
    }

    pub fn is_listening(&self) -> bool {
        self.accept_thread
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Bound address once initialized, otherwise the requested host.
    pub fn hostname(&self) -> String {
        self.state.requested.lock().hostname.clone()
    }

    /// Bound port once initialized, otherwise the requested port.
    pub fn port(&self) -> u16 {
        self.state.requested.lock().port
    }

    /// Request a different port for the next (re)initialization.
    pub fn set_port(&self, port: u16) {
        self.state.requested.lock().port = port;
    }

    pub fn tag(&self) -> String {
        self.state.requested.lock().tag.clone()
    }

    pub fn set_tag(&self, tag: impl Into<String>) {
        self.state.requested.lock().tag = tag.into();
    }

    /// Address advertised in announcements. Defaults to the bound address
    /// until overridden.
    pub fn source_address(&self) -> String {
        let req = self.state.requested.lock();
        if req.source_address.is_empty() {
            req.hostname.clone()
        } else {
            req.source_address.clone()
        }
    }

    pub fn set_source_address(&self, address: impl Into<String>) {
        self.state.requested.lock().source_address = address.into();
    }

    pub fn broadcast(&self) -> bool {
        self.state.broadcast.load(Ordering::Relaxed)
    }

    pub fn set_broadcast(&self, on: bool) {
        self.state.broadcast.store(on, Ordering::Relaxed);
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Write a human-readable status block.
    pub fn dump(&self, out: &mut dyn io::Write) -> io::Result<()> {
        let (hostname, port, tag, source) = {
            let req = self.state.requested.lock();
            (
                req.hostname.clone(),
                req.port,
                req.tag.clone(),
                req.source_address.clone(),
            )
        };
        writeln!(out, "ListenService")?;
        writeln!(out, "    hostname = {hostname}")?;
        writeln!(out, "    port = {port}")?;
        writeln!(out, "    tag = {tag}")?;
        writeln!(out, "    source_address = {source}")?;
        writeln!(out, "    broadcast = {}", self.broadcast())?;
        writeln!(out, "    paused = {}", self.state.gate.is_paused())?;
        writeln!(out, "    running = {}", self.is_listening())?;
        Ok(())
    }
}

impl Drop for ListenService {
    fn drop(&mut self) {
        self.cancel();
        self.join();
    }
}

fn accept_loop(
    state: &ServiceState,
    factory: &dyn SessionFactory,
    announcer: Option<&dyn Announcer>,
) {
    log::debug!("[listen] accept loop running");
    let slice = Duration::from_millis(LISTEN_POLL_TIMEOUT_MS as u64);
    loop {
        if state.cancel.is_cancelled() {
            break;
        }

        if state.broadcast.load(Ordering::Relaxed) {
            if let Some(announcer) = announcer {
                let (host, port, tag) = state.announce_fields();
                if port != 0 {
                    announcer.announce(&host, port, &tag);
                }
            }
        }

        if !state.listener.lock().check_for_new_connections() {
            continue;
        }
        if !state.gate.wait_admission(slice) {
            continue;
        }

        match state.listener.lock().accept() {
            Ok((stream, peer)) => {
                log::info!("[listen] connection from {}", peer);
                factory.create_session(stream, peer);
            }
            Err(e) => {
                log::debug!("[listen] accept failed: {}", e);
            }
        }
    }
    log::debug!("[listen] accept loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_chainers_compose() {
        let config = ListenConfig::new()
            .with_hostname("localhost")
            .with_port(9100)
            .with_tag("dyn_sim")
            .with_broadcast(true);
        assert_eq!(config.hostname, "localhost");
        assert_eq!(config.port, 9100);
        assert_eq!(config.tag, "dyn_sim");
        assert!(config.broadcast);
    }

    #[test]
    fn test_gate_admits_when_open() {
        let gate = PauseGate::new();
        assert!(!gate.is_paused());
        assert!(gate.wait_admission(Duration::from_millis(1)));
    }

    #[test]
    fn test_gate_times_out_while_paused() {
        let gate = PauseGate::new();
        gate.pause();
        assert!(gate.is_paused());
        let start = Instant::now();
        assert!(!gate.wait_admission(Duration::from_millis(50)));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_resume_wakes_a_waiting_admission() {
        let gate = Arc::new(PauseGate::new());
        gate.pause();
        let waiter = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.wait_admission(Duration::from_secs(10)))
        };
        // Give the waiter time to block on the gate.
        thread::sleep(Duration::from_millis(50));
        gate.resume();
        assert!(waiter.join().expect("waiter exits"));
    }
}
