//! # Network Awareness
//!
//! Tracks connectivity and foreground state and decides when a host signal
//! should start a drain.
//!
//! ## Drain Decisions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Signal                     │ Condition                 │ Drain?       │
//! │  ───────────────────────────┼───────────────────────────┼───────────── │
//! │  Connectivity(true)         │ was offline               │ Connectivity │
//! │  Connectivity(true)         │ already online            │ no           │
//! │  Connectivity(false)        │ -                         │ no           │
//! │  Visibility(Foreground)     │ was background, online,   │ Foreground   │
//! │                             │ queue non-empty           │              │
//! │  Visibility(Background)     │ -                         │ no           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Signals come from a [`ConnectivityObserver`]. Two are provided:
//! [`ManualConnectivity`] for hosts that already know their state, and
//! [`TcpProbe`] for headless hosts.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info};
use url::Url;

use crate::error::{QueueResult, SyncError};

// =============================================================================
// Signals and Triggers
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Foreground,
    Background,
}

/// A state transition reported by the host process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSignal {
    Connectivity(bool),
    Visibility(Visibility),
}

/// Why a drain was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrainTrigger {
    Connectivity,
    Foreground,
    Periodic,
    Enqueue,
    Forced,
}

impl fmt::Display for DrainTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DrainTrigger::Connectivity => "connectivity",
            DrainTrigger::Foreground => "foreground",
            DrainTrigger::Periodic => "periodic",
            DrainTrigger::Enqueue => "enqueue",
            DrainTrigger::Forced => "forced",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Network Awareness
// =============================================================================

#[derive(Debug)]
pub struct NetworkAwareness {
    online: AtomicBool,
    foreground: AtomicBool,
}

impl NetworkAwareness {
    /// Starts foregrounded with the given connectivity.
    pub fn new(online: bool) -> Self {
        NetworkAwareness {
            online: AtomicBool::new(online),
            foreground: AtomicBool::new(true),
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn is_foreground(&self) -> bool {
        self.foreground.load(Ordering::SeqCst)
    }

    /// Applies a signal and returns the drain it calls for, if any.
    pub fn observe(&self, signal: HostSignal, queue_len: usize) -> Option<DrainTrigger> {
        match signal {
            HostSignal::Connectivity(true) => {
                let was_online = self.online.swap(true, Ordering::SeqCst);
                if was_online {
                    return None;
                }
                info!(queued = queue_len, "Connectivity restored");
                Some(DrainTrigger::Connectivity)
            }
            HostSignal::Connectivity(false) => {
                if self.online.swap(false, Ordering::SeqCst) {
                    info!(queued = queue_len, "Connectivity lost");
                }
                None
            }
            HostSignal::Visibility(Visibility::Foreground) => {
                let was_foreground = self.foreground.swap(true, Ordering::SeqCst);
                if was_foreground || !self.is_online() || queue_len == 0 {
                    return None;
                }
                debug!(queued = queue_len, "Foregrounded with pending actions");
                Some(DrainTrigger::Foreground)
            }
            HostSignal::Visibility(Visibility::Background) => {
                self.foreground.store(false, Ordering::SeqCst);
                None
            }
        }
    }
}

// =============================================================================
// Connectivity Observer
// =============================================================================

/// Host-side source of connectivity and visibility transitions.
pub trait ConnectivityObserver: Send + 'static {
    /// Waits for the next signal. `None` means the source is closed.
    fn next_signal(&mut self) -> impl Future<Output = Option<HostSignal>> + Send;
}

/// Observer fed by the host through a [`ConnectivityHandle`].
pub struct ManualConnectivity {
    rx: mpsc::UnboundedReceiver<HostSignal>,
}

/// Sending side of [`ManualConnectivity`].
#[derive(Clone)]
pub struct ConnectivityHandle {
    tx: mpsc::UnboundedSender<HostSignal>,
}

impl ManualConnectivity {
    pub fn channel() -> (Self, ConnectivityHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ManualConnectivity { rx }, ConnectivityHandle { tx })
    }
}

impl ConnectivityObserver for ManualConnectivity {
    async fn next_signal(&mut self) -> Option<HostSignal> {
        self.rx.recv().await
    }
}

impl ConnectivityHandle {
    pub fn send(&self, signal: HostSignal) -> QueueResult<()> {
        self.tx
            .send(signal)
            .map_err(|_| SyncError::ChannelError("Connectivity channel closed".into()))
    }

    pub fn set_online(&self, online: bool) -> QueueResult<()> {
        self.send(HostSignal::Connectivity(online))
    }

    pub fn foreground(&self) -> QueueResult<()> {
        self.send(HostSignal::Visibility(Visibility::Foreground))
    }

    pub fn background(&self) -> QueueResult<()> {
        self.send(HostSignal::Visibility(Visibility::Background))
    }
}

/// Observer that checks TCP reachability of a host and reports changes.
///
/// The first probe result is always reported; afterwards only transitions are.
pub struct TcpProbe {
    address: String,
    interval: Duration,
    connect_timeout: Duration,
    last: Option<bool>,
}

impl TcpProbe {
    pub fn new(address: impl Into<String>, interval: Duration) -> Self {
        TcpProbe {
            address: address.into(),
            interval,
            connect_timeout: Duration::from_secs(5),
            last: None,
        }
    }

    /// Probes the host and port of `base_url`.
    pub fn for_base_url(base_url: &str, interval: Duration) -> QueueResult<Self> {
        let url = Url::parse(base_url)?;
        let host = url
            .host_str()
            .ok_or_else(|| SyncError::InvalidUrl(format!("{base_url} has no host")))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| SyncError::InvalidUrl(format!("{base_url} has no port")))?;

        Ok(Self::new(format!("{host}:{port}"), interval))
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn probe(&self) -> bool {
        matches!(
            tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.address)).await,
            Ok(Ok(_))
        )
    }
}

impl ConnectivityObserver for TcpProbe {
    async fn next_signal(&mut self) -> Option<HostSignal> {
        loop {
            if self.last.is_some() {
                tokio::time::sleep(self.interval).await;
            }

            let reachable = self.probe().await;
            if self.last != Some(reachable) {
                debug!(address = %self.address, reachable, "Reachability changed");
                self.last = Some(reachable);
                return Some(HostSignal::Connectivity(reachable));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_online_transition_requests_drain_once() {
        let network = NetworkAwareness::new(false);

        assert_eq!(
            network.observe(HostSignal::Connectivity(true), 1),
            Some(DrainTrigger::Connectivity)
        );
        assert_eq!(network.observe(HostSignal::Connectivity(true), 1), None);
        assert!(network.is_online());

        assert_eq!(network.observe(HostSignal::Connectivity(false), 1), None);
        assert!(!network.is_online());
    }

    #[test]
    fn test_foreground_needs_online_and_pending_work() {
        let network = NetworkAwareness::new(true);
        let background = HostSignal::Visibility(Visibility::Background);
        let foreground = HostSignal::Visibility(Visibility::Foreground);

        network.observe(background, 0);
        assert_eq!(network.observe(foreground, 0), None);

        network.observe(background, 3);
        assert_eq!(network.observe(foreground, 3), Some(DrainTrigger::Foreground));

        // Already foreground: no new transition.
        assert_eq!(network.observe(foreground, 3), None);

        network.observe(HostSignal::Connectivity(false), 3);
        network.observe(background, 3);
        assert_eq!(network.observe(foreground, 3), None);
        assert!(network.is_foreground());
    }

    #[tokio::test]
    async fn test_manual_connectivity_delivers_in_order() {
        let (mut observer, handle) = ManualConnectivity::channel();
        handle.set_online(false).unwrap();
        handle.foreground().unwrap();

        assert_eq!(
            observer.next_signal().await,
            Some(HostSignal::Connectivity(false))
        );
        assert_eq!(
            observer.next_signal().await,
            Some(HostSignal::Visibility(Visibility::Foreground))
        );

        drop(handle);
        assert_eq!(observer.next_signal().await, None);
    }

    #[test]
    fn test_probe_address_from_base_url() {
        let probe = TcpProbe::for_base_url("https://api.example.com/v1", Duration::from_secs(1))
            .unwrap();
        assert_eq!(probe.address(), "api.example.com:443");

        let probe =
            TcpProbe::for_base_url("http://localhost:8080", Duration::from_secs(1)).unwrap();
        assert_eq!(probe.address(), "localhost:8080");
    }

    #[tokio::test]
    async fn test_probe_reports_reachability_changes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut probe = TcpProbe::new(addr.to_string(), Duration::from_millis(10))
            .connect_timeout(Duration::from_millis(200));

        assert_eq!(
            probe.next_signal().await,
            Some(HostSignal::Connectivity(true))
        );

        drop(listener);
        assert_eq!(
            probe.next_signal().await,
            Some(HostSignal::Connectivity(false))
        );
    }
}
