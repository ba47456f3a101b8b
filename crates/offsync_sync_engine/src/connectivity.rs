//! Connectivity monitoring.
//!
//! The monitor is passive: the host platform reports reachability through
//! [`ConnectivityMonitor::set_online`], or a [`ConnectivityProbe`] task
//! drives it on an interval. Only `offline -> online` transitions produce
//! an edge; the scheduler reacts to edges, not to levels.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Current reachability plus a stream of "came back online" edges.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    state: watch::Sender<bool>,
    edges: broadcast::Sender<()>,
}

impl ConnectivityMonitor {
    /// Creates a monitor with the given initial reachability.
    pub fn new(online: bool) -> Self {
        let (state, _) = watch::channel(online);
        let (edges, _) = broadcast::channel(16);
        Self { state, edges }
    }

    /// Whether the remote is believed reachable.
    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Reports reachability. Returns true when this call was an
    /// `offline -> online` edge.
    pub fn set_online(&self, online: bool) -> bool {
        let mut went_online = false;
        let changed = self.state.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            *current = online;
            went_online = online;
            true
        });

        if went_online {
            info!("connectivity restored");
            // No subscribers is fine.
            let _ = self.edges.send(());
        } else if changed {
            info!("connectivity lost");
        }
        went_online
    }

    /// Receiver for the current level.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    /// Receiver for `offline -> online` edges.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.edges.subscribe()
    }

    /// Spawns a task that polls `probe` every `interval` and feeds the
    /// result into this monitor. Abort the handle to stop it.
    pub fn spawn_probe<P>(self: &Arc<Self>, probe: P, interval: Duration) -> JoinHandle<()>
    where
        P: ConnectivityProbe + 'static,
    {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let reachable = probe.probe().await;
                monitor.set_online(reachable);
            }
        })
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

/// A reachability check.
pub trait ConnectivityProbe: Send + Sync {
    /// Returns true if the remote looks reachable.
    fn probe(&self) -> impl Future<Output = bool> + Send;
}

/// Probes by opening a TCP connection.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
}

impl TcpProbe {
    /// Probes `addr` (`host:port`).
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: Duration::from_secs(3),
        }
    }

    /// Probes the host and port of a remote URL.
    ///
    /// Returns `None` when the URL has no host.
    pub fn for_url(url: &reqwest::Url) -> Option<Self> {
        let host = url.host_str()?;
        let port = url.port_or_known_default()?;
        Some(Self::new(format!("{host}:{port}")))
    }

    /// Sets the connect timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The probed address.
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl From<SocketAddr> for TcpProbe {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.to_string())
    }
}

impl ConnectivityProbe for TcpProbe {
    async fn probe(&self) -> bool {
        let connect = tokio::net::TcpStream::connect(self.addr.as_str());
        match tokio::time::timeout(self.timeout, connect).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(addr = %self.addr, error = %e, "probe failed");
                false
            }
            Err(_) => {
                debug!(addr = %self.addr, "probe timed out");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn only_offline_to_online_is_an_edge() {
        let monitor = ConnectivityMonitor::new(false);
        let mut edges = monitor.subscribe();

        assert!(!monitor.set_online(false));
        assert!(monitor.set_online(true));
        assert!(!monitor.set_online(true));
        assert!(!monitor.set_online(false));
        assert!(!monitor.is_online());

        assert!(edges.try_recv().is_ok());
        assert!(edges.try_recv().is_err());
    }

    #[test]
    fn watch_reflects_level() {
        let monitor = ConnectivityMonitor::new(true);
        let rx = monitor.watch();
        monitor.set_online(false);
        assert!(!*rx.borrow());
    }

    #[test]
    fn probe_from_url() {
        let url = reqwest::Url::parse("https://sync.example.com/api").unwrap();
        assert_eq!(TcpProbe::for_url(&url).unwrap().addr(), "sync.example.com:443");
        let url = reqwest::Url::parse("http://10.0.0.2:8080").unwrap();
        assert_eq!(TcpProbe::for_url(&url).unwrap().addr(), "10.0.0.2:8080");
    }

    struct Flag(Arc<AtomicBool>);

    impl ConnectivityProbe for Flag {
        async fn probe(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn probe_task_drives_monitor() {
        let monitor = Arc::new(ConnectivityMonitor::new(false));
        let flag = Arc::new(AtomicBool::new(true));
        let mut edges = monitor.subscribe();
        let task = monitor.spawn_probe(Flag(Arc::clone(&flag)), Duration::from_secs(5));

        edges.recv().await.unwrap();
        assert!(monitor.is_online());

        flag.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(!monitor.is_online());
        task.abort();
    }

    #[tokio::test]
    async fn tcp_probe_sees_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let probe = TcpProbe::from(listener.local_addr().unwrap());
        assert!(probe.probe().await);

        let addr = listener.local_addr().unwrap();
        drop(listener);
        let probe = TcpProbe::from(addr).with_timeout(Duration::from_millis(500));
        assert!(!probe.probe().await);
    }
}
