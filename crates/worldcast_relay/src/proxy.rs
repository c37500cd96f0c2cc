//! # TCP Proxy
//!
//! Accepts local connections and pipes each one to the remote world:
//!
//! ```text
//!  LAN client ──▶ 0.0.0.0:<local> ──copy_bidirectional──▶ target host:port
//! ```
//!
//! Each connection runs on its own task. When either side closes or fails,
//! both halves are shut down.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::copy_bidirectional;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::error::{RelayError, RelayResult};

/// Where to listen and where to forward.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayConfig {
    /// Remote host name or address.
    pub target_host: String,
    /// Remote port.
    pub target_port: u16,
    /// Local listen address. Port 0 picks an ephemeral port.
    pub listen: SocketAddr,
}

impl RelayConfig {
    /// Forward to `host:port`, listening on an ephemeral port on all
    /// interfaces.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidTarget`] for an empty host or port 0.
    pub fn new(target_host: &str, target_port: u16) -> RelayResult<Self> {
        if target_host.trim().is_empty() {
            return Err(RelayError::InvalidTarget("empty host".into()));
        }
        if target_port == 0 {
            return Err(RelayError::InvalidTarget(format!("{target_host}:0")));
        }
        Ok(Self {
            target_host: target_host.trim().to_string(),
            target_port,
            listen: SocketAddr::from(([0, 0, 0, 0], 0)),
        })
    }

    /// Overrides the listen address.
    #[must_use]
    pub fn listen_on(mut self, listen: SocketAddr) -> Self {
        self.listen = listen;
        self
    }

    /// `host:port` of the remote world.
    #[must_use]
    pub fn target(&self) -> String {
        format!("{}:{}", self.target_host, self.target_port)
    }
}

/// Connection counters, readable while the relay runs.
#[derive(Debug, Default)]
pub struct RelayStats {
    /// Connections accepted.
    pub accepted: AtomicU64,
    /// Connections whose target could not be reached.
    pub failed: AtomicU64,
    /// Bytes forwarded client to target.
    pub bytes_up: AtomicU64,
    /// Bytes forwarded target to client.
    pub bytes_down: AtomicU64,
}

/// Bound TCP proxy.
pub struct TcpRelay {
    listener: TcpListener,
    target: String,
    stats: Arc<RelayStats>,
}

impl TcpRelay {
    /// Binds the listener.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Bind`] if the listen address is unavailable.
    pub async fn bind(config: &RelayConfig) -> RelayResult<Self> {
        let listener = TcpListener::bind(config.listen).await.map_err(|source| RelayError::Bind {
            address: config.listen.to_string(),
            source,
        })?;
        Ok(Self {
            listener,
            target: config.target(),
            stats: Arc::new(RelayStats::default()),
        })
    }

    /// The address clients should connect to.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket has no local address.
    pub fn local_addr(&self) -> RelayResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared connection counters.
    #[must_use]
    pub fn stats(&self) -> Arc<RelayStats> {
        Arc::clone(&self.stats)
    }

    /// Accepts connections forever.
    ///
    /// # Errors
    ///
    /// Returns an error only if the listener itself fails.
    pub async fn run(self) -> RelayResult<()> {
        info!(
            "Relay listening on {}, forwarding to {}",
            self.listener.local_addr()?,
            self.target
        );
        loop {
            let (client, peer) = self.listener.accept().await?;
            self.stats.accepted.fetch_add(1, Ordering::Relaxed);
            info!("Relay connection from {}", peer);

            let target = self.target.clone();
            let stats = Arc::clone(&self.stats);
            tokio::spawn(async move {
                forward(client, peer, &target, &stats).await;
            });
        }
    }
}

async fn forward(mut client: TcpStream, peer: SocketAddr, target: &str, stats: &RelayStats) {
    let mut server = match TcpStream::connect(target).await {
        Ok(server) => server,
        Err(e) => {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            warn!("Relay target {} unreachable for {}: {}", target, peer, e);
            // Dropping the client closes it.
            return;
        }
    };
    let _ = client.set_nodelay(true);
    let _ = server.set_nodelay(true);

    match copy_bidirectional(&mut client, &mut server).await {
        Ok((up, down)) => {
            stats.bytes_up.fetch_add(up, Ordering::Relaxed);
            stats.bytes_down.fetch_add(down, Ordering::Relaxed);
            debug!("Relay connection {} closed ({} bytes up, {} bytes down)", peer, up, down);
        }
        Err(e) => warn!("Relay connection {} failed: {}", peer, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_rejects_bad_target() {
        assert!(matches!(RelayConfig::new("", 25565), Err(RelayError::InvalidTarget(_))));
        assert!(matches!(RelayConfig::new("example.org", 0), Err(RelayError::InvalidTarget(_))));
    }

    #[test]
    fn test_config_target() {
        let config = RelayConfig::new(" 10.0.0.5 ", 25565).unwrap();
        assert_eq!(config.target(), "10.0.0.5:25565");
        assert_eq!(config.listen.port(), 0);
    }
}
