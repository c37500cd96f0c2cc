//! # LAN Announcer
//!
//! Game clients discover LAN worlds by listening for multicast datagrams of
//! the form `[MOTD]AD[PORT]`. The sender's IP is taken as the world's
//! address, so the port announced is the local relay port.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::error::{RelayError, RelayResult};

/// Multicast group clients listen on.
pub const ANNOUNCE_GROUP: SocketAddr = SocketAddr::V4(std::net::SocketAddrV4::new(
    std::net::Ipv4Addr::new(224, 0, 2, 60),
    4445,
));

/// Time between announcements.
pub const ANNOUNCE_INTERVAL: Duration = Duration::from_millis(1500);

/// Multicast TTL for announcements.
pub const ANNOUNCE_TTL: u32 = 128;

/// Builds the announcement payload.
#[must_use]
pub fn announcement(motd: &str, port: u16) -> String {
    format!("[{motd}]AD[{port}]")
}

/// Periodic LAN world announcement.
pub struct LanAnnouncer {
    socket: UdpSocket,
    message: Vec<u8>,
    target: SocketAddr,
    interval: Duration,
}

impl LanAnnouncer {
    /// Binds an ephemeral UDP socket announcing `motd` on `port`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Bind`] if no UDP socket can be bound.
    pub async fn bind(motd: &str, port: u16) -> RelayResult<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", 0)).await.map_err(|source| RelayError::Bind {
            address: "0.0.0.0:0".into(),
            source,
        })?;
        if let Err(e) = socket.set_broadcast(true) {
            debug!("Broadcast not available: {}", e);
        }
        if let Err(e) = socket.set_multicast_ttl_v4(ANNOUNCE_TTL) {
            debug!("Multicast TTL not set: {}", e);
        }
        Ok(Self {
            socket,
            message: announcement(motd, port).into_bytes(),
            target: ANNOUNCE_GROUP,
            interval: ANNOUNCE_INTERVAL,
        })
    }

    /// Sends to `target` instead of the multicast group.
    #[must_use]
    pub fn with_target(mut self, target: SocketAddr) -> Self {
        self.target = target;
        self
    }

    /// Overrides the announcement interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Payload sent on every announcement.
    #[must_use]
    pub fn message(&self) -> &[u8] {
        &self.message
    }

    /// Sends one announcement.
    ///
    /// # Errors
    ///
    /// Returns the socket error if the datagram could not be sent.
    pub async fn announce_once(&self) -> RelayResult<()> {
        self.socket.send_to(&self.message, self.target).await?;
        Ok(())
    }

    /// Announces every interval, forever. Send errors are logged and the
    /// next tick tries again.
    pub async fn run(self) {
        info!(
            "Announcing {} to {} every {:?}",
            String::from_utf8_lossy(&self.message),
            self.target,
            self.interval
        );
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.announce_once().await {
                warn!("Announcement failed: {}", e);
            }
        }
    }
}
