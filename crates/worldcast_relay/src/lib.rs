//! # WORLDCAST Relay
//!
//! Bridges a remote world onto the local network so a LAN client (or a
//! recording bot) can join it as if it were hosted locally.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  [MOTD]AD[port]   ┌──────────────┐
//! │ LanAnnouncer│ ─── 224.0.2.60 ──▶│  LAN client  │
//! └─────────────┘      :4445        └──────┬───────┘
//!                                          │ TCP
//!                                   ┌──────▼───────┐      ┌──────────────┐
//!                                   │   TcpRelay   │─────▶│ remote world │
//!                                   └──────────────┘      └──────────────┘
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod announce;
pub mod error;
pub mod proxy;

pub use announce::{announcement, LanAnnouncer, ANNOUNCE_GROUP, ANNOUNCE_INTERVAL, ANNOUNCE_TTL};
pub use error::{RelayError, RelayResult};
pub use proxy::{RelayConfig, RelayStats, TcpRelay};
