//! # WORLDCAST Relay
//!
//! Makes a remote world show up as a LAN world.
//!
//! ## Usage
//!
//! ```bash
//! worldcast_relay 1.2.3.4 25565 "My Cool Server"
//! ```

use std::process::ExitCode;

use tracing::error;
use tracing_subscriber::EnvFilter;
use worldcast_relay::{LanAnnouncer, RelayConfig, TcpRelay};

fn print_usage() {
    println!("Usage: worldcast_relay <TARGET_HOST> <TARGET_PORT> [MOTD]");
    println!("Example: worldcast_relay 1.2.3.4 25565 'My Cool Server'");
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let Some(host) = args.get(1) else {
        print_usage();
        return ExitCode::FAILURE;
    };
    let port = match args.get(2).map_or(Ok(25565), |p| p.parse::<u16>()) {
        Ok(port) => port,
        Err(e) => {
            eprintln!("worldcast_relay: invalid port: {e}");
            print_usage();
            return ExitCode::FAILURE;
        }
    };
    let motd = args.get(3).map_or("Remote Server", String::as_str);

    let config = match RelayConfig::new(host, port) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("worldcast_relay: {e}");
            return ExitCode::FAILURE;
        }
    };

    let relay = match TcpRelay::bind(&config).await {
        Ok(relay) => relay,
        Err(e) => {
            eprintln!("worldcast_relay: {e}");
            return ExitCode::FAILURE;
        }
    };
    let local_port = match relay.local_addr() {
        Ok(addr) => addr.port(),
        Err(e) => {
            eprintln!("worldcast_relay: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         WORLDCAST RELAY                                          ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();
    println!("┌─ CONFIGURATION ─────────────────────────────────────────────────┐");
    println!("│ Local port:   {}", local_port);
    println!("│ Target:       {}", config.target());
    println!("│ MOTD:         {}", motd);
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    match LanAnnouncer::bind(motd, local_port).await {
        Ok(announcer) => {
            tokio::spawn(announcer.run());
        }
        Err(e) => error!("LAN announcements disabled: {}", e),
    }

    if let Err(e) = relay.run().await {
        eprintln!("worldcast_relay: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
