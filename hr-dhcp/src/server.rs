use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::Result;
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info, warn};

use crate::SharedDhcpState;
use crate::options::{DhcpOption, OPT_SERVER_ID};
use crate::packet::DhcpPacket;
use crate::state_machine;

const BROADCAST: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 255);

/// Run the DHCP server, one listener per configured `server_addresses` entry.
/// Every listener binds `(addr, 67)` with SO_REUSEADDR/SO_BROADCAST and replies
/// are broadcast to both 255.255.255.255:68 and addr:68.
pub async fn run_dhcp_server(state: SharedDhcpState) -> Result<()> {
    let config = state.read().await.config.clone();

    if !config.enabled {
        info!("DHCP server disabled");
        return Ok(());
    }

    let addrs = config.server_address_ips();
    if addrs.is_empty() {
        warn!("No DHCP server_addresses configured, skipping DHCP server");
        return Ok(());
    }

    let mut listeners = Vec::with_capacity(addrs.len());
    for addr in addrs {
        let state = state.clone();
        listeners.push(tokio::spawn(async move {
            if let Err(e) = run_listener(addr, state).await {
                warn!("DHCP listener on {} exited: {}", addr, e);
            }
        }));
    }

    for handle in listeners {
        let _ = handle.await;
    }

    Ok(())
}

async fn run_listener(bind_addr: Ipv4Addr, state: SharedDhcpState) -> Result<()> {
    let interface = state.read().await.config.interface.clone();

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_broadcast(true)?;

    let bind: SocketAddr = SocketAddr::new(bind_addr.into(), 67);
    socket.bind(&bind.into())?;

    #[cfg(target_os = "linux")]
    if !interface.is_empty() {
        socket.bind_device(Some(interface.as_bytes()))?;
    }

    socket.set_nonblocking(true)?;
    let socket = tokio::net::UdpSocket::from_std(socket.into())?;

    info!("DHCP server listening on {}:67", bind_addr);

    let mut buf = [0u8; 1500];

    loop {
        let (len, src) = match socket.recv_from(&mut buf).await {
            Ok(r) => r,
            Err(e) => {
                warn!("DHCP recv error on {}: {}", bind_addr, e);
                continue;
            }
        };

        let packet_data = &buf[..len];

        let packet = match DhcpPacket::parse(packet_data) {
            Ok(p) => p,
            Err(e) => {
                debug!("Invalid DHCP packet from {}: {}", src, e);
                continue;
            }
        };

        // Only handle BOOTREQUEST (op=1)
        if packet.op != 1 {
            continue;
        }

        let mut state_write = state.write().await;
        let config = state_write.config.clone();
        let lease_store = state_write.lease_store.clone();
        let mut lease_store = lease_store.write().await;

        let response = state_machine::handle_dhcp_packet(
            &packet,
            &config,
            &mut lease_store,
            &mut state_write.transactions,
            bind_addr,
        );

        drop(lease_store);
        drop(state_write);

        if let Some(mut response) = response {
            // server_identifier reflects the interface the reply goes out on.
            if let Some(opt) = response.options.iter_mut().find(|o| o.code == OPT_SERVER_ID) {
                *opt = DhcpOption::server_id(bind_addr);
            }

            let response_bytes = response.to_bytes();

            let broadcast_dest = SocketAddr::new(BROADCAST.into(), 68);
            if let Err(e) = socket.send_to(&response_bytes, broadcast_dest).await {
                warn!("Failed to broadcast DHCP response from {}: {}", bind_addr, e);
            }

            let unicast_dest = SocketAddr::new(bind_addr.into(), 68);
            if unicast_dest != broadcast_dest {
                if let Err(e) = socket.send_to(&response_bytes, unicast_dest).await {
                    warn!("Failed to send unicast DHCP response from {}: {}", bind_addr, e);
                }
            }
        }
    }
}

/// Background sweeper: expires stale leases and reaps closed/timed-out
/// transactions at `lease_time/10` cadence (floor 1s).
pub async fn run_lease_sweeper(state: SharedDhcpState) {
    loop {
        let lease_time = state.read().await.config.lease_time_secs;
        let interval = Duration::from_secs((lease_time / 10).max(1));
        tokio::time::sleep(interval).await;

        let mut state_write = state.write().await;
        let lease_time = state_write.config.lease_time_secs;
        let lease_store = state_write.lease_store.clone();
        let reaped = state_write.transactions.reap();
        drop(state_write);

        let expired = lease_store.write().await.sweep_expired(lease_time);

        if expired > 0 {
            info!("Lease sweeper expired {} lease(s)", expired);
        }
        if reaped > 0 {
            debug!("Transaction sweeper reaped {} stale transaction(s)", reaped);
        }
    }
}
