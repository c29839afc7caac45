use std::net::Ipv4Addr;
use tracing::{debug, info, warn};

use crate::config::DhcpConfig;
use crate::lease_store::{Host, LeaseStore};
use crate::options::*;
use crate::packet::DhcpPacket;
use crate::transaction::TransactionTable;

/// Handle an incoming DHCP packet and produce a response (if any), updating
/// the xid transaction table per the C3 dispatch table.
pub fn handle_dhcp_packet(
    packet: &DhcpPacket,
    config: &DhcpConfig,
    lease_store: &mut LeaseStore,
    transactions: &mut TransactionTable,
    server_ip: Ipv4Addr,
) -> Option<DhcpPacket> {
    let msg_type = packet.msg_type()?;
    transactions.open(packet.xid);

    let reply = match msg_type {
        DHCPDISCOVER => handle_discover(packet, config, lease_store, server_ip),
        DHCPREQUEST => {
            let reply = handle_request(packet, config, lease_store, server_ip);
            transactions.close(packet.xid);
            reply
        }
        DHCPRELEASE => {
            if config.handle_release_decline {
                handle_release(packet, lease_store);
            }
            transactions.close(packet.xid);
            None
        }
        DHCPINFORM => {
            let reply = handle_inform(packet, config, server_ip);
            transactions.close(packet.xid);
            reply
        }
        DHCPDECLINE => {
            if config.handle_release_decline {
                handle_decline(packet, lease_store);
            }
            transactions.close(packet.xid);
            None
        }
        _ => {
            debug!("Ignoring DHCP message type {}", msg_type);
            None
        }
    };

    reply
}

fn handle_discover(
    packet: &DhcpPacket,
    config: &DhcpConfig,
    lease_store: &mut LeaseStore,
    server_ip: Ipv4Addr,
) -> Option<DhcpPacket> {
    let mac = packet.mac_str();
    info!("DHCPDISCOVER from {}", mac);

    let requested_ip = packet.requested_ip();
    let hostname = packet.hostname();
    let offered_ip = lease_store.find_or_register(&mac, requested_ip, hostname.as_deref(), config);

    if offered_ip == Ipv4Addr::UNSPECIFIED {
        warn!("DHCP range exhausted, dropping DISCOVER from {}", mac);
        return None;
    }

    info!("DHCPOFFER {} to {}", offered_ip, mac);

    let mut options = build_standard_options(config, server_ip);
    if let Some(host) = lease_store.get(Some(offered_ip), None) {
        options.push(DhcpOption::hostname(&host.hostname));
    }

    // DHCPOFFER: ciaddr is always 0 (RFC 2131 §4.3.1)
    Some(packet.build_reply(DHCPOFFER, offered_ip, server_ip, Ipv4Addr::UNSPECIFIED, options))
}

fn handle_request(
    packet: &DhcpPacket,
    config: &DhcpConfig,
    lease_store: &mut LeaseStore,
    server_ip: Ipv4Addr,
) -> Option<DhcpPacket> {
    let mac = packet.mac_str();

    // Check if this REQUEST is for us (server identifier matches)
    if let Some(requested_server) = packet.server_id() {
        if requested_server != server_ip {
            debug!("DHCPREQUEST from {} for different server {}", mac, requested_server);
            return None;
        }
    }

    let requested_ip = packet
        .requested_ip()
        .or(if packet.ciaddr != Ipv4Addr::UNSPECIFIED { Some(packet.ciaddr) } else { None });

    let requested_ip = match requested_ip {
        Some(ip) => ip,
        None => {
            warn!("DHCPREQUEST from {} without requested IP", mac);
            return Some(build_nak(packet, server_ip));
        }
    };

    info!("DHCPREQUEST from {} for {}", mac, requested_ip);

    // RFC 2131 §4.3.2: Detect INIT-REBOOT state (no server_id, requested_ip set, ciaddr=0).
    // If the server has no record of this client, it MUST remain silent.
    let is_init_reboot = packet.server_id().is_none()
        && packet.requested_ip().is_some()
        && packet.ciaddr == Ipv4Addr::UNSPECIFIED;

    if is_init_reboot && lease_store.get(None, Some(&mac)).is_none() {
        debug!("INIT-REBOOT from {} for {} — no record, staying silent", mac, requested_ip);
        return None;
    }

    let network = config.network_cidr();
    let is_static = config
        .static_leases
        .iter()
        .any(|s| s.mac.to_uppercase() == mac && s.ip.parse::<Ipv4Addr>().ok() == Some(requested_ip));

    if !is_static && !network.contains(&requested_ip) {
        warn!("DHCPNAK: {} requested {} which is out of range", mac, requested_ip);
        return Some(build_nak(packet, server_ip));
    }

    if let Some(existing) = lease_store.get(Some(requested_ip), None) {
        if existing.mac != mac {
            warn!("DHCPNAK: {} requested {} which is leased to {}", mac, requested_ip, existing.mac);
            return Some(build_nak(packet, server_ip));
        }
    }

    let hostname = packet.hostname().or_else(|| {
        config
            .static_leases
            .iter()
            .find(|s| s.mac.to_uppercase() == mac)
            .map(|s| s.hostname.clone())
            .filter(|h| !h.is_empty())
    });

    lease_store.replace(Host::new(
        mac.clone(),
        requested_ip,
        hostname.clone().unwrap_or_else(|| format!("device-{}", mac.replace(':', "").to_lowercase())),
        now_secs(),
    ));

    info!("DHCPACK {} to {} (hostname: {:?})", requested_ip, mac, hostname);

    let mut options = build_standard_options(config, server_ip);
    if let Some(ref h) = hostname {
        options.push(DhcpOption::hostname(h));
    }

    // DHCPACK: echo client's ciaddr (RFC 2131 §4.3.1 Table 3)
    Some(packet.build_reply(DHCPACK, requested_ip, server_ip, packet.ciaddr, options))
}

fn handle_release(packet: &DhcpPacket, lease_store: &mut LeaseStore) {
    let mac = packet.mac_str();
    if let Some(host) = lease_store.get(None, Some(&mac)) {
        info!("DHCPRELEASE from {} for {}", mac, host.ip);
        lease_store.delete(&host);
    }
}

fn handle_inform(packet: &DhcpPacket, config: &DhcpConfig, server_ip: Ipv4Addr) -> Option<DhcpPacket> {
    let mac = packet.mac_str();
    info!("DHCPINFORM from {}", mac);

    let options = build_standard_options(config, server_ip);
    // INFORM: yiaddr must be 0, client already has an IP; ciaddr from client
    Some(packet.build_reply(DHCPACK, Ipv4Addr::UNSPECIFIED, server_ip, packet.ciaddr, options))
}

fn handle_decline(packet: &DhcpPacket, lease_store: &mut LeaseStore) {
    let mac = packet.mac_str();
    if let Some(ip) = packet.requested_ip() {
        if let Some(host) = lease_store.get(Some(ip), None) {
            if host.mac != mac {
                warn!("DHCPDECLINE from {} for {} — MAC mismatch (leased to {})", mac, ip, host.mac);
                return;
            }
            info!("DHCPDECLINE from {} for {}", mac, ip);
            // Client detected an ARP conflict; free the IP so it can be re-offered.
            lease_store.delete(&host);
        }
    }
}

fn build_nak(packet: &DhcpPacket, server_ip: Ipv4Addr) -> DhcpPacket {
    // DHCPNAK: ciaddr and yiaddr are always 0 (RFC 2131 §4.3.2)
    packet.build_reply(
        DHCPNAK,
        Ipv4Addr::UNSPECIFIED,
        server_ip,
        Ipv4Addr::UNSPECIFIED,
        vec![DhcpOption::server_id(server_ip)],
    )
}

fn build_standard_options(config: &DhcpConfig, server_ip: Ipv4Addr) -> Vec<DhcpOption> {
    let lease = config.lease_time_secs as u32;
    let mut opts = vec![
        DhcpOption::server_id(server_ip),
        DhcpOption::lease_time(lease),
        DhcpOption::renewal_time(lease / 2),       // T1 = 50% of lease
        DhcpOption::rebinding_time(lease * 7 / 8), // T2 = 87.5% of lease
        DhcpOption::subnet_mask(config.netmask()),
    ];

    let routers = config.routers();
    if !routers.is_empty() {
        opts.push(DhcpOption::routers(&routers));
    }

    let dns_servers = config.dns_server_ips();
    if !dns_servers.is_empty() {
        opts.push(DhcpOption::dns_servers(&dns_servers));
    }

    if !config.domain.is_empty() {
        opts.push(DhcpOption::domain_name(&config.domain));
    }

    // Broadcast address: network_address | ~netmask
    let network = config.network_cidr();
    let broadcast = network.broadcast();
    opts.push(DhcpOption::broadcast(broadcast));

    opts
}

fn now_secs() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
}
