use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DhcpConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub interface: String,
    /// Served network in CIDR form, e.g. "10.47.0.0/24".
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default = "default_range_start")]
    pub range_start: String,
    #[serde(default = "default_range_end")]
    pub range_end: String,
    /// Router (default gateway) addresses advertised to clients, in order.
    #[serde(default)]
    pub router: Vec<String>,
    /// DNS servers advertised to clients, in order.
    #[serde(default)]
    pub dns_servers: Vec<String>,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_lease_time")]
    pub lease_time_secs: u64,
    #[serde(default)]
    pub authoritative: bool,
    /// Path to the lease persistence file.
    #[serde(default = "default_host_file")]
    pub host_file: String,
    /// Local interface addresses to bind :67 on and broadcast replies from.
    #[serde(default = "default_server_addresses")]
    pub server_addresses: Vec<String>,
    #[serde(default)]
    pub static_leases: Vec<StaticLease>,
    /// Whether RELEASE/DECLINE free the associated lease. See DESIGN.md.
    #[serde(default = "default_true")]
    pub handle_release_decline: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticLease {
    pub mac: String,
    pub ip: String,
    #[serde(default)]
    pub hostname: String,
}

fn default_true() -> bool {
    true
}

fn default_network() -> String {
    "10.47.0.0/24".to_string()
}

fn default_range_start() -> String {
    "10.47.0.100".to_string()
}

fn default_range_end() -> String {
    "10.47.0.200".to_string()
}

fn default_lease_time() -> u64 {
    86400
}

fn default_server_addresses() -> Vec<String> {
    vec!["0.0.0.0".to_string()]
}

fn default_host_file() -> String {
    "/var/lib/server-dashboard/dhcp-leases.json".to_string()
}

impl Default for DhcpConfig {
    fn default() -> Self {
        serde_json::from_str("{}").unwrap()
    }
}

impl DhcpConfig {
    /// Parsed served network, falling back to the default on malformed config.
    pub fn network_cidr(&self) -> Ipv4Net {
        self.network
            .parse()
            .unwrap_or_else(|_| default_network().parse().unwrap())
    }

    /// Inclusive allocation range as 32-bit host-order integers.
    pub fn dhcp_range(&self) -> (u32, u32) {
        let low: Ipv4Addr = self.range_start.parse().unwrap_or(Ipv4Addr::new(0, 0, 0, 0));
        let high: Ipv4Addr = self.range_end.parse().unwrap_or(Ipv4Addr::new(0, 0, 0, 0));
        (u32::from(low), u32::from(high))
    }

    pub fn netmask(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.network_cidr().netmask())
    }

    pub fn routers(&self) -> Vec<Ipv4Addr> {
        self.router.iter().filter_map(|s| s.parse().ok()).collect()
    }

    pub fn dns_server_ips(&self) -> Vec<Ipv4Addr> {
        self.dns_servers.iter().filter_map(|s| s.parse().ok()).collect()
    }

    pub fn server_address_ips(&self) -> Vec<Ipv4Addr> {
        self.server_addresses
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DhcpConfig::default();
        assert!(config.enabled);
        assert_eq!(config.lease_time_secs, 86400);
        assert_eq!(config.host_file, "/var/lib/server-dashboard/dhcp-leases.json");
        assert!(config.handle_release_decline);
    }

    #[test]
    fn test_deserialize() {
        let json = r#"{
            "enabled": true,
            "network": "10.0.0.0/24",
            "range_start": "10.0.0.10",
            "range_end": "10.0.0.200",
            "router": ["10.0.0.1"],
            "dns_servers": ["10.0.0.1"]
        }"#;
        let config: DhcpConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.range_start, "10.0.0.10");
        assert_eq!(config.range_end, "10.0.0.200");
        assert_eq!(config.routers(), vec![Ipv4Addr::new(10, 0, 0, 1)]);
    }

    #[test]
    fn test_dhcp_range() {
        let config = DhcpConfig {
            range_start: "10.47.0.100".to_string(),
            range_end: "10.47.0.200".to_string(),
            ..DhcpConfig::default()
        };
        let (low, high) = config.dhcp_range();
        assert_eq!(low, u32::from(Ipv4Addr::new(10, 47, 0, 100)));
        assert_eq!(high, u32::from(Ipv4Addr::new(10, 47, 0, 200)));
    }
}
