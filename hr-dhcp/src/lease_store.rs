use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::DhcpConfig;

/// A leased or reserved host. Identity key is `mac`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub mac: String,
    pub ip: Ipv4Addr,
    pub hostname: String,
    /// UNIX seconds of last renewal. 0 marks a static reservation, never expired.
    pub last_used: u64,
}

impl Host {
    pub fn new(mac: String, ip: Ipv4Addr, hostname: String, last_used: u64) -> Self {
        Self { mac, ip, hostname, last_used }
    }
}

/// On-disk shape: `{index: {ip: {IP: MAC}}, devices: {MAC: [MAC, IP, HOST, last_used]}}`.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStore {
    index: PersistedIndex,
    devices: HashMap<String, (String, String, String, String)>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedIndex {
    ip: HashMap<String, String>,
}

/// MAC-indexed lease store with a secondary IP index, mirroring the
/// original_source's `data['index']['ip']` / `data['devices']` layout.
pub struct LeaseStore {
    devices: HashMap<String, Host>,
    ip_index: HashMap<Ipv4Addr, String>,
    file_path: PathBuf,
}

impl LeaseStore {
    pub fn new(file_path: &str) -> Self {
        Self {
            devices: HashMap::new(),
            ip_index: HashMap::new(),
            file_path: PathBuf::from(file_path),
        }
    }

    pub fn load_from_file(&mut self) -> Result<usize> {
        if !self.file_path.exists() {
            return Ok(0);
        }

        let content = std::fs::read_to_string(&self.file_path)
            .with_context(|| format!("Failed to read leases from {}", self.file_path.display()))?;
        let persisted: PersistedStore = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse leases from {}", self.file_path.display()))?;

        self.devices.clear();
        self.ip_index.clear();

        for (mac, (_mac2, ip, hostname, last_used)) in persisted.devices {
            let ip: Ipv4Addr = match ip.parse() {
                Ok(v) => v,
                Err(_) => {
                    warn!("Invalid IP in lease file for {}: {}", mac, ip);
                    continue;
                }
            };
            let last_used: u64 = last_used.parse().unwrap_or(0);
            self.insert_inner(Host::new(mac, ip, hostname, last_used));
        }

        info!("Loaded {} leases from {}", self.devices.len(), self.file_path.display());
        Ok(self.devices.len())
    }

    fn save_to_file(&self) -> Result<()> {
        let index = PersistedIndex {
            ip: self
                .ip_index
                .iter()
                .map(|(ip, mac)| (ip.to_string(), mac.clone()))
                .collect(),
        };
        let devices = self
            .devices
            .values()
            .map(|h| {
                (
                    h.mac.clone(),
                    (h.mac.clone(), h.ip.to_string(), h.hostname.clone(), h.last_used.to_string()),
                )
            })
            .collect();

        let persisted = PersistedStore { index, devices };
        let content = serde_json::to_string_pretty(&persisted)?;

        let tmp_path = self.file_path.with_extension("tmp");
        if let Some(parent) = self.file_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("Failed to write leases to {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.file_path)
            .with_context(|| format!("Failed to rename leases to {}", self.file_path.display()))?;

        Ok(())
    }

    fn persist(&self) {
        if let Err(e) = self.save_to_file() {
            warn!("Failed to persist lease store: {}", e);
        }
    }

    fn insert_inner(&mut self, host: Host) {
        self.ip_index.insert(host.ip, host.mac.clone());
        self.devices.insert(host.mac.clone(), host);
    }

    /// Lookup by MAC, or by IP via the secondary index.
    pub fn get(&self, ip: Option<Ipv4Addr>, mac: Option<&str>) -> Option<Host> {
        if let Some(mac) = mac {
            return self.devices.get(mac).cloned();
        }
        let ip = ip?;
        let mac = self.ip_index.get(&ip)?;
        self.devices.get(mac).cloned()
    }

    /// Insert or overwrite a host, updating both indexes, then persist.
    pub fn add(&mut self, host: Host) {
        if let Some(old) = self.devices.get(&host.mac) {
            if old.ip != host.ip {
                self.ip_index.remove(&old.ip);
            }
        }
        self.insert_inner(host);
        self.persist();
    }

    /// Remove from both indexes, then persist.
    pub fn delete(&mut self, host: &Host) {
        if let Some(existing) = self.devices.remove(&host.mac) {
            self.ip_index.remove(&existing.ip);
        }
        self.persist();
    }

    /// Delete the old record for `host.mac` (if any) and add the replacement, one persist.
    pub fn replace(&mut self, host: Host) {
        if let Some(old) = self.devices.remove(&host.mac) {
            self.ip_index.remove(&old.ip);
        }
        self.insert_inner(host);
        self.persist();
    }

    pub fn all(&self) -> Vec<Host> {
        self.devices.values().cloned().collect()
    }

    fn ip_in_use_by_other(&self, ip: Ipv4Addr, mac: &str) -> bool {
        self.ip_index.get(&ip).is_some_and(|m| m != mac)
    }

    /// Assignment policy (see DESIGN.md): existing lease, then requested IP,
    /// then a uniformly random free address in the configured range.
    /// Returns `Ipv4Addr::UNSPECIFIED` when the range is exhausted.
    pub fn find_or_register(
        &mut self,
        mac: &str,
        requested_ip: Option<Ipv4Addr>,
        hostname: Option<&str>,
        config: &DhcpConfig,
    ) -> Ipv4Addr {
        let network = config.network_cidr();
        let (low, high) = config.dhcp_range();

        if let Some(existing) = self.devices.get(mac).cloned() {
            if network.contains(&existing.ip) {
                self.touch(mac);
                return existing.ip;
            }
            // Stale: no longer in the configured network. Drop and recompute.
            self.delete(&existing);
            return self.find_or_register(mac, requested_ip, hostname, config);
        }

        if let Some(req_ip) = requested_ip {
            if network.contains(&req_ip) && !self.ip_in_use_by_other(req_ip, mac) {
                self.bind(mac, req_ip, hostname);
                return req_ip;
            }
        }

        let range_len = (high.saturating_sub(low) as u64) + 1;
        if self.ip_index.len() as u64 >= range_len {
            warn!("DHCP range exhausted ({} addresses in use)", self.ip_index.len());
            return Ipv4Addr::UNSPECIFIED;
        }

        let mut rng = rand::rng();
        loop {
            let candidate = Ipv4Addr::from(rng.random_range(low..=high));
            if !self.ip_index.contains_key(&candidate) {
                self.bind(mac, candidate, hostname);
                return candidate;
            }
        }
    }

    fn bind(&mut self, mac: &str, ip: Ipv4Addr, hostname: Option<&str>) {
        let hostname = hostname
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("device-{}", mac.replace(':', "").to_lowercase()));
        let last_used = now_secs();
        self.add(Host::new(mac.to_string(), ip, hostname, last_used));
    }

    fn touch(&mut self, mac: &str) {
        if let Some(host) = self.devices.get_mut(mac) {
            if host.last_used != 0 {
                host.last_used = now_secs();
            }
        }
        self.persist();
    }

    /// Background expiry sweep: delete any non-static host whose lease has lapsed.
    /// Returns the number of leases removed.
    pub fn sweep_expired(&mut self, lease_time_secs: u64) -> usize {
        let now = now_secs();
        let stale: Vec<String> = self
            .devices
            .values()
            .filter(|h| h.last_used > 0 && now.saturating_sub(h.last_used) > lease_time_secs)
            .map(|h| h.mac.clone())
            .collect();

        for mac in &stale {
            if let Some(host) = self.devices.get(mac).cloned() {
                self.devices.remove(mac);
                self.ip_index.remove(&host.ip);
            }
        }
        if !stale.is_empty() {
            self.persist();
        }
        stale.len()
    }

    pub fn find_ip_by_hostname(&self, hostname: &str) -> Option<Ipv4Addr> {
        let hostname = hostname.to_lowercase();
        self.devices
            .values()
            .find(|h| h.hostname.to_lowercase() == hostname)
            .map(|h| h.ip)
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

impl Default for LeaseStore {
    fn default() -> Self {
        Self::new("/var/lib/server-dashboard/dhcp-leases.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> DhcpConfig {
        DhcpConfig {
            network: "10.0.0.0/24".to_string(),
            range_start: "10.0.0.10".to_string(),
            range_end: "10.0.0.20".to_string(),
            ..DhcpConfig::default()
        }
    }

    #[test]
    fn test_add_and_get() {
        let mut store = LeaseStore::new("/tmp/test-leases-add.json");
        store.add(Host::new("AA:BB:CC:DD:EE:FF".to_string(), Ipv4Addr::new(10, 0, 0, 50), "laptop".to_string(), 1));

        let by_mac = store.get(None, Some("AA:BB:CC:DD:EE:FF")).unwrap();
        assert_eq!(by_mac.ip, Ipv4Addr::new(10, 0, 0, 50));

        let by_ip = store.get(Some(Ipv4Addr::new(10, 0, 0, 50)), None).unwrap();
        assert_eq!(by_ip.mac, "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn test_find_or_register_existing_lease() {
        let mut store = LeaseStore::new("/tmp/test-leases-existing.json");
        let config = test_config();
        store.add(Host::new("AA:BB:CC:DD:EE:FF".to_string(), Ipv4Addr::new(10, 0, 0, 15), "h".to_string(), now_secs()));

        let ip = store.find_or_register("AA:BB:CC:DD:EE:FF", None, None, &config);
        assert_eq!(ip, Ipv4Addr::new(10, 0, 0, 15));
    }

    #[test]
    fn test_find_or_register_requested_ip() {
        let mut store = LeaseStore::new("/tmp/test-leases-requested.json");
        let config = test_config();
        let ip = store.find_or_register("AA:BB:CC:DD:EE:FF", Some(Ipv4Addr::new(10, 0, 0, 18)), Some("host"), &config);
        assert_eq!(ip, Ipv4Addr::new(10, 0, 0, 18));
    }

    #[test]
    fn test_find_or_register_random_allocation() {
        let mut store = LeaseStore::new("/tmp/test-leases-random.json");
        let config = test_config();
        let ip = store.find_or_register("AA:BB:CC:DD:EE:FF", None, None, &config);
        let ip_u32 = u32::from(ip);
        assert!(ip_u32 >= u32::from(Ipv4Addr::new(10, 0, 0, 10)));
        assert!(ip_u32 <= u32::from(Ipv4Addr::new(10, 0, 0, 20)));
    }

    #[test]
    fn test_range_exhausted() {
        let mut store = LeaseStore::new("/tmp/test-leases-exhausted.json");
        let mut config = test_config();
        config.range_start = "10.0.0.10".to_string();
        config.range_end = "10.0.0.11".to_string();

        let ip1 = store.find_or_register("AA:AA:AA:AA:AA:01", None, None, &config);
        let ip2 = store.find_or_register("AA:AA:AA:AA:AA:02", None, None, &config);
        assert_ne!(ip1, Ipv4Addr::UNSPECIFIED);
        assert_ne!(ip2, Ipv4Addr::UNSPECIFIED);

        let ip3 = store.find_or_register("AA:AA:AA:AA:AA:03", None, None, &config);
        assert_eq!(ip3, Ipv4Addr::UNSPECIFIED);
    }

    #[test]
    fn test_sweep_expired() {
        let mut store = LeaseStore::new("/tmp/test-leases-sweep.json");
        store.add(Host::new("AA:BB:CC:DD:EE:FF".to_string(), Ipv4Addr::new(10, 0, 0, 50), "h".to_string(), now_secs() - 301));
        let removed = store.sweep_expired(300);
        assert_eq!(removed, 1);
        assert!(store.get(None, Some("AA:BB:CC:DD:EE:FF")).is_none());
    }

    #[test]
    fn test_static_reservation_never_expires() {
        let mut store = LeaseStore::new("/tmp/test-leases-static.json");
        store.add(Host::new("AA:BB:CC:DD:EE:FF".to_string(), Ipv4Addr::new(10, 0, 0, 50), "h".to_string(), 0));
        let removed = store.sweep_expired(300);
        assert_eq!(removed, 0);
    }
}
