use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    #[serde(default = "default_listen_addresses")]
    pub listen_addresses: Vec<String>,
    #[serde(default = "default_dns_port")]
    pub port: u16,
    #[serde(default = "default_upstream_servers")]
    pub upstream_servers: Vec<String>,
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_ms: u64,
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
    #[serde(default)]
    pub local_domain: String,
    #[serde(default)]
    pub wildcard_ipv4: String,
    #[serde(default)]
    pub wildcard_ipv6: String,
    #[serde(default)]
    pub static_records: Vec<StaticRecord>,
    #[serde(default = "default_true")]
    pub expand_hosts: bool,
    #[serde(default)]
    pub query_log_path: String,
    #[serde(default)]
    pub doh_providers: Vec<String>,
    #[serde(default = "default_true")]
    pub doh_enabled: bool,
    #[serde(default)]
    pub spoof_domains: Vec<String>,
    #[serde(default)]
    pub zones: Vec<ZoneConfig>,
    #[serde(default)]
    pub ptr_zones: Vec<PtrZoneConfig>,
    #[serde(default = "default_true")]
    pub strip_aaaa: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub origin: String,
    #[serde(default = "default_soa_ns")]
    pub ns: String,
    #[serde(default = "default_soa_admin")]
    pub admin_email: String,
    #[serde(default = "default_soa_serial")]
    pub serial: u32,
    #[serde(default = "default_soa_refresh")]
    pub refresh: u32,
    #[serde(default = "default_soa_retry")]
    pub retry: u32,
    #[serde(default = "default_soa_expire")]
    pub expire: u32,
    #[serde(default = "default_ttl")]
    pub minimum: u32,
    #[serde(default)]
    pub records: Vec<ZoneRecordConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneRecordConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub value: String,
    #[serde(default = "default_ttl")]
    pub ttl: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PtrZoneConfig {
    pub prefix: String,
    /// host-octet (as a string key, since JSON object keys are always strings) -> targets
    pub entries: std::collections::HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub value: String,
    #[serde(default = "default_ttl")]
    pub ttl: u32,
}

/// Adblock resolver config: the subset of adblock config that the DNS resolver needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdblockResolverConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_block_response")]
    pub block_response: String,
}

// Default functions
fn default_listen_addresses() -> Vec<String> {
    vec!["0.0.0.0".to_string()]
}
fn default_dns_port() -> u16 {
    53
}
fn default_upstream_servers() -> Vec<String> {
    vec!["1.1.1.1".to_string(), "8.8.8.8".to_string()]
}
fn default_upstream_timeout() -> u64 {
    3000
}
fn default_cache_size() -> usize {
    1000
}
fn default_ttl() -> u32 {
    300
}
fn default_true() -> bool {
    true
}
fn default_block_response() -> String {
    "zero_ip".to_string()
}
fn default_soa_ns() -> String {
    "ns1.lan.".to_string()
}
fn default_soa_admin() -> String {
    "admin.lan".to_string()
}
fn default_soa_serial() -> u32 {
    1
}
fn default_soa_refresh() -> u32 {
    3600
}
fn default_soa_retry() -> u32 {
    600
}
fn default_soa_expire() -> u32 {
    86400
}

impl DnsConfig {
    /// Build the zone table described by this config's `zones`/`ptr_zones` sections.
    pub fn build_zone_table(&self) -> crate::zone::ZoneTable {
        use crate::records::{RData, RecordType};
        use crate::zone::{PtrZone, SoaParams, Zone};

        let mut table = crate::zone::ZoneTable::new();

        for zc in &self.zones {
            let mut zone = Zone::new(
                &zc.origin,
                SoaParams {
                    ns: zc.ns.clone(),
                    admin_email: zc.admin_email.clone(),
                    serial: zc.serial,
                    refresh: zc.refresh,
                    retry: zc.retry,
                    expire: zc.expire,
                    minimum: zc.minimum,
                },
            );

            for rec in &zc.records {
                let rtype = match rec.record_type.to_uppercase().as_str() {
                    "A" => RecordType::A,
                    "AAAA" => RecordType::AAAA,
                    "CNAME" => RecordType::CNAME,
                    "NS" => RecordType::NS,
                    "PTR" => RecordType::PTR,
                    "TXT" => RecordType::TXT,
                    _ => continue,
                };
                let (rdata, rdata_domain) = match rtype {
                    RecordType::A => match rec.value.parse() {
                        Ok(ip) => (RData::A(ip), None),
                        Err(_) => continue,
                    },
                    RecordType::AAAA => match rec.value.parse() {
                        Ok(ip) => (RData::AAAA(ip), None),
                        Err(_) => continue,
                    },
                    RecordType::CNAME => (RData::CNAME(rec.value.clone()), Some(rec.value.clone())),
                    RecordType::NS => (RData::NS(rec.value.clone()), Some(rec.value.clone())),
                    RecordType::PTR => (RData::PTR(rec.value.clone()), Some(rec.value.clone())),
                    RecordType::TXT => (RData::TXT(rec.value.clone()), None),
                    _ => continue,
                };
                zone.add_record(rec.name.clone(), rtype, rdata_domain, rdata, rec.ttl);
            }

            table.add_zone(zone);
        }

        for pz in &self.ptr_zones {
            let mut ptr_zone = PtrZone::new(&pz.prefix);
            for (octet_str, targets) in &pz.entries {
                if let Ok(octet) = octet_str.parse::<u8>() {
                    for target in targets {
                        ptr_zone.add(octet, target);
                    }
                }
            }
            table.add_ptr_zone(ptr_zone);
        }

        table
    }
}

impl Default for DnsConfig {
    fn default() -> Self {
        serde_json::from_str("{}").unwrap()
    }
}

impl Default for AdblockResolverConfig {
    fn default() -> Self {
        serde_json::from_str("{}").unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_dns_config() {
        let config = DnsConfig::default();
        assert_eq!(config.port, 53);
        assert_eq!(config.cache_size, 1000);
        assert!(config.expand_hosts);
        assert_eq!(config.upstream_servers.len(), 2);
    }

    #[test]
    fn test_roundtrip() {
        let json = r#"{
            "port": 5353,
            "local_domain": "test.lab"
        }"#;
        let config: DnsConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.port, 5353);
        assert_eq!(config.local_domain, "test.lab");

        let serialized = serde_json::to_string(&config).unwrap();
        let config2: DnsConfig = serde_json::from_str(&serialized).unwrap();
        assert_eq!(config2.port, 5353);
    }

    #[test]
    fn test_adblock_resolver_config_defaults() {
        let config = AdblockResolverConfig::default();
        assert!(config.enabled);
        assert_eq!(config.block_response, "zero_ip");
    }
}
