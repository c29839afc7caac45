pub mod cache;
pub mod config;
pub mod doh;
pub mod error;
pub mod logging;
pub mod packet;
pub mod records;
pub mod resolver;
pub mod server;
pub mod upstream;
pub mod zone;

pub use config::DnsConfig;
pub use error::DnsError;

use std::sync::Arc;
use tokio::sync::RwLock;

pub struct DnsState {
    pub config: config::DnsConfig,
    pub dns_cache: cache::DnsCache,
    pub upstream: upstream::UpstreamForwarder,
    pub doh: doh::DohClient,
    pub doh_enabled: bool,
    pub zones: zone::ZoneTable,
    pub query_logger: Option<logging::QueryLogger>,
    pub adblock: Arc<RwLock<hr_adblock::AdblockEngine>>,
    pub lease_store: Arc<RwLock<hr_dhcp::LeaseStore>>,
    pub adblock_enabled: bool,
    pub adblock_block_response: String,
}

impl DnsState {
    pub fn server_ip(&self) -> std::net::Ipv4Addr {
        self.config
            .listen_addresses
            .first()
            .and_then(|s| s.parse().ok())
            .unwrap_or(std::net::Ipv4Addr::UNSPECIFIED)
    }
}

pub type SharedDnsState = Arc<RwLock<DnsState>>;
