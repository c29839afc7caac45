mod supervisor;

use hr_adblock::AdblockEngine;
use hr_dns::DnsState;
use signal_hook::consts::SIGHUP;
use signal_hook_tokio::Signals;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use supervisor::{spawn_supervised, ServicePriority};
use tokio::sync::RwLock;
use tokio_stream::StreamExt;
use tracing::{error, info, warn};

/// Combined config, matching the original single-file layout: one JSON
/// document with a top-level key per subsystem.
#[derive(serde::Deserialize, Default)]
struct HomerouteConfig {
    #[serde(default)]
    dns: hr_dns::DnsConfig,
    #[serde(default)]
    dhcp: hr_dhcp::DhcpConfig,
    #[serde(default)]
    adblock: hr_adblock::config::AdblockConfig,
}

impl HomerouteConfig {
    fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            info!("No config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }
}

fn config_path() -> PathBuf {
    std::env::var("HOMEROUTE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/etc/homeroute/config.json"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,homeroute=debug".parse().unwrap()),
        )
        .init();

    info!("homeroute starting...");

    let config_path = config_path();
    let config = HomerouteConfig::load(&config_path)?;

    info!(
        "Config loaded: DNS port {}, DHCP {}, adblock {}",
        config.dns.port,
        if config.dhcp.enabled { "enabled" } else { "disabled" },
        if config.adblock.enabled { "enabled" } else { "disabled" },
    );

    // ── Adblock engine ──────────────────────────────────────────────────

    let mut adblock_engine = AdblockEngine::new();
    adblock_engine.set_whitelist(config.adblock.whitelist.clone());

    if config.adblock.enabled {
        let cache_path = PathBuf::from(&config.adblock.data_dir).join("domains.json");
        match hr_adblock::sources::load_cache(&cache_path) {
            Ok(domains) => {
                info!("Loaded {} blocked domains from cache", domains.len());
                adblock_engine.set_blocked(domains);
            }
            Err(_) => info!("No adblock cache found, will download on startup"),
        }
    }

    let adblock = Arc::new(RwLock::new(adblock_engine));

    // ── Shared lease store (DHCP writes, DNS reads for expand-hosts) ────

    let mut lease_store = hr_dhcp::LeaseStore::new(&config.dhcp.host_file);
    if let Err(e) = lease_store.load_from_file() {
        warn!("Failed to load lease file: {}", e);
    }
    let lease_store = Arc::new(RwLock::new(lease_store));

    let dhcp_state: hr_dhcp::SharedDhcpState = Arc::new(RwLock::new(hr_dhcp::DhcpState {
        config: config.dhcp.clone(),
        lease_store: lease_store.clone(),
        transactions: hr_dhcp::TransactionTable::new(),
    }));

    // ── DNS state ────────────────────────────────────────────────────────

    let dns_cache = hr_dns::cache::DnsCache::new(config.dns.cache_size);
    dns_cache.set_spoof_domains(config.dns.spoof_domains.clone()).await;
    dns_cache
        .register_spoof_callback(Arc::new(|ip, domain| {
            info!("spoof match: {} resolved to {} — route injection callback fires here", domain, ip);
        }))
        .await;

    let upstream = hr_dns::upstream::UpstreamForwarder::new(
        config.dns.upstream_servers.clone(),
        config.dns.upstream_timeout_ms,
    );

    let doh = hr_dns::doh::DohClient::new(&config.dns.doh_providers)?;
    let zones = config.dns.build_zone_table();

    let query_logger = if !config.dns.query_log_path.is_empty() {
        Some(hr_dns::logging::QueryLogger::new(&config.dns.query_log_path))
    } else {
        None
    };

    let dns_state: hr_dns::SharedDnsState = Arc::new(RwLock::new(DnsState {
        config: config.dns.clone(),
        dns_cache,
        upstream,
        doh,
        doh_enabled: config.dns.doh_enabled,
        zones,
        query_logger,
        adblock: adblock.clone(),
        lease_store: lease_store.clone(),
        adblock_enabled: config.adblock.enabled,
        adblock_block_response: config.adblock.block_response.clone(),
    }));

    // ── Spawn supervised services ────────────────────────────────────────

    info!("Starting supervised services...");

    for addr_str in &config.dns.listen_addresses {
        let addr_formatted = if addr_str.contains(':') {
            format!("[{}]:{}", addr_str, config.dns.port)
        } else {
            format!("{}:{}", addr_str, config.dns.port)
        };
        let addr: SocketAddr = addr_formatted.parse()?;

        let dns_state_c = dns_state.clone();
        spawn_supervised("dns-udp", ServicePriority::Critical, move || {
            let state = dns_state_c.clone();
            async move { hr_dns::server::run_udp_server(addr, state).await }
        });

        let dns_state_c = dns_state.clone();
        spawn_supervised("dns-tcp", ServicePriority::Critical, move || {
            let state = dns_state_c.clone();
            async move { hr_dns::server::run_tcp_server(addr, state).await }
        });
    }

    {
        let dns_state_c = dns_state.clone();
        tokio::spawn(async move { hr_dns::server::run_cache_sweeper(dns_state_c).await });
    }

    if config.dhcp.enabled {
        let dhcp_state_c = dhcp_state.clone();
        spawn_supervised("dhcp", ServicePriority::Critical, move || {
            let state = dhcp_state_c.clone();
            async move { hr_dhcp::server::run_dhcp_server(state).await }
        });

        let dhcp_state_c = dhcp_state.clone();
        tokio::spawn(async move { hr_dhcp::server::run_lease_sweeper(dhcp_state_c).await });
    } else {
        info!("DHCP server disabled by config");
    }

    // Adblock initial download + auto-update
    if config.adblock.enabled {
        let adblock_c = adblock.clone();
        let sources = config.adblock.sources.clone();
        let data_dir = config.adblock.data_dir.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            info!("Starting initial adblock list download...");
            do_adblock_update(&adblock_c, &sources, &data_dir).await;
        });

        if config.adblock.auto_update_hours > 0 {
            let adblock_c = adblock.clone();
            let sources = config.adblock.sources.clone();
            let data_dir = config.adblock.data_dir.clone();
            let hours = config.adblock.auto_update_hours;
            tokio::spawn(async move {
                let interval = std::time::Duration::from_secs(hours * 3600);
                loop {
                    tokio::time::sleep(interval).await;
                    info!("Running scheduled adblock update...");
                    do_adblock_update(&adblock_c, &sources, &data_dir).await;
                }
            });
        }
    }

    // ── SIGHUP reload ────────────────────────────────────────────────────

    {
        let dns_state_reload = dns_state.clone();
        let adblock_reload = adblock.clone();
        let config_path_reload = config_path.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_sighup(config_path_reload, dns_state_reload, adblock_reload).await {
                error!("SIGHUP handler error: {}", e);
            }
        });
    }

    info!("homeroute started successfully");
    info!("  DNS: listening on port {}", config.dns.port);
    info!("  DHCP: {}", if config.dhcp.enabled { "listening on port 67" } else { "disabled" });
    info!("  Adblock: {} domains blocked", adblock.read().await.domain_count());

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    Ok(())
}

async fn handle_sighup(
    config_path: PathBuf,
    dns_state: hr_dns::SharedDnsState,
    adblock: Arc<RwLock<AdblockEngine>>,
) -> anyhow::Result<()> {
    let mut signals = Signals::new([SIGHUP])?;

    while let Some(signal) = signals.next().await {
        if signal == SIGHUP {
            info!("Received SIGHUP, reloading config...");

            match HomerouteConfig::load(&config_path) {
                Ok(new_config) => {
                    let mut s = dns_state.write().await;
                    s.upstream = hr_dns::upstream::UpstreamForwarder::new(
                        new_config.dns.upstream_servers.clone(),
                        new_config.dns.upstream_timeout_ms,
                    );
                    match hr_dns::doh::DohClient::new(&new_config.dns.doh_providers) {
                        Ok(doh) => s.doh = doh,
                        Err(e) => error!("Failed to reload DoH providers: {}", e),
                    }
                    s.zones = new_config.dns.build_zone_table();
                    s.adblock_enabled = new_config.adblock.enabled;
                    s.adblock_block_response = new_config.adblock.block_response.clone();
                    s.dns_cache.set_spoof_domains(new_config.dns.spoof_domains.clone()).await;
                    s.dns_cache.clear().await;
                    s.config = new_config.dns;

                    let mut ab = adblock.write().await;
                    ab.set_whitelist(new_config.adblock.whitelist);

                    info!("Config reloaded");
                }
                Err(e) => error!("Failed to reload config: {}", e),
            }
        }
    }

    Ok(())
}

async fn do_adblock_update(adblock: &Arc<RwLock<AdblockEngine>>, sources: &[hr_adblock::config::AdblockSource], data_dir: &str) {
    let (domains, _results) = hr_adblock::sources::download_all(sources).await;
    let count = domains.len();

    {
        let mut ab = adblock.write().await;
        ab.set_blocked(domains.clone());
    }

    let cache_path = PathBuf::from(data_dir).join("domains.json");
    if let Err(e) = hr_adblock::sources::save_cache(&domains, &cache_path) {
        warn!("Failed to save adblock cache: {}", e);
    }

    info!("Adblock update complete: {} unique domains blocked", count);
}
