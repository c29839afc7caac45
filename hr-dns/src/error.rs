use thiserror::Error;

/// Error taxonomy for the DNS resolver, zone model, cache, and DoH client (C4–C8).
#[derive(Error, Debug)]
pub enum DnsError {
    #[error("malformed DNS packet: {0}")]
    BadPacket(String),
    #[error("DoH query failed: {0}")]
    DNSQueryFailed(String),
    #[error("upstream timed out")]
    UpstreamTimeout,
    #[error("DoH provider not configured: {0}")]
    DoHProviderNotExist(String),
    #[error("invalid DoH provider configuration: {0}")]
    InvalidDoHProvider(String),
}
