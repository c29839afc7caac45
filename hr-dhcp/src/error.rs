use thiserror::Error;

/// Error taxonomy for the DHCP transaction engine and lease store (C1–C3).
#[derive(Error, Debug)]
pub enum DhcpError {
    #[error("malformed DHCP packet: {0}")]
    BadPacket(String),
    #[error("DHCP address range exhausted")]
    RangeExhausted,
    #[error("lease store persistence failed: {0}")]
    PersistenceError(#[from] std::io::Error),
    #[error("broadcast socket error on {addr}: {source}")]
    SocketError { addr: std::net::Ipv4Addr, #[source] source: std::io::Error },
}
