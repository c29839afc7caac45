pub mod config;
pub mod error;
pub mod options;
pub mod packet;
pub mod lease_store;
pub mod state_machine;
pub mod server;
pub mod transaction;

pub use config::DhcpConfig;
pub use error::DhcpError;
pub use lease_store::{Host, LeaseStore};
pub use transaction::TransactionTable;

use std::sync::Arc;
use tokio::sync::RwLock;

pub struct DhcpState {
    pub config: config::DhcpConfig,
    /// Shared with `hr_dns::DnsState` so expand-hosts lookups see live leases
    /// without a separate sync task.
    pub lease_store: Arc<RwLock<lease_store::LeaseStore>>,
    pub transactions: TransactionTable,
}

pub type SharedDhcpState = Arc<RwLock<DhcpState>>;
