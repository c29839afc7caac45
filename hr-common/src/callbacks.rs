//! The boundary between the DHCP/DNS core and its host process.
//!
//! `spoof_callback` and `tick_callback` are the only hooks the DNS cache
//! invokes; route injection, notifications, or anything else the host wants
//! to do lives entirely outside this workspace and is reached only through
//! these two closures.

use std::net::Ipv4Addr;
use std::sync::Arc;

/// Invoked once per novel IP per matched spoof-domain answer.
pub type SpoofCallback = Arc<dyn Fn(Ipv4Addr, &str) + Send + Sync>;

/// Invoked once per cache sweep tick, e.g. for host-side snapshotting.
pub type TickCallback = Arc<dyn Fn() + Send + Sync>;
