use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Transaction lifecycle state, keyed by the DHCP `xid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Open,
    Closed,
}

#[derive(Debug, Clone)]
pub struct Transaction {
    pub xid: u32,
    pub state: TransactionState,
    started_at: Instant,
}

impl Transaction {
    fn new(xid: u32) -> Self {
        Self { xid, state: TransactionState::Open, started_at: Instant::now() }
    }

    pub fn is_expired(&self, deadline: Duration) -> bool {
        self.started_at.elapsed() > deadline
    }
}

const TRANSACTION_DEADLINE: Duration = Duration::from_secs(40);

/// Tracks in-flight DHCP exchanges by xid so the listener can correlate
/// DISCOVER/OFFER with the REQUEST/ACK that follows.
#[derive(Default)]
pub struct TransactionTable {
    transactions: HashMap<u32, Transaction>,
}

impl TransactionTable {
    pub fn new() -> Self {
        Self { transactions: HashMap::new() }
    }

    /// Open (or re-open) the transaction for `xid`.
    pub fn open(&mut self, xid: u32) {
        self.transactions.insert(xid, Transaction::new(xid));
    }

    pub fn close(&mut self, xid: u32) {
        if let Some(txn) = self.transactions.get_mut(&xid) {
            txn.state = TransactionState::Closed;
        }
    }

    pub fn get(&self, xid: u32) -> Option<&Transaction> {
        self.transactions.get(&xid)
    }

    /// Drop closed transactions and any that exceeded the 40s deadline.
    pub fn reap(&mut self) -> usize {
        let before = self.transactions.len();
        self.transactions.retain(|_, txn| {
            txn.state != TransactionState::Closed && !txn.is_expired(TRANSACTION_DEADLINE)
        });
        before - self.transactions.len()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_close_reap() {
        let mut table = TransactionTable::new();
        table.open(0x1234);
        assert_eq!(table.get(0x1234).unwrap().state, TransactionState::Open);

        table.close(0x1234);
        assert_eq!(table.reap(), 1);
        assert!(table.is_empty());
    }

    #[test]
    fn test_reap_keeps_open() {
        let mut table = TransactionTable::new();
        table.open(0x1);
        assert_eq!(table.reap(), 0);
        assert_eq!(table.len(), 1);
    }
}
