use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use hr_common::callbacks::{SpoofCallback, TickCallback};
use rustc_hash::FxHashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::records::{DnsRecord, RData, RecordType};

const NEGATIVE_TTL_FLOOR_SECS: u32 = 60;

#[derive(Clone)]
struct CacheEntry {
    records: Vec<DnsRecord>,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() >= self.ttl
    }

    /// Returns records with adjusted TTL (remaining time)
    fn records_with_remaining_ttl(&self) -> Vec<DnsRecord> {
        let elapsed = self.inserted_at.elapsed().as_secs() as u32;
        self.records
            .iter()
            .map(|r| {
                let mut r = r.clone();
                r.ttl = r.ttl.saturating_sub(elapsed);
                r
            })
            .collect()
    }
}

#[derive(Clone)]
struct NegativeEntry {
    inserted_at: Instant,
    ttl: Duration,
}

impl NegativeEntry {
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() >= self.ttl
    }
}

#[derive(Hash, Eq, PartialEq, Clone)]
struct CacheKey {
    name: String,
    qtype: u16,
}

/// Outcome of a combined positive/negative cache lookup.
pub enum CacheLookup {
    Hit(Vec<DnsRecord>),
    NegativeHit,
    Miss,
}

pub struct DnsCache {
    entries: RwLock<FxHashMap<CacheKey, CacheEntry>>,
    negative: RwLock<FxHashMap<CacheKey, NegativeEntry>>,
    max_size: usize,
    spoof_domains: RwLock<Vec<String>>,
    spoof_callbacks: RwLock<Vec<SpoofCallback>>,
    tick_callbacks: RwLock<Vec<TickCallback>>,
}

impl DnsCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: RwLock::new(FxHashMap::with_capacity_and_hasher(max_size, Default::default())),
            negative: RwLock::new(FxHashMap::default()),
            max_size,
            spoof_domains: RwLock::new(Vec::new()),
            spoof_callbacks: RwLock::new(Vec::new()),
            tick_callbacks: RwLock::new(Vec::new()),
        }
    }

    pub async fn set_spoof_domains(&self, domains: Vec<String>) {
        *self.spoof_domains.write().await = domains;
    }

    pub async fn register_spoof_callback(&self, cb: SpoofCallback) {
        self.spoof_callbacks.write().await.push(cb);
    }

    pub async fn register_tick_callback(&self, cb: TickCallback) {
        self.tick_callbacks.write().await.push(cb);
    }

    /// Lookup cached records. Returns None if not found or expired.
    pub async fn get(&self, name: &str, qtype: RecordType) -> Option<Vec<DnsRecord>> {
        let key = CacheKey { name: name.to_lowercase(), qtype: qtype.to_u16() };

        let entries = self.entries.read().await;
        let entry = entries.get(&key)?;

        if entry.is_expired() {
            return None;
        }

        Some(entry.records_with_remaining_ttl())
    }

    /// Combined positive/negative lookup for the resolver's short-circuit path.
    pub async fn get_with_negative(&self, name: &str, qtype: RecordType) -> CacheLookup {
        if let Some(records) = self.get(name, qtype).await {
            return CacheLookup::Hit(records);
        }

        let key = CacheKey { name: name.to_lowercase(), qtype: qtype.to_u16() };
        let negative = self.negative.read().await;
        match negative.get(&key) {
            Some(entry) if !entry.is_expired() => CacheLookup::NegativeHit,
            _ => CacheLookup::Miss,
        }
    }

    /// Insert records into cache. Uses the minimum TTL from the records, and
    /// dispatches spoof callbacks for any configured spoof-domain match.
    pub async fn insert(&self, name: &str, qtype: RecordType, records: &[DnsRecord]) {
        if records.is_empty() {
            return;
        }

        let min_ttl = records.iter().map(|r| r.ttl).min().unwrap_or(60);
        if min_ttl == 0 {
            return;
        }

        let key = CacheKey { name: name.to_lowercase(), qtype: qtype.to_u16() };
        let entry = CacheEntry {
            records: records.to_vec(),
            inserted_at: Instant::now(),
            ttl: Duration::from_secs(min_ttl as u64),
        };

        {
            let mut entries = self.entries.write().await;

            if entries.len() >= self.max_size {
                entries.retain(|_, v| !v.is_expired());
            }
            if entries.len() >= self.max_size {
                if let Some(oldest_key) = entries.iter().min_by_key(|(_, v)| v.inserted_at).map(|(k, _)| k.clone()) {
                    entries.remove(&oldest_key);
                }
            }

            entries.insert(key, entry);
        }

        self.dispatch_spoof(name, records).await;
    }

    async fn dispatch_spoof(&self, name: &str, records: &[DnsRecord]) {
        let domains = self.spoof_domains.read().await;
        if domains.is_empty() {
            return;
        }
        if !domains.iter().any(|d| domain_matches(name, d)) {
            return;
        }
        drop(domains);

        let mut ips = Vec::new();
        for record in records {
            match &record.rdata {
                RData::A(ip) => ips.push(*ip),
                RData::HTTPS { svc_params, .. } => ips.extend(extract_ipv4_literals(svc_params)),
                _ => {}
            }
        }

        if ips.is_empty() {
            return;
        }

        let callbacks = self.spoof_callbacks.read().await;
        for ip in ips {
            for cb in callbacks.iter() {
                cb(ip, name);
            }
        }
    }

    /// Negative (NXDOMAIN/NODATA) cache insert, per RFC 2308: TTL is the
    /// upstream SOA MINIMUM when known, else a 60s floor.
    pub async fn insert_negative(&self, name: &str, qtype: RecordType, ttl: u32) {
        let ttl = ttl.max(NEGATIVE_TTL_FLOOR_SECS);
        let key = CacheKey { name: name.to_lowercase(), qtype: qtype.to_u16() };
        self.negative.write().await.insert(
            key,
            NegativeEntry { inserted_at: Instant::now(), ttl: Duration::from_secs(ttl as u64) },
        );
    }

    /// Remove expired entries from both namespaces (called periodically).
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, v| !v.is_expired());
        let positive_removed = before - entries.len();
        drop(entries);

        let mut negative = self.negative.write().await;
        let before = negative.len();
        negative.retain(|_, v| !v.is_expired());
        positive_removed + (before - negative.len())
    }

    /// Invoke registered tick callbacks, then sweep. Matches the cadence
    /// described for the cache sweeper worker (10s, called once per tick).
    pub async fn tick(&self) -> usize {
        let callbacks = self.tick_callbacks.read().await;
        for cb in callbacks.iter() {
            cb();
        }
        drop(callbacks);

        let removed = self.purge_expired().await;
        if removed > 0 {
            debug!("Cache sweep removed {} expired entr{}", removed, if removed == 1 { "y" } else { "ies" });
        }
        removed
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
        self.negative.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// Suffix match with a label boundary: `qname == d` or `qname` ends with
/// `.` + `d`, both normalized without a trailing dot. Mirrors the
/// hierarchical walk used by the adblock filter, applied as a single
/// membership check rather than a full walk since there's one `d` per call.
fn domain_matches(qname: &str, d: &str) -> bool {
    let qname = qname.trim_end_matches('.').to_lowercase();
    let d = d.trim_end_matches('.').to_lowercase();
    qname == d || qname.ends_with(&format!(".{}", d))
}

/// Extract IPv4 literals from raw bytes (e.g. SvcParams), validating each
/// candidate as four dot-separated octets in 0..=255.
fn extract_ipv4_literals(data: &[u8]) -> Vec<Ipv4Addr> {
    let text = String::from_utf8_lossy(data);
    let mut found = Vec::new();
    let bytes: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            let mut j = i;
            let mut dots = 0;
            while j < bytes.len() && (bytes[j].is_ascii_digit() || bytes[j] == '.') {
                if bytes[j] == '.' {
                    dots += 1;
                }
                j += 1;
            }
            if dots == 3 {
                let candidate: String = bytes[start..j].iter().collect();
                if let Ok(ip) = candidate.parse::<Ipv4Addr>() {
                    found.push(ip);
                }
            }
            i = j.max(i + 1);
        } else {
            i += 1;
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::DnsRecord;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_cache_insert_and_get() {
        let cache = DnsCache::new(100);
        let records = vec![DnsRecord::a("example.com", Ipv4Addr::new(1, 2, 3, 4), 300)];

        cache.insert("example.com", RecordType::A, &records).await;
        let result = cache.get("example.com", RecordType::A).await;
        assert!(result.is_some());
        assert_eq!(result.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cache_miss() {
        let cache = DnsCache::new(100);
        let result = cache.get("nonexistent.com", RecordType::A).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_cache_case_insensitive() {
        let cache = DnsCache::new(100);
        let records = vec![DnsRecord::a("Example.COM", Ipv4Addr::new(1, 2, 3, 4), 300)];

        cache.insert("Example.COM", RecordType::A, &records).await;
        let result = cache.get("example.com", RecordType::A).await;
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn test_cache_eviction() {
        let cache = DnsCache::new(2);
        let r1 = vec![DnsRecord::a("a.com", Ipv4Addr::new(1, 1, 1, 1), 300)];
        let r2 = vec![DnsRecord::a("b.com", Ipv4Addr::new(2, 2, 2, 2), 300)];
        let r3 = vec![DnsRecord::a("c.com", Ipv4Addr::new(3, 3, 3, 3), 300)];

        cache.insert("a.com", RecordType::A, &r1).await;
        cache.insert("b.com", RecordType::A, &r2).await;
        cache.insert("c.com", RecordType::A, &r3).await;

        assert!(cache.len().await <= 2);
    }

    #[tokio::test]
    async fn test_negative_cache_short_circuits() {
        let cache = DnsCache::new(100);
        cache.insert_negative("missing.example.com", RecordType::A, 300).await;

        match cache.get_with_negative("missing.example.com", RecordType::A).await {
            CacheLookup::NegativeHit => {}
            _ => panic!("expected negative hit"),
        }
    }

    #[tokio::test]
    async fn test_negative_cache_floor() {
        let cache = DnsCache::new(100);
        cache.insert_negative("nodata.example.com", RecordType::A, 1).await;
        match cache.get_with_negative("nodata.example.com", RecordType::A).await {
            CacheLookup::NegativeHit => {}
            _ => panic!("1s TTL should have been floored to 60s"),
        }
    }

    #[tokio::test]
    async fn test_spoof_callback_fires_on_suffix_match() {
        let cache = DnsCache::new(100);
        cache.set_spoof_domains(vec!["tracker.example".to_string()]).await;

        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        cache
            .register_spoof_callback(Arc::new(move |_ip, _domain| {
                hits_clone.fetch_add(1, Ordering::SeqCst);
            }))
            .await;

        let records = vec![DnsRecord::a("ads.tracker.example", Ipv4Addr::new(10, 1, 2, 3), 300)];
        cache.insert("ads.tracker.example", RecordType::A, &records).await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_spoof_does_not_match_substring() {
        let cache = DnsCache::new(100);
        cache.set_spoof_domains(vec!["tracker.example".to_string()]).await;

        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        cache
            .register_spoof_callback(Arc::new(move |_ip, _domain| {
                hits_clone.fetch_add(1, Ordering::SeqCst);
            }))
            .await;

        // "nottracker.example" contains "tracker.example" as a raw substring
        // but does not match under the label-boundary rule.
        let records = vec![DnsRecord::a("nottracker.example", Ipv4Addr::new(10, 1, 2, 3), 300)];
        cache.insert("nottracker.example", RecordType::A, &records).await;

        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_extract_ipv4_literals() {
        let data = b"alpn=h3 ipv4hint=192.0.2.1,198.51.100.9 port=443";
        let found = extract_ipv4_literals(data);
        assert_eq!(found, vec![Ipv4Addr::new(192, 0, 2, 1), Ipv4Addr::new(198, 51, 100, 9)]);
    }
}
