//! Authoritative local zone model (forward + PTR), addressed via longest-suffix match.

use std::collections::HashMap;

use crate::records::{DnsRecord, RData, RecordType};

/// SOA parameters for a forward zone.
#[derive(Debug, Clone)]
pub struct SoaParams {
    pub ns: String,
    pub admin_email: String,
    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minimum: u32,
}

impl SoaParams {
    /// Build the SOA rdata for this zone's origin. '@' in the admin email is
    /// normalized to '.' per RFC 1035 §3.3.13 (rname is a domain, not a mailbox).
    fn to_rdata(&self) -> RData {
        RData::SOA {
            mname: self.ns.clone(),
            rname: self.admin_email.replace('@', "."),
            serial: self.serial,
            refresh: self.refresh,
            retry: self.retry,
            expire: self.expire,
            minimum: self.minimum,
        }
    }
}

/// An authoritative forward zone: an origin label, its SOA, and a record list.
#[derive(Debug, Clone)]
pub struct Zone {
    pub origin: String,
    pub soa: SoaParams,
    pub records: Vec<DnsRecord>,
}

impl Zone {
    pub fn new(origin: &str, soa: SoaParams) -> Self {
        Self { origin: normalize_origin(origin), soa, records: Vec::new() }
    }

    /// Expand `@` to the zone origin, append the trailing '.', and append the
    /// record. Rejects owners outside the zone (suffix match against origin).
    pub fn add_record(&mut self, mut domain: String, rtype: RecordType, rdata_domain: Option<String>, rdata: RData, ttl: u32) -> bool {
        if domain == "@" || domain.is_empty() {
            domain = self.origin.clone();
        } else {
            domain = format!("{}.", domain.trim_end_matches('.'));
            if !domain.ends_with(&self.origin) {
                domain = format!("{}.{}", domain.trim_end_matches('.'), self.origin);
            }
        }

        if !domain.ends_with(&self.origin) {
            return false;
        }

        let rdata = match (&rdata, rdata_domain) {
            (RData::CNAME(_), Some(target)) => RData::CNAME(self.expand_at(&target)),
            (RData::PTR(_), Some(target)) => RData::PTR(self.expand_at(&target)),
            (RData::NS(_), Some(target)) => RData::NS(self.expand_at(&target)),
            _ => rdata,
        };

        self.records.push(DnsRecord { name: domain, rtype, class: crate::records::RecordClass::IN, ttl, rdata });
        true
    }

    fn expand_at(&self, token: &str) -> String {
        if token == "@" {
            self.origin.clone()
        } else {
            format!("{}.", token.trim_end_matches('.'))
        }
    }

    /// The implicit SOA record for this zone's origin.
    pub fn soa_record(&self) -> DnsRecord {
        DnsRecord {
            name: self.origin.clone(),
            rtype: RecordType::SOA,
            class: crate::records::RecordClass::IN,
            ttl: self.soa.minimum,
            rdata: self.soa.to_rdata(),
        }
    }

    /// Every record whose (qtype, qname) matches the query.
    pub fn find(&self, qname: &str, qtype: RecordType) -> Vec<DnsRecord> {
        let qname = normalize_origin(qname);
        self.records
            .iter()
            .filter(|r| r.name == qname && (r.rtype == qtype || qtype == RecordType::ANY))
            .cloned()
            .collect()
    }
}

fn normalize_origin(label: &str) -> String {
    let label = label.to_lowercase();
    if label.ends_with('.') {
        label
    } else {
        format!("{}.", label)
    }
}

/// A reverse-IPv4 zone: network prefix (e.g. "10.47.0") -> host octet -> PTR targets.
#[derive(Debug, Clone)]
pub struct PtrZone {
    pub prefix: String,
    pub entries: HashMap<u8, Vec<String>>,
}

impl PtrZone {
    pub fn new(prefix: &str) -> Self {
        Self { prefix: prefix.to_string(), entries: HashMap::new() }
    }

    pub fn add(&mut self, host_octet: u8, target: &str) {
        self.entries.entry(host_octet).or_default().push(format!("{}.", target.trim_end_matches('.')));
    }

    /// The reverse label this zone answers for, e.g. "10.47.0.in-addr.arpa.".
    pub fn reverse_label(&self) -> String {
        let reversed: Vec<&str> = self.prefix.split('.').rev().collect();
        format!("{}.in-addr.arpa.", reversed.join("."))
    }

    /// Lookup by full reverse label, e.g. "1.0.47.10.in-addr.arpa.".
    pub fn find(&self, qname: &str) -> Vec<DnsRecord> {
        let qname = normalize_origin(qname);
        let expected_suffix = self.reverse_label();
        let Some(host_part) = qname.strip_suffix(&expected_suffix) else {
            return vec![];
        };
        let host_octet: u8 = match host_part.trim_end_matches('.').parse() {
            Ok(v) => v,
            Err(_) => return vec![],
        };
        self.entries
            .get(&host_octet)
            .map(|targets| targets.iter().map(|t| DnsRecord::ptr(&qname, t, 300)).collect())
            .unwrap_or_default()
    }
}

/// The set of locally-authoritative zones, addressed by longest-suffix match.
#[derive(Default)]
pub struct ZoneTable {
    forward: Vec<Zone>,
    ptr: Vec<PtrZone>,
}

impl ZoneTable {
    pub fn new() -> Self {
        Self { forward: Vec::new(), ptr: Vec::new() }
    }

    pub fn add_zone(&mut self, zone: Zone) {
        self.forward.push(zone);
    }

    pub fn add_ptr_zone(&mut self, zone: PtrZone) {
        self.ptr.push(zone);
    }

    /// Longest-suffix match against every configured zone's origin.
    pub fn find_zone(&self, qname: &str) -> Option<&Zone> {
        let qname = normalize_origin(qname);
        self.forward
            .iter()
            .filter(|z| qname.ends_with(&z.origin))
            .max_by_key(|z| z.origin.len())
    }

    pub fn find_ptr_zone(&self, qname: &str) -> Option<&PtrZone> {
        let qname = normalize_origin(qname);
        self.ptr
            .iter()
            .filter(|z| qname.ends_with(&z.reverse_label()))
            .max_by_key(|z| z.reverse_label().len())
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty() && self.ptr.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_soa() -> SoaParams {
        SoaParams {
            ns: "ns1.mynetwk.biz.".to_string(),
            admin_email: "admin@mynetwk.biz".to_string(),
            serial: 1,
            refresh: 3600,
            retry: 600,
            expire: 86400,
            minimum: 300,
        }
    }

    #[test]
    fn test_add_record_and_find() {
        let mut zone = Zone::new("mynetwk.biz.", test_soa());
        zone.add_record(
            "host1".to_string(),
            RecordType::A,
            None,
            RData::A("10.47.0.10".parse().unwrap()),
            300,
        );

        let found = zone.find("host1.mynetwk.biz.", RecordType::A);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_at_token_expands_to_origin() {
        let mut zone = Zone::new("mynetwk.biz.", test_soa());
        zone.add_record("@".to_string(), RecordType::A, None, RData::A("10.47.0.1".parse().unwrap()), 300);
        let found = zone.find("mynetwk.biz.", RecordType::A);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_soa_rname_normalizes_at() {
        let zone = Zone::new("mynetwk.biz.", test_soa());
        let soa = zone.soa_record();
        if let RData::SOA { rname, .. } = soa.rdata {
            assert_eq!(rname, "admin.mynetwk.biz");
        } else {
            panic!("expected SOA");
        }
    }

    #[test]
    fn test_ptr_zone_lookup() {
        let mut ptr = PtrZone::new("10.47.0");
        ptr.add(10, "host1.mynetwk.biz");
        let found = ptr.find("10.0.47.10.in-addr.arpa.");
        assert_eq!(found.len(), 1);
        if let RData::PTR(target) = &found[0].rdata {
            assert_eq!(target, "host1.mynetwk.biz.");
        } else {
            panic!("expected PTR");
        }
    }

    #[test]
    fn test_zone_table_longest_suffix_match() {
        let mut table = ZoneTable::new();
        table.add_zone(Zone::new("mynetwk.biz.", test_soa()));
        table.add_zone(Zone::new("lan.mynetwk.biz.", test_soa()));

        let found = table.find_zone("host.lan.mynetwk.biz.").unwrap();
        assert_eq!(found.origin, "lan.mynetwk.biz.");
    }
}
