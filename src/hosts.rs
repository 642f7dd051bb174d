use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::api::records::{DnsRecord, DnsRecordSet, RecordType};

/// The declarative hosts file: per zone, an optional TTL and the records
/// that should exist. Entries are not sanity-checked beyond JSON shape;
/// what you declare is what gets written.
#[derive(Debug, Clone, Deserialize)]
pub struct HostsFile {
    pub zones: BTreeMap<String, ZoneSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZoneSpec {
    pub ttl: Option<u32>,
    #[serde(default)]
    pub hosts: Vec<HostSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostSpec {
    pub hostname: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub destination: Option<String>,
}

impl HostsFile {
    pub fn load(path: &Path) -> Result<Self, HostsError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

impl ZoneSpec {
    /// Build the desired record set, defaulting missing destinations to
    /// the resolved external IP.
    pub fn desired_records(&self, external_ip: Ipv4Addr) -> DnsRecordSet {
        let records = self
            .hosts
            .iter()
            .map(|h| {
                let destination = h
                    .destination
                    .clone()
                    .unwrap_or_else(|| external_ip.to_string());
                DnsRecord::new(h.hostname.clone(), h.record_type.clone(), destination)
            })
            .collect();

        DnsRecordSet::new(records)
    }
}

#[derive(Debug, Error)]
pub enum HostsError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "zones": {
            "example.org": {
                "ttl": 3600,
                "hosts": [
                    { "hostname": "www", "type": "A" },
                    { "hostname": "mail", "type": "CNAME", "destination": "www.example.org" }
                ]
            }
        }
    }"#;

    #[test]
    fn parses_the_sample_shape() {
        let hosts: HostsFile = serde_json::from_str(SAMPLE).unwrap();
        let zone = &hosts.zones["example.org"];
        assert_eq!(zone.ttl, Some(3600));
        assert_eq!(zone.hosts.len(), 2);
        assert_eq!(zone.hosts[0].record_type, RecordType::A);
        assert!(zone.hosts[0].destination.is_none());
    }

    #[test]
    fn missing_destination_defaults_to_the_external_ip() {
        let hosts: HostsFile = serde_json::from_str(SAMPLE).unwrap();
        let desired = hosts.zones["example.org"].desired_records(Ipv4Addr::new(203, 0, 113, 7));

        assert_eq!(desired.dnsrecords[0].destination, "203.0.113.7");
        assert_eq!(desired.dnsrecords[1].destination, "www.example.org");
    }
}
