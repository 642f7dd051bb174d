use std::fmt::{self, Display, Formatter};

use serde::de::{self, Deserializer, Unexpected};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// DNS record types this tool writes. Types it merely reads back from a
/// zone (MX, TXT, ...) are preserved via the `Other` variant so a full
/// record set can round-trip through `updateDnsRecords` untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordType {
    A,
    Aaaa,
    Cname,
    Other(String),
}

impl RecordType {
    pub fn as_str(&self) -> &str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Other(s) => s,
        }
    }

    /// A and AAAA records for one hostname coexist; everything else
    /// replaces whatever holds the name.
    pub fn is_address(&self) -> bool {
        matches!(self, RecordType::A | RecordType::Aaaa)
    }
}

impl From<&str> for RecordType {
    fn from(s: &str) -> Self {
        match s {
            "A" => RecordType::A,
            "AAAA" => RecordType::Aaaa,
            "CNAME" => RecordType::Cname,
            other => RecordType::Other(other.to_owned()),
        }
    }
}

impl Display for RecordType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RecordType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RecordType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(RecordType::from(s.as_str()))
    }
}

/// A single DNS entry as netcup models it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsRecord {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "opt_u32_from_string"
    )]
    pub id: Option<u32>,
    pub hostname: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    #[serde(default, deserialize_with = "u32_from_string")]
    pub priority: u32,
    pub destination: String,
    #[serde(default)]
    pub deleterecord: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl DnsRecord {
    pub fn new(hostname: impl Into<String>, record_type: RecordType, destination: impl Into<String>) -> Self {
        Self {
            id: None,
            hostname: hostname.into(),
            record_type,
            priority: 0,
            destination: destination.into(),
            deleterecord: false,
            state: None,
        }
    }

    pub fn needs_update(&self, desired: &DnsRecord) -> bool {
        self.destination != desired.destination || self.record_type != desired.record_type
    }

    /// Take destination and type from `desired`, keeping the provider id.
    /// Returns whether anything changed.
    pub fn apply(&mut self, desired: &DnsRecord) -> bool {
        if !self.needs_update(desired) {
            return false;
        }
        self.destination = desired.destination.clone();
        self.record_type = desired.record_type.clone();
        true
    }
}

/// The `dnsrecordset` wire type plus the merge logic the updater runs on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DnsRecordSet {
    pub dnsrecords: Vec<DnsRecord>,
}

impl DnsRecordSet {
    pub fn new(dnsrecords: Vec<DnsRecord>) -> Self {
        Self { dnsrecords }
    }

    fn live_indices(&self, hostname: &str) -> Vec<usize> {
        self.dnsrecords
            .iter()
            .enumerate()
            .filter(|(_, r)| r.hostname == hostname && !r.deleterecord)
            .map(|(i, _)| i)
            .collect()
    }

    /// Merge one desired record into the set.
    ///
    /// A hostname may carry an A and an AAAA record side by side; any
    /// other desired type claims the hostname for itself, flagging a
    /// leftover second record for deletion (the provider removes records
    /// with `deleterecord` set on update). Returns whether the set changed.
    pub fn merge(&mut self, desired: DnsRecord) -> bool {
        let present = self.live_indices(&desired.hostname);

        match present.as_slice() {
            [] => {
                self.dnsrecords.push(desired);
                true
            }
            [i] => {
                let existing = &self.dnsrecords[*i];
                if desired.record_type.is_address()
                    && existing.record_type.is_address()
                    && existing.record_type != desired.record_type
                {
                    // A next to AAAA (or the reverse), keep both families
                    self.dnsrecords.push(desired);
                    true
                } else {
                    self.dnsrecords[*i].apply(&desired)
                }
            }
            [first, rest @ ..] => {
                if desired.record_type.is_address() {
                    let slot = present
                        .iter()
                        .find(|&&i| self.dnsrecords[i].record_type == desired.record_type)
                        .copied()
                        .unwrap_or(*first);
                    self.dnsrecords[slot].apply(&desired)
                } else {
                    let changed = self.dnsrecords[*first].apply(&desired);
                    let mut flagged = false;
                    for &i in rest {
                        if !self.dnsrecords[i].deleterecord {
                            self.dnsrecords[i].deleterecord = true;
                            flagged = true;
                        }
                    }
                    changed || flagged
                }
            }
        }
    }

    /// Merge a whole desired set, reporting whether anything changed.
    pub fn merge_all(&mut self, desired: DnsRecordSet) -> bool {
        let mut changed = false;
        for record in desired.dnsrecords {
            changed |= self.merge(record);
        }
        changed
    }
}

/// A DNS zone's root record-set parameters as `infoDnsZone` returns them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsZone {
    #[serde(default)]
    pub name: String,
    #[serde(deserialize_with = "u32_from_string")]
    pub ttl: u32,
    #[serde(deserialize_with = "string_from_number")]
    pub serial: String,
    #[serde(deserialize_with = "u32_from_string")]
    pub refresh: u32,
    #[serde(deserialize_with = "u32_from_string")]
    pub retry: u32,
    #[serde(deserialize_with = "u32_from_string")]
    pub expire: u32,
    pub dnssecstatus: bool,
}

// The endpoint returns numeric fields as JSON strings ("ttl": "86400").

fn u32_from_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u32),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s
            .parse()
            .map_err(|_| de::Error::invalid_value(Unexpected::Str(&s), &"an unsigned integer")),
    }
}

fn opt_u32_from_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        None,
        Num(u32),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::None => Ok(None),
        Raw::Num(n) => Ok(Some(n)),
        Raw::Str(s) => s
            .parse()
            .map(Some)
            .map_err(|_| de::Error::invalid_value(Unexpected::Str(&s), &"an unsigned integer")),
    }
}

fn string_from_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Num(n) => n.to_string(),
    })
}
