use std::net::Ipv4Addr;

use tracing::{debug, info};

use crate::api::records::DnsRecordSet;
use crate::api::{ApiError, NcSession};
use crate::hosts::HostsFile;

/// Drives one read/compare/update pass over an open API session.
///
/// Without `apply`, the pass is read-only and only reports what would
/// change. Updates are only issued for zones whose records or TTL
/// actually differ.
#[derive(Debug)]
pub struct Updater<'a> {
    session: &'a NcSession,
    apply: bool,
    ttl_override: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneOutcome {
    pub records_changed: bool,
    pub ttl_changed: bool,
    pub applied: bool,
}

impl<'a> Updater<'a> {
    pub fn new(session: &'a NcSession) -> Self {
        Self {
            session,
            apply: false,
            ttl_override: None,
        }
    }

    /// Actually write changes instead of reporting them.
    pub fn apply(mut self, apply: bool) -> Self {
        self.apply = apply;
        self
    }

    /// TTL to enforce on every zone, taking precedence over the hosts
    /// file's per-zone value.
    pub fn ttl_override(mut self, ttl: Option<u32>) -> Self {
        self.ttl_override = ttl;
        self
    }

    /// Reconcile every zone in the hosts file, in order.
    pub async fn run(&self, hosts: &HostsFile, external_ip: Ipv4Addr) -> Result<(), ApiError> {
        for (domainname, spec) in &hosts.zones {
            self.sync_zone(
                domainname,
                spec.desired_records(external_ip),
                self.ttl_override.or(spec.ttl),
            )
            .await?;
        }

        Ok(())
    }

    /// Reconcile a single zone against the desired record set.
    #[tracing::instrument(skip(self, desired, ttl), level = "info")]
    pub async fn sync_zone(
        &self,
        domainname: &str,
        desired: DnsRecordSet,
        ttl: Option<u32>,
    ) -> Result<ZoneOutcome, ApiError> {
        info!("syncing zone");

        let mut zone = self.session.info_dns_zone(domainname).await?;
        let mut records = self.session.info_dns_records(domainname).await?;
        debug!(
            ttl = zone.ttl,
            records = records.dnsrecords.len(),
            "read current provider state"
        );

        let records_changed = records.merge_all(desired);
        let ttl_changed = match ttl {
            Some(target) if target != zone.ttl => {
                zone.ttl = target;
                true
            }
            _ => false,
        };

        if !records_changed && !ttl_changed {
            info!("zone up to date, leaving it alone");
            return Ok(ZoneOutcome {
                records_changed,
                ttl_changed,
                applied: false,
            });
        }

        if !self.apply {
            info!(
                records_changed,
                ttl_changed, "changes pending, re-run with --update to apply"
            );
            return Ok(ZoneOutcome {
                records_changed,
                ttl_changed,
                applied: false,
            });
        }

        if ttl_changed {
            self.session.update_dns_zone(&zone).await?;
            let fresh = self.session.info_dns_zone(domainname).await?;
            info!(ttl = fresh.ttl, "zone ttl updated");
        }
        if records_changed {
            self.session.update_dns_records(domainname, &records).await?;
            let fresh = self.session.info_dns_records(domainname).await?;
            info!(records = fresh.dnsrecords.len(), "records updated");
        }

        Ok(ZoneOutcome {
            records_changed,
            ttl_changed,
            applied: true,
        })
    }
}
