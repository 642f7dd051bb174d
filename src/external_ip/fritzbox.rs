use std::net::Ipv4Addr;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, IntoUrl, Url};
use tracing::debug;

use super::{IpError, IpSource};

static EXTERNAL_IP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new("<NewExternalIPAddress>([^<]*)</NewExternalIPAddress>").unwrap()
});

const SOAP_ACTION: &str =
    "urn:schemas-upnp-org:service:WANIPConnection:1#GetExternalIPAddress";

const SOAP_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
  <s:Body>
    <u:GetExternalIPAddress xmlns:u="urn:schemas-upnp-org:service:WANIPConnection:1"/>
  </s:Body>
</s:Envelope>"#;

/// External-IP lookup via a FRITZ!Box router on the LAN. Uses the
/// unauthenticated UPnP/IGD `GetExternalIPAddress` call on port 49000.
#[derive(Debug)]
pub struct FritzBox {
    endpoint: Url,
    client: Client,
}

impl FritzBox {
    pub fn new(address: &str) -> Result<Self, IpError> {
        Self::with_endpoint(format!(
            "http://{address}:49000/igdupnp/control/WANIPConn1"
        ))
    }

    pub fn with_endpoint<U: IntoUrl>(endpoint: U) -> Result<Self, IpError> {
        Ok(Self {
            endpoint: endpoint.into_url()?,
            client: Client::new(),
        })
    }
}

#[async_trait::async_trait]
impl IpSource for FritzBox {
    #[tracing::instrument(skip(self))]
    async fn current_ip(&self) -> Result<Ipv4Addr, IpError> {
        let body = self
            .client
            .post(self.endpoint.clone())
            .header("Content-Type", "text/xml; charset=\"utf-8\"")
            .header("SoapAction", SOAP_ACTION)
            .body(SOAP_BODY)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let raw = EXTERNAL_IP_REGEX
            .captures(&body)
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str())
            .ok_or(IpError::NoAddress)?;
        if raw.is_empty() {
            return Err(IpError::NoAddress);
        }

        let ip: Ipv4Addr = raw.parse()?;
        debug!(%ip, "found external ip");
        Ok(ip)
    }
}
