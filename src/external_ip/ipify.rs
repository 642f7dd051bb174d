use std::net::Ipv4Addr;

use reqwest::{Client, IntoUrl, Url};
use tracing::debug;

use super::{IpError, IpSource};

const API_URL: &str = "https://api.ipify.org";

/// External-IP lookup via the public ipify echo service, which answers
/// with the caller's address as a plain-text body.
#[derive(Debug)]
pub struct Ipify {
    url: Url,
    client: Client,
}

impl Ipify {
    pub fn new() -> Self {
        Self {
            url: Url::parse(API_URL).expect("static url is valid"),
            client: Client::new(),
        }
    }

    pub fn with_url<U: IntoUrl>(url: U) -> Result<Self, IpError> {
        Ok(Self {
            url: url.into_url()?,
            client: Client::new(),
        })
    }
}

impl Default for Ipify {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IpSource for Ipify {
    #[tracing::instrument(skip(self))]
    async fn current_ip(&self) -> Result<Ipv4Addr, IpError> {
        let body = self
            .client
            .get(self.url.clone())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let ip: Ipv4Addr = body.trim().parse()?;
        debug!(%ip, "found external ip");
        Ok(ip)
    }
}
