pub mod fritzbox;
pub mod ipify;

use std::net::Ipv4Addr;

use thiserror::Error;
use tracing::debug;

use crate::settings::Settings;

/// Something that can tell us our internet-facing IPv4 address.
#[async_trait::async_trait]
pub trait IpSource {
    async fn current_ip(&self) -> Result<Ipv4Addr, IpError>;
}

/// Resolve the external IP with the source the settings select: a local
/// FRITZ!Box when `fritzbox_ip` is set, the public echo service otherwise.
pub async fn resolve(settings: &Settings) -> Result<Ipv4Addr, IpError> {
    let source: Box<dyn IpSource + Send + Sync> = match &settings.fritzbox_ip {
        Some(address) => {
            debug!(%address, "resolving external ip via FRITZ!Box");
            Box::new(fritzbox::FritzBox::new(address)?)
        }
        None => {
            debug!("resolving external ip via ipify");
            Box::new(ipify::Ipify::new())
        }
    };

    source.current_ip().await
}

#[derive(Debug, Error)]
pub enum IpError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("not an ipv4 address: {0}")]
    BadAddress(#[from] std::net::AddrParseError),
    #[error("router response carried no external ip")]
    NoAddress,
}
