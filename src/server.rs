use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};

use actix_web::http::StatusCode;
use actix_web::{web, App, HttpResponse, HttpServer, ResponseError};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::api::records::{DnsRecord, DnsRecordSet, RecordType};
use crate::api::{ApiError, NcClient};
use crate::settings::Settings;
use crate::updater::Updater;

/// HTTP server mode: one route, `GET /{key}?ipv4=..&ipv6=..`, that maps a
/// pre-shared key to a hostname and updates that host's address records.
/// The key is an access-control lookup, not a cryptographic boundary.
#[derive(Debug, Clone)]
struct AppState {
    settings: Settings,
    subdomains_path: PathBuf,
}

/// The subdomain mapping file. Re-read on every request so edits take
/// effect without a restart.
#[derive(Debug, Deserialize)]
struct SubdomainsFile {
    domainname: String,
    hosts: Vec<SubdomainEntry>,
}

#[derive(Debug, Deserialize)]
struct SubdomainEntry {
    key: String,
    hostname: String,
}

/// Addresses are parsed, so a malformed value is rejected with 400
/// before anything reaches the provider.
#[derive(Debug, Deserialize)]
struct IpQuery {
    ipv4: Option<Ipv4Addr>,
    ipv6: Option<Ipv6Addr>,
}

fn load_subdomains(path: &Path) -> Result<SubdomainsFile, ServeError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

async fn update_host(
    state: web::Data<AppState>,
    key: web::Path<String>,
    query: web::Query<IpQuery>,
) -> Result<HttpResponse, ServeError> {
    let subdomains = load_subdomains(&state.subdomains_path)?;

    let hostname = subdomains
        .hosts
        .iter()
        .find(|entry| entry.key == *key)
        .map(|entry| entry.hostname.clone())
        .ok_or(ServeError::UnknownKey)?;

    if query.ipv4.is_none() && query.ipv6.is_none() {
        return Err(ServeError::MissingAddress);
    }

    debug!(
        hostname,
        ipv4 = ?query.ipv4,
        ipv6 = ?query.ipv6,
        "update requested"
    );

    let mut records = Vec::new();
    if let Some(ipv4) = query.ipv4 {
        records.push(DnsRecord::new(
            hostname.clone(),
            RecordType::A,
            ipv4.to_string(),
        ));
    }
    if let Some(ipv6) = query.ipv6 {
        records.push(DnsRecord::new(
            hostname.clone(),
            RecordType::Aaaa,
            ipv6.to_string(),
        ));
    }

    let session = NcClient::new(&state.settings)?.login().await?;
    let result = Updater::new(&session)
        .apply(true)
        .sync_zone(&subdomains.domainname, DnsRecordSet::new(records), None)
        .await;
    if let Err(e) = session.logout().await {
        warn!(error = %e, "logout failed");
    }
    result?;

    Ok(HttpResponse::Ok().finish())
}

/// Run the server until it is shut down.
pub async fn run(settings: Settings, settings_path: &Path, port: u16) -> Result<(), ServeError> {
    let subdomains = settings
        .subdomains
        .clone()
        .ok_or(ServeError::NoSubdomainsConfigured)?;
    let subdomains_path = settings_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(subdomains);

    let state = AppState {
        settings,
        subdomains_path,
    };

    info!(port, "starting http server");
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .route("/{key}", web::get().to(update_host))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await?;

    Ok(())
}

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("unknown key")]
    UnknownKey,
    #[error("Provide an ipv4 or ipv6 or both.")]
    MissingAddress,
    #[error("settings carry no subdomains file, server mode needs one")]
    NoSubdomainsConfigured,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("bad subdomain mapping: {0}")]
    BadMapping(#[from] serde_json::Error),
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl ResponseError for ServeError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServeError::UnknownKey => StatusCode::FORBIDDEN,
            ServeError::MissingAddress => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ServeError::UnknownKey => HttpResponse::Forbidden().finish(),
            ServeError::MissingAddress => {
                HttpResponse::BadRequest().body("Provide an ipv4 or ipv6 or both.")
            }
            other => {
                error!(error = %other, "update failed");
                HttpResponse::InternalServerError().finish()
            }
        }
    }
}
