pub mod records;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::settings::Settings;
use records::{DnsRecordSet, DnsZone};

/// Client for the netcup CCP DNS endpoint. Every operation is a POST of
/// `{"action": ..., "param": {...}}` against one URL; everything except
/// `login` additionally carries the session id, so the session-bound
/// operations live on [`NcSession`].
#[derive(Debug)]
pub struct NcClient {
    api_url: Url,
    api_key: String,
    api_password: String,
    customer_id: String,
    client: Client,
}

impl NcClient {
    pub fn new(settings: &Settings) -> Result<Self, ApiError> {
        let api_url = Url::parse(&settings.api_url)?;

        if api_url.cannot_be_a_base() {
            return Err(ApiError::BadBaseUrl);
        }

        Ok(Self {
            api_url,
            api_key: settings.api_key.clone(),
            api_password: settings.api_password.clone(),
            customer_id: settings.customer_id.clone(),
            client: Client::new(),
        })
    }

    fn payload(&self, action: &str, session_id: Option<&str>, params: Value) -> Value {
        let mut param = json!({
            "customernumber": self.customer_id,
            "apikey": self.api_key,
        });
        if let Some(id) = session_id {
            param["apisessionid"] = json!(id);
        }
        if let Value::Object(extra) = params {
            for (k, v) in extra {
                param[k] = v;
            }
        }

        json!({ "action": action, "param": param })
    }

    /// Post one request and unwrap the response envelope. Params may
    /// contain credentials, so only the action name is logged.
    async fn send(&self, action: &str, payload: &Value) -> Result<Value, ApiError> {
        debug!(action, "posting api request");

        let envelope = self
            .client
            .post(self.api_url.clone())
            .json(payload)
            .send()
            .await?
            .error_for_status()?
            .json::<Envelope>()
            .await?;

        if !envelope.status.eq_ignore_ascii_case("success") {
            return Err(ApiError::Api(
                envelope
                    .longmessage
                    .or(envelope.shortmessage)
                    .unwrap_or_else(|| "unknown api error".to_owned()),
            ));
        }

        debug!(action, "api request succeeded");
        Ok(envelope.responsedata)
    }

    /// Open a session. The returned [`NcSession`] must be closed with
    /// [`NcSession::logout`].
    #[tracing::instrument(skip(self))]
    pub async fn login(self) -> Result<NcSession, ApiError> {
        let payload = self.payload(
            "login",
            None,
            json!({ "apipassword": self.api_password }),
        );
        let data = self.send("login", &payload).await?;

        let LoginData { apisessionid } = serde_json::from_value(data)?;
        info!("logged in");

        Ok(NcSession {
            client: self,
            session_id: apisessionid,
        })
    }
}

/// An open API session. All DNS operations require one.
#[derive(Debug)]
pub struct NcSession {
    client: NcClient,
    session_id: String,
}

impl NcSession {
    async fn send(&self, action: &str, params: Value) -> Result<Value, ApiError> {
        let payload = self.client.payload(action, Some(&self.session_id), params);
        self.client.send(action, &payload).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn info_dns_zone(&self, domainname: &str) -> Result<DnsZone, ApiError> {
        let data = self
            .send("infoDnsZone", json!({ "domainname": domainname }))
            .await?;

        let mut zone: DnsZone = serde_json::from_value(data)?;
        zone.name = domainname.to_owned();
        Ok(zone)
    }

    #[tracing::instrument(skip(self))]
    pub async fn info_dns_records(&self, domainname: &str) -> Result<DnsRecordSet, ApiError> {
        let data = self
            .send("infoDnsRecords", json!({ "domainname": domainname }))
            .await?;

        Ok(serde_json::from_value(data)?)
    }

    #[tracing::instrument(skip(self, zone), fields(domainname = %zone.name))]
    pub async fn update_dns_zone(&self, zone: &DnsZone) -> Result<(), ApiError> {
        self.send(
            "updateDnsZone",
            json!({ "domainname": zone.name, "dnszone": zone }),
        )
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self, recordset))]
    pub async fn update_dns_records(
        &self,
        domainname: &str,
        recordset: &DnsRecordSet,
    ) -> Result<(), ApiError> {
        self.send(
            "updateDnsRecords",
            json!({ "domainname": domainname, "dnsrecordset": recordset }),
        )
        .await?;

        Ok(())
    }

    /// Close the session. Consumes the session so no further requests can
    /// be issued with a stale id.
    #[tracing::instrument(skip(self))]
    pub async fn logout(self) -> Result<(), ApiError> {
        self.send("logout", json!({})).await?;
        info!("logged out");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    shortmessage: Option<String>,
    #[serde(default)]
    longmessage: Option<String>,
    #[serde(default)]
    responsedata: Value,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    apisessionid: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("bad base url")]
    BadBaseUrl,
    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),
    #[error("api error: {0}")]
    Api(String),
    #[error(transparent)]
    Decode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{all_of, any_of, cycle, matchers::*, responders::*, Expectation, Server};

    fn settings_for(server: &Server) -> Settings {
        Settings {
            api_url: server.url_str("/"),
            api_key: "key".to_owned(),
            api_password: "pw".to_owned(),
            customer_id: "12345".to_owned(),
            fritzbox_ip: None,
            log_level: None,
            subdomains: None,
        }
    }

    fn success(responsedata: Value) -> Value {
        json!({
            "status": "success",
            "shortmessage": "ok",
            "longmessage": "",
            "responsedata": responsedata,
        })
    }

    #[tokio::test]
    async fn login_sends_credentials_and_captures_session_id() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/"),
                request::body(json_decoded(eq(json!({
                    "action": "login",
                    "param": {
                        "customernumber": "12345",
                        "apikey": "key",
                        "apipassword": "pw",
                    },
                })))),
            ])
            .respond_with(json_encoded(success(json!({ "apisessionid": "sid123" })))),
        );

        let session = NcClient::new(&settings_for(&server))
            .unwrap()
            .login()
            .await
            .unwrap();
        assert_eq!(session.session_id, "sid123");
    }

    #[tokio::test]
    async fn session_requests_carry_the_session_id() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/"),
                request::body(json_decoded(any_of![
                    eq(json!({
                        "action": "login",
                        "param": {
                            "customernumber": "12345",
                            "apikey": "key",
                            "apipassword": "pw",
                        },
                    })),
                    eq(json!({
                        "action": "infoDnsZone",
                        "param": {
                            "customernumber": "12345",
                            "apikey": "key",
                            "apisessionid": "sid123",
                            "domainname": "example.org",
                        },
                    })),
                ])),
            ])
            .times(2)
            .respond_with(cycle![
                json_encoded(success(json!({ "apisessionid": "sid123" }))),
                json_encoded(success(json!({
                    "ttl": "86400",
                    "serial": "2024051201",
                    "refresh": "28800",
                    "retry": "7200",
                    "expire": "1209600",
                    "dnssecstatus": false,
                }))),
            ]),
        );

        let session = NcClient::new(&settings_for(&server))
            .unwrap()
            .login()
            .await
            .unwrap();
        let zone = session.info_dns_zone("example.org").await.unwrap();
        assert_eq!(zone.name, "example.org");
        assert_eq!(zone.ttl, 86_400);
    }

    #[tokio::test]
    async fn error_status_surfaces_the_long_message() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/")).respond_with(json_encoded(
                json!({
                    "status": "error",
                    "shortmessage": "Validation Error.",
                    "longmessage": "The api key is invalid.",
                    "responsedata": "",
                }),
            )),
        );

        let err = NcClient::new(&settings_for(&server))
            .unwrap()
            .login()
            .await
            .unwrap_err();
        match err {
            ApiError::Api(msg) => assert_eq!(msg, "The api key is invalid."),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn records_round_trip_through_the_wire_shape() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/"))
                .times(3)
                .respond_with(cycle![
                    json_encoded(success(json!({ "apisessionid": "sid123" }))),
                    json_encoded(success(json!({
                        "dnsrecords": [{
                            "id": "1017376",
                            "hostname": "www",
                            "type": "A",
                            "priority": "0",
                            "destination": "203.0.113.7",
                            "deleterecord": false,
                            "state": "yes",
                        }],
                    }))),
                    json_encoded(success(json!(""))),
                ]),
        );

        let session = NcClient::new(&settings_for(&server))
            .unwrap()
            .login()
            .await
            .unwrap();
        let records = session.info_dns_records("example.org").await.unwrap();
        assert_eq!(records.dnsrecords.len(), 1);
        assert_eq!(records.dnsrecords[0].hostname, "www");

        session.update_dns_records("example.org", &records).await.unwrap();
    }

    #[tokio::test]
    async fn logout_ends_the_session() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/"),
                request::body(json_decoded(any_of![
                    eq(json!({
                        "action": "login",
                        "param": {
                            "customernumber": "12345",
                            "apikey": "key",
                            "apipassword": "pw",
                        },
                    })),
                    eq(json!({
                        "action": "logout",
                        "param": {
                            "customernumber": "12345",
                            "apikey": "key",
                            "apisessionid": "sid123",
                        },
                    })),
                ])),
            ])
            .times(2)
            .respond_with(cycle![
                json_encoded(success(json!({ "apisessionid": "sid123" }))),
                json_encoded(success(json!(""))),
            ]),
        );

        let session = NcClient::new(&settings_for(&server))
            .unwrap()
            .login()
            .await
            .unwrap();
        session.logout().await.unwrap();
    }
}
