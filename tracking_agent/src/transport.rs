use async_trait::async_trait;
use fleet_tracker_lib::ping::Ping;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server rejected ping: {0}")]
    Status(reqwest::StatusCode),
}

/// One authenticated ping submission. Stateless per call; nothing is
/// buffered, a failed sample is simply lost.
#[async_trait]
pub trait PingTransport: Send + Sync + 'static {
    async fn send(
        &self,
        route_id: &str,
        auth_token: &str,
        ping: &Ping,
    ) -> Result<(), TransportError>;
}

#[derive(Serialize)]
struct PingBody {
    latitude: f64,
    longitude: f64,
}

pub struct HttpPingTransport {
    client: reqwest::Client,
    api_base: String,
}

impl HttpPingTransport {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
        }
    }

    /// Route ids are caller-supplied; encode them so an id containing
    /// `/` or spaces cannot change the request path.
    fn ping_url(&self, route_id: &str) -> String {
        format!(
            "{}/v1/route/{}/ping/",
            self.api_base.trim_end_matches('/'),
            utf8_percent_encode(route_id, NON_ALPHANUMERIC),
        )
    }
}

#[async_trait]
impl PingTransport for HttpPingTransport {
    async fn send(
        &self,
        route_id: &str,
        auth_token: &str,
        ping: &Ping,
    ) -> Result<(), TransportError> {
        let url = self.ping_url(route_id);

        let response = self
            .client
            .post(&url)
            .bearer_auth(auth_token)
            .json(&PingBody {
                latitude: ping.latitude,
                longitude: ping.longitude,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status()));
        }

        Ok(())
    }
}
