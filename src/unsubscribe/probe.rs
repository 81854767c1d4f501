//! Plain HTTP GET used for one-click unsubscribe links.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use tracing::{debug, info};

use crate::config::ProbeConfig;
use crate::error::ProbeError;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// What came back from a GET, after redirects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub body: String,
    pub final_url: String,
}

#[async_trait]
pub trait HttpProbe: Send + Sync {
    /// GET `url`. Non-2xx statuses are not errors; only transport failures are.
    async fn get(&self, url: &str) -> Result<ProbeResponse, ProbeError>;
}

/// reqwest-backed probe.
pub struct ReqwestProbe {
    client: reqwest::Client,
}

impl ReqwestProbe {
    pub fn new(config: &ProbeConfig) -> Result<Self, ProbeError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| ProbeError::Client(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpProbe for ReqwestProbe {
    async fn get(&self, url: &str) -> Result<ProbeResponse, ProbeError> {
        debug!(url, "HTTP unsubscribe request");

        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                ProbeError::Timeout { url: url.to_string() }
            } else {
                ProbeError::Request {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        };

        let response = self.client.get(url).send().await.map_err(map_err)?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await.map_err(map_err)?;

        info!(url, status, final_url = %final_url, body_len = body.len(), "HTTP response received");

        Ok(ProbeResponse {
            status,
            body,
            final_url,
        })
    }
}
