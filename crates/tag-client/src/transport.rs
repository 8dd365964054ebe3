//! Transport seam between the detection client and the network.

use std::time::Duration;

use reqwest::{
    Client, Url,
    header::ACCEPT,
    multipart::{Form, Part},
};
use tracing::debug;

use crate::TransportError;

/// Default detection endpoint of the local tag service.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:5000/detect";
/// Body the service returns from `/ping` when it is alive.
pub const PING_SENTINEL: &str = "pong";

/// Carries one encoded frame to the detection service and returns the raw
/// response body.
#[allow(async_fn_in_trait)]
pub trait DetectionTransport {
    async fn post_image(&self, png: Vec<u8>) -> Result<Vec<u8>, TransportError>;
}

/// `reqwest` transport posting a multipart `image` part.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
}

impl HttpTransport {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, TransportError> {
        let endpoint = endpoint
            .parse::<Url>()
            .map_err(|err| TransportError::InvalidUrl {
                url: endpoint.to_string(),
                reason: err.to_string(),
            })?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TransportError::Client)?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// `GET /ping` on the service root; `true` when it answers the sentinel.
    pub async fn ping(&self) -> Result<bool, TransportError> {
        let url = self
            .endpoint
            .join("/ping")
            .map_err(|err| TransportError::InvalidUrl {
                url: self.endpoint.to_string(),
                reason: err.to_string(),
            })?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| TransportError::Request {
                url: url.to_string(),
                source,
            })?;
        if !response.status().is_success() {
            return Ok(false);
        }
        let body = response
            .text()
            .await
            .map_err(|source| TransportError::Request {
                url: url.to_string(),
                source,
            })?;
        Ok(body.trim() == PING_SENTINEL)
    }
}

impl DetectionTransport for HttpTransport {
    async fn post_image(&self, png: Vec<u8>) -> Result<Vec<u8>, TransportError> {
        let url = self.endpoint.to_string();
        let request_error = |source| TransportError::Request {
            url: url.clone(),
            source,
        };

        let part = Part::bytes(png)
            .file_name("frame.png")
            .mime_str("image/png")
            .map_err(request_error)?;
        let form = Form::new().part("image", part);

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(ACCEPT, "application/json")
            .multipart(form)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                url: url.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await.map_err(request_error)?;
        debug!(bytes = body.len(), "detection response received");
        Ok(body.to_vec())
    }
}
