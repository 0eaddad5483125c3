use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::RemoteEndpoint;
use crate::error::NetworkError;
use crate::models::StoredMeasurement;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// [`RemoteEndpoint`] over HTTP: measurements are POSTed as JSON to
/// `{base_url}/measurements`, tiles are fetched with a plain GET.
#[derive(Debug, Clone)]
pub struct HttpEndpoint {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpEndpoint {
    pub fn new(base_url: impl Into<String>) -> Result<Self, NetworkError> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("signalmap/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| NetworkError::Request(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn measurements_url(&self) -> String {
        format!("{}/measurements", self.base_url)
    }

    fn map_error(&self, err: reqwest::Error) -> NetworkError {
        if err.is_timeout() {
            NetworkError::Timeout(self.timeout.as_millis() as u64)
        } else if let Some(status) = err.status() {
            NetworkError::Status(status.as_u16())
        } else {
            NetworkError::Request(err.to_string())
        }
    }
}

#[async_trait]
impl RemoteEndpoint for HttpEndpoint {
    async fn upload(&self, measurement: &StoredMeasurement) -> Result<(), NetworkError> {
        let response = self
            .client
            .post(self.measurements_url())
            .json(measurement)
            .send()
            .await
            .map_err(|err| self.map_error(err))?;

        if !response.status().is_success() {
            return Err(NetworkError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    async fn fetch_tile_bytes(&self, url: &str) -> Result<Vec<u8>, NetworkError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| self.map_error(err))?;

        if !response.status().is_success() {
            return Err(NetworkError::Status(response.status().as_u16()));
        }

        let bytes = response.bytes().await.map_err(|err| self.map_error(err))?;
        Ok(bytes.to_vec())
    }
}
