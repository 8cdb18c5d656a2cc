use std::time::Duration;

use axum::body::Bytes;
use axum::http::{header, StatusCode};
use reqwest::{Client, Url};
use serde_json::{Map, Value};

use crate::error::RelayError;
use crate::models::{PredictionResult, SubmissionRecord};

#[derive(Debug, Clone)]
pub struct RelayResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct Relay {
    client: Client,
    endpoint: Url,
    timeout: Option<Duration>,
}

impl Relay {
    pub fn new(endpoint: Url, timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }

    /// Sends `body` as-is. Failures are logged here with their cause.
    pub async fn forward(&self, body: Bytes) -> Result<RelayResponse, RelayError> {
        self.send(body).await.inspect_err(|err| {
            tracing::error!(endpoint = %self.endpoint, error = %err, "prediction relay failed");
        })
    }

    pub async fn score(&self, record: &SubmissionRecord) -> Result<PredictionResult, RelayError> {
        let body = serde_json::to_vec(record).map_err(RelayError::InvalidRequest)?;
        let response = self.forward(Bytes::from(body)).await?;
        serde_json::from_slice(&response.body)
            .map_err(RelayError::MalformedResponse)
            .inspect_err(|err| {
                tracing::error!(endpoint = %self.endpoint, error = %err, "unusable prediction result");
            })
    }

    async fn send(&self, body: Bytes) -> Result<RelayResponse, RelayError> {
        serde_json::from_slice::<Map<String, Value>>(&body).map_err(RelayError::InvalidRequest)?;

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|err| self.transport(err))?;
        let status = response.status();
        let body = response.bytes().await.map_err(|err| self.transport(err))?;

        if !status.is_success() {
            return Err(RelayError::UpstreamStatus {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        serde_json::from_slice::<Value>(&body).map_err(RelayError::MalformedResponse)?;
        Ok(RelayResponse { status, body })
    }

    fn transport(&self, err: reqwest::Error) -> RelayError {
        match self.timeout {
            Some(timeout) if err.is_timeout() => RelayError::Timeout {
                endpoint: self.endpoint.to_string(),
                timeout,
            },
            _ => RelayError::Transport {
                endpoint: self.endpoint.to_string(),
                source: err,
            },
        }
    }
}
