//! Client for the remote Copilot metrics API.
//!
//! One call to [`MetricsClient::fetch_org_metrics`] follows the `Link`
//! header's `rel="next"` chain until exhausted and returns the full batch
//! in API-delivery order. A non-success response anywhere in the chain
//! fails the whole call; pages fetched so far are discarded.

use std::time::Duration;

use reqwest::{
    StatusCode,
    header::{ACCEPT, AUTHORIZATION, LINK},
};
use thiserror::Error;
use url::Url;

use crate::config::GithubConfig;

const ACCEPT_JSON: &str = "application/vnd.github+json";
const API_VERSION_HEADER: &str = "X-GitHub-Api-Version";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Metrics request for '{org}' failed with status {status}")]
    Status { org: String, status: StatusCode },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid pagination URL: {0}")]
    Url(#[from] url::ParseError),
}

pub struct MetricsClient {
    client: reqwest::Client,
    api_base: String,
    api_version: String,
    timeout: Duration,
}

impl MetricsClient {
    /// Create a client from configuration.
    pub fn from_config(config: &GithubConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Fetch every daily snapshot for one organization.
    #[tracing::instrument(skip(self, token))]
    pub async fn fetch_org_metrics(
        &self,
        org: &str,
        token: &str,
    ) -> Result<Vec<serde_json::Value>, FetchError> {
        let mut url = Url::parse(&format!("{}/orgs/{org}/copilot/metrics", self.api_base))?;
        let mut snapshots = Vec::new();

        loop {
            let response = self
                .client
                .get(url.clone())
                .header(ACCEPT, ACCEPT_JSON)
                .header(AUTHORIZATION, format!("Bearer {token}"))
                .header(API_VERSION_HEADER, &self.api_version)
                .timeout(self.timeout)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(FetchError::Status {
                    org: org.to_string(),
                    status: response.status(),
                });
            }

            // Read the header before the body consumes the response
            let next = response
                .headers()
                .get(LINK)
                .and_then(|value| value.to_str().ok())
                .and_then(next_link);

            let page: Vec<serde_json::Value> = response.json().await?;
            tracing::debug!(org, records = page.len(), "Fetched metrics page");
            snapshots.extend(page);

            match next {
                // join() handles relative targets against the current page
                Some(target) => url = url.join(&target)?,
                None => break,
            }
        }

        Ok(snapshots)
    }
}

/// Extract the `rel="next"` target from a `Link` header value.
fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        if !part.contains(r#"rel="next""#) {
            return None;
        }
        let start = part.find('<')? + 1;
        let end = part.find('>')?;
        part.get(start..end).map(str::to_string)
    })
}
