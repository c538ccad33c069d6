// ABOUTME: Relay reachability probe (`GET <endpoint>/health`).
// ABOUTME: Only informs the console; never touches session state.

use anyhow::{Context, Result};
use reqwest::Url;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Health {
    Up,
    /// Answered with a non-200 status
    Unhealthy(u16),
    Unreachable(String),
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Health::Up => write!(f, "✅ Backend server is running"),
            Health::Unhealthy(status) => {
                write!(f, "❌ Backend server is not responding properly (HTTP {})", status)
            }
            Health::Unreachable(_) => write!(f, "❌ Cannot connect to backend server"),
        }
    }
}

/// Health URL for a bus endpoint; websocket schemes map to their HTTP forms
pub fn health_url(endpoint: &str) -> Result<Url> {
    let mut url = Url::parse(endpoint).with_context(|| format!("Invalid endpoint '{}'", endpoint))?;
    let scheme = match url.scheme() {
        "ws" => "http",
        "wss" => "https",
        other => other,
    }
    .to_string();
    if url.set_scheme(&scheme).is_err() {
        anyhow::bail!("Cannot derive an HTTP URL from '{}'", endpoint);
    }

    let base = url.path().trim_end_matches('/').to_string();
    url.set_path(&format!("{}/health", base));
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

pub async fn check(client: &reqwest::Client, endpoint: &str, timeout: Duration) -> Health {
    let url = match health_url(endpoint) {
        Ok(url) => url,
        Err(e) => return Health::Unreachable(format!("{:#}", e)),
    };

    match client.get(url.clone()).timeout(timeout).send().await {
        Ok(response) if response.status() == reqwest::StatusCode::OK => {
            tracing::debug!(%url, "Health check passed");
            Health::Up
        }
        Ok(response) => {
            tracing::warn!(%url, status = %response.status(), "Health check returned non-200");
            Health::Unhealthy(response.status().as_u16())
        }
        Err(e) => {
            tracing::debug!(%url, error = %e, "Health check failed");
            Health::Unreachable(e.to_string())
        }
    }
}
