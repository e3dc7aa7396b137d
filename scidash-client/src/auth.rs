//! Login against the SciDash auth endpoint
//!
//! Credentials are posted as a form; the JSON response must carry a
//! `token` string, which becomes the bearer token for uploads.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

/// Request a bearer token for `username`
pub async fn request_token(
    http: &reqwest::Client,
    config: &ClientConfig,
    username: &str,
    password: &str,
) -> Result<String> {
    let url = config.auth_endpoint();
    debug!(url = %url, username = username, "Requesting auth token");

    let response = http
        .post(&url)
        .form(&[("username", username), ("password", password)])
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;

    let token = parse_token(&body)?;
    info!(status = status.as_u16(), "Authenticated with SciDash");
    Ok(token)
}

/// Extract the token from a login response body
pub fn parse_token(body: &str) -> Result<String> {
    let parsed: TokenResponse = serde_json::from_str(body)
        .map_err(|e| Error::Auth(format!("unreadable login response: {}", e)))?;

    match parsed.token {
        Some(token) if !token.is_empty() => Ok(token),
        _ => {
            let detail = serde_json::from_str::<Value>(body)
                .map(|v| v.to_string())
                .unwrap_or_else(|_| body.to_string());
            Err(Error::Auth(format!("no token in login response: {}", detail)))
        }
    }
}
