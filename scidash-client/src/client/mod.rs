//! SciDash upload client
//!
//! Owns the HTTP client, the validated configuration, the score mapper and
//! the per-client [`ClientSession`]. Work is split by stage:
//! - `merge`: normalization and payload merging
//! - `dispatch`: multipart upload and response classification
//! - `suite`: score matrix flattening
//!
//! Every operation runs sequentially through `&mut self`; uploads are
//! awaited one at a time.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde_json::Value;

use crate::auth;
use crate::config::{ClientConfig, ClientOptions};
use crate::error::Result;
use crate::mapper::{ScoreMapper, StructuralMapper};
use crate::record::CanonicalRecord;
use crate::session::ClientSession;

mod dispatch;
mod merge;
mod suite;

pub use dispatch::{classify, ResponseClass};

/// Raw response of one upload
#[derive(Debug, Clone)]
pub struct UploadResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl UploadResponse {
    /// Decode the body as a JSON document
    pub fn json(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.body)?)
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Client for uploading scores to SciDash
pub struct ScidashClient<M: ScoreMapper = StructuralMapper> {
    http: reqwest::Client,
    config: ClientConfig,
    mapper: M,
    session: ClientSession,
}

impl ScidashClient<StructuralMapper> {
    /// Create a client with the default score mapper.
    ///
    /// Fails with a configuration error if `config` does not validate.
    pub fn new(config: ClientConfig, options: ClientOptions) -> Result<Self> {
        Self::with_mapper(config, options, StructuralMapper)
    }
}

impl<M: ScoreMapper> ScidashClient<M> {
    /// Create a client with a custom score mapper
    pub fn with_mapper(config: ClientConfig, options: ClientOptions, mapper: M) -> Result<Self> {
        config.validate()?;

        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("scidash-client/", env!("CARGO_PKG_VERSION")));
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build()?;

        tracing::debug!(
            base_url = %config.base_url,
            build_info = %options.build_info,
            hostname = ?options.hostname,
            "SciDash client created"
        );

        Ok(Self {
            http,
            config,
            mapper,
            session: ClientSession::new(options.build_info, options.hostname),
        })
    }

    /// Log in and keep the returned token for subsequent uploads
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let token = auth::request_token(&self.http, &self.config, username, password).await?;
        self.session.token = Some(token);
        Ok(())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &ClientSession {
        &self.session
    }

    /// Errors accumulated by failed merges and uploads
    pub fn errors(&self) -> &[String] {
        &self.session.errors
    }

    /// Payload produced by the last merge, if it succeeded
    pub fn payload(&self) -> Option<&CanonicalRecord> {
        self.session.payload.as_ref()
    }

    /// Use a token obtained elsewhere
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.session.token = Some(token.into());
    }
}
