//! Upload dispatch
//!
//! Sends the session payload as a named file in a multipart PUT and sorts
//! the response into accepted, invalid data or server error. The response
//! is always handed back; classification only drives logging and the
//! session error list.

use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use tracing::{debug, error, info};

use super::{ScidashClient, UploadResponse};
use crate::error::Result;
use crate::mapper::ScoreMapper;
use crate::normalizer::RawObject;

/// Multipart field carrying the payload
const FILE_FIELD: &str = "file";

/// Outcome class of an upload response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    Accepted,
    /// HTTP 400
    InvalidData,
    /// HTTP 500
    ServerError,
}

/// Classify an upload response status.
///
/// Only 400 and 500 are failures; every other status passes through.
pub fn classify(status: StatusCode) -> ResponseClass {
    match status {
        StatusCode::BAD_REQUEST => ResponseClass::InvalidData,
        StatusCode::INTERNAL_SERVER_ERROR => ResponseClass::ServerError,
        _ => ResponseClass::Accepted,
    }
}

impl<M: ScoreMapper> ScidashClient<M> {
    /// Merge `score` with `related_data` and upload the result.
    ///
    /// Returns `Ok(None)` without touching the network when the merge
    /// produced no payload.
    pub async fn upload_test_score(
        &mut self,
        score: RawObject<'_>,
        related_data: Option<RawObject<'_>>,
    ) -> Result<Option<UploadResponse>> {
        self.set_data(score, related_data)?;
        self.upload_payload().await
    }

    /// Upload the current session payload.
    ///
    /// Returns `Ok(None)` without a request if there is no payload.
    pub async fn upload_payload(&mut self) -> Result<Option<UploadResponse>> {
        let Some(payload) = self.session.payload.as_ref() else {
            debug!("No payload to upload");
            return Ok(None);
        };

        let part = Part::text(payload.to_json_string()?).file_name(self.config.file_name.clone());
        let form = Form::new().part(FILE_FIELD, part);
        let url = self.config.upload_endpoint();

        debug!(url = %url, "Uploading score");

        let response = self
            .http
            .put(&url)
            .header(AUTHORIZATION, self.session.authorization())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        self.record_response(status, &body);

        Ok(Some(UploadResponse { status, headers, body }))
    }

    /// Log the response and keep failure bodies in the session
    fn record_response(&mut self, status: StatusCode, body: &str) {
        match classify(status) {
            ResponseClass::Accepted => {
                info!(status = status.as_u16(), "Score uploaded");
            }
            ResponseClass::InvalidData => {
                self.session.record_error(body);
                error!(
                    status = status.as_u16(),
                    errors = ?self.session.errors,
                    "SERVER -> INVALID DATA"
                );
            }
            ResponseClass::ServerError => {
                self.session.record_error(body);
                error!(
                    status = status.as_u16(),
                    errors = ?self.session.errors,
                    "SERVER -> SERVER ERROR"
                );
            }
        }
    }
}
