//! Suite score flattening
//!
//! Uploads every score of a matrix individually, each linked to the suite
//! through its test's `test_suites` list. The live scores and the
//! normalized scores are walked in lockstep; their lengths must agree.

use serde_json::{Map, Value};
use tracing::{info, warn};

use super::{ScidashClient, UploadResponse};
use crate::error::{Error, Result};
use crate::mapper::ScoreMapper;
use crate::matrix::{flatten_normalized, LiveScore, ScoreMatrix};
use crate::normalizer::{normalize, MappingOptions, RawObject};
use crate::record::{get_field, get_field_mut, is_truthy, set_field};

impl<M: ScoreMapper> ScidashClient<M> {
    /// Upload each score of `matrix`, linked to `suite`.
    ///
    /// Returns one entry per score in row-major order; `None` marks a score
    /// that produced no payload. Rejected uploads (400/500) do not stop the
    /// loop. A length mismatch between the live and normalized views aborts
    /// before anything is sent. A transport error, including a configured
    /// `timeout_secs` expiring, aborts the loop and drops the responses
    /// collected so far.
    pub async fn upload_suite_score<S: ScoreMatrix>(
        &mut self,
        suite: RawObject<'_>,
        matrix: &S,
    ) -> Result<Vec<Option<UploadResponse>>> {
        let suite = Value::Object(normalize(suite, &MappingOptions::default())?);
        let normalized_matrix = normalize(matrix.as_raw(), &MappingOptions::default())?;

        let scores = matrix.flat_scores();
        let normalized_scores = flatten_normalized(&normalized_matrix)?;

        if scores.len() != normalized_scores.len() {
            return Err(Error::FlattenMismatch {
                scores: scores.len(),
                normalized: normalized_scores.len(),
            });
        }

        let normalized_scores = normalized_scores
            .into_iter()
            .enumerate()
            .map(|(index, score)| match score {
                Value::Object(map) => Ok(map),
                _ => Err(Error::MalformedInput(format!(
                    "normalized score {} is not a mapping",
                    index
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        info!(scores = scores.len(), "Uploading suite scores");

        let mut responses = Vec::with_capacity(scores.len());

        for (index, (score, mut normalized)) in scores.into_iter().zip(normalized_scores).enumerate() {
            if !link_suite(&mut normalized, &suite) {
                warn!(index, "Score has no test descriptor, uploading without suite link");
            }

            let related_data = match score.related_data() {
                None => None,
                Some(raw) => match normalize(raw, &MappingOptions::plain()) {
                    Ok(related) => Some(RawObject::Mapping(related)),
                    Err(e) => {
                        warn!(index, error = %e, "Related data could not be normalized, skipping score");
                        self.session.record_error(format!("score {}: {}", index, e));
                        responses.push(None);
                        continue;
                    }
                },
            };

            let response = self
                .upload_test_score(RawObject::Mapping(normalized), related_data)
                .await?;
            responses.push(response);
        }

        let uploaded = responses.iter().filter(|r| r.is_some()).count();
        info!(
            scores = responses.len(),
            uploaded,
            errors = self.session.errors.len(),
            "Suite upload finished"
        );

        Ok(responses)
    }
}

/// Append `suite` to the `test_suites` list of the score's test descriptor.
///
/// Creates the list when it is absent or empty. Returns `false` if the
/// score has no test mapping or its `test_suites` is not a list.
fn link_suite(score: &mut Map<String, Value>, suite: &Value) -> bool {
    let Some(Value::Object(test)) = get_field_mut(score, "test") else {
        return false;
    };

    if !is_truthy(get_field(test, "test_suites")) {
        set_field(test, "test_suites", Value::Array(Vec::new()));
    }

    match get_field_mut(test, "test_suites") {
        Some(Value::Array(suites)) => {
            suites.push(suite.clone());
            true
        }
        _ => false,
    }
}
