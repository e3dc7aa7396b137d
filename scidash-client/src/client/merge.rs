//! Payload merging
//!
//! Normalizes a score and its related data, places the related data under
//! the score's detected layout, maps the result, and stamps host metadata
//! into `test_instance`.

use serde_json::Value;
use tracing::{debug, error};

use super::ScidashClient;
use crate::error::Result;
use crate::mapper::ScoreMapper;
use crate::normalizer::{normalize, normalize_record, MappingOptions, RawObject};
use crate::record::CanonicalRecord;
use crate::session::ClientSession;

/// Key under which related data is stored in a score
pub const RELATED_DATA_KEY: &str = "related_data";

impl<M: ScoreMapper> ScidashClient<M> {
    /// Build the upload payload from a score and optional related data.
    ///
    /// Replaces the session payload. On validation failure the payload is
    /// `None` and the mapper's messages are appended to the session errors;
    /// callers check [`ScidashClient::payload`]. Only unparsable input is
    /// returned as an error.
    pub fn set_data(
        &mut self,
        score: RawObject<'_>,
        related_data: Option<RawObject<'_>>,
    ) -> Result<&mut Self> {
        self.session.payload = None;

        let mut record = normalize_record(score)?;
        if let Some(related) = related_data {
            let related = normalize(related, &MappingOptions::default())?;
            record.set(RELATED_DATA_KEY, Value::Object(related));
        }
        debug!(layout = ?record.layout(), "Score merged with related data");

        let mapped = self
            .mapper
            .convert(record.into_map())
            .and_then(|mut mapped| {
                stamp_host_metadata(&mut mapped, &self.session)?;
                Ok(mapped)
            });

        match mapped {
            Ok(payload) => self.session.payload = Some(payload),
            Err(errors) => {
                error!(errors = ?errors, "Score failed validation, nothing to upload");
                self.session.errors.extend(errors);
            }
        }

        Ok(self)
    }
}

/// Add build descriptor and hostname to the record's `test_instance`
fn stamp_host_metadata(record: &mut CanonicalRecord, session: &ClientSession) -> std::result::Result<(), Vec<String>> {
    let Some(Value::Object(test_instance)) = record.get_mut("test_instance") else {
        return Err(vec!["test_instance: missing from mapped score".to_string()]);
    };

    test_instance.insert("build_info".to_string(), Value::String(session.build_info.clone()));
    test_instance.insert(
        "hostname".to_string(),
        session.hostname.clone().map_or(Value::Null, Value::String),
    );
    Ok(())
}
