//! Score matrices
//!
//! A score matrix groups scores in rows (one per model, typically) and is
//! consumed in row-major order. The live view yields objects that still know
//! their related data; the normalized view is read from the matrix mapping's
//! own `scores_flat` field.

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::normalizer::RawObject;
use crate::record::get_field;

/// Field holding the grouped scores of a normalized matrix
pub const SCORES_FIELD: &str = "scores_flat";

/// A score object that can hand out its related data
pub trait LiveScore {
    /// Related data attached to this score, if any
    fn related_data(&self) -> Option<RawObject<'_>>;
}

/// A grouped collection of live scores
pub trait ScoreMatrix {
    type Score: LiveScore;

    /// Scores grouped by row
    fn score_rows(&self) -> Vec<&[Self::Score]>;

    /// The whole matrix as a normalizable object
    fn as_raw(&self) -> RawObject<'_>;

    /// Live scores in row-major order
    fn flat_scores(&self) -> Vec<&Self::Score> {
        self.score_rows().into_iter().flatten().collect()
    }
}

/// Rows of a normalized matrix's `scores_flat` field, layout-aware
fn grouped_scores(matrix: &Map<String, Value>) -> Result<Vec<&Vec<Value>>> {
    let rows = get_field(matrix, SCORES_FIELD)
        .ok_or_else(|| Error::MalformedInput(format!("score matrix has no {} field", SCORES_FIELD)))?
        .as_array()
        .ok_or_else(|| Error::MalformedInput(format!("{} is not a sequence", SCORES_FIELD)))?;

    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            row.as_array().ok_or_else(|| {
                Error::MalformedInput(format!("{} row {} is not a sequence", SCORES_FIELD, index))
            })
        })
        .collect()
}

/// Normalized score entries of a matrix mapping in row-major order
pub fn flatten_normalized(matrix: &Map<String, Value>) -> Result<Vec<Value>> {
    Ok(grouped_scores(matrix)?
        .into_iter()
        .flat_map(|row| row.iter().cloned())
        .collect())
}

/// Live score backed by its JSON mapping
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentScore(pub Map<String, Value>);

impl LiveScore for DocumentScore {
    fn related_data(&self) -> Option<RawObject<'_>> {
        match get_field(&self.0, "related_data") {
            None | Some(Value::Null) => None,
            Some(value) => Some(RawObject::from(value.clone())),
        }
    }
}

/// Score matrix read from a JSON document
///
/// The document is kept verbatim for normalization; live scores are the
/// mappings found in its `scores_flat` rows.
#[derive(Debug, Clone)]
pub struct DocumentMatrix {
    document: Map<String, Value>,
    rows: Vec<Vec<DocumentScore>>,
}

impl DocumentMatrix {
    pub fn from_document(document: Map<String, Value>) -> Result<Self> {
        let rows = grouped_scores(&document)?
            .into_iter()
            .map(|row| {
                row.iter()
                    .map(|score| match score {
                        Value::Object(map) => Ok(DocumentScore(map.clone())),
                        _ => Err(Error::MalformedInput(
                            "score matrix entries must be mappings".to_string(),
                        )),
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { document, rows })
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(text)? {
            Value::Object(document) => Self::from_document(document),
            _ => Err(Error::MalformedInput("score matrix document must be a mapping".to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ScoreMatrix for DocumentMatrix {
    type Score = DocumentScore;

    fn score_rows(&self) -> Vec<&[DocumentScore]> {
        self.rows.iter().map(Vec::as_slice).collect()
    }

    fn as_raw(&self) -> RawObject<'_> {
        RawObject::Mapping(self.document.clone())
    }
}
