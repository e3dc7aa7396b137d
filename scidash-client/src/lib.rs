//! # SciDash Client Library
//!
//! Uploads test-score results to a SciDash scoring service:
//! - Input normalization (text, mappings, self-describing objects)
//! - Payload merging with related data and host metadata
//! - Multipart upload dispatch with response classification
//! - Suite score matrix flattening
//! - Configuration loading and login

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod mapper;
pub mod matrix;
pub mod normalizer;
pub mod record;
pub mod session;

pub use client::{ScidashClient, UploadResponse};
pub use config::{ClientConfig, ClientOptions};
pub use error::{Error, Result};
pub use mapper::{ScoreMapper, StructuralMapper};
pub use matrix::{DocumentMatrix, LiveScore, ScoreMatrix};
pub use normalizer::{Describe, MappingOptions, RawObject};
pub use record::{CanonicalRecord, RecordLayout, STATE_KEY};
pub use session::ClientSession;
