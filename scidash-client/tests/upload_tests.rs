//! Integration tests for login, score upload and suite flattening
//!
//! Each test runs a local axum server that records every multipart upload
//! and answers with a scripted sequence of statuses.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{post, put};
use axum::{Form, Json, Router};
use scidash_client::{
    CanonicalRecord, ClientConfig, ClientOptions, Describe, DocumentMatrix, Error, LiveScore,
    MappingOptions, RawObject, ScidashClient, ScoreMapper, ScoreMatrix,
};
use serde::Serialize;
use serde_json::{json, Map, Value};

// =============================================================================
// Test server
// =============================================================================

#[derive(Debug, Clone)]
struct RecordedUpload {
    filename: String,
    authorization: Option<String>,
    field_name: Option<String>,
    file_name: Option<String>,
    body: Value,
}

#[derive(Clone, Default)]
struct ServerState {
    uploads: Arc<Mutex<Vec<RecordedUpload>>>,
    replies: Arc<Mutex<VecDeque<(u16, &'static str)>>>,
}

impl ServerState {
    fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().unwrap().clone()
    }
}

async fn login(Form(credentials): Form<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
    let valid = credentials.get("username").map(String::as_str) == Some("alice")
        && credentials.get("password").map(String::as_str) == Some("secret");

    if valid {
        (StatusCode::OK, Json(json!({"token": "test-token"})))
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"non_field_errors": ["Unable to log in with provided credentials."]})),
        )
    }
}

async fn upload(
    State(state): State<ServerState>,
    Path(filename): Path<String>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> (StatusCode, String) {
    let mut field_name = None;
    let mut file_name = None;
    let mut body = Value::Null;

    while let Some(field) = multipart.next_field().await.unwrap() {
        field_name = field.name().map(str::to_string);
        file_name = field.file_name().map(str::to_string);
        let text = field.text().await.unwrap();
        body = serde_json::from_str(&text).unwrap();
    }

    state.uploads.lock().unwrap().push(RecordedUpload {
        filename,
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        field_name,
        file_name,
        body,
    });

    let (status, reply) = state
        .replies
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or((201, r#"{"success": true}"#));
    (StatusCode::from_u16(status).unwrap(), reply.to_string())
}

/// Start a server answering uploads with `replies` in order (201 once exhausted)
async fn start_server(replies: Vec<(u16, &'static str)>) -> (String, ServerState) {
    let state = ServerState::default();
    state.replies.lock().unwrap().extend(replies);

    let app = Router::new()
        .route("/api/login/", post(login))
        .route("/api/upload/:filename", put(upload))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), state)
}

fn client_for(base_url: &str) -> ScidashClient {
    let config = ClientConfig {
        base_url: base_url.to_string(),
        ..ClientConfig::default()
    };
    let options = ClientOptions::default()
        .with_build_info("linux-x86_64/unix")
        .with_hostname("bench-01");
    ScidashClient::new(config, options).expect("Should create client")
}

fn valid_score(value: f64) -> Value {
    json!({
        "score": value,
        "test": {"name": "RestingPotentialTest"},
        "model": {"name": "Izhikevich"}
    })
}

// =============================================================================
// Test fixtures: a self-describing score matrix
// =============================================================================

#[derive(Debug, Serialize)]
struct Trace {
    #[serde(rename = "py/object")]
    class: &'static str,
    samples: Vec<f64>,
}

struct LabScore {
    value: f64,
    test: &'static str,
    trace: Option<Trace>,
}

impl LiveScore for LabScore {
    fn related_data(&self) -> Option<RawObject<'_>> {
        self.trace
            .as_ref()
            .map(|trace| RawObject::reflect(trace).expect("Trace should serialize"))
    }
}

struct LabMatrix {
    rows: Vec<Vec<LabScore>>,
}

impl Describe for LabMatrix {
    fn describe(&self, _options: &MappingOptions) -> scidash_client::Result<Value> {
        let rows: Vec<Value> = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|s| {
                        json!({
                            "py/object": "sciunit.scores.ZScore",
                            "py/state": {
                                "score": s.value,
                                "test": {"name": s.test},
                                "model": {"name": "Izhikevich"}
                            }
                        })
                    })
                    .collect()
            })
            .collect();

        Ok(json!({
            "py/object": "sciunit.scores.collections.ScoreMatrix",
            "py/state": {"scores_flat": rows}
        }))
    }
}

impl ScoreMatrix for LabMatrix {
    type Score = LabScore;

    fn score_rows(&self) -> Vec<&[LabScore]> {
        self.rows.iter().map(Vec::as_slice).collect()
    }

    fn as_raw(&self) -> RawObject<'_> {
        RawObject::Described(self)
    }
}

fn lab_matrix() -> LabMatrix {
    LabMatrix {
        rows: vec![
            vec![
                LabScore {
                    value: 0.1,
                    test: "RestingPotentialTest",
                    trace: Some(Trace { class: "neo.AnalogSignal", samples: vec![-65.0, -64.5] }),
                },
                LabScore { value: 0.2, test: "InputResistanceTest", trace: None },
            ],
            vec![LabScore { value: 0.3, test: "RheobaseTest", trace: None }],
        ],
    }
}

// =============================================================================
// Login
// =============================================================================

#[tokio::test]
async fn test_login_token_used_for_uploads() {
    let (base_url, server) = start_server(vec![]).await;
    let mut client = client_for(&base_url);

    client.login("alice", "secret").await.expect("Login should succeed");
    assert_eq!(client.session().token.as_deref(), Some("test-token"));

    let response = client
        .upload_test_score(RawObject::from(valid_score(0.5)), None)
        .await
        .unwrap()
        .expect("Valid score should be uploaded");
    assert_eq!(response.status.as_u16(), 201);
    assert_eq!(response.json().unwrap(), json!({"success": true}));

    let uploads = server.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].authorization.as_deref(), Some("JWT test-token"));
}

#[tokio::test]
async fn test_login_rejected_credentials() {
    let (base_url, _server) = start_server(vec![]).await;
    let mut client = client_for(&base_url);

    let err = client.login("alice", "wrong").await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)), "got: {err}");
    assert!(client.session().token.is_none());
}

// =============================================================================
// Single score upload
// =============================================================================

#[tokio::test]
async fn test_upload_sends_named_file_with_stamped_payload() {
    let (base_url, server) = start_server(vec![]).await;
    let mut client = client_for(&base_url);
    client.set_token("abc");

    client
        .upload_test_score(
            RawObject::from(valid_score(0.75)),
            Some(RawObject::from(json!({"trace": [1, 2, 3]}))),
        )
        .await
        .unwrap();

    let uploads = server.uploads();
    assert_eq!(uploads.len(), 1);
    let upload = &uploads[0];
    assert_eq!(upload.filename, "score.json");
    assert_eq!(upload.field_name.as_deref(), Some("file"));
    assert_eq!(upload.file_name.as_deref(), Some("score.json"));

    assert_eq!(upload.body["score"], json!(0.75));
    assert_eq!(upload.body["related_data"], json!({"trace": [1, 2, 3]}));
    assert_eq!(upload.body["test_instance"]["build_info"], json!("linux-x86_64/unix"));
    assert_eq!(upload.body["test_instance"]["hostname"], json!("bench-01"));
    assert_eq!(upload.body["model_instance"], json!({"name": "Izhikevich"}));

    // The uploaded body is exactly the session payload
    assert_eq!(
        Value::Object(client.payload().unwrap().as_map().clone()),
        upload.body
    );
}

#[tokio::test]
async fn test_invalid_score_is_not_sent() {
    let (base_url, server) = start_server(vec![]).await;
    let mut client = client_for(&base_url);

    let response = client
        .upload_test_score(RawObject::from(json!({"score": 1.0})), None)
        .await
        .unwrap();

    assert!(response.is_none());
    assert!(server.uploads().is_empty());
    assert_eq!(client.errors().len(), 2);
}

#[tokio::test]
async fn test_error_statuses_are_recorded() {
    let (base_url, _server) = start_server(vec![
        (400, r#"{"score": ["invalid"]}"#),
        (500, "Internal Server Error"),
        (404, "Not Found"),
    ])
    .await;
    let mut client = client_for(&base_url);

    let first = client
        .upload_test_score(RawObject::from(valid_score(1.0)), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.status.as_u16(), 400);
    assert_eq!(client.errors(), &[r#"{"score": ["invalid"]}"#.to_string()]);

    let second = client.upload_payload().await.unwrap().unwrap();
    assert_eq!(second.status.as_u16(), 500);
    assert_eq!(second.body, "Internal Server Error");
    assert_eq!(client.errors().len(), 2);

    // Other statuses pass through without touching the error list
    let third = client.upload_payload().await.unwrap().unwrap();
    assert_eq!(third.status.as_u16(), 404);
    assert_eq!(client.errors().len(), 2);
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let mut client = client_for("http://127.0.0.1:9");

    let err = client
        .upload_test_score(RawObject::from(valid_score(1.0)), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "got: {err}");
}

// =============================================================================
// Suite upload
// =============================================================================

#[tokio::test]
async fn test_suite_scores_uploaded_in_matrix_order() {
    let (base_url, server) = start_server(vec![]).await;
    let mut client = client_for(&base_url);
    let suite = json!({"name": "NeuronSuite", "hash": "f00d"});

    let responses = client
        .upload_suite_score(RawObject::from(suite.clone()), &lab_matrix())
        .await
        .unwrap();

    assert_eq!(responses.len(), 3);
    assert!(responses.iter().all(|r| r.as_ref().map(|r| r.status.as_u16()) == Some(201)));

    let uploads = server.uploads();
    let scores: Vec<Value> = uploads.iter().map(|u| u.body["score"].clone()).collect();
    assert_eq!(scores, vec![json!(0.1), json!(0.2), json!(0.3)]);

    let tests: Vec<Value> = uploads.iter().map(|u| u.body["test_instance"]["name"].clone()).collect();
    assert_eq!(
        tests,
        vec![json!("RestingPotentialTest"), json!("InputResistanceTest"), json!("RheobaseTest")]
    );

    for upload in &uploads {
        assert_eq!(upload.body["test_instance"]["test_suites"], json!([suite.clone()]));
        assert_eq!(upload.body["score_class"], json!("sciunit.scores.ZScore"));
    }

    // Related data follows its own score, as plain data
    assert_eq!(
        uploads[0].body["related_data"],
        json!({"samples": [-65.0, -64.5]})
    );
    assert!(uploads[1].body.get("related_data").is_none());
    assert!(uploads[2].body.get("related_data").is_none());
}

#[tokio::test]
async fn test_suite_upload_continues_after_failures() {
    let (base_url, server) = start_server(vec![(201, "{}"), (500, "database locked"), (201, "{}")]).await;
    let mut client = client_for(&base_url);

    let responses = client
        .upload_suite_score(RawObject::from(r#"{"name": "NeuronSuite"}"#), &lab_matrix())
        .await
        .unwrap();

    let statuses: Vec<u16> = responses
        .iter()
        .map(|r| r.as_ref().unwrap().status.as_u16())
        .collect();
    assert_eq!(statuses, vec![201, 500, 201]);
    assert_eq!(client.errors(), &["database locked".to_string()]);
    assert_eq!(server.uploads().len(), 3);
}

#[tokio::test]
async fn test_suite_upload_from_documents() {
    let (base_url, server) = start_server(vec![]).await;
    let mut client = client_for(&base_url);

    let matrix = DocumentMatrix::from_json_str(
        r#"{
            "scores_flat": [
                [
                    {"score": 1, "test": {"name": "a", "test_suites": [{"name": "earlier"}]}, "model": {"name": "m"}},
                    {"score": 2, "model": {"name": "m"}}
                ]
            ]
        }"#,
    )
    .unwrap();

    let responses = client
        .upload_suite_score(RawObject::from(r#"{"name": "suite"}"#), &matrix)
        .await
        .unwrap();

    // The second score has no test and fails validation without a request
    assert_eq!(responses.len(), 2);
    assert!(responses[0].is_some());
    assert!(responses[1].is_none());
    assert_eq!(client.errors(), &["test: field is required".to_string()]);

    let uploads = server.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(
        uploads[0].body["test_instance"]["test_suites"],
        json!([{"name": "earlier"}, {"name": "suite"}])
    );
}

/// Mapper that uploads the merged score untouched, adding an empty `test_instance`
struct PassThroughMapper;

impl ScoreMapper for PassThroughMapper {
    fn convert(&self, mut raw: Map<String, Value>) -> Result<CanonicalRecord, Vec<String>> {
        raw.entry("test_instance").or_insert_with(|| json!({}));
        Ok(CanonicalRecord::new(raw))
    }
}

#[tokio::test]
async fn test_suite_related_data_reaches_mapper_as_plain_data() {
    let (base_url, server) = start_server(vec![]).await;
    let config = ClientConfig {
        base_url,
        ..ClientConfig::default()
    };
    let mut client = ScidashClient::with_mapper(config, ClientOptions::default(), PassThroughMapper)
        .expect("Should create client");

    let matrix = DocumentMatrix::from_json_str(
        r#"{
            "scores_flat": [[{
                "score": 1,
                "test": {"name": "a"},
                "related_data": {
                    "py/object": "neo.AnalogSignal",
                    "py/state": {"samples": [1.0], "units": {"py/object": "quantities.Unit", "name": "mV"}}
                }
            }]]
        }"#,
    )
    .unwrap();

    client
        .upload_suite_score(RawObject::from(r#"{"name": "suite"}"#), &matrix)
        .await
        .unwrap();

    let uploads = server.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(
        uploads[0].body["related_data"],
        json!({"samples": [1.0], "units": {"name": "mV"}})
    );
}
