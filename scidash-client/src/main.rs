//! scidash-upload - Upload test scores to SciDash from JSON documents
//!
//! Single scores:   `scidash-upload score score.json --related related.json`
//! Suite matrices:  `scidash-upload suite suite.json matrix.json`
//!
//! Exits non-zero if any score failed validation or was rejected.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scidash_client::{ClientConfig, ClientOptions, DocumentMatrix, RawObject, ScidashClient, UploadResponse};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for scidash-upload
#[derive(Parser, Debug)]
#[command(name = "scidash-upload")]
#[command(about = "Upload sciunit test scores to a SciDash server")]
#[command(version)]
struct Args {
    /// TOML config file (default: <config dir>/scidash/config.toml)
    #[arg(short, long, env = "SCIDASH_CONFIG")]
    config: Option<PathBuf>,

    /// Service root URL, overrides config file and environment
    #[arg(long)]
    base_url: Option<String>,

    /// Login user name
    #[arg(short, long, env = "SCIDASH_USERNAME")]
    username: Option<String>,

    /// Login password
    #[arg(short, long, env = "SCIDASH_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Hostname recorded with each score
    #[arg(long, env = "SCIDASH_HOSTNAME")]
    hostname: Option<String>,

    /// Build descriptor recorded with each score (default: platform string)
    #[arg(long)]
    build_info: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a single score
    Score {
        /// Score document
        score: PathBuf,

        /// Related data document
        #[arg(short, long)]
        related: Option<PathBuf>,
    },
    /// Upload every score of a matrix, linked to a suite
    Suite {
        /// Suite document
        suite: PathBuf,

        /// Score matrix document with a `scores_flat` field
        matrix: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scidash_client=info,scidash_upload=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting scidash-upload v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let mut config = ClientConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }

    let mut options = ClientOptions::default();
    if let Some(build_info) = args.build_info {
        options = options.with_build_info(build_info);
    }
    if let Some(hostname) = args.hostname {
        options = options.with_hostname(hostname);
    }

    let mut client = ScidashClient::new(config, options).context("Invalid client configuration")?;

    match (args.username, args.password) {
        (Some(username), Some(password)) => {
            client.login(&username, &password).await.context("Login failed")?;
        }
        (Some(_), None) | (None, Some(_)) => {
            anyhow::bail!("--username and --password must be given together");
        }
        (None, None) => info!("No credentials given, uploading without login"),
    }

    let responses = match args.command {
        Command::Score { score, related } => {
            let score = read_document(&score)?;
            let related = related.as_deref().map(read_document).transpose()?;
            let response = client
                .upload_test_score(score.into(), related.map(RawObject::from))
                .await
                .context("Upload failed")?;
            vec![response]
        }
        Command::Suite { suite, matrix } => {
            let suite = read_document(&suite)?;
            let matrix_text = std::fs::read_to_string(&matrix)
                .with_context(|| format!("Failed to read {}", matrix.display()))?;
            let matrix = DocumentMatrix::from_json_str(&matrix_text)
                .with_context(|| format!("Invalid score matrix {}", matrix.display()))?;
            client
                .upload_suite_score(suite.into(), &matrix)
                .await
                .context("Suite upload failed")?
        }
    };

    report(&responses, client.errors());

    if client.session().has_errors() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn read_document(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn report(responses: &[Option<UploadResponse>], errors: &[String]) {
    for (index, response) in responses.iter().enumerate() {
        match response {
            Some(response) => println!("[{}] HTTP {}", index, response.status),
            None => println!("[{}] skipped (no valid payload)", index),
        }
    }
    for error in errors {
        eprintln!("error: {}", error);
    }
}
