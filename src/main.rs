use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use seqsync::compute_env::{HttpStatusTransport, PollMode, PollTarget, StatusPoller};
use seqsync::config::{Config, WORKSPACE_ENV};
use seqsync::lookup::{find_organization_member, MemberKey};
use seqsync::platform::auth::Credentials;
use seqsync::platform::http::{debug_response, format_platform_error};
use seqsync::platform::{ApiError, PlatformClient};
use seqsync::VERSION;

/// Synchronous operations over the Seqera Platform API
#[derive(Parser, Debug)]
#[command(name = "seqsync", version, about, long_about = None)]
struct Args {
    /// API endpoint to use
    #[arg(long)]
    base_url: Option<String>,

    /// Workspace to operate in
    #[arg(short, long)]
    workspace: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Describe a compute environment
    DescribeCe { id: String },

    /// Create a compute environment and wait until it is AVAILABLE
    CreateCe {
        /// JSON request body
        #[arg(long)]
        body: PathBuf,
    },

    /// Delete a compute environment and wait until it is gone
    DeleteCe { id: String },

    /// Wait on existing compute environments
    WaitCe {
        #[arg(required = true)]
        ids: Vec<String>,

        #[arg(long, value_enum, default_value = "create")]
        mode: WaitMode,
    },

    /// Find an organization member by email
    FindMember {
        #[arg(long)]
        org: i64,

        #[arg(long)]
        email: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum WaitMode {
    Create,
    Delete,
}

impl From<WaitMode> for PollMode {
    fn from(mode: WaitMode) -> Self {
        match mode {
            WaitMode::Create => PollMode::Create,
            WaitMode::Delete => PollMode::Delete,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Logging disabled: cannot open {}: {}", log_path.display(), e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("seqsync {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("seqsync").join("seqsync.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".seqsync").join("seqsync.log");
    }
    PathBuf::from("seqsync.log")
}

/// Short user-facing message; full request/response goes to the log
fn user_error(error: ApiError) -> anyhow::Error {
    if let Some(response) = error.response() {
        tracing::debug!("{}", debug_response(response));
    }
    anyhow!(format_platform_error(&error))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    let mut config = Config::load();
    let base_url = config.effective_base_url(args.base_url.as_deref());
    let workspace = config.effective_workspace(args.workspace.as_deref());

    let credentials = Credentials::from_env()?;
    let policy = config.poll.to_policy();

    // Ctrl-C stops every in-flight poll at its next suspension point
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    let client = PlatformClient::with_classifier(
        &base_url,
        credentials.clone(),
        policy.clone(),
        config.poll.classifier(),
    )?
    .with_cancellation(cancel.clone());

    tracing::info!("Using endpoint: {}, workspace: {:?}", base_url, workspace);

    let require_workspace = || {
        workspace.clone().with_context(|| {
            format!("No workspace configured. Use --workspace or set {WORKSPACE_ENV}")
        })
    };

    match args.command {
        Command::DescribeCe { id } => {
            let ws = require_workspace()?;
            let described = client.describe_compute_env(&id, &ws).await.map_err(user_error)?;
            println!("{}", serde_json::to_string_pretty(&described)?);
        }
        Command::CreateCe { body } => {
            let ws = require_workspace()?;
            let content = std::fs::read_to_string(&body)
                .with_context(|| format!("Failed to read {}", body.display()))?;
            let payload: serde_json::Value = serde_json::from_str(&content)
                .with_context(|| format!("{} is not valid JSON", body.display()))?;
            let response = client
                .create_compute_env(&ws, &payload)
                .await
                .map_err(user_error)?;
            println!("{}", response.text());
        }
        Command::DeleteCe { id } => {
            let ws = require_workspace()?;
            client.delete_compute_env(&id, &ws).await.map_err(user_error)?;
            println!("Compute environment {} deleted", id);
        }
        Command::WaitCe { ids, mode } => {
            let ws = require_workspace()?;
            let transport = Arc::new(HttpStatusTransport::new(client.http.inner().clone()));
            let poller = StatusPoller::new(transport, policy);

            let targets: Vec<PollTarget> = ids
                .iter()
                .map(|id| PollTarget {
                    resource_id: id.clone(),
                    workspace_id: ws.clone(),
                    base_url: client.base_url().to_string(),
                    auth_header: credentials.authorization_header(),
                    mode: mode.into(),
                })
                .collect();

            // One independent poll per compute environment
            let results = join_all(targets.iter().map(|t| poller.poll(t, &cancel))).await;

            let mut failures = 0;
            for (target, result) in targets.iter().zip(results) {
                match result {
                    Ok(outcome) => println!(
                        "{}: {} after {} describes ({}s)",
                        target.resource_id,
                        outcome.terminal_status,
                        outcome.describes,
                        outcome.elapsed.as_secs()
                    ),
                    Err(e) => {
                        failures += 1;
                        eprintln!("{}: {}", target.resource_id, e);
                    }
                }
            }
            if failures > 0 {
                return Err(anyhow!(
                    "{} of {} compute environments failed",
                    failures,
                    targets.len()
                ));
            }
        }
        Command::FindMember { org, email } => {
            let member = find_organization_member(&client, org, MemberKey::Email(&email))
                .await
                .map_err(user_error)?;
            match member {
                Some(member) => println!("{}", serde_json::to_string_pretty(&member)?),
                None => println!("No member with email {} in organization {}", email, org),
            }
        }
    }

    if config.remember(&base_url, workspace.as_deref()) {
        if let Err(e) = config.save() {
            tracing::warn!("Failed to save config: {}", e);
        }
    }

    Ok(())
}
