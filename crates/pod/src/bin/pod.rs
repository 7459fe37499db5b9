//! Pod CLI - serverless GPU endpoint lifecycle for model serving.
//!
//! `up` prints only the endpoint ID on stdout; logs and prompts go to stderr.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::{theme::ColorfulTheme, Confirm, Select};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pod::providers::runpod::{RunPod, GRAPHQL_URL, REST_BASE_URL};
use pod::{
    EndpointSummary, GpuTier, LifecycleManager, PodConfig, PodError, ReuseChoice, ReuseDecider,
    SessionLedger, UpOutcome, WaitOutcome, DEFAULT_ENDPOINT_NAME,
};

/// Pod CLI - Provision and manage a serverless GPU endpoint.
#[derive(Parser)]
#[command(name = "pod")]
#[command(about = "Provision, warm up, cost and tear down a serverless vLLM endpoint")]
struct Cli {
    /// RunPod API key (or set `RUNPOD_API_KEY` env var).
    #[arg(long, env = "RUNPOD_API_KEY", default_value = "", hide_env_values = true)]
    api_key: String,

    /// Model to serve (or set `MODEL_ID` env var).
    #[arg(long, env = "MODEL_ID", default_value = "Qwen/Qwen3-Coder-Next")]
    model: String,

    /// Hugging Face token for gated models (or set `HF_TOKEN` env var).
    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    hf_token: Option<String>,

    /// Reserved endpoint name.
    #[arg(long, env = "RUNPOD_ENDPOINT_NAME", default_value = DEFAULT_ENDPOINT_NAME)]
    endpoint_name: String,

    /// Use this template instead of reconciling one per model.
    #[arg(long, env = "RUNPOD_TEMPLATE_ID")]
    template_id: Option<String>,

    /// Session record file.
    #[arg(long, env = "POD_SESSION_FILE", default_value = ".pod-session.json")]
    session_file: PathBuf,

    /// Seconds a warm worker is kept without traffic.
    #[arg(long, default_value = "120")]
    idle_timeout: u32,

    /// Maximum number of workers.
    #[arg(long, default_value = "1")]
    workers_max: u32,

    /// Per-request timeout in seconds.
    #[arg(long, default_value = "30")]
    request_timeout: u64,

    /// RunPod REST API base URL.
    #[arg(long, env = "RUNPOD_REST_URL", default_value = REST_BASE_URL, hide = true)]
    rest_url: String,

    /// RunPod GraphQL API URL.
    #[arg(long, env = "RUNPOD_GRAPHQL_URL", default_value = GRAPHQL_URL, hide = true)]
    graphql_url: String,

    /// Enable verbose logging.
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reuse or provision the endpoint and print its ID.
    Up {
        /// Reuse the existing endpoint at this index without prompting.
        #[arg(long, conflicts_with = "new")]
        reuse: Option<usize>,

        /// Create a new endpoint even if one exists.
        #[arg(long)]
        new: bool,

        /// Skip the launch confirmation.
        #[arg(long, short = 'y', default_value = "false")]
        yes: bool,
    },

    /// Report cost, delete the endpoint and close the session.
    Down {
        /// Endpoint ID.
        id: String,
    },

    /// Show the estimated cost of the current session.
    Cost,

    /// Wait until the endpoint has a warm worker.
    Wait {
        /// Endpoint ID.
        id: String,
    },
}

/// Decisions taken from flags, falling back to interactive prompts.
struct PromptDecider {
    reuse: Option<usize>,
    force_new: bool,
    yes: bool,
}

impl PromptDecider {
    fn prompt_error(e: dialoguer::Error) -> PodError {
        PodError::State(format!("prompt failed: {e}"))
    }
}

impl ReuseDecider for PromptDecider {
    fn choose(&self, existing: &[EndpointSummary]) -> Result<ReuseChoice, PodError> {
        if let Some(index) = self.reuse {
            return Ok(ReuseChoice::Reuse(index));
        }
        if self.force_new {
            return Ok(ReuseChoice::CreateNew);
        }

        let mut items: Vec<String> = existing
            .iter()
            .map(|e| format!("Reuse {} (template {})", e.id, e.template_id))
            .collect();
        items.push("Create a new endpoint".to_string());

        let idx = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Found {} existing endpoint(s)", existing.len()))
            .default(0)
            .items(&items)
            .interact()
            .map_err(Self::prompt_error)?;

        if idx < existing.len() {
            Ok(ReuseChoice::Reuse(idx))
        } else {
            Ok(ReuseChoice::CreateNew)
        }
    }

    fn confirm_launch(&self, model_id: &str, tier: GpuTier) -> Result<bool, PodError> {
        if self.yes {
            return Ok(true);
        }

        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!(
                "Launch {model_id} on {} (${:.2}/hr)?",
                tier.display_name(),
                tier.hourly_rate()
            ))
            .default(true)
            .interact()
            .map_err(Self::prompt_error)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = PodConfig::new(cli.model.trim());
    config.hf_token = cli.hf_token.clone().filter(|t| !t.trim().is_empty());
    config.endpoint_name.clone_from(&cli.endpoint_name);
    config.template_id = cli.template_id.clone().filter(|t| !t.trim().is_empty());
    config.idle_timeout_secs = cli.idle_timeout;
    config.workers_max = cli.workers_max;
    config.request_timeout = Duration::from_secs(cli.request_timeout);

    let ledger = SessionLedger::new(&cli.session_file);

    let decider = match &cli.command {
        Commands::Up { reuse, new, yes } => PromptDecider {
            reuse: *reuse,
            force_new: *new,
            yes: *yes,
        },
        _ => PromptDecider {
            reuse: None,
            force_new: false,
            yes: false,
        },
    };

    // `cost` never talks to the API, so it works without a key.
    if let Commands::Cost = cli.command {
        let report = ledger.cost().with_context(|| {
            format!("Failed to read session record {}", ledger.path().display())
        })?;
        println!("{report}");
        return Ok(());
    }

    config.validate().context("Invalid configuration")?;

    let client = RunPod::with_urls(
        &cli.api_key,
        &cli.rest_url,
        &cli.graphql_url,
        config.request_timeout,
    )
    .context("Failed to create RunPod client (is RUNPOD_API_KEY set?)")?;

    let manager = LifecycleManager::new(Arc::new(client), Arc::new(decider), ledger, config);

    match cli.command {
        Commands::Up { .. } => match manager.up().await.context("Failed to bring endpoint up")? {
            UpOutcome::Reused { endpoint_id } => {
                eprintln!("♻️  Reusing endpoint {endpoint_id}");
                println!("{endpoint_id}");
            }
            UpOutcome::Provisioned { endpoint_id, tier } => {
                eprintln!(
                    "✅ Endpoint {endpoint_id} created on {} (${:.2}/hr)",
                    tier.display_name(),
                    tier.hourly_rate()
                );
                eprintln!("💡 Run `pod wait {endpoint_id}` to wait for a warm worker");
                println!("{endpoint_id}");
            }
            UpOutcome::Declined => {
                eprintln!("Launch cancelled.");
            }
        },

        Commands::Wait { id } => {
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_signal.cancel();
                }
            });

            eprintln!("⏳ Waiting for endpoint {id} to warm up...");
            match manager.wait(&id, &cancel).await {
                WaitOutcome::Ready { elapsed } => {
                    eprintln!("✅ Endpoint is ready after {}s", elapsed.as_secs());
                }
                WaitOutcome::Cancelled { elapsed } => {
                    eprintln!("⚠️  Stopped waiting after {}s", elapsed.as_secs());
                }
            }
        }

        Commands::Down { id } => {
            let report = manager.down(&id).await;
            eprintln!("💰 Session cost: {}", report.cost);
            match &report.delete_error {
                None => eprintln!("✅ Endpoint {id} released."),
                Some(e) => eprintln!("❌ Failed to delete endpoint {id}: {e}"),
            }
            match &report.clear_error {
                None if report.session_cleared => info!("Session record removed"),
                None => {}
                Some(e) => {
                    eprintln!("❌ Failed to remove session record: {e}");
                    anyhow::bail!("session record could not be removed");
                }
            }
        }

        Commands::Cost => {}
    }

    Ok(())
}
