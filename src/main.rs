//! build-monitor - CI build timer.
//!
//! Run `start` before the build step and `end` after it:
//! - `end` computes the elapsed time and normalizes the job status
//! - optionally waits for a health endpoint to return 200
//! - writes step outputs and optionally POSTs a JSON report to a webhook

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use build_monitor::commands::{self, EndOptions, DEFAULT_PROJECT_NAME};
use build_monitor::config::Config;

#[derive(Parser)]
#[command(name = "build-monitor")]
#[command(about = "CI build timer with health check and webhook reporting")]
#[command(
    after_help = "QUICK START:\n  build-monitor start --project-name app   Before the build\n  build-monitor end --job-status success    After the build"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record the build start time
    Start {
        /// Project name, used to key the start marker
        #[arg(long, env = "INPUT_PROJECT_NAME", default_value = DEFAULT_PROJECT_NAME)]
        project_name: String,
    },

    /// Compute build duration, check health, and emit outputs
    End {
        /// Project name (must match the one given to start)
        #[arg(long, env = "INPUT_PROJECT_NAME", default_value = DEFAULT_PROJECT_NAME)]
        project_name: String,

        /// Job outcome: success, failure, or cancelled (anything else is unknown)
        #[arg(long, env = "INPUT_JOB_STATUS")]
        job_status: Option<String>,

        /// POST the JSON report here
        #[arg(long, env = "INPUT_WEBHOOK_URL")]
        webhook_url: Option<String>,

        /// GET this URL and expect HTTP 200
        #[arg(long, env = "INPUT_HEALTH_CHECK_URL")]
        health_check_url: Option<String>,

        /// Keep retrying the health check for up to N seconds (0 = single check)
        #[arg(long, env = "INPUT_HEALTH_WAIT_SECONDS", allow_hyphen_values = true)]
        health_wait_seconds: Option<String>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    // Load before parsing so .env can supply INPUT_* fallbacks
    let config = Config::load();
    let cli = Cli::parse();

    match cli.command {
        Commands::Start { project_name } => {
            commands::cmd_start(&config, &project_name)?;
        }

        Commands::End {
            project_name,
            job_status,
            webhook_url,
            health_check_url,
            health_wait_seconds,
        } => {
            let options = EndOptions {
                project_name,
                job_status,
                webhook_url,
                health_check_url,
                health_wait_seconds,
            };
            commands::cmd_end(&config, &options).await?;
        }
    }

    Ok(())
}
