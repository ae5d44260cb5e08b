//! Approvalgate: hold workflow items until a human approves them.
//!
//! Quick start:
//!   approvalgate check gate.yaml                          # validate a gate file
//!   approvalgate run --config gate.yaml --input items.json
//!   approvalgate log                                      # what did the gate decide?
//!
//! For more info: approvalgate --help

use approvalgate::cli;
use approvalgate::service::http::DEFAULT_DOMAIN;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::filter::{Directive, LevelFilter};

/// Approvalgate: a human-in-the-loop approval step for automated workflows.
#[derive(Parser)]
#[command(
    name = "approvalgate",
    version,
    about = "Hold workflow items until a human approves them",
    long_about = "Approvalgate submits each item to an approval service, waits for a\n\
                  reviewer's decision and routes the item by that decision.\n\n\
                  Quick start:\n  \
                  approvalgate check gate.yaml\n  \
                  approvalgate run --config gate.yaml --input items.json\n  \
                  approvalgate log"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a gate over a batch of items
    Run {
        /// Gate configuration file
        #[arg(short, long, default_value = "gate.yaml")]
        config: PathBuf,

        /// JSON file with one item or an array of items
        #[arg(short, long)]
        input: PathBuf,

        /// Emit error items instead of stopping at the first failure
        #[arg(long)]
        continue_on_fail: bool,

        /// Address the callback server binds (suspend-resume-v2)
        #[arg(long, default_value = "127.0.0.1:0")]
        callback_bind: String,

        /// Base URL the service should call back on, if not the bind address
        #[arg(long)]
        public_url: Option<String>,

        /// Write the decision log here instead of ~/.approvalgate/logs/
        #[arg(long)]
        audit_log: Option<PathBuf>,

        /// Node id reported to the service and used in the callback path
        #[arg(long, default_value = "approval-gate")]
        node_id: String,

        #[arg(long, env = "APPROVALGATE_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        #[arg(long, env = "APPROVALGATE_DOMAIN", default_value = DEFAULT_DOMAIN)]
        domain: String,
    },

    /// Validate a gate configuration file
    Check {
        /// Path to the gate file
        #[arg(default_value = "gate.yaml")]
        config: PathBuf,

        /// Also verify the API key against the approval service
        #[arg(long)]
        credentials: bool,

        #[arg(long, env = "APPROVALGATE_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        #[arg(long, env = "APPROVALGATE_DOMAIN", default_value = DEFAULT_DOMAIN)]
        domain: String,
    },

    /// Run the callback server alone and print incoming decisions
    Listen {
        #[arg(short, long, default_value = "127.0.0.1:8787")]
        bind: String,
    },

    /// See what the gate decided
    Log {
        /// Show a specific execution
        #[arg(short, long, help = "Execution ID to view")]
        execution: Option<String>,

        /// Read a specific log file
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Filter by outcome
        #[arg(
            short,
            long,
            help = "Filter: approved, declined, change_requested, suspended, resumed, failed"
        )]
        outcome: Option<String>,

        #[arg(short, long, help = "Max entries to show")]
        limit: Option<usize>,

        #[arg(long, help = "Show only the execution summary")]
        summary: bool,

        #[arg(long, help = "List all logged executions")]
        list: bool,
    },
}

#[tokio::main]
async fn main() {
    // Quiet unless RUST_LOG asks for more
    let directive: Directive = "approvalgate=warn"
        .parse()
        .unwrap_or_else(|_| LevelFilter::WARN.into());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive))
        .with_target(false)
        .without_time()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            config,
            input,
            continue_on_fail,
            callback_bind,
            public_url,
            audit_log,
            node_id,
            api_key,
            domain,
        } => {
            let options = cli::run::RunOptions {
                config_path: config,
                input_path: input,
                continue_on_fail,
                callback_bind,
                public_url,
                audit_log,
                api_key: api_key.unwrap_or_default(),
                domain,
                node_id,
            };
            cli::run::run_gate(options).await
        }

        Commands::Check {
            config,
            credentials,
            api_key,
            domain,
        } => match cli::check::run_check(&config) {
            Ok(()) if credentials => {
                cli::check::run_check_credentials(api_key.as_deref().unwrap_or_default(), &domain)
                    .await
            }
            other => other,
        },

        Commands::Listen { bind } => cli::listen::run_listen(&bind).await,

        Commands::Log {
            execution,
            path,
            outcome,
            limit,
            summary,
            list,
        } => {
            if list {
                cli::log::run_log_list()
            } else {
                cli::log::run_log(cli::log::LogOptions {
                    execution_id: execution.as_deref(),
                    path: path.as_deref(),
                    outcome: outcome.as_deref(),
                    limit,
                    summary_only: summary,
                })
            }
        }
    };

    if let Err(e) = result {
        eprintln!();
        eprintln!("  {} {}", "✗".red().bold(), e);
        for cause in e.chain().skip(1) {
            eprintln!("  {} {}", "caused by:".dimmed(), cause);
        }
        eprintln!();
        std::process::exit(1);
    }
}
