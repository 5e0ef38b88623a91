//! FormVault CLI - inspect and maintain the local form builder store

use anyhow::Context;
use clap::{Parser, Subcommand};
use formvault::app::AppState;
use formvault::config::{DEFAULT_DATA_DIR, RECENT_ACTIVITY_LIMIT};
use formvault::database::BrandingUpdate;
use formvault::error::AppError;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "formvault")]
#[command(version)]
#[command(about = "Offline store for form templates, responses and branding")]
struct Cli {
    /// Directory holding the database and exports
    #[arg(short, long, global = true, env = "FORMVAULT_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save company branding (first-run setup)
    Setup {
        #[arg(long)]
        company_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        website: Option<String>,
        #[arg(long)]
        ein: Option<String>,
        #[arg(long)]
        address: Option<String>,
    },

    /// Show branding and dashboard totals
    Status {
        /// Number of recent responses to list
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// List saved templates
    Templates,

    /// List responses, newest first
    Responses,

    /// Bundled starter templates
    Samples {
        #[command(subcommand)]
        action: SamplesAction,
    },

    /// Print the printable view of a blank template or a filled response
    Document {
        /// Template to print blank
        #[arg(long, conflicts_with = "response")]
        template: Option<i64>,

        /// Response to print filled
        #[arg(long)]
        response: Option<i64>,
    },

    /// Write a snapshot of all data to a JSON file
    Export {
        /// Target directory (defaults to <data-dir>/exports)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Restore a snapshot file
    Import {
        /// Snapshot file to read
        file: PathBuf,
    },

    /// Usage statistics and recent activity
    Stats,

    /// Pending backup queue
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
}

#[derive(Subcommand)]
enum SamplesAction {
    /// List the bundled samples
    List,
    /// Save a sample as a new template
    Install {
        /// Sample name (case-insensitive)
        name: String,
    },
}

#[derive(Subcommand)]
enum QueueAction {
    /// Show pending items
    List,
    /// Queue a snapshot marker
    Add {
        #[arg(short, long, default_value = "manual")]
        reason: String,
    },
    /// Print and remove all pending items
    Drain,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "formvault=debug,info"
    } else {
        "warn"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report(err),
    }
}

/// Print an error; recoverable failures exit 1, storage failures exit 2
fn report(err: anyhow::Error) -> ExitCode {
    match err.downcast_ref::<AppError>() {
        Some(app_err) if app_err.is_recoverable() => {
            eprintln!("error: {}", app_err);
            for violation in app_err.violations() {
                eprintln!("  - {}", violation);
            }
            ExitCode::from(1)
        }
        Some(app_err) => {
            eprintln!("fatal: {}", app_err);
            eprintln!("Check that the data directory is readable and writable, then retry.");
            ExitCode::from(2)
        }
        None => {
            eprintln!("fatal: {:#}", err);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    tracing::info!("Starting FormVault");

    let state = AppState::initialize(&cli.data_dir).await?;
    let result = dispatch(&state, cli.command).await;
    state.shutdown().await;
    result
}

async fn dispatch(state: &AppState, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Setup {
            company_name,
            email,
            phone,
            website,
            ein,
            address,
        } => {
            let record = state
                .setup_branding(BrandingUpdate {
                    company_name,
                    email,
                    phone,
                    website,
                    ein,
                    address,
                })
                .await?;
            print_json(&record)?;
        }

        Commands::Status { limit } => {
            let (branding, dashboard) =
                tokio::try_join!(state.branding.get(), state.forms.dashboard(limit))?;

            match &branding {
                Some(branding) => println!("Company: {}", branding.company_name),
                None => println!("Company: not set up (run `formvault setup`)"),
            }
            println!("Templates: {}", dashboard.template_count);
            println!("Responses: {}", dashboard.response_count);
            for summary in &dashboard.recent_responses {
                println!(
                    "  #{} {} - {}",
                    summary.id,
                    summary.template_name,
                    summary.client_name.as_deref().unwrap_or("(anonymous)")
                );
            }
        }

        Commands::Templates => {
            for template in state.forms.list_templates().await? {
                println!(
                    "#{} {} ({} questions)",
                    template.id.unwrap_or_default(),
                    template.name,
                    template.questions().count()
                );
            }
        }

        Commands::Responses => print_json(&state.forms.response_summaries().await?)?,

        Commands::Samples { action } => match action {
            SamplesAction::List => {
                for sample in state.samples.list() {
                    println!("{} [{}]: {}", sample.name, sample.category, sample.description);
                }
            }
            SamplesAction::Install { name } => {
                let template = state.samples.install(&name).await?;
                println!("Installed {} as template #{}", template.name, template.id.unwrap_or_default());
            }
        },

        Commands::Document { template, response } => {
            let document = match (template, response) {
                (Some(id), _) => state.documents.blank_document(id).await?,
                (None, Some(id)) => state.documents.filled_document(id).await?,
                (None, None) => anyhow::bail!("pass --template or --response"),
            };
            print_json(&document)?;
        }

        Commands::Export { output } => {
            let dir = output.unwrap_or_else(|| state.exports_dir());
            let path = state.backup.export_to_dir(&dir).await?;
            println!("Exported to {}", path.display());
        }

        Commands::Import { file } => {
            let summary = state.backup.import_from_file(&file).await?;
            println!(
                "Imported {} templates and {} responses{}",
                summary.templates,
                summary.responses,
                if summary.branding { " with branding" } else { "" }
            );
            if summary.skipped_analytics > 0 {
                println!("Skipped {} analytics events", summary.skipped_analytics);
            }
        }

        Commands::Stats => {
            let summary = state.analytics.summary().await?;
            println!("Forms: {}", summary.total_forms);
            println!("Responses: {}", summary.total_responses);
            println!("Submissions logged: {}", summary.form_submissions);
            println!("PDF exports: {}", summary.pdf_exports);
            println!("Recent activity (last {}):", RECENT_ACTIVITY_LIMIT);
            for event in &summary.recent_activity {
                println!("  {} {}", event.timestamp.to_rfc3339(), event.event_type);
            }
        }

        Commands::Queue { action } => match action {
            QueueAction::List => print_json(&state.backup.pending().await?)?,
            QueueAction::Add { reason } => print_json(&state.backup.queue_for_sync(&reason).await?)?,
            QueueAction::Drain => print_json(&state.backup.drain_queue().await?)?,
        },
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to format output")?;
    println!("{}", json);
    Ok(())
}
