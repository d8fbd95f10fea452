//! epg-acquire command-line entry point.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use epg_acquire::storage::COMBINED_FILE;
use epg_acquire_cli::commands::{self, ChannelArgs, FetchArgs, WindowArgs};
use epg_acquire_cli::config::resolve_out_dir;
use epg_acquire_cli::inspect::inspect_file;

#[derive(Parser)]
#[command(
    name = "epg-acquire",
    about = "Windowed, batched, coverage-checked acquisition of programme schedules",
    version
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire the schedule and write schedule_windows.jsonl and dtv_schedule_raw.json.
    ///
    /// Ctrl-C stops the run; the record stream keeps what was resolved and no
    /// combined document is written.
    Fetch(Box<FetchArgs>),

    /// Print planned windows, batch sizes and request estimates (no network).
    Plan {
        #[command(flatten)]
        channels: ChannelArgs,

        #[command(flatten)]
        windows: WindowArgs,
    },

    /// Summarize an existing combined document.
    Inspect {
        /// Combined document. Defaults to dtv_schedule_raw.json in the output directory.
        path: Option<PathBuf>,

        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   epg-acquire completions bash > ~/.local/share/bash-completion/completions/epg-acquire
    ///   epg-acquire completions zsh > ~/.zfunc/_epg-acquire
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Fetch(args) => commands::fetch::run(*args).await?,

        Commands::Plan { channels, windows } => commands::plan::run(&channels, &windows)?,

        Commands::Inspect { path, json } => {
            let path = path.unwrap_or_else(|| resolve_out_dir(None).join(COMBINED_FILE));
            let summary = inspect_file(&path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{summary}");
            }
        }

        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "epg-acquire",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}
