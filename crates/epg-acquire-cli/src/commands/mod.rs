//! Subcommand implementations and their shared arguments.

pub mod fetch;
pub mod plan;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::Args;

use epg_acquire::{AcquisitionConfig, RetryPolicy};

use crate::config::DEFAULT_BASE_URL;

/// Where the channel list comes from.
#[derive(Debug, Clone, Args)]
pub struct ChannelArgs {
    /// Channel directory export (CSV with a resourceId column).
    #[arg(long)]
    pub allchannels: PathBuf,

    /// Playback export used to keep only playable channels.
    #[arg(long)]
    pub playback: Option<PathBuf>,

    /// Include non-playable channels too.
    #[arg(long)]
    pub include_all: bool,
}

/// Shape of the time span and batches.
#[derive(Debug, Clone, Args)]
pub struct WindowArgs {
    /// How many days ahead to fetch.
    #[arg(long, default_value_t = 3)]
    pub days: i64,

    /// Window size in hours.
    #[arg(long, default_value_t = 6)]
    pub window_hours: i64,

    /// Max channels per multi-channel request.
    #[arg(long, default_value_t = 40)]
    pub max_channels: usize,

    /// Start of the span (RFC 3339). Defaults to now.
    #[arg(long)]
    pub start: Option<DateTime<Utc>>,
}

impl WindowArgs {
    pub fn start(&self) -> DateTime<Utc> {
        self.start.unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, Clone, Args)]
pub struct FetchArgs {
    #[command(flatten)]
    pub channels: ChannelArgs,

    #[command(flatten)]
    pub windows: WindowArgs,

    /// Captured session (auth_context.json). Also reads EPG_AUTH_CONTEXT.
    #[arg(long)]
    pub auth_context: Option<PathBuf>,

    /// Output directory. Also reads EPG_OUT_DIR.
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// API base URL.
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Override the bearer token from the auth context.
    #[arg(long)]
    pub bearer: Option<String>,

    /// Override clientContext from the auth context.
    #[arg(long)]
    pub client_context: Option<String>,

    /// Override fisProperties from the auth context.
    #[arg(long)]
    pub fis_properties: Option<String>,

    /// HTTP timeout in seconds.
    #[arg(long, default_value_t = 20)]
    pub timeout: u64,

    /// Attempts per request (1 disables retry).
    #[arg(long, default_value_t = 3)]
    pub retries: u32,

    /// Backoff base in seconds.
    #[arg(long, default_value_t = 1.0)]
    pub retry_backoff: f64,

    /// Backoff cap in seconds.
    #[arg(long, default_value_t = 20.0)]
    pub retry_backoff_cap: f64,

    /// Minimum channel coverage a multi-channel response must reach.
    #[arg(long, default_value_t = 0.75)]
    pub min_ratio: f64,

    /// Pass include4K=true.
    #[arg(long = "include4k")]
    pub include_4k: bool,

    /// Pass is4KCompatible=true.
    #[arg(long = "is4kcompatible")]
    pub is_4k_compatible: bool,

    /// Work items resolved in parallel; output order is unaffected.
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,
}

impl FetchArgs {
    pub fn config(&self) -> AcquisitionConfig {
        AcquisitionConfig {
            days: self.windows.days,
            window_hours: self.windows.window_hours,
            max_channels: self.windows.max_channels,
            timeout_secs: self.timeout,
            retry: RetryPolicy::new(self.retries, self.retry_backoff, self.retry_backoff_cap),
            min_ratio: self.min_ratio,
            include_4k: self.include_4k,
            is_4k_compatible: self.is_4k_compatible,
            concurrency: self.concurrency,
        }
    }
}
