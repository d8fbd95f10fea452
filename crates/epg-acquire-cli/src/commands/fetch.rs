//! Run a full acquisition and write the record stream and combined document.

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use epg_acquire::progress::{self, ProgressEventKind, ProgressReceiver};
use epg_acquire::{AcquisitionDriver, HttpTransport, PersistenceWriter};

use super::FetchArgs;
use crate::auth::{load_auth_context, AuthOverrides};
use crate::channels::load_channel_ids;
use crate::config::{resolve_auth_context_path, resolve_out_dir};

pub async fn run(args: FetchArgs) -> Result<()> {
    let auth_path = resolve_auth_context_path(args.auth_context.as_deref());
    let overrides = AuthOverrides {
        bearer: args.bearer.clone(),
        client_context: args.client_context.clone(),
        fis_properties: args.fis_properties.clone(),
    };
    let context = load_auth_context(&auth_path, &args.base_url, &overrides)?;

    let channel_ids = load_channel_ids(
        &args.channels.allchannels,
        args.channels.playback.as_deref(),
        args.channels.include_all,
    )?;
    if channel_ids.is_empty() {
        bail!(
            "no channel ids found; check that {} has a resourceId column",
            args.channels.allchannels.display()
        );
    }

    let config = args.config();
    config.validate()?;

    let out_dir = resolve_out_dir(args.out_dir.as_deref());
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("cannot create output directory {}", out_dir.display()))?;
    let mut writer = PersistenceWriter::create(&out_dir)?;

    let transport = HttpTransport::new(&context, config.timeout())?;
    let (tx, rx) = progress::channel();
    let mut driver = AcquisitionDriver::new(context, config, transport).with_progress(tx);

    let cancel = driver.cancellation();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; stopping after in-flight requests");
            cancel.cancel();
        }
    });
    let bar = spawn_progress_bar(rx);

    let outcome = driver.run(args.windows.start(), &channel_ids, &mut writer).await;
    // Closes the progress channel so the bar task ends.
    drop(driver);
    interrupt.abort();
    let _ = bar.await;

    let summary = outcome.context("acquisition failed")?;
    info!(run_id = %summary.run_id, "acquisition complete");
    println!("Work items: {}", summary.work_items);
    println!("Requests:   {}", summary.requests);
    println!("Fallbacks:  {}", summary.fallbacks);
    println!("Elapsed:    {:.1}s", summary.elapsed.as_secs_f64());
    println!("Wrote:      {}", summary.record_stream.display());
    println!("Wrote:      {}", summary.combined.display());
    Ok(())
}

fn spawn_progress_bar(mut rx: ProgressReceiver) -> JoinHandle<()> {
    tokio::spawn(async move {
        let bar = ProgressBar::new(0);
        if let Ok(style) =
            ProgressStyle::with_template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("=> "));
        }

        loop {
            match rx.recv().await {
                Ok(event) => match event.event {
                    ProgressEventKind::RunStarted { work_items, .. } => {
                        bar.set_length(work_items as u64);
                    }
                    ProgressEventKind::WorkItemResolved {
                        item,
                        requests,
                        fallbacks,
                        ..
                    } => {
                        bar.set_position(item as u64);
                        bar.set_message(format!("requests {requests} | fallbacks {fallbacks}"));
                    }
                    ProgressEventKind::RunCompleted { .. } => {
                        bar.finish();
                        break;
                    }
                    ProgressEventKind::RunAborted { .. } => {
                        bar.abandon();
                        break;
                    }
                },
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => {
                    bar.abandon();
                    break;
                }
            }
        }
    })
}
