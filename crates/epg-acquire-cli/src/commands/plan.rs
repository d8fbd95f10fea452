//! Dry run: print the planned windows and batches without touching the network.

use anyhow::{bail, Result};

use epg_acquire::{batch_channels, plan_windows, AcquisitionConfig, PlanSummary};

use super::{ChannelArgs, WindowArgs};
use crate::channels::load_channel_ids;

pub fn run(channels: &ChannelArgs, windows: &WindowArgs) -> Result<()> {
    let ids = load_channel_ids(
        &channels.allchannels,
        channels.playback.as_deref(),
        channels.include_all,
    )?;
    if ids.is_empty() {
        bail!(
            "no channel ids found; check that {} has a resourceId column",
            channels.allchannels.display()
        );
    }

    let config = AcquisitionConfig {
        days: windows.days,
        window_hours: windows.window_hours,
        max_channels: windows.max_channels,
        ..Default::default()
    };
    config.validate()?;

    let planned = plan_windows(windows.start(), config.span(), config.window())?;
    let batches = batch_channels(&ids, config.max_channels)?;
    let summary = PlanSummary::new(&planned, &batches);
    let sizes: Vec<String> = batches.iter().map(|b| b.len().to_string()).collect();

    println!("Channels:   {}", summary.channels);
    println!("Batches:    {} per window ({})", summary.batches, sizes.join(", "));
    println!("Windows:    {}", summary.windows);
    for (i, window) in planned.iter().enumerate() {
        println!("  {:>3}  {window}", i + 1);
    }
    println!("Work items: {}", summary.work_items());
    println!(
        "Requests:   {} (up to {} if every batch falls back)",
        summary.min_requests, summary.max_requests
    );
    Ok(())
}
