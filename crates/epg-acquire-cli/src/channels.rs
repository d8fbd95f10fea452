//! Channel list loading from the channel directory exports.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};

use crate::csv::parse_records;

/// Truthy spellings accepted in the `playable` column.
const TRUTHY: &[&str] = &["1", "true", "yes", "y", "t", "on"];

/// Channel identifiers to acquire, deduplicated and sorted.
///
/// Identifiers come from the `resourceId` (or `resource_id`) column of
/// `allchannels`. With a `playback` export and without `include_all`, only
/// channels marked playable there are kept, unless none are, in which case
/// every channel is kept.
pub fn load_channel_ids(
    allchannels: &Path,
    playback: Option<&Path>,
    include_all: bool,
) -> Result<Vec<String>> {
    let all_text = read(allchannels)?;
    let playback_text = match playback {
        Some(path) if !include_all => Some(read(path)?),
        _ => None,
    };
    Ok(channel_ids_from_csv(&all_text, playback_text.as_deref()))
}

/// Same as [`load_channel_ids`], on CSV text already in memory.
pub fn channel_ids_from_csv(allchannels: &str, playback: Option<&str>) -> Vec<String> {
    let all: BTreeSet<String> = parse_records(allchannels)
        .iter()
        .filter_map(resource_id)
        .collect();

    let Some(playback) = playback else {
        return all.into_iter().collect();
    };
    let playable: HashSet<String> = parse_records(playback)
        .iter()
        .filter(|r| r.get("playable").is_some_and(|v| is_truthy(v)))
        .filter_map(resource_id)
        .collect();

    if playable.is_empty() {
        return all.into_iter().collect();
    }
    all.into_iter().filter(|id| playable.contains(id)).collect()
}

fn resource_id(record: &HashMap<String, String>) -> Option<String> {
    ["resourceId", "resource_id"]
        .iter()
        .filter_map(|k| record.get(*k))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

fn is_truthy(value: &str) -> bool {
    let value = value.trim().to_ascii_lowercase();
    TRUTHY.contains(&value.as_str())
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: &str = "ccid,callSign,resourceId\n\
                       1,AAA,r-3\n\
                       2,BBB,r-1\n\
                       3,CCC,\n\
                       4,DDD,r-2\n\
                       5,DUP,r-1\n";

    #[test]
    fn test_all_channels_sorted_and_deduped() {
        assert_eq!(channel_ids_from_csv(ALL, None), vec!["r-1", "r-2", "r-3"]);
    }

    #[test]
    fn test_playable_filter() {
        let playback = "resource_id,playable\nr-1,Yes\nr-2,0\nr-3,on\nr-9,true\n";
        assert_eq!(channel_ids_from_csv(ALL, Some(playback)), vec!["r-1", "r-3"]);
    }

    #[test]
    fn test_no_playable_rows_keeps_everything() {
        let playback = "resourceId,playable\nr-1,no\nr-2,\n";
        assert_eq!(channel_ids_from_csv(ALL, Some(playback)).len(), 3);
    }

    #[test]
    fn test_missing_column_is_empty() {
        assert!(channel_ids_from_csv("ccid,name\n1,x\n", None).is_empty());
    }
}
