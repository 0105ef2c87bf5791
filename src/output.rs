//! Assembling and publishing the aggregated feed.

use anyhow::Result;
use prost::Message;
use std::path::Path;

use crate::gtfs_rt::{FeedEntity, FeedHeader, FeedMessage, TripUpdate};

/// Wraps rewritten trip updates into a full-dataset feed message. Each
/// entity is keyed by its (schedule-valid) trip id.
pub fn build_feed(trip_updates: Vec<TripUpdate>, timestamp: u64) -> FeedMessage {
    let entity = trip_updates
        .into_iter()
        .map(|tu| FeedEntity {
            id: tu.trip.trip_id().to_string(),
            trip_update: Some(tu),
            ..Default::default()
        })
        .collect();

    FeedMessage {
        header: FeedHeader {
            gtfs_realtime_version: "2.0".to_string(),
            timestamp: Some(timestamp),
            ..Default::default()
        },
        entity,
    }
}

/// Writes the encoded feed to `path` via a temp-file rename, so a reader
/// polling the path never observes a partial write.
pub fn write_feed(path: &Path, feed: &FeedMessage) -> Result<()> {
    let bytes = feed.encode_to_vec();
    let tmp = path.with_extension("pb.tmp");
    std::fs::write(&tmp, &bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
