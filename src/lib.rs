//! Protocol-translation proxy for the MTA NYCT realtime subway feeds.
//!
//! Upstream, the agency publishes GTFS-realtime feeds with NYCT-specific
//! extensions and trip identifiers that do not literally match the static
//! schedule. This crate matches each realtime trip against the schedule,
//! rewrites trip and stop references to valid schedule identifiers, and
//! assembles one unified trip-updates feed for downstream consumers.

pub mod activation;
pub mod config;
pub mod fetch;
pub mod matcher;
pub mod metrics;
pub mod output;
pub mod parser;
pub mod processor;
pub mod rewriter;
pub mod schedule;
pub mod train_id;
pub mod trip_id;

pub mod gtfs_rt {
    include!(concat!(env!("OUT_DIR"), "/transit_realtime.rs"));
}
