//! Proxy configuration.
//!
//! Stored as a plain JSON object on disk; every key is optional and falls
//! back to the defaults below. The upstream API key is not part of the
//! file; it comes from the `MTA_API_KEY` environment variable.

use anyhow::Result;
use serde::Deserialize;
use std::collections::HashSet;

use crate::train_id;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProxyConfig {
    /// Upstream feed ids, fetched and processed in this order each cycle.
    pub feed_ids: Vec<u32>,
    /// Upstream endpoint; `feed_id` and the key are appended as query
    /// parameters.
    pub feed_url: String,
    /// Seconds between cycles.
    pub refresh_rate_sec: u64,
    /// Fetch attempts per feed before giving up for the cycle.
    pub n_tries: u32,
    /// Seconds between attempts when a feed comes back empty.
    pub retry_delay_sec: u64,
    /// When set, the API key goes into this HTTP header instead of the
    /// `key` query parameter.
    pub api_key_header: Option<String>,

    /// Upper bound (exclusive) on loose-match lateness, in seconds.
    pub late_trip_limit_sec: i64,
    /// Consider only strict matches.
    pub loose_match_disabled: bool,
    /// Emit unmatched realtime trips as CANCELED instead of dropping them.
    pub cancel_unmatched_trips: bool,
    /// Drop stop-time updates older than this many seconds; -1 disables.
    pub latency_limit: i64,
    /// Routes whose upstream N/S signing is backwards.
    pub reversed_directions_routes: HashSet<String>,
    /// Flushing line stop abbreviations, north to south, for direction
    /// inference on routes 7/7X.
    pub flushing_stops: Vec<String>,
}

impl Default for ProxyConfig {
    fn default() -> ProxyConfig {
        ProxyConfig {
            feed_ids: vec![1, 2, 11, 16, 21],
            feed_url: "http://datamine.mta.info/mta_esi.php".to_string(),
            refresh_rate_sec: 60,
            n_tries: 5,
            retry_delay_sec: 5,
            api_key_header: None,
            late_trip_limit_sec: 3600,
            loose_match_disabled: false,
            cancel_unmatched_trips: false,
            latency_limit: -1,
            reversed_directions_routes: HashSet::new(),
            flushing_stops: train_id::default_flushing_stops(),
        }
    }
}

impl ProxyConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<ProxyConfig> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }
}
