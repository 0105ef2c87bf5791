//! Match-outcome counters.
//!
//! Each cycle owns one [`MatchMetrics`]; feeds record into a per-feed
//! instance that is absorbed into the cycle total. Counters are kept per
//! route as well, and every cycle ends with one structured summary line per
//! feed plus one for the total.

use log::info;
use std::collections::BTreeMap;

use crate::matcher::MatchStatus;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MatchCounts {
    pub matched_strict: usize,
    pub matched_loose: usize,
    pub no_match: usize,
    pub no_trip_with_start_date: usize,
    pub bad_trip_id: usize,
    pub merged: usize,
    pub duplicates: usize,
    pub cancellations: usize,
}

impl MatchCounts {
    fn record(&mut self, status: MatchStatus) {
        match status {
            MatchStatus::StrictMatch => self.matched_strict += 1,
            MatchStatus::LooseMatch => self.matched_loose += 1,
            MatchStatus::NoMatch => self.no_match += 1,
            MatchStatus::NoTripWithStartDate => self.no_trip_with_start_date += 1,
            MatchStatus::BadTripId => self.bad_trip_id += 1,
            MatchStatus::Merged => self.merged += 1,
        }
    }

    fn absorb(&mut self, other: &MatchCounts) {
        self.matched_strict += other.matched_strict;
        self.matched_loose += other.matched_loose;
        self.no_match += other.no_match;
        self.no_trip_with_start_date += other.no_trip_with_start_date;
        self.bad_trip_id += other.bad_trip_id;
        self.merged += other.merged;
        self.duplicates += other.duplicates;
        self.cancellations += other.cancellations;
    }

    pub fn matched(&self) -> usize {
        self.matched_strict + self.matched_loose
    }

    pub fn unmatched(&self) -> usize {
        self.no_match + self.no_trip_with_start_date + self.bad_trip_id
    }
}

#[derive(Debug, Default, Clone)]
pub struct MatchMetrics {
    total: MatchCounts,
    by_route: BTreeMap<String, MatchCounts>,
}

impl MatchMetrics {
    pub fn new() -> MatchMetrics {
        MatchMetrics::default()
    }

    pub fn record_status(&mut self, route_id: Option<&str>, status: MatchStatus) {
        self.total.record(status);
        if let Some(route_id) = route_id {
            self.by_route.entry(route_id.to_string()).or_default().record(status);
        }
    }

    pub fn record_duplicate(&mut self, route_id: Option<&str>) {
        self.total.duplicates += 1;
        if let Some(route_id) = route_id {
            self.by_route.entry(route_id.to_string()).or_default().duplicates += 1;
        }
    }

    pub fn record_cancellation(&mut self, route_id: Option<&str>) {
        self.total.cancellations += 1;
        if let Some(route_id) = route_id {
            self.by_route.entry(route_id.to_string()).or_default().cancellations += 1;
        }
    }

    /// Roll another accumulator (typically one feed's) into this one.
    pub fn absorb(&mut self, other: &MatchMetrics) {
        self.total.absorb(&other.total);
        for (route_id, counts) in &other.by_route {
            self.by_route.entry(route_id.clone()).or_default().absorb(counts);
        }
    }

    pub fn total(&self) -> &MatchCounts {
        &self.total
    }

    pub fn by_route(&self) -> impl Iterator<Item = (&str, &MatchCounts)> {
        self.by_route.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// One summary line per outcome bucket, labeled by feed or "total".
    pub fn log_summary(&self, label: &str) {
        let t = &self.total;
        info!(
            "{}: strict={} loose={} no_match={} no_trip_with_start_date={} bad_trip_id={} merged={} duplicates={} canceled={}",
            label,
            t.matched_strict,
            t.matched_loose,
            t.no_match,
            t.no_trip_with_start_date,
            t.bad_trip_id,
            t.merged,
            t.duplicates,
            t.cancellations,
        );
    }
}
