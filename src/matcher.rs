//! Matching realtime trips to scheduled trips.
//!
//! A realtime trip identifier carries route, direction, and an
//! origin-departure time in hundredths of a minute; the matcher scans every
//! scheduled trip on that route and keeps strict candidates (identical
//! identifier parts including network, on the service day) and loose
//! candidates (same route and direction, running up to a configured limit
//! later than a scheduled start). Trips signed before 3:00 AM are also
//! tried against the previous service day's 26-hour schedule.

use std::cmp::Ordering;

use crate::activation::{ActivatedTrip, ActivatedTripIndex};
use crate::schedule::ServiceDate;
use crate::trip_id::TripId;

/// Outcome classification for one realtime trip update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchStatus {
    /// Route, direction, origin-departure time, and network all equal, on
    /// the service day.
    StrictMatch,
    /// Route and direction equal; the realtime trip runs `delta` seconds
    /// later than the scheduled start.
    LooseMatch,
    /// Scheduled trips with the right route and direction exist on the
    /// service day, but none satisfied the match criteria.
    NoMatch,
    /// No scheduled trip with the right route and direction exists on the
    /// service day at all.
    NoTripWithStartDate,
    /// The realtime trip identifier did not parse.
    BadTripId,
    /// The rewrite left no stop-time updates; the trip was absorbed.
    Merged,
}

/// The result of matching one realtime trip update.
#[derive(Debug, Clone)]
pub struct MatchResult<'a> {
    pub status: MatchStatus,
    pub trip: Option<ActivatedTrip<'a>>,
    /// Seconds the realtime trip runs later than the scheduled start; only
    /// present on loose matches, always within `[0, late_trip_limit_sec)`.
    pub delta: Option<i64>,
    pub on_service_day: bool,
}

impl<'a> MatchResult<'a> {
    fn unmatched(status: MatchStatus) -> MatchResult<'a> {
        MatchResult {
            status,
            trip: None,
            delta: None,
            on_service_day: false,
        }
    }

    fn strict(activated: ActivatedTrip<'a>) -> MatchResult<'a> {
        MatchResult {
            status: MatchStatus::StrictMatch,
            trip: Some(activated),
            delta: None,
            on_service_day: true,
        }
    }

    fn loose(activated: ActivatedTrip<'a>, delta: i64, on_service_day: bool) -> MatchResult<'a> {
        MatchResult {
            status: MatchStatus::LooseMatch,
            trip: Some(activated),
            delta: Some(delta),
            on_service_day,
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self.status, MatchStatus::StrictMatch | MatchStatus::LooseMatch)
    }
}

pub struct TripMatcher<'a> {
    index: &'a ActivatedTripIndex,
    late_trip_limit_sec: i64,
    loose_match_disabled: bool,
}

impl<'a> TripMatcher<'a> {
    pub fn new(
        index: &'a ActivatedTripIndex,
        late_trip_limit_sec: i64,
        loose_match_disabled: bool,
    ) -> TripMatcher<'a> {
        TripMatcher {
            index,
            late_trip_limit_sec,
            loose_match_disabled,
        }
    }

    pub fn index(&self) -> &'a ActivatedTripIndex {
        self.index
    }

    /// Match one realtime trip against the schedule. `timestamp` is the
    /// feed's wall clock in epoch seconds and fixes the service date.
    pub fn match_trip(&self, id: Option<&TripId>, timestamp: i64) -> MatchResult<'a> {
        let Some(id) = id else {
            return MatchResult::unmatched(MatchStatus::BadTripId);
        };

        let service_date = ServiceDate::from_timestamp(timestamp, self.index.agency_timezone());

        let mut candidates: Vec<MatchResult<'a>> = Vec::new();
        let mut found_with_start_date = self.add_candidates(id, service_date, &mut candidates);

        // Static ids run on a 26-hour service period while realtime ids are
        // relative to midnight, so a pre-3AM trip may belong to yesterday's
        // schedule. Latest static departure is 26:02, which admits trips up
        // to 58 minutes late on the lookback pass.
        if id.origin_departure_time() < 3 * 60 * 100 {
            found_with_start_date |= self.add_candidates(
                &id.relative_to_previous_day(),
                service_date.previous(),
                &mut candidates,
            );
        }

        candidates
            .into_iter()
            .max_by(compare_candidates)
            .unwrap_or_else(|| {
                MatchResult::unmatched(if found_with_start_date {
                    MatchStatus::NoMatch
                } else {
                    MatchStatus::NoTripWithStartDate
                })
            })
    }

    // Scan scheduled trips on the id's route, collecting candidates.
    // Returns true when any trip with matching route and direction exists
    // on the given service date's route set.
    fn add_candidates(
        &self,
        id: &TripId,
        service_date: ServiceDate,
        candidates: &mut Vec<MatchResult<'a>>,
    ) -> bool {
        let service_ids = self.index.service_ids_for_date(service_date);
        let mut found = false;

        for trip in self.index.trips_on_route(id.route_id()) {
            let scheduled_id = trip.parsed_id();
            if !scheduled_id.route_dir_match(id) {
                continue;
            }
            found = true;
            let on_service_day = service_ids.contains(&trip.service_id);
            let activated = ActivatedTrip { service_date, trip };

            if scheduled_id.strict_match(id) && on_service_day {
                candidates.push(MatchResult::strict(activated));
                continue;
            }

            if self.loose_match_disabled {
                continue;
            }

            // One origin-departure unit is 0.6 s; integer floor division
            // keeps the delta == 0 boundary exact.
            let delta = (id.origin_departure_time() as i64 * 3).div_euclid(5) - trip.start_sec;
            if delta >= 0 && delta < self.late_trip_limit_sec {
                // a coerced same-minute match may cross service days, but a
                // late one may not
                if on_service_day || delta == 0 {
                    candidates.push(MatchResult::loose(activated, delta, on_service_day));
                }
            }
        }

        found
    }
}

// Candidate ordering: strict beats loose; among loose matches less lateness
// wins, then running on the queried service day, then the lexicographically
// smallest scheduled trip id (stable across runs).
fn compare_candidates<'a>(a: &MatchResult<'a>, b: &MatchResult<'a>) -> Ordering {
    let strict = |r: &MatchResult<'a>| r.status == MatchStatus::StrictMatch;
    strict(a)
        .cmp(&strict(b))
        .then_with(|| match (a.delta, b.delta) {
            (Some(da), Some(db)) => db.cmp(&da),
            _ => Ordering::Equal,
        })
        .then_with(|| a.on_service_day.cmp(&b.on_service_day))
        .then_with(|| {
            let trip_id = |r: &MatchResult<'a>| r.trip.map(|t| t.trip.trip_id.as_str());
            trip_id(b).cmp(&trip_id(a))
        })
}
