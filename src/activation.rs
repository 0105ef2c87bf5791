//! Which scheduled trips are active when.
//!
//! Built once from the loaded schedule and read-only afterwards, so cycles
//! can share it without synchronization. Answers the matcher's two
//! questions (trips on a route, service ids on a date) and carries a
//! one-dimensional interval index over `[start, end]` stop-time spans for
//! range scans across the 26-hour service day.

use chrono_tz::Tz;
use std::collections::{HashMap, HashSet};

use crate::schedule::{ScheduledTrip, ServiceDate, StaticSchedule};

/// A scheduled trip pinned to the service date it is running on.
#[derive(Debug, Clone, Copy)]
pub struct ActivatedTrip<'a> {
    pub service_date: ServiceDate,
    pub trip: &'a ScheduledTrip,
}

#[derive(Debug)]
struct TimeSpan {
    start: i64,
    end: i64,
    trip_index: usize,
}

#[derive(Debug)]
pub struct ActivatedTripIndex {
    schedule: StaticSchedule,
    by_route: HashMap<String, Vec<usize>>,
    // sorted by span start for the range query
    by_time: Vec<TimeSpan>,
    // how many service days back a span can still be in progress
    max_lookback_days: usize,
}

impl ActivatedTripIndex {
    pub fn new(schedule: StaticSchedule) -> ActivatedTripIndex {
        let mut by_route: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_time = Vec::with_capacity(schedule.trips.len());
        let mut max_time: i64 = 0;

        for (i, trip) in schedule.trips.iter().enumerate() {
            by_route.entry(trip.route_id.clone()).or_default().push(i);
            let (start, end) = trip.time_span();
            max_time = max_time.max(end);
            by_time.push(TimeSpan {
                start,
                end,
                trip_index: i,
            });
        }
        by_time.sort_by_key(|span| span.start);

        let max_lookback_days = (max_time as f64 / 86400.0).ceil() as usize;

        ActivatedTripIndex {
            schedule,
            by_route,
            by_time,
            max_lookback_days: max_lookback_days.max(1),
        }
    }

    pub fn schedule(&self) -> &StaticSchedule {
        &self.schedule
    }

    pub fn agency_timezone(&self) -> Tz {
        self.schedule.agency_timezone
    }

    /// All scheduled trips on a route, in schedule order.
    pub fn trips_on_route<'a>(
        &'a self,
        route_id: &str,
    ) -> impl Iterator<Item = &'a ScheduledTrip> + 'a {
        self.by_route
            .get(route_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .map(move |&i| &self.schedule.trips[i])
    }

    /// Service ids active on a service date.
    pub fn service_ids_for_date(&self, service_date: ServiceDate) -> HashSet<String> {
        self.schedule.calendar.service_ids_for_date(service_date)
    }

    /// Whether a trip runs on the given service date.
    pub fn is_active(&self, trip: &ScheduledTrip, service_date: ServiceDate) -> bool {
        self.schedule
            .calendar
            .runs_on(&trip.service_id, service_date.date())
    }

    /// Trips whose stop-time span overlaps `[start_sec, end_sec]` in
    /// seconds since service-day midnight.
    pub fn trips_in_seconds_range<'a>(
        &'a self,
        start_sec: i64,
        end_sec: i64,
    ) -> impl Iterator<Item = &'a ScheduledTrip> + 'a {
        let cutoff = self.by_time.partition_point(|span| span.start <= end_sec);
        self.by_time[..cutoff]
            .iter()
            .filter(move |span| span.end >= start_sec)
            .map(move |span| &self.schedule.trips[span.trip_index])
    }

    /// Activated trips in progress anywhere within an epoch-seconds window,
    /// restricted to `route_ids`. Walks back over previous service days far
    /// enough to catch overnight spans still running past their nominal day.
    pub fn trips_for_epoch_range<'a>(
        &'a self,
        start_epoch: i64,
        end_epoch: i64,
        route_ids: &HashSet<String>,
    ) -> Vec<ActivatedTrip<'a>> {
        let tz = self.agency_timezone();
        let mut service_date = ServiceDate::from_timestamp(start_epoch, tz);
        let mut activated = Vec::new();

        for _ in 0..self.max_lookback_days {
            let service_ids = self.service_ids_for_date(service_date);
            let origin = service_date.start_epoch(tz);

            for trip in self.trips_in_seconds_range(start_epoch - origin, end_epoch - origin) {
                if route_ids.contains(&trip.route_id) && service_ids.contains(&trip.service_id) {
                    activated.push(ActivatedTrip { service_date, trip });
                }
            }

            service_date = service_date.previous();
        }

        activated
    }
}
