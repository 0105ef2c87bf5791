//! Rewriting a matched trip update against its scheduled trip.
//!
//! Downstream consumers resolve trip and stop references against the static
//! schedule, so the rewritten update carries the scheduled trip's id, route,
//! and start date, and keeps only stop-time updates whose stops occur in the
//! scheduled stop sequence, in schedule order.

use std::collections::HashMap;

use crate::activation::ActivatedTrip;
use crate::gtfs_rt::{trip_descriptor::ScheduleRelationship, TripUpdate};

pub struct StopTimeRewriter {
    // seconds; updates whose time is further in the past are dropped.
    // -1 disables the filter.
    latency_limit: i64,
}

impl StopTimeRewriter {
    pub fn new(latency_limit: i64) -> StopTimeRewriter {
        StopTimeRewriter { latency_limit }
    }

    /// Rewrite `tu` against the matched scheduled trip. Returns `None` when
    /// no stop-time updates survive the filter, in which case the update is
    /// absorbed (or canceled, per configuration) by the caller.
    pub fn rewrite(
        &self,
        tu: &TripUpdate,
        activated: &ActivatedTrip<'_>,
        feed_timestamp: i64,
    ) -> Option<TripUpdate> {
        let trip = activated.trip;

        let mut rewritten = tu.clone();
        rewritten.trip.trip_id = Some(trip.trip_id.clone());
        rewritten.trip.route_id = Some(trip.route_id.clone());
        rewritten.trip.start_date = Some(activated.service_date.to_start_date());
        rewritten.trip.schedule_relationship = Some(ScheduleRelationship::Scheduled as i32);

        // first occurrence position of each stop in schedule order
        let mut schedule_position: HashMap<&str, usize> = HashMap::new();
        for (i, st) in trip.stop_times.iter().enumerate() {
            schedule_position.entry(st.stop_id.as_str()).or_insert(i);
        }

        let mut last_position: Option<usize> = None;
        let mut kept = Vec::with_capacity(tu.stop_time_update.len());

        for update in &tu.stop_time_update {
            let Some(&position) = update
                .stop_id
                .as_deref()
                .and_then(|stop_id| schedule_position.get(stop_id))
            else {
                continue;
            };

            // never move backwards through the schedule
            if last_position.is_some_and(|last| position < last) {
                continue;
            }

            if self.latency_limit >= 0 {
                // arrival stands in for departure on arrival-only updates,
                // which is how upstream marks a trip's final stop
                let event_time = update
                    .departure
                    .as_ref()
                    .or(update.arrival.as_ref())
                    .and_then(|event| event.time);
                if let Some(time) = event_time {
                    if time < feed_timestamp - self.latency_limit {
                        continue;
                    }
                }
            }

            last_position = Some(position);
            kept.push(update.clone());
        }

        if kept.is_empty() {
            return None;
        }

        rewritten.stop_time_update = kept;
        Some(rewritten)
    }
}
