//! Driving one upstream feed message through the pipeline.
//!
//! For each entity carrying a trip update: parse the NYCT trip descriptor,
//! match it against the schedule, rewrite the stop-time sequence, and
//! collect the result. Emitted updates preserve entity order and are
//! de-duplicated by `(trip_id, start_date)`; unmatched trips are dropped or,
//! per configuration, republished as CANCELED placeholders.

use chrono::Utc;
use log::debug;
use std::collections::HashSet;

use crate::activation::ActivatedTripIndex;
use crate::config::ProxyConfig;
use crate::gtfs_rt::{trip_descriptor::ScheduleRelationship, FeedMessage, TripDescriptor, TripUpdate};
use crate::matcher::{MatchStatus, TripMatcher};
use crate::metrics::MatchMetrics;
use crate::rewriter::StopTimeRewriter;
use crate::schedule::ServiceDate;
use crate::trip_id::TripId;

pub struct FeedProcessor<'a> {
    matcher: TripMatcher<'a>,
    rewriter: StopTimeRewriter,
    config: &'a ProxyConfig,
}

impl<'a> FeedProcessor<'a> {
    pub fn new(index: &'a ActivatedTripIndex, config: &'a ProxyConfig) -> FeedProcessor<'a> {
        FeedProcessor {
            matcher: TripMatcher::new(
                index,
                config.late_trip_limit_sec,
                config.loose_match_disabled,
            ),
            rewriter: StopTimeRewriter::new(config.latency_limit),
            config,
        }
    }

    /// Process one feed message, appending its outcome counts to `metrics`
    /// and returning the rewritten trip updates in entity order.
    pub fn process_feed(
        &self,
        feed_id: u32,
        message: &FeedMessage,
        metrics: &mut MatchMetrics,
    ) -> Vec<TripUpdate> {
        let timestamp = message
            .header
            .timestamp
            .map(|t| t as i64)
            .unwrap_or_else(|| Utc::now().timestamp());

        let mut feed_metrics = MatchMetrics::new();
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut emitted = Vec::new();

        for entity in &message.entity {
            let Some(tu) = &entity.trip_update else {
                continue;
            };

            let id = TripId::from_trip_descriptor(
                &tu.trip,
                &self.config.reversed_directions_routes,
                &self.config.flushing_stops,
            );
            let route_id = id
                .as_ref()
                .map(|id| id.route_id().to_string())
                .or_else(|| tu.trip.route_id.clone());
            let route_id = route_id.as_deref();

            let result = self.matcher.match_trip(id.as_ref(), timestamp);
            feed_metrics.record_status(route_id, result.status);

            let Some(activated) = result.trip else {
                debug!(
                    "feed {}: {:?} for {}",
                    feed_id,
                    result.status,
                    tu.trip.trip_id()
                );
                if self.config.cancel_unmatched_trips {
                    let trip_id = id
                        .as_ref()
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| tu.trip.trip_id().to_string());
                    let start_date =
                        ServiceDate::from_timestamp(timestamp, self.matcher.index().agency_timezone())
                            .to_start_date();
                    emit(
                        canceled_update(&trip_id, route_id, &start_date),
                        &mut seen,
                        &mut emitted,
                        &mut feed_metrics,
                        route_id,
                        true,
                    );
                }
                continue;
            };

            match self.rewriter.rewrite(tu, &activated, timestamp) {
                Some(rewritten) => {
                    emit(rewritten, &mut seen, &mut emitted, &mut feed_metrics, route_id, false);
                }
                None => {
                    // every stop-time update fell outside the scheduled trip
                    feed_metrics.record_status(route_id, MatchStatus::Merged);
                    if self.config.cancel_unmatched_trips {
                        let start_date = activated.service_date.to_start_date();
                        emit(
                            canceled_update(&activated.trip.trip_id, route_id, &start_date),
                            &mut seen,
                            &mut emitted,
                            &mut feed_metrics,
                            route_id,
                            true,
                        );
                    }
                }
            }
        }

        feed_metrics.log_summary(&format!("feed {}", feed_id));
        metrics.absorb(&feed_metrics);

        emitted
    }

}

// Append an update unless its (trip_id, start_date) was already emitted.
fn emit(
    update: TripUpdate,
    seen: &mut HashSet<(String, String)>,
    emitted: &mut Vec<TripUpdate>,
    metrics: &mut MatchMetrics,
    route_id: Option<&str>,
    canceled: bool,
) {
    let key = (
        update.trip.trip_id().to_string(),
        update.trip.start_date().to_string(),
    );
    if !seen.insert(key) {
        metrics.record_duplicate(route_id);
        return;
    }
    if canceled {
        metrics.record_cancellation(route_id);
    }
    emitted.push(update);
}

/// A placeholder update marking a realtime trip with no usable schedule
/// counterpart as canceled.
fn canceled_update(trip_id: &str, route_id: Option<&str>, start_date: &str) -> TripUpdate {
    TripUpdate {
        trip: TripDescriptor {
            trip_id: Some(trip_id.to_string()),
            route_id: route_id.map(str::to_string),
            start_date: Some(start_date.to_string()),
            schedule_relationship: Some(ScheduleRelationship::Canceled as i32),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs_rt::{
        trip_update::{StopTimeEvent, StopTimeUpdate},
        FeedEntity, FeedHeader,
    };
    use crate::schedule::{
        ScheduledTrip, ServiceCalendar, StaticSchedule, StopTime, WeeklyService,
    };
    use crate::trip_id::Direction;
    use chrono::{NaiveDate, TimeZone};
    use chrono_tz::America::New_York;

    fn schedule() -> StaticSchedule {
        let mut calendar = ServiceCalendar::new();
        calendar.add_weekly(
            "WKD".to_string(),
            WeeklyService {
                monday: true,
                tuesday: true,
                wednesday: true,
                thursday: true,
                friday: true,
                saturday: false,
                sunday: false,
                start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
            },
        );

        let stop_times = |stops: &[(&str, i64)]| -> Vec<StopTime> {
            stops
                .iter()
                .map(|(stop_id, t)| StopTime {
                    stop_id: stop_id.to_string(),
                    arrival_sec: *t,
                    departure_sec: *t,
                })
                .collect()
        };

        StaticSchedule {
            agency_timezone: New_York,
            trips: vec![ScheduledTrip::new(
                "036000_1..N03R".to_string(),
                "1".to_string(),
                Direction::North,
                "WKD".to_string(),
                stop_times(&[("101N", 21600), ("103N", 21780), ("104N", 21960)]),
                TripId::parse("036000_1..N03R").unwrap(),
            )],
            calendar,
        }
    }

    fn thursday_morning() -> i64 {
        New_York
            .with_ymd_and_hms(2026, 3, 5, 6, 5, 0)
            .unwrap()
            .timestamp()
    }

    fn feed_message(timestamp: i64, updates: Vec<TripUpdate>) -> FeedMessage {
        FeedMessage {
            header: FeedHeader {
                gtfs_realtime_version: "1.0".to_string(),
                timestamp: Some(timestamp as u64),
                ..Default::default()
            },
            entity: updates
                .into_iter()
                .enumerate()
                .map(|(i, tu)| FeedEntity {
                    id: format!("{}", i + 1),
                    trip_update: Some(tu),
                    ..Default::default()
                })
                .collect(),
        }
    }

    fn realtime_update(trip_id: &str, stops: &[&str]) -> TripUpdate {
        TripUpdate {
            trip: TripDescriptor {
                trip_id: Some(trip_id.to_string()),
                ..Default::default()
            },
            stop_time_update: stops
                .iter()
                .map(|stop_id| StopTimeUpdate {
                    stop_id: Some(stop_id.to_string()),
                    departure: Some(StopTimeEvent {
                        time: Some(thursday_morning() + 300),
                        ..Default::default()
                    }),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_matched_update_is_rewritten_and_emitted() {
        let index = ActivatedTripIndex::new(schedule());
        let config = ProxyConfig::default();
        let processor = FeedProcessor::new(&index, &config);
        let mut metrics = MatchMetrics::new();

        let message = feed_message(
            thursday_morning(),
            vec![realtime_update("036000_1..N", &["101N", "103N"])],
        );
        let out = processor.process_feed(1, &message, &mut metrics);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].trip.trip_id.as_deref(), Some("036000_1..N03R"));
        assert_eq!(metrics.total().matched_loose, 1);
    }

    #[test]
    fn test_duplicates_are_counted_and_dropped() {
        let index = ActivatedTripIndex::new(schedule());
        let config = ProxyConfig::default();
        let processor = FeedProcessor::new(&index, &config);
        let mut metrics = MatchMetrics::new();

        let message = feed_message(
            thursday_morning(),
            vec![
                realtime_update("036000_1..N", &["101N"]),
                realtime_update("036000_1..N", &["103N"]),
            ],
        );
        let out = processor.process_feed(1, &message, &mut metrics);

        assert_eq!(out.len(), 1);
        assert_eq!(metrics.total().duplicates, 1);
    }

    #[test]
    fn test_unmatched_is_dropped_by_default() {
        let index = ActivatedTripIndex::new(schedule());
        let config = ProxyConfig::default();
        let processor = FeedProcessor::new(&index, &config);
        let mut metrics = MatchMetrics::new();

        let message = feed_message(
            thursday_morning(),
            vec![realtime_update("100000_1..N", &["101N"])],
        );
        let out = processor.process_feed(1, &message, &mut metrics);

        assert!(out.is_empty());
        assert_eq!(metrics.total().no_match, 1);
    }

    #[test]
    fn test_unmatched_is_canceled_when_configured() {
        let index = ActivatedTripIndex::new(schedule());
        let config = ProxyConfig {
            cancel_unmatched_trips: true,
            ..ProxyConfig::default()
        };
        let processor = FeedProcessor::new(&index, &config);
        let mut metrics = MatchMetrics::new();

        let message = feed_message(
            thursday_morning(),
            vec![realtime_update("100000_1..N", &["101N"])],
        );
        let out = processor.process_feed(1, &message, &mut metrics);

        assert_eq!(out.len(), 1);
        assert_eq!(
            out[0].trip.schedule_relationship,
            Some(ScheduleRelationship::Canceled as i32)
        );
        assert_eq!(out[0].trip.trip_id.as_deref(), Some("100000_1..N"));
        assert!(out[0].stop_time_update.is_empty());
        assert_eq!(metrics.total().cancellations, 1);
    }

    #[test]
    fn test_all_stops_unknown_is_merged() {
        let index = ActivatedTripIndex::new(schedule());
        let config = ProxyConfig::default();
        let processor = FeedProcessor::new(&index, &config);
        let mut metrics = MatchMetrics::new();

        let message = feed_message(
            thursday_morning(),
            vec![realtime_update("036000_1..N", &["999X"])],
        );
        let out = processor.process_feed(1, &message, &mut metrics);

        assert!(out.is_empty());
        assert_eq!(metrics.total().merged, 1);
        assert_eq!(metrics.total().matched_loose, 1);
    }

    #[test]
    fn test_bad_trip_id_is_counted() {
        let index = ActivatedTripIndex::new(schedule());
        let config = ProxyConfig::default();
        let processor = FeedProcessor::new(&index, &config);
        let mut metrics = MatchMetrics::new();

        let message = feed_message(
            thursday_morning(),
            vec![realtime_update("garbage", &["101N"])],
        );
        let out = processor.process_feed(1, &message, &mut metrics);

        assert!(out.is_empty());
        assert_eq!(metrics.total().bad_trip_id, 1);
    }

    #[test]
    fn test_entities_without_trip_updates_are_skipped() {
        let index = ActivatedTripIndex::new(schedule());
        let config = ProxyConfig::default();
        let processor = FeedProcessor::new(&index, &config);
        let mut metrics = MatchMetrics::new();

        let message = FeedMessage {
            header: FeedHeader {
                gtfs_realtime_version: "1.0".to_string(),
                timestamp: Some(thursday_morning() as u64),
                ..Default::default()
            },
            entity: vec![FeedEntity {
                id: "1".to_string(),
                ..Default::default()
            }],
        };
        let out = processor.process_feed(1, &message, &mut metrics);

        assert!(out.is_empty());
        assert_eq!(metrics.total().matched(), 0);
        assert_eq!(metrics.total().unmatched(), 0);
    }
}
