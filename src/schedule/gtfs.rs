//! Static-schedule loader.
//!
//! Reads the GTFS CSV bundle (a directory of `.txt` files) into a
//! [`StaticSchedule`]: immutable scheduled trips with ordered stop times in
//! seconds since service-day midnight, plus the service calendar and the
//! agency timezone. A schedule that fails to load or whose identifiers do
//! not carry the NYCT grammar is fatal; matching depends on every trip's
//! identifier parsing cleanly.

use chrono::NaiveDate;
use chrono_tz::Tz;
use log::{info, warn};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;

use super::calendar::{Exception, ServiceCalendar, WeeklyService};
use crate::trip_id::{parse_static_path, Direction, TripId};

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("could not read {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse {path}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("invalid GTFS time {0:?}")]
    InvalidTime(String),
    #[error("invalid GTFS date {0:?}")]
    InvalidDate(String),
    #[error("unknown agency timezone {0:?}")]
    UnknownTimezone(String),
    #[error("agency.txt has no rows")]
    MissingAgency,
    #[error("trip {trip_id}: bad path id {path_id:?}")]
    BadPathId { trip_id: String, path_id: String },
    #[error("trip {0}: identifier does not carry the NYCT trip grammar")]
    BadTripId(String),
    #[error("trip {0}: invalid direction_id")]
    BadDirection(String),
    #[error("trip {trip_id} references unknown route {route_id}")]
    UnknownRoute { trip_id: String, route_id: String },
}

/// One scheduled stop visit.
#[derive(Debug, Clone)]
pub struct StopTime {
    pub stop_id: String,
    pub arrival_sec: i64,
    pub departure_sec: i64,
}

/// An immutable scheduled trip, built once at load time.
///
/// `start_sec` and `end_sec` are the first stop's departure and the last
/// stop's arrival in seconds since service-day midnight; both may exceed
/// 86400 on the 26-hour schedule.
#[derive(Debug, Clone)]
pub struct ScheduledTrip {
    pub trip_id: String,
    pub route_id: String,
    pub direction: Direction,
    pub service_id: String,
    pub start_sec: i64,
    pub end_sec: i64,
    pub stop_times: Vec<StopTime>,
    parsed_id: TripId,
}

impl ScheduledTrip {
    /// Builds a trip from ordered stop times; `start_sec`/`end_sec` are the
    /// first departure and last arrival. `stop_times` must be non-empty.
    pub fn new(
        trip_id: String,
        route_id: String,
        direction: Direction,
        service_id: String,
        stop_times: Vec<StopTime>,
        parsed_id: TripId,
    ) -> ScheduledTrip {
        let start_sec = stop_times[0].departure_sec;
        let end_sec = stop_times[stop_times.len() - 1].arrival_sec;
        ScheduledTrip {
            trip_id,
            route_id,
            direction,
            service_id,
            start_sec,
            end_sec,
            stop_times,
            parsed_id,
        }
    }

    /// The trip's identifier parts, with the route taken from the schedule's
    /// route reference rather than the identifier's route position.
    pub fn parsed_id(&self) -> &TripId {
        &self.parsed_id
    }

    /// Span of all arrival and departure times, for interval indexing.
    pub fn time_span(&self) -> (i64, i64) {
        let mut min = i64::MAX;
        let mut max = i64::MIN;
        for st in &self.stop_times {
            min = min.min(st.arrival_sec).min(st.departure_sec);
            max = max.max(st.arrival_sec).max(st.departure_sec);
        }
        (min, max)
    }
}

/// The loaded static schedule.
#[derive(Debug)]
pub struct StaticSchedule {
    pub agency_timezone: Tz,
    pub trips: Vec<ScheduledTrip>,
    pub calendar: ServiceCalendar,
}

#[derive(Debug, Deserialize)]
struct RawAgency {
    agency_timezone: String,
}

#[derive(Debug, Deserialize)]
struct RawRoute {
    route_id: String,
}

#[derive(Debug, Deserialize)]
struct RawTrip {
    trip_id: String,
    route_id: String,
    service_id: String,
    direction_id: String,
    #[serde(default)]
    mta_trip_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawStopTime {
    trip_id: String,
    arrival_time: String,
    departure_time: String,
    stop_id: String,
    stop_sequence: u32,
}

#[derive(Debug, Deserialize)]
struct RawCalendar {
    service_id: String,
    monday: u8,
    tuesday: u8,
    wednesday: u8,
    thursday: u8,
    friday: u8,
    saturday: u8,
    sunday: u8,
    start_date: String,
    end_date: String,
}

#[derive(Debug, Deserialize)]
struct RawCalendarDate {
    service_id: String,
    date: String,
    exception_type: u8,
}

/// Loads the GTFS bundle from a directory of `.txt` files.
pub fn load_schedule(dir: &Path) -> Result<StaticSchedule, ScheduleError> {
    let agencies: Vec<RawAgency> = read_csv(&dir.join("agency.txt"))?;
    let agency = agencies.first().ok_or(ScheduleError::MissingAgency)?;
    let agency_timezone: Tz = agency
        .agency_timezone
        .parse()
        .map_err(|_| ScheduleError::UnknownTimezone(agency.agency_timezone.clone()))?;

    let calendar = load_calendar(dir)?;

    let routes: Vec<RawRoute> = read_csv(&dir.join("routes.txt"))?;
    let route_ids: HashSet<String> = routes.into_iter().map(|r| r.route_id).collect();

    let raw_trips: Vec<RawTrip> = read_csv(&dir.join("trips.txt"))?;
    let raw_stop_times: Vec<RawStopTime> = read_csv(&dir.join("stop_times.txt"))?;

    let mut stop_times_by_trip: HashMap<String, Vec<(u32, StopTime)>> = HashMap::new();
    for raw in raw_stop_times {
        let arrival_sec = parse_gtfs_time(&raw.arrival_time)?;
        let departure_sec = parse_gtfs_time(&raw.departure_time)?;
        stop_times_by_trip.entry(raw.trip_id).or_default().push((
            raw.stop_sequence,
            StopTime {
                stop_id: raw.stop_id,
                arrival_sec,
                departure_sec,
            },
        ));
    }

    let mut trips = Vec::with_capacity(raw_trips.len());
    for raw in raw_trips {
        if !route_ids.contains(&raw.route_id) {
            return Err(ScheduleError::UnknownRoute {
                trip_id: raw.trip_id,
                route_id: raw.route_id,
            });
        }

        let Some(mut sequenced) = stop_times_by_trip.remove(&raw.trip_id) else {
            warn!("trip {} has no stop times, skipping", raw.trip_id);
            continue;
        };
        sequenced.sort_by_key(|(seq, _)| *seq);
        let stop_times: Vec<StopTime> = sequenced.into_iter().map(|(_, st)| st).collect();

        let direction = Direction::from_gtfs_direction_id(&raw.direction_id)
            .ok_or_else(|| ScheduleError::BadDirection(raw.trip_id.clone()))?;

        let parsed_id = build_trip_id(&raw, direction, stop_times[0].departure_sec)?;

        trips.push(ScheduledTrip::new(
            raw.trip_id,
            raw.route_id,
            direction,
            raw.service_id,
            stop_times,
            parsed_id,
        ));
    }

    info!("loaded {} scheduled trips from {}", trips.len(), dir.display());

    Ok(StaticSchedule {
        agency_timezone,
        trips,
        calendar,
    })
}

// Primary path: the trip_id column carries the NYCT grammar; the route is
// overridden from the schedule's route reference (route W trip ids have "N"
// in the route position). ATIS exports keep an opaque trip_id and put the
// path in mta_trip_id instead; there the id is rebuilt from the first-stop
// departure and the direction flag. mta_trip_id, when present, must match
// the static path grammar.
fn build_trip_id(
    raw: &RawTrip,
    direction: Direction,
    start_sec: i64,
) -> Result<TripId, ScheduleError> {
    let network_from_mta = match raw.mta_trip_id.as_deref().filter(|s| !s.is_empty()) {
        Some(mta) => {
            let parts =
                parse_static_path(mta).ok_or_else(|| ScheduleError::BadPathId {
                    trip_id: raw.trip_id.clone(),
                    path_id: mta.to_string(),
                })?;
            Some(parts.network)
        }
        None => None,
    };

    match TripId::parse(&raw.trip_id) {
        Some(id) => {
            let id = id.with_route_id(&raw.route_id);
            Ok(match network_from_mta {
                Some(network) => id.with_network_id(network),
                None => id,
            })
        }
        None => match network_from_mta {
            Some(network) => {
                let origin_departure_time = (start_sec * 100 / 60) as i32;
                Ok(TripId::from_parts(
                    origin_departure_time,
                    &raw.route_id,
                    direction,
                    network,
                ))
            }
            None => Err(ScheduleError::BadTripId(raw.trip_id.clone())),
        },
    }
}

fn load_calendar(dir: &Path) -> Result<ServiceCalendar, ScheduleError> {
    let mut calendar = ServiceCalendar::new();

    let calendar_path = dir.join("calendar.txt");
    if calendar_path.exists() {
        let rows: Vec<RawCalendar> = read_csv(&calendar_path)?;
        for row in rows {
            let service = WeeklyService {
                monday: row.monday == 1,
                tuesday: row.tuesday == 1,
                wednesday: row.wednesday == 1,
                thursday: row.thursday == 1,
                friday: row.friday == 1,
                saturday: row.saturday == 1,
                sunday: row.sunday == 1,
                start_date: parse_gtfs_date(&row.start_date)?,
                end_date: parse_gtfs_date(&row.end_date)?,
            };
            calendar.add_weekly(row.service_id, service);
        }
    }

    let dates_path = dir.join("calendar_dates.txt");
    if dates_path.exists() {
        let rows: Vec<RawCalendarDate> = read_csv(&dates_path)?;
        for row in rows {
            let exception = match row.exception_type {
                1 => Exception::Added,
                _ => Exception::Removed,
            };
            calendar.add_exception(row.service_id, parse_gtfs_date(&row.date)?, exception);
        }
    }

    Ok(calendar)
}

fn read_csv<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>, ScheduleError> {
    let file = std::fs::File::open(path).map_err(|source| ScheduleError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);
    let mut rows = Vec::new();
    for result in reader.deserialize() {
        rows.push(result.map_err(|source| ScheduleError::Csv {
            path: path.display().to_string(),
            source,
        })?);
    }
    Ok(rows)
}

/// Parses a GTFS `HH:MM:SS` time into seconds since service-day midnight.
/// Hours are unbounded upward: `26:02:00` is a valid overnight time.
pub fn parse_gtfs_time(s: &str) -> Result<i64, ScheduleError> {
    let mut parts = s.split(':');
    let (Some(h), Some(m), Some(sec), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ScheduleError::InvalidTime(s.to_string()));
    };
    let parse = |p: &str| -> Result<i64, ScheduleError> {
        p.parse().map_err(|_| ScheduleError::InvalidTime(s.to_string()))
    };
    let (h, m, sec) = (parse(h)?, parse(m)?, parse(sec)?);
    if m > 59 || sec > 59 {
        return Err(ScheduleError::InvalidTime(s.to_string()));
    }
    Ok(h * 3600 + m * 60 + sec)
}

fn parse_gtfs_date(s: &str) -> Result<NaiveDate, ScheduleError> {
    NaiveDate::parse_from_str(s, "%Y%m%d").map_err(|_| ScheduleError::InvalidDate(s.to_string()))
}
