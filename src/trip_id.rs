//! NYCT trip identifiers broken into constituent parts.
//!
//! Realtime trip ids look like `036000_1..N` or `A20111204SAT_000650_GS.S05R`:
//! an origin-departure time in hundredths of a minute after service-day
//! midnight, then a path made of the route right-padded with dots, a
//! direction letter, and an optional network suffix. Static schedule ids
//! carry the same path grammar at their tail. Matching realtime trips to
//! scheduled trips happens entirely on these parts.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;

use crate::gtfs_rt::TripDescriptor;
use crate::train_id;

lazy_static! {
    static ref RT_TRIP_RE: Regex = Regex::new(
        r"(?:[A-Z0-9]+_)?(?P<origin_departure_time>[0-9-]{6})_?(?P<route>[A-Z0-9]+)\.+(?P<direction>[NS]?)(?P<network>[A-Z0-9 -]*)$"
    )
    .unwrap();
    static ref STATIC_TRIP_RE: Regex =
        Regex::new(r"(?P<route>[A-Z0-9]+)\.+(?P<direction>[NS])(?P<network>[A-Z0-9]*)$").unwrap();
}

/// Direction of travel. The subway is signed uptown/downtown, so every
/// identifier carries north or south regardless of compass heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    South,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::North => "N",
            Direction::South => "S",
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
        }
    }

    fn from_capture(s: &str) -> Option<Self> {
        match s {
            "N" => Some(Direction::North),
            "S" => Some(Direction::South),
            _ => None,
        }
    }

    /// GTFS `direction_id`: "0" is uptown, "1" is downtown.
    pub fn from_gtfs_direction_id(s: &str) -> Option<Self> {
        match s {
            "0" => Some(Direction::North),
            "1" => Some(Direction::South),
            _ => None,
        }
    }
}

/// The parts of the static-grammar path tail (`1..N03R`), as found on
/// schedule-side identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticPathParts {
    pub route: String,
    pub direction: Direction,
    pub network: Option<String>,
}

/// Parses the tail of a schedule-side identifier (`mta_trip_id` in ATIS
/// exports). Returns `None` when the grammar does not match.
pub fn parse_static_path(path: &str) -> Option<StaticPathParts> {
    let caps = STATIC_TRIP_RE.captures(path)?;
    let direction = Direction::from_capture(&caps["direction"])?;
    let network = &caps["network"];
    Some(StaticPathParts {
        route: caps["route"].to_string(),
        direction,
        network: if network.is_empty() {
            None
        } else {
            Some(network.to_string())
        },
    })
}

/// A parsed NYCT trip identifier.
///
/// `origin_departure_time` is in hundredths of a minute after service-day
/// midnight (one unit = 0.6 seconds), so `036000` is 6:00 AM. Negative
/// values appear when an id was expressed relative to the following
/// service day.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TripId {
    origin_departure_time: i32,
    path_id: String,
    route_id: String,
    direction: Option<Direction>,
    network_id: Option<String>,
}

impl TripId {
    /// Parse a trip id (from the static schedule or the realtime feed).
    /// Returns `None` when the identifier does not carry the NYCT grammar.
    pub fn parse(trip_id: &str) -> Option<TripId> {
        let caps = RT_TRIP_RE.captures(trip_id)?;

        let origin_departure_time: i32 = caps["origin_departure_time"].parse().ok()?;
        let route = &caps["route"];
        let direction = Direction::from_capture(&caps["direction"]);
        let network = &caps["network"];

        Some(TripId {
            origin_departure_time,
            path_id: Self::build_path_id(route, direction),
            route_id: route.to_string(),
            direction,
            network_id: if network.is_empty() {
                None
            } else {
                Some(network.to_string())
            },
        })
    }

    /// Build a trip id from a realtime `TripDescriptor`.
    ///
    /// The descriptor's explicit route id wins over the one embedded in the
    /// identifier (route 6X realtime ids have "6" in the route position).
    /// Route 7/7X ids truncate the direction out of the path, so it is
    /// inferred from the NYCT train id instead. Routes listed in
    /// `reversed_direction_routes` are signed backwards upstream and get
    /// flipped.
    pub fn from_trip_descriptor(
        td: &TripDescriptor,
        reversed_direction_routes: &HashSet<String>,
        flushing_stops: &[String],
    ) -> Option<TripId> {
        let mut id = Self::parse(td.trip_id())?;

        if let Some(route_id) = &td.route_id {
            id.route_id = route_id.clone();
        }

        if id.direction.is_none() && (id.route_id == "7" || id.route_id == "7X") {
            let train_id = td
                .nyct_trip_descriptor
                .as_ref()
                .and_then(|nyct| nyct.train_id.as_deref())
                .unwrap_or("");
            id.set_direction(train_id::infer_flushing_direction(train_id, flushing_stops));
        }

        if reversed_direction_routes.contains(&id.route_id) {
            id.set_direction(id.direction.map(Direction::flipped));
        }

        Some(id)
    }

    // Swap the direction, keeping the path's literal route prefix intact
    // (it may differ from `route_id` after a descriptor override).
    fn set_direction(&mut self, direction: Option<Direction>) {
        if self.direction.is_some() {
            self.path_id.pop();
        }
        if let Some(d) = direction {
            self.path_id.push_str(d.as_str());
        }
        self.direction = direction;
    }

    fn build_path_id(route: &str, direction: Option<Direction>) -> String {
        match direction {
            Some(d) => format!("{:.<3}{}", route, d.as_str()),
            None => format!("{:.<3}", route),
        }
    }

    pub fn origin_departure_time(&self) -> i32 {
        self.origin_departure_time
    }

    pub fn path_id(&self) -> &str {
        &self.path_id
    }

    pub fn route_id(&self) -> &str {
        &self.route_id
    }

    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    pub fn network_id(&self) -> Option<&str> {
        self.network_id.as_deref()
    }

    /// Replaces the route id with the authoritative one from the schedule's
    /// route reference. Route W static trip ids have "N" in the route
    /// position; the `routes.txt` reference is the logical route.
    pub fn with_route_id(mut self, route_id: &str) -> TripId {
        self.route_id = route_id.to_string();
        self
    }

    /// Replaces the network id, as re-derived from a schedule-side path.
    pub fn with_network_id(mut self, network_id: Option<String>) -> TripId {
        self.network_id = network_id;
        self
    }

    /// Assemble a trip id directly from schedule-side parts, for trips whose
    /// `trip_id` column is opaque and whose path lives in `mta_trip_id`.
    pub fn from_parts(
        origin_departure_time: i32,
        route_id: &str,
        direction: Direction,
        network_id: Option<String>,
    ) -> TripId {
        TripId {
            origin_departure_time,
            path_id: Self::build_path_id(route_id, Some(direction)),
            route_id: route_id.to_string(),
            direction: Some(direction),
            network_id,
        }
    }

    /// Route, direction, origin-departure time, and network all match.
    ///
    /// Only feed 1 carries network ids, so a strict match additionally
    /// requires that this id's network is present; a null network can never
    /// match strictly.
    pub fn strict_match(&self, other: &TripId) -> bool {
        self.loose_match(other)
            && self.network_id.is_some()
            && self.network_id == other.network_id
    }

    /// Route, direction, and origin-departure time match.
    pub fn loose_match(&self, other: &TripId) -> bool {
        self.route_dir_match(other) && self.origin_departure_time == other.origin_departure_time
    }

    /// Route and direction match.
    pub fn route_dir_match(&self, other: &TripId) -> bool {
        self.route_id == other.route_id && self.direction == other.direction
    }

    /// The same trip expressed against the previous service day's 26-hour
    /// schedule: origin-departure time shifted forward by 24 hours.
    pub fn relative_to_previous_day(&self) -> TripId {
        TripId {
            origin_departure_time: self.origin_departure_time + 24 * 60 * 100,
            ..self.clone()
        }
    }
}

impl fmt::Display for TripId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06}_{}", self.origin_departure_time, self.path_id)
    }
}
