//! NYCT train identifiers.
//!
//! A train id in the standard format looks like `06 0123+ PEL/BBR`: a
//! one-or-two character trip-type keyword, the origin time in minutes past
//! midnight (with an optional trailing `+` or `-` for half-minutes), and the
//! origin and destination stop abbreviations joined by a slash. Only the
//! origin and destination matter here: the Flushing line's realtime trip
//! identifiers truncate the direction out of the path field, so direction of
//! travel is recovered by comparing the two endpoints against the line's
//! north-to-south stop order.

use lazy_static::lazy_static;
use regex::Regex;

use crate::trip_id::Direction;

lazy_static! {
    static ref TRAIN_ID_RE: Regex = Regex::new(
        r"^(?P<keyword>[0-9A-Z]{1,2}) ?(?P<origin_time>[0-9]{4}[+-]?) ?(?P<origin>[A-Z0-9-]+)/(?P<destination>[A-Z0-9-]+)$"
    )
    .unwrap();
}

/// Flushing line stop abbreviations, ordered from north to south.
const FLUSHING_STOP_ABBREVIATIONS: [&str; 22] = [
    "MST", "WPT", "111", "103", "JCT", "90S", "82S", "74S", "69S", "61S", "52S", "46B", "40S",
    "RAW", "QBP", "CHS", "HTR", "VER", "G-C", "5AV", "TSQ", "34H",
];

/// The default Flushing stop order, for configurations that do not override it.
pub fn default_flushing_stops() -> Vec<String> {
    FLUSHING_STOP_ABBREVIATIONS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// A parsed NYCT train identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainId {
    keyword: String,
    origin_time: String,
    origin: String,
    destination: String,
}

impl TrainId {
    /// Parse a train id in the NYCT standard format. Returns `None` when the
    /// identifier does not carry the grammar.
    pub fn parse(train_id: &str) -> Option<TrainId> {
        let caps = TRAIN_ID_RE.captures(train_id)?;
        Some(TrainId {
            keyword: caps["keyword"].to_string(),
            origin_time: caps["origin_time"].to_string(),
            origin: caps["origin"].to_string(),
            destination: caps["destination"].to_string(),
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }
}

/// Infer direction of travel on the Flushing line from a train id.
///
/// `stops` is the line's stop-abbreviation order from north to south. A
/// train whose origin sits further south in the list than its destination is
/// heading north. Returns `None` when the train id does not parse, either
/// endpoint is not on the line, or origin and destination are the same stop.
pub fn infer_flushing_direction(train_id: &str, stops: &[String]) -> Option<Direction> {
    let parsed = TrainId::parse(train_id)?;

    let origin_index = stops.iter().position(|s| s == parsed.origin())?;
    let destination_index = stops.iter().position(|s| s == parsed.destination())?;

    if origin_index == destination_index {
        return None;
    }

    if origin_index > destination_index {
        Some(Direction::North)
    } else {
        Some(Direction::South)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_standard_train_id() {
        let id = TrainId::parse("06 0123+ PEL/BBR").unwrap();
        assert_eq!(id.origin(), "PEL");
        assert_eq!(id.destination(), "BBR");
    }

    #[test]
    fn test_parse_flushing_train_id() {
        let id = TrainId::parse("07 1441+ 34H/MST").unwrap();
        assert_eq!(id.origin(), "34H");
        assert_eq!(id.destination(), "MST");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(TrainId::parse("").is_none());
        assert!(TrainId::parse("0123+ PEL").is_none());
        assert!(TrainId::parse("06 0123+ PELBBR").is_none());
    }

    #[test]
    fn test_infer_northbound() {
        let stops = default_flushing_stops();
        // TSQ (index 20) to MST (index 0): heading north
        assert_eq!(
            infer_flushing_direction("07 1441+ TSQ/MST", &stops),
            Some(Direction::North)
        );
    }

    #[test]
    fn test_infer_southbound() {
        let stops = default_flushing_stops();
        assert_eq!(
            infer_flushing_direction("07 1441+ MST/TSQ", &stops),
            Some(Direction::South)
        );
    }

    #[test]
    fn test_infer_same_stop_is_none() {
        let stops = default_flushing_stops();
        assert_eq!(infer_flushing_direction("07 1441+ QBP/QBP", &stops), None);
    }

    #[test]
    fn test_infer_unknown_stop_is_none() {
        let stops = default_flushing_stops();
        assert_eq!(infer_flushing_direction("07 1441+ ZZZ/MST", &stops), None);
        assert_eq!(infer_flushing_direction("07 1441+ MST/ZZZ", &stops), None);
    }

    #[test]
    fn test_infer_unparseable_is_none() {
        let stops = default_flushing_stops();
        assert_eq!(infer_flushing_direction("garbage", &stops), None);
        assert_eq!(infer_flushing_direction("", &stops), None);
    }
}
